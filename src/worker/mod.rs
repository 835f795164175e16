//! Worker runtime: polling loops, heartbeat sentinels, handler dispatch.
//!
//! # Components
//!
//! - [`pool::WorkerPool`]: spawns N concurrent worker loops sharing one
//!   handler registry and one manager client
//! - [`worker::WorkerLoop`]: per-slot poll → dispatch → report state machine
//! - [`heartbeat::HeartbeatSentinel`]: per-job background liveness reporter
//! - [`registry::HandlerRegistry`]: job-kind dispatch with lazy exactly-once
//!   handler startup

pub mod heartbeat;
pub mod pool;
pub mod registry;
pub mod worker;

pub use pool::WorkerPool;
pub use registry::{HandlerRegistry, JobHandler};
pub use worker::WorkerLoop;

/// Consecutive transport failures tolerated before a call-site gives up.
/// Shared by the metadata fetch, the poll loop, and the heartbeat sentinel,
/// each counting independently.
pub const MAX_TRANSPORT_FAILURES: u32 = 5;
