//! Worker runtime behavior, driven by a scripted in-process manager.
//!
//! These tests cover the polling/retry contract, heartbeat ordering, lazy
//! handler initialization, and the pool's fail-fast policy, without any
//! network I/O.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};

use kg_workers::config::WorkerConfig;
use kg_workers::error::{Error, HandlerError, ProtocolError, TransportError};
use kg_workers::job::{JobDescriptor, JobKind, JobPayload, RunMetadata};
use kg_workers::manager::{ManagerApi, RequestJobError};
use kg_workers::worker::{HandlerRegistry, JobHandler, WorkerLoop, WorkerPool};

/// Everything observable, in one ordered trace.
#[derive(Debug, Clone, PartialEq)]
enum Event {
    FetchMetadata,
    RequestJob,
    Heartbeat(u64),
    JobDone { job_id: u64, has_result: bool },
    Startup(&'static str),
    Process(&'static str),
    Shutdown(&'static str),
}

type Trace = Arc<Mutex<Vec<Event>>>;

enum Step {
    Wait,
    Job(JobDescriptor),
    Fail,
}

/// Scripted manager: serves `steps` in order, then transport failures
/// forever (which terminates a loop after its retry budget).
struct ScriptedManager {
    steps: Mutex<VecDeque<Step>>,
    trace: Trace,
    metadata_failures: AtomicU32,
}

impl ScriptedManager {
    fn new(steps: Vec<Step>, trace: Trace) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            trace,
            metadata_failures: AtomicU32::new(0),
        })
    }

    fn failing_metadata(trace: Trace) -> Arc<Self> {
        let manager = Self::new(vec![], trace);
        manager.metadata_failures.store(u32::MAX, Ordering::SeqCst);
        manager
    }
}

#[async_trait]
impl ManagerApi for ScriptedManager {
    async fn fetch_run_metadata(&self) -> Result<RunMetadata, TransportError> {
        self.trace.lock().unwrap().push(Event::FetchMetadata);
        if self.metadata_failures.load(Ordering::SeqCst) > 0 {
            self.metadata_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(TransportError::Manager {
                endpoint: "run_metadata",
                reason: "unreachable".into(),
            });
        }
        Ok(RunMetadata {
            run_id: "test-run".into(),
            pipeline_id: "0".into(),
            heartbeat_interval_secs: 1,
        })
    }

    async fn request_job(&self) -> Result<JobDescriptor, RequestJobError> {
        self.trace.lock().unwrap().push(Event::RequestJob);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Wait) => Ok(JobDescriptor {
                id: 0,
                on_demand: false,
                payload: JobPayload::Wait,
            }),
            Some(Step::Job(job)) => Ok(job),
            Some(Step::Fail) | None => Err(TransportError::Manager {
                endpoint: "request_job",
                reason: "unreachable".into(),
            }
            .into()),
        }
    }

    async fn report_heartbeat(&self, job_id: u64) -> Result<(), TransportError> {
        self.trace.lock().unwrap().push(Event::Heartbeat(job_id));
        Ok(())
    }

    async fn report_job_done(
        &self,
        job_id: u64,
        result: Option<Value>,
    ) -> Result<(), TransportError> {
        self.trace.lock().unwrap().push(Event::JobDone {
            job_id,
            has_result: result.is_some(),
        });
        Ok(())
    }
}

/// Handler that records its lifecycle into the shared trace.
struct RecordingHandler {
    kind: JobKind,
    label: &'static str,
    trace: Trace,
    startup_delay: Duration,
    process_delay: Duration,
}

impl RecordingHandler {
    fn new(kind: JobKind, label: &'static str, trace: Trace) -> Arc<Self> {
        Arc::new(Self {
            kind,
            label,
            trace,
            startup_delay: Duration::ZERO,
            process_delay: Duration::ZERO,
        })
    }

    fn with_delays(kind: JobKind, label: &'static str, trace: Trace, startup: Duration, process: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            label,
            trace,
            startup_delay: startup,
            process_delay: process,
        })
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn startup(&self) -> Result<(), HandlerError> {
        tokio::time::sleep(self.startup_delay).await;
        self.trace.lock().unwrap().push(Event::Startup(self.label));
        Ok(())
    }

    async fn process(
        &self,
        _payload: JobPayload,
        _run: &RunMetadata,
        need_return: bool,
    ) -> Result<Option<Value>, HandlerError> {
        tokio::time::sleep(self.process_delay).await;
        self.trace.lock().unwrap().push(Event::Process(self.label));
        Ok(need_return.then(|| json!({ "ok": true })))
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        self.trace.lock().unwrap().push(Event::Shutdown(self.label));
        Ok(())
    }
}

/// Handler whose process always fails.
struct BrokenHandler {
    kind: JobKind,
}

#[async_trait]
impl JobHandler for BrokenHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn startup(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn process(
        &self,
        _payload: JobPayload,
        _run: &RunMetadata,
        _need_return: bool,
    ) -> Result<Option<Value>, HandlerError> {
        Err(HandlerError::Startup {
            kind: self.kind,
            reason: "boom".into(),
        })
    }

    async fn shutdown(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

fn retry_after() -> Duration {
    Duration::from_millis(5)
}

fn paragraphs_job(id: u64) -> JobDescriptor {
    JobDescriptor {
        id,
        on_demand: false,
        payload: JobPayload::Paragraphs(vec![]),
    }
}

fn echo_job(id: u64, on_demand: bool) -> JobDescriptor {
    JobDescriptor {
        id,
        on_demand,
        payload: JobPayload::Echo(vec!["x".into()]),
    }
}

fn count_requests(trace: &Trace) -> usize {
    trace
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::RequestJob))
        .count()
}

// ── Retry contract ───────────────────────────────────────────────────

#[tokio::test]
async fn four_failures_then_success_resets_the_counter() {
    let trace = trace();
    // 4 failures, a success (wait), then 5 fresh failures: the success must
    // reset the counter or the loop would die on the 5th overall failure.
    let steps = vec![Step::Fail, Step::Fail, Step::Fail, Step::Fail, Step::Wait];
    let manager = ScriptedManager::new(steps, trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().build());

    WorkerLoop::new(0, manager, registry, retry_after())
        .run()
        .await
        .expect("exhausted polling is a clean loop exit");

    assert_eq!(count_requests(&trace), 4 + 1 + 5);
}

#[tokio::test]
async fn five_consecutive_failures_terminate_only_that_loop() {
    let trace_a = trace();
    let trace_b = trace();
    let registry = Arc::new(HandlerRegistry::builder().build());

    // Loop A: nothing but failures. Loop B: an endless supply of waits.
    let manager_a = ScriptedManager::new(vec![], trace_a.clone());
    let wait_steps: Vec<Step> = (0..10_000).map(|_| Step::Wait).collect();
    let manager_b = ScriptedManager::new(wait_steps, trace_b.clone());

    let loop_a = tokio::spawn(WorkerLoop::new(0, manager_a, registry.clone(), retry_after()).run());
    let loop_b = tokio::spawn(WorkerLoop::new(1, manager_b, registry, retry_after()).run());

    loop_a.await.unwrap().expect("loop-local termination");
    assert_eq!(count_requests(&trace_a), 5);
    assert!(!loop_b.is_finished(), "sibling loop must keep polling");
    loop_b.abort();
}

#[tokio::test]
async fn metadata_fetch_exhaustion_is_fatal() {
    let trace = trace();
    let manager = ScriptedManager::failing_metadata(trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().build());

    let err = WorkerLoop::new(0, manager, registry, retry_after())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Transport(TransportError::RetriesExhausted { attempts: 5, .. })
    ));
    let fetches = trace
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::FetchMetadata))
        .count();
    assert_eq!(fetches, 5);
}

// ── Wait semantics ───────────────────────────────────────────────────

#[tokio::test]
async fn wait_sleeps_and_invokes_no_handler() {
    let trace = trace();
    let manager = ScriptedManager::new(vec![Step::Wait], trace.clone());
    let handler = RecordingHandler::new(JobKind::Echo, "echo", trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    let backoff = Duration::from_millis(40);
    let started = Instant::now();
    WorkerLoop::new(0, manager, registry, backoff)
        .run()
        .await
        .unwrap();

    // One wait backoff plus four inter-retry sleeps.
    assert!(started.elapsed() >= backoff * 5);
    let events = trace.lock().unwrap();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::Startup(_) | Event::Process(_))),
        "wait must not touch any handler: {events:?}"
    );
}

// ── Heartbeat ordering ───────────────────────────────────────────────

#[tokio::test]
async fn last_heartbeat_precedes_job_done_and_none_follow() {
    let trace = trace();
    let manager = ScriptedManager::new(vec![Step::Job(echo_job(9, false))], trace.clone());
    // Slow handler so several beats fit inside the job (interval is 250ms).
    let handler = RecordingHandler::with_delays(
        JobKind::Echo,
        "echo",
        trace.clone(),
        Duration::ZERO,
        Duration::from_millis(600),
    );
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    WorkerLoop::new(0, manager, registry, retry_after())
        .run()
        .await
        .unwrap();

    let events = trace.lock().unwrap().clone();
    let beats: Vec<usize> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| matches!(e, Event::Heartbeat(9)).then_some(i))
        .collect();
    let done = events
        .iter()
        .position(|e| matches!(e, Event::JobDone { job_id: 9, .. }))
        .expect("job must be reported done");

    assert!(!beats.is_empty(), "expected heartbeats during the job");
    assert!(
        beats.iter().all(|&beat| beat < done),
        "no heartbeat may follow the completion report: {events:?}"
    );
}

// ── Lazy initialization ──────────────────────────────────────────────

#[tokio::test]
async fn racing_loops_initialize_a_handler_exactly_once() {
    let trace = trace();
    let handler = RecordingHandler::with_delays(
        JobKind::Echo,
        "echo",
        trace.clone(),
        Duration::from_millis(30),
        Duration::ZERO,
    );
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    let manager_a = ScriptedManager::new(vec![Step::Job(echo_job(1, false))], trace.clone());
    let manager_b = ScriptedManager::new(vec![Step::Job(echo_job(2, false))], trace.clone());

    let loop_a = tokio::spawn(WorkerLoop::new(0, manager_a, registry.clone(), retry_after()).run());
    let loop_b = tokio::spawn(WorkerLoop::new(1, manager_b, registry, retry_after()).run());
    loop_a.await.unwrap().unwrap();
    loop_b.await.unwrap().unwrap();

    let events = trace.lock().unwrap();
    let startups = events
        .iter()
        .filter(|e| matches!(e, Event::Startup("echo")))
        .count();
    let processed = events
        .iter()
        .filter(|e| matches!(e, Event::Process("echo")))
        .count();
    assert_eq!(startups, 1, "startup must run exactly once: {events:?}");
    assert_eq!(processed, 2, "both jobs must still be processed");
}

// ── Protocol violations ──────────────────────────────────────────────

#[tokio::test]
async fn unregistered_kind_fails_immediately_without_retry() {
    let trace = trace();
    let manager = ScriptedManager::new(vec![Step::Job(paragraphs_job(5))], trace.clone());
    let handler = RecordingHandler::new(JobKind::Echo, "echo", trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    let err = WorkerLoop::new(0, manager, registry, retry_after())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::UnregisteredKind {
            kind: JobKind::Paragraphs
        })
    ));
    assert_eq!(count_requests(&trace), 1, "protocol errors are never retried");
    assert!(
        !trace
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::JobDone { .. })),
        "a failed job must not be reported done"
    );
}

// ── On-demand jobs ───────────────────────────────────────────────────

#[tokio::test]
async fn on_demand_job_attaches_its_result_to_the_report() {
    let trace = trace();
    let manager = ScriptedManager::new(
        vec![Step::Job(echo_job(3, true)), Step::Job(echo_job(4, false))],
        trace.clone(),
    );
    let handler = RecordingHandler::new(JobKind::Echo, "echo", trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    WorkerLoop::new(0, manager, registry, retry_after())
        .run()
        .await
        .unwrap();

    let events = trace.lock().unwrap();
    assert!(events.contains(&Event::JobDone {
        job_id: 3,
        has_result: true
    }));
    assert!(events.contains(&Event::JobDone {
        job_id: 4,
        has_result: false
    }));
}

// ── Pool behavior ────────────────────────────────────────────────────

fn pool_config(pool_count: usize) -> WorkerConfig {
    WorkerConfig {
        manager_host: "scripted".into(),
        pool_count,
        retry_after: retry_after(),
    }
}

#[tokio::test]
async fn handler_failure_shuts_down_initialized_handlers() {
    let trace = trace();
    // An echo job initializes the recording handler, then a paragraphs job
    // hits the broken one.
    let manager = ScriptedManager::new(
        vec![
            Step::Job(echo_job(1, false)),
            Step::Job(paragraphs_job(2)),
        ],
        trace.clone(),
    );
    let echo = RecordingHandler::new(JobKind::Echo, "echo", trace.clone());
    let registry = Arc::new(
        HandlerRegistry::builder()
            .register(echo)
            .register(Arc::new(BrokenHandler {
                kind: JobKind::Paragraphs,
            }))
            .build(),
    );

    let pool = WorkerPool::new(manager, registry, &pool_config(1));
    let err = pool.run().await.unwrap_err();
    assert!(matches!(err, Error::Handler(_)));

    let events = trace.lock().unwrap();
    assert!(
        events.contains(&Event::Shutdown("echo")),
        "initialized handlers must be shut down on pool failure: {events:?}"
    );
}

#[tokio::test]
async fn graceful_pool_completion_also_shuts_down_handlers() {
    let trace = trace();
    let manager = ScriptedManager::new(vec![Step::Job(echo_job(1, false))], trace.clone());
    let handler = RecordingHandler::new(JobKind::Echo, "echo", trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().register(handler).build());

    WorkerPool::new(manager, registry, &pool_config(1))
        .run()
        .await
        .expect("exhausted polling ends the pool cleanly");

    assert!(trace.lock().unwrap().contains(&Event::Shutdown("echo")));
}

// ── End-to-end trace ─────────────────────────────────────────────────

#[tokio::test]
async fn single_slot_pool_processes_jobs_in_order() {
    let trace = trace();
    let manager = ScriptedManager::new(
        vec![
            Step::Wait,
            Step::Job(paragraphs_job(1)),
            Step::Job(echo_job(2, false)),
        ],
        trace.clone(),
    );
    let a = RecordingHandler::new(JobKind::Paragraphs, "a", trace.clone());
    let b = RecordingHandler::new(JobKind::Echo, "b", trace.clone());
    let registry = Arc::new(HandlerRegistry::builder().register(a).register(b).build());

    WorkerPool::new(manager, registry, &pool_config(1))
        .run()
        .await
        .unwrap();

    let events = trace.lock().unwrap();
    let significant: Vec<&Event> = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::Startup(_) | Event::Process(_) | Event::JobDone { .. }
            )
        })
        .collect();
    assert_eq!(
        significant,
        vec![
            &Event::Startup("a"),
            &Event::Process("a"),
            &Event::JobDone {
                job_id: 1,
                has_result: false
            },
            &Event::Startup("b"),
            &Event::Process("b"),
            &Event::JobDone {
                job_id: 2,
                has_result: false
            },
        ],
        "full trace: {events:?}"
    );
}
