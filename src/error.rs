//! Error types for the worker fleet.

use crate::job::JobKind;

/// Top-level error type for the worker runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Manager RPC transport failures. Retryable at the call-site that owns them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Manager request to {endpoint} failed: {reason}")]
    Manager {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Retries exhausted for {endpoint} after {attempts} attempts")]
    RetriesExhausted {
        endpoint: &'static str,
        attempts: u32,
    },
}

/// Manager protocol violations. Fatal — these indicate a version mismatch
/// between worker and manager, never a transient condition.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Manager returned an undecodable job descriptor: {0}")]
    MalformedJob(String),

    #[error("No handler registered for job kind {kind}")]
    UnregisteredKind { kind: JobKind },
}

/// Handler execution errors.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler startup failed for {kind}: {reason}")]
    Startup { kind: JobKind, reason: String },

    #[error("Handler {kind} received a payload of the wrong kind")]
    UnexpectedPayload { kind: JobKind },

    #[error("Handler {kind} is not initialized")]
    NotInitialized { kind: JobKind },

    #[error("Handler task panicked: {0}")]
    Panicked(String),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Result sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexicon error: {0}")]
    Lexicon(#[from] csv::Error),
}

/// Inference backend errors.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    #[error("Inference backend returned an empty completion")]
    EmptyCompletion,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Vector-store read errors.
#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("Vector store request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid object for id {id}: {reason}")]
    InvalidObject { id: uuid::Uuid, reason: String },
}

/// Results-endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to post results: {0}")]
    PostFailed(String),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for the worker runtime.
pub type Result<T> = std::result::Result<T, Error>;
