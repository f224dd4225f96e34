//! Error types for the reporting engine.

use thiserror::Error;

/// Errors returned by the reporter lifecycle.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The gateway exposes no location providers.
    #[error("No location service available")]
    NoLocationService,

    /// `start` was called while the reporter was not stopped.
    #[error("Reporter is already running")]
    AlreadyRunning,

    /// `start` was called outside a tokio runtime.
    #[error("Reporter must be started inside a tokio runtime")]
    NoRuntime,

    /// The gateway refused the live update subscription.
    #[error("Failed to subscribe to location updates: {0}")]
    Subscription(#[source] anyhow::Error),
}

/// Errors raised while pushing a reading to the server.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("Failed to serialize location payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(reqwest::StatusCode),
}
