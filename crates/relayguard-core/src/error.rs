// ── Core error types ──
//
// Errors surfaced by the queue, stores and monitor. Vendor failures during a
// probe or command never show up here: they are folded into a StatusRecord
// or CommandResult instead. The `From<relayguard_api::Error>` impl exists for
// the few paths (client construction) where they do propagate.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Queue errors ─────────────────────────────────────────────────
    #[error("Request queue is closed")]
    QueueClosed,

    #[error("Request queue is full ({depth} pending)")]
    QueueFull { depth: usize },

    #[error("Queued work panicked")]
    WorkPanicked,

    // ── Timing ───────────────────────────────────────────────────────
    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Shared store ─────────────────────────────────────────────────
    #[error("Status store error: {message}")]
    Store { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<relayguard_api::Error> for CoreError {
    fn from(err: relayguard_api::Error) -> Self {
        match err {
            relayguard_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            relayguard_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            relayguard_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Store {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Store {
            message: format!("invalid store document: {err}"),
        }
    }
}
