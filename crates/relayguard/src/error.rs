//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with exit codes.

use miette::Diagnostic;
use thiserror::Error;

use relayguard_config::ConfigError;
use relayguard_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(relayguard::config),
        help("Check the file printed by: relayguard config path")
    )]
    Config(#[from] ConfigError),

    #[error("No devices configured")]
    #[diagnostic(
        code(relayguard::no_devices),
        help(
            "Add [[devices]] entries to {path}\n\
             Create a starter file with: relayguard config init"
        )
    )]
    NoDevices { path: String },

    #[error("Device '{device}' is missing its server URL, device id or auth key")]
    #[diagnostic(
        code(relayguard::config_incomplete),
        help("Store a key with: relayguard config set-key {device}")
    )]
    ConfigIncomplete { device: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(relayguard::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(relayguard::not_found),
        help("Run: relayguard devices to see configured devices")
    )]
    NotFound { identifier: String },

    // ── Vendor ───────────────────────────────────────────────────────

    #[error("Could not reach the vendor cloud: {message}")]
    #[diagnostic(code(relayguard::connection_failed))]
    Connection { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(relayguard::timeout),
        help("Raise vendor.status_timeout_secs or vendor.command_timeout_secs.")
    )]
    Timeout { seconds: u64 },

    #[error("Command failed: {message}")]
    #[diagnostic(code(relayguard::command_failed))]
    CommandFailed { message: String },

    #[error("Request queue unavailable: {message}")]
    #[diagnostic(
        code(relayguard::queue),
        help("Raise queue.max_depth or leave it unset for an unbounded queue.")
    )]
    Queue { message: String },

    #[error("Status store error: {message}")]
    #[diagnostic(code(relayguard::store))]
    Store { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(relayguard::validation))]
    Validation { field: String, reason: String },

    #[error("'{action}' on an offline device requires confirmation")]
    #[diagnostic(
        code(relayguard::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(relayguard::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(relayguard::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_)
            | Self::NoDevices { .. }
            | Self::ConfigIncomplete { .. }
            | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Connection { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Store { message } => Self::Store { message },
            CoreError::Config { message } => Self::Validation {
                field: "vendor".into(),
                reason: message,
            },
            CoreError::Api { message, .. } => Self::Connection { message },
            other @ (CoreError::QueueClosed
            | CoreError::QueueFull { .. }
            | CoreError::WorkPanicked) => Self::Queue {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::Timeout { timeout_secs: 10 }, exit_code::TIMEOUT),
            (
                CoreError::Api {
                    message: "refused".into(),
                    status: None,
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::Store {
                    message: "unreadable".into(),
                },
                exit_code::GENERAL,
            ),
            (CoreError::QueueClosed, exit_code::GENERAL),
        ];

        for (core, expected) in cases {
            assert_eq!(CliError::from(core).exit_code(), expected);
        }
    }

    #[test]
    fn queue_rejections_are_not_reported_as_failed_commands() {
        for core in [
            CoreError::QueueFull { depth: 1 },
            CoreError::QueueClosed,
            CoreError::WorkPanicked,
        ] {
            let err = CliError::from(core);
            assert!(matches!(err, CliError::Queue { .. }));
            assert!(!err.to_string().contains("Command failed"), "{err}");
            assert_eq!(err.exit_code(), exit_code::GENERAL);
        }
    }

    #[test]
    fn confirmation_refusal_is_a_usage_error() {
        let err = CliError::NonInteractiveRequiresYes {
            action: "open".into(),
        };
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
