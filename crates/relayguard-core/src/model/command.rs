// ── Relay commands ──

use relayguard_api::RelayTurn;
use serde::Serialize;
use strum::{Display, EnumString};

/// What the operator asked the relay to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RelayAction {
    /// Energise the relay (unlock).
    #[default]
    Open,
    Close,
}

impl RelayAction {
    pub fn turn(self) -> RelayTurn {
        match self {
            Self::Open => RelayTurn::On,
            Self::Close => RelayTurn::Off,
        }
    }
}

/// Outcome of one command attempt, reported to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
