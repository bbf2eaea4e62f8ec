// ── Staleness evaluation ──

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::{Liveness, StatusRecord};

/// Turns a (possibly missing, possibly old) record into effective liveness.
///
/// Pure: the same `(record, now)` always yields the same verdict. Used both
/// for locally polled records and for records read from a shared store, so a
/// crashed monitor cannot leave a device looking online forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessEvaluator {
    threshold: Duration,
}

impl Default for StalenessEvaluator {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl StalenessEvaluator {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn evaluate(&self, record: Option<&StatusRecord>, now: DateTime<Utc>) -> Liveness {
        let Some(record) = record else {
            return Liveness::offline("no signal yet");
        };

        // A record from the future (clock skew) counts as fresh.
        let age = (now - record.observed_at()).to_std().unwrap_or(Duration::ZERO);
        if age > self.threshold {
            return Liveness::offline(format!("monitor stalled ({} min)", age.as_secs() / 60));
        }

        if record.is_online() {
            Liveness::online()
        } else {
            Liveness {
                online: false,
                reason: record.error(),
            }
        }
    }
}
