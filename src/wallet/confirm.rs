//! ConfirmationTracker - bounded poll turning an async broadcast ack into a
//! synchronous-looking outcome.
//!
//! The status source is pull-only, so this is a fixed-interval poll, not a
//! push wait. The deadline abandons the local wait only; the transaction may
//! still land, which is why a timeout reports as ambiguous rather than as a
//! hard failure.

use crate::wallet::backend::{InclusionStatus, StatusSource};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Terminal result of one tracked submission. Produced exactly once per
/// call; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Success,
    /// Accepted but not yet minable (e.g. double-spend risk window).
    Pending(String),
    Failed(String),
    /// Deadline elapsed with no status record. The transaction's fate is
    /// undetermined.
    TimedOut,
}

impl ConfirmationOutcome {
    /// Wire shape for spend-style responses.
    pub fn to_response(&self) -> Value {
        match self {
            ConfirmationOutcome::Success => json!({ "status": "SUCCESS" }),
            ConfirmationOutcome::Pending(reason) => json!({ "status": "PENDING", "reason": reason }),
            ConfirmationOutcome::Failed(reason) => json!({ "status": "FAILED", "reason": reason }),
            ConfirmationOutcome::TimedOut => json!({
                "status": "FAILED",
                "reason": "Timed out. Transaction may or may not have been sent.",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationTracker {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(100), deadline: Duration::from_secs(30) }
    }
}

impl ConfirmationTracker {
    pub fn new(poll_interval: Duration, deadline: Duration) -> Self {
        Self { poll_interval, deadline }
    }

    /// Poll until a terminal status or the deadline. Never retries the
    /// submission itself.
    pub async fn track<S: StatusSource + ?Sized>(&self, source: &S, tx_id: &str) -> ConfirmationOutcome {
        let deadline = Instant::now() + self.deadline;
        loop {
            let statuses = match source.transaction_status(tx_id).await {
                Ok(statuses) => statuses,
                Err(e) => return ConfirmationOutcome::Failed(e.to_string()),
            };

            if let Some(first) = statuses.first() {
                let reason = first.reason.clone().unwrap_or_default();
                return match first.status {
                    InclusionStatus::Success => ConfirmationOutcome::Success,
                    InclusionStatus::Pending => ConfirmationOutcome::Pending(reason),
                    InclusionStatus::Failed => ConfirmationOutcome::Failed(reason),
                };
            }

            if Instant::now() >= deadline {
                tracing::warn!(tx_id, "confirmation wait timed out");
                return ConfirmationOutcome::TimedOut;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
