use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a review sits in its draft → remote lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SyncStatus {
    /// Being edited locally
    #[default]
    Draft,
    /// A submission attempt is in flight
    Pending,
    /// Acknowledged by the remote service
    Submitted,
    /// The last submission attempt failed (see `FailureKind`)
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Draft => "draft",
            SyncStatus::Pending => "pending",
            SyncStatus::Submitted => "submitted",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the last submission attempt failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Credential was refused; only retried once a new credential arrives
    Unauthorized,
    /// Network or server trouble; retried automatically
    Transient,
    /// The server refused the content; only the user can fix it
    Rejected { reason: String },
}

impl FailureKind {
    /// Whether any sweep may resend without the user doing anything
    pub fn is_auto_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }

    /// Whether the user's request to submit survives this failure
    pub fn keeps_submit_intent(&self) -> bool {
        !matches!(self, FailureKind::Rejected { .. })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unauthorized => f.write_str("unauthorized"),
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Rejected { reason } => write!(f, "rejected: {}", reason),
        }
    }
}
