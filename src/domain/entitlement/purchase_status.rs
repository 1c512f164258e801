//! Purchase status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Status of a payment attempt.
///
/// A purchase is born `Pending` (or directly `Completed` for free passes)
/// and settles exactly once. A pending purchase may be settled either by
/// the synchronous orchestrator or later by the webhook reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Payment attempt in flight or awaiting asynchronous confirmation.
    Pending,

    /// Payment settled successfully. Exactly one grant exists for it.
    Completed,

    /// Payment definitively failed. No grant exists.
    Failed,
}

impl PurchaseStatus {
    /// Stable string form used by persistence adapters.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

impl StateMachine for PurchaseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PurchaseStatus::*;
        matches!((self, target), (Pending, Completed) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PurchaseStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Completed => vec![],
            Failed => vec![],
        }
    }
}
