//! Access grant status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an access grant.
///
/// Status alone does not decide whether a grant confers access: a grant
/// with `Active` status and a past `expires_at` is inactive. See
/// `AccessGrant::is_active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Grant confers access (subject to expiry).
    Active,

    /// Holder or creator cancelled the grant.
    Cancelled,

    /// Payment behind the grant was refunded.
    Refunded,

    /// Time-boxed grant passed its expiry and was swept.
    Expired,
}

impl GrantStatus {
    /// Stable string form used by persistence adapters.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Active => "active",
            GrantStatus::Cancelled => "cancelled",
            GrantStatus::Refunded => "refunded",
            GrantStatus::Expired => "expired",
        }
    }
}

impl StateMachine for GrantStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use GrantStatus::*;
        matches!(
            (self, target),
            (Active, Cancelled) | (Active, Refunded) | (Active, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use GrantStatus::*;
        match self {
            Active => vec![Cancelled, Refunded, Expired],
            Cancelled => vec![],
            Refunded => vec![],
            Expired => vec![],
        }
    }
}
