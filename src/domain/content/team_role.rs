//! Team membership roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a user holds on a team.
///
/// Privileged roles (owner, admin, moderator) bypass entitlement checks
/// entirely: staff access to their own content must not depend on billing
/// state. `Buyer` is the role granted automatically on purchase and confers
/// no structural access by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Owner,
    Admin,
    Moderator,
    Buyer,
}

impl TeamRole {
    /// Returns true if this role grants access to all team content
    /// regardless of entitlement state.
    pub fn is_privileged(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin | TeamRole::Moderator)
    }

    /// Stable string form used by persistence adapters.
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Moderator => "moderator",
            TeamRole::Buyer => "buyer",
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles_are_privileged() {
        assert!(TeamRole::Owner.is_privileged());
        assert!(TeamRole::Admin.is_privileged());
        assert!(TeamRole::Moderator.is_privileged());
    }

    #[test]
    fn buyer_is_not_privileged() {
        assert!(!TeamRole::Buyer.is_privileged());
    }

    #[test]
    fn role_round_trips_through_snake_case() {
        let json = serde_json::to_string(&TeamRole::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
    }
}
