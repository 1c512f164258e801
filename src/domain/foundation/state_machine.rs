//! State machine trait for status enums.
//!
//! Provides a consistent interface for validating and performing state transitions
//! across different entity lifecycle statuses (Purchase, AccessGrant, etc.).

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for PurchaseStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!(
///             (self, target),
///             (Pending, Completed) | (Pending, Failed)
///         )
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Pending => vec![Completed, Failed],
///             Completed | Failed => vec![],
///         }
///     }
/// }
///
/// // Usage:
/// let new_status = current_status.transition_to(PurchaseStatus::Completed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    ///
    /// This is the preferred way to change state, as it ensures
    /// the transition is valid according to the state machine rules.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test enum mirroring a payment attempt lifecycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Created,
        Authorized,
        Captured,
        Voided,
    }

    impl StateMachine for TestStatus {
        fn can_transition_to(&self, target: &Self) -> bool {
            use TestStatus::*;
            matches!(
                (self, target),
                (Created, Authorized) | (Authorized, Captured) | (Authorized, Voided)
            )
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use TestStatus::*;
            match self {
                Created => vec![Authorized],
                Authorized => vec![Captured, Voided],
                Captured => vec![],
                Voided => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        let status = TestStatus::Created;
        let result = status.transition_to(TestStatus::Authorized);
        assert_eq!(result, Ok(TestStatus::Authorized));
    }

    #[test]
    fn transition_to_fails_for_invalid_transition() {
        let status = TestStatus::Created;
        let result = status.transition_to(TestStatus::Captured);
        assert!(result.is_err());
    }

    #[test]
    fn is_terminal_returns_true_for_captured_and_voided() {
        assert!(TestStatus::Captured.is_terminal());
        assert!(TestStatus::Voided.is_terminal());
    }

    #[test]
    fn is_terminal_returns_false_for_non_terminal() {
        assert!(!TestStatus::Created.is_terminal());
        assert!(!TestStatus::Authorized.is_terminal());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            TestStatus::Created,
            TestStatus::Authorized,
            TestStatus::Captured,
            TestStatus::Voided,
        ] {
            for valid_target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&valid_target),
                    "can_transition_to should return true for {:?} -> {:?}",
                    status,
                    valid_target
                );
            }
        }
    }
}
