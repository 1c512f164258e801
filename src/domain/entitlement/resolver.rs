//! Pure access resolution over the ownership chain.
//!
//! Answers "may this user view this resource" from data already in hand:
//! the user's role on the owning team, the resource's resolved ancestry,
//! and the user's grants. No side effects, no external calls - the
//! application layer fetches the inputs and content-serving code trusts
//! the boolean before minting any session token.

use crate::domain::content::{OwnershipChain, TeamRole};

use super::AccessGrant;

/// Resolve whether a user may access the resource described by `chain`.
///
/// Resolution order:
///
/// 1. Structural bypass: a privileged role on the owning team grants
///    access immediately. Staff access to their own content must not
///    depend on billing state, so this short-circuits before any grant
///    is examined.
/// 2. Otherwise the chain is walked leaf-upward (stream, experience,
///    space, team); the first active grant referencing exactly one of
///    those nodes wins. The walk terminates at the team, so it cannot
///    cycle.
pub fn resolve_access(
    role: Option<TeamRole>,
    chain: &OwnershipChain,
    grants: &[AccessGrant],
) -> bool {
    if role.is_some_and(|r| r.is_privileged()) {
        return true;
    }

    grants.iter().any(|grant| grant.grants_access_to(chain))
}
