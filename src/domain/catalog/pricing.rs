//! Pricing types for access passes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an access pass is priced.
///
/// Closed set, validated at construction of the pass. Recurring types
/// require a stored gateway price id; `Free` requires `price_cents == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    /// No charge. Grant is perpetual.
    Free,

    /// Single charge. Grant is perpetual.
    OneTime,

    /// Recurring monthly subscription.
    Monthly,

    /// Recurring yearly subscription.
    Yearly,
}

impl PricingType {
    /// Returns true for subscription pricing.
    pub fn is_recurring(&self) -> bool {
        matches!(self, PricingType::Monthly | PricingType::Yearly)
    }

    /// Returns true if no payment is collected.
    pub fn is_free(&self) -> bool {
        matches!(self, PricingType::Free)
    }

    /// Nominal billing period length in days.
    ///
    /// Used only as a fallback when the gateway omits a period end;
    /// the gateway-reported period end is authoritative.
    pub fn nominal_period_days(&self) -> Option<i64> {
        match self {
            PricingType::Free | PricingType::OneTime => None,
            PricingType::Monthly => Some(30),
            PricingType::Yearly => Some(365),
        }
    }

    /// Stable string form used by persistence adapters.
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Free => "free",
            PricingType::OneTime => "one_time",
            PricingType::Monthly => "monthly",
            PricingType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for PricingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
