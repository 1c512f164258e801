//! AccessPass aggregate entity.
//!
//! An access pass is the sellable unit of a space: a price, a recurrence,
//! and an optional stock limit. Purchasing a pass produces an AccessGrant
//! scoped to the pass's space.
//!
//! # Design Decisions
//!
//! - **Money in cents**: All monetary values stored as i64 cents (not floats)
//! - **Invalid prices unrepresentable**: `price_cents == 0 ⇔ Free` is checked
//!   at construction, not at mutation
//! - **Counter cache**: `active_grants_count` is maintained by the entitlement
//!   store inside the same transaction that creates or releases grants

use crate::domain::foundation::{AccessPassId, SpaceId, TeamId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

use super::PricingType;

/// AccessPass aggregate - a space's sellable catalog entry.
///
/// # Invariants
///
/// - `price_cents >= 0`, and `price_cents == 0` iff `pricing_type == Free`
/// - `slug` is lowercase kebab-case, unique per space (uniqueness enforced
///   by the store)
/// - Recurring passes carry a gateway `recurring_price_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPass {
    /// Unique identifier for this pass.
    pub id: AccessPassId,

    /// Space this pass sells access to.
    pub space_id: SpaceId,

    /// Team that owns the space.
    pub team_id: TeamId,

    /// Display title.
    pub title: String,

    /// URL slug, unique within the space.
    pub slug: String,

    /// How this pass is priced.
    pub pricing_type: PricingType,

    /// Price in cents. Zero for free passes.
    pub price_cents: i64,

    /// Gateway price id for recurring passes.
    pub recurring_price_id: Option<String>,

    /// Maximum concurrent active grants. None = unlimited.
    pub stock_limit: Option<u32>,

    /// Count of currently active grants (counter cache).
    pub active_grants_count: u32,

    /// Whether purchases past the stock limit join a waitlist.
    pub waitlist_enabled: bool,

    /// Whether the pass is visible and purchasable.
    pub published: bool,

    /// When the pass was created.
    pub created_at: Timestamp,

    /// When the pass was last updated.
    pub updated_at: Timestamp,
}

impl AccessPass {
    /// Create a new access pass, validating pricing invariants.
    ///
    /// # Errors
    ///
    /// - `price_cents` negative, or inconsistent with `pricing_type`
    /// - `slug` empty or not lowercase kebab-case
    /// - recurring pricing without a `recurring_price_id`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AccessPassId,
        space_id: SpaceId,
        team_id: TeamId,
        title: impl Into<String>,
        slug: impl Into<String>,
        pricing_type: PricingType,
        price_cents: i64,
        recurring_price_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let slug = slug.into();

        if title.is_empty() {
            return Err(ValidationError::empty_field("title"));
        }
        validate_slug(&slug)?;

        if price_cents < 0 {
            return Err(ValidationError::out_of_range(
                "price_cents",
                0,
                i64::MAX,
                price_cents,
            ));
        }
        if pricing_type.is_free() && price_cents != 0 {
            return Err(ValidationError::invalid_format(
                "price_cents",
                "free passes must have a zero price",
            ));
        }
        if !pricing_type.is_free() && price_cents == 0 {
            return Err(ValidationError::invalid_format(
                "price_cents",
                "paid passes must have a non-zero price",
            ));
        }
        if pricing_type.is_recurring() && recurring_price_id.is_none() {
            return Err(ValidationError::empty_field("recurring_price_id"));
        }

        let now = Timestamp::now();
        Ok(Self {
            id,
            space_id,
            team_id,
            title,
            slug,
            pricing_type,
            price_cents,
            recurring_price_id,
            stock_limit: None,
            active_grants_count: 0,
            waitlist_enabled: false,
            published: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Set a stock limit on this pass.
    pub fn with_stock_limit(mut self, limit: u32) -> Self {
        self.stock_limit = Some(limit);
        self
    }

    /// Enable the waitlist for this pass.
    pub fn with_waitlist(mut self) -> Self {
        self.waitlist_enabled = true;
        self
    }

    /// Publish this pass.
    pub fn publish(&mut self) {
        self.published = true;
        self.updated_at = Timestamp::now();
    }

    /// Whether this pass can currently be purchased.
    ///
    /// Unlimited passes are always available. Limited passes are available
    /// while stock remains, or when the waitlist is enabled.
    pub fn available(&self) -> bool {
        match self.stock_limit {
            None => true,
            Some(limit) => self.active_grants_count < limit || self.waitlist_enabled,
        }
    }

    /// Remaining stock, if limited.
    pub fn remaining_stock(&self) -> Option<u32> {
        self.stock_limit
            .map(|limit| limit.saturating_sub(self.active_grants_count))
    }
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::empty_field("slug"));
    }
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid || slug.starts_with('-') || slug.ends_with('-') {
        return Err(ValidationError::invalid_format(
            "slug",
            "must be lowercase kebab-case",
        ));
    }
    Ok(())
}
