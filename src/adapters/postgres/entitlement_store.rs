//! PostgreSQL implementation of EntitlementStore and AccessPassRepository.
//!
//! The atomic completion contract maps onto one transaction:
//! a conditional stock increment, an upsert of the completed purchase,
//! and the grant insert. Unique indexes (one per completion key) turn a
//! lost race into `AlreadyGranted` instead of a second grant:
//!
//! - `access_grants.purchase_id` - paid flows, both writers share the
//!   purchase row found by external reference
//! - partial unique `(user_id, access_pass_id) WHERE status = 'active'` -
//!   free flows, which have no external reference

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::catalog::{AccessPass, PricingType};
use crate::domain::entitlement::{AccessGrant, GrantStatus, Purchasable, Purchase, PurchaseStatus};
use crate::domain::foundation::{
    AccessGrantId, AccessPassId, DomainError, ErrorCode, ExperienceId, PurchaseId, SpaceId,
    TeamId, Timestamp, UserId,
};
use crate::ports::{AccessPassRepository, CompletionOutcome, EntitlementStore};

/// PostgreSQL implementation of the EntitlementStore port.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    /// Creates a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// PostgreSQL implementation of the AccessPassRepository port.
pub struct PostgresAccessPassRepository {
    pool: PgPool,
}

impl PostgresAccessPassRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, e.to_string())
}

// ════════════════════════════════════════════════════════════════════════════
// Row types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    user_id: String,
    team_id: Uuid,
    access_pass_id: Uuid,
    amount_cents: i64,
    external_reference: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            user_id: UserId::new(row.user_id)
                .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?,
            team_id: TeamId::from_uuid(row.team_id),
            access_pass_id: AccessPassId::from_uuid(row.access_pass_id),
            amount_cents: row.amount_cents,
            external_reference: row.external_reference,
            status: parse_purchase_status(&row.status)?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    id: Uuid,
    user_id: String,
    team_id: Uuid,
    purchasable_type: String,
    purchasable_id: Uuid,
    access_pass_id: Uuid,
    purchase_id: Uuid,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrantRow> for AccessGrant {
    type Error = DomainError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        Ok(AccessGrant {
            id: AccessGrantId::from_uuid(row.id),
            user_id: UserId::new(row.user_id)
                .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?,
            team_id: TeamId::from_uuid(row.team_id),
            purchasable: parse_purchasable(&row.purchasable_type, row.purchasable_id)?,
            access_pass_id: AccessPassId::from_uuid(row.access_pass_id),
            purchase_id: PurchaseId::from_uuid(row.purchase_id),
            status: parse_grant_status(&row.status)?,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccessPassRow {
    id: Uuid,
    space_id: Uuid,
    team_id: Uuid,
    title: String,
    slug: String,
    pricing_type: String,
    price_cents: i64,
    recurring_price_id: Option<String>,
    stock_limit: Option<i32>,
    active_grants_count: i32,
    waitlist_enabled: bool,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccessPassRow> for AccessPass {
    type Error = DomainError;

    fn try_from(row: AccessPassRow) -> Result<Self, Self::Error> {
        Ok(AccessPass {
            id: AccessPassId::from_uuid(row.id),
            space_id: SpaceId::from_uuid(row.space_id),
            team_id: TeamId::from_uuid(row.team_id),
            title: row.title,
            slug: row.slug,
            pricing_type: parse_pricing_type(&row.pricing_type)?,
            price_cents: row.price_cents,
            recurring_price_id: row.recurring_price_id,
            stock_limit: row.stock_limit.map(|limit| limit as u32),
            active_grants_count: row.active_grants_count.max(0) as u32,
            waitlist_enabled: row.waitlist_enabled,
            published: row.published,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_purchase_status(s: &str) -> Result<PurchaseStatus, DomainError> {
    match s {
        "pending" => Ok(PurchaseStatus::Pending),
        "completed" => Ok(PurchaseStatus::Completed),
        "failed" => Ok(PurchaseStatus::Failed),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid purchase status: {}", s),
        )),
    }
}

fn parse_grant_status(s: &str) -> Result<GrantStatus, DomainError> {
    match s {
        "active" => Ok(GrantStatus::Active),
        "cancelled" => Ok(GrantStatus::Cancelled),
        "refunded" => Ok(GrantStatus::Refunded),
        "expired" => Ok(GrantStatus::Expired),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid grant status: {}", s),
        )),
    }
}

fn parse_pricing_type(s: &str) -> Result<PricingType, DomainError> {
    match s {
        "free" => Ok(PricingType::Free),
        "one_time" => Ok(PricingType::OneTime),
        "monthly" => Ok(PricingType::Monthly),
        "yearly" => Ok(PricingType::Yearly),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid pricing type: {}", s),
        )),
    }
}

fn parse_purchasable(kind: &str, id: Uuid) -> Result<Purchasable, DomainError> {
    match kind {
        "team" => Ok(Purchasable::Team(TeamId::from_uuid(id))),
        "space" => Ok(Purchasable::Space(SpaceId::from_uuid(id))),
        "experience" => Ok(Purchasable::Experience(ExperienceId::from_uuid(id))),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid purchasable type: {}", kind),
        )),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EntitlementStore
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO purchases \
             (id, user_id, team_id, access_pass_id, amount_cents, external_reference, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.user_id.as_str())
        .bind(purchase.team_id.as_uuid())
        .bind(purchase.access_pass_id.as_uuid())
        .bind(purchase.amount_cents)
        .bind(&purchase.external_reference)
        .bind(purchase.status.as_str())
        .bind(purchase.created_at.as_datetime())
        .bind(purchase.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE purchases \
             SET external_reference = $2, status = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(purchase.id.as_uuid())
        .bind(&purchase.external_reference)
        .bind(purchase.status.as_str())
        .bind(purchase.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                format!("Purchase {} not found", purchase.id),
            ));
        }
        Ok(())
    }

    async fn find_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> =
            sqlx::query_as("SELECT * FROM purchases WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Purchase::try_from).transpose()
    }

    async fn find_purchase_by_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> =
            sqlx::query_as("SELECT * FROM purchases WHERE external_reference = $1")
                .bind(external_reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Purchase::try_from).transpose()
    }

    async fn complete_purchase_with_grant(
        &self,
        purchase: &Purchase,
        grant: &AccessGrant,
    ) -> Result<CompletionOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 1. Conditional stock increment (compare-and-swap). Zero rows
        //    means the pass is sold out or gone.
        let stock = sqlx::query(
            "UPDATE access_passes \
             SET active_grants_count = active_grants_count + 1, updated_at = NOW() \
             WHERE id = $1 \
               AND (stock_limit IS NULL \
                    OR active_grants_count < stock_limit \
                    OR waitlist_enabled)",
        )
        .bind(purchase.access_pass_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if stock.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(CompletionOutcome::SoldOut);
        }

        // 2. Upsert the purchase as completed. Both writers share the
        //    same purchase row, so this is id-keyed.
        sqlx::query(
            "INSERT INTO purchases \
             (id, user_id, team_id, access_pass_id, amount_cents, external_reference, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE \
             SET external_reference = EXCLUDED.external_reference, \
                 status = EXCLUDED.status, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.user_id.as_str())
        .bind(purchase.team_id.as_uuid())
        .bind(purchase.access_pass_id.as_uuid())
        .bind(purchase.amount_cents)
        .bind(&purchase.external_reference)
        .bind(purchase.status.as_str())
        .bind(purchase.created_at.as_datetime())
        .bind(purchase.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // 3. Insert the grant. A unique violation (purchase already
        //    granted, or an active free grant exists for this user+pass)
        //    means the other writer won.
        let inserted = sqlx::query(
            "INSERT INTO access_grants \
             (id, user_id, team_id, purchasable_type, purchasable_id, access_pass_id, purchase_id, status, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(grant.id.as_uuid())
        .bind(grant.user_id.as_str())
        .bind(grant.team_id.as_uuid())
        .bind(grant.purchasable.kind())
        .bind(grant.purchasable.id_uuid())
        .bind(grant.access_pass_id.as_uuid())
        .bind(grant.purchase_id.as_uuid())
        .bind(grant.status.as_str())
        .bind(grant.expires_at.map(|t| *t.as_datetime()))
        .bind(grant.created_at.as_datetime())
        .bind(grant.updated_at.as_datetime())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await.map_err(db_err)?;
                Ok(CompletionOutcome::Granted)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await.map_err(db_err)?;
                Ok(CompletionOutcome::AlreadyGranted)
            }
            Err(e) => {
                tx.rollback().await.map_err(db_err)?;
                Err(db_err(e))
            }
        }
    }

    async fn find_grants_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AccessGrant>, DomainError> {
        let rows: Vec<GrantRow> =
            sqlx::query_as("SELECT * FROM access_grants WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter().map(AccessGrant::try_from).collect()
    }

    async fn find_grant(&self, id: &AccessGrantId) -> Result<Option<AccessGrant>, DomainError> {
        let row: Option<GrantRow> =
            sqlx::query_as("SELECT * FROM access_grants WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(AccessGrant::try_from).transpose()
    }

    async fn find_grant_by_purchase(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Option<AccessGrant>, DomainError> {
        let row: Option<GrantRow> =
            sqlx::query_as("SELECT * FROM access_grants WHERE purchase_id = $1")
                .bind(purchase_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(AccessGrant::try_from).transpose()
    }

    async fn update_grant(&self, grant: &AccessGrant) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let previous_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM access_grants WHERE id = $1 FOR UPDATE")
                .bind(grant.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

        let Some(previous_status) = previous_status else {
            tx.rollback().await.map_err(db_err)?;
            return Err(DomainError::new(
                ErrorCode::GrantNotFound,
                format!("Grant {} not found", grant.id),
            ));
        };

        sqlx::query(
            "UPDATE access_grants \
             SET status = $2, expires_at = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(grant.id.as_uuid())
        .bind(grant.status.as_str())
        .bind(grant.expires_at.map(|t| *t.as_datetime()))
        .bind(grant.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // Release the counter cache when the grant leaves the active state.
        if previous_status == "active" && grant.status != GrantStatus::Active {
            sqlx::query(
                "UPDATE access_passes \
                 SET active_grants_count = GREATEST(active_grants_count - 1, 0), updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(grant.access_pass_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn mark_expired_grants(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let expired_passes: Vec<Uuid> = sqlx::query(
            "UPDATE access_grants \
             SET status = 'expired', updated_at = NOW() \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < $1 \
             RETURNING access_pass_id",
        )
        .bind(now.as_datetime())
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|row| row.get("access_pass_id"))
        .collect();

        for pass_id in &expired_passes {
            sqlx::query(
                "UPDATE access_passes \
                 SET active_grants_count = GREATEST(active_grants_count - 1, 0), updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(pass_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(expired_passes.len() as u64)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AccessPassRepository
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl AccessPassRepository for PostgresAccessPassRepository {
    async fn save(&self, pass: &AccessPass) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO access_passes \
             (id, space_id, team_id, title, slug, pricing_type, price_cents, recurring_price_id, \
              stock_limit, active_grants_count, waitlist_enabled, published, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(pass.id.as_uuid())
        .bind(pass.space_id.as_uuid())
        .bind(pass.team_id.as_uuid())
        .bind(&pass.title)
        .bind(&pass.slug)
        .bind(pass.pricing_type.as_str())
        .bind(pass.price_cents)
        .bind(&pass.recurring_price_id)
        .bind(pass.stock_limit.map(|limit| limit as i32))
        .bind(pass.active_grants_count as i32)
        .bind(pass.waitlist_enabled)
        .bind(pass.published)
        .bind(pass.created_at.as_datetime())
        .bind(pass.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Slug '{}' already used in this space", pass.slug),
            ),
            _ => db_err(e),
        })?;
        Ok(())
    }

    async fn update(&self, pass: &AccessPass) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE access_passes \
             SET title = $2, slug = $3, pricing_type = $4, price_cents = $5, \
                 recurring_price_id = $6, stock_limit = $7, waitlist_enabled = $8, \
                 published = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(pass.id.as_uuid())
        .bind(&pass.title)
        .bind(&pass.slug)
        .bind(pass.pricing_type.as_str())
        .bind(pass.price_cents)
        .bind(&pass.recurring_price_id)
        .bind(pass.stock_limit.map(|limit| limit as i32))
        .bind(pass.waitlist_enabled)
        .bind(pass.published)
        .bind(pass.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::AccessPassNotFound,
                format!("Access pass {} not found", pass.id),
            ));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &AccessPassId) -> Result<Option<AccessPass>, DomainError> {
        let row: Option<AccessPassRow> =
            sqlx::query_as("SELECT * FROM access_passes WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(AccessPass::try_from).transpose()
    }

    async fn find_by_slug(
        &self,
        space_id: &SpaceId,
        slug: &str,
    ) -> Result<Option<AccessPass>, DomainError> {
        let row: Option<AccessPassRow> =
            sqlx::query_as("SELECT * FROM access_passes WHERE space_id = $1 AND slug = $2")
                .bind(space_id.as_uuid())
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(AccessPass::try_from).transpose()
    }
}
