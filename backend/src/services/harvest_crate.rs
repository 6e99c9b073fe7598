//! Crate store: weighed-crate capture under a harvest record
//!
//! Every mutation runs in a single transaction that takes a row lock on
//! the owning harvest record, rechecks the record status under that
//! lock, applies the crate change, and recomputes the record totals.
//! The lock serializes crate-number assignment and status transitions
//! per record; the unique index on (harvest_record_id, crate_number)
//! turns any residual collision into a conflict instead of a duplicate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::services::harvest_record::parse_status;
use crate::services::totals;
use shared::models::Grade;
use shared::policy::{self, Actor, Capability};
use shared::totals::{next_crate_numbers, split_weight};
use shared::validation::{validate_crate_count, validate_label_code, validate_weight_kg};

/// Harvest crate service
#[derive(Clone)]
pub struct HarvestCrateService {
    db: PgPool,
}

/// A single weighed container of harvested produce
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HarvestCrate {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub harvest_record_id: Uuid,
    pub storage_location_id: Option<Uuid>,
    pub grade: String,
    pub crate_number: i32,
    pub weight_kg: Decimal,
    pub weighed_by: Uuid,
    pub weighed_at: DateTime<Utc>,
    pub label_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a batch of crates to a record
///
/// The batch total weight is split evenly across `crate_count` crates
/// (default 1). `weighed_by` defaults to the requesting actor. Crate
/// numbers and the farm id are server-assigned and rejected if
/// supplied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCratesInput {
    pub grade: Grade,
    pub crate_count: Option<u32>,
    pub total_weight_kg: Decimal,
    pub weighed_by: Option<Uuid>,
    pub weighed_at: Option<DateTime<Utc>>,
    pub storage_location_id: Uuid,
    pub label_code: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a single crate; the crate number and owning
/// record can never change
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCrateInput {
    pub grade: Option<Grade>,
    pub weight_kg: Option<Decimal>,
    pub weighed_at: Option<DateTime<Utc>>,
    pub storage_location_id: Option<Uuid>,
    pub label_code: Option<String>,
    pub notes: Option<String>,
}

const CRATE_COLUMNS: &str = r#"
    id, farm_id, harvest_record_id, storage_location_id, grade, crate_number,
    weight_kg, weighed_by, weighed_at, label_code, notes, created_at, updated_at
"#;

impl HarvestCrateService {
    /// Create a new HarvestCrateService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List the crates under a record, ordered by crate number
    pub async fn list(&self, actor: &Actor, harvest_record_id: Uuid) -> AppResult<Vec<HarvestCrate>> {
        let record = self.fetch_record(harvest_record_id).await?;
        policy::authorize(actor, Capability::View, record.farm_id)?;

        let crates = sqlx::query_as::<_, HarvestCrate>(&format!(
            r#"
            SELECT {CRATE_COLUMNS}
            FROM harvest_crates
            WHERE harvest_record_id = $1
            ORDER BY crate_number
            "#
        ))
        .bind(harvest_record_id)
        .fetch_all(&self.db)
        .await?;

        Ok(crates)
    }

    /// Add a batch of crates to a record and recompute its totals
    pub async fn add_crates(
        &self,
        actor: &Actor,
        harvest_record_id: Uuid,
        input: AddCratesInput,
    ) -> AppResult<Vec<HarvestCrate>> {
        let crate_count = input.crate_count.unwrap_or(1);
        validate_crate_count(crate_count).map_err(|message| AppError::Validation {
            field: "crate_count".to_string(),
            message: message.to_string(),
        })?;
        validate_weight_kg(input.total_weight_kg).map_err(|message| AppError::Validation {
            field: "total_weight_kg".to_string(),
            message: message.to_string(),
        })?;
        if let Some(label_code) = &input.label_code {
            validate_label_code(label_code).map_err(|message| AppError::Validation {
                field: "label_code".to_string(),
                message: message.to_string(),
            })?;
        }
        self.ensure_storage_location(input.storage_location_id)
            .await?;
        if let Some(weighed_by) = input.weighed_by {
            self.ensure_user(weighed_by).await?;
        }

        let weight_per_crate = split_weight(input.total_weight_kg, crate_count);
        let weighed_by = input.weighed_by.unwrap_or(actor.user_id);
        let weighed_at = input.weighed_at.unwrap_or_else(Utc::now);

        let mut tx = self.db.begin().await?;

        // Gate against the status as it stands under the lock, so a
        // submission landing after the handler's initial read cannot be
        // bypassed
        let record = lock_record_head(&mut tx, harvest_record_id).await?;
        let status = parse_status(&record.status)?;
        policy::authorize_mutation(actor, Capability::Create, record.farm_id, status)?;

        // Reserve the number range from the record's counter. Numbers
        // come from the counter rather than MAX(crate_number) so
        // deleting the highest-numbered crate never causes reuse.
        let last: i32 = sqlx::query_scalar(
            r#"
            UPDATE harvest_records
            SET last_crate_number = last_crate_number + $1
            WHERE id = $2
            RETURNING last_crate_number
            "#,
        )
        .bind(crate_count as i32)
        .bind(harvest_record_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(crate_count as usize);
        for crate_number in next_crate_numbers(last - crate_count as i32, crate_count) {
            let krate = sqlx::query_as::<_, HarvestCrate>(&format!(
                r#"
                INSERT INTO harvest_crates (farm_id, harvest_record_id, storage_location_id,
                                            grade, crate_number, weight_kg, weighed_by,
                                            weighed_at, label_code, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING {CRATE_COLUMNS}
                "#
            ))
            .bind(record.farm_id)
            .bind(harvest_record_id)
            .bind(input.storage_location_id)
            .bind(input.grade.as_str())
            .bind(crate_number)
            .bind(weight_per_crate)
            .bind(weighed_by)
            .bind(weighed_at)
            .bind(&input.label_code)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Crate number already assigned; retry the request".to_string())
                } else {
                    e.into()
                }
            })?;
            created.push(krate);
        }

        totals::recompute(&mut tx, harvest_record_id).await?;
        tx.commit().await?;

        Ok(created)
    }

    /// Update a crate and recompute the owning record's totals
    pub async fn update_crate(
        &self,
        actor: &Actor,
        crate_id: Uuid,
        input: UpdateCrateInput,
    ) -> AppResult<HarvestCrate> {
        if let Some(weight_kg) = input.weight_kg {
            validate_weight_kg(weight_kg).map_err(|message| AppError::Validation {
                field: "weight_kg".to_string(),
                message: message.to_string(),
            })?;
        }
        if let Some(label_code) = &input.label_code {
            validate_label_code(label_code).map_err(|message| AppError::Validation {
                field: "label_code".to_string(),
                message: message.to_string(),
            })?;
        }
        if let Some(storage_location_id) = input.storage_location_id {
            self.ensure_storage_location(storage_location_id).await?;
        }

        let harvest_record_id = self.fetch_crate_record_id(crate_id).await?;

        let mut tx = self.db.begin().await?;
        let record = lock_record_head(&mut tx, harvest_record_id).await?;
        let status = parse_status(&record.status)?;
        policy::authorize_mutation(actor, Capability::Update, record.farm_id, status)?;

        // Re-read the crate under the lock so the coalesced values
        // cannot be stale
        let existing = sqlx::query_as::<_, HarvestCrate>(&format!(
            "SELECT {CRATE_COLUMNS} FROM harvest_crates WHERE id = $1"
        ))
        .bind(crate_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Crate".to_string()))?;

        let grade = input
            .grade
            .map(|g| g.as_str().to_string())
            .unwrap_or_else(|| existing.grade.clone());
        let weight_kg = input.weight_kg.unwrap_or(existing.weight_kg);
        let weighed_at = input.weighed_at.unwrap_or(existing.weighed_at);
        let storage_location_id = input.storage_location_id.or(existing.storage_location_id);
        let label_code = input.label_code.or_else(|| existing.label_code.clone());
        let notes = input.notes.or_else(|| existing.notes.clone());

        let updated = sqlx::query_as::<_, HarvestCrate>(&format!(
            r#"
            UPDATE harvest_crates
            SET grade = $1, weight_kg = $2, weighed_at = $3, storage_location_id = $4,
                label_code = $5, notes = $6, updated_at = now()
            WHERE id = $7
            RETURNING {CRATE_COLUMNS}
            "#
        ))
        .bind(&grade)
        .bind(weight_kg)
        .bind(weighed_at)
        .bind(storage_location_id)
        .bind(&label_code)
        .bind(&notes)
        .bind(crate_id)
        .fetch_one(&mut *tx)
        .await?;

        totals::recompute(&mut tx, harvest_record_id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a crate and recompute the owning record's totals
    pub async fn delete_crate(&self, actor: &Actor, crate_id: Uuid) -> AppResult<()> {
        let harvest_record_id = self.fetch_crate_record_id(crate_id).await?;

        let mut tx = self.db.begin().await?;
        let record = lock_record_head(&mut tx, harvest_record_id).await?;
        let status = parse_status(&record.status)?;
        policy::authorize_mutation(actor, Capability::Delete, record.farm_id, status)?;

        sqlx::query("DELETE FROM harvest_crates WHERE id = $1")
            .bind(crate_id)
            .execute(&mut *tx)
            .await?;

        totals::recompute(&mut tx, harvest_record_id).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn fetch_record(&self, harvest_record_id: Uuid) -> AppResult<RecordHead> {
        sqlx::query_as::<_, RecordHead>(
            "SELECT farm_id, status FROM harvest_records WHERE id = $1",
        )
        .bind(harvest_record_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Harvest record".to_string()))
    }

    async fn fetch_crate_record_id(&self, crate_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar("SELECT harvest_record_id FROM harvest_crates WHERE id = $1")
            .bind(crate_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Crate".to_string()))
    }

    async fn ensure_storage_location(&self, storage_location_id: Uuid) -> AppResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inventory_locations WHERE id = $1)")
                .bind(storage_location_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::Validation {
                field: "storage_location_id".to_string(),
                message: "Storage location does not exist".to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_user(&self, user_id: Uuid) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::Validation {
                field: "weighed_by".to_string(),
                message: "User does not exist".to_string(),
            });
        }
        Ok(())
    }
}

/// Minimal record head used for gating crate operations
#[derive(Debug, sqlx::FromRow)]
struct RecordHead {
    farm_id: Uuid,
    status: String,
}

/// Take a row lock on the harvest record for the duration of the
/// transaction and return its head as it stands under that lock
async fn lock_record_head(
    tx: &mut Transaction<'_, Postgres>,
    harvest_record_id: Uuid,
) -> AppResult<RecordHead> {
    sqlx::query_as::<_, RecordHead>(
        "SELECT farm_id, status FROM harvest_records WHERE id = $1 FOR UPDATE",
    )
    .bind(harvest_record_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Harvest record".to_string()))
}
