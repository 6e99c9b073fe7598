//! Harvest record lifecycle service
//!
//! Owns the DRAFT -> SUBMITTED -> APPROVED workflow and the business
//! rules gating each transition. Transitions take the record row lock
//! and recheck the stored status (and the crate count, for submission)
//! under it, so they serialize against crate mutations on the same
//! record and a lost race fails cleanly.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::services::harvest_crate::HarvestCrate;
use shared::models::{CycleStatus, HarvestStatus};
use shared::policy::{self, Actor, Capability};
use shared::validation::{harvest_date_allowed, validate_submit};

/// Harvest record service
#[derive(Clone)]
pub struct HarvestRecordService {
    db: PgPool,
}

/// A daily harvest record for a production cycle
///
/// The weight and count columns are derived from the crate set and are
/// never written by callers; see the totals service.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HarvestRecord {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub site_id: Uuid,
    pub greenhouse_id: Uuid,
    pub production_cycle_id: Uuid,
    pub harvest_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub total_weight_kg_a: Decimal,
    pub total_weight_kg_b: Decimal,
    pub total_weight_kg_c: Decimal,
    pub total_weight_kg_total: Decimal,
    pub crate_count_a: i32,
    pub crate_count_b: i32,
    pub crate_count_c: i32,
    pub crate_count_total: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record with its crates, for detail views
#[derive(Debug, Clone, Serialize)]
pub struct HarvestRecordWithCrates {
    #[serde(flatten)]
    pub record: HarvestRecord,
    pub crates: Vec<HarvestCrate>,
}

/// Input for creating a harvest record
///
/// farm/site/greenhouse ids are derived from the production cycle and
/// rejected if supplied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateHarvestRecordInput {
    pub production_cycle_id: Uuid,
    pub harvest_date: NaiveDate,
    pub notes: Option<String>,
}

/// Input for updating a harvest record; only the date and notes are
/// mutable, identity fields are rejected
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateHarvestRecordInput {
    pub harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Filters for listing harvest records
#[derive(Debug, Default, Deserialize)]
pub struct ListHarvestRecordsQuery {
    pub farm_id: Option<Uuid>,
    pub production_cycle_id: Option<Uuid>,
    pub greenhouse_id: Option<Uuid>,
    pub status: Option<HarvestStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Production cycle fields the record derives from
#[derive(Debug, sqlx::FromRow)]
struct CycleRow {
    farm_id: Uuid,
    site_id: Uuid,
    greenhouse_id: Uuid,
    cycle_status: String,
    planting_date: Option<NaiveDate>,
}

/// Parse a stored status value into the state enum
pub(crate) fn parse_status(status: &str) -> AppResult<HarvestStatus> {
    HarvestStatus::from_str(status)
        .ok_or_else(|| AppError::Internal(format!("Unknown harvest record status '{}'", status)))
}

const RECORD_COLUMNS: &str = r#"
    id, farm_id, site_id, greenhouse_id, production_cycle_id, harvest_date,
    status, notes, recorded_by, submitted_at, approved_by, approved_at,
    total_weight_kg_a, total_weight_kg_b, total_weight_kg_c, total_weight_kg_total,
    crate_count_a, crate_count_b, crate_count_c, crate_count_total,
    created_at, updated_at
"#;

impl HarvestRecordService {
    /// Create a new HarvestRecordService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Fetch a record or fail with NotFound
    async fn fetch(&self, record_id: Uuid) -> AppResult<HarvestRecord> {
        sqlx::query_as::<_, HarvestRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM harvest_records WHERE id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Harvest record".to_string()))
    }

    async fn fetch_cycle(&self, production_cycle_id: Uuid) -> AppResult<CycleRow> {
        sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT farm_id, site_id, greenhouse_id, cycle_status, planting_date
            FROM production_cycles
            WHERE id = $1
            "#,
        )
        .bind(production_cycle_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production cycle".to_string()))
    }

    /// List harvest records visible to the actor, newest harvest first
    pub async fn list(
        &self,
        actor: &Actor,
        query: ListHarvestRecordsQuery,
    ) -> AppResult<Vec<HarvestRecord>> {
        policy::authorize_any(actor, Capability::View)?;

        // Non-admins only see their own farms; an explicit farm filter
        // is intersected with memberships, not silently ignored
        let farm_filter = policy::visible_farms(actor, query.farm_id)?;
        if matches!(&farm_filter, Some(farms) if farms.is_empty()) {
            return Ok(Vec::new());
        }

        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);

        let records = sqlx::query_as::<_, HarvestRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM harvest_records
            WHERE ($1::uuid[] IS NULL OR farm_id = ANY($1))
              AND ($2::uuid IS NULL OR production_cycle_id = $2)
              AND ($3::uuid IS NULL OR greenhouse_id = $3)
              AND ($4::varchar IS NULL OR status = $4)
              AND ($5::date IS NULL OR harvest_date >= $5)
              AND ($6::date IS NULL OR harvest_date <= $6)
            ORDER BY harvest_date DESC, created_at DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(farm_filter)
        .bind(query.production_cycle_id)
        .bind(query.greenhouse_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.from)
        .bind(query.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    /// Get a record with its crates
    pub async fn get(&self, actor: &Actor, record_id: Uuid) -> AppResult<HarvestRecordWithCrates> {
        let record = self.fetch(record_id).await?;
        policy::authorize(actor, Capability::View, record.farm_id)?;

        let crates = sqlx::query_as::<_, HarvestCrate>(
            r#"
            SELECT id, farm_id, harvest_record_id, storage_location_id, grade, crate_number,
                   weight_kg, weighed_by, weighed_at, label_code, notes, created_at, updated_at
            FROM harvest_crates
            WHERE harvest_record_id = $1
            ORDER BY crate_number
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.db)
        .await?;

        Ok(HarvestRecordWithCrates { record, crates })
    }

    /// Create a harvest record in DRAFT for a production cycle
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateHarvestRecordInput,
    ) -> AppResult<HarvestRecord> {
        let cycle = self.fetch_cycle(input.production_cycle_id).await?;
        policy::authorize(actor, Capability::Create, cycle.farm_id)?;

        let cycle_status = CycleStatus::from_str(&cycle.cycle_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown cycle status '{}'", cycle.cycle_status))
        })?;
        if !cycle_status.allows_harvest() {
            return Err(AppError::Validation {
                field: "production_cycle_id".to_string(),
                message: "Production cycle must be ACTIVE or HARVESTING to record harvest"
                    .to_string(),
            });
        }

        if let Some(planting_date) = cycle.planting_date {
            if !harvest_date_allowed(planting_date, input.harvest_date) {
                return Err(AppError::Validation {
                    field: "harvest_date".to_string(),
                    message: format!(
                        "Harvest date must be at least 40 days after the planting date ({})",
                        planting_date
                    ),
                });
            }
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM harvest_records WHERE production_cycle_id = $1 AND harvest_date = $2)",
        )
        .bind(input.production_cycle_id)
        .bind(input.harvest_date)
        .fetch_one(&self.db)
        .await?;
        if exists {
            return Err(AppError::Conflict(
                "A harvest record already exists for this production cycle on this date"
                    .to_string(),
            ));
        }

        // Identity fields are derived from the cycle, never taken from
        // the client
        let record_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO harvest_records (farm_id, site_id, greenhouse_id, production_cycle_id,
                                         harvest_date, status, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5, 'DRAFT', $6, $7)
            RETURNING id
            "#,
        )
        .bind(cycle.farm_id)
        .bind(cycle.site_id)
        .bind(cycle.greenhouse_id)
        .bind(input.production_cycle_id)
        .bind(input.harvest_date)
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            // The unique index backstops the existence check above
            if is_unique_violation(&e) {
                AppError::Conflict(
                    "A harvest record already exists for this production cycle on this date"
                        .to_string(),
                )
            } else {
                e.into()
            }
        })?;

        self.fetch(record_id).await
    }

    /// Update a record's harvest date and notes
    pub async fn update(
        &self,
        actor: &Actor,
        record_id: Uuid,
        input: UpdateHarvestRecordInput,
    ) -> AppResult<HarvestRecord> {
        let record = self.fetch(record_id).await?;
        let status = parse_status(&record.status)?;
        policy::authorize_mutation(actor, Capability::Update, record.farm_id, status)?;

        let harvest_date = input.harvest_date.unwrap_or(record.harvest_date);
        let notes = input.notes.or_else(|| record.notes.clone());

        if harvest_date != record.harvest_date {
            let planting_date: Option<NaiveDate> =
                sqlx::query_scalar("SELECT planting_date FROM production_cycles WHERE id = $1")
                    .bind(record.production_cycle_id)
                    .fetch_optional(&self.db)
                    .await?
                    .flatten();
            if let Some(planting_date) = planting_date {
                if !harvest_date_allowed(planting_date, harvest_date) {
                    return Err(AppError::Validation {
                        field: "harvest_date".to_string(),
                        message: format!(
                            "Harvest date must be at least 40 days after the planting date ({})",
                            planting_date
                        ),
                    });
                }
            }
        }

        sqlx::query(
            "UPDATE harvest_records SET harvest_date = $1, notes = $2, updated_at = now() WHERE id = $3",
        )
        .bind(harvest_date)
        .bind(&notes)
        .bind(record_id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(
                    "A harvest record already exists for this production cycle on this date"
                        .to_string(),
                )
            } else {
                e.into()
            }
        })?;

        self.fetch(record_id).await
    }

    /// Delete a DRAFT record; crates cascade at the database level
    pub async fn delete(&self, actor: &Actor, record_id: Uuid) -> AppResult<()> {
        let record = self.fetch(record_id).await?;
        policy::authorize(actor, Capability::Delete, record.farm_id)?;

        // DRAFT-only, with no override escape: submitted and approved
        // records are the source of truth for downstream consumers
        let status = parse_status(&record.status)?;
        if !status.is_mutable() {
            return Err(AppError::InvalidStateTransition(
                "Only DRAFT harvest records can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM harvest_records WHERE id = $1")
            .bind(record_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Submit a DRAFT record for approval
    ///
    /// Status and crate count are rechecked under the record row lock,
    /// so a crate mutation committing in between cannot submit an
    /// empty record.
    pub async fn submit(&self, actor: &Actor, record_id: Uuid) -> AppResult<HarvestRecord> {
        let record = self.fetch(record_id).await?;
        policy::authorize(actor, Capability::Submit, record.farm_id)?;

        let mut tx = self.db.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM harvest_records WHERE id = $1 FOR UPDATE")
                .bind(record_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Harvest record".to_string()))?;
        let status = parse_status(&status)?;

        let crate_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM harvest_crates WHERE harvest_record_id = $1")
                .bind(record_id)
                .fetch_one(&mut *tx)
                .await?;

        validate_submit(status, crate_count)
            .map_err(|message| AppError::InvalidStateTransition(message.to_string()))?;

        sqlx::query(
            r#"
            UPDATE harvest_records
            SET status = 'SUBMITTED', submitted_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch(record_id).await
    }

    /// Approve a SUBMITTED record; status is rechecked under the row
    /// lock
    pub async fn approve(&self, actor: &Actor, record_id: Uuid) -> AppResult<HarvestRecord> {
        let record = self.fetch(record_id).await?;
        policy::authorize(actor, Capability::Approve, record.farm_id)?;

        let mut tx = self.db.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM harvest_records WHERE id = $1 FOR UPDATE")
                .bind(record_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Harvest record".to_string()))?;
        let status = parse_status(&status)?;
        if !status.can_transition_to(HarvestStatus::Approved) {
            return Err(AppError::InvalidStateTransition(
                "Only SUBMITTED harvest records can be approved".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE harvest_records
            SET status = 'APPROVED', approved_by = $1, approved_at = now(), updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(actor.user_id)
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch(record_id).await
    }
}
