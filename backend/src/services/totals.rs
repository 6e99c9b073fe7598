//! Aggregation engine for harvest record totals
//!
//! Recomputes a record's per-grade weight and crate-count columns from
//! its crate set. Always runs inside the transaction of the crate
//! mutation that triggered it, so readers see either the pre-mutation
//! or the fully recomputed totals, never an intermediate state.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::Grade;
use shared::totals::GradeTotals;

/// Recompute and persist the grade totals for a harvest record.
///
/// Idempotent: safe to call redundantly, the result only depends on the
/// crate rows visible to the transaction.
pub async fn recompute(
    tx: &mut Transaction<'_, Postgres>,
    harvest_record_id: Uuid,
) -> AppResult<GradeTotals> {
    let rows: Vec<(String, Decimal)> =
        sqlx::query_as("SELECT grade, weight_kg FROM harvest_crates WHERE harvest_record_id = $1")
            .bind(harvest_record_id)
            .fetch_all(&mut **tx)
            .await?;

    let mut crates = Vec::with_capacity(rows.len());
    for (grade, weight_kg) in rows {
        let grade = Grade::from_str(&grade)
            .ok_or_else(|| AppError::Internal(format!("Unknown crate grade '{}'", grade)))?;
        crates.push((grade, weight_kg));
    }

    let totals = GradeTotals::from_crates(crates);

    sqlx::query(
        r#"
        UPDATE harvest_records
        SET total_weight_kg_a = $1, total_weight_kg_b = $2, total_weight_kg_c = $3,
            total_weight_kg_total = $4,
            crate_count_a = $5, crate_count_b = $6, crate_count_c = $7,
            crate_count_total = $8,
            updated_at = now()
        WHERE id = $9
        "#,
    )
    .bind(totals.weight_kg_a)
    .bind(totals.weight_kg_b)
    .bind(totals.weight_kg_c)
    .bind(totals.weight_kg_total)
    .bind(totals.count_a)
    .bind(totals.count_b)
    .bind(totals.count_c)
    .bind(totals.count_total)
    .bind(harvest_record_id)
    .execute(&mut **tx)
    .await?;

    Ok(totals)
}
