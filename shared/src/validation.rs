//! Validation rules for harvest inputs

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::HarvestStatus;

/// Largest batch one add-crates call may create
pub const MAX_CRATE_BATCH: u32 = 1000;

/// Longest accepted crate label code
pub const MAX_LABEL_CODE_LEN: usize = 255;

/// Minimum gap between planting and harvest dates
pub const MIN_DAYS_PLANTING_TO_HARVEST: i64 = 40;

/// Validate a crate weight (per crate or batch total): strictly positive
pub fn validate_weight_kg(weight_kg: Decimal) -> Result<(), &'static str> {
    if weight_kg <= Decimal::ZERO {
        return Err("Weight must be greater than 0");
    }
    Ok(())
}

/// Validate a batch crate count
pub fn validate_crate_count(crate_count: u32) -> Result<(), &'static str> {
    if crate_count < 1 {
        return Err("Crate count must be at least 1");
    }
    if crate_count > MAX_CRATE_BATCH {
        return Err("Crate count exceeds the batch limit");
    }
    Ok(())
}

/// Validate an optional crate label code
pub fn validate_label_code(label_code: &str) -> Result<(), &'static str> {
    if label_code.len() > MAX_LABEL_CODE_LEN {
        return Err("Label code is too long");
    }
    Ok(())
}

/// Harvest must be recorded at least [`MIN_DAYS_PLANTING_TO_HARVEST`]
/// days after the cycle's planting date
pub fn harvest_date_allowed(planting_date: NaiveDate, harvest_date: NaiveDate) -> bool {
    (harvest_date - planting_date).num_days() >= MIN_DAYS_PLANTING_TO_HARVEST
}

/// Precondition for submitting a record: it must be in DRAFT and carry
/// at least one crate. The backend evaluates this under the record row
/// lock so a concurrent crate deletion cannot invalidate it.
pub fn validate_submit(status: HarvestStatus, crate_count: i64) -> Result<(), &'static str> {
    if !status.can_transition_to(HarvestStatus::Submitted) {
        return Err("Only DRAFT harvest records can be submitted");
    }
    if crate_count == 0 {
        return Err("Harvest record must have at least one crate before submission");
    }
    Ok(())
}
