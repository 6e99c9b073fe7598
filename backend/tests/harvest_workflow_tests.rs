//! Harvest record workflow and authorization tests
//!
//! Comprehensive tests for:
//! - The DRAFT -> SUBMITTED -> APPROVED status machine
//! - Mutability rules tied to record status
//! - Capability checks, farm membership, and the status-override rule
//! - Validation of weights, batch sizes, and harvest date windows

use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use shared::models::{CycleStatus, Grade, HarvestStatus};
use shared::policy::{
    authorize, authorize_mutation, visible_farms, AccessDenied, Actor, Capability,
};
use shared::validation::{
    harvest_date_allowed, validate_crate_count, validate_label_code, validate_submit,
    validate_weight_kg, MAX_CRATE_BATCH, MIN_DAYS_PLANTING_TO_HARVEST,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn worker(farm_id: Uuid, capabilities: &[Capability]) -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        admin: false,
        capabilities: capabilities.iter().map(|c| c.as_str().to_string()).collect(),
        farm_ids: HashSet::from([farm_id]),
    }
}

fn admin() -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        admin: true,
        capabilities: HashSet::new(),
        farm_ids: HashSet::new(),
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn status_strategy() -> impl Strategy<Value = HarvestStatus> {
    prop_oneof![
        Just(HarvestStatus::Draft),
        Just(HarvestStatus::Submitted),
        Just(HarvestStatus::Approved),
    ]
}

fn capability_strategy() -> impl Strategy<Value = Capability> {
    prop_oneof![
        Just(Capability::View),
        Just(Capability::Create),
        Just(Capability::Update),
        Just(Capability::Submit),
        Just(Capability::Approve),
        Just(Capability::Delete),
        Just(Capability::OverrideStatus),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// The only legal transitions are DRAFT->SUBMITTED and
    /// SUBMITTED->APPROVED; everything else is rejected
    #[test]
    fn test_transition_table_is_closed(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        let legal = matches!(
            (from, to),
            (HarvestStatus::Draft, HarvestStatus::Submitted)
                | (HarvestStatus::Submitted, HarvestStatus::Approved)
        );
        prop_assert_eq!(from.can_transition_to(to), legal);
    }

    /// Only DRAFT records are mutable
    #[test]
    fn test_mutability_tracks_status(status in status_strategy()) {
        prop_assert_eq!(status.is_mutable(), status == HarvestStatus::Draft);
    }

    /// Admins pass every check regardless of capability or farm
    #[test]
    fn test_admin_bypasses_all_guards(
        cap in capability_strategy(),
        status in status_strategy(),
    ) {
        let farm_id = Uuid::new_v4();
        prop_assert!(authorize(&admin(), cap, farm_id).is_ok());
        prop_assert!(authorize_mutation(&admin(), cap, farm_id, status).is_ok());
    }

    /// A non-member is denied even when they hold the capability
    #[test]
    fn test_foreign_farm_denied(cap in capability_strategy()) {
        let actor = worker(Uuid::new_v4(), &[cap]);
        let other_farm = Uuid::new_v4();
        prop_assert!(matches!(
            authorize(&actor, cap, other_farm),
            Err(AccessDenied::NotFarmMember)
        ));
    }

    /// Mutating a non-DRAFT record requires the override capability;
    /// DRAFT never does
    #[test]
    fn test_override_required_only_past_draft(status in status_strategy()) {
        let farm_id = Uuid::new_v4();
        let plain = worker(farm_id, &[Capability::Update]);
        let overrider = worker(farm_id, &[Capability::Update, Capability::OverrideStatus]);

        let plain_result = authorize_mutation(&plain, Capability::Update, farm_id, status);
        if status == HarvestStatus::Draft {
            prop_assert!(plain_result.is_ok());
        } else {
            prop_assert!(
                matches!(plain_result, Err(AccessDenied::OverrideRequired { .. })),
                "expected Err(AccessDenied::OverrideRequired {{ .. }}), got {:?}",
                plain_result
            );
        }
        prop_assert!(authorize_mutation(&overrider, Capability::Update, farm_id, status).is_ok());
    }

    /// Submission requires DRAFT and a non-empty crate set, for every
    /// status and count combination
    #[test]
    fn test_submit_precondition(
        status in status_strategy(),
        crate_count in 0..50i64,
    ) {
        let allowed = status == HarvestStatus::Draft && crate_count > 0;
        prop_assert_eq!(validate_submit(status, crate_count).is_ok(), allowed);
    }

    /// Crate batch size is accepted exactly on 1..=1000
    #[test]
    fn test_crate_count_bounds(count in 0..=2000u32) {
        let accepted = validate_crate_count(count).is_ok();
        prop_assert_eq!(accepted, (1..=MAX_CRATE_BATCH).contains(&count));
    }

    /// The harvest date window opens exactly 40 days after planting
    #[test]
    fn test_harvest_window_boundary(offset_days in 0..120i64) {
        let planting = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let harvest = planting + chrono::Duration::days(offset_days);
        prop_assert_eq!(
            harvest_date_allowed(planting, harvest),
            offset_days >= MIN_DAYS_PLANTING_TO_HARVEST
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_approved_is_terminal() {
    for to in [
        HarvestStatus::Draft,
        HarvestStatus::Submitted,
        HarvestStatus::Approved,
    ] {
        assert!(!HarvestStatus::Approved.can_transition_to(to));
    }
}

#[test]
fn test_approve_from_draft_rejected() {
    assert!(!HarvestStatus::Draft.can_transition_to(HarvestStatus::Approved));
}

#[test]
fn test_submit_blocked_when_last_crate_deleted() {
    // The precondition is evaluated against the crate count as it
    // stands under the record lock at commit time, so a deletion that
    // empties the record before the transition lands must block it
    let before_delete = 1;
    let after_delete = 0;
    assert!(validate_submit(HarvestStatus::Draft, before_delete).is_ok());
    assert!(validate_submit(HarvestStatus::Draft, after_delete).is_err());
}

#[test]
fn test_second_submit_rejected() {
    assert!(validate_submit(HarvestStatus::Submitted, 3).is_err());
    assert!(validate_submit(HarvestStatus::Approved, 3).is_err());
}

#[test]
fn test_list_farm_filter_respects_membership() {
    let farm_id = Uuid::new_v4();
    let foreign = Uuid::new_v4();
    let viewer = worker(farm_id, &[Capability::View]);

    assert_eq!(visible_farms(&viewer, None), Ok(Some(vec![farm_id])));
    assert_eq!(visible_farms(&viewer, Some(farm_id)), Ok(Some(vec![farm_id])));
    assert_eq!(
        visible_farms(&viewer, Some(foreign)),
        Err(AccessDenied::NotFarmMember)
    );
    assert_eq!(visible_farms(&admin(), None), Ok(None));
}

#[test]
fn test_missing_capability_denied() {
    let farm_id = Uuid::new_v4();
    let viewer = worker(farm_id, &[Capability::View]);
    assert!(matches!(
        authorize(&viewer, Capability::Submit, farm_id),
        Err(AccessDenied::MissingCapability(Capability::Submit))
    ));
}

#[test]
fn test_capability_names() {
    assert_eq!(Capability::View.as_str(), "harvest.view");
    assert_eq!(Capability::OverrideStatus.as_str(), "harvest.override_status");
}

#[test]
fn test_harvest_allowed_cycle_statuses() {
    assert!(CycleStatus::Active.allows_harvest());
    assert!(CycleStatus::Harvesting.allows_harvest());
    assert!(!CycleStatus::Planned.allows_harvest());
    assert!(!CycleStatus::Completed.allows_harvest());
    assert!(!CycleStatus::Cancelled.allows_harvest());
}

#[test]
fn test_weight_must_be_positive() {
    use rust_decimal::Decimal;
    assert!(validate_weight_kg(Decimal::new(1, 2)).is_ok());
    assert!(validate_weight_kg(Decimal::ZERO).is_err());
    assert!(validate_weight_kg(Decimal::from(-5)).is_err());
}

#[test]
fn test_label_code_length_cap() {
    assert!(validate_label_code(&"x".repeat(255)).is_ok());
    assert!(validate_label_code(&"x".repeat(256)).is_err());
}

#[test]
fn test_grade_parse_round_trip() {
    for grade in Grade::ALL {
        assert_eq!(Grade::from_str(grade.as_str()), Some(grade));
    }
    assert_eq!(Grade::from_str("D"), None);
}
