//! Harvest crate aggregation property-based and unit tests
//!
//! Comprehensive tests for:
//! - Grade totals consistency (total = A + B + C, counts match crate set)
//! - Recompute idempotence
//! - Even weight split across a batch
//! - Crate number uniqueness and monotonicity across deletions

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

use shared::models::Grade;
use shared::totals::{next_crate_numbers, split_weight, GradeTotals};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate a grade
fn grade_strategy() -> impl Strategy<Value = Grade> {
    prop_oneof![Just(Grade::A), Just(Grade::B), Just(Grade::C)]
}

/// Generate a valid crate weight in kg (0.01 to 1000.00)
fn crate_weight_strategy() -> impl Strategy<Value = Decimal> {
    (1..=100_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Generate a crate set as (grade, weight) pairs
fn crate_set_strategy() -> impl Strategy<Value = Vec<(Grade, Decimal)>> {
    prop::collection::vec((grade_strategy(), crate_weight_strategy()), 0..40)
}

/// Generate a sequence of batch sizes for add operations
fn batch_sizes_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1..=20u32, 1..10)
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// The combined totals always equal the sum of the per-grade totals
    #[test]
    fn test_totals_identity(crates in crate_set_strategy()) {
        let totals = GradeTotals::from_crates(crates.clone());

        prop_assert_eq!(
            totals.weight_kg_total,
            totals.weight_kg_a + totals.weight_kg_b + totals.weight_kg_c
        );
        prop_assert_eq!(
            totals.count_total,
            totals.count_a + totals.count_b + totals.count_c
        );
        prop_assert_eq!(totals.count_total as usize, crates.len());
    }

    /// Per-grade totals equal the sum over crates of that grade
    #[test]
    fn test_totals_match_crate_set(crates in crate_set_strategy()) {
        let totals = GradeTotals::from_crates(crates.clone());

        let sum_for = |grade: Grade| -> Decimal {
            crates
                .iter()
                .filter(|(g, _)| *g == grade)
                .map(|(_, w)| *w)
                .sum::<Decimal>()
                .round_dp(2)
        };

        prop_assert_eq!(totals.weight_kg_a, sum_for(Grade::A));
        prop_assert_eq!(totals.weight_kg_b, sum_for(Grade::B));
        prop_assert_eq!(totals.weight_kg_c, sum_for(Grade::C));
    }

    /// Recomputing from the same crate set is idempotent
    #[test]
    fn test_recompute_idempotent(crates in crate_set_strategy()) {
        let first = GradeTotals::from_crates(crates.clone());
        let second = GradeTotals::from_crates(crates);
        prop_assert_eq!(first, second);
    }

    /// An even split never loses more than rounding error per crate
    #[test]
    fn test_split_weight_bounded_error(
        total in crate_weight_strategy(),
        count in 1..=1000u32,
    ) {
        let per_crate = split_weight(total, count);
        let reassembled = per_crate * Decimal::from(count);
        let error = (reassembled - total).abs();
        // round_dp(2) moves each crate by at most 0.005
        prop_assert!(error <= Decimal::new(5, 3) * Decimal::from(count));
    }

    /// Crate numbers from successive batches are unique and strictly
    /// increasing, regardless of batch sizes
    #[test]
    fn test_crate_numbers_unique_across_batches(batches in batch_sizes_strategy()) {
        let mut highest = 0;
        let mut seen: HashSet<i32> = HashSet::new();
        let mut previous_max = 0;

        for batch in batches {
            let numbers = next_crate_numbers(highest, batch);
            prop_assert_eq!(numbers.len(), batch as usize);

            for number in &numbers {
                prop_assert!(*number > previous_max, "numbers must increase monotonically");
                prop_assert!(seen.insert(*number), "crate number reused");
            }

            previous_max = *numbers.last().unwrap();
            highest = previous_max;
        }
    }

    /// Deleting crates must never cause number reuse: the counter only
    /// moves forward, so numbers assigned after any deletion pattern
    /// stay disjoint from every number ever assigned
    #[test]
    fn test_no_reuse_after_deletions(
        batches in batch_sizes_strategy(),
        delete_highest in proptest::bool::ANY,
    ) {
        let mut counter = 0;
        let mut ever_assigned: HashSet<i32> = HashSet::new();
        let mut live: Vec<i32> = Vec::new();

        for batch in batches {
            let numbers = next_crate_numbers(counter, batch);
            counter += batch as i32;

            for number in &numbers {
                prop_assert!(ever_assigned.insert(*number), "crate number reused");
            }
            live.extend(numbers);

            // Deleting the highest-numbered crate is the case a
            // MAX-based scheme would get wrong
            if delete_highest {
                live.pop();
            } else if !live.is_empty() {
                live.remove(0);
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_three_crates_of_ten() {
    // AddCrates(grade=A, crateCount=3, totalWeight=30) -> 3 x 10kg
    let per_crate = split_weight(Decimal::from(30), 3);
    assert_eq!(per_crate, Decimal::from(10));

    let totals = GradeTotals::from_crates(vec![
        (Grade::A, per_crate),
        (Grade::A, per_crate),
        (Grade::A, per_crate),
    ]);
    assert_eq!(totals.weight_kg_a, Decimal::from(30));
    assert_eq!(totals.weight_kg_total, Decimal::from(30));
    assert_eq!(totals.count_a, 3);
    assert_eq!(totals.count_total, 3);
}

#[test]
fn test_mixed_grades_accumulate() {
    // Follow-up batch: AddCrates(grade=B, crateCount=1, totalWeight=12)
    let totals = GradeTotals::from_crates(vec![
        (Grade::A, Decimal::from(10)),
        (Grade::A, Decimal::from(10)),
        (Grade::A, Decimal::from(10)),
        (Grade::B, Decimal::from(12)),
    ]);
    assert_eq!(totals.weight_kg_a, Decimal::from(30));
    assert_eq!(totals.weight_kg_b, Decimal::from(12));
    assert_eq!(totals.weight_kg_total, Decimal::from(42));
    assert_eq!(totals.count_total, 4);
}

#[test]
fn test_empty_record_has_zero_totals() {
    let totals = GradeTotals::from_crates(Vec::new());
    assert!(totals.is_empty());
    assert_eq!(totals.weight_kg_total, Decimal::ZERO);
    assert_eq!(totals.count_total, 0);
}

#[test]
fn test_batch_numbers_follow_existing() {
    assert_eq!(next_crate_numbers(0, 3), vec![1, 2, 3]);
    assert_eq!(next_crate_numbers(3, 1), vec![4]);
}
