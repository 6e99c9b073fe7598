//! Grade aggregation core for harvest records
//!
//! A harvest record's weight and count columns are a materialized view
//! over its crate set. The fold here is the single definition of that
//! view; the backend recomputes it inside the same transaction as every
//! crate mutation.

use rust_decimal::Decimal;

use crate::models::Grade;

/// Per-grade and combined totals for one harvest record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeTotals {
    pub weight_kg_a: Decimal,
    pub weight_kg_b: Decimal,
    pub weight_kg_c: Decimal,
    pub weight_kg_total: Decimal,
    pub count_a: i32,
    pub count_b: i32,
    pub count_c: i32,
    pub count_total: i32,
}

impl GradeTotals {
    /// Fold a crate set into totals. Weights are rounded to two decimal
    /// places per grade and for the combined total, matching column
    /// precision.
    pub fn from_crates<I>(crates: I) -> Self
    where
        I: IntoIterator<Item = (Grade, Decimal)>,
    {
        let mut sum_a = Decimal::ZERO;
        let mut sum_b = Decimal::ZERO;
        let mut sum_c = Decimal::ZERO;
        let mut count_a = 0;
        let mut count_b = 0;
        let mut count_c = 0;

        for (grade, weight) in crates {
            match grade {
                Grade::A => {
                    sum_a += weight;
                    count_a += 1;
                }
                Grade::B => {
                    sum_b += weight;
                    count_b += 1;
                }
                Grade::C => {
                    sum_c += weight;
                    count_c += 1;
                }
            }
        }

        GradeTotals {
            weight_kg_a: sum_a.round_dp(2),
            weight_kg_b: sum_b.round_dp(2),
            weight_kg_c: sum_c.round_dp(2),
            weight_kg_total: (sum_a + sum_b + sum_c).round_dp(2),
            count_a,
            count_b,
            count_c,
            count_total: count_a + count_b + count_c,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count_total == 0
    }
}

/// Assign crate numbers for a batch insert: `highest + 1, highest + 2, ...`
///
/// Numbers are monotonically increasing per record and never reused,
/// even after deletions.
pub fn next_crate_numbers(highest_existing: i32, count: u32) -> Vec<i32> {
    (1..=count as i32).map(|i| highest_existing + i).collect()
}

/// Split a batch's total weight evenly across its crates, rounded to
/// two decimal places (column precision)
pub fn split_weight(total_weight_kg: Decimal, crate_count: u32) -> Decimal {
    (total_weight_kg / Decimal::from(crate_count)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_crate_set() {
        let totals = GradeTotals::from_crates(std::iter::empty());
        assert_eq!(totals, GradeTotals::default());
        assert!(totals.is_empty());
    }

    #[test]
    fn test_totals_by_grade() {
        let crates = vec![
            (Grade::A, Decimal::new(1000, 2)), // 10.00
            (Grade::A, Decimal::new(1050, 2)), // 10.50
            (Grade::B, Decimal::new(1200, 2)), // 12.00
            (Grade::C, Decimal::new(850, 2)),  // 8.50
        ];
        let totals = GradeTotals::from_crates(crates);

        assert_eq!(totals.weight_kg_a, Decimal::new(2050, 2));
        assert_eq!(totals.weight_kg_b, Decimal::new(1200, 2));
        assert_eq!(totals.weight_kg_c, Decimal::new(850, 2));
        assert_eq!(totals.weight_kg_total, Decimal::new(4100, 2));
        assert_eq!(totals.count_a, 2);
        assert_eq!(totals.count_b, 1);
        assert_eq!(totals.count_c, 1);
        assert_eq!(totals.count_total, 4);
    }

    #[test]
    fn test_total_equals_sum_of_grades() {
        let crates = vec![
            (Grade::A, Decimal::new(333, 2)),
            (Grade::B, Decimal::new(667, 2)),
            (Grade::C, Decimal::new(999, 2)),
        ];
        let totals = GradeTotals::from_crates(crates);
        assert_eq!(
            totals.weight_kg_total,
            totals.weight_kg_a + totals.weight_kg_b + totals.weight_kg_c
        );
        assert_eq!(
            totals.count_total,
            totals.count_a + totals.count_b + totals.count_c
        );
    }

    #[test]
    fn test_crate_numbers_continue_from_highest() {
        assert_eq!(next_crate_numbers(0, 3), vec![1, 2, 3]);
        assert_eq!(next_crate_numbers(4, 1), vec![5]);
        // Deleting crates never frees numbers: numbering picks up from
        // the highest ever assigned
        assert_eq!(next_crate_numbers(7, 2), vec![8, 9]);
    }

    #[test]
    fn test_split_weight_even() {
        assert_eq!(split_weight(Decimal::from(30), 3), Decimal::from(10));
        assert_eq!(split_weight(Decimal::from(12), 1), Decimal::from(12));
    }

    #[test]
    fn test_split_weight_rounds_to_2dp() {
        assert_eq!(split_weight(Decimal::from(10), 3), Decimal::new(333, 2));
    }
}
