use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Installment;

/// consecutive missed installments that make a loan delinquent
pub const DEFAULT_STREAK_THRESHOLD: u32 = 2;

/// outcome of scanning a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelinquencyVerdict {
    pub delinquent: bool,
    /// longest run of consecutive past-due unpaid installments
    pub longest_streak: u32,
    /// past-due unpaid installments anywhere in the schedule
    pub missed_installments: u32,
}

/// streak-based delinquency test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelinquencyEvaluator {
    threshold: u32,
}

impl Default for DelinquencyEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_STREAK_THRESHOLD)
    }
}

impl DelinquencyEvaluator {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// scan installments in sequence order
    ///
    /// A paid installment, or one not yet past `as_of`, ends the current run.
    /// Two misses separated by a paid week are two runs of one.
    pub fn evaluate(&self, installments: &[Installment], as_of: DateTime<Utc>) -> DelinquencyVerdict {
        debug_assert!(installments.windows(2).all(|pair| pair[0].sequence < pair[1].sequence));

        let mut streak = 0u32;
        let mut longest_streak = 0u32;
        let mut missed_installments = 0u32;

        for installment in installments {
            if installment.is_past_due(as_of) {
                streak += 1;
                missed_installments += 1;
                longest_streak = longest_streak.max(streak);
            } else {
                streak = 0;
            }
        }

        DelinquencyVerdict {
            delinquent: longest_streak >= self.threshold,
            longest_streak,
            missed_installments,
        }
    }

    pub fn is_delinquent(&self, installments: &[Installment], as_of: DateTime<Utc>) -> bool {
        self.evaluate(installments, as_of).delinquent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use crate::money::Money;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// weekly schedule with the given paid flags
    fn schedule(paid: &[bool]) -> Vec<Installment> {
        let loan_id = Uuid::new_v4();
        paid.iter()
            .enumerate()
            .map(|(index, paid)| Installment {
                id: Uuid::new_v4(),
                loan_id,
                sequence: index as u32 + 1,
                due_date: start() + Duration::weeks(index as i64 + 1),
                amount: Money::from_minor(100),
                paid: *paid,
            })
            .collect()
    }

    #[test]
    fn test_consecutive_misses_are_delinquent() {
        let evaluator = DelinquencyEvaluator::default();
        let installments = schedule(&[true, false, false, false]);
        let as_of = start() + Duration::weeks(4) + Duration::days(1);

        let verdict = evaluator.evaluate(&installments, as_of);
        assert!(verdict.delinquent);
        assert_eq!(verdict.longest_streak, 3);
        assert_eq!(verdict.missed_installments, 3);
    }

    #[test]
    fn test_separated_misses_are_not_delinquent() {
        let evaluator = DelinquencyEvaluator::default();
        let installments = schedule(&[false, true, false, true]);
        let as_of = start() + Duration::weeks(10);

        let verdict = evaluator.evaluate(&installments, as_of);
        assert!(!verdict.delinquent);
        assert_eq!(verdict.longest_streak, 1);
        assert_eq!(verdict.missed_installments, 2);
    }

    #[test]
    fn test_installment_due_now_does_not_count() {
        let evaluator = DelinquencyEvaluator::default();
        let installments = schedule(&[false, false]);

        // second installment is due exactly at as_of, not before it
        let as_of = installments[1].due_date;
        assert!(!evaluator.is_delinquent(&installments, as_of));

        let later = as_of + Duration::seconds(1);
        assert!(evaluator.is_delinquent(&installments, later));
    }

    #[test]
    fn test_future_installment_breaks_streak() {
        let evaluator = DelinquencyEvaluator::default();
        let installments = schedule(&[false, false, false]);
        let as_of = start() + Duration::weeks(1) + Duration::days(3);

        let verdict = evaluator.evaluate(&installments, as_of);
        assert!(!verdict.delinquent);
        assert_eq!(verdict.longest_streak, 1);
    }

    #[test]
    fn test_longest_run_wins() {
        let evaluator = DelinquencyEvaluator::default();
        let installments = schedule(&[false, false, true, false, true, true]);
        let as_of = start() + Duration::weeks(52);

        let verdict = evaluator.evaluate(&installments, as_of);
        assert!(verdict.delinquent);
        assert_eq!(verdict.longest_streak, 2);
    }

    #[test]
    fn test_custom_threshold() {
        let evaluator = DelinquencyEvaluator::new(3);
        let installments = schedule(&[false, false, true]);
        let as_of = start() + Duration::weeks(52);

        assert!(!evaluator.is_delinquent(&installments, as_of));
        assert!(DelinquencyEvaluator::default().is_delinquent(&installments, as_of));
    }

    #[test]
    fn test_empty_schedule() {
        let verdict = DelinquencyEvaluator::default().evaluate(&[], start());
        assert!(!verdict.delinquent);
        assert_eq!(verdict.longest_streak, 0);
    }
}
