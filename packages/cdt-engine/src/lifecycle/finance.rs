//! Derived financial fields
//!
//! Daily compounding on an ACT/365 basis:
//! `amount * ((1 + rate / 100 / 365) ^ term_days - 1)`.

use chrono::{Days, NaiveDate};

const DAYS_PER_YEAR: f64 = 365.0;

/// Interest earned over the term, rounded to cents
pub fn estimated_return(amount: f64, interest_rate: f64, term_days: u32) -> f64 {
    let daily_rate = interest_rate / 100.0 / DAYS_PER_YEAR;
    let growth = (1.0 + daily_rate).powi(term_days as i32) - 1.0;
    round_cents(amount * growth)
}

/// `start_date + term_days`, or `None` past the calendar range
pub fn end_date(start_date: NaiveDate, term_days: u32) -> Option<NaiveDate> {
    start_date.checked_add_days(Days::new(u64::from(term_days)))
}

/// Round half away from zero to 2 decimals
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_values() {
        // 1,000,000 at 5.5 % for 180 days
        assert_eq!(estimated_return(1_000_000.0, 5.5, 180), 27_492.37);
        assert_eq!(estimated_return(100_000.0, 10.0, 365), 10_515.58);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(1.005_000_1), 1.01);
        assert_eq!(round_cents(2.344), 2.34);
        assert_eq!(round_cents(-2.345_000_1), -2.35);
    }

    #[test]
    fn test_end_date() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(
            end_date(start, 30),
            Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
        );
        assert_eq!(end_date(NaiveDate::MAX, 1), None);
    }

    proptest! {
        #[test]
        fn prop_deterministic(
            amount in 100_000.0f64..1_000_000_000.0,
            rate in 0.1f64..25.0,
            term in 30u32..=1825,
        ) {
            prop_assert_eq!(
                estimated_return(amount, rate, term),
                estimated_return(amount, rate, term)
            );
        }

        #[test]
        fn prop_monotonic_in_term(
            amount in 100_000.0f64..1_000_000.0,
            rate in 0.1f64..25.0,
            term in 30u32..1825,
        ) {
            prop_assert!(estimated_return(amount, rate, term + 1) >= estimated_return(amount, rate, term));
        }

        #[test]
        fn prop_positive(
            amount in 100_000.0f64..1_000_000_000.0,
            rate in 0.1f64..25.0,
            term in 30u32..=1825,
        ) {
            prop_assert!(estimated_return(amount, rate, term) > 0.0);
        }
    }
}
