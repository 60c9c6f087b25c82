use chrono::NaiveDate;

use crate::error::{EngineError, EngineResult};
use crate::model::document::LeaveType;

/// One comp-leave day equals eight tracked hours.
pub const COMP_HOURS_PER_DAY: f64 = 8.0;

/// Days claimed by a leave of the given type over `[start, end]`.
///
/// Full-day and comp leave count the date range inclusively; the partial
/// types carry a fixed fraction regardless of the range.
pub fn leave_days(leave_type: LeaveType, start: NaiveDate, end: NaiveDate) -> EngineResult<f64> {
    if end < start {
        return Err(EngineError::validation(
            "leave_end_date cannot be before leave_start_date",
        ));
    }
    let days = match leave_type {
        LeaveType::Full | LeaveType::Comp => (end - start).num_days() as f64 + 1.0,
        LeaveType::HalfAm | LeaveType::HalfPm => 0.5,
        LeaveType::Out1h => 0.125,
        LeaveType::Out2h => 0.25,
        LeaveType::Out3h => 0.375,
    };
    Ok(days)
}

pub fn comp_hours(days: f64) -> f64 {
    days * COMP_HOURS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn full_leave_counts_inclusive_days() {
        let days = leave_days(LeaveType::Full, d("2025-03-10"), d("2025-03-12")).unwrap();
        assert_eq!(days, 3.0);

        let days = leave_days(LeaveType::Full, d("2025-03-10"), d("2025-03-10")).unwrap();
        assert_eq!(days, 1.0);
    }

    #[test]
    fn comp_leave_counts_the_range_too() {
        let days = leave_days(LeaveType::Comp, d("2025-05-01"), d("2025-05-02")).unwrap();
        assert_eq!(days, 2.0);
        assert_eq!(comp_hours(days), 16.0);
    }

    #[test]
    fn fraction_table() {
        let day = d("2025-01-06");
        assert_eq!(leave_days(LeaveType::HalfAm, day, day).unwrap(), 0.5);
        assert_eq!(leave_days(LeaveType::HalfPm, day, day).unwrap(), 0.5);
        assert_eq!(leave_days(LeaveType::Out1h, day, day).unwrap(), 0.125);
        assert_eq!(leave_days(LeaveType::Out2h, day, day).unwrap(), 0.25);
        assert_eq!(leave_days(LeaveType::Out3h, day, day).unwrap(), 0.375);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = leave_days(LeaveType::Full, d("2025-03-12"), d("2025-03-10")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
