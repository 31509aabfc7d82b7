use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::classify::{self, DayKind, ShiftRules};
use crate::model::attendance::{AttendanceDay, AttendanceStatus};

/// Offices close on Sundays; the weekly off is suppressed the same way a
/// declared holiday is.
pub fn is_weekly_off(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

/// Read-only holiday calendar seam. The service backs it with the cached
/// holidays table; tests use a plain map.
pub trait HolidayLookup {
    fn holiday_on(&self, date: NaiveDate) -> Option<String>;
}

impl HolidayLookup for HashMap<NaiveDate, String> {
    fn holiday_on(&self, date: NaiveDate) -> Option<String> {
        self.get(&date).cloned()
    }
}

/// One display row per calendar day of the requested range.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayRecord {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:02:11", value_type = Option<String>)]
    #[serde(rename = "checkIn")]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "17:31:40", value_type = Option<String>)]
    #[serde(rename = "checkOut")]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "08:29:29")]
    #[serde(rename = "totalHours")]
    pub total_hours: Option<String>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlySummary {
    #[schema(example = 22)]
    #[serde(rename = "totalWorkingDays")]
    pub total_working_days: u32,
    #[schema(example = 20)]
    #[serde(rename = "presentDays")]
    pub present_days: u32,
    #[schema(example = 3)]
    #[serde(rename = "lateArrivals")]
    pub late_arrivals: u32,
    #[schema(example = 1)]
    #[serde(rename = "leavesTaken")]
    pub leaves_taken: u32,
}

/// Folds a date range of attendance rows into display rows and the monthly
/// counters.
///
/// The walk visits every calendar day from `from` through `min(to, today)`
/// so a past working day with no row at all still shows up, as Absent —
/// missing data counts against the employee, it is never skipped. Sundays
/// and declared holidays are excluded from `total_working_days`; leave days
/// are not (a leave is taken against a working day).
pub fn aggregate(
    from: NaiveDate,
    to: NaiveDate,
    rows: &[AttendanceDay],
    leaves: &HashSet<NaiveDate>,
    holidays: &impl HolidayLookup,
    today: NaiveDate,
    rules: &ShiftRules,
) -> (Vec<DayRecord>, MonthlySummary) {
    let by_date: HashMap<NaiveDate, &AttendanceDay> =
        rows.iter().map(|row| (row.date, row)).collect();

    let mut records = Vec::new();
    let mut summary = MonthlySummary::default();

    let end = to.min(today);
    let mut date = from;
    while date <= end {
        let row = by_date.get(&date);
        let check_in = row.and_then(|r| r.check_in);
        let check_out = row.and_then(|r| r.check_out);

        let kind = if is_weekly_off(date) || holidays.holiday_on(date).is_some() {
            DayKind::Holiday
        } else if leaves.contains(&date) {
            DayKind::OnLeave
        } else {
            DayKind::Working
        };

        let status = classify::classify(kind, check_in, check_out, rules);

        match status {
            AttendanceStatus::Holiday => {}
            AttendanceStatus::OnLeave => {
                summary.total_working_days += 1;
                summary.leaves_taken += 1;
            }
            AttendanceStatus::Present | AttendanceStatus::HalfDay => {
                summary.total_working_days += 1;
                summary.present_days += 1;
            }
            AttendanceStatus::Late => {
                summary.total_working_days += 1;
                summary.present_days += 1;
                summary.late_arrivals += 1;
            }
            AttendanceStatus::Absent => {
                summary.total_working_days += 1;
            }
        }

        let total_hours = match (kind, check_in, check_out) {
            (DayKind::Working, Some(ci), Some(co)) => {
                Some(classify::format_hms(classify::worked_duration(ci, co)))
            }
            _ => None,
        };

        records.push(DayRecord {
            date,
            check_in: if kind == DayKind::Working { check_in } else { None },
            check_out: if kind == DayKind::Working { check_out } else { None },
            total_hours,
            status,
        });

        date = date.succ_opt().expect("date range within calendar bounds");
    }

    (records, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn row(date: NaiveDate, check_in: NaiveTime, check_out: Option<NaiveTime>) -> AttendanceDay {
        AttendanceDay {
            employee_id: 7,
            date,
            check_in: Some(check_in),
            check_out,
        }
    }

    fn no_holidays() -> HashMap<NaiveDate, String> {
        HashMap::new()
    }

    #[test]
    fn sundays_and_holidays_are_excluded_from_working_days() {
        // 2025-06-02 (Mon) .. 2025-06-08 (Sun): one Sunday, one declared
        // holiday, five working days.
        let mut holidays = HashMap::new();
        holidays.insert(d(2025, 6, 5), "Founders Day".to_string());

        let rows: Vec<AttendanceDay> = (2..=7)
            .filter(|day| *day != 5)
            .map(|day| row(d(2025, 6, day), t(9, 0, 0), Some(t(17, 0, 0))))
            .collect();

        let (records, summary) = aggregate(
            d(2025, 6, 2),
            d(2025, 6, 8),
            &rows,
            &HashSet::new(),
            &holidays,
            d(2025, 6, 30),
            &ShiftRules::default(),
        );

        assert_eq!(records.len(), 7);
        assert_eq!(summary.total_working_days, 5);
        assert_eq!(summary.present_days, 5);
        assert_eq!(records[3].status, AttendanceStatus::Holiday); // Jun 5
        assert_eq!(records[6].status, AttendanceStatus::Holiday); // Sunday
    }

    #[test]
    fn thirty_day_month_fold() {
        // June 2025 has five Sundays; declare one more holiday → 24 working
        // days.
        let mut holidays = HashMap::new();
        holidays.insert(d(2025, 6, 16), "Mid-Year Holiday".to_string());

        let (_, summary) = aggregate(
            d(2025, 6, 1),
            d(2025, 6, 30),
            &[],
            &HashSet::new(),
            &holidays,
            d(2025, 7, 15),
            &ShiftRules::default(),
        );

        assert_eq!(summary.total_working_days, 24);
        assert_eq!(summary.present_days, 0);
    }

    #[test]
    fn recordless_past_working_day_is_absent() {
        let (records, summary) = aggregate(
            d(2025, 6, 3),
            d(2025, 6, 3),
            &[],
            &HashSet::new(),
            &no_holidays(),
            d(2025, 6, 30),
            &ShiftRules::default(),
        );

        assert_eq!(records[0].status, AttendanceStatus::Absent);
        assert_eq!(summary.total_working_days, 1);
        assert_eq!(summary.present_days, 0);
    }

    #[test]
    fn range_is_clamped_at_today() {
        let (records, summary) = aggregate(
            d(2025, 6, 2),
            d(2025, 6, 30),
            &[],
            &HashSet::new(),
            &no_holidays(),
            d(2025, 6, 4),
            &ShiftRules::default(),
        );

        // Mon..Wed only; the future is neither listed nor counted absent
        assert_eq!(records.len(), 3);
        assert_eq!(summary.total_working_days, 3);
    }

    #[test]
    fn leave_days_count_as_working_days_and_leaves() {
        let mut leaves = HashSet::new();
        leaves.insert(d(2025, 6, 3));

        let (records, summary) = aggregate(
            d(2025, 6, 2),
            d(2025, 6, 3),
            &[row(d(2025, 6, 2), t(9, 0, 0), Some(t(17, 0, 0)))],
            &leaves,
            &no_holidays(),
            d(2025, 6, 30),
            &ShiftRules::default(),
        );

        assert_eq!(records[1].status, AttendanceStatus::OnLeave);
        assert_eq!(summary.total_working_days, 2);
        assert_eq!(summary.leaves_taken, 1);
        assert_eq!(summary.present_days, 1);
    }

    #[test]
    fn late_and_half_day_fold_into_counters() {
        let rows = vec![
            row(d(2025, 6, 2), t(9, 40, 0), Some(t(17, 0, 0))), // Late
            row(d(2025, 6, 3), t(9, 0, 0), Some(t(11, 0, 0))),  // Half Day
            row(d(2025, 6, 4), t(9, 10, 0), Some(t(17, 30, 0))), // Present
        ];

        let (records, summary) = aggregate(
            d(2025, 6, 2),
            d(2025, 6, 4),
            &rows,
            &HashSet::new(),
            &no_holidays(),
            d(2025, 6, 30),
            &ShiftRules::default(),
        );

        assert_eq!(records[0].status, AttendanceStatus::Late);
        assert_eq!(records[1].status, AttendanceStatus::HalfDay);
        assert_eq!(records[2].status, AttendanceStatus::Present);
        assert_eq!(summary.present_days, 3);
        assert_eq!(summary.late_arrivals, 1);
        assert_eq!(records[0].total_hours.as_deref(), Some("07:20:00"));
    }

    #[test]
    fn open_session_today_is_not_half_day() {
        // Checked in this morning, not yet out: classification falls back
        // to the check-in alone.
        let today = d(2025, 6, 4);
        let (records, _) = aggregate(
            today,
            today,
            &[AttendanceDay {
                employee_id: 7,
                date: today,
                check_in: Some(t(9, 5, 0)),
                check_out: None,
            }],
            &HashSet::new(),
            &no_holidays(),
            today,
            &ShiftRules::default(),
        );

        assert_eq!(records[0].status, AttendanceStatus::Present);
        assert_eq!(records[0].total_hours, None);
    }
}
