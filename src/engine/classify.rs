use chrono::{Duration, NaiveTime, Timelike};

use crate::model::attendance::AttendanceStatus;

/// Shift parameters applied when deriving a day's status. Sourced from
/// `Config` at the edges; tests build them directly.
#[derive(Debug, Clone, Copy)]
pub struct ShiftRules {
    /// Latest on-time check-in. Arriving exactly at the cutoff is on time.
    pub late_cutoff: NaiveTime,
    /// A present day with less than this much logged time is a half day.
    pub half_day_under_minutes: i64,
}

impl Default for ShiftRules {
    fn default() -> Self {
        Self {
            late_cutoff: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            half_day_under_minutes: 240,
        }
    }
}

impl ShiftRules {
    pub fn half_day_under(&self) -> Duration {
        Duration::minutes(self.half_day_under_minutes)
    }
}

/// Externally supplied day context; holidays and approved leave are not
/// derivable from the instants and short-circuit classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Working,
    Holiday,
    OnLeave,
}

/// Late check: strictly after the cutoff is late, the cutoff itself is on
/// time. Any PM arrival (noon included) is late regardless of the cutoff:
/// the shift is strictly a morning shift. Inherited rule, keep as is.
pub fn is_late(check_in: NaiveTime, cutoff: NaiveTime) -> bool {
    if check_in.hour() >= 12 {
        return true;
    }
    check_in > cutoff
}

/// Time on the clock between the two instants. Inputs come from rows that
/// already satisfy `check_out >= check_in`; clamp anyway so a corrupt row
/// cannot produce a negative duration.
pub fn worked_duration(check_in: NaiveTime, check_out: NaiveTime) -> Duration {
    let d = check_out - check_in;
    if d < Duration::zero() { Duration::zero() } else { d }
}

/// `HH:MM:SS` rendering used for worked totals and the live ticker.
pub fn format_hms(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Derive the status for one day. Instants are the ground truth; this is
/// recomputed on every read and never persisted.
pub fn classify(
    kind: DayKind,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    rules: &ShiftRules,
) -> AttendanceStatus {
    match kind {
        DayKind::Holiday => return AttendanceStatus::Holiday,
        DayKind::OnLeave => return AttendanceStatus::OnLeave,
        DayKind::Working => {}
    }

    let Some(check_in) = check_in else {
        return AttendanceStatus::Absent;
    };

    // A completed day that falls short of the minimum outranks Present/Late.
    if let Some(check_out) = check_out {
        if worked_duration(check_in, check_out) < rules.half_day_under() {
            return AttendanceStatus::HalfDay;
        }
    }

    if is_late(check_in, rules.late_cutoff) {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}
