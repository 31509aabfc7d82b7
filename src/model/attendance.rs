use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// One attendance row per employee per calendar date.
///
/// `check_in`/`check_out` are bare TIME columns holding UTC wall-clock
/// values; `date` is the employee's local work day. A row is created on
/// first check-in and mutated exactly once more (check-out), after which
/// the day is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceDay {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
}

/// Derived day status. Never stored: the instants are the ground truth and
/// the status is recomputed on every read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum AttendanceStatus {
    Present,
    Late,
    #[serde(rename = "Half Day")]
    #[strum(serialize = "Half Day")]
    HalfDay,
    Absent,
    #[serde(rename = "On Leave")]
    #[strum(serialize = "On Leave")]
    OnLeave,
    Holiday,
}
