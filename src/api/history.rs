use std::collections::{HashMap, HashSet};

use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::classify::{self, DayKind};
use crate::engine::history::{self, DayRecord, MonthlySummary};
use crate::model::attendance::{AttendanceDay, AttendanceStatus};
use crate::utils::holiday_cache;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    #[schema(example = 6)]
    /// Calendar month (1-12)
    pub month: u32,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 123)]
    /// Another employee's history; requires HR/Admin
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub data: Vec<DayRecord>,
    pub summary: MonthlySummary,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct DailyQuery {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "legacy")]
    /// "legacy" returns the bare row array instead of the keyed object
    pub mode: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DailyRowSql {
    id: u64,
    employee_code: String,
    first_name: String,
    last_name: String,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyRow {
    #[schema(example = 1)]
    #[serde(rename = "employeeId")]
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    #[serde(rename = "employeeCode")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub name: String,
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

#[derive(Serialize, ToSchema)]
pub struct DailyAttendanceResponse {
    #[serde(rename = "attendanceData")]
    pub attendance_data: Vec<DailyRow>,
    #[schema(example = "Founders Day")]
    #[serde(rename = "holidayStatus", skip_serializing_if = "Option::is_none")]
    pub holiday_status: Option<String>,
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((from, next.pred_opt()?))
}

fn internal<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> actix_web::Error {
    move |e| {
        tracing::error!(error = %e, context);
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    }
}

/// Approved leave dates for one employee inside the range
async fn leave_dates(
    pool: &MySqlPool,
    employee_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashSet<NaiveDate>, sqlx::Error> {
    let spans = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date
        FROM leave_requests
        WHERE employee_id = ?
        AND status = 'approved'
        AND start_date <= ?
        AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(to)
    .bind(from)
    .fetch_all(pool)
    .await?;

    let mut dates = HashSet::new();
    for (start, end) in spans {
        let mut date = start.max(from);
        let end = end.min(to);
        while date <= end {
            dates.insert(date);
            date = date.succ_opt().expect("leave span within calendar bounds");
        }
    }
    Ok(dates)
}

async fn declared_holidays(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashMap<NaiveDate, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (NaiveDate, String)>(
        "SELECT date, name FROM holidays WHERE date BETWEEN ? AND ?",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Monthly attendance history with summary counters
#[utoipa::path(
    get,
    path = "/api/v1/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Per-day rows for the month plus summary counters", body = HistoryResponse),
        (status = 400, description = "Invalid month/year"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn monthly_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let own = auth.employee_id;
    let employee_id = match query.employee_id {
        Some(id) if Some(id) != own => {
            auth.require_hr_or_admin()?;
            id
        }
        Some(id) => id,
        None => own.ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?,
    };

    let Some((from, to)) = month_bounds(query.year, query.month) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Invalid month/year"
        })));
    };

    // The month's raw rows, holiday-suppression left to the summary fold
    let rows = sqlx::query_as::<_, AttendanceDay>(
        r#"
        SELECT employee_id, date, check_in, check_out
        FROM attendance
        WHERE employee_id = ?
        AND date BETWEEN ? AND ?
        ORDER BY date
        "#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(internal("Failed to fetch attendance history"))?;

    let leaves = leave_dates(pool.get_ref(), employee_id, from, to)
        .await
        .map_err(internal("Failed to fetch leave dates"))?;

    let holidays = declared_holidays(pool.get_ref(), from, to)
        .await
        .map_err(internal("Failed to fetch holidays"))?;

    let today = Local::now().date_naive();
    let (data, summary) = history::aggregate(
        from,
        to,
        &rows,
        &leaves,
        &holidays,
        today,
        &config.shift_rules(),
    );

    Ok(HttpResponse::Ok().json(HistoryResponse { data, summary }))
}

/// Daily administrative view: one classified row per active employee, or a
/// holiday marker instead of rows when the date is a Sunday/holiday
#[utoipa::path(
    get,
    path = "/api/v1/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Per-employee rows, or a holiday marker with no rows", body = DailyAttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn daily_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DailyQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = query.date;
    let legacy = query.mode.as_deref() == Some("legacy");

    let holiday_status = if history::is_weekly_off(date) {
        Some("Sunday".to_string())
    } else {
        holiday_cache::holiday_name(pool.get_ref(), date)
            .await
            .map_err(internal("Failed to fetch holiday"))?
    };

    if let Some(holiday_status) = holiday_status {
        // Attendance is not tracked on holidays; the row batch stays empty
        if legacy {
            return Ok(HttpResponse::Ok().json(Vec::<DailyRow>::new()));
        }
        return Ok(HttpResponse::Ok().json(DailyAttendanceResponse {
            attendance_data: Vec::new(),
            holiday_status: Some(holiday_status),
        }));
    }

    let rows = sqlx::query_as::<_, DailyRowSql>(
        r#"
        SELECT e.id, e.employee_code, e.first_name, e.last_name,
               a.check_in, a.check_out
        FROM employees e
        LEFT JOIN attendance a
        ON a.employee_id = e.id AND a.date = ?
        WHERE e.status = 'active'
        ORDER BY e.id
        "#,
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(internal("Failed to fetch daily attendance"))?;

    let on_leave = sqlx::query_as::<_, (u64,)>(
        r#"
        SELECT employee_id
        FROM leave_requests
        WHERE status = 'approved'
        AND start_date <= ?
        AND end_date >= ?
        "#,
    )
    .bind(date)
    .bind(date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(internal("Failed to fetch leave overlaps"))?
    .into_iter()
    .map(|(id,)| id)
    .collect::<HashSet<u64>>();

    let rules = config.shift_rules();
    let attendance_data: Vec<DailyRow> = rows
        .into_iter()
        .map(|row| {
            let kind = if on_leave.contains(&row.id) {
                DayKind::OnLeave
            } else {
                DayKind::Working
            };
            let status = classify::classify(kind, row.check_in, row.check_out, &rules);
            let total_hours = match (row.check_in, row.check_out) {
                (Some(ci), Some(co)) => {
                    Some(classify::format_hms(classify::worked_duration(ci, co)))
                }
                _ => None,
            };
            DailyRow {
                employee_id: row.id,
                employee_code: row.employee_code,
                name: format!("{} {}", row.first_name, row.last_name),
                check_in: row.check_in,
                check_out: row.check_out,
                total_hours,
                status,
            }
        })
        .collect();

    if legacy {
        return Ok(HttpResponse::Ok().json(attendance_data));
    }

    Ok(HttpResponse::Ok().json(DailyAttendanceResponse {
        attendance_data,
        holiday_status: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_the_whole_month() {
        let (from, to) = month_bounds(2025, 6).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());

        let (from, to) = month_bounds(2025, 12).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn month_bounds_reject_invalid_month() {
        assert!(month_bounds(2025, 0).is_none());
        assert!(month_bounds(2025, 13).is_none());
    }
}
