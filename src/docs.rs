use crate::api::history::{
    DailyAttendanceResponse, DailyQuery, DailyRow, HistoryQuery, HistoryResponse,
};
use crate::engine::history::{DayRecord, MonthlySummary};
use crate::model::attendance::AttendanceStatus;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timekeep API",
        version = "1.0.0",
        description = r#"
## Attendance & Timekeeping Engine

This API powers the attendance core of an office-management suite: daily
check-in/check-out sessions, live session status, and attendance history.

### Key Features
- **Session Tracking**
  - One check-in and one check-out per employee per day; the day is
    terminal after check-out
- **Status Snapshot**
  - Clients rebuild their clocked-in view from the authoritative snapshot
- **History & Summaries**
  - Per-day statuses (Present / Late / Half Day / Absent / On Leave /
    Holiday) and monthly counters, with Sunday/holiday suppression
- **Daily Admin View**
  - One classified row per active employee, or a holiday marker

### Security
Endpoints are protected with **JWT Bearer authentication** issued by the
platform auth service. The daily view requires **Admin** or **HR**.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::status,

        crate::api::history::monthly_history,
        crate::api::history::daily_attendance
    ),
    components(
        schemas(
            AttendanceStatus,
            DayRecord,
            MonthlySummary,
            HistoryQuery,
            HistoryResponse,
            DailyQuery,
            DailyRow,
            DailyAttendanceResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance session and history APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
