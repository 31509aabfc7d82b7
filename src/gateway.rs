use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use thiserror::Error;

use crate::engine::session::DayPhase;
use crate::utils::holiday_cache;

/// Today's authoritative state for one employee, as the status endpoint
/// reports it. `check_in_time` is the stored TIME column rendered as an
/// `HH:MM:SS` UTC wall-clock string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub status: DayPhase,
    #[serde(rename = "checkInTime", skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Already checked in today")]
    AlreadyRecorded,
    #[error("No active check-in found for today")]
    NoOpenSession,
    #[error("Today is a holiday: {0}")]
    Holiday(String),
    #[error("attendance store unavailable: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Transport failures are worth retrying; invariant rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

/// The single authority over server-side attendance state. Check-in and
/// check-out must serialize racing devices: exactly one transition per
/// (employee, day) wins, the loser gets an invariant rejection.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn day_status(&self, employee_id: u64) -> Result<DaySnapshot, GatewayError>;

    /// Opens today's session and returns the authoritative check-in time.
    async fn check_in(&self, employee_id: u64) -> Result<NaiveTime, GatewayError>;

    /// Closes today's session and returns the authoritative check-out time.
    /// The day is terminal afterwards.
    async fn check_out(&self, employee_id: u64) -> Result<NaiveTime, GatewayError>;
}

/// MySQL-backed gateway. `CURDATE()`/`CURTIME()` keep the database clock
/// authoritative; the unique key on (employee_id, date) plus the guarded
/// UPDATE enforce the one-session-per-day invariant even across devices.
pub struct MySqlSessionGateway {
    pool: MySqlPool,
}

impl MySqlSessionGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn stored_time(&self, employee_id: u64, column: &str) -> Result<NaiveTime, GatewayError> {
        // column is one of two fixed names, never user input
        let sql = format!(
            "SELECT {column} FROM attendance WHERE employee_id = ? AND date = CURDATE()"
        );
        let time = sqlx::query_scalar::<_, Option<NaiveTime>>(&sql)
            .bind(employee_id)
            .fetch_one(&self.pool)
            .await?;

        time.ok_or_else(|| {
            GatewayError::Transport(format!("{column} missing after successful write"))
        })
    }
}

#[async_trait]
impl SessionGateway for MySqlSessionGateway {
    async fn day_status(&self, employee_id: u64) -> Result<DaySnapshot, GatewayError> {
        let row = sqlx::query_as::<_, (Option<NaiveTime>, Option<NaiveTime>)>(
            r#"
            SELECT check_in, check_out
            FROM attendance
            WHERE employee_id = ? AND date = CURDATE()
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let snapshot = match row {
            Some((Some(check_in), check_out)) => DaySnapshot {
                status: if check_out.is_some() {
                    DayPhase::ClockedOut
                } else {
                    DayPhase::ClockedIn
                },
                check_in_time: Some(check_in.format("%H:%M:%S").to_string()),
            },
            _ => DaySnapshot {
                status: DayPhase::NotClockedIn,
                check_in_time: None,
            },
        };

        Ok(snapshot)
    }

    async fn check_in(&self, employee_id: u64) -> Result<NaiveTime, GatewayError> {
        let today = Local::now().date_naive();
        if today.weekday() == Weekday::Sun {
            return Err(GatewayError::Holiday("Sunday".to_string()));
        }
        if let Some(name) = holiday_cache::holiday_name(&self.pool, today).await? {
            return Err(GatewayError::Holiday(name));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, check_in)
            VALUES (?, CURDATE(), CURTIME())
            "#,
        )
        .bind(employee_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) => {
                // Duplicate key: today already has a session (open or closed)
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(GatewayError::AlreadyRecorded);
                    }
                }
                tracing::error!(error = %e, employee_id, "Check-in failed");
                return Err(e.into());
            }
        }

        self.stored_time(employee_id, "check_in").await
    }

    async fn check_out(&self, employee_id: u64) -> Result<NaiveTime, GatewayError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = CURTIME()
            WHERE employee_id = ?
            AND date = CURDATE()
            AND check_in IS NOT NULL
            AND check_out IS NULL
            "#,
        )
        .bind(employee_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Check-out failed");
            GatewayError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::NoOpenSession);
        }

        self.stored_time(employee_id, "check_out").await
    }
}
