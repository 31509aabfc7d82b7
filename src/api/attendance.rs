use crate::auth::auth::AuthUser;
use crate::gateway::{GatewayError, MySqlSessionGateway, SessionGateway};
use actix_web::{HttpResponse, Responder, web};

/// Invariant rejections come back as 400 with the gateway's message;
/// transport failures stay opaque.
fn reject(e: GatewayError, employee_id: u64) -> actix_web::Result<HttpResponse> {
    match e {
        GatewayError::AlreadyRecorded
        | GatewayError::NoOpenSession
        | GatewayError::Holiday(_) => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        }))),
        GatewayError::Transport(_) => {
            tracing::error!(error = %e, employee_id, "Attendance transition failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "checkInTime": "09:02:11"
        })),
        (status = 400, description = "Already checked in today, or today is a holiday", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    gateway: web::Data<MySqlSessionGateway>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    match gateway.check_in(employee_id).await {
        Ok(check_in) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Checked in successfully",
            "checkInTime": check_in.format("%H:%M:%S").to_string()
        }))),
        Err(e) => reject(e, employee_id),
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "checkOutTime": "17:31:40"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    gateway: web::Data<MySqlSessionGateway>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    match gateway.check_out(employee_id).await {
        Ok(check_out) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Checked out successfully",
            "checkOutTime": check_out.format("%H:%M:%S").to_string()
        }))),
        Err(e) => reject(e, employee_id),
    }
}

/// Today's session status, the snapshot clients rebuild their view from
#[utoipa::path(
    get,
    path = "/api/v1/attendance/status",
    responses(
        (status = 200, description = "Today's session phase and check-in time", body = Object, example = json!({
            "status": "clocked_in",
            "checkInTime": "09:02:11"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    gateway: web::Data<MySqlSessionGateway>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let snapshot = gateway.day_status(employee_id).await.map_err(|e| {
        tracing::error!(error = %e, employee_id, "Status query failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(snapshot))
}
