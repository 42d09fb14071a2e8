use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use super::{origin, parse_body, submitted};
use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::attendance::Attendance;
use crate::service::audit::actions;
use crate::service::workflow::{ClockInRequest, ClockOutRequest};
use crate::state::AppState;

/// Attendance rows created today (server local time), oldest first.
/// Guards only see their own rows.
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance", body = [Attendance]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let mut rows = state.ledger.todays_attendance(state.clock.now()).await?;

    if !auth.role.is_staff() {
        let own = state.store.guard_by_user_id(auth.user_id).await?.map(|g| g.id);
        rows.retain(|a| Some(a.guard_id) == own);
    }
    Ok(HttpResponse::Ok().json(rows))
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 201, description = "Clocked in, verified or exception", body = Attendance),
        (status = 400, description = "Invalid input, unknown shift, or already clocked in",
            body = Object, example = json!({
            "error": "Shift 6f1c0f8e-3a7e-4d8b-9d0c-2a1f3b4c5d6e already has an open attendance"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Shift is not assigned to the caller"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let origin = origin(&req, Some(auth.user_id));
    let request: ClockInRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => {
            let action = actions::CLOCK_IN;
            return Err(state.workflow.reject(action, &origin, submitted(&body), e).await);
        }
    };

    let outcome = state.workflow.process_clock_in(&auth.actor(), &origin, request).await?;
    Ok(HttpResponse::Created().json(outcome.attendance))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out", body = Attendance),
        (status = 400, description = "Invalid input, unknown attendance, or already clocked out",
            body = Object, example = json!({
            "error": "Attendance 6f1c0f8e-3a7e-4d8b-9d0c-2a1f3b4c5d6e is already clocked out"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Attendance belongs to another guard"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let origin = origin(&req, Some(auth.user_id));
    let request: ClockOutRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => {
            let action = actions::CLOCK_OUT;
            return Err(state.workflow.reject(action, &origin, submitted(&body), e).await);
        }
    };

    let outcome = state.workflow.process_clock_out(&auth.actor(), &origin, request).await?;
    Ok(HttpResponse::Ok().json(outcome.attendance))
}
