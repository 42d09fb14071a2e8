use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use super::{audited, origin, parse_body, submitted};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::{
    new_id,
    shift::{NewShift, Shift},
};
use crate::service::{audit::actions, ledger::local_day_window};
use crate::state::AppState;

/// Shifts starting today. Guards only see their own.
#[utoipa::path(
    get,
    path = "/api/shifts/active",
    responses(
        (status = 200, description = "Shifts scheduled to start today", body = [Shift]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn active_shifts(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let (from, to) = local_day_window(state.clock.now());
    let mut shifts = state.store.shifts_starting_between(from, to).await?;

    if !auth.role.is_staff() {
        let own = state.store.guard_by_user_id(auth.user_id).await?.map(|g| g.id);
        shifts.retain(|s| Some(s.guard_id) == own);
    }
    Ok(HttpResponse::Ok().json(shifts))
}

#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = NewShift,
    responses(
        (status = 201, description = "Shift scheduled", body = Shift),
        (status = 400, description = "Invalid window or unknown guard/post",
            body = Object, example = json!({
            "error": "scheduledEnd must be after scheduledStart"
        })),
        (status = 403, description = "Staff only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn create_shift(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let details = submitted(&body);
    let now = state.clock.now();

    let shift = audited(
        &state,
        &origin(&req, Some(auth.user_id)),
        actions::CREATE_SHIFT,
        "Shift",
        details,
        |s: &Shift| s.id,
        async {
            auth.require_staff()?;
            let input: NewShift = parse_body(&body)?;
            input.validate()?;
            state
                .store
                .guard_by_id(input.guard_id)
                .await?
                .filter(|g| g.is_active)
                .ok_or_else(|| AppError::not_found("Guard", input.guard_id))
                .map_err(AppError::into_reference_error)?;
            state
                .store
                .post_by_id(input.post_id)
                .await?
                .ok_or_else(|| AppError::not_found("Post", input.post_id))
                .map_err(AppError::into_reference_error)?;
            state.store.insert_shift(input.into_shift(new_id(), now)).await
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(shift))
}
