use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{audited, origin, parse_body, submitted};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::{
    guard::{Guard, NewGuard},
    new_id,
};
use crate::service::audit::actions;
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnDutyResponse {
    pub guard_id: Uuid,
    pub on_duty: bool,
}

#[utoipa::path(
    get,
    path = "/api/guards",
    responses(
        (status = 200, description = "Active guards", body = [Guard]),
        (status = 403, description = "Staff only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn list_guards(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let guards = state.store.active_guards().await?;
    Ok(HttpResponse::Ok().json(guards))
}

#[utoipa::path(
    post,
    path = "/api/guards",
    request_body = NewGuard,
    responses(
        (status = 201, description = "Guard profile created", body = Guard),
        (status = 400, description = "Invalid fields or unknown user/site"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Employee id or user already has a profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn create_guard(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let details = submitted(&body);
    let now = state.clock.now();

    let guard = audited(
        &state,
        &origin(&req, Some(auth.user_id)),
        actions::CREATE_GUARD,
        "Guard",
        details,
        |g: &Guard| g.id,
        async {
            auth.require_hr_or_admin()?;
            let input: NewGuard = parse_body(&body)?;
            input.validate()?;
            state
                .store
                .user_by_id(input.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("User", input.user_id))
                .map_err(AppError::into_reference_error)?;
            if let Some(site_id) = input.site_id {
                state
                    .store
                    .site_by_id(site_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Site", site_id))
                    .map_err(AppError::into_reference_error)?;
            }
            state.store.insert_guard(input.into_guard(new_id(), now)).await
        },
    )
    .await?;

    tracing::info!(guard_id = %guard.id, employee_id = %guard.employee_id, "Guard created");
    Ok(HttpResponse::Created().json(guard))
}

#[utoipa::path(
    get,
    path = "/api/guards/{guard_id}/on-duty",
    params(("guard_id", Path, description = "Guard ID")),
    responses(
        (status = 200, description = "Whether the guard is clocked in", body = OnDutyResponse),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "Guard not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn on_duty(
    auth: AuthUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let guard_id = path.into_inner();
    let guard = state
        .store
        .guard_by_id(guard_id)
        .await?
        .ok_or_else(|| AppError::not_found("Guard", guard_id))?;
    if !auth.role.is_staff() && guard.user_id != auth.user_id {
        return Err(AppError::Forbidden("Not your guard profile".into()));
    }

    let on_duty = state.ledger.is_on_duty(guard.id).await?;
    Ok(HttpResponse::Ok().json(OnDutyResponse { guard_id, on_duty }))
}

#[utoipa::path(
    get,
    path = "/api/my-guard-profile",
    responses(
        (status = 200, description = "Guard profile of the caller", body = Guard),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Caller has no guard profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn my_guard_profile(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let guard = state
        .store
        .guard_by_user_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Guard profile for user", auth.user_id))?;
    Ok(HttpResponse::Ok().json(guard))
}
