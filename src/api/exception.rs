use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{audited, origin, parse_body, parse_id, submitted};
use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::exception::{Exception, ExceptionStatus};
use crate::service::audit::actions;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewExceptionReq {
    /// One of `reviewed`, `resolved`, `dismissed`.
    pub status: ExceptionStatus,
    #[schema(example = "Guard re-verified in person")]
    pub resolution: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/exceptions/pending",
    responses(
        (status = 200, description = "Pending exceptions, newest first", body = [Exception]),
        (status = 403, description = "Staff only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Exceptions"
)]
pub async fn pending(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let exceptions = state.recorder.pending().await?;
    Ok(HttpResponse::Ok().json(exceptions))
}

#[utoipa::path(
    patch,
    path = "/api/exceptions/{exception_id}",
    params(("exception_id", Path, description = "Exception ID")),
    request_body = ReviewExceptionReq,
    responses(
        (status = 200, description = "Exception reviewed", body = Exception),
        (status = 400, description = "Invalid transition", body = Object, example = json!({
            "error": "Cannot move exception from dismissed to resolved"
        })),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Exception not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Exceptions"
)]
pub async fn review(
    req: HttpRequest,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let raw_id = path.into_inner();
    let details = json!({ "exceptionId": &raw_id, "request": submitted(&body) });
    let now = state.clock.now();

    let exception = audited(
        &state,
        &origin(&req, Some(auth.user_id)),
        actions::REVIEW_EXCEPTION,
        "Exception",
        details,
        |e: &Exception| e.id,
        async {
            auth.require_staff()?;
            let exception_id = parse_id(&raw_id, "exception")?;
            let input: ReviewExceptionReq = parse_body(&body)?;
            state
                .recorder
                .review(exception_id, auth.user_id, input.status, input.resolution, now)
                .await
        },
    )
    .await?;

    state.notifier.publish_exception(&exception, now).await;
    Ok(HttpResponse::Ok().json(exception))
}
