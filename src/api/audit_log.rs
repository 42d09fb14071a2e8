use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::audit_log::AuditLog;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    /// Defaults to 100, clamped to 1..=1000.
    pub limit: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = [AuditLog]),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    auth: AuthUser,
    query: web::Query<AuditLogQuery>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let logs = state.audit.recent(query.limit).await?;
    Ok(HttpResponse::Ok().json(logs))
}
