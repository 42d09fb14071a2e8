pub mod attendance;
pub mod audit_log;
pub mod exception;
pub mod guard;
pub mod shift;
pub mod site;
pub mod ws;

#[cfg(test)]
mod tests;

use std::future::Future;

use actix_web::{HttpRequest, http::header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::service::audit::RequestOrigin;
use crate::state::AppState;

/// Caller identity and network origin for the audit trail.
pub fn origin(req: &HttpRequest, user_id: Option<Uuid>) -> RequestOrigin {
    RequestOrigin {
        user_id,
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Runs a create-style action and writes its single audit entry,
/// whether it succeeded or not.
pub(crate) async fn audited<T>(
    state: &AppState,
    origin: &RequestOrigin,
    action: &'static str,
    resource: &'static str,
    details: Value,
    id_of: impl Fn(&T) -> Uuid,
    run: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    let outcome = run.await;
    state
        .audit
        .record_outcome(origin, action, resource, &outcome, id_of, details, state.clock.now())
        .await;
    outcome
}

/// The body as submitted, for audit details. `Null` when it is not JSON.
pub(crate) fn submitted(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

/// Mutating routes read the raw body and call this inside the audited
/// action, so a body that does not deserialize is audited like any other
/// rejected request.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation(format!("Invalid {what} id: {raw}")))
}
