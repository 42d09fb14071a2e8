use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{
    audit_log::{AuditLog, AuditResult},
    new_id,
};
use crate::store::Store;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

pub mod actions {
    pub const CLOCK_IN: &str = "CLOCK_IN";
    pub const CLOCK_OUT: &str = "CLOCK_OUT";
    pub const CREATE_GUARD: &str = "CREATE_GUARD";
    pub const CREATE_SITE: &str = "CREATE_SITE";
    pub const CREATE_POST: &str = "CREATE_POST";
    pub const CREATE_SHIFT: &str = "CREATE_SHIFT";
    pub const REVIEW_EXCEPTION: &str = "REVIEW_EXCEPTION";
    pub const REGISTER: &str = "REGISTER";
    pub const LOGIN: &str = "LOGIN";
}

/// Who triggered an action, and from where.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub resource: &'static str,
    pub resource_id: Option<Uuid>,
    pub details: Option<Value>,
    pub result: AuditResult,
}

/// Append-only audit trail.
///
/// Writes are best-effort: a failed append never fails the action being
/// audited. It is reported on the `operator` log target instead.
#[derive(Clone)]
pub struct AuditSink {
    store: Arc<dyn Store>,
}

impl AuditSink {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns whether the entry was persisted.
    pub async fn record(
        &self,
        origin: &RequestOrigin,
        entry: AuditEntry,
        now: DateTime<Utc>,
    ) -> bool {
        let log = AuditLog {
            id: new_id(),
            user_id: origin.user_id,
            action: entry.action.to_string(),
            resource: entry.resource.to_string(),
            resource_id: entry.resource_id,
            details: entry.details,
            ip_address: origin.ip_address.clone(),
            user_agent: origin.user_agent.clone(),
            result: entry.result,
            created_at: now,
        };
        let (action, result) = (entry.action, entry.result);

        match self.store.append_audit_log(log).await {
            Ok(()) => {
                debug!(action, result = %result, "Audit entry written");
                true
            }
            Err(e) => {
                error!(
                    target: "operator",
                    error = %e,
                    action,
                    result = %result,
                    user_id = ?origin.user_id,
                    "Audit entry lost, manual follow-up required"
                );
                false
            }
        }
    }

    /// Audits the outcome of a create-style action in one call.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_outcome<T>(
        &self,
        origin: &RequestOrigin,
        action: &'static str,
        resource: &'static str,
        outcome: &AppResult<T>,
        id_of: impl Fn(&T) -> Uuid,
        details: Value,
        now: DateTime<Utc>,
    ) -> bool {
        let (resource_id, details) = match outcome {
            Ok(value) => (Some(id_of(value)), details),
            Err(e) => (None, with_error(details, e)),
        };
        let entry = AuditEntry {
            action,
            resource,
            resource_id,
            details: Some(details),
            result: AuditResult::of(outcome),
        };
        self.record(origin, entry, now).await
    }

    /// Newest first; `limit` defaults to 100 and is clamped to 1..=1000.
    pub async fn recent(&self, limit: Option<u32>) -> AppResult<Vec<AuditLog>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self.store.recent_audit_logs(limit).await
    }
}

pub fn with_error(mut details: Value, error: &AppError) -> Value {
    match details.as_object_mut() {
        Some(map) => {
            map.insert("error".into(), json!(error.to_string()));
            details
        }
        None => json!({ "input": details, "error": error.to_string() }),
    }
}
