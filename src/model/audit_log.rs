use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditResult {
    #[default]
    Success,
    Failure,
}

impl AuditResult {
    pub fn of<T, E>(outcome: &Result<T, E>) -> Self {
        if outcome.is_ok() {
            AuditResult::Success
        } else {
            AuditResult::Failure
        }
    }
}

/// Append-only record. Never updated or deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "CLOCK_IN")]
    pub action: String,
    #[schema(example = "Attendance")]
    pub resource: String,
    pub resource_id: Option<Uuid>,
    #[schema(value_type = Object, nullable = true)]
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub result: AuditResult,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}
