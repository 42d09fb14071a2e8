use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionType {
    LateArrival,
    GeofenceViolation,
    LowBiometricScore,
    Absent,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExceptionStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ExceptionStatus {
    /// Resolved and dismissed exceptions are never reopened.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExceptionStatus::Resolved | ExceptionStatus::Dismissed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    pub id: Uuid,
    pub attendance_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ExceptionType,
    #[schema(example = "Biometric match score 70% below threshold 85%")]
    pub description: String,
    pub severity: Severity,
    pub status: ExceptionStatus,
    pub reviewed_by: Option<Uuid>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<Timestamp>,
    pub resolution: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

/// Reviewer decision applied to a pending exception.
#[derive(Debug, Clone)]
pub struct ExceptionReview {
    pub status: ExceptionStatus,
    pub resolution: Option<String>,
    pub reviewed_by: Uuid,
    pub reviewed_at: Timestamp,
}
