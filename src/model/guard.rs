use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Timestamp, require_text};
use crate::error::{AppError, AppResult};

/// Guard profile, bound 1:1 to a user. Deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guard {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "GRD-0042")]
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub site_id: Option<Uuid>,
    pub hourly_rate: Option<f64>,
    /// Opaque reference to the encrypted template held by the capture vendor.
    pub biometric_ref: Option<String>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewGuard {
    pub user_id: Uuid,
    #[schema(example = "GRD-0042")]
    pub employee_id: String,
    #[schema(example = "Peter")]
    pub first_name: String,
    #[schema(example = "Ochieng")]
    pub last_name: String,
    pub phone_number: Option<String>,
    pub site_id: Option<Uuid>,
    pub hourly_rate: Option<f64>,
    pub biometric_ref: Option<String>,
}

impl NewGuard {
    pub fn validate(&self) -> AppResult<()> {
        require_text("employeeId", &self.employee_id)?;
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        if matches!(self.hourly_rate, Some(r) if !r.is_finite() || r < 0.0) {
            return Err(AppError::validation("hourlyRate must be a non-negative number"));
        }
        Ok(())
    }

    pub fn into_guard(self, id: Uuid, now: Timestamp) -> Guard {
        Guard {
            id,
            user_id: self.user_id,
            employee_id: self.employee_id.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone_number: self.phone_number,
            site_id: self.site_id,
            hourly_rate: self.hourly_rate,
            biometric_ref: self.biometric_ref,
            is_active: true,
            created_at: now,
        }
    }
}
