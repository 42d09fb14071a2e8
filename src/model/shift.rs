use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;
use crate::error::{AppError, AppResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShiftStatus {
    #[default]
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub post_id: Uuid,
    #[schema(value_type = String, format = "date-time")]
    pub scheduled_start: Timestamp,
    #[schema(value_type = String, format = "date-time")]
    pub scheduled_end: Timestamp,
    pub status: ShiftStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewShift {
    pub guard_id: Uuid,
    pub post_id: Uuid,
    #[schema(value_type = String, format = "date-time", example = "2026-10-18T06:00:00Z")]
    pub scheduled_start: Timestamp,
    #[schema(value_type = String, format = "date-time", example = "2026-10-18T18:00:00Z")]
    pub scheduled_end: Timestamp,
}

impl NewShift {
    pub fn validate(&self) -> AppResult<()> {
        if self.scheduled_end <= self.scheduled_start {
            return Err(AppError::validation("scheduledEnd must be after scheduledStart"));
        }
        Ok(())
    }

    pub fn into_shift(self, id: Uuid, now: Timestamp) -> Shift {
        Shift {
            id,
            guard_id: self.guard_id,
            post_id: self.post_id,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            status: ShiftStatus::Scheduled,
            created_at: now,
        }
    }
}
