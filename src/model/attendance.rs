use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Coordinates, Timestamp};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Pending,
    Verified,
    Exception,
}

/// One occupancy of a shift. No clock-in time means the guard never showed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub guard_id: Uuid,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_in_time: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out_time: Option<Timestamp>,
    pub clock_in_latitude: Option<f64>,
    pub clock_in_longitude: Option<f64>,
    pub clock_out_latitude: Option<f64>,
    pub clock_out_longitude: Option<f64>,
    pub clock_in_biometric_score: Option<u8>,
    pub clock_out_biometric_score: Option<u8>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub verified_by: Option<Uuid>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub verified_at: Option<Timestamp>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.clock_in_time.is_some() && self.clock_out_time.is_none()
    }
}

/// Fields written when a guard clocks out.
#[derive(Debug, Clone, Copy)]
pub struct ClockOutFields {
    pub time: Timestamp,
    pub position: Coordinates,
    pub biometric_score: u8,
}
