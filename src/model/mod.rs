pub mod attendance;
pub mod audit_log;
pub mod exception;
pub mod guard;
pub mod post;
pub mod role;
pub mod shift;
pub mod site;
pub mod user;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A WGS84 position as submitted by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::validation("latitude must be between -90 and 90"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::validation("longitude must be between -180 and 180"));
        }
        Ok(Self { latitude, longitude })
    }
}

pub(crate) fn new_id() -> Uuid {
    Uuid::new_v4()
}

pub(crate) fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Shared shape of every persisted row's creation stamp.
pub type Timestamp = DateTime<Utc>;
