use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Coordinates, Timestamp, require_text};
use crate::error::{AppError, AppResult};

pub const DEFAULT_GEOFENCE_RADIUS: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    #[schema(example = "Westlands Office Park")]
    pub name: String,
    pub address: String,
    #[schema(example = -1.2683)]
    pub latitude: f64,
    #[schema(example = 36.8111)]
    pub longitude: f64,
    /// Allowed distance from a post, in meters.
    #[schema(example = 100)]
    pub geofence_radius: i32,
    /// Overrides the system biometric threshold for this site.
    #[schema(example = 90, nullable = true)]
    pub min_biometric_score: Option<u8>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    #[schema(example = "Westlands Office Park")]
    pub name: String,
    #[schema(example = "Waiyaki Way, Nairobi")]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geofence_radius: Option<i32>,
    pub min_biometric_score: Option<u8>,
}

impl NewSite {
    pub fn validate(&self) -> AppResult<()> {
        require_text("name", &self.name)?;
        require_text("address", &self.address)?;
        Coordinates::new(self.latitude, self.longitude)?;
        if matches!(self.geofence_radius, Some(r) if r <= 0) {
            return Err(AppError::validation("geofenceRadius must be positive"));
        }
        if matches!(self.min_biometric_score, Some(s) if s > 100) {
            return Err(AppError::validation("minBiometricScore must be between 0 and 100"));
        }
        Ok(())
    }

    pub fn into_site(self, id: Uuid, now: Timestamp) -> Site {
        Site {
            id,
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            geofence_radius: self.geofence_radius.unwrap_or(DEFAULT_GEOFENCE_RADIUS),
            min_biometric_score: self.min_biometric_score,
            is_active: true,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewSite {
        NewSite {
            name: "Gate A".into(),
            address: "Mombasa Rd".into(),
            latitude: -1.3,
            longitude: 36.8,
            geofence_radius: None,
            min_biometric_score: None,
        }
    }

    #[test]
    fn defaults_radius_to_100_meters() {
        let site = sample().into_site(Uuid::nil(), chrono::Utc::now());
        assert_eq!(site.geofence_radius, 100);
        assert!(site.is_active);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let mut input = sample();
        input.geofence_radius = Some(0);
        assert!(input.validate().is_err());
    }
}
