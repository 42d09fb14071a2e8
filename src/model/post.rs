use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Coordinates, Timestamp, require_text};
use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub site_id: Uuid,
    #[schema(example = "Main Gate")]
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

impl Post {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub site_id: Uuid,
    #[schema(example = "Main Gate")]
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewPost {
    pub fn validate(&self) -> AppResult<()> {
        require_text("name", &self.name)?;
        Coordinates::new(self.latitude, self.longitude)?;
        Ok(())
    }

    pub fn into_post(self, id: Uuid, now: Timestamp) -> Post {
        Post {
            id,
            site_id: self.site_id,
            name: self.name.trim().to_string(),
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            is_active: true,
            created_at: now,
        }
    }
}
