use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[derive(EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    Guard,
    Supervisor,
    Hr,
    Admin,
}

impl Role {
    /// Supervisors, HR and admins may act on other guards' records.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Guard)
    }
}
