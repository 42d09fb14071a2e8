use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, http::header};
use futures::future::{Ready, ready};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::role::Role;
use crate::service::workflow::Actor;

/// The caller behind a validated access token, placed in request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Authentication required".into())),
        )
    }
}

impl AuthUser {
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            let allowed: Vec<&str> = roles.iter().map(|r| r.as_ref()).collect();
            tracing::info!(username = %self.username, role = %self.role, "Role check refused");
            Err(AppError::Forbidden(format!("Requires role: {}", allowed.join(" or "))))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require_any(&[Role::Admin])
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        self.require_any(&[Role::Hr, Role::Admin])
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        self.require_any(&[Role::Supervisor, Role::Hr, Role::Admin])
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

/// `Authorization: Bearer <token>`, if present and well formed.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}
