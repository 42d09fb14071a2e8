use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use uuid::Uuid;

/// Every failure a request can end in. Rendered as `{"error": "..."}`.
#[derive(Debug, Clone, Display, PartialEq)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{} {} not found", entity, id)]
    NotFound { entity: &'static str, id: String },

    #[display(fmt = "Shift {} already has an open attendance", shift_id)]
    DuplicateClockIn { shift_id: Uuid },

    #[display(fmt = "Attendance {} is already clocked out", attendance_id)]
    AlreadyClosed { attendance_id: Uuid },

    #[display(fmt = "Clock-out time is earlier than clock-in time")]
    ClockOutBeforeClockIn,

    #[display(fmt = "Cannot move exception from {} to {}", from, to)]
    InvalidTransition { from: String, to: String },

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Persistence error: {}", _0)]
    Persistence(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl std::error::Error for AppError {}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Entities named in a request body are a bad request, not a missing route.
    pub fn into_reference_error(self) -> Self {
        match self {
            AppError::NotFound { entity, id } => {
                AppError::Validation(format!("Unknown {} {}", entity.to_lowercase(), id))
            }
            other => other,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateClockIn { .. }
            | AppError::AlreadyClosed { .. }
            | AppError::ClockOutBeforeClockIn
            | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // store internals stay in the log
        let message = match self {
            AppError::Persistence(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_foreign_key_violation() {
                return AppError::Validation("Referenced record does not exist".into());
            }
        }
        tracing::error!(error = %e, "Database error");
        AppError::Persistence(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Persistence(e.to_string())
    }
}
