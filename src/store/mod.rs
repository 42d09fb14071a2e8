//! Repository ports for every table the service touches.
//!
//! Services receive an explicit `Arc<dyn Store>`; nothing here is global.
//! Each method is a single write or read, there are no cross-table
//! transactions.

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::{
    attendance::{Attendance, ClockOutFields},
    audit_log::AuditLog,
    exception::{Exception, ExceptionReview},
    guard::Guard,
    post::Post,
    shift::{Shift, ShiftStatus},
    site::Site,
    user::{NewUser, User},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> AppResult<User>;
    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    /// Returns `true` only if the token existed and was still active.
    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<bool>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn active_sites(&self) -> AppResult<Vec<Site>>;
    async fn site_by_id(&self, id: Uuid) -> AppResult<Option<Site>>;
    async fn insert_site(&self, site: Site) -> AppResult<Site>;

    async fn active_posts_by_site(&self, site_id: Uuid) -> AppResult<Vec<Post>>;
    async fn post_by_id(&self, id: Uuid) -> AppResult<Option<Post>>;
    async fn insert_post(&self, post: Post) -> AppResult<Post>;

    async fn active_guards(&self) -> AppResult<Vec<Guard>>;
    async fn guard_by_id(&self, id: Uuid) -> AppResult<Option<Guard>>;
    async fn guard_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Guard>>;
    /// Fails with `Conflict` when the employee id or user is already bound.
    async fn insert_guard(&self, guard: Guard) -> AppResult<Guard>;

    /// Shifts whose scheduled start falls in `[from, to)`.
    async fn shifts_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Shift>>;
    async fn shift_by_id(&self, id: Uuid) -> AppResult<Option<Shift>>;
    async fn insert_shift(&self, shift: Shift) -> AppResult<Shift>;
    async fn set_shift_status(&self, id: Uuid, status: ShiftStatus) -> AppResult<bool>;
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Fails with `DuplicateClockIn` if the shift already has an open row.
    async fn insert_attendance(&self, attendance: Attendance) -> AppResult<Attendance>;
    async fn attendance_by_id(&self, id: Uuid) -> AppResult<Option<Attendance>>;
    async fn open_attendance_for_shift(&self, shift_id: Uuid) -> AppResult<Option<Attendance>>;
    async fn latest_attendance_for_guard(&self, guard_id: Uuid) -> AppResult<Option<Attendance>>;
    /// Sets the clock-out fields only if the row is still open.
    async fn close_attendance(&self, id: Uuid, fields: ClockOutFields) -> AppResult<bool>;
    /// Rows created in `[from, to)`, oldest first.
    async fn attendance_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>>;
}

#[async_trait]
pub trait ExceptionRepository: Send + Sync {
    async fn insert_exception(&self, exception: Exception) -> AppResult<Exception>;
    async fn exception_by_id(&self, id: Uuid) -> AppResult<Option<Exception>>;
    /// Applies the review only while the exception is not terminal.
    async fn review_exception(&self, id: Uuid, review: ExceptionReview) -> AppResult<bool>;
    /// Pending exceptions, newest first.
    async fn pending_exceptions(&self) -> AppResult<Vec<Exception>>;
    async fn exceptions_for_attendance(&self, attendance_id: Uuid) -> AppResult<Vec<Exception>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit_log(&self, entry: AuditLog) -> AppResult<()>;
    /// Newest first.
    async fn recent_audit_logs(&self, limit: u32) -> AppResult<Vec<AuditLog>>;
}

/// Everything the service persists, behind one handle.
pub trait Store:
    UserRepository
    + DirectoryRepository
    + AttendanceRepository
    + ExceptionRepository
    + AuditRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + DirectoryRepository
        + AttendanceRepository
        + ExceptionRepository
        + AuditRepository
{
}
