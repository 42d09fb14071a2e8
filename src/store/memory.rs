use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AttendanceRepository, AuditRepository, DirectoryRepository, ExceptionRepository,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    attendance::{Attendance, ClockOutFields},
    audit_log::AuditLog,
    exception::{Exception, ExceptionReview, ExceptionStatus},
    guard::Guard,
    new_id,
    post::Post,
    shift::{Shift, ShiftStatus},
    site::Site,
    user::{NewUser, User},
};

struct RefreshToken {
    jti: String,
    revoked: bool,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    sites: Vec<Site>,
    posts: Vec<Post>,
    guards: Vec<Guard>,
    shifts: Vec<Shift>,
    attendance: Vec<Attendance>,
    exceptions: Vec<Exception>,
    audit_logs: Vec<AuditLog>,
}

fn missing_reference() -> AppError {
    AppError::validation("Referenced record does not exist")
}

/// Process-local store used by tests and when no database is configured.
///
/// A single lock guards all tables, so the open-attendance check and the
/// insert happen atomically, the same guarantee the MySQL unique key gives.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> AppResult<User> {
        let mut t = self.tables.write().await;
        if t.users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        let created = User {
            id: new_id(),
            username: user.username,
            password: user.password,
            email: user.email,
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn store_refresh_token(
        &self,
        _user_id: Uuid,
        jti: &str,
        _expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut t = self.tables.write().await;
        t.refresh_tokens.push(RefreshToken {
            jti: jti.to_string(),
            revoked: false,
        });
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t
            .refresh_tokens
            .iter_mut()
            .find(|r| r.jti == jti && !r.revoked)
        {
            Some(token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn active_sites(&self) -> AppResult<Vec<Site>> {
        let t = self.tables.read().await;
        Ok(t.sites.iter().filter(|s| s.is_active).cloned().collect())
    }

    async fn site_by_id(&self, id: Uuid) -> AppResult<Option<Site>> {
        let t = self.tables.read().await;
        Ok(t.sites.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_site(&self, site: Site) -> AppResult<Site> {
        let mut t = self.tables.write().await;
        t.sites.push(site.clone());
        Ok(site)
    }

    async fn active_posts_by_site(&self, site_id: Uuid) -> AppResult<Vec<Post>> {
        let t = self.tables.read().await;
        Ok(t.posts
            .iter()
            .filter(|p| p.site_id == site_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn post_by_id(&self, id: Uuid) -> AppResult<Option<Post>> {
        let t = self.tables.read().await;
        Ok(t.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_post(&self, post: Post) -> AppResult<Post> {
        let mut t = self.tables.write().await;
        if !t.sites.iter().any(|s| s.id == post.site_id) {
            return Err(missing_reference());
        }
        t.posts.push(post.clone());
        Ok(post)
    }

    async fn active_guards(&self) -> AppResult<Vec<Guard>> {
        let t = self.tables.read().await;
        Ok(t.guards.iter().filter(|g| g.is_active).cloned().collect())
    }

    async fn guard_by_id(&self, id: Uuid) -> AppResult<Option<Guard>> {
        let t = self.tables.read().await;
        Ok(t.guards.iter().find(|g| g.id == id).cloned())
    }

    async fn guard_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Guard>> {
        let t = self.tables.read().await;
        Ok(t.guards.iter().find(|g| g.user_id == user_id).cloned())
    }

    async fn insert_guard(&self, guard: Guard) -> AppResult<Guard> {
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == guard.user_id) {
            return Err(missing_reference());
        }
        if let Some(site_id) = guard.site_id {
            if !t.sites.iter().any(|s| s.id == site_id) {
                return Err(missing_reference());
            }
        }
        if t.guards
            .iter()
            .any(|g| g.employee_id == guard.employee_id || g.user_id == guard.user_id)
        {
            return Err(AppError::Conflict("Guard profile already exists".into()));
        }
        t.guards.push(guard.clone());
        Ok(guard)
    }

    async fn shifts_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Shift>> {
        let t = self.tables.read().await;
        Ok(t.shifts
            .iter()
            .filter(|s| s.scheduled_start >= from && s.scheduled_start < to)
            .cloned()
            .collect())
    }

    async fn shift_by_id(&self, id: Uuid) -> AppResult<Option<Shift>> {
        let t = self.tables.read().await;
        Ok(t.shifts.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_shift(&self, shift: Shift) -> AppResult<Shift> {
        let mut t = self.tables.write().await;
        if !t.guards.iter().any(|g| g.id == shift.guard_id)
            || !t.posts.iter().any(|p| p.id == shift.post_id)
        {
            return Err(missing_reference());
        }
        t.shifts.push(shift.clone());
        Ok(shift)
    }

    async fn set_shift_status(&self, id: Uuid, status: ShiftStatus) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t.shifts.iter_mut().find(|s| s.id == id) {
            Some(shift) => {
                shift.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AttendanceRepository for MemoryStore {
    async fn insert_attendance(&self, attendance: Attendance) -> AppResult<Attendance> {
        let mut t = self.tables.write().await;
        if !t.shifts.iter().any(|s| s.id == attendance.shift_id)
            || !t.guards.iter().any(|g| g.id == attendance.guard_id)
        {
            return Err(missing_reference());
        }
        if t.attendance
            .iter()
            .any(|a| a.shift_id == attendance.shift_id && a.clock_out_time.is_none())
        {
            return Err(AppError::DuplicateClockIn {
                shift_id: attendance.shift_id,
            });
        }
        t.attendance.push(attendance.clone());
        Ok(attendance)
    }

    async fn attendance_by_id(&self, id: Uuid) -> AppResult<Option<Attendance>> {
        let t = self.tables.read().await;
        Ok(t.attendance.iter().find(|a| a.id == id).cloned())
    }

    async fn open_attendance_for_shift(&self, shift_id: Uuid) -> AppResult<Option<Attendance>> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .iter()
            .find(|a| a.shift_id == shift_id && a.clock_out_time.is_none())
            .cloned())
    }

    async fn latest_attendance_for_guard(&self, guard_id: Uuid) -> AppResult<Option<Attendance>> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .iter()
            .filter(|a| a.guard_id == guard_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn close_attendance(&self, id: Uuid, fields: ClockOutFields) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t
            .attendance
            .iter_mut()
            .find(|a| a.id == id && a.clock_out_time.is_none())
        {
            Some(row) => {
                row.clock_out_time = Some(fields.time);
                row.clock_out_latitude = Some(fields.position.latitude);
                row.clock_out_longitude = Some(fields.position.longitude);
                row.clock_out_biometric_score = Some(fields.biometric_score);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn attendance_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .iter()
            .filter(|a| a.created_at >= from && a.created_at < to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExceptionRepository for MemoryStore {
    async fn insert_exception(&self, exception: Exception) -> AppResult<Exception> {
        let mut t = self.tables.write().await;
        if !t.attendance.iter().any(|a| a.id == exception.attendance_id) {
            return Err(missing_reference());
        }
        t.exceptions.push(exception.clone());
        Ok(exception)
    }

    async fn exception_by_id(&self, id: Uuid) -> AppResult<Option<Exception>> {
        let t = self.tables.read().await;
        Ok(t.exceptions.iter().find(|e| e.id == id).cloned())
    }

    async fn review_exception(&self, id: Uuid, review: ExceptionReview) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t
            .exceptions
            .iter_mut()
            .find(|e| e.id == id && !e.status.is_terminal())
        {
            Some(row) => {
                row.status = review.status;
                row.resolution = review.resolution;
                row.reviewed_by = Some(review.reviewed_by);
                row.reviewed_at = Some(review.reviewed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending_exceptions(&self) -> AppResult<Vec<Exception>> {
        let t = self.tables.read().await;
        let mut pending: Vec<Exception> = t
            .exceptions
            .iter()
            .rev()
            .filter(|e| e.status == ExceptionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn exceptions_for_attendance(&self, attendance_id: Uuid) -> AppResult<Vec<Exception>> {
        let t = self.tables.read().await;
        Ok(t.exceptions
            .iter()
            .filter(|e| e.attendance_id == attendance_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append_audit_log(&self, entry: AuditLog) -> AppResult<()> {
        let mut t = self.tables.write().await;
        t.audit_logs.push(entry);
        Ok(())
    }

    async fn recent_audit_logs(&self, limit: u32) -> AppResult<Vec<AuditLog>> {
        let t = self.tables.read().await;
        let mut logs: Vec<AuditLog> = t.audit_logs.iter().rev().cloned().collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit as usize);
        Ok(logs)
    }
}
