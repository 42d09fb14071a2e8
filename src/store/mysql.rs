use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, MySqlPool, types::Json};
use uuid::Uuid;

use super::{
    AttendanceRepository, AuditRepository, DirectoryRepository, ExceptionRepository,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    attendance::{Attendance, ClockOutFields},
    audit_log::AuditLog,
    exception::{Exception, ExceptionReview},
    guard::Guard,
    new_id,
    post::Post,
    shift::{Shift, ShiftStatus},
    site::Site,
    user::{NewUser, User},
};

/// sqlx-backed store. Ids are `CHAR(36)`, timestamps `DATETIME(6)` in UTC.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Persistence(format!("invalid stored id {value}: {e}")))
}

fn opt_uuid(value: Option<String>) -> AppResult<Option<Uuid>> {
    value.as_deref().map(uuid).transpose()
}

fn parse<T: FromStr>(column: &str, value: &str) -> AppResult<T> {
    T::from_str(value)
        .map_err(|_| AppError::Persistence(format!("invalid stored {column}: {value}")))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// -------------------- Rows --------------------

#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    password: String,
    email: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> AppResult<Self> {
        Ok(User {
            id: uuid(&r.id)?,
            username: r.username,
            password: r.password,
            email: r.email,
            role: parse("role", &r.role)?,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SiteRow {
    id: String,
    name: String,
    address: String,
    latitude: f64,
    longitude: f64,
    geofence_radius: i32,
    min_biometric_score: Option<u8>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<SiteRow> for Site {
    type Error = AppError;

    fn try_from(r: SiteRow) -> AppResult<Self> {
        Ok(Site {
            id: uuid(&r.id)?,
            name: r.name,
            address: r.address,
            latitude: r.latitude,
            longitude: r.longitude,
            geofence_radius: r.geofence_radius,
            min_biometric_score: r.min_biometric_score,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct PostRow {
    id: String,
    site_id: String,
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = AppError;

    fn try_from(r: PostRow) -> AppResult<Self> {
        Ok(Post {
            id: uuid(&r.id)?,
            site_id: uuid(&r.site_id)?,
            name: r.name,
            description: r.description,
            latitude: r.latitude,
            longitude: r.longitude,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct GuardRow {
    id: String,
    user_id: String,
    employee_id: String,
    first_name: String,
    last_name: String,
    phone_number: Option<String>,
    site_id: Option<String>,
    hourly_rate: Option<f64>,
    biometric_ref: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<GuardRow> for Guard {
    type Error = AppError;

    fn try_from(r: GuardRow) -> AppResult<Self> {
        Ok(Guard {
            id: uuid(&r.id)?,
            user_id: uuid(&r.user_id)?,
            employee_id: r.employee_id,
            first_name: r.first_name,
            last_name: r.last_name,
            phone_number: r.phone_number,
            site_id: opt_uuid(r.site_id)?,
            hourly_rate: r.hourly_rate,
            biometric_ref: r.biometric_ref,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct ShiftRow {
    id: String,
    guard_id: String,
    post_id: String,
    scheduled_start: DateTime<Utc>,
    scheduled_end: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = AppError;

    fn try_from(r: ShiftRow) -> AppResult<Self> {
        Ok(Shift {
            id: uuid(&r.id)?,
            guard_id: uuid(&r.guard_id)?,
            post_id: uuid(&r.post_id)?,
            scheduled_start: r.scheduled_start,
            scheduled_end: r.scheduled_end,
            status: parse("shift status", &r.status)?,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: String,
    shift_id: String,
    guard_id: String,
    clock_in_time: Option<DateTime<Utc>>,
    clock_out_time: Option<DateTime<Utc>>,
    clock_in_latitude: Option<f64>,
    clock_in_longitude: Option<f64>,
    clock_out_latitude: Option<f64>,
    clock_out_longitude: Option<f64>,
    clock_in_biometric_score: Option<u8>,
    clock_out_biometric_score: Option<u8>,
    status: String,
    notes: Option<String>,
    verified_by: Option<String>,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = AppError;

    fn try_from(r: AttendanceRow) -> AppResult<Self> {
        Ok(Attendance {
            id: uuid(&r.id)?,
            shift_id: uuid(&r.shift_id)?,
            guard_id: uuid(&r.guard_id)?,
            clock_in_time: r.clock_in_time,
            clock_out_time: r.clock_out_time,
            clock_in_latitude: r.clock_in_latitude,
            clock_in_longitude: r.clock_in_longitude,
            clock_out_latitude: r.clock_out_latitude,
            clock_out_longitude: r.clock_out_longitude,
            clock_in_biometric_score: r.clock_in_biometric_score,
            clock_out_biometric_score: r.clock_out_biometric_score,
            status: parse("attendance status", &r.status)?,
            notes: r.notes,
            verified_by: opt_uuid(r.verified_by)?,
            verified_at: r.verified_at,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExceptionRow {
    id: String,
    attendance_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    description: String,
    severity: String,
    status: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    resolution: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExceptionRow> for Exception {
    type Error = AppError;

    fn try_from(r: ExceptionRow) -> AppResult<Self> {
        Ok(Exception {
            id: uuid(&r.id)?,
            attendance_id: uuid(&r.attendance_id)?,
            kind: parse("exception type", &r.kind)?,
            description: r.description,
            severity: parse("severity", &r.severity)?,
            status: parse("exception status", &r.status)?,
            reviewed_by: opt_uuid(r.reviewed_by)?,
            reviewed_at: r.reviewed_at,
            resolution: r.resolution,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct AuditLogRow {
    id: String,
    user_id: Option<String>,
    action: String,
    resource: String,
    resource_id: Option<String>,
    details: Option<Json<Value>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    result: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLog {
    type Error = AppError;

    fn try_from(r: AuditLogRow) -> AppResult<Self> {
        Ok(AuditLog {
            id: uuid(&r.id)?,
            user_id: opt_uuid(r.user_id)?,
            action: r.action,
            resource: r.resource,
            resource_id: opt_uuid(r.resource_id)?,
            details: r.details.map(|Json(v)| v),
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            result: parse("audit result", &r.result)?,
            created_at: r.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const USER_COLUMNS: &str =
    "id, username, password, email, role, is_active, created_at, updated_at";
const SITE_COLUMNS: &str = "id, name, address, latitude, longitude, geofence_radius, \
     min_biometric_score, is_active, created_at";
const POST_COLUMNS: &str =
    "id, site_id, name, description, latitude, longitude, is_active, created_at";
const GUARD_COLUMNS: &str = "id, user_id, employee_id, first_name, last_name, phone_number, \
     site_id, hourly_rate, biometric_ref, is_active, created_at";
const SHIFT_COLUMNS: &str =
    "id, guard_id, post_id, scheduled_start, scheduled_end, status, created_at";
const ATTENDANCE_COLUMNS: &str = "id, shift_id, guard_id, clock_in_time, clock_out_time, \
     clock_in_latitude, clock_in_longitude, clock_out_latitude, clock_out_longitude, \
     clock_in_biometric_score, clock_out_biometric_score, status, notes, verified_by, \
     verified_at, created_at";
const EXCEPTION_COLUMNS: &str = "id, attendance_id, type, description, severity, status, \
     reviewed_by, reviewed_at, resolution, created_at";
const AUDIT_COLUMNS: &str = "id, user_id, action, resource, resource_id, details, ip_address, \
     user_agent, result, created_at";

// -------------------- Users --------------------

#[async_trait]
impl UserRepository for MySqlStore {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> AppResult<User> {
        let id = new_id();
        let result = sqlx::query(
            r#"
            INSERT INTO users
            (id, username, password, email, role, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(user.role.as_ref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                id,
                username: user.username,
                password: user.password,
                email: user.email,
                role: user.role,
                is_active: true,
                created_at: now,
                updated_at: now,
            }),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Username already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id.to_string())
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        // non-fatal, only used for reporting
        if let Err(e) = sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %e, %user_id, "Failed to update last_login_at");
        }
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
        )
        .bind(jti)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// -------------------- Sites, posts, guards, shifts --------------------

#[async_trait]
impl DirectoryRepository for MySqlStore {
    async fn active_sites(&self) -> AppResult<Vec<Site>> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites \
             WHERE is_active = TRUE ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, SiteRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn site_by_id(&self, id: Uuid) -> AppResult<Option<Site>> {
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?");
        sqlx::query_as::<_, SiteRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Site::try_from)
            .transpose()
    }

    async fn insert_site(&self, site: Site) -> AppResult<Site> {
        sqlx::query(
            r#"
            INSERT INTO sites
            (id, name, address, latitude, longitude, geofence_radius, min_biometric_score,
             is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(site.id.to_string())
        .bind(&site.name)
        .bind(&site.address)
        .bind(site.latitude)
        .bind(site.longitude)
        .bind(site.geofence_radius)
        .bind(site.min_biometric_score)
        .bind(site.is_active)
        .bind(site.created_at)
        .execute(&self.pool)
        .await?;
        Ok(site)
    }

    async fn active_posts_by_site(&self, site_id: Uuid) -> AppResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE site_id = ? AND is_active = TRUE ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(site_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn post_by_id(&self, id: Uuid) -> AppResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn insert_post(&self, post: Post) -> AppResult<Post> {
        sqlx::query(
            r#"
            INSERT INTO posts
            (id, site_id, name, description, latitude, longitude, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id.to_string())
        .bind(post.site_id.to_string())
        .bind(&post.name)
        .bind(&post.description)
        .bind(post.latitude)
        .bind(post.longitude)
        .bind(post.is_active)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;
        Ok(post)
    }

    async fn active_guards(&self) -> AppResult<Vec<Guard>> {
        let sql = format!(
            "SELECT {GUARD_COLUMNS} FROM guards \
             WHERE is_active = TRUE ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, GuardRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn guard_by_id(&self, id: Uuid) -> AppResult<Option<Guard>> {
        let sql = format!("SELECT {GUARD_COLUMNS} FROM guards WHERE id = ?");
        sqlx::query_as::<_, GuardRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Guard::try_from)
            .transpose()
    }

    async fn guard_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Guard>> {
        let sql = format!("SELECT {GUARD_COLUMNS} FROM guards WHERE user_id = ?");
        sqlx::query_as::<_, GuardRow>(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Guard::try_from)
            .transpose()
    }

    async fn insert_guard(&self, guard: Guard) -> AppResult<Guard> {
        let result = sqlx::query(
            r#"
            INSERT INTO guards
            (id, user_id, employee_id, first_name, last_name, phone_number, site_id,
             hourly_rate, biometric_ref, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(guard.id.to_string())
        .bind(guard.user_id.to_string())
        .bind(&guard.employee_id)
        .bind(&guard.first_name)
        .bind(&guard.last_name)
        .bind(&guard.phone_number)
        .bind(guard.site_id.map(|id| id.to_string()))
        .bind(guard.hourly_rate)
        .bind(&guard.biometric_ref)
        .bind(guard.is_active)
        .bind(guard.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(guard),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Guard profile already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn shifts_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Shift>> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts \
             WHERE scheduled_start >= ? AND scheduled_start < ? ORDER BY scheduled_start"
        );
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn shift_by_id(&self, id: Uuid) -> AppResult<Option<Shift>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
        sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Shift::try_from)
            .transpose()
    }

    async fn insert_shift(&self, shift: Shift) -> AppResult<Shift> {
        sqlx::query(
            r#"
            INSERT INTO shifts
            (id, guard_id, post_id, scheduled_start, scheduled_end, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(shift.id.to_string())
        .bind(shift.guard_id.to_string())
        .bind(shift.post_id.to_string())
        .bind(shift.scheduled_start)
        .bind(shift.scheduled_end)
        .bind(shift.status.as_ref())
        .bind(shift.created_at)
        .execute(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn set_shift_status(&self, id: Uuid, status: ShiftStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE shifts SET status = ? WHERE id = ?")
            .bind(status.as_ref())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -------------------- Attendance --------------------

#[async_trait]
impl AttendanceRepository for MySqlStore {
    async fn insert_attendance(&self, attendance: Attendance) -> AppResult<Attendance> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (id, shift_id, guard_id, clock_in_time, clock_out_time,
             clock_in_latitude, clock_in_longitude, clock_out_latitude, clock_out_longitude,
             clock_in_biometric_score, clock_out_biometric_score, status, notes,
             verified_by, verified_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attendance.id.to_string())
        .bind(attendance.shift_id.to_string())
        .bind(attendance.guard_id.to_string())
        .bind(attendance.clock_in_time)
        .bind(attendance.clock_out_time)
        .bind(attendance.clock_in_latitude)
        .bind(attendance.clock_in_longitude)
        .bind(attendance.clock_out_latitude)
        .bind(attendance.clock_out_longitude)
        .bind(attendance.clock_in_biometric_score)
        .bind(attendance.clock_out_biometric_score)
        .bind(attendance.status.as_ref())
        .bind(&attendance.notes)
        .bind(attendance.verified_by.map(|id| id.to_string()))
        .bind(attendance.verified_at)
        .bind(attendance.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(attendance),
            // attendance_open_shift_uq: the loser of a concurrent clock-in
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateClockIn {
                shift_id: attendance.shift_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn attendance_by_id(&self, id: Uuid) -> AppResult<Option<Attendance>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn open_attendance_for_shift(&self, shift_id: Uuid) -> AppResult<Option<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE shift_id = ? AND clock_out_time IS NULL LIMIT 1"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(shift_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn latest_attendance_for_guard(&self, guard_id: Uuid) -> AppResult<Option<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE guard_id = ? ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(guard_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn close_attendance(&self, id: Uuid, fields: ClockOutFields) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET clock_out_time = ?,
                clock_out_latitude = ?,
                clock_out_longitude = ?,
                clock_out_biometric_score = ?
            WHERE id = ?
            AND clock_out_time IS NULL
            "#,
        )
        .bind(fields.time)
        .bind(fields.position.latitude)
        .bind(fields.position.longitude)
        .bind(fields.biometric_score)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn attendance_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE created_at >= ? AND created_at < ? ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }
}

// -------------------- Exceptions --------------------

#[async_trait]
impl ExceptionRepository for MySqlStore {
    async fn insert_exception(&self, exception: Exception) -> AppResult<Exception> {
        sqlx::query(
            r#"
            INSERT INTO exceptions
            (id, attendance_id, type, description, severity, status,
             reviewed_by, reviewed_at, resolution, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(exception.id.to_string())
        .bind(exception.attendance_id.to_string())
        .bind(exception.kind.as_ref())
        .bind(&exception.description)
        .bind(exception.severity.as_ref())
        .bind(exception.status.as_ref())
        .bind(exception.reviewed_by.map(|id| id.to_string()))
        .bind(exception.reviewed_at)
        .bind(&exception.resolution)
        .bind(exception.created_at)
        .execute(&self.pool)
        .await?;
        Ok(exception)
    }

    async fn exception_by_id(&self, id: Uuid) -> AppResult<Option<Exception>> {
        let sql = format!("SELECT {EXCEPTION_COLUMNS} FROM exceptions WHERE id = ?");
        sqlx::query_as::<_, ExceptionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Exception::try_from)
            .transpose()
    }

    async fn review_exception(&self, id: Uuid, review: ExceptionReview) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE exceptions
            SET status = ?, resolution = ?, reviewed_by = ?, reviewed_at = ?
            WHERE id = ?
            AND status IN ('pending', 'reviewed')
            "#,
        )
        .bind(review.status.as_ref())
        .bind(&review.resolution)
        .bind(review.reviewed_by.to_string())
        .bind(review.reviewed_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn pending_exceptions(&self) -> AppResult<Vec<Exception>> {
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM exceptions \
             WHERE status = 'pending' ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ExceptionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn exceptions_for_attendance(&self, attendance_id: Uuid) -> AppResult<Vec<Exception>> {
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM exceptions WHERE attendance_id = ? ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, ExceptionRow>(&sql)
            .bind(attendance_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }
}

// -------------------- Audit logs --------------------

#[async_trait]
impl AuditRepository for MySqlStore {
    async fn append_audit_log(&self, entry: AuditLog) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
            (id, user_id, action, resource, resource_id, details, ip_address, user_agent, result,
             created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.map(|id| id.to_string()))
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(entry.resource_id.map(|id| id.to_string()))
        .bind(entry.details.map(Json))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.result.as_ref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_audit_logs(&self, limit: u32) -> AppResult<Vec<AuditLog>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             ORDER BY created_at DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, AuditLogRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }
}
