//! Seed data shared by unit and HTTP tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{
    Coordinates,
    attendance::{Attendance, ClockOutFields},
    audit_log::AuditLog,
    exception::{Exception, ExceptionReview},
    guard::{Guard, NewGuard},
    new_id,
    post::{NewPost, Post},
    role::Role,
    shift::{NewShift, Shift, ShiftStatus},
    site::{NewSite, Site},
    user::{NewUser, User},
};
use crate::store::{
    AttendanceRepository, AuditRepository, DirectoryRepository, ExceptionRepository, MemoryStore,
    Store, UserRepository,
};

/// The post every fixture guard is posted at.
pub fn nairobi() -> Coordinates {
    Coordinates {
        latitude: -1.283,
        longitude: 36.817,
    }
}

/// One guard user, scheduled on one shift at one post, starting `now`.
pub struct Fixture {
    pub user: User,
    pub site: Site,
    pub post: Post,
    pub guard: Guard,
    pub shift: Shift,
}

impl Fixture {
    pub async fn seed(store: Arc<dyn Store>, now: DateTime<Utc>) -> Self {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let user = store
            .create_user(
                NewUser {
                    username: format!("guard-{suffix}"),
                    password: "not-a-real-hash".into(),
                    email: format!("guard-{suffix}@example.com"),
                    role: Role::Guard,
                },
                now,
            )
            .await
            .unwrap();
        let site = insert_site(&store, None, now).await;
        let post = insert_post(&store, site.id, now).await;
        let guard = store
            .insert_guard(
                NewGuard {
                    user_id: user.id,
                    employee_id: format!("GRD-{suffix}"),
                    first_name: "Peter".into(),
                    last_name: "Ochieng".into(),
                    phone_number: None,
                    site_id: Some(site.id),
                    hourly_rate: Some(3.5),
                    biometric_ref: None,
                }
                .into_guard(new_id(), now),
            )
            .await
            .unwrap();
        let shift = insert_shift(&store, guard.id, post.id, now).await;

        Self {
            user,
            site,
            post,
            guard,
            shift,
        }
    }
}

/// A shift for the fixture guard at a new site with its own threshold.
pub async fn strict_site_shift(
    store: &Arc<dyn Store>,
    fx: &Fixture,
    min_biometric_score: u8,
    now: DateTime<Utc>,
) -> Shift {
    let site = insert_site(store, Some(min_biometric_score), now).await;
    let post = insert_post(store, site.id, now).await;
    insert_shift(store, fx.guard.id, post.id, now).await
}

async fn insert_site(store: &Arc<dyn Store>, min_score: Option<u8>, now: DateTime<Utc>) -> Site {
    let at = nairobi();
    store
        .insert_site(
            NewSite {
                name: "Westlands Office Park".into(),
                address: "Waiyaki Way".into(),
                latitude: at.latitude,
                longitude: at.longitude,
                geofence_radius: Some(100),
                min_biometric_score: min_score,
            }
            .into_site(new_id(), now),
        )
        .await
        .unwrap()
}

async fn insert_post(store: &Arc<dyn Store>, site_id: Uuid, now: DateTime<Utc>) -> Post {
    let at = nairobi();
    store
        .insert_post(
            NewPost {
                site_id,
                name: "Main Gate".into(),
                description: None,
                latitude: at.latitude,
                longitude: at.longitude,
            }
            .into_post(new_id(), now),
        )
        .await
        .unwrap()
}

async fn insert_shift(
    store: &Arc<dyn Store>,
    guard_id: Uuid,
    post_id: Uuid,
    now: DateTime<Utc>,
) -> Shift {
    store
        .insert_shift(
            NewShift {
                guard_id,
                post_id,
                scheduled_start: now,
                scheduled_end: now + Duration::hours(12),
            }
            .into_shift(new_id(), now),
        )
        .await
        .unwrap()
}

/// A `MemoryStore` whose exception and audit writes can be made to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_exception_writes: AtomicBool,
    pub fail_audit_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_exception_writes: AtomicBool::new(false),
            fail_audit_writes: AtomicBool::new(false),
        }
    }

    fn broken(flag: &AtomicBool) -> AppResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::Persistence("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for FlakyStore {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> AppResult<User> {
        self.inner.create_user(user, now).await
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.inner.user_by_id(id).await
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.inner.user_by_username(username).await
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.store_refresh_token(user_id, jti, expires_at).await
    }

    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<bool> {
        self.inner.revoke_refresh_token(jti).await
    }
}

#[async_trait]
impl DirectoryRepository for FlakyStore {
    async fn active_sites(&self) -> AppResult<Vec<Site>> {
        self.inner.active_sites().await
    }

    async fn site_by_id(&self, id: Uuid) -> AppResult<Option<Site>> {
        self.inner.site_by_id(id).await
    }

    async fn insert_site(&self, site: Site) -> AppResult<Site> {
        self.inner.insert_site(site).await
    }

    async fn active_posts_by_site(&self, site_id: Uuid) -> AppResult<Vec<Post>> {
        self.inner.active_posts_by_site(site_id).await
    }

    async fn post_by_id(&self, id: Uuid) -> AppResult<Option<Post>> {
        self.inner.post_by_id(id).await
    }

    async fn insert_post(&self, post: Post) -> AppResult<Post> {
        self.inner.insert_post(post).await
    }

    async fn active_guards(&self) -> AppResult<Vec<Guard>> {
        self.inner.active_guards().await
    }

    async fn guard_by_id(&self, id: Uuid) -> AppResult<Option<Guard>> {
        self.inner.guard_by_id(id).await
    }

    async fn guard_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Guard>> {
        self.inner.guard_by_user_id(user_id).await
    }

    async fn insert_guard(&self, guard: Guard) -> AppResult<Guard> {
        self.inner.insert_guard(guard).await
    }

    async fn shifts_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Shift>> {
        self.inner.shifts_starting_between(from, to).await
    }

    async fn shift_by_id(&self, id: Uuid) -> AppResult<Option<Shift>> {
        self.inner.shift_by_id(id).await
    }

    async fn insert_shift(&self, shift: Shift) -> AppResult<Shift> {
        self.inner.insert_shift(shift).await
    }

    async fn set_shift_status(&self, id: Uuid, status: ShiftStatus) -> AppResult<bool> {
        self.inner.set_shift_status(id, status).await
    }
}

#[async_trait]
impl AttendanceRepository for FlakyStore {
    async fn insert_attendance(&self, attendance: Attendance) -> AppResult<Attendance> {
        self.inner.insert_attendance(attendance).await
    }

    async fn attendance_by_id(&self, id: Uuid) -> AppResult<Option<Attendance>> {
        self.inner.attendance_by_id(id).await
    }

    async fn open_attendance_for_shift(&self, shift_id: Uuid) -> AppResult<Option<Attendance>> {
        self.inner.open_attendance_for_shift(shift_id).await
    }

    async fn latest_attendance_for_guard(&self, guard_id: Uuid) -> AppResult<Option<Attendance>> {
        self.inner.latest_attendance_for_guard(guard_id).await
    }

    async fn close_attendance(&self, id: Uuid, fields: ClockOutFields) -> AppResult<bool> {
        self.inner.close_attendance(id, fields).await
    }

    async fn attendance_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        self.inner.attendance_created_between(from, to).await
    }
}

#[async_trait]
impl ExceptionRepository for FlakyStore {
    async fn insert_exception(&self, exception: Exception) -> AppResult<Exception> {
        Self::broken(&self.fail_exception_writes)?;
        self.inner.insert_exception(exception).await
    }

    async fn exception_by_id(&self, id: Uuid) -> AppResult<Option<Exception>> {
        self.inner.exception_by_id(id).await
    }

    async fn review_exception(&self, id: Uuid, review: ExceptionReview) -> AppResult<bool> {
        self.inner.review_exception(id, review).await
    }

    async fn pending_exceptions(&self) -> AppResult<Vec<Exception>> {
        self.inner.pending_exceptions().await
    }

    async fn exceptions_for_attendance(&self, attendance_id: Uuid) -> AppResult<Vec<Exception>> {
        self.inner.exceptions_for_attendance(attendance_id).await
    }
}

#[async_trait]
impl AuditRepository for FlakyStore {
    async fn append_audit_log(&self, entry: AuditLog) -> AppResult<()> {
        Self::broken(&self.fail_audit_writes)?;
        self.inner.append_audit_log(entry).await
    }

    async fn recent_audit_logs(&self, limit: u32) -> AppResult<Vec<AuditLog>> {
        self.inner.recent_audit_logs(limit).await
    }
}
