//! Clock-in/clock-out orchestration.
//!
//! policy -> ledger -> exception flags -> audit -> notify. Each step is its
//! own write. A failed flag does not undo the attendance row, and the audit
//! entry is attempted whatever happened before it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Clock;
use super::audit::{AuditEntry, AuditSink, RequestOrigin, actions, with_error};
use super::geofence::GeofenceCheck;
use super::ledger::AttendanceLedger;
use super::notifier::Notifier;
use super::policy::{BiometricCapture, ReportedScore, decide};
use super::recorder::ExceptionRecorder;
use crate::error::{AppError, AppResult};
use crate::model::{
    Coordinates,
    attendance::Attendance,
    audit_log::AuditResult,
    exception::{Exception, ExceptionType, Severity},
    role::Role,
    shift::{Shift, ShiftStatus},
};
use crate::store::Store;
use crate::utils::site_cache::{PostSite, SiteCache};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClockInRequest {
    pub shift_id: Uuid,
    #[schema(example = -1.283)]
    pub latitude: f64,
    #[schema(example = 36.817)]
    pub longitude: f64,
    /// Match confidence reported by the capture device, 0-100.
    #[schema(example = 92)]
    pub biometric_score: f64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClockOutRequest {
    pub attendance_id: Uuid,
    #[schema(example = -1.283)]
    pub latitude: f64,
    #[schema(example = 36.817)]
    pub longitude: f64,
    #[schema(example = 90)]
    pub biometric_score: f64,
}

/// The authenticated user a clock request is made on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub default_threshold: u8,
    pub geofence_enforced: bool,
    pub late_grace: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_threshold: super::policy::DEFAULT_THRESHOLD,
            geofence_enforced: true,
            late_grace: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClockOutcome {
    pub attendance: Attendance,
    pub exceptions: Vec<Exception>,
}

/// What the steps after the ledger produced, successful or not.
struct Steps {
    attendance: Attendance,
    exceptions: Vec<Exception>,
    flag_errors: Vec<String>,
}

struct Flag {
    kind: ExceptionType,
    description: String,
    severity: Severity,
}

pub struct ClockWorkflow {
    store: Arc<dyn Store>,
    ledger: AttendanceLedger,
    recorder: ExceptionRecorder,
    audit: AuditSink,
    notifier: Arc<Notifier>,
    sites: SiteCache,
    settings: WorkflowSettings,
    clock: Arc<dyn Clock>,
}

impl ClockWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<Notifier>,
        sites: SiteCache,
        settings: WorkflowSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger: AttendanceLedger::new(store.clone()),
            recorder: ExceptionRecorder::new(store.clone()),
            audit: AuditSink::new(store.clone()),
            store,
            notifier,
            sites,
            settings,
            clock,
        }
    }

    #[instrument(skip_all, fields(shift_id = %request.shift_id, user_id = %actor.user_id))]
    pub async fn process_clock_in(
        &self,
        actor: &Actor,
        origin: &RequestOrigin,
        request: ClockInRequest,
    ) -> AppResult<ClockOutcome> {
        let now = self.clock.now();
        let details = json!({
            "shiftId": request.shift_id,
            "latitude": request.latitude,
            "longitude": request.longitude,
            "biometricScore": request.biometric_score,
        });

        let steps = self.clock_in_steps(actor, &request, now).await;
        self.finish(actions::CLOCK_IN, origin, details, steps, now).await
    }

    #[instrument(
        skip_all,
        fields(attendance_id = %request.attendance_id, user_id = %actor.user_id)
    )]
    pub async fn process_clock_out(
        &self,
        actor: &Actor,
        origin: &RequestOrigin,
        request: ClockOutRequest,
    ) -> AppResult<ClockOutcome> {
        let now = self.clock.now();
        let details = json!({
            "attendanceId": request.attendance_id,
            "latitude": request.latitude,
            "longitude": request.longitude,
            "biometricScore": request.biometric_score,
        });

        let steps = self.clock_out_steps(actor, &request, now).await;
        self.finish(actions::CLOCK_OUT, origin, details, steps, now).await
    }

    async fn clock_in_steps(
        &self,
        actor: &Actor,
        request: &ClockInRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Steps> {
        let position = Coordinates::new(request.latitude, request.longitude)?;
        let score = ReportedScore(request.biometric_score).capture()?;

        let shift = self
            .store
            .shift_by_id(request.shift_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift", request.shift_id))
            .map_err(AppError::into_reference_error)?;
        match shift.status {
            ShiftStatus::Cancelled => return Err(AppError::validation("Shift has been cancelled")),
            ShiftStatus::Completed => {
                return Err(AppError::validation("Shift has already been completed"));
            }
            ShiftStatus::Scheduled | ShiftStatus::Active => {}
        }
        self.authorize(actor, shift.guard_id).await?;
        let ctx = self.context(&shift).await?;

        let threshold = ctx
            .site
            .min_biometric_score
            .unwrap_or(self.settings.default_threshold);
        let verdict = decide(score, threshold);

        let attendance = self
            .ledger
            .clock_in(shift.id, shift.guard_id, position, score, verdict, now)
            .await?;

        let mut flags = Vec::new();
        if !verdict.accepted {
            flags.push(Flag {
                kind: ExceptionType::LowBiometricScore,
                description: format!(
                    "Biometric match score {score}% below threshold {threshold}%"
                ),
                severity: Severity::Medium,
            });
        }
        flags.extend(self.geofence_flag("Clock-in", position, &ctx));
        let late_by = now - shift.scheduled_start;
        if late_by > self.settings.late_grace {
            flags.push(Flag {
                kind: ExceptionType::LateArrival,
                description: format!(
                    "Clocked in {} minutes after scheduled start",
                    late_by.num_minutes()
                ),
                severity: Severity::Low,
            });
        }

        let steps = self.raise(attendance, flags, now).await;
        self.move_shift(shift.id, ShiftStatus::Active).await;
        Ok(steps)
    }

    async fn clock_out_steps(
        &self,
        actor: &Actor,
        request: &ClockOutRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Steps> {
        let position = Coordinates::new(request.latitude, request.longitude)?;
        // The checkout score is stored but not held against the threshold.
        let score = ReportedScore(request.biometric_score).capture()?;

        let current = self
            .store
            .attendance_by_id(request.attendance_id)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance", request.attendance_id))
            .map_err(AppError::into_reference_error)?;
        self.authorize(actor, current.guard_id).await?;
        let shift = self
            .store
            .shift_by_id(current.shift_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shift", current.shift_id))?;
        let ctx = self.context(&shift).await?;

        let attendance = self
            .ledger
            .clock_out(current.id, position, score, now)
            .await?;

        let flags: Vec<Flag> = self
            .geofence_flag("Clock-out", position, &ctx)
            .into_iter()
            .collect();
        let steps = self.raise(attendance, flags, now).await;
        self.move_shift(shift.id, ShiftStatus::Completed).await;
        Ok(steps)
    }

    /// Guards may only act on their own shifts; staff may act on any.
    async fn authorize(&self, actor: &Actor, guard_id: Uuid) -> AppResult<()> {
        if actor.role != Role::Guard {
            return Ok(());
        }
        match self.store.guard_by_user_id(actor.user_id).await? {
            Some(profile) if profile.id == guard_id => Ok(()),
            _ => Err(AppError::Forbidden("Shift is not assigned to you".into())),
        }
    }

    async fn context(&self, shift: &Shift) -> AppResult<PostSite> {
        self.sites
            .for_post(shift.post_id)
            .await
            .map_err(AppError::into_reference_error)
    }

    fn geofence_flag(&self, step: &str, position: Coordinates, ctx: &PostSite) -> Option<Flag> {
        if !self.settings.geofence_enforced {
            return None;
        }
        let check =
            GeofenceCheck::evaluate(position, ctx.post.coordinates(), ctx.site.geofence_radius);
        check.is_violation().then(|| Flag {
            kind: ExceptionType::GeofenceViolation,
            description: format!(
                "{step} {:.0} m from post {}, allowed radius {} m",
                check.distance_m, ctx.post.name, check.radius_m
            ),
            severity: Severity::Medium,
        })
    }

    async fn raise(&self, attendance: Attendance, flags: Vec<Flag>, now: DateTime<Utc>) -> Steps {
        let mut exceptions = Vec::new();
        let mut flag_errors = Vec::new();
        for flag in flags {
            match self
                .recorder
                .flag(attendance.id, flag.kind, flag.description, Some(flag.severity), now)
                .await
            {
                Ok(exception) => exceptions.push(exception),
                Err(e) => {
                    warn!(
                        attendance_id = %attendance.id,
                        kind = %flag.kind,
                        error = %e,
                        "Failed to flag exception"
                    );
                    flag_errors.push(format!("{}: {e}", flag.kind));
                }
            }
        }
        Steps {
            attendance,
            exceptions,
            flag_errors,
        }
    }

    async fn move_shift(&self, shift_id: Uuid, status: ShiftStatus) {
        match self.store.set_shift_status(shift_id, status).await {
            Ok(true) => {}
            Ok(false) => warn!(%shift_id, status = %status, "Shift vanished before status update"),
            Err(e) => {
                warn!(%shift_id, status = %status, error = %e, "Failed to update shift status");
            }
        }
    }

    /// Audits a request that was refused before any step ran, such as a
    /// body that does not deserialize. Hands the error back.
    pub async fn reject(
        &self,
        action: &'static str,
        origin: &RequestOrigin,
        details: Value,
        error: AppError,
    ) -> AppError {
        let entry = failure_entry(action, details, &error);
        self.audit.record(origin, entry, self.clock.now()).await;
        error
    }

    /// Audits exactly once, then notifies on success.
    async fn finish(
        &self,
        action: &'static str,
        origin: &RequestOrigin,
        details: Value,
        steps: AppResult<Steps>,
        now: DateTime<Utc>,
    ) -> AppResult<ClockOutcome> {
        let entry = match &steps {
            Ok(s) => {
                let mut details = details;
                if let Some(map) = details.as_object_mut() {
                    map.insert("status".into(), json!(s.attendance.status));
                    let ids: Vec<Uuid> = s.exceptions.iter().map(|e| e.id).collect();
                    map.insert("exceptionIds".into(), json!(ids));
                    if !s.flag_errors.is_empty() {
                        map.insert("flagErrors".into(), json!(s.flag_errors));
                    }
                }
                AuditEntry {
                    action,
                    resource: "Attendance",
                    resource_id: Some(s.attendance.id),
                    details: Some(details),
                    result: if s.flag_errors.is_empty() {
                        AuditResult::Success
                    } else {
                        AuditResult::Failure
                    },
                }
            }
            Err(e) => failure_entry(action, details, e),
        };
        self.audit.record(origin, entry, now).await;

        let steps = steps?;
        info!(
            attendance_id = %steps.attendance.id,
            status = %steps.attendance.status,
            exceptions = steps.exceptions.len(),
            action,
            "Clock request processed"
        );
        self.notifier.publish_attendance(&steps.attendance, now).await;
        for exception in &steps.exceptions {
            self.notifier.publish_exception(exception, now).await;
        }

        Ok(ClockOutcome {
            attendance: steps.attendance,
            exceptions: steps.exceptions,
        })
    }
}

fn failure_entry(action: &'static str, details: Value, error: &AppError) -> AuditEntry {
    AuditEntry {
        action,
        resource: "Attendance",
        resource_id: None,
        details: Some(with_error(details, error)),
        result: AuditResult::Failure,
    }
}
