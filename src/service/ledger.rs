use std::sync::Arc;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use super::policy::Verdict;
use crate::error::{AppError, AppResult};
use crate::model::{
    Coordinates,
    attendance::{Attendance, ClockOutFields},
    new_id,
};
use crate::store::Store;

/// Records clock-in/clock-out rows and answers who is on duty.
#[derive(Clone)]
pub struct AttendanceLedger {
    store: Arc<dyn Store>,
}

impl AttendanceLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens a new occupancy of `shift_id`. The status comes from the policy verdict.
    pub async fn clock_in(
        &self,
        shift_id: Uuid,
        guard_id: Uuid,
        position: Coordinates,
        confidence_score: u8,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> AppResult<Attendance> {
        if self.store.open_attendance_for_shift(shift_id).await?.is_some() {
            return Err(AppError::DuplicateClockIn { shift_id });
        }

        let attendance = Attendance {
            id: new_id(),
            shift_id,
            guard_id,
            clock_in_time: Some(now),
            clock_out_time: None,
            clock_in_latitude: Some(position.latitude),
            clock_in_longitude: Some(position.longitude),
            clock_out_latitude: None,
            clock_out_longitude: None,
            clock_in_biometric_score: Some(confidence_score),
            clock_out_biometric_score: None,
            status: verdict.status,
            notes: None,
            verified_by: None,
            verified_at: None,
            created_at: now,
        };

        // a concurrent clock-in that slipped past the check loses here
        let attendance = self.store.insert_attendance(attendance).await?;
        debug!(attendance_id = %attendance.id, %shift_id, "Attendance opened");
        Ok(attendance)
    }

    /// Closes an open occupancy. The status is left as set at clock-in.
    pub async fn clock_out(
        &self,
        attendance_id: Uuid,
        position: Coordinates,
        confidence_score: u8,
        now: DateTime<Utc>,
    ) -> AppResult<Attendance> {
        let current = self
            .store
            .attendance_by_id(attendance_id)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance", attendance_id))?;

        if current.clock_out_time.is_some() {
            return Err(AppError::AlreadyClosed { attendance_id });
        }
        if matches!(current.clock_in_time, Some(clock_in) if now < clock_in) {
            return Err(AppError::ClockOutBeforeClockIn);
        }

        let fields = ClockOutFields {
            time: now,
            position,
            biometric_score: confidence_score,
        };
        if !self.store.close_attendance(attendance_id, fields).await? {
            return Err(AppError::AlreadyClosed { attendance_id });
        }

        self.store
            .attendance_by_id(attendance_id)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance", attendance_id))
    }

    /// True iff the guard's most recent attendance is clocked in and not out.
    pub async fn is_on_duty(&self, guard_id: Uuid) -> AppResult<bool> {
        Ok(self
            .store
            .latest_attendance_for_guard(guard_id)
            .await?
            .is_some_and(|a| a.is_open()))
    }

    /// Rows created during the server's local calendar day containing `now`, oldest first.
    pub async fn todays_attendance(&self, now: DateTime<Utc>) -> AppResult<Vec<Attendance>> {
        let (from, to) = local_day_window(now);
        self.store.attendance_created_between(from, to).await
    }
}

/// `[00:00, 24:00)` of the local day containing `now`, expressed in UTC.
pub fn local_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&Local).date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    (start_of_local_day(today), start_of_local_day(tomorrow))
}

fn start_of_local_day(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // midnight skipped by a DST jump
        LocalResult::None => Utc.from_utc_datetime(&midnight),
    }
}
