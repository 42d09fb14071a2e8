use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{
    exception::{Exception, ExceptionReview, ExceptionStatus, ExceptionType, Severity},
    new_id,
};
use crate::store::Store;

/// Creates and reviews attendance exceptions.
#[derive(Clone)]
pub struct ExceptionRecorder {
    store: Arc<dyn Store>,
}

impl ExceptionRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Flags an anomaly on an existing attendance. Severity defaults to medium.
    pub async fn flag(
        &self,
        attendance_id: Uuid,
        kind: ExceptionType,
        description: impl Into<String>,
        severity: Option<Severity>,
        now: DateTime<Utc>,
    ) -> AppResult<Exception> {
        if self.store.attendance_by_id(attendance_id).await?.is_none() {
            return Err(AppError::not_found("Attendance", attendance_id));
        }

        let exception = Exception {
            id: new_id(),
            attendance_id,
            kind,
            description: description.into(),
            severity: severity.unwrap_or_default(),
            status: ExceptionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            resolution: None,
            created_at: now,
        };
        let exception = self.store.insert_exception(exception).await?;
        info!(exception_id = %exception.id, %attendance_id, kind = %kind, "Exception flagged");
        Ok(exception)
    }

    /// Records a reviewer's decision. Resolved and dismissed are final, so a
    /// second review of either fails with `InvalidTransition`.
    pub async fn review(
        &self,
        exception_id: Uuid,
        reviewer_id: Uuid,
        new_status: ExceptionStatus,
        resolution: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Exception> {
        let current = self
            .store
            .exception_by_id(exception_id)
            .await?
            .ok_or_else(|| AppError::not_found("Exception", exception_id))?;

        let invalid = || AppError::InvalidTransition {
            from: current.status.to_string(),
            to: new_status.to_string(),
        };
        if new_status == ExceptionStatus::Pending || current.status.is_terminal() {
            return Err(invalid());
        }

        let review = ExceptionReview {
            status: new_status,
            resolution,
            reviewed_by: reviewer_id,
            reviewed_at: now,
        };
        if !self.store.review_exception(exception_id, review).await? {
            // closed by another reviewer in the meantime
            return Err(invalid());
        }

        self.store
            .exception_by_id(exception_id)
            .await?
            .ok_or_else(|| AppError::not_found("Exception", exception_id))
    }

    /// Pending exceptions, newest first.
    pub async fn pending(&self) -> AppResult<Vec<Exception>> {
        self.store.pending_exceptions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::Attendance;
    use crate::service::{ledger::AttendanceLedger, policy::decide};
    use crate::store::MemoryStore;
    use crate::test_support::{Fixture, nairobi};
    use chrono::Duration;

    struct Setup {
        recorder: ExceptionRecorder,
        attendance: Attendance,
        fixture: Fixture,
    }

    async fn setup() -> Setup {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let fixture = Fixture::seed(store.clone(), now).await;
        let attendance = AttendanceLedger::new(store.clone())
            .clock_in(fixture.shift.id, fixture.guard.id, nairobi(), 70, decide(70, 85), now)
            .await
            .unwrap();
        Setup {
            recorder: ExceptionRecorder::new(store),
            attendance,
            fixture,
        }
    }

    #[actix_web::test]
    async fn flag_defaults_to_medium_and_pending() {
        let s = setup().await;
        let exception = s
            .recorder
            .flag(s.attendance.id, ExceptionType::LowBiometricScore, "score 70", None, Utc::now())
            .await
            .unwrap();
        assert_eq!(exception.severity, Severity::Medium);
        assert_eq!(exception.status, ExceptionStatus::Pending);
    }

    #[actix_web::test]
    async fn flag_requires_existing_attendance() {
        let s = setup().await;
        let err = s
            .recorder
            .flag(Uuid::new_v4(), ExceptionType::Absent, "no show", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "Attendance", .. }));
    }

    #[actix_web::test]
    async fn pending_is_newest_first_regardless_of_insertion_order() {
        let s = setup().await;
        let base = Utc::now();
        let mut ids = Vec::new();
        // inserted out of chronological order
        for offset in [5, 1, 9, 3] {
            let e = s
                .recorder
                .flag(
                    s.attendance.id,
                    ExceptionType::GeofenceViolation,
                    format!("offset {offset}"),
                    Some(Severity::Low),
                    base + Duration::seconds(offset),
                )
                .await
                .unwrap();
            ids.push((offset, e.id));
        }

        let pending = s.recorder.pending().await.unwrap();
        let got: Vec<Uuid> = pending.iter().map(|e| e.id).collect();
        ids.sort_by(|a, b| b.0.cmp(&a.0));
        let expected: Vec<Uuid> = ids.into_iter().map(|(_, id)| id).collect();
        assert_eq!(got, expected);
        assert!(pending.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[actix_web::test]
    async fn review_sets_reviewer_and_removes_from_pending() {
        let s = setup().await;
        let e = s
            .recorder
            .flag(s.attendance.id, ExceptionType::LowBiometricScore, "score 70", None, Utc::now())
            .await
            .unwrap();
        let reviewer = s.fixture.user.id;

        let reviewed = s
            .recorder
            .review(
                e.id,
                reviewer,
                ExceptionStatus::Resolved,
                Some("re-scanned".into()),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, ExceptionStatus::Resolved);
        assert_eq!(reviewed.reviewed_by, Some(reviewer));
        assert!(reviewed.reviewed_at.is_some());
        assert_eq!(reviewed.resolution.as_deref(), Some("re-scanned"));
        assert!(s.recorder.pending().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn dismissing_twice_fails_the_second_time() {
        let s = setup().await;
        let e = s
            .recorder
            .flag(s.attendance.id, ExceptionType::LowBiometricScore, "score 70", None, Utc::now())
            .await
            .unwrap();
        let reviewer = s.fixture.user.id;

        s.recorder
            .review(e.id, reviewer, ExceptionStatus::Dismissed, None, Utc::now())
            .await
            .unwrap();
        let err = s
            .recorder
            .review(e.id, reviewer, ExceptionStatus::Dismissed, None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidTransition {
                from: "dismissed".into(),
                to: "dismissed".into()
            }
        );
    }

    #[actix_web::test]
    async fn reviewed_can_still_be_resolved_but_not_reset_to_pending() {
        let s = setup().await;
        let e = s
            .recorder
            .flag(
                s.attendance.id,
                ExceptionType::LateArrival,
                "late",
                Some(Severity::Low),
                Utc::now(),
            )
            .await
            .unwrap();
        let reviewer = s.fixture.user.id;

        s.recorder
            .review(e.id, reviewer, ExceptionStatus::Reviewed, None, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            s.recorder
                .review(e.id, reviewer, ExceptionStatus::Pending, None, Utc::now())
                .await,
            Err(AppError::InvalidTransition { .. })
        ));
        let resolved = s
            .recorder
            .review(e.id, reviewer, ExceptionStatus::Resolved, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved.status, ExceptionStatus::Resolved);
    }

    #[actix_web::test]
    async fn review_of_unknown_exception_is_not_found() {
        let s = setup().await;
        let err = s
            .recorder
            .review(Uuid::new_v4(), s.fixture.user.id, ExceptionStatus::Reviewed, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "Exception", .. }));
    }
}
