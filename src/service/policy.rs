//! Biometric verification policy.
//!
//! The score comes from an external capture device; this module only
//! decides whether it clears the configured threshold.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::model::attendance::AttendanceStatus;

pub const DEFAULT_THRESHOLD: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub accepted: bool,
    pub status: AttendanceStatus,
}

/// Accepts iff `confidence_score >= threshold`. Both must be integers in 0..=100.
pub fn evaluate(confidence_score: f64, threshold: f64) -> AppResult<Verdict> {
    let score = confidence_score_from(confidence_score)?;
    let threshold = threshold_from(threshold)?;
    Ok(decide(score, threshold))
}

/// Total over already-validated inputs.
pub fn decide(score: u8, threshold: u8) -> Verdict {
    let accepted = score >= threshold;
    Verdict {
        accepted,
        status: if accepted {
            AttendanceStatus::Verified
        } else {
            AttendanceStatus::Exception
        },
    }
}

pub fn confidence_score_from(value: f64) -> AppResult<u8> {
    percent("biometricScore", value)
}

fn threshold_from(value: f64) -> AppResult<u8> {
    percent("threshold", value)
}

fn percent(field: &str, value: f64) -> AppResult<u8> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) || value.fract() != 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be an integer between 0 and 100"
        )));
    }
    Ok(value as u8)
}

/// Narrow seam to whatever produces a match confidence.
pub trait BiometricCapture {
    fn capture(&self) -> AppResult<u8>;
}

/// The score a client device reported alongside its request.
pub struct ReportedScore(pub f64);

impl BiometricCapture for ReportedScore {
    fn capture(&self) -> AppResult<u8> {
        confidence_score_from(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_or_above_threshold_is_verified() {
        for score in [85.0, 86.0, 92.0, 100.0] {
            let verdict = evaluate(score, 85.0).unwrap();
            assert!(verdict.accepted, "score {score}");
            assert_eq!(verdict.status, AttendanceStatus::Verified);
        }
    }

    #[test]
    fn below_threshold_is_an_exception() {
        for score in [0.0, 70.0, 84.0] {
            let verdict = evaluate(score, 85.0).unwrap();
            assert!(!verdict.accepted, "score {score}");
            assert_eq!(verdict.status, AttendanceStatus::Exception);
        }
    }

    #[test]
    fn boundary_is_accepted() {
        for t in 0..=100u8 {
            assert!(decide(t, t).accepted);
        }
    }

    #[test]
    fn rejects_out_of_domain_input() {
        assert!(evaluate(101.0, 85.0).is_err());
        assert!(evaluate(-1.0, 85.0).is_err());
        assert!(evaluate(f64::NAN, 85.0).is_err());
        assert!(evaluate(90.0, 150.0).is_err());
        assert!(evaluate(90.5, 85.0).is_err());
    }

    #[test]
    fn reported_score_is_validated_on_capture() {
        assert_eq!(ReportedScore(92.0).capture().unwrap(), 92);
        assert!(ReportedScore(120.0).capture().is_err());
    }
}
