use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Business-rule failures of the attendance core.
///
/// Every variant carries a stable machine-readable code so API clients can
/// render precise messages without parsing English text. Only `Database` is
/// treated as a process-level fault; it is rendered as a generic 500 and the
/// detail stays in the server log.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("already clocked in today")]
    AlreadyClockedIn,

    #[error("no open attendance session for today")]
    NoOpenSession,

    #[error("a break is already open")]
    BreakAlreadyOpen,

    #[error("no open break to end")]
    NoOpenBreak,

    #[error("location is outside every allowed area (nearest boundary {distance_meters:.0} m away)")]
    OutOfGeofence { distance_meters: f64 },

    #[error("biometric sample did not match the enrolled reference (confidence {confidence:.2})")]
    BiometricMismatch { confidence: f64 },

    #[error("no biometric reference enrolled for this employee")]
    NotEnrolled,

    #[error("no shift assigned to this employee")]
    ShiftNotAssigned,

    #[error("external verification service did not answer in time")]
    ExternalServiceUnavailable,

    #[error("invalid shift configuration: {0}")]
    InvalidShiftConfiguration(String),

    #[error("invalid correction: {0}")]
    InvalidCorrection(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl AttendanceError {
    /// Stable code surfaced in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyClockedIn => "ALREADY_CLOCKED_IN",
            Self::NoOpenSession => "NO_OPEN_SESSION",
            Self::BreakAlreadyOpen => "BREAK_ALREADY_OPEN",
            Self::NoOpenBreak => "NO_OPEN_BREAK",
            Self::OutOfGeofence { .. } => "OUT_OF_GEOFENCE",
            Self::BiometricMismatch { .. } => "BIOMETRIC_MISMATCH",
            Self::NotEnrolled => "NOT_ENROLLED",
            Self::ShiftNotAssigned => "SHIFT_NOT_ASSIGNED",
            Self::ExternalServiceUnavailable => "EXTERNAL_SERVICE_UNAVAILABLE",
            Self::InvalidShiftConfiguration(_) => "INVALID_SHIFT_CONFIGURATION",
            Self::InvalidCorrection(_) => "INVALID_CORRECTION",
            Self::Database(_) => "INTERNAL",
        }
    }
}

impl actix_web::ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyClockedIn
            | Self::BreakAlreadyOpen
            | Self::OutOfGeofence { .. }
            | Self::BiometricMismatch { .. }
            | Self::NotEnrolled
            | Self::ShiftNotAssigned
            | Self::InvalidShiftConfiguration(_)
            | Self::InvalidCorrection(_) => StatusCode::BAD_REQUEST,

            Self::NoOpenSession | Self::NoOpenBreak => StatusCode::NOT_FOUND,

            Self::ExternalServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // never leak driver detail to the client
            Self::Database(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "code": self.code(),
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn business_failures_map_to_400() {
        assert_eq!(
            AttendanceError::AlreadyClockedIn.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AttendanceError::OutOfGeofence { distance_meters: 5000.0 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AttendanceError::BiometricMismatch { confidence: 0.42 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AttendanceError::NotEnrolled.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_session_or_break_maps_to_404() {
        assert_eq!(
            AttendanceError::NoOpenSession.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AttendanceError::NoOpenBreak.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn external_timeout_maps_to_503() {
        assert_eq!(
            AttendanceError::ExternalServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn database_error_is_generic_500() {
        let err = AttendanceError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AttendanceError::AlreadyClockedIn.code(), "ALREADY_CLOCKED_IN");
        assert_eq!(AttendanceError::NoOpenBreak.code(), "NO_OPEN_BREAK");
        assert_eq!(
            AttendanceError::BiometricMismatch { confidence: 0.0 }.code(),
            "BIOMETRIC_MISMATCH"
        );
    }
}
