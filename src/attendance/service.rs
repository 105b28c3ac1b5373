//! Orchestrates one state-machine invocation per request: shift lookup,
//! geofence gate, biometric gate, transition, persistence, notification.
//! Everything completes (or fails) before the HTTP response is sent.

use std::sync::Arc;
use std::time::Duration;

use actix_web::rt::time::timeout;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::attendance::biometric::BiometricVerifier;
use crate::attendance::error::AttendanceError;
use crate::attendance::geocode::Geocoder;
use crate::attendance::geofence::{self, GeoPoint};
use crate::attendance::notify::Notifier;
use crate::attendance::store::{SessionFilter, SessionStore, TemplateStore};
use crate::model::notification::{AttendanceEvent, AttendanceEventKind};
use crate::model::session::{AttendanceSession, AttendanceStatus, ClockEvent};
use crate::model::shift::Shift;
use crate::utils::shift_cache::ShiftCache;

/// Request body shared by clock-in and clock-out.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClockRequest {
    pub location: GeoPoint,
    #[schema(example = "HSR Layout, Bengaluru")]
    pub address: Option<String>,
    #[schema(value_type = Object)]
    pub device_info: Option<serde_json::Value>,
    /// Face encoding captured by the client; required when the assigned
    /// shift has `require_biometric` set.
    pub biometric_sample: Option<Vec<f32>>,
}

/// Privileged typed correction. Bypasses the self-service guards but still
/// re-validates the clock ordering invariant and recomputes derived fields.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionCorrection {
    #[schema(value_type = String, format = "date-time")]
    pub clock_in_time: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub clock_out_time: Option<NaiveDateTime>,
    pub status_override: Option<AttendanceStatus>,
}

pub struct AttendanceService {
    sessions: SessionStore,
    templates: TemplateStore,
    shifts: ShiftCache,
    verifier: Arc<dyn BiometricVerifier>,
    geocoder: Arc<dyn Geocoder>,
    notifier: Arc<dyn Notifier>,
    biometric_threshold: f64,
    external_timeout: Duration,
}

impl AttendanceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: SessionStore,
        templates: TemplateStore,
        shifts: ShiftCache,
        verifier: Arc<dyn BiometricVerifier>,
        geocoder: Arc<dyn Geocoder>,
        notifier: Arc<dyn Notifier>,
        biometric_threshold: f64,
        external_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            templates,
            shifts,
            verifier,
            geocoder,
            notifier,
            biometric_threshold,
            external_timeout,
        }
    }

    pub async fn clock_in(
        &self,
        employee_id: u64,
        req: ClockRequest,
    ) -> Result<AttendanceSession, AttendanceError> {
        let shift = self.shift_for(employee_id).await?;
        let now = Local::now().naive_local();

        self.check_geofence(req.location, &shift)?;
        let confidence = self
            .check_biometric(employee_id, &shift, req.biometric_sample.as_deref())
            .await?;
        let address = self.resolve_address(req.address, req.location).await;

        let event = ClockEvent {
            time: now,
            location: req.location,
            address,
            confidence,
            device: req.device_info,
        };
        let mut session = AttendanceSession::open(employee_id, &shift, event);
        // the unique (employee_id, date) key decides the race; no pre-check
        session.id = self.sessions.insert(&session).await?;

        info!(employee_id, date = %session.date, late = session.is_late, "Employee clocked in");
        self.emit(
            AttendanceEventKind::ClockedIn,
            &session,
            format!("Clocked in at {}", now.format("%H:%M")),
            json!({ "time": now, "late_by_minutes": session.late_by_minutes }),
        )
        .await;
        if session.is_late {
            self.emit(
                AttendanceEventKind::IrregularAttendance,
                &session,
                format!("Late arrival: {} minutes", session.late_by_minutes),
                json!({ "reason": "late", "late_by_minutes": session.late_by_minutes }),
            )
            .await;
        }

        Ok(session)
    }

    pub async fn clock_out(
        &self,
        employee_id: u64,
        req: ClockRequest,
    ) -> Result<AttendanceSession, AttendanceError> {
        let shift = self.shift_for(employee_id).await?;
        let now = Local::now().naive_local();
        let mut session = self
            .open_session(employee_id, now)
            .await?
            .ok_or(AttendanceError::NoOpenSession)?;

        self.check_geofence(req.location, &shift)?;
        let confidence = self
            .check_biometric(employee_id, &shift, req.biometric_sample.as_deref())
            .await?;
        let address = self.resolve_address(req.address, req.location).await;

        let had_open_break = session.open_break().is_some();
        session.close(
            &shift,
            ClockEvent {
                time: now,
                location: req.location,
                address,
                confidence,
                device: req.device_info,
            },
        )?;

        if had_open_break {
            self.sessions.close_open_break(session.id, now).await?;
            info!(session_id = session.id, "Open break auto-closed at clock-out");
        }
        self.sessions.update_derived(&session).await?;

        info!(
            employee_id,
            date = %session.date,
            worked = session.total_working_hours,
            "Employee clocked out"
        );
        self.emit(
            AttendanceEventKind::ClockedOut,
            &session,
            format!("Clocked out at {}", now.format("%H:%M")),
            json!({ "time": now, "total_working_hours": session.total_working_hours }),
        )
        .await;
        if session.is_early_departure {
            self.emit(
                AttendanceEventKind::IrregularAttendance,
                &session,
                format!("Early departure: {} minutes", session.early_by_minutes),
                json!({ "reason": "early_departure", "early_by_minutes": session.early_by_minutes }),
            )
            .await;
        }

        Ok(session)
    }

    pub async fn start_break(
        &self,
        employee_id: u64,
        reason: Option<String>,
    ) -> Result<AttendanceSession, AttendanceError> {
        let now = Local::now().naive_local();
        let mut session = self
            .open_session(employee_id, now)
            .await?
            .ok_or(AttendanceError::NoOpenSession)?;

        session.start_break(now, reason)?;
        if let Some(record) = session.breaks.last() {
            let id = self.sessions.insert_break(session.id, record).await?;
            if let Some(record) = session.breaks.last_mut() {
                record.id = id;
            }
        }
        Ok(session)
    }

    pub async fn end_break(&self, employee_id: u64) -> Result<AttendanceSession, AttendanceError> {
        let now = Local::now().naive_local();
        let mut session = self
            .open_session(employee_id, now)
            .await?
            .ok_or(AttendanceError::NoOpenBreak)?;

        session.end_break(now)?;
        self.sessions.close_open_break(session.id, now).await?;
        Ok(session)
    }

    /// Today's session, where "today" also covers an overnight session opened
    /// yesterday that is still running.
    pub async fn today(
        &self,
        employee_id: u64,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        let now = Local::now().naive_local();
        if let Some(open) = self.open_session(employee_id, now).await? {
            return Ok(Some(open));
        }
        self.sessions.find_by_date(employee_id, now.date()).await
    }

    pub async fn list(
        &self,
        filter: &SessionFilter,
    ) -> Result<(Vec<AttendanceSession>, i64), AttendanceError> {
        self.sessions.list(filter).await
    }

    /// Administrative correction path. No geofence/biometric/state guards;
    /// derived fields are recomputed against the employee's shift before the
    /// row is written back.
    pub async fn correct(
        &self,
        session_id: u64,
        correction: SessionCorrection,
    ) -> Result<AttendanceSession, AttendanceError> {
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(AttendanceError::NoOpenSession)?;
        let shift = self.shift_for(session.employee_id).await?;

        if let Some(time) = correction.clock_in_time {
            session.clock_in.time = time;
        }
        if let Some(time) = correction.clock_out_time {
            match &mut session.clock_out {
                Some(out) => out.time = time,
                // a correction may close a session the employee forgot to;
                // location evidence stays at the clock-in point
                None => {
                    session.clock_out = Some(ClockEvent {
                        time,
                        location: session.clock_in.location,
                        address: None,
                        confidence: None,
                        device: None,
                    })
                }
            }
        }
        if let Some(status) = correction.status_override {
            session.status_override = Some(status);
        }

        if let Some(out) = &session.clock_out {
            if out.time <= session.clock_in.time {
                return Err(AttendanceError::InvalidCorrection(
                    "clock_out_time must be after clock_in_time".into(),
                ));
            }
        }

        session.recompute(&shift);
        self.sessions.update_derived(&session).await?;
        info!(session_id, employee_id = session.employee_id, "Administrative correction applied");
        Ok(session)
    }

    pub async fn enroll_biometric(
        &self,
        employee_id: u64,
        encoding: &[f32],
    ) -> Result<(), AttendanceError> {
        self.templates.upsert(employee_id, encoding).await
    }

    async fn shift_for(&self, employee_id: u64) -> Result<Arc<Shift>, AttendanceError> {
        self.shifts
            .for_employee(employee_id)
            .await?
            .ok_or(AttendanceError::ShiftNotAssigned)
    }

    async fn open_session(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        self.sessions
            .find_open(employee_id, now.date() - ChronoDuration::days(1))
            .await
    }

    fn check_geofence(&self, point: GeoPoint, shift: &Shift) -> Result<(), AttendanceError> {
        if shift.geofences.is_empty() {
            return Ok(());
        }
        let check = geofence::check_circles(point, &shift.geofences);
        if check.within_fence {
            Ok(())
        } else {
            Err(AttendanceError::OutOfGeofence {
                distance_meters: check.distance_meters,
            })
        }
    }

    /// `Ok(None)` when the shift does not gate on biometrics; the recorded
    /// confidence otherwise.
    async fn check_biometric(
        &self,
        employee_id: u64,
        shift: &Shift,
        sample: Option<&[f32]>,
    ) -> Result<Option<f64>, AttendanceError> {
        if !shift.require_biometric {
            return Ok(None);
        }
        let template = self
            .templates
            .find(employee_id)
            .await?
            .ok_or(AttendanceError::NotEnrolled)?;
        let Some(sample) = sample else {
            return Err(AttendanceError::BiometricMismatch { confidence: 0.0 });
        };

        let check = timeout(
            self.external_timeout,
            self.verifier
                .verify(sample, &template.encoding, self.biometric_threshold),
        )
        .await
        .map_err(|_| AttendanceError::ExternalServiceUnavailable)??;

        if !check.is_match {
            return Err(AttendanceError::BiometricMismatch {
                confidence: check.confidence,
            });
        }
        Ok(Some(check.confidence))
    }

    async fn resolve_address(&self, provided: Option<String>, point: GeoPoint) -> Option<String> {
        if provided.is_some() {
            return provided;
        }
        match timeout(
            self.external_timeout,
            self.geocoder.reverse(point.latitude, point.longitude),
        )
        .await
        {
            Ok(Ok(address)) => address,
            Ok(Err(e)) => {
                warn!(error = %e, "Reverse geocoding failed");
                None
            }
            Err(_) => {
                warn!("Reverse geocoding timed out");
                None
            }
        }
    }

    async fn emit(
        &self,
        kind: AttendanceEventKind,
        session: &AttendanceSession,
        message: String,
        details: serde_json::Value,
    ) {
        self.notifier
            .emit(AttendanceEvent {
                kind,
                employee_id: session.employee_id,
                date: session.date,
                message,
                details,
            })
            .await;
    }
}
