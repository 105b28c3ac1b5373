//! Per-employee-per-day attendance session and its transition rules.
//!
//! A session is created by the first clock-in of the day and closed by clock
//! out; breaks toggle it between `ClockedIn` and `OnBreak`. Every derived
//! field (lateness, totals, status) is recomputed by [`AttendanceSession::recompute`]
//! at the end of each mutation; nothing writes `status` directly.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::attendance::error::AttendanceError;
use crate::attendance::geofence::GeoPoint;
use crate::model::shift::Shift;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    ClockedIn,
    OnBreak,
    ClockedOut,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Late,
    EarlyDeparture,
}

/// One clock-in or clock-out occurrence with its gating evidence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClockEvent {
    #[schema(value_type = String, format = "date-time")]
    pub time: NaiveDateTime,
    pub location: GeoPoint,
    pub address: Option<String>,
    /// Biometric confidence recorded when the shift requires verification.
    pub confidence: Option<f64>,
    #[schema(value_type = Object)]
    pub device: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BreakRecord {
    pub id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub start_time: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub end_time: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

impl BreakRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Completed duration in hours; `None` while the break is still open.
    pub fn duration_hours(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds() as f64 / 3600.0)
    }
}

/// The per-employee-per-day attendance record.
///
/// Duration fields are kept unrounded; rounding to two decimals happens only
/// when a session is mapped to an API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub clock_in: ClockEvent,
    pub clock_out: Option<ClockEvent>,
    pub breaks: Vec<BreakRecord>,

    pub total_working_hours: Option<f64>,
    pub total_break_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub is_late: bool,
    pub late_by_minutes: i64,
    pub is_early_departure: bool,
    pub early_by_minutes: i64,
    pub status: AttendanceStatus,
    /// Set only through the administrative correction path; wins over every
    /// computed status.
    pub status_override: Option<AttendanceStatus>,
}

impl AttendanceSession {
    /// Opens a new session for the day the clock-in belongs to. Geofence and
    /// biometric gates must already have passed; duplicate-day detection is
    /// the storage layer's unique key, not this constructor.
    pub fn open(employee_id: u64, shift: &Shift, clock_in: ClockEvent) -> Self {
        let date = shift.session_date(clock_in.time);
        let mut session = Self {
            id: 0,
            employee_id,
            date,
            clock_in,
            clock_out: None,
            breaks: Vec::new(),
            total_working_hours: None,
            total_break_hours: None,
            overtime_hours: None,
            is_late: false,
            late_by_minutes: 0,
            is_early_departure: false,
            early_by_minutes: 0,
            status: AttendanceStatus::Present,
            status_override: None,
        };
        session.recompute(shift);
        session
    }

    pub fn state(&self) -> SessionState {
        if self.clock_out.is_some() {
            SessionState::ClockedOut
        } else if self.open_break().is_some() {
            SessionState::OnBreak
        } else {
            SessionState::ClockedIn
        }
    }

    pub fn open_break(&self) -> Option<&BreakRecord> {
        self.breaks.iter().find(|b| b.is_open())
    }

    fn open_break_mut(&mut self) -> Option<&mut BreakRecord> {
        self.breaks.iter_mut().find(|b| b.is_open())
    }

    pub fn start_break(
        &mut self,
        now: NaiveDateTime,
        reason: Option<String>,
    ) -> Result<(), AttendanceError> {
        match self.state() {
            SessionState::ClockedOut => Err(AttendanceError::NoOpenSession),
            SessionState::OnBreak => Err(AttendanceError::BreakAlreadyOpen),
            _ => {
                self.breaks.push(BreakRecord {
                    id: 0,
                    start_time: now,
                    end_time: None,
                    reason,
                });
                Ok(())
            }
        }
    }

    pub fn end_break(&mut self, now: NaiveDateTime) -> Result<(), AttendanceError> {
        match self.open_break_mut() {
            Some(open) => {
                open.end_time = Some(now);
                Ok(())
            }
            None => Err(AttendanceError::NoOpenBreak),
        }
    }

    /// Clock out. An open break is closed at the clock-out instant before the
    /// totals are computed.
    pub fn close(&mut self, shift: &Shift, clock_out: ClockEvent) -> Result<(), AttendanceError> {
        if self.clock_out.is_some() {
            return Err(AttendanceError::NoOpenSession);
        }
        if let Some(open) = self.open_break_mut() {
            open.end_time = Some(clock_out.time);
        }
        self.clock_out = Some(clock_out);
        self.recompute(shift);
        Ok(())
    }

    /// Status priority: explicit override > early_departure > late > present.
    pub fn derived_status(&self) -> AttendanceStatus {
        if let Some(forced) = self.status_override {
            forced
        } else if self.is_early_departure {
            AttendanceStatus::EarlyDeparture
        } else if self.is_late {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    /// Recomputes every derived field from the raw clock/break records and
    /// the assigned shift. Called at the end of each transition and after an
    /// administrative correction.
    pub fn recompute(&mut self, shift: &Shift) {
        let expected_start = shift.expected_start(self.date);
        self.late_by_minutes = (self.clock_in.time - expected_start).num_minutes().max(0);
        self.is_late = self.late_by_minutes > shift.late_threshold_minutes;

        match &self.clock_out {
            Some(out) => {
                let expected_end = shift.expected_end(self.date);
                self.early_by_minutes = (expected_end - out.time).num_minutes().max(0);
                self.is_early_departure =
                    self.early_by_minutes > shift.early_departure_threshold_minutes;

                let break_hours: f64 =
                    self.breaks.iter().filter_map(BreakRecord::duration_hours).sum();
                let gross = (out.time - self.clock_in.time).num_seconds() as f64 / 3600.0;
                let worked = (gross - break_hours).max(0.0);
                self.total_break_hours = Some(break_hours);
                self.total_working_hours = Some(worked);

                let excess = worked - shift.working_hours;
                let counts = shift.overtime.enabled
                    && excess > 0.0
                    && excess * 60.0 >= shift.overtime.minimum_minutes as f64;
                self.overtime_hours = Some(if counts { excess } else { 0.0 });
            }
            None => {
                self.early_by_minutes = 0;
                self.is_early_departure = false;
                self.total_break_hours = None;
                self.total_working_hours = None;
                self.overtime_hours = None;
            }
        }

        self.status = self.derived_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shift::{GeofenceCircle, OvertimeRule};
    use chrono::{NaiveDate, NaiveTime};

    fn shift() -> Shift {
        Shift {
            id: 1,
            name: "Day".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            working_hours: 8.0,
            late_threshold_minutes: 15,
            early_departure_threshold_minutes: 15,
            require_biometric: false,
            geofences: vec![GeofenceCircle {
                latitude: 12.9716,
                longitude: 77.5946,
                radius_meters: 100.0,
            }],
            overtime: OvertimeRule::default(),
        }
    }

    fn night_shift() -> Shift {
        Shift {
            start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ..shift()
        }
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(time: NaiveDateTime) -> ClockEvent {
        ClockEvent {
            time,
            location: GeoPoint { latitude: 12.9716, longitude: 77.5946 },
            address: None,
            confidence: None,
            device: None,
        }
    }

    #[test]
    fn on_time_clock_in_is_present() {
        let s = AttendanceSession::open(7, &shift(), event(at(5, 8, 55)));
        assert_eq!(s.state(), SessionState::ClockedIn);
        assert!(!s.is_late);
        assert_eq!(s.late_by_minutes, 0);
        assert_eq!(s.status, AttendanceStatus::Present);
    }

    #[test]
    fn twenty_minutes_past_start_is_late() {
        let s = AttendanceSession::open(7, &shift(), event(at(5, 9, 20)));
        assert!(s.is_late);
        assert_eq!(s.late_by_minutes, 20);
        assert_eq!(s.status, AttendanceStatus::Late);
    }

    #[test]
    fn lateness_inside_threshold_keeps_present_status() {
        let s = AttendanceSession::open(7, &shift(), event(at(5, 9, 10)));
        assert!(!s.is_late);
        assert_eq!(s.late_by_minutes, 10);
        assert_eq!(s.status, AttendanceStatus::Present);
    }

    #[test]
    fn second_break_without_ending_first_is_rejected() {
        let mut s = AttendanceSession::open(7, &shift(), event(at(5, 9, 0)));
        s.start_break(at(5, 12, 0), Some("lunch".into())).unwrap();
        assert_eq!(s.state(), SessionState::OnBreak);
        assert!(matches!(
            s.start_break(at(5, 12, 5), None),
            Err(AttendanceError::BreakAlreadyOpen)
        ));
    }

    #[test]
    fn ending_without_open_break_is_rejected() {
        let mut s = AttendanceSession::open(7, &shift(), event(at(5, 9, 0)));
        assert!(matches!(
            s.end_break(at(5, 12, 0)),
            Err(AttendanceError::NoOpenBreak)
        ));
    }

    #[test]
    fn break_cycle_returns_to_clocked_in() {
        let mut s = AttendanceSession::open(7, &shift(), event(at(5, 9, 0)));
        s.start_break(at(5, 12, 0), None).unwrap();
        s.end_break(at(5, 12, 30)).unwrap();
        assert_eq!(s.state(), SessionState::ClockedIn);
        assert_eq!(s.breaks.len(), 1);
        assert_eq!(s.breaks[0].duration_hours(), Some(0.5));
    }

    #[test]
    fn clock_out_totals_subtract_breaks() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 0)));
        s.start_break(at(5, 12, 0), None).unwrap();
        s.end_break(at(5, 12, 30)).unwrap();
        s.close(&sh, event(at(5, 17, 30))).unwrap();

        assert_eq!(s.state(), SessionState::ClockedOut);
        assert_eq!(s.total_break_hours, Some(0.5));
        assert_eq!(s.total_working_hours, Some(8.0));
        assert_eq!(s.overtime_hours, Some(0.0));
        assert_eq!(s.status, AttendanceStatus::Present);
    }

    #[test]
    fn working_hours_round_trip_within_tolerance() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 7)));
        s.start_break(at(5, 11, 11), None).unwrap();
        s.end_break(at(5, 11, 53)).unwrap();
        s.close(&sh, event(at(5, 17, 42))).unwrap();

        let gross = (at(5, 17, 42) - at(5, 9, 7)).num_seconds() as f64 / 3600.0;
        let diff = s.total_working_hours.unwrap()
            - (gross - s.total_break_hours.unwrap());
        assert!(diff.abs() < 1e-9);
    }

    #[test]
    fn early_departure_beyond_threshold_sets_status() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 0)));
        s.close(&sh, event(at(5, 16, 30))).unwrap();

        assert!(s.is_early_departure);
        assert_eq!(s.early_by_minutes, 30);
        assert_eq!(s.status, AttendanceStatus::EarlyDeparture);
    }

    #[test]
    fn early_departure_overrides_lateness() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 30)));
        assert_eq!(s.status, AttendanceStatus::Late);
        s.close(&sh, event(at(5, 16, 0))).unwrap();
        assert!(s.is_late, "lateness fact is preserved");
        assert_eq!(s.status, AttendanceStatus::EarlyDeparture);
    }

    #[test]
    fn lateness_survives_an_on_time_departure() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 30)));
        s.close(&sh, event(at(5, 17, 0))).unwrap();
        assert_eq!(s.status, AttendanceStatus::Late);
    }

    #[test]
    fn admin_override_wins_over_computed_status() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 30)));
        s.close(&sh, event(at(5, 16, 0))).unwrap();
        s.status_override = Some(AttendanceStatus::Present);
        s.recompute(&sh);
        assert_eq!(s.status, AttendanceStatus::Present);
    }

    #[test]
    fn open_break_is_closed_silently_at_clock_out() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 0)));
        s.start_break(at(5, 16, 0), None).unwrap();
        s.close(&sh, event(at(5, 17, 0))).unwrap();

        assert_eq!(s.breaks[0].end_time, Some(at(5, 17, 0)));
        assert_eq!(s.total_break_hours, Some(1.0));
        assert_eq!(s.total_working_hours, Some(7.0));
    }

    #[test]
    fn closing_twice_is_rejected() {
        let sh = shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 0)));
        s.close(&sh, event(at(5, 17, 0))).unwrap();
        assert!(matches!(
            s.close(&sh, event(at(5, 18, 0))),
            Err(AttendanceError::NoOpenSession)
        ));
        assert!(matches!(
            s.start_break(at(5, 18, 0), None),
            Err(AttendanceError::NoOpenSession)
        ));
    }

    #[test]
    fn overnight_shift_crosses_midnight() {
        let sh = night_shift();
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 23, 50)));
        assert_eq!(s.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        // 23:50 is 110 minutes past the 22:00 expected start
        assert_eq!(s.late_by_minutes, 110);
        assert!(s.is_late);

        s.close(&sh, event(at(6, 6, 10))).unwrap();
        let worked = s.total_working_hours.unwrap();
        assert!((worked - 380.0 / 60.0).abs() < 1e-9, "got {worked}");
        // left after the 06:00 expected end, so no early departure
        assert!(!s.is_early_departure);
        assert_eq!(s.early_by_minutes, 0);
    }

    #[test]
    fn overnight_clock_in_just_after_midnight_joins_previous_day() {
        let sh = night_shift();
        let s = AttendanceSession::open(7, &sh, event(at(6, 0, 30)));
        assert_eq!(s.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(s.late_by_minutes, 150);
    }

    #[test]
    fn overtime_requires_rule_and_minimum_minutes() {
        let mut sh = shift();
        sh.overtime = OvertimeRule {
            enabled: true,
            minimum_minutes: 30,
            multiplier: 1.5,
        };

        // 45 minutes over the 8h schedule: counts
        let mut s = AttendanceSession::open(7, &sh, event(at(5, 9, 0)));
        s.close(&sh, event(at(5, 17, 45))).unwrap();
        assert!((s.overtime_hours.unwrap() - 0.75).abs() < 1e-9);

        // 15 minutes over: below the minimum, does not count
        let mut s = AttendanceSession::open(7, &sh, event(at(6, 9, 0)));
        s.close(&sh, event(at(6, 17, 15))).unwrap();
        assert_eq!(s.overtime_hours, Some(0.0));

        // rule disabled: never counts
        sh.overtime.enabled = false;
        let mut s = AttendanceSession::open(7, &sh, event(at(7, 9, 0)));
        s.close(&sh, event(at(7, 18, 0))).unwrap();
        assert_eq!(s.overtime_hours, Some(0.0));
    }

    #[test]
    fn status_serializes_snake_case() {
        let v = serde_json::to_value(AttendanceStatus::EarlyDeparture).unwrap();
        assert_eq!(v, serde_json::json!("early_departure"));
        let parsed: AttendanceStatus = "early_departure".parse().unwrap();
        assert_eq!(parsed, AttendanceStatus::EarlyDeparture);
    }
}
