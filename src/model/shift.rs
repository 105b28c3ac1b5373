use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::attendance::error::AttendanceError;

/// Circular allowed-area for location-gated clock actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GeofenceCircle {
    #[schema(example = 12.9716)]
    pub latitude: f64,
    #[schema(example = 77.5946)]
    pub longitude: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct OvertimeRule {
    pub enabled: bool,
    /// Worked excess below this many minutes does not count as overtime.
    #[schema(example = 30)]
    pub minimum_minutes: i64,
    #[schema(example = 1.5)]
    pub multiplier: f64,
}

impl Default for OvertimeRule {
    fn default() -> Self {
        Self {
            enabled: false,
            minimum_minutes: 0,
            multiplier: 1.0,
        }
    }
}

/// Work schedule template: expected hours, lateness/early-departure
/// thresholds and the gating policy applied at clock-in/out.
///
/// `end_time < start_time` means the shift wraps past midnight.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Shift {
    pub id: u64,
    #[schema(example = "Night Ops")]
    pub name: String,
    #[schema(example = "22:00:00", value_type = String, format = "time")]
    pub start_time: NaiveTime,
    #[schema(example = "06:00:00", value_type = String, format = "time")]
    pub end_time: NaiveTime,
    #[schema(example = 8.0)]
    pub working_hours: f64,
    #[schema(example = 15)]
    pub late_threshold_minutes: i64,
    #[schema(example = 15)]
    pub early_departure_threshold_minutes: i64,
    pub require_biometric: bool,
    pub geofences: Vec<GeofenceCircle>,
    pub overtime: OvertimeRule,
}

impl Shift {
    pub fn wraps_midnight(&self) -> bool {
        self.end_time < self.start_time
    }

    /// Calendar day a clock event at `now` belongs to.
    ///
    /// For a wrapped shift, events after midnight but before the shift's end
    /// time are attributed to the previous day, so the 23:50 clock-in and the
    /// 06:10 clock-out of a 22:00-06:00 shift land on the same session.
    pub fn session_date(&self, now: NaiveDateTime) -> NaiveDate {
        if self.wraps_midnight() && now.time() < self.end_time {
            now.date() - Duration::days(1)
        } else {
            now.date()
        }
    }

    /// Expected start of the shift for the given session date.
    pub fn expected_start(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start_time)
    }

    /// Expected end of the shift for the given session date, on the next
    /// calendar day when the shift wraps midnight.
    pub fn expected_end(&self, date: NaiveDate) -> NaiveDateTime {
        if self.wraps_midnight() {
            (date + Duration::days(1)).and_time(self.end_time)
        } else {
            date.and_time(self.end_time)
        }
    }

    /// Rejects unusable configurations before they are stored. Gating code
    /// may therefore assume every persisted shift is well-formed.
    pub fn validate(&self) -> Result<(), AttendanceError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.end_time == self.start_time {
            return Err(invalid("end_time must differ from start_time"));
        }
        if !(self.working_hours > 0.0 && self.working_hours <= 24.0) {
            return Err(invalid("working_hours must be in (0, 24]"));
        }
        if self.late_threshold_minutes < 0 || self.early_departure_threshold_minutes < 0 {
            return Err(invalid("thresholds must not be negative"));
        }
        for fence in &self.geofences {
            if fence.radius_meters <= 0.0 {
                return Err(invalid("geofence radius must be positive"));
            }
            if !(-90.0..=90.0).contains(&fence.latitude)
                || !(-180.0..=180.0).contains(&fence.longitude)
            {
                return Err(invalid("geofence center is not a valid coordinate"));
            }
        }
        if self.overtime.enabled {
            if self.overtime.minimum_minutes < 0 {
                return Err(invalid("overtime minimum_minutes must not be negative"));
            }
            if self.overtime.multiplier < 1.0 {
                return Err(invalid("overtime multiplier must be at least 1.0"));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> AttendanceError {
    AttendanceError::InvalidShiftConfiguration(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_shift() -> Shift {
        Shift {
            id: 1,
            name: "Day".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            working_hours: 8.0,
            late_threshold_minutes: 15,
            early_departure_threshold_minutes: 15,
            require_biometric: false,
            geofences: vec![],
            overtime: OvertimeRule::default(),
        }
    }

    fn night_shift() -> Shift {
        Shift {
            start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ..day_shift()
        }
    }

    fn at(date: (i32, u32, u32), time: (u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, 0)
            .unwrap()
    }

    #[test]
    fn day_shift_does_not_wrap() {
        assert!(!day_shift().wraps_midnight());
        assert!(night_shift().wraps_midnight());
    }

    #[test]
    fn session_date_is_today_for_day_shift() {
        let shift = day_shift();
        assert_eq!(
            shift.session_date(at((2024, 3, 5), (9, 20))),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn wrapped_shift_attributes_post_midnight_events_to_previous_day() {
        let shift = night_shift();
        // before midnight: same day
        assert_eq!(
            shift.session_date(at((2024, 3, 5), (23, 50))),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
        // after midnight, before shift end: previous day
        assert_eq!(
            shift.session_date(at((2024, 3, 6), (0, 30))),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
        // past the end of the window: back to the current day
        assert_eq!(
            shift.session_date(at((2024, 3, 6), (6, 10))),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
    }

    #[test]
    fn expected_window_spans_midnight_for_wrapped_shift() {
        let shift = night_shift();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(shift.expected_start(date), at((2024, 3, 5), (22, 0)));
        assert_eq!(shift.expected_end(date), at((2024, 3, 6), (6, 0)));
    }

    #[test]
    fn negative_radius_is_rejected_at_validation() {
        let mut shift = day_shift();
        shift.geofences = vec![GeofenceCircle {
            latitude: 12.9716,
            longitude: 77.5946,
            radius_meters: -10.0,
        }];
        assert!(matches!(
            shift.validate(),
            Err(AttendanceError::InvalidShiftConfiguration(_))
        ));
    }

    #[test]
    fn equal_start_and_end_is_rejected() {
        let mut shift = day_shift();
        shift.end_time = shift.start_time;
        assert!(shift.validate().is_err());
    }

    #[test]
    fn out_of_range_center_is_rejected() {
        let mut shift = day_shift();
        shift.geofences = vec![GeofenceCircle {
            latitude: 95.0,
            longitude: 0.0,
            radius_meters: 50.0,
        }];
        assert!(shift.validate().is_err());
    }

    #[test]
    fn overtime_multiplier_below_one_is_rejected() {
        let mut shift = day_shift();
        shift.overtime = OvertimeRule {
            enabled: true,
            minimum_minutes: 30,
            multiplier: 0.5,
        };
        assert!(shift.validate().is_err());
    }

    #[test]
    fn sane_shift_validates() {
        assert!(day_shift().validate().is_ok());
        assert!(night_shift().validate().is_ok());
    }
}
