use chrono::NaiveDate;
use serde_json::Value;
use strum_macros::Display;

/// State-machine events fanned out to the notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceEventKind {
    ClockedIn,
    ClockedOut,
    IrregularAttendance,
}

#[derive(Debug, Clone)]
pub struct AttendanceEvent {
    pub kind: AttendanceEventKind,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub message: String,
    pub details: Value,
}
