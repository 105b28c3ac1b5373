use crate::api::attendance::{
    SessionListResponse, SessionQuery, SessionResponse, StartBreakRequest,
};
use crate::api::biometric::EnrollRequest;
use crate::api::shift::{AssignShiftRequest, ShiftPayload};
use crate::attendance::geofence::GeoPoint;
use crate::attendance::service::{ClockRequest, SessionCorrection};
use crate::model::session::{AttendanceStatus, BreakRecord, ClockEvent, SessionState};
use crate::model::shift::{GeofenceCircle, OvertimeRule, Shift};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Service API",
        version = "1.0.0",
        description = r#"
## Employee Attendance Service

Clock-in/clock-out tracking with geofence and biometric gating, break
accounting, shift schedules and attendance notifications.

### 🔹 Key Features
- **Attendance Tracking**
  - Clock in/out with location and biometric checks
  - Break start/end with automatic close at clock-out
  - Lateness, early-departure and overtime derivation
- **Shift Management**
  - Shift templates with thresholds, geofences and overtime rules
  - Per-employee shift assignment
- **Biometric Enrollment**
  - Reference template storage used by the clock gates

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Administrative corrections and shift management require **Admin** or **HR**
roles.

### 📦 Response Format
- JSON-based RESTful responses
- Business-rule failures carry a stable machine-readable `code`
- Pagination supported for the history endpoint

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::start_break,
        crate::api::attendance::end_break,
        crate::api::attendance::today,
        crate::api::attendance::list_sessions,
        crate::api::attendance::correct_session,

        crate::api::shift::create_shift,
        crate::api::shift::list_shifts,
        crate::api::shift::get_shift,
        crate::api::shift::update_shift,
        crate::api::shift::assign_shift,

        crate::api::biometric::enroll
    ),
    components(
        schemas(
            ClockRequest,
            SessionCorrection,
            StartBreakRequest,
            SessionQuery,
            SessionResponse,
            SessionListResponse,
            SessionState,
            AttendanceStatus,
            ClockEvent,
            BreakRecord,
            GeoPoint,
            Shift,
            ShiftPayload,
            AssignShiftRequest,
            GeofenceCircle,
            OvertimeRule,
            EnrollRequest
        )
    ),
    tags(
        (name = "Attendance", description = "Clock-in/out, breaks and history APIs"),
        (name = "Shift", description = "Shift template and assignment APIs"),
        (name = "Biometric", description = "Biometric enrollment APIs"),
    )
)]
pub struct ApiDoc;
