use crate::attendance::service::{AttendanceService, ClockRequest, SessionCorrection};
use crate::attendance::store::SessionFilter;
use crate::auth::auth::AuthUser;
use crate::model::session::{
    AttendanceSession, AttendanceStatus, BreakRecord, ClockEvent, SessionState,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Rounding happens here, at the presentation boundary; the stored values
/// stay unrounded.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "clocked_in")]
    pub state: SessionState,
    pub clock_in: ClockEvent,
    pub clock_out: Option<ClockEvent>,
    pub breaks: Vec<BreakRecord>,
    #[schema(example = 8.25)]
    pub total_working_hours: Option<f64>,
    #[schema(example = 0.5)]
    pub total_break_hours: Option<f64>,
    #[schema(example = 0.0)]
    pub overtime_hours: Option<f64>,
    pub is_late: bool,
    #[schema(example = 20)]
    pub late_by_minutes: i64,
    pub is_early_departure: bool,
    pub early_by_minutes: i64,
    #[schema(example = "late")]
    pub status: AttendanceStatus,
}

impl From<AttendanceSession> for SessionResponse {
    fn from(session: AttendanceSession) -> Self {
        Self {
            id: session.id,
            employee_id: session.employee_id,
            date: session.date,
            state: session.state(),
            total_working_hours: session.total_working_hours.map(round2),
            total_break_hours: session.total_break_hours.map(round2),
            overtime_hours: session.overtime_hours.map(round2),
            is_late: session.is_late,
            late_by_minutes: session.late_by_minutes,
            is_early_departure: session.is_early_departure,
            early_by_minutes: session.early_by_minutes,
            status: session.status,
            clock_in: session.clock_in,
            clock_out: session.clock_out,
            breaks: session.breaks,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionListResponse {
    pub data: Vec<SessionResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct StartBreakRequest {
    #[schema(example = "lunch")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SessionQuery {
    /// Filter by employee (HR/Admin only; employees always see their own)
    pub employee_id: Option<u64>,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub date_from: Option<NaiveDate>,
    #[schema(example = "2026-01-31", value_type = String, format = "date")]
    pub date_to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn own_employee_id(auth: &AuthUser) -> actix_web::Result<u64> {
    auth.employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = ClockRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Business-rule failure", body = Object, example = json!({
            "code": "OUT_OF_GEOFENCE",
            "message": "location is outside every allowed area (nearest boundary 5012 m away)"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "External verification unavailable"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<ClockRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth)?;
    let session = service.clock_in(employee_id, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(SessionResponse::from(session)))
}

/// Clock-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance",
    request_body = ClockRequest,
    responses(
        (status = 200, description = "Session closed", body = SessionResponse),
        (status = 400, description = "Business-rule failure"),
        (status = 404, description = "No open session", body = Object, example = json!({
            "code": "NO_OPEN_SESSION",
            "message": "no open attendance session for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<ClockRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth)?;
    let session = service.clock_out(employee_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// Start a break on the open session
#[utoipa::path(
    post,
    path = "/api/v1/attendance/breaks",
    request_body = StartBreakRequest,
    responses(
        (status = 200, description = "Break started", body = SessionResponse),
        (status = 400, description = "A break is already open"),
        (status = 404, description = "No open session"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn start_break(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<StartBreakRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth)?;
    let session = service
        .start_break(employee_id, payload.into_inner().reason)
        .await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// End the open break
#[utoipa::path(
    put,
    path = "/api/v1/attendance/breaks",
    responses(
        (status = 200, description = "Break ended", body = SessionResponse),
        (status = 404, description = "No open break"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn end_break(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth)?;
    let session = service.end_break(employee_id).await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// Today's session for the authenticated employee
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "No session today", body = Object, example = json!({
            "message": "No attendance session for today"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth)?;
    match service.today(employee_id).await? {
        Some(session) => Ok(HttpResponse::Ok().json(SessionResponse::from(session))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No attendance session for today"
        }))),
    }
}

/// Paginated attendance history
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(SessionQuery),
    responses(
        (status = 200, description = "Paginated session list", body = SessionListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_sessions(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<SessionQuery>,
) -> actix_web::Result<impl Responder> {
    // employees only ever see their own history
    let employee_id = if auth.is_employee() {
        Some(own_employee_id(&auth)?)
    } else {
        query.employee_id
    };

    let filter = SessionFilter {
        employee_id,
        date_from: query.date_from,
        date_to: query.date_to,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let (sessions, total) = service.list(&filter).await?;

    Ok(HttpResponse::Ok().json(SessionListResponse {
        data: sessions.into_iter().map(SessionResponse::from).collect(),
        page: filter.page.max(1) as u32,
        per_page: filter.per_page.clamp(1, 100) as u32,
        total,
    }))
}

/// Administrative correction (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{session_id}/correct",
    params(
        ("session_id" = u64, Path, description = "Session to correct")
    ),
    request_body = SessionCorrection,
    responses(
        (status = 200, description = "Correction applied", body = SessionResponse),
        (status = 400, description = "Invalid correction"),
        (status = 404, description = "Session not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn correct_session(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    payload: web::Json<SessionCorrection>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let session_id = path.into_inner();
    let session = service.correct(session_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounding_is_presentation_only() {
        assert_eq!(round2(6.333333333333333), 6.33);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(7.999999999), 8.0);
    }
}
