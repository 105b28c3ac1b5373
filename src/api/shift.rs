use crate::auth::auth::AuthUser;
use crate::model::shift::{GeofenceCircle, OvertimeRule, Shift};
use crate::utils::shift_cache::ShiftCache;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ShiftPayload {
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
    #[serde(default)]
    pub require_biometric: bool,
    #[serde(default)]
    pub geofences: Vec<GeofenceCircle>,
    #[serde(default)]
    pub overtime: OvertimeRule,
}

impl ShiftPayload {
    fn into_shift(self, id: u64) -> Shift {
        Shift {
            id,
            name: self.name,
            start_time: self.start_time,
            end_time: self.end_time,
            working_hours: self.working_hours,
            late_threshold_minutes: self.late_threshold_minutes,
            early_departure_threshold_minutes: self.early_departure_threshold_minutes,
            require_biometric: self.require_biometric,
            geofences: self.geofences,
            overtime: self.overtime,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AssignShiftRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
}

/// Create Shift
#[utoipa::path(
    post,
    path = "/api/v1/shifts",
    request_body = ShiftPayload,
    responses(
        (status = 201, description = "Shift created", body = Object, example = json!({
            "id": 3,
            "message": "Shift created"
        })),
        (status = 400, description = "Invalid shift configuration", body = Object, example = json!({
            "code": "INVALID_SHIFT_CONFIGURATION",
            "message": "invalid shift configuration: geofence radius must be positive"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn create_shift(
    auth: AuthUser,
    shifts: web::Data<ShiftCache>,
    payload: web::Json<ShiftPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let shift = payload.into_inner().into_shift(0);
    // a persisted shift is always well-formed; reject bad config here,
    // never at clock time
    shift.validate()?;

    let id = shifts.create(&shift).await?;
    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "message": "Shift created"
    })))
}

/// List shifts
#[utoipa::path(
    get,
    path = "/api/v1/shifts",
    responses(
        (status = 200, description = "All shifts", body = [Shift]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn list_shifts(
    auth: AuthUser,
    shifts: web::Data<ShiftCache>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let all = shifts.list().await?;
    Ok(HttpResponse::Ok().json(all))
}

/// Get shift by ID
#[utoipa::path(
    get,
    path = "/api/v1/shifts/{shift_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Shift found", body = Shift),
        (status = 404, description = "Shift not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn get_shift(
    auth: AuthUser,
    shifts: web::Data<ShiftCache>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    match shifts.get(path.into_inner()).await? {
        Some(shift) => Ok(HttpResponse::Ok().json(shift)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Shift not found"
        }))),
    }
}

/// Update shift
#[utoipa::path(
    put,
    path = "/api/v1/shifts/{shift_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID")
    ),
    request_body = ShiftPayload,
    responses(
        (status = 200, description = "Shift updated"),
        (status = 400, description = "Invalid shift configuration"),
        (status = 404, description = "Shift not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn update_shift(
    auth: AuthUser,
    shifts: web::Data<ShiftCache>,
    path: web::Path<u64>,
    payload: web::Json<ShiftPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let shift_id = path.into_inner();
    let shift = payload.into_inner().into_shift(shift_id);
    shift.validate()?;

    let affected = shifts.update(shift_id, &shift).await?;
    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Shift not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Shift updated"
    })))
}

/// Assign an employee to a shift
#[utoipa::path(
    post,
    path = "/api/v1/shifts/{shift_id}/assign",
    params(
        ("shift_id" = u64, Path, description = "Shift ID")
    ),
    request_body = AssignShiftRequest,
    responses(
        (status = 200, description = "Employee assigned", body = Object, example = json!({
            "message": "Employee assigned to shift"
        })),
        (status = 404, description = "Shift not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn assign_shift(
    auth: AuthUser,
    shifts: web::Data<ShiftCache>,
    path: web::Path<u64>,
    payload: web::Json<AssignShiftRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let shift_id = path.into_inner();
    if shifts.get(shift_id).await?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Shift not found"
        })));
    }

    shifts.assign(payload.employee_id, shift_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee assigned to shift"
    })))
}
