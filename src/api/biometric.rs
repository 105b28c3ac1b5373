use crate::attendance::service::AttendanceService;
use crate::auth::auth::AuthUser;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    /// Enroll on behalf of another employee (HR/Admin only)
    pub employee_id: Option<u64>,
    /// Reference face encoding produced by the capture client
    pub encoding: Vec<f32>,
}

/// Enroll (or replace) a biometric reference template
#[utoipa::path(
    post,
    path = "/api/v1/biometrics/enroll",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Template stored", body = Object, example = json!({
            "message": "Biometric template enrolled"
        })),
        (status = 400, description = "Empty encoding"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Biometric"
)]
pub async fn enroll(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<EnrollRequest>,
) -> actix_web::Result<impl Responder> {
    let own = auth.employee_id;
    let target = match payload.employee_id {
        Some(id) if Some(id) != own => {
            // enrolling someone else is a privileged operation
            auth.require_hr_or_admin()?;
            id
        }
        Some(id) => id,
        None => own.ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?,
    };

    if payload.encoding.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "encoding must not be empty"
        })));
    }

    service.enroll_biometric(target, &payload.encoding).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Biometric template enrolled"
    })))
}
