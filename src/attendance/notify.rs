use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::warn;

use crate::model::notification::AttendanceEvent;

/// Fan-out target for state-machine events. Fire-and-forget: the state
/// machine never waits on or learns about delivery failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: AttendanceEvent);
}

/// In-app channel: one row per event in the `notifications` table, written
/// from a detached task so a slow insert cannot delay the clock response.
pub struct InAppNotifier {
    pool: MySqlPool,
}

impl InAppNotifier {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for InAppNotifier {
    async fn emit(&self, event: AttendanceEvent) {
        let pool = self.pool.clone();
        actix_web::rt::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO notifications (employee_id, event, message, details)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(event.employee_id)
            .bind(event.kind.to_string())
            .bind(&event.message)
            .bind(event.details.to_string())
            .execute(&pool)
            .await;

            if let Err(e) = result {
                warn!(error = %e, employee_id = event.employee_id, kind = %event.kind,
                    "Failed to store notification");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::model::notification::AttendanceEventKind;

    #[test]
    fn event_kinds_render_snake_case() {
        assert_eq!(AttendanceEventKind::ClockedIn.to_string(), "clocked_in");
        assert_eq!(AttendanceEventKind::ClockedOut.to_string(), "clocked_out");
        assert_eq!(
            AttendanceEventKind::IrregularAttendance.to_string(),
            "irregular_attendance"
        );
    }
}
