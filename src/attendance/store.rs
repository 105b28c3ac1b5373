//! MySQL persistence for sessions, shifts and biometric templates.
//!
//! The `UNIQUE KEY (employee_id, date)` on `attendance_sessions` is the
//! mutual-exclusion point for concurrent clock-ins: the insert either wins or
//! surfaces the duplicate-key violation, which maps to `AlreadyClockedIn`.
//! No check-then-act anywhere.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{FromRow, MySqlPool};
use tracing::error;

use crate::attendance::error::AttendanceError;
use crate::attendance::geofence::GeoPoint;
use crate::model::biometric::BiometricTemplate;
use crate::model::session::{AttendanceSession, BreakRecord, ClockEvent};
use crate::model::shift::Shift;

const SESSION_COLUMNS: &str = "id, employee_id, date, \
    clock_in_time, clock_in_latitude, clock_in_longitude, clock_in_address, clock_in_confidence, clock_in_device, \
    clock_out_time, clock_out_latitude, clock_out_longitude, clock_out_address, clock_out_confidence, clock_out_device, \
    total_working_hours, total_break_hours, overtime_hours, \
    is_late, late_by_minutes, is_early_departure, early_by_minutes, status, status_override";

#[derive(FromRow)]
struct SessionRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    clock_in_time: NaiveDateTime,
    clock_in_latitude: f64,
    clock_in_longitude: f64,
    clock_in_address: Option<String>,
    clock_in_confidence: Option<f64>,
    clock_in_device: Option<String>,
    clock_out_time: Option<NaiveDateTime>,
    clock_out_latitude: Option<f64>,
    clock_out_longitude: Option<f64>,
    clock_out_address: Option<String>,
    clock_out_confidence: Option<f64>,
    clock_out_device: Option<String>,
    total_working_hours: Option<f64>,
    total_break_hours: Option<f64>,
    overtime_hours: Option<f64>,
    is_late: bool,
    late_by_minutes: i64,
    is_early_departure: bool,
    early_by_minutes: i64,
    status: String,
    status_override: Option<String>,
}

fn parse_device(text: Option<String>) -> Option<serde_json::Value> {
    text.and_then(|t| serde_json::from_str(&t).ok())
}

impl SessionRow {
    fn into_session(self, breaks: Vec<BreakRecord>) -> AttendanceSession {
        let clock_out = match (
            self.clock_out_time,
            self.clock_out_latitude,
            self.clock_out_longitude,
        ) {
            (Some(time), Some(latitude), Some(longitude)) => Some(ClockEvent {
                time,
                location: GeoPoint { latitude, longitude },
                address: self.clock_out_address,
                confidence: self.clock_out_confidence,
                device: parse_device(self.clock_out_device),
            }),
            _ => None,
        };

        AttendanceSession {
            id: self.id,
            employee_id: self.employee_id,
            date: self.date,
            clock_in: ClockEvent {
                time: self.clock_in_time,
                location: GeoPoint {
                    latitude: self.clock_in_latitude,
                    longitude: self.clock_in_longitude,
                },
                address: self.clock_in_address,
                confidence: self.clock_in_confidence,
                device: parse_device(self.clock_in_device),
            },
            clock_out,
            breaks,
            total_working_hours: self.total_working_hours,
            total_break_hours: self.total_break_hours,
            overtime_hours: self.overtime_hours,
            is_late: self.is_late,
            late_by_minutes: self.late_by_minutes,
            is_early_departure: self.is_early_departure,
            early_by_minutes: self.early_by_minutes,
            status: self.status.parse().unwrap_or_default(),
            status_override: self.status_override.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(FromRow)]
struct BreakRow {
    id: u64,
    start_time: NaiveDateTime,
    end_time: Option<NaiveDateTime>,
    reason: Option<String>,
}

/// Pagination filter for the history listing.
#[derive(Debug)]
pub struct SessionFilter {
    pub employee_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: u64,
    pub per_page: u64,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

#[derive(Clone)]
pub struct SessionStore {
    pool: MySqlPool,
}

impl SessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Inserts the session created by a clock-in. A duplicate-key violation
    /// on (employee_id, date) means another request won the race (or the day
    /// already has a session) and becomes `AlreadyClockedIn`.
    pub async fn insert(&self, session: &AttendanceSession) -> Result<u64, AttendanceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_sessions
                (employee_id, date, clock_in_time, clock_in_latitude, clock_in_longitude,
                 clock_in_address, clock_in_confidence, clock_in_device,
                 is_late, late_by_minutes, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.employee_id)
        .bind(session.date)
        .bind(session.clock_in.time)
        .bind(session.clock_in.location.latitude)
        .bind(session.clock_in.location.longitude)
        .bind(&session.clock_in.address)
        .bind(session.clock_in.confidence)
        .bind(session.clock_in.device.as_ref().map(|d| d.to_string()))
        .bind(session.is_late)
        .bind(session.late_by_minutes)
        .bind(session.status.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_id()),
            Err(e) => {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(AttendanceError::AlreadyClockedIn);
                    }
                }
                error!(error = %e, employee_id = session.employee_id, "Failed to insert attendance session");
                Err(e.into())
            }
        }
    }

    /// Latest session without a clock-out on or after `since`. Looking one
    /// day back covers overnight shifts whose clock-out lands past midnight.
    pub async fn find_open(
        &self,
        employee_id: u64,
        since: NaiveDate,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM attendance_sessions \
             WHERE employee_id = ? AND clock_out_time IS NULL AND date >= ? \
             ORDER BY date DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(employee_id)
            .bind(since)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_breaks(row).await
    }

    pub async fn find_by_date(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE employee_id = ? AND date = ?"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_breaks(row).await
    }

    pub async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceSession>, AttendanceError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_breaks(row).await
    }

    async fn attach_breaks(
        &self,
        row: Option<SessionRow>,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        match row {
            Some(row) => {
                let breaks = self.breaks_for(row.id).await?;
                Ok(Some(row.into_session(breaks)))
            }
            None => Ok(None),
        }
    }

    pub async fn breaks_for(&self, session_id: u64) -> Result<Vec<BreakRecord>, AttendanceError> {
        let rows = sqlx::query_as::<_, BreakRow>(
            "SELECT id, start_time, end_time, reason FROM attendance_breaks \
             WHERE session_id = ? ORDER BY start_time",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|b| BreakRecord {
                id: b.id,
                start_time: b.start_time,
                end_time: b.end_time,
                reason: b.reason,
            })
            .collect())
    }

    pub async fn insert_break(
        &self,
        session_id: u64,
        record: &BreakRecord,
    ) -> Result<u64, AttendanceError> {
        let done = sqlx::query(
            "INSERT INTO attendance_breaks (session_id, start_time, reason) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(record.start_time)
        .bind(&record.reason)
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_id())
    }

    /// Closes the open break of a session, if any. Used both by the explicit
    /// end-break transition and by the auto-close at clock-out.
    pub async fn close_open_break(
        &self,
        session_id: u64,
        end_time: NaiveDateTime,
    ) -> Result<u64, AttendanceError> {
        let done = sqlx::query(
            "UPDATE attendance_breaks SET end_time = ? WHERE session_id = ? AND end_time IS NULL",
        )
        .bind(end_time)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    /// Writes the clock-out sub-record, derived fields and status back to the
    /// row. Also used after administrative corrections.
    pub async fn update_derived(&self, session: &AttendanceSession) -> Result<(), AttendanceError> {
        sqlx::query(
            r#"
            UPDATE attendance_sessions SET
                clock_in_time = ?,
                clock_out_time = ?, clock_out_latitude = ?, clock_out_longitude = ?,
                clock_out_address = ?, clock_out_confidence = ?, clock_out_device = ?,
                total_working_hours = ?, total_break_hours = ?, overtime_hours = ?,
                is_late = ?, late_by_minutes = ?,
                is_early_departure = ?, early_by_minutes = ?,
                status = ?, status_override = ?
            WHERE id = ?
            "#,
        )
        .bind(session.clock_in.time)
        .bind(session.clock_out.as_ref().map(|c| c.time))
        .bind(session.clock_out.as_ref().map(|c| c.location.latitude))
        .bind(session.clock_out.as_ref().map(|c| c.location.longitude))
        .bind(session.clock_out.as_ref().and_then(|c| c.address.clone()))
        .bind(session.clock_out.as_ref().and_then(|c| c.confidence))
        .bind(
            session
                .clock_out
                .as_ref()
                .and_then(|c| c.device.as_ref().map(|d| d.to_string())),
        )
        .bind(session.total_working_hours)
        .bind(session.total_break_hours)
        .bind(session.overtime_hours)
        .bind(session.is_late)
        .bind(session.late_by_minutes)
        .bind(session.is_early_departure)
        .bind(session.early_by_minutes)
        .bind(session.status.to_string())
        .bind(session.status_override.map(|s| s.to_string()))
        .bind(session.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Paginated history, newest first. Breaks are attached per page row.
    pub async fn list(
        &self,
        filter: &SessionFilter,
    ) -> Result<(Vec<AttendanceSession>, i64), AttendanceError> {
        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * per_page;

        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(employee_id) = filter.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(employee_id));
        }
        if let Some(from) = filter.date_from {
            where_sql.push_str(" AND date >= ?");
            args.push(FilterValue::Date(from));
        }
        if let Some(to) = filter.date_to {
            where_sql.push_str(" AND date <= ?");
            args.push(FilterValue::Date(to));
        }

        let count_sql = format!("SELECT COUNT(*) FROM attendance_sessions{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Date(d) => count_q.bind(*d),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {SESSION_COLUMNS} FROM attendance_sessions{where_sql} \
             ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, SessionRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Date(d) => data_q.bind(d),
            };
        }
        let rows = data_q
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let breaks = self.breaks_for(row.id).await?;
            sessions.push(row.into_session(breaks));
        }

        Ok((sessions, total))
    }
}

#[derive(FromRow)]
struct ShiftRow {
    id: u64,
    name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    working_hours: f64,
    late_threshold_minutes: i64,
    early_departure_threshold_minutes: i64,
    require_biometric: bool,
    geofences: String,
    overtime_enabled: bool,
    overtime_minimum_minutes: i64,
    overtime_multiplier: f64,
}

const SHIFT_COLUMNS: &str = "id, name, start_time, end_time, working_hours, \
    late_threshold_minutes, early_departure_threshold_minutes, require_biometric, geofences, \
    overtime_enabled, overtime_minimum_minutes, overtime_multiplier";

impl ShiftRow {
    fn into_shift(self) -> Shift {
        Shift {
            id: self.id,
            name: self.name,
            start_time: self.start_time,
            end_time: self.end_time,
            working_hours: self.working_hours,
            late_threshold_minutes: self.late_threshold_minutes,
            early_departure_threshold_minutes: self.early_departure_threshold_minutes,
            require_biometric: self.require_biometric,
            geofences: serde_json::from_str(&self.geofences).unwrap_or_default(),
            overtime: crate::model::shift::OvertimeRule {
                enabled: self.overtime_enabled,
                minimum_minutes: self.overtime_minimum_minutes,
                multiplier: self.overtime_multiplier,
            },
        }
    }
}

#[derive(Clone)]
pub struct ShiftStore {
    pool: MySqlPool,
}

impl ShiftStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, shift: &Shift) -> Result<u64, AttendanceError> {
        let done = sqlx::query(
            r#"
            INSERT INTO shifts
                (name, start_time, end_time, working_hours,
                 late_threshold_minutes, early_departure_threshold_minutes,
                 require_biometric, geofences,
                 overtime_enabled, overtime_minimum_minutes, overtime_multiplier)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&shift.name)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.working_hours)
        .bind(shift.late_threshold_minutes)
        .bind(shift.early_departure_threshold_minutes)
        .bind(shift.require_biometric)
        .bind(serde_json::to_string(&shift.geofences).unwrap_or_else(|_| "[]".into()))
        .bind(shift.overtime.enabled)
        .bind(shift.overtime.minimum_minutes)
        .bind(shift.overtime.multiplier)
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_id())
    }

    pub async fn update(&self, id: u64, shift: &Shift) -> Result<u64, AttendanceError> {
        let done = sqlx::query(
            r#"
            UPDATE shifts SET
                name = ?, start_time = ?, end_time = ?, working_hours = ?,
                late_threshold_minutes = ?, early_departure_threshold_minutes = ?,
                require_biometric = ?, geofences = ?,
                overtime_enabled = ?, overtime_minimum_minutes = ?, overtime_multiplier = ?
            WHERE id = ?
            "#,
        )
        .bind(&shift.name)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.working_hours)
        .bind(shift.late_threshold_minutes)
        .bind(shift.early_departure_threshold_minutes)
        .bind(shift.require_biometric)
        .bind(serde_json::to_string(&shift.geofences).unwrap_or_else(|_| "[]".into()))
        .bind(shift.overtime.enabled)
        .bind(shift.overtime.minimum_minutes)
        .bind(shift.overtime.multiplier)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    pub async fn get(&self, id: u64) -> Result<Option<Shift>, AttendanceError> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ShiftRow::into_shift))
    }

    pub async fn list(&self) -> Result<Vec<Shift>, AttendanceError> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY id");
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShiftRow::into_shift).collect())
    }

    /// Assigns (or re-assigns) an employee to a shift.
    pub async fn assign(&self, employee_id: u64, shift_id: u64) -> Result<(), AttendanceError> {
        sqlx::query(
            r#"
            INSERT INTO shift_assignments (employee_id, shift_id)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE shift_id = VALUES(shift_id)
            "#,
        )
        .bind(employee_id)
        .bind(shift_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn for_employee(&self, employee_id: u64) -> Result<Option<Shift>, AttendanceError> {
        let sql = format!(
            "SELECT s.id, s.name, s.start_time, s.end_time, s.working_hours, \
             s.late_threshold_minutes, s.early_departure_threshold_minutes, s.require_biometric, \
             s.geofences, s.overtime_enabled, s.overtime_minimum_minutes, s.overtime_multiplier \
             FROM shifts s \
             INNER JOIN shift_assignments a ON a.shift_id = s.id \
             WHERE a.employee_id = ?"
        );
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ShiftRow::into_shift))
    }

    /// Recently assigned employees with their shifts, for cache warmup.
    pub async fn recent_assignments(
        &self,
        limit: u32,
    ) -> Result<Vec<(u64, Shift)>, AttendanceError> {
        let sql = format!(
            "SELECT a.employee_id AS assigned_employee_id, s.id, s.name, s.start_time, s.end_time, \
             s.working_hours, s.late_threshold_minutes, s.early_departure_threshold_minutes, \
             s.require_biometric, s.geofences, s.overtime_enabled, s.overtime_minimum_minutes, \
             s.overtime_multiplier \
             FROM shift_assignments a \
             INNER JOIN shifts s ON s.id = a.shift_id \
             ORDER BY a.employee_id DESC LIMIT ?"
        );

        #[derive(FromRow)]
        struct AssignmentRow {
            assigned_employee_id: u64,
            #[sqlx(flatten)]
            shift: ShiftRow,
        }

        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.assigned_employee_id, r.shift.into_shift()))
            .collect())
    }
}

#[derive(Clone)]
pub struct TemplateStore {
    pool: MySqlPool,
}

impl TemplateStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, employee_id: u64) -> Result<Option<BiometricTemplate>, AttendanceError> {
        let row = sqlx::query_as::<_, (u64, String)>(
            "SELECT employee_id, encoding FROM biometric_templates WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(employee_id, encoding)| BiometricTemplate {
            employee_id,
            encoding: serde_json::from_str(&encoding).unwrap_or_default(),
            enrolled_at: None,
        }))
    }

    pub async fn upsert(&self, employee_id: u64, encoding: &[f32]) -> Result<(), AttendanceError> {
        let text = serde_json::to_string(encoding).unwrap_or_else(|_| "[]".into());
        sqlx::query(
            r#"
            INSERT INTO biometric_templates (employee_id, encoding)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE encoding = VALUES(encoding)
            "#,
        )
        .bind(employee_id)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
