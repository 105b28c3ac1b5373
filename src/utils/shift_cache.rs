use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::join_all;
use moka::future::Cache;
use tracing::info;

use crate::attendance::error::AttendanceError;
use crate::attendance::store::ShiftStore;
use crate::model::shift::Shift;

/// Read-through cache in front of the per-employee shift lookup. Every clock
/// action resolves the employee's shift, so the hot path should not hit the
/// database each time.
///
/// Owned by the process startup sequence and injected where needed; there is
/// no module-level instance.
#[derive(Clone)]
pub struct ShiftCache {
    store: ShiftStore,
    by_employee: Cache<u64, Arc<Shift>>,
}

impl ShiftCache {
    pub fn new(store: ShiftStore, capacity: u64, ttl_secs: u64) -> Self {
        Self {
            store,
            by_employee: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(Duration::from_secs(ttl_secs))
                .build(),
        }
    }

    /// Shift assigned to the employee, from cache or the database.
    pub async fn for_employee(&self, employee_id: u64) -> Result<Option<Arc<Shift>>, AttendanceError> {
        if let Some(shift) = self.by_employee.get(&employee_id).await {
            return Ok(Some(shift));
        }
        match self.store.for_employee(employee_id).await? {
            Some(shift) => {
                let shift = Arc::new(shift);
                self.by_employee.insert(employee_id, shift.clone()).await;
                Ok(Some(shift))
            }
            None => Ok(None),
        }
    }

    pub async fn create(&self, shift: &Shift) -> Result<u64, AttendanceError> {
        self.store.create(shift).await
    }

    /// Updating a shift may affect any assigned employee, so the whole cache
    /// is dropped rather than tracking the reverse mapping.
    pub async fn update(&self, id: u64, shift: &Shift) -> Result<u64, AttendanceError> {
        let affected = self.store.update(id, shift).await?;
        if affected > 0 {
            self.by_employee.invalidate_all();
        }
        Ok(affected)
    }

    pub async fn get(&self, id: u64) -> Result<Option<Shift>, AttendanceError> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Shift>, AttendanceError> {
        self.store.list().await
    }

    pub async fn assign(&self, employee_id: u64, shift_id: u64) -> Result<(), AttendanceError> {
        self.store.assign(employee_id, shift_id).await?;
        self.by_employee.invalidate(&employee_id).await;
        Ok(())
    }

    /// Preloads the most recent assignments so the first clock-ins of the day
    /// do not all fall through to the database.
    pub async fn warmup(&self, limit: u32) -> Result<()> {
        let assignments = self.store.recent_assignments(limit).await?;
        let count = assignments.len();
        let inserts: Vec<_> = assignments
            .into_iter()
            .map(|(employee_id, shift)| self.by_employee.insert(employee_id, Arc::new(shift)))
            .collect();
        join_all(inserts).await;
        info!(count, "Shift cache warmed up");
        Ok(())
    }
}
