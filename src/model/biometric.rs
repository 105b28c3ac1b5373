use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored reference encoding for one employee. Produced by whatever face
/// model the deployment plugs in; this service only compares against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricTemplate {
    pub employee_id: u64,
    pub encoding: Vec<f32>,
    pub enrolled_at: Option<DateTime<Utc>>,
}
