//! Aggregate record statistics and resolved-reference views.

use serde::{Deserialize, Serialize};

use super::people::{AppointmentSummary, DoctorSummary, PatientSummary};

/// Records created in one calendar month (UTC).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub count: u64,
}

/// Counts for one record variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub total: u64,
    /// Active prescriptions, or pending test results
    pub active: u64,
    pub completed: u64,
    /// Trailing six months, oldest first
    pub monthly_stats: Vec<MonthlyCount>,
}

/// A record together with the directory entries it references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resolved<T> {
    #[serde(flatten)]
    pub record: T,
    /// `None` when the referenced patient no longer exists
    pub patient: Option<PatientSummary>,
    pub doctor: Option<DoctorSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentSummary>,
}
