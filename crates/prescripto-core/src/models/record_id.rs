//! Human-readable record identifiers.
//!
//! Every medical record gets an ID of the form `PREFIX-YYYYMMDD-NNN` at creation
//! time. The date is the UTC calendar date of creation and `NNN` is the 1-based
//! position of the record among records of the same variant created that day.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two concrete medical-record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordVariant {
    Prescription,
    TestResult,
}

impl RecordVariant {
    /// ID prefix for this variant.
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordVariant::Prescription => "PRES",
            RecordVariant::TestResult => "TEST",
        }
    }

    /// Table holding records of this variant.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            RecordVariant::Prescription => "prescriptions",
            RecordVariant::TestResult => "test_results",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "PRES" => Some(RecordVariant::Prescription),
            "TEST" => Some(RecordVariant::TestResult),
            _ => None,
        }
    }
}

impl fmt::Display for RecordVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordVariant::Prescription => f.write_str("prescription"),
            RecordVariant::TestResult => f.write_str("test result"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RecordIdError {
    #[error("Malformed record ID: {0}")]
    Malformed(String),

    #[error("Unknown record prefix: {0}")]
    UnknownPrefix(String),
}

/// A parsed `PREFIX-YYYYMMDD-NNN` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub variant: RecordVariant,
    pub date: NaiveDate,
    pub sequence: u32,
}

impl RecordId {
    /// Build the ID for the `sequence`-th record of `variant` created at `created_at`.
    pub fn new(variant: RecordVariant, created_at: DateTime<Utc>, sequence: u32) -> Self {
        Self {
            variant,
            date: created_at.date_naive(),
            sequence,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:04}{:02}{:02}-{:03}",
            self.variant.prefix(),
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.sequence
        )
    }
}

impl FromStr for RecordId {
    type Err = RecordIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RecordIdError::Malformed(s.to_string());

        let mut parts = s.splitn(3, '-');
        let prefix = parts.next().ok_or_else(malformed)?;
        let date = parts.next().ok_or_else(malformed)?;
        let sequence = parts.next().ok_or_else(malformed)?;

        let variant = RecordVariant::from_prefix(prefix)
            .ok_or_else(|| RecordIdError::UnknownPrefix(prefix.to_string()))?;

        if date.len() != 8 || sequence.len() < 3 {
            return Err(malformed());
        }
        let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed())?;
        let sequence: u32 = sequence.parse().map_err(|_| malformed())?;
        if sequence == 0 {
            return Err(malformed());
        }

        Ok(Self {
            variant,
            date,
            sequence,
        })
    }
}

/// Half-open UTC window `[start of day, start of next day)` containing `at`.
pub fn day_window(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = at.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Whole years between `date_of_birth` and `on`, minus one if the birthday
/// has not been reached yet in `on`'s year.
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}
