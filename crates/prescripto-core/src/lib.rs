//! Prescripto Core Library
//!
//! Prescriptions and lab test results for a clinic appointment system.
//!
//! # Architecture
//!
//! ```text
//!  bearer token ──► TokenSigner::verify ──► Caller
//!                                             │
//!                          require_patient / require_doctor / require_admin
//!                                             │
//!                                             ▼
//!                                      RecordService ──────► ObjectStore
//!                                             │            (reports, images)
//!                               ┌─────────────┼─────────────┐
//!                               ▼             ▼             ▼
//!                          Directory    record_sequences   prescriptions
//!                     (patients, doctors,  (daily IDs)     test_results
//!                        appointments)
//! ```
//!
//! # Record IDs
//!
//! Records are identified as `PRES-YYYYMMDD-NNN` or `TEST-YYYYMMDD-NNN`, where
//! the date is the UTC creation date and `NNN` counts records of that kind
//! created the same day, starting at 001.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Prescription, TestResult, Patient, etc.)
//! - [`auth`]: Roles, access capabilities and bearer tokens
//! - [`storage`]: Attachment storage
//! - [`service`]: Record operations

pub mod auth;
pub mod db;
pub mod models;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use auth::{AdminAccess, AuthError, Caller, DoctorAccess, PatientAccess, Role, TokenSigner};
pub use db::{Database, DbError};
pub use models::{
    NewPrescription, NewTestResult, Prescription, PrescriptionPatch, RecordId, RecordStats,
    RecordVariant, Resolved, TestResult, TestResultPatch,
};
pub use service::{Clock, FixedClock, RecordError, RecordResult, RecordService, SystemClock, Uploads};
pub use storage::{Attachment, LocalObjectStore, ObjectStore, UploadError};
