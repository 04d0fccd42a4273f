//! Record service: the operations exposed to the API layer.
//!
//! Every operation takes the access capability for the role allowed to call
//! it (see [`crate::auth`]). The service owns the database connection, the
//! attachment store and the clock; all three are injected at construction.

mod prescriptions;
mod test_results;

pub use test_results::{Uploads, MAX_IMAGES};

use chrono::{DateTime, Months, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{AdminAccess, AuthError};
use crate::db::{Database, DbError};
use crate::models::{
    Appointment, Doctor, DoctorSummary, Patient, PatientSummary, RecordStats, RecordVariant,
};
use crate::storage::{ObjectStore, UploadError};

/// Errors returned by record operations.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Authorization(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Persistence(String),
}

impl RecordError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::Validation(_) => "VALIDATION_ERROR",
            RecordError::NotFound(_) => "NOT_FOUND",
            RecordError::Authorization(_) => "AUTHORIZATION_ERROR",
            RecordError::Upload(_) => "UPLOAD_ERROR",
            RecordError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<DbError> for RecordError {
    fn from(e: DbError) -> Self {
        RecordError::Persistence(e.to_string())
    }
}

impl From<AuthError> for RecordError {
    fn from(e: AuthError) -> Self {
        RecordError::Authorization(e.to_string())
    }
}

impl<T> From<PoisonError<T>> for RecordError {
    fn from(e: PoisonError<T>) -> Self {
        RecordError::Persistence(format!("Lock poisoned: {}", e))
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Length of the trailing window covered by monthly stats.
const STATS_WINDOW_MONTHS: u32 = 6;

/// Thread-safe entry point for record operations.
pub struct RecordService {
    db: Arc<Mutex<Database>>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl RecordService {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            store,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Add a patient to the directory.
    pub fn register_patient(&self, patient: Patient) -> RecordResult<Patient> {
        let db = self.db.lock()?;
        db.insert_patient(&patient)?;
        info!(patient_id = %patient.id, "Registered patient");
        Ok(patient)
    }

    /// Add a doctor to the directory.
    pub fn register_doctor(&self, doctor: Doctor) -> RecordResult<Doctor> {
        let db = self.db.lock()?;
        db.insert_doctor(&doctor)?;
        info!(doctor_id = %doctor.id, "Registered doctor");
        Ok(doctor)
    }

    /// Record a booked appointment between an existing patient and doctor.
    pub fn book_appointment(&self, appointment: Appointment) -> RecordResult<Appointment> {
        let db = self.db.lock()?;
        if db.get_patient(&appointment.patient_id)?.is_none() {
            return Err(RecordError::NotFound("Patient not found".into()));
        }
        if db.get_doctor(&appointment.doctor_id)?.is_none() {
            return Err(RecordError::NotFound("Doctor not found".into()));
        }
        db.insert_appointment(&appointment)?;
        info!(appointment_id = %appointment.id, "Booked appointment");
        Ok(appointment)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Counts for one record variant, with monthly buckets for the trailing
    /// six months.
    pub fn stats(&self, _access: &AdminAccess, variant: RecordVariant) -> RecordResult<RecordStats> {
        let now = self.clock.now();
        let since = now
            .checked_sub_months(Months::new(STATS_WINDOW_MONTHS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let db = self.db.lock()?;
        Ok(db.record_stats(variant, since)?)
    }
}

fn validation(reason: String) -> RecordError {
    warn!(reason = %reason, "Rejected invalid record");
    RecordError::Validation(reason)
}

/// Memoized directory lookups for building list views.
struct SummaryCache<'a> {
    db: &'a Database,
    patients: HashMap<String, Option<PatientSummary>>,
    doctors: HashMap<String, Option<DoctorSummary>>,
}

impl<'a> SummaryCache<'a> {
    fn new(db: &'a Database) -> Self {
        Self {
            db,
            patients: HashMap::new(),
            doctors: HashMap::new(),
        }
    }

    fn patient(&mut self, patient_id: &str) -> RecordResult<Option<PatientSummary>> {
        if let Some(cached) = self.patients.get(patient_id) {
            return Ok(cached.clone());
        }
        let summary = self
            .db
            .get_patient(patient_id)?
            .map(|p| PatientSummary::brief(&p));
        self.patients.insert(patient_id.to_string(), summary.clone());
        Ok(summary)
    }

    fn doctor(&mut self, doctor_id: &str) -> RecordResult<Option<DoctorSummary>> {
        if let Some(cached) = self.doctors.get(doctor_id) {
            return Ok(cached.clone());
        }
        let summary = self
            .db
            .get_doctor(doctor_id)?
            .map(|d| DoctorSummary::brief(&d));
        self.doctors.insert(doctor_id.to_string(), summary.clone());
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{NewPrescription, NewTestResult};
    use crate::storage::LocalObjectStore;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::{OnceLock, TryLockError};
    use tempfile::TempDir;

    pub struct Fixture {
        pub service: RecordService,
        pub clock: Arc<FixedClock>,
        pub patient: Patient,
        pub doctor: Doctor,
        pub appointment: Appointment,
        pub _uploads: TempDir,
    }

    pub fn prescription_request(f: &Fixture) -> NewPrescription {
        prescription_request_for(&f.patient, &f.appointment)
    }

    pub fn prescription_request_for(patient: &Patient, appointment: &Appointment) -> NewPrescription {
        serde_json::from_value(serde_json::json!({
            "patientId": patient.id,
            "appointmentId": appointment.id,
            "diagnosis": "Acute pharyngitis",
            "symptoms": ["sore throat", "fever"],
            "medications": [{
                "name": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "3 times daily",
                "duration": "7 days"
            }],
            "testsRecommended": [{"testName": "Throat swab", "urgency": "Urgent"}],
            "followUpDate": "2024-06-21"
        }))
        .unwrap()
    }

    pub fn test_result_request(f: &Fixture) -> NewTestResult {
        test_result_request_for(&f.patient)
    }

    pub fn test_result_request_for(patient: &Patient) -> NewTestResult {
        serde_json::from_value(serde_json::json!({
            "patientId": patient.id,
            "testName": "Complete Blood Count",
            "testType": "Blood Test",
            "testDate": "2024-06-12",
            "results": [
                {"parameter": "Hemoglobin", "value": "11.2", "unit": "g/dL", "normalRange": "12-16", "status": "Low"},
                {"parameter": "WBC", "value": "7.1", "unit": "10^9/L", "normalRange": "4-11"}
            ],
            "laboratoryName": "City Diagnostics"
        }))
        .unwrap()
    }

    pub fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    pub fn fixture() -> Fixture {
        let uploads = TempDir::new().unwrap();
        let store = Arc::new(LocalObjectStore::new(uploads.path(), "http://files.test"));
        let clock = Arc::new(FixedClock::new(noon(2024, 6, 14)));
        let service = RecordService::new(Database::open_in_memory().unwrap(), store, clock.clone());
        let (patient, doctor, appointment) = seed(&service);

        Fixture {
            service,
            clock,
            patient,
            doctor,
            appointment,
            _uploads: uploads,
        }
    }

    /// Register a patient, a doctor and an appointment between them.
    pub fn seed(service: &RecordService) -> (Patient, Doctor, Appointment) {
        let mut patient = Patient::new("Asha Verma".into(), "asha@example.com".into());
        patient.date_of_birth = NaiveDate::from_ymd_opt(2000, 6, 15);
        patient.gender = "Female".into();
        patient.phone = Some("555-0101".into());
        let patient = service.register_patient(patient).unwrap();

        let mut doctor = Doctor::new("Dr. Rao".into(), "rao@example.com".into(), "General physician".into());
        doctor.phone = Some("555-0199".into());
        let doctor = service.register_doctor(doctor).unwrap();

        let appointment = service
            .book_appointment(Appointment::new(
                patient.id.clone(),
                doctor.id.clone(),
                "14_6_2024".into(),
                "10:30 AM".into(),
            ))
            .unwrap();

        (patient, doctor, appointment)
    }

    /// Clock that notes, on every read, whether the service's database lock
    /// was held at that moment.
    pub struct LockWatchClock {
        at: DateTime<Utc>,
        db: OnceLock<Arc<Mutex<Database>>>,
        reads: Mutex<Vec<bool>>,
    }

    impl LockWatchClock {
        pub fn new(at: DateTime<Utc>) -> Self {
            Self {
                at,
                db: OnceLock::new(),
                reads: Mutex::new(Vec::new()),
            }
        }

        pub fn watch(&self, service: &RecordService) {
            let _ = self.db.set(service.db.clone());
        }

        pub fn reads(&self) -> Vec<bool> {
            self.reads.lock().unwrap().clone()
        }
    }

    impl Clock for LockWatchClock {
        fn now(&self) -> DateTime<Utc> {
            if let Some(db) = self.db.get() {
                let held = matches!(db.try_lock(), Err(TryLockError::WouldBlock));
                self.reads.lock().unwrap().push(held);
            }
            self.at
        }
    }

    /// Service over an in-memory database whose clock watches the lock.
    pub fn lock_watched_service() -> (RecordService, Arc<LockWatchClock>, TempDir) {
        let uploads = TempDir::new().unwrap();
        let store = Arc::new(LocalObjectStore::new(uploads.path(), "http://files.test"));
        let clock = Arc::new(LockWatchClock::new(noon(2024, 6, 14)));
        let service = RecordService::new(Database::open_in_memory().unwrap(), store, clock.clone());
        clock.watch(&service);
        (service, clock, uploads)
    }
}
