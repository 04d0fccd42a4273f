//! Test result operations, including report and image uploads.

use tracing::{error, info, warn};

use super::{validation, RecordError, RecordResult, RecordService, SummaryCache};
use crate::auth::{AdminAccess, DoctorAccess, PatientAccess};
use crate::models::{
    DoctorSummary, NewTestResult, PatientSummary, Resolved, TestResult, TestResultPatch,
    TestResultStatus,
};
use crate::storage::{Attachment, IMAGE_FOLDER, REPORT_FOLDER};

/// Most images accepted with one test result.
pub const MAX_IMAGES: usize = 5;

/// Files submitted alongside a test result.
#[derive(Debug, Clone, Default)]
pub struct Uploads {
    pub report_file: Option<Attachment>,
    pub images: Vec<Attachment>,
}

impl Uploads {
    fn check_limits(&self) -> Result<(), String> {
        if self.images.len() > MAX_IMAGES {
            return Err(format!(
                "At most {} images can be attached, got {}",
                MAX_IMAGES,
                self.images.len()
            ));
        }
        Ok(())
    }
}

/// Stored URLs for a set of [`Uploads`].
struct StoredUploads {
    report_file: Option<String>,
    images: Vec<String>,
}

impl RecordService {
    /// Record a new lab result ordered by the calling doctor.
    ///
    /// Attachments are stored after the request has been validated and the
    /// patient found; if any upload fails nothing is written.
    pub fn create_test_result(
        &self,
        access: &DoctorAccess,
        request: NewTestResult,
        uploads: Uploads,
    ) -> RecordResult<TestResult> {
        let request = request.validate().map_err(validation)?;
        uploads.check_limits().map_err(validation)?;

        let (patient, doctor) = {
            let db = self.db.lock()?;
            let patient = db
                .get_patient(&request.patient_id)?
                .ok_or_else(|| RecordError::NotFound("Patient not found".into()))?;
            let doctor = db
                .get_doctor(access.doctor_id())?
                .ok_or_else(|| RecordError::NotFound("Doctor not found".into()))?;
            (patient, doctor)
        };

        let stored = self.store_uploads(&uploads)?;

        let mut db = self.db.lock()?;
        let now = self.clock.now();
        let result = TestResult {
            test_result_id: String::new(),
            patient_id: patient.id,
            patient_name: patient.name,
            test_name: request.test_name,
            test_type: request.test_type,
            test_date: request.test_date,
            result_date: now,
            results: request.results,
            doctor_id: Some(doctor.id),
            doctor_name: Some(doctor.name),
            laboratory_name: request.laboratory_name,
            laboratory_address: request.laboratory_address,
            report_file: stored.report_file,
            images: stored.images,
            analysis: request.analysis,
            comments: request.comments,
            recommendations: request.recommendations,
            status: TestResultStatus::Pending,
            priority: request.priority,
            created_at: now,
            updated_at: now,
        };

        let stored = db.insert_new_test_result(result)?;
        info!(
            test_result_id = %stored.test_result_id,
            patient_id = %stored.patient_id,
            images = stored.images.len(),
            "Test result created"
        );
        Ok(stored)
    }

    /// The calling patient's test results, newest first.
    pub fn test_results_for_patient(&self, access: &PatientAccess) -> RecordResult<Vec<TestResult>> {
        let db = self.db.lock()?;
        Ok(db.list_test_results_for_patient(access.patient_id())?)
    }

    /// Test results ordered by the calling doctor, newest first.
    pub fn test_results_for_doctor(&self, access: &DoctorAccess) -> RecordResult<Vec<TestResult>> {
        let db = self.db.lock()?;
        Ok(db.list_test_results_for_doctor(access.doctor_id())?)
    }

    /// Every test result with patient and doctor names attached.
    pub fn all_test_results(&self, _access: &AdminAccess) -> RecordResult<Vec<Resolved<TestResult>>> {
        let db = self.db.lock()?;
        let mut cache = SummaryCache::new(&db);

        let mut resolved = Vec::new();
        for result in db.list_test_results()? {
            let doctor = match &result.doctor_id {
                Some(doctor_id) => cache.doctor(doctor_id)?,
                None => None,
            };
            resolved.push(Resolved {
                patient: cache.patient(&result.patient_id)?,
                doctor,
                appointment: None,
                record: result,
            });
        }
        Ok(resolved)
    }

    /// A single test result with its patient and doctor.
    pub fn test_result(&self, test_result_id: &str) -> RecordResult<Resolved<TestResult>> {
        let db = self.db.lock()?;
        let result = db
            .get_test_result(test_result_id)?
            .ok_or_else(|| RecordError::NotFound("Test result not found".into()))?;

        let patient = db.get_patient(&result.patient_id)?.map(PatientSummary::from);
        let doctor = match &result.doctor_id {
            Some(doctor_id) => db.get_doctor(doctor_id)?.map(DoctorSummary::from),
            None => None,
        };

        Ok(Resolved {
            record: result,
            patient,
            doctor,
            appointment: None,
        })
    }

    /// Apply `patch` to a test result, replacing the report and/or images
    /// with any new uploads.
    ///
    /// Only the ordering doctor may update a result. Results entered without
    /// a doctor can be updated by any doctor.
    pub fn update_test_result(
        &self,
        access: &DoctorAccess,
        test_result_id: &str,
        patch: TestResultPatch,
        uploads: Uploads,
    ) -> RecordResult<TestResult> {
        // Reject before any file is written.
        {
            let db = self.db.lock()?;
            let current = db
                .get_test_result(test_result_id)?
                .ok_or_else(|| RecordError::NotFound("Test result not found".into()))?;
            check_author(&current, access)?;
        }
        patch.validate().map_err(validation)?;
        uploads.check_limits().map_err(validation)?;

        let stored = self.store_uploads(&uploads)?;

        // Uploads run unlocked, so the record is read again and written under
        // one lock; patches that landed meanwhile are kept.
        let db = self.db.lock()?;
        let mut result = db
            .get_test_result(test_result_id)?
            .ok_or_else(|| RecordError::NotFound("Test result not found".into()))?;
        check_author(&result, access)?;

        if stored.report_file.is_some() {
            result.report_file = stored.report_file;
        }
        if !stored.images.is_empty() {
            result.images = stored.images;
        }
        patch.apply(&mut result, self.clock.now());

        if !db.update_test_result(&result)? {
            return Err(RecordError::NotFound("Test result not found".into()));
        }

        info!(test_result_id, status = result.status.as_str(), "Test result updated");
        Ok(result)
    }

    fn store_uploads(&self, uploads: &Uploads) -> RecordResult<StoredUploads> {
        let report_file = match &uploads.report_file {
            Some(file) => Some(self.put(REPORT_FOLDER, file)?),
            None => None,
        };
        let images = uploads
            .images
            .iter()
            .map(|file| self.put(IMAGE_FOLDER, file))
            .collect::<RecordResult<Vec<_>>>()?;

        Ok(StoredUploads {
            report_file,
            images,
        })
    }

    fn put(&self, folder: &str, file: &Attachment) -> RecordResult<String> {
        self.store.put(folder, file).map_err(|e| {
            error!(file = %file.file_name, folder, error = %e, "Attachment upload failed");
            RecordError::Upload(e)
        })
    }
}

/// Only the ordering doctor may change a result; results without one are open
/// to any doctor.
fn check_author(result: &TestResult, access: &DoctorAccess) -> RecordResult<()> {
    match &result.doctor_id {
        Some(owner) if owner != access.doctor_id() => {
            warn!(
                test_result_id = %result.test_result_id,
                doctor_id = access.doctor_id(),
                "Rejected test result update by another doctor"
            );
            Err(RecordError::Authorization(
                "Not authorized to update this test result".into(),
            ))
        }
        _ => Ok(()),
    }
}
