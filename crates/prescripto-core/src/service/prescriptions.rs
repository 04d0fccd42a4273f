//! Prescription operations.

use tracing::{info, warn};

use super::{validation, RecordError, RecordResult, RecordService, SummaryCache};
use crate::auth::{AdminAccess, DoctorAccess, PatientAccess};
use crate::models::{
    age_on, AppointmentSummary, DoctorSummary, NewPrescription, PatientSummary, Prescription,
    PrescriptionPatch, PrescriptionStatus, Resolved,
};

impl RecordService {
    /// Write a new prescription as the calling doctor.
    ///
    /// Patient name, gender and age and the doctor's name and specialization
    /// are copied onto the record as they are at creation time.
    pub fn create_prescription(
        &self,
        access: &DoctorAccess,
        request: NewPrescription,
    ) -> RecordResult<Prescription> {
        let request = request.validate().map_err(validation)?;

        // Stamp under the lock that covers the insert so sequence numbers and
        // creation times sort the same way.
        let mut db = self.db.lock()?;
        let now = self.clock.now();
        let patient = db
            .get_patient(&request.patient_id)?
            .ok_or_else(|| RecordError::NotFound("Patient not found".into()))?;
        let doctor = db
            .get_doctor(access.doctor_id())?
            .ok_or_else(|| RecordError::NotFound("Doctor not found".into()))?;
        let date_of_birth = patient
            .date_of_birth
            .ok_or_else(|| validation("Patient date of birth is not set".into()))?;

        let prescription = Prescription {
            prescription_id: String::new(),
            patient_id: patient.id,
            patient_name: patient.name,
            patient_age: age_on(date_of_birth, now.date_naive()),
            patient_gender: patient.gender,
            doctor_id: doctor.id,
            doctor_name: doctor.name,
            doctor_specialization: doctor.specialization,
            appointment_id: request.appointment_id,
            diagnosis: request.diagnosis,
            symptoms: request.symptoms,
            medications: request.medications,
            tests_recommended: request.tests_recommended,
            instructions: request.instructions,
            follow_up_date: request.follow_up_date,
            status: PrescriptionStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let stored = db.insert_new_prescription(prescription)?;
        info!(
            prescription_id = %stored.prescription_id,
            doctor_id = %stored.doctor_id,
            patient_id = %stored.patient_id,
            "Prescription created"
        );
        Ok(stored)
    }

    /// The calling patient's prescriptions, newest first.
    pub fn prescriptions_for_patient(&self, access: &PatientAccess) -> RecordResult<Vec<Prescription>> {
        let db = self.db.lock()?;
        Ok(db.list_prescriptions_for_patient(access.patient_id())?)
    }

    /// Prescriptions written by the calling doctor, newest first.
    pub fn prescriptions_for_doctor(&self, access: &DoctorAccess) -> RecordResult<Vec<Prescription>> {
        let db = self.db.lock()?;
        Ok(db.list_prescriptions_for_doctor(access.doctor_id())?)
    }

    /// Every prescription with patient and doctor names attached, newest
    /// first.
    pub fn all_prescriptions(&self, _access: &AdminAccess) -> RecordResult<Vec<Resolved<Prescription>>> {
        let db = self.db.lock()?;
        let mut cache = SummaryCache::new(&db);

        let mut resolved = Vec::new();
        for prescription in db.list_prescriptions()? {
            resolved.push(Resolved {
                patient: cache.patient(&prescription.patient_id)?,
                doctor: cache.doctor(&prescription.doctor_id)?,
                appointment: None,
                record: prescription,
            });
        }
        Ok(resolved)
    }

    /// A single prescription with its patient, doctor and appointment.
    pub fn prescription(&self, prescription_id: &str) -> RecordResult<Resolved<Prescription>> {
        let db = self.db.lock()?;
        let prescription = db
            .get_prescription(prescription_id)?
            .ok_or_else(|| RecordError::NotFound("Prescription not found".into()))?;

        let patient = db.get_patient(&prescription.patient_id)?.map(PatientSummary::from);
        let doctor = db.get_doctor(&prescription.doctor_id)?.map(DoctorSummary::from);
        let appointment = db
            .get_appointment(&prescription.appointment_id)?
            .map(AppointmentSummary::from);

        Ok(Resolved {
            record: prescription,
            patient,
            doctor,
            appointment,
        })
    }

    /// Apply `patch` to a prescription written by the calling doctor.
    pub fn update_prescription(
        &self,
        access: &DoctorAccess,
        prescription_id: &str,
        patch: PrescriptionPatch,
    ) -> RecordResult<Prescription> {
        let db = self.db.lock()?;
        let mut prescription = db
            .get_prescription(prescription_id)?
            .ok_or_else(|| RecordError::NotFound("Prescription not found".into()))?;

        if prescription.doctor_id != access.doctor_id() {
            warn!(
                prescription_id,
                doctor_id = access.doctor_id(),
                "Rejected prescription update by another doctor"
            );
            return Err(RecordError::Authorization(
                "Not authorized to update this prescription".into(),
            ));
        }
        patch.validate().map_err(validation)?;

        patch.apply(&mut prescription, self.clock.now());
        if !db.update_prescription(&prescription)? {
            return Err(RecordError::NotFound("Prescription not found".into()));
        }

        info!(prescription_id, status = prescription.status.as_str(), "Prescription updated");
        Ok(prescription)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::auth::{Caller, Role};
    use crate::models::{Doctor, Patient};
    use chrono::Duration;

    fn doctor(f: &Fixture) -> DoctorAccess {
        Caller::new(f.doctor.id.clone(), Role::Doctor).require_doctor().unwrap()
    }

    #[test]
    fn test_create_reads_clock_under_insert_lock() {
        let (service, clock, _uploads) = lock_watched_service();
        let (patient, doctor, appointment) = seed(&service);
        let access = Caller::new(doctor.id, Role::Doctor).require_doctor().unwrap();

        service
            .create_prescription(&access, prescription_request_for(&patient, &appointment))
            .unwrap();

        assert_eq!(clock.reads(), vec![true]);
    }

    #[test]
    fn test_create_copies_directory_fields() {
        let f = fixture();
        let created = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();

        assert_eq!(created.prescription_id, "PRES-20240614-001");
        assert_eq!(created.patient_name, "Asha Verma");
        assert_eq!(created.patient_gender, "Female");
        assert_eq!(created.doctor_name, "Dr. Rao");
        assert_eq!(created.doctor_specialization, "General physician");
        assert_eq!(created.status, PrescriptionStatus::Active);
        assert_eq!(created.created_at, created.updated_at);
    }

    #[test]
    fn test_age_turns_over_on_birthday() {
        let f = fixture();
        let first = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();
        assert_eq!(first.patient_age, 23);

        f.clock.advance(Duration::days(1));
        let second = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();
        assert_eq!(second.patient_age, 24);
        assert_eq!(second.prescription_id, "PRES-20240615-001");
    }

    #[test]
    fn test_create_unknown_patient() {
        let f = fixture();
        let mut request = prescription_request(&f);
        request.patient_id = Some("ghost".into());
        assert!(matches!(
            f.service.create_prescription(&doctor(&f), request),
            Err(RecordError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_requires_date_of_birth() {
        let f = fixture();
        let patient = f
            .service
            .register_patient(Patient::new("No Dob".into(), "nodob@example.com".into()))
            .unwrap();
        let mut request = prescription_request(&f);
        request.patient_id = Some(patient.id);

        assert!(matches!(
            f.service.create_prescription(&doctor(&f), request),
            Err(RecordError::Validation(_))
        ));
    }

    #[test]
    fn test_update_by_other_doctor_is_rejected() {
        let f = fixture();
        let created = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();

        let other = f
            .service
            .register_doctor(Doctor::new("Dr. Iyer".into(), "iyer@example.com".into(), "ENT".into()))
            .unwrap();
        let other = Caller::new(other.id, Role::Doctor).require_doctor().unwrap();

        let patch = PrescriptionPatch {
            diagnosis: Some("Something else".into()),
            ..Default::default()
        };
        let result = f.service.update_prescription(&other, &created.prescription_id, patch);
        assert!(matches!(result, Err(RecordError::Authorization(_))));

        let stored = f.service.prescription(&created.prescription_id).unwrap().record;
        assert_eq!(stored, created);
    }

    #[test]
    fn test_update_by_author() {
        let f = fixture();
        let created = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();

        f.clock.advance(Duration::hours(2));
        let patch = PrescriptionPatch {
            status: Some(PrescriptionStatus::Completed),
            instructions: Some("Finish the full course".into()),
            ..Default::default()
        };
        let updated = f
            .service
            .update_prescription(&doctor(&f), &created.prescription_id, patch)
            .unwrap();

        assert_eq!(updated.status, PrescriptionStatus::Completed);
        assert_eq!(updated.instructions, "Finish the full course");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, created.created_at + Duration::hours(2));
        assert_eq!(updated.prescription_id, created.prescription_id);
    }

    #[test]
    fn test_update_missing() {
        let f = fixture();
        let result = f.service.update_prescription(
            &doctor(&f),
            "PRES-20240614-042",
            PrescriptionPatch::default(),
        );
        assert!(matches!(result, Err(RecordError::NotFound(_))));
    }

    #[test]
    fn test_get_by_id_resolves_references() {
        let f = fixture();
        let created = f
            .service
            .create_prescription(&doctor(&f), prescription_request(&f))
            .unwrap();

        let resolved = f.service.prescription(&created.prescription_id).unwrap();
        let patient = resolved.patient.unwrap();
        assert_eq!(patient.phone.as_deref(), Some("555-0101"));
        assert_eq!(resolved.doctor.unwrap().phone.as_deref(), Some("555-0199"));
        assert_eq!(resolved.appointment.unwrap().slot_time, "10:30 AM");
    }

    #[test]
    fn test_lists_are_scoped_and_resolved() {
        let f = fixture();
        for _ in 0..3 {
            f.service
                .create_prescription(&doctor(&f), prescription_request(&f))
                .unwrap();
            f.clock.advance(Duration::minutes(5));
        }

        let patient = Caller::new(f.patient.id.clone(), Role::Patient)
            .require_patient()
            .unwrap();
        let mine = f.service.prescriptions_for_patient(&patient).unwrap();
        let ids: Vec<_> = mine.iter().map(|p| p.prescription_id.as_str()).collect();
        assert_eq!(ids, vec!["PRES-20240614-003", "PRES-20240614-002", "PRES-20240614-001"]);

        assert_eq!(f.service.prescriptions_for_doctor(&doctor(&f)).unwrap().len(), 3);

        let admin = Caller::new("root", Role::Admin).require_admin().unwrap();
        let all = f.service.all_prescriptions(&admin).unwrap();
        assert_eq!(all.len(), 3);
        let patient = all[0].patient.as_ref().unwrap();
        assert_eq!(patient.name, "Asha Verma");
        assert_eq!(patient.phone, None);
        assert_eq!(all[0].doctor.as_ref().unwrap().specialization, "General physician");
    }
}
