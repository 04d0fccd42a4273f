//! Prescription database operations.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{next_record_id, parse_date, parse_ts, ts, Database, DbError, DbResult};
use crate::models::{Prescription, PrescriptionStatus, RecordVariant};

const PRESCRIPTION_COLUMNS: &str = r#"
    prescription_id, patient_id, patient_name, patient_age, patient_gender,
    doctor_id, doctor_name, doctor_specialization, appointment_id,
    diagnosis, symptoms, medications, tests_recommended, instructions,
    follow_up_date, status, created_at, updated_at
"#;

impl Database {
    /// Assign the next `PRES-…` ID and insert the prescription in one
    /// immediate transaction. The ID in `prescription` is ignored and
    /// replaced; the stored record is returned.
    pub fn insert_new_prescription(&mut self, mut prescription: Prescription) -> DbResult<Prescription> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id = next_record_id(&tx, RecordVariant::Prescription, prescription.created_at)?;
        prescription.prescription_id = id.to_string();
        insert_prescription_row(&tx, &prescription)?;

        tx.commit()?;
        Ok(prescription)
    }

    /// Write back the mutable fields of an existing prescription.
    pub fn update_prescription(&self, prescription: &Prescription) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE prescriptions SET
                diagnosis = ?2,
                symptoms = ?3,
                medications = ?4,
                tests_recommended = ?5,
                instructions = ?6,
                follow_up_date = ?7,
                status = ?8,
                updated_at = ?9
            WHERE prescription_id = ?1
            "#,
            params![
                prescription.prescription_id,
                prescription.diagnosis,
                serde_json::to_string(&prescription.symptoms)?,
                serde_json::to_string(&prescription.medications)?,
                serde_json::to_string(&prescription.tests_recommended)?,
                prescription.instructions,
                prescription.follow_up_date.map(|d| d.to_string()),
                prescription.status.as_str(),
                ts(&prescription.updated_at),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a prescription by its `PRES-…` ID.
    pub fn get_prescription(&self, prescription_id: &str) -> DbResult<Option<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE prescription_id = ?",
            PRESCRIPTION_COLUMNS
        );
        self.conn
            .query_row(&sql, [prescription_id], PrescriptionRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a patient's prescriptions, newest first.
    pub fn list_prescriptions_for_patient(&self, patient_id: &str) -> DbResult<Vec<Prescription>> {
        self.query_prescriptions("WHERE patient_id = ?1", params![patient_id])
    }

    /// List prescriptions written by a doctor, newest first.
    pub fn list_prescriptions_for_doctor(&self, doctor_id: &str) -> DbResult<Vec<Prescription>> {
        self.query_prescriptions("WHERE doctor_id = ?1", params![doctor_id])
    }

    /// List all prescriptions, newest first.
    pub fn list_prescriptions(&self) -> DbResult<Vec<Prescription>> {
        self.query_prescriptions("", params![])
    }

    fn query_prescriptions(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Vec<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions {} ORDER BY created_at DESC, rowid DESC",
            PRESCRIPTION_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, PrescriptionRow::from_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }
}

fn insert_prescription_row(conn: &Connection, prescription: &Prescription) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO prescriptions (
            prescription_id, patient_id, patient_name, patient_age, patient_gender,
            doctor_id, doctor_name, doctor_specialization, appointment_id,
            diagnosis, symptoms, medications, tests_recommended, instructions,
            follow_up_date, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
        params![
            prescription.prescription_id,
            prescription.patient_id,
            prescription.patient_name,
            prescription.patient_age,
            prescription.patient_gender,
            prescription.doctor_id,
            prescription.doctor_name,
            prescription.doctor_specialization,
            prescription.appointment_id,
            prescription.diagnosis,
            serde_json::to_string(&prescription.symptoms)?,
            serde_json::to_string(&prescription.medications)?,
            serde_json::to_string(&prescription.tests_recommended)?,
            prescription.instructions,
            prescription.follow_up_date.map(|d| d.to_string()),
            prescription.status.as_str(),
            ts(&prescription.created_at),
            ts(&prescription.updated_at),
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    prescription_id: String,
    patient_id: String,
    patient_name: String,
    patient_age: u32,
    patient_gender: String,
    doctor_id: String,
    doctor_name: String,
    doctor_specialization: String,
    appointment_id: String,
    diagnosis: String,
    symptoms: String,
    medications: String,
    tests_recommended: String,
    instructions: String,
    follow_up_date: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl PrescriptionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            prescription_id: row.get(0)?,
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            patient_age: row.get(3)?,
            patient_gender: row.get(4)?,
            doctor_id: row.get(5)?,
            doctor_name: row.get(6)?,
            doctor_specialization: row.get(7)?,
            appointment_id: row.get(8)?,
            diagnosis: row.get(9)?,
            symptoms: row.get(10)?,
            medications: row.get(11)?,
            tests_recommended: row.get(12)?,
            instructions: row.get(13)?,
            follow_up_date: row.get(14)?,
            status: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        let status = PrescriptionStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown prescription status: {}", row.status)))?;

        Ok(Prescription {
            prescription_id: row.prescription_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            patient_age: row.patient_age,
            patient_gender: row.patient_gender,
            doctor_id: row.doctor_id,
            doctor_name: row.doctor_name,
            doctor_specialization: row.doctor_specialization,
            appointment_id: row.appointment_id,
            diagnosis: row.diagnosis,
            symptoms: serde_json::from_str(&row.symptoms)?,
            medications: serde_json::from_str(&row.medications)?,
            tests_recommended: serde_json::from_str(&row.tests_recommended)?,
            instructions: row.instructions,
            follow_up_date: row.follow_up_date.as_deref().map(parse_date).transpose()?,
            status,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doctor, MealTiming, Medication, Patient};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    struct Fixture {
        db: Database,
        patient: Patient,
        doctor: Doctor,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Asha".into(), "asha@example.com".into());
        let doctor = Doctor::new("Dr. Rao".into(), "rao@example.com".into(), "General".into());
        db.insert_patient(&patient).unwrap();
        db.insert_doctor(&doctor).unwrap();
        Fixture { db, patient, doctor }
    }

    fn make_prescription(f: &Fixture, at: DateTime<Utc>) -> Prescription {
        Prescription {
            prescription_id: String::new(),
            patient_id: f.patient.id.clone(),
            patient_name: f.patient.name.clone(),
            patient_age: 24,
            patient_gender: "Female".into(),
            doctor_id: f.doctor.id.clone(),
            doctor_name: f.doctor.name.clone(),
            doctor_specialization: f.doctor.specialization.clone(),
            appointment_id: "appt-1".into(),
            diagnosis: "Strep throat".into(),
            symptoms: vec!["fever".into()],
            medications: vec![Medication {
                name: "Amoxicillin".into(),
                dosage: "500mg".into(),
                frequency: "3x daily".into(),
                duration: "7 days".into(),
                instructions: String::new(),
                before_after_meal: MealTiming::AfterMeal,
            }],
            tests_recommended: vec![],
            instructions: String::new(),
            follow_up_date: None,
            status: PrescriptionStatus::Active,
            created_at: at,
            updated_at: at,
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, h, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut f = setup();

        let first = make_prescription(&f, at(9));
        let first = f.db.insert_new_prescription(first).unwrap();
        let second = make_prescription(&f, at(10));
        let second = f.db.insert_new_prescription(second).unwrap();

        assert_eq!(first.prescription_id, "PRES-20240614-001");
        assert_eq!(second.prescription_id, "PRES-20240614-002");
        assert_eq!(
            f.db.count_records_on_day(RecordVariant::Prescription, at(9)).unwrap(),
            2
        );
    }

    #[test]
    fn test_insert_and_get() {
        let mut f = setup();
        let stored = f.db.insert_new_prescription(make_prescription(&f, at(9))).unwrap();

        let retrieved = f.db.get_prescription(&stored.prescription_id).unwrap().unwrap();
        assert_eq!(retrieved, stored);
        assert_eq!(retrieved.medications[0].name, "Amoxicillin");
    }

    #[test]
    fn test_failed_insert_does_not_consume_sequence() {
        let mut f = setup();

        let mut orphan = make_prescription(&f, at(9));
        orphan.patient_id = "ghost".into();
        assert!(f.db.insert_new_prescription(orphan).is_err());

        let stored = f.db.insert_new_prescription(make_prescription(&f, at(10))).unwrap();
        assert_eq!(stored.prescription_id, "PRES-20240614-001");
    }

    #[test]
    fn test_update() {
        let mut f = setup();
        let mut stored = f.db.insert_new_prescription(make_prescription(&f, at(9))).unwrap();

        stored.status = PrescriptionStatus::Completed;
        stored.updated_at = at(12);
        assert!(f.db.update_prescription(&stored).unwrap());

        let retrieved = f.db.get_prescription(&stored.prescription_id).unwrap().unwrap();
        assert_eq!(retrieved.status, PrescriptionStatus::Completed);
        assert_eq!(retrieved.updated_at, at(12));
        assert_eq!(retrieved.created_at, at(9));
    }

    #[test]
    fn test_lists_newest_first() {
        let mut f = setup();
        let other = Doctor::new("Dr. Iyer".into(), "iyer@example.com".into(), "ENT".into());
        f.db.insert_doctor(&other).unwrap();

        for h in [9, 11, 10] {
            let p = make_prescription(&f, at(h));
            f.db.insert_new_prescription(p).unwrap();
        }
        let mut by_other = make_prescription(&f, at(8) + Duration::days(1));
        by_other.doctor_id = other.id.clone();
        f.db.insert_new_prescription(by_other).unwrap();

        let all = f.db.list_prescriptions().unwrap();
        let times: Vec<_> = all.iter().map(|p| p.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, sorted);
        assert_eq!(all.len(), 4);

        assert_eq!(f.db.list_prescriptions_for_doctor(&f.doctor.id).unwrap().len(), 3);
        assert_eq!(f.db.list_prescriptions_for_doctor(&other.id).unwrap().len(), 1);
        assert_eq!(f.db.list_prescriptions_for_patient(&f.patient.id).unwrap().len(), 4);
        assert!(f.db.list_prescriptions_for_patient("nobody").unwrap().is_empty());
    }
}
