//! Patient, doctor and appointment lookups.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date, parse_ts, ts, Database, DbError, DbResult};
use crate::models::{Appointment, Doctor, Patient};

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, name, email, phone, gender, date_of_birth, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                patient.id,
                patient.name,
                patient.email,
                patient.phone,
                patient.gender,
                patient.date_of_birth.map(|d| d.to_string()),
                ts(&patient.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id, name, email, phone, gender, date_of_birth, created_at
                FROM patients
                WHERE patient_id = ?
                "#,
                [patient_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Insert a new doctor.
    pub fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (
                doctor_id, name, email, phone, specialization, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doctor.id,
                doctor.name,
                doctor.email,
                doctor.phone,
                doctor.specialization,
                ts(&doctor.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, doctor_id: &str) -> DbResult<Option<Doctor>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT doctor_id, name, email, phone, specialization, created_at
                FROM doctors
                WHERE doctor_id = ?
                "#,
                [doctor_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, email, phone, specialization, created_at)| {
            Ok(Doctor {
                id,
                name,
                email,
                phone,
                specialization,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }

    /// Insert a booked appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO appointments (
                    appointment_id, patient_id, doctor_id, slot_date, slot_time, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    appointment.id,
                    appointment.patient_id,
                    appointment.doctor_id,
                    appointment.slot_date,
                    appointment.slot_time,
                    ts(&appointment.created_at),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DbError::Constraint(format!(
                        "appointment {} references an unknown patient or doctor",
                        appointment.id
                    ))
                }
                other => other.into(),
            })?;
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT appointment_id, patient_id, doctor_id, slot_date, slot_time, created_at
                FROM appointments
                WHERE appointment_id = ?
                "#,
                [appointment_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, patient_id, doctor_id, slot_date, slot_time, created_at)| {
            Ok(Appointment {
                id,
                patient_id,
                doctor_id,
                slot_date,
                slot_time,
                created_at: parse_ts(&created_at)?,
            })
        })
        .transpose()
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    patient_id: String,
    name: String,
    email: String,
    phone: Option<String>,
    gender: String,
    date_of_birth: Option<String>,
    created_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            gender: row.get(4)?,
            date_of_birth: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.patient_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            gender: row.gender,
            date_of_birth: row.date_of_birth.as_deref().map(parse_date).transpose()?,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get_patient() {
        let db = setup_db();

        let mut patient = Patient::new("Asha".into(), "asha@example.com".into());
        patient.gender = "Female".into();
        patient.date_of_birth = NaiveDate::from_ymd_opt(2000, 6, 15);
        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Asha");
        assert_eq!(retrieved.gender, "Female");
        assert_eq!(retrieved.date_of_birth, NaiveDate::from_ymd_opt(2000, 6, 15));
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_patient("nobody").unwrap().is_none());
        assert!(db.get_doctor("nobody").unwrap().is_none());
        assert!(db.get_appointment("nothing").unwrap().is_none());
    }

    #[test]
    fn test_appointment_requires_known_parties() {
        let db = setup_db();

        let patient = Patient::new("Asha".into(), "asha@example.com".into());
        let doctor = Doctor::new("Dr. Rao".into(), "rao@example.com".into(), "General".into());
        db.insert_patient(&patient).unwrap();
        db.insert_doctor(&doctor).unwrap();

        let appointment = Appointment::new(
            patient.id.clone(),
            doctor.id.clone(),
            "14_6_2024".into(),
            "10:30 AM".into(),
        );
        db.insert_appointment(&appointment).unwrap();
        let retrieved = db.get_appointment(&appointment.id).unwrap().unwrap();
        assert_eq!(retrieved.slot_time, "10:30 AM");

        let orphan = Appointment::new("ghost".into(), doctor.id, "1_1_2024".into(), "9:00 AM".into());
        assert!(matches!(
            db.insert_appointment(&orphan),
            Err(DbError::Constraint(_))
        ));
    }
}
