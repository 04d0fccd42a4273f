//! Directory models: patients, doctors and their appointments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Free text, "Not Selected" until the patient fills in their profile
    pub gender: String,
    /// Needed to compute the age printed on a prescription
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            phone: None,
            gender: "Not Selected".into(),
            date_of_birth: None,
            created_at: Utc::now(),
        }
    }
}

/// A registered doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn new(name: String, email: String, specialization: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            phone: None,
            specialization,
            created_at: Utc::now(),
        }
    }
}

/// A booked appointment slot. Prescriptions are written against one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// Slot date as entered at booking, e.g. "14_6_2024"
    pub slot_date: String,
    /// Slot time as entered at booking, e.g. "10:30 AM"
    pub slot_time: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(patient_id: String, doctor_id: String, slot_date: String, slot_time: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            doctor_id,
            slot_date,
            slot_time,
            created_at: Utc::now(),
        }
    }
}

/// Patient fields attached to a record when references are resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl PatientSummary {
    /// Name and email only, as shown in admin listings.
    pub fn brief(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.name.clone(),
            email: patient.email.clone(),
            phone: None,
        }
    }
}

impl From<Patient> for PatientSummary {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            email: patient.email,
            phone: patient.phone,
        }
    }
}

/// Doctor fields attached to a record when references are resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
    pub specialization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl DoctorSummary {
    pub fn brief(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id.clone(),
            name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
            phone: None,
        }
    }
}

impl From<Doctor> for DoctorSummary {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            specialization: doctor.specialization,
            phone: doctor.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSummary {
    pub id: String,
    pub slot_date: String,
    pub slot_time: String,
}

impl From<Appointment> for AppointmentSummary {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            slot_date: appointment.slot_date,
            slot_time: appointment.slot_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Asha".into(), "asha@example.com".into());
        assert_eq!(patient.name, "Asha");
        assert_eq!(patient.gender, "Not Selected");
        assert!(patient.date_of_birth.is_none());
        assert_eq!(patient.id.len(), 36); // UUID format
    }

    #[test]
    fn test_brief_summary_drops_phone() {
        let mut doctor = Doctor::new("Dr. Rao".into(), "rao@example.com".into(), "Cardiology".into());
        doctor.phone = Some("555-0100".into());

        assert_eq!(DoctorSummary::brief(&doctor).phone, None);
        assert_eq!(DoctorSummary::from(doctor).phone, Some("555-0100".into()));
    }
}
