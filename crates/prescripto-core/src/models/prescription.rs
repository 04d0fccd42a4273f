//! Prescription models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Prescription lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PrescriptionStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "Active",
            PrescriptionStatus::Completed => "Completed",
            PrescriptionStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(PrescriptionStatus::Active),
            "Completed" => Some(PrescriptionStatus::Completed),
            "Cancelled" => Some(PrescriptionStatus::Cancelled),
            _ => None,
        }
    }
}

/// When to take a medication relative to meals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MealTiming {
    #[serde(rename = "Before Meal")]
    BeforeMeal,
    #[default]
    #[serde(rename = "After Meal")]
    AfterMeal,
    #[serde(rename = "Empty Stomach")]
    EmptyStomach,
    #[serde(rename = "As Needed")]
    AsNeeded,
}

/// How soon a recommended test (or a test result) needs attention.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Urgency {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub before_after_meal: MealTiming,
}

impl Medication {
    fn is_complete(&self) -> bool {
        [&self.name, &self.dosage, &self.frequency, &self.duration]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedTest {
    pub test_name: String,
    #[serde(default)]
    pub test_description: String,
    #[serde(default)]
    pub urgency: Urgency,
}

/// A prescription written by a doctor during an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// `PRES-YYYYMMDD-NNN`, assigned at creation
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    /// Age in whole years on the day the prescription was written
    pub patient_age: u32,
    pub patient_gender: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_specialization: String,
    pub appointment_id: String,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub medications: Vec<Medication>,
    pub tests_recommended: Vec<RecommendedTest>,
    pub instructions: String,
    pub follow_up_date: Option<NaiveDate>,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming prescription, as submitted by a doctor. Everything is optional
/// here so that missing fields surface as a validation error rather than a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPrescription {
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub diagnosis: Option<String>,
    pub symptoms: Vec<String>,
    pub medications: Option<Vec<Medication>>,
    pub tests_recommended: Vec<RecommendedTest>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

/// Required fields of a [`NewPrescription`] after validation.
#[derive(Debug, Clone)]
pub struct ValidPrescription {
    pub patient_id: String,
    pub appointment_id: String,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub medications: Vec<Medication>,
    pub tests_recommended: Vec<RecommendedTest>,
    pub instructions: String,
    pub follow_up_date: Option<NaiveDate>,
}

impl NewPrescription {
    /// Check required fields. Returns the reason on failure.
    pub fn validate(self) -> Result<ValidPrescription, String> {
        let patient_id = non_blank(self.patient_id);
        let appointment_id = non_blank(self.appointment_id);
        let diagnosis = non_blank(self.diagnosis);
        let medications = self.medications.filter(|m| !m.is_empty());

        let (Some(patient_id), Some(appointment_id), Some(diagnosis), Some(medications)) =
            (patient_id, appointment_id, diagnosis, medications)
        else {
            return Err("Missing required fields".into());
        };

        if !medications.iter().all(Medication::is_complete) {
            return Err("Each medication needs a name, dosage, frequency and duration".into());
        }
        if self.tests_recommended.iter().any(|t| t.test_name.trim().is_empty()) {
            return Err("Each recommended test needs a name".into());
        }

        Ok(ValidPrescription {
            patient_id,
            appointment_id,
            diagnosis,
            symptoms: self.symptoms,
            medications,
            tests_recommended: self.tests_recommended,
            instructions: self.instructions.unwrap_or_default(),
            follow_up_date: self.follow_up_date,
        })
    }
}

/// Fields the authoring doctor may change after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrescriptionPatch {
    pub diagnosis: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub medications: Option<Vec<Medication>>,
    pub tests_recommended: Option<Vec<RecommendedTest>>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub status: Option<PrescriptionStatus>,
}

impl PrescriptionPatch {
    /// Reject patches that would break a creation-time requirement.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.diagnosis, Some(d) if d.trim().is_empty()) {
            return Err("Diagnosis cannot be empty".into());
        }
        if let Some(medications) = &self.medications {
            if medications.is_empty() {
                return Err("A prescription needs at least one medication".into());
            }
            if !medications.iter().all(Medication::is_complete) {
                return Err("Each medication needs a name, dosage, frequency and duration".into());
            }
        }
        Ok(())
    }

    /// Apply present fields to `prescription` and stamp `updated_at`.
    pub fn apply(self, prescription: &mut Prescription, now: DateTime<Utc>) {
        if let Some(diagnosis) = self.diagnosis {
            prescription.diagnosis = diagnosis;
        }
        if let Some(symptoms) = self.symptoms {
            prescription.symptoms = symptoms;
        }
        if let Some(medications) = self.medications {
            prescription.medications = medications;
        }
        if let Some(tests) = self.tests_recommended {
            prescription.tests_recommended = tests;
        }
        if let Some(instructions) = self.instructions {
            prescription.instructions = instructions;
        }
        if self.follow_up_date.is_some() {
            prescription.follow_up_date = self.follow_up_date;
        }
        if let Some(status) = self.status {
            prescription.status = status;
        }
        prescription.updated_at = now;
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
