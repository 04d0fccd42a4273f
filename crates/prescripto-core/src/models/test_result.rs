//! Lab test result models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::prescription::{non_blank, Urgency};

/// Test result lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TestResultStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TestResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResultStatus::Pending => "Pending",
            TestResultStatus::Completed => "Completed",
            TestResultStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TestResultStatus::Pending),
            "Completed" => Some(TestResultStatus::Completed),
            "Cancelled" => Some(TestResultStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestType {
    #[serde(rename = "Blood Test")]
    BloodTest,
    #[serde(rename = "Urine Test")]
    UrineTest,
    #[serde(rename = "X-Ray")]
    XRay,
    #[serde(rename = "MRI")]
    Mri,
    #[serde(rename = "CT Scan")]
    CtScan,
    #[serde(rename = "ECG")]
    Ecg,
    Ultrasound,
    Other,
}

/// Flag on a single measured parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ParameterFlag {
    #[default]
    Normal,
    High,
    Low,
    Critical,
}

/// One measured value in a test result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestParameter {
    pub parameter: String,
    pub value: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub normal_range: String,
    #[serde(default)]
    pub status: ParameterFlag,
    #[serde(default)]
    pub remarks: String,
}

impl TestParameter {
    fn is_complete(&self) -> bool {
        !self.parameter.trim().is_empty() && !self.value.trim().is_empty()
    }
}

/// A lab test result, optionally with an uploaded report and images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// `TEST-YYYYMMDD-NNN`, assigned at creation
    pub test_result_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub test_name: String,
    pub test_type: TestType,
    pub test_date: NaiveDate,
    pub result_date: DateTime<Utc>,
    pub results: Vec<TestParameter>,
    /// Absent for results entered by a lab without a referring doctor
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub laboratory_name: String,
    pub laboratory_address: String,
    /// URL of the uploaded report file
    pub report_file: Option<String>,
    /// URLs of uploaded images
    pub images: Vec<String>,
    pub analysis: String,
    pub comments: String,
    pub recommendations: String,
    pub status: TestResultStatus,
    pub priority: Urgency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming test result, as submitted by a doctor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTestResult {
    pub patient_id: Option<String>,
    pub test_name: Option<String>,
    pub test_type: Option<TestType>,
    pub test_date: Option<NaiveDate>,
    pub results: Option<Vec<TestParameter>>,
    pub laboratory_name: Option<String>,
    pub laboratory_address: Option<String>,
    pub analysis: Option<String>,
    pub comments: Option<String>,
    pub recommendations: Option<String>,
    pub priority: Option<Urgency>,
}

/// Required fields of a [`NewTestResult`] after validation.
#[derive(Debug, Clone)]
pub struct ValidTestResult {
    pub patient_id: String,
    pub test_name: String,
    pub test_type: TestType,
    pub test_date: NaiveDate,
    pub results: Vec<TestParameter>,
    pub laboratory_name: String,
    pub laboratory_address: String,
    pub analysis: String,
    pub comments: String,
    pub recommendations: String,
    pub priority: Urgency,
}

impl NewTestResult {
    pub fn validate(self) -> Result<ValidTestResult, String> {
        let patient_id = non_blank(self.patient_id);
        let test_name = non_blank(self.test_name);
        let results = self.results.filter(|r| !r.is_empty());

        let (Some(patient_id), Some(test_name), Some(test_type), Some(test_date), Some(results)) =
            (patient_id, test_name, self.test_type, self.test_date, results)
        else {
            return Err("Missing required fields".into());
        };

        if !results.iter().all(TestParameter::is_complete) {
            return Err("Each result needs a parameter and a value".into());
        }

        Ok(ValidTestResult {
            patient_id,
            test_name,
            test_type,
            test_date,
            results,
            laboratory_name: self.laboratory_name.unwrap_or_default(),
            laboratory_address: self.laboratory_address.unwrap_or_default(),
            analysis: self.analysis.unwrap_or_default(),
            comments: self.comments.unwrap_or_default(),
            recommendations: self.recommendations.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
        })
    }
}

/// Fields the authoring doctor may change after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestResultPatch {
    pub test_name: Option<String>,
    pub test_type: Option<TestType>,
    pub test_date: Option<NaiveDate>,
    pub results: Option<Vec<TestParameter>>,
    pub laboratory_name: Option<String>,
    pub laboratory_address: Option<String>,
    pub analysis: Option<String>,
    pub comments: Option<String>,
    pub recommendations: Option<String>,
    pub priority: Option<Urgency>,
    pub status: Option<TestResultStatus>,
}

impl TestResultPatch {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.test_name, Some(n) if n.trim().is_empty()) {
            return Err("Test name cannot be empty".into());
        }
        if let Some(results) = &self.results {
            if results.is_empty() || !results.iter().all(TestParameter::is_complete) {
                return Err("Each result needs a parameter and a value".into());
            }
        }
        Ok(())
    }

    /// Apply present fields to `result` and stamp `updated_at`.
    pub fn apply(self, result: &mut TestResult, now: DateTime<Utc>) {
        if let Some(v) = self.test_name {
            result.test_name = v;
        }
        if let Some(v) = self.test_type {
            result.test_type = v;
        }
        if let Some(v) = self.test_date {
            result.test_date = v;
        }
        if let Some(v) = self.results {
            result.results = v;
        }
        if let Some(v) = self.laboratory_name {
            result.laboratory_name = v;
        }
        if let Some(v) = self.laboratory_address {
            result.laboratory_address = v;
        }
        if let Some(v) = self.analysis {
            result.analysis = v;
        }
        if let Some(v) = self.comments {
            result.comments = v;
        }
        if let Some(v) = self.recommendations {
            result.recommendations = v;
        }
        if let Some(v) = self.priority {
            result.priority = v;
        }
        if let Some(v) = self.status {
            result.status = v;
        }
        result.updated_at = now;
    }
}
