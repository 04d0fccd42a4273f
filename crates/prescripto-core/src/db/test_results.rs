//! Test result database operations.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{
    from_label, label, next_record_id, parse_date, parse_ts, ts, Database, DbError, DbResult,
};
use crate::models::{RecordVariant, TestResult, TestResultStatus};

const TEST_RESULT_COLUMNS: &str = r#"
    test_result_id, patient_id, patient_name, test_name, test_type, test_date,
    result_date, results, doctor_id, doctor_name, laboratory_name,
    laboratory_address, report_file, images, analysis, comments,
    recommendations, status, priority, created_at, updated_at
"#;

impl Database {
    /// Assign the next `TEST-…` ID and insert the result in one immediate
    /// transaction.
    pub fn insert_new_test_result(&mut self, mut result: TestResult) -> DbResult<TestResult> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id = next_record_id(&tx, RecordVariant::TestResult, result.created_at)?;
        result.test_result_id = id.to_string();
        insert_test_result_row(&tx, &result)?;

        tx.commit()?;
        Ok(result)
    }

    /// Write back the mutable fields of an existing test result.
    pub fn update_test_result(&self, result: &TestResult) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE test_results SET
                test_name = ?2,
                test_type = ?3,
                test_date = ?4,
                results = ?5,
                laboratory_name = ?6,
                laboratory_address = ?7,
                report_file = ?8,
                images = ?9,
                analysis = ?10,
                comments = ?11,
                recommendations = ?12,
                status = ?13,
                priority = ?14,
                updated_at = ?15
            WHERE test_result_id = ?1
            "#,
            params![
                result.test_result_id,
                result.test_name,
                label(&result.test_type)?,
                result.test_date.to_string(),
                serde_json::to_string(&result.results)?,
                result.laboratory_name,
                result.laboratory_address,
                result.report_file,
                serde_json::to_string(&result.images)?,
                result.analysis,
                result.comments,
                result.recommendations,
                result.status.as_str(),
                label(&result.priority)?,
                ts(&result.updated_at),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a test result by its `TEST-…` ID.
    pub fn get_test_result(&self, test_result_id: &str) -> DbResult<Option<TestResult>> {
        let sql = format!(
            "SELECT {} FROM test_results WHERE test_result_id = ?",
            TEST_RESULT_COLUMNS
        );
        self.conn
            .query_row(&sql, [test_result_id], TestResultRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a patient's test results, newest first.
    pub fn list_test_results_for_patient(&self, patient_id: &str) -> DbResult<Vec<TestResult>> {
        self.query_test_results("WHERE patient_id = ?1", params![patient_id])
    }

    /// List test results ordered by a doctor, newest first.
    pub fn list_test_results_for_doctor(&self, doctor_id: &str) -> DbResult<Vec<TestResult>> {
        self.query_test_results("WHERE doctor_id = ?1", params![doctor_id])
    }

    /// List all test results, newest first.
    pub fn list_test_results(&self) -> DbResult<Vec<TestResult>> {
        self.query_test_results("", params![])
    }

    fn query_test_results(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> DbResult<Vec<TestResult>> {
        let sql = format!(
            "SELECT {} FROM test_results {} ORDER BY created_at DESC, rowid DESC",
            TEST_RESULT_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, TestResultRow::from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.try_into()?);
        }
        Ok(results)
    }
}

fn insert_test_result_row(conn: &Connection, result: &TestResult) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO test_results (
            test_result_id, patient_id, patient_name, test_name, test_type, test_date,
            result_date, results, doctor_id, doctor_name, laboratory_name,
            laboratory_address, report_file, images, analysis, comments,
            recommendations, status, priority, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                  ?17, ?18, ?19, ?20, ?21)
        "#,
        params![
            result.test_result_id,
            result.patient_id,
            result.patient_name,
            result.test_name,
            label(&result.test_type)?,
            result.test_date.to_string(),
            ts(&result.result_date),
            serde_json::to_string(&result.results)?,
            result.doctor_id,
            result.doctor_name,
            result.laboratory_name,
            result.laboratory_address,
            result.report_file,
            serde_json::to_string(&result.images)?,
            result.analysis,
            result.comments,
            result.recommendations,
            result.status.as_str(),
            label(&result.priority)?,
            ts(&result.created_at),
            ts(&result.updated_at),
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct TestResultRow {
    test_result_id: String,
    patient_id: String,
    patient_name: String,
    test_name: String,
    test_type: String,
    test_date: String,
    result_date: String,
    results: String,
    doctor_id: Option<String>,
    doctor_name: Option<String>,
    laboratory_name: String,
    laboratory_address: String,
    report_file: Option<String>,
    images: String,
    analysis: String,
    comments: String,
    recommendations: String,
    status: String,
    priority: String,
    created_at: String,
    updated_at: String,
}

impl TestResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            test_result_id: row.get(0)?,
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            test_name: row.get(3)?,
            test_type: row.get(4)?,
            test_date: row.get(5)?,
            result_date: row.get(6)?,
            results: row.get(7)?,
            doctor_id: row.get(8)?,
            doctor_name: row.get(9)?,
            laboratory_name: row.get(10)?,
            laboratory_address: row.get(11)?,
            report_file: row.get(12)?,
            images: row.get(13)?,
            analysis: row.get(14)?,
            comments: row.get(15)?,
            recommendations: row.get(16)?,
            status: row.get(17)?,
            priority: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }
}

impl TryFrom<TestResultRow> for TestResult {
    type Error = DbError;

    fn try_from(row: TestResultRow) -> Result<Self, Self::Error> {
        let status = TestResultStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown test result status: {}", row.status)))?;

        Ok(TestResult {
            test_result_id: row.test_result_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            test_name: row.test_name,
            test_type: from_label(&row.test_type)?,
            test_date: parse_date(&row.test_date)?,
            result_date: parse_ts(&row.result_date)?,
            results: serde_json::from_str(&row.results)?,
            doctor_id: row.doctor_id,
            doctor_name: row.doctor_name,
            laboratory_name: row.laboratory_name,
            laboratory_address: row.laboratory_address,
            report_file: row.report_file,
            images: serde_json::from_str(&row.images)?,
            analysis: row.analysis,
            comments: row.comments,
            recommendations: row.recommendations,
            status,
            priority: from_label(&row.priority)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParameterFlag, Patient, TestParameter, TestType, Urgency};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn setup() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Asha".into(), "asha@example.com".into());
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, h, 0, 0).unwrap()
    }

    fn make_result(patient: &Patient, created_at: DateTime<Utc>) -> TestResult {
        TestResult {
            test_result_id: String::new(),
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            test_name: "Complete Blood Count".into(),
            test_type: TestType::BloodTest,
            test_date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            result_date: created_at,
            results: vec![TestParameter {
                parameter: "Hemoglobin".into(),
                value: "11.2".into(),
                unit: "g/dL".into(),
                normal_range: "12-16".into(),
                status: ParameterFlag::Low,
                remarks: String::new(),
            }],
            doctor_id: None,
            doctor_name: None,
            laboratory_name: "City Lab".into(),
            laboratory_address: String::new(),
            report_file: None,
            images: vec![],
            analysis: String::new(),
            comments: String::new(),
            recommendations: String::new(),
            status: TestResultStatus::Pending,
            priority: Urgency::Urgent,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_insert_and_get_without_doctor() {
        let (mut db, patient) = setup();
        let stored = db.insert_new_test_result(make_result(&patient, at(9))).unwrap();
        assert_eq!(stored.test_result_id, "TEST-20240614-001");

        let retrieved = db.get_test_result(&stored.test_result_id).unwrap().unwrap();
        assert_eq!(retrieved, stored);
        assert_eq!(retrieved.priority, Urgency::Urgent);
        assert_eq!(retrieved.results[0].status, ParameterFlag::Low);
        assert!(retrieved.doctor_id.is_none());
    }

    #[test]
    fn test_update_attachments_and_status() {
        let (mut db, patient) = setup();
        let mut stored = db.insert_new_test_result(make_result(&patient, at(9))).unwrap();

        stored.report_file = Some("https://files.example/test-reports/abc.pdf".into());
        stored.images = vec!["https://files.example/test-images/def.png".into()];
        stored.status = TestResultStatus::Completed;
        stored.updated_at = at(11);
        assert!(db.update_test_result(&stored).unwrap());

        let retrieved = db.get_test_result(&stored.test_result_id).unwrap().unwrap();
        assert_eq!(retrieved, stored);
    }

    #[test]
    fn test_update_missing_returns_false() {
        let (db, patient) = setup();
        let mut ghost = make_result(&patient, at(9));
        ghost.test_result_id = "TEST-20240614-099".into();
        assert!(!db.update_test_result(&ghost).unwrap());
    }

    #[test]
    fn test_prescription_and_test_sequences_are_independent() {
        let (mut db, patient) = setup();
        db.insert_new_test_result(make_result(&patient, at(9))).unwrap();
        let second = db.insert_new_test_result(make_result(&patient, at(10))).unwrap();
        assert_eq!(second.test_result_id, "TEST-20240614-002");
        assert_eq!(db.last_sequence(RecordVariant::Prescription, at(10)).unwrap(), None);
    }

    #[test]
    fn test_list_for_patient_newest_first() {
        let (mut db, patient) = setup();
        for h in [10, 8, 12] {
            db.insert_new_test_result(make_result(&patient, at(h))).unwrap();
        }

        let listed = db.list_test_results_for_patient(&patient.id).unwrap();
        let hours: Vec<_> = listed.iter().map(|r| r.created_at).collect();
        assert_eq!(hours, vec![at(12), at(10), at(8)]);
        assert!(db.list_test_results_for_doctor("anyone").unwrap().is_empty());
        assert_eq!(db.list_test_results().unwrap().len(), 3);
    }
}
