//! SQLite schema definition.
//!
//! Timestamps are RFC 3339 UTC strings with millisecond precision
//! (`2024-06-14T09:30:00.000Z`), so text order is chronological order.

/// Complete database schema for prescripto.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Directory
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    gender TEXT NOT NULL DEFAULT 'Not Selected',
    date_of_birth TEXT,                          -- YYYY-MM-DD, NULL until profile completed
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    specialization TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id),
    slot_date TEXT NOT NULL,
    slot_time TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    prescription_id TEXT PRIMARY KEY,            -- PRES-YYYYMMDD-NNN
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    patient_name TEXT NOT NULL,
    patient_age INTEGER NOT NULL,
    patient_gender TEXT NOT NULL,
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id),
    doctor_name TEXT NOT NULL,
    doctor_specialization TEXT NOT NULL,
    appointment_id TEXT NOT NULL,
    diagnosis TEXT NOT NULL,
    symptoms TEXT NOT NULL DEFAULT '[]',         -- JSON array of strings
    medications TEXT NOT NULL DEFAULT '[]',      -- JSON array of Medication
    tests_recommended TEXT NOT NULL DEFAULT '[]',-- JSON array of RecommendedTest
    instructions TEXT NOT NULL DEFAULT '',
    follow_up_date TEXT,
    status TEXT NOT NULL DEFAULT 'Active'
        CHECK (status IN ('Active', 'Completed', 'Cancelled')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_prescriptions_doctor ON prescriptions(doctor_id, created_at);
CREATE INDEX IF NOT EXISTS idx_prescriptions_created ON prescriptions(created_at);

-- ============================================================================
-- Test Results
-- ============================================================================

CREATE TABLE IF NOT EXISTS test_results (
    test_result_id TEXT PRIMARY KEY,             -- TEST-YYYYMMDD-NNN
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    patient_name TEXT NOT NULL,
    test_name TEXT NOT NULL,
    test_type TEXT NOT NULL,                     -- e.g. 'Blood Test', 'X-Ray'
    test_date TEXT NOT NULL,
    result_date TEXT NOT NULL,
    results TEXT NOT NULL DEFAULT '[]',          -- JSON array of TestParameter
    doctor_id TEXT REFERENCES doctors(doctor_id),
    doctor_name TEXT,
    laboratory_name TEXT NOT NULL DEFAULT '',
    laboratory_address TEXT NOT NULL DEFAULT '',
    report_file TEXT,
    images TEXT NOT NULL DEFAULT '[]',           -- JSON array of URLs
    analysis TEXT NOT NULL DEFAULT '',
    comments TEXT NOT NULL DEFAULT '',
    recommendations TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'Pending'
        CHECK (status IN ('Pending', 'Completed', 'Cancelled')),
    priority TEXT NOT NULL DEFAULT 'Routine'
        CHECK (priority IN ('Routine', 'Urgent', 'Emergency')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_results_patient ON test_results(patient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_test_results_doctor ON test_results(doctor_id, created_at);
CREATE INDEX IF NOT EXISTS idx_test_results_created ON test_results(created_at);

-- ============================================================================
-- Daily Record Sequences
-- ============================================================================

-- One row per (variant, UTC day); last_seq is the sequence of the most
-- recently issued ID. Bumped in the same transaction as the record insert.
CREATE TABLE IF NOT EXISTS record_sequences (
    variant TEXT NOT NULL CHECK (variant IN ('PRES', 'TEST')),
    day TEXT NOT NULL,                           -- YYYYMMDD
    last_seq INTEGER NOT NULL CHECK (last_seq > 0),
    PRIMARY KEY (variant, day)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_status_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO patients (patient_id, name, email, created_at)
            VALUES ('p1', 'Asha', 'asha@example.com', '2024-06-14T09:00:00.000Z');
            INSERT INTO doctors (doctor_id, name, email, specialization, created_at)
            VALUES ('d1', 'Dr. Rao', 'rao@example.com', 'General', '2024-06-14T09:00:00.000Z');
            "#,
        )
        .unwrap();

        let insert = |id: &str, status: &str| {
            conn.execute(
                r#"
                INSERT INTO prescriptions (
                    prescription_id, patient_id, patient_name, patient_age, patient_gender,
                    doctor_id, doctor_name, doctor_specialization, appointment_id,
                    diagnosis, status, created_at, updated_at
                ) VALUES (?1, 'p1', 'Asha', 30, 'Female', 'd1', 'Dr. Rao', 'General', 'a1',
                          'Flu', ?2, '2024-06-14T09:00:00.000Z', '2024-06-14T09:00:00.000Z')
                "#,
                [id, status],
            )
        };

        assert!(insert("PRES-20240614-001", "Paused").is_err());
        assert!(insert("PRES-20240614-001", "Active").is_ok());
    }

    #[test]
    fn test_sequence_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO record_sequences (variant, day, last_seq) VALUES ('RX', '20240614', 1)",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO record_sequences (variant, day, last_seq) VALUES ('PRES', '20240614', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
