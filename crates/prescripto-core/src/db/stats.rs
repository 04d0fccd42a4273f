//! Aggregate counts over record tables.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{ts, Database, DbResult};
use crate::models::{MonthlyCount, RecordStats, RecordVariant};

impl Database {
    /// Total, active and completed counts for `variant`, plus per-month
    /// creation counts for records created at or after `since`.
    pub fn record_stats(&self, variant: RecordVariant, since: DateTime<Utc>) -> DbResult<RecordStats> {
        let table = variant.table();
        let active_status = match variant {
            RecordVariant::Prescription => "Active",
            RecordVariant::TestResult => "Pending",
        };

        let (total, active, completed): (u64, u64, u64) = self.conn.query_row(
            &format!(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(status = ?1), 0),
                       COALESCE(SUM(status = 'Completed'), 0)
                FROM {}
                "#,
                table
            ),
            [active_status],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        // created_at is 'YYYY-MM-DDTHH:MM:SS.sssZ'
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT CAST(substr(created_at, 1, 4) AS INTEGER) AS year,
                   CAST(substr(created_at, 6, 2) AS INTEGER) AS month,
                   COUNT(*)
            FROM {}
            WHERE created_at >= ?1
            GROUP BY year, month
            ORDER BY year ASC, month ASC
            "#,
            table
        ))?;

        let monthly_stats = stmt
            .query_map(params![ts(&since)], |row| {
                Ok(MonthlyCount {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordStats {
            total,
            active,
            completed,
            monthly_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use chrono::TimeZone;

    fn insert_raw(db: &Database, id: &str, status: &str, created_at: &str) {
        db.conn()
            .execute(
                r#"
                INSERT INTO test_results (
                    test_result_id, patient_id, patient_name, test_name, test_type,
                    test_date, result_date, status, created_at, updated_at
                ) VALUES (?1, 'p1', 'Asha', 'CBC', 'Blood Test', '2024-01-01', ?3, ?2, ?3, ?3)
                "#,
                params![id, status, created_at],
            )
            .unwrap();
    }

    #[test]
    fn test_stats_counts_and_months() {
        let db = Database::open_in_memory().unwrap();
        let mut patient = Patient::new("Asha".into(), "asha@example.com".into());
        patient.id = "p1".into();
        db.insert_patient(&patient).unwrap();

        insert_raw(&db, "TEST-20231201-001", "Completed", "2023-12-01T10:00:00.000Z");
        insert_raw(&db, "TEST-20240115-001", "Pending", "2024-01-15T10:00:00.000Z");
        insert_raw(&db, "TEST-20240302-001", "Pending", "2024-03-02T10:00:00.000Z");
        insert_raw(&db, "TEST-20240320-001", "Cancelled", "2024-03-20T10:00:00.000Z");
        insert_raw(&db, "TEST-20240601-001", "Completed", "2024-06-01T10:00:00.000Z");

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stats = db.record_stats(RecordVariant::TestResult, since).unwrap();

        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(
            stats.monthly_stats,
            vec![
                MonthlyCount { year: 2024, month: 1, count: 1 },
                MonthlyCount { year: 2024, month: 3, count: 2 },
                MonthlyCount { year: 2024, month: 6, count: 1 },
            ]
        );
    }

    #[test]
    fn test_stats_empty() {
        let db = Database::open_in_memory().unwrap();
        let stats = db
            .record_stats(RecordVariant::Prescription, Utc::now())
            .unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.active, 0);
        assert!(stats.monthly_stats.is_empty());
    }
}
