//! Daily record sequence counter.
//!
//! A record's sequence number is one more than the number of records of the
//! same variant already created that UTC day. Counting and inserting in two
//! statements lets two writers draw the same number, so the count is kept in
//! `record_sequences` and bumped with a single upsert inside the transaction
//! that inserts the record. The first bump of a day seeds the counter from the
//! records already present, which keeps the count-based definition intact for
//! databases populated before the counter existed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ts, Database, DbResult};
use crate::models::{day_window, RecordId, RecordVariant};

/// Draw the next ID for `variant` on the UTC day of `at`.
///
/// Must run inside the transaction that inserts the record; otherwise the
/// counter can run ahead of the stored records if the insert fails.
pub fn next_record_id(
    conn: &Connection,
    variant: RecordVariant,
    at: DateTime<Utc>,
) -> DbResult<RecordId> {
    let (day_start, day_end) = day_window(at);
    let day = at.format("%Y%m%d").to_string();

    let sql = format!(
        r#"
        INSERT INTO record_sequences (variant, day, last_seq)
        VALUES (
            ?1, ?2,
            (SELECT COUNT(*) FROM {table} WHERE created_at >= ?3 AND created_at < ?4) + 1
        )
        ON CONFLICT (variant, day) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
        table = variant.table()
    );

    let sequence: u32 = conn.query_row(
        &sql,
        params![variant.prefix(), day, ts(&day_start), ts(&day_end)],
        |row| row.get(0),
    )?;

    Ok(RecordId::new(variant, at, sequence))
}

impl Database {
    /// Number of records of `variant` created on the UTC day containing `at`.
    pub fn count_records_on_day(&self, variant: RecordVariant, at: DateTime<Utc>) -> DbResult<u32> {
        let (day_start, day_end) = day_window(at);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE created_at >= ?1 AND created_at < ?2",
            variant.table()
        );
        let count: u32 = self
            .conn
            .query_row(&sql, params![ts(&day_start), ts(&day_end)], |row| row.get(0))?;
        Ok(count)
    }

    /// Last sequence issued for `variant` on the UTC day containing `at`.
    pub fn last_sequence(&self, variant: RecordVariant, at: DateTime<Utc>) -> DbResult<Option<u32>> {
        self.conn
            .query_row(
                "SELECT last_seq FROM record_sequences WHERE variant = ?1 AND day = ?2",
                params![variant.prefix(), at.format("%Y%m%d").to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}
