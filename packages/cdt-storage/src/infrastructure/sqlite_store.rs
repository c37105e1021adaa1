//! SQLite CDT Store
//!
//! File-based persistent storage using a single SQLite connection.
//! Audit rows reference their CDT with `ON DELETE CASCADE`, so foreign keys
//! are switched on for every connection this store opens.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

use crate::domain::models::{
    AuditLogEntry, Cdt, CdtFilter, CdtPage, CdtStats, CdtStatus, TransitionStamp,
};
use crate::domain::ports::{AuditLogStore, CdtStore};
use crate::{Result, StorageError};

const CDT_COLUMNS: &str = "id, owner_id, amount, term_days, interest_rate, start_date, end_date,
     estimated_return, renovation_option, status, admin_notes, reviewed_by, reviewed_at,
     submitted_at, created_at, updated_at";

/// SQLite-based store implementing both `CdtStore` and `AuditLogStore`
#[derive(Clone)]
pub struct SqliteCdtStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCdtStore {
    /// Create a new SQLite store at the given path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cdts (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                term_days INTEGER NOT NULL CHECK (term_days > 0),
                interest_rate REAL NOT NULL CHECK (interest_rate > 0),
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                estimated_return REAL NOT NULL,
                renovation_option TEXT NOT NULL
                    CHECK (renovation_option IN ('capital', 'capital_interest', 'auto')),
                status TEXT NOT NULL
                    CHECK (status IN ('draft', 'pending', 'active', 'rejected', 'completed', 'cancelled')),
                admin_notes TEXT,
                reviewed_by TEXT,
                reviewed_at INTEGER,
                submitted_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cdts_owner_status
             ON cdts(owner_id, status, created_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cdts_status_end
             ON cdts(status, end_date)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                cdt_id TEXT NOT NULL,
                action TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (cdt_id) REFERENCES cdts(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_cdt
             ON audit_log(cdt_id, created_at)",
            [],
        )?;

        Ok(())
    }
}

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Read a millisecond timestamp column
fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    from_millis(idx, ms)
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(idx)?;
    ms.map(|ms| from_millis(idx, ms)).transpose()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        conversion_error(
            idx,
            Type::Integer,
            StorageError::corrupted(format!("Timestamp out of range: {}", ms)),
        )
    })
}

fn conversion_error(idx: usize, ty: Type, err: StorageError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Map a row selected with `CDT_COLUMNS`
fn row_to_cdt(row: &Row<'_>) -> rusqlite::Result<Cdt> {
    let renovation: String = row.get(8)?;
    let status: String = row.get(9)?;

    Ok(Cdt {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        amount: row.get(2)?,
        term_days: row.get(3)?,
        interest_rate: row.get(4)?,
        start_date: row.get::<_, NaiveDate>(5)?,
        end_date: row.get::<_, NaiveDate>(6)?,
        estimated_return: row.get(7)?,
        renovation_option: renovation.parse().map_err(|e| conversion_error(8, Type::Text, e))?,
        status: status.parse().map_err(|e| conversion_error(9, Type::Text, e))?,
        admin_notes: row.get(10)?,
        reviewed_by: row.get(11)?,
        reviewed_at: optional_timestamp_at(row, 12)?,
        submitted_at: optional_timestamp_at(row, 13)?,
        created_at: timestamp_at(row, 14)?,
        updated_at: timestamp_at(row, 15)?,
    })
}

fn row_to_audit(row: &Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    let details: String = row.get(3)?;
    Ok(AuditLogEntry {
        id: row.get(0)?,
        cdt_id: row.get(1)?,
        action: row.get(2)?,
        details: serde_json::from_str(&details)
            .map_err(|e| conversion_error(3, Type::Text, StorageError::from(e)))?,
        created_at: timestamp_at(row, 4)?,
    })
}

#[async_trait]
impl CdtStore for SqliteCdtStore {
    async fn insert(&self, cdt: &Cdt) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO cdts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                CDT_COLUMNS
            ),
            params![
                &cdt.id,
                &cdt.owner_id,
                cdt.amount,
                cdt.term_days,
                cdt.interest_rate,
                cdt.start_date,
                cdt.end_date,
                cdt.estimated_return,
                cdt.renovation_option.as_str(),
                cdt.status.as_str(),
                &cdt.admin_notes,
                &cdt.reviewed_by,
                cdt.reviewed_at.as_ref().map(to_millis),
                cdt.submitted_at.as_ref().map(to_millis),
                to_millis(&cdt.created_at),
                to_millis(&cdt.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Cdt>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!("SELECT {} FROM cdts WHERE id = ?1", CDT_COLUMNS),
                params![id],
                row_to_cdt,
            )
            .optional()?;
        Ok(result)
    }

    async fn update(&self, cdt: &Cdt) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE cdts SET
                amount = ?2, term_days = ?3, interest_rate = ?4, start_date = ?5,
                end_date = ?6, estimated_return = ?7, renovation_option = ?8, status = ?9,
                admin_notes = ?10, reviewed_by = ?11, reviewed_at = ?12, submitted_at = ?13,
                updated_at = ?14
             WHERE id = ?1",
            params![
                &cdt.id,
                cdt.amount,
                cdt.term_days,
                cdt.interest_rate,
                cdt.start_date,
                cdt.end_date,
                cdt.estimated_return,
                cdt.renovation_option.as_str(),
                cdt.status.as_str(),
                &cdt.admin_notes,
                &cdt.reviewed_by,
                cdt.reviewed_at.as_ref().map(to_millis),
                cdt.submitted_at.as_ref().map(to_millis),
                to_millis(&cdt.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::cdt_not_found(&cdt.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM cdts WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: CdtStatus,
        to: CdtStatus,
        stamp: TransitionStamp,
    ) -> Result<Cdt> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE cdts SET
                status = ?3,
                submitted_at = COALESCE(?4, submitted_at),
                reviewed_by = COALESCE(?5, reviewed_by),
                reviewed_at = COALESCE(?6, reviewed_at),
                admin_notes = COALESCE(?7, admin_notes),
                updated_at = ?8
             WHERE id = ?1 AND status = ?2",
            params![
                id,
                from.as_str(),
                to.as_str(),
                stamp.submitted_at.as_ref().map(to_millis),
                &stamp.reviewed_by,
                stamp.reviewed_at.as_ref().map(to_millis),
                &stamp.admin_notes,
                to_millis(&Utc::now()),
            ],
        )?;

        if changed == 0 {
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM cdts WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match current {
                None => StorageError::cdt_not_found(id),
                Some(status) => StorageError::conflict(format!(
                    "CDT {} is {}, expected {}",
                    id, status, from
                )),
            });
        }

        let cdt = tx.query_row(
            &format!("SELECT {} FROM cdts WHERE id = ?1", CDT_COLUMNS),
            params![id],
            row_to_cdt,
        )?;
        tx.commit()?;
        Ok(cdt)
    }

    async fn list(&self, filter: &CdtFilter) -> Result<CdtPage> {
        let conn = self.conn.lock();
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cdts
             WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR status = ?2)",
            params![&filter.owner_id, status],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cdts
             WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3 OFFSET ?4",
            CDT_COLUMNS
        ))?;
        let items = stmt
            .query_map(
                params![
                    &filter.owner_id,
                    status,
                    i64::from(filter.limit),
                    filter.offset() as i64
                ],
                row_to_cdt,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CdtPage {
            items,
            total: total as u64,
            page: filter.page.max(1),
            limit: filter.limit,
        })
    }

    async fn list_by_status(&self, status: CdtStatus) -> Result<Vec<Cdt>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cdts WHERE status = ?1
             ORDER BY submitted_at ASC, created_at ASC, rowid ASC",
            CDT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![status.as_str()], row_to_cdt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn list_matured(&self, as_of: NaiveDate) -> Result<Vec<Cdt>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cdts WHERE status = 'active' AND end_date <= ?1
             ORDER BY end_date ASC, rowid ASC",
            CDT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![as_of], row_to_cdt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn stats(&self) -> Result<CdtStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(amount), 0), COALESCE(SUM(estimated_return), 0)
             FROM cdts GROUP BY status",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = CdtStats::default();
        for (status, count, amount, estimated) in rows {
            let count = count as u64;
            stats.total += count;
            match status.parse::<CdtStatus>()? {
                CdtStatus::Draft => stats.draft = count,
                CdtStatus::Pending => stats.pending = count,
                CdtStatus::Active => {
                    stats.active = count;
                    stats.active_amount = amount;
                    stats.active_estimated_return = estimated;
                }
                CdtStatus::Rejected => stats.rejected = count,
                CdtStatus::Completed => stats.completed = count,
                CdtStatus::Cancelled => stats.cancelled = count,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl AuditLogStore for SqliteCdtStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_log (id, cdt_id, action, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &entry.id,
                &entry.cdt_id,
                &entry.action,
                serde_json::to_string(&entry.details)?,
                to_millis(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_for(&self, cdt_id: &str) -> Result<Vec<AuditLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, cdt_id, action, details, created_at
             FROM audit_log WHERE cdt_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map(params![cdt_id], row_to_audit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
