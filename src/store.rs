use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::Result;

/// Same shape as the column default, millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Columns added after the first release; older databases only had
/// `keyword, email, source`.
const LATER_COLUMNS: &[&str] = &["website", "linkedin", "facebook"];

/// One persisted discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRecord {
    pub id: i64,
    pub keyword: String,
    pub email: String,
    pub source: String,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub created_at: NaiveDateTime,
}

impl EmailRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EmailRecord {
            id: row.get(0)?,
            // Legacy tables allowed NULL here
            keyword: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            email: row.get(2)?,
            source: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            website: row.get(4)?,
            linkedin: row.get(5)?,
            facebook: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

/// Insert payload; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewEmail<'a> {
    pub keyword: &'a str,
    pub email: &'a str,
    pub source: &'a str,
    pub website: Option<&'a str>,
    pub linkedin: Option<&'a str>,
    pub facebook: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// A new row was written
    pub inserted: bool,
    /// The table was wiped first because the size ceiling was reached
    pub truncated: bool,
}

/// Filters for historical lookups. `None` and blank strings are ignored.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub keyword: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaUsage {
    pub size_gb: f64,
    pub quota_gb: f64,
}

pub struct EmailStore {
    conn: Connection,
    max_db_size_gb: f64,
    quota_gb: f64,
}

impl EmailStore {
    /// Opens (creating if needed) the database file named in `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.database_path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_at(path, config)
    }

    pub fn open_at(path: &Path, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn, config)
    }

    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &StoreConfig) -> Result<Self> {
        let store = EmailStore {
            conn,
            max_db_size_gb: config.max_db_size_gb,
            quota_gb: config.quota_gb,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates the table and indexes if missing and brings older schemas up
    /// to date. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS extracted_emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                website TEXT,
                linkedin TEXT,
                facebook TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now', 'localtime'))
            )",
            [],
        )?;

        for column in LATER_COLUMNS {
            let exists: bool = self.conn.query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('extracted_emails') WHERE name = ?1",
                [*column],
                |row| row.get(0),
            )?;
            if !exists {
                info!("Adding missing column '{}' to extracted_emails", column);
                self.conn.execute(
                    &format!("ALTER TABLE extracted_emails ADD COLUMN {} TEXT", column),
                    [],
                )?;
            }
        }

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_extracted_emails_created_at
             ON extracted_emails (created_at)",
            [],
        )?;

        Ok(())
    }

    /// Footprint of the whole database (not just this table), in GB rounded
    /// to 3 decimals.
    pub fn current_size_in_gb(&self) -> Result<f64> {
        let bytes: i64 = self.conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;
        Ok((bytes as f64 / BYTES_PER_GB * 1000.0).round() / 1000.0)
    }

    /// Advisory gauge for operators; `None` when the size can't be read.
    pub fn quota_usage(&self) -> Option<QuotaUsage> {
        match self.current_size_in_gb() {
            Ok(size_gb) => Some(QuotaUsage {
                size_gb,
                quota_gb: self.quota_gb,
            }),
            Err(e) => {
                warn!("Database size unavailable: {}", e);
                None
            }
        }
    }

    /// Stores a discovery. Duplicates (by email) are skipped, and any store
    /// failure is logged and reported as nothing inserted.
    pub fn insert(&self, record: &NewEmail<'_>) -> InsertOutcome {
        match self.try_insert(record) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("DB error inserting {}: {}", record.email, e);
                InsertOutcome::default()
            }
        }
    }

    /// Size check, optional truncation, then `INSERT .. ON CONFLICT DO NOTHING`.
    /// Not atomic against other writers.
    pub fn try_insert(&self, record: &NewEmail<'_>) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();

        let email = record.email.trim().to_lowercase();
        let source = record.source.trim();
        if email.is_empty() || source.is_empty() {
            return Ok(outcome);
        }

        let size_gb = self.current_size_in_gb()?;
        if size_gb >= self.max_db_size_gb {
            warn!(
                "Database size {} GB reached the {} GB ceiling, clearing all records",
                size_gb, self.max_db_size_gb
            );
            self.truncate()?;
            outcome.truncated = true;
        }

        let changed = self.conn.execute(
            "INSERT INTO extracted_emails
             (keyword, email, source, website, linkedin, facebook, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (email) DO NOTHING",
            params![
                record.keyword,
                email,
                source,
                record.website,
                record.linkedin,
                record.facebook,
                Local::now().format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        outcome.inserted = changed == 1;

        Ok(outcome)
    }

    /// Newest first; an empty vec when nothing matches.
    pub fn search(&self, query: &RecordQuery) -> Result<Vec<EmailRecord>> {
        let mut sql = String::from(
            "SELECT id, keyword, email, source, website, linkedin, facebook, created_at
             FROM extracted_emails WHERE email IS NOT NULL",
        );
        let mut args: Vec<String> = Vec::new();

        let substring_filters = [
            ("keyword", &query.keyword),
            ("email", &query.email),
            ("source", &query.source),
        ];
        for (column, value) in substring_filters {
            if let Some(value) = non_blank(value) {
                args.push(format!("%{}%", escape_like(value)));
                sql.push_str(&format!(" AND {} LIKE ?{} ESCAPE '\\'", column, args.len()));
            }
        }

        if let Some(from) = query.date_from {
            args.push(from.format("%Y-%m-%d").to_string());
            sql.push_str(&format!(" AND date(created_at) >= ?{}", args.len()));
        }
        if let Some(to) = query.date_to {
            args.push(to.format("%Y-%m-%d").to_string());
            sql.push_str(&format!(" AND date(created_at) <= ?{}", args.len()));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args.iter()), EmailRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Removes every record and restarts the id counter.
    pub fn truncate(&self) -> Result<()> {
        self.conn.execute("DELETE FROM extracted_emails", [])?;

        // Only exists when some table was created with AUTOINCREMENT
        let has_sequence: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
            [],
            |row| row.get(0),
        )?;
        if has_sequence {
            self.conn.execute(
                "DELETE FROM sqlite_sequence WHERE name = 'extracted_emails'",
                [],
            )?;
        }

        self.conn.execute_batch("VACUUM")?;
        info!("All stored emails cleared.");
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM extracted_emails", [], |row| row.get(0))?)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
