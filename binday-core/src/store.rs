//! SQLite-backed store of previously resolved schedules.

use std::panic;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::task;
use tracing::debug;

use crate::model::{ScheduleEntry, normalize_postcode, normalize_street};
use crate::ports::{CacheError, ScheduleCache};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS bin_schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        route TEXT NOT NULL,
        bin_type TEXT NOT NULL,
        day_of_week TEXT NOT NULL,
        week_cycle TEXT NOT NULL,
        house_number TEXT NOT NULL,
        house_suffix TEXT NOT NULL DEFAULT '',
        street TEXT NOT NULL,
        street_normalized TEXT NOT NULL,
        city TEXT NOT NULL,
        county TEXT NOT NULL,
        postcode TEXT NOT NULL,
        postcode_normalized TEXT NOT NULL,
        full_address TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS ix_bin_schedules_postcode_normalized
        ON bin_schedules (postcode_normalized);

    CREATE INDEX IF NOT EXISTS ix_bin_schedules_postcode_normalized_house_number
        ON bin_schedules (postcode_normalized, house_number);
";

const COLUMNS: &str = "id, route, bin_type, day_of_week, week_cycle, house_number, house_suffix, \
     street, street_normalized, city, county, postcode, postcode_normalized, full_address";

/// Schedule cache stored in a single SQLite table.
///
/// Async lookups run on the blocking thread pool.
pub struct SqliteScheduleCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScheduleCache {
    /// Open (or create) a cache database at the given path.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the file cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Create an in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the schema cannot be created.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        lock(&self.conn)
    }

    /// Store one schedule, deriving its normalized columns. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the insert fails.
    pub fn insert(&self, entry: &ScheduleEntry) -> Result<i64, CacheError> {
        let conn = self.conn()?;
        insert_row(&conn, entry)?;
        Ok(conn.last_insert_rowid())
    }

    /// Store a batch of schedules in one transaction. Returns the number stored.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when any insert fails; nothing is stored then.
    pub fn import(&self, entries: &[ScheduleEntry]) -> Result<usize, CacheError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for entry in entries {
            insert_row(&tx, entry)?;
        }
        tx.commit()?;
        debug!(count = entries.len(), "schedules imported");
        Ok(entries.len())
    }

    /// Number of stored schedules.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the count query fails.
    pub fn len(&self) -> Result<usize, CacheError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM bin_schedules", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Whether the cache holds no schedules.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the count query fails.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl ScheduleCache for SqliteScheduleCache {
    async fn lookup(
        &self,
        postcode: &str,
        house_number: Option<&str>,
    ) -> Result<Option<ScheduleEntry>, CacheError> {
        let conn = Arc::clone(&self.conn);
        let postcode = postcode.to_owned();
        let house_number = house_number.map(str::to_owned);

        match task::spawn_blocking(move || find(&conn, &postcode, house_number.as_deref())).await {
            Ok(found) => found,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(err) => Err(CacheError::Worker(err.to_string())),
        }
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, CacheError> {
    conn.lock().map_err(|_poisoned| CacheError::LockPoisoned)
}

fn find(
    conn: &Mutex<Connection>,
    postcode: &str,
    house_number: Option<&str>,
) -> Result<Option<ScheduleEntry>, CacheError> {
    let conn = lock(conn)?;
    let key = normalize_postcode(postcode);

    let entry = match house_number.map(str::trim).filter(|number| !number.is_empty()) {
        Some(number) => conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM bin_schedules
                     WHERE postcode_normalized = ?1 AND house_number = ?2 COLLATE NOCASE
                     ORDER BY id LIMIT 1"
                ),
                params![key, number],
                row_to_entry,
            )
            .optional()?,
        None => conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM bin_schedules
                     WHERE postcode_normalized = ?1
                     ORDER BY id LIMIT 1"
                ),
                params![key],
                row_to_entry,
            )
            .optional()?,
    };
    Ok(entry)
}

fn insert_row(conn: &Connection, entry: &ScheduleEntry) -> Result<(), CacheError> {
    conn.execute(
        "INSERT INTO bin_schedules (route, bin_type, day_of_week, week_cycle, house_number,
             house_suffix, street, street_normalized, city, county, postcode,
             postcode_normalized, full_address)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            entry.route,
            entry.bin_type,
            entry.day_of_week,
            entry.week_cycle,
            entry.house_number.trim(),
            entry.house_suffix,
            entry.street,
            normalize_street(&entry.street),
            entry.city,
            entry.county,
            entry.postcode,
            normalize_postcode(&entry.postcode),
            entry.full_address,
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: row.get(0)?,
        route: row.get(1)?,
        bin_type: row.get(2)?,
        day_of_week: row.get(3)?,
        week_cycle: row.get(4)?,
        house_number: row.get(5)?,
        house_suffix: row.get(6)?,
        street: row.get(7)?,
        street_normalized: row.get(8)?,
        city: row.get(9)?,
        county: row.get(10)?,
        postcode: row.get(11)?,
        postcode_normalized: row.get(12)?,
        full_address: row.get(13)?,
    })
}
