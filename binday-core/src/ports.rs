//! Traits describing collaborators of the lookup service and the shared error types.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rusqlite::Error as SqliteError;

use crate::browser::DomError;
use crate::model::{BinLookupResult, LookupQuery, ScheduleEntry};

#[derive(thiserror::Error, Debug)]
/// Errors surfaced to callers of the lookup service.
pub enum LookupError {
    /// Caller supplied an unusable query.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The schedule cache could not be read.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    /// Anything else that went wrong outside a scrape attempt.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[derive(thiserror::Error, Debug)]
/// Errors raised while reading or writing the schedule cache.
pub enum CacheError {
    /// The SQLite layer failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] SqliteError),
    /// A previous holder of the connection panicked.
    #[error("Cache connection lock poisoned")]
    LockPoisoned,
    /// The blocking query task was cancelled before it finished.
    #[error("Cache worker failed: {0}")]
    Worker(String),
}

#[derive(thiserror::Error, Debug)]
/// Failures of a single scrape attempt. None of these reach lookup callers.
pub enum ScrapeError {
    /// The form reported the postcode as not recognised.
    #[error("Postcode not found: {0}")]
    PostcodeNotFound(String),
    /// The address list held no selectable address.
    #[error("No addresses found for postcode {0}")]
    NoAddressesFound(String),
    /// The form showed an error instead of collection data.
    #[error("Collection data unavailable: {0}")]
    CollectionDataUnavailable(String),
    /// The browser session could not be started.
    #[error("Session launch failed: {0}")]
    SessionLaunch(String),
    /// A bounded wait expired.
    #[error("Timed out after {waited:?} during {stage}")]
    Timeout {
        /// Step or scope that was waiting.
        stage: String,
        /// How long it waited.
        waited: Duration,
    },
    /// A browser command failed.
    #[error("Browser error: {0}")]
    Browser(#[from] DomError),
    /// Internal scraper error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[async_trait]
/// Read path into the store of previously resolved schedules.
pub trait ScheduleCache: Send + Sync {
    /// Find a schedule by postcode and optional house number.
    ///
    /// The postcode is normalized the same way the store indexes it. A miss
    /// is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] when the store cannot be queried.
    async fn lookup(
        &self,
        postcode: &str,
        house_number: Option<&str>,
    ) -> Result<Option<ScheduleEntry>, CacheError>;
}

#[async_trait]
/// Live schedule source, typically a browser driving the council website.
pub trait ScrapePort: Send + Sync {
    /// Fetch the collection schedule for an address.
    ///
    /// # Errors
    ///
    /// Returns a [`ScrapeError`] describing why the attempt failed.
    async fn scrape(&self, query: &LookupQuery) -> Result<BinLookupResult, ScrapeError>;
}

/// Source of the current date.
pub trait Clock: Send + Sync {
    /// Today's date in local time.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
/// Clock backed by the system's local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
/// Clock frozen at a given date.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
