//! High-level lookup service: cache first, live scrape second, placeholder last.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use futures::FutureExt;
use tracing::{info, warn};

use crate::classify::classify_bin;
use crate::fallback::{DATE_FORMAT, mock_schedule, next_weekday};
use crate::model::{BinCollection, BinLookupResult, LookupQuery, LookupSource, ScheduleEntry};
use crate::ports::{Clock, LookupError, ScheduleCache, ScrapeError, ScrapePort};

/// Lookup result together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLookup {
    /// The schedule handed to the caller.
    pub result: BinLookupResult,
    /// Which stage produced it.
    pub source: LookupSource,
}

/// Public entry point for bin collection lookups.
pub struct BinLookupService {
    cache: Arc<dyn ScheduleCache>,
    scraper: Arc<dyn ScrapePort>,
    clock: Arc<dyn Clock>,
}

impl BinLookupService {
    /// Create a new service bound to its collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ScheduleCache>,
        scraper: Arc<dyn ScrapePort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            scraper,
            clock,
        }
    }

    /// Look up the collection schedule for an address.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Validation`] for a blank postcode and
    /// [`LookupError::Cache`] when the cache cannot be read. Scrape failures
    /// never surface; they yield placeholder data instead.
    pub async fn lookup_bins(&self, query: &LookupQuery) -> Result<BinLookupResult, LookupError> {
        self.resolve(query).await.map(|resolved| resolved.result)
    }

    /// Like [`Self::lookup_bins`], also reporting the result's source.
    ///
    /// # Errors
    ///
    /// See [`Self::lookup_bins`].
    pub async fn resolve(&self, query: &LookupQuery) -> Result<ResolvedLookup, LookupError> {
        if query.is_blank() {
            return Err(LookupError::Validation("Postcode is required".to_owned()));
        }

        let postcode = query.postcode.trim();
        let house_number = query.house_number();
        info!(postcode, house_number, "bin lookup");

        let cached = AssertUnwindSafe(self.cache.lookup(postcode, house_number))
            .catch_unwind()
            .await
            .map_err(|payload| {
                LookupError::Unexpected(format!("schedule cache panicked: {}", panic_message(&*payload)))
            })?;
        if let Some(entry) = cached? {
            info!(id = entry.id, "found in schedule cache");
            return Ok(ResolvedLookup {
                result: schedule_to_result(&entry, self.clock.today()),
                source: LookupSource::Cache,
            });
        }

        info!("not in schedule cache, scraping the council website");
        let scraped = AssertUnwindSafe(self.scraper.scrape(query))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(ScrapeError::Unexpected(format!(
                    "scraper panicked: {}",
                    panic_message(&*payload)
                )))
            });
        match scraped {
            Ok(result) => Ok(ResolvedLookup {
                result,
                source: LookupSource::Live,
            }),
            Err(err) => {
                warn!(error = %err, "scraping failed, using placeholder schedule");
                Ok(ResolvedLookup {
                    result: mock_schedule(postcode, house_number, self.clock.today()),
                    source: LookupSource::Placeholder,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Present a cached schedule as a lookup result.
///
/// The next collection is the next occurrence of the stored weekday, today
/// included. Unparseable weekdays are shown verbatim.
#[must_use]
pub fn schedule_to_result(entry: &ScheduleEntry, today: NaiveDate) -> BinLookupResult {
    let day = entry.day_of_week.trim();
    let mut next_collection = Weekday::from_str(day).map_or_else(
        |_err| day.to_owned(),
        |weekday| {
            next_weekday(today, weekday, true)
                .format(DATE_FORMAT)
                .to_string()
        },
    );
    let cycle = entry.week_cycle.trim();
    if !cycle.is_empty() {
        next_collection = format!("{next_collection} ({cycle})");
    }

    BinLookupResult::new(
        entry.full_address.clone(),
        vec![BinCollection {
            bin_type: entry.bin_type.clone(),
            color: classify_bin(&entry.bin_type),
            next_collection,
        }],
    )
}
