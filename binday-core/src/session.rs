//! Scoped browser sessions and the scrape pipeline built on them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::browser::{BrowserSession, SessionLauncher};
use crate::extract::collections_from_rows;
use crate::form::{FormConfig, FormFlow};
use crate::model::{BinLookupResult, LookupQuery};
use crate::ports::{ScrapeError, ScrapePort};

/// Longest wait for a session to shut down.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Launch a session, run `scope` against it, and close the session.
///
/// The session is closed exactly once whether the scope returns a value,
/// fails, or exceeds `budget`. A failed launch never reaches the scope.
/// Launch and scope each get `budget`; closing gets [`TEARDOWN_TIMEOUT`] and
/// an expired close is logged, not returned.
///
/// # Errors
///
/// Returns the launch error, the scope's error, or [`ScrapeError::Timeout`]
/// when the launch or the scope runs longer than `budget`.
pub async fn with_session<T, F>(
    launcher: &dyn SessionLauncher,
    budget: Duration,
    scope: F,
) -> Result<T, ScrapeError>
where
    T: Send,
    F: for<'s> FnOnce(&'s dyn BrowserSession) -> BoxFuture<'s, Result<T, ScrapeError>> + Send,
{
    let session = match tokio::time::timeout(budget, launcher.launch()).await {
        Ok(launched) => launched?,
        Err(_elapsed) => {
            return Err(ScrapeError::Timeout {
                stage: "session launch".to_owned(),
                waited: budget,
            });
        }
    };
    debug!("browser session started");

    let outcome = match tokio::time::timeout(budget, scope(session.as_ref())).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ScrapeError::Timeout {
            stage: "scrape attempt".to_owned(),
            waited: budget,
        }),
    };

    match tokio::time::timeout(TEARDOWN_TIMEOUT, session.close()).await {
        Ok(Ok(())) => debug!("browser session closed"),
        Ok(Err(err)) => warn!(error = %err, "browser session did not shut down cleanly"),
        Err(_elapsed) => warn!(
            waited = ?TEARDOWN_TIMEOUT,
            "browser session did not shut down in time, abandoning it"
        ),
    }

    outcome
}

/// [`ScrapePort`] that runs the form flow in a fresh browser session per lookup.
pub struct BrowserScraper {
    launcher: Arc<dyn SessionLauncher>,
    form: Arc<FormConfig>,
    budget: Duration,
}

impl BrowserScraper {
    /// Create a scraper launching sessions with `launcher`.
    ///
    /// `budget` bounds a whole attempt, launch excluded.
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>, form: FormConfig, budget: Duration) -> Self {
        Self {
            launcher,
            form: Arc::new(form),
            budget,
        }
    }
}

#[async_trait]
impl ScrapePort for BrowserScraper {
    async fn scrape(&self, query: &LookupQuery) -> Result<BinLookupResult, ScrapeError> {
        let form = Arc::clone(&self.form);
        let owned_query = query.clone();

        let outcome = with_session(self.launcher.as_ref(), self.budget, move |session| {
            Box::pin(async move { FormFlow::new(session, &form).run(&owned_query).await })
        })
        .await?;

        let collections = collections_from_rows(&outcome.rows);
        debug!(
            address = %outcome.address,
            collections = collections.len(),
            "collection grid extracted"
        );
        Ok(BinLookupResult::new(outcome.address, collections))
    }
}
