//! State machine driving the public collection-day form.
//!
//! The flow is linear: load the page, pick the postcode search mode, submit
//! the postcode, pick an address from the returned list, submit it, and read
//! the results grid. Every wait polls observable page state with a bounded
//! timeout. Expiry and every typed failure end the run with an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::{BrowserSession, DomError, Locator, SelectOption};
use crate::extract::grid_rows;
use crate::model::LookupQuery;
use crate::ports::ScrapeError;
use crate::wait::{WaitPolicy, poll_until};

const CLICK_SCRIPT: &str = "arguments[0].click();";
const READY_STATE_SCRIPT: &str = "return document.readyState;";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Where the form's controls live on the page.
pub struct FormSelectors {
    /// Accept button of the cookie banner.
    pub cookie_accept: Locator,
    /// Radio button switching the search to postcode mode.
    pub postcode_mode: Locator,
    /// Postcode text input.
    pub postcode_input: Locator,
    /// Button submitting the postcode.
    pub search_button: Locator,
    /// Address `<select>` shown after a successful postcode search.
    pub address_list: Locator,
    /// Button confirming the chosen address.
    pub select_button: Locator,
    /// Element the form shows its error messages in.
    pub error_message: Locator,
    /// CSS selector of the results table.
    pub results_grid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Immutable description of the external form flow.
pub struct FormConfig {
    /// Page the flow starts on.
    pub url: String,
    /// Control locators.
    pub selectors: FormSelectors,
    /// Case-insensitive page text reporting an unknown postcode.
    pub not_recognised_marker: String,
    /// Case-insensitive text of the address list's prompt option.
    pub placeholder_marker: String,
    /// Timeout of every wait, in milliseconds.
    pub wait_timeout_ms: u64,
    /// Pause between probes of a wait, in milliseconds.
    pub poll_interval_ms: u64,
}

impl FormConfig {
    /// Policy applied to every wait of the flow.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from_millis(self.wait_timeout_ms, self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Named steps of the flow.
pub enum FormStep {
    /// Poll until the document finished loading.
    WaitPageReady,
    /// Accept the cookie banner if one is shown. Never fatal.
    DismissCookieBanner,
    /// Switch the search to postcode mode.
    SelectPostcodeMode,
    /// Poll until the postcode input can be typed into.
    WaitInputEnabled,
    /// Enter the postcode and search.
    SubmitPostcode,
    /// Race the "not recognised" message against the address list.
    WaitPostcodeResult,
    /// Drop the address list's prompt option.
    FilterAddressOptions,
    /// Pick the address matching the house number.
    ChooseAddress,
    /// Select the address and confirm.
    SubmitAddress,
    /// Race the results grid against the error message.
    WaitResults,
}

impl fmt::Display for FormStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormStep::WaitPageReady => "wait_page_ready",
            FormStep::DismissCookieBanner => "dismiss_cookie_banner",
            FormStep::SelectPostcodeMode => "select_postcode_mode",
            FormStep::WaitInputEnabled => "wait_input_enabled",
            FormStep::SubmitPostcode => "submit_postcode",
            FormStep::WaitPostcodeResult => "wait_postcode_result",
            FormStep::FilterAddressOptions => "filter_address_options",
            FormStep::ChooseAddress => "choose_address",
            FormStep::SubmitAddress => "submit_address",
            FormStep::WaitResults => "wait_results",
        };
        write!(formatter, "{name}")
    }
}

/// Current position in the flow plus the data carried between steps.
enum FormState {
    WaitPageReady,
    DismissCookieBanner,
    SelectPostcodeMode,
    WaitInputEnabled,
    SubmitPostcode,
    WaitPostcodeResult,
    FilterAddressOptions,
    ChooseAddress(Vec<SelectOption>),
    SubmitAddress(SelectOption),
    WaitResults(SelectOption),
}

impl FormState {
    fn step(&self) -> FormStep {
        match self {
            FormState::WaitPageReady => FormStep::WaitPageReady,
            FormState::DismissCookieBanner => FormStep::DismissCookieBanner,
            FormState::SelectPostcodeMode => FormStep::SelectPostcodeMode,
            FormState::WaitInputEnabled => FormStep::WaitInputEnabled,
            FormState::SubmitPostcode => FormStep::SubmitPostcode,
            FormState::WaitPostcodeResult => FormStep::WaitPostcodeResult,
            FormState::FilterAddressOptions => FormStep::FilterAddressOptions,
            FormState::ChooseAddress(_) => FormStep::ChooseAddress,
            FormState::SubmitAddress(_) => FormStep::SubmitAddress,
            FormState::WaitResults(_) => FormStep::WaitResults,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a successful run read off the page.
pub struct FormOutcome {
    /// Visible text of the chosen address option.
    pub address: String,
    /// Results grid rows, header row included.
    pub rows: Vec<Vec<String>>,
}

/// One run of the form flow against a live session.
pub struct FormFlow<'a> {
    session: &'a dyn BrowserSession,
    config: &'a FormConfig,
}

impl<'a> FormFlow<'a> {
    /// Bind the flow to a session and a form description.
    #[must_use]
    pub fn new(session: &'a dyn BrowserSession, config: &'a FormConfig) -> Self {
        Self { session, config }
    }

    /// Drive the form from the start page to the results grid.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::PostcodeNotFound`], [`ScrapeError::NoAddressesFound`]
    /// or [`ScrapeError::CollectionDataUnavailable`] when the form rejects the
    /// lookup, [`ScrapeError::Timeout`] when a wait expires, and
    /// [`ScrapeError::Browser`] when a browser command fails.
    pub async fn run(&self, query: &LookupQuery) -> Result<FormOutcome, ScrapeError> {
        let selectors = &self.config.selectors;
        let postcode = query.postcode.trim();

        debug!(url = %self.config.url, "opening collection form");
        self.session.navigate(&self.config.url).await?;

        let mut state = FormState::WaitPageReady;
        loop {
            let step = state.step();
            debug!(%step, "form step");

            state = match state {
                FormState::WaitPageReady => {
                    self.wait_page_ready(step).await?;
                    FormState::DismissCookieBanner
                }
                FormState::DismissCookieBanner => {
                    self.dismiss_cookie_banner().await;
                    FormState::SelectPostcodeMode
                }
                FormState::SelectPostcodeMode => {
                    self.click(&selectors.postcode_mode).await?;
                    FormState::WaitInputEnabled
                }
                FormState::WaitInputEnabled => {
                    self.wait_interactable(step, &selectors.postcode_input)
                        .await?;
                    FormState::SubmitPostcode
                }
                FormState::SubmitPostcode => {
                    self.session
                        .fill(&selectors.postcode_input, postcode)
                        .await?;
                    self.click(&selectors.search_button).await?;
                    FormState::WaitPostcodeResult
                }
                FormState::WaitPostcodeResult => {
                    self.wait_postcode_result(step, postcode).await?;
                    FormState::FilterAddressOptions
                }
                FormState::FilterAddressOptions => {
                    let options = self.session.select_options(&selectors.address_list).await?;
                    let valid = filter_address_options(options, &self.config.placeholder_marker);
                    if valid.is_empty() {
                        return Err(ScrapeError::NoAddressesFound(postcode.to_owned()));
                    }
                    FormState::ChooseAddress(valid)
                }
                FormState::ChooseAddress(options) => {
                    let chosen = choose_address(options, query.house_number())
                        .ok_or_else(|| ScrapeError::NoAddressesFound(postcode.to_owned()))?;
                    debug!(address = %chosen.text, "address chosen");
                    FormState::SubmitAddress(chosen)
                }
                FormState::SubmitAddress(chosen) => {
                    self.session
                        .select_by_value(&selectors.address_list, &chosen.value)
                        .await?;
                    self.click(&selectors.select_button).await?;
                    FormState::WaitResults(chosen)
                }
                FormState::WaitResults(chosen) => {
                    let rows = self.wait_results(step).await?;
                    return Ok(FormOutcome {
                        address: chosen.text.trim().to_owned(),
                        rows,
                    });
                }
            };
        }
    }

    async fn wait_page_ready(&self, step: FormStep) -> Result<(), ScrapeError> {
        let session = self.session;
        poll_until(&step.to_string(), self.config.wait_policy(), move || {
            page_ready(session)
        })
        .await
    }

    async fn wait_interactable(&self, step: FormStep, locator: &Locator) -> Result<(), ScrapeError> {
        let session = self.session;
        poll_until(&step.to_string(), self.config.wait_policy(), move || {
            interactable(session, locator)
        })
        .await
    }

    async fn wait_postcode_result(&self, step: FormStep, postcode: &str) -> Result<(), ScrapeError> {
        let session = self.session;
        let config = self.config;
        poll_until(&step.to_string(), config.wait_policy(), move || {
            address_list_or_rejection(session, config, postcode)
        })
        .await
    }

    async fn wait_results(&self, step: FormStep) -> Result<Vec<Vec<String>>, ScrapeError> {
        let session = self.session;
        let selectors = &self.config.selectors;
        poll_until(&step.to_string(), self.config.wait_policy(), move || {
            results_or_error(session, selectors)
        })
        .await
    }

    /// Accept the cookie banner when present. Failures are logged and dropped.
    async fn dismiss_cookie_banner(&self) {
        let locator = &self.config.selectors.cookie_accept;
        match self.session.probe(locator).await {
            Ok(Some(element)) if element.displayed => {
                if let Err(err) = self.click(locator).await {
                    debug!(error = %err, "cookie banner could not be dismissed");
                }
            }
            Ok(_) => debug!("no cookie banner shown"),
            Err(err) => debug!(error = %err, "cookie banner probe failed"),
        }
    }

    /// Pointer click, retried as a DOM `click()` when an overlay intercepts it.
    async fn click(&self, locator: &Locator) -> Result<(), ScrapeError> {
        match self.session.click(locator).await {
            Ok(()) => Ok(()),
            Err(DomError::ClickIntercepted(_)) => {
                debug!(%locator, "click intercepted, invoking click() directly");
                self.session
                    .execute_script(CLICK_SCRIPT, Some(locator))
                    .await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

async fn page_ready(session: &dyn BrowserSession) -> Result<Option<()>, ScrapeError> {
    let state = session.execute_script(READY_STATE_SCRIPT, None).await?;
    Ok((state.as_str() == Some("complete")).then_some(()))
}

async fn interactable(
    session: &dyn BrowserSession,
    locator: &Locator,
) -> Result<Option<()>, ScrapeError> {
    let state = session.probe(locator).await?;
    Ok(state
        .filter(|element| element.is_interactable())
        .map(|_element| ()))
}

async fn address_list_or_rejection(
    session: &dyn BrowserSession,
    config: &FormConfig,
    postcode: &str,
) -> Result<Option<()>, ScrapeError> {
    let source = session.page_source().await?;
    if reports_unknown_postcode(&source, &config.not_recognised_marker) {
        return Err(ScrapeError::PostcodeNotFound(postcode.to_owned()));
    }
    let list = session.probe(&config.selectors.address_list).await?;
    Ok(list.filter(|element| element.displayed).map(|_element| ()))
}

async fn results_or_error(
    session: &dyn BrowserSession,
    selectors: &FormSelectors,
) -> Result<Option<Vec<Vec<String>>>, ScrapeError> {
    let source = session.page_source().await?;
    let rows = grid_rows(&source, &selectors.results_grid)?;
    if rows.len() > 1 {
        return Ok(Some(rows));
    }
    if let Some(element) = session.probe(&selectors.error_message).await?
        && element.displayed
    {
        let message = session.text(&selectors.error_message).await?;
        return Err(ScrapeError::CollectionDataUnavailable(
            message.trim().to_owned(),
        ));
    }
    Ok(None)
}

/// Whether the page text carries the "postcode not recognised" marker.
#[must_use]
pub fn reports_unknown_postcode(page_source: &str, marker: &str) -> bool {
    page_source
        .to_lowercase()
        .contains(&marker.to_lowercase())
}

/// Drop prompt options such as "Select the BT1 1AA address from the list."
#[must_use]
pub fn filter_address_options(options: Vec<SelectOption>, placeholder_marker: &str) -> Vec<SelectOption> {
    let marker = placeholder_marker.to_lowercase();
    options
        .into_iter()
        .filter(|option| !option.text.to_lowercase().contains(&marker))
        .collect()
}

/// First option whose text contains the house number, else the first option.
///
/// Matching is a case-insensitive substring test, so "1" also matches
/// "21 Main Street" when that option comes first.
#[must_use]
pub fn choose_address(options: Vec<SelectOption>, house_number: Option<&str>) -> Option<SelectOption> {
    let needle = house_number.map(str::to_lowercase);
    let matching = needle.as_deref().and_then(|number| {
        options
            .iter()
            .position(|option| option.text.to_lowercase().contains(number))
    });

    options.into_iter().nth(matching.unwrap_or(0))
}
