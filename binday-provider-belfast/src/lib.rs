//! Provider for the Belfast City Council "find your bin collection day" form.

mod webdriver;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use binday_core::browser::Locator;
use binday_core::form::{FormConfig, FormSelectors};
use binday_core::session::BrowserScraper;

pub use webdriver::{BrowserConfig, ChromeLauncher, WebDriverSession};

const FORM_URL: &str = "https://online.belfastcity.gov.uk/find-bin-collection-day/Default.aspx";

/// Form as currently published by the council.
#[must_use]
pub fn belfast_form() -> FormConfig {
    FormConfig {
        url: FORM_URL.to_owned(),
        selectors: FormSelectors {
            cookie_accept: Locator::id("ccc-notify-accept"),
            postcode_mode: Locator::id("searchBy_radio_1"),
            postcode_input: Locator::id("Postcode_textbox"),
            search_button: Locator::name("ctl00$MainContent$AddressLookup_button"),
            address_list: Locator::name("ctl00$MainContent$lstAddresses"),
            select_button: Locator::name("ctl00$MainContent$SelectAddress_button"),
            error_message: Locator::id("MainContent_lblError"),
            results_grid: "#ItemsGrid".to_owned(),
        },
        not_recognised_marker: "not recognised".to_owned(),
        placeholder_marker: "select the".to_owned(),
        wait_timeout_ms: 10_000,
        poll_interval_ms: 250,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Everything needed to build a live scraper.
pub struct ScraperSettings {
    /// Browser and WebDriver endpoint.
    pub browser: BrowserConfig,
    /// Form flow description.
    pub form: FormConfig,
    /// Upper bound for one whole scrape attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            form: belfast_form(),
            attempt_timeout_ms: 60_000,
        }
    }
}

impl ScraperSettings {
    /// Whole-attempt budget as a duration.
    #[must_use]
    pub fn attempt_budget(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Assemble a scraper launching Chrome through the configured WebDriver.
#[must_use]
pub fn scraper(client: Client, settings: &ScraperSettings) -> BrowserScraper {
    let launcher = ChromeLauncher::new(client, settings.browser.clone());
    BrowserScraper::new(
        Arc::new(launcher),
        settings.form.clone(),
        settings.attempt_budget(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_council_form() {
        let settings = ScraperSettings::default();
        assert_eq!(settings.form.url, FORM_URL);
        assert_eq!(
            settings.form.selectors.postcode_input,
            Locator::id("Postcode_textbox")
        );
        assert_eq!(settings.attempt_budget(), Duration::from_secs(60));
        assert_eq!(settings.form.wait_policy().timeout, Duration::from_secs(10));
    }

    #[test]
    fn partial_settings_keep_remaining_defaults() {
        let settings: ScraperSettings =
            serde_json::from_str(r#"{"attempt_timeout_ms": 5000}"#).expect("valid settings");
        assert_eq!(settings.attempt_timeout_ms, 5000);
        assert_eq!(settings.form, belfast_form());
        assert_eq!(settings.browser, BrowserConfig::default());
    }

    #[test]
    fn locators_deserialize_from_tagged_objects() {
        let locator: Locator =
            serde_json::from_str(r#"{"name": "ctl00$MainContent$lstAddresses"}"#)
                .expect("valid locator");
        assert_eq!(belfast_form().selectors.address_list, locator);
    }
}
