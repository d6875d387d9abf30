//! Chrome sessions driven over the WebDriver protocol.

use std::env;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thirtyfour::ChromeCapabilities;
use thirtyfour::components::SelectElement;
use thirtyfour::error::WebDriverErrorInner;
use thirtyfour::prelude::*;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use binday_core::browser::{
    BrowserSession, DomError, ElementState, Locator, SelectOption, SessionLauncher,
};
use binday_core::ports::ScrapeError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_args() -> Vec<String> {
    [
        "--headless=new",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-software-rasterizer",
        "--disable-extensions",
        "--disable-setuid-sandbox",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// `$CHROME_BIN`, when it points at an existing file.
fn chrome_bin_from_env() -> Option<String> {
    env::var("CHROME_BIN")
        .ok()
        .filter(|path| Path::new(path).exists())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// How to reach the WebDriver server and which Chrome to start.
pub struct BrowserConfig {
    /// Base URL of chromedriver.
    pub webdriver_url: String,
    /// Chrome executable. Chromedriver picks one when unset.
    pub chrome_binary: Option<String>,
    /// Command line flags passed to Chrome.
    pub args: Vec<String>,
    /// Browser window width in pixels.
    pub window_width: u32,
    /// Browser window height in pixels.
    pub window_height: u32,
    /// User agent Chrome reports.
    pub user_agent: String,
    /// Timeout of the readiness probe, in milliseconds.
    pub status_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_owned(),
            chrome_binary: chrome_bin_from_env(),
            args: default_args(),
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            status_timeout_ms: 5_000,
        }
    }
}

impl BrowserConfig {
    /// Every flag Chrome is started with.
    #[must_use]
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(format!(
            "--window-size={},{}",
            self.window_width, self.window_height
        ));
        args.push(format!("--user-agent={}", self.user_agent));
        args
    }

    fn status_url(&self) -> String {
        format!("{}/status", self.webdriver_url.trim_end_matches('/'))
    }
}

/// Response of `GET /status`.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

/// Starts one headless Chrome per session through chromedriver.
pub struct ChromeLauncher {
    client: Client,
    config: BrowserConfig,
}

impl ChromeLauncher {
    /// Create a launcher probing readiness with the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: BrowserConfig) -> Self {
        Self { client, config }
    }

    /// Ask the WebDriver server whether it accepts new sessions.
    async fn ensure_ready(&self) -> Result<(), ScrapeError> {
        let url = self.config.status_url();
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(self.config.status_timeout_ms))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| ScrapeError::SessionLaunch(format!("WebDriver unreachable at {url}: {err}")))?;

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|err| ScrapeError::SessionLaunch(format!("Invalid WebDriver status: {err}")))?;

        if status.value.ready {
            Ok(())
        } else {
            Err(ScrapeError::SessionLaunch(format!(
                "WebDriver not ready: {}",
                status.value.message
            )))
        }
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in self.config.chrome_args() {
            caps.add_arg(&arg)?;
        }
        if let Some(binary) = &self.config.chrome_binary {
            caps.set_binary(binary)?;
        }
        Ok(caps)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        self.ensure_ready().await?;

        let caps = self
            .capabilities()
            .map_err(|err| ScrapeError::SessionLaunch(err.to_string()))?;
        let driver = WebDriver::new(self.config.webdriver_url.as_str(), caps)
            .await
            .map_err(|err| ScrapeError::SessionLaunch(err.to_string()))?;
        debug!(webdriver = %self.config.webdriver_url, "browser session started");

        Ok(Box::new(WebDriverSession::new(driver)))
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Id(id) => By::Id(id.as_str()),
        Locator::Name(name) => By::Name(name.as_str()),
        Locator::Css(selector) => By::Css(selector.as_str()),
    }
}

fn driver_error(err: &WebDriverError) -> DomError {
    DomError::Driver(err.to_string())
}

fn click_error(locator: &Locator, err: &WebDriverError) -> DomError {
    match &**err {
        WebDriverErrorInner::ElementClickIntercepted(_) => DomError::ClickIntercepted(locator.clone()),
        _ => driver_error(err),
    }
}

/// A live chromedriver session.
///
/// The driver is taken out on [`BrowserSession::close`]. A session dropped
/// while still open quits in the background.
pub struct WebDriverSession {
    driver: Mutex<Option<WebDriver>>,
}

impl WebDriverSession {
    /// Wrap an already started driver.
    #[must_use]
    pub fn new(driver: WebDriver) -> Self {
        Self {
            driver: Mutex::new(Some(driver)),
        }
    }

    async fn driver(&self) -> Result<WebDriver, DomError> {
        self.driver
            .lock()
            .await
            .clone()
            .ok_or_else(|| DomError::Driver("session already closed".to_owned()))
    }

    async fn find(&self, locator: &Locator) -> Result<WebElement, DomError> {
        let driver = self.driver().await?;
        let mut found = driver
            .find_all(by(locator))
            .await
            .map_err(|err| driver_error(&err))?;
        if found.is_empty() {
            return Err(DomError::NotFound(locator.clone()));
        }
        Ok(found.swap_remove(0))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), DomError> {
        let driver = self.driver().await?;
        driver.goto(url).await.map_err(|err| driver_error(&err))
    }

    async fn execute_script(
        &self,
        script: &str,
        target: Option<&Locator>,
    ) -> Result<Value, DomError> {
        let mut args = Vec::new();
        if let Some(locator) = target {
            let element = self.find(locator).await?;
            args.push(element.to_json().map_err(|err| driver_error(&err))?);
        }
        let driver = self.driver().await?;
        let ret = driver
            .execute(script, args)
            .await
            .map_err(|err| DomError::Script(err.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>, DomError> {
        let driver = self.driver().await?;
        let found = driver
            .find_all(by(locator))
            .await
            .map_err(|err| driver_error(&err))?;
        let Some(element) = found.first() else {
            return Ok(None);
        };
        // The page may re-render between lookup and query.
        let (Ok(displayed), Ok(enabled)) = (element.is_displayed().await, element.is_enabled().await)
        else {
            return Ok(None);
        };
        Ok(Some(ElementState { displayed, enabled }))
    }

    async fn click(&self, locator: &Locator) -> Result<(), DomError> {
        let element = self.find(locator).await?;
        element.click().await.map_err(|err| click_error(locator, &err))
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DomError> {
        let element = self.find(locator).await?;
        element.clear().await.map_err(|err| driver_error(&err))?;
        element.send_keys(text).await.map_err(|err| driver_error(&err))
    }

    async fn text(&self, locator: &Locator) -> Result<String, DomError> {
        let element = self.find(locator).await?;
        element.text().await.map_err(|err| driver_error(&err))
    }

    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>, DomError> {
        let element = self.find(locator).await?;
        let options = element
            .find_all(By::Tag("option"))
            .await
            .map_err(|err| driver_error(&err))?;

        let mut collected = Vec::with_capacity(options.len());
        for option in options {
            let value = option.value().await.map_err(|err| driver_error(&err))?;
            let text = option.text().await.map_err(|err| driver_error(&err))?;
            collected.push(SelectOption {
                value: value.unwrap_or_default(),
                text,
            });
        }
        Ok(collected)
    }

    async fn select_by_value(&self, locator: &Locator, value: &str) -> Result<(), DomError> {
        let element = self.find(locator).await?;
        let select = SelectElement::new(&element)
            .await
            .map_err(|err| driver_error(&err))?;
        select
            .select_by_value(value)
            .await
            .map_err(|err| driver_error(&err))
    }

    async fn page_source(&self) -> Result<String, DomError> {
        let driver = self.driver().await?;
        driver.source().await.map_err(|err| driver_error(&err))
    }

    async fn close(&self) -> Result<(), DomError> {
        let Some(driver) = self.driver.lock().await.take() else {
            return Ok(());
        };
        driver.quit().await.map_err(|err| driver_error(&err))
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let Some(driver) = self.driver.get_mut().take() else {
            return;
        };
        warn!("browser session dropped without close, quitting in background");
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = driver.quit().await {
                    warn!(error = %err, "background quit failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use thirtyfour::error::WebDriverErrorInfo;

    use super::*;

    #[test]
    fn intercepted_click_maps_to_its_own_error() {
        let locator = Locator::id("searchBy_radio_1");

        let intercepted = WebDriverError::ElementClickIntercepted(WebDriverErrorInfo::new(
            "element click intercepted: other element would receive the click".to_owned(),
        ));
        assert!(matches!(
            click_error(&locator, &intercepted),
            DomError::ClickIntercepted(ref target) if *target == locator
        ));

        let missing = WebDriverError::NoSuchElement(WebDriverErrorInfo::new(
            "no such element: click was intercepted earlier".to_owned(),
        ));
        assert!(matches!(click_error(&locator, &missing), DomError::Driver(_)));
    }

    #[test]
    fn chrome_args_include_window_and_user_agent() {
        let config = BrowserConfig {
            window_width: 800,
            window_height: 600,
            user_agent: "binday-test".to_owned(),
            ..BrowserConfig::default()
        };
        let args = config.chrome_args();
        assert!(args.contains(&"--headless=new".to_owned()));
        assert!(args.contains(&"--no-sandbox".to_owned()));
        assert!(args.contains(&"--window-size=800,600".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("--user-agent=binday-test"));
        assert!(!args.iter().any(|arg| arg.starts_with("--remote-debugging-port")));
    }

    #[test]
    fn status_url_tolerates_trailing_slash() {
        let config = BrowserConfig {
            webdriver_url: "http://driver:4444/".to_owned(),
            ..BrowserConfig::default()
        };
        assert_eq!(config.status_url(), "http://driver:4444/status");
    }

    #[test]
    fn status_response_parses_readiness() {
        let ready: StatusResponse =
            serde_json::from_str(r#"{"value": {"ready": true, "message": "ChromeDriver ready for new sessions."}}"#)
                .expect("valid status");
        assert!(ready.value.ready);

        let busy: StatusResponse =
            serde_json::from_str(r#"{"value": {"message": "busy"}}"#).expect("valid status");
        assert!(!busy.value.ready);
        assert_eq!(busy.value.message, "busy");
    }

    #[tokio::test]
    async fn unreachable_webdriver_is_a_launch_failure() {
        let launcher = ChromeLauncher::new(
            Client::new(),
            BrowserConfig {
                webdriver_url: "http://127.0.0.1:9".to_owned(),
                status_timeout_ms: 500,
                ..BrowserConfig::default()
            },
        );
        let result = launcher.launch().await;
        assert!(matches!(result, Err(ScrapeError::SessionLaunch(_))));
    }
}
