//! Scripted stand-in for the council website, used by unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{BrowserSession, DomError, ElementState, Locator, SelectOption, SessionLauncher};
use crate::form::{FormConfig, FormSelectors};
use crate::ports::ScrapeError;

pub(crate) fn form_config() -> FormConfig {
    FormConfig {
        url: "https://bins.example/find".to_owned(),
        selectors: FormSelectors {
            cookie_accept: Locator::id("cookie-accept"),
            postcode_mode: Locator::id("searchBy_radio_1"),
            postcode_input: Locator::id("Postcode_textbox"),
            search_button: Locator::name("search"),
            address_list: Locator::name("addresses"),
            select_button: Locator::name("select"),
            error_message: Locator::id("lblError"),
            results_grid: "#ItemsGrid".to_owned(),
        },
        not_recognised_marker: "not recognised".to_owned(),
        placeholder_marker: "select the".to_owned(),
        wait_timeout_ms: 10_000,
        poll_interval_ms: 250,
    }
}

/// How the fake site behaves.
#[derive(Debug, Clone)]
pub(crate) struct SiteScript {
    pub(crate) ready_after_polls: u32,
    pub(crate) never_ready: bool,
    pub(crate) hang_on_navigate: bool,
    pub(crate) hang_on_close: bool,
    pub(crate) cookie_banner: bool,
    pub(crate) cookie_banner_broken: bool,
    pub(crate) intercept_clicks: bool,
    pub(crate) input_never_enabled: bool,
    pub(crate) postcode_known: bool,
    pub(crate) postcode_result_never_renders: bool,
    pub(crate) addresses: Vec<(String, String)>,
    pub(crate) results_error: Option<String>,
    pub(crate) results_rendered: bool,
}

impl Default for SiteScript {
    fn default() -> Self {
        Self {
            ready_after_polls: 0,
            never_ready: false,
            hang_on_navigate: false,
            hang_on_close: false,
            cookie_banner: false,
            cookie_banner_broken: false,
            intercept_clicks: false,
            input_never_enabled: false,
            postcode_known: true,
            postcode_result_never_renders: false,
            addresses: vec![
                ("addr-1".to_owned(), "1 Main Street, Belfast".to_owned()),
                ("addr-3".to_owned(), "3 Main Street, Belfast".to_owned()),
                ("addr-5".to_owned(), "5 Main Street, Belfast".to_owned()),
            ],
            results_error: None,
            results_rendered: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Blank,
    Loading,
    Search,
    PostcodeMode,
    UnknownPostcode,
    AddressList,
    ResultsPending,
    Results,
    Error,
}

#[derive(Debug)]
struct SiteState {
    phase: Phase,
    ready_polls: u32,
    cookie_visible: bool,
    filled: Option<String>,
    selected: Option<String>,
    script_clicks: u32,
    closes: u32,
}

/// Fake browser session; clones share the same page state.
#[derive(Clone)]
pub(crate) struct FakeSite {
    script: Arc<SiteScript>,
    selectors: Arc<FormSelectors>,
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub(crate) fn new(script: SiteScript) -> Self {
        let cookie_visible = script.cookie_banner;
        Self {
            script: Arc::new(script),
            selectors: Arc::new(form_config().selectors),
            state: Arc::new(Mutex::new(SiteState {
                phase: Phase::Blank,
                ready_polls: 0,
                cookie_visible,
                filled: None,
                selected: None,
                script_clicks: 0,
                closes: 0,
            })),
        }
    }

    pub(crate) fn filled_postcode(&self) -> Option<String> {
        self.state().filled.clone()
    }

    pub(crate) fn selected_value(&self) -> Option<String> {
        self.state().selected.clone()
    }

    pub(crate) fn script_clicks(&self) -> u32 {
        self.state().script_clicks
    }

    pub(crate) fn closes(&self) -> u32 {
        self.state().closes
    }

    fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().expect("fake site lock")
    }

    fn activate(&self, locator: &Locator) -> Result<(), DomError> {
        let selectors = &self.selectors;
        let mut state = self.state();

        if *locator == selectors.cookie_accept && state.cookie_visible {
            state.cookie_visible = false;
        } else if *locator == selectors.postcode_mode && state.phase == Phase::Search {
            state.phase = Phase::PostcodeMode;
        } else if *locator == selectors.search_button
            && state.phase == Phase::PostcodeMode
            && state.filled.is_some()
        {
            state.phase = if self.script.postcode_result_never_renders {
                Phase::PostcodeMode
            } else if self.script.postcode_known {
                Phase::AddressList
            } else {
                Phase::UnknownPostcode
            };
        } else if *locator == selectors.select_button
            && state.phase == Phase::AddressList
            && state.selected.is_some()
        {
            state.phase = if self.script.results_error.is_some() {
                Phase::Error
            } else if self.script.results_rendered {
                Phase::Results
            } else {
                Phase::ResultsPending
            };
        } else {
            return Err(DomError::NotFound(locator.clone()));
        }
        Ok(())
    }

    fn render(&self) -> String {
        let phase = self.state().phase;
        let body = match phase {
            Phase::UnknownPostcode => {
                "<p>The postcode you entered was not recognised.</p>".to_owned()
            }
            Phase::ResultsPending => {
                "<table id=\"ItemsGrid\"><tr><th>Bin</th><th>Date</th></tr></table>".to_owned()
            }
            Phase::Results => "<table id=\"ItemsGrid\">\
                 <tr><th>Bin</th><th>Date</th></tr>\
                 <tr><td>General Waste</td><td>Tuesday, 20 October 2026</td></tr>\
                 <tr><td>Food Waste</td><td>Friday, 23 October 2026</td></tr>\
                 </table>"
                .to_owned(),
            Phase::Error => format!(
                "<span id=\"lblError\">{}</span>",
                self.script.results_error.clone().unwrap_or_default()
            ),
            _ => "<p>Find your bin collection day</p>".to_owned(),
        };
        format!("<html><body>{body}</body></html>")
    }
}

#[async_trait]
impl BrowserSession for FakeSite {
    async fn navigate(&self, _url: &str) -> Result<(), DomError> {
        if self.script.hang_on_navigate {
            std::future::pending::<()>().await;
        }
        let mut state = self.state();
        state.phase = Phase::Loading;
        state.ready_polls = 0;
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        target: Option<&Locator>,
    ) -> Result<Value, DomError> {
        if script.contains("readyState") {
            let mut state = self.state();
            if self.script.never_ready {
                return Ok(Value::from("loading"));
            }
            state.ready_polls += 1;
            if state.ready_polls <= self.script.ready_after_polls {
                return Ok(Value::from("interactive"));
            }
            if state.phase == Phase::Loading {
                state.phase = Phase::Search;
            }
            return Ok(Value::from("complete"));
        }

        if script.contains("click()") {
            let locator = target.ok_or_else(|| DomError::Script("click without target".to_owned()))?;
            self.state().script_clicks += 1;
            self.activate(locator)?;
            return Ok(Value::Null);
        }

        Err(DomError::Script(format!("unsupported script: {script}")))
    }

    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>, DomError> {
        let selectors = &self.selectors;
        let state = self.state();
        let shown = ElementState {
            displayed: true,
            enabled: true,
        };

        let element = if *locator == selectors.cookie_accept {
            state.cookie_visible.then_some(shown)
        } else if *locator == selectors.postcode_mode {
            matches!(state.phase, Phase::Search | Phase::PostcodeMode).then_some(shown)
        } else if *locator == selectors.postcode_input {
            match state.phase {
                Phase::Search => Some(ElementState::default()),
                Phase::PostcodeMode if self.script.input_never_enabled => {
                    Some(ElementState::default())
                }
                Phase::PostcodeMode => Some(shown),
                _ => None,
            }
        } else if *locator == selectors.address_list {
            (state.phase == Phase::AddressList).then_some(shown)
        } else if *locator == selectors.error_message {
            (state.phase == Phase::Error).then_some(shown)
        } else {
            None
        };
        Ok(element)
    }

    async fn click(&self, locator: &Locator) -> Result<(), DomError> {
        if *locator == self.selectors.cookie_accept {
            if self.script.cookie_banner_broken {
                return Err(DomError::Driver("stale element reference".to_owned()));
            }
            return self.activate(locator);
        }
        if self.script.intercept_clicks {
            return Err(DomError::ClickIntercepted(locator.clone()));
        }
        self.activate(locator)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DomError> {
        let mut state = self.state();
        if *locator != self.selectors.postcode_input || state.phase != Phase::PostcodeMode {
            return Err(DomError::NotFound(locator.clone()));
        }
        state.filled = Some(text.to_owned());
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> Result<String, DomError> {
        let state = self.state();
        if *locator == self.selectors.error_message && state.phase == Phase::Error {
            return Ok(self.script.results_error.clone().unwrap_or_default());
        }
        Err(DomError::NotFound(locator.clone()))
    }

    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>, DomError> {
        let state = self.state();
        if *locator != self.selectors.address_list || state.phase != Phase::AddressList {
            return Err(DomError::NotFound(locator.clone()));
        }
        let postcode = state.filled.clone().unwrap_or_default();
        let prompt = format!("Select the {postcode} address from the list.");
        let mut options = vec![SelectOption {
            value: prompt.clone(),
            text: prompt,
        }];
        options.extend(self.script.addresses.iter().map(|(value, text)| SelectOption {
            value: value.clone(),
            text: text.clone(),
        }));
        Ok(options)
    }

    async fn select_by_value(&self, locator: &Locator, value: &str) -> Result<(), DomError> {
        let known = self
            .script
            .addresses
            .iter()
            .any(|(candidate, _text)| candidate == value);
        let mut state = self.state();
        if *locator != self.selectors.address_list || state.phase != Phase::AddressList || !known {
            return Err(DomError::NotFound(locator.clone()));
        }
        state.selected = Some(value.to_owned());
        Ok(())
    }

    async fn page_source(&self) -> Result<String, DomError> {
        Ok(self.render())
    }

    async fn close(&self) -> Result<(), DomError> {
        self.state().closes += 1;
        if self.script.hang_on_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

enum LaunchMode {
    Site(FakeSite),
    Broken,
    Hanging,
}

/// Launcher handing out the same fake site, failing, or never answering.
pub(crate) struct FakeLauncher {
    mode: LaunchMode,
    launches: AtomicU32,
}

impl FakeLauncher {
    fn with_mode(mode: LaunchMode) -> Self {
        Self {
            mode,
            launches: AtomicU32::new(0),
        }
    }

    pub(crate) fn new(site: FakeSite) -> Self {
        Self::with_mode(LaunchMode::Site(site))
    }

    pub(crate) fn broken() -> Self {
        Self::with_mode(LaunchMode::Broken)
    }

    pub(crate) fn hanging() -> Self {
        Self::with_mode(LaunchMode::Hanging)
    }

    pub(crate) fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            LaunchMode::Site(site) => Ok(Box::new(site.clone())),
            LaunchMode::Broken => Err(ScrapeError::SessionLaunch(
                "chromedriver not reachable".to_owned(),
            )),
            LaunchMode::Hanging => std::future::pending().await,
        }
    }
}
