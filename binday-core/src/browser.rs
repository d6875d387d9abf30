//! Minimal browser capability set the form automation is written against.
//!
//! Every operation takes a [`Locator`] instead of a held element reference:
//! the council form posts back and re-renders the whole page after most
//! actions, so anything located before an action is stale afterwards.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::ScrapeError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// How to find an element on the current page.
pub enum Locator {
    /// Element `id` attribute.
    Id(String),
    /// Form control `name` attribute.
    Name(String),
    /// CSS selector.
    Css(String),
}

impl Locator {
    /// Locate by `id`.
    #[must_use]
    pub fn id<S: Into<String>>(id: S) -> Self {
        Locator::Id(id.into())
    }

    /// Locate by `name`.
    #[must_use]
    pub fn name<S: Into<String>>(name: S) -> Self {
        Locator::Name(name.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(formatter, "#{id}"),
            Locator::Name(name) => write!(formatter, "[name=\"{name}\"]"),
            Locator::Css(selector) => write!(formatter, "{selector}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Observable state of a located element.
pub struct ElementState {
    /// Element is rendered and visible.
    pub displayed: bool,
    /// Element accepts input.
    pub enabled: bool,
}

impl ElementState {
    /// Visible and enabled.
    #[must_use]
    pub fn is_interactable(self) -> bool {
        self.displayed && self.enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One `<option>` of a `<select>` control.
pub struct SelectOption {
    /// Submitted value.
    pub value: String,
    /// Visible text.
    pub text: String,
}

#[derive(thiserror::Error, Debug)]
/// Failures of individual browser commands.
pub enum DomError {
    /// Nothing on the page matches the locator.
    #[error("Element not found: {0}")]
    NotFound(Locator),
    /// Another element, usually an overlay, received the click.
    #[error("Click on {0} was intercepted")]
    ClickIntercepted(Locator),
    /// Script evaluation failed or returned an unexpected value.
    #[error("Script error: {0}")]
    Script(String),
    /// Transport or driver-level failure.
    #[error("Driver error: {0}")]
    Driver(String),
}

#[async_trait]
/// A live browser session.
pub trait BrowserSession: Send + Sync {
    /// Load a URL in the current tab.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when navigation fails.
    async fn navigate(&self, url: &str) -> Result<(), DomError>;

    /// Run a script, optionally passing the located element as `arguments[0]`.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the element is missing or the script throws.
    async fn execute_script(&self, script: &str, target: Option<&Locator>)
    -> Result<Value, DomError>;

    /// State of the first matching element, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the driver cannot be queried.
    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>, DomError>;

    /// Simulated pointer click on the first matching element.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::ClickIntercepted`] when an overlay takes the click.
    async fn click(&self, locator: &Locator) -> Result<(), DomError>;

    /// Replace the content of an input.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the element is missing or not editable.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DomError>;

    /// Visible text of the first matching element.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the element is missing.
    async fn text(&self, locator: &Locator) -> Result<String, DomError>;

    /// Options of a `<select>` control in document order.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the control is missing.
    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>, DomError>;

    /// Select the option with the given value.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the control or the option is missing.
    async fn select_by_value(&self, locator: &Locator, value: &str) -> Result<(), DomError>;

    /// Serialized DOM of the current page.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the driver cannot be queried.
    async fn page_source(&self) -> Result<String, DomError>;

    /// End the session and release the browser process.
    ///
    /// # Errors
    ///
    /// Returns a [`DomError`] when the driver refuses to quit.
    async fn close(&self) -> Result<(), DomError>;
}

#[async_trait]
/// Starts browser sessions.
pub trait SessionLauncher: Send + Sync {
    /// Start a fresh session. Sessions are never shared or reused.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::SessionLaunch`] when no browser could be started.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}
