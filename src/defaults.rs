//! Default mocks served when no setup matches a request.
//!
//! Defaults are an ordered list of URI patterns, loaded from a YAML book at
//! start-up. The first pattern that matches the normalized URI answers; a
//! matching default may also fire a callback some time after the response.

use std::{fs, path::Path, sync::Arc, time::Duration};

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::MockError;
use crate::model::MockEntry;
use crate::parser::Payload;
use crate::store::{KeyValueStore, Space, StoredValue};

/// Errors that can occur when loading a default mock book.
#[derive(Debug, Error)]
pub enum DefaultsError {
    /// I/O error while reading the book.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A route pattern is not a valid regular expression.
    #[error("regex: {0}")]
    Regex(#[from] regex::Error),
    /// A callback delay is not a valid duration.
    #[error("duration: {0}")]
    Duration(#[from] humantime::DurationError),
    /// A record callback targets a built-in store space.
    #[error("callback space {0} is reserved")]
    ReservedSpace(String),
}

/// Errors raised by a callback task. They are logged, never returned.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("request to {uri} carried no payload to record")]
    MissingPayload { uri: String },
}

/// A YAML book of default mocks.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct DefaultMockBook {
    /// Schema version of the book.
    pub version: Option<u8>,
    /// Global callback settings.
    #[serde(default)]
    pub callbacks: CallbackSettings,
    /// Routes in matching order.
    #[serde(default)]
    pub routes: Vec<DefaultRoute>,
}

/// Global callback switch and delay range.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct CallbackSettings {
    /// Callbacks only fire when switched on.
    #[serde(default)]
    pub enabled: bool,
    /// Lower bound of the random delay, e.g. `100ms`.
    pub min_delay: Option<String>,
    /// Upper bound of the random delay, e.g. `2s`.
    pub max_delay: Option<String>,
}

/// One default route of the book.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefaultRoute {
    /// Regular expression matched against the whole normalized URI.
    pub uri: String,
    /// Response to serve.
    #[serde(default)]
    pub respond: MockEntry,
    /// Serve the request payload back as the response body.
    #[serde(default)]
    pub echo: bool,
    /// Callback fired after the response.
    pub callback: Option<CallbackAction>,
}

/// What a callback does once its delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CallbackAction {
    /// Push the request payload on a list in the named store space, keyed by URI.
    Record { space: String },
    /// Only log the call.
    Log,
}

impl CallbackAction {
    fn run(&self, store: &dyn KeyValueStore, uri: &str, payload: Option<StoredValue>) -> Result<(), CallbackError> {
        match self {
            Self::Record { space } => {
                let payload =
                    payload.ok_or_else(|| CallbackError::MissingPayload { uri: uri.to_string() })?;
                store.push_list(&Space::Custom(space.clone()), uri, payload);
                debug!(space = %space, uri = %uri, "callback recorded payload");
            }
            Self::Log => info!(uri = %uri, "default mock callback fired"),
        }
        Ok(())
    }
}

/// A fire-and-forget action attached to a default mock.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultCallback {
    pub enabled: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub action: CallbackAction,
}

impl DefaultCallback {
    /// Random delay within the configured range.
    pub fn pick_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

/// A synthetic response for requests nobody set up.
pub trait DefaultMock: Send + Sync {
    /// Whether this default answers the normalized URI.
    fn matches(&self, uri: &str) -> bool;

    /// Build the response for a request payload.
    fn respond(&self, payload: Option<&Payload>) -> MockEntry;

    /// Callback to fire after responding, if any.
    fn callback(&self) -> Option<&DefaultCallback>;
}

/// Default mock matching a URI regular expression.
#[derive(Debug, Clone)]
pub struct PatternMock {
    pattern: Regex,
    entry: MockEntry,
    echo: bool,
    callback: Option<DefaultCallback>,
}

impl PatternMock {
    /// Create a default answering every URI fully matched by `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `regex::Error` if the pattern does not compile.
    pub fn new(pattern: &str, entry: MockEntry) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { pattern, entry, echo: false, callback: None })
    }

    /// Serve the request payload as the body.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Attach a callback.
    pub fn with_callback(mut self, callback: DefaultCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl DefaultMock for PatternMock {
    fn matches(&self, uri: &str) -> bool {
        self.pattern.is_match(uri)
    }

    fn respond(&self, payload: Option<&Payload>) -> MockEntry {
        let mut entry = self.entry.clone();
        if self.echo {
            if let Some(payload) = payload {
                entry.response_body = payload.to_json();
            }
        }
        entry
    }

    fn callback(&self) -> Option<&DefaultCallback> {
        self.callback.as_ref()
    }
}

impl DefaultMockBook {
    /// Load a default mock book from a YAML file.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML book
    ///
    /// # Returns
    ///
    /// Returns `Ok(DefaultMockBook)` on success, or `DefaultsError` if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, DefaultsError> {
        let txt = fs::read_to_string(path)?;
        let book: Self = serde_yaml::from_str(&txt)?;
        Ok(book)
    }

    /// Compile the routes into default mocks, in book order.
    ///
    /// # Errors
    ///
    /// Returns `DefaultsError` if a pattern or a delay is invalid, or if a
    /// record callback names a built-in store space.
    pub fn compile(&self) -> Result<Vec<Box<dyn DefaultMock>>, DefaultsError> {
        let min_delay = parse_delay(self.callbacks.min_delay.as_deref())?;
        let max_delay = parse_delay(self.callbacks.max_delay.as_deref())?.max(min_delay);

        let mut mocks: Vec<Box<dyn DefaultMock>> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            let mut mock = PatternMock::new(&route.uri, route.respond.clone())?.with_echo(route.echo);
            if let Some(action) = &route.callback {
                if let CallbackAction::Record { space } = action {
                    if Space::is_reserved(space) {
                        return Err(DefaultsError::ReservedSpace(space.clone()));
                    }
                }
                mock = mock.with_callback(DefaultCallback {
                    enabled: self.callbacks.enabled,
                    min_delay,
                    max_delay,
                    action: action.clone(),
                });
            }
            mocks.push(Box::new(mock));
        }
        Ok(mocks)
    }
}

fn parse_delay(delay: Option<&str>) -> Result<Duration, DefaultsError> {
    delay.map_or(Ok(Duration::ZERO), |d| Ok(humantime::parse_duration(d)?))
}

/// Ordered registry of default mocks.
#[derive(Clone)]
pub struct DefaultMockProvider {
    mocks: Arc<Vec<Box<dyn DefaultMock>>>,
    store: Arc<dyn KeyValueStore>,
}

impl DefaultMockProvider {
    /// Create a provider from compiled defaults; callbacks write to `store`.
    pub fn new(mocks: Vec<Box<dyn DefaultMock>>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { mocks: Arc::new(mocks), store }
    }

    /// Number of registered defaults.
    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    /// Answer a request nobody set up.
    ///
    /// The first matching default builds the response. Its callback, if
    /// enabled, runs on a detached task after a random delay and never
    /// affects the response.
    ///
    /// # Parameters
    ///
    /// - `uri` - Normalized URI of the request
    /// - `payload` - Request payload, if any
    ///
    /// # Errors
    ///
    /// Returns `MockError::MockNotFound` if no default matches.
    pub fn resolve(&self, uri: &str, payload: Option<&Payload>) -> Result<MockEntry, MockError> {
        let Some(mock) = self.mocks.iter().find(|mock| mock.matches(uri)) else {
            return Err(MockError::MockNotFound { uri: uri.to_string() });
        };
        debug!(uri = %uri, "serving default mock");

        if let Some(callback) = mock.callback().filter(|callback| callback.enabled) {
            self.fire(callback, uri, payload);
        }
        Ok(mock.respond(payload))
    }

    fn fire(&self, callback: &DefaultCallback, uri: &str, payload: Option<&Payload>) {
        let delay = callback.pick_delay();
        let action = callback.action.clone();
        let store = self.store.clone();
        let uri = uri.to_string();
        let payload = payload.map(Payload::to_stored);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = action.run(store.as_ref(), &uri, payload) {
                warn!(error = %e, "default mock callback failed");
            }
        });
    }
}
