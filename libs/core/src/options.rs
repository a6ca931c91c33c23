use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Construction-time configuration shared by callers and callees
///
/// Unknown keys are ignored when deserializing. Proxies and dispatchers keep
/// their options behind an `Arc` and never hand out a mutable reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    catch_errors: bool,
    function_names: Vec<String>,
    time_calls: bool,
    announce_functions: bool,
    call_timeout_ms: Option<u64>,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Parse options from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Turn failures raised while invoking an operation into error responses
    pub fn catch_errors(&self) -> bool {
        self.catch_errors
    }

    /// Operation names to build stubs for up front
    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    /// Report the duration of every call through `tracing`
    pub fn time_calls(&self) -> bool {
        self.time_calls
    }

    /// Publish the registered operation names when a dispatcher starts
    pub fn announce_functions(&self) -> bool {
        self.announce_functions
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for [`Options`]
#[derive(Debug, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catch_errors(mut self, enabled: bool) -> Self {
        self.options.catch_errors = enabled;
        self
    }

    pub fn function_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.function_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn time_calls(mut self, enabled: bool) -> Self {
        self.options.time_calls = enabled;
        self
    }

    pub fn announce_functions(mut self, enabled: bool) -> Self {
        self.options.announce_functions = enabled;
        self
    }

    /// Give every call a deadline, counted from when it is sent
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.options.call_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}
