//! Runtime configuration.
//!
//! The data half of [`Config`] deserializes from JSON (camelCase keys, every
//! field optional). Handlers and custom merge strategies are code-only and are
//! attached with the builder methods.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HookError, Result};
use crate::instance::ComponentInstance;

/// Receives `(message, instance, component trace)` in place of the default log sink.
pub type WarnHandler = Rc<dyn Fn(&str, Option<&ComponentInstance>, &str)>;
/// Receives `(error, instance, info)` for every user-code error that was not captured.
pub type ErrorHandler = Rc<dyn Fn(&HookError, Option<&ComponentInstance>, &str)>;
/// Merges a custom option: `(parent value, child value) -> merged value`.
pub type MergeStrategyFn = Rc<dyn Fn(Option<&Value>, Option<&Value>) -> Result<Option<Value>>>;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Suppress every advisory warning.
    pub silent: bool,
    /// Production mode: no dev warnings, no debug render proxy.
    pub production: bool,
    /// Record init/compile timings.
    pub performance: bool,
    /// Custom element tags rendered as plain elements without an "unknown element" warning.
    pub ignored_elements: Vec<String>,
    #[serde(skip)]
    pub warn_handler: Option<WarnHandler>,
    #[serde(skip)]
    pub error_handler: Option<ErrorHandler>,
    #[serde(skip)]
    pub option_merge_strategies: HashMap<String, MergeStrategyFn>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn production() -> Self {
        Self {
            production: true,
            ..Default::default()
        }
    }

    pub fn with_warn_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, Option<&ComponentInstance>, &str) + 'static,
    {
        self.warn_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HookError, Option<&ComponentInstance>, &str) + 'static,
    {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_merge_strategy<F>(mut self, key: impl Into<String>, strategy: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Result<Option<Value>> + 'static,
    {
        self.option_merge_strategies
            .insert(key.into(), Rc::new(strategy));
        self
    }

    pub fn is_ignored_element(&self, tag: &str) -> bool {
        self.ignored_elements.iter().any(|ignored| ignored == tag)
    }

    /// Dev-only diagnostics (debug proxy, performance marks) are active.
    pub fn dev_mode(&self) -> bool {
        !self.production
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut strategies: Vec<&String> = self.option_merge_strategies.keys().collect();
        strategies.sort();
        f.debug_struct("Config")
            .field("silent", &self.silent)
            .field("production", &self.production)
            .field("performance", &self.performance)
            .field("ignored_elements", &self.ignored_elements)
            .field("has_warn_handler", &self.warn_handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .field("option_merge_strategies", &strategies)
            .finish()
    }
}
