//! Runtime configuration.
//!
//! A [`Config`] is fixed when the guest runtime starts. It can be built in
//! code, parsed from JSON, or read from `CROSSHEAP_*` environment variables.

use std::env;

use serde::{Deserialize, Serialize};

use crate::{error::BridgeError, runtime::gc::guest_heap::DEFAULT_GC_THRESHOLD};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Allocations between threshold-triggered collections.
    pub gc_threshold: usize,
    /// Threshold-triggered collection on/off. Explicit collections still run.
    pub gc_enabled: bool,
    /// Collect before every guest allocation. Slow; surfaces missing
    /// protection immediately.
    pub gc_torture: bool,
    /// Log every job the guest worker runs.
    pub trace: bool,
    /// Thread name of the guest worker.
    pub worker_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            gc_torture: false,
            trace: false,
            worker_name: "crossheap-guest".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// - `CROSSHEAP_GC_THRESHOLD=<n>`
    /// - `CROSSHEAP_NO_GC=1`
    /// - `CROSSHEAP_GC_TORTURE=1`
    /// - `CROSSHEAP_TRACE=1`
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let mut config = Config::default();
        if let Some(raw) = lookup("CROSSHEAP_GC_THRESHOLD") {
            config.gc_threshold = raw.trim().parse().map_err(|_| {
                BridgeError::Config(format!(
                    "CROSSHEAP_GC_THRESHOLD expects a positive integer, got `{}`",
                    raw
                ))
            })?;
        }
        if lookup("CROSSHEAP_NO_GC").is_some_and(|v| is_truthy(&v)) {
            config.gc_enabled = false;
        }
        if lookup("CROSSHEAP_GC_TORTURE").is_some_and(|v| is_truthy(&v)) {
            config.gc_torture = true;
        }
        if lookup("CROSSHEAP_TRACE").is_some_and(|v| is_truthy(&v)) {
            config.trace = true;
        }
        config.validate()
    }

    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold;
        self
    }

    pub fn with_gc_torture(mut self, torture: bool) -> Self {
        self.gc_torture = torture;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    fn validate(self) -> Result<Self, BridgeError> {
        if self.gc_threshold == 0 {
            return Err(BridgeError::Config(
                "gc_threshold must be at least 1".to_string(),
            ));
        }
        if self.worker_name.is_empty() {
            return Err(BridgeError::Config(
                "worker_name must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
