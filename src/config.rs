//! Injector configuration.
//!
//! Defaults match what most applications want; every field can be
//! overridden in code, from `FERROUS_LAZY_*` environment variables, or
//! (with the `config` feature) from JSON.

use std::env;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

const ENV_PREFIX: &str = "FERROUS_LAZY";

/// Runtime knobs for an [`Injector`](crate::Injector).
///
/// # Examples
///
/// ```
/// use ferrous_lazy::InjectorConfig;
/// use std::time::Duration;
///
/// let config = InjectorConfig::default()
///     .with_cache_component_scope(true)
///     .with_poll_interval(Duration::from_millis(5));
///
/// assert!(config.cache_component_scope);
/// assert!(config.allow_anonymous);
/// assert_eq!(config.poll_interval(), Duration::from_millis(5));
/// assert_eq!(config.poll_ceiling(), Duration::from_millis(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InjectorConfig {
    /// Cache `Component`-singletons per component scope. Off by default:
    /// component-level singletons are rebuilt on every resolution.
    pub cache_component_scope: bool,
    /// Construct types that have no binding and no singleton declaration,
    /// as long as a constructor is registered for them.
    pub allow_anonymous: bool,
    /// Validate the redirect graph and the declarations at build time.
    pub strict: bool,
    /// How often a background thread re-checks the cache for an external
    /// instance that has not been announced yet.
    pub poll_interval_ms: u64,
    /// How long a background thread waits for an external instance overall.
    pub poll_ceiling_ms: u64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            cache_component_scope: false,
            allow_anonymous: true,
            strict: true,
            poll_interval_ms: 20,
            poll_ceiling_ms: 1000,
        }
    }
}

impl InjectorConfig {
    pub fn with_cache_component_scope(mut self, enabled: bool) -> Self {
        self.cache_component_scope = enabled;
        self
    }

    pub fn with_allow_anonymous(mut self, enabled: bool) -> Self {
        self.allow_anonymous = enabled;
        self
    }

    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_poll_ceiling(mut self, ceiling: Duration) -> Self {
        self.poll_ceiling_ms = ceiling.as_millis() as u64;
        self
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[inline]
    pub fn poll_ceiling(&self) -> Duration {
        Duration::from_millis(self.poll_ceiling_ms)
    }

    /// Defaults overridden by whatever `FERROUS_LAZY_*` variables are set.
    ///
    /// Recognised: `FERROUS_LAZY_CACHE_COMPONENT_SCOPE`,
    /// `FERROUS_LAZY_ALLOW_ANONYMOUS`, `FERROUS_LAZY_STRICT`,
    /// `FERROUS_LAZY_POLL_INTERVAL_MS`, `FERROUS_LAZY_POLL_CEILING_MS`.
    pub fn from_env() -> DiResult<Self> {
        Self::default().overlay(|name| env::var(format!("{}_{}", ENV_PREFIX, name)).ok())
    }

    /// Applies overrides from `lookup`, which maps an upper-case field name
    /// (without prefix) to its raw value.
    pub(crate) fn overlay<F>(mut self, lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CACHE_COMPONENT_SCOPE") {
            self.cache_component_scope = parse_bool(&raw, "CACHE_COMPONENT_SCOPE must be a boolean")?;
        }
        if let Some(raw) = lookup("ALLOW_ANONYMOUS") {
            self.allow_anonymous = parse_bool(&raw, "ALLOW_ANONYMOUS must be a boolean")?;
        }
        if let Some(raw) = lookup("STRICT") {
            self.strict = parse_bool(&raw, "STRICT must be a boolean")?;
        }
        if let Some(raw) = lookup("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_ms(&raw, "POLL_INTERVAL_MS must be a non-negative integer")?;
        }
        if let Some(raw) = lookup("POLL_CEILING_MS") {
            self.poll_ceiling_ms = parse_ms(&raw, "POLL_CEILING_MS must be a non-negative integer")?;
        }
        Ok(self)
    }

    /// Parses a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Bind(format!("invalid injector config: {}", e)))
    }
}

fn parse_bool(raw: &str, message: &'static str) -> DiResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DiError::TypeMismatch(message)),
    }
}

fn parse_ms(raw: &str, message: &'static str) -> DiResult<u64> {
    raw.trim().parse::<u64>().map_err(|_| DiError::TypeMismatch(message))
}
