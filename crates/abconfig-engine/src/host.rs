//! Host collaborators
//!
//! The engine never touches process globals. Session state, the site's
//! configuration surface, the outbound header stream and the error log are
//! all reached through the traits below, bundled per call in [`Host`].
//! In-memory implementations are provided for tests, the CLI and hosts that
//! keep this state themselves.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-session key/value state
pub trait SessionStore {
    /// Whether the key has ever been set
    fn has(&self, key: &str) -> bool;

    /// Stored value
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value, replacing any previous one
    fn set(&mut self, key: &str, value: String);
}

/// Global configuration surface with static-configuration precedence
pub trait ConfigStore {
    /// Current value of a setting
    fn get(&self, name: &str) -> Option<String>;

    /// Whether the setting was fixed by static configuration
    fn is_fixed(&self, name: &str) -> bool;

    /// Set a value and mark it fixed
    fn set(&mut self, name: &str, value: &str);

    /// Current forced value of a plugin setting
    fn forced_plugin_setting(&self, plugin: &str, name: &str) -> Option<String>;

    /// Force a plugin setting
    fn set_forced_plugin_setting(&mut self, plugin: &str, name: &str, value: &str);
}

/// Outbound HTTP header stream
pub trait HeaderEmitter {
    /// Emit one header
    ///
    /// # Errors
    /// Returns [`EngineError::HeadersAlreadySent`] once headers are sent
    fn emit(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Process error log
pub trait LogSink {
    /// Non-fatal engine warning
    fn warn(&mut self, message: &str);

    /// Line written by an `error_log` command
    fn error_log(&mut self, message: &str);
}

/// Collaborators handed to a hook for one call
pub struct Host<'a> {
    /// Session state
    pub session: &'a mut dyn SessionStore,
    /// Site configuration
    pub config: &'a mut dyn ConfigStore,
    /// Header stream
    pub headers: &'a mut dyn HeaderEmitter,
    /// Error log
    pub log: &'a mut dyn LogSink,
}

impl std::fmt::Debug for Host<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

/// Session state kept in a map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemorySession {
    values: BTreeMap<String, String>,
}

impl MemorySession {
    /// Create empty session
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored pair
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl SessionStore for MemorySession {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// Site configuration loaded from a file
///
/// ```yaml
/// values:
///   theme: boost
/// fixed:
///   debug: "0"
///   debug_allow_abconfig: "1"
/// forced_plugin_settings:
///   auth_saml:
///     debug: "0"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Runtime values
    pub values: BTreeMap<String, String>,
    /// Values fixed by the static config file
    pub fixed: BTreeMap<String, String>,
    /// Forced settings, plugin then setting name
    pub forced_plugin_settings: BTreeMap<String, BTreeMap<String, String>>,
}

impl SiteConfig {
    /// Create empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML
    ///
    /// # Errors
    /// Returns [`EngineError::Settings`] on invalid YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| EngineError::settings(e.to_string()))
    }

    /// Builder: fix a value as if set by the static config file
    #[must_use]
    pub fn with_fixed(mut self, name: &str, value: &str) -> Self {
        self.fixed.insert(name.to_string(), value.to_string());
        self
    }

    /// Builder: set a runtime value
    #[must_use]
    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Builder: force a plugin setting
    #[must_use]
    pub fn with_forced(mut self, plugin: &str, name: &str, value: &str) -> Self {
        self.forced_plugin_settings
            .entry(plugin.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        self
    }
}

impl ConfigStore for SiteConfig {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).or_else(|| self.fixed.get(name)).cloned()
    }

    fn is_fixed(&self, name: &str) -> bool {
        self.fixed.contains_key(name)
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
        self.fixed.insert(name.to_string(), value.to_string());
    }

    fn forced_plugin_setting(&self, plugin: &str, name: &str) -> Option<String> {
        self.forced_plugin_settings.get(plugin)?.get(name).cloned()
    }

    fn set_forced_plugin_setting(&mut self, plugin: &str, name: &str, value: &str) {
        self.forced_plugin_settings
            .entry(plugin.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }
}

/// Headers buffered until the response is flushed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedHeaders {
    headers: Vec<(String, String)>,
    sent: bool,
}

impl BufferedHeaders {
    /// Create empty buffer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered headers in emission order
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Value of the first header with this name, case-insensitive
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Flush: later emits fail
    pub fn send(&mut self) -> Vec<(String, String)> {
        self.sent = true;
        std::mem::take(&mut self.headers)
    }
}

impl HeaderEmitter for BufferedHeaders {
    fn emit(&mut self, name: &str, value: &str) -> Result<()> {
        if self.sent {
            return Err(EngineError::HeadersAlreadySent(name.to_string()));
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Log sink forwarding to `tracing` under target `abconfig`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn warn(&mut self, message: &str) {
        tracing::warn!(target: "abconfig", "{message}");
    }

    fn error_log(&mut self, message: &str) {
        tracing::error!(target: "abconfig", "{message}");
    }
}

/// Log sink keeping lines in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLog {
    /// Warnings in order
    pub warnings: Vec<String>,
    /// `error_log` lines in order
    pub errors: Vec<String>,
}

impl MemoryLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemoryLog {
    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    fn error_log(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
