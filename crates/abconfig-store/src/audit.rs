//! Config-change audit log
//!
//! When an operator stores a condition, every `CFG` and
//! `forced_plugin_setting` command it carries is recorded as a conditional
//! config change. This happens at authoring time, not when the condition fires.

use abconfig_model::{Command, CommandList};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One conditional config change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLogEntry {
    /// Setting name
    pub name: String,
    /// Previous value; always empty for conditional settings
    pub old_value: String,
    /// Value the condition would apply
    pub value: String,
    /// `core-experiment:<weight>` or `<plugin>-experiment:<weight>`
    pub plugin: String,
    /// Shortname of the owning experiment
    pub experiment: String,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

impl ConfigLogEntry {
    /// Entry for a command, or `None` for verbs that do not touch config
    #[must_use]
    pub fn for_command(command: &Command, experiment: &str, weight: u32) -> Option<Self> {
        let (plugin, name, value) = match command {
            Command::Cfg { name, value } => (format!("core-experiment:{weight}"), name, value),
            Command::ForcedPluginSetting {
                plugin,
                name,
                value,
            } => (format!("{plugin}-experiment:{weight}"), name, value),
            _ => return None,
        };
        Some(Self {
            name: name.clone(),
            old_value: String::new(),
            value: value.clone(),
            plugin,
            experiment: experiment.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Entries for every config-touching command in a list
    ///
    /// Malformed lines are skipped.
    #[must_use]
    pub fn for_commands(commands: &CommandList, experiment: &str, weight: u32) -> Vec<Self> {
        commands
            .parsed()
            .filter_map(|(_, parsed)| parsed.ok())
            .filter_map(|command| Self::for_command(&command, experiment, weight))
            .collect()
    }
}

/// Destination for audit entries
pub trait AuditSink: Send + Sync {
    /// Record one entry
    fn record(&self, entry: ConfigLogEntry);
}

/// Emits audit entries as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: ConfigLogEntry) {
        tracing::info!(
            target: "abconfig::audit",
            name = %entry.name,
            value = %entry.value,
            plugin = %entry.plugin,
            experiment = %entry.experiment,
            "conditional config change"
        );
    }
}

/// Keeps audit entries in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<ConfigLogEntry>>,
}

impl MemoryAuditSink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded entries
    #[must_use]
    pub fn entries(&self) -> Vec<ConfigLogEntry> {
        self.entries.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: ConfigLogEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_and_plugin_settings_are_tagged_with_weight() {
        let commands: CommandList = [
            "CFG,theme,classic",
            "forced_plugin_setting,auth_saml,debug,1",
            "http_header,X-A,1",
            "CFG,broken",
        ]
        .into_iter()
        .collect();

        let entries = ConfigLogEntry::for_commands(&commands, "exp1", 30);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "theme");
        assert_eq!(entries[0].value, "classic");
        assert_eq!(entries[0].plugin, "core-experiment:30");
        assert_eq!(entries[0].experiment, "exp1");
        assert!(entries[0].old_value.is_empty());

        assert_eq!(entries[1].name, "debug");
        assert_eq!(entries[1].plugin, "auth_saml-experiment:30");
    }

    #[test]
    fn memory_sink_collects() {
        let sink = MemoryAuditSink::new();
        let command = Command::parse("CFG,a,b").unwrap();
        if let Some(entry) = ConfigLogEntry::for_command(&command, "e", 1) {
            sink.record(entry);
        }
        assert_eq!(sink.entries().len(), 1);
    }
}
