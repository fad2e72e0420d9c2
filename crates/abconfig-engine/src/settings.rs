//! Engine settings
//!
//! Loaded from YAML or JSON; every field has a default so an empty document
//! is valid.
//!
//! ```yaml
//! disable_param: abconfig
//! env_prefix: ABCONFIG_
//! session_key_prefix: abconfig_
//! cache_capacity: 16
//! cache_ttl_secs: 300
//! ```

use crate::error::{EngineError, Result};
use abconfig_store::{ExperimentCache, ExperimentManager, RecordStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tunables shared by every hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Request parameter that switches evaluation off
    pub disable_param: String,
    /// Prefix of CLI override environment variables
    pub env_prefix: String,
    /// Prefix of session memo keys
    pub session_key_prefix: String,
    /// Capacity of the dataset cache
    pub cache_capacity: u64,
    /// Optional expiry of the cached dataset
    pub cache_ttl_secs: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            disable_param: "abconfig".to_string(),
            env_prefix: "ABCONFIG_".to_string(),
            session_key_prefix: "abconfig_".to_string(),
            cache_capacity: 16,
            cache_ttl_secs: None,
        }
    }
}

impl EngineSettings {
    /// Parse from YAML
    ///
    /// # Errors
    /// Returns [`EngineError::Settings`] on invalid YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| EngineError::settings(e.to_string()))
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns [`EngineError::Settings`] on invalid JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::settings(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns [`EngineError::Settings`] if the file is unreadable, has
    /// another extension, or fails to parse
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::settings(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            _ => Err(EngineError::settings(format!(
                "{}: expected a .json, .yaml or .yml file",
                path.display()
            ))),
        }
    }

    /// Session key memoizing the choice for an experiment
    #[inline]
    #[must_use]
    pub fn session_key(&self, shortname: &str) -> String {
        format!("{}{shortname}", self.session_key_prefix)
    }

    /// Environment variable carrying a CLI override for an experiment
    #[inline]
    #[must_use]
    pub fn env_var(&self, shortname: &str) -> String {
        format!("{}{}", self.env_prefix, shortname.to_uppercase())
    }

    /// Build a dataset cache sized by these settings
    #[must_use]
    pub fn build_cache(&self) -> ExperimentCache {
        match self.cache_ttl_secs {
            Some(secs) => ExperimentCache::with_ttl(self.cache_capacity, Duration::from_secs(secs)),
            None => ExperimentCache::new(self.cache_capacity),
        }
    }

    /// Manager over `store` using a cache built from these settings
    #[must_use]
    pub fn experiment_manager(&self, store: Arc<dyn RecordStore>) -> ExperimentManager {
        ExperimentManager::new(store).with_cache(self.build_cache())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abconfig_model::Scope;
    use abconfig_store::{ExperimentSource, MemoryRecordStore};
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(EngineSettings::from_yaml_str("{}").unwrap(), EngineSettings::default());
        assert_eq!(EngineSettings::from_json_str("{}").unwrap(), EngineSettings::default());
    }

    #[test]
    fn keys_follow_prefixes() {
        let settings = EngineSettings::default();
        assert_eq!(settings.session_key("exp1"), "abconfig_exp1");
        assert_eq!(settings.env_var("exp1"), "ABCONFIG_EXP1");
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("abconfig.yaml");
        std::fs::File::create(&yaml)
            .unwrap()
            .write_all(b"disable_param: noab\ncache_ttl_secs: 60\n")
            .unwrap();
        let settings = EngineSettings::load(&yaml).unwrap();
        assert_eq!(settings.disable_param, "noab");
        assert_eq!(settings.cache_ttl_secs, Some(60));
        assert_eq!(settings.env_prefix, "ABCONFIG_");

        let json = dir.path().join("abconfig.json");
        std::fs::write(&json, r#"{"env_prefix":"AB_"}"#).unwrap();
        assert_eq!(EngineSettings::load(&json).unwrap().env_prefix, "AB_");

        let toml = dir.path().join("abconfig.toml");
        std::fs::write(&toml, "").unwrap();
        assert!(matches!(EngineSettings::load(&toml), Err(EngineError::Settings(_))));
    }

    #[test]
    fn missing_file_is_a_settings_error() {
        let err = EngineSettings::load("/nonexistent/abconfig.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/abconfig.yaml"));
    }

    #[test]
    fn manager_cache_follows_ttl() {
        let settings = EngineSettings::from_yaml_str("cache_ttl_secs: 1\n").unwrap();
        let manager = settings.experiment_manager(Arc::new(MemoryRecordStore::new()));
        manager.add_experiment("Theme", "theme", Scope::Request).unwrap();

        assert_eq!(manager.snapshot().unwrap().len(), 1);
        assert!(manager.cache().contains());
        std::thread::sleep(Duration::from_millis(1_200));
        assert!(!manager.cache().contains());
    }

    #[test]
    fn manager_cache_without_ttl_persists() {
        let manager = EngineSettings::default().experiment_manager(Arc::new(MemoryRecordStore::new()));
        manager.snapshot().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(manager.cache().contains());
    }
}
