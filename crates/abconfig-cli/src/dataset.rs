//! Dataset files
//!
//! A YAML or JSON document listing experiments with their conditions in
//! stored order:
//!
//! ```yaml
//! experiments:
//!   - shortname: theme
//!     scope: request
//!     enabled: true
//!     conditions:
//!       - condset: classic
//!         weight: 50
//!         commands:
//!           - CFG,theme,classic
//! ```

use abconfig_model::{
    validate_shortname, CommandList, Condition, ConditionId, Experiment, ExperimentId,
    IpAllowList, Scope,
};
use abconfig_store::{ExperimentEntry, ExperimentSet};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// One condition as written in a dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Name, unique within the experiment
    pub condset: String,
    /// Share of the 100-point draw
    pub weight: u32,
    /// Raw allow-list text
    #[serde(default)]
    pub ip_allow_list: String,
    /// Command lines
    #[serde(default)]
    pub commands: Vec<String>,
    /// Targeted users
    #[serde(default)]
    pub users: BTreeSet<i64>,
}

/// One experiment as written in a dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Human-readable name, defaults to the shortname
    #[serde(default)]
    pub name: Option<String>,
    /// Unique alphanumeric key
    pub shortname: String,
    /// Selection lifecycle
    pub scope: Scope,
    /// Whether the experiment fires
    #[serde(default)]
    pub enabled: bool,
    /// Whether admins take part
    #[serde(default)]
    pub admin_enabled: bool,
    /// Device-scope salt
    #[serde(default)]
    pub numeric_offset: u8,
    /// Conditions in stored order
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

/// Parsed dataset file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFile {
    /// Experiments in stored order
    #[serde(default)]
    pub experiments: Vec<ExperimentSpec>,
}

impl DatasetFile {
    /// Load a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Fails if the file is unreadable or does not parse
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&text).map_err(anyhow::Error::from),
            Some("yaml" | "yml") => serde_yaml::from_str(&text).map_err(anyhow::Error::from),
            _ => bail!("{}: expected a .json, .yaml or .yml file", path.display()),
        };
        parsed.with_context(|| format!("parsing dataset {}", path.display()))
    }

    /// Build the evaluation snapshot
    ///
    /// Ids are assigned in file order.
    ///
    /// # Errors
    /// Fails on an invalid or duplicate shortname, a duplicate condset, or an
    /// out-of-range offset
    pub fn to_set(&self) -> anyhow::Result<ExperimentSet> {
        let mut shortnames = HashSet::new();
        let mut next_condition = 0;
        let mut entries = Vec::with_capacity(self.experiments.len());

        for (index, spec) in (1i64..).zip(&self.experiments) {
            validate_shortname(&spec.shortname)?;
            if !shortnames.insert(spec.shortname.as_str()) {
                bail!("duplicate experiment shortname `{}`", spec.shortname);
            }
            if spec.numeric_offset > 99 {
                bail!("{}: numeric_offset {} is not in 0..=99", spec.shortname, spec.numeric_offset);
            }
            let id = ExperimentId(index);

            let mut condsets = HashSet::new();
            let mut conditions = Vec::with_capacity(spec.conditions.len());
            for cond in &spec.conditions {
                if !condsets.insert(cond.condset.as_str()) {
                    bail!("{}: duplicate condset `{}`", spec.shortname, cond.condset);
                }
                next_condition += 1;
                conditions.push(Condition {
                    id: ConditionId(next_condition),
                    experiment_id: id,
                    condset: cond.condset.clone(),
                    ip_allow_list: IpAllowList::parse(&cond.ip_allow_list),
                    commands: CommandList::new(cond.commands.clone()),
                    weight: cond.weight,
                    users: cond.users.clone(),
                });
            }

            let experiment = Experiment {
                id,
                name: spec.name.clone().unwrap_or_else(|| spec.shortname.clone()),
                shortname: spec.shortname.clone(),
                scope: spec.scope,
                enabled: spec.enabled,
                admin_enabled: spec.admin_enabled,
                numeric_offset: spec.numeric_offset,
            };
            entries.push(ExperimentEntry::new(experiment, conditions));
        }

        Ok(ExperimentSet::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "
experiments:
  - shortname: theme
    scope: request
    enabled: true
    conditions:
      - condset: classic
        weight: 50
        commands: ['CFG,theme,classic']
      - condset: boost
        weight: 50
  - shortname: early
    scope: beforesession
    conditions: []
";

    #[test]
    fn yaml_builds_a_snapshot() {
        let file: DatasetFile = serde_yaml::from_str(YAML).unwrap();
        let set = file.to_set().unwrap();
        assert_eq!(set.len(), 2);

        let theme = set.get("theme").unwrap();
        assert_eq!(theme.experiment.name, "theme");
        let order: Vec<_> = theme.ordered_conditions().map(|c| c.condset.as_str()).collect();
        assert_eq!(order, ["classic", "boost"]);
        assert_eq!(set.get("early").unwrap().experiment.scope, Scope::AfterConfig);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut file: DatasetFile = serde_yaml::from_str(YAML).unwrap();
        file.experiments[1].shortname = "theme".into();
        assert!(file.to_set().unwrap_err().to_string().contains("duplicate experiment"));

        let mut file: DatasetFile = serde_yaml::from_str(YAML).unwrap();
        file.experiments[0].conditions[1].condset = "classic".into();
        assert!(file.to_set().unwrap_err().to_string().contains("duplicate condset"));
    }

    #[test]
    fn bad_offset_is_rejected() {
        let mut file: DatasetFile = serde_yaml::from_str(YAML).unwrap();
        file.experiments[0].numeric_offset = 100;
        assert!(file.to_set().is_err());
    }
}
