//! Denormalized experiment dataset
//!
//! Evaluators never talk to the record store. They read an immutable
//! [`ExperimentSet`] snapshot: every experiment keyed by shortname, each with
//! its conditions keyed by condset, both in stored order.

use crate::error::Result;
use abconfig_model::{Condition, Experiment, Scope};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An experiment together with its ordered conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentEntry {
    /// The experiment
    #[serde(flatten)]
    pub experiment: Experiment,
    /// Conditions keyed by condset, in stored order
    pub conditions: IndexMap<String, Condition>,
}

impl ExperimentEntry {
    /// Group conditions under their experiment, keeping their order
    #[must_use]
    pub fn new(experiment: Experiment, conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            experiment,
            conditions: conditions
                .into_iter()
                .map(|c| (c.condset.clone(), c))
                .collect(),
        }
    }

    /// Shortname of the experiment
    #[inline]
    #[must_use]
    pub fn shortname(&self) -> &str {
        &self.experiment.shortname
    }

    /// Look up a condition by condset
    #[inline]
    #[must_use]
    pub fn condition(&self, condset: &str) -> Option<&Condition> {
        self.conditions.get(condset)
    }

    /// Conditions in stored order
    pub fn ordered_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }
}

/// Snapshot of every experiment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentSet {
    entries: IndexMap<String, Arc<ExperimentEntry>>,
}

impl ExperimentSet {
    /// Build from entries in stored order
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = ExperimentEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.experiment.shortname.clone(), Arc::new(e)))
                .collect(),
        }
    }

    /// Look up an experiment by shortname
    #[must_use]
    pub fn get(&self, shortname: &str) -> Option<&Arc<ExperimentEntry>> {
        self.entries.get(shortname)
    }

    /// Every experiment, enabled or not
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ExperimentEntry>> {
        self.entries.values()
    }

    /// Enabled experiments
    #[must_use]
    pub fn active_experiments(&self) -> Vec<Arc<ExperimentEntry>> {
        self.filtered(|e| e.enabled)
    }

    /// Enabled experiments of one scope
    #[must_use]
    pub fn active(&self, scope: Scope) -> Vec<Arc<ExperimentEntry>> {
        self.filtered(|e| e.enabled && e.scope == scope)
    }

    /// Enabled experiments that accept explicit overrides at early boot
    #[must_use]
    pub fn after_config(&self) -> Vec<Arc<ExperimentEntry>> {
        self.filtered(|e| e.enabled && e.scope != Scope::Device)
    }

    /// Enabled experiments that accept explicit overrides before the session starts
    #[must_use]
    pub fn before_session(&self) -> Vec<Arc<ExperimentEntry>> {
        self.active(Scope::Device)
    }

    /// Number of experiments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no experiments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn filtered(&self, keep: impl Fn(&Experiment) -> bool) -> Vec<Arc<ExperimentEntry>> {
        self.entries
            .values()
            .filter(|e| keep(&e.experiment))
            .cloned()
            .collect()
    }
}

impl FromIterator<ExperimentEntry> for ExperimentSet {
    fn from_iter<I: IntoIterator<Item = ExperimentEntry>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Read side consumed by evaluators
pub trait ExperimentSource: Send + Sync {
    /// Current dataset snapshot
    ///
    /// # Errors
    /// Returns the store error when the snapshot cannot be built
    fn snapshot(&self) -> Result<Arc<ExperimentSet>>;

    /// Drop the cached snapshot so the next read rebuilds it
    fn invalidate(&self);

    /// Enabled experiments of one scope
    ///
    /// # Errors
    /// Returns the store error when the snapshot cannot be built
    fn active(&self, scope: Scope) -> Result<Vec<Arc<ExperimentEntry>>> {
        Ok(self.snapshot()?.active(scope))
    }
}

impl<T: ExperimentSource + ?Sized> ExperimentSource for Arc<T> {
    fn snapshot(&self) -> Result<Arc<ExperimentSet>> {
        (**self).snapshot()
    }

    fn invalidate(&self) {
        (**self).invalidate();
    }
}

/// Fixed snapshot, for hosts that build their dataset up front
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    set: Arc<ExperimentSet>,
}

impl StaticSource {
    /// Wrap a dataset
    #[must_use]
    pub fn new(set: ExperimentSet) -> Self {
        Self { set: Arc::new(set) }
    }
}

impl ExperimentSource for StaticSource {
    fn snapshot(&self) -> Result<Arc<ExperimentSet>> {
        Ok(Arc::clone(&self.set))
    }

    fn invalidate(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use abconfig_model::{CommandList, ConditionId, ExperimentId, IpAllowList};

    fn experiment(id: i64, shortname: &str, scope: Scope, enabled: bool) -> Experiment {
        Experiment {
            id: ExperimentId(id),
            name: shortname.into(),
            shortname: shortname.into(),
            scope,
            enabled,
            admin_enabled: false,
            numeric_offset: 0,
        }
    }

    fn condition(id: i64, condset: &str) -> Condition {
        Condition {
            id: ConditionId(id),
            experiment_id: ExperimentId(1),
            condset: condset.into(),
            ip_allow_list: IpAllowList::default(),
            commands: CommandList::default(),
            weight: 10,
            users: Default::default(),
        }
    }

    fn dataset() -> ExperimentSet {
        ExperimentSet::new([
            ExperimentEntry::new(experiment(1, "req", Scope::Request, true), []),
            ExperimentEntry::new(experiment(2, "off", Scope::Request, false), []),
            ExperimentEntry::new(experiment(3, "sess", Scope::Session, true), []),
            ExperimentEntry::new(experiment(4, "dev", Scope::Device, true), []),
            ExperimentEntry::new(experiment(5, "boot", Scope::AfterConfig, true), []),
        ])
    }

    fn names(entries: &[Arc<ExperimentEntry>]) -> Vec<&str> {
        entries.iter().map(|e| e.shortname()).collect()
    }

    #[test]
    fn scope_filters_skip_disabled() {
        let set = dataset();
        assert_eq!(names(&set.active(Scope::Request)), ["req"]);
        assert_eq!(names(&set.active(Scope::Session)), ["sess"]);
        assert_eq!(names(&set.active(Scope::Device)), ["dev"]);
        assert_eq!(names(&set.active_experiments()), ["req", "sess", "dev", "boot"]);
    }

    #[test]
    fn override_targets_split_by_hook() {
        let set = dataset();
        assert_eq!(names(&set.after_config()), ["req", "sess", "boot"]);
        assert_eq!(names(&set.before_session()), ["dev"]);
    }

    #[test]
    fn conditions_keep_stored_order() {
        let entry = ExperimentEntry::new(
            experiment(1, "req", Scope::Request, true),
            [condition(1, "b"), condition(2, "a")],
        );
        let order: Vec<_> = entry.ordered_conditions().map(|c| c.condset.as_str()).collect();
        assert_eq!(order, ["b", "a"]);
        assert!(entry.condition("a").is_some());
        assert!(entry.condition("c").is_none());
    }
}
