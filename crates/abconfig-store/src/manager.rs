//! Experiment manager
//!
//! Repository operations for operators plus the read facade used by
//! evaluators. Every mutating call invalidates the dataset cache, whether or
//! not the write itself succeeded.

use crate::audit::{AuditSink, ConfigLogEntry, TracingAuditSink};
use crate::cache::ExperimentCache;
use crate::error::{RecordKind, Result, StoreError};
use crate::record::{ConditionFields, ConditionRecord, ExperimentDraft, RecordStore};
use crate::snapshot::{ExperimentEntry, ExperimentSet, ExperimentSource};
use abconfig_model::{
    validate_offset, validate_shortname, CommandList, Condition, ConditionId, Experiment,
    ExperimentId, Scope,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Full replacement of an experiment's editable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentUpdate {
    /// Human-readable name
    pub name: String,
    /// New shortname (may equal the previous one)
    pub shortname: String,
    /// Selection lifecycle
    pub scope: Scope,
    /// Whether the experiment fires
    pub enabled: bool,
    /// Whether admins take part
    pub admin_enabled: bool,
    /// Device-scope salt, validated to `0..=99`
    pub numeric_offset: i64,
}

/// Operator input for a condition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionInput {
    /// Name, unique within the experiment
    pub condset: String,
    /// Raw allow-list text
    pub ip_allow_list: String,
    /// Commands as typed by the operator, one per line
    pub commands: String,
    /// Share of the 100-point draw
    pub weight: u32,
    /// Targeted users; empty means everyone
    pub users: Vec<i64>,
}

/// Repository and store facade over a [`RecordStore`]
pub struct ExperimentManager {
    store: Arc<dyn RecordStore>,
    cache: ExperimentCache,
    audit: Arc<dyn AuditSink>,
    offsets: Mutex<StdRng>,
}

impl std::fmt::Debug for ExperimentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentManager")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ExperimentManager {
    /// Create manager with a default cache and tracing audit sink
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: ExperimentCache::default(),
            audit: Arc::new(TracingAuditSink),
            offsets: Mutex::new(StdRng::from_rng(&mut rand::rng())),
        }
    }

    /// Draw numeric offsets of new experiments from a seeded generator
    #[must_use]
    pub fn with_offset_seed(mut self, seed: u64) -> Self {
        self.offsets = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Replace the audit sink
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the dataset cache
    #[must_use]
    pub fn with_cache(mut self, cache: ExperimentCache) -> Self {
        self.cache = cache;
        self
    }

    /// Underlying record store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Dataset cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ExperimentCache {
        &self.cache
    }

    // Experiments

    /// Fetch an experiment by id
    ///
    /// # Errors
    /// Propagates record store failures
    pub fn get_experiment(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        self.store.experiment(id)
    }

    /// Whether an experiment with this shortname exists
    ///
    /// # Errors
    /// Propagates record store failures
    pub fn experiment_exists(&self, shortname: &str) -> Result<bool> {
        Ok(self.store.experiment_by_shortname(shortname)?.is_some())
    }

    /// Add a disabled experiment with a random numeric offset
    ///
    /// # Errors
    /// - `AlreadyExists` if the shortname is taken
    /// - `Invalid` if the shortname is not alphanumeric
    pub fn add_experiment(&self, name: &str, shortname: &str, scope: Scope) -> Result<ExperimentId> {
        self.mutate(|| {
            validate_shortname(shortname)?;
            if self.experiment_exists(shortname)? {
                return Err(StoreError::already_exists(RecordKind::Experiment, shortname));
            }
            let id = self.store.insert_experiment(ExperimentDraft {
                name: name.to_string(),
                shortname: shortname.to_string(),
                scope,
                enabled: false,
                admin_enabled: false,
                numeric_offset: self.offsets.lock().random_range(0..100),
            })?;
            tracing::info!(experiment = shortname, %id, %scope, "experiment added");
            Ok(id)
        })
    }

    /// Replace every editable field of the experiment named `prev_shortname`
    ///
    /// # Errors
    /// - `NotFound` if `prev_shortname` does not exist
    /// - `AlreadyExists` if renaming onto another experiment's shortname
    /// - `Invalid` on a bad shortname or offset
    pub fn update_experiment(&self, prev_shortname: &str, update: ExperimentUpdate) -> Result<()> {
        self.mutate(|| {
            let current = self
                .store
                .experiment_by_shortname(prev_shortname)?
                .ok_or_else(|| StoreError::not_found(RecordKind::Experiment, prev_shortname))?;
            validate_shortname(&update.shortname)?;
            let numeric_offset = validate_offset(update.numeric_offset)?;
            if update.shortname != prev_shortname && self.experiment_exists(&update.shortname)? {
                return Err(StoreError::already_exists(
                    RecordKind::Experiment,
                    update.shortname,
                ));
            }
            self.store.update_experiment(&Experiment {
                id: current.id,
                name: update.name,
                shortname: update.shortname,
                scope: update.scope,
                enabled: update.enabled,
                admin_enabled: update.admin_enabled,
                numeric_offset,
            })
        })
    }

    /// Delete an experiment and all of its conditions
    ///
    /// # Errors
    /// `NotFound` if the shortname does not exist
    pub fn delete_experiment(&self, shortname: &str) -> Result<()> {
        self.mutate(|| {
            let experiment = self
                .store
                .experiment_by_shortname(shortname)?
                .ok_or_else(|| StoreError::not_found(RecordKind::Experiment, shortname))?;
            let removed = self.store.delete_conditions(experiment.id)?;
            self.store.delete_experiment(experiment.id)?;
            tracing::info!(experiment = shortname, conditions = removed, "experiment deleted");
            Ok(())
        })
    }

    // Conditions

    /// Whether the experiment has a condition with this condset
    ///
    /// # Errors
    /// Propagates record store failures
    pub fn condition_exists(&self, experiment: ExperimentId, condset: &str) -> Result<bool> {
        Ok(self.store.condition_by_condset(experiment, condset)?.is_some())
    }

    /// Add a condition and audit its config commands
    ///
    /// # Errors
    /// - `NotFound` if the experiment does not exist
    /// - `AlreadyExists` if the condset is taken within the experiment
    pub fn add_condition(&self, experiment: ExperimentId, input: ConditionInput) -> Result<ConditionId> {
        self.mutate(|| {
            let owner = self.owner(experiment)?;
            if self.condition_exists(experiment, &input.condset)? {
                return Err(StoreError::already_exists(RecordKind::Condition, input.condset));
            }
            let (fields, commands) = Self::fields(input)?;
            let weight = fields.weight;
            let id = self.store.insert_condition(experiment, fields)?;
            self.audit_commands(&commands, &owner.shortname, weight);
            Ok(id)
        })
    }

    /// Replace the condition named `prev_condset` and audit its config commands
    ///
    /// # Errors
    /// - `NotFound` if the experiment or `prev_condset` does not exist
    /// - `AlreadyExists` if renaming onto another condset of the experiment
    pub fn update_condition(
        &self,
        experiment: ExperimentId,
        prev_condset: &str,
        input: ConditionInput,
    ) -> Result<()> {
        self.mutate(|| {
            let owner = self.owner(experiment)?;
            let current = self
                .store
                .condition_by_condset(experiment, prev_condset)?
                .ok_or_else(|| StoreError::not_found(RecordKind::Condition, prev_condset))?;
            if input.condset != prev_condset && self.condition_exists(experiment, &input.condset)? {
                return Err(StoreError::already_exists(RecordKind::Condition, input.condset));
            }
            let (fields, commands) = Self::fields(input)?;
            let weight = fields.weight;
            self.store.update_condition(&ConditionRecord {
                id: current.id,
                experiment_id: experiment,
                fields,
            })?;
            self.audit_commands(&commands, &owner.shortname, weight);
            Ok(())
        })
    }

    /// Delete one condition
    ///
    /// # Errors
    /// `NotFound` if the condset does not exist in the experiment
    pub fn delete_condition(&self, experiment: ExperimentId, condset: &str) -> Result<()> {
        self.mutate(|| {
            let record = self
                .store
                .condition_by_condset(experiment, condset)?
                .ok_or_else(|| StoreError::not_found(RecordKind::Condition, condset))?;
            self.store.delete_condition(record.id)
        })
    }

    /// Delete every condition of an experiment
    ///
    /// # Errors
    /// Propagates record store failures
    pub fn delete_all_conditions(&self, experiment: ExperimentId) -> Result<()> {
        self.mutate(|| self.store.delete_conditions(experiment).map(|_| ()))
    }

    /// Conditions of an experiment sorted by condset, for listings
    ///
    /// # Errors
    /// Propagates record store failures and undecodable command lists
    pub fn conditions_for_experiment(&self, experiment: ExperimentId) -> Result<Vec<Condition>> {
        let mut conditions = self
            .store
            .conditions(experiment)?
            .iter()
            .map(ConditionRecord::decode)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        conditions.sort_by(|a, b| a.condset.cmp(&b.condset));
        Ok(conditions)
    }

    // Store facade

    /// Current snapshot; empty if it cannot be built
    #[must_use]
    pub fn experiments(&self) -> Arc<ExperimentSet> {
        self.snapshot().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "experiment snapshot unavailable");
            Arc::default()
        })
    }

    /// Enabled experiments of every scope
    #[must_use]
    pub fn active_experiments(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().active_experiments()
    }

    /// Enabled request-scope experiments
    #[must_use]
    pub fn active_request(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().active(Scope::Request)
    }

    /// Enabled session-scope experiments
    #[must_use]
    pub fn active_session(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().active(Scope::Session)
    }

    /// Enabled device-scope experiments
    #[must_use]
    pub fn active_device(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().active(Scope::Device)
    }

    /// Experiments accepting explicit overrides at early boot
    #[must_use]
    pub fn after_config_experiments(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().after_config()
    }

    /// Experiments accepting explicit overrides before the session starts
    #[must_use]
    pub fn before_session_experiments(&self) -> Vec<Arc<ExperimentEntry>> {
        self.experiments().before_session()
    }

    fn load_dataset(&self) -> Result<ExperimentSet> {
        let mut entries = Vec::new();
        for experiment in self.store.experiments()? {
            let conditions = self
                .store
                .conditions(experiment.id)?
                .iter()
                .map(ConditionRecord::decode)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            entries.push(ExperimentEntry::new(experiment, conditions));
        }
        Ok(ExperimentSet::new(entries))
    }

    fn mutate<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let result = op();
        self.cache.invalidate();
        result
    }

    fn owner(&self, experiment: ExperimentId) -> Result<Experiment> {
        self.store
            .experiment(experiment)?
            .ok_or_else(|| StoreError::not_found(RecordKind::Experiment, experiment.to_string()))
    }

    fn fields(input: ConditionInput) -> Result<(ConditionFields, CommandList)> {
        let commands = CommandList::from_authoring_text(&input.commands);
        let fields = ConditionFields {
            condset: input.condset,
            ip_allow_list: input.ip_allow_list,
            commands_json: commands.to_json()?,
            weight: input.weight,
            users: input.users.into_iter().collect(),
        };
        Ok((fields, commands))
    }

    fn audit_commands(&self, commands: &CommandList, shortname: &str, weight: u32) {
        for entry in ConfigLogEntry::for_commands(commands, shortname, weight) {
            self.audit.record(entry);
        }
    }
}

impl ExperimentSource for ExperimentManager {
    fn snapshot(&self) -> Result<Arc<ExperimentSet>> {
        self.cache.try_get_or_load(|| self.load_dataset())
    }

    fn invalidate(&self) {
        self.cache.invalidate();
    }
}
