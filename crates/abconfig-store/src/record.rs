//! Record store abstraction
//!
//! The host persists experiments and conditions; this crate only needs the
//! CRUD surface below. Implementations must enforce uniqueness of experiment
//! shortnames and of `(experiment, condset)` pairs.

use crate::error::Result;
use abconfig_model::{
    CommandList, Condition, ConditionId, Experiment, ExperimentId, IpAllowList, ModelError, Scope,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fields of an experiment that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentDraft {
    /// Human-readable name
    pub name: String,
    /// Unique alphanumeric key
    pub shortname: String,
    /// Selection lifecycle
    pub scope: Scope,
    /// Whether the experiment fires
    pub enabled: bool,
    /// Whether admins take part
    pub admin_enabled: bool,
    /// Device-scope salt
    pub numeric_offset: u8,
}

impl ExperimentDraft {
    /// Attach an id, producing the stored experiment
    #[must_use]
    pub fn with_id(self, id: ExperimentId) -> Experiment {
        Experiment {
            id,
            name: self.name,
            shortname: self.shortname,
            scope: self.scope,
            enabled: self.enabled,
            admin_enabled: self.admin_enabled,
            numeric_offset: self.numeric_offset,
        }
    }
}

/// Stored columns of a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFields {
    /// Name, unique within the experiment
    pub condset: String,
    /// Raw allow-list text
    pub ip_allow_list: String,
    /// JSON array of command lines
    pub commands_json: String,
    /// Share of the 100-point draw
    pub weight: u32,
    /// Targeted users; empty means everyone
    pub users: BTreeSet<i64>,
}

/// A stored condition row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRecord {
    /// Record id
    pub id: ConditionId,
    /// Owning experiment
    pub experiment_id: ExperimentId,
    /// Stored columns
    #[serde(flatten)]
    pub fields: ConditionFields,
}

impl ConditionRecord {
    /// Decode into the evaluation form
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidCommandList`] when the stored commands are not a JSON string array
    pub fn decode(&self) -> std::result::Result<Condition, ModelError> {
        Ok(Condition {
            id: self.id,
            experiment_id: self.experiment_id,
            condset: self.fields.condset.clone(),
            ip_allow_list: IpAllowList::parse(&self.fields.ip_allow_list),
            commands: CommandList::from_json(&self.fields.commands_json)?,
            weight: self.fields.weight,
            users: self.fields.users.clone(),
        })
    }
}

/// CRUD surface of the host's persistence layer
pub trait RecordStore: Send + Sync {
    /// Fetch an experiment by id
    fn experiment(&self, id: ExperimentId) -> Result<Option<Experiment>>;

    /// Fetch an experiment by shortname
    fn experiment_by_shortname(&self, shortname: &str) -> Result<Option<Experiment>>;

    /// All experiments in id order
    fn experiments(&self) -> Result<Vec<Experiment>>;

    /// Insert a new experiment
    ///
    /// Fails with `AlreadyExists` on a duplicate shortname.
    fn insert_experiment(&self, draft: ExperimentDraft) -> Result<ExperimentId>;

    /// Replace every field of an existing experiment
    fn update_experiment(&self, experiment: &Experiment) -> Result<()>;

    /// Remove an experiment row
    fn delete_experiment(&self, id: ExperimentId) -> Result<()>;

    /// Conditions of an experiment in id order
    fn conditions(&self, experiment: ExperimentId) -> Result<Vec<ConditionRecord>>;

    /// Fetch a condition by experiment and condset
    fn condition_by_condset(
        &self,
        experiment: ExperimentId,
        condset: &str,
    ) -> Result<Option<ConditionRecord>>;

    /// Insert a new condition
    ///
    /// Fails with `AlreadyExists` on a duplicate `(experiment, condset)`.
    fn insert_condition(
        &self,
        experiment: ExperimentId,
        fields: ConditionFields,
    ) -> Result<ConditionId>;

    /// Replace the columns of an existing condition
    fn update_condition(&self, record: &ConditionRecord) -> Result<()>;

    /// Remove one condition row
    fn delete_condition(&self, id: ConditionId) -> Result<()>;

    /// Remove every condition of an experiment, returning how many went
    fn delete_conditions(&self, experiment: ExperimentId) -> Result<usize>;
}
