//! In-process record store
//!
//! Backs tests, the CLI and hosts without a database. Tables live behind a
//! single `RwLock` so every write is atomic with respect to readers.

use crate::error::{RecordKind, Result, StoreError};
use crate::record::{ConditionFields, ConditionRecord, ExperimentDraft, RecordStore};
use abconfig_model::{ConditionId, Experiment, ExperimentId};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Tables {
    experiments: BTreeMap<ExperimentId, Experiment>,
    conditions: BTreeMap<ConditionId, ConditionRecord>,
    next_experiment: i64,
    next_condition: i64,
}

/// Record store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored experiments
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.tables.read().experiments.len()
    }

    /// Number of stored conditions
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.tables.read().conditions.len()
    }
}

impl RecordStore for MemoryRecordStore {
    fn experiment(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        Ok(self.tables.read().experiments.get(&id).cloned())
    }

    fn experiment_by_shortname(&self, shortname: &str) -> Result<Option<Experiment>> {
        Ok(self
            .tables
            .read()
            .experiments
            .values()
            .find(|e| e.shortname == shortname)
            .cloned())
    }

    fn experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.tables.read().experiments.values().cloned().collect())
    }

    fn insert_experiment(&self, draft: ExperimentDraft) -> Result<ExperimentId> {
        let mut tables = self.tables.write();
        if tables
            .experiments
            .values()
            .any(|e| e.shortname == draft.shortname)
        {
            return Err(StoreError::already_exists(
                RecordKind::Experiment,
                draft.shortname,
            ));
        }
        tables.next_experiment += 1;
        let id = ExperimentId(tables.next_experiment);
        tables.experiments.insert(id, draft.with_id(id));
        Ok(id)
    }

    fn update_experiment(&self, experiment: &Experiment) -> Result<()> {
        let mut tables = self.tables.write();
        if tables
            .experiments
            .values()
            .any(|e| e.id != experiment.id && e.shortname == experiment.shortname)
        {
            return Err(StoreError::already_exists(
                RecordKind::Experiment,
                experiment.shortname.clone(),
            ));
        }
        match tables.experiments.get_mut(&experiment.id) {
            Some(slot) => {
                *slot = experiment.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(
                RecordKind::Experiment,
                experiment.id.to_string(),
            )),
        }
    }

    fn delete_experiment(&self, id: ExperimentId) -> Result<()> {
        self.tables
            .write()
            .experiments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(RecordKind::Experiment, id.to_string()))
    }

    fn conditions(&self, experiment: ExperimentId) -> Result<Vec<ConditionRecord>> {
        Ok(self
            .tables
            .read()
            .conditions
            .values()
            .filter(|c| c.experiment_id == experiment)
            .cloned()
            .collect())
    }

    fn condition_by_condset(
        &self,
        experiment: ExperimentId,
        condset: &str,
    ) -> Result<Option<ConditionRecord>> {
        Ok(self
            .tables
            .read()
            .conditions
            .values()
            .find(|c| c.experiment_id == experiment && c.fields.condset == condset)
            .cloned())
    }

    fn insert_condition(
        &self,
        experiment: ExperimentId,
        fields: ConditionFields,
    ) -> Result<ConditionId> {
        let mut tables = self.tables.write();
        if tables
            .conditions
            .values()
            .any(|c| c.experiment_id == experiment && c.fields.condset == fields.condset)
        {
            return Err(StoreError::already_exists(
                RecordKind::Condition,
                fields.condset,
            ));
        }
        tables.next_condition += 1;
        let id = ConditionId(tables.next_condition);
        tables.conditions.insert(
            id,
            ConditionRecord {
                id,
                experiment_id: experiment,
                fields,
            },
        );
        Ok(id)
    }

    fn update_condition(&self, record: &ConditionRecord) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.conditions.values().any(|c| {
            c.id != record.id
                && c.experiment_id == record.experiment_id
                && c.fields.condset == record.fields.condset
        }) {
            return Err(StoreError::already_exists(
                RecordKind::Condition,
                record.fields.condset.clone(),
            ));
        }
        match tables.conditions.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(
                RecordKind::Condition,
                record.id.to_string(),
            )),
        }
    }

    fn delete_condition(&self, id: ConditionId) -> Result<()> {
        self.tables
            .write()
            .conditions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(RecordKind::Condition, id.to_string()))
    }

    fn delete_conditions(&self, experiment: ExperimentId) -> Result<usize> {
        let mut tables = self.tables.write();
        let before = tables.conditions.len();
        tables.conditions.retain(|_, c| c.experiment_id != experiment);
        Ok(before - tables.conditions.len())
    }
}
