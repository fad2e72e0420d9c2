//! Testing utilities for abconfig
//!
//! Dataset builders, an in-memory host and deterministic draws.

#![allow(missing_docs)]

use abconfig_engine::{
    BucketDraw, BufferedHeaders, Host, MemoryLog, MemorySession, SiteConfig,
};
use abconfig_model::{
    CommandList, Condition, ConditionId, Experiment, ExperimentId, IpAllowList, Scope,
};
use abconfig_store::{ExperimentEntry, ExperimentSet, StaticSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

static NEXT_ID: AtomicI64 = AtomicI64::new(1);

fn next_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Builds an enabled-or-not experiment with its conditions
#[derive(Debug, Clone)]
pub struct ExperimentBuilder {
    experiment: Experiment,
    conditions: Vec<Condition>,
}

impl ExperimentBuilder {
    pub fn new(shortname: &str, scope: Scope) -> Self {
        Self {
            experiment: Experiment {
                id: ExperimentId(next_id()),
                name: shortname.to_string(),
                shortname: shortname.to_string(),
                scope,
                enabled: false,
                admin_enabled: false,
                numeric_offset: 0,
            },
            conditions: Vec::new(),
        }
    }

    pub fn enabled(mut self) -> Self {
        self.experiment.enabled = true;
        self
    }

    pub fn admin_enabled(mut self) -> Self {
        self.experiment.admin_enabled = true;
        self
    }

    pub fn offset(mut self, numeric_offset: u8) -> Self {
        self.experiment.numeric_offset = numeric_offset;
        self
    }

    pub fn condition(self, condset: &str, weight: u32, commands: &[&str]) -> Self {
        self.condition_with(condset, weight, commands, "", &[])
    }

    pub fn condition_with(
        mut self,
        condset: &str,
        weight: u32,
        commands: &[&str],
        ip_allow_list: &str,
        users: &[i64],
    ) -> Self {
        self.conditions.push(Condition {
            id: ConditionId(next_id()),
            experiment_id: self.experiment.id,
            condset: condset.to_string(),
            ip_allow_list: IpAllowList::parse(ip_allow_list),
            commands: commands.iter().copied().collect::<CommandList>(),
            weight,
            users: users.iter().copied().collect(),
        });
        self
    }

    pub fn build(self) -> ExperimentEntry {
        ExperimentEntry::new(self.experiment, self.conditions)
    }
}

pub fn dataset(builders: impl IntoIterator<Item = ExperimentBuilder>) -> ExperimentSet {
    builders.into_iter().map(ExperimentBuilder::build).collect()
}

pub fn static_source(builders: impl IntoIterator<Item = ExperimentBuilder>) -> StaticSource {
    StaticSource::new(dataset(builders))
}

/// Host collaborators kept in memory
#[derive(Debug, Default)]
pub struct MemoryHost {
    pub session: MemorySession,
    pub config: SiteConfig,
    pub headers: BufferedHeaders,
    pub log: MemoryLog,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SiteConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn host(&mut self) -> Host<'_> {
        Host {
            session: &mut self.session,
            config: &mut self.config,
            headers: &mut self.headers,
            log: &mut self.log,
        }
    }

    pub fn config_value(&self, name: &str) -> Option<&str> {
        self.config.values.get(name).map(String::as_str)
    }
}

/// Always draws the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub u32);

impl BucketDraw for FixedDraw {
    fn roll(&mut self) -> u32 {
        self.0
    }
}

/// Draws values in order, then repeats the last one
#[derive(Debug, Clone, Default)]
pub struct SequenceDraw {
    values: VecDeque<u32>,
    last: u32,
    pub rolls: usize,
}

impl SequenceDraw {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: 100,
            rolls: 0,
        }
    }
}

impl BucketDraw for SequenceDraw {
    fn roll(&mut self) -> u32 {
        self.rolls += 1;
        if let Some(value) = self.values.pop_front() {
            self.last = value;
        }
        self.last
    }
}
