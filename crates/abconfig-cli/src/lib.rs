//! abconfig command-line tooling
//!
//! Offline inspection of an experiment dataset file:
//! - [`simulate`]: condition distribution under seeded uniform draws
//! - [`bucket`]: where a device lands in each device experiment
//! - [`check`]: command lines that would be skipped as malformed

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod dataset;

use abconfig_engine::{BucketDraw, BucketSelector, Eligibility, Requester, UniformDraw};
use abconfig_model::{DeviceFingerprint, Scope};
use abconfig_store::ExperimentSet;
use indexmap::IndexMap;
use std::fmt;

pub use dataset::{ConditionSpec, DatasetFile, ExperimentSpec};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Draw outcomes for one experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// Experiment shortname
    pub experiment: String,
    /// Experiment scope
    pub scope: Scope,
    /// Wins per condset, in stored order
    pub counts: IndexMap<String, u64>,
    /// Draws that selected nothing
    pub none: u64,
    /// Total draws
    pub draws: u64,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.experiment, self.scope)?;
        let share = |n: u64| {
            if self.draws == 0 {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let pct = n as f64 * 100.0 / self.draws as f64;
                pct
            }
        };
        for (condset, &n) in &self.counts {
            writeln!(f, "  {condset:<20} {n:>8} {:>6.2}%", share(n))?;
        }
        writeln!(f, "  {:<20} {:>8} {:>6.2}%", "(none)", self.none, share(self.none))
    }
}

/// Simulate uniform draws for every enabled non-device experiment
///
/// Eligibility filters are not applied; every condition takes part.
#[must_use]
pub fn simulate(set: &ExperimentSet, draws: u64, seed: u64) -> Vec<Distribution> {
    let mut draw = UniformDraw::seeded(seed);
    set.active_experiments()
        .into_iter()
        .filter(|entry| entry.experiment.scope != Scope::Device)
        .map(|entry| {
            let mut counts: IndexMap<String, u64> = entry
                .ordered_conditions()
                .map(|c| (c.condset.clone(), 0))
                .collect();
            let mut none = 0;
            for _ in 0..draws {
                match BucketSelector::Uniform(draw.roll()).select(entry.ordered_conditions()) {
                    Some(c) => *counts.entry(c.condset.clone()).or_default() += 1,
                    None => none += 1,
                }
            }
            Distribution {
                experiment: entry.shortname().to_string(),
                scope: entry.experiment.scope,
                counts,
                none,
                draws,
            }
        })
        .collect()
}

/// Where a device lands in one device experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlacement {
    /// Experiment shortname
    pub experiment: String,
    /// Experiment offset
    pub numeric_offset: u8,
    /// Bucket after the offset
    pub bucket: u32,
    /// Winning condset
    pub condset: Option<String>,
}

/// Device bucketing summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketReport {
    /// Fingerprint of the device
    pub fingerprint: DeviceFingerprint,
    /// Bucket before any offset
    pub base_bucket: u32,
    /// One row per enabled device experiment
    pub placements: Vec<DevicePlacement>,
}

impl fmt::Display for BucketReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fingerprint {}", self.fingerprint)?;
        writeln!(f, "base bucket {}", self.base_bucket)?;
        for p in &self.placements {
            writeln!(
                f,
                "  {:<20} offset {:>2} bucket {:>2} -> {}",
                p.experiment,
                p.numeric_offset,
                p.bucket,
                p.condset.as_deref().unwrap_or("(none)")
            )?;
        }
        Ok(())
    }
}

/// Place a device in every enabled device experiment
///
/// Allow lists apply, as they would in the pre-session hook.
#[must_use]
pub fn bucket(set: &ExperimentSet, remote_address: &str, user_agent: &str) -> BucketReport {
    let fingerprint = DeviceFingerprint::compute(remote_address, user_agent);
    let requester = Requester::new()
        .with_remote_address(remote_address)
        .with_user_agent(user_agent);
    let rules = Eligibility::for_scope(Scope::Device);

    let placements = set
        .active(Scope::Device)
        .into_iter()
        .map(|entry| {
            let offset = entry.experiment.numeric_offset;
            let selector = BucketSelector::for_device(&fingerprint, offset);
            DevicePlacement {
                experiment: entry.shortname().to_string(),
                numeric_offset: offset,
                bucket: selector.key(),
                condset: selector
                    .select(rules.eligible_conditions(&entry, &requester))
                    .map(|c| c.condset.clone()),
            }
        })
        .collect();

    BucketReport {
        fingerprint,
        base_bucket: fingerprint.base_bucket(),
        placements,
    }
}

/// A command line that would be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Experiment shortname
    pub experiment: String,
    /// Condset holding the line
    pub condset: String,
    /// The stored line
    pub line: String,
    /// Parse error
    pub error: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: `{}`: {}",
            self.experiment, self.condset, self.line, self.error
        )
    }
}

/// Malformed command lines across every experiment, enabled or not
#[must_use]
pub fn check(set: &ExperimentSet) -> Vec<Problem> {
    let mut problems = Vec::new();
    for entry in set.iter() {
        for condition in entry.ordered_conditions() {
            for (line, parsed) in condition.commands.parsed() {
                if let Err(e) = parsed {
                    problems.push(Problem {
                        experiment: entry.shortname().to_string(),
                        condset: condition.condset.clone(),
                        line: line.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
    problems
}
