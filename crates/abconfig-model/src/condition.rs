//! Conditions: weighted variants of an experiment

use crate::allow_list::IpAllowList;
use crate::command::CommandList;
use crate::experiment::ExperimentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Record-store identifier of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(pub i64);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One weighted variant of an experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Record id
    pub id: ConditionId,
    /// Owning experiment
    pub experiment_id: ExperimentId,
    /// Name, unique within the experiment
    pub condset: String,
    /// Addresses exempted from this condition
    #[serde(default)]
    pub ip_allow_list: IpAllowList,
    /// Commands applied when this condition wins
    #[serde(default)]
    pub commands: CommandList,
    /// Share of the 100-point draw
    pub weight: u32,
    /// Restricts the condition to these users; empty means everyone
    #[serde(default)]
    pub users: BTreeSet<i64>,
}

impl Condition {
    /// Whether the condition applies to the given user
    #[must_use]
    pub fn targets_user(&self, user_id: Option<i64>) -> bool {
        self.users.is_empty() || user_id.is_some_and(|id| self.users.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(users: &[i64]) -> Condition {
        Condition {
            id: ConditionId(1),
            experiment_id: ExperimentId(1),
            condset: "a".into(),
            ip_allow_list: IpAllowList::default(),
            commands: CommandList::default(),
            weight: 50,
            users: users.iter().copied().collect(),
        }
    }

    #[test]
    fn empty_user_list_targets_everyone() {
        let c = condition(&[]);
        assert!(c.targets_user(Some(7)));
        assert!(c.targets_user(None));
    }

    #[test]
    fn user_list_restricts_targets() {
        let c = condition(&[2, 7]);
        assert!(c.targets_user(Some(7)));
        assert!(!c.targets_user(Some(3)));
        assert!(!c.targets_user(None));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"id":4,"experiment_id":1,"condset":"b","weight":20,
                       "commands":["CFG,theme,classic"]}"#;
        let c: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(c.commands.len(), 1);
        assert!(c.users.is_empty());
        assert!(c.ip_allow_list.is_empty());
    }
}
