//! Eligibility
//!
//! One rule set shared by every scope evaluator, parameterized by whether the
//! scope grants admins immunity and whether it honours user targeting.
//! Device scope does neither; every scope applies the allow-list exemption.

use crate::context::Requester;
use abconfig_model::{Condition, Experiment, Scope};
use abconfig_store::ExperimentEntry;

/// Requester filter for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    admin_immunity: bool,
    user_targeting: bool,
}

impl Eligibility {
    /// Rules for a scope
    #[inline]
    #[must_use]
    pub const fn for_scope(scope: Scope) -> Self {
        Self {
            admin_immunity: scope.admin_immune(),
            user_targeting: scope.user_targeting(),
        }
    }

    /// Whether admins are skipped unless the experiment opts them in
    #[inline]
    #[must_use]
    pub const fn admin_immunity(&self) -> bool {
        self.admin_immunity
    }

    /// Whether the experiment runs for this requester at all
    #[inline]
    #[must_use]
    pub fn experiment_applies(&self, experiment: &Experiment, requester: &Requester) -> bool {
        !(self.admin_immunity && requester.is_admin && !experiment.admin_enabled)
    }

    /// Whether one condition may be selected for this requester
    #[must_use]
    pub fn condition_eligible(&self, condition: &Condition, requester: &Requester) -> bool {
        if self.user_targeting && !condition.targets_user(requester.user_id) {
            return false;
        }
        !condition
            .ip_allow_list
            .contains_remote(requester.remote_address.as_deref())
    }

    /// Eligible conditions of an experiment, in stored order
    #[must_use]
    pub fn eligible_conditions<'a>(
        &self,
        entry: &'a ExperimentEntry,
        requester: &Requester,
    ) -> Vec<&'a Condition> {
        entry
            .ordered_conditions()
            .filter(|c| self.condition_eligible(c, requester))
            .collect()
    }
}
