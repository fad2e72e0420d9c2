//! Scope evaluators
//!
//! The lifecycle hooks a host calls during a request:
//!
//! | hook | runs | does |
//! |---|---|---|
//! | [`after_config`](ScopeEvaluator::after_config) | early boot | overrides, request draws, session replay |
//! | [`before_session`](ScopeEvaluator::before_session) | before the session starts | device overrides and stable buckets |
//! | [`after_require_login`](ScopeEvaluator::after_require_login) | once the user is known | one-time session roll |
//! | [`before_http_headers`](ScopeEvaluator::before_http_headers) | before headers | emit header scripts |
//! | [`before_footer`](ScopeEvaluator::before_footer) | before the footer | emit footer scripts |
//!
//! Each hook collects the winning conditions first, then runs their commands
//! in selection order. The two early hooks swallow errors because the host
//! may still be initializing; the `try_` variants propagate them.

use crate::bucket::{BucketDraw, BucketSelector, UniformDraw};
use crate::context::{RequestContext, RunMode};
use crate::eligibility::Eligibility;
use crate::error::Result;
use crate::host::Host;
use crate::interpreter::{CommandInterpreter, CommandTarget, ExecutionReport};
use crate::render::{script_tag, ScriptPosition};
use crate::settings::EngineSettings;
use abconfig_model::{DeviceFingerprint, Scope};
use abconfig_store::{ExperimentEntry, ExperimentSet, ExperimentSource};
use rand::rngs::ThreadRng;
use std::collections::HashSet;
use std::sync::Arc;

/// How a condition came to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Named explicitly by a request parameter or environment variable
    Override,
    /// Uniform draw with this value
    Draw(u32),
    /// Stable device bucket with this value
    Hash(u32),
    /// Memoized session choice
    Replay,
}

/// A condition that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    /// Experiment shortname
    pub experiment: String,
    /// Winning condset
    pub condset: String,
    /// How it was chosen
    pub selection: Selection,
}

/// Outcome of one hook call
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Whether the disable parameter short-circuited the hook
    pub disabled: bool,
    /// Conditions that fired, in execution order
    pub firings: Vec<Firing>,
    /// Tally of the commands that ran
    pub execution: ExecutionReport,
}

impl EvaluationReport {
    fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Condset that fired for an experiment, if any
    #[must_use]
    pub fn fired(&self, shortname: &str) -> Option<&str> {
        self.firings
            .iter()
            .find(|f| f.experiment == shortname)
            .map(|f| f.condset.as_str())
    }
}

struct Selected {
    entry: Arc<ExperimentEntry>,
    condset: String,
    selection: Selection,
}

/// Drives the lifecycle hooks against an experiment source
pub struct ScopeEvaluator<S, D = UniformDraw<ThreadRng>> {
    source: S,
    settings: EngineSettings,
    draw: D,
}

impl<S: std::fmt::Debug, D> std::fmt::Debug for ScopeEvaluator<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeEvaluator")
            .field("source", &self.source)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: ExperimentSource> ScopeEvaluator<S> {
    /// Evaluator drawing from the thread-local generator
    #[must_use]
    pub fn new(source: S, settings: EngineSettings) -> Self {
        Self {
            source,
            settings,
            draw: UniformDraw::default(),
        }
    }
}

impl<S: ExperimentSource, D: BucketDraw> ScopeEvaluator<S, D> {
    /// Replace the draw source
    #[must_use]
    pub fn with_draw<E: BucketDraw>(self, draw: E) -> ScopeEvaluator<S, E> {
        ScopeEvaluator {
            source: self.source,
            settings: self.settings,
            draw,
        }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Experiment source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Early-boot hook; errors are logged and dropped
    pub fn after_config(&mut self, ctx: &mut RequestContext, host: &mut Host<'_>) -> EvaluationReport {
        self.try_after_config(ctx, host).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "after_config evaluation skipped");
            EvaluationReport::default()
        })
    }

    /// Early-boot hook
    ///
    /// Applies explicit overrides, draws request and after-config scope
    /// experiments, and replays memoized session choices.
    ///
    /// # Errors
    /// Returns the store error when the dataset cannot be read
    pub fn try_after_config(
        &mut self,
        ctx: &mut RequestContext,
        host: &mut Host<'_>,
    ) -> Result<EvaluationReport> {
        if ctx.requester.is_admin && ctx.disabled_by(&self.settings.disable_param) {
            return Ok(EvaluationReport::disabled());
        }
        let snapshot = self.source.snapshot()?;
        let mut plan = Vec::new();

        let overridden = self.after_config_overrides(&snapshot, ctx, &mut plan);

        for entry in snapshot.active_experiments() {
            let scope = entry.experiment.scope;
            let drawn = match scope {
                Scope::Request => true,
                Scope::AfterConfig => !overridden.contains(entry.shortname()),
                Scope::Session | Scope::Device => false,
            };
            if !drawn {
                continue;
            }
            let rules = Eligibility::for_scope(scope);
            if !rules.experiment_applies(&entry.experiment, &ctx.requester) {
                continue;
            }
            let num = self.draw.roll();
            let winner = BucketSelector::Uniform(num)
                .select(rules.eligible_conditions(&entry, &ctx.requester))
                .map(|c| c.condset.clone());
            if let Some(condset) = winner {
                plan.push(Selected {
                    entry,
                    condset,
                    selection: Selection::Draw(num),
                });
            }
        }

        for entry in snapshot.active(Scope::Session) {
            let key = self.settings.session_key(entry.shortname());
            let Some(condset) = host.session.get(&key).filter(|c| !c.is_empty()) else {
                continue;
            };
            if entry.condition(&condset).is_none() {
                tracing::debug!(
                    experiment = entry.shortname(),
                    condset = %condset,
                    "memoized condset no longer exists"
                );
                continue;
            }
            plan.push(Selected {
                entry,
                condset,
                selection: Selection::Replay,
            });
        }

        Ok(Self::run(plan, ctx, host))
    }

    /// Pre-session hook; errors are logged and dropped
    pub fn before_session(&mut self, ctx: &mut RequestContext, host: &mut Host<'_>) -> EvaluationReport {
        self.try_before_session(ctx, host).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "before_session evaluation skipped");
            EvaluationReport::default()
        })
    }

    /// Pre-session hook for device experiments
    ///
    /// Needs both a client address and a user agent; without them nothing
    /// happens. The disable parameter applies to every requester here.
    ///
    /// # Errors
    /// Returns the store error when the dataset cannot be read
    pub fn try_before_session(
        &mut self,
        ctx: &mut RequestContext,
        host: &mut Host<'_>,
    ) -> Result<EvaluationReport> {
        let fingerprint = match (
            ctx.requester.remote_address.as_deref(),
            ctx.requester.user_agent.as_deref(),
        ) {
            (Some(addr), Some(ua)) => DeviceFingerprint::compute(addr, ua),
            _ => return Ok(EvaluationReport::default()),
        };
        if ctx.disabled_by(&self.settings.disable_param) {
            return Ok(EvaluationReport::disabled());
        }
        let snapshot = self.source.snapshot()?;
        let mut plan = Vec::new();

        for entry in snapshot.before_session() {
            if let Some(condset) = Self::requested(&entry, ctx.param(entry.shortname())) {
                plan.push(Selected {
                    entry,
                    condset,
                    selection: Selection::Override,
                });
            }
        }

        let rules = Eligibility::for_scope(Scope::Device);
        for entry in snapshot.active(Scope::Device) {
            let selector = BucketSelector::for_device(&fingerprint, entry.experiment.numeric_offset);
            let winner = selector
                .select(rules.eligible_conditions(&entry, &ctx.requester))
                .map(|c| c.condset.clone());
            if let Some(condset) = winner {
                plan.push(Selected {
                    entry,
                    condset,
                    selection: Selection::Hash(selector.key()),
                });
            }
        }

        Ok(Self::run(plan, ctx, host))
    }

    /// Post-login hook, best effort like the early-boot hooks
    ///
    /// Errors are logged at debug level and dropped; embedders that need
    /// them call [`Self::try_after_require_login`].
    pub fn after_require_login(
        &mut self,
        ctx: &mut RequestContext,
        host: &mut Host<'_>,
    ) -> EvaluationReport {
        self.try_after_require_login(ctx, host).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "after_require_login evaluation skipped");
            EvaluationReport::default()
        })
    }

    /// Post-login hook: roll every session experiment not yet decided
    ///
    /// The outcome, a condset or the empty string for no winner, is stored
    /// in the session so it is never rolled again.
    ///
    /// # Errors
    /// Returns the store error when the dataset cannot be read
    pub fn try_after_require_login(
        &mut self,
        ctx: &mut RequestContext,
        host: &mut Host<'_>,
    ) -> Result<EvaluationReport> {
        if ctx.requester.is_admin && ctx.disabled_by(&self.settings.disable_param) {
            return Ok(EvaluationReport::disabled());
        }
        let snapshot = self.source.snapshot()?;
        let rules = Eligibility::for_scope(Scope::Session);
        let mut plan = Vec::new();

        for entry in snapshot.active(Scope::Session) {
            if !rules.experiment_applies(&entry.experiment, &ctx.requester) {
                continue;
            }
            let key = self.settings.session_key(entry.shortname());
            if host.session.has(&key) {
                continue;
            }
            let num = self.draw.roll();
            let winner = BucketSelector::Uniform(num)
                .select(rules.eligible_conditions(&entry, &ctx.requester))
                .map(|c| c.condset.clone());
            host.session.set(&key, winner.clone().unwrap_or_default());
            tracing::debug!(
                experiment = entry.shortname(),
                condset = winner.as_deref().unwrap_or(""),
                num,
                "session experiment decided"
            );
            if let Some(condset) = winner {
                plan.push(Selected {
                    entry,
                    condset,
                    selection: Selection::Draw(num),
                });
            }
        }

        Ok(Self::run(plan, ctx, host))
    }

    /// Header render hook
    pub fn before_http_headers(&self, ctx: &mut RequestContext) -> String {
        self.render(ScriptPosition::Header, ctx)
    }

    /// Footer render hook
    pub fn before_footer(&self, ctx: &mut RequestContext) -> String {
        self.render(ScriptPosition::Footer, ctx)
    }

    /// Emit pending scripts for a position; errors are logged at debug level
    /// and yield no output
    pub fn render(&self, position: ScriptPosition, ctx: &mut RequestContext) -> String {
        self.try_render(position, ctx).unwrap_or_else(|e| {
            tracing::debug!(error = %e, %position, "script rendering skipped");
            String::new()
        })
    }

    /// Emit pending scripts for a position
    ///
    /// Scripts of request-scope or disabled experiments are consumed; the
    /// rest stay registered.
    ///
    /// # Errors
    /// Returns the store error when the dataset cannot be read
    pub fn try_render(&self, position: ScriptPosition, ctx: &mut RequestContext) -> Result<String> {
        if ctx.requester.is_admin && ctx.disabled_by(&self.settings.disable_param) {
            return Ok(String::new());
        }
        let snapshot = self.source.snapshot()?;
        let mut html = String::new();
        for entry in snapshot.iter() {
            let key = position.key(entry.shortname());
            if let Some(body) = ctx.scripts.get(&key) {
                html.push_str(&script_tag(body));
            }
            if entry.experiment.scope == Scope::Request || !entry.experiment.enabled {
                ctx.scripts.remove(&key);
            }
        }
        Ok(html)
    }

    fn after_config_overrides(
        &self,
        snapshot: &ExperimentSet,
        ctx: &RequestContext,
        plan: &mut Vec<Selected>,
    ) -> HashSet<String> {
        let mut overridden = HashSet::new();
        for entry in snapshot.after_config() {
            let requested = match ctx.mode {
                RunMode::Cli => ctx.env_var(&self.settings.env_var(entry.shortname())),
                // Only admins may force conditions from the URL
                RunMode::Web if !ctx.requester.is_admin => break,
                RunMode::Web => ctx.param(entry.shortname()),
            };
            if let Some(condset) = Self::requested(&entry, requested) {
                overridden.insert(entry.shortname().to_string());
                plan.push(Selected {
                    entry,
                    condset,
                    selection: Selection::Override,
                });
            }
        }
        overridden
    }

    fn requested(entry: &ExperimentEntry, value: Option<&str>) -> Option<String> {
        let condset = value.filter(|v| !v.is_empty())?;
        if entry.condition(condset).is_none() {
            tracing::debug!(experiment = entry.shortname(), condset, "override names unknown condset");
            return None;
        }
        Some(condset.to_string())
    }

    fn run(plan: Vec<Selected>, ctx: &mut RequestContext, host: &mut Host<'_>) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        let mut target = CommandTarget {
            config: &mut *host.config,
            headers: &mut *host.headers,
            log: &mut *host.log,
            scripts: &mut ctx.scripts,
        };
        for selected in plan {
            let Some(condition) = selected.entry.condition(&selected.condset) else {
                continue;
            };
            let shortname = selected.entry.shortname();
            tracing::debug!(
                experiment = shortname,
                condset = %selected.condset,
                selection = ?selected.selection,
                "condition fired"
            );
            report
                .execution
                .merge(CommandInterpreter::execute(&condition.commands, shortname, &mut target));
            report.firings.push(Firing {
                experiment: shortname.to_string(),
                condset: selected.condset,
                selection: selected.selection,
            });
        }
        report
    }
}
