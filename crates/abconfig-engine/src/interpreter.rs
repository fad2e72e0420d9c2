//! Command interpreter
//!
//! Applies a condition's command lines to the host, one at a time and in
//! order. A line that cannot be applied is recorded and skipped; the rest of
//! the sequence still runs.

use crate::host::{ConfigStore, HeaderEmitter, LogSink};
use crate::render::{RenderScripts, ScriptPosition};
use abconfig_model::{Command, CommandList, ModelError};

/// Suffix of the flag that lets a statically fixed setting be overridden
const ALLOW_SUFFIX: &str = "_allow_abconfig";

/// Everything a command can write to
pub struct CommandTarget<'a> {
    /// Site configuration
    pub config: &'a mut dyn ConfigStore,
    /// Header stream
    pub headers: &'a mut dyn HeaderEmitter,
    /// Error log
    pub log: &'a mut dyn LogSink,
    /// Render-script registry of the request
    pub scripts: &'a mut RenderScripts,
}

impl std::fmt::Debug for CommandTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTarget")
            .field("scripts", &self.scripts)
            .finish_non_exhaustive()
    }
}

/// Why a command line was skipped
#[derive(Debug, thiserror::Error)]
pub enum RejectReason {
    /// Config key fixed by static configuration without an override flag
    #[error("can't override config `{name}`: already set in static configuration")]
    ConfigAlreadySet {
        /// Config key
        name: String,
    },

    /// Plugin setting forced by static configuration without an override flag
    #[error("can't override forced setting `{plugin}/{name}`: already set in static configuration")]
    PluginSettingAlreadySet {
        /// Plugin component
        plugin: String,
        /// Setting name
        name: String,
    },

    /// Header stream already flushed
    #[error("headers already sent, dropped `{name}`")]
    HeadersAlreadySent {
        /// Header name
        name: String,
    },

    /// Known verb with missing fields
    #[error(transparent)]
    Malformed(#[from] ModelError),
}

/// A skipped command line
#[derive(Debug)]
pub struct CommandRejection {
    /// Experiment the line belongs to
    pub experiment: String,
    /// The stored line
    pub line: String,
    /// Why it was skipped
    pub reason: RejectReason,
}

/// Result of applying one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command took effect
    Applied,
    /// Unknown verb, or a script whose key was already taken
    Ignored,
}

/// Tally of a command sequence run
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Commands that took effect
    pub applied: usize,
    /// Commands with nothing to do
    pub ignored: usize,
    /// Commands that were skipped
    pub rejected: Vec<CommandRejection>,
}

impl ExecutionReport {
    /// Whether nothing was rejected
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ExecutionReport) {
        self.applied += other.applied;
        self.ignored += other.ignored;
        self.rejected.extend(other.rejected);
    }
}

/// Applies command lines to a [`CommandTarget`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInterpreter;

impl CommandInterpreter {
    /// Run every line of a condition, in order
    pub fn execute(
        commands: &CommandList,
        shortname: &str,
        target: &mut CommandTarget<'_>,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for (line, parsed) in commands.parsed() {
            let outcome = parsed
                .map_err(RejectReason::from)
                .and_then(|command| Self::apply(&command, shortname, target));
            match outcome {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::Ignored) => report.ignored += 1,
                Err(reason) => {
                    tracing::warn!(experiment = shortname, line, %reason, "command skipped");
                    report.rejected.push(CommandRejection {
                        experiment: shortname.to_string(),
                        line: line.to_string(),
                        reason,
                    });
                }
            }
        }
        report
    }

    /// Apply one parsed command
    ///
    /// Precedence rejections are also written to the host log as warnings.
    ///
    /// # Errors
    /// Returns the [`RejectReason`] when the command cannot take effect
    pub fn apply(
        command: &Command,
        shortname: &str,
        target: &mut CommandTarget<'_>,
    ) -> Result<Outcome, RejectReason> {
        match command {
            Command::Cfg { name, value } => {
                let allow = target.config.get(&format!("{name}{ALLOW_SUFFIX}")).is_some();
                if !allow && target.config.is_fixed(name) {
                    return Err(Self::reject(
                        target,
                        RejectReason::ConfigAlreadySet { name: name.clone() },
                    ));
                }
                target.config.set(name, value);
            }
            Command::ForcedPluginSetting {
                plugin,
                name,
                value,
            } => {
                let forced = target.config.forced_plugin_setting(plugin, name).is_some();
                let allow = target
                    .config
                    .forced_plugin_setting(plugin, &format!("{name}{ALLOW_SUFFIX}"))
                    .is_some();
                if forced && !allow {
                    return Err(Self::reject(
                        target,
                        RejectReason::PluginSettingAlreadySet {
                            plugin: plugin.clone(),
                            name: name.clone(),
                        },
                    ));
                }
                target.config.set_forced_plugin_setting(plugin, name, value);
            }
            Command::HttpHeader { name, value } => {
                target
                    .headers
                    .emit(name, value)
                    .map_err(|_| RejectReason::HeadersAlreadySent { name: name.clone() })?;
            }
            Command::ErrorLog { message } => target.log.error_log(message),
            Command::JsHeader { body } => {
                return Ok(Self::register(target, ScriptPosition::Header, shortname, body));
            }
            Command::JsFooter { body } => {
                return Ok(Self::register(target, ScriptPosition::Footer, shortname, body));
            }
            Command::Unknown { .. } => return Ok(Outcome::Ignored),
        }
        Ok(Outcome::Applied)
    }

    fn register(
        target: &mut CommandTarget<'_>,
        position: ScriptPosition,
        shortname: &str,
        body: &str,
    ) -> Outcome {
        if target.scripts.set(position.key(shortname), body) {
            Outcome::Applied
        } else {
            Outcome::Ignored
        }
    }

    fn reject(target: &mut CommandTarget<'_>, reason: RejectReason) -> RejectReason {
        target.log.warn(&format!("abconfig: {reason}"));
        reason
    }
}
