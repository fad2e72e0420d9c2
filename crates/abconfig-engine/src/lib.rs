//! abconfig evaluation engine
//!
//! Decides which condition of each experiment applies to a request and runs
//! its commands against the host:
//! - [`BucketSelector`]: weighted walk over conditions, uniform or stable key
//! - [`Eligibility`]: admin immunity, allow-list exemption, user targeting
//! - [`CommandInterpreter`]: applies `CFG`, headers, log lines and scripts
//! - [`ScopeEvaluator`]: the lifecycle hooks tying it together
//!
//! # Example
//!
//! ```rust
//! use abconfig_engine::{
//!     BufferedHeaders, EngineSettings, Host, MemoryLog, MemorySession, RequestContext,
//!     Requester, ScopeEvaluator, SiteConfig,
//! };
//! use abconfig_model::Scope;
//! use abconfig_store::{ConditionInput, ExperimentUpdate, MemoryRecordStore};
//! use std::sync::Arc;
//!
//! let settings = EngineSettings::default();
//! let manager = Arc::new(settings.experiment_manager(Arc::new(MemoryRecordStore::new())));
//! let id = manager.add_experiment("Theme", "theme", Scope::Request).unwrap();
//! manager
//!     .add_condition(id, ConditionInput {
//!         condset: "classic".into(),
//!         commands: "CFG,theme,classic".into(),
//!         weight: 100,
//!         ..Default::default()
//!     })
//!     .unwrap();
//! manager
//!     .update_experiment("theme", ExperimentUpdate {
//!         name: "Theme".into(),
//!         shortname: "theme".into(),
//!         scope: Scope::Request,
//!         enabled: true,
//!         admin_enabled: false,
//!         numeric_offset: 0,
//!     })
//!     .unwrap();
//!
//! let mut evaluator = ScopeEvaluator::new(manager, settings);
//! let mut ctx = RequestContext::web(Requester::new().with_remote_address("10.1.2.3"));
//! let (mut session, mut config) = (MemorySession::new(), SiteConfig::new());
//! let (mut headers, mut log) = (BufferedHeaders::new(), MemoryLog::new());
//! let mut host = Host {
//!     session: &mut session,
//!     config: &mut config,
//!     headers: &mut headers,
//!     log: &mut log,
//! };
//!
//! let report = evaluator.after_config(&mut ctx, &mut host);
//! assert_eq!(report.fired("theme"), Some("classic"));
//! assert_eq!(config.values["theme"], "classic");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bucket;
pub mod context;
pub mod eligibility;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod interpreter;
pub mod render;
pub mod settings;

pub use bucket::{BucketDraw, BucketSelector, UniformDraw, Weighted};
pub use context::{RequestContext, Requester, RunMode};
pub use eligibility::Eligibility;
pub use error::{EngineError, Result};
pub use evaluator::{EvaluationReport, Firing, ScopeEvaluator, Selection};
pub use host::{
    BufferedHeaders, ConfigStore, HeaderEmitter, Host, LogSink, MemoryLog, MemorySession,
    SessionStore, SiteConfig, TracingLogSink,
};
pub use interpreter::{
    CommandInterpreter, CommandRejection, CommandTarget, ExecutionReport, Outcome, RejectReason,
};
pub use render::{script_tag, RenderScripts, ScriptPosition};
pub use settings::EngineSettings;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
