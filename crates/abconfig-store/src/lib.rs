//! abconfig experiment store
//!
//! The persistence-facing half of the engine:
//! - [`RecordStore`]: CRUD surface the host implements (or [`MemoryRecordStore`])
//! - [`ExperimentManager`]: operator repository plus the evaluator read facade
//! - [`ExperimentCache`]: moka-backed snapshot cache, invalidated on every write
//! - [`AuditSink`]: destination for conditional config-change entries
//!
//! # Example
//!
//! ```rust
//! use abconfig_model::Scope;
//! use abconfig_store::{ConditionInput, ExperimentManager, MemoryRecordStore};
//! use std::sync::Arc;
//!
//! let manager = ExperimentManager::new(Arc::new(MemoryRecordStore::new()));
//! let id = manager.add_experiment("Theme", "theme", Scope::Request).unwrap();
//! manager
//!     .add_condition(id, ConditionInput {
//!         condset: "classic".into(),
//!         commands: "CFG,theme,classic".into(),
//!         weight: 50,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! let snapshot = manager.experiments();
//! assert_eq!(snapshot.get("theme").unwrap().conditions.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod audit;
pub mod cache;
pub mod error;
pub mod manager;
pub mod memory;
pub mod record;
pub mod snapshot;

pub use audit::{AuditSink, ConfigLogEntry, MemoryAuditSink, TracingAuditSink};
pub use cache::ExperimentCache;
pub use error::{RecordKind, Result, StoreError};
pub use manager::{ConditionInput, ExperimentManager, ExperimentUpdate};
pub use memory::MemoryRecordStore;
pub use record::{ConditionFields, ConditionRecord, ExperimentDraft, RecordStore};
pub use snapshot::{ExperimentEntry, ExperimentSet, ExperimentSource, StaticSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
