//! abconfig data model
//!
//! Types shared by every layer of the experiment engine:
//! - [`Experiment`] and its [`Scope`]
//! - [`Condition`], one weighted variant of an experiment
//! - [`Command`], the verb-first mini-language stored on conditions
//! - [`IpAllowList`], addresses exempted from a condition
//! - [`DeviceFingerprint`], the stable device hash used by device scope
//!
//! # Example
//!
//! ```rust
//! use abconfig_model::Command;
//!
//! let command = Command::parse("CFG,theme,classic").unwrap();
//! assert_eq!(
//!     command,
//!     Command::Cfg { name: "theme".into(), value: "classic".into() }
//! );
//! assert_eq!(command.to_string(), "CFG,theme,classic");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod allow_list;
pub mod command;
pub mod condition;
pub mod error;
pub mod experiment;
pub mod fingerprint;

pub use allow_list::IpAllowList;
pub use command::{Command, CommandList, Verb};
pub use condition::{Condition, ConditionId};
pub use error::{ModelError, Result};
pub use experiment::{validate_offset, validate_shortname, Experiment, ExperimentId, Scope};
pub use fingerprint::DeviceFingerprint;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
