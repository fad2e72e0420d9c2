//! Command mini-language
//!
//! A command is a single comma-delimited line, verb first:
//!
//! ```text
//! CFG,<name>,<value>
//! forced_plugin_setting,<plugin>,<name>,<value>
//! http_header,<name>,<value>
//! error_log,<message>
//! js_header,<script>
//! js_footer,<script>
//! ```
//!
//! Each verb splits into a fixed number of fields, so the final field keeps
//! any commas it contains. Conditions store their commands as a JSON array of
//! these lines ([`CommandList`]).

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recognised command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `CFG`
    Cfg,
    /// `forced_plugin_setting`
    ForcedPluginSetting,
    /// `http_header`
    HttpHeader,
    /// `error_log`
    ErrorLog,
    /// `js_header`
    JsHeader,
    /// `js_footer`
    JsFooter,
}

impl Verb {
    /// Look up a verb by its leading token
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "CFG" => Some(Self::Cfg),
            "forced_plugin_setting" => Some(Self::ForcedPluginSetting),
            "http_header" => Some(Self::HttpHeader),
            "error_log" => Some(Self::ErrorLog),
            "js_header" => Some(Self::JsHeader),
            "js_footer" => Some(Self::JsFooter),
            _ => None,
        }
    }

    /// Token as written in a command line
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cfg => "CFG",
            Self::ForcedPluginSetting => "forced_plugin_setting",
            Self::HttpHeader => "http_header",
            Self::ErrorLog => "error_log",
            Self::JsHeader => "js_header",
            Self::JsFooter => "js_footer",
        }
    }

    /// Number of comma-separated fields, verb included
    #[inline]
    #[must_use]
    pub const fn field_count(self) -> usize {
        match self {
            Self::Cfg | Self::HttpHeader => 3,
            Self::ForcedPluginSetting => 4,
            Self::ErrorLog | Self::JsHeader | Self::JsFooter => 2,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a global config key
    Cfg {
        /// Config key
        name: String,
        /// New value
        value: String,
    },
    /// Set a per-plugin forced setting
    ForcedPluginSetting {
        /// Plugin component name
        plugin: String,
        /// Setting name within the plugin
        name: String,
        /// New value
        value: String,
    },
    /// Emit a raw response header
    HttpHeader {
        /// Header name
        name: String,
        /// Header value
        value: String,
    },
    /// Write a line to the error log
    ErrorLog {
        /// Line to write
        message: String,
    },
    /// Queue a script for the page header
    JsHeader {
        /// Script body
        body: String,
    },
    /// Queue a script for the page footer
    JsFooter {
        /// Script body
        body: String,
    },
    /// Unrecognised verb, ignored on execution
    Unknown {
        /// The original line
        raw: String,
    },
}

impl Command {
    /// Parse one command line
    ///
    /// Unknown verbs parse successfully into [`Command::Unknown`].
    ///
    /// # Errors
    /// Returns [`ModelError::MalformedCommand`] when a known verb has too few fields
    pub fn parse(line: &str) -> Result<Self> {
        let token = line.split(',').next().unwrap_or_default();
        let Some(verb) = Verb::from_token(token) else {
            return Ok(Self::Unknown {
                raw: line.to_string(),
            });
        };

        let expected = verb.field_count();
        let fields: Vec<&str> = line.splitn(expected, ',').collect();
        if fields.len() != expected {
            return Err(ModelError::malformed(verb.as_str(), expected, fields.len()));
        }
        let field = |i: usize| fields[i].to_string();

        Ok(match verb {
            Verb::Cfg => Self::Cfg {
                name: field(1),
                value: field(2),
            },
            Verb::ForcedPluginSetting => Self::ForcedPluginSetting {
                plugin: field(1),
                name: field(2),
                value: field(3),
            },
            Verb::HttpHeader => Self::HttpHeader {
                name: field(1),
                value: field(2),
            },
            Verb::ErrorLog => Self::ErrorLog { message: field(1) },
            Verb::JsHeader => Self::JsHeader { body: field(1) },
            Verb::JsFooter => Self::JsFooter { body: field(1) },
        })
    }

    /// Verb of this command, `None` when unknown
    #[must_use]
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Self::Cfg { .. } => Some(Verb::Cfg),
            Self::ForcedPluginSetting { .. } => Some(Verb::ForcedPluginSetting),
            Self::HttpHeader { .. } => Some(Verb::HttpHeader),
            Self::ErrorLog { .. } => Some(Verb::ErrorLog),
            Self::JsHeader { .. } => Some(Verb::JsHeader),
            Self::JsFooter { .. } => Some(Verb::JsFooter),
            Self::Unknown { .. } => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cfg { name, value } | Self::HttpHeader { name, value } => {
                let verb = self.verb().map_or("", Verb::as_str);
                write!(f, "{verb},{name},{value}")
            }
            Self::ForcedPluginSetting {
                plugin,
                name,
                value,
            } => write!(f, "forced_plugin_setting,{plugin},{name},{value}"),
            Self::ErrorLog { message } => write!(f, "error_log,{message}"),
            Self::JsHeader { body } => write!(f, "js_header,{body}"),
            Self::JsFooter { body } => write!(f, "js_footer,{body}"),
            Self::Unknown { raw } => f.write_str(raw),
        }
    }
}

/// Ordered command lines stored on a condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandList(Vec<String>);

impl CommandList {
    /// Wrap already-split command lines
    #[inline]
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// Build from operator input, one command per line
    ///
    /// Lines are trimmed and blank lines dropped.
    #[must_use]
    pub fn from_authoring_text(text: &str) -> Self {
        Self(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Decode the stored JSON form
    ///
    /// An empty string or `null` decodes to an empty list.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidCommandList`] if the JSON is not an array of strings
    pub fn from_json(json: &str) -> Result<Self> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let lines: Option<Vec<String>> = serde_json::from_str(trimmed)?;
        Ok(Self(lines.unwrap_or_default()))
    }

    /// Encode to the stored JSON form
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidCommandList`] if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Iterate raw command lines
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Iterate lines paired with their parse result
    pub fn parsed(&self) -> impl Iterator<Item = (&str, Result<Command>)> {
        self.iter().map(|line| (line, Command::parse(line)))
    }

    /// Number of lines
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no lines
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for CommandList {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl<'a> FromIterator<&'a str> for CommandList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}
