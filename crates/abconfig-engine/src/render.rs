//! Render-script registry
//!
//! `js_header` and `js_footer` commands do not write to the page directly.
//! They park a script body here under `<position>_<shortname>`, and the
//! header and footer render hooks emit it later. The first body registered
//! under a key wins.

use indexmap::IndexMap;
use std::fmt;

/// Where a deferred script is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptPosition {
    /// Before the HTTP headers go out
    Header,
    /// Before the page footer
    Footer,
}

impl ScriptPosition {
    /// Key prefix for this position
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "js_header",
            Self::Footer => "js_footer",
        }
    }

    /// Registry key for an experiment's script at this position
    #[inline]
    #[must_use]
    pub fn key(self, shortname: &str) -> String {
        format!("{}_{shortname}", self.as_str())
    }
}

impl fmt::Display for ScriptPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending scripts for the current request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderScripts {
    scripts: IndexMap<String, String>,
}

impl RenderScripts {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script unless the key is taken
    ///
    /// Returns whether the body was stored.
    pub fn set(&mut self, key: impl Into<String>, body: impl Into<String>) -> bool {
        match self.scripts.entry(key.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(body.into());
                true
            }
        }
    }

    /// Pending body for a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.scripts.get(key).map(String::as_str)
    }

    /// Every pending script in registration order
    #[inline]
    #[must_use]
    pub fn all(&self) -> &IndexMap<String, String> {
        &self.scripts
    }

    /// Drop a pending script
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.scripts.shift_remove(key)
    }

    /// Number of pending scripts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Wrap a script body in an inline `<script>` element
#[must_use]
pub fn script_tag(body: &str) -> String {
    format!("<script type='text/javascript'>{body}</script>")
}
