//! Per-request context
//!
//! Everything a hook needs to know about the current request: who is asking,
//! the request parameters (or environment, for CLI runs), and the render
//! script registry the interpreter writes into.

use crate::render::RenderScripts;
use std::collections::BTreeMap;

/// Who is making the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    /// Client address, absent for CLI runs
    pub remote_address: Option<String>,
    /// User agent header
    pub user_agent: Option<String>,
    /// Logged-in user
    pub user_id: Option<i64>,
    /// Whether the user is a site administrator
    pub is_admin: bool,
}

impl Requester {
    /// Anonymous requester with no address
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With client address
    #[inline]
    #[must_use]
    pub fn with_remote_address(mut self, addr: impl Into<String>) -> Self {
        self.remote_address = Some(addr.into());
        self
    }

    /// With user agent
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// With logged-in user
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// As an administrator
    #[inline]
    #[must_use]
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

/// How the process was entered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Web request; overrides come from request parameters
    #[default]
    Web,
    /// Command-line script; overrides come from the environment
    Cli,
}

/// State of one request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Who is asking
    pub requester: Requester,
    /// Request parameters
    pub params: BTreeMap<String, String>,
    /// Environment, consulted in CLI mode
    pub env: BTreeMap<String, String>,
    /// Web or CLI
    pub mode: RunMode,
    /// Scripts waiting for a render hook
    pub scripts: RenderScripts,
}

impl RequestContext {
    /// Web request context
    #[must_use]
    pub fn web(requester: Requester) -> Self {
        Self {
            requester,
            ..Self::default()
        }
    }

    /// CLI context with the given environment
    #[must_use]
    pub fn cli(env: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            env: env.into_iter().collect(),
            mode: RunMode::Cli,
            ..Self::default()
        }
    }

    /// Builder: add a request parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Builder: add an environment variable
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Request parameter
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Environment variable
    #[inline]
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Whether the disable parameter carries a false value
    #[must_use]
    pub fn disabled_by(&self, disable_param: &str) -> bool {
        self.param(disable_param).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_param_accepts_false_words() {
        for value in ["0", "false", "OFF", " no "] {
            let ctx = RequestContext::default().with_param("abconfig", value);
            assert!(ctx.disabled_by("abconfig"), "{value}");
        }
        for value in ["1", "on", "yes", "exp1"] {
            let ctx = RequestContext::default().with_param("abconfig", value);
            assert!(!ctx.disabled_by("abconfig"), "{value}");
        }
        assert!(!RequestContext::default().disabled_by("abconfig"));
    }

    #[test]
    fn cli_context_reads_env() {
        let ctx = RequestContext::cli([("ABCONFIG_EXP1".to_string(), "a".to_string())]);
        assert_eq!(ctx.mode, RunMode::Cli);
        assert_eq!(ctx.env_var("ABCONFIG_EXP1"), Some("a"));
        assert!(ctx.requester.remote_address.is_none());
    }
}
