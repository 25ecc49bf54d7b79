//! Safety Analyzer: classifies a shell command by what it would actually
//! do to the cluster, walking a real (if small) shell AST rather than
//! matching substrings against the raw string.
//!
//! Grounded in the risk-level tiers the host used to derive from string
//! matching alone (`kubectl delete` -> high, `kubectl apply` -> medium,
//! `kubectl get` -> low); the classes below generalize that same tree to
//! every simple command an agent's tool call might run, not just kubectl.

mod ast;
mod classifier;

pub use ast::{ShellNode, ShellParseError, SimpleCommand};
pub use classifier::{classify, ClassificationOutcome};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyClass {
    /// Never mutates cluster or host state.
    ReadOnly,
    /// Mutates state but runs unattended (apply, scale, patch, ...).
    Write,
    /// Needs a live terminal/PTY to be meaningful (exec, edit, port-forward).
    Interactive,
    /// Destructive, irreversible, or explicitly blocked.
    Dangerous,
}

impl SafetyClass {
    pub fn requires_approval(&self) -> bool {
        !matches!(self, SafetyClass::ReadOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyClass::ReadOnly => "read_only",
            SafetyClass::Write => "write",
            SafetyClass::Interactive => "interactive",
            SafetyClass::Dangerous => "dangerous",
        }
    }
}

impl std::fmt::Display for SafetyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the Safety Analyzer, sourced from `safety.*` in the
/// host's config file.
#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    pub blocked_patterns: Vec<Regex>,
    pub protected_namespaces: Vec<String>,
    pub block_dangerous: bool,
    /// `safety.auto_approve_readonly`: skip the Approval Channel for
    /// `ReadOnly` classified commands.
    pub auto_approve_readonly: bool,
    /// `safety.require_approval_for_write`: gate `Write` classified
    /// commands on the Approval Channel (default true).
    pub require_approval_for_write: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            blocked_patterns: Vec::new(),
            protected_namespaces: vec!["kube-system".to_string()],
            block_dangerous: false,
            auto_approve_readonly: true,
            require_approval_for_write: true,
        }
    }
}

impl SafetyPolicy {
    pub fn with_blocked_patterns(patterns: &[String]) -> Result<Self, SafetyError> {
        let blocked_patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| SafetyError::InvalidPattern(p.clone(), e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { blocked_patterns, ..Self::default() })
    }
}

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("command is empty")]
    InvalidInput,

    #[error("invalid blocked-pattern regex `{0}`: {1}")]
    InvalidPattern(String, String),

    #[error("command classified as dangerous and blocked by policy: {0}")]
    Blocked(String),
}
