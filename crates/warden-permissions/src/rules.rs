//! User-configured command rules, matched with globs.

use crate::types::{OperationKind, WarningLevel};
use serde::{Deserialize, Serialize};

/// Permission level for a configured rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Permit,
    Block,
    Prompt,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Block => "block",
            Self::Prompt => "prompt",
        }
    }

    /// Classification a matching command receives.
    pub fn classification(&self) -> (OperationKind, WarningLevel) {
        match self {
            Self::Permit => (OperationKind::ShellSafe, WarningLevel::Info),
            Self::Prompt => (OperationKind::ShellRisky, WarningLevel::Caution),
            Self::Block => (OperationKind::ShellForbidden, WarningLevel::Forbidden),
        }
    }
}

/// A single rule matching shell commands by glob (e.g. `cargo test*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRule {
    pub command: String,
    pub level: PermissionLevel,
}

impl CommandRule {
    pub fn new(command: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            command: command.into(),
            level,
        }
    }
}

/// Result of evaluating rules: the winning level + a human-readable description.
#[derive(Debug, Clone)]
pub struct EvaluateResult {
    pub level: PermissionLevel,
    pub description: String,
}

/// Evaluates configured `CommandRule`s against a command line.
pub struct RuleMatcher;

impl RuleMatcher {
    /// Check if a rule matches the given (already normalized) command.
    ///
    /// Matching is case-insensitive. A pattern that fails to parse as a glob
    /// falls back to exact comparison.
    pub fn matches(rule: &CommandRule, command: &str) -> bool {
        let pattern = rule.command.trim();
        if pattern == "*" {
            return true;
        }

        match globset::GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
        {
            Ok(glob) => glob.compile_matcher().is_match(command),
            Err(_) => pattern.eq_ignore_ascii_case(command),
        }
    }

    /// Find the highest-priority matching rule.
    ///
    /// Priority: block > permit > prompt. Returns None if no rules match.
    pub fn evaluate(rules: &[CommandRule], command: &str) -> Option<EvaluateResult> {
        let matching: Vec<&CommandRule> = rules
            .iter()
            .filter(|r| Self::matches(r, command))
            .collect();

        let winner = matching
            .iter()
            .find(|r| r.level == PermissionLevel::Block)
            .or_else(|| matching.iter().find(|r| r.level == PermissionLevel::Permit))
            .or_else(|| matching.first())?;

        Some(EvaluateResult {
            level: winner.level,
            description: Self::describe_rule(winner),
        })
    }

    fn describe_rule(rule: &CommandRule) -> String {
        format!("rule: {} -> {}", rule.command, rule.level.as_str())
    }
}
