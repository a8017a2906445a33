//! Command risk classification.
//!
//! A command is normalized (trimmed, lowercased) and run through an ordered
//! table of rules; the first match wins:
//!
//! 1. Forbidden signatures (root deletes, raw device writes, mkfs, fork bombs,
//!    force pushes to protected branches).
//! 2. User-configured glob rules (only via [`CommandClassifier`]).
//! 3. Read-only prefixes: listing, printing, path queries, git introspection.
//! 4. State-mutating prefixes, with a simple `git push` split out as its own
//!    kind. A push chained with other commands stays risky.
//! 5. Anything else is risky and needs approval.

use crate::rules::{CommandRule, PermissionLevel, RuleMatcher};
use crate::types::{OperationKind, WarningLevel};
use regex::Regex;
use std::sync::LazyLock;

/// How a built-in rule recognizes a command.
#[derive(Debug)]
pub enum Matcher {
    /// Regex searched anywhere in the command.
    Pattern(Regex),
    /// Leading word(s), only for simple commands without pipes, chaining,
    /// redirection or substitution.
    Simple(&'static str),
    /// Leading word(s).
    Prefix(&'static str),
}

impl Matcher {
    fn matches(&self, command: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(command),
            Self::Simple(prefix) => !has_shell_composition(command) && has_prefix(command, prefix),
            Self::Prefix(prefix) => has_prefix(command, prefix),
        }
    }
}

/// One row of the classification table.
#[derive(Debug)]
pub struct ClassifierRule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub kind: OperationKind,
    pub level: WarningLevel,
}

/// Outcome of classifying a command, with the rule that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: OperationKind,
    pub level: WarningLevel,
    pub rule: String,
}

const DEFAULT_RULE: &str = "unrecognized command";

const READ_ONLY_PREFIXES: &[&str] = &[
    "ls", "ll", "dir", "tree", "cat", "less", "more", "head", "tail", "echo", "printf", "pwd",
    "whoami", "id", "date", "uname", "hostname", "which", "whereis", "type", "file", "stat",
    "wc", "du", "df", "realpath", "basename", "dirname", "printenv",
    "git status", "git log", "git diff", "git show", "git blame", "git ls-files",
    "git rev-parse", "git describe", "git remote -v",
];

const MUTATING_PREFIXES: &[&str] = &[
    "mkdir", "touch", "cp", "mv", "rm", "rmdir", "ln", "chmod", "chown", "chgrp",
    "npm install", "npm i", "yarn add", "pnpm add", "pip install", "pip3 install",
    "cargo install", "gem install", "go install", "brew install", "apt install",
    "apt-get install", "git add", "git commit", "git pull", "git clone", "git checkout",
    "git merge", "git rebase", "git reset",
];

/// Characters and sequences that turn one command into several.
const SHELL_COMPOSITION: &[&str] = &[";", "&", "|", ">", "<", "$(", "`", "\n", "\r"];

static BUILTIN_RULES: LazyLock<Vec<ClassifierRule>> = LazyLock::new(build_rules);

fn pattern(re: &str) -> Matcher {
    Matcher::Pattern(Regex::new(re).expect("built-in classifier regex"))
}

fn forbidden(name: &'static str, re: &str) -> ClassifierRule {
    ClassifierRule {
        name,
        matcher: pattern(re),
        kind: OperationKind::ShellForbidden,
        level: WarningLevel::Forbidden,
    }
}

fn build_rules() -> Vec<ClassifierRule> {
    const RM_FLAGS: &str = r"(?:-[a-z]*r[a-z]*f[a-z]*|-[a-z]*f[a-z]*r[a-z]*|(?:-r|--recursive)\s+(?:-\S+\s+)*(?:-f|--force)|(?:-f|--force)\s+(?:-\S+\s+)*(?:-r|--recursive))";
    const BLOCK_DEVICE: &str = r"/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)";
    const PROTECTED: &str = r#"[\s:/+](?:main|master)(?:[\s;&|)'"]|$)"#;
    const FORCE: &str = r"(?:--force\S*|-[a-z]*f[a-z]*)\b";

    let mut rules = vec![
        forbidden(
            "recursive delete of root",
            &format!(
                r#"(?:^|[\s;&|(/"'\x60])rm\s+(?:-\S+\s+)*{RM_FLAGS}\s+(?:-\S+\s+)*['"]?(?:/|~|\$home)/?\*?['"]?(?:[\s;&|)]|$)"#
            ),
        ),
        forbidden("raw block device write", &format!(r"\bdd\b[^;&|]*\bof={BLOCK_DEVICE}")),
        forbidden("raw block device redirect", &format!(r">\s*{BLOCK_DEVICE}")),
        forbidden("filesystem format", r"\b(?:mkfs(?:\.[a-z0-9]+)?|mke2fs|wipefs)\b"),
        forbidden("fork bomb", r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
        forbidden(
            "force push to protected branch",
            &format!(r"\bgit\s+push\b[^;&|]*\s{FORCE}[^;&|]*{PROTECTED}"),
        ),
        forbidden(
            "force push to protected branch",
            &format!(r"\bgit\s+push\b[^;&|]*[\s:/+](?:main|master)(?:\s[^;&|]*)?\s{FORCE}"),
        ),
        forbidden(
            "force push to protected branch",
            r#"\bgit\s+push\b[^;&|]*\s\+(?:main|master)(?:[\s;&|)'"]|$)"#,
        ),
    ];

    rules.extend(READ_ONLY_PREFIXES.iter().map(|&prefix| ClassifierRule {
        name: "read-only command",
        matcher: Matcher::Simple(prefix),
        kind: OperationKind::ShellSafe,
        level: WarningLevel::Info,
    }));

    rules.push(ClassifierRule {
        name: "force push",
        matcher: pattern(&format!(r"^git\s+push\b.*(?:\s{FORCE}|\s\+\S)")),
        kind: OperationKind::ShellRisky,
        level: WarningLevel::Caution,
    });
    rules.push(ClassifierRule {
        name: "git push",
        matcher: Matcher::Simple("git push"),
        kind: OperationKind::GitPush,
        level: WarningLevel::Caution,
    });

    rules.extend(MUTATING_PREFIXES.iter().map(|&prefix| ClassifierRule {
        name: "state-mutating command",
        matcher: Matcher::Prefix(prefix),
        kind: OperationKind::ShellRisky,
        level: WarningLevel::Caution,
    }));

    rules
}

/// The built-in classification table, in evaluation order.
pub fn builtin_rules() -> &'static [ClassifierRule] {
    &BUILTIN_RULES
}

/// Classify a raw command with the built-in table only.
///
/// Total: every input, including the empty string, gets a classification.
pub fn classify(command: &str) -> (OperationKind, WarningLevel) {
    let c = CommandClassifier::default().explain(command);
    (c.kind, c.level)
}

/// Classifier that layers user-configured rules over the built-in table.
///
/// User rules never override a built-in forbidden signature.
#[derive(Debug, Clone, Default)]
pub struct CommandClassifier {
    rules: Vec<CommandRule>,
}

impl CommandClassifier {
    pub fn new(rules: Vec<CommandRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CommandRule] {
        &self.rules
    }

    pub fn classify(&self, command: &str) -> (OperationKind, WarningLevel) {
        let c = self.explain(command);
        (c.kind, c.level)
    }

    /// Classify and report which rule decided.
    pub fn explain(&self, command: &str) -> Classification {
        let normalized = normalize(command);
        let table = builtin_rules();

        if let Some(rule) = table
            .iter()
            .filter(|r| r.level.is_forbidden())
            .find(|r| r.matcher.matches(&normalized))
        {
            return Classification::from_rule(rule);
        }

        // A permit rule never whitelists a composed command.
        if let Some(result) = RuleMatcher::evaluate(&self.rules, &normalized)
            .filter(|r| r.level != PermissionLevel::Permit || !has_shell_composition(&normalized))
        {
            let (kind, level) = result.level.classification();
            return Classification {
                kind,
                level,
                rule: result.description,
            };
        }

        table
            .iter()
            .filter(|r| !r.level.is_forbidden())
            .find(|r| r.matcher.matches(&normalized))
            .map(Classification::from_rule)
            .unwrap_or_else(|| Classification {
                kind: OperationKind::ShellRisky,
                level: WarningLevel::Caution,
                rule: DEFAULT_RULE.to_string(),
            })
    }
}

impl Classification {
    fn from_rule(rule: &ClassifierRule) -> Self {
        Self {
            kind: rule.kind,
            level: rule.level,
            rule: rule.name.to_string(),
        }
    }
}

fn normalize(command: &str) -> String {
    command.trim().to_lowercase()
}

/// `command` starts with `prefix` as whole words.
fn has_prefix(command: &str, prefix: &str) -> bool {
    command
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

fn has_shell_composition(command: &str) -> bool {
    SHELL_COMPOSITION.iter().any(|token| command.contains(token))
}
