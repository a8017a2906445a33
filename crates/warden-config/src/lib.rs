//! Multi-tier TOML configuration for Warden.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > project > global > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use warden_permissions::{CommandClassifier, CommandRule, DecisionGate, OperationKind, PromptHandler};
use warden_types::ConfigError;

/// Default time a human has to answer a confirmation prompt.
pub const DEFAULT_PROMPT_TIMEOUT_MS: u64 = 30_000;

const BATCH_APPROVAL_ENV: &str = "WARDEN_BATCH_APPROVAL";
const PROMPT_TIMEOUT_ENV: &str = "WARDEN_PROMPT_TIMEOUT_MS";

/// Resolved configuration for a Warden session.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    pub config_dir: PathBuf,
    /// Kinds granted for the whole session from the start.
    pub session_grants: Vec<OperationKind>,
    pub batch_approval: bool,
    pub prompt_timeout_ms: u64,
    pub command_rules: Vec<CommandRule>,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub permissions: PermissionsSettings,
}

/// Permissions section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsSettings {
    #[serde(default)]
    pub session_grants: Vec<OperationKind>,
    pub batch_approval: Option<bool>,
    pub prompt_timeout_ms: Option<u64>,
    #[serde(default)]
    pub rules: Vec<CommandRule>,
}

impl SettingsFile {
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Added to the grants from config files.
    pub session_grants: Vec<OperationKind>,
    pub batch_approval: Option<bool>,
    pub prompt_timeout_ms: Option<u64>,
}

impl WardenConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Project config (./.warden/config.toml)
    /// 4. Global config (~/.warden/config.toml)
    /// 5. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(&config_dir(), &cwd, overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`WardenConfig::load`] with explicit locations and environment.
    pub fn load_from(
        config_dir: &Path,
        project_dir: &Path,
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let global = load_settings_file(&config_dir.join("config.toml")).permissions;
        let project =
            load_settings_file(&project_dir.join(".warden").join("config.toml")).permissions;

        // Resolve batch approval: CLI > env > project > global > off
        let batch_approval = match overrides.batch_approval {
            Some(value) => value,
            None => match env(BATCH_APPROVAL_ENV) {
                Some(raw) => parse_bool(BATCH_APPROVAL_ENV, &raw)?,
                None => project
                    .batch_approval
                    .or(global.batch_approval)
                    .unwrap_or(false),
            },
        };

        // Resolve prompt timeout: CLI > env > project > global > default
        let prompt_timeout_ms = match overrides.prompt_timeout_ms {
            Some(value) => value,
            None => match env(PROMPT_TIMEOUT_ENV) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: PROMPT_TIMEOUT_ENV.into(),
                    message: format!("expected milliseconds, got '{raw}'"),
                })?,
                None => project
                    .prompt_timeout_ms
                    .or(global.prompt_timeout_ms)
                    .unwrap_or(DEFAULT_PROMPT_TIMEOUT_MS),
            },
        };

        // Grants and rules accumulate across tiers.
        let mut session_grants = Vec::new();
        for kind in global
            .session_grants
            .into_iter()
            .chain(project.session_grants)
            .chain(overrides.session_grants)
        {
            if !session_grants.contains(&kind) {
                session_grants.push(kind);
            }
        }

        let mut command_rules = global.rules;
        command_rules.extend(project.rules);

        Ok(WardenConfig {
            config_dir: config_dir.to_path_buf(),
            session_grants,
            batch_approval,
            prompt_timeout_ms,
            command_rules,
        })
    }

    /// Build the session's decision gate from this configuration.
    pub fn build_gate(&self, prompt_handler: Option<Arc<dyn PromptHandler>>) -> DecisionGate {
        let gate = DecisionGate::new(
            CommandClassifier::new(self.command_rules.clone()),
            prompt_handler,
        )
        .with_prompt_timeout(Duration::from_millis(self.prompt_timeout_ms));

        for kind in &self.session_grants {
            gate.grant_session_permission(*kind);
        }
        if self.batch_approval {
            gate.enable_batch_approval();
        }
        gate
    }
}

/// Get the Warden config directory path (~/.warden/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WARDEN_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".warden")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => SettingsFile::parse(path, &content).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{raw}'"),
        }),
    }
}
