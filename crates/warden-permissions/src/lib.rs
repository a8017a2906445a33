//! Permission policy engine for Warden.
//!
//! Every externally effectful action (file mutation, git network operation,
//! shell command, network fetch, sensor access) is turned into a
//! [`PermissionRequest`] and passed to a [`DecisionGate`] before it runs.
//!
//! Warning levels: INFO / CAUTION / DANGER / FORBIDDEN
//! Precedence: forbidden > session grant > batch approval > default by level

pub mod audit;
pub mod builders;
pub mod classifier;
pub mod engine;
pub mod prompt;
pub mod rules;
pub mod types;

pub use audit::{AUDIT_LOG_CAPACITY, AuditLog};
pub use builders::{
    FileOperation, GitOperation, Sensor, build_command_request, build_directory_request,
    build_file_request, build_git_request, build_network_request, build_sensor_request,
};
pub use classifier::{Classification, CommandClassifier, classify};
pub use engine::{DEFAULT_PROMPT_TIMEOUT, DecisionGate};
pub use prompt::PromptHandler;
pub use rules::{CommandRule, EvaluateResult, PermissionLevel, RuleMatcher};
pub use types::*;
