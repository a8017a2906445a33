//! Core types for the permission system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;
use warden_types::{WardenError, truncate_chars};

/// Maximum number of preview characters kept verbatim on a request.
pub const MAX_PREVIEW_CHARS: usize = 500;

/// Category of an externally effectful operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FileCreate,
    FileRead,
    FileEdit,
    FileDelete,
    DirectoryCreate,
    GitClone,
    GitCommit,
    GitPush,
    GitPull,
    ShellSafe,
    ShellRisky,
    ShellForbidden,
    NetworkRequest,
    CameraAccess,
    LocationAccess,
}

impl OperationKind {
    pub const ALL: [OperationKind; 15] = [
        Self::FileCreate,
        Self::FileRead,
        Self::FileEdit,
        Self::FileDelete,
        Self::DirectoryCreate,
        Self::GitClone,
        Self::GitCommit,
        Self::GitPush,
        Self::GitPull,
        Self::ShellSafe,
        Self::ShellRisky,
        Self::ShellForbidden,
        Self::NetworkRequest,
        Self::CameraAccess,
        Self::LocationAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileCreate => "file_create",
            Self::FileRead => "file_read",
            Self::FileEdit => "file_edit",
            Self::FileDelete => "file_delete",
            Self::DirectoryCreate => "directory_create",
            Self::GitClone => "git_clone",
            Self::GitCommit => "git_commit",
            Self::GitPush => "git_push",
            Self::GitPull => "git_pull",
            Self::ShellSafe => "shell_safe",
            Self::ShellRisky => "shell_risky",
            Self::ShellForbidden => "shell_forbidden",
            Self::NetworkRequest => "network_request",
            Self::CameraAccess => "camera_access",
            Self::LocationAccess => "location_access",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| WardenError::invalid("operation kind", s))
    }
}

/// Severity of a requested operation, driving the default resolution policy.
///
/// `Forbidden` is an absolute block rather than a step above `Danger`: no
/// session grant or batch mode can approve it. The type deliberately has no
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WarningLevel {
    Info,
    Caution,
    Danger,
    Forbidden,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Caution => "CAUTION",
            Self::Danger => "DANGER",
            Self::Forbidden => "FORBIDDEN",
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending operation awaiting an approve/deny decision.
///
/// The warning level is fixed at construction; there is no way to change it
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionRequest {
    id: Uuid,
    kind: OperationKind,
    action: String,
    target_path: Option<PathBuf>,
    preview: Option<String>,
    affected_paths: Vec<PathBuf>,
    warning_level: WarningLevel,
    created_at: DateTime<Utc>,
}

impl PermissionRequest {
    /// Create a request with a fresh id and the current timestamp.
    pub fn new(kind: OperationKind, action: impl Into<String>, warning_level: WarningLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            action: action.into(),
            target_path: None,
            preview: None,
            affected_paths: Vec::new(),
            warning_level,
            created_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    /// Attach preview text, truncated to [`MAX_PREVIEW_CHARS`].
    pub fn with_preview(mut self, text: &str) -> Self {
        self.preview = Some(truncate_preview(text));
        self
    }

    pub fn with_affected_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.affected_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn target_path(&self) -> Option<&PathBuf> {
        self.target_path.as_ref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn affected_paths(&self) -> &[PathBuf] {
        &self.affected_paths
    }

    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Recorded outcome of a single decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub request_id: Uuid,
    pub kind: OperationKind,
    pub action: String,
    pub approved: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PermissionDecision {
    pub fn new(request: &PermissionRequest, approved: bool, reason: impl Into<String>) -> Self {
        Self {
            request_id: request.id(),
            kind: request.kind(),
            action: request.action().to_string(),
            approved,
            timestamp: Utc::now(),
            reason: Some(reason.into()),
        }
    }

    /// Turn a denial into an error carrying the recorded reason.
    pub fn ensure_approved(&self) -> Result<(), WardenError> {
        if self.approved {
            return Ok(());
        }
        Err(WardenError::Denied {
            action: self.action.clone(),
            reason: self
                .reason
                .clone()
                .unwrap_or_else(|| "no reason recorded".to_string()),
        })
    }
}

/// User's response to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// Allow this specific request only.
    AllowOnce,
    /// Allow this operation kind for the rest of the session.
    AlwaysAllow,
    /// Deny this request.
    Deny,
}

/// Apply the preview rule: verbatim up to the limit, otherwise the first
/// [`MAX_PREVIEW_CHARS`] characters plus a suffix naming the original length.
pub fn truncate_preview(text: &str) -> String {
    let total = text.chars().count();
    if total <= MAX_PREVIEW_CHARS {
        return text.to_string();
    }
    format!(
        "{}\n... (truncated, {total} characters total)",
        truncate_chars(text, MAX_PREVIEW_CHARS)
    )
}
