//! Convenience constructors turning raw operation parameters into requests.
//!
//! No classification logic lives here beyond fixed mapping tables; shell
//! commands go through the [`CommandClassifier`].

use crate::classifier::CommandClassifier;
use crate::types::{OperationKind, PermissionRequest, WarningLevel};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use warden_types::WardenError;

/// Number of affected files listed in a git preview before summarizing.
const GIT_PREVIEW_FILES: usize = 10;

/// File operations an executor can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Create,
    Read,
    Edit,
    Delete,
}

impl FileOperation {
    pub fn classification(&self) -> (OperationKind, WarningLevel) {
        match self {
            Self::Create => (OperationKind::FileCreate, WarningLevel::Info),
            Self::Read => (OperationKind::FileRead, WarningLevel::Info),
            Self::Edit => (OperationKind::FileEdit, WarningLevel::Caution),
            Self::Delete => (OperationKind::FileDelete, WarningLevel::Danger),
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Read => "Read",
            Self::Edit => "Edit",
            Self::Delete => "Delete",
        }
    }
}

impl FromStr for FileOperation {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "edit" | "modify" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            _ => Err(WardenError::invalid("file operation", s)),
        }
    }
}

/// Git operations an executor can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOperation {
    Clone,
    Commit,
    Push,
    Pull,
}

impl GitOperation {
    pub fn classification(&self) -> (OperationKind, WarningLevel) {
        match self {
            Self::Clone => (OperationKind::GitClone, WarningLevel::Info),
            Self::Pull => (OperationKind::GitPull, WarningLevel::Info),
            Self::Commit => (OperationKind::GitCommit, WarningLevel::Caution),
            Self::Push => (OperationKind::GitPush, WarningLevel::Danger),
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl FromStr for GitOperation {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clone" => Ok(Self::Clone),
            "commit" => Ok(Self::Commit),
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            _ => Err(WardenError::invalid("git operation", s)),
        }
    }
}

/// Device sensors gated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Camera,
    Location,
}

impl FromStr for Sensor {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camera" => Ok(Self::Camera),
            "location" => Ok(Self::Location),
            _ => Err(WardenError::invalid("sensor", s)),
        }
    }
}

/// Request for a file operation. `content` becomes the (truncated) preview.
pub fn build_file_request(
    operation: FileOperation,
    path: impl AsRef<Path>,
    content: Option<&str>,
) -> PermissionRequest {
    let path = path.as_ref();
    let (kind, level) = operation.classification();
    let request = PermissionRequest::new(
        kind,
        format!("{} file: {}", operation.verb(), path.display()),
        level,
    )
    .with_target(path)
    .with_affected_paths([path]);

    match content {
        Some(content) => request.with_preview(content),
        None => request,
    }
}

/// Request for a git operation.
///
/// The preview is the commit message when given, otherwise the first ten
/// affected paths followed by `+N more` if the list is longer.
pub fn build_git_request<I, P>(
    operation: GitOperation,
    repository: &str,
    affected_files: I,
    message: Option<&str>,
) -> PermissionRequest
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let files: Vec<PathBuf> = affected_files.into_iter().map(Into::into).collect();
    let (kind, level) = operation.classification();
    let preview = match message {
        Some(message) => Some(message.to_string()),
        None => summarize_files(&files),
    };

    let request = PermissionRequest::new(
        kind,
        format!("Git {}: {repository}", operation.verb()),
        level,
    )
    .with_target(repository)
    .with_affected_paths(files);

    match preview {
        Some(preview) => request.with_preview(&preview),
        None => request,
    }
}

pub fn build_directory_request(path: impl AsRef<Path>) -> PermissionRequest {
    let path = path.as_ref();
    PermissionRequest::new(
        OperationKind::DirectoryCreate,
        format!("Create directory: {}", path.display()),
        WarningLevel::Info,
    )
    .with_target(path)
    .with_affected_paths([path])
}

pub fn build_network_request(url: &str) -> PermissionRequest {
    PermissionRequest::new(
        OperationKind::NetworkRequest,
        format!("Network request: {url}"),
        WarningLevel::Caution,
    )
}

pub fn build_sensor_request(sensor: Sensor, purpose: &str) -> PermissionRequest {
    let (kind, label) = match sensor {
        Sensor::Camera => (OperationKind::CameraAccess, "camera"),
        Sensor::Location => (OperationKind::LocationAccess, "location"),
    };
    PermissionRequest::new(kind, format!("Access {label}: {purpose}"), WarningLevel::Caution)
}

/// Classify a shell command and wrap it in a request; the command itself is
/// the preview.
pub fn build_command_request(command: &str, classifier: &CommandClassifier) -> PermissionRequest {
    let (kind, level) = classifier.classify(command);
    PermissionRequest::new(kind, format!("Execute: {}", command.trim()), level).with_preview(command)
}

fn summarize_files(files: &[PathBuf]) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    let mut lines: Vec<String> = files
        .iter()
        .take(GIT_PREVIEW_FILES)
        .map(|p| p.display().to_string())
        .collect();
    if files.len() > GIT_PREVIEW_FILES {
        lines.push(format!("+{} more", files.len() - GIT_PREVIEW_FILES));
    }
    Some(lines.join("\n"))
}
