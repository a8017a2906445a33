//! Prompt handler trait for interactive confirmation.

use crate::types::{PermissionRequest, PromptResponse};
use std::future::Future;
use std::pin::Pin;

/// Trait for asking a human to confirm a request the default policy would deny.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility. Implementations that need
/// request data inside the future should clone it up front.
pub trait PromptHandler: Send + Sync {
    /// Present the request (action, preview, warning level) and wait for the
    /// user's response.
    fn prompt_permission(
        &self,
        request: &PermissionRequest,
    ) -> Pin<Box<dyn Future<Output = PromptResponse> + Send + '_>>;
}
