//! Terminal-based prompt handler for interactive confirmation.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use warden_permissions::{PermissionRequest, PromptHandler, PromptResponse};
use warden_types::truncate_str;

/// Preview lines shown before eliding the rest.
const PREVIEW_LINES: usize = 8;
const PREVIEW_LINE_BYTES: usize = 100;

/// Lines of stdin shared by the session loop and the prompt handler.
///
/// A single thread owns stdin and forwards lines over a channel. Waiting for
/// a line is cancel-safe, so a prompt that times out leaves the next line for
/// the session loop.
#[derive(Clone)]
pub struct InputLines {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl InputLines {
    /// Start the reader thread on stdin.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Next line without its terminator, or `None` at EOF.
    pub async fn next_line(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Prompts the user in the terminal for permission decisions.
pub struct TerminalPromptHandler {
    input: InputLines,
}

impl TerminalPromptHandler {
    pub fn new(input: InputLines) -> Self {
        Self { input }
    }
}

impl PromptHandler for TerminalPromptHandler {
    fn prompt_permission(
        &self,
        request: &PermissionRequest,
    ) -> Pin<Box<dyn Future<Output = PromptResponse> + Send + '_>> {
        let summary = describe_request(request);

        Box::pin(async move {
            {
                let stderr = io::stderr();
                let mut err = stderr.lock();
                let _ = writeln!(err);
                for line in &summary {
                    let _ = writeln!(err, "  {line}");
                }
                let _ = write!(err, "  [y] Allow once  [a] Always allow  [n] Deny  > ");
                let _ = err.flush();
            }

            match self.input.next_line().await {
                Some(input) => parse_response(&input),
                None => PromptResponse::Deny,
            }
        })
    }
}

/// Anything but an explicit yes is a denial, including an empty line or EOF.
fn parse_response(input: &str) -> PromptResponse {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => PromptResponse::AllowOnce,
        "a" | "always" => PromptResponse::AlwaysAllow,
        _ => PromptResponse::Deny,
    }
}

/// Lines describing a request for display.
fn describe_request(request: &PermissionRequest) -> Vec<String> {
    let mut lines = vec![format!(
        "Permission required [{}]: {}",
        request.warning_level(),
        request.action()
    )];

    if let Some(target) = request.target_path() {
        lines.push(format!("target: {}", target.display()));
    }
    if request.affected_paths().len() > 1 {
        lines.push(format!("affects {} paths", request.affected_paths().len()));
    }
    if let Some(preview) = request.preview() {
        lines.push("preview:".to_string());
        let total = preview.lines().count();
        for line in preview.lines().take(PREVIEW_LINES) {
            lines.push(format!("  | {}", truncate_str(line, PREVIEW_LINE_BYTES)));
        }
        if total > PREVIEW_LINES {
            lines.push(format!("  | ... {} more lines", total - PREVIEW_LINES));
        }
    }
    lines
}
