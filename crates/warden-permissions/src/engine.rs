//! Decision gate: the single authority that approves or denies requests.

use crate::audit::AuditLog;
use crate::builders::build_command_request;
use crate::classifier::CommandClassifier;
use crate::prompt::PromptHandler;
use crate::types::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long an interactive confirmation may take before it counts as a denial.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Mutable session state. Everything lives behind one lock.
#[derive(Debug, Default)]
struct GateState {
    granted: HashSet<OperationKind>,
    batch_approval: bool,
    audit: AuditLog,
    pending: Option<PermissionRequest>,
    /// `pending` is currently shown by an interactive prompt.
    prompt_active: bool,
}

/// Why a request was resolved the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Forbidden,
    SessionGrant,
    BatchApproval,
    DefaultApprove(WarningLevel),
    DefaultDeny(WarningLevel),
    UserApproved,
    UserApprovedForSession,
    UserDenied,
    PromptTimedOut,
    PromptCancelled,
}

impl Verdict {
    fn approved(&self) -> bool {
        matches!(
            self,
            Self::SessionGrant
                | Self::BatchApproval
                | Self::DefaultApprove(_)
                | Self::UserApproved
                | Self::UserApprovedForSession
        )
    }

    /// Unresolved by the policy alone; a human could still approve.
    fn needs_confirmation(&self) -> bool {
        matches!(self, Self::DefaultDeny(_))
    }

    fn reason(&self) -> String {
        match self {
            Self::Forbidden => "forbidden operation".to_string(),
            Self::SessionGrant => "session permission granted".to_string(),
            Self::BatchApproval => "batch approval mode active".to_string(),
            Self::DefaultApprove(level) => format!("{level} operation approved by default"),
            Self::DefaultDeny(level) => {
                format!("{level} operation denied by default; confirmation required")
            }
            Self::UserApproved => "approved by user".to_string(),
            Self::UserApprovedForSession => "approved by user for session".to_string(),
            Self::UserDenied => "denied by user".to_string(),
            Self::PromptTimedOut => "confirmation timed out".to_string(),
            Self::PromptCancelled => "confirmation cancelled".to_string(),
        }
    }
}

impl GateState {
    /// Precedence: forbidden > session grant > batch mode > default by level.
    fn evaluate(&self, request: &PermissionRequest) -> Verdict {
        let level = request.warning_level();
        if level.is_forbidden() {
            return Verdict::Forbidden;
        }
        if self.granted.contains(&request.kind()) {
            return Verdict::SessionGrant;
        }
        if self.batch_approval {
            return Verdict::BatchApproval;
        }
        match level {
            WarningLevel::Info => Verdict::DefaultApprove(level),
            WarningLevel::Caution | WarningLevel::Danger | WarningLevel::Forbidden => {
                Verdict::DefaultDeny(level)
            }
        }
    }

    /// Append exactly one audit entry for `request`.
    fn record(&mut self, request: &PermissionRequest, verdict: Verdict) -> PermissionDecision {
        if verdict.needs_confirmation() && !self.prompt_active {
            self.pending = Some(request.clone());
        }

        let decision = PermissionDecision::new(request, verdict.approved(), verdict.reason());
        if verdict == Verdict::Forbidden {
            tracing::warn!(
                kind = %request.kind(),
                action = request.action(),
                "blocked forbidden operation"
            );
        } else {
            tracing::debug!(
                kind = %request.kind(),
                level = %request.warning_level(),
                approved = decision.approved,
                reason = decision.reason.as_deref().unwrap_or_default(),
                "permission decision"
            );
        }
        self.audit.append(decision.clone());
        decision
    }

    /// Resolve a request that went through (or was queued for) a prompt.
    fn finish_prompt(&mut self, request: &PermissionRequest, verdict: Verdict) -> PermissionDecision {
        if self.prompt_active && self.pending.as_ref().is_some_and(|p| p.id() == request.id()) {
            self.pending = None;
            self.prompt_active = false;
        }
        if verdict == Verdict::UserApprovedForSession {
            tracing::info!(kind = %request.kind(), "session permission granted by user");
            self.granted.insert(request.kind());
        }
        self.record(request, verdict)
    }
}

/// The central decision gate.
///
/// Construct one per user session and share it (e.g. behind an `Arc`) with
/// every executor. All state is in memory and dies with the gate.
pub struct DecisionGate {
    state: Mutex<GateState>,
    /// Classifier used by [`DecisionGate::check_command`].
    classifier: CommandClassifier,
    /// Optional handler for interactive confirmation.
    prompt_handler: Option<Arc<dyn PromptHandler>>,
    prompt_timeout: Duration,
    /// Serializes interactive prompts: one on screen at a time.
    prompt_queue: tokio::sync::Mutex<()>,
}

impl Default for DecisionGate {
    fn default() -> Self {
        Self::new(CommandClassifier::default(), None)
    }
}

impl DecisionGate {
    /// Create a gate with the given classifier and optional prompt handler.
    pub fn new(
        classifier: CommandClassifier,
        prompt_handler: Option<Arc<dyn PromptHandler>>,
    ) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            classifier,
            prompt_handler,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
            prompt_queue: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }

    // Critical sections never panic midway, so a poisoned lock still holds
    // consistent state.
    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide a request and return whether the caller may proceed.
    pub fn request_decision(&self, request: &PermissionRequest) -> bool {
        self.decide(request).approved
    }

    /// Decide a request and return the recorded decision.
    ///
    /// Never waits on a human: requests the policy cannot approve on its own
    /// are denied and published as the pending request.
    pub fn decide(&self, request: &PermissionRequest) -> PermissionDecision {
        let mut state = self.state();
        let verdict = state.evaluate(request);
        state.record(request, verdict)
    }

    /// Like [`DecisionGate::decide`], but asks the prompt handler (if any)
    /// before denying a CAUTION or DANGER request.
    ///
    /// Prompts are shown one at a time in arrival order. No lock is held while
    /// waiting; a timeout or a dropped future resolves to a denial.
    pub async fn decide_interactive(&self, request: &PermissionRequest) -> PermissionDecision {
        let handler = {
            let mut state = self.state();
            let verdict = state.evaluate(request);
            match &self.prompt_handler {
                Some(handler) if verdict.needs_confirmation() => Arc::clone(handler),
                _ => return state.record(request, verdict),
            }
        };

        let outstanding = OutstandingPrompt {
            gate: self,
            request,
            settled: false,
        };
        let _turn = self.prompt_queue.lock().await;

        {
            // Grants or batch mode may have changed while queued.
            let mut state = self.state();
            let verdict = state.evaluate(request);
            if !verdict.needs_confirmation() {
                return outstanding.settle(&mut state, verdict);
            }
            state.pending = Some(request.clone());
            state.prompt_active = true;
        }

        let verdict =
            match tokio::time::timeout(self.prompt_timeout, handler.prompt_permission(request))
                .await
            {
                Ok(PromptResponse::AllowOnce) => Verdict::UserApproved,
                Ok(PromptResponse::AlwaysAllow) => Verdict::UserApprovedForSession,
                Ok(PromptResponse::Deny) => Verdict::UserDenied,
                Err(_) => {
                    tracing::warn!(
                        action = request.action(),
                        timeout_ms = self.prompt_timeout.as_millis() as u64,
                        "permission prompt timed out"
                    );
                    Verdict::PromptTimedOut
                }
            };

        let mut state = self.state();
        outstanding.settle(&mut state, verdict)
    }

    pub async fn request_decision_interactive(&self, request: &PermissionRequest) -> bool {
        self.decide_interactive(request).await.approved
    }

    /// Classify a shell command with this gate's classifier and decide it.
    pub fn check_command(&self, command: &str) -> PermissionDecision {
        self.decide(&build_command_request(command, &self.classifier))
    }

    pub async fn check_command_interactive(&self, command: &str) -> PermissionDecision {
        self.decide_interactive(&build_command_request(command, &self.classifier))
            .await
    }

    /// Approve every future non-forbidden request of `kind` until revoked.
    pub fn grant_session_permission(&self, kind: OperationKind) {
        if self.state().granted.insert(kind) {
            tracing::info!(kind = %kind, "session permission granted");
        }
    }

    pub fn revoke_session_permission(&self, kind: OperationKind) {
        if self.state().granted.remove(&kind) {
            tracing::info!(kind = %kind, "session permission revoked");
        }
    }

    pub fn has_session_permission(&self, kind: OperationKind) -> bool {
        self.state().granted.contains(&kind)
    }

    /// Currently granted kinds, in a stable order.
    pub fn granted_kinds(&self) -> Vec<OperationKind> {
        let state = self.state();
        OperationKind::ALL
            .into_iter()
            .filter(|kind| state.granted.contains(kind))
            .collect()
    }

    /// Auto-approve every non-forbidden request until disabled.
    pub fn enable_batch_approval(&self) {
        let mut state = self.state();
        if !state.batch_approval {
            state.batch_approval = true;
            tracing::warn!("batch approval enabled: CAUTION and DANGER requests auto-approve");
        }
    }

    pub fn disable_batch_approval(&self) {
        let mut state = self.state();
        if state.batch_approval {
            state.batch_approval = false;
            tracing::info!("batch approval disabled");
        }
    }

    pub fn is_batch_approval_active(&self) -> bool {
        self.state().batch_approval
    }

    /// Drop all session grants and leave batch mode, atomically.
    pub fn clear_session(&self) {
        let mut state = self.state();
        state.granted.clear();
        state.batch_approval = false;
        tracing::info!("permission session cleared");
    }

    /// Most recent request the policy left for a human, if any.
    pub fn pending_request(&self) -> Option<PermissionRequest> {
        self.state().pending.clone()
    }

    pub fn audit_trail(&self) -> Vec<PermissionDecision> {
        self.state().audit.entries()
    }

    pub fn decisions_for_kind(&self, kind: OperationKind) -> Vec<PermissionDecision> {
        self.state().audit.query_by_kind(kind)
    }

    pub fn clear_audit_trail(&self) {
        self.state().audit.clear();
    }
}

/// Guarantees an interactive request is recorded exactly once, even if the
/// caller drops the future while it is queued or on screen.
struct OutstandingPrompt<'a> {
    gate: &'a DecisionGate,
    request: &'a PermissionRequest,
    settled: bool,
}

impl OutstandingPrompt<'_> {
    fn settle(mut self, state: &mut GateState, verdict: Verdict) -> PermissionDecision {
        self.settled = true;
        state.finish_prompt(self.request, verdict)
    }
}

impl Drop for OutstandingPrompt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(action = self.request.action(), "permission prompt cancelled");
            self.gate
                .state()
                .finish_prompt(self.request, Verdict::PromptCancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{FileOperation, build_file_request};
    use crate::classifier::classify;
    use crate::rules::{CommandRule, PermissionLevel};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn command_request(command: &str) -> PermissionRequest {
        let (kind, level) = classify(command);
        PermissionRequest::new(kind, format!("Execute: {command}"), level)
    }

    /// Answers every prompt with a fixed response, optionally after a delay.
    struct ScriptedPrompt {
        response: PromptResponse,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedPrompt {
        fn new(response: PromptResponse) -> Self {
            Self {
                response,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(response: PromptResponse, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(response)
            }
        }
    }

    impl PromptHandler for ScriptedPrompt {
        fn prompt_permission(
            &self,
            _request: &PermissionRequest,
        ) -> Pin<Box<dyn Future<Output = PromptResponse> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.response
            })
        }
    }

    fn interactive(handler: Arc<ScriptedPrompt>) -> DecisionGate {
        DecisionGate::new(CommandClassifier::default(), Some(handler))
    }

    #[test]
    fn test_forbidden_denied_with_reason() {
        let gate = DecisionGate::default();
        let decision = gate.decide(&command_request("rm -rf /"));
        assert!(!decision.approved);
        assert_eq!(decision.reason.as_deref(), Some("forbidden operation"));
    }

    #[test]
    fn test_forbidden_beats_session_grant_and_batch() {
        let gate = DecisionGate::default();
        gate.grant_session_permission(OperationKind::ShellForbidden);
        gate.enable_batch_approval();
        assert!(!gate.request_decision(&command_request("mkfs.ext4 /dev/sda1")));
        assert_eq!(
            gate.audit_trail().last().unwrap().reason.as_deref(),
            Some("forbidden operation")
        );
    }

    #[test]
    fn test_info_approved_by_default() {
        let gate = DecisionGate::default();
        let decision = gate.decide(&command_request("git status"));
        assert!(decision.approved);
        assert!(decision.reason.unwrap().contains("INFO"));
        assert!(gate.pending_request().is_none());
    }

    #[test]
    fn test_caution_and_danger_denied_by_default() {
        let gate = DecisionGate::default();
        let caution = gate.decide(&command_request("mkdir foo"));
        assert!(!caution.approved);
        assert!(caution.reason.unwrap().contains("CAUTION"));

        let danger = gate.decide(&build_file_request(FileOperation::Delete, "a.txt", None));
        assert!(!danger.approved);
        assert!(danger.reason.unwrap().contains("DANGER"));
    }

    #[test]
    fn test_default_deny_publishes_pending_request() {
        let gate = DecisionGate::default();
        let first = command_request("mkdir a");
        let second = command_request("mkdir b");
        gate.request_decision(&first);
        gate.request_decision(&second);
        assert_eq!(gate.pending_request().unwrap().id(), second.id());
    }

    #[test]
    fn test_session_grant_precedes_batch() {
        let gate = DecisionGate::default();
        gate.enable_batch_approval();
        gate.grant_session_permission(OperationKind::ShellRisky);
        let decision = gate.decide(&command_request("mkdir foo"));
        assert_eq!(decision.reason.as_deref(), Some("session permission granted"));
    }

    #[test]
    fn test_grant_is_idempotent_and_revocable() {
        let gate = DecisionGate::default();
        gate.grant_session_permission(OperationKind::GitPush);
        gate.grant_session_permission(OperationKind::GitPush);
        assert_eq!(gate.granted_kinds(), vec![OperationKind::GitPush]);
        assert!(gate.request_decision(&command_request("git push origin dev")));

        gate.revoke_session_permission(OperationKind::GitPush);
        gate.revoke_session_permission(OperationKind::GitPush);
        assert!(!gate.has_session_permission(OperationKind::GitPush));
        assert!(!gate.request_decision(&command_request("git push origin dev")));
    }

    #[test]
    fn test_clear_session_resets_grants_and_batch() {
        let gate = DecisionGate::default();
        gate.grant_session_permission(OperationKind::FileEdit);
        gate.enable_batch_approval();
        gate.clear_session();
        assert!(gate.granted_kinds().is_empty());
        assert!(!gate.is_batch_approval_active());
    }

    #[test]
    fn test_clear_session_keeps_audit_trail() {
        let gate = DecisionGate::default();
        gate.request_decision(&command_request("ls"));
        gate.clear_session();
        assert_eq!(gate.audit_trail().len(), 1);
        gate.clear_audit_trail();
        assert!(gate.audit_trail().is_empty());
    }

    #[test]
    fn test_one_audit_entry_per_call() {
        let gate = DecisionGate::default();
        gate.grant_session_permission(OperationKind::ShellRisky);
        gate.request_decision(&command_request("mkdir a"));
        gate.enable_batch_approval();
        gate.request_decision(&command_request("git push origin x"));
        gate.request_decision(&command_request("rm -rf /"));
        gate.request_decision(&command_request("ls"));
        assert_eq!(gate.audit_trail().len(), 4);
    }

    #[test]
    fn test_check_command_uses_gate_rules() {
        let classifier =
            CommandClassifier::new(vec![CommandRule::new("cargo test*", PermissionLevel::Permit)]);
        let gate = DecisionGate::new(classifier, None);
        assert!(gate.check_command("cargo test -p warden-permissions").approved);
        assert_eq!(gate.decisions_for_kind(OperationKind::ShellSafe).len(), 1);
    }

    #[tokio::test]
    async fn test_interactive_without_handler_matches_sync() {
        let gate = DecisionGate::default();
        let decision = gate.decide_interactive(&command_request("mkdir foo")).await;
        assert!(!decision.approved);
        assert!(decision.reason.unwrap().contains("denied by default"));
    }

    #[tokio::test]
    async fn test_interactive_allow_once() {
        let handler = Arc::new(ScriptedPrompt::new(PromptResponse::AllowOnce));
        let gate = interactive(handler.clone());
        let decision = gate.decide_interactive(&command_request("mkdir foo")).await;
        assert!(decision.approved);
        assert_eq!(decision.reason.as_deref(), Some("approved by user"));
        assert!(!gate.has_session_permission(OperationKind::ShellRisky));
        assert!(gate.pending_request().is_none());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interactive_always_allow_grants_kind() {
        let handler = Arc::new(ScriptedPrompt::new(PromptResponse::AlwaysAllow));
        let gate = interactive(handler.clone());
        assert!(gate.request_decision_interactive(&command_request("mkdir foo")).await);
        assert!(gate.has_session_permission(OperationKind::ShellRisky));

        // Second request resolves via the grant without prompting.
        let decision = gate.decide_interactive(&command_request("mkdir bar")).await;
        assert_eq!(decision.reason.as_deref(), Some("session permission granted"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interactive_deny() {
        let gate = interactive(Arc::new(ScriptedPrompt::new(PromptResponse::Deny)));
        let decision = gate.decide_interactive(&command_request("mkdir foo")).await;
        assert!(!decision.approved);
        assert_eq!(decision.reason.as_deref(), Some("denied by user"));
    }

    #[tokio::test]
    async fn test_interactive_never_prompts_for_forbidden_or_info() {
        let handler = Arc::new(ScriptedPrompt::new(PromptResponse::AllowOnce));
        let gate = interactive(handler.clone());
        assert!(!gate.request_decision_interactive(&command_request("rm -rf /")).await);
        assert!(gate.request_decision_interactive(&command_request("ls")).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_timeout_denies() {
        let handler = Arc::new(ScriptedPrompt::slow(
            PromptResponse::AllowOnce,
            Duration::from_secs(60),
        ));
        let gate = interactive(handler).with_prompt_timeout(Duration::from_secs(5));
        let decision = gate.decide_interactive(&command_request("mkdir foo")).await;
        assert!(!decision.approved);
        assert_eq!(decision.reason.as_deref(), Some("confirmation timed out"));
        assert!(gate.pending_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_cancellation_records_denial() {
        let handler = Arc::new(ScriptedPrompt::slow(
            PromptResponse::AllowOnce,
            Duration::from_secs(60),
        ));
        let gate = interactive(handler);
        let request = command_request("mkdir foo");

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), gate.decide_interactive(&request)).await;
        assert!(cancelled.is_err());

        let trail = gate.audit_trail();
        assert_eq!(trail.len(), 1);
        assert!(!trail[0].approved);
        assert_eq!(trail[0].reason.as_deref(), Some("confirmation cancelled"));
        assert!(gate.pending_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_prompt_occupies_pending_slot() {
        let handler = Arc::new(ScriptedPrompt::slow(
            PromptResponse::AllowOnce,
            Duration::from_secs(10),
        ));
        let gate = Arc::new(interactive(handler));
        let shown = command_request("mkdir shown");

        let task = {
            let gate = Arc::clone(&gate);
            let shown = shown.clone();
            tokio::spawn(async move { gate.decide_interactive(&shown).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gate.pending_request().unwrap().id(), shown.id());

        // A synchronous default-deny while a prompt is on screen leaves the slot alone.
        assert!(!gate.request_decision(&command_request("mkdir other")));
        assert_eq!(gate.pending_request().unwrap().id(), shown.id());

        assert!(task.await.unwrap().approved);
        assert!(gate.pending_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_prompt_sees_grant_made_while_waiting() {
        let handler = Arc::new(ScriptedPrompt::slow(
            PromptResponse::AlwaysAllow,
            Duration::from_secs(10),
        ));
        let gate = Arc::new(interactive(handler.clone()));

        let first = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.decide_interactive(&command_request("mkdir a")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.decide_interactive(&command_request("mkdir b")).await })
        };

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first.reason.as_deref(), Some("approved by user for session"));
        assert_eq!(second.reason.as_deref(), Some("session permission granted"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
