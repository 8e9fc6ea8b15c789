//! Restart Orchestrator: decides per pane, then runs the restart protocol.
//!
//! Phases run strictly in order: graceful exit, shell verification,
//! forceful fallback, launch, warm-up and an optional follow-up prompt.
//! Every wait races the cancellation token, so a deadline turns into a
//! reported `CANCELLED` failure instead of a half-restarted pane.

use std::time::Duration;

use agtmux_health::agents::{self, AgentProfile, ExitStep};
use agtmux_health::{AgentType, WorkStatus, classify};
use agtmux_tmux::{
    ProcessInspector, TmuxCommandRunner, capture_pane, pane_pid, resolve_child_pid, send_escape,
    send_interrupt, send_line,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::action::{
    HardKillResult, PostState, PreCheck, RestartAction, RestartActionKind, RestartSequence,
    WaitInfo,
};
use crate::error::{ErrorCode, ErrorDetails, RestartPhase, StructuredError, truncate_output};
use crate::options::{HardKillMode, RestartOptions};

// ─── Decision ────────────────────────────────────────────────────

/// What the orchestrator will do with a pane, before any side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Wait(WaitInfo),
    Skip(String),
    DryRun,
    Execute,
}

/// Pure decision: rate limit, then work protection, then dry run.
pub fn decide(status: &WorkStatus, options: &RestartOptions, wait: Option<WaitInfo>) -> Decision {
    if status.is_rate_limited && !options.force {
        let info = wait.unwrap_or_else(|| WaitInfo {
            wait_seconds: None,
            resets_at: None,
            reason: rate_limit_reason(status),
        });
        return Decision::Wait(info);
    }
    let pre = PreCheck::evaluate(status, options.force);
    if !pre.allowed {
        return Decision::Skip(pre.reason);
    }
    if options.dry_run {
        return Decision::DryRun;
    }
    Decision::Execute
}

fn rate_limit_reason(status: &WorkStatus) -> String {
    match status.limit_indicators.first() {
        Some(hit) => format!("rate limited: {hit}"),
        None => "rate limited".to_string(),
    }
}

/// Type the restarted pane will run. Panes without a known agent get the
/// default launch command, which starts Claude.
pub fn launched_agent(agent_type: AgentType) -> AgentType {
    if agent_type.is_agent() {
        agent_type
    } else {
        AgentType::Claude
    }
}

// ─── Protocol state ──────────────────────────────────────────────

/// Mutable record of one protocol run, turned into the action at the end.
struct ProtocolRun<'a> {
    pane_id: &'a str,
    agent_type: AgentType,
    attempted: Vec<String>,
    last_output: Option<String>,
    child_pid: Option<u32>,
    process_state: Option<String>,
    warning: Option<String>,
    sequence: RestartSequence,
}

impl<'a> ProtocolRun<'a> {
    fn new(pane_id: &'a str, agent_type: AgentType, profile: &AgentProfile) -> Self {
        Self {
            pane_id,
            agent_type,
            attempted: Vec::new(),
            last_output: None,
            child_pid: None,
            process_state: None,
            warning: None,
            sequence: RestartSequence {
                exit_method: profile.exit_method.to_string(),
                exit_duration_ms: 0,
                shell_confirmed: false,
                agent_launched: false,
                agent_type: launched_agent(agent_type),
                prompt_sent: None,
                hard_kill_used: None,
                hard_kill_result: None,
            },
        }
    }

    fn attempt(&mut self, action: impl Into<String>) {
        let action = action.into();
        tracing::debug!(pane_id = %self.pane_id, action = %action, "restart step");
        self.attempted.push(action);
    }

    fn fail(&self, code: ErrorCode, phase: RestartPhase, message: impl Into<String>) -> StructuredError {
        StructuredError::new(code, phase, self.pane_id, message).with_details(ErrorDetails {
            child_pid: self.child_pid,
            process_state: self.process_state.clone(),
            last_output: self.last_output.clone(),
            attempted_actions: self.attempted.clone(),
            agent_type: Some(self.agent_type),
            exit_method: Some(self.sequence.exit_method.clone()),
            extra: Default::default(),
        })
    }
}

// ─── Orchestrator ────────────────────────────────────────────────

pub struct RestartOrchestrator<R, P> {
    runner: R,
    processes: P,
    options: RestartOptions,
    cancel: CancellationToken,
}

impl<R: TmuxCommandRunner, P: ProcessInspector> RestartOrchestrator<R, P> {
    pub fn new(runner: R, processes: P, options: RestartOptions) -> Self {
        Self {
            runner,
            processes,
            options,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &RestartOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Decide and, when allowed, restart one pane. Never panics and never
    /// returns early without an action: failures become `FAILED` actions
    /// carrying a structured error.
    pub async fn restart(
        &self,
        pane_id: &str,
        status: &WorkStatus,
        wait: Option<WaitInfo>,
    ) -> RestartAction {
        let pre_check = PreCheck::evaluate(status, self.options.force);

        match decide(status, &self.options, wait) {
            Decision::Wait(info) => {
                tracing::info!(pane_id = %pane_id, wait_seconds = ?info.wait_seconds, "rate limited, waiting");
                let mut action =
                    RestartAction::decided(pane_id, RestartActionKind::Waiting, info.reason.clone(), pre_check);
                action.wait_info = Some(info);
                action
            }
            Decision::Skip(reason) => {
                tracing::info!(pane_id = %pane_id, reason = %reason, "restart skipped");
                RestartAction::decided(pane_id, RestartActionKind::Skipped, reason, pre_check)
            }
            Decision::DryRun => RestartAction::decided(
                pane_id,
                RestartActionKind::WouldRestart,
                "dry run: restart would proceed",
                pre_check,
            ),
            Decision::Execute if self.cancel.is_cancelled() => {
                tracing::warn!(pane_id = %pane_id, "not restarting pane: deadline reached");
                let profile = agents::profile(status.agent_type);
                let err = ProtocolRun::new(pane_id, status.agent_type, profile).fail(
                    ErrorCode::Cancelled,
                    RestartPhase::Exit,
                    "deadline reached before restart started",
                );
                let mut action = RestartAction::decided(
                    pane_id,
                    RestartActionKind::Failed,
                    err.message.clone(),
                    pre_check,
                );
                action.structured_error = Some(err);
                action
            }
            Decision::Execute => self.execute(pane_id, status, pre_check).await,
        }
    }

    async fn execute(&self, pane_id: &str, status: &WorkStatus, pre_check: PreCheck) -> RestartAction {
        let profile = agents::profile(status.agent_type);
        let mut run = ProtocolRun::new(pane_id, status.agent_type, profile);
        tracing::info!(
            pane_id = %pane_id,
            agent_type = %status.agent_type,
            exit_method = profile.exit_method,
            "restarting pane"
        );

        let outcome = self.run_protocol(&mut run, profile).await;

        let mut warning = run.warning.take();
        if status.is_working && self.options.force {
            let forced = "restart forced while agent was working".to_string();
            warning = Some(match warning {
                Some(w) => format!("{forced}; {w}"),
                None => forced,
            });
        }

        match outcome {
            Ok(()) => {
                let post_state = self.post_state(&run);
                tracing::info!(pane_id = %pane_id, "restart complete");
                RestartAction {
                    pane_id: pane_id.to_string(),
                    action: RestartActionKind::Restarted,
                    reason: format!("restarted {}", run.sequence.agent_type),
                    warning,
                    pre_check,
                    restart_sequence: Some(run.sequence),
                    post_state,
                    wait_info: None,
                    structured_error: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    pane_id = %pane_id,
                    code = %err.code,
                    phase = %err.phase,
                    "restart failed: {}",
                    err.message
                );
                RestartAction {
                    pane_id: pane_id.to_string(),
                    action: RestartActionKind::Failed,
                    reason: err.message.clone(),
                    warning,
                    pre_check,
                    restart_sequence: Some(run.sequence),
                    post_state: None,
                    wait_info: None,
                    structured_error: Some(err),
                }
            }
        }
    }

    async fn run_protocol(
        &self,
        run: &mut ProtocolRun<'_>,
        profile: &AgentProfile,
    ) -> Result<(), StructuredError> {
        let mode = self.options.hard_kill;
        let mut needs_kill = mode == HardKillMode::Only;

        if mode != HardKillMode::Only {
            let started = Instant::now();
            let exited = self.soft_exit(run, profile).await;
            run.sequence.exit_duration_ms =
                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if let Err(err) = exited {
                if err.code == ErrorCode::Cancelled || mode != HardKillMode::Fallback {
                    return Err(err);
                }
                tracing::warn!(pane_id = %run.pane_id, "soft exit failed, falling back to hard kill");
                needs_kill = true;
            }
        }

        if !needs_kill {
            self.pause(run, RestartPhase::Verify, self.options.timings.verify_delay)
                .await?;
            let visible = match self.shell_visible(run, RestartPhase::Verify) {
                Ok(visible) => visible,
                Err(err) if mode == HardKillMode::Fallback => {
                    tracing::warn!(pane_id = %run.pane_id, "verify failed: {}", err.message);
                    false
                }
                Err(err) => return Err(err),
            };
            if visible {
                run.sequence.shell_confirmed = true;
            } else if mode == HardKillMode::Fallback {
                tracing::warn!(pane_id = %run.pane_id, "no shell prompt after exit, falling back to hard kill");
                needs_kill = true;
            } else {
                return Err(run.fail(
                    ErrorCode::ShellNotConfirmed,
                    RestartPhase::Verify,
                    "no shell prompt after exit sequence",
                ));
            }
        }

        if needs_kill {
            self.hard_kill(run).await?;
        }

        self.launch(run, profile)?;

        run.attempt(format!("warmup:{}ms", self.options.warmup.as_millis()));
        self.pause(run, RestartPhase::Warmup, self.options.warmup).await?;

        if let Some(prompt) = &self.options.prompt {
            self.inject_prompt(run, prompt).await?;
        }
        Ok(())
    }

    // ─── Phases ──────────────────────────────────────────────────

    async fn soft_exit(
        &self,
        run: &mut ProtocolRun<'_>,
        profile: &AgentProfile,
    ) -> Result<(), StructuredError> {
        run.attempt(format!("exit:{}", profile.exit_method));
        for step in profile.exit_sequence {
            let sent = match step {
                ExitStep::Interrupt => send_interrupt(&self.runner, run.pane_id),
                ExitStep::Escape => send_escape(&self.runner, run.pane_id),
                ExitStep::Line(text) => send_line(&self.runner, run.pane_id, text),
                ExitStep::Pause(d) => {
                    self.pause(run, RestartPhase::Exit, *d).await?;
                    continue;
                }
            };
            sent.map_err(|e| {
                run.fail(
                    ErrorCode::SoftExitFailed,
                    RestartPhase::Exit,
                    format!("exit keystrokes failed: {e}"),
                )
            })?;
        }
        Ok(())
    }

    /// Capture a short tail and check for a shell prompt.
    fn shell_visible(
        &self,
        run: &mut ProtocolRun<'_>,
        phase: RestartPhase,
    ) -> Result<bool, StructuredError> {
        run.attempt(format!("{phase}:shell_check"));
        let text = capture_pane(&self.runner, run.pane_id, self.options.timings.verify_lines)
            .map_err(|e| {
                run.fail(
                    ErrorCode::CaptureFailed,
                    phase,
                    format!("capture failed: {e}"),
                )
            })?;
        run.last_output = Some(truncate_output(&text));
        Ok(agents::looks_like_shell_prompt(&text))
    }

    async fn hard_kill(&self, run: &mut ProtocolRun<'_>) -> Result<(), StructuredError> {
        run.sequence.hard_kill_used = Some(true);

        run.attempt("hard_kill:pane_pid");
        let shell_pid = pane_pid(&self.runner, run.pane_id).map_err(|e| {
            run.fail(
                ErrorCode::PanePidUnavailable,
                RestartPhase::HardKill,
                format!("pane pid unavailable: {e}"),
            )
        })?;

        run.attempt(format!("hard_kill:child_lookup:{shell_pid}"));
        let child = resolve_child_pid(&self.processes, shell_pid).map_err(|e| {
            run.fail(
                ErrorCode::ChildLookupFailed,
                RestartPhase::HardKill,
                format!("child lookup for shell {shell_pid} failed: {e}"),
            )
        })?;

        let result = match child {
            None => {
                tracing::info!(pane_id = %run.pane_id, shell_pid, "no child process, agent already gone");
                HardKillResult::NoChild
            }
            Some(pid) => {
                run.child_pid = Some(pid);
                run.process_state = self
                    .processes
                    .snapshot()
                    .ok()
                    .and_then(|map| map.get(&pid).map(|p| p.state.as_str().to_string()));
                run.attempt(format!("hard_kill:sigkill:{pid}"));
                self.processes.force_kill(pid).map_err(|e| {
                    run.fail(
                        ErrorCode::HardKillFailed,
                        RestartPhase::HardKill,
                        format!("SIGKILL failed: {e}"),
                    )
                })?;
                tracing::info!(pane_id = %run.pane_id, pid, "sent SIGKILL");
                HardKillResult::Killed
            }
        };
        run.sequence.hard_kill_result = Some(result);

        self.pause(run, RestartPhase::HardKill, self.options.timings.post_kill_delay)
            .await?;
        if !self.shell_visible(run, RestartPhase::HardKill)? {
            return Err(run.fail(
                ErrorCode::HardKillUnconfirmed,
                RestartPhase::HardKill,
                "no shell prompt after hard kill",
            ));
        }
        run.sequence.shell_confirmed = true;
        Ok(())
    }

    fn launch(&self, run: &mut ProtocolRun<'_>, profile: &AgentProfile) -> Result<(), StructuredError> {
        let command = profile.launch_command;
        run.attempt(format!("launch:{command}"));
        send_line(&self.runner, run.pane_id, command).map_err(|e| {
            run.fail(
                ErrorCode::LaunchFailed,
                RestartPhase::Launch,
                format!("launch command failed: {e}"),
            )
        })?;
        run.sequence.agent_launched = true;
        Ok(())
    }

    /// Only cancellation is fatal here; a send failure becomes a warning.
    async fn inject_prompt(
        &self,
        run: &mut ProtocolRun<'_>,
        prompt: &str,
    ) -> Result<(), StructuredError> {
        self.pause(run, RestartPhase::Prompt, self.options.timings.prompt_delay)
            .await?;
        run.attempt("prompt:send");
        match send_line(&self.runner, run.pane_id, prompt) {
            Ok(()) => run.sequence.prompt_sent = Some(true),
            Err(e) => {
                tracing::warn!(pane_id = %run.pane_id, "prompt not sent: {e}");
                run.sequence.prompt_sent = Some(false);
                run.warning = Some(format!("prompt not sent: {e}"));
            }
        }
        Ok(())
    }

    fn post_state(&self, run: &ProtocolRun<'_>) -> Option<PostState> {
        match capture_pane(&self.runner, run.pane_id, self.options.capture_lines) {
            Ok(text) => Some(PostState::from(&classify(run.sequence.agent_type, &text))),
            Err(e) => {
                tracing::debug!(pane_id = %run.pane_id, "post-launch capture failed: {e}");
                None
            }
        }
    }

    async fn pause(
        &self,
        run: &ProtocolRun<'_>,
        phase: RestartPhase,
        duration: Duration,
    ) -> Result<(), StructuredError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(run.fail(
                ErrorCode::Cancelled,
                phase,
                format!("deadline reached during {phase}"),
            )),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agtmux_health::WorkRecommendation;
    use agtmux_tmux::{ProcessInfo, ProcessMap, RunState, TmuxError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ─── Fakes ───────────────────────────────────────────────────

    /// Records every tmux call and answers captures from a script.
    #[derive(Default)]
    struct FakeTmux {
        calls: Mutex<Vec<String>>,
        captures: Mutex<VecDeque<String>>,
        pane_pid: Option<u32>,
        fail_keys: Vec<&'static str>,
        /// Captures refused before the script is answered.
        refused_captures: Mutex<usize>,
    }

    impl FakeTmux {
        fn with_captures(captures: &[&str]) -> Self {
            Self {
                captures: Mutex::new(captures.iter().map(|s| s.to_string()).collect()),
                pane_pid: Some(100),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl TmuxCommandRunner for FakeTmux {
        fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
            let line = args.join(" ");
            self.calls.lock().expect("lock").push(line.clone());
            match args.first().copied() {
                Some("send-keys") => {
                    if self.fail_keys.iter().any(|k| args.contains(k)) {
                        return Err(TmuxError::CommandFailed(format!("refused: {line}")));
                    }
                    Ok(String::new())
                }
                Some("capture-pane") => {
                    let mut refused = self.refused_captures.lock().expect("lock");
                    if *refused > 0 {
                        *refused -= 1;
                        return Err(TmuxError::CommandFailed("capture refused".into()));
                    }
                    Ok(self
                        .captures
                        .lock()
                        .expect("lock")
                        .pop_front()
                        .unwrap_or_default())
                }
                Some("display-message") => self
                    .pane_pid
                    .map(|p| format!("{p}\n"))
                    .ok_or_else(|| TmuxError::CommandFailed("can't find pane".into())),
                _ => Ok(String::new()),
            }
        }
    }

    #[derive(Default)]
    struct FakeProcesses {
        map: ProcessMap,
        kill_error: bool,
        killed: Mutex<Vec<u32>>,
    }

    impl FakeProcesses {
        fn with_child(shell: u32, child: u32) -> Self {
            let mut map = ProcessMap::new();
            for (pid, ppid) in [(shell, 1), (child, shell)] {
                map.insert(
                    pid,
                    ProcessInfo {
                        pid,
                        ppid,
                        state: RunState::Sleeping,
                        rss_kb: 1024,
                        args: String::new(),
                    },
                );
            }
            Self {
                map,
                ..Self::default()
            }
        }
    }

    impl ProcessInspector for FakeProcesses {
        fn snapshot(&self) -> Result<ProcessMap, TmuxError> {
            Ok(self.map.clone())
        }

        fn children_by_parent(&self, ppid: u32) -> Result<Vec<u32>, TmuxError> {
            Ok(self
                .map
                .values()
                .filter(|p| p.ppid == ppid)
                .map(|p| p.pid)
                .collect())
        }

        fn force_kill(&self, pid: u32) -> Result<(), TmuxError> {
            if self.kill_error {
                return Err(TmuxError::SignalFailed {
                    pid,
                    detail: "operation not permitted".into(),
                });
            }
            self.killed.lock().expect("lock").push(pid);
            Ok(())
        }
    }

    fn status(agent_type: AgentType) -> WorkStatus {
        WorkStatus {
            agent_type,
            is_working: false,
            is_idle: true,
            is_rate_limited: false,
            is_context_low: false,
            context_remaining: None,
            confidence: 0.8,
            work_indicators: Vec::new(),
            limit_indicators: Vec::new(),
            error_indicators: Vec::new(),
            recommendation: WorkRecommendation::SafeToRestart,
            reason: "idle at prompt".into(),
        }
    }

    fn working(agent_type: AgentType) -> WorkStatus {
        WorkStatus {
            is_working: true,
            is_idle: false,
            recommendation: WorkRecommendation::DoNotInterrupt,
            ..status(agent_type)
        }
    }

    const SHELL: &str = "user@host:~/src$ ";
    const AGENT_BUSY: &str = "✻ Thinking… (esc to interrupt)";
    const AGENT_IDLE: &str = "│ > │\n  ? for shortcuts";

    fn orchestrator<'a>(
        tmux: &'a FakeTmux,
        procs: &'a FakeProcesses,
        options: RestartOptions,
    ) -> RestartOrchestrator<&'a FakeTmux, &'a FakeProcesses> {
        RestartOrchestrator::new(tmux, procs, options)
    }

    // ─── Decisions ───────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn working_agent_is_never_restarted_without_force() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        for agent in AgentType::AGENTS {
            let a = orch.restart("%1", &working(agent), None).await;
            assert_eq!(a.action, RestartActionKind::Skipped, "{agent}");
            assert!(!a.pre_check.allowed);
        }

        let limited = WorkStatus {
            is_rate_limited: true,
            limit_indicators: vec!["usage limit".into()],
            ..working(AgentType::Claude)
        };
        let a = orch.restart("%1", &limited, None).await;
        assert_eq!(a.action, RestartActionKind::Waiting);
        assert_eq!(a.reason, "rate limited: usage limit");
        assert!(tmux.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_carries_wait_info() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let limited = WorkStatus {
            is_rate_limited: true,
            ..status(AgentType::Codex)
        };
        let wait = WaitInfo {
            wait_seconds: Some(2700),
            resets_at: None,
            reason: "rate limited, wait 2700s".into(),
        };
        let a = orch.restart("%4", &limited, Some(wait.clone())).await;
        assert_eq!(a.action, RestartActionKind::Waiting);
        assert_eq!(a.wait_info, Some(wait));
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_has_no_side_effects() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses::default();
        let options = RestartOptions {
            dry_run: true,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::WouldRestart);
        assert!(a.restart_sequence.is_none());
        assert!(tmux.calls().is_empty());
    }

    // ─── Protocol ────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn graceful_restart_of_claude() {
        let tmux = FakeTmux::with_captures(&[SHELL, AGENT_IDLE]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());

        let started = Instant::now();
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);

        // 100 ms exit pause + 3 s verify + 6 s warm-up.
        assert_eq!(started.elapsed(), Duration::from_millis(9_100));

        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.exit_method, "double_interrupt");
        assert_eq!(seq.exit_duration_ms, 100);
        assert!(seq.shell_confirmed);
        assert!(seq.agent_launched);
        assert_eq!(seq.hard_kill_used, None);
        assert_eq!(seq.prompt_sent, None);

        assert_eq!(
            tmux.calls(),
            vec![
                "send-keys -t %1 C-c",
                "send-keys -t %1 C-c",
                "capture-pane -p -J -S -10 -t %1",
                "send-keys -t %1 -l claude",
                "send-keys -t %1 Enter",
                "capture-pane -p -J -S -50 -t %1",
            ]
        );
        let post = a.post_state.expect("post state");
        assert!(post.is_idle);
        assert_eq!(post.recommendation, WorkRecommendation::SafeToRestart);
    }

    #[tokio::test(start_paused = true)]
    async fn shell_prompt_above_pane_padding_is_confirmed() {
        let padded = format!("user@host:~$ echo hi\nhi\nuser@host:~$ {}", "\n".repeat(27));
        let tmux = FakeTmux::with_captures(&[&padded, AGENT_IDLE]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        let seq = a.restart_sequence.expect("sequence");
        assert!(seq.shell_confirmed);
        assert_eq!(seq.hard_kill_used, None);
    }

    #[tokio::test(start_paused = true)]
    async fn gemini_exit_sequence_and_prompt_injection() {
        let tmux = FakeTmux::with_captures(&[SHELL, AGENT_BUSY]);
        let procs = FakeProcesses::default();
        let options = RestartOptions {
            prompt: Some("continue the refactor".into()),
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%2", &status(AgentType::Gemini), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.exit_method, "escape_then_exit");
        assert_eq!(seq.prompt_sent, Some(true));

        let calls = tmux.calls();
        assert_eq!(calls[0], "send-keys -t %2 Escape");
        assert_eq!(calls[1], "send-keys -t %2 -l /exit");
        assert_eq!(calls[2], "send-keys -t %2 Enter");
        assert!(calls.contains(&"send-keys -t %2 -l gemini".to_string()));
        assert!(calls.contains(&"send-keys -t %2 -l continue the refactor".to_string()));
        assert!(a.post_state.expect("post").is_working);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_failure_is_only_a_warning() {
        let tmux = FakeTmux {
            fail_keys: vec!["fix the tests"],
            ..FakeTmux::with_captures(&[SHELL, AGENT_IDLE])
        };
        let procs = FakeProcesses::default();
        let options = RestartOptions {
            prompt: Some("fix the tests".into()),
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Codex), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        let seq = a.restart_sequence.expect("sequence");
        assert!(seq.agent_launched);
        assert_eq!(seq.prompt_sent, Some(false));
        assert!(a.warning.expect("warning").starts_with("prompt not sent"));
        assert!(a.structured_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shell_not_confirmed_without_hard_kill() {
        let tmux = FakeTmux::with_captures(&[AGENT_BUSY]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Failed);
        let err = a.structured_error.expect("error");
        assert_eq!(err.code, ErrorCode::ShellNotConfirmed);
        assert_eq!(err.phase, RestartPhase::Verify);
        assert_eq!(err.details.last_output.as_deref(), Some(AGENT_BUSY));
        assert_eq!(err.details.agent_type, Some(AgentType::Claude));
        assert!(!a.restart_sequence.expect("partial sequence").agent_launched);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_exit_failure_falls_back_and_reverifies() {
        let tmux = FakeTmux {
            fail_keys: vec!["C-c"],
            ..FakeTmux::with_captures(&[SHELL, AGENT_IDLE])
        };
        let procs = FakeProcesses::with_child(100, 101);
        let options = RestartOptions {
            hard_kill: HardKillMode::Fallback,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);

        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.hard_kill_used, Some(true));
        assert_eq!(seq.hard_kill_result, Some(HardKillResult::Killed));
        assert!(seq.shell_confirmed);
        assert_eq!(*procs.killed.lock().expect("lock"), vec![101]);

        // Kill, then a capture for reverification, then launch.
        let calls = tmux.calls();
        let pid_at = calls.iter().position(|c| c.starts_with("display-message")).expect("pid");
        let capture_at = calls.iter().position(|c| c.starts_with("capture-pane")).expect("capture");
        let launch_at = calls.iter().position(|c| c == "send-keys -t %1 -l claude").expect("launch");
        assert!(calls[0].ends_with("C-c"));
        assert!(pid_at < capture_at && capture_at < launch_at);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_capture_failure_falls_back_to_hard_kill() {
        let tmux = FakeTmux {
            refused_captures: Mutex::new(1),
            ..FakeTmux::with_captures(&[SHELL, AGENT_IDLE])
        };
        let procs = FakeProcesses::with_child(100, 101);
        let options = RestartOptions {
            hard_kill: HardKillMode::Fallback,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.hard_kill_used, Some(true));
        assert!(seq.shell_confirmed);
        assert_eq!(*procs.killed.lock().expect("lock"), vec![101]);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_capture_failure_is_fatal_without_hard_kill() {
        let tmux = FakeTmux {
            refused_captures: Mutex::new(1),
            ..FakeTmux::with_captures(&[SHELL])
        };
        let procs = FakeProcesses::with_child(100, 101);
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        let err = a.structured_error.expect("error");
        assert_eq!(err.code, ErrorCode::CaptureFailed);
        assert_eq!(err.phase, RestartPhase::Verify);
        assert!(procs.killed.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn audit_trail_records_soft_exit_before_hard_kill() {
        // The agent survives SIGKILL as far as the pane shows.
        let tmux = FakeTmux::with_captures(&[AGENT_BUSY, AGENT_BUSY]);
        let procs = FakeProcesses::with_child(100, 101);
        let options = RestartOptions {
            hard_kill: HardKillMode::Fallback,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Failed);

        let err = a.structured_error.expect("error");
        assert_eq!(err.code, ErrorCode::HardKillUnconfirmed);
        assert_eq!(err.phase, RestartPhase::HardKill);
        assert_eq!(err.details.child_pid, Some(101));
        assert_eq!(err.details.process_state.as_deref(), Some("sleeping"));
        assert_eq!(
            err.details.attempted_actions,
            vec![
                "exit:double_interrupt",
                "verify:shell_check",
                "hard_kill:pane_pid",
                "hard_kill:child_lookup:100",
                "hard_kill:sigkill:101",
                "hard_kill:shell_check",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hard_kill_only_with_no_child_is_success() {
        let tmux = FakeTmux::with_captures(&[SHELL, ""]);
        let procs = FakeProcesses::with_child(100, 101);
        let procs = FakeProcesses {
            map: procs.map.into_iter().filter(|(pid, _)| *pid == 100).collect(),
            ..FakeProcesses::default()
        };
        let options = RestartOptions {
            hard_kill: HardKillMode::Only,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Codex), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.hard_kill_result, Some(HardKillResult::NoChild));
        assert_eq!(seq.exit_duration_ms, 0);
        assert!(!tmux.calls().iter().any(|c| c.contains("/exit")));
        assert!(procs.killed.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hard_kill_failure_is_terminal() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses {
            kill_error: true,
            ..FakeProcesses::with_child(100, 101)
        };
        let options = RestartOptions {
            hard_kill: HardKillMode::Only,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Aider), None).await;
        let err = a.structured_error.expect("error");
        assert_eq!(err.code, ErrorCode::HardKillFailed);
        assert!(!tmux.calls().iter().any(|c| c.contains("-l aider")));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_pane_pid_is_reported() {
        let tmux = FakeTmux {
            pane_pid: None,
            ..FakeTmux::with_captures(&[])
        };
        let procs = FakeProcesses::default();
        let options = RestartOptions {
            hard_kill: HardKillMode::Only,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(
            a.structured_error.expect("error").code,
            ErrorCode::PanePidUnavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_agent_launches_default_command() {
        let tmux = FakeTmux::with_captures(&[SHELL, SHELL]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let a = orch.restart("%9", &status(AgentType::Unknown), None).await;
        let seq = a.restart_sequence.expect("sequence");
        assert_eq!(seq.exit_method, "interrupt");
        assert_eq!(seq.agent_type, AgentType::Claude);
        let calls = tmux.calls();
        assert_eq!(calls[0], "send-keys -t %9 C-c");
        assert!(calls.contains(&"send-keys -t %9 -l claude".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn plain_shell_is_left_alone_unless_forced() {
        let tmux = FakeTmux::with_captures(&[SHELL, SHELL]);
        let procs = FakeProcesses::default();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default());
        let a = orch.restart("%5", &status(AgentType::User), None).await;
        assert_eq!(a.action, RestartActionKind::Skipped);
        assert!(tmux.calls().is_empty());

        let options = RestartOptions {
            force: true,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%5", &status(AgentType::User), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        assert!(tmux.calls().contains(&"send-keys -t %5 -l claude".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_restart_of_working_agent_warns() {
        let tmux = FakeTmux::with_captures(&[SHELL, AGENT_IDLE]);
        let procs = FakeProcesses::default();
        let options = RestartOptions {
            force: true,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options);
        let a = orch.restart("%1", &working(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Restarted);
        assert!(a.warning.expect("warning").contains("forced"));
    }

    // ─── Cancellation ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_warmup_is_reported() {
        let tmux = FakeTmux::with_captures(&[SHELL]);
        let procs = FakeProcesses::default();
        let cancel = CancellationToken::new();
        let orch =
            orchestrator(&tmux, &procs, RestartOptions::default()).with_cancel(cancel.clone());

        let deadline = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            }
        });
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        deadline.await.expect("deadline task");

        assert_eq!(a.action, RestartActionKind::Failed);
        let err = a.structured_error.expect("error");
        assert_eq!(err.code, ErrorCode::Cancelled);
        assert_eq!(err.phase, RestartPhase::Warmup);
        assert!(a.restart_sequence.expect("sequence").agent_launched);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_fails_pane_without_side_effects() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default()).with_cancel(cancel);
        let a = orch.restart("%1", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::Failed);
        assert_eq!(a.structured_error.expect("error").code, ErrorCode::Cancelled);
        assert!(tmux.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_keeps_decisions_that_need_no_protocol() {
        let tmux = FakeTmux::with_captures(&[]);
        let procs = FakeProcesses::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = orchestrator(&tmux, &procs, RestartOptions::default()).with_cancel(cancel.clone());

        let busy = orch.restart("%1", &working(AgentType::Claude), None).await;
        assert_eq!(busy.action, RestartActionKind::Skipped);
        let limited = WorkStatus {
            is_rate_limited: true,
            ..status(AgentType::Codex)
        };
        let limited = orch.restart("%2", &limited, None).await;
        assert_eq!(limited.action, RestartActionKind::Waiting);
        assert!(limited.structured_error.is_none());

        let options = RestartOptions {
            dry_run: true,
            ..RestartOptions::default()
        };
        let orch = orchestrator(&tmux, &procs, options).with_cancel(cancel);
        let a = orch.restart("%3", &status(AgentType::Claude), None).await;
        assert_eq!(a.action, RestartActionKind::WouldRestart);
        assert!(tmux.calls().is_empty());
    }
}
