//! Engine process launcher.
//!
//! Spawns the engine executable with:
//! - piped stdin and stdout, inherited stderr;
//! - the configured working directory;
//! - either the inherited environment or, when a mapping is configured,
//!   exactly that mapping (`env_clear()` first);
//! - `kill_on_drop(true)` so an abandoned handle never leaks a process.

use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, info_span};

use crate::config::SupervisorConfig;
use crate::models::label::TaskLabel;
use crate::{AppError, Result};

// ── Launched handle ──────────────────────────────────────────────────────────

/// Freshly spawned engine process with its stdio pipes detached.
///
/// The caller is responsible for:
/// - Keeping `child` alive (it has `kill_on_drop(true)`).
/// - Handing `stdin` to exactly one writer and `stdout` to exactly one reader.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// Log label for this instance.
    pub label: TaskLabel,
    /// OS process id.
    pub pid: u32,
    /// Child process handle; kept alive so `kill_on_drop` works.
    pub child: Child,
    /// Engine's stdin.
    pub stdin: ChildStdin,
    /// Engine's stdout, unbuffered; framing happens in the reader.
    pub stdout: ChildStdout,
}

// ── Launcher ─────────────────────────────────────────────────────────────────

/// Spawn the engine described by `config`.
///
/// Returns once the OS has started the process with both pipes connected.
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// - `AppError::Config(…)`: `config` fails validation.
/// - `AppError::Launch("failed to spawn …")`: executable missing, not
///   executable, or the OS refused the spawn.
/// - `AppError::Launch("failed to capture …")`: a stdio pipe was not created.
pub fn launch(config: &SupervisorConfig) -> Result<LaunchedProcess> {
    config.validate()?;

    let label = TaskLabel::for_executable(&config.path);
    let span = info_span!("launch", task = %label);
    let _guard = span.enter();

    debug!(path = %config.path.display(), args = ?config.args, "spawning engine");

    let mut cmd = Command::new(&config.path);
    cmd.args(&config.args);

    if let Some(env) = &config.env {
        cmd.env_clear();
        cmd.envs(env);
    }

    cmd.current_dir(&config.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Launch(format!(
            "failed to spawn {}: {err}",
            config.path.display()
        ))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| AppError::Launch("engine exited before its pid was read".into()))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture engine stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture engine stdout".into()))?;

    info!(pid, path = %config.path.display(), "engine process spawned");

    Ok(LaunchedProcess {
        label,
        pid,
        child,
        stdin,
        stdout,
    })
}
