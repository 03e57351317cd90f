#![forbid(unsafe_code)]

//! `engine-supervisor`: drive one line-oriented engine from a terminal.
//!
//! Forwards terminal input lines to the engine's stdin and prints engine
//! output lines on stdout. Logs go to stderr. Input lines `:pause`,
//! `:resume` and `:quit` are handled locally instead of being forwarded.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use engine_supervisor::{
    AppError, EventBus, ProcessEvent, Result, Supervisor, SupervisorConfig,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "engine-supervisor", about = "Supervise a line-oriented engine process", version, long_about = None)]
struct Cli {
    /// Path to a TOML supervisor configuration.
    #[arg(long, conflicts_with = "command")]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Substring that raises the log severity of matching engine lines.
    #[arg(long = "warn-word")]
    warn_words: Vec<String>,

    /// Override the engine working directory.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Engine executable followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;

    let result = runtime.block_on(run(args));

    // Terminal reads park a blocking thread that cannot be interrupted.
    runtime.shutdown_background();
    result
}

async fn run(args: Cli) -> Result<()> {
    let config = resolve_config(args)?;

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let supervisor = Arc::new(Supervisor::launch(config, bus)?);
    info!(task = %supervisor.label(), pid = supervisor.pid(), "engine started");

    let input = tokio::spawn(forward_input(Arc::clone(&supervisor)));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut stopping = false;
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ProcessEvent::Line(line)) => {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                Some(ProcessEvent::Died) | None => break,
            },
            () = &mut shutdown, if !stopping => {
                info!("shutdown signal received, terminating engine");
                stopping = true;
                supervisor.terminate();
            }
        }
    }

    input.abort();
    supervisor.wait().await;
    info!(task = %supervisor.label(), "engine stopped");
    Ok(())
}

/// Build the supervisor configuration from `--config` or the trailing command.
fn resolve_config(args: Cli) -> Result<SupervisorConfig> {
    let mut config = if let Some(path) = &args.config {
        SupervisorConfig::load_from_path(path)?
    } else {
        let mut command = args.command.into_iter();
        let program = command.next().ok_or_else(|| {
            AppError::Config("no engine given: pass --config or an executable".into())
        })?;
        SupervisorConfig::new(program).with_args(command)
    };

    config.warn_words.extend(args.warn_words);
    if let Some(cwd) = args.cwd {
        config.cwd = cwd;
    }

    config.validate()?;
    Ok(config)
}

/// Forward terminal lines to the engine until stdin closes or `:quit`.
async fn forward_input(supervisor: Arc<Supervisor>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                ":pause" => supervisor.pause(),
                ":resume" => supervisor.resume(),
                ":quit" => {
                    supervisor.terminate();
                    break;
                }
                _ => supervisor.write(format!("{line}\n")),
            },
            Ok(None) => {
                info!("terminal input closed, terminating engine");
                supervisor.terminate();
                break;
            }
            Err(err) => {
                warn!(%err, "failed to read terminal input, terminating engine");
                supervisor.terminate();
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
