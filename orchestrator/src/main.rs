//! Session orchestrator CLI.
//!
//! `orchestrator run` drives the worker until it reports all work complete or
//! the session budget is spent, then prints the run result as JSON on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use orchestrator::core::types::{RunStop, SessionEvent};
use orchestrator::exit_codes;
use orchestrator::io::checkpoint::{CheckpointRequest, CheckpointValidator, CommandCheckpoint};
use orchestrator::io::config::{DEFAULT_CONFIG_FILE, RunConfig, load_config, write_config};
use orchestrator::io::reaper::{SystemProcessTable, reap};
use orchestrator::io::worker::CommandSessionRunner;
use orchestrator::logging;
use orchestrator::orchestrate::run_sessions;
use orchestrator::preflight::PreconditionError;

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Drive an external worker through retried, checkpointed sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run sessions until the worker reports completion or the budget is spent.
    Run(RunArgs),
    /// Terminate stray helper processes once and print how many were reaped.
    Reap {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Process-name substring to match; repeatable. Defaults to the config's list.
        #[arg(long = "signature")]
        signatures: Vec<String>,
    },
    /// Run the checkpoint command once and print its outcome.
    Checkpoint {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    workspace: Option<PathBuf>,
    #[arg(long)]
    manifest: Option<PathBuf>,
    #[arg(long)]
    max_sessions: Option<u32>,
    #[arg(long)]
    checkpoint_interval: Option<u32>,
    /// Write per-attempt records and the final summary here.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, mut cfg: RunConfig) -> RunConfig {
        if let Some(workspace) = self.workspace {
            cfg.workspace = workspace;
        }
        if let Some(manifest) = self.manifest {
            cfg.manifest = manifest;
        }
        if let Some(max_sessions) = self.max_sessions {
            cfg.max_sessions = max_sessions;
        }
        if let Some(interval) = self.checkpoint_interval {
            cfg.checkpoint_interval = interval;
        }
        if let Some(log_dir) = self.log_dir {
            cfg.log_dir = Some(log_dir);
        }
        cfg
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Run(args) => cmd_run(args),
        Command::Reap { config, signatures } => cmd_reap(&config, signatures),
        Command::Checkpoint { config, workspace } => cmd_checkpoint(&config, workspace),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        eprintln!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &RunConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let cfg = load_config(&args.config)?;
    let cfg = args.apply(cfg);

    let runner = CommandSessionRunner;
    let mut processes = SystemProcessTable::new();
    let validator =
        CommandCheckpoint::new(cfg.checkpoint.command.clone(), cfg.checkpoint.output_limit_bytes);

    let max_sessions = cfg.max_sessions;
    let result = match run_sessions(&cfg, &runner, &mut processes, &validator, |event| {
        print_progress(event, max_sessions);
    }) {
        Ok(result) => result,
        Err(err) => {
            if let Some(precondition) = err.downcast_ref::<PreconditionError>() {
                eprintln!("{precondition}");
                print_json(&json!({
                    "success": false,
                    "error": precondition.message,
                    "sessions_attempted": 0,
                }))?;
                return Ok(exit_codes::INVALID);
            }
            return Err(err);
        }
    };

    print_json(&result)?;
    Ok(match result.stop {
        RunStop::AllPassed => exit_codes::OK,
        RunStop::Exhausted => exit_codes::EXHAUSTED,
        RunStop::Fatal => exit_codes::FATAL,
    })
}

fn cmd_reap(config: &Path, signatures: Vec<String>) -> Result<i32> {
    let signatures = if signatures.is_empty() {
        load_config(config)?.reaper.signatures
    } else {
        signatures
    };
    let mut processes = SystemProcessTable::new();
    let count = reap(&mut processes, &signatures);
    println!("{count}");
    Ok(exit_codes::OK)
}

fn cmd_checkpoint(config: &Path, workspace: Option<PathBuf>) -> Result<i32> {
    let cfg = load_config(config)?;
    let workspace = workspace.unwrap_or_else(|| cfg.workspace.clone());
    if !workspace.is_dir() {
        eprintln!("workspace does not exist: {}", workspace.display());
        return Ok(exit_codes::INVALID);
    }
    let validator =
        CommandCheckpoint::new(cfg.checkpoint.command.clone(), cfg.checkpoint.output_limit_bytes);
    let outcome = validator.validate(&CheckpointRequest {
        workspace,
        timeout: cfg.checkpoint_timeout(),
    })?;
    print_json(&outcome)?;
    Ok(exit_codes::OK)
}

fn print_progress(event: &SessionEvent, max_sessions: u32) {
    match event {
        SessionEvent::AttemptFinished {
            seq,
            retry,
            outcome,
            duration,
        } => eprintln!(
            "[session {}/{max_sessions}] attempt {} {} in {:.1}s",
            seq + 1,
            retry + 1,
            outcome.describe(),
            duration.as_secs_f64()
        ),
        SessionEvent::Checkpoint { index, outcome } if !outcome.passed => {
            eprintln!("[checkpoint {index}] warnings: {}", outcome.warnings.join("; "));
        }
        _ => {}
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "orchestrator",
            "run",
            "--workspace",
            "/work/app",
            "--max-sessions",
            "3",
            "--checkpoint-interval",
            "1",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let cfg = args.apply(RunConfig::default());
        assert_eq!(cfg.workspace, PathBuf::from("/work/app"));
        assert_eq!(cfg.max_sessions, 3);
        assert_eq!(cfg.checkpoint_interval, 1);
        assert_eq!(cfg.manifest, PathBuf::new());
    }

    #[test]
    fn parse_reap_signatures() {
        let cli = Cli::parse_from([
            "orchestrator",
            "reap",
            "--signature",
            "helper",
            "--signature",
            "chrome",
        ]);
        let Command::Reap { signatures, .. } = cli.command else {
            panic!("expected reap");
        };
        assert_eq!(signatures, vec!["helper", "chrome"]);
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["orchestrator", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }
}
