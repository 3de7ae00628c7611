//! Planner/reviewer loop controller CLI.
//!
//! `reviewloop run` drives a local model through plan, review and revision
//! turns until the reviewer approves or the turn limit is reached.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reviewloop::core::types::{RunRequest, StepName, StopReason, TraceEntry};
use reviewloop::exit_codes;
use reviewloop::io::config::{ControllerConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use reviewloop::io::generation::CommandGenerationClient;
use reviewloop::io::trace_log::{RunRecord, write_run_record};
use reviewloop::logging;
use reviewloop::looping::{LoopConfig, run_loop};

#[derive(Parser)]
#[command(
    name = "reviewloop",
    version,
    about = "Planner/reviewer loop controller for local models"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a task, review the plan, and revise until approved or out of turns.
    Run(RunArgs),
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Task to plan.
    #[arg(long)]
    task: String,
    /// Model id passed to the generation command (overrides config).
    #[arg(long)]
    model: Option<String>,
    /// Ask the reviewer to be very strict and critical.
    #[arg(long)]
    strict: bool,
    /// Supervisor visits after which loop-backs stop (overrides config).
    #[arg(long)]
    max_turns: Option<u32>,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Print one JSON object per step instead of narration.
    #[arg(long)]
    json: bool,
    /// Also write the full run record as JSON to this path.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Init { force, path } => cmd_init(&path, force).map(|()| exit_codes::OK),
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let cfg = resolve_config(&args)?;
    let request = RunRequest {
        task: args.task,
        model_id: cfg.model_id.clone(),
        strict_mode: args.strict,
    };
    let client = CommandGenerationClient::new(&cfg.generation);

    let mut emit_err = None;
    let outcome = run_loop(&request, &client, &LoopConfig::from(&cfg), |entry| {
        if emit_err.is_some() {
            return;
        }
        if args.json {
            match serde_json::to_string(entry) {
                Ok(line) => println!("{line}"),
                Err(err) => emit_err = Some(err),
            }
        } else {
            println!("{}", narrate(entry));
        }
    })?;
    if let Some(err) = emit_err {
        return Err(err).context("serialize trace entry");
    }

    if !args.json {
        println!(
            "Stopped: {} at turn {} after {} steps",
            stop_label(outcome.stop),
            outcome.final_state.turn_count,
            outcome.steps_executed
        );
    }
    let final_state =
        serde_json::to_string_pretty(&outcome.final_state).context("serialize final state")?;
    println!("{final_state}");

    if let Some(path) = &args.trace_out {
        write_run_record(
            path,
            &RunRecord {
                request: &request,
                stop: outcome.stop,
                steps_executed: outcome.steps_executed,
                trace: &outcome.trace,
                final_state: &outcome.final_state,
            },
        )?;
    }

    Ok(match outcome.stop {
        StopReason::Converged => exit_codes::OK,
        StopReason::TurnLimit => exit_codes::TURN_LIMIT,
    })
}

/// Config file values with CLI overrides applied, validated once more.
fn resolve_config(args: &RunArgs) -> Result<ControllerConfig> {
    let mut cfg = load_config(&args.config)?;
    if let Some(model) = &args.model {
        cfg.model_id = model.clone();
    }
    if let Some(max_turns) = args.max_turns {
        cfg.max_turns = max_turns;
    }
    cfg.validate().context("validate command-line overrides")?;
    Ok(cfg)
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ControllerConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

/// One human-readable block per trace entry.
fn narrate(entry: &TraceEntry) -> String {
    let state = &entry.state;
    match entry.step {
        StepName::Supervisor => format!(
            "[supervisor] turn {} -> {}",
            state.turn_count,
            entry.route.map_or("?", |route| route.as_str())
        ),
        StepName::Planner => {
            let Some(proposal) = &entry.update.plan_proposal else {
                return "[planner] (no proposal)".to_string();
            };
            let mut out = format!("[planner] {}", proposal.plan);
            for (idx, step) in proposal.steps.iter().enumerate() {
                out.push_str(&format!("\n  {}. {}", idx + 1, step));
            }
            out
        }
        StepName::Reviewer => {
            let Some(feedback) = &entry.update.review_feedback else {
                return "[reviewer] (no feedback)".to_string();
            };
            let verdict = if feedback.has_issues { "issues" } else { "approved" };
            let mut out = format!("[reviewer] {verdict}: {}", feedback.feedback);
            for suggestion in &feedback.suggestions {
                out.push_str(&format!("\n  - {suggestion}"));
            }
            out
        }
    }
}

fn stop_label(stop: StopReason) -> &'static str {
    match stop {
        StopReason::Converged => "converged",
        StopReason::TurnLimit => "turn limit reached",
    }
}
