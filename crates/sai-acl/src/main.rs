//! acl-replay - replays an ACL scenario against the in-memory match engine.
//!
//! Loads an optional engine configuration and a scenario script, runs every
//! step, and prints the step outcomes and the final object graph as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use sai_acl::{AclConfig, AclOrch, AclSnapshot, Script, ScriptRunner, StaticLagResolver, StepOutcome};
use serde::Serialize;
use sonic_sai::api::{SoftEngineLimits, SoftMatchEngine};

/// SAI ACL scenario replay
#[derive(Parser, Debug)]
#[command(name = "acl-replay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ACL engine configuration (JSON); built-in defaults when omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Scenario script (JSON)
    #[arg(short = 's', long)]
    script: PathBuf,

    /// Hardware entries per priority group in the soft engine
    #[arg(long, default_value = "256")]
    entries_per_group: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    steps: Vec<StepOutcome>,
    snapshot: AclSnapshot,
}

fn run(args: &Args) -> Result<String> {
    let config = match &args.config {
        Some(path) => AclConfig::from_file(path)?,
        None => AclConfig::default(),
    };
    let script = Script::from_file(&args.script)?;
    info!(
        "Replaying {} steps from {}",
        script.steps.len(),
        args.script.display()
    );

    let engine = SoftMatchEngine::with_limits(SoftEngineLimits {
        entries_per_group: args.entries_per_group,
        ..Default::default()
    });
    let mut orch = AclOrch::new(config, engine, StaticLagResolver::new())?;
    let steps = ScriptRunner::new(&mut orch).run(&script)?;
    let report = Report {
        steps,
        snapshot: orch.snapshot().context("capturing final ACL state")?,
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    Ok(json)
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    match run(&args) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("acl-replay failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
