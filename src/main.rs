//! plugplan - plug-and-abandon compliance planner
//!
//! Command-line front end for the planning kernel.
//!
//! # Usage
//!
//! ```bash
//! # Plan one well
//! plugplan plan --facts well.facts.json --policy tx.w3a.policy.json
//!
//! # Plan every *.request.json in a directory (parallel)
//! plugplan batch --dir requests/ --out-dir plans/
//!
//! # Show the effective kernel config / check a config file
//! plugplan config --dump
//! plugplan check-config --path plugplan.toml
//! ```
//!
//! # Environment Variables
//!
//! - `PLUGPLAN_CONFIG`: Path to a kernel config TOML (default: ./plugplan.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plugplan::config::validation::validate_unknown_keys;
use plugplan::{
    normalize_facts, plan_batch, plan_with_config, EffectivePolicy, KernelConfig, Plan,
    PlanRequest,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plugplan")]
#[command(about = "Plug-and-abandon compliance planning kernel")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Plan a single well from a facts file and an effective policy file
    Plan {
        /// Resolved facts JSON (envelopes or bare values)
        #[arg(long)]
        facts: PathBuf,
        /// Effective policy JSON
        #[arg(long)]
        policy: PathBuf,
        /// Kernel config TOML (default: $PLUGPLAN_CONFIG, then ./plugplan.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },

    /// Plan every `*.request.json` in a directory in parallel
    Batch {
        /// Directory holding `{ "facts": ..., "policy": ... }` request files
        #[arg(long)]
        dir: PathBuf,
        /// Directory for `*.plan.json` outputs and the batch report
        #[arg(long = "out-dir")]
        out_dir: PathBuf,
        /// Kernel config TOML
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show where the kernel config comes from
    Config {
        /// Print the effective config as TOML
        #[arg(long)]
        dump: bool,
    },

    /// Validate a kernel config file without planning
    CheckConfig {
        #[arg(long)]
        path: PathBuf,
    },
}

// ============================================================================
// Batch report
// ============================================================================

#[derive(Debug, Serialize)]
struct BatchReport {
    generated_at: String,
    kernel_version: &'static str,
    planned: usize,
    blocked: usize,
    entries: Vec<BatchEntry>,
    failures: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    request: String,
    output: String,
    api_number: Option<String>,
    steps: usize,
    violations: usize,
    sacks: u64,
    blocked: bool,
}

#[derive(Debug, Serialize)]
struct BatchFailure {
    request: String,
    error: String,
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<KernelConfig> {
    match path {
        Some(p) => KernelConfig::load_from_file(p)
            .with_context(|| format!("Failed to load kernel config {}", p.display())),
        None => Ok(KernelConfig::load()),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn render(plan: &Plan, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(plan)?
    } else {
        plan.to_json_pretty()?
    };
    Ok(json)
}

fn run_plan(
    facts_path: &Path,
    policy_path: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    compact: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let facts = normalize_facts(&read_json(facts_path)?)
        .with_context(|| format!("Malformed facts in {}", facts_path.display()))?;
    let raw_policy = std::fs::read_to_string(policy_path)
        .with_context(|| format!("Failed to read {}", policy_path.display()))?;
    let policy = EffectivePolicy::from_json(&raw_policy)
        .with_context(|| format!("Malformed policy in {}", policy_path.display()))?;

    info!(
        facts = facts.len(),
        policy = %policy.policy_id,
        "Planning well"
    );
    let plan = plan_with_config(&facts, &policy, &config);
    let json = render(&plan, compact)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Plan written");
        }
        None => println!("{json}"),
    }

    if plan.metadata.blocked {
        warn!(
            violations = plan.violations.len(),
            "Plan blocked by critical findings"
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_batch(dir: &Path, out_dir: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    let mut request_files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".request.json"))
        })
        .collect();
    request_files.sort();

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut names = Vec::new();
    let mut requests = Vec::new();
    let mut failures = Vec::new();
    for path in &request_files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<PlanRequest>(&raw).map_err(Into::into));
        match parsed {
            Ok(req) => {
                names.push(name);
                requests.push(req);
            }
            Err(e) => failures.push(BatchFailure {
                request: name,
                error: e.to_string(),
            }),
        }
    }

    info!(
        requests = requests.len(),
        unreadable = failures.len(),
        "Planning batch"
    );
    let results = plan_batch(&requests, &config);

    let mut entries = Vec::new();
    for (name, result) in names.into_iter().zip(results) {
        let plan = match result {
            Ok(plan) => plan,
            Err(e) => {
                failures.push(BatchFailure {
                    request: name,
                    error: e.to_string(),
                });
                continue;
            }
        };
        let output = name.replace(".request.json", ".plan.json");
        let out_path = out_dir.join(&output);
        std::fs::write(&out_path, plan.to_json_pretty()?)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        entries.push(BatchEntry {
            request: name,
            output,
            api_number: plan.metadata.api_number.clone(),
            steps: plan.steps.len(),
            violations: plan.violations.len(),
            sacks: plan.metadata.totals.sacks,
            blocked: plan.metadata.blocked,
        });
    }

    let report = BatchReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        kernel_version: env!("CARGO_PKG_VERSION"),
        planned: entries.len(),
        blocked: entries.iter().filter(|e| e.blocked).count(),
        entries,
        failures,
    };
    let report_path = out_dir.join("batch_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    info!(
        planned = report.planned,
        blocked = report.blocked,
        failed = report.failures.len(),
        report = %report_path.display(),
        "Batch complete"
    );

    if report.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn run_config(dump: bool) -> Result<ExitCode> {
    let (config, provenance) = KernelConfig::load_with_provenance();
    if dump {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }
    let mut keys: Vec<&String> = provenance.explicit_keys.iter().collect();
    keys.sort();
    if keys.is_empty() {
        println!("Using built-in defaults (no keys set explicitly)");
    } else {
        println!("Explicitly set keys:");
        for key in keys {
            println!("  {key}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check_config(path: &Path) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let warnings = validate_unknown_keys(&raw);
    for w in &warnings {
        println!("warning: {w}");
    }
    KernelConfig::load_from_file(path)
        .with_context(|| format!("Invalid kernel config {}", path.display()))?;
    println!("{}: OK ({} warning(s))", path.display(), warnings.len());
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    match args.command {
        SubCommand::Plan {
            facts,
            policy,
            config,
            output,
            compact,
        } => run_plan(
            &facts,
            &policy,
            config.as_deref(),
            output.as_deref(),
            compact,
        ),
        SubCommand::Batch {
            dir,
            out_dir,
            config,
        } => run_batch(&dir, &out_dir, config.as_deref()),
        SubCommand::Config { dump } => run_config(dump),
        SubCommand::CheckConfig { path } => run_check_config(&path),
    }
}
