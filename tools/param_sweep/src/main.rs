use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use ecosim_core::{
    load_ecology_config_from_env,
    sweep::{expand_trials, run_sweep, SweepAxis, SweepBudget, TrialOutcome},
    EcologyConfig,
};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Parallel parameter sweep over ecosystem worlds", long_about = None)]
struct Args {
    /// Path to an ecology config JSON file (defaults to ECOLOGY_CONFIG_PATH or the builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated seeds to run for every parameter combination
    #[arg(long, value_delimiter = ',', default_value = "1")]
    seeds: Vec<u64>,

    /// Tick budget per trial
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Abandon a trial after this many ticks without any state change (0 disables)
    #[arg(long, default_value_t = 50)]
    stagnation_ticks: u64,

    /// Swept parameter (format: key=min:max:steps); repeatable
    #[arg(long = "vary")]
    vary: Vec<String>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    jobs: Option<usize>,

    /// Stop starting new trials after this many seconds
    #[arg(long)]
    time_budget_secs: Option<u64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    width: u32,
    height: u32,
    budget: SweepBudget,
    axes: &'a [SweepAxis],
    requested: usize,
    cancelled: bool,
    outcomes: Vec<TrialOutcome>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let base = match &args.config {
        Some(path) => EcologyConfig::from_file(path)
            .with_context(|| format!("Failed to load config at {}", path.display()))?,
        None => load_ecology_config_from_env().0,
    };

    let axes = args
        .vary
        .iter()
        .map(|text| SweepAxis::parse(text).with_context(|| format!("Invalid --vary '{text}'")))
        .collect::<Result<Vec<_>>>()?;
    let trials = expand_trials(&args.seeds, &axes);
    let budget = SweepBudget {
        max_ticks: args.ticks,
        stagnation_ticks: args.stagnation_ticks,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    if let Some(secs) = args.time_budget_secs {
        let flag = Arc::clone(&cancel);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            flag.store(true, Ordering::Relaxed);
            info!(target: "param_sweep", secs, "sweep.time_budget_exhausted");
        });
    }

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = args.jobs {
        pool = pool.num_threads(jobs.max(1));
    }
    let pool = pool.build().context("Failed to build worker pool")?;

    info!(
        target: "param_sweep",
        trials = trials.len(),
        threads = pool.current_num_threads(),
        ticks = budget.max_ticks,
        "sweep.started"
    );
    let outcomes = pool.install(|| run_sweep(&base, &trials, budget, &cancel));

    let report = Report {
        width: base.width,
        height: base.height,
        budget,
        axes: &axes,
        requested: trials.len(),
        cancelled: cancel.load(Ordering::Relaxed),
        outcomes,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to serialise sweep report")?;
    println!("{json}");
    Ok(())
}
