//! SwingLab CLI: batch runs, incremental replay and stored summaries.
//!
//! Commands:
//! - `run`: execute a run file over every group and store the results
//! - `replay`: feed the same bars through the incremental engine in chunks,
//!   committing each cycle, then check the result against a batch run
//! - `summary`: print the profit/loss table of a stored run, optionally with
//!   its daily balances
//! - `check`: validate a JSON parameter record

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use swinglab_core::RunKey;
use swinglab_runner::store::SCHEMA_VERSION;
use swinglab_runner::{
    data_loader, run_and_store, run_batch, verify, ChunkedReplay, FileStore, LiveSession,
    ParamRecord, Provenance, RunArtifacts, RunConfig,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab: swing-pattern analysis and backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every group in a run file and store the results.
    Run {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Process groups one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Replay a run file's bars through the incremental engine.
    Replay {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Bars delivered per poll cycle.
        #[arg(long, default_value_t = 100)]
        chunk: usize,

        /// Delete any rows already stored for this run before replaying.
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },
    /// Print the summary of a stored run.
    Summary {
        /// Run directory, e.g. runs/1_1.
        #[arg(long)]
        run_dir: PathBuf,

        /// Recompute from ledger.csv instead of reading summary.json.
        #[arg(long, default_value_t = false)]
        from_ledger: bool,

        /// Also print the daily balance of every group.
        #[arg(long, default_value_t = false)]
        daily: bool,
    },
    /// Validate a JSON parameter record and print the resolved parameters.
    Check {
        /// Path to a JSON file holding the flat parameter record.
        #[arg(long)]
        params: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, sequential } => {
            let config = load_config(&config)?;
            run_cmd(&config, !sequential)
        }
        Commands::Replay {
            config,
            chunk,
            fresh,
        } => {
            let config = load_config(&config)?;
            replay_cmd(&config, chunk, fresh)
        }
        Commands::Summary {
            run_dir,
            from_ledger,
            daily,
        } => {
            init_tracing(None);
            summary_cmd(&run_dir, from_ledger, daily)
        }
        Commands::Check { params } => {
            init_tracing(None);
            check_cmd(&params)
        }
    }
}

/// Load the run file, then start logging at its `log_level`.
fn load_config(path: &Path) -> Result<RunConfig> {
    let config = RunConfig::load(path)
        .with_context(|| format!("failed to load run file {}", path.display()))?;
    init_tracing(config.log_level.as_deref());
    Ok(config)
}

/// `RUST_LOG` wins over the run file's level; the default is `info`.
fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn run_cmd(config: &RunConfig, parallel: bool) -> Result<()> {
    let store = FileStore::new(&config.output_dir);
    let (artifacts, dir) = if parallel {
        run_and_store(config, &store)?
    } else {
        let artifacts = run_batch(config, false)?;
        let dir = swinglab_runner::RunStore::save_run(&store, &artifacts)?;
        (artifacts, dir)
    };

    print_report(&artifacts);
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

fn replay_cmd(config: &RunConfig, chunk: usize, fresh: bool) -> Result<()> {
    if chunk == 0 {
        bail!("--chunk must be at least 1");
    }
    let store = FileStore::new(&config.output_dir);
    let run_dir = store.run_dir(config.run);
    if fresh && run_dir.exists() {
        std::fs::remove_dir_all(&run_dir)
            .with_context(|| format!("failed to clear {}", run_dir.display()))?;
        info!(dir = %run_dir.display(), "cleared stored run");
    }

    let loaded = data_loader::load(&config.data)?;
    let provenance = Provenance {
        dataset_hash: loaded.dataset_hash.clone(),
        synthetic: loaded.synthetic,
    };

    let mut session = LiveSession::open(config.run, &config.params, &store)?;
    let cycles = session.run(&mut ChunkedReplay::new(loaded.bars, chunk))?;
    let replayed = session.finish(&provenance)?;

    let batch = run_batch(config, true)?;
    verify(&replayed, &batch).context("replay does not match the batch run")?;

    print_report(&replayed);
    println!(
        "Replayed {cycles} cycles of up to {chunk} bars; matches batch run. Stored in {}",
        run_dir.display()
    );
    Ok(())
}

fn summary_cmd(run_dir: &Path, from_ledger: bool, daily: bool) -> Result<()> {
    let manifest = FileStore::load_manifest(run_dir)
        .with_context(|| format!("no readable manifest in {}", run_dir.display()))?;
    if manifest.schema_version != SCHEMA_VERSION {
        info!(
            found = manifest.schema_version,
            current = SCHEMA_VERSION,
            "older artifact schema"
        );
    }

    let ledger = if from_ledger {
        Some(FileStore::load_ledger_at(run_dir)?)
    } else {
        None
    };
    let summary = match &ledger {
        Some(ledger) => swinglab_runner::summarize(manifest.run, &manifest.params, ledger),
        None => FileStore::load_summary(run_dir)?,
    };

    println!("{summary}");
    for failed in &manifest.failed_groups {
        println!("FAILED {}: {}", failed.group, failed.error);
    }
    if daily {
        let portfolio = match &ledger {
            Some(ledger) => swinglab_runner::daily_balances(manifest.run, ledger),
            None => FileStore::load_portfolio(run_dir)?,
        };
        println!();
        println!(
            "{:<10} {:<4} {:<10} {:>6} {:>14} {:>14} {:>8}",
            "Symbol", "TF", "Date", "Exits", "Start", "End", "Change"
        );
        for d in &portfolio {
            println!(
                "{:<10} {:<4} {:<10} {:>6} {:>14.2} {:>14.2} {:>7.2}%",
                d.symbol,
                d.timeframe,
                d.execution_date,
                d.trade_number,
                d.starting_balance,
                d.ending_balance,
                d.percentage_change,
            );
        }
    }
    Ok(())
}

fn check_cmd(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = ParamRecord::from_json_str(&text)?;
    let run: RunKey = record.run_key(RunKey::default())?;
    let params = record.engine_params()?;

    println!("Run: {run}");
    println!("Config ID: {}", params.config_id());
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

fn print_report(artifacts: &RunArtifacts) {
    let m = &artifacts.manifest;
    println!("=== SwingLab Run {} ===", m.run);
    println!("Config ID:     {}", m.config_id);
    println!(
        "Data:          {}{}",
        &m.dataset_hash[..m.dataset_hash.len().min(16)],
        if m.synthetic { " (synthetic)" } else { "" }
    );
    println!();

    for g in &m.groups {
        println!(
            "{:<16} bars {:>7}  trades {:>4}  return {:>8.2}%  max DD {:>7.2}%  win {:>6.1}%  PF {:>6.2}",
            g.group.to_string(),
            g.bars,
            g.round_trips,
            g.metrics.total_return * 100.0,
            g.metrics.max_drawdown * 100.0,
            g.metrics.win_rate * 100.0,
            g.metrics.profit_factor,
        );
    }
    for f in &m.failed_groups {
        println!("{:<16} FAILED: {}", f.group.to_string(), f.error);
    }
    println!();
    println!("{}", artifacts.summary);
}
