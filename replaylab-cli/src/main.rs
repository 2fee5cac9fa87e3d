//! ReplayLab CLI — run and verify commands.
//!
//! Commands:
//! - `run`: replay a bar file through the engine and print/export the report
//! - `verify`: run the same backtest N times in parallel and compare fingerprints

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use replaylab_core::StrategyKind;
use replaylab_runner::{
    load_bars, run_backtest_from_bars, run_determinism_check, save_equity_csv, save_json,
    save_trades_csv, BacktestConfig, BacktestResult, ConfigOverrides,
};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: deterministic, time-scaled market replay and backtesting"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, replaylab_core=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a bar file through the engine.
    Run {
        #[command(flatten)]
        run: RunArgs,

        /// Write the JSON report here.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the equity curve CSV here.
        #[arg(long)]
        equity_csv: Option<PathBuf>,

        /// Write the trade list CSV here.
        #[arg(long)]
        trades_csv: Option<PathBuf>,
    },
    /// Run the same backtest several times in parallel and check the fingerprints match.
    Verify {
        #[command(flatten)]
        run: RunArgs,

        /// Number of independent runs.
        #[arg(long, default_value_t = 3)]
        runs: usize,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Bar file (.csv or .parquet).
    #[arg(long)]
    data: PathBuf,

    /// TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy: fake_trend or fake_random.
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Simulation seconds per wall second.
    #[arg(long)]
    speed: Option<f64>,

    /// Master RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Slippage in percent of the reference price.
    #[arg(long)]
    slippage: Option<f64>,

    /// Instrument symbol for the replayed bars.
    #[arg(long)]
    symbol: Option<String>,

    /// Fixed spacing between bars instead of timestamp deltas.
    #[arg(long, default_value_t = false)]
    deterministic: bool,

    /// Publish a TICK after every bar.
    #[arg(long, default_value_t = false)]
    emit_ticks: bool,

    /// Refuse input whose timestamps go backwards.
    #[arg(long, default_value_t = false)]
    strict_timestamps: bool,
}

impl RunArgs {
    fn backtest_config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => BacktestConfig::default(),
        };
        config.apply_overrides(ConfigOverrides {
            symbol: self.symbol.clone(),
            strategy: self.strategy,
            speed: self.speed,
            seed: self.seed,
            slippage_percent: self.slippage,
            deterministic: self.deterministic,
            emit_ticks: self.emit_ticks,
            strict_timestamps: self.strict_timestamps,
        });
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            run,
            output,
            equity_csv,
            trades_csv,
        } => run_cmd(&run, output, equity_csv, trades_csv),
        Commands::Verify { run, runs } => verify_cmd(&run, runs),
    }
}

fn init_tracing(default_level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid --log-level '{default_level}'"))?,
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr).compact())
        .init();
    Ok(())
}

fn run_cmd(
    args: &RunArgs,
    output: Option<PathBuf>,
    equity_csv: Option<PathBuf>,
    trades_csv: Option<PathBuf>,
) -> Result<()> {
    let config = args.backtest_config()?;
    let bars = load_bars(&args.data)
        .with_context(|| format!("loading bars from {}", args.data.display()))?;
    let result = run_backtest_from_bars(&config.to_engine_config(), &bars)?;

    print_summary(&result);

    if let Some(path) = output {
        save_json(&result, &path)?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = equity_csv {
        save_equity_csv(&result.report.equity_curve, &path)?;
        info!(path = %path.display(), "equity curve written");
    }
    if let Some(path) = trades_csv {
        save_trades_csv(&result.report.trades, &path)?;
        info!(path = %path.display(), "trades written");
    }
    Ok(())
}

fn verify_cmd(args: &RunArgs, runs: usize) -> Result<()> {
    let config = args.backtest_config()?;
    let bars = load_bars(&args.data)
        .with_context(|| format!("loading bars from {}", args.data.display()))?;
    let report = run_determinism_check(&config.to_engine_config(), &bars, runs)?;

    println!();
    println!("=== Determinism Check ===");
    println!("Runs:           {}", report.runs);
    for (i, fp) in report.fingerprints.iter().enumerate() {
        println!(
            "Run {:<3}        {} ({} trades)",
            i + 1,
            fp.short(),
            fp.num_trades
        );
    }
    if !report.is_deterministic() {
        bail!(
            "runs diverged: {} distinct fingerprints across {} runs",
            report.distinct_run_hashes.len(),
            report.runs
        );
    }
    println!("Result:         identical");
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let r = &result.report;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.config.symbol);
    println!("Strategy:       {}", result.config.strategy);
    println!("Seed:           {}", result.config.seed);
    println!("Bars:           {}", result.bar_count);
    if let Some(replay) = result.replay {
        if replay.out_of_order > 0 {
            println!("Out of order:   {}", replay.out_of_order);
        }
    }
    println!("Trades:         {}", r.num_trades);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.6}", r.total_return);
    println!("Max Drawdown:   {:.6}", r.max_drawdown);
    println!("Win Rate:       {:.1}%", r.winrate * 100.0);
    println!("Final Equity:   {:.6}", r.final_equity);
    println!("Realized PnL:   {:.6}", r.final_realized_pnl);
    println!("Unrealized PnL: {:.6}", r.final_unrealized_pnl);
    println!();
    println!("--- Engine ---");
    println!("State:          {}", result.stats.state);
    println!("Events:         {}", result.stats.events_published);
    println!("Handler errors: {}", result.stats.handler_errors);
    if result.stats.policy.denials > 0 {
        println!("Orders denied:  {}", result.stats.policy.denials);
    }
    println!("Fingerprint:    {}", result.fingerprint.run_hash);
}
