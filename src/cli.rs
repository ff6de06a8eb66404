//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::bar::Bar;
use crate::domain::config::{EngineConfig, build_engine_config};
use crate::domain::engine::{BarOutcome, BarReport, Engine};
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "orbtrader", about = "Per-bar strategy decision engine")]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay CSV bars through the engine against a paper broker
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Replay only this symbol instead of `[data] symbols`
        #[arg(short, long)]
        symbol: Option<String>,
        /// Decision log path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with bar files in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    let result = match cli.command {
        Command::Run {
            config,
            symbol,
            output,
        } => run_replay(&config, symbol.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Installs the global subscriber; a second call is a no-op.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, EngineConfig), EngineError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let config = build_engine_config(&adapter)?;
    Ok((adapter, config))
}

fn data_dir(adapter: &dyn ConfigPort) -> Result<PathBuf, EngineError> {
    adapter
        .get_string("data", "dir")
        .filter(|d| !d.trim().is_empty())
        .map(|d| PathBuf::from(d.trim()))
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })
}

/// Symbol override, else `[data] symbols`, else every file in the data dir.
pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
    data: &dyn MarketDataPort,
) -> Result<Vec<String>, EngineError> {
    if let Some(symbol) = symbol_override {
        return Ok(vec![symbol.trim().to_string()]);
    }
    let configured = config.get_list("data", "symbols");
    if !configured.is_empty() {
        return Ok(configured);
    }
    data.list_symbols()
}

/// Feeds each symbol's bars through `engine` on its own thread, applying the
/// paper broker's fills after every bar. Reports come back grouped by symbol
/// in the order given.
pub fn replay(engine: &Engine<PaperBroker>, series: Vec<(String, Vec<Bar>)>) -> Vec<BarReport> {
    thread::scope(|scope| {
        let handles: Vec<_> = series
            .into_iter()
            .map(|(symbol, bars)| {
                scope.spawn(move || {
                    let mut reports = Vec::with_capacity(bars.len());
                    for bar in bars {
                        reports.push(engine.on_bar(bar));
                        for fill in engine.broker().drain_fills(&symbol) {
                            engine.on_fill(&symbol, fill.qty_delta, Some(fill.price));
                        }
                    }
                    reports
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(reports) => reports,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// (orders submitted, bars skipped on a bar-scoped error) for one symbol.
pub fn replay_counts(reports: &[BarReport], symbol: &str) -> (usize, usize) {
    reports
        .iter()
        .filter(|r| r.symbol == symbol)
        .fold((0, 0), |(orders, skipped), r| {
            let submitted = matches!(r.outcome, BarOutcome::Submitted { .. });
            let errored = r.outcome.error().is_some_and(EngineError::is_bar_scoped);
            (orders + usize::from(submitted), skipped + usize::from(errored))
        })
}

fn write_reports<R: ReportPort>(sink: &mut R, reports: &[BarReport]) -> Result<(), EngineError> {
    for report in reports {
        sink.record(report)?;
    }
    sink.finish()
}

fn run_replay(
    config_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), EngineError> {
    info!(path = %config_path.display(), "loading config");
    let (adapter, config) = load_config(config_path)?;
    let data = CsvAdapter::new(data_dir(&adapter)?);

    let symbols = resolve_symbols(symbol_override, &adapter, &data)?;
    if symbols.is_empty() {
        return Err(EngineError::ConfigMissing {
            section: "data".into(),
            key: "symbols".into(),
        });
    }

    let mut series = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let bars = data.fetch_bars(symbol, None, None)?;
        info!(%symbol, bars = bars.len(), "loaded bars");
        series.push((symbol.clone(), bars));
    }

    let engine = Engine::new(config, PaperBroker::new());
    let reports = replay(&engine, series);

    match output_path {
        Some(path) => write_reports(&mut CsvReportAdapter::create(path)?, &reports)?,
        None => write_reports(&mut CsvReportAdapter::new(std::io::stdout().lock())?, &reports)?,
    }

    for symbol in &symbols {
        let position = engine.position(symbol);
        let (orders, skipped) = replay_counts(&reports, symbol);
        if skipped > 0 {
            warn!(%symbol, skipped, "bars skipped on errors during replay");
        }
        eprintln!(
            "{symbol}: {orders} orders, final position {}, bars skipped on errors {skipped}",
            position.net_qty
        );
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), EngineError> {
    eprintln!("Validating config: {}", config_path.display());
    let (adapter, config) = load_config(config_path)?;

    eprintln!(
        "  session:       {} - {}",
        config.session.start, config.session.end
    );
    if config.evaluator.uses_opening_range() {
        eprintln!("  opening range: {} bars", config.opening_range_bars);
    } else {
        eprintln!("  opening range: unused by this signal");
    }
    eprintln!("  signal:        {}", config.evaluator.build().name());
    eprintln!(
        "  order:         capital {} target x{} trail {} expiry {}s",
        config.bracket.capital_per_trade,
        config.bracket.target_multiple,
        config
            .bracket
            .trail_stop_by
            .map(|t| t.to_string())
            .unwrap_or_else(|| "off".into()),
        config.bracket.expiry_seconds
    );
    eprintln!(
        "  engine:        window {} every {} bar(s)",
        config.window_capacity, config.evaluate_every
    );
    if let Some(dir) = adapter.get_string("data", "dir") {
        eprintln!("  data:          {dir}");
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), EngineError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let data = CsvAdapter::new(data_dir(&adapter)?);
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}
