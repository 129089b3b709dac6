//! StrokeLab CLI: inspect the bar store and replay stroke signals.
//!
//! Commands:
//! - `symbols`: list the symbols of a store group
//! - `bars`: load one symbol's bars, optionally resampled, as CSV
//! - `check`: replay signals over one symbol (store or synthetic bars)
//! - `check-group`: replay signals over every symbol of a group in parallel

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

use strokelab_core::domain::Freq;
use strokelab_core::signal::{dif_near_zero, SignalConfig, SignalRegistry};
use strokelab_runner::{
    bars_to_csv, generate_bars, replay, replay_group, resample, write_events_csv,
    write_reports_json, BarStore, GroupSource, ReplayConfig, ReplayReport, RunConfig,
    StoreConfig,
};

#[derive(Parser)]
#[command(
    name = "strokelab",
    about = "StrokeLab CLI: stroke segmentation and MACD buy/sell-point replay"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the symbols stored in a group.
    Symbols {
        /// Store root. Defaults to ./data.
        #[arg(long, default_value = "data")]
        root: PathBuf,

        /// Group directory under the root.
        #[arg(long, default_value = "watchlist")]
        group: String,
    },
    /// Print one symbol's bars as CSV.
    Bars {
        #[arg(long, default_value = "data")]
        root: PathBuf,

        #[arg(long)]
        symbol: String,

        /// Frequency to load (e.g., 5m, 30m, D).
        #[arg(long, default_value = "D")]
        freq: String,

        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Resample the loaded bars into a coarser frequency.
        #[arg(long)]
        resample: Option<String>,
    },
    /// Replay signals over one symbol from a TOML config or flags.
    Check {
        /// Path to a TOML run config. Flags below override its fields.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        symbol: Option<String>,

        #[arg(long, default_value = "data")]
        root: PathBuf,

        /// Frequency of the stored bars.
        #[arg(long)]
        base_freq: Option<String>,

        /// Signal frequency (without --config).
        #[arg(long, default_value = "30m")]
        freq: String,

        /// Band width in percent of the DIF standard deviation (without --config).
        #[arg(long, default_value_t = dif_near_zero::DEFAULT_T)]
        t: u32,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Replay over seeded synthetic bars instead of the store.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Number of synthetic bars.
        #[arg(long, default_value_t = 5_000)]
        bars: usize,

        /// Forward-return horizon in signal-frequency bars.
        #[arg(long)]
        horizon: Option<usize>,

        /// Write events as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Replay the configured signals over every symbol in a group.
    CheckGroup {
        #[arg(long)]
        config: PathBuf,

        /// Group to replay. Defaults to the config's store group.
        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: Option<PathBuf>,
    },
}

/// Flag overrides for `check`.
struct CheckArgs {
    config: Option<PathBuf>,
    symbol: Option<String>,
    root: PathBuf,
    base_freq: Option<String>,
    freq: String,
    t: u32,
    start: Option<String>,
    end: Option<String>,
    synthetic: bool,
    bars: usize,
    horizon: Option<usize>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Symbols { root, group } => run_symbols(&root, &group),
        Commands::Bars {
            root,
            symbol,
            freq,
            start,
            end,
            resample,
        } => run_bars(&root, &symbol, &freq, start, end, resample),
        Commands::Check {
            config,
            symbol,
            root,
            base_freq,
            freq,
            t,
            start,
            end,
            synthetic,
            bars,
            horizon,
            csv,
            json,
        } => run_check(CheckArgs {
            config,
            symbol,
            root,
            base_freq,
            freq,
            t,
            start,
            end,
            synthetic,
            bars,
            horizon,
            csv,
            json,
        }),
        Commands::CheckGroup {
            config,
            group,
            csv,
            json,
        } => run_check_group(&config, group, csv, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn parse_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn parse_freq(s: &str) -> Result<Freq> {
    s.parse::<Freq>().with_context(|| format!("invalid frequency '{s}'"))
}

fn run_symbols(root: &Path, group: &str) -> Result<()> {
    let store = BarStore::new(root);
    let symbols = store
        .list_symbols(group)
        .with_context(|| format!("failed to list group '{group}'"))?;
    for symbol in &symbols {
        println!("{symbol}");
    }
    tracing::info!(group, count = symbols.len(), "listed symbols");
    Ok(())
}

fn run_bars(
    root: &Path,
    symbol: &str,
    freq: &str,
    start: Option<String>,
    end: Option<String>,
    target: Option<String>,
) -> Result<()> {
    let freq = parse_freq(freq)?;
    let store = BarStore::new(root);
    let mut bars = store.load_bars(
        symbol,
        freq,
        parse_date(start.as_deref())?,
        parse_date(end.as_deref())?,
        store.adjustment(),
    )?;
    if let Some(target) = target {
        bars = resample(&bars, parse_freq(&target)?)?;
    }
    print!("{}", bars_to_csv(&bars)?);
    Ok(())
}

/// Build the run config for `check` from a file or from flags alone.
fn check_config(args: &CheckArgs, registry: &SignalRegistry) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig {
            store: StoreConfig {
                root: args.root.clone(),
                ..StoreConfig::default()
            },
            segmenter: Default::default(),
            signals: vec![SignalConfig::new(dif_near_zero::NAME, parse_freq(&args.freq)?)
                .with_param("t", f64::from(args.t))],
            replay: ReplayConfig::default(),
        },
    };

    if let Some(symbol) = &args.symbol {
        config.replay.symbol = Some(symbol.clone());
    }
    if let Some(base) = &args.base_freq {
        config.replay.base_freq = parse_freq(base)?;
    }
    if let Some(start) = parse_date(args.start.as_deref())? {
        config.replay.start = Some(start);
    }
    if let Some(end) = parse_date(args.end.as_deref())? {
        config.replay.end = Some(end);
    }
    if let Some(horizon) = args.horizon {
        config.replay.horizon = horizon;
    }
    config.validate(registry)?;
    Ok(config)
}

fn run_check(args: CheckArgs) -> Result<()> {
    let registry = SignalRegistry::with_builtins();
    let config = check_config(&args, &registry)?;
    let Some(symbol) = config.replay.symbol.clone() else {
        bail!("--symbol is required (or set replay.symbol in the config)");
    };

    let bars = if args.synthetic {
        let start = config
            .replay
            .start
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default())
            .and_hms_opt(9, 30, 0)
            .unwrap_or_default();
        generate_bars(&symbol, config.replay.base_freq, start, args.bars)
    } else {
        config.store.open().load_bars(
            &symbol,
            config.replay.base_freq,
            config.replay.start,
            config.replay.end,
            config.store.adjustment,
        )?
    };
    if bars.is_empty() {
        bail!("no bars for {symbol} in the requested window");
    }

    let evaluators = registry.create_all(&config.signals)?;
    let report = replay(&symbol, &bars, &evaluators, &config.replay_options())?;

    println!("Config hash:    {}", config.config_hash()?);
    print_report(&report);
    save_outputs(std::slice::from_ref(&report), args.csv, args.json)
}

fn run_check_group(
    config_path: &Path,
    group: Option<String>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let config = RunConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let registry = SignalRegistry::with_builtins();
    let group = group.unwrap_or_else(|| config.store.group.clone());

    let store = config.store.open();
    let source = GroupSource {
        store: &store,
        group: &group,
        base_freq: config.replay.base_freq,
        start: config.replay.start,
        end: config.replay.end,
        adjustment: config.store.adjustment,
    };
    let results = replay_group(&source, &config.signals, &registry, &config.replay_options())?;

    println!("Config hash:    {}", config.config_hash()?);
    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0usize;
    for (symbol, result) in results {
        match result {
            Ok(report) => {
                print_report(&report);
                reports.push(report);
            }
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failed += 1;
            }
        }
    }
    save_outputs(&reports, csv, json)?;
    if failed > 0 {
        bail!("{failed} symbol(s) failed");
    }
    Ok(())
}

fn save_outputs(reports: &[ReplayReport], csv: Option<PathBuf>, json: Option<PathBuf>) -> Result<()> {
    if let Some(path) = csv {
        write_events_csv(reports, &path)?;
        println!("Events saved to: {}", path.display());
    }
    if let Some(path) = json {
        write_reports_json(reports, &path)?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    println!();
    println!("=== Replay: {} ===", report.symbol);
    match (report.start, report.end) {
        (Some(s), Some(e)) => println!("Period:         {s} to {e}"),
        _ => println!("Period:         (empty)"),
    }
    println!("Bars:           {} ({})", report.bars, report.base_freq);
    println!("Horizon:        {} bars", report.horizon);
    for (key, counts) in &report.counts {
        println!();
        println!("--- {key} ---");
        println!("Buy points:     {}", counts.buy_point);
        println!("Sell points:    {}", counts.sell_point);
        println!("Other:          {}", counts.other);
        match report.hits.get(key).and_then(|h| h.rate().map(|r| (h, r))) {
            Some((h, rate)) => println!(
                "Hit rate:       {:.1}% ({}/{})",
                rate * 100.0,
                h.hits,
                h.evaluated
            ),
            None => println!("Hit rate:       n/a"),
        }
    }
    let recent: Vec<_> = report.events.iter().rev().take(10).collect();
    if !recent.is_empty() {
        println!();
        println!("--- Recent events ---");
        for e in recent.into_iter().rev() {
            let ret = e
                .forward_return
                .map(|r| format!("{:+.2}%", r * 100.0))
                .unwrap_or_else(|| "-".into());
            println!(
                "{}  {:<4} {:<11} close {:.3}  fwd {}",
                e.dt,
                e.freq.label(),
                e.value.label(),
                e.close,
                ret
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CheckArgs {
        CheckArgs {
            config: None,
            symbol: Some("600000.SH".into()),
            root: PathBuf::from("data"),
            base_freq: Some("5m".into()),
            freq: "30m".into(),
            t: 50,
            start: Some("2024-01-01".into()),
            end: Some("2024-09-01".into()),
            synthetic: true,
            bars: 100,
            horizon: Some(3),
            csv: None,
            json: None,
        }
    }

    #[test]
    fn cli_parses_check_flags() {
        let cli = Cli::try_parse_from([
            "strokelab", "check", "--symbol", "X", "--base-freq", "5m", "--freq", "30m", "--t",
            "60", "--synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::Check { t, synthetic, freq, .. } => {
                assert_eq!(t, 60);
                assert!(synthetic);
                assert_eq!(freq, "30m");
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn flags_build_a_valid_config() {
        let config = check_config(&args(), &SignalRegistry::with_builtins()).unwrap();
        assert_eq!(config.replay.symbol.as_deref(), Some("600000.SH"));
        assert_eq!(config.replay.base_freq, Freq::F5);
        assert_eq!(config.replay.horizon, 3);
        assert_eq!(config.signals[0].freq, Freq::F30);
        assert_eq!(config.signals[0].params["t"], 50.0);
    }

    #[test]
    fn bad_flags_are_rejected() {
        let mut a = args();
        a.start = Some("01/02/2024".into());
        assert!(check_config(&a, &SignalRegistry::with_builtins()).is_err());

        let mut a = args();
        a.freq = "1m".into();
        assert!(check_config(&a, &SignalRegistry::with_builtins()).is_err());
    }
}
