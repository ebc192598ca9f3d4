use basket_clock::ManualClock;
use basket_core::{EntrySignal, Equity};
use basket_engine::{BasketEngine, load_config};
use basket_runner::{EngineRunner, LogSink, PaperGateway, RunnerConfig, load_ticks};
use log::{info, warn};
use std::sync::Arc;

fn print_help() {
    eprintln!(
        r#"Basket Replay - run the grid/basket engine against a tick file

USAGE:
    basket-replay --config <PATH> --ticks <PATH> [OPTIONS]

OPTIONS:
    --config <PATH>     Engine configuration (JSON)
    --ticks <PATH>      Tick file, one JSON object per line
    --equity <DECIMAL>  Starting account equity (enables equity triggers)
    --signal <SIDES>    Entry signal sent after the first tick: both, long, short
                        (default: both; ignored when grid.auto_build is set)
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Replay a day of EURUSD quotes
    basket-replay --config eurusd.json --ticks eurusd.jsonl

    # Long-only with an equity band around 10000
    basket-replay --config eurusd.json --ticks eurusd.jsonl --equity 10000 --signal long
"#
    );
}

fn require_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut ticks_path: Option<String> = None;
    let mut equity: Option<Equity> = None;
    let mut signal = EntrySignal::both();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                config_path = Some(require_value(&args, i, "--config"));
            }
            "--ticks" | "-t" => {
                i += 1;
                ticks_path = Some(require_value(&args, i, "--ticks"));
            }
            "--equity" => {
                i += 1;
                let value = require_value(&args, i, "--equity");
                equity = Some(value.parse()?);
            }
            "--signal" => {
                i += 1;
                signal = match require_value(&args, i, "--signal").as_str() {
                    "both" => EntrySignal::both(),
                    "long" => EntrySignal::long_only(),
                    "short" => EntrySignal::short_only(),
                    other => {
                        eprintln!("Error: unknown signal '{}'", other);
                        std::process::exit(1);
                    }
                };
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(config_path), Some(ticks_path)) = (config_path, ticks_path) else {
        eprintln!("Error: --config and --ticks are required");
        print_help();
        std::process::exit(1);
    };

    info!("[REPLAY] Loading configuration from: {}", config_path);
    let config = load_config(&config_path)?;
    let symbol = config.instrument.symbol.clone();
    let auto_build = config.grid.auto_build;

    let ticks = load_ticks(&ticks_path)?;
    info!("[REPLAY] {} ticks for {} from {}", ticks.len(), symbol, ticks_path);
    let Some(first) = ticks.first() else {
        warn!("[REPLAY] Tick file is empty, nothing to do");
        return Ok(());
    };

    let engine = match equity {
        Some(equity) => BasketEngine::start_with_equity(config, equity)?,
        None => BasketEngine::start(config)?,
    };

    let clock = Arc::new(ManualClock::new(first.timestamp));
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::named(symbol.clone()),
        engine,
        PaperGateway::new(),
        LogSink::new(),
        clock.clone(),
    );
    let task = tokio::spawn(runner.run());

    for (n, tick) in ticks.into_iter().enumerate() {
        clock.set_time(tick.timestamp);
        handle.tick(tick)?;
        if n == 0 && !auto_build {
            handle.signal(signal)?;
        }
    }
    handle.shutdown()?;

    let (engine, stats) = task.await?;
    drop(handle);

    let ledger = engine.ledger();
    println!("Replay of {} finished", symbol);
    println!("  Realized PnL:  {}", engine.realized_pnl());
    println!("  Net position:  {}", ledger.net_position());
    println!("  Open legs:     {}", ledger.all_legs().count());
    println!("  Pending grid:  {}", engine.grid().pending().len());
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
