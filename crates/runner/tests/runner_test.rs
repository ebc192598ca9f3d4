//! Runner Integration Test
//!
//! Drives a real BasketEngine through the serial runner:
//! 1. Ticks and a signal lay the grid on the paper gateway
//! 2. Paper fills come back through the queue and open legs
//! 3. Protective orders rest on the paper gateway and take profit
//! 4. Gateway refusals come back as rejections and are reconciled
//! 5. Sweeps expire pending levels on the clock's time

use basket_clock::ManualClock;
use basket_core::{
    EntrySignal, FillEvent, IntentAction, OrderIntent, OrderType, Side, TelemetryEvent, Tick,
    Timestamp,
};
use basket_engine::{BasketEngine, BasketPhase, EngineConfig, GridMode};
use basket_ports::{ExecutionGateway, GatewayError, GatewayResult, TelemetrySink};
use basket_runner::{EngineRunner, PaperGateway, RunnerConfig};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

fn tick(mid: Decimal, secs: i64) -> Tick {
    Tick::from_quote(mid, mid, at(secs))
}

fn long_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.grid.mode = GridMode::LongOnly;
    config.sizing.martingale_multiplier = dec!(1);
    config.equity.max_legs_to_close = 1;
    config
}

/// Telemetry shared with the test after the runner has consumed the sink
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<TelemetryEvent>>>);

impl SharedSink {
    fn kinds(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    fn events(&self) -> Vec<TelemetryEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl TelemetrySink for SharedSink {
    fn publish(&mut self, event: &TelemetryEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

/// Paper gateway that refuses the first stop order it sees
struct FirstStopRefused {
    inner: PaperGateway,
    refused: bool,
}

impl ExecutionGateway for FirstStopRefused {
    fn submit(&mut self, intent: &OrderIntent) -> GatewayResult<()> {
        if !self.refused
            && intent.action == IntentAction::Place
            && intent.order_type == OrderType::Stop
        {
            self.refused = true;
            return Err(GatewayError::Rejected {
                order_id: intent.order_id,
                reason: "stop too close to market".to_string(),
            });
        }
        self.inner.submit(intent)
    }

    fn poll_fills(&mut self, tick: &Tick) -> Vec<FillEvent> {
        self.inner.poll_fills(tick)
    }
}

#[tokio::test]
async fn test_paper_fills_open_and_take_profit() {
    init_logger();
    let engine = BasketEngine::start(long_config()).unwrap();
    let sink = SharedSink::default();
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::named("EURUSD"),
        engine,
        PaperGateway::new(),
        sink.clone(),
        Arc::new(ManualClock::new(at(0))),
    );
    let task = tokio::spawn(runner.run());

    // === Step 1: Grid below 1.1030 ===
    handle.tick(tick(dec!(1.1030), 0)).unwrap();
    handle.signal(EntrySignal::long_only()).unwrap();

    // === Step 2: 1.1020 level fills, protection placed ===
    handle.tick(tick(dec!(1.1020), 10)).unwrap();

    // === Step 3: Price reaches the take-profit ===
    handle.tick(tick(dec!(1.1040), 20)).unwrap();
    handle.shutdown().unwrap();

    let (engine, stats) = task.await.unwrap();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.signals, 1);
    assert_eq!(stats.fills, 2);
    assert_eq!(stats.rejections, 0);

    assert!(engine.ledger().is_flat());
    assert_eq!(engine.realized_pnl(), dec!(0.0002));
    assert_eq!(engine.phase(Side::Buy), BasketPhase::Empty);
    assert!(engine.grid().is_empty());
    assert_eq!(engine.grid().reference(), None);
    assert_eq!(
        sink.kinds(),
        vec!["GridRebuilt", "LegOpened", "BasketClosed"]
    );
}

#[tokio::test]
async fn test_refused_stop_is_reconciled_on_next_tick() {
    init_logger();
    let engine = BasketEngine::start(long_config()).unwrap();
    let sink = SharedSink::default();
    let gateway = FirstStopRefused {
        inner: PaperGateway::new(),
        refused: false,
    };
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::default(),
        engine,
        gateway,
        sink.clone(),
        Arc::new(ManualClock::new(at(0))),
    );
    let task = tokio::spawn(runner.run());

    handle.tick(tick(dec!(1.1030), 0)).unwrap();
    handle.signal(EntrySignal::long_only()).unwrap();
    // Fill opens a leg; its stop is refused by the gateway
    handle.tick(tick(dec!(1.1020), 10)).unwrap();
    // Next tick re-derives the stop from the basket
    handle.tick(tick(dec!(1.1025), 20)).unwrap();
    handle.shutdown().unwrap();

    let (engine, stats) = task.await.unwrap();
    assert_eq!(stats.rejections, 1);
    assert!(sink.kinds().contains(&"ExecutionRejected"));
    assert_eq!(engine.protection().stop_price(Side::Buy), Some(dec!(1.0990)));
    assert_eq!(engine.ledger().basket(Side::Buy).legs().len(), 1);
    assert_eq!(engine.phase(Side::Buy), BasketPhase::Building);
}

#[tokio::test]
async fn test_equity_cut_closes_worst_leg_through_paper_market_order() {
    init_logger();
    let engine = BasketEngine::start_with_equity(long_config(), dec!(10000)).unwrap();
    let sink = SharedSink::default();
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::default(),
        engine,
        PaperGateway::new(),
        sink.clone(),
        Arc::new(ManualClock::new(at(0))),
    );
    let task = tokio::spawn(runner.run());

    // === Step 1: Two legs at 1.1020 and 1.1010 ===
    handle.tick(tick(dec!(1.1030), 0)).unwrap();
    handle.signal(EntrySignal::long_only()).unwrap();
    handle.tick(tick(dec!(1.1020), 10)).unwrap();
    handle.tick(tick(dec!(1.1010), 20)).unwrap();

    // === Step 2: Equity below the stop band cuts the 1.1020 leg ===
    handle.equity(dec!(9600)).unwrap();

    // === Step 3: Market close fills on the next tick ===
    handle.tick(tick(dec!(1.1012), 30)).unwrap();
    handle.shutdown().unwrap();

    let (engine, stats) = task.await.unwrap();
    assert_eq!(stats.equity_updates, 1);
    assert_eq!(stats.fills, 3);

    let legs = engine.ledger().basket(Side::Buy).legs();
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].fill_price, dec!(1.1010));
    // 0.1 * (1.1012 - 1.1020)
    assert_eq!(engine.realized_pnl(), dec!(-0.00008));
    assert_eq!(engine.phase(Side::Buy), BasketPhase::Building);
    // Protection re-anchored on the remaining leg
    assert_eq!(engine.protection().stop_price(Side::Buy), Some(dec!(1.0980)));

    let trigger = sink
        .events()
        .into_iter()
        .find(|e| matches!(e, TelemetryEvent::EquityTriggerFired { .. }))
        .unwrap();
    if let TelemetryEvent::EquityTriggerFired { baseline, legs, .. } = trigger {
        assert_eq!(baseline, dec!(10000));
        assert_eq!(legs.len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_sweep_expires_pending_levels() {
    init_logger();
    let mut config = long_config();
    config.grid.pending_expiration_secs = Some(60);
    let engine = BasketEngine::start(config).unwrap();

    let clock = Arc::new(ManualClock::new(at(0)));
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::named("EURUSD").with_sweep_interval(1_000),
        engine,
        PaperGateway::new(),
        SharedSink::default(),
        clock.clone(),
    );
    let task = tokio::spawn(runner.run());

    handle.tick(tick(dec!(1.1030), 0)).unwrap();
    handle.signal(EntrySignal::long_only()).unwrap();
    clock.advance(Duration::seconds(120));

    // Let the runner's sweep interval fire
    tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
    handle.shutdown().unwrap();

    let (engine, stats) = task.await.unwrap();
    assert!(stats.sweeps >= 1);
    assert!(engine.grid().is_empty());
    assert_eq!(engine.grid().reference(), None);
}

#[tokio::test]
async fn test_runner_stops_when_handles_are_dropped() {
    let engine = BasketEngine::start(long_config()).unwrap();
    let (runner, handle) = EngineRunner::new(
        RunnerConfig::default(),
        engine,
        PaperGateway::new(),
        Vec::<TelemetryEvent>::new(),
        Arc::new(ManualClock::new(at(0))),
    );
    let task = tokio::spawn(runner.run());

    let producer = handle.clone();
    producer.tick(tick(dec!(1.1030), 0)).unwrap();
    drop(producer);
    drop(handle);

    let (_, stats) = task.await.unwrap();
    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.intents_submitted, 0);
}

#[test]
fn test_process_handles_feedback_without_a_runtime() {
    let engine = BasketEngine::start(long_config()).unwrap();
    let (mut runner, _handle) = EngineRunner::new(
        RunnerConfig::default(),
        engine,
        PaperGateway::new(),
        Vec::<TelemetryEvent>::new(),
        Arc::new(ManualClock::new(at(0))),
    );

    runner.process(basket_runner::EngineEvent::Tick(tick(dec!(1.1030), 0)));
    runner.process(basket_runner::EngineEvent::Signal(EntrySignal::long_only()));
    assert_eq!(runner.gateway().resting().len(), 3);

    // The fill produced by this tick is applied before `process` returns
    runner.process(basket_runner::EngineEvent::Tick(tick(dec!(1.1020), 10)));
    assert_eq!(runner.strategy().ledger().basket(Side::Buy).legs().len(), 1);
    assert_eq!(runner.stats().fills, 1);
    // Two grid levels plus stop and target
    assert_eq!(runner.gateway().resting().len(), 4);
    assert_eq!(runner.sink().len(), 2);
}
