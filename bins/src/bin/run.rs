//! Composition root (spec §5): wires config, the Capital Allocator, the
//! per-symbol SPM actors, the Order Executor, the Event Center, Storage,
//! and the config watcher together, drives every symbol's strategies from
//! the built-in simulated exchange adapter, and shuts down cleanly on
//! Ctrl-C.
//!
//! Grounded on the teacher's `simple_spread_simulated.rs` composition shape
//! (`SimulatedExecutor::new_default()`, `Engine::new`, a synthetic feed,
//! a Ctrl-C flag), generalized from one engine/one market to many symbols
//! and many strategy instances per symbol, using a root
//! `CancellationToken` + `JoinSet` in place of the teacher's single
//! `AtomicBool` shutdown flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use dashmap::DashMap;
use engine_bins::common::CommonArgs;
use engine_bins::simulated::SimulatedAdapter;
use engine_config::{EngineConfig, ReloadCallback};
use engine_core::{CapitalReserve, Event, ExchangeAdapter, Severity};
use engine_execution::event_center::RetentionPolicy;
use engine_execution::{EventBus, EventCenter, EventPersister, LoggingNotifier, MultiStrategyExecutor, OrderExecutor};
use engine_grid::{actor, OrderSink, SlotTable};
use engine_storage::{LocalTruth, PositionReconciler, ReconciliationConfig, Storage, StorageConfig, WriteRecord};
use engine_strategy::allocator::StatsBoard;
use engine_strategy::{CapitalAllocator, Strategy, StrategyContext, StrategyFactory, StrategyInstanceConfig};
use parking_lot::RwLock as PLRwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SPM_INBOX_CAPACITY: usize = 32;
const REWEIGHT_INTERVAL: Duration = Duration::from_secs(300);
const REWEIGHT_MAX_CHANGE_PER_REBALANCE: Decimal = dec!(0.05);

/// Event cleanup cadence and per-severity retention (spec §4.5). Info churns
/// fastest and gets the tightest bounds; Critical is kept the longest.
const EVENT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);
const EVENT_RETENTION_INFO: RetentionPolicy = RetentionPolicy { retention_days: 7, max_count: 50_000 };
const EVENT_RETENTION_WARNING: RetentionPolicy = RetentionPolicy { retention_days: 30, max_count: 50_000 };
const EVENT_RETENTION_CRITICAL: RetentionPolicy = RetentionPolicy { retention_days: 90, max_count: 50_000 };

/// Bridges a shared `Arc<Storage>` into the Event Center's owned
/// `Box<dyn EventPersister>`, since `Storage` implements the trait directly
/// but this binary also needs to keep its own `Arc<Storage>` alive to call
/// `stop()` on shutdown.
struct SharedPersister(Arc<Storage>);

#[async_trait]
impl EventPersister for SharedPersister {
    async fn persist(&self, event: &Event) -> anyhow::Result<()> {
        self.0.persist(event).await
    }

    async fn cleanup_events(&self, severity: Severity, policy: RetentionPolicy) -> anyhow::Result<()> {
        self.0.cleanup_events(severity, policy).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CommonArgs::parse();
    engine_bins::common::init_logging(&args.log_level)?;

    let raw_config = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config file {}", args.config.display()))?;
    let config = EngineConfig::from_yaml_str(&raw_config)?;

    let root_token = CancellationToken::new();
    {
        let token = root_token.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            token.cancel();
        })?;
    }

    let (event_bus, event_rx) = EventBus::new(1000);
    let storage = Arc::new(Storage::start(StorageConfig::default())?);

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let persister = SharedPersister(storage.clone());
        async move {
            let retention = vec![
                (Severity::Info, EVENT_RETENTION_INFO),
                (Severity::Warning, EVENT_RETENTION_WARNING),
                (Severity::Critical, EVENT_RETENTION_CRITICAL),
            ];
            EventCenter::new(Box::new(persister), Box::new(LoggingNotifier))
                .with_retention(EVENT_CLEANUP_INTERVAL, retention)
                .run(event_rx)
                .await;
        }
    });

    let initial_prices: HashMap<String, Decimal> = config
        .trading
        .symbols
        .iter()
        .map(|s| (s.symbol.clone(), Decimal::from(50_000)))
        .collect();
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(SimulatedAdapter::new(initial_prices));
    let base_sink: Arc<dyn OrderSink> = Arc::new(OrderExecutor::new(adapter.clone()));

    let allocator = Arc::new(CapitalAllocator::new());
    let stats_board: StatsBoard = Arc::new(PLRwLock::new(HashMap::new()));
    tasks.spawn({
        let allocator = allocator.clone();
        let stats_board = stats_board.clone();
        let token = root_token.clone();
        async move {
            tokio::select! {
                _ = engine_strategy::allocator::run_reweight_task_by_score(
                    allocator,
                    stats_board,
                    Decimal::from(1_000_000),
                    REWEIGHT_MAX_CHANGE_PER_REBALANCE,
                    REWEIGHT_INTERVAL,
                ) => {}
                _ = token.cancelled() => {}
            }
        }
    });

    let strategies_by_symbol = parse_strategy_configs(&config.strategies)?;

    for symbol_cfg in &config.trading.symbols {
        let symbol = symbol_cfg.symbol.clone();
        let Some(instances) = strategies_by_symbol.get(&symbol) else {
            warn!(symbol = %symbol, "no strategy instances configured for this symbol, skipping");
            continue;
        };

        let order_strategy: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
        let mut strategies: HashMap<String, Box<dyn Strategy>> = HashMap::new();

        for (name, instance_cfg) in instances {
            if !instance_cfg.enabled {
                continue;
            }
            let full_name = format!("{symbol}.{name}");
            let allocated = instance_cfg.weight * symbol_cfg.order_quantity_quote * Decimal::from(100);
            allocator.register(&full_name, allocated, instance_cfg.weight, instance_cfg.fixed_pool);

            let ms_sink: Arc<dyn OrderSink> = Arc::new(MultiStrategyExecutor::new(
                base_sink.clone(),
                allocator.clone() as Arc<dyn CapitalReserve>,
                full_name.clone(),
                order_strategy.clone(),
            ));

            let spm_handle = if instance_cfg.strategy_type == "grid" {
                let table = SlotTable::new(symbol_cfg.clone());
                Some(actor::spawn(table, ms_sink.clone(), SPM_INBOX_CAPACITY))
            } else {
                None
            };

            let mut strategy =
                StrategyFactory::create(&full_name, instance_cfg, spm_handle, Some(allocator.clone()))
                    .with_context(|| format!("constructing strategy {full_name}"))?;

            strategy
                .initialize(StrategyContext {
                    executor: ms_sink,
                    exchange: "simulated".to_string(),
                    symbol: symbol.clone(),
                    event_bus: Some(event_bus.clone()),
                })
                .await
                .with_context(|| format!("initializing strategy {full_name}"))?;
            strategy.start();

            strategies.insert(full_name, strategy);
        }

        if strategies.is_empty() {
            warn!(symbol = %symbol, "every configured strategy instance was disabled, skipping symbol");
            continue;
        }

        let price_rx = adapter.subscribe_price(&symbol).await?;
        let order_rx = adapter.subscribe_own_orders(&symbol).await?;
        let reconcile_interval = Duration::from_secs(symbol_cfg.reconcile_interval_s.max(1));

        tasks.spawn(drive_symbol(
            symbol,
            strategies,
            order_strategy,
            adapter.clone(),
            storage.clone(),
            event_bus.clone(),
            stats_board.clone(),
            price_rx,
            order_rx,
            reconcile_interval,
            root_token.clone(),
        ));
    }

    let config_current = Arc::new(PLRwLock::new(config));
    let reload_callbacks: Arc<Vec<ReloadCallback>> = Arc::new(Vec::new());
    let _watcher =
        engine_config::watcher::spawn_watcher(args.config.clone(), config_current, reload_callbacks)
            .context("starting config watcher")?;

    root_token.cancelled().await;
    info!("draining tasks before exit");
    while tasks.join_next().await.is_some() {}
    storage.stop();
    Ok(())
}

/// Parses `strategies: { <symbol>: { <instance_name>: {...} } }` out of the
/// config's opaque `serde_json::Value` section. Kept here, not in
/// `engine-config`, so that crate never needs to depend on `engine-strategy`'s
/// types for a section spec.md treats as mostly-external config plumbing.
fn parse_strategy_configs(
    value: &serde_json::Value,
) -> anyhow::Result<HashMap<String, HashMap<String, StrategyInstanceConfig>>> {
    if value.is_null() {
        return Ok(HashMap::new());
    }
    let per_symbol: HashMap<String, HashMap<String, StrategyInstanceConfig>> =
        serde_json::from_value(value.clone()).context("parsing strategies config section")?;
    Ok(per_symbol)
}

/// Owns every strategy instance trading one symbol and fans out price
/// ticks, order updates, and periodic reconciliation to them. One task per
/// symbol, matching the SPM actor's own single-writer-per-symbol shape.
#[allow(clippy::too_many_arguments)]
async fn drive_symbol(
    symbol: String,
    mut strategies: HashMap<String, Box<dyn Strategy>>,
    order_strategy: Arc<DashMap<String, String>>,
    adapter: Arc<dyn ExchangeAdapter>,
    storage: Arc<Storage>,
    event_bus: EventBus,
    stats_board: StatsBoard,
    mut price_rx: tokio::sync::mpsc::Receiver<Decimal>,
    mut order_rx: tokio::sync::mpsc::Receiver<engine_core::OrderUpdate>,
    reconcile_interval: Duration,
    token: CancellationToken,
) {
    let mut reconciler = PositionReconciler::new(ReconciliationConfig {
        interval: reconcile_interval,
        ..ReconciliationConfig::default()
    });
    let mut ticker = tokio::time::interval(reconcile_interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(symbol = %symbol, "symbol driver shutting down");
                for strategy in strategies.values_mut() {
                    strategy.stop();
                }
                break;
            }
            maybe_price = price_rx.recv() => {
                let Some(price) = maybe_price else { break };
                for (name, strategy) in strategies.iter_mut() {
                    if let Err(e) = strategy.on_price_change(price).await {
                        warn!(symbol = %symbol, strategy = %name, error = %e, "on_price_change failed");
                    }
                }
            }
            maybe_update = order_rx.recv() => {
                let Some(update) = maybe_update else { break };
                let owner = MultiStrategyExecutor::strategy_for_order(&order_strategy, &update.order_id);
                match owner.and_then(|name| strategies.get_mut(&name)) {
                    Some(strategy) => {
                        if let Err(e) = strategy
                            .on_order_update(&update.order_id, update.status, update.filled_qty, update.avg_fill_price)
                            .await
                        {
                            warn!(symbol = %symbol, order_id = %update.order_id, error = %e, "on_order_update failed");
                        }
                    }
                    None => warn!(symbol = %symbol, order_id = %update.order_id, "order update for unattributed order"),
                }
            }
            _ = ticker.tick() => {
                {
                    let mut board = stats_board.write();
                    for (name, strategy) in strategies.iter() {
                        board.insert(name.clone(), strategy.get_statistics());
                    }
                }
                if !reconciler.should_run(&symbol, std::time::Instant::now()) {
                    continue;
                }
                let local = local_truth(&strategies);
                let exchange_position = match adapter.get_positions(&symbol).await {
                    Ok(positions) => positions.iter().map(|p| p.size).sum(),
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "failed to fetch exchange positions for reconciliation");
                        continue;
                    }
                };
                let actual_profit_cumulative = storage
                    .get_pnl_by_symbol(&symbol, chrono::DateTime::<chrono::Utc>::MIN_UTC, chrono::Utc::now())
                    .map(|summary| summary.total_realized_pnl)
                    .unwrap_or_else(|e| {
                        warn!(symbol = %symbol, error = %e, "failed to query cumulative pnl for reconciliation");
                        Decimal::ZERO
                    });
                let snapshot =
                    reconciler.reconcile(&symbol, &local, exchange_position, actual_profit_cumulative, std::time::Instant::now());
                storage.save(WriteRecord::Reconciliation(snapshot.clone()));
                if let Some(event) = reconciler.evaluate_drift(&snapshot, std::time::Instant::now()) {
                    warn!(symbol = %symbol, title = %event.title, "reconciliation drift event");
                    event_bus.publish(event);
                }
            }
        }
    }
}

/// Best-effort local truth built from each strategy's reported positions.
/// Order/volume/profit fields the SPM actor doesn't currently expose
/// through `SpmHandle::query` are left at zero; only `held_qty` reflects
/// real state.
fn local_truth(strategies: &HashMap<String, Box<dyn Strategy>>) -> LocalTruth {
    let held_qty = strategies
        .values()
        .flat_map(|s| s.get_positions())
        .map(|p| if p.size.is_sign_negative() { -p.size } else { p.size })
        .sum();
    LocalTruth { held_qty, ..LocalTruth::default() }
}
