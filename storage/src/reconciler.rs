//! Per-symbol reconciliation (spec §4.6). Adapted from the teacher's
//! `engine::position_reconciliation::PositionReconciler` — same
//! interval-gated `reconcile()` shape and drift computation — generalized
//! from the teacher's single-market check to per-symbol, and with the
//! teacher's `auto_correct_threshold`/`halt_on_mismatch` behavior
//! deliberately **not** ported: spec.md leaves "should reconciler act on
//! persistent drift" as an open question, decided here as "never — log a
//! critical event past a threshold and stop" (see DESIGN.md).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use engine_core::{Event, EventType, ReconciliationSnapshot};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default)]
pub struct LocalTruth {
    pub held_qty: Decimal,
    pub active_buy_orders: u32,
    pub active_sell_orders: u32,
    pub pending_sell_qty: Decimal,
    pub total_buy_qty: Decimal,
    pub total_sell_qty: Decimal,
    pub estimated_profit: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub interval: Duration,
    pub warning_drift_threshold: Decimal,
    /// Raises at most one `PositionDriftCritical` event per breach window
    /// of this duration, per spec.md §9's decision to avoid auto-correction
    /// entirely while still surfacing persistent drift as an event.
    pub critical_drift_threshold: Decimal,
    pub critical_event_cooldown: Duration,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            warning_drift_threshold: Decimal::new(1, 2), // 0.01
            critical_drift_threshold: Decimal::new(1, 1), // 0.1
            critical_event_cooldown: Duration::from_secs(300),
        }
    }
}

pub struct PositionReconciler {
    config: ReconciliationConfig,
    last_run: HashMap<String, Instant>,
    last_critical_event: HashMap<String, Instant>,
}

impl PositionReconciler {
    pub fn new(config: ReconciliationConfig) -> Self {
        Self { config, last_run: HashMap::new(), last_critical_event: HashMap::new() }
    }

    pub fn should_run(&self, symbol: &str, now: Instant) -> bool {
        match self.last_run.get(symbol) {
            Some(last) => now.duration_since(*last) >= self.config.interval,
            None => true,
        }
    }

    /// Computes `position_diff = local - exchange`, builds the persisted
    /// snapshot, and marks `symbol` as just-reconciled.
    pub fn reconcile(
        &mut self,
        symbol: &str,
        local: &LocalTruth,
        exchange_position: Decimal,
        actual_profit_cumulative: Decimal,
        now: Instant,
    ) -> ReconciliationSnapshot {
        self.last_run.insert(symbol.to_string(), now);
        let position_diff = local.held_qty - exchange_position;
        ReconciliationSnapshot {
            symbol: symbol.to_string(),
            reconcile_time: Utc::now(),
            local_position: local.held_qty,
            exchange_position,
            position_diff,
            active_buy_orders: local.active_buy_orders,
            active_sell_orders: local.active_sell_orders,
            pending_sell_qty: local.pending_sell_qty,
            total_buy_qty: local.total_buy_qty,
            total_sell_qty: local.total_sell_qty,
            estimated_profit: local.estimated_profit,
            actual_profit_cumulative,
            created_at: Utc::now(),
        }
    }

    /// Evaluates a just-computed snapshot against the configured drift
    /// thresholds. Never mutates SPM or order state — this is purely an
    /// event-raising decision; the reconciler logs and alerts, it does not
    /// act (spec §4.6: "Log only; does not auto-correct").
    pub fn evaluate_drift(&mut self, snapshot: &ReconciliationSnapshot, now: Instant) -> Option<Event> {
        let relative_drift = if snapshot.exchange_position.is_zero() {
            snapshot.position_diff.abs()
        } else {
            (snapshot.position_diff / snapshot.exchange_position).abs()
        };

        if relative_drift >= self.config.critical_drift_threshold {
            let cooled_down = match self.last_critical_event.get(&snapshot.symbol) {
                Some(last) => now.duration_since(*last) >= self.config.critical_event_cooldown,
                None => true,
            };
            if !cooled_down {
                return None;
            }
            self.last_critical_event.insert(snapshot.symbol.clone(), now);
            return Some(
                Event::new(
                    EventType::PositionDriftCritical,
                    "position drift critical",
                    format!("local/exchange position diff {} exceeds critical threshold", snapshot.position_diff),
                )
                .with_symbol("", snapshot.symbol.clone()),
            );
        }

        if relative_drift >= self.config.warning_drift_threshold {
            return Some(
                Event::new(
                    EventType::PositionDriftWarning,
                    "position drift warning",
                    format!("local/exchange position diff {} exceeds warning threshold", snapshot.position_diff),
                )
                .with_symbol("", snapshot.symbol.clone()),
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn position_diff_is_local_minus_exchange() {
        let mut r = PositionReconciler::new(ReconciliationConfig::default());
        let local = LocalTruth { held_qty: dec!(5), ..Default::default() };
        let snap = r.reconcile("BTCUSDT", &local, dec!(4), dec!(0), Instant::now());
        assert_eq!(snap.position_diff, dec!(1));
    }

    #[test]
    fn critical_event_is_rate_limited_per_cooldown() {
        let mut config = ReconciliationConfig::default();
        config.critical_event_cooldown = Duration::from_secs(600);
        let mut r = PositionReconciler::new(config);
        let local = LocalTruth { held_qty: dec!(100), ..Default::default() };
        let now = Instant::now();
        let snap = r.reconcile("BTCUSDT", &local, dec!(0), dec!(0), now);
        let first = r.evaluate_drift(&snap, now);
        assert!(matches!(first.map(|e| e.event_type), Some(EventType::PositionDriftCritical)));
        let second = r.evaluate_drift(&snap, now);
        assert!(second.is_none(), "second critical event within cooldown should be suppressed");
    }

    #[test]
    fn small_drift_raises_nothing() {
        let mut r = PositionReconciler::new(ReconciliationConfig::default());
        let local = LocalTruth { held_qty: dec!(100), ..Default::default() };
        let snap = r.reconcile("BTCUSDT", &local, dec!(100), dec!(0), Instant::now());
        assert!(r.evaluate_drift(&snap, Instant::now()).is_none());
    }
}
