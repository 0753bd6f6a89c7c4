//! Capital Allocator (spec §4.4): per-strategy capital reservation with
//! optional periodic reweighting.
//!
//! One `parking_lot::RwLock` guards the whole ledger — reserve, release,
//! and reweight are all short, CPU-only critical sections with no I/O
//! under the lock, matching the teacher's general rule of reaching for
//! `parking_lot` over `std::sync` for exactly this kind of hot,
//! synchronous section.

use std::collections::HashMap;
use std::time::Duration;

use engine_core::{CapitalEntry, CapitalReserve};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::traits::StrategyStats;

/// Shared board the host's per-symbol driver loop writes each strategy's
/// latest `get_statistics()` snapshot to, and [`run_reweight_task_by_score`]
/// reads from. `parking_lot::RwLock` over a plain map, matching the same
/// lock-the-whole-thing choice the allocator's own ledger makes, since reads
/// and writes here are both short and CPU-only.
pub type StatsBoard = std::sync::Arc<RwLock<HashMap<String, StrategyStats>>>;

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("strategy {0:?} is not registered with the capital allocator")]
    UnknownStrategy(String),
}

pub struct CapitalAllocator {
    ledger: RwLock<HashMap<String, CapitalEntry>>,
}

impl CapitalAllocator {
    pub fn new() -> Self {
        Self { ledger: RwLock::new(HashMap::new()) }
    }

    /// Registers (or re-registers) a strategy with a starting allocation.
    pub fn register(&self, strategy: &str, allocated: Decimal, weight: Decimal, fixed_pool: bool) {
        self.ledger.write().insert(
            strategy.to_string(),
            CapitalEntry { allocated, used: Decimal::ZERO, weight, fixed_pool },
        );
    }

    pub fn entry(&self, strategy: &str) -> Option<CapitalEntry> {
        self.ledger.read().get(strategy).cloned()
    }

    /// Rescales every non-`fixed_pool` strategy's `allocated` capital in
    /// proportion to its current weight against the pool left over after
    /// fixed-pool strategies' own `allocated` capital is set aside
    /// (`C - fixed_total`, spec.md §4.4), leaving fixed-pool strategies
    /// themselves untouched. Called from the periodic reweighting task,
    /// never from the reserve/release hot path.
    pub fn reweight(&self, total_pool: Decimal) {
        let mut ledger = self.ledger.write();
        let weight_sum: Decimal = ledger.values().filter(|e| !e.fixed_pool).map(|e| e.weight).sum();
        if weight_sum <= Decimal::ZERO {
            return;
        }
        let fixed_total: Decimal = ledger.values().filter(|e| e.fixed_pool).map(|e| e.allocated).sum();
        let flex_pool = (total_pool - fixed_total).max(Decimal::ZERO);
        for entry in ledger.values_mut().filter(|e| !e.fixed_pool) {
            entry.allocated = flex_pool * entry.weight / weight_sum;
        }
        info!(weight_sum = %weight_sum, fixed_total = %fixed_total, "capital allocator reweighted");
    }

    /// Moves each non-`fixed_pool` strategy's weight toward its normalized
    /// `scores` share, clamped to `max_change_per_rebalance` per call, then
    /// renormalizes and rescales `allocated` against the pool left over
    /// after fixed-pool strategies' own `allocated` capital is set aside
    /// (`C - fixed_total`, spec.md §4.4/§8 scenario 4). Strategies missing
    /// from `scores` keep their current weight untouched — a strategy with
    /// no performance signal yet neither gains nor loses ground this cycle.
    pub fn reweight_by_score(
        &self,
        total_pool: Decimal,
        scores: &HashMap<String, Decimal>,
        max_change_per_rebalance: Decimal,
    ) {
        let mut ledger = self.ledger.write();
        let score_sum: Decimal = ledger
            .iter()
            .filter(|(_, e)| !e.fixed_pool)
            .filter_map(|(name, _)| scores.get(name))
            .sum();
        if score_sum <= Decimal::ZERO {
            return;
        }

        for (name, entry) in ledger.iter_mut().filter(|(_, e)| !e.fixed_pool) {
            let Some(score) = scores.get(name) else { continue };
            let target = score / score_sum;
            let delta = (target - entry.weight).clamp(-max_change_per_rebalance, max_change_per_rebalance);
            entry.weight += delta;
        }

        let weight_sum: Decimal = ledger.values().filter(|e| !e.fixed_pool).map(|e| e.weight).sum();
        if weight_sum <= Decimal::ZERO {
            return;
        }
        let fixed_total: Decimal = ledger.values().filter(|e| e.fixed_pool).map(|e| e.allocated).sum();
        let flex_pool = (total_pool - fixed_total).max(Decimal::ZERO);
        for entry in ledger.values_mut().filter(|e| !e.fixed_pool) {
            entry.weight /= weight_sum;
            entry.allocated = flex_pool * entry.weight;
        }
        info!(score_sum = %score_sum, fixed_total = %fixed_total, "capital allocator reweighted by score");
    }

    /// Nudges `strategy`'s weight by `factor`, clamped to `[min, max]`.
    /// `ComboStrategy`'s 1.5x/0.5x market-state adaptive weighting calls
    /// this per child; it is not globally renormalized (spec.md §9).
    pub fn adjust_weight(&self, strategy: &str, factor: Decimal, min: Decimal, max: Decimal) -> Result<(), AllocatorError> {
        let mut ledger = self.ledger.write();
        let entry = ledger.get_mut(strategy).ok_or_else(|| AllocatorError::UnknownStrategy(strategy.to_string()))?;
        entry.weight = (entry.weight * factor).clamp(min, max);
        Ok(())
    }
}

impl Default for CapitalAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CapitalReserve for CapitalAllocator {
    fn try_reserve(&self, strategy: &str, amount: Decimal) -> bool {
        let mut ledger = self.ledger.write();
        let Some(entry) = ledger.get_mut(strategy) else {
            warn!(strategy, "reserve requested for unregistered strategy");
            return false;
        };
        if entry.available() < amount {
            return false;
        }
        entry.used += amount;
        true
    }

    fn release(&self, strategy: &str, amount: Decimal) {
        if let Some(entry) = self.ledger.write().get_mut(strategy) {
            entry.used = (entry.used - amount).max(Decimal::ZERO);
        }
    }
}

/// Drives [`CapitalAllocator::reweight`] on a wall-clock cadence, mirroring
/// the periodic-task shape of `storage::reconciler` (interval tick ->
/// compute -> log) but triggered by elapsed time rather than fill count,
/// since spec.md §4.4 specifies a rebalance cadence, not a fill-count one.
pub async fn run_reweight_task(
    allocator: std::sync::Arc<CapitalAllocator>,
    total_pool: Decimal,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        allocator.reweight(total_pool);
    }
}

/// Turns a strategy's live stats into a non-negative score
/// `reweight_by_score` can normalize. `win_rate()` is already bounded to
/// `[0, 1]`; a strategy with no closed trades yet still gets a small floor
/// score so the clamped reweight can nudge it rather than zeroing its share
/// out on the very first cycle it's seen.
fn score_from_stats(stats: &StrategyStats) -> Decimal {
    stats.win_rate().max(Decimal::new(1, 2))
}

/// Drives [`CapitalAllocator::reweight_by_score`] on a wall-clock cadence,
/// scoring every strategy present in `board` from its latest `StrategyStats`
/// snapshot. `board` is populated by the host's per-symbol driver loop after
/// each `Strategy::get_statistics()` call; a strategy not yet in `board`
/// keeps its current weight this cycle (`reweight_by_score` only moves
/// strategies present in the score map).
pub async fn run_reweight_task_by_score(
    allocator: std::sync::Arc<CapitalAllocator>,
    board: StatsBoard,
    total_pool: Decimal,
    max_change_per_rebalance: Decimal,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let scores: HashMap<String, Decimal> = board
            .read()
            .iter()
            .map(|(name, stats)| (name.clone(), score_from_stats(stats)))
            .collect();
        allocator.reweight_by_score(total_pool, &scores, max_change_per_rebalance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reserve_fails_past_available_capital() {
        let alloc = CapitalAllocator::new();
        alloc.register("grid_btc", dec!(100), dec!(1), false);
        assert!(alloc.try_reserve("grid_btc", dec!(60)));
        assert!(!alloc.try_reserve("grid_btc", dec!(50)));
        alloc.release("grid_btc", dec!(60));
        assert!(alloc.try_reserve("grid_btc", dec!(50)));
    }

    #[test]
    fn release_never_drives_used_negative() {
        let alloc = CapitalAllocator::new();
        alloc.register("dca_eth", dec!(10), dec!(1), false);
        alloc.release("dca_eth", dec!(5));
        assert_eq!(alloc.entry("dca_eth").unwrap().used, Decimal::ZERO);
    }

    #[test]
    fn reweight_by_score_clamps_the_move_per_rebalance() {
        let alloc = CapitalAllocator::new();
        alloc.register("A", dec!(5000), dec!(0.5), false);
        alloc.register("B", dec!(5000), dec!(0.5), false);

        let mut scores = HashMap::new();
        scores.insert("A".to_string(), dec!(0.8));
        scores.insert("B".to_string(), dec!(0.2));
        alloc.reweight_by_score(dec!(10000), &scores, dec!(0.05));

        let a = alloc.entry("A").unwrap();
        let b = alloc.entry("B").unwrap();
        assert_eq!(a.weight, dec!(0.55));
        assert_eq!(b.weight, dec!(0.45));
        assert_eq!(a.allocated, dec!(5500));
        assert_eq!(b.allocated, dec!(4500));
    }

    #[test]
    fn reweight_by_score_renormalizes_after_a_partial_score_update() {
        let alloc = CapitalAllocator::new();
        alloc.register("A", dec!(5000), dec!(0.5), false);
        alloc.register("B", dec!(5000), dec!(0.5), false);

        // only A has a score this cycle; B's raw weight is untouched by the
        // clamp step but still shares in the renormalization afterward.
        let mut scores = HashMap::new();
        scores.insert("A".to_string(), dec!(1));
        alloc.reweight_by_score(dec!(10000), &scores, dec!(0.05));

        let a = alloc.entry("A").unwrap();
        let b = alloc.entry("B").unwrap();
        assert!(a.weight > dec!(0.5), "A's score should pull its weight up");
        assert!(b.weight < dec!(0.5), "B's share shrinks as the total renormalizes to 1");
        assert_eq!(a.weight + b.weight, dec!(1));
    }

    #[test]
    fn reweight_by_score_reserves_the_fixed_pools_own_allocation() {
        let alloc = CapitalAllocator::new();
        alloc.register("flex", dec!(5000), dec!(1), false);
        alloc.register("fixed", dec!(2000), dec!(1), true);

        let mut scores = HashMap::new();
        scores.insert("flex".to_string(), dec!(1));
        alloc.reweight_by_score(dec!(10000), &scores, dec!(1));

        assert_eq!(alloc.entry("fixed").unwrap().allocated, dec!(2000));
        assert_eq!(alloc.entry("flex").unwrap().allocated, dec!(8000));
    }

    #[test]
    fn score_from_stats_floors_strategies_with_no_closed_trades() {
        let stats = StrategyStats::default();
        assert_eq!(stats.win_rate(), Decimal::ZERO);
        assert_eq!(score_from_stats(&stats), dec!(0.01));
    }

    #[test]
    fn reweight_skips_fixed_pool_strategies() {
        let alloc = CapitalAllocator::new();
        alloc.register("flex", dec!(0), dec!(1), false);
        alloc.register("fixed", dec!(500), dec!(1), true);
        alloc.reweight(dec!(1000));
        // fixed keeps its own allocation; flex only gets what's left of the
        // pool once the fixed strategy's allocation is set aside, so the two
        // never sum past total_pool.
        assert_eq!(alloc.entry("fixed").unwrap().allocated, dec!(500));
        assert_eq!(alloc.entry("flex").unwrap().allocated, dec!(500));
    }
}
