//! Strategy Factory (spec §4.2): builds a concrete [`Strategy`] from its
//! per-instance config.
//!
//! Completes the teacher's commented-out `StrategyFactory` pattern in
//! `bog-core/src/strategy/mod.rs` (`match config.strategy_type.as_str()`),
//! extended here to the full set of concrete strategy types this
//! workspace implements.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::allocator::CapitalAllocator;
use crate::combo::{ComboConfig, ComboStrategy};
use crate::dca::{DcaConfig, DcaStrategy};
use crate::grid_strategy::GridStrategy;
use crate::martingale::{MartingaleConfig, MartingaleStrategy};
use crate::single_position::{SignalKind, SinglePositionConfig, SinglePositionStrategy};
use crate::traits::Strategy;
use engine_grid::SpmHandle;

/// The host's per-strategy instance config (spec §4.2: `{enabled, type,
/// weight, fixed_pool, config}`). `config` carries the strategy-specific
/// parameter block as untyped JSON, parsed by whichever arm of
/// [`StrategyFactory::create`] matches `strategy_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyInstanceConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub weight: Decimal,
    #[serde(default)]
    pub fixed_pool: bool,
    pub config: serde_json::Value,
}

pub struct StrategyFactory;

impl StrategyFactory {
    /// `spm` is only required by `"grid"`; other strategy types ignore it.
    pub fn create(
        name: &str,
        cfg: &StrategyInstanceConfig,
        spm: Option<SpmHandle>,
        allocator: Option<Arc<CapitalAllocator>>,
    ) -> anyhow::Result<Box<dyn Strategy>> {
        match cfg.strategy_type.as_str() {
            "grid" => {
                let spm = spm.ok_or_else(|| anyhow::anyhow!("grid strategy requires an SPM handle"))?;
                Ok(Box::new(GridStrategy::new(name.to_string(), spm)))
            }
            "dca" => {
                let params: DcaConfig = serde_json::from_value(cfg.config.clone())?;
                Ok(Box::new(DcaStrategy::new(name.to_string(), params, allocator)))
            }
            "martingale" => {
                let params: MartingaleConfig = serde_json::from_value(cfg.config.clone())?;
                Ok(Box::new(MartingaleStrategy::new(name.to_string(), params, allocator)))
            }
            "trend_following" => {
                let params: SinglePositionConfig = serde_json::from_value(cfg.config.clone())?;
                Ok(Box::new(SinglePositionStrategy::new(
                    name.to_string(),
                    SignalKind::MaCrossover,
                    params,
                    allocator,
                )))
            }
            "mean_reversion" => {
                let params: SinglePositionConfig = serde_json::from_value(cfg.config.clone())?;
                Ok(Box::new(SinglePositionStrategy::new(
                    name.to_string(),
                    SignalKind::BollingerExcursion,
                    params,
                    allocator,
                )))
            }
            "momentum" => {
                let params: SinglePositionConfig = serde_json::from_value(cfg.config.clone())?;
                Ok(Box::new(SinglePositionStrategy::new(
                    name.to_string(),
                    SignalKind::RsiExtreme,
                    params,
                    allocator,
                )))
            }
            "combo" => {
                let params: ComboConfig = serde_json::from_value(cfg.config.clone())?;
                let children = params
                    .children
                    .iter()
                    .map(|c| Self::create(&format!("{name}.{}", c.name), &c.instance, None, allocator.clone()))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Box::new(ComboStrategy::new(name.to_string(), children, params)))
            }
            other => Err(anyhow::anyhow!("unknown strategy type: {other}")),
        }
    }
}
