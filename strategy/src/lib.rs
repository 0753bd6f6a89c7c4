//! The Strategy Host (spec §4.2): the `Strategy` contract, the Capital
//! Allocator, the strategy factory, and the concrete strategy
//! implementations (Grid, DCA, Martingale, the single-position family,
//! and Combo).

pub mod allocator;
pub mod combo;
pub mod dca;
pub mod factory;
pub mod grid_strategy;
pub mod indicators;
pub mod martingale;
pub mod single_position;
pub mod traits;

pub use allocator::{AllocatorError, CapitalAllocator, StatsBoard};
pub use combo::{ComboConfig, ComboStrategy, MarketState};
pub use dca::{DcaConfig, DcaStrategy};
pub use factory::{StrategyFactory, StrategyInstanceConfig};
pub use grid_strategy::GridStrategy;
pub use martingale::{MartingaleConfig, MartingaleDirection, MartingaleStrategy};
pub use single_position::{SignalKind, SinglePositionConfig, SinglePositionStrategy};
pub use traits::{Strategy, StrategyContext, StrategyState, StrategyStats};
