//! Shared types, errors, and the exchange adapter contract for the trading
//! engine workspace.
//!
//! ## Modules
//! - [`types`]: the data model (Slot, Order, Position, Trade, SymbolConfig, ...)
//! - [`ids`]: `OrderId` / `ClientOrderId`
//! - [`decimal_ext`]: checked `Decimal` arithmetic and grid/rounding helpers
//! - [`event`]: the Event type and its severity/source classification
//! - [`exchange`]: the `ExchangeAdapter` trait (external collaborator contract)
//! - [`errors`]: checked-arithmetic error type
//! - [`resilience`]: exponential backoff for retry logic

pub mod capital;
pub mod decimal_ext;
pub mod errors;
pub mod event;
pub mod exchange;
pub mod ids;
pub mod resilience;
pub mod types;

pub use capital::CapitalReserve;
pub use errors::DecimalError;
pub use event::{Event, EventType, Severity};
pub use exchange::{AccountInfo, BatchResult, ExchangeAdapter, Kline, OrderUpdate};
pub use ids::{ClientOrderId, OrderId};
pub use types::{
    CapitalEntry, GridRiskControl, Order, OrderStatus, Position, PositionStatus, PriceKey,
    ReconciliationSnapshot, Side, Slot, SymbolConfig, Trade,
};
