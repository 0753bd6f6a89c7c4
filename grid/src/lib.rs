//! Super Position Manager (SPM): the grid core (spec §4.1).
//!
//! [`slot_table::SlotTable`] is the pure state machine; [`actor`] wraps it
//! in a per-symbol Tokio task per spec §9's explicit redesign flag (message
//! passing instead of a shared `RwLock`-guarded map); [`risk`] implements
//! grid risk control (layer cap, stop-loss, trailing take-profit);
//! [`sink`] is the narrow contract used to submit the plan `adjust_orders`
//! produces to an Order Executor without this crate depending on one.

pub mod actor;
pub mod risk;
pub mod sink;
pub mod slot_table;

pub use actor::{spawn, QueryResult, SpmCommand, SpmHandle};
pub use risk::{evaluate as evaluate_risk, RiskAction, TrailingState};
pub use sink::{OrderSink, SinkResult};
pub use slot_table::{AdjustPlan, SlotTable, SpmError};
