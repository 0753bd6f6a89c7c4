//! Event types flowing through the event bus (spec §3 `Event`, §4.5).
//!
//! `Severity`'s ordered-enum shape is carried over from the teacher's
//! `monitoring::alerts::AlertSeverity` (`Info < Warning < Error < Critical`);
//! this spec only ever surfaces three levels externally, so the fourth rung
//! collapses at `severity_of` rather than in the type itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event severity. Ordered so callers can do `severity >= Warning` checks,
/// matching the teacher's alert-severity idiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// The full catalogue of event types this workspace emits. `severity_of`
/// and `source_of` are total, deterministic functions of this enum (spec §8
/// law): every variant is handled, no default arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    OrderPlaced,
    OrderFilled,
    OrderCanceled,
    OrderRejected,
    RateLimited,
    RequestFailed,
    MarginInsufficient,
    PrecisionAdjustment,
    PriceVolatility,
    TradeClosed,
    CapitalClamped,
    StrategyPaused,
    StrategyStopLoss,
    PositionDriftCritical,
    PositionDriftWarning,
    ConfigHotReloadApplied,
    ConfigHotReloadRejected,
    StorageBackendDown,
}

impl EventType {
    /// Pure function of event type (spec §4.5, §8 law: "severity_of(type) is
    /// total and deterministic").
    pub fn severity(self) -> Severity {
        use EventType::*;
        match self {
            OrderPlaced | OrderFilled | OrderCanceled | TradeClosed
            | ConfigHotReloadApplied | PositionDriftWarning => Severity::Info,
            OrderRejected | RateLimited | RequestFailed | PrecisionAdjustment
            | PriceVolatility | CapitalClamped | StrategyPaused
            | ConfigHotReloadRejected => Severity::Warning,
            MarginInsufficient | StrategyStopLoss | PositionDriftCritical
            | StorageBackendDown => Severity::Critical,
        }
    }

    /// Component that originates this event type, for the `source` field.
    pub fn source(self) -> &'static str {
        use EventType::*;
        match self {
            OrderPlaced | OrderFilled | OrderCanceled | OrderRejected | RateLimited
            | RequestFailed | MarginInsufficient | PrecisionAdjustment => "executor",
            PriceVolatility => "price_monitor",
            TradeClosed => "spm",
            CapitalClamped => "allocator",
            StrategyPaused | StrategyStopLoss => "strategy",
            PositionDriftCritical | PositionDriftWarning => "reconciler",
            ConfigHotReloadApplied | ConfigHotReloadRejected => "config",
            StorageBackendDown => "storage",
        }
    }

    /// Whether the Event Center forwards this type to the notifier when its
    /// severity is exactly `Warning` (spec §4.5: critical always forwards;
    /// warning forwards only for this allow-list).
    pub fn notifies_on_warning(self) -> bool {
        matches!(
            self,
            EventType::RateLimited
                | EventType::RequestFailed
                | EventType::PriceVolatility
                | EventType::PrecisionAdjustment
        )
    }
}

/// One event flowing through the bus (spec §3 `Event`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub source: &'static str,
    pub exchange: Option<String>,
    pub symbol: Option<String>,
    pub title: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            severity: event_type.severity(),
            source: event_type.source(),
            exchange: None,
            symbol: None,
            title: title.into(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_symbol(mut self, exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Whether the Event Center should forward this event to the notifier.
    pub fn should_notify(&self) -> bool {
        match self.severity {
            Severity::Critical => true,
            Severity::Warning => self.event_type.notifies_on_warning(),
            Severity::Info => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_of_is_total() {
        // every variant must be reachable through `severity()` without panicking
        for variant in [
            EventType::OrderPlaced,
            EventType::OrderFilled,
            EventType::OrderCanceled,
            EventType::OrderRejected,
            EventType::RateLimited,
            EventType::RequestFailed,
            EventType::MarginInsufficient,
            EventType::PrecisionAdjustment,
            EventType::PriceVolatility,
            EventType::TradeClosed,
            EventType::CapitalClamped,
            EventType::StrategyPaused,
            EventType::StrategyStopLoss,
            EventType::PositionDriftCritical,
            EventType::PositionDriftWarning,
            EventType::ConfigHotReloadApplied,
            EventType::ConfigHotReloadRejected,
            EventType::StorageBackendDown,
        ] {
            let _ = variant.severity();
            let _ = variant.source();
        }
    }

    #[test]
    fn critical_always_notifies() {
        let ev = Event::new(EventType::MarginInsufficient, "t", "m");
        assert!(ev.should_notify());
    }

    #[test]
    fn warning_outside_allow_list_does_not_notify() {
        let ev = Event::new(EventType::StrategyPaused, "t", "m");
        assert!(!ev.should_notify());
    }

    #[test]
    fn warning_inside_allow_list_notifies() {
        let ev = Event::new(EventType::RateLimited, "t", "m");
        assert!(ev.should_notify());
    }

    #[test]
    fn info_never_notifies() {
        let ev = Event::new(EventType::OrderFilled, "t", "m");
        assert!(!ev.should_notify());
    }
}
