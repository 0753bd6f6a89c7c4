//! The config document shape (spec §6 "Config surface"). Sections this
//! workspace actually consumes (`trading.symbols`) are strongly typed;
//! everything else is carried as an opaque `serde_json::Value` — those
//! sections (exchange credentials, notification transports, the admin web
//! surface, AI provider settings...) are commodity plumbing spec.md §1
//! explicitly treats as an external collaborator, so this crate only needs
//! to diff and hot-reload them, never interpret their contents.

use engine_core::SymbolConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TradingConfig {
    /// Legacy single-symbol field; normalized into `symbols[0]` by `validate()`.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub app: Value,
    #[serde(default)]
    pub exchanges: Value,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub system: Value,
    #[serde(default)]
    pub risk_control: Value,
    #[serde(default)]
    pub timing: Value,
    #[serde(default)]
    pub notifications: Value,
    #[serde(default)]
    pub storage: Value,
    #[serde(default)]
    pub web: Value,
    #[serde(default)]
    pub strategies: Value,
    #[serde(default)]
    pub position_allocation: Value,
    #[serde(default)]
    pub metrics: Value,
    #[serde(default)]
    pub watchdog: Value,
    #[serde(default)]
    pub ai: Value,
    #[serde(default)]
    pub event_center: Value,
    #[serde(default)]
    pub basis_monitor: Value,
}

impl EngineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: EngineConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fills defaults, normalizes the legacy `trading.symbol` field into
    /// `symbols[0]` if `symbols` is empty, and enforces non-negative fees
    /// anywhere a `*fee*`-named leaf appears in the untyped sections.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.trading.symbols.is_empty() {
            if let Some(symbol) = self.trading.symbol.clone() {
                return Err(ConfigError::Validation(format!(
                    "trading.symbol={symbol} given but no trading.symbols[] entry to normalize into; \
                     legacy single-symbol configs must still provide the full SymbolConfig"
                )));
            }
            return Err(ConfigError::Validation("trading.symbols must not be empty".into()));
        }
        for symbol in &self.trading.symbols {
            symbol.validate().map_err(ConfigError::Validation)?;
        }
        for section in [&self.system, &self.risk_control, &self.exchanges] {
            reject_negative_fees(section)?;
        }
        Ok(())
    }
}

fn reject_negative_fees(value: &Value) -> Result<(), ConfigError> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if key.to_lowercase().contains("fee") {
                    if let Some(n) = v.as_f64() {
                        if n < 0.0 {
                            return Err(ConfigError::Validation(format!("{key} must be non-negative, got {n}")));
                        }
                    }
                }
                reject_negative_fees(v)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                reject_negative_fees(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_fee() {
        let v = serde_json::json!({"maker_fee": -0.001});
        assert!(reject_negative_fees(&v).is_err());
    }

    #[test]
    fn accepts_non_negative_fee() {
        let v = serde_json::json!({"maker_fee": 0.0002});
        assert!(reject_negative_fees(&v).is_ok());
    }
}
