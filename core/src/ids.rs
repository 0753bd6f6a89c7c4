//! Order identity types.
//!
//! Two distinct ID types, same split the teacher draws between its
//! `execution::types::OrderId` (exchange-facing, opaque string) and its
//! `core::types::OrderId` (internally generated) — here both are strings
//! since both sides of this spec's order lifecycle are string-keyed.

use rand::Rng;
use std::fmt;

/// Exchange-assigned order identifier. Opaque; this workspace never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-assigned order identifier, built and owned by this workspace.
///
/// Pattern: `<strategy>_<symbol>_<slot_key_or_nonce>_<random>`, matching
/// spec.md §4.3 exactly, so operators can recover `(strategy, symbol, slot)`
/// from the id alone when reconstructing state from exchange open orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClientOrderId(pub String);

impl ClientOrderId {
    /// Builds a new client order id for a slot-addressed order (grid-style strategies).
    pub fn for_slot(strategy: &str, symbol: &str, slot_key: &str) -> Self {
        Self(format!(
            "{strategy}_{symbol}_{slot_key}_{}",
            random_suffix()
        ))
    }

    /// Builds a new client order id for a non-slot-addressed order (single-position
    /// strategies use a monotonic nonce where a grid strategy would use a slot key).
    pub fn for_nonce(strategy: &str, symbol: &str, nonce: u64) -> Self {
        Self(format!("{strategy}_{symbol}_{nonce}_{}", random_suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits `<strategy>_<symbol>_<slot_key_or_nonce>_<random>` back into parts.
    /// Returns `None` if the id doesn't have at least 4 underscore-delimited parts;
    /// the slot_key/nonce segment can itself contain underscores (e.g. a price key
    /// like `100_50`), so this takes the first and last segments and joins the
    /// middle back together, and the second segment is the symbol.
    pub fn parse(&self) -> Option<ParsedClientOrderId<'_>> {
        let parts: Vec<&str> = self.0.split('_').collect();
        if parts.len() < 4 {
            return None;
        }
        let strategy = parts[0];
        let symbol = parts[1];
        let random = parts[parts.len() - 1];
        let slot_key_or_nonce = &self.0[strategy.len() + symbol.len() + 2
            ..self.0.len() - random.len() - 1];
        Some(ParsedClientOrderId {
            strategy,
            symbol,
            slot_key_or_nonce,
            random,
        })
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedClientOrderId<'a> {
    pub strategy: &'a str,
    pub symbol: &'a str,
    pub slot_key_or_nonce: &'a str,
    pub random: &'a str,
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    format!("{:08x}", rng.gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_id_round_trips() {
        let id = ClientOrderId::for_slot("grid", "BTCUSDT", "100.50");
        let parsed = id.parse().expect("should parse");
        assert_eq!(parsed.strategy, "grid");
        assert_eq!(parsed.symbol, "BTCUSDT");
        assert_eq!(parsed.slot_key_or_nonce, "100.50");
    }

    #[test]
    fn nonce_id_round_trips() {
        let id = ClientOrderId::for_nonce("dca", "ETHUSDT", 42);
        let parsed = id.parse().expect("should parse");
        assert_eq!(parsed.strategy, "dca");
        assert_eq!(parsed.symbol, "ETHUSDT");
        assert_eq!(parsed.slot_key_or_nonce, "42");
    }

    #[test]
    fn ids_are_never_duplicated_across_many_calls() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..10_000 {
            let id = ClientOrderId::for_nonce("grid", "BTCUSDT", i);
            assert!(seen.insert(id.0), "duplicate client order id generated");
        }
    }
}
