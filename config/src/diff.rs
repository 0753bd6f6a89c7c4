//! Structural config diff (spec §4.7). Generic over `serde_json::Value` so
//! it needs no per-field codegen macro: both config trees are converted to
//! `Value` and walked leaf-by-leaf.

use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub requires_restart: bool,
}

/// Prefixes that require a restart rather than a hot callback. Matches
/// spec §4.7: "exchange identity, web host/port, storage backend, AI
/// provider, etc."
const RESTART_REQUIRED_PREFIXES: &[&str] = &[
    "exchanges",
    "web.host",
    "web.port",
    "storage.backend",
    "ai.provider",
];

fn requires_restart(path: &str) -> bool {
    RESTART_REQUIRED_PREFIXES.iter().any(|p| path == *p || path.starts_with(&format!("{p}.")))
}

pub fn diff_configs(old: &Value, new: &Value) -> Vec<ConfigChange> {
    let mut changes = Vec::new();
    diff_value("", old, new, &mut changes);
    changes
}

fn diff_value(path: &str, old: &Value, new: &Value, out: &mut Vec<ConfigChange>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut keys: HashSet<&String> = old_map.keys().collect();
            keys.extend(new_map.keys());
            for key in keys {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                match (old_map.get(key), new_map.get(key)) {
                    (Some(o), Some(n)) => diff_value(&child_path, o, n, out),
                    (Some(o), None) => out.push(ConfigChange {
                        requires_restart: requires_restart(&child_path),
                        path: child_path,
                        kind: ChangeKind::Deleted,
                        old: Some(o.clone()),
                        new: None,
                    }),
                    (None, Some(n)) => out.push(ConfigChange {
                        requires_restart: requires_restart(&child_path),
                        path: child_path,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(n.clone()),
                    }),
                    (None, None) => unreachable!(),
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let max_len = old_items.len().max(new_items.len());
            for i in 0..max_len {
                let child_path = format!("{path}.{i}");
                match (old_items.get(i), new_items.get(i)) {
                    (Some(o), Some(n)) => diff_value(&child_path, o, n, out),
                    (Some(o), None) => out.push(ConfigChange {
                        requires_restart: requires_restart(&child_path),
                        path: child_path,
                        kind: ChangeKind::Deleted,
                        old: Some(o.clone()),
                        new: None,
                    }),
                    (None, Some(n)) => out.push(ConfigChange {
                        requires_restart: requires_restart(&child_path),
                        path: child_path,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(n.clone()),
                    }),
                    (None, None) => unreachable!(),
                }
            }
        }
        (o, n) if o != n => out.push(ConfigChange {
            requires_restart: requires_restart(path),
            path: path.to_string(),
            kind: ChangeKind::Modified,
            old: Some(o.clone()),
            new: Some(n.clone()),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_modified_leaf() {
        let old = json!({"trading": {"symbols": [{"symbol": "BTCUSDT"}]}});
        let new = json!({"trading": {"symbols": [{"symbol": "ETHUSDT"}]}});
        let changes = diff_configs(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "trading.symbols.0.symbol");
    }

    #[test]
    fn exchange_changes_require_restart() {
        let old = json!({"exchanges": {"binance": {"api_key": "a"}}});
        let new = json!({"exchanges": {"binance": {"api_key": "b"}}});
        let changes = diff_configs(&old, &new);
        assert!(changes.iter().all(|c| c.requires_restart));
    }

    #[test]
    fn added_and_deleted_keys_are_classified() {
        let old = json!({"a": 1, "b": 2});
        let new = json!({"a": 1, "c": 3});
        let changes = diff_configs(&old, &new);
        assert!(changes.iter().any(|c| c.path == "b" && c.kind == ChangeKind::Deleted));
        assert!(changes.iter().any(|c| c.path == "c" && c.kind == ChangeKind::Added));
    }

    #[test]
    fn no_changes_yields_empty_diff() {
        let v = json!({"a": {"b": 1}});
        assert!(diff_configs(&v, &v).is_empty());
    }
}
