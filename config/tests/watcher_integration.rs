//! Drives `spawn_watcher` against a real file on disk, the plumbing
//! `watcher.rs`'s own unit tests skip by calling `reload()` directly.

use std::sync::Arc;
use std::time::Duration;

use engine_config::{spawn_watcher, EngineConfig, ReloadCallback};
use parking_lot::RwLock;

fn base_yaml() -> &'static str {
    r#"
trading:
  symbols:
    - exchange: binance
      symbol: BTCUSDT
      price_interval: "1"
      order_quantity_quote: "10"
      min_order_value_quote: "5"
      buy_window_size: 3
      sell_window_size: 3
"#
}

#[test]
fn file_write_triggers_a_hot_reload_through_the_real_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    std::fs::write(&path, base_yaml()).unwrap();

    let initial = EngineConfig::from_yaml_str(base_yaml()).unwrap();
    let current = Arc::new(RwLock::new(initial));
    let callbacks: Arc<Vec<ReloadCallback>> = Arc::new(Vec::new());

    let _watcher = spawn_watcher(path.clone(), current.clone(), callbacks).unwrap();

    std::fs::write(&path, base_yaml().replace("BTCUSDT", "ETHUSDT")).unwrap();

    let mut symbol = String::new();
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(100));
        symbol = current.read().trading.symbols[0].symbol.clone();
        if symbol == "ETHUSDT" {
            break;
        }
    }
    assert_eq!(symbol, "ETHUSDT", "watcher should have picked up the file change and reloaded");
}

#[test]
fn restart_required_change_on_disk_is_not_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    let yaml_with_web = format!("{}web:\n  host: \"127.0.0.1\"\n", base_yaml());
    std::fs::write(&path, &yaml_with_web).unwrap();

    let initial = EngineConfig::from_yaml_str(&yaml_with_web).unwrap();
    let current = Arc::new(RwLock::new(initial));
    let callbacks: Arc<Vec<ReloadCallback>> = Arc::new(Vec::new());

    let _watcher = spawn_watcher(path.clone(), current.clone(), callbacks).unwrap();

    std::fs::write(&path, yaml_with_web.replace("127.0.0.1", "0.0.0.0")).unwrap();
    std::thread::sleep(Duration::from_millis(500));

    let host = current.read().web.get("host").and_then(|v| v.as_str()).unwrap().to_string();
    assert_eq!(host, "127.0.0.1", "a restart-required change must not be hot-applied");
}
