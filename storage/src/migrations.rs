//! Embedded schema migration (spec §6 "Persistence schema (logical)").
//!
//! Plain `IF NOT EXISTS`-guarded SQL run once at startup, no external
//! migration framework — matching the teacher's general aversion to
//! heavyweight frameworks where a direct approach suffices.

use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    order_id TEXT PRIMARY KEY,
    client_order_id TEXT NOT NULL,
    exchange TEXT NOT NULL,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    price TEXT NOT NULL,
    quantity TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS positions (
    symbol TEXT NOT NULL,
    exchange TEXT NOT NULL,
    slot_price TEXT NOT NULL,
    size TEXT NOT NULL,
    entry_price TEXT NOT NULL,
    opened_at TEXT NOT NULL,
    closed_at TEXT,
    PRIMARY KEY (symbol, exchange, slot_price)
);

CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    buy_order_id TEXT NOT NULL,
    sell_order_id TEXT NOT NULL,
    exchange TEXT NOT NULL,
    symbol TEXT NOT NULL,
    buy_price TEXT NOT NULL,
    sell_price TEXT NOT NULL,
    quantity TEXT NOT NULL,
    realized_pnl TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trades_created_at ON trades (created_at);
CREATE INDEX IF NOT EXISTS idx_trades_symbol_created_at ON trades (symbol, created_at);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    source TEXT NOT NULL,
    exchange TEXT,
    symbol TEXT,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    details_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at);

CREATE TABLE IF NOT EXISTS statistics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange TEXT,
    symbol TEXT,
    total_trades INTEGER NOT NULL,
    total_realized_pnl TEXT NOT NULL,
    computed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reconciliation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    reconcile_time TEXT NOT NULL,
    local_position TEXT NOT NULL,
    exchange_position TEXT NOT NULL,
    position_diff TEXT NOT NULL,
    active_buy_orders INTEGER NOT NULL,
    active_sell_orders INTEGER NOT NULL,
    pending_sell_qty TEXT NOT NULL,
    total_buy_qty TEXT NOT NULL,
    total_sell_qty TEXT NOT NULL,
    estimated_profit TEXT NOT NULL,
    actual_profit_cumulative TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reconciliation_time ON reconciliation_history (reconcile_time);

CREATE TABLE IF NOT EXISTS risk_check_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    check_time TEXT NOT NULL,
    action TEXT NOT NULL,
    details_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_risk_check_time_symbol ON risk_check_history (check_time, symbol);

CREATE TABLE IF NOT EXISTS funding_rates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange TEXT NOT NULL,
    symbol TEXT NOT NULL,
    rate TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_funding_rates_symbol_ts ON funding_rates (symbol, timestamp);

CREATE TABLE IF NOT EXISTS ai_prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt TEXT NOT NULL,
    response TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS basis_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    spot_price TEXT NOT NULL,
    futures_price TEXT NOT NULL,
    basis TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS system_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    metric_value TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_system_metrics (
    day TEXT PRIMARY KEY,
    total_trades INTEGER NOT NULL,
    total_realized_pnl TEXT NOT NULL
);
"#;

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
