//! Storage writer task (spec §4.5 "Storage"): single-writer serialization
//! discipline (SQLite's own constraint), bounded channel, batch flush on
//! size-or-interval, JSON-lines fallback on backend failure so no event is
//! silently lost.
//!
//! Grounded on the teacher's `resilience` "degrade, don't crash" shape
//! (backoff/reconnect instead of panicking), generalized from network
//! resilience to storage resilience. Runs on a plain OS thread (not a
//! Tokio task) since `rusqlite::Connection` is blocking; `save()` itself
//! is a non-blocking `try_send` callable from async code.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use engine_core::{Event, Order, Trade};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::StorageError;
use crate::migrations;

#[derive(Debug, Clone, Serialize)]
pub enum WriteRecord {
    Order(Order),
    Trade(Trade),
    Event(Event),
    Reconciliation(engine_core::ReconciliationSnapshot),
    RiskCheck { symbol: String, check_time: DateTime<Utc>, action: String, details: serde_json::Value },
    FundingRate { exchange: String, symbol: String, rate: rust_decimal::Decimal, timestamp: DateTime<Utc> },
}

enum WriterMsg {
    Write(WriteRecord),
    Stop,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub fallback_path: PathBuf,
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("engine.db"),
            fallback_path: PathBuf::from("storage_fallback.log"),
            channel_capacity: 1000,
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

pub struct Storage {
    cmd_tx: Sender<WriterMsg>,
    handle: Mutex<Option<JoinHandle<()>>>,
    pub(crate) db_path: PathBuf,
}

impl Storage {
    pub fn start(config: StorageConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(&config.db_path)?;
        migrations::run(&conn)?;
        let (cmd_tx, cmd_rx) = bounded(config.channel_capacity);
        let db_path = config.db_path.clone();
        let handle = std::thread::spawn(move || writer_loop(conn, cmd_rx, config));
        Ok(Self { cmd_tx, handle: Mutex::new(Some(handle)), db_path })
    }

    /// Enqueues a record for persistence. Never blocks; drops and logs on
    /// a full channel, matching the event bus's own backpressure policy.
    pub fn save(&self, record: WriteRecord) {
        if self.cmd_tx.try_send(WriterMsg::Write(record)).is_err() {
            warn!("storage channel full, dropping write");
        }
    }

    /// Stop accepting new writes, drain the buffer, close the backend.
    /// Idempotent: a second call is a no-op.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().expect("storage handle lock poisoned").take() {
            let _ = self.cmd_tx.send(WriterMsg::Stop);
            let _ = handle.join();
        }
    }
}

fn writer_loop(conn: Connection, rx: Receiver<WriterMsg>, config: StorageConfig) {
    let mut buf: Vec<WriteRecord> = Vec::with_capacity(config.batch_size);
    let mut fallback_warned = false;
    loop {
        match rx.recv_timeout(config.flush_interval) {
            Ok(WriterMsg::Write(record)) => {
                buf.push(record);
                if buf.len() >= config.batch_size {
                    flush(&conn, &mut buf, &config.fallback_path, &mut fallback_warned);
                }
            }
            Ok(WriterMsg::Stop) => {
                flush(&conn, &mut buf, &config.fallback_path, &mut fallback_warned);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !buf.is_empty() {
                    flush(&conn, &mut buf, &config.fallback_path, &mut fallback_warned);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                flush(&conn, &mut buf, &config.fallback_path, &mut fallback_warned);
                break;
            }
        }
    }
}

fn flush(conn: &Connection, buf: &mut Vec<WriteRecord>, fallback_path: &PathBuf, fallback_warned: &mut bool) {
    if buf.is_empty() {
        return;
    }
    match write_batch(conn, buf) {
        Ok(()) => buf.clear(),
        Err(e) => {
            if !*fallback_warned {
                error!(error = %e, "storage backend write failed, falling back to JSON-lines log");
                *fallback_warned = true;
            }
            append_fallback(fallback_path, buf);
            buf.clear();
        }
    }
}

fn write_batch(conn: &Connection, buf: &[WriteRecord]) -> rusqlite::Result<()> {
    for record in buf {
        match record {
            WriteRecord::Order(o) => {
                conn.execute(
                    "INSERT INTO orders (order_id, client_order_id, exchange, symbol, side, price, quantity, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(order_id) DO UPDATE SET status=excluded.status, updated_at=excluded.updated_at",
                    rusqlite::params![
                        o.order_id.as_ref().map(|id| id.0.clone()).unwrap_or_default(),
                        o.client_order_id.as_str(),
                        "", // exchange is not tracked on Order; left blank, symbol carries identity
                        o.symbol,
                        format!("{:?}", o.side),
                        o.price.to_string(),
                        o.quantity.to_string(),
                        format!("{:?}", o.status),
                        o.created_at.to_rfc3339(),
                        o.updated_at.to_rfc3339(),
                    ],
                )?;
            }
            WriteRecord::Trade(t) => {
                conn.execute(
                    "INSERT INTO trades (buy_order_id, sell_order_id, exchange, symbol, buy_price, sell_price, quantity, realized_pnl, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        t.buy_order_id.0,
                        t.sell_order_id.0,
                        t.exchange,
                        t.symbol,
                        t.buy_price.to_string(),
                        t.sell_price.to_string(),
                        t.quantity.to_string(),
                        t.realized_pnl.to_string(),
                        t.created_at.to_rfc3339(),
                    ],
                )?;
            }
            WriteRecord::Event(e) => {
                conn.execute(
                    "INSERT INTO events (event_type, severity, source, exchange, symbol, title, message, details_json, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        format!("{:?}", e.event_type),
                        format!("{:?}", e.severity),
                        e.source,
                        e.exchange,
                        e.symbol,
                        e.title,
                        e.message,
                        serde_json::to_string(&e.details).unwrap_or_default(),
                        e.timestamp.to_rfc3339(),
                    ],
                )?;
            }
            WriteRecord::Reconciliation(r) => {
                conn.execute(
                    "INSERT INTO reconciliation_history (symbol, reconcile_time, local_position, exchange_position, position_diff, active_buy_orders, active_sell_orders, pending_sell_qty, total_buy_qty, total_sell_qty, estimated_profit, actual_profit_cumulative, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    rusqlite::params![
                        r.symbol,
                        r.reconcile_time.to_rfc3339(),
                        r.local_position.to_string(),
                        r.exchange_position.to_string(),
                        r.position_diff.to_string(),
                        r.active_buy_orders,
                        r.active_sell_orders,
                        r.pending_sell_qty.to_string(),
                        r.total_buy_qty.to_string(),
                        r.total_sell_qty.to_string(),
                        r.estimated_profit.to_string(),
                        r.actual_profit_cumulative.to_string(),
                        r.created_at.to_rfc3339(),
                    ],
                )?;
            }
            WriteRecord::RiskCheck { symbol, check_time, action, details } => {
                conn.execute(
                    "INSERT INTO risk_check_history (symbol, check_time, action, details_json) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![symbol, check_time.to_rfc3339(), action, details.to_string()],
                )?;
            }
            WriteRecord::FundingRate { exchange, symbol, rate, timestamp } => {
                conn.execute(
                    "INSERT INTO funding_rates (exchange, symbol, rate, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![exchange, symbol, rate.to_string(), timestamp.to_rfc3339()],
                )?;
            }
        }
    }
    Ok(())
}

fn append_fallback(path: &PathBuf, buf: &[WriteRecord]) {
    let file = OpenOptions::new().create(true).append(true).open(path);
    match file {
        Ok(mut f) => {
            for record in buf {
                if let Ok(line) = serde_json::to_string(record) {
                    let _ = writeln!(f, "{line}");
                }
            }
        }
        Err(e) => error!(error = %e, "could not open storage fallback log, records dropped"),
    }
}
