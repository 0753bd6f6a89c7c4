//! Read path (spec §4.5 "Query path"). Each call opens a short-lived
//! connection against the same database file — the writer's single-writer
//! discipline only constrains writes; SQLite allows concurrent readers.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct TradeRow {
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub exchange: String,
    pub symbol: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub quantity: Decimal,
    pub realized_pnl: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PnlSummary {
    pub exchange: String,
    pub symbol: String,
    pub trade_count: i64,
    pub total_realized_pnl: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsSummary {
    pub total_trades: i64,
    pub total_realized_pnl: Decimal,
}

fn dec(s: String) -> Decimal {
    Decimal::from_str(&s).unwrap_or(Decimal::ZERO)
}

pub fn query_trades(
    db_path: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<TradeRow>> {
    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT buy_order_id, sell_order_id, exchange, symbol, buy_price, sell_price, quantity, realized_pnl, created_at
         FROM trades WHERE created_at >= ?1 AND created_at <= ?2
         ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![start.to_rfc3339(), end.to_rfc3339(), limit, offset],
        |row| {
            Ok(TradeRow {
                buy_order_id: row.get(0)?,
                sell_order_id: row.get(1)?,
                exchange: row.get(2)?,
                symbol: row.get(3)?,
                buy_price: dec(row.get(4)?),
                sell_price: dec(row.get(5)?),
                quantity: dec(row.get(6)?),
                realized_pnl: dec(row.get(7)?),
                created_at: row.get::<_, String>(8)?.parse().unwrap_or_else(|_| Utc::now()),
            })
        },
    )?;
    rows.collect()
}

pub fn get_pnl_by_symbol(
    db_path: &Path,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> rusqlite::Result<PnlSummary> {
    let conn = Connection::open(db_path)?;
    conn.query_row(
        "SELECT exchange, symbol, COUNT(*), COALESCE(SUM(CAST(realized_pnl AS REAL)), 0)
         FROM trades WHERE symbol = ?1 AND created_at >= ?2 AND created_at <= ?3
         GROUP BY exchange, symbol",
        rusqlite::params![symbol, start.to_rfc3339(), end.to_rfc3339()],
        |row| {
            Ok(PnlSummary {
                exchange: row.get(0)?,
                symbol: row.get(1)?,
                trade_count: row.get(2)?,
                total_realized_pnl: Decimal::try_from(row.get::<_, f64>(3)?).unwrap_or(Decimal::ZERO),
            })
        },
    )
    .or_else(|_| {
        Ok(PnlSummary { exchange: String::new(), symbol: symbol.to_string(), trade_count: 0, total_realized_pnl: Decimal::ZERO })
    })
}

pub fn get_pnl_by_time_range(
    db_path: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> rusqlite::Result<Vec<PnlSummary>> {
    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT exchange, symbol, COUNT(*), COALESCE(SUM(CAST(realized_pnl AS REAL)), 0)
         FROM trades WHERE created_at >= ?1 AND created_at <= ?2
         GROUP BY exchange, symbol",
    )?;
    let rows = stmt.query_map(rusqlite::params![start.to_rfc3339(), end.to_rfc3339()], |row| {
        Ok(PnlSummary {
            exchange: row.get(0)?,
            symbol: row.get(1)?,
            trade_count: row.get(2)?,
            total_realized_pnl: Decimal::try_from(row.get::<_, f64>(3)?).unwrap_or(Decimal::ZERO),
        })
    })?;
    rows.collect()
}

pub fn get_statistics_summary(db_path: &Path) -> rusqlite::Result<StatisticsSummary> {
    let conn = Connection::open(db_path)?;
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CAST(realized_pnl AS REAL)), 0) FROM trades",
        [],
        |row| {
            Ok(StatisticsSummary {
                total_trades: row.get(0)?,
                total_realized_pnl: Decimal::try_from(row.get::<_, f64>(1)?).unwrap_or(Decimal::ZERO),
            })
        },
    )
}

pub fn get_statistics_summary_by_exchange(db_path: &Path, exchange: &str) -> rusqlite::Result<StatisticsSummary> {
    let conn = Connection::open(db_path)?;
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CAST(realized_pnl AS REAL)), 0) FROM trades WHERE exchange = ?1",
        rusqlite::params![exchange],
        |row| {
            Ok(StatisticsSummary {
                total_trades: row.get(0)?,
                total_realized_pnl: Decimal::try_from(row.get::<_, f64>(1)?).unwrap_or(Decimal::ZERO),
            })
        },
    )
}

#[derive(Debug, Clone)]
pub struct ReconciliationRow {
    pub symbol: String,
    pub reconcile_time: DateTime<Utc>,
    pub local_position: Decimal,
    pub exchange_position: Decimal,
    pub position_diff: Decimal,
}

pub fn query_reconciliation_history(
    db_path: &Path,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<ReconciliationRow>> {
    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT symbol, reconcile_time, local_position, exchange_position, position_diff
         FROM reconciliation_history WHERE symbol = ?1 AND reconcile_time >= ?2 AND reconcile_time <= ?3
         ORDER BY reconcile_time DESC LIMIT ?4 OFFSET ?5",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![symbol, start.to_rfc3339(), end.to_rfc3339(), limit, offset],
        |row| {
            Ok(ReconciliationRow {
                symbol: row.get(0)?,
                reconcile_time: row.get::<_, String>(1)?.parse().unwrap_or_else(|_| Utc::now()),
                local_position: dec(row.get(2)?),
                exchange_position: dec(row.get(3)?),
                position_diff: dec(row.get(4)?),
            })
        },
    )?;
    rows.collect()
}

pub fn get_latest_reconciliation_history(db_path: &Path, symbol: &str) -> rusqlite::Result<Option<ReconciliationRow>> {
    let conn = Connection::open(db_path)?;
    conn.query_row(
        "SELECT symbol, reconcile_time, local_position, exchange_position, position_diff
         FROM reconciliation_history WHERE symbol = ?1 ORDER BY reconcile_time DESC LIMIT 1",
        rusqlite::params![symbol],
        |row| {
            Ok(ReconciliationRow {
                symbol: row.get(0)?,
                reconcile_time: row.get::<_, String>(1)?.parse().unwrap_or_else(|_| Utc::now()),
                local_position: dec(row.get(2)?),
                exchange_position: dec(row.get(3)?),
                position_diff: dec(row.get(4)?),
            })
        },
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
}

/// Risk-check history, auto-bucketed into 10-min/30-min/hourly windows once
/// the requested range exceeds one day, capped at 500 output rows (spec §4.5).
pub fn query_risk_check_history(
    db_path: &Path,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> rusqlite::Result<Vec<(DateTime<Utc>, i64)>> {
    let conn = Connection::open(db_path)?;
    let span = end - start;
    let bucket_seconds: i64 = if span > chrono::Duration::days(1) {
        if span > chrono::Duration::days(7) { 3600 } else { 1800 }
    } else {
        600
    };
    let mut stmt = conn.prepare(
        "SELECT check_time, COUNT(*) FROM risk_check_history
         WHERE symbol = ?1 AND check_time >= ?2 AND check_time <= ?3
         GROUP BY CAST(strftime('%s', check_time) AS INTEGER) / ?4
         ORDER BY check_time ASC LIMIT 500",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![symbol, start.to_rfc3339(), end.to_rfc3339(), bucket_seconds],
        |row| {
            let ts: String = row.get(0)?;
            Ok((ts.parse().unwrap_or_else(|_| Utc::now()), row.get::<_, i64>(1)?))
        },
    )?;
    rows.collect()
}

/// Deletes `events` rows for one severity that are either older than
/// `retention_days` or fall outside the newest `max_count` (spec §4.5
/// periodic cleanup). Run once per severity per cleanup tick.
pub fn cleanup_events(db_path: &Path, severity: &str, retention_days: i64, max_count: u32) -> rusqlite::Result<usize> {
    let conn = Connection::open(db_path)?;
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).to_rfc3339();
    let deleted_by_age = conn.execute(
        "DELETE FROM events WHERE severity = ?1 AND created_at < ?2",
        rusqlite::params![severity, cutoff],
    )?;
    let deleted_by_count = conn.execute(
        "DELETE FROM events WHERE severity = ?1 AND id NOT IN (
            SELECT id FROM events WHERE severity = ?1 ORDER BY created_at DESC LIMIT ?2
        )",
        rusqlite::params![severity, max_count],
    )?;
    Ok(deleted_by_age + deleted_by_count)
}

/// Store-on-change for funding rates (spec §4.5): skip the insert if the
/// rate is within `1e-7` of the latest persisted rate for this symbol.
pub fn funding_rate_changed(db_path: &Path, symbol: &str, new_rate: Decimal) -> rusqlite::Result<bool> {
    let conn = Connection::open(db_path)?;
    let latest: rusqlite::Result<String> = conn.query_row(
        "SELECT rate FROM funding_rates WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT 1",
        rusqlite::params![symbol],
        |row| row.get(0),
    );
    match latest {
        Ok(rate_str) => {
            let last = dec(rate_str);
            Ok((new_rate - last).abs() > Decimal::new(1, 7))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(true),
        Err(e) => Err(e),
    }
}
