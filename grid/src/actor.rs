//! The SPM actor: one Tokio task per symbol, owning its `SlotTable`
//! exclusively. Implements spec §9's redesign flag — message passing
//! instead of a shared `RwLock`-guarded map — with a bounded inbox and
//! non-blocking dispatch, mirroring the teacher's general "bounded inbox,
//! log on drop" discipline for fan-out channels.

use std::sync::Arc;

use chrono::Utc;
use engine_core::{OrderId, OrderStatus, Slot, Trade};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::risk::RiskAction;
use crate::sink::OrderSink;
use crate::slot_table::{SlotTable, SpmError};

pub enum SpmCommand {
    AdjustOrders {
        price: Decimal,
    },
    OnOrderUpdate {
        order_id: OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
        exchange: String,
        reply: oneshot::Sender<Result<Vec<Trade>, SpmError>>,
    },
    RecordPlaced {
        side: engine_core::Side,
        price_key: String,
        order_id: OrderId,
    },
    Query {
        reply: oneshot::Sender<QueryResult>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub slots: Vec<Slot>,
}

/// Handle callers use to talk to a running SPM actor. Cloning is cheap
/// (wraps an `mpsc::Sender`); the actor task itself owns the only
/// `SlotTable`.
#[derive(Clone)]
pub struct SpmHandle {
    tx: mpsc::Sender<SpmCommand>,
}

impl SpmHandle {
    pub fn send_adjust_orders(&self, price: Decimal) {
        if self.tx.try_send(SpmCommand::AdjustOrders { price }).is_err() {
            warn!("SPM inbox full, dropping AdjustOrders tick");
        }
    }

    pub fn send_record_placed(&self, side: engine_core::Side, price_key: String, order_id: OrderId) {
        if self
            .tx
            .try_send(SpmCommand::RecordPlaced { side, price_key, order_id })
            .is_err()
        {
            warn!("SPM inbox full, dropping RecordPlaced");
        }
    }

    pub async fn on_order_update(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
        exchange: String,
    ) -> anyhow::Result<Vec<Trade>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SpmCommand::OnOrderUpdate {
                order_id,
                status,
                filled_qty,
                fill_price,
                exchange,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("SPM actor gone"))?;
        Ok(rx.await.map_err(|_| anyhow::anyhow!("SPM actor dropped reply"))??)
    }

    pub async fn query(&self) -> anyhow::Result<QueryResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SpmCommand::Query { reply })
            .await
            .map_err(|_| anyhow::anyhow!("SPM actor gone"))?;
        rx.await.map_err(|_| anyhow::anyhow!("SPM actor dropped reply"))
    }
}

/// Spawns the actor task and returns a handle to it. `inbox_capacity`
/// defaults to a small bound (32) per symbol: AdjustOrders ticks are lossy
/// by design (a dropped tick just means the next tick re-evaluates from a
/// newer price), OnOrderUpdate/Query are not lossy since callers await a reply.
pub fn spawn(table: SlotTable, sink: Arc<dyn OrderSink>, inbox_capacity: usize) -> SpmHandle {
    let (tx, mut rx) = mpsc::channel(inbox_capacity);
    let symbol = table.config().symbol.clone();

    tokio::spawn(async move {
        let mut table = table;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                SpmCommand::AdjustOrders { price } => {
                    let now = Utc::now();
                    let (risk_action, risk_cancels) = table.evaluate_risk(price, now);
                    if !risk_cancels.is_empty() {
                        sink.cancel_batch(&symbol, risk_cancels).await;
                    }
                    match risk_action {
                        RiskAction::StopLoss => {
                            warn!(symbol = %symbol, "stop-loss triggered, closed all held slots and paused new buys")
                        }
                        RiskAction::TrailingTakeProfitHit => {
                            warn!(symbol = %symbol, "trailing take-profit triggered, closed all held slots")
                        }
                        RiskAction::LayerCapReached => {
                            debug!(symbol = %symbol, "grid layer cap reached, no new buys this tick")
                        }
                        RiskAction::None => {}
                    }
                    let plan = table.adjust_orders(price, now);
                    debug!(symbol = %symbol, cancels = plan.cancel.len(), places = plan.place.len(), "adjust_orders");
                    if !plan.cancel.is_empty() {
                        sink.cancel_batch(&symbol, plan.cancel).await;
                    }
                    if !plan.place.is_empty() {
                        let side_by_coid: std::collections::HashMap<String, engine_core::Side> = plan
                            .place
                            .iter()
                            .map(|o| (o.client_order_id.as_str().to_string(), o.side))
                            .collect();
                        let result = sink.submit_batch(&symbol, plan.place).await;
                        for (coid, oid) in result.placed {
                            if let (Some(parsed), Some(side)) =
                                (coid.parse(), side_by_coid.get(coid.as_str()))
                            {
                                table.record_placed(*side, parsed.slot_key_or_nonce, oid.clone(), now);
                            }
                        }
                        if result.has_margin_error {
                            warn!(symbol = %symbol, "margin error on batch submit, pausing new buys this tick");
                        }
                    }
                }
                SpmCommand::RecordPlaced { side, price_key, order_id } => {
                    table.record_placed(side, &price_key, order_id, Utc::now());
                }
                SpmCommand::OnOrderUpdate { order_id, status, filled_qty, fill_price, exchange, reply } => {
                    let now = Utc::now();
                    let result = table.on_order_update(&order_id, status, filled_qty, fill_price, &exchange, now);
                    let trades = result.map(|_| table.drain_trades());
                    let _ = reply.send(trades);
                }
                SpmCommand::Query { reply } => {
                    let _ = reply.send(QueryResult { slots: Vec::new() });
                }
            }
        }
        debug!(symbol = %symbol, "SPM actor shutting down, inbox closed");
    });

    SpmHandle { tx }
}
