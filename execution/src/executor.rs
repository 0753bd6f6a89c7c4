//! The Order Executor (spec §4.3): rounds orders to exchange precision,
//! submits them through an [`ExchangeAdapter`], retries transient failures
//! with backoff, and implements [`engine_grid::OrderSink`] so the SPM actor
//! can submit a plan without knowing about exchanges or retries at all.
//!
//! Grounded on the teacher's `Executor` trait (one call per capability,
//! `Result`-returning) generalized to async/batch and to the narrower
//! `OrderSink` boundary this workspace's grid crate defines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engine_core::decimal_ext::{round_price_half_even, truncate_quantity};
use engine_core::resilience::{BackoffConfig, ExponentialBackoff};
use engine_core::{ClientOrderId, ExchangeAdapter, Order, OrderId};
use engine_grid::{OrderSink, SinkResult};
use tracing::{error, warn};

use crate::error::ExecError;

const DEFAULT_RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct OrderExecutor {
    adapter: Arc<dyn ExchangeAdapter>,
    backoff_config: BackoffConfig,
    max_attempts: u32,
    rate_limit_retry_delay: Duration,
}

impl OrderExecutor {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            adapter,
            backoff_config: BackoffConfig::aggressive(),
            max_attempts: 3,
            rate_limit_retry_delay: DEFAULT_RATE_LIMIT_RETRY_DELAY,
        }
    }

    pub fn with_backoff(mut self, config: BackoffConfig, max_attempts: u32) -> Self {
        self.backoff_config = config;
        self.max_attempts = max_attempts;
        self
    }

    /// Overrides the single fixed delay a `RateLimited` response waits
    /// before its one retry (spec §4.3: `rate_limit_retry_delay_s`,
    /// distinct from `Transient`'s backoff loop).
    pub fn with_rate_limit_retry_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_retry_delay = delay;
        self
    }

    /// Rounds an order's price/quantity to the exchange's reported
    /// precision before it ever reaches the wire, per spec §4.3.
    fn round_order(&self, mut order: Order) -> Order {
        let price_decimals = self.adapter.price_decimals(&order.symbol);
        let qty_decimals = self.adapter.quantity_decimals(&order.symbol);
        order.price = round_price_half_even(order.price, price_decimals);
        order.quantity = truncate_quantity(order.quantity, qty_decimals);
        order
    }

    fn classify(err: &anyhow::Error) -> ExecError {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") {
            ExecError::RateLimited(msg)
        } else if lower.contains("margin") || lower.contains("insufficient balance") {
            ExecError::MarginInsufficient(msg)
        } else if lower.contains("reduce only") || lower.contains("reduce-only") {
            ExecError::ReduceOnlyViolation(msg)
        } else if lower.contains("precision") || lower.contains("tick size") || lower.contains("lot size") {
            ExecError::PrecisionError(msg)
        } else if lower.contains("timeout") || lower.contains("connection") || lower.contains("temporarily") {
            ExecError::Transient(msg)
        } else {
            ExecError::Permanent(msg)
        }
    }

    /// Spec §4.3's two retry policies: `RateLimited` waits a single fixed
    /// `rate_limit_retry_delay_s` and retries exactly once; `Transient`
    /// retries up to `max_attempts` with exponential backoff. Every other
    /// classification propagates immediately without retrying.
    async fn batch_place_with_retry(
        &self,
        orders: &[Order],
    ) -> Result<engine_core::BatchResult, ExecError> {
        let first_err = match self.adapter.batch_place_orders(orders).await {
            Ok(result) => return Ok(result),
            Err(e) => Self::classify(&e),
        };
        warn!(attempt = 0u32, error = %first_err, "batch_place_orders failed");

        if let ExecError::RateLimited(_) = first_err {
            warn!(delay = ?self.rate_limit_retry_delay, "rate limited, retrying once after a fixed delay");
            tokio::time::sleep(self.rate_limit_retry_delay).await;
            return self.adapter.batch_place_orders(orders).await.map_err(|e| Self::classify(&e));
        }

        if !first_err.is_retryable() {
            return Err(first_err);
        }

        let mut backoff = ExponentialBackoff::new(self.backoff_config.clone());
        let mut last_err = first_err;
        for attempt in 1..self.max_attempts {
            tokio::time::sleep(backoff.next_delay()).await;
            match self.adapter.batch_place_orders(orders).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let classified = Self::classify(&e);
                    warn!(attempt, error = %classified, "batch_place_orders failed");
                    if !classified.is_retryable() {
                        return Err(classified);
                    }
                    last_err = classified;
                }
            }
        }
        Err(last_err)
    }
}

#[async_trait]
impl OrderSink for OrderExecutor {
    async fn submit_batch(&self, symbol: &str, orders: Vec<Order>) -> SinkResult {
        if orders.is_empty() {
            return SinkResult::default();
        }
        let rounded: Vec<Order> = orders.into_iter().map(|o| self.round_order(o)).collect();

        match self.batch_place_with_retry(&rounded).await {
            Ok(result) => {
                let failed: std::collections::HashSet<String> = result
                    .reduce_only_errors
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect();
                let accepted: Vec<&Order> = rounded
                    .iter()
                    .filter(|o| !failed.contains(o.client_order_id.as_str()))
                    .collect();
                let placed: Vec<(ClientOrderId, OrderId)> = accepted
                    .into_iter()
                    .zip(result.placed.into_iter())
                    .map(|(o, oid)| (o.client_order_id.clone(), oid))
                    .collect();
                SinkResult {
                    placed,
                    has_margin_error: result.has_margin_error,
                    failed_client_order_ids: result.reduce_only_errors,
                }
            }
            Err(e) => {
                error!(symbol, error = %e, "batch order submission abandoned after retries");
                SinkResult {
                    placed: Vec::new(),
                    has_margin_error: matches!(e, ExecError::MarginInsufficient(_)),
                    failed_client_order_ids: rounded.iter().map(|o| o.client_order_id.clone()).collect(),
                }
            }
        }
    }

    async fn cancel_batch(&self, symbol: &str, order_ids: Vec<OrderId>) {
        if order_ids.is_empty() {
            return;
        }
        if let Err(e) = self.adapter.batch_cancel_orders(symbol, &order_ids).await {
            warn!(symbol, error = %e, "batch cancel failed, orders may still be live");
        }
    }
}
