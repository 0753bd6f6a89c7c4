//! Drives the built-in `SimulatedAdapter` through the full
//! `ExchangeAdapter` surface a real strategy/executor pair would use: place
//! an order, observe the own-order fill notification, and see the net
//! position reflected back.

use std::collections::HashMap;
use std::time::Duration;

use engine_bins::simulated::SimulatedAdapter;
use engine_core::{ClientOrderId, ExchangeAdapter, Order, OrderStatus, Side};
use rust_decimal_macros::dec;

fn order(coid: &str, side: Side, price: rust_decimal::Decimal, qty: rust_decimal::Decimal) -> Order {
    Order {
        order_id: None,
        client_order_id: ClientOrderId(coid.to_string()),
        symbol: "BTCUSDT".into(),
        side,
        price,
        quantity: qty,
        status: OrderStatus::None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn placed_order_fills_immediately_and_updates_net_position() {
    let mut prices = HashMap::new();
    prices.insert("BTCUSDT".to_string(), dec!(50000));
    let adapter = SimulatedAdapter::new(prices);

    let mut order_rx = adapter.subscribe_own_orders("BTCUSDT").await.unwrap();

    let order_id = adapter.place_order(&order("o1", Side::Buy, dec!(50000), dec!(1))).await.unwrap();
    assert_eq!(order_id.0, "o1");

    let update = tokio::time::timeout(Duration::from_millis(200), order_rx.recv())
        .await
        .expect("should receive a fill notification")
        .expect("channel should not be closed");
    assert_eq!(update.status, OrderStatus::Filled);
    assert_eq!(update.filled_qty, dec!(1));

    let positions = adapter.get_positions("BTCUSDT").await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].size, dec!(1));
}

#[tokio::test]
async fn opposing_fills_net_out_to_zero_and_report_no_position() {
    let adapter = SimulatedAdapter::new(HashMap::new());
    adapter.place_order(&order("o1", Side::Buy, dec!(50000), dec!(2))).await.unwrap();
    adapter.place_order(&order("o2", Side::Sell, dec!(50000), dec!(2))).await.unwrap();

    let positions = adapter.get_positions("BTCUSDT").await.unwrap();
    assert!(positions.is_empty(), "a fully netted-out position should report no Position entries");
}

#[tokio::test]
async fn price_feed_emits_ticks_around_the_seeded_price() {
    let mut prices = HashMap::new();
    prices.insert("BTCUSDT".to_string(), dec!(50000));
    let adapter = SimulatedAdapter::new(prices);

    let mut price_rx = adapter.subscribe_price("BTCUSDT").await.unwrap();
    let tick = tokio::time::timeout(Duration::from_millis(500), price_rx.recv())
        .await
        .expect("should receive a price tick")
        .expect("channel should not be closed");

    // random walk is bounded to +/- 0.5% per tick from the seeded price
    assert!(tick > dec!(49500) && tick < dec!(50500), "tick {tick} drifted too far from the seed in one step");
}
