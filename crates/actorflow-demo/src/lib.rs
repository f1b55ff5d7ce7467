//! # Order Enrichment Demo
//!
//! A small pipeline built on [`actorflow`]: a generator emits numbered orders,
//! two lookups enrich each order in parallel, and an [`EventJoin`] folds the
//! branches back into a single JSON document per order.
//!
//! ```text
//!              ┌──> price ──┐
//! generator ───┼──> stock ──┼──> join ──> sink
//!              └────────────┘
//! ```

use actorflow::{Actor, ActorContext, Director, Event, EventJoin, EventKind, FlowError, FlowResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// ACTORS
// =============================================================================

/// Emits `{"order": n}` every `interval` until stopped.
pub struct Generator {
    interval: Duration,
    next: Arc<AtomicU64>,
}

impl Generator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Default::default(),
        }
    }
}

#[async_trait]
impl Actor for Generator {
    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    async fn pre_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        let ticker = ctx.clone();
        let interval = self.interval;
        let next = self.next.clone();
        ctx.spawn(async move {
            while ticker.sleep(interval).await {
                let order = next.fetch_add(1, Ordering::Relaxed) + 1;
                let event = match Event::with_data(EventKind::Json, json!({ "order": order })) {
                    Ok(event) => event,
                    Err(e) => {
                        ticker.logger().error(&format!("Could not build order {order}: {e}"), None);
                        continue;
                    }
                };
                if let Err(e) = ticker.send_event(event).await {
                    ticker.logger().warn(&format!("Order {order} not sent: {e}"), None);
                }
            }
        });
        Ok(())
    }

    async fn consume(&self, _ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        Ok(())
    }
}

fn order_number(event: &Event) -> FlowResult<u64> {
    event
        .data()
        .as_json()
        .and_then(|data| data.get("order"))
        .and_then(|order| order.as_u64())
        .ok_or_else(|| FlowError::UnprocessableEventData("event carries no order number".into()))
}

/// Replaces the payload with `{"price": ..}`.
pub struct PriceLookup;

#[async_trait]
impl Actor for PriceLookup {
    fn input_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    async fn consume(&self, ctx: &ActorContext, mut event: Event, _origin: &str) -> FlowResult<()> {
        let order = order_number(&event)?;
        event.set_data(json!({ "price": order as f64 * 2.5 }))?;
        ctx.send_event(event).await
    }
}

/// Replaces the payload with `{"in_stock": ..}`. Every third order is out of stock.
pub struct StockLookup;

#[async_trait]
impl Actor for StockLookup {
    fn input_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    async fn consume(&self, ctx: &ActorContext, mut event: Event, _origin: &str) -> FlowResult<()> {
        let order = order_number(&event)?;
        if order % 3 == 0 {
            ctx.logger().warn(&format!("Order {order} is out of stock"), Some(&event));
        }
        event.set_data(json!({ "in_stock": order % 3 != 0 }))?;
        ctx.send_event(event).await
    }
}

/// Logs every merged order.
pub struct Printer;

#[async_trait]
impl Actor for Printer {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.logger().info(&format!("Order ready: {}", event.data_string()), Some(&event));
        Ok(())
    }
}

// =============================================================================
// WIRING
// =============================================================================

/// Registers and wires the demo graph, ending in `sink`.
pub fn build(director: &mut Director, interval: Duration, sink: impl Actor) -> FlowResult<()> {
    let generator = director.register_actor("generator", Generator::new(interval))?;
    let price = director.register_actor("price", PriceLookup)?;
    let stock = director.register_actor("stock", StockLookup)?;
    let join = director.register_actor(
        "join",
        EventJoin::json().with_purge_interval(interval * 20),
    )?;
    let sink = director.register_actor("sink", sink)?;

    director.connect_queue(&generator, [&price, &stock, &join])?;
    director.connect_queue(&price, &join)?;
    director.connect_queue(&stock, &join)?;
    director.connect_queue(&join, &sink)?;
    Ok(())
}
