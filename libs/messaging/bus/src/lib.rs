//! # Torq Message Bus
//!
//! Subject-based publish/subscribe with explicit delivery settlement.
//!
//! Consumers receive a [`Delivery`] per matching message and must `ack` it once
//! processed or `nak` it on failure. Failed messages are routed by the consumer
//! to a dead-letter subject; the bus itself only carries bytes.
//!
//! ```rust
//! use message_bus::{EventBus, InMemoryBus};
//!
//! # tokio_test::block_on(async {
//! let bus = InMemoryBus::new(64);
//! let mut candles = bus.subscribe("market.candles").await.unwrap();
//! bus.publish("market.candles", b"{}".to_vec()).await.unwrap();
//!
//! let delivery = candles.next().await.unwrap();
//! delivery.ack().unwrap();
//! assert_eq!(bus.stats().acked, 1);
//! # });
//! ```

pub mod error;
pub mod memory;
pub mod message;
pub mod subject;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub use error::BusError;
pub use memory::{BusStats, InMemoryBus};
pub use message::{AckKind, Acknowledger, BusMessage, Delivery};

/// A publish/subscribe transport
#[async_trait]
pub trait EventBus: Send + Sync + Debug {
    /// Publish a payload on a concrete subject
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to a subject pattern (see [`subject`] for wildcards)
    async fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError>;
}

/// Stream of deliveries for one subscription
///
/// The queue is unbounded so a consumer may publish onto a subject it is itself
/// subscribed to without deadlocking. `depth` tracks deliveries not yet taken.
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    depth: Arc<AtomicUsize>,
}

impl Subscription {
    pub fn new(
        pattern: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<Delivery>,
        depth: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            receiver,
            depth,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Deliveries queued and not yet received
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Next delivery, or `None` once the bus side is gone
    pub async fn next(&mut self) -> Option<Delivery> {
        let delivery = self.receiver.recv().await;
        if delivery.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        delivery
    }

    /// Next delivery if one is already queued
    pub fn try_next(&mut self) -> Option<Delivery> {
        let delivery = self.receiver.try_recv().ok();
        if delivery.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        delivery
    }
}
