//! In-process bus backed by tokio channels
//!
//! Every subscription whose pattern matches a published subject receives its own
//! [`Delivery`]. Publishes, acks and naks are recorded so tests can assert on the
//! message history, including what landed on a dead-letter subject. History is
//! unbounded unless [`InMemoryBus::with_history_limit`] caps it; counters in
//! [`BusStats`] always cover every message.
//! A nak is recorded but the message is not redelivered.
//!
//! Subscriber queues are unbounded. Once a queue grows past the configured
//! high-water mark each publish to it logs a backpressure warning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::message::{AckKind, Acknowledger};
use crate::{subject, BusError, BusMessage, Delivery, EventBus, Subscription};

/// Counters for bus traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub acked: u64,
    pub nacked: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    history_limit: Option<usize>,
    published: Mutex<VecDeque<BusMessage>>,
    settlements: Mutex<VecDeque<(u64, AckKind)>>,
    published_total: AtomicU64,
    delivered: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
}

impl Ledger {
    fn with_history_limit(history_limit: Option<usize>) -> Self {
        Self {
            history_limit,
            ..Self::default()
        }
    }

    fn retain<T>(&self, queue: &mut VecDeque<T>, entry: T) {
        queue.push_back(entry);
        if let Some(limit) = self.history_limit {
            while queue.len() > limit {
                queue.pop_front();
            }
        }
    }

    fn record_publish(&self, message: BusMessage) {
        self.published_total.fetch_add(1, Ordering::Relaxed);
        let mut published = self.published.lock();
        self.retain(&mut *published, message);
    }
}

impl Acknowledger for Ledger {
    fn settle(&self, message: &BusMessage, kind: AckKind) {
        match kind {
            AckKind::Ack => self.acked.fetch_add(1, Ordering::Relaxed),
            AckKind::Nak => self.nacked.fetch_add(1, Ordering::Relaxed),
        };
        trace!(message_id = message.id, subject = %message.subject, ?kind, "delivery settled");
        let mut settlements = self.settlements.lock();
        self.retain(&mut *settlements, (message.id, kind));
    }
}

#[derive(Debug)]
struct Subscriber {
    pattern: String,
    sender: mpsc::UnboundedSender<Delivery>,
    depth: Arc<AtomicUsize>,
}

#[derive(Debug)]
pub struct InMemoryBus {
    high_water: usize,
    next_id: AtomicU64,
    next_subscriber: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
    ledger: Arc<Ledger>,
}

impl InMemoryBus {
    pub fn new(high_water: usize) -> Self {
        Self {
            high_water: high_water.max(1),
            next_id: AtomicU64::new(1),
            next_subscriber: AtomicU64::new(1),
            subscribers: DashMap::new(),
            ledger: Arc::new(Ledger::default()),
        }
    }

    /// Keep only the most recent `limit` messages and settlements
    ///
    /// Call before the first publish; a long-running service otherwise holds
    /// every payload it has seen.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.ledger = Arc::new(Ledger::with_history_limit(Some(limit)));
        self
    }

    /// Retained messages, in publish order
    pub fn published(&self) -> Vec<BusMessage> {
        self.ledger.published.lock().iter().cloned().collect()
    }

    /// Retained messages published on exactly `subject`
    pub fn published_on(&self, subject: &str) -> Vec<BusMessage> {
        self.ledger
            .published
            .lock()
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Settlement recorded for a message id, if any
    pub fn settlement(&self, message_id: u64) -> Option<AckKind> {
        self.ledger
            .settlements
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| *id == message_id)
            .map(|(_, kind)| *kind)
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.ledger.published_total.load(Ordering::Relaxed),
            delivered: self.ledger.delivered.load(Ordering::Relaxed),
            acked: self.ledger.acked.load(Ordering::Relaxed),
            nacked: self.ledger.nacked.load(Ordering::Relaxed),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        subject::validate(subject)?;
        if subject.split('.').any(|t| t == "*" || t == ">") {
            return Err(BusError::InvalidSubject(subject.to_string()));
        }

        let message = BusMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            subject: subject.to_string(),
            payload,
        };
        self.ledger.record_publish(message.clone());

        // Collect targets first so no map guard is held across an await
        let targets: Vec<(u64, mpsc::UnboundedSender<Delivery>, Arc<AtomicUsize>)> = self
            .subscribers
            .iter()
            .filter(|entry| subject::matches(&entry.pattern, subject))
            .map(|entry| (*entry.key(), entry.sender.clone(), entry.depth.clone()))
            .collect();

        if targets.is_empty() {
            debug!(subject, message_id = message.id, "no subscribers, message dropped");
            return Ok(());
        }

        for (subscriber_id, sender, depth) in targets {
            let acker: Arc<dyn Acknowledger> = self.ledger.clone();
            let delivery = Delivery::new(message.clone(), acker);
            // counted before the send so the receiver never decrements first
            let queued = depth.fetch_add(1, Ordering::Relaxed) + 1;
            self.ledger.delivered.fetch_add(1, Ordering::Relaxed);
            if sender.send(delivery).is_err() {
                depth.fetch_sub(1, Ordering::Relaxed);
                self.ledger.delivered.fetch_sub(1, Ordering::Relaxed);
                warn!(subject, subscriber_id, "subscriber gone, removing");
                self.subscribers.remove(&subscriber_id);
                continue;
            }
            if queued > self.high_water {
                warn!(subject, subscriber_id, queued, high_water = self.high_water, "subscriber queue above high-water mark");
            }
        }

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError> {
        subject::validate(pattern)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                pattern: pattern.to_string(),
                sender,
                depth: depth.clone(),
            },
        );
        debug!(pattern, subscriber_id = id, "subscribed");
        Ok(Subscription::new(pattern, receiver, depth))
    }
}
