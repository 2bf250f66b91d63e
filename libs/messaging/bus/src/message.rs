use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::BusError;

/// A payload published on a subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Bus-assigned sequence number
    pub id: u64,
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Settlement reported back by a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nak,
}

/// Receives delivery settlements
pub trait Acknowledger: Send + Sync + fmt::Debug {
    fn settle(&self, message: &BusMessage, kind: AckKind);
}

const PENDING: u8 = 0;
const SETTLED: u8 = 1;

/// A message handed to one subscriber, to be acked or nak'd exactly once
#[derive(Debug)]
pub struct Delivery {
    message: BusMessage,
    state: AtomicU8,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: BusMessage, acker: Arc<dyn Acknowledger>) -> Self {
        Self {
            message,
            state: AtomicU8::new(PENDING),
            acker,
        }
    }

    pub fn message(&self) -> &BusMessage {
        &self.message
    }

    pub fn subject(&self) -> &str {
        &self.message.subject
    }

    pub fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    /// Processing finished; the message must not be redelivered
    pub fn ack(&self) -> Result<(), BusError> {
        self.settle(AckKind::Ack)
    }

    /// Processing failed; the message is eligible for redelivery
    pub fn nak(&self) -> Result<(), BusError> {
        self.settle(AckKind::Nak)
    }

    pub fn is_settled(&self) -> bool {
        self.state.load(Ordering::Acquire) == SETTLED
    }

    fn settle(&self, kind: AckKind) -> Result<(), BusError> {
        self.state
            .compare_exchange(PENDING, SETTLED, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BusError::AlreadySettled {
                message_id: self.message.id,
            })?;
        self.acker.settle(&self.message, kind);
        Ok(())
    }
}
