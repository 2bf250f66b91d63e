//! Notifier collaborator

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Delivers human-readable trade notifications
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        info!(target: "notifications", "{}", text);
        Ok(())
    }
}
