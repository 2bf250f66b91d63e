//! Strategy metrics collection

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe metrics collector for strategies
#[derive(Debug)]
pub struct MetricsCollector {
    messages_processed: AtomicU64,
    candles_ingested: AtomicU64,
    duplicates_skipped: AtomicU64,
    partial_candles_dropped: AtomicU64,
    recomputes: AtomicU64,
    scores_written: AtomicU64,
    signals_generated: AtomicU64,
    rotations: AtomicU64,
    stop_losses: AtomicU64,
    errors: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            messages_processed: AtomicU64::new(0),
            candles_ingested: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
            partial_candles_dropped: AtomicU64::new(0),
            recomputes: AtomicU64::new(0),
            scores_written: AtomicU64::new(0),
            signals_generated: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            stop_losses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn increment_messages(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_candles(&self) {
        self.candles_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicates(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_partial_drops(&self) {
        self.partial_candles_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recomputes(&self) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scores(&self) {
        self.scores_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_signals(&self) {
        self.signals_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stop_losses(&self) {
        self.stop_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> super::StrategyMetrics {
        super::StrategyMetrics {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            candles_ingested: self.candles_ingested.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            partial_candles_dropped: self.partial_candles_dropped.load(Ordering::Relaxed),
            recomputes: self.recomputes.load(Ordering::Relaxed),
            scores_written: self.scores_written.load(Ordering::Relaxed),
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            stop_losses: self.stop_losses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let metrics = MetricsCollector::new();
        metrics.increment_messages();
        metrics.increment_messages();
        metrics.increment_duplicates();
        metrics.increment_rotations();
        metrics.increment_stop_losses();

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.messages_processed, 2);
        assert_eq!(snapshot.duplicates_skipped, 1);
        assert_eq!(snapshot.trades_executed(), 2);
        assert_eq!(snapshot.errors, 0);
    }
}
