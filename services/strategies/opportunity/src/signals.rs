//! Pull-back signals and decision outcomes

use rust_decimal::Decimal;
use types::TradeType;
use uuid::Uuid;

/// Pull-back verdict for one open holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullBackSignal {
    Hold,
    Sell,
}

/// Settled conversion, as reported back to the caller and notifier
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub trade_type: TradeType,
    pub order_id: Uuid,
    pub closed_holding_id: Uuid,
    pub opened_holding_id: Uuid,
    pub from_symbol: String,
    pub to_symbol: String,
    /// Exit price of the closed holding
    pub exit_price: Decimal,
    /// Entry price of the destination holding
    pub entry_price: Decimal,
    /// Realized profit of the closed holding (quote asset)
    pub profit: Decimal,
    /// Profit relative to the closed holding's cost basis, in percent
    pub profit_pct: Decimal,
}

/// Result of evaluating a position; the no-op variants are not errors
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// Pull-back signal says keep the holding
    Hold,
    /// The held symbol already ranks first
    AlreadyOptimal,
    /// Best candidate is below the tier gate and stop-loss is disabled
    NotAttractive,
    /// The owner's preference has `operate = false`
    OperateDisabled,
    Rotated(TradeReceipt),
    StoppedOut(TradeReceipt),
}

impl DecisionOutcome {
    pub fn is_trade(&self) -> bool {
        matches!(self, DecisionOutcome::Rotated(_) | DecisionOutcome::StoppedOut(_))
    }

    pub fn receipt(&self) -> Option<&TradeReceipt> {
        match self {
            DecisionOutcome::Rotated(receipt) | DecisionOutcome::StoppedOut(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Signal generation statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SignalStats {
    pub total_signals: u64,
    pub sell_signals: u64,
    pub hold_signals: u64,
    /// Sell signals per total signals
    pub sell_ratio: f64,
}

impl SignalStats {
    /// Update stats with a new signal
    pub fn record_signal(&mut self, signal: PullBackSignal) {
        self.total_signals += 1;

        match signal {
            PullBackSignal::Sell => self.sell_signals += 1,
            PullBackSignal::Hold => self.hold_signals += 1,
        }

        self.sell_ratio = self.sell_signals as f64 / self.total_signals as f64;
    }
}
