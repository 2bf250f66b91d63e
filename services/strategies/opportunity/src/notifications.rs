//! Trade notification texts

use types::{TradeType, QUOTE_ASSET};

use crate::signals::TradeReceipt;

pub fn trade_message(receipt: &TradeReceipt) -> String {
    format!(
        "❗ Trade operation executed.\n\n💰 {} >> {}\n- Entry price: {:.6}\n- Profit: {:.6} {}\n- Profit percentage: {:.6}\n",
        receipt.from_symbol,
        receipt.to_symbol,
        receipt.entry_price,
        receipt.profit,
        QUOTE_ASSET,
        receipt.profit_pct,
    )
}

pub fn stop_loss_message(receipt: &TradeReceipt) -> String {
    format!(
        "❗ Stop loss triggered.\n\n💰 {} >> {}\n- Stop loss price: {:.6}\n- Loss: {:.6} {}\n- Loss percentage: {:.6}\n",
        receipt.from_symbol,
        QUOTE_ASSET,
        receipt.exit_price,
        receipt.profit,
        QUOTE_ASSET,
        receipt.profit_pct,
    )
}

/// Text for a settled conversion of either kind
pub fn message_for(receipt: &TradeReceipt) -> String {
    match receipt.trade_type {
        TradeType::TakeProfit => trade_message(receipt),
        TradeType::StopLoss => stop_loss_message(receipt),
    }
}
