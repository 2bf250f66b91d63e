//! Decision engine: pull-back signals, rotation and stop-loss
//!
//! ```text
//! open holding ──pull_back_signal──▶ Hold ─▶ no-op
//!                     │
//!                    Sell ──rank watchlist──▶ held symbol is #1 ─▶ no-op
//!                                   │
//!                      #1 attractive? ──yes──▶ execute_trade(#1)
//!                                   └──no───▶ execute_stop_loss (if enabled)
//! ```
//!
//! A conversion is a saga keyed by the order id. Everything before the order
//! is created is read-only, so an early failure leaves no trace. Once the quote
//! is accepted the settlement steps (close source, open destination, fill
//! order) are idempotent and retried; `reconcile_pending_orders` resumes any
//! that were interrupted.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use state_trading::{HoldingStore, OrderStore, PreferenceStore};
use torq_strategy_shared::{Exchange, MetricsCollector, Notifier};
use tracing::{debug, info, warn};
use types::{
    base_asset, is_quote_asset, Holding, Order, OrderConfig, RiskLevel, TradeType,
    TradingPosition, QUOTE_ASSET,
};
use uuid::Uuid;

use crate::config::StrategyConfig;
use crate::error::{Result, StrategyError};
use crate::market::MarketDataService;
use crate::notifications;
use crate::signals::{DecisionOutcome, PullBackSignal, SignalStats, TradeReceipt};
use crate::{log_execution, log_profit, log_stop_loss};

/// Pull-back verdict from the holding's entry, its current score and price
///
/// A score at or above the entry score holds. Otherwise the holding sells once
/// its profit% of current value exceeds `sell_profit_pct`.
pub fn pull_back_verdict(
    holding: &Holding,
    current_score: f64,
    price: Decimal,
    sell_profit_pct: Decimal,
) -> PullBackSignal {
    if current_score >= holding.entry_score {
        return PullBackSignal::Hold;
    }
    let value = price * holding.quantity;
    let profit = (price - holding.entry_price) * holding.quantity;
    match profit.checked_div(value) {
        Some(ratio) if ratio * dec!(100) > sell_profit_pct => PullBackSignal::Sell,
        _ => PullBackSignal::Hold,
    }
}

/// Profit relative to cost basis, in percent; zero for an empty basis
fn profit_pct(holding: &Holding) -> Decimal {
    let basis = holding.entry_price * holding.quantity;
    holding
        .profit
        .checked_div(basis)
        .map(|r| r * dec!(100))
        .unwrap_or(Decimal::ZERO)
}

/// What a conversion is for
#[derive(Debug, Clone)]
struct ConversionPlan {
    trade_type: TradeType,
    to_symbol: String,
    entry_score: f64,
}

/// Post-settlement state of a conversion
#[derive(Debug, Clone)]
struct Settlement {
    closed: Holding,
    opened: Holding,
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Accepted orders whose settlement was completed
    pub resumed: usize,
    /// Orders never accepted by the exchange
    pub cancelled: usize,
    /// Orders whose settlement still failed
    pub failed: usize,
}

#[derive(Debug)]
pub struct DecisionEngine {
    market: Arc<MarketDataService>,
    holdings: Arc<dyn HoldingStore>,
    orders: Arc<dyn OrderStore>,
    preferences: Arc<dyn PreferenceStore>,
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    config: StrategyConfig,
    metrics: Arc<MetricsCollector>,
    stats: RwLock<SignalStats>,
}

impl DecisionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Arc<MarketDataService>,
        holdings: Arc<dyn HoldingStore>,
        orders: Arc<dyn OrderStore>,
        preferences: Arc<dyn PreferenceStore>,
        exchange: Arc<dyn Exchange>,
        notifier: Arc<dyn Notifier>,
        config: StrategyConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            market,
            holdings,
            orders,
            preferences,
            exchange,
            notifier,
            config,
            metrics,
            stats: RwLock::new(SignalStats::default()),
        }
    }

    pub fn signal_stats(&self) -> SignalStats {
        self.stats.read().clone()
    }

    /// Open holdings in `symbol` whose owners have an operating preference
    pub async fn open_positions_for_symbol(&self, symbol: &str) -> Result<Vec<TradingPosition>> {
        let holdings = self.holdings.open_by_symbol(symbol).await?;
        if holdings.is_empty() {
            return Ok(Vec::new());
        }

        let users: Vec<Uuid> = holdings
            .iter()
            .map(|h| h.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let preferences = self.preferences.operating_for_users(&users).await?;

        Ok(holdings
            .into_iter()
            .filter_map(|holding| {
                preferences
                    .get(&holding.user_id)
                    .cloned()
                    .map(|preference| TradingPosition {
                        holding,
                        preference,
                    })
            })
            .collect())
    }

    pub async fn pull_back_signal(&self, position: &TradingPosition) -> Result<PullBackSignal> {
        let holding = &position.holding;
        let current = self.market.symbol_score(&holding.symbol, Utc::now()).await?;
        let price = self.price_of(&holding.symbol).await?;
        let threshold = self.config.tier(position.preference.risk_level).sell_profit_pct;

        let signal = pull_back_verdict(holding, current.score, price, threshold);
        self.stats.write().record_signal(signal);
        self.metrics.increment_signals();
        debug!(
            holding_id = %holding.id,
            symbol = %holding.symbol,
            entry_score = holding.entry_score,
            current_score = current.score,
            ?signal,
            "pull-back evaluated"
        );
        Ok(signal)
    }

    /// True when `score` clears the tier's rotation gate
    pub fn is_attractive(&self, risk: RiskLevel, score: f64) -> bool {
        score > self.config.tier(risk).min_score
    }

    pub async fn pull_back_trade(&self, position: &TradingPosition) -> Result<DecisionOutcome> {
        if self.pull_back_signal(position).await? == PullBackSignal::Hold {
            return Ok(DecisionOutcome::Hold);
        }

        let holding = &position.holding;
        let preference = &position.preference;
        let ranked = self.market.rank_watchlist(&preference.watchlist).await?;
        let best = ranked.first().ok_or(StrategyError::NoRankedSymbols)?;
        if best.symbol == holding.symbol {
            debug!(holding_id = %holding.id, symbol = %holding.symbol, "held symbol already ranks first");
            return Ok(DecisionOutcome::AlreadyOptimal);
        }

        if self.is_attractive(preference.risk_level, best.score) {
            return self.execute_trade(holding, &best.symbol, best.score).await;
        }
        if preference.stop_loss_enabled {
            return self.execute_stop_loss(holding).await;
        }
        debug!(
            holding_id = %holding.id,
            best = %best.symbol,
            score = best.score,
            "best candidate not attractive, stop-loss disabled"
        );
        Ok(DecisionOutcome::NotAttractive)
    }

    /// Evaluate every open position in `symbol`
    ///
    /// A failing position is logged and counted; the others still run.
    pub async fn evaluate_symbol(&self, symbol: &str) -> Result<Vec<DecisionOutcome>> {
        let positions = self.open_positions_for_symbol(symbol).await?;
        let mut outcomes = Vec::with_capacity(positions.len());
        for position in &positions {
            match self.pull_back_trade(position).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    self.metrics.increment_errors();
                    warn!(
                        holding_id = %position.holding.id,
                        symbol = %symbol,
                        error = %e,
                        "position evaluation failed"
                    );
                }
            }
        }
        Ok(outcomes)
    }

    /// Rotate `holding` into `to_symbol`
    pub async fn execute_trade(
        &self,
        holding: &Holding,
        to_symbol: &str,
        to_score: f64,
    ) -> Result<DecisionOutcome> {
        let plan = ConversionPlan {
            trade_type: TradeType::TakeProfit,
            to_symbol: to_symbol.to_string(),
            entry_score: to_score,
        };
        let outcome = match self.convert(holding, plan).await? {
            Some(receipt) => {
                self.metrics.increment_rotations();
                log_profit!(
                    "Rotated {} -> {} (profit {} {})",
                    receipt.from_symbol,
                    receipt.to_symbol,
                    receipt.profit,
                    QUOTE_ASSET
                );
                DecisionOutcome::Rotated(receipt)
            }
            None => DecisionOutcome::OperateDisabled,
        };
        Ok(outcome)
    }

    /// Park `holding` in the quote asset, keeping its entry score
    pub async fn execute_stop_loss(&self, holding: &Holding) -> Result<DecisionOutcome> {
        let plan = ConversionPlan {
            trade_type: TradeType::StopLoss,
            to_symbol: QUOTE_ASSET.to_string(),
            entry_score: holding.entry_score,
        };
        let outcome = match self.convert(holding, plan).await? {
            Some(receipt) => {
                self.metrics.increment_stop_losses();
                log_stop_loss!(
                    "Stop loss {} -> {} at {} (profit {} {})",
                    receipt.from_symbol,
                    QUOTE_ASSET,
                    receipt.exit_price,
                    receipt.profit,
                    QUOTE_ASSET
                );
                DecisionOutcome::StoppedOut(receipt)
            }
            None => DecisionOutcome::OperateDisabled,
        };
        Ok(outcome)
    }

    /// Finish or cancel orders left `Open` by an interrupted conversion
    ///
    /// Run before consuming events: an order created by a conversion that is
    /// still in flight would be cancelled.
    pub async fn reconcile_pending_orders(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for mut order in self.orders.open_orders().await? {
            if order.exchange_order_id.is_none() {
                order.mark_cancelled();
                self.orders.update(&order).await?;
                info!(order_id = %order.id, "cancelled order never accepted by the exchange");
                report.cancelled += 1;
                continue;
            }
            match self.settle_with_retries(&order).await {
                Ok(settlement) => {
                    info!(
                        order_id = %order.id,
                        closed = %settlement.closed.id,
                        opened = %settlement.opened.id,
                        "resumed settlement"
                    );
                    report.resumed += 1;
                }
                Err(e) => {
                    self.metrics.increment_errors();
                    warn!(order_id = %order.id, error = %e, "settlement still failing");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Price in the quote asset; the quote asset itself is 1
    async fn price_of(&self, symbol: &str) -> Result<Decimal> {
        let price = if is_quote_asset(symbol) {
            Decimal::ONE
        } else {
            self.exchange.ticker(symbol).await?.price
        };
        if price <= Decimal::ZERO {
            return Err(StrategyError::InvalidPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(price)
    }

    /// Run the conversion saga; `None` when the owner is not operating
    async fn convert(&self, holding: &Holding, plan: ConversionPlan) -> Result<Option<TradeReceipt>> {
        let preference = self
            .preferences
            .by_user(holding.user_id)
            .await?
            .ok_or_else(|| StrategyError::not_found("preference", holding.user_id))?;
        if !preference.operate {
            debug!(holding_id = %holding.id, user_id = %holding.user_id, "operate disabled, conversion skipped");
            return Ok(None);
        }

        // Read-only gate: nothing is written before the drift check passes
        let balance = self.exchange.balance(holding.asset()).await?;
        if balance.free <= Decimal::ZERO {
            return Err(StrategyError::InsufficientBalance);
        }
        let source_price = self.price_of(&holding.symbol).await?;
        let dest_price = self.price_of(&plan.to_symbol).await?;

        let wallet = if preference.wallet_type.is_empty() {
            self.config.wallet_type.as_str()
        } else {
            preference.wallet_type.as_str()
        };
        let quote = self
            .exchange
            .conversion_quote(holding.asset(), base_asset(&plan.to_symbol), balance.free, wallet)
            .await?;
        quote.validate()?;

        let drift = quote
            .drift(source_price, dest_price, balance.free)
            .ok_or_else(|| StrategyError::InvalidPrice {
                symbol: holding.symbol.clone(),
            })?;
        if drift > self.config.max_drift {
            warn!(
                holding_id = %holding.id,
                from = %holding.symbol,
                to = %plan.to_symbol,
                %drift,
                "conversion drift above maximum"
            );
            return Err(StrategyError::ConversionDriftExceeded {
                drift,
                max: self.config.max_drift,
            });
        }

        let mut order = Order::new(OrderConfig {
            user_id: holding.user_id,
            symbol: plan.to_symbol.clone(),
            quantity: quote.to_amount,
            price: dest_price,
            trade_type: plan.trade_type,
            source_holding_id: holding.id,
            source_price,
            entry_score: plan.entry_score,
        });
        self.orders.insert(order.clone()).await?;
        log_execution!(
            "Converting {} {} -> {} {} (order {})",
            quote.from_amount,
            holding.asset(),
            quote.to_amount,
            base_asset(&plan.to_symbol),
            order.id
        );

        match self.exchange.accept_quote(&quote.id).await {
            Ok(conversion) => {
                order.mark_accepted(conversion.id);
                // The conversion is done; a failed write here is repaired by
                // the settlement retries below or by reconciliation
                if let Err(e) = self.orders.update(&order).await {
                    warn!(order_id = %order.id, error = %e, "failed to record accepted order");
                }
            }
            Err(e) => {
                order.mark_cancelled();
                if let Err(store_error) = self.orders.update(&order).await {
                    warn!(order_id = %order.id, error = %store_error, "failed to cancel order");
                }
                return Err(e.into());
            }
        }

        let settlement = self.settle_with_retries(&order).await?;
        let receipt = TradeReceipt {
            trade_type: plan.trade_type,
            order_id: order.id,
            closed_holding_id: settlement.closed.id,
            opened_holding_id: settlement.opened.id,
            from_symbol: settlement.closed.symbol.clone(),
            to_symbol: settlement.opened.symbol.clone(),
            exit_price: settlement.closed.exit_price,
            entry_price: settlement.opened.entry_price,
            profit: settlement.closed.profit,
            profit_pct: profit_pct(&settlement.closed),
        };

        if let Err(e) = self
            .notifier
            .send_message(&notifications::message_for(&receipt))
            .await
        {
            warn!(order_id = %order.id, error = %e, "trade notification failed");
        }
        Ok(Some(receipt))
    }

    async fn settle_with_retries(&self, order: &Order) -> Result<Settlement> {
        let attempts = self.config.settlement_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.settle(order).await {
                Ok(settlement) => return Ok(settlement),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.config.settlement_backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        order_id = %order.id,
                        attempt = attempt + 1,
                        error = %e,
                        ?delay,
                        "settlement step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Idempotent settlement of an accepted order
    async fn settle(&self, order: &Order) -> Result<Settlement> {
        let mut source = self
            .holdings
            .get(order.source_holding_id)
            .await?
            .ok_or_else(|| StrategyError::not_found("holding", order.source_holding_id))?;
        if source.is_open() {
            source.close(order.source_price);
            self.holdings.update(&source).await?;
        }

        let opened = match self.holdings.find_by_origin_order(order.id).await? {
            Some(existing) => existing,
            None => {
                let holding = Holding::open(
                    order.user_id,
                    order.symbol.clone(),
                    order.quantity,
                    order.price,
                    order.entry_score,
                )
                .with_origin_order(order.id);
                self.holdings.insert(holding.clone()).await?;
                holding
            }
        };

        let current = self
            .orders
            .get(order.id)
            .await?
            .ok_or_else(|| StrategyError::not_found("order", order.id))?;
        if current.is_open() {
            let mut filled = current;
            if filled.exchange_order_id.is_none() {
                filled.exchange_order_id = order.exchange_order_id.clone();
            }
            filled.mark_filled();
            self.orders.update(&filled).await?;
        }

        Ok(Settlement {
            closed: source,
            opened,
        })
    }
}
