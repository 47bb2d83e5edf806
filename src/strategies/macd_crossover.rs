//! MACD crossover strategy.
//!
//! Buys a fixed block when the MACD line is above its signal line and sells
//! it once the MACD line starts falling while still above the signal line.
//! Only one order is ever outstanding.

use crate::config::StrategySettings;
use crate::strategy::{OrderEvent, OrderStatus, Strategy, StrategyContext, TradeEvent};
use crate::types::{Side, Signal};
use chrono::NaiveDate;
use tracing::info;

/// MACD crossover strategy.
///
/// # Parameters
/// - `ma_period`: period of the reference moving average (default: 15)
/// - `stake`: default sizer stake handed to the engine (default: 10)
/// - `order_size`: shares per buy/sell order (default: 100)
///
/// # Signals
/// - Buy: flat and MACD above signal
/// - Sell: long, MACD above signal and lower than on the previous bar
#[derive(Debug, Clone)]
pub struct MacdCrossover {
    ma_period: usize,
    stake: u32,
    order_size: f64,
    pending: Option<Side>,
    buy_price: Option<f64>,
    buy_comm: Option<f64>,
    bars_seen: usize,
    bar_executed: Option<usize>,
    journal: Vec<String>,
}

impl MacdCrossover {
    pub fn new(ma_period: usize, stake: u32, order_size: f64) -> Self {
        Self {
            ma_period,
            stake,
            order_size,
            pending: None,
            buy_price: None,
            buy_comm: None,
            bars_seen: 0,
            bar_executed: None,
            journal: Vec::new(),
        }
    }

    /// Create with default parameters (15 / 10 / 100).
    pub fn default_params() -> Self {
        Self::new(15, 10, 100.0)
    }

    pub fn from_settings(settings: &StrategySettings) -> Self {
        Self::new(settings.ma_period, settings.stake, settings.order_size)
    }

    pub fn ma_period(&self) -> usize {
        self.ma_period
    }

    pub fn stake(&self) -> u32 {
        self.stake
    }

    /// Side of the order awaiting a terminal status, if any.
    pub fn pending(&self) -> Option<Side> {
        self.pending
    }

    /// Price and commission of the last completed buy.
    pub fn last_buy(&self) -> Option<(f64, f64)> {
        Some((self.buy_price?, self.buy_comm?))
    }

    /// Bar count at the last completed order.
    pub fn bar_executed(&self) -> Option<usize> {
        self.bar_executed
    }

    /// Every line the strategy has logged, oldest first.
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    fn log(&mut self, date: NaiveDate, text: String) {
        let line = format!("{}, {}", date.format("%Y-%m-%d"), text);
        info!("{}", line);
        self.journal.push(line);
    }
}

impl Default for MacdCrossover {
    fn default() -> Self {
        Self::default_params()
    }
}

impl Strategy for MacdCrossover {
    fn name(&self) -> &str {
        "MACD Crossover"
    }

    fn init(&mut self) {
        self.pending = None;
        self.buy_price = None;
        self.buy_comm = None;
        self.bars_seen = 0;
        self.bar_executed = None;
        self.journal.clear();
    }

    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal {
        self.bars_seen += 1;
        self.log(ctx.date, format!("Close, {:.2}", ctx.close));

        if self.pending.is_some() {
            return Signal::Hold;
        }

        if ctx.is_flat() {
            if ctx.macd.is_bullish() {
                self.log(ctx.date, format!("BUY CREATE, {:.2}", ctx.close));
                self.pending = Some(Side::Buy);
                return Signal::Buy(self.order_size);
            }
        } else if ctx.macd.is_bullish() && ctx.macd.is_falling() {
            self.log(ctx.date, format!("SELL CREATE, {:.2}", ctx.close));
            self.pending = Some(Side::Sell);
            return Signal::Sell(self.order_size);
        }

        Signal::Hold
    }

    /// Only completed orders are logged as executed and update the buy price.
    /// Canceled, margin and rejected orders log `<SIDE> ORDER <STATUS>`.
    fn on_order(&mut self, date: NaiveDate, event: &OrderEvent) {
        match event.status {
            OrderStatus::Submitted | OrderStatus::Accepted => return,
            OrderStatus::Completed => {
                self.log(
                    date,
                    format!(
                        "{} EXECUTED, Price: {:.2}, Cost: {:.2}, Comm {:.2}",
                        event.side, event.price, event.value, event.commission
                    ),
                );
                if event.side == Side::Buy {
                    self.buy_price = Some(event.price);
                    self.buy_comm = Some(event.commission);
                }
                self.bar_executed = Some(self.bars_seen);
            }
            OrderStatus::Canceled | OrderStatus::Margin | OrderStatus::Rejected => {
                self.log(date, format!("{} ORDER {}", event.side, event.status));
            }
        }

        self.pending = None;
    }

    fn on_trade(&mut self, date: NaiveDate, event: &TradeEvent) {
        if !event.is_closed {
            return;
        }
        self.log(
            date,
            format!(
                "OPERATION PROFIT, GROSS {:.2}, NET {:.2}",
                event.pnl, event.pnl_net
            ),
        );
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("ma_period".to_string(), self.ma_period.to_string()),
            ("stake".to_string(), self.stake.to_string()),
            ("order_size".to_string(), self.order_size.to_string()),
        ]
    }
}
