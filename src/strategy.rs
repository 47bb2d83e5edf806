//! Strategy trait and the values an engine passes to it.
//!
//! The backtesting engine owns indicators, order matching and the broker.
//! A strategy only sees one bar at a time together with the indicator
//! readings the engine computed, and is told about order and trade updates.

use crate::types::{Side, Signal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MACD line and signal line for the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    /// MACD line on the previous bar, if there was one.
    pub prev_macd: Option<f64>,
}

impl MacdReading {
    pub fn new(macd: f64, signal: f64, prev_macd: Option<f64>) -> Self {
        Self {
            macd,
            signal,
            prev_macd,
        }
    }

    /// MACD minus signal.
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }

    /// MACD line above the signal line.
    pub fn is_bullish(&self) -> bool {
        self.macd > self.signal
    }

    /// MACD line lower than on the previous bar.
    pub fn is_falling(&self) -> bool {
        self.prev_macd.is_some_and(|prev| self.macd < prev)
    }
}

/// Context provided to strategies for each bar.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    /// Session date of the bar.
    pub date: NaiveDate,
    /// Closing price of the bar.
    pub close: f64,
    /// Indicator readings for the bar.
    pub macd: MacdReading,
    /// Current position quantity (positive for long, zero for flat).
    pub position: f64,
}

impl StrategyContext {
    /// Check if we have a position.
    pub fn has_position(&self) -> bool {
        self.position.abs() > f64::EPSILON
    }

    /// Check if we're flat (no position).
    pub fn is_flat(&self) -> bool {
        !self.has_position()
    }
}

/// Broker-side order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Accepted,
    Completed,
    Canceled,
    Margin,
    Rejected,
}

impl OrderStatus {
    /// No further updates follow this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Submitted | OrderStatus::Accepted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Margin => "MARGIN",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Order update from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub side: Side,
    pub status: OrderStatus,
    /// Execution price.
    pub price: f64,
    /// Executed value (price times size).
    pub value: f64,
    pub commission: f64,
}

/// Trade update from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Gross profit and loss.
    pub pnl: f64,
    /// Profit and loss after commission.
    pub pnl_net: f64,
    pub is_closed: bool,
}

/// Trait that all trading strategies must implement.
pub trait Strategy: Send + Sync {
    /// Returns the name of the strategy.
    fn name(&self) -> &str;

    /// Called once at the start of the backtest.
    fn init(&mut self) {}

    /// Decide what to do on the current bar.
    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal;

    /// Called whenever an order changes state.
    fn on_order(&mut self, _date: NaiveDate, _event: &OrderEvent) {}

    /// Called whenever a trade changes state.
    fn on_trade(&mut self, _date: NaiveDate, _event: &TradeEvent) {}

    /// Called at the end of the backtest.
    fn on_finish(&mut self) {}

    /// Get strategy parameters as key-value pairs for logging.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HoldStrategy {
        bars: usize,
    }

    impl Strategy for HoldStrategy {
        fn name(&self) -> &str {
            "Hold"
        }

        fn on_bar(&mut self, _ctx: &StrategyContext) -> Signal {
            self.bars += 1;
            Signal::Hold
        }
    }

    #[test]
    fn test_macd_reading() {
        let reading = MacdReading::new(0.5, 0.2, Some(0.7));
        assert!(reading.is_bullish());
        assert!(reading.is_falling());
        assert!((reading.histogram() - 0.3).abs() < 1e-12);

        let first_bar = MacdReading::new(0.5, 0.2, None);
        assert!(!first_bar.is_falling());
    }

    #[test]
    fn test_context_position() {
        let mut ctx = StrategyContext {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close: 10.0,
            macd: MacdReading::new(0.0, 0.0, None),
            position: 0.0,
        };
        assert!(ctx.is_flat());
        ctx.position = 100.0;
        assert!(ctx.has_position());
    }

    #[test]
    fn test_default_hooks() {
        let mut strategy = HoldStrategy { bars: 0 };
        let ctx = StrategyContext {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close: 10.0,
            macd: MacdReading::new(1.0, 0.0, None),
            position: 0.0,
        };
        assert_eq!(strategy.on_bar(&ctx), Signal::Hold);
        assert_eq!(strategy.bars, 1);
        assert!(strategy.parameters().is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Margin.is_terminal());
    }
}
