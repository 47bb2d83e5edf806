//! Built-in strategies.
//!
//! - [`MacdCrossover`]: MACD line versus signal line, one block at a time

mod macd_crossover;

pub use macd_crossover::MacdCrossover;
