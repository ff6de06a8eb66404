//! Bracket order intents and position sizing.

use std::fmt;

use crate::domain::error::EngineError;

pub const DEFAULT_CAPITAL_PER_TRADE: f64 = 10_000.0;
pub const DEFAULT_TARGET_MULTIPLE: f64 = 1.0;
pub const DEFAULT_TRAIL_STOP_BY: f64 = 0.5;
pub const DEFAULT_EXPIRY_SECONDS: u64 = 14_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Buy => 1,
            Direction::Sell => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Order parameters fixed for the run.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketConfig {
    pub capital_per_trade: f64,
    pub target_multiple: f64,
    pub trail_stop_by: Option<f64>,
    pub expiry_seconds: u64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        BracketConfig {
            capital_per_trade: DEFAULT_CAPITAL_PER_TRADE,
            target_multiple: DEFAULT_TARGET_MULTIPLE,
            trail_stop_by: Some(DEFAULT_TRAIL_STOP_BY),
            expiry_seconds: DEFAULT_EXPIRY_SECONDS,
        }
    }
}

/// Entry, stop and target bundled in one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub limit_price: f64,
    pub initial_stop: f64,
    pub target: f64,
    pub trail_stop_by: Option<f64>,
    pub expiry_seconds: u64,
}

impl OrderIntent {
    /// Net position change once the order fills, saturating at `i64::MAX` units.
    pub fn signed_quantity(&self) -> i64 {
        self.direction.sign() * i64::try_from(self.quantity).unwrap_or(i64::MAX)
    }
}

/// floor(capital / ((high + low) / 2))
pub fn size_quantity(symbol: &str, capital: f64, high: f64, low: f64) -> Result<u64, EngineError> {
    let midpoint = (high + low) / 2.0;
    let zero_size = || EngineError::ZeroSize {
        symbol: symbol.to_string(),
        capital,
        midpoint,
    };
    if !midpoint.is_finite() || midpoint <= 0.0 || !capital.is_finite() {
        return Err(zero_size());
    }
    let qty = (capital / midpoint).floor();
    if qty < 1.0 {
        return Err(zero_size());
    }
    Ok(qty as u64)
}

/// Builds the bracket for `direction` around the reference high/low.
///
/// BUY enters at the high with the stop at the low; SELL mirrors it. The
/// target sits `target_multiple` range-widths beyond the entry.
pub fn build_intent(
    symbol: &str,
    direction: Direction,
    quantity: u64,
    reference_high: f64,
    reference_low: f64,
    config: &BracketConfig,
) -> OrderIntent {
    let width = reference_high - reference_low;
    let (limit_price, initial_stop, target) = match direction {
        Direction::Buy => (
            reference_high,
            reference_low,
            reference_high + width * config.target_multiple,
        ),
        Direction::Sell => (
            reference_low,
            reference_high,
            reference_low - width * config.target_multiple,
        ),
    };
    OrderIntent {
        symbol: symbol.to_string(),
        direction,
        quantity,
        limit_price,
        initial_stop,
        target,
        trail_stop_by: config.trail_stop_by,
        expiry_seconds: config.expiry_seconds,
    }
}
