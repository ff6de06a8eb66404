//! Pluggable signal evaluators.
//!
//! Each evaluator looks at the instrument's bar window (and the opening range,
//! when one is established) and produces a [`Signal`]. The engine holds one
//! evaluator chosen from [`EvaluatorConfig`] at start-up.
//!
//! # Evaluation Semantics
//!
//! - Opening-range breakout: close beyond the range with volume strictly above
//!   the average of the last M bars. No range means no signal.
//! - Crossover: simple averages of close; the cross must happen on the last bar.
//! - Threshold: value from an external [`IndicatorSource`] compared against
//!   fixed buy/sell levels.
//!
//! `InsufficientData` is not fatal; the engine reads it as no signal.

use std::fmt;
use std::str::FromStr;

use crate::domain::bar::Bar;
use crate::domain::bar_window::BarWindow;
use crate::domain::error::EngineError;
use crate::domain::opening_range::OpeningRange;
use crate::domain::signal::{Signal, SignalKind, SignalMetrics};

pub const DEFAULT_AVG_VOLUME_BARS: usize = 3;

/// What an evaluator gets to look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub window: &'a BarWindow,
    pub range: Option<&'a OpeningRange>,
}

pub trait SignalEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Signal, EngineError>;
}

/// Evaluator selection, fixed at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatorConfig {
    OpeningRangeBreakout {
        avg_volume_bars: usize,
    },
    Crossover {
        fast: usize,
        slow: usize,
    },
    Threshold {
        field: BarField,
        buy_below: f64,
        sell_above: f64,
    },
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig::OpeningRangeBreakout {
            avg_volume_bars: DEFAULT_AVG_VOLUME_BARS,
        }
    }
}

impl EvaluatorConfig {
    pub fn build(&self) -> Box<dyn SignalEvaluator> {
        match self {
            EvaluatorConfig::OpeningRangeBreakout { avg_volume_bars } => {
                Box::new(OpeningRangeBreakout::new(*avg_volume_bars))
            }
            EvaluatorConfig::Crossover { fast, slow } => {
                Box::new(MovingAverageCrossover::new(*fast, *slow))
            }
            EvaluatorConfig::Threshold {
                field,
                buy_below,
                sell_above,
            } => Box::new(IndicatorThreshold::new(
                Box::new(BarFieldSource(*field)),
                *buy_below,
                *sell_above,
            )),
        }
    }

    /// Whether the evaluator needs an established opening range to signal.
    pub fn uses_opening_range(&self) -> bool {
        matches!(self, EvaluatorConfig::OpeningRangeBreakout { .. })
    }
}

fn last_bar<'a>(window: &'a BarWindow) -> Result<&'a Bar, EngineError> {
    window
        .last()
        .ok_or(EngineError::InsufficientData { bars: 0, needed: 1 })
}

fn bar_reference(bar: &Bar) -> SignalMetrics {
    SignalMetrics {
        avg_volume: None,
        reference_high: bar.high,
        reference_low: bar.low,
    }
}

// ---------------------------------------------------------------------------
// Opening-range breakout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpeningRangeBreakout {
    avg_volume_bars: usize,
}

impl OpeningRangeBreakout {
    pub fn new(avg_volume_bars: usize) -> Self {
        Self { avg_volume_bars }
    }
}

impl Default for OpeningRangeBreakout {
    fn default() -> Self {
        Self::new(DEFAULT_AVG_VOLUME_BARS)
    }
}

/// sum(volume of the last `m` bars) / m
pub fn average_volume(window: &BarWindow, m: usize) -> Result<f64, EngineError> {
    if m == 0 || window.is_empty() {
        return Err(EngineError::InsufficientData {
            bars: window.len(),
            needed: m.max(1),
        });
    }
    let total: i64 = window.lookback(m).iter().map(|b| b.volume).sum();
    Ok(total as f64 / m as f64)
}

impl SignalEvaluator for OpeningRangeBreakout {
    fn name(&self) -> &'static str {
        "opening-range-breakout"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Signal, EngineError> {
        let Some(range) = ctx.range else {
            return Ok(Signal::none());
        };
        let avg_volume = average_volume(ctx.window, self.avg_volume_bars)?;
        let bar = last_bar(ctx.window)?;
        let volume = bar.volume as f64;

        let kind = if bar.close > range.high && volume > avg_volume {
            SignalKind::Buy
        } else if bar.close < range.low && volume > avg_volume {
            SignalKind::Sell
        } else {
            SignalKind::None
        };

        Ok(Signal::new(
            kind,
            SignalMetrics {
                avg_volume: Some(avg_volume),
                reference_high: range.high,
                reference_low: range.low,
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// Moving-average crossover
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    fast: usize,
    slow: usize,
}

impl MovingAverageCrossover {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }
}

/// Simple average of close over `period` bars ending `offset` bars before the last.
fn sma_close(bars: &[&Bar], period: usize, offset: usize) -> f64 {
    let end = bars.len() - offset;
    let sum: f64 = bars[end - period..end].iter().map(|b| b.close).sum();
    sum / period as f64
}

impl SignalEvaluator for MovingAverageCrossover {
    fn name(&self) -> &'static str {
        "crossover"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Signal, EngineError> {
        let needed = self.slow.max(self.fast) + 1;
        if self.fast == 0 || ctx.window.len() < needed {
            return Err(EngineError::InsufficientData {
                bars: ctx.window.len(),
                needed,
            });
        }
        let bars = ctx.window.lookback(needed);

        let fast_curr = sma_close(&bars, self.fast, 0);
        let slow_curr = sma_close(&bars, self.slow, 0);
        let fast_prev = sma_close(&bars, self.fast, 1);
        let slow_prev = sma_close(&bars, self.slow, 1);

        let kind = if fast_curr > slow_curr && fast_prev <= slow_prev {
            SignalKind::Buy
        } else if fast_curr < slow_curr && fast_prev >= slow_prev {
            SignalKind::Sell
        } else {
            SignalKind::None
        };

        let last = last_bar(ctx.window)?;
        Ok(Signal::new(kind, bar_reference(last)))
    }
}

// ---------------------------------------------------------------------------
// Indicator threshold
// ---------------------------------------------------------------------------

/// Externally computed indicator value for the latest bar.
///
/// `None` means the indicator has not warmed up yet.
pub trait IndicatorSource: Send + Sync {
    fn value(&self, window: &BarWindow) -> Option<f64>;
}

impl<F> IndicatorSource for F
where
    F: Fn(&BarWindow) -> Option<f64> + Send + Sync,
{
    fn value(&self, window: &BarWindow) -> Option<f64> {
        self(window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl BarField {
    pub fn of(self, bar: &Bar) -> f64 {
        match self {
            BarField::Open => bar.open,
            BarField::High => bar.high,
            BarField::Low => bar.low,
            BarField::Close => bar.close,
            BarField::Volume => bar.volume as f64,
        }
    }
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
        };
        write!(f, "{name}")
    }
}

impl FromStr for BarField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(BarField::Open),
            "high" => Ok(BarField::High),
            "low" => Ok(BarField::Low),
            "close" => Ok(BarField::Close),
            "volume" => Ok(BarField::Volume),
            other => Err(format!("unknown bar field {other:?}")),
        }
    }
}

/// Reads one field of the latest bar.
#[derive(Debug, Clone, Copy)]
pub struct BarFieldSource(pub BarField);

impl IndicatorSource for BarFieldSource {
    fn value(&self, window: &BarWindow) -> Option<f64> {
        window.last().map(|bar| self.0.of(bar))
    }
}

pub struct IndicatorThreshold {
    source: Box<dyn IndicatorSource>,
    buy_below: f64,
    sell_above: f64,
}

impl IndicatorThreshold {
    pub fn new(source: Box<dyn IndicatorSource>, buy_below: f64, sell_above: f64) -> Self {
        Self {
            source,
            buy_below,
            sell_above,
        }
    }
}

impl SignalEvaluator for IndicatorThreshold {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Signal, EngineError> {
        let last = last_bar(ctx.window)?;
        let value = self
            .source
            .value(ctx.window)
            .ok_or(EngineError::InsufficientData {
                bars: ctx.window.len(),
                needed: ctx.window.len() + 1,
            })?;
        if !value.is_finite() {
            return Err(EngineError::InvalidSignal {
                reason: format!("indicator produced non-finite value {value}"),
            });
        }

        let kind = if value < self.buy_below {
            SignalKind::Buy
        } else if value > self.sell_above {
            SignalKind::Sell
        } else {
            SignalKind::None
        };
        Ok(Signal::new(kind, bar_reference(last)))
    }
}
