//! Normalized directional signals.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::EngineError;
use crate::domain::intent::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Buy,
    Sell,
    None,
}

impl SignalKind {
    pub fn direction(self) -> Option<Direction> {
        match self {
            SignalKind::Buy => Some(Direction::Buy),
            SignalKind::Sell => Some(Direction::Sell),
            SignalKind::None => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::None => write!(f, "NONE"),
        }
    }
}

impl FromStr for SignalKind {
    type Err = EngineError;

    /// Accepts BUY, SELL and NONE in any case. An empty label and the
    /// scripts' "NOT KNOWN" placeholder both mean no signal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(SignalKind::Buy),
            "SELL" => Ok(SignalKind::Sell),
            "NONE" | "NOT KNOWN" | "" => Ok(SignalKind::None),
            other => Err(EngineError::InvalidSignal {
                reason: format!("unrecognized signal label {other:?}"),
            }),
        }
    }
}

/// Supporting values produced alongside a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalMetrics {
    pub avg_volume: Option<f64>,
    pub reference_high: f64,
    pub reference_low: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub metrics: Option<SignalMetrics>,
}

impl Signal {
    pub fn none() -> Self {
        Signal {
            kind: SignalKind::None,
            metrics: None,
        }
    }

    pub fn new(kind: SignalKind, metrics: SignalMetrics) -> Self {
        Signal {
            kind,
            metrics: Some(metrics),
        }
    }
}
