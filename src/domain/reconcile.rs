//! Signal-to-position reconciliation.
//!
//! | position | signal   | pending | decision        |
//! |----------|----------|---------|-----------------|
//! | any      | NONE     | any     | no-op           |
//! | 0        | BUY/SELL | true    | skip duplicate  |
//! | 0        | BUY/SELL | false   | enter           |
//! | >0       | BUY      | any     | no-op (aligned) |
//! | >0       | SELL     | any     | reverse to SELL |
//! | <0       | SELL     | any     | no-op (aligned) |
//! | <0       | BUY      | any     | reverse to BUY  |
//!
//! Alignment is checked before reversal, and the duplicate-order guard only
//! applies to fresh entries: an opposing signal always reverses.

use crate::domain::error::EngineError;
use crate::domain::intent::Direction;
use crate::domain::position::PositionState;
use crate::domain::signal::SignalKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    NoSignal,
    AlreadyLong,
    AlreadyShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoOp(NoOpReason),
    SkipDuplicate,
    Enter(Direction),
    Reverse(Direction),
}

impl Decision {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Decision::Enter(d) | Decision::Reverse(d) => Some(*d),
            Decision::NoOp(_) | Decision::SkipDuplicate => None,
        }
    }
}

pub fn decide(signal: SignalKind, position: &PositionState) -> Decision {
    let Some(direction) = signal.direction() else {
        return Decision::NoOp(NoOpReason::NoSignal);
    };

    match (direction, position.net_qty.signum()) {
        (Direction::Buy, 1) => Decision::NoOp(NoOpReason::AlreadyLong),
        (Direction::Sell, -1) => Decision::NoOp(NoOpReason::AlreadyShort),
        (_, 0) if position.has_pending_order => Decision::SkipDuplicate,
        (_, 0) => Decision::Enter(direction),
        (_, _) => Decision::Reverse(direction),
    }
}

/// Like [`decide`], for signals arriving as text labels from an external source.
pub fn decide_label(label: &str, position: &PositionState) -> Result<Decision, EngineError> {
    let signal: SignalKind = label.parse()?;
    Ok(decide(signal, position))
}

/// Order quantity for a decision: reversals add the current exposure so the
/// single order flattens and flips.
pub fn order_quantity(decision: &Decision, position: &PositionState, sized_qty: u64) -> u64 {
    match decision {
        Decision::Reverse(_) => position.net_qty.unsigned_abs() + sized_qty,
        _ => sized_qty,
    }
}
