//! Position and pending-order tracking per instrument.
//!
//! State changes only through broker notifications (submit acknowledgement,
//! fill, cancel/expiry). Decisions work on [`PositionState`] snapshots.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub qty_delta: i64,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub symbol: String,
    pub net_qty: i64,
    pub has_pending_order: bool,
    pub last_fill: Option<Fill>,
}

impl PositionState {
    pub fn flat(symbol: impl Into<String>) -> Self {
        PositionState {
            symbol: symbol.into(),
            net_qty: 0,
            has_pending_order: false,
            last_fill: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.net_qty == 0
    }

    pub fn is_long(&self) -> bool {
        self.net_qty > 0
    }

    pub fn is_short(&self) -> bool {
        self.net_qty < 0
    }
}

#[derive(Debug, Clone)]
pub struct OrderTracker {
    state: PositionState,
    /// Unfilled quantity of the last submitted order.
    outstanding_qty: u64,
}

impl OrderTracker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            state: PositionState::flat(symbol),
            outstanding_qty: 0,
        }
    }

    pub fn snapshot(&self) -> PositionState {
        self.state.clone()
    }

    pub fn net_qty(&self) -> i64 {
        self.state.net_qty
    }

    pub fn has_pending_order(&self) -> bool {
        self.state.has_pending_order
    }

    pub fn on_order_submitted(&mut self, quantity: u64) {
        self.state.has_pending_order = true;
        self.outstanding_qty = quantity;
    }

    pub fn on_order_cancelled_or_expired(&mut self) {
        self.state.has_pending_order = false;
        self.outstanding_qty = 0;
    }

    /// Adds a signed fill to the net position.
    ///
    /// The pending flag clears once the fills cover the last submitted quantity.
    pub fn on_fill(&mut self, qty_delta: i64, price: Option<f64>) {
        if qty_delta == 0 {
            return;
        }
        self.state.net_qty += qty_delta;
        self.state.last_fill = Some(Fill { qty_delta, price });

        self.outstanding_qty = self.outstanding_qty.saturating_sub(qty_delta.unsigned_abs());
        if self.outstanding_qty == 0 {
            self.state.has_pending_order = false;
        }
    }
}
