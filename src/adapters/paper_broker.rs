//! Paper broker: accepts every well-formed intent and fills it in full at the
//! limit price.
//!
//! Fills are queued per symbol rather than pushed into the engine, so the
//! caller drains them with [`PaperBroker::drain_fills`] after each bar and
//! feeds them to `Engine::on_fill` outside the engine's per-symbol lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::error::EngineError;
use crate::domain::intent::OrderIntent;
use crate::ports::broker_port::{BrokerPort, OrderId};

const FIRST_ORDER_ID: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperFill {
    pub order_id: OrderId,
    pub symbol: String,
    pub qty_delta: i64,
    pub price: f64,
}

pub struct PaperBroker {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, Vec<PaperFill>>>,
    submitted: AtomicU64,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBroker {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(FIRST_ORDER_ID),
            pending: Mutex::new(HashMap::new()),
            submitted: AtomicU64::new(0),
        }
    }

    /// Number of intents accepted so far.
    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Takes the queued fills for `symbol`, oldest first.
    pub fn drain_fills(&self, symbol: &str) -> Vec<PaperFill> {
        self.pending.lock().remove(symbol).unwrap_or_default()
    }
}

impl BrokerPort for PaperBroker {
    fn submit(&self, intent: OrderIntent) -> Result<OrderId, EngineError> {
        if intent.quantity == 0 {
            return Err(EngineError::Submission {
                symbol: intent.symbol,
                reason: "quantity must be positive".into(),
            });
        }
        if !intent.limit_price.is_finite() || intent.limit_price <= 0.0 {
            return Err(EngineError::Submission {
                symbol: intent.symbol,
                reason: format!("invalid limit price {}", intent.limit_price),
            });
        }
        let qty_delta = i64::try_from(intent.quantity).map_err(|_| EngineError::Submission {
            symbol: intent.symbol.clone(),
            reason: format!("quantity {} out of range", intent.quantity),
        })? * intent.direction.sign();

        let order_id = OrderId(format!(
            "PAPER-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        self.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            symbol = %intent.symbol,
            %order_id,
            qty_delta,
            price = intent.limit_price,
            "paper fill queued"
        );

        self.pending
            .lock()
            .entry(intent.symbol.clone())
            .or_default()
            .push(PaperFill {
                order_id: order_id.clone(),
                symbol: intent.symbol,
                qty_delta,
                price: intent.limit_price,
            });
        Ok(order_id)
    }
}
