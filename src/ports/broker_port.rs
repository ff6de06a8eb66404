//! Order submission port.

use std::fmt;

use crate::domain::error::EngineError;
use crate::domain::intent::OrderIntent;

/// Broker-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synchronous hand-off of order intents to the broker.
///
/// Rejections come back as [`EngineError::Submission`]. Retrying is the
/// broker's business; the engine records the failure and moves on. Fills and
/// cancellations are reported back through the engine's notification methods.
pub trait BrokerPort: Send + Sync {
    fn submit(&self, intent: OrderIntent) -> Result<OrderId, EngineError>;
}
