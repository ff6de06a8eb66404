//! Market data port.

use chrono::NaiveDateTime;

use crate::domain::bar::Bar;
use crate::domain::error::EngineError;

pub trait MarketDataPort {
    /// Bars for `symbol` with `from <= timestamp < to`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, EngineError>;

    fn list_symbols(&self) -> Result<Vec<String>, EngineError>;
}
