//! Decision report port.

use crate::domain::engine::BarReport;
use crate::domain::error::EngineError;

/// Sink for per-bar decisions made during a run.
pub trait ReportPort {
    fn record(&mut self, report: &BarReport) -> Result<(), EngineError>;

    /// Flushes buffered output. Default: nothing to flush.
    fn finish(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}
