//! CSV decision log: one row per processed bar.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::adapters::csv_adapter::TIMESTAMP_FORMAT;
use crate::domain::engine::{BarOutcome, BarReport};
use crate::domain::error::EngineError;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 11] = [
    "symbol",
    "timestamp",
    "signal",
    "outcome",
    "direction",
    "quantity",
    "limit_price",
    "initial_stop",
    "target",
    "order_id",
    "error",
];

pub struct CsvReportAdapter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

fn write_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Io(format!("failed to write report: {e}"))
}

impl CsvReportAdapter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let file = File::create(path.as_ref()).map_err(|e| {
            EngineError::Io(format!("failed to create {}: {e}", path.as_ref().display()))
        })?;
        Self::new(file)
    }
}

impl<W: Write> CsvReportAdapter<W> {
    pub fn new(inner: W) -> Result<Self, EngineError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(HEADER).map_err(write_error)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and hands back the underlying writer.
    pub fn into_inner(self) -> Result<W, EngineError> {
        self.writer.into_inner().map_err(write_error)
    }
}

impl<W: Write> ReportPort for CsvReportAdapter<W> {
    fn record(&mut self, report: &BarReport) -> Result<(), EngineError> {
        let intent = report.outcome.intent();
        let order_id = match &report.outcome {
            BarOutcome::Submitted { order_id, .. } => order_id.to_string(),
            _ => String::new(),
        };
        let row = [
            report.symbol.clone(),
            report.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            report.signal.map(|s| s.to_string()).unwrap_or_default(),
            report.outcome.label().to_string(),
            intent.map(|i| i.direction.to_string()).unwrap_or_default(),
            intent.map(|i| i.quantity.to_string()).unwrap_or_default(),
            intent.map(|i| i.limit_price.to_string()).unwrap_or_default(),
            intent.map(|i| i.initial_stop.to_string()).unwrap_or_default(),
            intent.map(|i| i.target.to_string()).unwrap_or_default(),
            order_id,
            report
                .outcome
                .error()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        ];
        self.writer.write_record(&row).map_err(write_error)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        self.writer.flush().map_err(write_error)
    }
}
