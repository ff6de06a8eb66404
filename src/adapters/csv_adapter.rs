//! CSV file market data adapter.
//!
//! One file per symbol, `{dir}/{SYMBOL}.csv`, with a header row and the
//! columns `timestamp,open,high,low,close,volume`.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::domain::bar::Bar;
use crate::domain::error::EngineError;
use crate::ports::data_port::MarketDataPort;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn data_error(reason: impl Into<String>) -> EngineError {
    EngineError::Data {
        reason: reason.into(),
    }
}

fn column<'r>(record: &'r StringRecord, idx: usize, name: &str, line: u64) -> Result<&'r str, EngineError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| data_error(format!("line {line}: missing {name} column")))
}

fn number<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    column(record, idx, name, line)?
        .parse()
        .map_err(|e| data_error(format!("line {line}: invalid {name} value: {e}")))
}

fn parse_record(symbol: &str, record: &StringRecord) -> Result<Bar, EngineError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let raw_ts = column(record, 0, "timestamp", line)?;
    let timestamp = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT)
        .map_err(|e| data_error(format!("line {line}: invalid timestamp {raw_ts:?}: {e}")))?;

    Ok(Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: number(record, 1, "open", line)?,
        high: number(record, 2, "high", line)?,
        low: number(record, 3, "low", line)?,
        close: number(record, 4, "close", line)?,
        volume: number(record, 5, "volume", line)?,
    })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, EngineError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {e}", path.display())))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;
            let bar = parse_record(symbol, &record)?;
            if from.is_some_and(|f| bar.timestamp < f) || to.is_some_and(|t| bar.timestamp >= t) {
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            if let Some(symbol) = name.to_string_lossy().strip_suffix(".csv") {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
