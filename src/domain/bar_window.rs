//! Fixed-capacity rolling bar buffer for one instrument.

use chrono::NaiveDateTime;
use std::collections::VecDeque;

use crate::domain::bar::Bar;
use crate::domain::error::EngineError;

pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct BarWindow {
    symbol: String,
    capacity: usize,
    bars: VecDeque<Bar>,
    bars_seen: u64,
}

impl BarWindow {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            capacity,
            bars: VecDeque::with_capacity(capacity),
            bars_seen: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Number of bars accepted since the window was created, evictions included.
    pub fn bars_seen(&self) -> u64 {
        self.bars_seen
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Appends a bar, evicting the oldest one when full.
    ///
    /// The window is left untouched when the bar is rejected.
    pub fn append(&mut self, bar: Bar) -> Result<(), EngineError> {
        if bar.symbol != self.symbol {
            return Err(EngineError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: bar.symbol,
            });
        }
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrder {
                    symbol: bar.symbol,
                    timestamp: bar.timestamp,
                    last: last.timestamp,
                });
            }
        }
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        self.bars_seen += 1;
        Ok(())
    }

    /// The last `n` bars in time order, or everything held when `n` exceeds the size.
    pub fn lookback(&self, n: usize) -> Vec<&Bar> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).collect()
    }

    /// Bars with `from <= timestamp < to`, in time order.
    pub fn slice(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<&Bar> {
        self.bars
            .iter()
            .skip_while(|b| b.timestamp < from)
            .take_while(|b| b.timestamp < to)
            .collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Bar> + ExactSizeIterator {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn bar(minute: u32, close: f64) -> Bar {
        Bar {
            symbol: "AAPL".into(),
            timestamp: ts(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    fn filled(capacity: usize, count: u32) -> BarWindow {
        let mut w = BarWindow::new("AAPL", capacity);
        for m in 0..count {
            w.append(bar(m, 100.0 + m as f64)).unwrap();
        }
        w
    }

    #[test]
    fn append_keeps_order() {
        let w = filled(10, 3);
        assert_eq!(w.len(), 3);
        assert_eq!(w.last().unwrap().timestamp, ts(2));
    }

    #[test]
    fn append_evicts_oldest_when_full() {
        let w = filled(3, 5);
        assert_eq!(w.len(), 3);
        assert_eq!(w.bars_seen(), 5);
        let closes: Vec<f64> = w.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let mut w = filled(10, 2);
        let err = w.append(bar(1, 500.0)).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder { .. }));
        assert_eq!(w.len(), 2);
        assert_eq!(w.bars_seen(), 2);
        assert_eq!(w.last().unwrap().close, 101.0);
    }

    #[test]
    fn earlier_timestamp_rejected() {
        let mut w = filled(10, 3);
        assert!(w.append(bar(0, 1.0)).is_err());
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn foreign_symbol_rejected() {
        let mut w = BarWindow::new("AAPL", 5);
        let mut b = bar(0, 1.0);
        b.symbol = "MSFT".into();
        assert!(matches!(
            w.append(b),
            Err(EngineError::SymbolMismatch { .. })
        ));
        assert!(w.is_empty());
    }

    #[test]
    fn lookback_returns_tail() {
        let w = filled(10, 5);
        let tail: Vec<f64> = w.lookback(2).iter().map(|b| b.close).collect();
        assert_eq!(tail, vec![103.0, 104.0]);
    }

    #[test]
    fn lookback_larger_than_size_returns_all() {
        let w = filled(10, 3);
        assert_eq!(w.lookback(50).len(), 3);
        assert!(w.lookback(0).is_empty());
        assert!(BarWindow::new("AAPL", 4).lookback(3).is_empty());
    }

    #[test]
    fn slice_is_half_open() {
        let w = filled(10, 6);
        let s: Vec<NaiveDateTime> = w.slice(ts(1), ts(4)).iter().map(|b| b.timestamp).collect();
        assert_eq!(s, vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn slice_outside_range_is_empty() {
        let w = filled(10, 3);
        assert!(w.slice(ts(10), ts(20)).is_empty());
        assert!(w.slice(ts(2), ts(2)).is_empty());
    }

    #[test]
    fn zero_capacity_holds_one_bar() {
        let w = filled(0, 3);
        assert_eq!(w.capacity(), 1);
        assert_eq!(w.len(), 1);
    }
}
