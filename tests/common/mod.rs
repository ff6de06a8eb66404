#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use orbtrader::domain::bar::Bar;
use orbtrader::domain::config::EngineConfig;
use orbtrader::domain::error::EngineError;
use orbtrader::domain::intent::OrderIntent;
use orbtrader::domain::opening_range::SessionWindow;
use orbtrader::ports::broker_port::{BrokerPort, OrderId};
use orbtrader::ports::data_port::MarketDataPort;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// 2024-01-15 at 08:00 plus `minute` minutes.
pub fn at(minute: u32) -> NaiveDateTime {
    date().and_hms_opt(8 + minute / 60, minute % 60, 0).unwrap()
}

pub fn make_bar(
    symbol: &str,
    timestamp: NaiveDateTime,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: (high + low) / 2.0,
        high,
        low,
        close,
        volume,
    }
}

/// Four contained bars giving the range {high 10, low 9}. The last two
/// volumes make a following 200-volume bar exactly double the 3-bar average.
pub fn opening_bars(symbol: &str) -> Vec<Bar> {
    vec![
        make_bar(symbol, at(0), 10.0, 9.0, 9.5, 100),
        make_bar(symbol, at(1), 9.5, 9.2, 9.4, 100),
        make_bar(symbol, at(2), 9.6, 9.3, 9.5, 50),
        make_bar(symbol, at(3), 9.4, 9.1, 9.2, 50),
    ]
}

/// Session 08:00-16:30, everything else default.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        session: SessionWindow::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
        ),
        ..EngineConfig::default()
    }
}

/// Records every submitted intent; never fills.
#[derive(Default)]
pub struct MockBroker {
    pub submitted: Mutex<Vec<OrderIntent>>,
    pub reject: AtomicBool,
}

impl MockBroker {
    pub fn rejecting() -> Self {
        let broker = Self::default();
        broker.reject.store(true, Ordering::SeqCst);
        broker
    }

    pub fn intents(&self) -> Vec<OrderIntent> {
        self.submitted.lock().clone()
    }

    pub fn intents_for(&self, symbol: &str) -> Vec<OrderIntent> {
        self.submitted
            .lock()
            .iter()
            .filter(|i| i.symbol == symbol)
            .cloned()
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn submit(&self, intent: OrderIntent) -> Result<OrderId, EngineError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(EngineError::Submission {
                symbol: intent.symbol,
                reason: "rejected by mock".into(),
            });
        }
        let mut submitted = self.submitted.lock();
        submitted.push(intent);
        Ok(OrderId(format!("MOCK-{}", submitted.len())))
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, EngineError> {
        let bars = self.data.get(symbol).ok_or_else(|| EngineError::Data {
            reason: format!("no bars for {symbol}"),
        })?;
        Ok(bars
            .iter()
            .filter(|b| from.is_none_or(|f| b.timestamp >= f))
            .filter(|b| to.is_none_or(|t| b.timestamp < t))
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}
