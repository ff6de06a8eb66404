//! Opening range detection per symbol and session.
//!
//! The detector collects the first K in-session bars. When the Kth bar arrives
//! it validates that bars 2..K lie within bar 1's high/low, edges included.
//! The range is then either established (bar 1's high/low) or rejected for
//! the rest of the session. Both outcomes are final until the next session begins.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::bar::Bar;
use crate::domain::intent::size_quantity;

pub const DEFAULT_OPENING_RANGE_BARS: usize = 4;

/// Trading session hours, applied to every calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// `start <= time < end`
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }

    pub fn start_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start)
    }

    pub fn end_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpeningRange {
    pub symbol: String,
    pub session_start: NaiveDateTime,
    pub session_end: NaiveDateTime,
    pub high: f64,
    pub low: f64,
    /// Units `capital_per_trade` buys at the range midpoint; 0 if not even one.
    pub qty: u64,
    pub established: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeState {
    /// Fewer than K session bars seen so far.
    Collecting { bars: usize },
    Established(OpeningRange),
    /// Containment failed; no breakout checks until the next session.
    Rejected,
}

/// Transition reported by [`OpeningRangeDetector::observe`].
#[derive(Debug, Clone, PartialEq)]
pub enum RangeEvent {
    Established(OpeningRange),
    Rejected,
    SessionClosed,
}

#[derive(Debug, Clone)]
pub struct OpeningRangeDetector {
    symbol: String,
    bars_required: usize,
    session: SessionWindow,
    capital_per_trade: f64,
    session_date: Option<NaiveDate>,
    collected: Vec<Bar>,
    state: RangeState,
    closed: bool,
}

impl OpeningRangeDetector {
    pub fn new(
        symbol: impl Into<String>,
        bars_required: usize,
        session: SessionWindow,
        capital_per_trade: f64,
    ) -> Self {
        let bars_required = bars_required.max(1);
        Self {
            symbol: symbol.into(),
            bars_required,
            session,
            capital_per_trade,
            session_date: None,
            collected: Vec::with_capacity(bars_required),
            state: RangeState::Collecting { bars: 0 },
            closed: false,
        }
    }

    pub fn state(&self) -> &RangeState {
        &self.state
    }

    pub fn session_date(&self) -> Option<NaiveDate> {
        self.session_date
    }

    /// The established range, if any, while the session is still open.
    pub fn range(&self) -> Option<&OpeningRange> {
        if self.closed {
            return None;
        }
        match &self.state {
            RangeState::Established(range) => Some(range),
            _ => None,
        }
    }

    /// Feeds one bar into the detector.
    ///
    /// A bar dated after the current session starts a new one and discards the
    /// previous range. Bars outside the session hours do not count towards K;
    /// the first bar at or after the session end closes the session.
    pub fn observe(&mut self, bar: &Bar) -> Option<RangeEvent> {
        let date = bar.timestamp.date();
        if self.session_date != Some(date) {
            self.reset(date);
        }

        let time = bar.timestamp.time();
        if time >= self.session.end {
            if self.closed {
                return None;
            }
            self.closed = true;
            return Some(RangeEvent::SessionClosed);
        }
        if !self.session.contains(time) {
            return None;
        }

        match self.state {
            RangeState::Collecting { .. } => {}
            RangeState::Established(_) | RangeState::Rejected => return None,
        }

        self.collected.push(bar.clone());
        if self.collected.len() < self.bars_required {
            self.state = RangeState::Collecting {
                bars: self.collected.len(),
            };
            return None;
        }

        Some(self.validate(date))
    }

    fn validate(&mut self, date: NaiveDate) -> RangeEvent {
        let bars = std::mem::take(&mut self.collected);
        let first = &bars[0];
        let contained = bars[1..].iter().all(|b| b.is_inside(first));

        if !contained {
            self.state = RangeState::Rejected;
            return RangeEvent::Rejected;
        }

        let qty = size_quantity(&self.symbol, self.capital_per_trade, first.high, first.low)
            .unwrap_or(0);
        let range = OpeningRange {
            symbol: self.symbol.clone(),
            session_start: self.session.start_on(date),
            session_end: self.session.end_on(date),
            high: first.high,
            low: first.low,
            qty,
            established: true,
        };
        self.state = RangeState::Established(range.clone());
        RangeEvent::Established(range)
    }

    fn reset(&mut self, date: NaiveDate) {
        self.session_date = Some(date);
        self.collected.clear();
        self.state = RangeState::Collecting { bars: 0 };
        self.closed = false;
    }
}
