//! Per-instrument decision loop.
//!
//! Each symbol owns its bar window, opening-range detector and order tracker
//! behind one mutex. `on_bar` holds that lock from appending the bar through
//! submitting the order and recording the acknowledgement, and broker
//! notifications take the same lock, so a decision never reads a position that
//! a concurrent fill has already changed. Symbols never share a lock.
//!
//! The broker's `submit` runs under the symbol lock and must not call back
//! into the engine for the same symbol.

use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::bar::Bar;
use crate::domain::bar_window::BarWindow;
use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::evaluator::{EvalContext, SignalEvaluator};
use crate::domain::intent::{OrderIntent, build_intent, size_quantity};
use crate::domain::opening_range::{OpeningRange, OpeningRangeDetector, RangeEvent};
use crate::domain::position::{OrderTracker, PositionState};
use crate::domain::reconcile::{Decision, NoOpReason, decide, order_quantity};
use crate::domain::signal::{Signal, SignalKind};
use crate::ports::broker_port::{BrokerPort, OrderId};

/// What happened to one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    /// The bar was not accepted into the window.
    Rejected(EngineError),
    /// Accepted, but this bar is not an evaluation bar.
    Gated,
    NoOp(NoOpReason),
    SkippedDuplicate,
    SkippedZeroSize(EngineError),
    InvalidSignal(EngineError),
    Submitted {
        order_id: OrderId,
        intent: OrderIntent,
        reversal: bool,
    },
    SubmissionFailed {
        intent: OrderIntent,
        error: EngineError,
    },
}

impl BarOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BarOutcome::Rejected(_) => "rejected",
            BarOutcome::Gated => "gated",
            BarOutcome::NoOp(NoOpReason::NoSignal) => "no-signal",
            BarOutcome::NoOp(NoOpReason::AlreadyLong) => "already-long",
            BarOutcome::NoOp(NoOpReason::AlreadyShort) => "already-short",
            BarOutcome::SkippedDuplicate => "skipped-duplicate",
            BarOutcome::SkippedZeroSize(_) => "skipped-zero-size",
            BarOutcome::InvalidSignal(_) => "invalid-signal",
            BarOutcome::Submitted { reversal: false, .. } => "entered",
            BarOutcome::Submitted { reversal: true, .. } => "reversed",
            BarOutcome::SubmissionFailed { .. } => "submission-failed",
        }
    }

    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            BarOutcome::Submitted { intent, .. } | BarOutcome::SubmissionFailed { intent, .. } => {
                Some(intent)
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            BarOutcome::Rejected(e)
            | BarOutcome::SkippedZeroSize(e)
            | BarOutcome::InvalidSignal(e)
            | BarOutcome::SubmissionFailed { error: e, .. } => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarReport {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    /// `None` when the bar never reached signal evaluation.
    pub signal: Option<SignalKind>,
    pub outcome: BarOutcome,
}

#[derive(Debug)]
struct Instrument {
    window: BarWindow,
    detector: OpeningRangeDetector,
    tracker: OrderTracker,
}

pub struct Engine<B: BrokerPort> {
    config: EngineConfig,
    evaluator: Box<dyn SignalEvaluator>,
    broker: B,
    instruments: RwLock<HashMap<String, Arc<Mutex<Instrument>>>>,
}

impl<B: BrokerPort> Engine<B> {
    /// Engine using the evaluator selected in `config`.
    pub fn new(config: EngineConfig, broker: B) -> Self {
        let evaluator = config.evaluator.build();
        Self::with_evaluator(config, evaluator, broker)
    }

    /// Engine with a caller-supplied evaluator, e.g. a threshold over an
    /// external indicator source.
    pub fn with_evaluator(
        config: EngineConfig,
        evaluator: Box<dyn SignalEvaluator>,
        broker: B,
    ) -> Self {
        Self {
            config,
            evaluator,
            broker,
            instruments: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn instrument(&self, symbol: &str) -> Arc<Mutex<Instrument>> {
        if let Some(existing) = self.instruments.read().get(symbol) {
            return Arc::clone(existing);
        }
        let mut map = self.instruments.write();
        let entry = map.entry(symbol.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Instrument {
                window: BarWindow::new(symbol, self.config.window_capacity),
                detector: OpeningRangeDetector::new(
                    symbol,
                    self.config.opening_range_bars,
                    self.config.session,
                    self.config.bracket.capital_per_trade,
                ),
                tracker: OrderTracker::new(symbol),
            }))
        });
        Arc::clone(entry)
    }

    /// Snapshot of the symbol's position and pending-order state.
    pub fn position(&self, symbol: &str) -> PositionState {
        match self.instruments.read().get(symbol) {
            Some(instrument) => instrument.lock().tracker.snapshot(),
            None => PositionState::flat(symbol),
        }
    }

    /// The symbol's established opening range for the current session.
    pub fn opening_range(&self, symbol: &str) -> Option<OpeningRange> {
        self.instruments
            .read()
            .get(symbol)
            .and_then(|instrument| instrument.lock().detector.range().cloned())
    }

    pub fn on_fill(&self, symbol: &str, qty_delta: i64, price: Option<f64>) {
        let instrument = self.instrument(symbol);
        let mut guard = instrument.lock();
        guard.tracker.on_fill(qty_delta, price);
        debug!(
            symbol = %symbol,
            qty_delta,
            net_qty = guard.tracker.net_qty(),
            pending = guard.tracker.has_pending_order(),
            "fill applied"
        );
    }

    pub fn on_order_cancelled_or_expired(&self, symbol: &str) {
        let instrument = self.instrument(symbol);
        instrument.lock().tracker.on_order_cancelled_or_expired();
        debug!(symbol = %symbol, "pending order cleared");
    }

    /// Runs one bar through window, range detection, signal evaluation,
    /// reconciliation and order submission.
    pub fn on_bar(&self, bar: Bar) -> BarReport {
        let symbol = bar.symbol.clone();
        let timestamp = bar.timestamp;
        let instrument = self.instrument(&symbol);
        let mut guard = instrument.lock();
        let inst = &mut *guard;

        let report = |signal: Option<SignalKind>, outcome: BarOutcome| BarReport {
            symbol: symbol.clone(),
            timestamp,
            signal,
            outcome,
        };

        if let Err(e) = inst.window.append(bar) {
            warn!(symbol = %symbol, %timestamp, error = %e, "bar rejected");
            return report(None, BarOutcome::Rejected(e));
        }
        let Some(last) = inst.window.last() else {
            return report(None, BarOutcome::Gated);
        };

        match inst.detector.observe(last) {
            Some(RangeEvent::Established(range)) => info!(
                symbol = %symbol,
                high = range.high,
                low = range.low,
                qty = range.qty,
                "opening range established"
            ),
            Some(RangeEvent::Rejected) => {
                info!(symbol = %symbol, "opening range rejected for session")
            }
            Some(RangeEvent::SessionClosed) => debug!(symbol = %symbol, "session closed"),
            None => {}
        }

        let every = self.config.evaluate_every.max(1);
        if inst.window.bars_seen() % every != 0 {
            return report(None, BarOutcome::Gated);
        }

        let ctx = EvalContext {
            window: &inst.window,
            range: inst.detector.range(),
        };
        let signal = match self.evaluator.evaluate(&ctx) {
            Ok(signal) => signal,
            Err(EngineError::InsufficientData { bars, needed }) => {
                debug!(symbol = %symbol, bars, needed, "insufficient data, treating as no signal");
                Signal::none()
            }
            Err(e) => {
                warn!(symbol = %symbol, %timestamp, error = %e, "signal evaluation failed");
                return report(None, BarOutcome::InvalidSignal(e));
            }
        };

        let position = inst.tracker.snapshot();
        let decision = decide(signal.kind, &position);
        let kind = Some(signal.kind);

        let direction = match decision {
            Decision::NoOp(reason) => {
                debug!(symbol = %symbol, signal = %signal.kind, net_qty = position.net_qty, ?reason, "no action");
                return report(kind, BarOutcome::NoOp(reason));
            }
            Decision::SkipDuplicate => {
                debug!(symbol = %symbol, signal = %signal.kind, "order already pending, skipping entry");
                return report(kind, BarOutcome::SkippedDuplicate);
            }
            Decision::Enter(d) | Decision::Reverse(d) => d,
        };

        let Some(metrics) = signal.metrics else {
            let e = EngineError::InvalidSignal {
                reason: format!("{} signal without reference prices", signal.kind),
            };
            warn!(symbol = %symbol, error = %e, "signal evaluation failed");
            return report(kind, BarOutcome::InvalidSignal(e));
        };

        let sized = match size_quantity(
            &symbol,
            self.config.bracket.capital_per_trade,
            metrics.reference_high,
            metrics.reference_low,
        ) {
            Ok(qty) => qty,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "order size is zero, skipping");
                return report(kind, BarOutcome::SkippedZeroSize(e));
            }
        };

        let reversal = matches!(decision, Decision::Reverse(_));
        let intent = build_intent(
            &symbol,
            direction,
            order_quantity(&decision, &position, sized),
            metrics.reference_high,
            metrics.reference_low,
            &self.config.bracket,
        );

        match self.broker.submit(intent.clone()) {
            Ok(order_id) => {
                inst.tracker.on_order_submitted(intent.quantity);
                info!(
                    symbol = %symbol,
                    %order_id,
                    direction = %intent.direction,
                    qty = intent.quantity,
                    limit = intent.limit_price,
                    stop = intent.initial_stop,
                    target = intent.target,
                    reversal,
                    "order submitted"
                );
                report(
                    kind,
                    BarOutcome::Submitted {
                        order_id,
                        intent,
                        reversal,
                    },
                )
            }
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "order submission failed");
                report(kind, BarOutcome::SubmissionFailed { intent, error })
            }
        }
    }
}
