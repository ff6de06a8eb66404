//! Property tests for the window, range detector and reconciliation rules.

mod common;

use common::*;
use orbtrader::domain::bar_window::BarWindow;
use orbtrader::domain::engine::Engine;
use orbtrader::domain::intent::Direction;
use orbtrader::domain::opening_range::{OpeningRangeDetector, RangeState};
use orbtrader::domain::position::PositionState;
use orbtrader::domain::reconcile::{Decision, NoOpReason, decide, order_quantity};
use orbtrader::domain::signal::SignalKind;
use proptest::prelude::*;

fn signal_kind() -> impl Strategy<Value = SignalKind> {
    prop_oneof![
        Just(SignalKind::Buy),
        Just(SignalKind::Sell),
        Just(SignalKind::None),
    ]
}

fn position(net_qty: i64, pending: bool) -> PositionState {
    PositionState {
        net_qty,
        has_pending_order: pending,
        ..PositionState::flat("IMB")
    }
}

proptest! {
    #[test]
    fn repeated_timestamp_is_rejected_without_side_effects(
        count in 1usize..30,
        capacity in 1usize..20,
        repeat_idx in 0usize..30,
    ) {
        let mut window = BarWindow::new("IMB", capacity);
        for i in 0..count {
            window.append(make_bar("IMB", at(i as u32), 10.0, 9.0, 9.5, 100)).unwrap();
        }
        let before: Vec<_> = window.iter().cloned().collect();
        let seen = window.bars_seen();

        let stale = at((repeat_idx % count) as u32);
        prop_assert!(window.append(make_bar("IMB", stale, 11.0, 8.0, 9.0, 1)).is_err());

        let after: Vec<_> = window.iter().cloned().collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(window.bars_seen(), seen);
        prop_assert!(window.len() <= capacity);
    }

    #[test]
    fn established_range_is_fixed_for_the_session(
        later in prop::collection::vec((0.5f64..50.0, 0.1f64..5.0, 1i64..10_000), 1..40),
    ) {
        let mut detector = OpeningRangeDetector::new("IMB", 4, test_config().session, 10_000.0);
        for bar in opening_bars("IMB") {
            detector.observe(&bar);
        }
        let range = detector.range().cloned().unwrap();

        for (i, (low, width, volume)) in later.into_iter().enumerate() {
            let bar = make_bar("IMB", at(4 + i as u32), low + width, low, low, volume);
            detector.observe(&bar);
            prop_assert_eq!(detector.range(), Some(&range));
            prop_assert!(matches!(detector.state(), RangeState::Established(_)));
        }
    }

    #[test]
    fn flat_with_pending_never_trades(signal in signal_kind()) {
        let decision = decide(signal, &position(0, true));
        prop_assert!(decision.direction().is_none());
    }

    #[test]
    fn long_position_rules(net_qty in 1i64..1_000_000, pending in any::<bool>()) {
        let pos = position(net_qty, pending);
        prop_assert_eq!(decide(SignalKind::Buy, &pos), Decision::NoOp(NoOpReason::AlreadyLong));
        let sell = decide(SignalKind::Sell, &pos);
        prop_assert_eq!(sell, Decision::Reverse(Direction::Sell));
        prop_assert_eq!(order_quantity(&sell, &pos, 10), net_qty as u64 + 10);
    }

    #[test]
    fn short_position_rules(net_qty in -1_000_000i64..0, pending in any::<bool>()) {
        let pos = position(net_qty, pending);
        prop_assert_eq!(decide(SignalKind::Sell, &pos), Decision::NoOp(NoOpReason::AlreadyShort));
        prop_assert_eq!(decide(SignalKind::Buy, &pos), Decision::Reverse(Direction::Buy));
    }

    #[test]
    fn engine_never_submits_while_flat_and_pending(
        closes in prop::collection::vec((5.0f64..15.0, 1i64..5_000), 1..30),
    ) {
        let engine = Engine::new(test_config(), MockBroker::default());
        for bar in opening_bars("IMB") {
            engine.on_bar(bar);
        }
        let mut submitted = 0;
        for (i, (close, volume)) in closes.into_iter().enumerate() {
            let state = engine.position("IMB");
            let report = engine.on_bar(make_bar("IMB", at(4 + i as u32), close + 0.1, close - 0.1, close, volume));
            if state.is_flat() && state.has_pending_order {
                prop_assert!(report.outcome.intent().is_none());
            }
            if report.outcome.intent().is_some() {
                submitted += 1;
            }
        }
        // Nothing ever fills, so at most the first entry goes out.
        prop_assert!(submitted <= 1);
        prop_assert_eq!(engine.broker().intents().len(), submitted);
    }
}
