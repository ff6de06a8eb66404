//! Engine configuration: defaults, loading from a [`ConfigPort`], validation.
//!
//! Everything here is read once at start-up and never changes during a run.

use chrono::NaiveTime;

use crate::domain::bar_window::DEFAULT_WINDOW_CAPACITY;
use crate::domain::error::EngineError;
use crate::domain::evaluator::{BarField, DEFAULT_AVG_VOLUME_BARS, EvaluatorConfig};
use crate::domain::intent::{
    BracketConfig, DEFAULT_CAPITAL_PER_TRADE, DEFAULT_EXPIRY_SECONDS, DEFAULT_TARGET_MULTIPLE,
    DEFAULT_TRAIL_STOP_BY,
};
use crate::domain::opening_range::{DEFAULT_OPENING_RANGE_BARS, SessionWindow};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub session: SessionWindow,
    pub opening_range_bars: usize,
    pub window_capacity: usize,
    /// Evaluate signals on every Nth accepted bar.
    pub evaluate_every: u64,
    pub evaluator: EvaluatorConfig,
    pub bracket: BracketConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            session: SessionWindow::new(
                NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
                NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            ),
            opening_range_bars: DEFAULT_OPENING_RANGE_BARS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            evaluate_every: 1,
            evaluator: EvaluatorConfig::default(),
            bracket: BracketConfig::default(),
        }
    }
}

/// Reads `[session]`, `[opening_range]`, `[signal]`, `[order]` and `[engine]`.
/// Missing keys fall back to [`EngineConfig::default`]; the result is validated.
pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
    let defaults = EngineConfig::default();

    let session = SessionWindow::new(
        parse_time(config, "session", "start", defaults.session.start)?,
        parse_time(config, "session", "end", defaults.session.end)?,
    );

    let opening_range_bars = non_negative(
        config,
        "opening_range",
        "bars",
        DEFAULT_OPENING_RANGE_BARS as i64,
    )? as usize;
    let window_capacity =
        non_negative(config, "engine", "window_capacity", DEFAULT_WINDOW_CAPACITY as i64)? as usize;
    let evaluate_every = non_negative(config, "engine", "evaluate_every", 1)? as u64;

    let evaluator = build_evaluator_config(config)?;

    let bracket = BracketConfig {
        capital_per_trade: config.get_double(
            "order",
            "capital_per_trade",
            DEFAULT_CAPITAL_PER_TRADE,
        ),
        target_multiple: config.get_double("order", "target_multiple", DEFAULT_TARGET_MULTIPLE),
        trail_stop_by: parse_trail_stop(config)?,
        expiry_seconds: non_negative(
            config,
            "order",
            "expiry_seconds",
            DEFAULT_EXPIRY_SECONDS as i64,
        )? as u64,
    };

    let engine_config = EngineConfig {
        session,
        opening_range_bars,
        window_capacity,
        evaluate_every,
        evaluator,
        bracket,
    };
    validate_engine_config(&engine_config)?;
    Ok(engine_config)
}

fn build_evaluator_config(config: &dyn ConfigPort) -> Result<EvaluatorConfig, EngineError> {
    let kind = config
        .get_string("signal", "kind")
        .unwrap_or_else(|| "orb".to_string());

    match kind.trim().to_lowercase().as_str() {
        "orb" | "opening_range" | "breakout" => Ok(EvaluatorConfig::OpeningRangeBreakout {
            avg_volume_bars: non_negative(
                config,
                "signal",
                "avg_volume_bars",
                DEFAULT_AVG_VOLUME_BARS as i64,
            )? as usize,
        }),
        "crossover" => Ok(EvaluatorConfig::Crossover {
            fast: non_negative(config, "signal", "fast", 5)? as usize,
            slow: non_negative(config, "signal", "slow", 10)? as usize,
        }),
        "threshold" => {
            let field = match config.get_string("signal", "field") {
                Some(raw) => raw
                    .parse::<BarField>()
                    .map_err(|reason| EngineError::config_invalid("signal", "field", reason))?,
                None => BarField::Close,
            };
            Ok(EvaluatorConfig::Threshold {
                field,
                buy_below: required_double(config, "signal", "buy_below")?,
                sell_above: required_double(config, "signal", "sell_above")?,
            })
        }
        other => Err(EngineError::config_invalid(
            "signal",
            "kind",
            format!("unknown signal kind {other:?}, expected orb, crossover or threshold"),
        )),
    }
}

pub fn validate_engine_config(config: &EngineConfig) -> Result<(), EngineError> {
    if config.session.start >= config.session.end {
        return Err(EngineError::config_invalid(
            "session",
            "start",
            "session start must be before session end",
        ));
    }
    if config.opening_range_bars == 0 {
        return Err(EngineError::config_invalid(
            "opening_range",
            "bars",
            "bars must be at least 1",
        ));
    }
    if config.evaluate_every == 0 {
        return Err(EngineError::config_invalid(
            "engine",
            "evaluate_every",
            "evaluate_every must be at least 1",
        ));
    }

    let needed = match &config.evaluator {
        EvaluatorConfig::OpeningRangeBreakout { avg_volume_bars } => {
            if *avg_volume_bars == 0 {
                return Err(EngineError::config_invalid(
                    "signal",
                    "avg_volume_bars",
                    "avg_volume_bars must be at least 1",
                ));
            }
            config.opening_range_bars.max(*avg_volume_bars)
        }
        EvaluatorConfig::Crossover { fast, slow } => {
            if *fast == 0 || fast >= slow {
                return Err(EngineError::config_invalid(
                    "signal",
                    "fast",
                    "fast must be at least 1 and below slow",
                ));
            }
            slow + 1
        }
        EvaluatorConfig::Threshold {
            buy_below,
            sell_above,
            ..
        } => {
            if buy_below > sell_above {
                return Err(EngineError::config_invalid(
                    "signal",
                    "buy_below",
                    "buy_below must not exceed sell_above",
                ));
            }
            1
        }
    };
    if config.window_capacity < needed {
        return Err(EngineError::config_invalid(
            "engine",
            "window_capacity",
            format!("window_capacity must hold at least {needed} bars"),
        ));
    }

    let bracket = &config.bracket;
    if !(bracket.capital_per_trade > 0.0) {
        return Err(EngineError::config_invalid(
            "order",
            "capital_per_trade",
            "capital_per_trade must be positive",
        ));
    }
    if !(bracket.target_multiple > 0.0) {
        return Err(EngineError::config_invalid(
            "order",
            "target_multiple",
            "target_multiple must be positive",
        ));
    }
    if bracket.expiry_seconds == 0 {
        return Err(EngineError::config_invalid(
            "order",
            "expiry_seconds",
            "expiry_seconds must be positive",
        ));
    }
    Ok(())
}

fn parse_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, EngineError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => {
            let raw = raw.trim();
            NaiveTime::parse_from_str(raw, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
                .map_err(|_| {
                    EngineError::config_invalid(
                        section,
                        key,
                        format!("invalid {key} time {raw:?}, expected HH:MM"),
                    )
                })
        }
    }
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, EngineError> {
    let value = config.get_int(section, key, default);
    if value < 0 {
        return Err(EngineError::config_invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(value)
}

fn required_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, EngineError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| EngineError::config_invalid(section, key, format!("{raw:?} is not a number")))
}

/// Missing key: the default distance. Empty, `none`, `off` or `0`: no trailing stop.
fn parse_trail_stop(config: &dyn ConfigPort) -> Result<Option<f64>, EngineError> {
    let Some(raw) = config.get_string("order", "trail_stop_by") else {
        return Ok(Some(DEFAULT_TRAIL_STOP_BY));
    };
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|_| {
        EngineError::config_invalid("order", "trail_stop_by", format!("{raw:?} is not a number"))
    })?;
    if value < 0.0 {
        return Err(EngineError::config_invalid(
            "order",
            "trail_stop_by",
            "trail_stop_by must be non-negative",
        ));
    }
    Ok(if value == 0.0 { None } else { Some(value) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn load(content: &str) -> Result<EngineConfig, EngineError> {
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        build_engine_config(&adapter)
    }

    fn invalid_key(result: Result<EngineConfig, EngineError>) -> String {
        match result {
            Err(EngineError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = load("[session]\n").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn full_config() {
        let config = load(
            r#"
[session]
start = 08:00
end = 16:30:00

[opening_range]
bars = 3

[signal]
kind = orb
avg_volume_bars = 5

[order]
capital_per_trade = 25000
target_multiple = 1.5
trail_stop_by = 0.25
expiry_seconds = 240

[engine]
window_capacity = 50
evaluate_every = 10
"#,
        )
        .unwrap();
        assert_eq!(config.session.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(config.session.end, NaiveTime::from_hms_opt(16, 30, 0).unwrap());
        assert_eq!(config.opening_range_bars, 3);
        assert_eq!(
            config.evaluator,
            EvaluatorConfig::OpeningRangeBreakout { avg_volume_bars: 5 }
        );
        assert_eq!(config.bracket.capital_per_trade, 25_000.0);
        assert_eq!(config.bracket.target_multiple, 1.5);
        assert_eq!(config.bracket.trail_stop_by, Some(0.25));
        assert_eq!(config.bracket.expiry_seconds, 240);
        assert_eq!(config.window_capacity, 50);
        assert_eq!(config.evaluate_every, 10);
    }

    #[test]
    fn crossover_and_threshold_kinds() {
        let config = load("[signal]\nkind = crossover\nfast = 3\nslow = 8\n").unwrap();
        assert_eq!(config.evaluator, EvaluatorConfig::Crossover { fast: 3, slow: 8 });

        let config =
            load("[signal]\nkind = threshold\nfield = close\nbuy_below = 95\nsell_above = 105\n")
                .unwrap();
        assert_eq!(
            config.evaluator,
            EvaluatorConfig::Threshold {
                field: BarField::Close,
                buy_below: 95.0,
                sell_above: 105.0
            }
        );
    }

    #[test]
    fn threshold_requires_levels() {
        let err = load("[signal]\nkind = threshold\nbuy_below = 95\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { ref key, .. } if key == "sell_above"));
    }

    #[test]
    fn trail_stop_can_be_disabled() {
        let config = load("[order]\ntrail_stop_by = 0\n").unwrap();
        assert_eq!(config.bracket.trail_stop_by, None);
        let config = load("[order]\ntrail_stop_by = none\n").unwrap();
        assert_eq!(config.bracket.trail_stop_by, None);
    }

    #[test]
    fn rejects_inverted_session() {
        let key = invalid_key(load("[session]\nstart = 16:00\nend = 09:30\n"));
        assert_eq!(key, "start");
    }

    #[test]
    fn rejects_bad_time() {
        let key = invalid_key(load("[session]\nstart = 9am\n"));
        assert_eq!(key, "start");
    }

    #[test]
    fn rejects_zero_opening_range_bars() {
        assert_eq!(invalid_key(load("[opening_range]\nbars = 0\n")), "bars");
    }

    #[test]
    fn rejects_zero_averaging_window() {
        assert_eq!(
            invalid_key(load("[signal]\navg_volume_bars = 0\n")),
            "avg_volume_bars"
        );
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        assert_eq!(
            invalid_key(load("[signal]\nkind = crossover\nfast = 10\nslow = 10\n")),
            "fast"
        );
    }

    #[test]
    fn rejects_window_too_small() {
        assert_eq!(
            invalid_key(load("[opening_range]\nbars = 6\n[engine]\nwindow_capacity = 4\n")),
            "window_capacity"
        );
    }

    #[test]
    fn rejects_non_positive_capital() {
        assert_eq!(
            invalid_key(load("[order]\ncapital_per_trade = 0\n")),
            "capital_per_trade"
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(invalid_key(load("[signal]\nkind = macd\n")), "kind");
    }

    #[test]
    fn rejects_negative_values() {
        assert_eq!(invalid_key(load("[order]\nexpiry_seconds = -5\n")), "expiry_seconds");
        assert_eq!(invalid_key(load("[order]\ntrail_stop_by = -1\n")), "trail_stop_by");
    }
}
