//! CLI integration tests: real INI and CSV files on disk.

mod common;

use clap::Parser;
use orbtrader::cli::{self, Cli};
use orbtrader::domain::config::build_engine_config;
use orbtrader::adapters::file_config_adapter::FileConfigAdapter;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

const BARS: &str = "timestamp,open,high,low,close,volume
2024-01-15 09:30:00,9.5,10.0,9.0,9.5,100
2024-01-15 09:31:00,9.3,9.5,9.2,9.4,100
2024-01-15 09:32:00,9.4,9.6,9.3,9.5,50
2024-01-15 09:33:00,9.2,9.4,9.1,9.2,50
2024-01-15 09:34:00,10.2,10.6,10.1,10.5,200
2024-01-15 09:35:00,10.5,10.7,10.2,10.6,1000
2024-01-15 09:36:00,8.9,9.0,8.0,8.5,1000
";

fn same_code(actual: ExitCode, expected: u8) -> bool {
    format!("{actual:?}") == format!("{:?}", ExitCode::from(expected))
}

fn write_ini(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("orb.ini");
    let content = format!(
        "[session]\nstart = 09:30\nend = 16:00\n\n[data]\ndir = {}\nsymbols = IMB\n\n{extra}",
        dir.join("bars").display()
    );
    fs::write(&path, content).unwrap();
    path
}

fn setup(extra: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("bars")).unwrap();
    fs::write(dir.path().join("bars").join("IMB.csv"), BARS).unwrap();
    fs::write(
        dir.path().join("bars").join("XOM.csv"),
        "timestamp,open,high,low,close,volume\n",
    )
    .unwrap();
    let ini = write_ini(dir.path(), extra);
    (dir, ini)
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["orbtrader"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn run_writes_decision_log() {
    let (dir, ini) = setup("");
    let out = dir.path().join("decisions.csv");
    let code = run(&[
        "run",
        "--config",
        ini.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(same_code(code, 0));

    let log = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("symbol,timestamp,signal,outcome"));
    assert!(lines[5].starts_with("IMB,2024-01-15 09:34:00,BUY,entered,BUY,1052,10,9,11,"));
    assert!(lines[6].contains(",already-long,"));
    assert!(lines[7].contains(",SELL,reversed,SELL,2104,9,10,8,"));
}

#[test]
fn run_with_symbol_override() {
    let (dir, ini) = setup("");
    let out = dir.path().join("xom.csv");
    let code = run(&[
        "run",
        "--config",
        ini.to_str().unwrap(),
        "--symbol",
        "XOM",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(same_code(code, 0));
    assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 1);
}

#[test]
fn run_with_missing_symbol_file_is_data_error() {
    let (dir, ini) = setup("");
    let out = dir.path().join("none.csv");
    let code = run(&[
        "run",
        "--config",
        ini.to_str().unwrap(),
        "--symbol",
        "NOPE",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(same_code(code, 3));
}

#[test]
fn validate_accepts_good_config() {
    let (_dir, ini) = setup("[signal]\nkind = crossover\nfast = 3\nslow = 9\n");
    assert!(same_code(run(&["validate", "--config", ini.to_str().unwrap()]), 0));

    let adapter = FileConfigAdapter::from_file(&ini).unwrap();
    let config = build_engine_config(&adapter).unwrap();
    assert_eq!(config.evaluator.build().name(), "crossover");
}

#[test]
fn validate_rejects_bad_config() {
    let (_dir, ini) = setup("[order]\ncapital_per_trade = -1\n");
    assert!(same_code(run(&["validate", "--config", ini.to_str().unwrap()]), 2));
}

#[test]
fn validate_missing_file_is_config_error() {
    assert!(same_code(
        run(&["validate", "--config", "/nonexistent/orb.ini"]),
        2
    ));
}

#[test]
fn list_symbols_succeeds() {
    let (_dir, ini) = setup("");
    assert!(same_code(run(&["list-symbols", "--config", ini.to_str().unwrap()]), 0));
}

#[test]
fn list_symbols_without_data_dir_fails() {
    let dir = TempDir::new().unwrap();
    let ini = dir.path().join("orb.ini");
    fs::write(&ini, "[session]\nstart = 09:30\n").unwrap();
    assert!(same_code(run(&["list-symbols", "--config", ini.to_str().unwrap()]), 2));
}
