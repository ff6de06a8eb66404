use clap::Parser;
use orbtrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
