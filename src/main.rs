mod cli;
mod commands;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Command};
use converge::{Host, LiveCommandRunner, OsFs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(parse_log_level(&cli.log_level)?)
        .format_timestamp(None)
        .init();

    let runner = LiveCommandRunner;
    let fs = OsFs;
    let host = Host::new(&runner, &fs);

    match cli.command {
        Command::Diff(args) => commands::diff::run(&host, &cli.config, &args),
        Command::Apply(args) => commands::apply::run(&host, &cli.config, &args),
        Command::Dump(args) => commands::dump::run(&host, &args),
    }
}

fn parse_log_level(level: &str) -> Result<log::LevelFilter> {
    match level.to_lowercase().as_str() {
        "debug" => Ok(log::LevelFilter::Debug),
        "info" => Ok(log::LevelFilter::Info),
        "warn" => Ok(log::LevelFilter::Warn),
        "error" => Ok(log::LevelFilter::Error),
        other => bail!("invalid log level: {other}"),
    }
}
