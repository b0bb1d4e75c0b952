use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use pharmasync_core::{
    open_store, parse_tour_date, Config, CoreError, ExecutionContext, JsonFileSource,
    QueryWindow, RunMode, SalesforceSource, Source,
};

mod logging;
mod progress;

use logging::LogLevel;
use progress::BarProgress;

#[derive(Parser)]
#[command(
    name = "pharmasync",
    version,
    about = "Sync CRM-flagged pharmacies into the outlet store"
)]
struct Cli {
    /// Tour date, DD.MM.YYYY
    #[arg(value_parser = parse_date)]
    tour_date: NaiveDate,

    /// Log level
    #[arg(short, long, value_enum, ignore_case = true)]
    verbose: Option<LogLevel>,

    /// Append log output to FILE
    #[arg(short, long, value_name = "FILE")]
    logging: Option<PathBuf>,

    /// No progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Export active pharmacies as CSV after the run
    #[arg(short, long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Commit the changes (default is a dry run)
    #[arg(long)]
    apply: bool,

    /// Config file (default: ~/.config/pharmasync/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replay a saved query response instead of querying Salesforce
    #[arg(long, value_name = "FILE")]
    from_file: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_tour_date(s).map_err(|e| format!("expected DD.MM.YYYY: {e}"))
}

fn run(cli: Cli) -> Result<(), CoreError> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let level = cli
        .verbose
        .or_else(|| LogLevel::parse(&config.logging.level))
        .unwrap_or_default();
    let log_file = match cli.logging.clone().or_else(|| config.logging.file.clone()) {
        Some(path) => path,
        None => logging::default_log_file()?,
    };
    logging::init(&log_file, level)?;

    let window = QueryWindow::around(cli.tour_date);
    let mode = RunMode::from_apply_flag(cli.apply);
    let mut ctx = ExecutionContext::new(config, window, mode);
    if let Some(path) = &cli.outfile {
        ctx = ctx.with_export(path);
    }

    let source: Box<dyn Source> = match &cli.from_file {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(SalesforceSource::new(ctx.config.salesforce.clone())?),
    };
    let mut store = open_store(&ctx.config.database)?;
    let progress = BarProgress::new(cli.quiet, mode);

    let outcome = ctx.execute(source.as_ref(), &mut store, &progress)?;

    if !cli.quiet {
        eprintln!("{}", outcome.report.message());
        if mode == RunMode::DryRun {
            eprintln!("Dry run: no changes were committed. Use --apply to persist.");
        }
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "run failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
