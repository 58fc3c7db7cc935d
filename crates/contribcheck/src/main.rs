use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use contribcheck_core::TracingReporter;
use contribcheck_core::classify::Thresholds;
use contribcheck_core::lookup::{ClientOptions, ContribClient};
use contribcheck_core::pipeline::{
    DEFAULT_LINE_DELAY, InputSource, InputType, Processor, RunSummary,
};
use contribcheck_core::report::TsvWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "contribcheck",
    version,
    about = "Audit MassMessage delivery lists against last-edit activity on their wikis"
)]
struct Cli {
    /// Delivery list files containing {{target}} templates.
    #[arg(value_name = "INPUT_FILE")]
    input_file: Vec<PathBuf>,
    #[arg(
        long,
        default_value = "mediawiki",
        value_name = "TYPE",
        help = "Type of the input files (only mediawiki is supported)"
    )]
    input_type: String,
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Write the TSV report here instead of stdout"
    )]
    output: Option<PathBuf>,
    #[arg(
        short = 's',
        long = "additional-site",
        value_name = "HOST",
        help = "Additional site to check every username against, e.g. \"wikidata.org\""
    )]
    additional_site: Vec<String>,
    #[arg(
        long,
        value_name = "YEAR",
        help = "Last edits in or after this year are marked active"
    )]
    threshold_active: Option<i32>,
    #[arg(
        long,
        value_name = "YEAR",
        help = "Last edits in or after this year, but before the active year, are marked inactive"
    )]
    threshold_inactive: Option<i32>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Rejecting an unsupported input type happens before any file is read.
    let input_type = InputType::parse(&cli.input_type)?;
    let sources = read_sources(&cli.input_file)?;

    let client = ContribClient::new(ClientOptions::from_env())?;
    let thresholds = Thresholds::new(cli.threshold_active, cli.threshold_inactive);
    let reporter = TracingReporter;
    let mut processor = Processor::new(&client, thresholds, line_delay_from_env(), &reporter);

    let summary = match &cli.output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = TsvWriter::new(file)?;
            processor.run(input_type, &sources, &mut writer, &cli.additional_site)?
        }
        None => {
            let mut writer = TsvWriter::new(io::stdout().lock())?;
            processor.run(input_type, &sources, &mut writer, &cli.additional_site)?
        }
    };

    report_summary(&summary, cli.output.as_deref().map(|path| path.display().to_string()));
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn report_summary(summary: &RunSummary, destination: Option<String>) {
    tracing::info!(
        "done: {} unique usernames on {} sites ({}) across {} rows from {} lines written to {}",
        summary.usernames,
        summary.sites.len(),
        summary.sites.join(", "),
        summary.records,
        summary.lines,
        destination.unwrap_or_else(|| "stdout".to_string())
    );
}

fn read_sources(paths: &[PathBuf]) -> Result<Vec<InputSource>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        sources.push(InputSource::new(path.display().to_string(), content));
    }
    Ok(sources)
}

fn line_delay_from_env() -> Duration {
    line_delay_from(env::var("CONTRIBCHECK_LINE_DELAY_MS").ok().as_deref())
}

fn line_delay_from(value: Option<&str>) -> Duration {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_LINE_DELAY)
}
