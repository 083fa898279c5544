mod aggregate;
mod config;
mod reader;
mod record;
mod render;
mod report;
mod window;

use aggregate::RankingDedup;
use clap::Parser;
use config::AnalyzerConfig;
use reader::{Compression, ReadOptions};
use render::OutputFormat;
use report::Report;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use window::Windower;

/// Sessionize a load-balancer access log and report per-session hits,
/// average session duration, unique URL hits and the longest sessions.
#[derive(Parser, Debug)]
#[command(name = "sessionize", version, about)]
pub struct Cli {
    /// Access log to analyze (default: from config)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, default_value = "sessionize.toml")]
    config: PathBuf,

    /// Session window width in minutes (overrides config)
    #[arg(long)]
    window_minutes: Option<u32>,

    /// Rows shown per table, 0 for all (overrides config)
    #[arg(long)]
    limit: Option<usize>,

    /// Output format (overrides config)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Deduplication for the longest-session ranking (overrides config)
    #[arg(long, value_enum)]
    dedup: Option<RankingDedup>,

    /// Input compression (overrides config)
    #[arg(long, value_enum)]
    compression: Option<Compression>,

    /// Skip the first line of the input
    #[arg(long)]
    has_header: bool,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (dropped records, dedup counts)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut AnalyzerConfig) {
        if let Some(input) = &self.input {
            config.input.path = input.clone();
        }
        if let Some(compression) = self.compression {
            config.input.compression = compression;
        }
        if self.has_header {
            config.input.has_header = true;
        }
        if let Some(minutes) = self.window_minutes {
            config.session.window_minutes = minutes;
        }
        if let Some(dedup) = self.dedup {
            config.session.ranking_dedup = dedup;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(limit) = self.limit {
            config.output.display_limit = limit;
        }
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AnalyzerConfig::load(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.dry_run {
        println!("sessionize v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        print!("{}", toml::to_string(&config)?);
        return Ok(());
    }

    let windower = Windower::from_minutes(config.session.window_minutes)?;
    let opts = ReadOptions {
        compression: config.input.compression,
        has_header: config.input.has_header,
    };
    let (records, stats) = reader::read_path(&config.input.path, opts)?;
    tracing::debug!(?stats, "read stats");

    let report = Report::build(&records, &windower, config.session.ranking_dedup);
    match config.output.format {
        OutputFormat::Table => print!(
            "{}",
            render::render_tables(&report, config.output.display_limit)
        ),
        OutputFormat::Json => println!("{}", render::render_json(&report)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "sessionize",
            "access.log.zst",
            "--window-minutes",
            "30",
            "--limit",
            "0",
            "--format",
            "json",
            "--dedup",
            "session",
            "--has-header",
        ]);
        let mut config = AnalyzerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.input.path, PathBuf::from("access.log.zst"));
        assert!(config.input.has_header);
        assert_eq!(config.input.compression, Compression::Auto);
        assert_eq!(config.session.window_minutes, 30);
        assert_eq!(config.session.ranking_dedup, RankingDedup::Session);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.display_limit, 0);
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::parse_from(["sessionize"]);
        let mut config = AnalyzerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(cli.default_log_level(), "info");
    }

    #[test]
    fn missing_input_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "sessionize".to_string(),
            dir.path().join("missing.log").display().to_string(),
            "--config".to_string(),
            dir.path().join("none.toml").display().to_string(),
        ]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().starts_with("input unavailable"));
    }

    #[test]
    fn run_end_to_end_on_plain_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("access.log");
        std::fs::write(
            &log,
            "2015-07-22T10:00:00Z shop 1.2.3.4:80 - 0 0 0 200 200 0 1 \"GET /a HTTP/1.1\" \"-\" - -\n",
        )
        .unwrap();
        let cli = Cli::parse_from([
            "sessionize".to_string(),
            log.display().to_string(),
            "--config".to_string(),
            dir.path().join("none.toml").display().to_string(),
            "--format".to_string(),
            "json".to_string(),
        ]);
        run(&cli).unwrap();
    }
}
