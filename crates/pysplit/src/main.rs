use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use pysplit::{Config, SplitReport, Splitter, config::ConfigOverrides};

#[derive(Parser, Debug)]
#[command(name = "pysplit", version, about, long_about = None)]
struct Cli {
    /// Python file to split
    input: PathBuf,

    /// Directory to create the package in (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file, applied over user and project configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// Python version the input targets, such as py310
    #[arg(long, value_name = "VERSION")]
    target_version: Option<String>,

    /// Ignore `# pragma: newfile(...)` markers
    #[arg(long)]
    no_pragmas: bool,

    /// Module name for code that belongs to no definition
    #[arg(long, value_name = "NAME")]
    leftover_name: Option<String>,
}

impl Cli {
    fn level_filter(&self) -> Option<LevelFilter> {
        if self.quiet {
            return Some(LevelFilter::Error);
        }
        match self.verbose {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            _ => Some(LevelFilter::Trace),
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            output_dir: self.output_dir.clone(),
            leftover_module: self.leftover_name.clone(),
            honor_pragmas: self.no_pragmas.then_some(false),
            target_version: self.target_version.clone(),
            ..ConfigOverrides::default()
        }
    }
}

fn init_logger(level: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).format_target(false).init();
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.level_filter());

    match run(&cli) {
        Ok(report) => {
            if !cli.quiet {
                print_report(&report);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SplitReport> {
    let mut config = Config::load(&cli.input, cli.config.as_deref())
        .context("Failed to load configuration")?;
    config.apply(cli.overrides());

    let splitter = Splitter::new(config)?;
    splitter
        .split_file(&cli.input)
        .with_context(|| format!("Failed to split {}", cli.input.display()))
}

#[allow(clippy::print_stdout)]
fn print_report(report: &SplitReport) {
    println!(
        "Wrote {} files to {}",
        report.files_written.len(),
        report.package_dir.display()
    );
    if !report.warnings.is_empty() {
        println!("{} warning(s) reported", report.warnings.len());
    }
    if report.dropped_imports > 0 {
        println!("Left out {} unused import(s)", report.dropped_imports);
    }
}
