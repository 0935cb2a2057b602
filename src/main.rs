//! `epsfrag` CLI - replace EPS labels with LaTeX via psfrag

mod cmd;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use epsfrag::{Config, Context, OutputFormats};

#[derive(Parser)]
#[command(name = "epsfrag")]
#[command(about = "Replace selected labels in an EPS figure with LaTeX using psfrag")]
#[command(version)]
struct Cli {
    /// .eps file in which to perform the substitutions
    #[arg(required_unless_present = "check_tools")]
    epsfile: Option<PathBuf>,

    /// .tex file holding the substitutions (default: subs-<name>.tex next to the figure)
    #[arg(short, long)]
    subs: Option<PathBuf>,

    /// Run without the interactive prompt
    #[arg(short = 'g', long)]
    nogui: bool,

    /// Add output format: pdf
    #[arg(long)]
    pdf: bool,

    /// Add output format: svg
    #[arg(long)]
    svg: bool,

    /// Add output format: png
    #[arg(long)]
    png: bool,

    /// Density of the png image in dpi
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    density: Option<u32>,

    /// Config file (default: ~/.config/epsfrag/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debugging level
    #[arg(long = "debug", value_enum, ignore_case = true, default_value = "info")]
    debug: DebugLevel,

    /// Report which external programs are available and exit
    #[arg(long)]
    check_tools: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum DebugLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl DebugLevel {
    fn level(self) -> Level {
        match self {
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(cli.debug.level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let mut formats = OutputFormats::from(&config.output);
    formats.pdf |= cli.pdf;
    formats.svg |= cli.svg;
    formats.png |= cli.png;
    if let Some(density) = cli.density {
        formats.density = density;
    }
    debug!("Output formats: {formats}");

    if cli.check_tools {
        return cmd::tools::cmd_check_tools(&config, &formats);
    }

    let ctx = Context::with_config(config);
    let epsfile = cli.epsfile.context("missing .eps file argument")?;
    debug!(".eps file path: {}", epsfile.display());

    if cli.nogui {
        cmd::replace::cmd_replace(ctx, &epsfile, cli.subs.as_deref(), formats).await
    } else {
        cmd::interactive::cmd_interactive(ctx, &epsfile, cli.subs.as_deref(), formats).await
    }
}
