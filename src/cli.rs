use crate::cancel::CancellationToken;
use crate::config::ConfigFile;
use crate::git::LocalGit;
use crate::hosting::GhCli;
use crate::model::TimeWindow;
use crate::pipeline::{Pipeline, RunRequest};
use crate::render::{render_json, render_text};
use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "dev-report")]
#[command(about = "Generate daily/weekly/monthly dev activity reports across local git repositories")]
#[command(version)]
#[command(group(ArgGroup::new("window").args(["daily", "weekly", "monthly"])))]
pub struct Cli {
    #[arg(default_value = ".", help = "Directory to scan for git repos")]
    pub path: PathBuf,

    #[arg(long, help = "Only show last 24 hours")]
    pub daily: bool,

    #[arg(long, help = "Only show last 7 days")]
    pub weekly: bool,

    #[arg(long, help = "Only show last 30 days")]
    pub monthly: bool,

    #[arg(long, help = "Path to config file (default: ~/.config/dev-report/config.toml)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,

    #[arg(long, help = "Skip pull request stats")]
    pub no_prs: bool,

    #[arg(long, value_parser = humantime::parse_duration, help = "Timeout for each gh invocation (e.g. 30s, 2m)")]
    pub pr_timeout: Option<Duration>,

    #[arg(long, help = "Number of repositories analyzed in parallel")]
    pub jobs: Option<usize>,

    #[arg(short, long, action = ArgAction::Count, help = "More log output (-v info, -vv debug)")]
    pub verbose: u8,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn windows(&self) -> Vec<TimeWindow> {
        if self.daily {
            vec![TimeWindow::Day]
        } else if self.weekly {
            vec![TimeWindow::Week]
        } else if self.monthly {
            vec![TimeWindow::Month]
        } else {
            TimeWindow::ALL.to_vec()
        }
    }

    pub fn execute(self) -> Result<()> {
        init_tracing(self.log_json, self.verbose);

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => ConfigFile::default_path().context("Could not determine config directory")?,
        };
        let config = ConfigFile::load(&config_path)?;

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
            tracing::debug!(error = %e, "could not install interrupt handler");
        }

        let request = RunRequest {
            windows: self.windows(),
            config,
            jobs: self.jobs,
            pr_timeout: self.pr_timeout,
            fetch_prs: !self.no_prs,
            progress: console::Term::stderr().is_term(),
            ..RunRequest::new(&self.path)
        };

        let history = LocalGit;
        let hosting = GhCli::default();
        let report = Pipeline::new(&history, &hosting, cancel)
            .run(request)
            .context("Failed to generate report")?;

        let mut stdout = std::io::stdout().lock();
        if self.json {
            render_json(&report, &mut stdout)?;
        } else {
            render_text(&report, &mut stdout)?;
        }
        Ok(())
    }
}

/// `RUST_LOG` wins; otherwise warnings only, raised by `-v`.
pub fn init_tracing(json: bool, verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
