mod cli;
mod config;
mod driver;
mod error;
mod omc;
mod printer;
mod settings;

use anyhow::{Context, Result};
use config::Config;
use driver::RunPlan;
use omc::session::{OmcSession, SessionOptions};
use printer::SummaryPrinter;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr; stdout carries only the summary.
    let default_filter = if args.verbose { "omsim=debug" } else { "omsim=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Config::load();
    debug!(config = %cfg.config_path.display(), "configuration loaded");

    let plan = RunPlan::resolve(&args, &cfg)?;
    debug!(?plan, "run resolved");

    // The engine inherits the working directory, so relative loadFile paths
    // resolve against it.
    plan.enter_workdir()?;
    plan.check_files()?;

    let session_opts = SessionOptions::from_config(&cfg, args.omc.as_deref());
    let mut session = OmcSession::start(&session_opts)
        .await
        .context("could not open an engine session")?;
    let outcome = driver::execute(&mut session, &plan).await;
    session.quit().await;
    let summary = outcome?;

    SummaryPrinter { format: args.format }
        .print(&summary)
        .context("writing simulation summary")?;
    Ok(())
}
