use anyhow::Context;
use clap::{Parser, Subcommand};
use monitor::{
    config::{Config, Credentials},
    dashboard::render_index,
    logging::{init_logging, LogFormat, LogLevel},
    run_lock::RunLock,
    runner::{notify_from_file, run_monitor, RunOptions},
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "trend_monitor", version, about = "Watches X for trending posts")]
struct Cli {
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value = "json", env = "LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scan cycle.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Recipient for alert emails. Falls back to NOTIFY_EMAIL.
        #[arg(long)]
        email: Option<String>,
        /// Write the alerts of this run to a JSON file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Publish a ranked dashboard into this directory.
        #[arg(long)]
        dashboard: Option<PathBuf>,
        #[arg(long)]
        metrics_file: Option<PathBuf>,
        /// Directory for state files with relative paths and the run lock.
        #[arg(long, default_value = ".")]
        state_dir: PathBuf,
    },
    /// Email a previously written alerts file.
    Notify {
        #[arg(long)]
        alerts: PathBuf,
        #[arg(long)]
        email: String,
    },
    /// Rebuild the dashboard history index.
    Index {
        #[arg(long, default_value = "docs")]
        docs: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level, cli.log_format) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let credentials = Credentials::from_env();
    match execute(cli.command, &credentials).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "trend_monitor failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command, credentials: &Credentials) -> anyhow::Result<ExitCode> {
    match command {
        Command::Run {
            config,
            email,
            output,
            dashboard,
            metrics_file,
            state_dir,
        } => {
            let _lock = RunLock::acquire(&state_dir).context("refusing to start")?;

            let config = Config::resolve(config.as_deref()).map(|c| c.with_state_dir(&state_dir));
            let recipient = email.or_else(|| credentials.notify_email.clone());
            let options = RunOptions {
                output,
                dashboard_dir: dashboard,
                metrics_file,
            };

            let report = run_monitor(config, credentials, recipient.as_deref(), &options).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serializing run report")?
            );

            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Notify { alerts, email } => {
            let sent = notify_from_file(&alerts, &email, credentials)
                .await
                .with_context(|| format!("sending alerts from {}", alerts.display()))?;
            info!(sent, "Notification step finished");
            Ok(ExitCode::SUCCESS)
        }
        Command::Index { docs } => {
            let path = render_index(&docs)
                .with_context(|| format!("rebuilding index in {}", docs.display()))?;
            info!(path = %path.display(), "Index regenerated");
            Ok(ExitCode::SUCCESS)
        }
    }
}
