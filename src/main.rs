use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use pr_badge::badge::BadgeState;
use pr_badge::platform::{self, Platform};
use pr_badge::scheduler::{BadgeCycle, Cycle, Scheduler};
use pr_badge::{messages, options, report};

/// pr-badge: keeps an eye on the open GitHub pull requests you are involved in
/// and summarizes them as a colored count badge.
#[derive(Parser, Debug)]
#[command(name = "pr-badge", version, about)]
struct Cli {
    /// Keep credentials in memory (seeded from GITHUB_USER / GITHUB_TOKEN)
    #[arg(long, global = true)]
    headless: bool,

    /// Config file location (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the badge every minute; reads control messages from stdin
    Watch {
        /// Also print the pull request list after every refresh
        #[arg(long)]
        show_pull_requests: bool,
    },
    /// Refresh the badge once and print it
    Badge,
    /// List open pull requests grouped by repository
    List {
        /// Write markdown to this file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Open a pull request from the list in the browser
    Open {
        /// `12`, `#12`, or `repo#12` when the number exists in several repositories
        target: String,
    },
    /// Validate a token and save it
    Configure {
        #[arg(long)]
        token: String,

        /// Only used together with --no-verify; otherwise taken from the token owner
        #[arg(long)]
        username: Option<String>,

        /// Save without checking the token against the API
        #[arg(long)]
        no_verify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let platform = platform::select(cli.headless, cli.config);
    debug!(platform = platform.name(), "platform selected");

    match cli.command.unwrap_or(Command::Watch {
        show_pull_requests: false,
    }) {
        Command::Watch { show_pull_requests } => watch(platform, show_pull_requests).await?,
        Command::Badge => {
            let snapshot = BadgeCycle::new(platform.clone()).run().await;
            platform.set_badge(&snapshot.badge).await;
            println!("{}", serde_json::to_string(&snapshot.badge)?);
        }
        Command::List { output } => {
            let snapshot = BadgeCycle::new(platform.clone())
                .run()
                .instrument(info_span!("list"))
                .await;
            report::output(&snapshot, output.as_deref())?;
        }
        Command::Open { target } => {
            let snapshot = BadgeCycle::new(platform.clone()).run().await;
            let pr = snapshot.aggregation.grouped.find(&target)?;
            if pr.url.is_empty() {
                return Err(format!("Pull request {} has no web URL", pr.number).into());
            }
            info!(url = %pr.url, "opening pull request");
            platform.open_tab(&pr.url).await?;
        }
        Command::Configure {
            token,
            username,
            no_verify,
        } => {
            let saved =
                options::configure(platform.as_ref(), &token, username.as_deref(), !no_verify).await?;
            eprintln!("Saved configuration for {}", saved.username);
            println!("{}", messages::Message::ConfigUpdated.to_line());
        }
    }

    Ok(())
}

/// Background mode: run the scheduler until Ctrl-C, answering stdin messages meanwhile.
async fn watch(platform: Arc<dyn Platform>, show_pull_requests: bool) -> Result<(), Box<dyn std::error::Error>> {
    let period = platform.settings().refresh_period();
    let cycle = Arc::new(BadgeCycle::new(platform.clone()));
    let mut scheduler = Scheduler::new(cycle, platform.clone(), period);

    platform.set_badge(&BadgeState::initial()).await;

    if show_pull_requests {
        let mut snapshots = scheduler.subscribe();
        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if let Err(e) = report::output(&snapshot, None) {
                        tracing::warn!(error = %e, "could not render pull requests");
                    }
                }
            }
        });
    }

    scheduler.start().await;

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = messages::serve(&mut scheduler, stdin, tokio::io::stdout()) => {
            result?;
            info!("stdin closed, running until Ctrl-C");
            tokio::signal::ctrl_c().await?;
        }
        result = tokio::signal::ctrl_c() => result?,
    }

    scheduler.stop().await;
    info!("done");
    Ok(())
}
