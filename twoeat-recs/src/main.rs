//! 2Eat recommendation client (twoeat-recs) - Main entry point
//!
//! Interactive driver for the recommendation controller: boots a session for
//! the given location, prints the current card and reads swipe commands from
//! stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use twoeat_common::config::RecsConfig;
use twoeat_common::events::RecsEvent;
use twoeat_common::{Candidate, Location};
use twoeat_recs::transport::{EnvTokenProvider, HttpRecsApi, StaticTokenProvider, TokenProvider};
use twoeat_recs::{BootOutcome, RecsController, SubmitOutcome};

/// Command-line arguments for twoeat-recs
#[derive(Parser, Debug)]
#[command(name = "twoeat-recs")]
#[command(about = "Swipe recommendation client for 2Eat")]
#[command(version)]
struct Args {
    /// Latitude of the search location
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the search location
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bearer token; read from TWOEAT_ID_TOKEN on every request when omitted
    #[arg(long)]
    token: Option<String>,
}

const HELP: &str = "commands: like | pass | star | show | finalize <id> | restart | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = RecsConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("twoeat_recs={0},twoeat_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting 2Eat recommendation client against {}", config.api.base_url);

    let location = Location::new(args.lat, args.lng).context("Invalid location")?;

    let tokens: Arc<dyn TokenProvider> = match args.token {
        Some(token) => Arc::new(StaticTokenProvider::new(token)),
        None => Arc::new(EnvTokenProvider::default()),
    };
    let api = HttpRecsApi::new(config.api.clone(), tokens).context("Failed to build HTTP client")?;
    let controller = RecsController::new(Arc::new(api), config.feed.clone());

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RecsEvent::MatchPromptDue { like_count, .. }) => {
                    println!("** Time to pick a winner ({} likes). Use: finalize <id>", like_count);
                }
                Ok(RecsEvent::RecoveryAttempted { reason, .. }) => {
                    println!("(refreshing session: {:?})", reason);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    match controller.boot(location).await {
        Ok(BootOutcome::Started { session_id }) => info!("Session {} ready", session_id),
        Ok(BootOutcome::AlreadyBooted) => {}
        Err(e) => println!("Could not start a session: {} (try `restart`)", e),
    }

    println!("{}", HELP);
    show(&controller).await;

    tokio::select! {
        result = command_loop(&controller) => result?,
        _ = shutdown_signal() => {}
    }

    controller.shutdown();
    info!("Client shutdown complete");
    Ok(())
}

/// Read and execute commands until `quit` or end of input
async fn command_loop(controller: &RecsController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("like"), _) => report(controller.like().await),
            (Some("pass"), _) => report(controller.pass().await),
            (Some("star"), _) => report(controller.super_star().await),
            (Some("show"), _) => {}
            (Some("finalize"), Some(winner_id)) => match controller.finalize(winner_id).await {
                Ok(winner) => {
                    println!("Winner: {}", describe(&winner));
                    return Ok(());
                }
                Err(e) => println!("Finalize failed: {}", e),
            },
            (Some("restart"), _) => {
                if let Err(e) = controller.restart().await {
                    println!("Restart failed: {}", e);
                }
            }
            (Some("quit"), _) | (Some("exit"), _) => return Ok(()),
            (None, _) => continue,
            _ => {
                println!("{}", HELP);
                continue;
            }
        }
        show(controller).await;
    }
    Ok(())
}

fn report(outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Submitted {
            delivered: false,
            candidate,
            ..
        } => warn!("Swipe on {} was not delivered", candidate.id),
        SubmitOutcome::Submitted { .. } => {}
        SubmitOutcome::Ignored(reason) => println!("(ignored: {:?})", reason),
    }
}

async fn show(controller: &RecsController) {
    let snapshot = controller.snapshot().await;
    match &snapshot.current {
        Some(candidate) => println!(
            "[{} queued, {} likes] {}",
            snapshot.queue.len(),
            snapshot.like_count,
            describe(candidate)
        ),
        None if snapshot.loading => println!("(loading...)"),
        None => println!("(no suggestions)"),
    }
    if let Some(err) = &snapshot.last_error {
        println!("error: {}", err);
    }
    if snapshot.match_prompt_due && !snapshot.top3_candidate_ids.is_empty() {
        println!("top picks: {}", snapshot.top3_candidate_ids.join(", "));
    }
}

fn describe(candidate: &Candidate) -> String {
    let mut line = format!("{} ({})", candidate.name, candidate.id);
    if let Some(distance) = candidate.distance_km {
        line.push_str(&format!(" - {:.1} km", distance));
    }
    if candidate.price_level().is_some() {
        line.push_str(&format!(" - {}", candidate.budget_stars()));
    }
    if let Some(address) = &candidate.address {
        line.push_str(&format!(" - {}", address));
    }
    line
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
