//! Queue calling console
//!
//! Runs a queue calling participant in one process over an in-process bus.
//!
//! - `DISPLAY` mode (default) hosts the authority plus one operator agent
//! - `CONTROL` mode runs only the operator agent, which will sit at
//!   "not connected" because nothing in the process answers it
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin queue-calling
//! cargo run --bin queue-calling -- mode=CONTROL
//! RUST_LOG=debug QUEUE_STATIONS=3 cargo run --bin queue-calling
//! ```

use anyhow::Context;
use queue_calling::announcer::TracingAnnouncer;
use queue_calling::bootstrap::Mode;
use queue_calling::config::Config;
use queue_calling::console::{self, Command};
use queue_calling::node::{AgentNode, spawn_agent, spawn_authority};
use queue_relay_runtime::BroadcastBus;
use queue_relay_runtime::metrics::MetricsRecorder;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,queue_calling=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(argument) = std::env::args().nth(1) {
        config.mode = Mode::from_query(&argument);
    }
    config.validate().context("invalid configuration")?;
    tracing::info!(
        mode = %config.mode,
        stations = config.stations,
        poll_interval_ms = config.poll_interval.as_millis(),
        "Configuration loaded"
    );

    let mut metrics = MetricsRecorder::new();
    metrics.start().context("failed to start metrics")?;

    let bus = Arc::new(BroadcastBus::new(config.bus_capacity));

    let authority = if config.mode.hosts_authority() {
        Some(spawn_authority(bus.clone(), &config, Arc::new(TracingAnnouncer))?)
    } else {
        None
    };
    let agent = spawn_agent(bus, &config, config.control_station()).await?;

    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(input) = input else { break };
        if input.trim().is_empty() {
            continue;
        }

        match input.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => {
                run(command, &agent, authority.as_ref(), &metrics).await?;
            },
            Err(error) => println!("{error}"),
        }
    }

    tracing::info!("Shutting down gracefully...");
    agent.shutdown(config.shutdown_timeout).await?;
    if let Some(authority) = authority {
        authority.shutdown(config.shutdown_timeout).await?;
    }
    Ok(())
}

async fn run(
    command: Command,
    agent: &AgentNode,
    authority: Option<&queue_calling::AuthorityNode>,
    metrics: &MetricsRecorder,
) -> anyhow::Result<()> {
    match command {
        Command::Next(line) => agent.request_issue(line).await?,
        Command::Recall(line) => {
            if !agent.view().await.can_recall(line) {
                println!("nothing to recall on {}", line.label());
            }
            agent.request_recall(line).await?;
        },
        Command::Reset(line) => agent.request_reset(line).await?,
        Command::Station(station) => agent.select_station(station).await?,
        Command::Show => {
            print!("{}", console::render_agent(&agent.view().await));
            if let Some(authority) = authority {
                println!("-- board --");
                print!("{}", console::render_board(&authority.snapshot().await));
            }
        },
        Command::Metrics => println!("{}", metrics.render().unwrap_or_default()),
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {},
    }
    Ok(())
}
