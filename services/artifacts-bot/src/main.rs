//! Artifacts Bot - runs a roster of characters against the game API
//!
//! 1. Loads the roster file (characters, tokens, action types)
//! 2. Starts one execution unit per character under a supervisor
//! 3. Periodically reports the aggregated status table
//! 4. Stops every bot cooperatively on Ctrl-C

use anyhow::Context;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use artifacts_bot::{RunnerConfig, Supervisor};

/// Bot runner entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Artifacts Bot...");

    let path = std::env::args()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(RunnerConfig::default_path);
    let config = RunnerConfig::load(&path)
        .with_context(|| format!("Failed to load roster {}", path.display()))?;
    let bots = config.bot_configs().context("Invalid roster")?;

    if bots.is_empty() {
        warn!("Roster {} has no bots, nothing to do", path.display());
        return Ok(());
    }
    info!("Loaded {} bots from {}", bots.len(), path.display());

    let mut supervisor = Supervisor::new(config.max_logs);
    for bot in bots {
        let name = bot.character_name.clone();
        supervisor.initialize(bot.clone()).await;
        supervisor
            .start(&name, bot)
            .await
            .with_context(|| format!("Failed to start {}", name))?;
    }

    let mut status_interval = interval(config.status_interval());
    loop {
        tokio::select! {
            _ = status_interval.tick() => report_status(&supervisor).await,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down, letting in-flight actions finish...");
    supervisor
        .with_shutdown_grace(Duration::from_secs(30))
        .shutdown()
        .await;
    Ok(())
}

async fn report_status(supervisor: &Supervisor) {
    for (name, status) in supervisor.statuses().await {
        info!(
            bot = %name,
            running = status.is_running,
            hp = %format!("{}/{}", status.current_hp, status.max_hp),
            actions = status.total_actions,
            xp = status.total_xp,
            gold = status.total_gold,
            "{}",
            status.last_error.as_deref().unwrap_or(&status.last_action)
        );
    }
}
