use std::sync::Arc;

use chrono::Utc;
use featurebot_core::{start_scheduler, Config};

use super::{connect, CommandResult};

pub async fn run() -> CommandResult {
    let config = Config::load()?;
    for warning in config.validate()? {
        tracing::warn!("{warning}");
    }

    let bot = connect(config).await?;
    tracing::info!(
        communities = bot.config().communities.len(),
        posts = bot.config().posts.len(),
        "featurebot started"
    );

    let watcher = Arc::new(bot.watcher().await);
    if let Err(e) = watcher.prime().await {
        tracing::warn!(error = %e, "could not prime every community; the rest adopt their newest post on first poll");
    }

    // Catch up on a rollover missed while the bot was down.
    bot.housekeeping(Utc::now()).await;

    let scheduler = start_scheduler(bot.clone(), watcher).await?;
    for job in scheduler.jobs() {
        println!("{}  {}", job.id, job.label);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}
