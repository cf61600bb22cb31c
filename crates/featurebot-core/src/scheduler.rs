//! Cron wiring for a running bot.
//!
//! Three kinds of job share one [`JobScheduler`]:
//!
//! - one creation job per post definition, on the definition's cron in the
//!   configured timezone
//! - the housekeeping job, on `schedule.housekeeping_cron`
//! - the watcher job, every `schedule.watch_interval_secs`, feeding new posts
//!   to the coordinator
//!
//! Job bodies log their failures and return; nothing a job does can stop the
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::bot::Bot;
use crate::coordinator::PostOutcome;
use crate::error::CoreError;
use crate::platform::Platform;
use crate::rollover::TickOutcome;
use crate::watcher::PostWatcher;

/// A scheduled job, for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub label: String,
}

/// The running scheduler and the jobs registered on it.
pub struct BotScheduler {
    scheduler: JobScheduler,
    jobs: Vec<ScheduledJob>,
}

impl BotScheduler {
    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Stop firing jobs. A job body already running is not interrupted.
    pub async fn shutdown(mut self) -> Result<(), CoreError> {
        self.scheduler.shutdown().await?;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    async fn add(&mut self, job: Job, label: String) -> Result<(), CoreError> {
        let id = self.scheduler.add(job).await?;
        tracing::info!(job_id = %id, job = %label, "scheduled job");
        self.jobs.push(ScheduledJob { id, label });
        Ok(())
    }
}

/// Register every job and start the scheduler.
///
/// # Errors
/// A cron expression was rejected or the scheduler failed to start.
pub async fn start_scheduler<P: Platform + 'static>(
    bot: Arc<Bot<P>>,
    watcher: Arc<PostWatcher<P>>,
) -> Result<BotScheduler, CoreError> {
    let mut scheduler = BotScheduler {
        scheduler: JobScheduler::new().await?,
        jobs: Vec::new(),
    };
    let timezone = bot.timezone();

    for definition in bot.config().posts.clone() {
        let label = format!("create '{}' ({})", definition.name, definition.cron);
        let cron = definition.cron.clone();
        let job_bot = bot.clone();

        let job = Job::new_async_tz(cron.as_str(), timezone, move |_uuid, _lock| {
            let bot = job_bot.clone();
            let definition = definition.clone();
            Box::pin(async move {
                let report = bot.create_posts(&definition, Utc::now()).await;
                tracing::info!(
                    post = %definition.name,
                    created = report.created.len(),
                    failed = report.failed.len(),
                    "creation job finished"
                );
            })
        })?;
        scheduler.add(job, label).await?;
    }

    let housekeeping_cron = bot.config().schedule.housekeeping_cron.clone();
    let job_bot = bot.clone();
    let housekeeping = Job::new_async_tz(housekeeping_cron.as_str(), timezone, move |_uuid, _lock| {
        let bot = job_bot.clone();
        Box::pin(async move {
            let outcome = bot.housekeeping(Utc::now()).await;
            if let Some(TickOutcome::RolledOver { day, report }) = outcome {
                tracing::info!(
                    day,
                    decremented = report.decremented,
                    removed = report.removed.len(),
                    "housekeeping rolled over"
                );
            }
        })
    })?;
    scheduler
        .add(housekeeping, format!("housekeeping ({housekeeping_cron})"))
        .await?;

    let interval = Duration::from_secs(bot.config().schedule.watch_interval_secs);
    let job_bot = bot.clone();
    let watch = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let bot = job_bot.clone();
        let watcher = watcher.clone();
        Box::pin(async move {
            dispatch_new_posts(&bot, &watcher).await;
        })
    })?;
    scheduler
        .add(watch, format!("watch new posts (every {}s)", interval.as_secs()))
        .await?;

    scheduler.scheduler.start().await?;
    tracing::info!(jobs = scheduler.jobs.len(), "scheduler started");
    Ok(scheduler)
}

/// Poll once and hand every new post to the coordinator, oldest first.
pub async fn dispatch_new_posts<P: Platform>(
    bot: &Bot<P>,
    watcher: &PostWatcher<P>,
) -> Vec<PostOutcome> {
    let mut outcomes = Vec::new();
    for event in watcher.poll().await {
        match bot.coordinator().on_post_created(&event).await {
            Ok(outcome) => {
                tracing::debug!(post_id = %event.post.id, ?outcome, "handled new post");
                outcomes.push(outcome);
            }
            Err(e) => {
                tracing::error!(post_id = %event.post.id, error = %e, "failed to handle new post");
            }
        }
    }
    outcomes
}
