//! The assembled bot: one store, one platform client, and the lifecycle
//! components built over them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::coordinator::FeatureCoordinator;
use crate::definitions::PostDefinition;
use crate::error::CoreError;
use crate::platform::{AllowList, Platform, Post};
use crate::rollover::{Housekeeper, RolloverDetector, TickOutcome};
use crate::storage::{Config, Database};
use crate::template::render_post;
use crate::watcher::PostWatcher;

/// Posts submitted by one creation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationReport {
    pub created: Vec<Post>,
    /// Community slugs whose post could not be created.
    pub failed: Vec<String>,
}

pub struct Bot<P> {
    config: Config,
    timezone: Tz,
    allow_list: AllowList,
    store: Arc<Database>,
    platform: Arc<P>,
    coordinator: Arc<FeatureCoordinator<Database, P>>,
    housekeeper: Housekeeper<Database, P>,
}

impl<P: Platform> Bot<P> {
    /// # Errors
    /// The configured timezone is unknown.
    pub fn new(config: Config, store: Arc<Database>, platform: Arc<P>) -> Result<Self, CoreError> {
        let timezone = config.timezone()?;
        let allow_list = AllowList::from_communities(&config.communities);

        let coordinator = Arc::new(FeatureCoordinator::new(
            store.clone(),
            platform.clone(),
            config.posts.clone(),
            config.bot.username.clone(),
        ));
        let detector = RolloverDetector::new(
            store.clone(),
            timezone,
            config.schedule.rollover_offset_minutes,
        );
        let housekeeper = Housekeeper::new(detector, coordinator.clone());

        Ok(Self {
            config,
            timezone,
            allow_list,
            store,
            platform,
            coordinator,
            housekeeper,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn store(&self) -> &Arc<Database> {
        &self.store
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn coordinator(&self) -> &Arc<FeatureCoordinator<Database, P>> {
        &self.coordinator
    }

    pub fn housekeeper(&self) -> &Housekeeper<Database, P> {
        &self.housekeeper
    }

    /// A watcher over every allow-listed community that resolves.
    pub async fn watcher(&self) -> PostWatcher<P> {
        let communities = PostWatcher::resolve(self.platform.as_ref(), &self.allow_list).await;
        PostWatcher::new(
            self.platform.clone(),
            communities,
            self.config.schedule.watch_limit,
        )
    }

    /// Create `definition` in every allow-listed community that accepts its
    /// category. A failure in one community does not stop the others.
    pub async fn create_posts(
        &self,
        definition: &PostDefinition,
        now: DateTime<Utc>,
    ) -> CreationReport {
        let today = now.with_timezone(&self.timezone).date_naive();
        let mut report = CreationReport::default();

        for community in &self.config.communities {
            if !community.accepts(&definition.category)
                || !self.allow_list.allows(&community.slug, &community.instance)
            {
                continue;
            }

            let rendered = render_post(definition, community, today);
            let result = async {
                let community_id = self
                    .platform
                    .resolve_community_id(&community.slug, &community.instance)
                    .await?;
                self.platform
                    .create_post(&rendered.name, &rendered.body, community_id)
                    .await
            }
            .await;

            match result {
                Ok(post) => {
                    tracing::info!(
                        post_id = %post.id,
                        community = %community.slug,
                        name = %rendered.name,
                        "created post"
                    );
                    report.created.push(post);
                }
                Err(e) => {
                    tracing::error!(
                        community = %community.slug,
                        name = %rendered.name,
                        error = %e,
                        "failed to create post"
                    );
                    report.failed.push(community.slug.clone());
                }
            }
        }

        report
    }

    /// One housekeeping tick. Failures are logged, never returned, so the
    /// next scheduled tick always runs.
    pub async fn housekeeping(&self, now: DateTime<Utc>) -> Option<TickOutcome> {
        match self.housekeeper.tick(now).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(error = %e, "housekeeping tick failed");
                None
            }
        }
    }
}
