//! Feature lifecycle coordinator.
//!
//! Per pinned post:
//!
//! ```text
//! created by bot + pinnable match
//!     └─► feature on ─► register(days)          Pinned(days)
//! daily rollover
//!     └─► decrement_all (+ day marker)          Pinned(days - 1) ... Expired(0)
//!     └─► list_expired ─► feature off ─► remove Removed
//! ```
//!
//! A failed feature-off leaves the record at zero; since the decrement floors
//! at zero, the record is offered again on every later rollover until the
//! call goes through.

use std::sync::Arc;

use serde::Serialize;

use crate::countdown::CountdownStore;
use crate::day_marker::RolloverStore;
use crate::definitions::PostDefinition;
use crate::error::{CoreError, StoreError};
use crate::matcher::match_definition;
use crate::platform::{FeatureType, Platform, PostEvent, PostId};

/// What happened to an observed post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PostOutcome {
    /// Created by someone other than the bot.
    ForeignCreator,
    /// No definition's `pin_check` prefixes the post name.
    NoMatch,
    /// Matched a definition that is not pinnable.
    NotPinnable { definition: String },
    /// The post already has a feature record.
    AlreadyTracked,
    /// Featured and registered.
    Pinned { post_id: PostId, days: u32 },
}

/// Result of one decrement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverReport {
    /// Records lowered by this pass.
    pub decremented: usize,
    /// Expired records featured off and removed.
    pub removed: Vec<PostId>,
    /// Expired records whose feature-off or removal failed; retried next rollover.
    pub retained: Vec<PostId>,
    /// Set when expired records could not be listed.
    pub list_error: Option<String>,
}

pub struct FeatureCoordinator<S, P> {
    store: Arc<S>,
    platform: Arc<P>,
    definitions: Vec<PostDefinition>,
    bot_identity: String,
}

impl<S: CountdownStore, P: Platform> FeatureCoordinator<S, P> {
    pub fn new(
        store: Arc<S>,
        platform: Arc<P>,
        definitions: Vec<PostDefinition>,
        bot_identity: impl Into<String>,
    ) -> Self {
        Self {
            store,
            platform,
            definitions,
            bot_identity: bot_identity.into(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn definitions(&self) -> &[PostDefinition] {
        &self.definitions
    }

    /// Pin a freshly observed post if the bot wrote it and it matches a
    /// pinnable definition.
    ///
    /// # Errors
    /// A failed feature call leaves the post unpinned and unregistered. A
    /// failed registration is followed by a feature-off, so the post is not
    /// left pinned without a countdown; if that call fails too it is logged.
    pub async fn on_post_created(&self, event: &PostEvent) -> Result<PostOutcome, CoreError> {
        let post = &event.post;
        if event.creator.name != self.bot_identity {
            return Ok(PostOutcome::ForeignCreator);
        }

        let Some(definition) = match_definition(&self.definitions, &post.name) else {
            tracing::debug!(post_id = %post.id, name = %post.name, "no definition matches post");
            return Ok(PostOutcome::NoMatch);
        };
        if !definition.pinnable {
            return Ok(PostOutcome::NotPinnable {
                definition: definition.name.clone(),
            });
        }
        if self.store.get(post.id)?.is_some() {
            return Ok(PostOutcome::AlreadyTracked);
        }

        let feature_type = FeatureType::Community;
        self.platform
            .set_featured(post.id, feature_type, true)
            .await?;
        tracing::info!(
            post_id = %post.id,
            community_id = %post.community_id,
            name = %post.name,
            "featured post"
        );

        if let Err(e) = self
            .store
            .register(post.id, feature_type, definition.pin_days)
        {
            tracing::error!(
                post_id = %post.id,
                error = %e,
                "failed to register countdown, unfeaturing"
            );
            if let Err(unfeature) = self.platform.set_featured(post.id, feature_type, false).await {
                tracing::error!(
                    post_id = %post.id,
                    error = %unfeature,
                    "post left featured without a countdown"
                );
            }
            return Err(e.into());
        }
        tracing::info!(post_id = %post.id, days_left = definition.pin_days, "registered feature countdown");

        Ok(PostOutcome::Pinned {
            post_id: post.id,
            days: definition.pin_days,
        })
    }

    /// Run one decrement pass: decrement, list expired, then feature off and
    /// remove each expired record in order.
    ///
    /// # Errors
    /// Only a failed decrement is an error; the caller must then leave the
    /// day marker alone so the pass is retried. Everything after the
    /// decrement is reported in the [`RolloverReport`].
    pub async fn on_rollover(&self) -> Result<RolloverReport, StoreError> {
        let decremented = self.store.decrement_all()?;
        tracing::info!(decremented, "decremented feature countdowns");
        Ok(self.release_expired(decremented).await)
    }

    /// List expired records, then feature off and remove each in order.
    async fn release_expired(&self, decremented: usize) -> RolloverReport {
        let mut report = RolloverReport {
            decremented,
            ..RolloverReport::default()
        };

        let expired = match self.store.list_expired() {
            Ok(expired) => expired,
            Err(e) => {
                tracing::error!(error = %e, "failed to list expired feature records");
                report.list_error = Some(e.to_string());
                return report;
            }
        };

        for record in expired {
            let post_id = record.post_id;
            if let Err(e) = self
                .platform
                .set_featured(post_id, record.feature_type, false)
                .await
            {
                tracing::warn!(post_id = %post_id, error = %e, "unfeature failed, retrying next rollover");
                report.retained.push(post_id);
                continue;
            }
            tracing::info!(post_id = %post_id, "unfeatured post");

            match self.store.remove(post_id) {
                Ok(()) => report.removed.push(post_id),
                Err(e) => {
                    tracing::error!(post_id = %post_id, error = %e, "failed to remove expired record");
                    report.retained.push(post_id);
                }
            }
        }

        report
    }

    /// Feature a post off now and drop its record, whatever its countdown.
    pub async fn unpin(&self, post_id: PostId) -> Result<(), CoreError> {
        let feature_type = self
            .store
            .get(post_id)?
            .map(|record| record.feature_type)
            .unwrap_or_default();
        self.platform
            .set_featured(post_id, feature_type, false)
            .await?;
        self.store.remove(post_id)?;
        tracing::info!(post_id = %post_id, "unpinned post");
        Ok(())
    }
}

impl<S: RolloverStore, P: Platform> FeatureCoordinator<S, P> {
    /// Decrement pass for `day`, claimed atomically against the day marker.
    ///
    /// Returns `None` without touching anything when `day` was already
    /// processed. Once the claim commits, the expiry pass runs exactly as in
    /// [`on_rollover`](Self::on_rollover).
    ///
    /// # Errors
    /// The claim failed; neither the countdowns nor the marker changed.
    pub async fn on_new_day(&self, day: u8) -> Result<Option<RolloverReport>, StoreError> {
        let Some(decremented) = self.store.advance_day(day)? else {
            return Ok(None);
        };
        tracing::info!(day, decremented, "decremented feature countdowns");
        Ok(Some(self.release_expired(decremented).await))
    }
}
