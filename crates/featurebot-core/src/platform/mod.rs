//! Forum platform access.
//!
//! The lifecycle coordinator and the schedulers only ever talk to the
//! [`Platform`] trait. [`lemmy::LemmyClient`] is the production
//! implementation; tests substitute their own.

pub mod allow_list;
pub mod lemmy;
mod types;

pub use allow_list::{AllowList, AllowListEntry};
pub use lemmy::LemmyClient;
pub use types::{CommunityId, Creator, FeatureType, Post, PostEvent, PostId};

use async_trait::async_trait;

use crate::error::PlatformError;

/// Operations the bot needs from the forum platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Look up a community's numeric id from its slug and hosting instance.
    async fn resolve_community_id(
        &self,
        name: &str,
        instance: &str,
    ) -> Result<CommunityId, PlatformError>;

    /// Submit a new post and return it as the platform stored it.
    async fn create_post(
        &self,
        name: &str,
        body: &str,
        community_id: CommunityId,
    ) -> Result<Post, PlatformError>;

    /// Pin (`featured = true`) or unpin a post.
    async fn set_featured(
        &self,
        post_id: PostId,
        feature_type: FeatureType,
        featured: bool,
    ) -> Result<(), PlatformError>;

    /// Newest posts in a community, newest first.
    async fn list_new_posts(
        &self,
        community_id: CommunityId,
        limit: u32,
    ) -> Result<Vec<PostEvent>, PlatformError>;
}
