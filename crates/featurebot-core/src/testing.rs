//! In-memory platform double shared by unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::definitions::PostDefinition;
use crate::error::PlatformError;
use crate::platform::{CommunityId, Creator, FeatureType, Platform, Post, PostEvent, PostId};

pub const BOT: &str = "pinbot";

pub fn definition(pin_check: &str, pinnable: bool, pin_days: u32) -> PostDefinition {
    PostDefinition {
        name: pin_check.to_string(),
        body: String::new(),
        category: "monthly_post".to_string(),
        cron: "0 0 19 ? * MON#2".to_string(),
        pinnable,
        pin_days,
        pin_check: pin_check.to_string(),
    }
}

pub fn bot_post(id: i64, name: &str) -> PostEvent {
    PostEvent {
        post: Post {
            id: PostId(id),
            name: name.to_string(),
            community_id: CommunityId(7),
            featured_community: false,
        },
        creator: Creator {
            name: BOT.to_string(),
        },
    }
}

/// Records every call and fails selected ones once.
#[derive(Default)]
pub struct FakePlatform {
    feature_calls: Mutex<Vec<(PostId, bool)>>,
    fail_once: Mutex<HashSet<(PostId, bool)>>,
    created: Mutex<Vec<(String, String, CommunityId)>>,
    listed: Mutex<Vec<PostEvent>>,
    unreachable: Mutex<HashSet<i64>>,
}

impl FakePlatform {
    pub fn feature_calls(&self) -> Vec<(PostId, bool)> {
        self.feature_calls.lock().unwrap().clone()
    }

    /// Make the next `set_featured(post_id, featured)` fail.
    pub fn fail_next_feature(&self, post_id: PostId, featured: bool) {
        self.fail_once.lock().unwrap().insert((post_id, featured));
    }

    pub fn created(&self) -> Vec<(String, String, CommunityId)> {
        self.created.lock().unwrap().clone()
    }

    /// Add a post that `list_new_posts` will report.
    pub fn publish(&self, event: PostEvent) {
        self.listed.lock().unwrap().push(event);
    }

    /// Make every call touching this community fail.
    pub fn make_unreachable(&self, community_id: CommunityId) {
        self.unreachable.lock().unwrap().insert(community_id.0);
    }

    pub fn make_reachable(&self, community_id: CommunityId) {
        self.unreachable.lock().unwrap().remove(&community_id.0);
    }

    fn check_reachable(&self, community_id: CommunityId) -> Result<(), PlatformError> {
        if self.unreachable.lock().unwrap().contains(&community_id.0) {
            return Err(PlatformError::Api {
                status: 503,
                message: "unreachable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn resolve_community_id(
        &self,
        name: &str,
        _instance: &str,
    ) -> Result<CommunityId, PlatformError> {
        Ok(CommunityId(name.len() as i64))
    }

    async fn create_post(
        &self,
        name: &str,
        body: &str,
        community_id: CommunityId,
    ) -> Result<Post, PlatformError> {
        self.check_reachable(community_id)?;
        let mut created = self.created.lock().unwrap();
        created.push((name.to_string(), body.to_string(), community_id));
        Ok(Post {
            id: PostId(1000 + created.len() as i64),
            name: name.to_string(),
            community_id,
            featured_community: false,
        })
    }

    async fn set_featured(
        &self,
        post_id: PostId,
        _feature_type: FeatureType,
        featured: bool,
    ) -> Result<(), PlatformError> {
        if self.fail_once.lock().unwrap().remove(&(post_id, featured)) {
            return Err(PlatformError::Api {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        self.feature_calls.lock().unwrap().push((post_id, featured));
        Ok(())
    }

    async fn list_new_posts(
        &self,
        community_id: CommunityId,
        limit: u32,
    ) -> Result<Vec<PostEvent>, PlatformError> {
        self.check_reachable(community_id)?;
        let mut posts: Vec<PostEvent> = self
            .listed
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.post.community_id == community_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.post.id.cmp(&a.post.id));
        posts.truncate(limit as usize);
        Ok(posts)
    }
}
