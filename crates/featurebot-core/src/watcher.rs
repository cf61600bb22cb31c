//! Post watcher: turns periodic listings into post-created events.
//!
//! Each watched community keeps a high-water mark, the highest post id seen
//! so far. A poll reports every listed post above the mark, oldest first,
//! then raises the mark. Marks are seeded from the newest visible post at
//! start-up, so existing posts are never replayed. Polls are serialized, so
//! a poll that starts while another is still listing sees the raised mark.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::PlatformError;
use crate::platform::{AllowList, CommunityId, Platform, PostEvent, PostId};

/// A community being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedCommunity {
    pub slug: String,
    pub instance: String,
    pub id: CommunityId,
}

pub struct PostWatcher<P> {
    platform: Arc<P>,
    communities: Vec<WatchedCommunity>,
    marks: Mutex<HashMap<CommunityId, PostId>>,
    limit: u32,
}

impl<P: Platform> PostWatcher<P> {
    pub fn new(platform: Arc<P>, communities: Vec<WatchedCommunity>, limit: u32) -> Self {
        Self {
            platform,
            communities,
            marks: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Resolve every allow-listed community. Communities that fail to
    /// resolve are logged and left out.
    pub async fn resolve(platform: &P, allow_list: &AllowList) -> Vec<WatchedCommunity> {
        let mut watched = Vec::new();
        for entry in &allow_list.entries {
            for slug in &entry.communities {
                match platform.resolve_community_id(slug, &entry.instance).await {
                    Ok(id) => watched.push(WatchedCommunity {
                        slug: slug.clone(),
                        instance: entry.instance.clone(),
                        id,
                    }),
                    Err(e) => tracing::warn!(
                        community = %slug,
                        instance = %entry.instance,
                        error = %e,
                        "cannot watch community"
                    ),
                }
            }
        }
        watched
    }

    pub fn communities(&self) -> &[WatchedCommunity] {
        &self.communities
    }

    /// Seed every community's mark from its newest post.
    ///
    /// # Errors
    /// Returns the first listing failure; communities seeded before it keep
    /// their marks.
    pub async fn prime(&self) -> Result<(), PlatformError> {
        let mut marks = self.marks.lock().await;
        for community in &self.communities {
            let posts = self.platform.list_new_posts(community.id, 1).await?;
            let newest = posts.iter().map(|e| e.post.id).max().unwrap_or(PostId(0));
            raise_mark(&mut marks, community.id, newest);
            tracing::debug!(community = %community.slug, mark = %newest, "primed post watcher");
        }
        Ok(())
    }

    /// New posts since the last poll, oldest first.
    ///
    /// A community whose listing fails is skipped this round and its mark
    /// stays where it was.
    pub async fn poll(&self) -> Vec<PostEvent> {
        let mut marks = self.marks.lock().await;
        let mut events = Vec::new();

        for community in &self.communities {
            let listed = match self.platform.list_new_posts(community.id, self.limit).await {
                Ok(listed) => listed,
                Err(e) => {
                    tracing::warn!(community = %community.slug, error = %e, "post listing failed");
                    continue;
                }
            };

            let known = marks.get(&community.id).copied();
            let Some(mark) = known else {
                // Not primed: adopt the newest listed post without replaying.
                let newest = listed.iter().map(|e| e.post.id).max().unwrap_or(PostId(0));
                raise_mark(&mut marks, community.id, newest);
                continue;
            };

            let mut fresh: Vec<PostEvent> = listed
                .into_iter()
                .filter(|e| e.post.id > mark)
                .collect();
            fresh.sort_by_key(|e| e.post.id);
            fresh.dedup_by_key(|e| e.post.id);

            if let Some(newest) = fresh.last() {
                raise_mark(&mut marks, community.id, newest.post.id);
            }
            events.extend(fresh);
        }

        events
    }
}

fn raise_mark(marks: &mut HashMap<CommunityId, PostId>, community: CommunityId, id: PostId) {
    let mark = marks.entry(community).or_insert(id);
    if id > *mark {
        *mark = id;
    }
}
