use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform-assigned post identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform-assigned community identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(pub i64);

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a featured post is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureType {
    /// Pinned to the top of its community.
    #[default]
    Community,
    /// Pinned to the top of the instance's local feed.
    Local,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Community => "Community",
            FeatureType::Local => "Local",
        }
    }

    /// Parse the stored tag. Missing or unknown tags read as `Community`,
    /// which is what rows from older deployments were pinned with.
    pub fn parse(tag: Option<&str>) -> Self {
        match tag {
            Some("Local") => FeatureType::Local,
            _ => FeatureType::Community,
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post as observed on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub name: String,
    pub community_id: CommunityId,
    #[serde(default)]
    pub featured_community: bool,
}

/// Author of an observed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
}

/// A post-created event, emitted once per newly observed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEvent {
    pub post: Post,
    pub creator: Creator,
}
