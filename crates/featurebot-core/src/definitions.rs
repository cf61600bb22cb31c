//! Static post and community configuration.
//!
//! Neither type is mutated at runtime; both are loaded from `config.toml`.

use indoc::indoc;
use serde::{Deserialize, Serialize};

/// A recurring post the bot creates, and how long instances stay pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDefinition {
    /// Title template (`%{WEEKLYDATE}`, `%{COMSHORT}`).
    pub name: String,
    /// Body template.
    #[serde(default)]
    pub body: String,
    /// Only communities accepting this category receive the post.
    pub category: String,
    /// Creation schedule, six fields with seconds first.
    pub cron: String,
    #[serde(default, alias = "pin")]
    pub pinnable: bool,
    #[serde(default, alias = "pin_length")]
    pub pin_days: u32,
    /// Prefix that identifies posts created from this definition.
    #[serde(default)]
    pub pin_check: String,
}

/// A community the bot posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityTarget {
    pub slug: String,
    /// Display name substituted for `%{COMSHORT}`.
    pub short: String,
    pub instance: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl CommunityTarget {
    pub fn accepts(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

pub(crate) fn default_communities() -> Vec<CommunityTarget> {
    vec![CommunityTarget {
        slug: "linuxupskillchallenge".to_string(),
        short: "Linux Upskill Challenge".to_string(),
        instance: "programming.dev".to_string(),
        categories: vec!["monthly_post".to_string()],
    }]
}

pub(crate) fn default_posts() -> Vec<PostDefinition> {
    vec![PostDefinition {
        name: "Test Post".to_string(),
        body: indoc! {"
            This is a test post
        "}
        .to_string(),
        category: "monthly_post".to_string(),
        cron: "0 0 19 ? * MON#2".to_string(),
        pinnable: true,
        pin_days: 1,
        pin_check: "Test Post".to_string(),
    }]
}
