//! Federation allow-list: the instances and communities the bot may touch.

use serde::{Deserialize, Serialize};

use crate::definitions::CommunityTarget;

/// Communities the bot may interact with on one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub instance: String,
    pub communities: Vec<String>,
}

/// Allow-list grouped by instance, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    pub entries: Vec<AllowListEntry>,
}

impl AllowList {
    /// Group community targets by hosting instance.
    pub fn from_communities(communities: &[CommunityTarget]) -> Self {
        let mut entries: Vec<AllowListEntry> = Vec::new();

        for community in communities {
            match entries
                .iter_mut()
                .find(|entry| entry.instance == community.instance)
            {
                Some(entry) => {
                    if !entry.communities.contains(&community.slug) {
                        entry.communities.push(community.slug.clone());
                    }
                }
                None => entries.push(AllowListEntry {
                    instance: community.instance.clone(),
                    communities: vec![community.slug.clone()],
                }),
            }
        }

        Self { entries }
    }

    pub fn allows(&self, community: &str, instance: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.instance == instance && e.communities.iter().any(|c| c == community))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(slug: &str, instance: &str) -> CommunityTarget {
        CommunityTarget {
            slug: slug.to_string(),
            short: slug.to_uppercase(),
            instance: instance.to_string(),
            categories: vec!["monthly_post".to_string()],
        }
    }

    #[test]
    fn groups_communities_by_instance_in_first_seen_order() {
        let list = AllowList::from_communities(&[
            target("linuxupskillchallenge", "programming.dev"),
            target("selfhosted", "lemmy.world"),
            target("rust", "programming.dev"),
        ]);

        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.entries[0].instance, "programming.dev");
        assert_eq!(
            list.entries[0].communities,
            vec!["linuxupskillchallenge".to_string(), "rust".to_string()]
        );
        assert_eq!(list.entries[1].instance, "lemmy.world");
    }

    #[test]
    fn duplicate_targets_are_listed_once() {
        let list = AllowList::from_communities(&[
            target("rust", "programming.dev"),
            target("rust", "programming.dev"),
        ]);
        assert_eq!(list.entries[0].communities.len(), 1);
    }

    #[test]
    fn allows_checks_both_instance_and_slug() {
        let list = AllowList::from_communities(&[target("rust", "programming.dev")]);
        assert!(list.allows("rust", "programming.dev"));
        assert!(!list.allows("rust", "lemmy.world"));
        assert!(!list.allows("golang", "programming.dev"));
    }
}
