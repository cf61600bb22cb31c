//! Countdown store: which posts are pinned and for how many more days.
//!
//! A record is created once per pinned post, lowered by one on every day
//! rollover, and deleted after its unfeature call succeeds. `days_left`
//! floors at zero; a record stuck at zero is retried on each later rollover.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::platform::{FeatureType, PostId};

/// Remaining pin time for one featured post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub post_id: PostId,
    pub feature_type: FeatureType,
    pub days_left: u32,
}

impl FeatureRecord {
    pub fn is_expired(&self) -> bool {
        self.days_left == 0
    }
}

/// Durable post-id to days-left mapping.
///
/// Implementations serialize their own mutations; callers may share one
/// store across concurrently running jobs.
pub trait CountdownStore: Send + Sync {
    /// Insert a record with `days_left = days`.
    ///
    /// # Errors
    /// [`StoreError::DuplicateRecord`] if the post already has a record.
    fn register(&self, post_id: PostId, feature_type: FeatureType, days: u32)
        -> Result<(), StoreError>;

    /// Lower every record by one day, never below zero. All-or-nothing.
    /// Returns the number of records touched.
    fn decrement_all(&self) -> Result<usize, StoreError>;

    /// Records with `days_left == 0`, ordered by post id.
    fn list_expired(&self) -> Result<Vec<FeatureRecord>, StoreError>;

    /// Delete a record. Removing an unknown id is not an error.
    fn remove(&self, post_id: PostId) -> Result<(), StoreError>;

    /// Every record, ordered by post id.
    fn list_all(&self) -> Result<Vec<FeatureRecord>, StoreError>;

    fn get(&self, post_id: PostId) -> Result<Option<FeatureRecord>, StoreError>;
}
