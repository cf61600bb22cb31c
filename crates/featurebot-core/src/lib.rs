//! # Featurebot Core Library
//!
//! Scheduled community posts for Lemmy, featured for a fixed number of days
//! and then unfeatured automatically.
//!
//! ## Architecture
//!
//! - **Countdown store**: one record per featured post with the days it has
//!   left, persisted in SQLite next to the day marker
//! - **Rollover**: a housekeeping tick that runs the decrement pass once per
//!   calendar day, however often it fires
//! - **Coordinator**: pins matching posts created by the bot and unpins them
//!   once their countdown reaches zero
//! - **Platform**: the Lemmy HTTP client behind the [`Platform`] trait
//!
//! ## Key Components
//!
//! - [`FeatureCoordinator`]: post-created and rollover handling
//! - [`Housekeeper`]: the per-tick rollover check
//! - [`Database`]: countdown records and the day marker
//! - [`Config`]: bot configuration, post definitions, and target communities

pub mod bot;
pub mod coordinator;
pub mod countdown;
pub mod day_marker;
pub mod definitions;
pub mod error;
pub mod matcher;
pub mod platform;
pub mod rollover;
pub mod scheduler;
pub mod storage;
pub mod template;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use bot::{Bot, CreationReport};
pub use coordinator::{FeatureCoordinator, PostOutcome, RolloverReport};
pub use countdown::{CountdownStore, FeatureRecord};
pub use day_marker::{weekday_index, DayMarker, RolloverStore};
pub use definitions::{CommunityTarget, PostDefinition};
pub use error::{ConfigError, CoreError, PlatformError, StoreError};
pub use matcher::{match_definition, shadowed_definitions};
pub use platform::{
    AllowList, CommunityId, Creator, FeatureType, LemmyClient, Platform, Post, PostEvent, PostId,
};
pub use rollover::{Housekeeper, RolloverDetector, TickOutcome};
pub use scheduler::{dispatch_new_posts, start_scheduler, BotScheduler, ScheduledJob};
pub use storage::{Config, Credentials, Database};
pub use watcher::{PostWatcher, WatchedCommunity};
