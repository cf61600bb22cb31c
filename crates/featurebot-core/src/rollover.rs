//! Day-rollover detection and the housekeeping tick.
//!
//! Housekeeping runs every few minutes, but the countdown must move exactly
//! once per calendar day. Each tick computes the effective weekday (wall
//! clock plus a forward offset, in the configured timezone) and compares it
//! with the stored day marker. A differing day is then claimed in the store,
//! which decrements and moves the marker together, so two processes sharing
//! a database file still decrement once per day.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::coordinator::{FeatureCoordinator, RolloverReport};
use crate::day_marker::{weekday_index, DayMarker, RolloverStore};
use crate::error::StoreError;
use crate::platform::Platform;

/// Decides whether the current tick falls on a day not yet processed.
pub struct RolloverDetector<M> {
    marker: Arc<M>,
    timezone: Tz,
    offset: Duration,
}

impl<M: DayMarker> RolloverDetector<M> {
    pub fn new(marker: Arc<M>, timezone: Tz, offset_minutes: i64) -> Self {
        Self {
            marker,
            timezone,
            offset: Duration::minutes(offset_minutes),
        }
    }

    /// Weekday index (Sunday = 0) of `now + offset` in the configured timezone.
    pub fn effective_day(&self, now: DateTime<Utc>) -> u8 {
        weekday_index(&(now + self.offset).with_timezone(&self.timezone))
    }

    /// The effective day if it differs from the marker, `None` if it was
    /// already processed.
    pub fn pending_day(&self, now: DateTime<Utc>) -> Result<Option<u8>, StoreError> {
        let day = self.effective_day(now);
        let last = self.marker.get()?;
        Ok((day != last).then_some(day))
    }

    pub fn marker(&self) -> &Arc<M> {
        &self.marker
    }
}

/// Outcome of one housekeeping tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// The effective day was already processed.
    SameDay { day: u8 },
    /// A new day: the decrement pass ran and the marker moved to `day`.
    RolledOver { day: u8, report: RolloverReport },
}

/// Runs the rollover check and, on a new day, the coordinator's decrement
/// pass. Ticks are serialized; one that starts while another is still
/// unfeaturing waits for it. Ticks from another process are excluded by the
/// store's day claim.
pub struct Housekeeper<S, P> {
    detector: RolloverDetector<S>,
    coordinator: Arc<FeatureCoordinator<S, P>>,
    running: Mutex<()>,
}

impl<S, P> Housekeeper<S, P>
where
    S: RolloverStore,
    P: Platform,
{
    pub fn new(detector: RolloverDetector<S>, coordinator: Arc<FeatureCoordinator<S, P>>) -> Self {
        Self {
            detector,
            coordinator,
            running: Mutex::new(()),
        }
    }

    pub fn detector(&self) -> &RolloverDetector<S> {
        &self.detector
    }

    /// # Errors
    /// Reading the marker or claiming the day failed. The countdowns and the
    /// marker are untouched and the next tick tries again.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, StoreError> {
        let _running = self.running.lock().await;

        let Some(day) = self.detector.pending_day(now)? else {
            return Ok(TickOutcome::SameDay {
                day: self.detector.effective_day(now),
            });
        };

        tracing::info!(day, "day rolled over, running decrement pass");
        let Some(report) = self.coordinator.on_new_day(day).await? else {
            tracing::debug!(day, "day already processed by another handle");
            return Ok(TickOutcome::SameDay { day });
        };
        tracing::info!(
            day,
            removed = report.removed.len(),
            retained = report.retained.len(),
            "updated day marker"
        );

        Ok(TickOutcome::RolledOver { day, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::{CountdownStore, FeatureRecord};
    use crate::platform::{FeatureType, PostId};
    use crate::storage::Database;
    use crate::testing::{bot_post, definition, FakePlatform, BOT};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TORONTO: Tz = chrono_tz::America::Toronto;

    type TestHousekeeper = Housekeeper<Database, FakePlatform>;

    fn setup(pin_days: u32) -> (Arc<Database>, Arc<FakePlatform>, TestHousekeeper) {
        housekeeper_on(Arc::new(Database::open_memory().unwrap()), pin_days)
    }

    fn housekeeper_on(
        db: Arc<Database>,
        pin_days: u32,
    ) -> (Arc<Database>, Arc<FakePlatform>, TestHousekeeper) {
        let platform = Arc::new(FakePlatform::default());
        let coordinator = Arc::new(FeatureCoordinator::new(
            db.clone(),
            platform.clone(),
            vec![definition("Test Post", true, pin_days)],
            BOT,
        ));
        let detector = RolloverDetector::new(db.clone(), TORONTO, 30);
        (db.clone(), platform, Housekeeper::new(detector, coordinator))
    }

    /// Local Toronto wall-clock time, as UTC.
    fn toronto(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        TORONTO
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn effective_day_looks_ahead_by_offset() {
        let db = Arc::new(Database::open_memory().unwrap());
        let detector = RolloverDetector::new(db, TORONTO, 30);

        // Saturday 2026-10-17, 23:20 local: still Saturday.
        assert_eq!(detector.effective_day(toronto(2026, 10, 17, 23, 20)), 6);
        // 23:35 local plus 30 minutes lands on Sunday.
        assert_eq!(detector.effective_day(toronto(2026, 10, 17, 23, 35)), 0);
    }

    #[test]
    fn effective_day_uses_configured_timezone() {
        let db = Arc::new(Database::open_memory().unwrap());
        let detector = RolloverDetector::new(db, TORONTO, 0);
        // 02:00 UTC Monday is still Sunday evening in Toronto.
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 2, 0, 0).unwrap();
        assert_eq!(detector.effective_day(now), 0);
    }

    #[tokio::test]
    async fn ticks_on_the_same_day_decrement_once() {
        let (db, _platform, keeper) = setup(5);
        db.register(PostId(1), FeatureType::Community, 5).unwrap();

        // Tuesday: marker starts at Sunday, so the first tick rolls over.
        let first = keeper.tick(toronto(2026, 10, 20, 9, 0)).await.unwrap();
        assert!(matches!(first, TickOutcome::RolledOver { day: 2, .. }));

        for minute in [5, 10, 15, 20] {
            let outcome = keeper
                .tick(toronto(2026, 10, 20, 9, minute))
                .await
                .unwrap();
            assert_eq!(outcome, TickOutcome::SameDay { day: 2 });
        }

        assert_eq!(DayMarker::get(db.as_ref()).unwrap(), 2);
        assert_eq!(
            CountdownStore::get(db.as_ref(), PostId(1)).unwrap().unwrap().days_left,
            4
        );
    }

    #[tokio::test]
    async fn first_tick_on_initial_day_is_a_no_op() {
        let (db, _platform, keeper) = setup(5);
        db.register(PostId(1), FeatureType::Community, 5).unwrap();

        // Sunday matches the initial marker value.
        let outcome = keeper.tick(toronto(2026, 10, 18, 12, 0)).await.unwrap();
        assert_eq!(outcome, TickOutcome::SameDay { day: 0 });
        assert_eq!(
            CountdownStore::get(db.as_ref(), PostId(1)).unwrap().unwrap().days_left,
            5
        );
    }

    #[tokio::test]
    async fn one_day_pin_expires_on_first_rollover() {
        let (db, platform, keeper) = setup(1);
        let coordinator = keeper.coordinator.clone();
        coordinator
            .on_post_created(&bot_post(10, "Test Post - week 2, 2024"))
            .await
            .unwrap();
        assert_eq!(
            CountdownStore::get(db.as_ref(), PostId(10)).unwrap().unwrap().days_left,
            1
        );

        let outcome = keeper.tick(toronto(2026, 10, 19, 0, 5)).await.unwrap();
        match outcome {
            TickOutcome::RolledOver { day, report } => {
                assert_eq!(day, 1);
                assert_eq!(report.removed, vec![PostId(10)]);
            }
            other => panic!("expected rollover, got {other:?}"),
        }
        assert!(db.list_all().unwrap().is_empty());
        assert_eq!(platform.feature_calls().last(), Some(&(PostId(10), false)));
    }

    #[tokio::test]
    async fn unfeature_failure_is_retried_next_day() {
        let (db, platform, keeper) = setup(1);
        db.register(PostId(10), FeatureType::Community, 1).unwrap();
        platform.fail_next_feature(PostId(10), false);

        keeper.tick(toronto(2026, 10, 19, 9, 0)).await.unwrap();
        let stuck: FeatureRecord = CountdownStore::get(db.as_ref(), PostId(10))
            .unwrap()
            .unwrap();
        assert_eq!(stuck.days_left, 0);
        // The failed unfeature does not hold the marker back.
        assert_eq!(DayMarker::get(db.as_ref()).unwrap(), 1);

        // Later ticks the same day do not retry.
        keeper.tick(toronto(2026, 10, 19, 18, 0)).await.unwrap();
        assert!(CountdownStore::get(db.as_ref(), PostId(10)).unwrap().is_some());

        keeper.tick(toronto(2026, 10, 20, 9, 0)).await.unwrap();
        assert!(CountdownStore::get(db.as_ref(), PostId(10)).unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_handles_on_one_file_roll_over_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.sqlite3");
        let (db, _, daemon) = housekeeper_on(Arc::new(Database::open(&path).unwrap()), 3);
        let (_, _, cli) = housekeeper_on(Arc::new(Database::open(&path).unwrap()), 3);
        db.register(PostId(1), FeatureType::Community, 3).unwrap();

        let (daemon, cli) = (Arc::new(daemon), Arc::new(cli));
        let tuesday = toronto(2026, 10, 20, 9, 0);
        let a = tokio::spawn({
            let daemon = daemon.clone();
            async move { daemon.tick(tuesday).await }
        });
        let b = tokio::spawn({
            let cli = cli.clone();
            async move { cli.tick(tuesday).await }
        });
        let (a, b) = tokio::join!(a, b);
        let outcomes = [a.unwrap().unwrap(), b.unwrap().unwrap()];

        let rolled = outcomes
            .iter()
            .filter(|o| matches!(o, TickOutcome::RolledOver { day: 2, .. }))
            .count();
        assert_eq!(rolled, 1, "{outcomes:?}");
        assert!(outcomes.contains(&TickOutcome::SameDay { day: 2 }));
        assert_eq!(
            CountdownStore::get(db.as_ref(), PostId(1)).unwrap().unwrap().days_left,
            2
        );
    }

    #[tokio::test]
    async fn stale_marker_read_does_not_decrement_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.sqlite3");
        let (db, _, daemon) = housekeeper_on(Arc::new(Database::open(&path).unwrap()), 3);
        let other = Database::open(&path).unwrap();
        db.register(PostId(1), FeatureType::Community, 3).unwrap();

        // Both handles saw Sunday; the other one claims Tuesday first.
        let tuesday = toronto(2026, 10, 20, 9, 0);
        assert_eq!(daemon.detector().pending_day(tuesday).unwrap(), Some(2));
        assert_eq!(other.advance_day(2).unwrap(), Some(1));

        let outcome = daemon.coordinator.on_new_day(2).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(
            daemon.tick(tuesday).await.unwrap(),
            TickOutcome::SameDay { day: 2 }
        );
        assert_eq!(
            CountdownStore::get(db.as_ref(), PostId(1)).unwrap().unwrap().days_left,
            2
        );
    }

    /// Store whose day claim can be told to fail, wrapping a real database.
    struct FlakyStore {
        inner: Database,
        fail_decrement: AtomicBool,
        decrements: AtomicUsize,
    }

    impl CountdownStore for FlakyStore {
        fn register(&self, id: PostId, ft: FeatureType, days: u32) -> Result<(), StoreError> {
            self.inner.register(id, ft, days)
        }
        fn decrement_all(&self) -> Result<usize, StoreError> {
            self.inner.decrement_all()
        }
        fn list_expired(&self) -> Result<Vec<FeatureRecord>, StoreError> {
            self.inner.list_expired()
        }
        fn remove(&self, id: PostId) -> Result<(), StoreError> {
            self.inner.remove(id)
        }
        fn list_all(&self) -> Result<Vec<FeatureRecord>, StoreError> {
            self.inner.list_all()
        }
        fn get(&self, id: PostId) -> Result<Option<FeatureRecord>, StoreError> {
            CountdownStore::get(&self.inner, id)
        }
    }

    impl DayMarker for FlakyStore {
        fn get(&self) -> Result<u8, StoreError> {
            DayMarker::get(&self.inner)
        }
        fn set(&self, day: u8) -> Result<(), StoreError> {
            self.inner.set(day)
        }
    }

    impl RolloverStore for FlakyStore {
        fn advance_day(&self, day: u8) -> Result<Option<usize>, StoreError> {
            if self.fail_decrement.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Locked);
            }
            let claimed = self.inner.advance_day(day)?;
            if claimed.is_some() {
                self.decrements.fetch_add(1, Ordering::SeqCst);
            }
            Ok(claimed)
        }
    }

    #[tokio::test]
    async fn failed_decrement_leaves_marker_for_next_tick() {
        let store = Arc::new(FlakyStore {
            inner: Database::open_memory().unwrap(),
            fail_decrement: AtomicBool::new(true),
            decrements: AtomicUsize::new(0),
        });
        store.register(PostId(1), FeatureType::Community, 3).unwrap();
        let coordinator = Arc::new(FeatureCoordinator::new(
            store.clone(),
            Arc::new(FakePlatform::default()),
            vec![],
            BOT,
        ));
        let keeper = Housekeeper::new(RolloverDetector::new(store.clone(), TORONTO, 30), coordinator);

        let err = keeper.tick(toronto(2026, 10, 21, 9, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Locked));
        assert_eq!(DayMarker::get(store.as_ref()).unwrap(), 0);
        assert_eq!(CountdownStore::get(store.as_ref(), PostId(1)).unwrap().unwrap().days_left, 3);

        // Retried by the next tick the same day, and only once.
        keeper.tick(toronto(2026, 10, 21, 9, 5)).await.unwrap();
        keeper.tick(toronto(2026, 10, 21, 9, 10)).await.unwrap();
        assert_eq!(store.decrements.load(Ordering::SeqCst), 1);
        assert_eq!(DayMarker::get(store.as_ref()).unwrap(), 3);
        assert_eq!(CountdownStore::get(store.as_ref(), PostId(1)).unwrap().unwrap().days_left, 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// A k-day pin is removed after exactly k rollovers, however many
        /// ticks land inside each day, and never goes negative on the way.
        #[test]
        fn pin_lasts_exactly_k_rollovers(
            pin_days in 1u32..6,
            ticks_per_day in proptest::collection::vec(1usize..8, 12),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (db, _platform, keeper) = setup(pin_days);
                keeper
                    .coordinator
                    .on_post_created(&bot_post(10, "Test Post"))
                    .await
                    .unwrap();

                // Day 0 is Monday 2026-10-19, past the initial Sunday marker.
                for (offset, ticks) in ticks_per_day.iter().enumerate() {
                    let date = toronto(2026, 10, 19, 6, 0) + Duration::days(offset as i64);
                    for t in 0..*ticks {
                        keeper.tick(date + Duration::minutes(5 * t as i64)).await.unwrap();
                        for record in db.list_all().unwrap() {
                            prop_assert!(record.days_left <= pin_days);
                        }
                    }

                    let rollovers = offset as u32 + 1;
                    let present = CountdownStore::get(db.as_ref(), PostId(10)).unwrap();
                    if rollovers < pin_days {
                        prop_assert_eq!(present.map(|r| r.days_left), Some(pin_days - rollovers));
                    } else {
                        prop_assert!(present.is_none());
                    }
                }
                Ok(())
            })?;
        }
    }
}
