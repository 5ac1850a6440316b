//! Time-windowed, in-memory heart-rate reading store.
//!
//! Readings are kept per pairing code in arrival order and expire after a
//! fixed TTL. Expiry is enforced three ways:
//!
//! - `insert` prunes the session it just appended to
//! - every query filters by age, so an unswept reading is never returned
//! - a background [`Sweeper`] periodically drops expired readings and
//!   removes sessions that became empty
//!
//! All access goes through `&self` methods that hand back owned copies, so
//! the store can be shared behind an `Arc` by any number of handlers.

pub mod clock;
pub mod sweeper;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sweeper::{spawn_sweeper, Sweeper};
pub use types::{HeartRateStats, Reading, SweepReport, ZoneCounts, MAX_ZONE, MIN_ZONE};

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How long a reading stays queryable.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(30 * 60);

/// How often the background sweep runs.
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Readings for one pairing code.
///
/// Append-only and oldest-first: the last element is always the most recent
/// arrival, which is what "current" means to every query.
#[derive(Debug, Default)]
struct Session {
    readings: Vec<Reading>,
}

impl Session {
    /// Drop readings stamped at or before `cutoff`. Returns how many went.
    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.readings.len();
        self.readings.retain(|r| r.timestamp > cutoff);
        before - self.readings.len()
    }

    fn since(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &Reading> {
        self.readings.iter().filter(move |r| r.timestamp > cutoff)
    }
}

/// Shared store of recent readings keyed by pairing code.
pub struct ReadingStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ReadingStore {
    /// Create a store on the system clock.
    pub fn new(ttl: std::time::Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            clock,
        }
    }

    /// Current instant according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reading time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Append a reading stamped with the current instant.
    ///
    /// Inputs are expected to be validated already. The session is created
    /// on first use and pruned of expired readings before returning.
    pub fn insert(&self, code: &str, bpm: u16, zone: u8) -> Reading {
        // Stamp under the write lock so append order matches timestamp order.
        let mut sessions = self.write();
        let now = self.now();
        let reading = Reading {
            bpm,
            zone,
            timestamp: now,
        };

        let session = sessions.entry(code.to_string()).or_default();
        session.readings.push(reading);
        let pruned = session.prune(self.expiry_cutoff(now));

        tracing::debug!(code, bpm, zone, pruned, "reading stored");
        reading
    }

    /// The most recent reading that has not expired.
    pub fn latest(&self, code: &str) -> Option<Reading> {
        let cutoff = self.expiry_cutoff(self.now());
        self.read()
            .get(code)
            .and_then(|s| s.readings.last())
            .filter(|r| r.timestamp > cutoff)
            .copied()
    }

    /// Readings received within the last `window_secs` seconds, oldest first.
    ///
    /// Unknown codes and empty windows both yield an empty vector.
    pub fn range(&self, code: &str, window_secs: u32) -> Vec<Reading> {
        let cutoff = self.window_cutoff(window_secs);
        self.read()
            .get(code)
            .map(|s| s.since(cutoff).copied().collect())
            .unwrap_or_default()
    }

    /// Aggregate over [`range`](Self::range). `None` when the window is empty.
    pub fn stats(&self, code: &str, window_secs: u32) -> Option<HeartRateStats> {
        HeartRateStats::from_readings(&self.range(code, window_secs))
    }

    /// Whether the code sent a reading within `threshold`.
    pub fn is_active(&self, code: &str, threshold: Duration) -> bool {
        self.latest(code)
            .is_some_and(|r| self.now() - r.timestamp < threshold)
    }

    /// Drop every expired reading and remove sessions left empty.
    pub fn sweep(&self) -> SweepReport {
        let cutoff = self.expiry_cutoff(self.now());
        let mut report = SweepReport::default();

        let mut sessions = self.write();
        sessions.retain(|_, session| {
            report.readings_removed += session.prune(cutoff);
            let keep = !session.readings.is_empty();
            if !keep {
                report.sessions_removed += 1;
            }
            keep
        });

        report
    }

    /// Number of codes with at least one retained reading.
    pub fn session_count(&self) -> usize {
        self.read().len()
    }

    /// Number of readings retained for `code`, including unswept expired ones.
    pub fn reading_count(&self, code: &str) -> usize {
        self.read().get(code).map_or(0, |s| s.readings.len())
    }

    fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Cutoff for a window query, never reaching past the TTL.
    fn window_cutoff(&self, window_secs: u32) -> DateTime<Utc> {
        let now = self.now();
        let window = now - Duration::seconds(i64::from(window_secs));
        window.max(self.expiry_cutoff(now))
    }

    // Every critical section leaves the map consistent, so a panic while the
    // lock was held cannot leave it half-updated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl std::fmt::Debug for ReadingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingStore")
            .field("ttl", &self.ttl)
            .field("sessions", &self.session_count())
            .finish()
    }
}

/// Thread-safe shared reading store.
pub type SharedReadingStore = Arc<ReadingStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ReadingStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = ReadingStore::with_clock(DEFAULT_TTL, clock.clone());
        (store, clock)
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn test_latest_is_last_inserted() {
        let (store, clock) = store();

        store.insert("tiger07", 70, 1);
        clock.advance(secs(1));
        store.insert("tiger07", 72, 2);

        let latest = store.latest("tiger07").unwrap();
        assert_eq!(latest.bpm, 72);
        assert_eq!(latest.zone, 2);
        assert_eq!(latest.timestamp, clock.now());
    }

    #[test]
    fn test_unknown_code_is_empty() {
        let (store, _) = store();

        assert!(store.latest("falcon99").is_none());
        assert!(store.range("falcon99", 1800).is_empty());
        assert!(store.stats("falcon99", 60).is_none());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_range_respects_window() {
        let (store, clock) = store();

        for bpm in 60..70 {
            store.insert("wolf11", bpm, 1);
            clock.advance(secs(1));
        }

        // Readings are 10s..1s old now; a window excludes its own edge.
        assert_eq!(store.range("wolf11", 4).len(), 3);
        assert_eq!(store.range("wolf11", 10).len(), 9);
        assert_eq!(store.range("wolf11", 11).len(), 10);

        let recent: Vec<u16> = store.range("wolf11", 4).iter().map(|r| r.bpm).collect();
        assert_eq!(recent, vec![67, 68, 69]);
    }

    #[test]
    fn test_range_is_suffix_of_wider_range() {
        let (store, clock) = store();

        for i in 0..30u16 {
            store.insert("hawk01", 80 + i, 1 + (i % 5) as u8);
            clock.advance(secs(2));
        }

        let wide = store.range("hawk01", 60);
        for w in 1..60 {
            let narrow = store.range("hawk01", w);
            assert!(narrow.len() <= wide.len());
            assert_eq!(narrow.as_slice(), &wide[wide.len() - narrow.len()..]);
        }
    }

    #[test]
    fn test_stats_zone_counts() {
        let (store, _) = store();

        for zone in [1, 1, 2, 3, 5] {
            store.insert("wolf11", 120, zone);
        }

        let stats = store.stats("wolf11", 60).unwrap();
        assert_eq!(stats.count, 5);
        let zones: Vec<(u8, u32)> = stats.time_in_zone.into_iter().collect();
        assert_eq!(zones, vec![(1, 2), (2, 1), (3, 1), (4, 0), (5, 1)]);
    }

    #[test]
    fn test_stats_invariants() {
        let (store, clock) = store();

        for bpm in [55, 180, 97, 133, 61, 250, 30] {
            store.insert("lynx42", bpm, 3);
            clock.advance(secs(1));
        }

        for window in [1, 2, 5, 60] {
            let range = store.range("lynx42", window);
            let stats = store.stats("lynx42", window);
            assert_eq!(stats.is_none(), range.is_empty());

            if let Some(stats) = stats {
                assert!(stats.min <= stats.avg && stats.avg <= stats.max);
                let total: u32 = stats.time_in_zone.values().sum();
                assert_eq!(total as usize, stats.count);
            }
        }
    }

    #[test]
    fn test_expired_reading_hidden_before_sweep() {
        let (store, clock) = store();

        store.insert("orca05", 90, 2);
        clock.advance(Duration::minutes(30) + secs(1));

        // Not swept yet, but no query may surface it.
        assert_eq!(store.reading_count("orca05"), 1);
        assert!(store.latest("orca05").is_none());
        assert!(store.range("orca05", 1800).is_empty());
        assert!(store.stats("orca05", 1800).is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let (store, clock) = store();

        store.insert("orca05", 90, 2);
        clock.advance(Duration::minutes(30) - secs(1));
        assert!(store.latest("orca05").is_some());

        clock.advance(secs(1));
        assert!(store.latest("orca05").is_none());
    }

    #[test]
    fn test_insert_prunes_own_session() {
        let (store, clock) = store();

        store.insert("bear10", 80, 1);
        store.insert("bear10", 81, 1);
        store.insert("fox20", 82, 1);
        clock.advance(Duration::minutes(31));
        store.insert("bear10", 83, 2);

        assert_eq!(store.reading_count("bear10"), 1);
        // Other sessions are left for the sweep.
        assert_eq!(store.reading_count("fox20"), 1);
    }

    #[test]
    fn test_sweep_removes_empty_sessions() {
        let (store, clock) = store();

        store.insert("bear10", 80, 1);
        store.insert("bear10", 81, 1);
        clock.advance(Duration::minutes(20));
        store.insert("fox20", 82, 1);
        clock.advance(Duration::minutes(11));

        let report = store.sweep();
        assert_eq!(
            report,
            SweepReport {
                readings_removed: 2,
                sessions_removed: 1,
            }
        );
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.reading_count("bear10"), 0);
        assert_eq!(store.reading_count("fox20"), 1);

        assert!(store.sweep().is_empty());
    }

    #[test]
    fn test_is_active() {
        let (store, clock) = store();

        assert!(!store.is_active("raven33", secs(10)));
        store.insert("raven33", 100, 3);
        assert!(store.is_active("raven33", secs(10)));
        clock.advance(secs(10));
        assert!(!store.is_active("raven33", secs(10)));
    }

    #[test]
    fn test_short_ttl_caps_window() {
        let clock = Arc::new(ManualClock::default());
        let store = ReadingStore::with_clock(std::time::Duration::from_secs(5), clock.clone());

        store.insert("viper12", 100, 3);
        clock.advance(secs(6));
        assert!(store.range("viper12", 1800).is_empty());
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Arc::new(ReadingStore::default());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.insert("cobra77", 60 + (i % 100), 1 + (t % 5) as u8);
                        let _ = store.stats("cobra77", 60);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.reading_count("cobra77"), 800);
    }

    /// Clock whose first read blocks for a while, then reports `base`.
    /// Later reads report `base + 5s`.
    struct SlowFirstClock {
        base: DateTime<Utc>,
        first: std::sync::atomic::AtomicBool,
        entered: std::sync::Mutex<std::sync::mpsc::Sender<()>>,
    }

    impl Clock for SlowFirstClock {
        fn now(&self) -> DateTime<Utc> {
            if self.first.swap(false, std::sync::atomic::Ordering::SeqCst) {
                let _ = self.entered.lock().unwrap().send(());
                std::thread::sleep(std::time::Duration::from_millis(200));
                self.base
            } else {
                self.base + secs(5)
            }
        }
    }

    #[test]
    fn test_concurrent_inserts_stay_time_ordered() {
        let (tx, rx) = std::sync::mpsc::channel();
        let clock = Arc::new(SlowFirstClock {
            base: Utc::now(),
            first: std::sync::atomic::AtomicBool::new(true),
            entered: std::sync::Mutex::new(tx),
        });
        let store = Arc::new(ReadingStore::with_clock(DEFAULT_TTL, clock.clone()));

        let slow = {
            let store = store.clone();
            std::thread::spawn(move || store.insert("tiger07", 70, 1))
        };
        rx.recv().unwrap();
        let fast = {
            let store = store.clone();
            std::thread::spawn(move || store.insert("tiger07", 99, 4))
        };
        slow.join().unwrap();
        fast.join().unwrap();

        let all = store.range("tiger07", 1800);
        let order: Vec<u16> = all.iter().map(|r| r.bpm).collect();
        assert_eq!(order, vec![70, 99]);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(store.latest("tiger07").unwrap().bpm, 99);

        let narrow = store.range("tiger07", 1);
        assert_eq!(narrow.as_slice(), &all[all.len() - narrow.len()..]);
    }
}
