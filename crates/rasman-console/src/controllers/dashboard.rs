//! Dashboard: four stat cards fetched concurrently.
//!
//! Every stat has its own timeout and its own error state.  A grace timer
//! armed at the start of each load forces stats that are still loading into
//! error and retries them once.  Each load bumps a generation counter and
//! each fetch of a stat bumps that stat's attempt counter; a result whose
//! generation or attempt is no longer the latest is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rasman_shared::constants::{
    DASHBOARD_GRACE_PERIOD, DASHBOARD_RETRY_TIMEOUT, DASHBOARD_STAT_TIMEOUT,
};
use rasman_store::Settings;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    ActiveSessions,
    ChatRooms,
    TotalUsers,
    Version,
}

impl Stat {
    pub const ALL: [Stat; 4] = [
        Stat::ActiveSessions,
        Stat::ChatRooms,
        Stat::TotalUsers,
        Stat::Version,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Stat::ActiveSessions => "Active Sessions",
            Stat::ChatRooms => "Chat Rooms",
            Stat::TotalUsers => "Total Users",
            Stat::Version => "RAS Version",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Stat::ActiveSessions => "material/person_raised_hand",
            Stat::ChatRooms => "material/chat",
            Stat::TotalUsers => "material/group",
            Stat::Version => "material/info",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatValue {
    Loading,
    Ready(String),
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub generation: u64,
    pub values: [StatValue; 4],
}

impl DashboardSnapshot {
    pub fn get(&self, stat: Stat) -> &StatValue {
        &self.values[stat.index()]
    }

    pub fn is_settled(&self) -> bool {
        !self.values.contains(&StatValue::Loading)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardTimings {
    pub stat_timeout: Duration,
    pub grace_period: Duration,
    pub retry_timeout: Duration,
}

impl Default for DashboardTimings {
    fn default() -> Self {
        Self {
            stat_timeout: DASHBOARD_STAT_TIMEOUT,
            grace_period: DASHBOARD_GRACE_PERIOD,
            retry_timeout: DASHBOARD_RETRY_TIMEOUT,
        }
    }
}

struct Stats {
    values: [StatValue; 4],
    attempts: [u64; 4],
}

impl Stats {
    /// Mark `stat` as refetched and return the attempt number to write with.
    fn begin_attempt(&mut self, stat: Stat) -> u64 {
        self.attempts[stat.index()] += 1;
        self.attempts[stat.index()]
    }
}

pub struct DashboardController {
    state: AppState,
    timings: DashboardTimings,
    generation: AtomicU64,
    stats: Mutex<Stats>,
    grace: Mutex<Option<JoinHandle<()>>>,
    follower: Mutex<Option<JoinHandle<()>>>,
    changed: Notify,
    weak: Weak<Self>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl DashboardController {
    pub fn new(state: AppState) -> Arc<Self> {
        Self::with_timings(state, DashboardTimings::default())
    }

    pub fn with_timings(state: AppState, timings: DashboardTimings) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state,
            timings,
            generation: AtomicU64::new(0),
            stats: Mutex::new(Stats {
                values: std::array::from_fn(|_| StatValue::Loading),
                attempts: [0; 4],
            }),
            grace: Mutex::new(None),
            follower: Mutex::new(None),
            changed: Notify::new(),
            weak: weak.clone(),
        })
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            generation: self.generation.load(Ordering::Acquire),
            values: lock(&self.stats).values.clone(),
        }
    }

    /// Resolves on the next stat change.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Fetch all four stats.  Supersedes any load still in flight and its
    /// grace timer.
    pub async fn load(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let attempts = {
            let mut stats = lock(&self.stats);
            stats.values = std::array::from_fn(|_| StatValue::Loading);
            Stat::ALL.map(|stat| stats.begin_attempt(stat))
        };
        self.changed.notify_waiters();
        self.arm_grace(generation);

        let timeout = self.timings.stat_timeout;
        let [sessions, rooms, users, version] = attempts;
        tokio::join!(
            self.fetch_into(generation, Stat::ActiveSessions, sessions, timeout),
            self.fetch_into(generation, Stat::ChatRooms, rooms, timeout),
            self.fetch_into(generation, Stat::TotalUsers, users, timeout),
            self.fetch_into(generation, Stat::Version, version, timeout),
        );
        debug!(generation, "Dashboard load finished");
        // The grace timer is left to fire; it finds nothing lingering.
    }

    /// Reload whenever settings are saved.  Replaces any previous follower.
    pub fn follow_settings(&self, mut changes: watch::Receiver<Settings>) {
        let weak = self.weak.clone();
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                info!("Settings changed, reloading dashboard");
                controller.load().await;
            }
        });
        if let Some(previous) = lock(&self.follower).replace(task) {
            previous.abort();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    async fn fetch_into(&self, generation: u64, stat: Stat, attempt: u64, timeout: Duration) {
        let value = match tokio::time::timeout(timeout, self.fetch_stat(stat)).await {
            Ok(Some(value)) => StatValue::Ready(value),
            Ok(None) => StatValue::Error,
            Err(_) => {
                warn!(stat = stat.title(), ?timeout, "Dashboard stat timed out");
                StatValue::Error
            }
        };

        {
            let mut stats = lock(&self.stats);
            if !self.is_current(generation) || stats.attempts[stat.index()] != attempt {
                debug!(stat = stat.title(), generation, attempt, "Dropping superseded stat");
                return;
            }
            stats.values[stat.index()] = value;
        }
        self.changed.notify_waiters();
    }

    async fn fetch_stat(&self, stat: Stat) -> Option<String> {
        let api = &self.state.api;
        match stat {
            Stat::ActiveSessions => api
                .fetch_active_session_count()
                .await
                .map(|n| n.to_string()),
            Stat::ChatRooms => api.fetch_chat_rooms().await.map(|r| r.len().to_string()),
            Stat::TotalUsers => api.fetch_total_users().await.map(|n| n.to_string()),
            Stat::Version => api.fetch_version_info().await.map(|v| v.version),
        }
    }

    // -----------------------------------------------------------------------
    // Grace timer
    // -----------------------------------------------------------------------

    fn arm_grace(&self, generation: u64) {
        let weak = self.weak.clone();
        let grace_period = self.timings.grace_period;
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            if let Some(controller) = weak.upgrade() {
                controller.expire_grace(generation).await;
            }
        });
        if let Some(previous) = lock(&self.grace).replace(task) {
            previous.abort();
        }
    }

    /// Force lingering stats into error, then give them one more try.
    async fn expire_grace(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        // Bumping the attempt drops whatever the original fetch returns later.
        let mut lingering = Vec::new();
        {
            let mut stats = lock(&self.stats);
            for stat in Stat::ALL {
                if stats.values[stat.index()] == StatValue::Loading {
                    stats.values[stat.index()] = StatValue::Error;
                    lingering.push((stat, stats.begin_attempt(stat)));
                }
            }
        }
        if lingering.is_empty() {
            return;
        }

        warn!(count = lingering.len(), "Dashboard stats still loading after grace period, retrying");
        self.changed.notify_waiters();
        let timeout = self.timings.retry_timeout;
        join_all(
            lingering
                .into_iter()
                .map(|(stat, attempt)| self.fetch_into(generation, stat, attempt, timeout)),
        )
        .await;
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        for slot in [&self.grace, &self.follower] {
            if let Some(task) = lock(slot).take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::state_for;
    use rasman_api::fake::{FakeRas, FakeState, Route};

    fn seeded() -> FakeState {
        FakeState::default()
            .with_user("alice")
            .with_user("bob")
            .with_user("carol")
            .with_session("alice")
            .with_session("bob")
            .with_room("lobby")
    }

    fn ready(value: &str) -> StatValue {
        StatValue::Ready(value.to_string())
    }

    #[tokio::test]
    async fn test_load_fills_every_stat() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::new(state);

        assert_eq!(dashboard.snapshot().get(Stat::Version), &StatValue::Loading);
        dashboard.load().await;

        let snapshot = dashboard.snapshot();
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.get(Stat::ActiveSessions), &ready("2"));
        assert_eq!(snapshot.get(Stat::ChatRooms), &ready("1"));
        assert_eq!(snapshot.get(Stat::TotalUsers), &ready("3"));
        assert_eq!(snapshot.get(Stat::Version), &ready("0.11.0"));
    }

    #[tokio::test]
    async fn test_one_hanging_stat_does_not_spoil_the_others() {
        let ras = FakeRas::start_with(seeded().hanging(Route::Version))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::with_timings(
            state,
            DashboardTimings {
                stat_timeout: Duration::from_millis(200),
                grace_period: Duration::from_secs(5),
                retry_timeout: Duration::from_millis(100),
            },
        );
        dashboard.load().await;

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.get(Stat::ActiveSessions), &ready("2"));
        assert_eq!(snapshot.get(Stat::ChatRooms), &ready("1"));
        assert_eq!(snapshot.get(Stat::TotalUsers), &ready("3"));
        assert_eq!(snapshot.get(Stat::Version), &StatValue::Error);
    }

    #[tokio::test]
    async fn test_grace_period_forces_error_and_retries_once() {
        let ras = FakeRas::start_with(seeded().hanging(Route::Rooms))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::with_timings(
            state,
            DashboardTimings {
                stat_timeout: Duration::from_secs(30),
                grace_period: Duration::from_millis(150),
                retry_timeout: Duration::from_millis(100),
            },
        );

        let loader = dashboard.clone();
        let _load = tokio::spawn(async move { loader.load().await });
        tokio::time::sleep(Duration::from_millis(600)).await;

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.get(Stat::ChatRooms), &StatValue::Error);
        assert_eq!(snapshot.get(Stat::TotalUsers), &ready("3"));
        assert_eq!(snapshot.get(Stat::Version), &ready("0.11.0"));
        assert_eq!(ras.requests_matching("GET /chat/room/public").len(), 2);
    }

    #[tokio::test]
    async fn test_successful_retry_outlives_the_original_timeout() {
        let ras = FakeRas::start_with(seeded().hanging(Route::Rooms))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::with_timings(
            state,
            DashboardTimings {
                stat_timeout: Duration::from_secs(1),
                grace_period: Duration::from_millis(150),
                retry_timeout: Duration::from_millis(500),
            },
        );

        let loader = dashboard.clone();
        let load = tokio::spawn(async move { loader.load().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        ras.state().hanging.clear();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(dashboard.snapshot().get(Stat::ChatRooms), &ready("1"));

        // the original rooms fetch times out here and must not win
        load.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(dashboard.snapshot().get(Stat::ChatRooms), &ready("1"));
        assert_eq!(ras.requests_matching("GET /chat/room/public").len(), 2);
    }

    #[tokio::test]
    async fn test_superseded_results_are_dropped() {
        let ras = FakeRas::start_with(seeded().hanging(Route::Users))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::with_timings(
            state,
            DashboardTimings {
                stat_timeout: Duration::from_millis(300),
                grace_period: Duration::from_secs(5),
                retry_timeout: Duration::from_millis(100),
            },
        );

        let loader = dashboard.clone();
        let first = tokio::spawn(async move { loader.load().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        ras.state().hanging.clear();
        dashboard.load().await;
        assert_eq!(dashboard.snapshot().generation, 2);
        assert_eq!(dashboard.snapshot().get(Stat::TotalUsers), &ready("3"));

        // the first load's user stat times out after this point
        first.await.unwrap();
        assert_eq!(dashboard.snapshot().get(Stat::TotalUsers), &ready("3"));
    }

    #[tokio::test]
    async fn test_settings_save_triggers_reload() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, []);
        let dashboard = DashboardController::new(state.clone());
        dashboard.follow_settings(state.settings.subscribe());
        tokio::task::yield_now().await;

        state.settings.set_admin_screen_name("admin").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(ras.requests_matching("GET /version").len(), 1);
        assert!(dashboard.snapshot().is_settled());
    }
}
