use crate::{
    ad::{NewAd, Timestamp},
    clock::Clock,
    id::IdGenerator,
    persistence::{InMemoryAdStore, SharedAdStore},
    service::{AdEngine, AdQuery, AppState, SharedAdEngine, SharedAdQuery},
};
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Predictable ids: `id-1`, `id-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds(AtomicU64);

impl IdGenerator for SequentialIds {
    fn new_unique_id(&self) -> String {
        format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock(Mutex<Timestamp>);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut now = self.0.lock();
        *now = *now + by;
        *now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.0.lock()
    }
}

pub fn start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn new_ad(item_type: &str) -> NewAd {
    NewAd {
        item_type: item_type.to_owned(),
        item_description: format!("a used {item_type}"),
    }
}

pub struct Fixture {
    pub store: SharedAdStore,
    pub clock: Arc<ManualClock>,
    pub engine: SharedAdEngine,
    pub query: SharedAdQuery,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(InMemoryAdStore::new_shared())
    }

    pub fn with_store(store: SharedAdStore) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let engine = AdEngine::new_shared(
            store.clone(),
            Arc::new(SequentialIds::default()),
            clock.clone(),
        );
        let query = AdQuery::new_shared(store.clone());
        Self {
            store,
            clock,
            engine,
            query,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            engine: self.engine.clone(),
            query: self.query.clone(),
        }
    }
}
