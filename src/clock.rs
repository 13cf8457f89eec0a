use crate::ad::Timestamp;
use chrono::Utc;
use std::sync::Arc;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

pub type SharedClock = Arc<dyn Clock + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    pub fn new_shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
