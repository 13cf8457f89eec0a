use super::*;
use crate::ad::AdId;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Fake in-memory store.
///
/// Useful for unit-tests and throwaway runs; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryAdStore(Mutex<BTreeMap<AdId, Ad>>);

impl InMemoryAdStore {
    pub fn new() -> Self {
        Self(Mutex::new(BTreeMap::default()))
    }

    pub fn new_shared() -> SharedAdStore {
        Arc::new(Self::new())
    }
}

impl AdStore for InMemoryAdStore {
    fn get(&self, id: AdIdRef) -> Result<Option<Ad>> {
        Ok(self.0.lock().get(id).cloned())
    }

    fn insert(&self, id: AdIdRef, ad: Ad) -> Result<()> {
        self.0.lock().insert(id.to_owned(), ad);
        Ok(())
    }

    fn remove(&self, id: AdIdRef) -> Result<Option<Ad>> {
        Ok(self.0.lock().remove(id))
    }

    fn values(&self) -> Result<Vec<Ad>> {
        Ok(self.0.lock().values().cloned().collect())
    }
}
