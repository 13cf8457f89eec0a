//! Read-only access to ads
use crate::ad::{Ad, AdError, AdIdRef, OwnerIdRef};
use crate::persistence::SharedAdStore;
use std::sync::Arc;

pub type SharedAdQuery = Arc<AdQuery>;

/// Fetch a single ad, treating a missing one as [`AdError::NotFound`]
pub fn load_ad(store: &SharedAdStore, id: AdIdRef) -> Result<Ad, AdError> {
    store
        .get(id)?
        .ok_or_else(|| AdError::NotFound(id.to_owned()))
}

pub struct AdQuery {
    store: SharedAdStore,
}

impl AdQuery {
    pub fn new(store: SharedAdStore) -> Self {
        Self { store }
    }

    pub fn new_shared(store: SharedAdStore) -> SharedAdQuery {
        Arc::new(Self::new(store))
    }

    /// Every ad in the store; no ads at all is not an error
    pub fn get_all_ads(&self) -> Result<Vec<Ad>, AdError> {
        Ok(self.store.values()?)
    }

    pub fn get_ad_by_id(&self, id: AdIdRef) -> Result<Ad, AdError> {
        load_ad(&self.store, id)
    }

    /// Unlike [`Self::get_all_ads`], an empty result is reported as
    /// [`AdError::NoAdsForOwner`].
    pub fn get_ads_by_owner(&self, owner: OwnerIdRef) -> Result<Vec<Ad>, AdError> {
        let ads: Vec<_> = self
            .store
            .values()?
            .into_iter()
            .filter(|ad| ad.is_owned_by(owner))
            .collect();

        if ads.is_empty() {
            return Err(AdError::NoAdsForOwner(owner.to_owned()));
        }
        Ok(ads)
    }
}
