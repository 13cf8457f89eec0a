//! Ad Lifecycle Engine
//!
//! Validates and applies every state change of an ad: listing it,
//! editing it, taking it down and bidding on it. Each operation loads
//! a single ad, computes the next version and writes it back, or
//! rejects the request leaving the store untouched.
use crate::ad::{
    Ad, AdError, AdIdRef, Amount, Bid, BidderIdRef, NewAd, OwnerAction, OwnerIdRef,
    UpdateAdPayload,
};
use crate::clock::SharedClock;
use crate::id::SharedIdGenerator;
use crate::persistence::SharedAdStore;
use crate::service::load_ad;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

pub type SharedAdEngine = Arc<AdEngine>;

pub struct AdEngine {
    store: SharedAdStore,
    ids: SharedIdGenerator,
    clock: SharedClock,
    /// Serializes read-modify-write cycles against the store
    write_lock: Mutex<()>,
}

impl AdEngine {
    pub fn new(store: SharedAdStore, ids: SharedIdGenerator, clock: SharedClock) -> Self {
        Self {
            store,
            ids,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn new_shared(
        store: SharedAdStore,
        ids: SharedIdGenerator,
        clock: SharedClock,
    ) -> SharedAdEngine {
        Arc::new(Self::new(store, ids, clock))
    }

    /// List a new item
    ///
    /// The owner is minted here, just like the id; callers learn it
    /// from the returned ad and must present it for edits and deletes.
    pub fn create_ad(&self, new_ad: NewAd) -> Result<Ad, AdError> {
        let _guard = self.write_lock.lock();

        let ad = Ad::new(
            self.ids.new_unique_id(),
            self.ids.new_unique_id(),
            new_ad,
            self.clock.now(),
        );
        self.store.insert(&ad.id, ad.clone())?;

        info!(ad_id = %ad.id, owner = %ad.owner, item_type = %ad.item_type, "ad created");
        Ok(ad)
    }

    pub fn update_ad(
        &self,
        id: AdIdRef,
        owner: OwnerIdRef,
        payload: UpdateAdPayload,
    ) -> Result<Ad, AdError> {
        let _guard = self.write_lock.lock();

        let ad = load_ad(&self.store, id)?;
        ad.ensure_owned_by(owner, OwnerAction::Edit)
            .map_err(|e| rejected(id, e))?;
        let update = payload.into_update().map_err(|e| rejected(id, e))?;

        let ad = ad.apply_update(update, self.clock.now());
        self.store.insert(id, ad.clone())?;

        info!(ad_id = %id, status = %ad.status, "ad updated");
        Ok(ad)
    }

    /// Take an ad down for good, returning what was removed
    pub fn delete_ad(&self, id: AdIdRef, owner: OwnerIdRef) -> Result<Ad, AdError> {
        let _guard = self.write_lock.lock();

        let ad = load_ad(&self.store, id)?;
        ad.ensure_owned_by(owner, OwnerAction::Delete)
            .map_err(|e| rejected(id, e))?;

        let removed = self.store.remove(id)?.unwrap_or(ad);

        info!(ad_id = %id, "ad deleted");
        Ok(removed)
    }

    pub fn bid_on_ad(
        &self,
        id: AdIdRef,
        bidder: BidderIdRef,
        amount: Amount,
    ) -> Result<Ad, AdError> {
        let _guard = self.write_lock.lock();

        let ad = load_ad(&self.store, id)?
            .place_bid(Bid {
                bidder: bidder.to_owned(),
                amount,
            })
            .map_err(|e| rejected(id, e))?;
        self.store.insert(id, ad.clone())?;

        info!(ad_id = %id, bidder, amount, bids = ad.bids.len(), "bid placed");
        Ok(ad)
    }
}

fn rejected(id: AdIdRef, e: AdError) -> AdError {
    debug!(ad_id = %id, reason = %e, "request rejected");
    e
}
