//! Durable storage of ads
//!
//! The store is a plain ordered key-value map from ad id to the whole
//! ad record (bids included). It knows nothing about the rules of the
//! auction; that lives in [`crate::service::ad_engine`].
//!
//! Every mutation must be durable by the time the call returns. There
//! are no multi-record transactions: the engine only ever reads and
//! writes back a single ad per operation, so single-key atomicity is
//! all we ask of a backend.
mod in_memory;
mod journal;
mod postgres;

pub use self::{in_memory::*, journal::*, postgres::*};

use crate::ad::{Ad, AdIdRef};
use anyhow::Result;
use std::sync::Arc;

pub trait AdStore {
    fn get(&self, id: AdIdRef) -> Result<Option<Ad>>;

    /// Insert or silently overwrite
    fn insert(&self, id: AdIdRef, ad: Ad) -> Result<()>;

    fn remove(&self, id: AdIdRef) -> Result<Option<Ad>>;

    /// Snapshot of every stored ad, ordered by id
    fn values(&self) -> Result<Vec<Ad>>;
}

pub type SharedAdStore = Arc<dyn AdStore + Send + Sync + 'static>;
