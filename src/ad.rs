//! Ads, bids and the rules governing them
//!
//! Everything here is pure: the types know how to validate and apply
//! a change, but loading and storing them is up to the caller.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub type AdId = String;
pub type AdIdRef<'s> = &'s str;
pub type OwnerId = String;
pub type OwnerIdRef<'s> = &'s str;
pub type BidderId = String;
pub type BidderIdRef<'s> = &'s str;
pub type Amount = f64;
pub type Timestamp = DateTime<Utc>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OwnerAction {
    Edit,
    Delete,
}

impl fmt::Display for OwnerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnerAction::Edit => "edit",
            OwnerAction::Delete => "delete",
        })
    }
}

#[derive(Error, Debug)]
pub enum AdError {
    #[error("ad with id of {0} has not been found")]
    NotFound(AdId),
    #[error("no ads found for {0}")]
    NoAdsForOwner(OwnerId),
    #[error("only the owner can {0} the ad")]
    Unauthorized(OwnerAction),
    #[error("invalid status `{0}`, allowed statuses are {allowed}", allowed = AdStatus::allowed())]
    InvalidStatus(String),
    #[error("bid amount must be a finite number, got {0}")]
    InvalidAmount(Amount),
    #[error("ad is no longer open")]
    AdClosed,
    #[error("you can't bid on your own ad")]
    SelfBid,
    #[error("{0} has already bid on this ad")]
    DuplicateBid(BidderId),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AdError {
    /// Stable tag identifying the kind of failure
    pub fn kind(&self) -> &'static str {
        use AdError::*;
        match self {
            NotFound(_) => "NOT_FOUND",
            NoAdsForOwner(_) => "NO_ADS_FOR_OWNER",
            Unauthorized(_) => "UNAUTHORIZED",
            InvalidStatus(_) => "INVALID_STATUS",
            InvalidAmount(_) => "INVALID_AMOUNT",
            AdClosed => "AD_CLOSED",
            SelfBid => "SELF_BID",
            DuplicateBid(_) => "DUPLICATE_BID",
            Store(_) => "STORAGE",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdStatus {
    Open,
    Closed,
    Bought,
}

impl AdStatus {
    pub const ALL: [AdStatus; 3] = [AdStatus::Open, AdStatus::Closed, AdStatus::Bought];

    pub fn as_str(self) -> &'static str {
        match self {
            AdStatus::Open => "OPEN",
            AdStatus::Closed => "CLOSED",
            AdStatus::Bought => "BOUGHT",
        }
    }

    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdStatus {
    type Err = AdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AdError::InvalidStatus(s.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: BidderId,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: AdId,
    pub owner: OwnerId,
    pub item_type: String,
    pub item_description: String,
    pub bids: Vec<Bid>,
    pub status: AdStatus,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

/// What the caller supplies when listing an item
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAd {
    pub item_type: String,
    pub item_description: String,
}

/// Raw update request, as received from a caller
///
/// An empty string is treated the same as a missing field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdPayload {
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub item_description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Validated update: `None` leaves the field as it is
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdUpdate {
    pub item_type: Option<String>,
    pub item_description: Option<String>,
    pub status: Option<AdStatus>,
}

fn provided(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

impl UpdateAdPayload {
    pub fn into_update(self) -> Result<AdUpdate, AdError> {
        Ok(AdUpdate {
            item_type: provided(self.item_type),
            item_description: provided(self.item_description),
            status: provided(self.status)
                .map(|s| s.parse::<AdStatus>())
                .transpose()?,
        })
    }
}

impl Ad {
    pub fn new(id: AdId, owner: OwnerId, new_ad: NewAd, created_at: Timestamp) -> Self {
        Self {
            id,
            owner,
            item_type: new_ad.item_type,
            item_description: new_ad.item_description,
            bids: vec![],
            status: AdStatus::Open,
            created_at,
            updated_at: None,
        }
    }

    pub fn is_owned_by(&self, owner: OwnerIdRef) -> bool {
        self.owner == owner
    }

    pub fn ensure_owned_by(&self, owner: OwnerIdRef, action: OwnerAction) -> Result<(), AdError> {
        if !self.is_owned_by(owner) {
            return Err(AdError::Unauthorized(action));
        }
        Ok(())
    }

    pub fn has_bid_from(&self, bidder: BidderIdRef) -> bool {
        self.bids.iter().any(|bid| bid.bidder == bidder)
    }

    pub fn apply_update(self, update: AdUpdate, now: Timestamp) -> Self {
        Self {
            item_type: update.item_type.unwrap_or(self.item_type),
            item_description: update.item_description.unwrap_or(self.item_description),
            status: update.status.unwrap_or(self.status),
            updated_at: Some(now),
            ..self
        }
    }

    pub fn ensure_valid_bid(&self, bid: &Bid) -> Result<(), AdError> {
        use AdError::*;

        // NaN and infinities would not survive a round trip through JSON
        if !bid.amount.is_finite() {
            return Err(InvalidAmount(bid.amount));
        }
        if self.status != AdStatus::Open {
            return Err(AdClosed);
        }
        if self.is_owned_by(&bid.bidder) {
            return Err(SelfBid);
        }
        if self.has_bid_from(&bid.bidder) {
            return Err(DuplicateBid(bid.bidder.clone()));
        }
        Ok(())
    }

    pub fn place_bid(mut self, bid: Bid) -> Result<Self, AdError> {
        self.ensure_valid_bid(&bid)?;
        self.bids.push(bid);
        Ok(self)
    }
}
