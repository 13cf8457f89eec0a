use super::support::*;
use crate::{ad::*, persistence::AdStore};
use anyhow::Result;
use chrono::Duration;

fn status_update(status: &str) -> UpdateAdPayload {
    UpdateAdPayload {
        status: Some(status.to_owned()),
        ..Default::default()
    }
}

#[test]
fn bike_auction_scenario() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let after_bid = f.engine.bid_on_ad(&ad.id, "x", 100.0)?;
    assert_eq!(
        after_bid.bids,
        vec![Bid {
            bidder: "x".to_owned(),
            amount: 100.0
        }]
    );

    assert!(matches!(
        f.engine.bid_on_ad(&ad.id, "x", 200.0),
        Err(AdError::DuplicateBid(bidder)) if bidder == "x"
    ));
    assert!(matches!(
        f.engine.bid_on_ad(&ad.id, &ad.owner, 300.0),
        Err(AdError::SelfBid)
    ));
    assert!(matches!(
        f.engine.update_ad(&ad.id, "someone-else", status_update("CLOSED")),
        Err(AdError::Unauthorized(OwnerAction::Edit))
    ));

    let closed = f
        .engine
        .update_ad(&ad.id, &ad.owner, status_update("CLOSED"))?;
    assert_eq!(closed.status, AdStatus::Closed);

    assert!(matches!(
        f.engine.bid_on_ad(&ad.id, "y", 400.0),
        Err(AdError::AdClosed)
    ));
    assert_eq!(f.query.get_ad_by_id(&ad.id)?.bids.len(), 1);
    Ok(())
}

#[test]
fn created_ad_starts_open_with_fresh_identity() -> Result<()> {
    let f = Fixture::new();

    let first = f.engine.create_ad(new_ad("bike"))?;
    let second = f.engine.create_ad(new_ad("lamp"))?;

    assert_eq!(first.item_type, "bike");
    assert_eq!(first.item_description, "a used bike");
    assert_eq!(first.status, AdStatus::Open);
    assert!(first.bids.is_empty());
    assert_eq!(first.created_at, start_time());
    assert_eq!(first.updated_at, None);

    assert_ne!(first.id, first.owner);
    assert_ne!(first.id, second.id);
    assert_ne!(first.owner, second.owner);
    Ok(())
}

#[test]
fn created_ad_round_trips_through_the_store() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    assert_eq!(f.store.get(&ad.id)?.as_ref(), Some(&ad));
    assert_eq!(f.query.get_ad_by_id(&ad.id)?, ad);
    Ok(())
}

#[test]
fn non_owner_cannot_update_or_delete() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let payload = UpdateAdPayload {
        item_type: Some("car".to_owned()),
        item_description: Some("stolen".to_owned()),
        status: Some("BOUGHT".to_owned()),
    };
    assert!(matches!(
        f.engine.update_ad(&ad.id, "intruder", payload),
        Err(AdError::Unauthorized(OwnerAction::Edit))
    ));
    assert!(matches!(
        f.engine.delete_ad(&ad.id, "intruder"),
        Err(AdError::Unauthorized(OwnerAction::Delete))
    ));

    assert_eq!(f.query.get_ad_by_id(&ad.id)?, ad);
    Ok(())
}

#[test]
fn ownership_is_checked_before_status() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    assert!(matches!(
        f.engine.update_ad(&ad.id, "intruder", status_update("SOLD")),
        Err(AdError::Unauthorized(_))
    ));
    assert!(matches!(
        f.engine.update_ad("missing", "intruder", status_update("SOLD")),
        Err(AdError::NotFound(id)) if id == "missing"
    ));
    Ok(())
}

#[test]
fn invalid_status_leaves_ad_unchanged() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let payload = UpdateAdPayload {
        item_type: Some("car".to_owned()),
        item_description: None,
        status: Some("closed".to_owned()),
    };
    assert!(matches!(
        f.engine.update_ad(&ad.id, &ad.owner, payload),
        Err(AdError::InvalidStatus(s)) if s == "closed"
    ));

    assert_eq!(f.query.get_ad_by_id(&ad.id)?, ad);
    Ok(())
}

#[test]
fn partial_update_changes_only_given_fields() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;
    let now = f.clock.advance(Duration::minutes(10));

    let updated = f.engine.update_ad(
        &ad.id,
        &ad.owner,
        UpdateAdPayload {
            item_type: Some("".to_owned()),
            item_description: Some("new desc".to_owned()),
            status: Some("".to_owned()),
        },
    )?;

    assert_eq!(
        updated,
        Ad {
            item_description: "new desc".to_owned(),
            updated_at: Some(now),
            ..ad
        }
    );
    assert_eq!(f.query.get_ad_by_id(&updated.id)?, updated);
    Ok(())
}

#[test]
fn every_update_bumps_updated_at() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let first = f.clock.advance(Duration::seconds(1));
    let ad = f
        .engine
        .update_ad(&ad.id, &ad.owner, UpdateAdPayload::default())?;
    assert_eq!(ad.updated_at, Some(first));

    let second = f.clock.advance(Duration::seconds(1));
    let ad = f
        .engine
        .update_ad(&ad.id, &ad.owner, status_update("OPEN"))?;
    assert_eq!(ad.updated_at, Some(second));
    assert_eq!(ad.created_at, start_time());
    Ok(())
}

#[test]
fn owner_can_delete() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;
    let ad = f.engine.bid_on_ad(&ad.id, "x", 5.0)?;

    assert_eq!(f.engine.delete_ad(&ad.id, &ad.owner)?, ad);

    assert!(matches!(
        f.query.get_ad_by_id(&ad.id),
        Err(AdError::NotFound(_))
    ));
    assert!(matches!(
        f.engine.delete_ad(&ad.id, &ad.owner),
        Err(AdError::NotFound(_))
    ));
    assert!(f.query.get_all_ads()?.is_empty());
    Ok(())
}

#[test]
fn bidding_on_unknown_ad_fails() {
    let f = Fixture::new();

    assert!(matches!(
        f.engine.bid_on_ad("nope", "x", 1.0),
        Err(AdError::NotFound(id)) if id == "nope"
    ));
}

#[test]
fn accepted_bids_have_distinct_non_owner_bidders_in_insertion_order() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let attempts = [
        ("a", 30.0, None),
        ("b", 10.0, None),
        ("a", 50.0, Some("DUPLICATE_BID")),
        (ad.owner.as_str(), 70.0, Some("SELF_BID")),
        ("c", 20.0, None),
        ("b", 90.0, Some("DUPLICATE_BID")),
    ];
    for (bidder, amount, expected) in attempts {
        let outcome = f.engine.bid_on_ad(&ad.id, bidder, amount);
        assert_eq!(
            outcome.err().map(|e| e.kind()),
            expected,
            "bid of {amount} by {bidder}"
        );
    }

    let bids = f.query.get_ad_by_id(&ad.id)?.bids;
    assert_eq!(
        bids.iter()
            .map(|bid| (bid.bidder.as_str(), bid.amount))
            .collect::<Vec<_>>(),
        vec![("a", 30.0), ("b", 10.0), ("c", 20.0)]
    );
    Ok(())
}

#[test]
fn bids_never_change_status() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let ad = f.engine.bid_on_ad(&ad.id, "x", 1_000_000.0)?;

    assert_eq!(ad.status, AdStatus::Open);
    assert_eq!(ad.updated_at, None);
    Ok(())
}

#[test]
fn no_bids_once_ad_is_not_open() -> Result<()> {
    for status in ["CLOSED", "BOUGHT"] {
        let f = Fixture::new();
        let ad = f.engine.create_ad(new_ad("bike"))?;
        f.engine.bid_on_ad(&ad.id, "x", 1.0)?;
        f.engine.update_ad(&ad.id, &ad.owner, status_update(status))?;

        for bidder in ["y", "x", ad.owner.as_str()] {
            assert!(matches!(
                f.engine.bid_on_ad(&ad.id, bidder, 2.0),
                Err(AdError::AdClosed)
            ));
        }
        assert_eq!(f.query.get_ad_by_id(&ad.id)?.bids.len(), 1);
    }
    Ok(())
}

#[test]
fn status_transitions_are_unconstrained() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let bought = f
        .engine
        .update_ad(&ad.id, &ad.owner, status_update("BOUGHT"))?;
    assert_eq!(bought.status, AdStatus::Bought);

    let reopened = f
        .engine
        .update_ad(&ad.id, &ad.owner, status_update("OPEN"))?;
    assert_eq!(reopened.status, AdStatus::Open);

    f.engine.bid_on_ad(&ad.id, "x", 1.0)?;
    Ok(())
}

#[test]
fn fractional_bids_are_accepted_as_given() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    let ad = f.engine.bid_on_ad(&ad.id, "x", 99.5)?;
    let ad = f.engine.bid_on_ad(&ad.id, "y", 0.01)?;

    assert_eq!(
        f.query.get_ad_by_id(&ad.id)?.bids,
        vec![
            Bid {
                bidder: "x".to_owned(),
                amount: 99.5
            },
            Bid {
                bidder: "y".to_owned(),
                amount: 0.01
            },
        ]
    );
    Ok(())
}

#[test]
fn non_finite_amounts_are_rejected() -> Result<()> {
    let f = Fixture::new();
    let ad = f.engine.create_ad(new_ad("bike"))?;

    for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            f.engine.bid_on_ad(&ad.id, "x", amount),
            Err(AdError::InvalidAmount(_))
        ));
    }
    assert!(f.query.get_ad_by_id(&ad.id)?.bids.is_empty());
    Ok(())
}

#[test]
fn missing_ad_is_reported_the_same_by_every_operation() -> Result<()> {
    let f = Fixture::new();
    f.engine.create_ad(new_ad("bike"))?;

    let failures = [
        f.query.get_ad_by_id("ghost").err(),
        f.engine
            .update_ad("ghost", "anyone", UpdateAdPayload::default())
            .err(),
        f.engine.delete_ad("ghost", "anyone").err(),
        f.engine.bid_on_ad("ghost", "x", 1.0).err(),
    ];
    for failure in failures {
        assert!(matches!(&failure, Some(AdError::NotFound(id)) if id == "ghost"));
        assert_eq!(
            failure.map(|e| e.to_string()).as_deref(),
            Some("ad with id of ghost has not been found")
        );
    }
    Ok(())
}
