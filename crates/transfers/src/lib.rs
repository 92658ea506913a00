//! Transfer Engine (spec.md §4.2): the only sanctioned means of changing
//! custody. Two submodes share the same underlying custody-handover step
//! but separate state machines — `Transfer` (request, 1:1, `pending ->
//! {accepted, rejected, cancelled}`) and `TransferOffer` (1:N, `active ->
//! {accepted, expired, cancelled}`, first-accept-wins). The `transfer_type`
//! column on `transfers` is carried over from spec.md §3's data model but
//! this crate only ever writes `Request` rows there; the Offer submode is
//! the dedicated `transfer_offers`/`transfer_offer_recipients` pair.

pub use database::{transfer_offers::TransferOffer, transfers::Transfer};
use {
    chrono::{DateTime, Duration, Utc},
    database::PgTransaction,
    model::{
        ids::{OfferId, PropertyId, TransferId, UserId},
        ledger::EventDetail,
        notification::{NotificationKind, Priority},
        transfer::{OfferStatus, TransferStatus, TransferType},
        Error, Property, Result,
    },
    sqlx::PgPool,
};

fn internal(e: sqlx::Error) -> Error {
    Error::Internal(e.into())
}

/// Reassigns `property` (already row-locked by the caller) and, when
/// `include_components`, every descendant in its component graph. With
/// `include_components=false` and existing components, fails
/// `ComponentSplit` rather than silently severing the edge — the chosen
/// resolution of spec.md §9's open question, keeping "atomic accept" one
/// invariant instead of two different accept behaviors.
async fn reassign_with_components(
    tx: &mut PgTransaction<'_>,
    actor: UserId,
    property: &Property,
    new_holder: UserId,
    include_components: bool,
) -> Result<Property> {
    let descendants = database::property_components::descendants(tx, property.id)
        .await
        .map_err(internal)?;

    if !include_components && !descendants.is_empty() {
        return Err(Error::ComponentSplit);
    }

    let updated = database::properties::reassign(tx, property.id, new_holder, property.version)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::VersionConflict {
            expected: property.version,
            found: property.version,
        })?;

    for edge in descendants {
        let child = database::properties::get_for_update(tx, edge.child_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| Error::not_found(format!("property {}", edge.child_id)))?;
        database::properties::reassign(tx, edge.child_id, new_holder, child.version)
            .await
            .map_err(internal)?
            .ok_or_else(|| Error::VersionConflict {
                expected: child.version,
                found: child.version,
            })?;
        ledger::append(
            tx,
            actor,
            edge.child_id,
            EventDetail::ComponentMoved {
                parent: edge.parent_id,
                child: edge.child_id,
            },
        )
        .await
        .map_err(internal)?;
    }

    Ok(updated)
}

async fn require_assigned_and_verified(property: &Property) -> Result<UserId> {
    if property.current_status != model::property::PropertyStatus::Assigned {
        return Err(Error::validation("property must be assigned to be requested"));
    }
    if !property.verified {
        return Err(Error::not_permitted(
            "unverified property cannot be the subject of a transfer (I5)",
        ));
    }
    property
        .assigned_to_user_id
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("assigned property missing assignee (I2)")))
}

/// `to_user_id` is the requester; `from_user_id` is resolved from the
/// property's current holder. Requires an accepted connection between the
/// two (spec.md §4.5) and `verified=true` (I5, spec.md testable property 7).
pub async fn request_by_id(
    pool: &PgPool,
    requester: UserId,
    property_id: PropertyId,
    include_components: bool,
    notes: Option<String>,
) -> Result<Transfer> {
    let mut conn = pool.acquire().await.map_err(internal)?;
    let property = database::properties::get_by_id(&mut conn, property_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("property {property_id}")))?;
    let holder = require_assigned_and_verified(&property).await?;
    if holder == requester {
        return Err(Error::validation("cannot request a property you already hold"));
    }
    if !connections::is_connected(pool, holder, requester).await? {
        return Err(Error::not_permitted(
            "no accepted connection between requester and holder",
        ));
    }
    drop(conn);

    let mut tx = pool.begin().await.map_err(internal)?;
    let transfer = database::transfers::insert(
        &mut tx,
        property_id,
        holder,
        requester,
        requester,
        TransferType::Request,
        include_components,
        None,
        notes.as_deref(),
    )
    .await
    .map_err(internal)?;

    ledger::append(
        &mut tx,
        requester,
        property_id,
        EventDetail::TransferRequested {
            transfer_id: transfer.id,
        },
    )
    .await
    .map_err(internal)?;

    notifications::create(
        &mut tx,
        holder,
        NotificationKind::TransferRequested,
        "Transfer requested",
        &format!("A transfer of property {property_id} has been requested"),
        serde_json::json!({"transfer_id": transfer.id.get(), "property_id": property_id.get()}),
        Priority::Normal,
        None,
    )
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;
    Ok(transfer)
}

pub async fn request_by_serial(
    pool: &PgPool,
    requester: UserId,
    serial_number: &str,
    include_components: bool,
    notes: Option<String>,
) -> Result<Transfer> {
    let mut conn = pool.acquire().await.map_err(internal)?;
    let property = database::properties::get_by_serial(&mut conn, serial_number)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("property with serial {serial_number}")))?;
    drop(conn);
    request_by_id(pool, requester, property.id, include_components, notes).await
}

/// The authorizer for a Request-type Transfer is the current holder
/// (`from_user_id`).
pub async fn accept(pool: &PgPool, actor: UserId, transfer_id: TransferId) -> Result<Transfer> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let transfer = database::transfers::get_for_update(&mut tx, transfer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
    if transfer.status != TransferStatus::Pending {
        return Err(Error::validation(format!(
            "transfer {transfer_id} is already resolved"
        )));
    }
    if actor != transfer.from_user_id {
        return Err(Error::not_permitted(
            "only the current holder may accept a transfer request",
        ));
    }

    let property = database::properties::get_for_update(&mut tx, transfer.property_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("property {}", transfer.property_id)))?;
    reassign_with_components(
        &mut tx,
        actor,
        &property,
        transfer.to_user_id,
        transfer.include_components,
    )
    .await?;

    let resolved = database::transfers::resolve(&mut tx, transfer_id, TransferStatus::Accepted)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::validation(format!("transfer {transfer_id} is already resolved")))?;

    ledger::append(
        &mut tx,
        actor,
        transfer.property_id,
        EventDetail::TransferAccepted { transfer_id },
    )
    .await
    .map_err(internal)?;

    notifications::create(
        &mut tx,
        transfer.to_user_id,
        NotificationKind::TransferAccepted,
        "Transfer accepted",
        &format!("Your request for property {} was accepted", transfer.property_id),
        serde_json::json!({"transfer_id": transfer_id.get()}),
        Priority::Normal,
        None,
    )
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;
    Ok(resolved)
}

/// Only the initiator may cancel, and only from `pending`.
pub async fn cancel(pool: &PgPool, actor: UserId, transfer_id: TransferId) -> Result<Transfer> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let transfer = database::transfers::get_for_update(&mut tx, transfer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
    if transfer.initiator_id != actor {
        return Err(Error::not_permitted("only the initiator may cancel this transfer"));
    }
    let resolved = database::transfers::resolve(&mut tx, transfer_id, TransferStatus::Cancelled)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::validation(format!("transfer {transfer_id} is not pending")))?;

    ledger::append(
        &mut tx,
        actor,
        transfer.property_id,
        EventDetail::TransferCancelled { transfer_id },
    )
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;
    Ok(resolved)
}

/// Only the counter-party (the holder, `from_user_id`) may reject.
pub async fn reject(
    pool: &PgPool,
    actor: UserId,
    transfer_id: TransferId,
    reason: Option<String>,
) -> Result<Transfer> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let transfer = database::transfers::get_for_update(&mut tx, transfer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
    if actor != transfer.from_user_id {
        return Err(Error::not_permitted(
            "only the current holder may reject a transfer request",
        ));
    }
    let resolved = database::transfers::resolve(&mut tx, transfer_id, TransferStatus::Rejected)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::validation(format!("transfer {transfer_id} is not pending")))?;

    ledger::append(
        &mut tx,
        actor,
        transfer.property_id,
        EventDetail::TransferRejected {
            transfer_id,
            reason,
        },
    )
    .await
    .map_err(internal)?;

    notifications::create(
        &mut tx,
        transfer.to_user_id,
        NotificationKind::TransferRejected,
        "Transfer rejected",
        &format!("Your request for property {} was rejected", transfer.property_id),
        serde_json::json!({"transfer_id": transfer_id.get()}),
        Priority::Normal,
        None,
    )
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;
    Ok(resolved)
}

/// Offerer must hold the property; recipients are deduplicated and each
/// must have an accepted connection with the offerer.
pub async fn create_offer(
    pool: &PgPool,
    offerer: UserId,
    property_id: PropertyId,
    recipients: Vec<UserId>,
    include_components: bool,
    notes: Option<String>,
    expires_in_days: Option<i64>,
) -> Result<TransferOffer> {
    let mut dedup: Vec<UserId> = Vec::new();
    for r in recipients {
        if !dedup.contains(&r) {
            dedup.push(r);
        }
    }
    if dedup.is_empty() {
        return Err(Error::validation("an offer needs at least one recipient"));
    }

    let mut conn = pool.acquire().await.map_err(internal)?;
    let property = database::properties::get_by_id(&mut conn, property_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("property {property_id}")))?;
    if property.assigned_to_user_id != Some(offerer) {
        return Err(Error::not_permitted("only the current holder may offer this property"));
    }
    if !property.verified {
        return Err(Error::not_permitted(
            "unverified property cannot be offered (I5)",
        ));
    }
    for recipient in &dedup {
        if !connections::is_connected(pool, offerer, *recipient).await? {
            return Err(Error::not_permitted(format!(
                "no accepted connection between offerer and recipient {recipient}"
            )));
        }
    }
    drop(conn);

    let expires_at: Option<DateTime<Utc>> =
        expires_in_days.map(|days| Utc::now() + Duration::days(days));

    let mut tx = pool.begin().await.map_err(internal)?;
    let offer = database::transfer_offers::insert(
        &mut tx,
        property_id,
        offerer,
        include_components,
        notes.as_deref(),
        expires_at,
    )
    .await
    .map_err(internal)?;
    database::transfer_offers::insert_recipients(&mut tx, offer.id, &dedup)
        .await
        .map_err(internal)?;

    ledger::append(
        &mut tx,
        offerer,
        property_id,
        EventDetail::OfferCreated { offer_id: offer.id },
    )
    .await
    .map_err(internal)?;

    for recipient in &dedup {
        ledger::append(
            &mut tx,
            offerer,
            property_id,
            EventDetail::OfferNotified {
                offer_id: offer.id,
                recipient: *recipient,
            },
        )
        .await
        .map_err(internal)?;

        notifications::create(
            &mut tx,
            *recipient,
            NotificationKind::OfferReceived,
            "New transfer offer",
            &format!("You have been offered property {property_id}"),
            serde_json::json!({"offer_id": offer.id.get(), "property_id": property_id.get()}),
            Priority::Normal,
            expires_at,
        )
        .await
        .map_err(internal)?;
    }

    tx.commit().await.map_err(internal)?;
    Ok(offer)
}

/// First-accept-wins (I8, spec.md testable property 4): a loser observes
/// `offer_status != active` under its own row lock and gets `AlreadyAccepted`
/// with no state change and no ledger trace.
pub async fn accept_offer(pool: &PgPool, actor: UserId, offer_id: OfferId) -> Result<TransferOffer> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let offer = database::transfer_offers::get_for_update(&mut tx, offer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("offer {offer_id}")))?;
    if offer.offer_status != OfferStatus::Active {
        return Err(Error::AlreadyAccepted);
    }
    let recipients = database::transfer_offers::recipients(&mut tx, offer_id)
        .await
        .map_err(internal)?;
    if !recipients.iter().any(|r| r.recipient_user_id == actor) {
        return Err(Error::not_permitted("only a listed recipient may accept this offer"));
    }

    let property = database::properties::get_for_update(&mut tx, offer.property_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("property {}", offer.property_id)))?;
    reassign_with_components(&mut tx, actor, &property, actor, offer.include_components).await?;

    let accepted = database::transfer_offers::accept(&mut tx, offer_id, actor)
        .await
        .map_err(internal)?
        .ok_or(Error::AlreadyAccepted)?;

    ledger::append(
        &mut tx,
        actor,
        offer.property_id,
        EventDetail::OfferAccepted {
            offer_id,
            by: actor,
        },
    )
    .await
    .map_err(internal)?;

    for recipient in recipients.iter().filter(|r| r.recipient_user_id != actor) {
        notifications::create(
            &mut tx,
            recipient.recipient_user_id,
            NotificationKind::OfferAccepted,
            "Offer no longer available",
            &format!("Property {} was claimed by another recipient", offer.property_id),
            serde_json::json!({"offer_id": offer_id.get()}),
            Priority::Low,
            None,
        )
        .await
        .map_err(internal)?;
    }

    tx.commit().await.map_err(internal)?;
    Ok(accepted)
}

/// Individual rejection; the offer stays `active` until every recipient has
/// rejected, at which point it is resolved `cancelled` (treated as
/// equivalent to the offerer withdrawing since no recipient wants it).
pub async fn reject_offer_recipient(
    pool: &PgPool,
    actor: UserId,
    offer_id: OfferId,
) -> Result<()> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let offer = database::transfer_offers::get_for_update(&mut tx, offer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("offer {offer_id}")))?;
    if offer.offer_status != OfferStatus::Active {
        return Err(Error::validation(format!("offer {offer_id} is not active")));
    }
    let rows = database::transfer_offers::reject_by_recipient(&mut tx, offer_id, actor)
        .await
        .map_err(internal)?;
    if rows == 0 {
        return Err(Error::not_permitted("not a listed recipient of this offer"));
    }

    if database::transfer_offers::all_recipients_rejected(&mut tx, offer_id)
        .await
        .map_err(internal)?
    {
        database::transfer_offers::resolve(&mut tx, offer_id, OfferStatus::Cancelled)
            .await
            .map_err(internal)?;
        ledger::append(
            &mut tx,
            actor,
            offer.property_id,
            EventDetail::OfferCancelled { offer_id },
        )
        .await
        .map_err(internal)?;
    }

    tx.commit().await.map_err(internal)?;
    Ok(())
}

/// Only the offerer may cancel, and only from `active`.
pub async fn cancel_offer(pool: &PgPool, actor: UserId, offer_id: OfferId) -> Result<TransferOffer> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let offer = database::transfer_offers::get_for_update(&mut tx, offer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::not_found(format!("offer {offer_id}")))?;
    if offer.offering_user_id != actor {
        return Err(Error::not_permitted("only the offerer may cancel this offer"));
    }
    let resolved = database::transfer_offers::resolve(&mut tx, offer_id, OfferStatus::Cancelled)
        .await
        .map_err(internal)?
        .ok_or_else(|| Error::validation(format!("offer {offer_id} is not active")))?;

    ledger::append(
        &mut tx,
        actor,
        offer.property_id,
        EventDetail::OfferCancelled { offer_id },
    )
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;
    Ok(resolved)
}

pub async fn list_active_offers_for(pool: &PgPool, user_id: UserId) -> Result<Vec<TransferOffer>> {
    let mut conn = pool.acquire().await.map_err(internal)?;
    database::transfer_offers::list_active_for_user(&mut conn, user_id)
        .await
        .map_err(internal)
}

/// Background sweep (spec.md §5): transfers/offers past their horizon are
/// closed out idempotently and safely alongside human action via row-level
/// locking (`FOR UPDATE SKIP LOCKED` in the `database` layer).
pub async fn sweep_expired(pool: &PgPool, transfer_horizon: Duration) -> Result<(usize, usize)> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let now = Utc::now();

    let swept_transfers = database::transfers::sweep_expired(&mut tx, now - transfer_horizon)
        .await
        .map_err(internal)?;
    for transfer in &swept_transfers {
        ledger::append(
            &mut tx,
            transfer.initiator_id,
            transfer.property_id,
            EventDetail::TransferCancelled {
                transfer_id: transfer.id,
            },
        )
        .await
        .map_err(internal)?;
    }

    let swept_offers = database::transfer_offers::sweep_expired(&mut tx, now)
        .await
        .map_err(internal)?;
    for offer in &swept_offers {
        ledger::append(
            &mut tx,
            offer.offering_user_id,
            offer.property_id,
            EventDetail::OfferExpired { offer_id: offer.id },
        )
        .await
        .map_err(internal)?;
    }

    tx.commit().await.map_err(internal)?;
    Ok((swept_transfers.len(), swept_offers.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn postgres_transfer_happy_path() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        database::clear_DANGER(&pool).await.unwrap();

        let u1 = UserId::new(1);
        let u2 = UserId::new(2);
        let property = registry::create(
            &pool,
            u1,
            model::NewProperty {
                serial_number: "SN-A".to_string(),
                name: "Rifle".to_string(),
                quantity: 1,
                assigned_to_user_id: Some(u1),
                verified: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        connections::request_connection(&pool, u1, u2).await.unwrap();
        let edge = connections::list(&pool, u1).await.unwrap().remove(0);
        connections::respond(&pool, u2, edge.id, model::connection::ConnectionStatus::Accepted)
            .await
            .unwrap();

        let transfer = request_by_id(&pool, u2, property.id, false, None).await.unwrap();
        let accepted = accept(&pool, u1, transfer.id).await.unwrap();
        assert_eq!(accepted.status, TransferStatus::Accepted);

        let property = registry::get_by_id(&pool, property.id).await.unwrap();
        assert_eq!(property.assigned_to_user_id, Some(u2));
        assert_eq!(property.version, 2);
    }
}
