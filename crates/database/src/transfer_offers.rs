use {
    chrono::{DateTime, Utc},
    model::{
        ids::{OfferId, PropertyId, UserId},
        transfer::OfferStatus,
    },
    sqlx::PgConnection,
};

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TransferOffer {
    pub id: OfferId,
    pub property_id: PropertyId,
    pub offering_user_id: UserId,
    pub offer_status: OfferStatus,
    pub include_components: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub accepted_by_user_id: Option<UserId>,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, sqlx::FromRow)]
pub struct TransferOfferRecipient {
    pub offer_id: OfferId,
    pub recipient_user_id: UserId,
    pub notified_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    ex: &mut PgConnection,
    property_id: PropertyId,
    offering_user_id: UserId,
    include_components: bool,
    notes: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> sqlx::Result<TransferOffer> {
    sqlx::query_as::<_, TransferOffer>(
        "INSERT INTO transfer_offers (property_id, offering_user_id, include_components, notes, expires_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(property_id)
    .bind(offering_user_id)
    .bind(include_components)
    .bind(notes)
    .bind(expires_at)
    .fetch_one(ex)
    .await
}

pub async fn insert_recipients(
    ex: &mut PgConnection,
    offer_id: OfferId,
    recipients: &[UserId],
) -> sqlx::Result<()> {
    for recipient in recipients {
        sqlx::query(
            "INSERT INTO transfer_offer_recipients (offer_id, recipient_user_id, notified_at)
             VALUES ($1, $2, now())
             ON CONFLICT DO NOTHING",
        )
        .bind(offer_id)
        .bind(recipient)
        .execute(&mut *ex)
        .await?;
    }
    Ok(())
}

pub async fn get_for_update(
    ex: &mut PgConnection,
    id: OfferId,
) -> sqlx::Result<Option<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>("SELECT * FROM transfer_offers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn get(ex: &mut PgConnection, id: OfferId) -> sqlx::Result<Option<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>("SELECT * FROM transfer_offers WHERE id = $1")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn recipients(
    ex: &mut PgConnection,
    offer_id: OfferId,
) -> sqlx::Result<Vec<TransferOfferRecipient>> {
    sqlx::query_as::<_, TransferOfferRecipient>(
        "SELECT * FROM transfer_offer_recipients WHERE offer_id = $1",
    )
    .bind(offer_id)
    .fetch_all(ex)
    .await
}

pub async fn list_active_for_user(
    ex: &mut PgConnection,
    user_id: UserId,
) -> sqlx::Result<Vec<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>(
        "SELECT o.* FROM transfer_offers o
         JOIN transfer_offer_recipients r ON r.offer_id = o.id
         WHERE o.offer_status = 'active' AND r.recipient_user_id = $1",
    )
    .bind(user_id)
    .fetch_all(ex)
    .await
}

/// First-accept-wins (I8, spec.md §4.2 "Ordering & tie-breaking"): only
/// matches while still `active`, so of N concurrent callers racing on the
/// same offer id exactly one `UPDATE` can ever match (each runs under a row
/// lock taken by the caller via `get_for_update` first).
pub async fn accept(
    ex: &mut PgConnection,
    id: OfferId,
    accepted_by: UserId,
) -> sqlx::Result<Option<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>(
        "UPDATE transfer_offers SET
            offer_status = 'accepted',
            accepted_by_user_id = $2,
            accepted_at = now()
         WHERE id = $1 AND offer_status = 'active'
         RETURNING *",
    )
    .bind(id)
    .bind(accepted_by)
    .fetch_optional(ex)
    .await
}

pub async fn resolve(
    ex: &mut PgConnection,
    id: OfferId,
    status: OfferStatus,
) -> sqlx::Result<Option<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>(
        "UPDATE transfer_offers SET offer_status = $2
         WHERE id = $1 AND offer_status = 'active'
         RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(ex)
    .await
}

/// Records an individual recipient's rejection without touching
/// `offer_status` (spec.md §9: per-recipient state is never mutated once a
/// winner exists, but rejection while still active is an explicit fact).
pub async fn reject_by_recipient(
    ex: &mut PgConnection,
    offer_id: OfferId,
    recipient: UserId,
) -> sqlx::Result<u64> {
    Ok(sqlx::query(
        "UPDATE transfer_offer_recipients SET rejected_at = now()
         WHERE offer_id = $1 AND recipient_user_id = $2 AND rejected_at IS NULL",
    )
    .bind(offer_id)
    .bind(recipient)
    .execute(ex)
    .await?
    .rows_affected())
}

/// True once every recipient of `offer_id` has rejected (spec.md §4.2:
/// "offer continues active until all recipients reject or any one
/// accepts").
pub async fn all_recipients_rejected(ex: &mut PgConnection, offer_id: OfferId) -> sqlx::Result<bool> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(rejected_at) FROM transfer_offer_recipients WHERE offer_id = $1",
    )
    .bind(offer_id)
    .fetch_one(ex)
    .await?;
    Ok(row.0 > 0 && row.0 == row.1)
}

pub async fn mark_viewed(
    ex: &mut PgConnection,
    offer_id: OfferId,
    recipient: UserId,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE transfer_offer_recipients SET viewed_at = now()
         WHERE offer_id = $1 AND recipient_user_id = $2 AND viewed_at IS NULL",
    )
    .bind(offer_id)
    .bind(recipient)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn sweep_expired(
    ex: &mut PgConnection,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<TransferOffer>> {
    sqlx::query_as::<_, TransferOffer>(
        "UPDATE transfer_offers SET offer_status = 'expired'
         WHERE id IN (
             SELECT id FROM transfer_offers
             WHERE offer_status = 'active' AND expires_at IS NOT NULL AND expires_at < $1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(now)
    .fetch_all(ex)
    .await
}
