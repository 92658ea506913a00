use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Kinds of notifications the engine emits; presentational, not exhaustive
/// of every ledger event kind (e.g. `CORRECTION` never produces one).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TransferRequested,
    TransferAccepted,
    TransferRejected,
    TransferCancelled,
    OfferReceived,
    OfferAccepted,
    OfferExpired,
    OfferCancelled,
    ImportNeedsVerification,
}
