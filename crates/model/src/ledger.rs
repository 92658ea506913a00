use {
    crate::ids::{PropertyId, TransferId, UserId},
    serde::{Deserialize, Serialize},
};

/// The complete, closed set of ledger event kinds (spec.md §4.4). Stored as
/// a plain string column (`event_kind`) on the single `ledger_events` table
/// so that adding a kind never requires a Postgres enum migration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    StatusChange,
    Verified,
    ImportCreated,
    ImportDiscarded,
    TransferRequested,
    TransferApproved,
    TransferRejected,
    TransferCancelled,
    TransferAccepted,
    ComponentMoved,
    ComponentDetached,
    OfferCreated,
    OfferNotified,
    OfferAccepted,
    OfferExpired,
    OfferCancelled,
    MaintenanceScheduled,
    MaintenanceStarted,
    MaintenanceCompleted,
    DefectReported,
    VerificationPresent,
    VerificationMissing,
    VerificationNeedsAttention,
    Correction,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "CREATED",
            EventKind::StatusChange => "STATUS_CHANGE",
            EventKind::Verified => "VERIFIED",
            EventKind::ImportCreated => "IMPORT_CREATED",
            EventKind::ImportDiscarded => "IMPORT_DISCARDED",
            EventKind::TransferRequested => "TRANSFER_REQUESTED",
            EventKind::TransferApproved => "TRANSFER_APPROVED",
            EventKind::TransferRejected => "TRANSFER_REJECTED",
            EventKind::TransferCancelled => "TRANSFER_CANCELLED",
            EventKind::TransferAccepted => "TRANSFER_ACCEPTED",
            EventKind::ComponentMoved => "COMPONENT_MOVED",
            EventKind::ComponentDetached => "COMPONENT_DETACHED",
            EventKind::OfferCreated => "OFFER_CREATED",
            EventKind::OfferNotified => "OFFER_NOTIFIED",
            EventKind::OfferAccepted => "OFFER_ACCEPTED",
            EventKind::OfferExpired => "OFFER_EXPIRED",
            EventKind::OfferCancelled => "OFFER_CANCELLED",
            EventKind::MaintenanceScheduled => "MAINTENANCE_SCHEDULED",
            EventKind::MaintenanceStarted => "MAINTENANCE_STARTED",
            EventKind::MaintenanceCompleted => "MAINTENANCE_COMPLETED",
            EventKind::DefectReported => "DEFECT_REPORTED",
            EventKind::VerificationPresent => "VERIFICATION_PRESENT",
            EventKind::VerificationMissing => "VERIFICATION_MISSING",
            EventKind::VerificationNeedsAttention => "VERIFICATION_NEEDS_ATTENTION",
            EventKind::Correction => "CORRECTION",
        }
    }
}

/// A fully materialized row from the unified history view
/// (`general_history`/`history_for_item`), spec.md §4.4.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: crate::ids::LedgerEventId,
    pub event_kind: EventKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub actor_user_id: UserId,
    pub item_id: PropertyId,
    pub detail: serde_json::Value,
    pub sequence_number: crate::ids::LedgerSequence,
    pub prev_hash: Vec<u8>,
}

/// Detail payload shapes referenced by name in spec.md §4.4. These are
/// serialized into the `detail` jsonb column; the column itself has no
/// fixed schema, so any caller may also append kinds/shapes not listed
/// here so long as they fit inside a closed `EventKind`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    Created,
    StatusChange {
        prev: crate::property::PropertyStatus,
        new: crate::property::PropertyStatus,
        reason: Option<String>,
    },
    Verified,
    ImportCreated {
        form_id: String,
    },
    ImportDiscarded,
    TransferRequested {
        transfer_id: TransferId,
    },
    TransferApproved {
        transfer_id: TransferId,
    },
    TransferRejected {
        transfer_id: TransferId,
        reason: Option<String>,
    },
    TransferCancelled {
        transfer_id: TransferId,
    },
    TransferAccepted {
        transfer_id: TransferId,
    },
    ComponentMoved {
        parent: PropertyId,
        child: PropertyId,
    },
    ComponentDetached {
        parent: PropertyId,
        child: PropertyId,
    },
    OfferCreated {
        offer_id: crate::ids::OfferId,
    },
    OfferNotified {
        offer_id: crate::ids::OfferId,
        recipient: UserId,
    },
    OfferAccepted {
        offer_id: crate::ids::OfferId,
        by: UserId,
    },
    OfferExpired {
        offer_id: crate::ids::OfferId,
    },
    OfferCancelled {
        offer_id: crate::ids::OfferId,
    },
    MaintenanceScheduled,
    MaintenanceStarted,
    MaintenanceCompleted,
    DefectReported {
        notes: Option<String>,
    },
    VerificationPresent,
    VerificationMissing,
    VerificationNeedsAttention {
        reasons: Vec<crate::property::VerificationReason>,
    },
    Correction {
        original_event_id: crate::ids::LedgerEventId,
        original_event_kind: EventKind,
        reason: String,
    },
}

impl EventDetail {
    pub fn kind(&self) -> EventKind {
        match self {
            EventDetail::Created => EventKind::Created,
            EventDetail::StatusChange { .. } => EventKind::StatusChange,
            EventDetail::Verified => EventKind::Verified,
            EventDetail::ImportCreated { .. } => EventKind::ImportCreated,
            EventDetail::ImportDiscarded => EventKind::ImportDiscarded,
            EventDetail::TransferRequested { .. } => EventKind::TransferRequested,
            EventDetail::TransferApproved { .. } => EventKind::TransferApproved,
            EventDetail::TransferRejected { .. } => EventKind::TransferRejected,
            EventDetail::TransferCancelled { .. } => EventKind::TransferCancelled,
            EventDetail::TransferAccepted { .. } => EventKind::TransferAccepted,
            EventDetail::ComponentMoved { .. } => EventKind::ComponentMoved,
            EventDetail::ComponentDetached { .. } => EventKind::ComponentDetached,
            EventDetail::OfferCreated { .. } => EventKind::OfferCreated,
            EventDetail::OfferNotified { .. } => EventKind::OfferNotified,
            EventDetail::OfferAccepted { .. } => EventKind::OfferAccepted,
            EventDetail::OfferExpired { .. } => EventKind::OfferExpired,
            EventDetail::OfferCancelled { .. } => EventKind::OfferCancelled,
            EventDetail::MaintenanceScheduled => EventKind::MaintenanceScheduled,
            EventDetail::MaintenanceStarted => EventKind::MaintenanceStarted,
            EventDetail::MaintenanceCompleted => EventKind::MaintenanceCompleted,
            EventDetail::DefectReported { .. } => EventKind::DefectReported,
            EventDetail::VerificationPresent => EventKind::VerificationPresent,
            EventDetail::VerificationMissing => EventKind::VerificationMissing,
            EventDetail::VerificationNeedsAttention { .. } => EventKind::VerificationNeedsAttention,
            EventDetail::Correction { .. } => EventKind::Correction,
        }
    }
}

/// Result of `verify_integrity` (spec.md §4.4).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub ok: bool,
    pub first_divergence_seq: Option<crate::ids::LedgerSequence>,
}
