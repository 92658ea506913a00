//! Shared value types for the custody & audit workspace: ids, enums, the
//! error taxonomy and the row-shaped structs that `database`, the domain
//! crates and `api` all need to agree on. No crate here talks to Postgres
//! or HTTP directly — see `database` and `api` respectively.

pub mod connection;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod notification;
pub mod property;
pub mod transfer;

pub use error::{Error, Kind, Result};

use {
    chrono::{DateTime, Utc},
    ids::{PropertyComponentId, PropertyId, PropertyUuid, UserId},
    serde::{Deserialize, Serialize},
};

/// One row of `properties` (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: PropertyId,
    pub uuid: PropertyUuid,
    pub serial_number: String,
    pub name: String,
    pub description: Option<String>,
    pub nsn: Option<String>,
    pub lin: Option<String>,
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub unit_price: Option<sqlx::types::BigDecimal>,
    pub quantity: i32,
    pub location: Option<String>,
    pub category: Option<String>,
    pub unit_of_issue: Option<String>,
    pub security_classification: Option<String>,
    pub assigned_to_user_id: Option<UserId>,
    pub current_status: property::PropertyStatus,
    pub condition: property::Condition,
    pub condition_notes: Option<String>,
    pub version: i64,
    pub sync_status: property::SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub client_id: Option<String>,
    pub source_type: property::SourceType,
    pub source_ref: Option<String>,
    pub source_document_url: Option<String>,
    pub import_metadata: Option<sqlx::types::Json<property::ImportMetadata>>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<UserId>,
    pub is_attachable: bool,
    pub attachment_points: Vec<String>,
    pub compatible_with: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input to `registry::create` (spec.md §4.1).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewProperty {
    pub serial_number: String,
    pub name: String,
    pub description: Option<String>,
    pub nsn: Option<String>,
    pub lin: Option<String>,
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub unit_price: Option<sqlx::types::BigDecimal>,
    pub quantity: i32,
    pub location: Option<String>,
    pub category: Option<String>,
    pub unit_of_issue: Option<String>,
    pub security_classification: Option<String>,
    pub assigned_to_user_id: Option<UserId>,
    pub condition: property::Condition,
    pub is_attachable: bool,
    pub attachment_points: Vec<String>,
    pub compatible_with: Vec<String>,
    pub source_type: property::SourceType,
    pub source_ref: Option<String>,
    pub source_document_url: Option<String>,
    pub import_metadata: Option<property::ImportMetadata>,
    /// `verified=true` unless the caller is the ingestion pipeline
    /// (spec.md §4.1).
    pub verified: bool,
}

/// Permitted mutations for `registry::update` (spec.md §4.1: "Permitted
/// mutations: status..., condition, location, notes. Forbidden:
/// serial_number, id, uuid.").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyPatch {
    pub current_status: Option<property::PropertyStatus>,
    pub condition: Option<property::Condition>,
    pub condition_notes: Option<String>,
    pub location: Option<String>,
    pub status_change_reason: Option<String>,
    /// Only meaningful alongside `current_status = Some(Assigned)` on a
    /// property that is currently `available` (the direct-assign edge in
    /// spec.md §4.1's transition table); reassigning an already-`assigned`
    /// property to a different holder is reserved to the Transfer Engine
    /// and `registry::update` must reject it (`NotPermitted`).
    pub assigned_to_user_id: Option<UserId>,
}

/// One row of `property_components` (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct PropertyComponent {
    pub id: PropertyComponentId,
    pub parent_id: PropertyId,
    pub child_id: PropertyId,
    pub attached_at: DateTime<Utc>,
    pub attached_by_user_id: UserId,
    pub position: Option<String>,
    pub attachment_type: Option<String>,
}

/// Reader filter for `registry::list` (spec.md §4.1).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PropertyFilter {
    pub assigned_to_user_id: Option<UserId>,
    pub status: Option<property::PropertyStatus>,
    pub text: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
