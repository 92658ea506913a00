use serde::{Deserialize, Serialize};

/// `current_status` (spec.md §3). Ordering of variants has no meaning; the
/// legal-transition table lives in `registry`, not here.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    #[default]
    Available,
    Assigned,
    InTransit,
    Maintenance,
    Retired,
    Lost,
    Damaged,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    #[default]
    Serviceable,
    Unserviceable,
    NeedsRepair,
    BeyondRepair,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sync_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Pending,
    Conflict,
    Failed,
}

/// `source_type` (spec.md §3). Kept open-ended in storage (`text`) but
/// closed here for everything the pipeline actually produces.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Manual,
    OcrImport,
}

/// Why a provisional record produced by the ingestion pipeline needs human
/// review before it can be verified (spec.md §4.3 step 5).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    LowConfidence,
    GeneratedSerial,
    NsnMissing,
    NsnUnparseable,
    QuantityExpanded,
    CatalogLookupFailed,
}

/// Where a candidate's serial number came from during ingestion.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialSource {
    #[default]
    Read,
    Generated,
}

/// `import_metadata` (spec.md §3/§4.3). Stored as `jsonb`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub form_id: String,
    pub line: i32,
    pub quantity_index: i32,
    pub original_quantity: i32,
    pub serial_source: SerialSource,
    pub scan_confidence: f64,
    pub item_confidence: f64,
    pub import_date: chrono::DateTime<chrono::Utc>,
    pub requires_verification: bool,
    pub verification_reasons: Vec<VerificationReason>,
}
