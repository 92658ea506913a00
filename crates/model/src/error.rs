//! One `thiserror` enum for the whole workspace's caller-facing error
//! taxonomy (spec.md §7), in the same spirit as
//! `autopilot::infra::persistence::auction::Error` or
//! `shared::price_estimation::PriceEstimationError` in the teacher: a small
//! enum per boundary, mapped to a transport status only at the API edge.
//! Domain crates return `model::Result<T>` and never know about HTTP.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate serial number: {0}")]
    DuplicateSerial(String),

    #[error("offer already accepted")]
    AlreadyAccepted,

    #[error("illegal status transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: crate::property::PropertyStatus,
        to: crate::property::PropertyStatus,
    },

    #[error("component split not permitted: transfer must move all components or none")]
    ComponentSplit,

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: i64, found: i64 },

    #[error("ledger integrity violation at sequence {0}")]
    Integrity(i64),

    #[error("upstream collaborator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> Kind {
        match self {
            Error::Validation(_) => Kind::ValidationError,
            Error::NotFound(_) => Kind::NotFound,
            Error::DuplicateSerial(_) => Kind::DuplicateSerial,
            Error::AlreadyAccepted => Kind::AlreadyAccepted,
            Error::IllegalTransition { .. } => Kind::IllegalTransition,
            Error::ComponentSplit => Kind::ComponentSplit,
            Error::NotPermitted(_) => Kind::NotPermitted,
            Error::VersionConflict { .. } => Kind::VersionConflict,
            Error::Integrity(_) => Kind::IntegrityError,
            Error::UpstreamUnavailable(_) => Kind::UpstreamUnavailable,
            Error::Internal(_) => Kind::InternalError,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Error::Validation(what.into())
    }

    pub fn not_permitted(what: impl Into<String>) -> Self {
        Error::NotPermitted(what.into())
    }
}

/// Kind tags from spec.md §7, independent of the `Display` message — used
/// by the API layer to pick an HTTP status and by tests to assert on
/// failure modes without string-matching messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    ValidationError,
    NotFound,
    DuplicateSerial,
    AlreadyAccepted,
    IllegalTransition,
    ComponentSplit,
    NotPermitted,
    VersionConflict,
    IntegrityError,
    UpstreamUnavailable,
    InternalError,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Translates a raw sqlx error at the `database` → domain-crate boundary
/// (spec.md §7: "component boundaries translate infrastructure errors").
/// `unique_violation_kind` lets the caller say what a unique-constraint hit
/// actually means in context (e.g. `DuplicateSerial`); every other sqlx
/// error becomes `InternalError`, and a timeout becomes
/// `UpstreamUnavailable`.
pub fn from_sqlx(err: sqlx::Error, unique_violation: impl FnOnce(&str) -> Option<Error>) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            unique_violation(db_err.message()).unwrap_or_else(|| Error::Internal(err.into()))
        }
        sqlx::Error::PoolTimedOut => {
            Error::UpstreamUnavailable("database pool timed out".to_string())
        }
        sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
        _ => Error::Internal(err.into()),
    }
}
