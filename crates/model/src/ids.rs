//! Newtype ids shared by every crate in the workspace.
//!
//! Mirrors the teacher's `database::Address`/`OrderUid` newtypes: thin
//! wrappers so that, say, a `PropertyId` and a `TransferId` can never be
//! passed to the wrong function by accident, while still mapping to a plain
//! `BIGINT` column via `#[sqlx(transparent)]`.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
            Serialize,
            Deserialize,
            sqlx::Type,
        )]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(UserId);
id_type!(PropertyId);
id_type!(PropertyComponentId);
id_type!(TransferId);
id_type!(OfferId);
id_type!(ConnectionId);
id_type!(NotificationId);
id_type!(LedgerEventId);
id_type!(LedgerSequence);
id_type!(SyncQueueId);

/// Unlike the internal numeric ids above, the uuid is externally stable and
/// never reused; it is assigned once at creation (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PropertyUuid(pub uuid::Uuid);

impl Default for PropertyUuid {
    fn default() -> Self {
        Self(uuid::Uuid::nil())
    }
}
