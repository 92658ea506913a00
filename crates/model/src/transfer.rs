use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Request,
    Offer,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Active,
    Accepted,
    Expired,
    Cancelled,
}

impl OfferStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OfferStatus::Active)
    }
}
