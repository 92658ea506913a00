pub mod auth;
pub mod components;
pub mod connections;
pub mod ingestion;
pub mod ledger;
pub mod notifications;
pub mod offers;
pub mod properties;
pub mod sync;
pub mod transfers;
