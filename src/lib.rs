#[macro_use]
extern crate diesel;

pub mod api;
pub mod config;
pub mod crypto;
pub mod customer;
pub mod db;
pub mod documents;
pub mod mandate;
pub mod render;
pub mod schema;
pub mod session;
pub mod signature_store;
pub mod store;
pub mod submission;
pub mod types;

#[cfg(test)]
mod testutil;

pub use crate::crypto::FieldCipher;
pub use crate::customer::{Customer, CustomerStatus, NewCustomer};
pub use crate::db::PgPool;
pub use crate::mandate::{Account, AccountOrder, GeneratedPdf, Mandate, MandateDetails, MandateSummary};
pub use crate::render::Renderer;
pub use crate::store::{MandateStore, PgStore};
pub use crate::types::{Clock, Id, SystemClock, Time};
