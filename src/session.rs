use std::sync::Arc;

use chrono::Duration;
use log::{debug, error};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::customer::{Customer, CustomerStatus, NewCustomer};
use crate::db;
use crate::store::MandateStore;
use crate::types::{Clock, Time};

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Lifetime of an invitation link
pub const DEFAULT_TTL_HOURS: i64 = 48;

const ISSUE_ATTEMPTS: usize = 3;

/// Generic message shown for unknown and already-used links
pub const INVALID_LINK_MESSAGE: &str = "This link is invalid or has expired. Please contact support or request a new link.";

/// Message shown when the token existed but its time ran out
pub const EXPIRED_LINK_MESSAGE: &str = "This link has expired. Please request a new one.";

/// Generate a token from the OS CSPRNG, hex encoded
pub fn generate_token() -> String {
	let mut bytes = [0u8; TOKEN_BYTES];
	OsRng.fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// Issue a fresh token and its expiry
pub fn issue(now: Time, ttl: Duration) -> (String, Time) {
	(generate_token(), now + ttl)
}

/// Create a pending customer holding a fresh token, as the import flow does for each row
///
/// A token collision is retried with a new token.
pub fn invite(store: &dyn MandateStore, new_customer: &NewCustomer, now: Time, ttl: Duration) -> db::Result<Customer> {
	for _ in 0..ISSUE_ATTEMPTS {
		let (token, expiry) = issue(now, ttl);
		match store.create_customer(new_customer, &token, expiry) {
			Err(db::Error::RecordAlreadyExists) => {
				debug!(target: "mandate::session", "token collision, issuing another");
			}
			other => return other,
		}
	}
	Err(db::Error::RecordAlreadyExists)
}

/// Why a presented token was turned away
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Rejection {
	#[error("token does not match any customer")]
	InvalidToken,
	#[error("token was already used")]
	AlreadyUsed,
	#[error("token expired")]
	Expired,
}

impl Rejection {
	/// Text safe to show the customer; unknown and used tokens are indistinguishable
	pub fn public_message(&self) -> &'static str {
		match self {
			Rejection::InvalidToken | Rejection::AlreadyUsed => INVALID_LINK_MESSAGE,
			Rejection::Expired => EXPIRED_LINK_MESSAGE,
		}
	}
}

/// Decide whether a customer found by token may open the form at `now`
///
/// A token without a recorded expiry never lapses.
pub fn check(customer: &Customer, now: Time) -> Result<(), Rejection> {
	if customer.status != CustomerStatus::Pending {
		return Err(Rejection::AlreadyUsed);
	}
	match customer.token_expiry {
		Some(expiry) if now > expiry => Err(Rejection::Expired),
		_ => Ok(()),
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Rejected(#[from] Rejection),
	#[error("looking up session token: {0}")]
	Storage(db::Error),
}

/// Read-only token validation performed when the form page is requested
pub struct Gate {
	store: Arc<dyn MandateStore>,
	clock: Arc<dyn Clock>,
}

impl Gate {
	pub fn new(store: Arc<dyn MandateStore>, clock: Arc<dyn Clock>) -> Self {
		Gate { store, clock }
	}

	pub fn validate(&self, token: &str) -> Result<Customer, Error> {
		if token.is_empty() {
			return Err(Rejection::InvalidToken.into());
		}
		let customer = match self.store.find_customer_by_token(token) {
			Ok(c) => c,
			Err(db::Error::RecordNotFound) => return Err(Rejection::InvalidToken.into()),
			Err(e) => {
				error!(target: "mandate::session", "token lookup failed: {}", e);
				return Err(Error::Storage(e));
			}
		};

		check(&customer, self.clock.now()).map_err(|rejection| {
			debug!(target: "mandate::session", "customer {} rejected: {}", customer.id, rejection);
			rejection
		})?;
		Ok(customer)
	}
}
