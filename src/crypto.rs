use std::fmt;

use aes_gcm_siv::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use thiserror::Error;

pub const KEY_LEN: usize = 32;

pub const NONCE_LEN: usize = 12;

/// Prefix that appears at the start of every encrypted field value
pub const VERSION_PREFIX: &str = "v1";

#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("encryption key must be {KEY_LEN} bytes of hex")]
	InvalidKey,
	#[error("encrypting field failed")]
	EncryptionFailed,
	/// Ciphertext is malformed, was sealed under another key, or was tampered with
	#[error("decrypting field failed")]
	DecryptionError,
}

/// Symmetric cipher for string fields, stored as `v1.<nonce>.<ciphertext>`
#[derive(Clone)]
pub struct FieldCipher {
	cipher: Aes256GcmSiv,
}

impl FieldCipher {
	pub fn new(key: [u8; KEY_LEN]) -> Self {
		FieldCipher { cipher: Aes256GcmSiv::new(&key.into()) }
	}

	/// Build a cipher from a 64 character hex key
	pub fn from_hex(key: &str) -> Result<Self, Error> {
		let bytes = hex::decode(key.trim()).map_err(|_| Error::InvalidKey)?;
		let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
		Ok(FieldCipher::new(key))
	}

	pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
		let nonce = Aes256GcmSiv::generate_nonce(&mut OsRng);
		let sealed = self.cipher
			.encrypt(&nonce, plaintext.as_bytes())
			.map_err(|_| Error::EncryptionFailed)?;

		Ok(format!(
			"{}.{}.{}",
			VERSION_PREFIX,
			URL_SAFE_NO_PAD.encode(nonce),
			URL_SAFE_NO_PAD.encode(sealed),
		))
	}

	pub fn decrypt(&self, ciphertext: &str) -> Result<String, Error> {
		let mut parts = ciphertext.splitn(3, '.');
		let (prefix, nonce, sealed) = match (parts.next(), parts.next(), parts.next()) {
			(Some(p), Some(n), Some(c)) => (p, n, c),
			_ => return Err(Error::DecryptionError),
		};
		if prefix != VERSION_PREFIX {
			return Err(Error::DecryptionError);
		}

		let nonce = URL_SAFE_NO_PAD.decode(nonce).map_err(|_| Error::DecryptionError)?;
		if nonce.len() != NONCE_LEN {
			return Err(Error::DecryptionError);
		}
		let sealed = URL_SAFE_NO_PAD.decode(sealed).map_err(|_| Error::DecryptionError)?;

		let plain = self.cipher
			.decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
			.map_err(|_| Error::DecryptionError)?;
		String::from_utf8(plain).map_err(|_| Error::DecryptionError)
	}
}

impl fmt::Debug for FieldCipher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("FieldCipher { key: <redacted> }")
	}
}
