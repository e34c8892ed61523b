use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};

/// Decoded `data:image/...;base64,` payload
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
	pub mime: String,
	pub bytes: Vec<u8>,
}

impl DataUri {
	/// Parse a base64 image data URI, as produced by a canvas signature pad
	pub fn parse(value: &str) -> Option<DataUri> {
		let rest = value.strip_prefix("data:")?;
		let (header, payload) = rest.split_once(',')?;
		let mime = header.strip_suffix(";base64")?;
		if !mime.starts_with("image/") {
			return None;
		}
		let bytes = STANDARD.decode(payload.trim()).ok()?;
		Some(DataUri { mime: mime.to_string(), bytes })
	}

	fn extension(&self) -> &'static str {
		match self.mime.as_str() {
			"image/jpeg" | "image/jpg" => "jpg",
			_ => "png",
		}
	}
}

/// Where submitted signature images are kept
#[derive(Debug, Clone)]
pub enum SignatureStore {
	/// The data URI is stored in the mandate row as submitted
	Inline,
	/// Images are written to files under this directory and referenced by path
	Directory(PathBuf),
}

impl SignatureStore {
	/// Persist a submitted signature and return the reference to store on the mandate
	///
	/// Values that are not image data URIs are kept inline; they are rejected at
	/// render time instead.
	pub fn persist(&self, signature: &str, name: &str) -> io::Result<String> {
		match self {
			SignatureStore::Inline => Ok(signature.to_string()),
			SignatureStore::Directory(dir) => {
				let data = match DataUri::parse(signature) {
					Some(d) => d,
					None => {
						debug!(target: "mandate::signature", "signature is not a data uri, storing inline");
						return Ok(signature.to_string());
					}
				};
				fs::create_dir_all(dir)?;
				let path = dir.join(format!("{}.{}", name, data.extension()));
				fs::write(&path, &data.bytes)?;
				Ok(path.to_string_lossy().into_owned())
			}
		}
	}

	/// Remove a file written by [`persist`](Self::persist) after the submission rolled back
	pub fn discard(&self, reference: &str) {
		if let Some(path) = self.stored_path(reference) {
			if let Err(e) = fs::remove_file(&path) {
				warn!(target: "mandate::signature", "removing orphaned signature {}: {}", path.display(), e);
			}
		}
	}

	/// Raw image bytes for a stored reference
	///
	/// Returns `None` when the reference is neither an image data URI nor a file
	/// inside the storage directory.
	pub fn load(&self, reference: &str) -> Option<Vec<u8>> {
		if let Some(data) = DataUri::parse(reference) {
			return Some(data.bytes);
		}
		let path = self.stored_path(reference)?;
		match fs::read(&path) {
			Ok(bytes) => Some(bytes),
			Err(e) => {
				warn!(target: "mandate::signature", "reading signature {}: {}", path.display(), e);
				None
			}
		}
	}

	fn stored_path(&self, reference: &str) -> Option<PathBuf> {
		let dir = match self {
			SignatureStore::Inline => return None,
			SignatureStore::Directory(dir) => dir,
		};
		let path = Path::new(reference);
		let file_name = path.file_name()?;
		// only files written directly into the storage directory are readable
		if path.parent() != Some(dir.as_path()) {
			return None;
		}
		Some(dir.join(file_name))
	}
}
