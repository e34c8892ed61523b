use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("{0} must be set")]
	Missing(&'static str),
	/// The value is never included, it may be a secret
	#[error("{name} is invalid: expected {expected}")]
	Invalid { name: &'static str, expected: &'static str },
}

/// Service settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	/// 64 hex characters; kept out of `Debug` output by [`Secret`]
	pub encryption_key: Secret,
	pub bind_addr: SocketAddr,
	pub template_path: PathBuf,
	pub template_version: String,
	/// Replaces the built-in layout table when set
	pub layout_path: Option<PathBuf>,
	pub logo_path: Option<PathBuf>,
	/// Signatures are stored inline on the mandate when unset
	pub signature_dir: Option<PathBuf>,
	pub pdf_output_dir: PathBuf,
	pub render_timeout: Duration,
	pub pdf_fallback: bool,
}

#[derive(Clone, PartialEq)]
pub struct Secret(String);

impl Secret {
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Debug for Secret {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("<redacted>")
	}
}

impl Config {
	/// Read configuration from the process environment
	///
	/// Loads `.env` file in the working directory first, if there is one
	pub fn from_env() -> Result<Config, Error> {
		dotenv().ok();
		Config::from_lookup(|name| env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
		let required = |name: &'static str| get(name).ok_or(Error::Missing(name));

		let encryption_key = required("MANDATE_ENCRYPTION_KEY")?;
		if encryption_key.len() != 64 || !encryption_key.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err(Error::Invalid { name: "MANDATE_ENCRYPTION_KEY", expected: "64 hex characters" });
		}

		let bind_addr = match get("BIND_ADDR") {
			Some(v) => v.parse().map_err(|_| Error::Invalid { name: "BIND_ADDR", expected: "host:port" })?,
			None => SocketAddr::from(([127, 0, 0, 1], 3030)),
		};
		let render_timeout = match get("RENDER_TIMEOUT_SECS") {
			Some(v) => match v.parse::<u64>() {
				Ok(secs) if secs > 0 => Duration::from_secs(secs),
				_ => return Err(Error::Invalid { name: "RENDER_TIMEOUT_SECS", expected: "a positive number of seconds" }),
			},
			None => Duration::from_secs(10),
		};
		let pdf_fallback = match get("MANDATE_PDF_FALLBACK").as_deref() {
			None | Some("0") | Some("false") => false,
			Some("1") | Some("true") => true,
			Some(_) => return Err(Error::Invalid { name: "MANDATE_PDF_FALLBACK", expected: "true or false" }),
		};

		Ok(Config {
			database_url: required("DATABASE_URL")?,
			encryption_key: Secret(encryption_key),
			bind_addr,
			template_path: get("MANDATE_TEMPLATE_PATH")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from("assets/mandate_template.pdf")),
			template_version: get("MANDATE_TEMPLATE_VERSION").unwrap_or_else(|| "v1".to_string()),
			layout_path: get("MANDATE_LAYOUT_PATH").map(PathBuf::from),
			logo_path: get("MANDATE_LOGO_PATH").map(PathBuf::from),
			signature_dir: get("SIGNATURE_STORAGE_DIR").map(PathBuf::from),
			pdf_output_dir: get("PDF_OUTPUT_DIR")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from("storage/pdfs")),
			render_timeout,
			pdf_fallback,
		})
	}
}
