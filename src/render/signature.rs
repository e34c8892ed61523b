use image::{Rgb, RgbImage};
use log::warn;

use crate::signature_store::SignatureStore;

use super::layout::Rect;

/// Drawn in place of a signature when none was submitted
pub const BLANK_LINE: &str = "__________________________";

/// Drawn when the stored signature cannot be decoded
pub const NOT_FOUND: &str = "[Signature Image Not Found]";

/// Natural image size is halved before fitting into the signature box
const NATURAL_SCALE: f32 = 0.5;

/// Outcome of loading a mandate's signature for drawing
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
	Image(RgbImage),
	Undecodable,
	Missing,
}

impl Signature {
	/// Load and decode the signature reference stored on a mandate
	pub fn load(reference: Option<&str>, store: &SignatureStore) -> Signature {
		let reference = match reference.map(str::trim) {
			Some(r) if !r.is_empty() => r,
			_ => return Signature::Missing,
		};
		let bytes = match store.load(reference) {
			Some(b) => b,
			None => {
				warn!(target: "mandate::render", "signature reference is not an image or readable file");
				return Signature::Undecodable;
			}
		};
		match image::load_from_memory(&bytes) {
			Ok(img) => Signature::Image(flatten(&img.to_rgba8())),
			Err(e) => {
				warn!(target: "mandate::render", "decoding signature image: {}", e);
				Signature::Undecodable
			}
		}
	}
}

/// Composite an RGBA image onto a white background
pub fn flatten(rgba: &image::RgbaImage) -> RgbImage {
	RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
		let [r, g, b, a] = rgba.get_pixel(x, y).0;
		let blend = |c: u8| -> u8 {
			let alpha = a as u32;
			((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
		};
		Rgb([blend(r), blend(g), blend(b)])
	})
}

/// Placement of a `width`x`height` image inside `bounds`: half natural size,
/// shrunk further to fit while keeping the aspect ratio, anchored bottom-left
pub fn fit(width: u32, height: u32, bounds: Rect) -> Rect {
	let w = width.max(1) as f32 * NATURAL_SCALE;
	let h = height.max(1) as f32 * NATURAL_SCALE;
	let scale = (bounds.width / w).min(bounds.height / h).min(1.0);
	Rect {
		x: bounds.x,
		y: bounds.y,
		width: (w * scale).min(bounds.width),
		height: (h * scale).min(bounds.height),
	}
}
