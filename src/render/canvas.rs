use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::error::{Error, Result};
use super::font::GlyphSet;
use super::layout::{Point, Rect};

/// Resource name of the overlay font; chosen so it cannot clash with template fonts
pub const FONT_NAME: &str = "FMnd";

/// Resource name of the embedded font used for text outside Latin-1
pub const UNICODE_FONT_NAME: &str = "FMndU";

const IMAGE_PREFIX: &str = "ImMnd";

/// Deepest page-tree nesting searched for inherited resources
const MAX_TREE_DEPTH: usize = 32;

fn real(v: f32) -> Object {
	Object::Real(v.into())
}

/// Bytes for the standard Helvetica font, or `None` when some character is not printable Latin-1
pub fn latin1(text: &str) -> Option<Vec<u8>> {
	text.chars()
		.map(|c| match c as u32 {
			0x20..=0x7e | 0xa0..=0xff => Some(c as u32 as u8),
			_ => None,
		})
		.collect()
}

/// Drawing operations collected for one page, applied on top of its existing content
pub struct Canvas {
	font_size: f32,
	ops: Vec<Operation>,
	images: Vec<(String, Stream)>,
	glyphs: Option<GlyphSet>,
}

impl Canvas {
	pub fn new(font_size: f32) -> Self {
		Canvas { font_size, ops: Vec::new(), images: Vec::new(), glyphs: None }
	}

	/// Draw text at the default size; blank text draws nothing
	pub fn text(&mut self, at: Point, text: &str) -> Result<()> {
		self.text_sized(at, self.font_size, text)
	}

	/// Runs of whitespace print as one space
	///
	/// Fails with [`Error::Unprintable`] rather than drawing a substitute character.
	pub fn text_sized(&mut self, at: Point, size: f32, text: &str) -> Result<()> {
		let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
		if text.is_empty() {
			return Ok(());
		}
		let (font, shown) = match latin1(&text) {
			Some(bytes) => (FONT_NAME, Object::string_literal(bytes)),
			None => {
				let glyphs = match self.glyphs.take() {
					Some(g) => g,
					None => GlyphSet::new()?,
				};
				let glyphs = self.glyphs.insert(glyphs);
				(UNICODE_FONT_NAME, Object::String(glyphs.encode(&text)?, StringFormat::Hexadecimal))
			}
		};
		self.ops.extend([
			Operation::new("BT", vec![]),
			Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]),
			Operation::new("Td", vec![real(at.x), real(at.y)]),
			Operation::new("Tj", vec![shown]),
			Operation::new("ET", vec![]),
		]);
		Ok(())
	}

	/// Paint a white box, hiding whatever the template printed there
	pub fn blank_out(&mut self, rect: Rect) {
		self.ops.extend([
			Operation::new("q", vec![]),
			Operation::new("g", vec![real(1.0)]),
			Operation::new("re", vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)]),
			Operation::new("f", vec![]),
			Operation::new("Q", vec![]),
		]);
	}

	pub fn rule(&mut self, from: Point, to: Point) {
		self.ops.extend([
			Operation::new("q", vec![]),
			Operation::new("w", vec![real(0.5)]),
			Operation::new("m", vec![real(from.x), real(from.y)]),
			Operation::new("l", vec![real(to.x), real(to.y)]),
			Operation::new("S", vec![]),
			Operation::new("Q", vec![]),
		]);
	}

	/// Draw an RGB image stretched to `rect`
	pub fn image(&mut self, image: &RgbImage, rect: Rect) {
		let name = format!("{}{}", IMAGE_PREFIX, self.images.len());
		let (width, height) = image.dimensions();
		let stream = Stream::new(
			dictionary! {
				"Type" => "XObject",
				"Subtype" => "Image",
				"Width" => width as i64,
				"Height" => height as i64,
				"ColorSpace" => "DeviceRGB",
				"BitsPerComponent" => 8i64,
			},
			image.as_raw().clone(),
		);

		self.ops.extend([
			Operation::new("q", vec![]),
			Operation::new("cm", vec![
				real(rect.width), real(0.0), real(0.0), real(rect.height), real(rect.x), real(rect.y),
			]),
			Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
			Operation::new("Q", vec![]),
		]);
		self.images.push((name, stream));
	}

	/// Append the collected operations to `page_id`
	///
	/// The page's original content is wrapped in `q`/`Q` so graphics state it
	/// leaves behind cannot shift the overlay.
	pub fn apply(self, doc: &mut Document, page_id: ObjectId) -> Result<()> {
		let font_id = doc.add_object(dictionary! {
			"Type" => "Font",
			"Subtype" => "Type1",
			"BaseFont" => "Helvetica",
			"Encoding" => "WinAnsiEncoding",
		});

		let mut resources = page_resources(doc, page_id)?;
		let mut fonts = sub_dictionary(doc, &resources, b"Font")?;
		fonts.set(FONT_NAME, Object::Reference(font_id));
		if let Some(glyphs) = self.glyphs.as_ref().filter(|g| !g.is_empty()) {
			fonts.set(UNICODE_FONT_NAME, Object::Reference(glyphs.embed(doc)));
		}
		resources.set("Font", Object::Dictionary(fonts));

		if !self.images.is_empty() {
			let mut xobjects = sub_dictionary(doc, &resources, b"XObject")?;
			for (name, stream) in self.images {
				let id = doc.add_object(stream);
				xobjects.set(name, Object::Reference(id));
			}
			resources.set("XObject", Object::Dictionary(xobjects));
		}

		let mut ops = vec![Operation::new("Q", vec![]), Operation::new("g", vec![real(0.0)])];
		ops.extend(self.ops);
		let overlay = Content { operations: ops }
			.encode()
			.map_err(|e| Error::Pdf(e.to_string()))?;
		let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
		let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

		let existing = page_contents(doc, page_id)?;
		let page = doc
			.get_object_mut(page_id)
			.and_then(Object::as_dict_mut)
			.map_err(|e| Error::Template(e.to_string()))?;

		let mut contents = Vec::with_capacity(existing.len() + 2);
		contents.push(Object::Reference(open_id));
		contents.extend(existing);
		contents.push(Object::Reference(overlay_id));
		page.set("Contents", Object::Array(contents));
		page.set("Resources", Object::Dictionary(resources));
		Ok(())
	}
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
	match object {
		Object::Reference(id) => doc.get_object(*id).map_err(|e| Error::Template(e.to_string())),
		other => Ok(other),
	}
}

fn dict<'a>(doc: &'a Document, id: ObjectId) -> Result<&'a Dictionary> {
	doc.get_object(id)
		.and_then(Object::as_dict)
		.map_err(|e| Error::Template(e.to_string()))
}

/// A page attribute, looked up through the page tree when the page itself lacks it
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
	let mut node = page_id;
	for _ in 0..MAX_TREE_DEPTH {
		let d = dict(doc, node)?;
		if let Ok(value) = d.get(key) {
			return resolve(doc, value).map(Some);
		}
		match d.get(b"Parent").and_then(Object::as_reference) {
			Ok(parent) => node = parent,
			Err(_) => break,
		}
	}
	Ok(None)
}

/// Copy of the page's resources, following inheritance up the page tree
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
	match inherited(doc, page_id, b"Resources")? {
		Some(resources) => resources
			.as_dict()
			.cloned()
			.map_err(|e| Error::Template(e.to_string())),
		None => Ok(Dictionary::new()),
	}
}

fn number(doc: &Document, object: &Object) -> Result<f32> {
	match resolve(doc, object)? {
		Object::Integer(i) => Ok(*i as f32),
		Object::Real(r) => Ok(*r as f32),
		other => Err(Error::Template(format!("expected a number, found {:?}", other))),
	}
}

/// Width and height of a page in points
pub fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
	let media_box = inherited(doc, page_id, b"MediaBox")?
		.ok_or_else(|| Error::Template("page has no MediaBox".into()))?;
	let corners = match media_box {
		Object::Array(items) if items.len() == 4 => items
			.iter()
			.map(|o| number(doc, o))
			.collect::<Result<Vec<f32>>>()?,
		_ => return Err(Error::Template("malformed MediaBox".into())),
	};
	Ok(((corners[2] - corners[0]).abs(), (corners[3] - corners[1]).abs()))
}

/// Object id of the first page
pub fn first_page(doc: &Document) -> Result<ObjectId> {
	doc.get_pages()
		.values()
		.next()
		.copied()
		.ok_or_else(|| Error::Template("document has no pages".into()))
}

/// Set the document information dictionary; no dates are written so output is repeatable
pub fn write_info(doc: &mut Document, title: &str, producer: &str) {
	let info = doc.add_object(dictionary! {
		"Title" => Object::string_literal(title),
		"Producer" => Object::string_literal(producer),
	});
	doc.trailer.set("Info", Object::Reference(info));
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Result<Dictionary> {
	match resources.get(key) {
		Ok(object) => resolve(doc, object)?
			.as_dict()
			.cloned()
			.map_err(|e| Error::Template(e.to_string())),
		Err(_) => Ok(Dictionary::new()),
	}
}

fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
	match dict(doc, page_id)?.get(b"Contents") {
		Ok(Object::Array(items)) => Ok(items.clone()),
		Ok(Object::Reference(id)) => match doc.get_object(*id) {
			// an indirect array of streams
			Ok(Object::Array(items)) => Ok(items.clone()),
			_ => Ok(vec![Object::Reference(*id)]),
		},
		Ok(_) => Err(Error::Template("page contents are neither a stream nor an array".into())),
		Err(_) => Ok(Vec::new()),
	}
}
