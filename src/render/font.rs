use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use ttf_parser::{Face, GlyphId};

use super::error::{Error, Result};

/// DejaVu Sans, used for any text the standard font cannot show
const FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const BASE_FONT: &str = "DejaVuSans";

/// Most `bfchar` entries allowed in one CMap block
const CMAP_BLOCK: usize = 100;

/// Glyphs of the embedded font used on one page
pub struct GlyphSet {
	face: Face<'static>,
	used: BTreeMap<u16, char>,
}

impl GlyphSet {
	pub fn new() -> Result<GlyphSet> {
		let face = Face::parse(FONT_DATA, 0).map_err(|e| Error::Pdf(format!("embedded font: {}", e)))?;
		Ok(GlyphSet { face, used: BTreeMap::new() })
	}

	/// Two-byte glyph codes for `text`, failing on the first character the font lacks
	pub fn encode(&mut self, text: &str) -> Result<Vec<u8>> {
		let mut codes = Vec::with_capacity(text.len() * 2);
		for c in text.chars() {
			let glyph = self.face
				.glyph_index(c)
				.filter(|g| g.0 != 0)
				.ok_or(Error::Unprintable(c))?;
			self.used.entry(glyph.0).or_insert(c);
			codes.extend_from_slice(&glyph.0.to_be_bytes());
		}
		Ok(codes)
	}

	pub fn is_empty(&self) -> bool {
		self.used.is_empty()
	}

	/// Add a Type0 font over the embedded file to `doc`
	pub fn embed(&self, doc: &mut Document) -> ObjectId {
		let scale = 1000.0 / self.face.units_per_em() as f32;
		let em = |v: f32| Object::Integer((v * scale).round() as i64);
		let bbox = self.face.global_bounding_box();

		let mut file = Stream::new(dictionary! { "Length1" => FONT_DATA.len() as i64 }, FONT_DATA.to_vec());
		// left uncompressed if flate fails
		let _ = file.compress();
		let file_id = doc.add_object(file);

		let descriptor_id = doc.add_object(dictionary! {
			"Type" => "FontDescriptor",
			"FontName" => BASE_FONT,
			"Flags" => 32,
			"FontBBox" => vec![
				em(bbox.x_min as f32), em(bbox.y_min as f32), em(bbox.x_max as f32), em(bbox.y_max as f32),
			],
			"ItalicAngle" => 0,
			"Ascent" => em(self.face.ascender() as f32),
			"Descent" => em(self.face.descender() as f32),
			"CapHeight" => em(self.face.capital_height().unwrap_or(self.face.ascender()) as f32),
			"StemV" => 80,
			"FontFile2" => file_id,
		});

		let mut widths = Vec::with_capacity(self.used.len() * 2);
		for &glyph in self.used.keys() {
			let advance = self.face.glyph_hor_advance(GlyphId(glyph)).unwrap_or(0);
			widths.push(Object::Integer(glyph as i64));
			widths.push(Object::Array(vec![em(advance as f32)]));
		}

		let cid_font_id = doc.add_object(dictionary! {
			"Type" => "Font",
			"Subtype" => "CIDFontType2",
			"BaseFont" => BASE_FONT,
			"CIDSystemInfo" => dictionary! {
				"Registry" => Object::string_literal("Adobe"),
				"Ordering" => Object::string_literal("Identity"),
				"Supplement" => 0,
			},
			"FontDescriptor" => descriptor_id,
			"CIDToGIDMap" => "Identity",
			"W" => widths,
		});
		let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), self.to_unicode()));

		doc.add_object(dictionary! {
			"Type" => "Font",
			"Subtype" => "Type0",
			"BaseFont" => BASE_FONT,
			"Encoding" => "Identity-H",
			"DescendantFonts" => vec![Object::Reference(cid_font_id)],
			"ToUnicode" => to_unicode_id,
		})
	}

	/// CMap mapping glyph codes back to characters, so the text stays searchable
	fn to_unicode(&self) -> Vec<u8> {
		let mut cmap = String::from(
			"/CIDInit /ProcSet findresource begin\n\
			 12 dict begin\n\
			 begincmap\n\
			 /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
			 /CMapName /Adobe-Identity-UCS def\n\
			 /CMapType 2 def\n\
			 1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
		);
		let entries: Vec<_> = self.used.iter().collect();
		for block in entries.chunks(CMAP_BLOCK) {
			let _ = writeln!(cmap, "{} beginbfchar", block.len());
			for (glyph, c) in block {
				let mut units = [0u16; 2];
				let utf16: String = c.encode_utf16(&mut units).iter().map(|u| format!("{:04X}", u)).collect();
				let _ = writeln!(cmap, "<{:04X}> <{}>", glyph, utf16);
			}
			cmap.push_str("endbfchar\n");
		}
		cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
		cmap.into_bytes()
	}
}
