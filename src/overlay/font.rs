//! Label font loading and embedding.
//!
//! The compositor draws label text with a single TrueType face.  During the
//! render pass a [`GlyphRecorder`] turns text into Identity-H glyph strings
//! while remembering which glyphs were used; afterwards the face is embedded
//! as a Type0/CIDFontType2 font with an uncompressed `FontFile2` stream, a
//! per-glyph width array and a ToUnicode CMap covering exactly the recorded
//! glyphs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use ttf_parser::{Face, GlyphId};

use crate::error::{Error, Result};

/// Resource name under which the label font is registered on overlay pages.
pub(crate) const FONT_RESOURCE: &str = "FL0";

/// A TrueType face used for overlay label text.
#[derive(Debug)]
pub struct LabelFont {
    data: Vec<u8>,
    path: PathBuf,
}

impl LabelFont {
    /// Loads and validates a font file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut font = Self::from_bytes(data).map_err(|err| match err {
            Error::FontParse { reason, .. } => Error::FontParse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        font.path = path.to_path_buf();
        Ok(font)
    }

    /// Validates in-memory font bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Face::parse(&data, 0).map_err(|err| Error::FontParse {
            path: "<memory>".to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            data,
            path: PathBuf::new(),
        })
    }

    /// Returns a PDF-safe base name derived from the font file name.
    fn base_name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("LabelFont");
        let sanitized: String = stem
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect();
        if sanitized.is_empty() {
            "LabelFont".to_string()
        } else {
            sanitized
        }
    }

    pub(crate) fn recorder(&self) -> Result<GlyphRecorder<'_>> {
        let face = Face::parse(&self.data, 0).map_err(|err| Error::FontParse {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(GlyphRecorder {
            font: self,
            face,
            used: BTreeMap::new(),
        })
    }
}

/// Records the glyphs one composition uses and encodes text for `Tj`.
pub(crate) struct GlyphRecorder<'a> {
    font: &'a LabelFont,
    face: Face<'a>,
    used: BTreeMap<u16, char>,
}

impl<'a> GlyphRecorder<'a> {
    /// Encodes `text` as big-endian glyph ids for an Identity-H `Tj` operand.
    ///
    /// Characters without a glyph fall back to `.notdef` with a warning.
    pub fn encode(&mut self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            let glyph = match self.face.glyph_index(ch) {
                Some(glyph) => glyph.0,
                None => {
                    warn!(
                        "no glyph for {ch:?} in {}",
                        self.font.path.display()
                    );
                    0
                }
            };
            self.used.entry(glyph).or_insert(ch);
            bytes.extend_from_slice(&glyph.to_be_bytes());
        }
        bytes
    }

    /// Builds the embedded font object graph in `document` and returns the
    /// Type0 font's id.
    pub fn embed(self, document: &mut Document) -> ObjectId {
        let units = f64::from(self.face.units_per_em().max(1));
        let to_em = |value: f64| (value * 1000.0 / units).round() as i64;
        let base_name = self.font.base_name();

        let mut file_dict = Dictionary::new();
        file_dict.set("Length1", Object::Integer(self.font.data.len() as i64));
        let font_file_id =
            document.add_object(Object::Stream(Stream::new(file_dict, self.font.data.clone())));

        let bbox = self.face.global_bounding_box();
        let ascender = self.face.ascender();
        let mut descriptor = Dictionary::new();
        descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
        descriptor.set("FontName", Object::Name(base_name.clone().into_bytes()));
        descriptor.set("Flags", Object::Integer(4));
        descriptor.set(
            "FontBBox",
            Object::Array(vec![
                Object::Integer(to_em(f64::from(bbox.x_min))),
                Object::Integer(to_em(f64::from(bbox.y_min))),
                Object::Integer(to_em(f64::from(bbox.x_max))),
                Object::Integer(to_em(f64::from(bbox.y_max))),
            ]),
        );
        descriptor.set("ItalicAngle", Object::Integer(0));
        descriptor.set("Ascent", Object::Integer(to_em(f64::from(ascender))));
        descriptor.set(
            "Descent",
            Object::Integer(to_em(f64::from(self.face.descender()))),
        );
        descriptor.set(
            "CapHeight",
            Object::Integer(to_em(f64::from(
                self.face.capital_height().unwrap_or(ascender),
            ))),
        );
        descriptor.set("StemV", Object::Integer(80));
        descriptor.set("FontFile2", Object::Reference(font_file_id));
        let descriptor_id = document.add_object(Object::Dictionary(descriptor));

        let mut widths = Vec::with_capacity(self.used.len() * 2);
        for &glyph in self.used.keys() {
            let advance = self
                .face
                .glyph_hor_advance(GlyphId(glyph))
                .unwrap_or_default();
            widths.push(Object::Integer(i64::from(glyph)));
            widths.push(Object::Array(vec![Object::Integer(to_em(f64::from(
                advance,
            )))]));
        }

        let mut system_info = Dictionary::new();
        system_info.set("Registry", Object::string_literal("Adobe"));
        system_info.set("Ordering", Object::string_literal("Identity"));
        system_info.set("Supplement", Object::Integer(0));

        let mut descendant = Dictionary::new();
        descendant.set("Type", Object::Name(b"Font".to_vec()));
        descendant.set("Subtype", Object::Name(b"CIDFontType2".to_vec()));
        descendant.set("BaseFont", Object::Name(base_name.clone().into_bytes()));
        descendant.set("CIDSystemInfo", Object::Dictionary(system_info));
        descendant.set("FontDescriptor", Object::Reference(descriptor_id));
        descendant.set("DW", Object::Integer(1000));
        descendant.set("W", Object::Array(widths));
        descendant.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
        let descendant_id = document.add_object(Object::Dictionary(descendant));

        let cmap = to_unicode_cmap(&self.used);
        let to_unicode_id = document.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            cmap.into_bytes(),
        )));

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type0".to_vec()));
        font.set("BaseFont", Object::Name(base_name.into_bytes()));
        font.set("Encoding", Object::Name(b"Identity-H".to_vec()));
        font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(descendant_id)]),
        );
        font.set("ToUnicode", Object::Reference(to_unicode_id));
        document.add_object(Object::Dictionary(font))
    }
}

/// Renders a ToUnicode CMap mapping the recorded glyph ids back to their
/// source characters.
fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str(
        "/CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n",
    );
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(u16, char)> = used.iter().map(|(glyph, ch)| (*glyph, *ch)).collect();
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (glyph, ch) in chunk {
            let code = *ch as u32;
            if code <= 0xFFFF {
                out.push_str(&format!("<{glyph:04X}> <{code:04X}>\n"));
            } else {
                let code = code - 0x1_0000;
                let high = 0xD800 | (code >> 10);
                let low = 0xDC00 | (code & 0x3FF);
                out.push_str(&format!("<{glyph:04X}> <{high:04X}{low:04X}>\n"));
            }
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}
