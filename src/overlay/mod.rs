//! Composition of positioned label text onto copies of a base PDF page.
//!
//! The base template is a single-page PDF read once and never mutated.  Each
//! output page is a fresh clone of the base page: its original content runs
//! inside a `q`/`Q` pair so leaked graphics state cannot bleed into the
//! overlay, and the page's own overlay stream is appended after it.  Label
//! anchors live in preview-pixel space and are converted into page points with
//! the vertical axis inverted, since the preview origin is top-left while the
//! page origin is bottom-left.

mod font;

use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::data::Record;
use crate::error::{Error, Result};
use crate::export::{CancelFlag, ProgressCounter};
use crate::layout::{BlockOffset, GridSpec, RightToLeftTiling};
use crate::wrap::{wrap_label, WrapRules};

pub use font::LabelFont;
use font::{GlyphRecorder, FONT_RESOURCE};

/// Flow direction for a label's wrapped lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelDirection {
    /// Lines stack downward, text running left to right.
    #[default]
    Horizontal,
    /// Characters stack downward; each further line starts a new column to the
    /// left, the traditional order for vertical text.
    VerticalStacked,
}

/// A positioned text label bound to one record field.
#[derive(Clone, Debug)]
pub struct LabelDefinition {
    key: String,
    x: f64,
    y: f64,
    baseline_height: f64,
    font_size: f64,
    direction: LabelDirection,
    wrap: WrapRules,
}

impl LabelDefinition {
    /// Creates a label for `key` anchored at `(x, y)` preview pixels.
    pub fn new(key: impl AsRef<str>, x: f64, y: f64) -> Self {
        Self {
            key: key.as_ref().to_uppercase(),
            x,
            y,
            baseline_height: 0.0,
            font_size: 20.0,
            direction: LabelDirection::default(),
            wrap: WrapRules::default(),
        }
    }

    /// Sets the label's rendered height in preview pixels, used when
    /// converting the anchor to a baseline.
    pub fn with_baseline_height(mut self, height: f64) -> Self {
        self.baseline_height = height;
        self
    }

    /// Sets the font size in points.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Sets the flow direction.
    pub fn with_direction(mut self, direction: LabelDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the wrap rules.
    pub fn with_wrap(mut self, wrap: WrapRules) -> Self {
        self.wrap = wrap;
        self
    }

    /// Returns the record field key the label renders.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome of a composition run.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComposeSummary {
    /// Pages in the produced document.
    pub pages: usize,
    /// Records placed into blocks.
    pub records_placed: usize,
    /// Whether the run stopped early at a cancellation check.
    pub cancelled: bool,
}

/// Renders positioned label text for batches of records onto copies of a base
/// page.
pub struct OverlayCompositor {
    template: Document,
    font: LabelFont,
    grid: GridSpec,
    labels: Vec<LabelDefinition>,
    offset: Box<dyn BlockOffset>,
}

impl std::fmt::Debug for OverlayCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayCompositor")
            .field("grid", &self.grid)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl OverlayCompositor {
    /// Creates a compositor over an already-loaded template.
    pub fn new(template: Document, font: LabelFont, grid: GridSpec) -> Result<Self> {
        if template.get_pages().is_empty() {
            return Err(Error::NoPages);
        }
        Ok(Self {
            template,
            font,
            grid,
            labels: Vec::new(),
            offset: Box::new(RightToLeftTiling),
        })
    }

    /// Loads the template PDF from `path`.
    pub fn from_path(
        path: impl AsRef<std::path::Path>,
        font: LabelFont,
        grid: GridSpec,
    ) -> Result<Self> {
        Self::new(Document::load(path)?, font, grid)
    }

    /// Adds a label and returns the updated compositor.
    pub fn with_label(mut self, label: LabelDefinition) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds several labels and returns the updated compositor.
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = LabelDefinition>) -> Self {
        self.labels.extend(labels);
        self
    }

    /// Replaces the block offset strategy.
    pub fn with_offset(mut self, offset: impl BlockOffset + 'static) -> Self {
        self.offset = Box::new(offset);
        self
    }

    /// Composes one page per batch of records and returns the finished
    /// document together with a summary.
    ///
    /// An export without labels or records reports [`Error::NothingToRender`]
    /// instead of producing an empty file.  A cancelled run returns the pages
    /// rendered so far with the summary flagged; callers must discard them.
    pub fn compose(
        &self,
        records: &[Record],
        progress: &ProgressCounter,
        cancel: &CancelFlag,
    ) -> Result<(Document, ComposeSummary)> {
        if self.labels.is_empty() || records.is_empty() {
            return Err(Error::NothingToRender);
        }

        let mut document = self.template.clone();
        let pages = document.get_pages();
        let base_page_id = *pages.values().next().ok_or(Error::NoPages)?;
        let (page_width, page_height) = page_size(&document, base_page_id)?;
        let x_ratio = page_width / self.grid.image_width();
        let y_ratio = page_height / self.grid.image_height();

        let mut recorder = self.font.recorder()?;
        let blocks_per_page = self.grid.blocks_per_page();
        let total_pages = self.grid.pages_for(records.len());

        let mut page_ops: Vec<Vec<Operation>> = Vec::with_capacity(total_pages);
        let mut summary = ComposeSummary::default();
        for page_index in 0..total_pages {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let mut ops = Vec::new();
            let mut placed = 0;
            for block in 0..blocks_per_page {
                let Some(record) = records.get(page_index * blocks_per_page + block) else {
                    break;
                };
                let (dx, dy) = self.offset.offset(block, &self.grid);
                for label in &self.labels {
                    let text = record.field(label.key());
                    if text.is_empty() {
                        continue;
                    }
                    let x_pdf = (label.x + dx) * x_ratio;
                    let y_pdf = page_height - (label.y + dy + label.baseline_height) * y_ratio;
                    let lines = wrap_label(text, &label.wrap);
                    draw_lines(&mut ops, &mut recorder, &lines, label, x_pdf, y_pdf);
                }
                placed += 1;
            }
            debug!("overlay page {}: {placed} record(s)", page_index + 1);
            summary.records_placed += placed;
            progress.advance(placed);
            page_ops.push(ops);
        }

        // Base content is snapshotted once and shared by every output page.
        let mut base_content = b"q\n".to_vec();
        base_content.extend(document.get_page_content(base_page_id)?);
        base_content.extend_from_slice(b"\nQ\n");
        let base_content_id =
            document.add_object(Object::Stream(Stream::new(Dictionary::new(), base_content)));

        let font_id = recorder.embed(&mut document);
        let resources_id = page_resources(&mut document, base_page_id, font_id)?;
        let pages_root_id = pages_root(&document)?;
        let base_dict = document.get_dictionary(base_page_id)?.clone();

        let mut kids = Vec::with_capacity(page_ops.len());
        for (page_index, ops) in page_ops.into_iter().enumerate() {
            let mut contents = vec![Object::Reference(base_content_id)];
            if ops.is_empty() {
                warn!(
                    "overlay for page {} has no drawing operations; merging base page only",
                    page_index + 1
                );
            } else {
                let encoded = Content { operations: ops }.encode()?;
                let overlay_id = document
                    .add_object(Object::Stream(Stream::new(Dictionary::new(), encoded)));
                contents.push(Object::Reference(overlay_id));
            }

            let mut page = base_dict.clone();
            page.set("Parent", Object::Reference(pages_root_id));
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Reference(resources_id));
            kids.push(Object::Reference(
                document.add_object(Object::Dictionary(page)),
            ));
        }

        summary.pages = kids.len();
        let count = kids.len() as i64;
        let pages_dict = document.get_object_mut(pages_root_id)?.as_dict_mut()?;
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(count));
        document.objects.remove(&base_page_id);

        Ok((document, summary))
    }

    /// Composes and writes the output file.
    ///
    /// A cancelled run writes nothing; no partial file is ever valid.
    pub fn compose_to_path(
        &self,
        records: &[Record],
        path: impl AsRef<std::path::Path>,
        progress: &ProgressCounter,
        cancel: &CancelFlag,
    ) -> Result<ComposeSummary> {
        let (mut document, summary) = self.compose(records, progress, cancel)?;
        if summary.cancelled {
            return Ok(summary);
        }
        document.save(path)?;
        Ok(summary)
    }
}

fn draw_lines(
    ops: &mut Vec<Operation>,
    recorder: &mut GlyphRecorder<'_>,
    lines: &[String],
    label: &LabelDefinition,
    x: f64,
    y: f64,
) {
    let size = label.font_size;
    for (line_index, line) in lines.iter().enumerate() {
        let step = line_index as f64 * size;
        match label.direction {
            LabelDirection::Horizontal => {
                draw_string(ops, recorder, line, size, x, y - step);
            }
            LabelDirection::VerticalStacked => {
                let mut buffer = [0u8; 4];
                for (char_index, ch) in line.chars().enumerate() {
                    let text = ch.encode_utf8(&mut buffer);
                    draw_string(
                        ops,
                        recorder,
                        text,
                        size,
                        x - step,
                        y - char_index as f64 * size,
                    );
                }
            }
        }
    }
}

fn draw_string(
    ops: &mut Vec<Operation>,
    recorder: &mut GlyphRecorder<'_>,
    text: &str,
    size: f64,
    x: f64,
    y: f64,
) {
    let encoded = recorder.encode(text);
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![
            Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
            Object::Real(size as f32),
        ],
    ));
    ops.push(Operation::new(
        "Td",
        vec![Object::Real(x as f32), Object::Real(y as f32)],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encoded, StringFormat::Hexadecimal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn as_number(document: &Document, object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        Object::Reference(id) => document
            .get_object(*id)
            .ok()
            .and_then(|resolved| as_number(document, resolved)),
        _ => None,
    }
}

/// Resolves the page's size in points from its (possibly inherited) MediaBox.
fn page_size(document: &Document, page_id: ObjectId) -> Result<(f64, f64)> {
    let mut current = page_id;
    loop {
        let dict = document.get_dictionary(current)?;
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = match media_box {
                Object::Reference(id) => document.get_object(*id)?,
                other => other,
            };
            let values: Vec<f64> = media_box
                .as_array()?
                .iter()
                .filter_map(|value| as_number(document, value))
                .collect();
            if let [x0, y0, x1, y1] = values[..] {
                return Ok((x1 - x0, y1 - y0));
            }
            return Err(Error::MalformedPdf("MediaBox is not four numbers".into()));
        }
        match dict.get(b"Parent").ok().and_then(|parent| parent.as_reference().ok()) {
            Some(parent) => current = parent,
            None => return Err(Error::MalformedPdf("page has no MediaBox".into())),
        }
    }
}

/// Builds the shared resources dictionary for output pages: the base page's
/// resources with the label font merged in.
fn page_resources(
    document: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<ObjectId> {
    let mut resources = inherited_resources(document, page_id)?.unwrap_or_default();
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        Ok(Object::Reference(id)) => document
            .get_dictionary(*id)
            .map(Clone::clone)
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    Ok(document.add_object(Object::Dictionary(resources)))
}

fn inherited_resources(document: &Document, page_id: ObjectId) -> Result<Option<Dictionary>> {
    let mut current = page_id;
    loop {
        let dict = document.get_dictionary(current)?;
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(resources)) => return Ok(Some(resources.clone())),
            Ok(Object::Reference(id)) => {
                return Ok(document.get_dictionary(*id).ok().cloned());
            }
            _ => {}
        }
        match dict.get(b"Parent").ok().and_then(|parent| parent.as_reference().ok()) {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

fn pages_root(document: &Document) -> Result<ObjectId> {
    let catalog_id = document.trailer.get(b"Root")?.as_reference()?;
    let pages = document.get_dictionary(catalog_id)?.get(b"Pages")?;
    Ok(pages.as_reference()?)
}
