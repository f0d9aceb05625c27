//! External collaborator interfaces.
//!
//! The content-stream pipeline never reads a PDF file or a font program
//! itself; it is handed bytes and answers through two narrow traits. An
//! embedding application implements these against its own object store and
//! font stack. Mirrors this codebase's `PDFDevice` trait boundary
//! (`interp/device.rs`), but the direction is inverted: there the
//! interpreter *calls out* to a device for rendering, here it calls out
//! for *data* (bytes, glyph metrics) and keeps the rewriting logic itself.

use crate::matrix::Matrix;
use crate::operation::GlyphPosition;

/// Opaque identifier for a font resource, e.g. the dictionary key `F1` in a
/// page's `/Font` resource dictionary. Resolvers are free to intern this
/// however they like; the core only ever compares it for equality.
pub type FontId = String;

/// A resolved Form or Image XObject, as returned by
/// [`ObjectStore::resolve_xobject`].
#[derive(Debug, Clone)]
pub struct XObjectData {
    pub subtype: XObjectSubtype,
    pub bbox: Option<(f64, f64, f64, f64)>,
    pub matrix: Option<Matrix>,
    pub stream_bytes: Vec<u8>,
    /// The XObject's own `/Resources` dictionary, serialized however the
    /// object store likes; opaque to the core, handed back unchanged on
    /// recursive resolution so resources can be forwarded to nested `Do`s.
    pub resources: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectSubtype {
    Form,
    Image,
}

/// Content bytes and page metadata for a single page, as returned by
/// [`ObjectStore::get_page_content`].
#[derive(Debug, Clone)]
pub struct PageContent {
    pub bytes: Vec<u8>,
    pub resources: Vec<u8>,
    pub page_rotation: u16,
    pub media_box: (f64, f64, f64, f64),
}

/// The PDF object store: supplies raw decompressed content-stream bytes and
/// resource dictionaries, and receives the orchestrator's rewritten bytes.
/// Out of scope for this crate to implement; consumed only.
pub trait ObjectStore {
    fn get_page_content(&self, page_number: u32) -> crate::error::Result<PageContent>;

    fn resolve_xobject(
        &self,
        resources: &[u8],
        name: &str,
    ) -> crate::error::Result<Option<XObjectData>>;

    fn commit_page(
        &mut self,
        page_number: u32,
        new_main_bytes: Vec<u8>,
        new_form_bytes: std::collections::HashMap<String, Vec<u8>>,
    ) -> crate::error::Result<()>;
}

/// The font resolver: answers what Unicode text and advance width a given
/// font/codepoint pair corresponds to, and where glyphs actually land on the
/// visual page. Out of scope for this crate to implement; consumed only.
pub trait FontResolver {
    /// Per-glyph positions for the whole page, in visual coordinates (i.e.
    /// after page rotation has been applied), as reported by whatever text
    /// extraction already ran over the page.
    fn extract_letters(&self, page_number: u32) -> Vec<GlyphPosition>;

    /// ToUnicode-mapped text for a single codepoint, if known.
    fn unicode_for(&self, font_id: &FontId, codepoint: u32) -> Option<String>;

    /// Whether `font_id` is a CID/Type0 composite font (two-byte codes,
    /// mandatory hex-string serialization on write-back).
    fn is_cid_font(&self, font_id: &FontId) -> bool;

    /// Glyph advance width in glyph-space units (1/1000 em) for a codepoint
    /// at the given font size.
    fn advance_width(&self, font_id: &FontId, font_size: f64, codepoint: u32) -> f64;
}

/// Redaction policy selecting how the decider treats an intersecting
/// operation: drop it whole, or rewrite `Text` operations glyph by glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionPolicy {
    #[default]
    WholeOperation,
    GlyphLevel,
}

/// Options controlling a single `redact_page` call. `serde`-derived so an
/// embedding CLI or service can load these from a config file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RedactionOptions {
    pub policy: RedactionPolicy,
    #[serde(default)]
    pub draw_visual_marker: bool,
    #[serde(default)]
    pub fallback_font_id: Option<FontId>,
    /// Size in points for a `Tf` synthesized when `fallback_font_id` is used.
    /// The source always injected a silent `12`; this crate requires callers
    /// to own that choice explicitly instead.
    #[serde(default = "default_fallback_font_size")]
    pub fallback_font_size: f64,
    #[serde(default = "default_form_recursion_limit")]
    pub form_recursion_limit: u32,
}

const fn default_form_recursion_limit() -> u32 {
    32
}

const fn default_fallback_font_size() -> f64 {
    12.0
}

impl Default for RedactionOptions {
    fn default() -> Self {
        Self {
            policy: RedactionPolicy::default(),
            draw_visual_marker: false,
            fallback_font_id: None,
            fallback_font_size: default_fallback_font_size(),
            form_recursion_limit: default_form_recursion_limit(),
        }
    }
}

impl serde::Serialize for RedactionPolicy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            RedactionPolicy::WholeOperation => "whole_operation",
            RedactionPolicy::GlyphLevel => "glyph_level",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> serde::Deserialize<'de> for RedactionPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "whole_operation" => Ok(RedactionPolicy::WholeOperation),
            "glyph_level" => Ok(RedactionPolicy::GlyphLevel),
            other => Err(serde::de::Error::custom(format!(
                "unknown redaction policy: {other}"
            ))),
        }
    }
}

/// A caller-specified redaction region for one page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RedactionRectangle {
    /// `(left, bottom, right, top)` in page content-stream coordinates.
    pub page_coords: (f64, f64, f64, f64),
    /// The same region in visual (post-rotation) coordinates, when the
    /// caller has it handy; required for `GlyphLevel` policy.
    #[serde(default)]
    pub visual_coords: Option<(f64, f64, f64, f64)>,
}

/// One redacted item in a [`RedactionReport`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RedactedItem {
    pub text: String,
    pub bbox: (f64, f64, f64, f64),
}

/// Result of a single `redact_page` call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RedactionReport {
    pub page: u32,
    pub redacted_items: Vec<RedactedItem>,
    pub forms_modified: u32,
    pub warnings: Vec<String>,
}
