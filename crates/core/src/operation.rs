//! The typed `Operation` record the dispatcher emits per content-stream
//! operator, and the per-glyph position data text-showing operations carry.
//!
//! Represented as a tagged variant with a common header, per the redesign
//! guidance away from a `PdfOperation` class hierarchy with virtual
//! methods: the dispatcher and writer pattern-match on [`OperationKind`]
//! instead of dispatching through trait objects.

use crate::matrix::{Matrix, Rect};
use crate::token::Token;

/// The page-space rectangle an operation paints, and the glyph-space
/// rectangle a single glyph occupies, share the same representation.
pub type Rectangle = Rect;

/// A decoded glyph's position and extent in page coordinates, plus the byte
/// offset of its source code unit(s) within the operand string — the unit
/// the glyph-level redaction decider slices on when it rewrites a `Tj`/`TJ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPosition {
    pub codepoint: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub byte_offset_in_string: usize,
}

impl GlyphPosition {
    /// The glyph's axis-aligned bounding box: `(x, y, x+width, y+height)`.
    pub fn bbox(&self) -> Rectangle {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Centre point, used by the glyph-level redaction rule.
    pub fn centre(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Path construction/painting sub-kind, for `Path` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    MoveTo,
    LineTo,
    CurveTo,
    Close,
    Rectangle,
    Stroke,
    Fill,
    FillStroke,
    EndPath,
}

/// Operator-specific derived fields. The common header lives in
/// [`Operation`] itself.
#[derive(Debug, Clone)]
pub enum OperationKind {
    /// `Tj`, `TJ`, `'`, `"`.
    Text {
        decoded_text: String,
        glyphs: Vec<GlyphPosition>,
        font_id: Option<String>,
        font_size: f64,
        is_cid_font: bool,
        was_hex_string: bool,
    },
    /// `Tc Tw Tz TL Tr Ts`.
    TextState,
    /// `Td TD Tm T*`.
    TextPositioning,
    /// `BT`, `ET`.
    TextBlock { begin: bool },
    /// `q`, `Q`, `cm`, `gs`.
    State { is_save: bool, is_restore: bool },
    /// `m l c v y h re S s f F f* B B* b b* n`.
    Path { kind: PathKind },
    /// `Do` resolving to an image XObject.
    Image { xobject_name: String },
    /// `Do` resolving to a form XObject, with its nested operation list
    /// already parsed (see the Page Orchestrator's recursive resolution).
    FormXObject {
        xobject_name: String,
        form_bbox: Option<Rectangle>,
        form_matrix: Matrix,
        content_bytes: Vec<u8>,
        nested_ops: Vec<Operation>,
    },
    /// Unrecognized operators and inline images: emitted verbatim.
    Generic,
}

/// One parsed content-stream operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operator_name: String,
    /// An owned copy of the operand stack at the moment the operator fired.
    /// Never an alias into the dispatcher's live operand buffer — see the
    /// Design Notes on the "operand list handed to an operation and then
    /// cleared" defect this replaces.
    pub operands: Vec<Token>,
    pub stream_index: usize,
    pub inside_text_block: bool,
    pub bbox: Option<Rectangle>,
    pub kind: OperationKind,
}

impl Operation {
    /// Operations the redaction decider must never remove, regardless of
    /// whether their bbox intersects a redaction rectangle: removing them
    /// would break the graphics-state stack or text-state continuity.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::State { .. }
                | OperationKind::TextState
                | OperationKind::TextPositioning
                | OperationKind::TextBlock { .. }
                | OperationKind::Generic
        )
    }

    pub fn is_save(&self) -> bool {
        matches!(self.kind, OperationKind::State { is_save: true, .. })
    }

    pub fn is_restore(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::State {
                is_restore: true,
                ..
            }
        )
    }

    pub fn is_text_block_begin(&self) -> bool {
        matches!(self.kind, OperationKind::TextBlock { begin: true })
    }

    pub fn is_text_block_end(&self) -> bool {
        matches!(self.kind, OperationKind::TextBlock { begin: false })
    }
}
