//! redact-core - a content-stream redaction engine for PDF pages.
//!
//! Given raw (already decompressed) content-stream bytes, tokenizes them,
//! replays the graphics-state machine, decides which operations a set of
//! redaction rectangles should remove or rewrite, and serializes the result
//! back to bytes. The crate never parses a PDF file itself: an embedding
//! application supplies page bytes and font metrics through the
//! [`external::ObjectStore`] and [`external::FontResolver`] traits.

pub mod dispatch;
pub mod error;
pub mod external;
pub mod matrix;
pub mod operation;
pub mod orchestrate;
pub mod redact;
pub mod state;
pub mod token;
pub mod write;

pub use error::{RedactError, Result};
pub use external::{
    FontId, FontResolver, ObjectStore, PageContent, RedactedItem, RedactionOptions,
    RedactionPolicy, RedactionRectangle, RedactionReport, XObjectData, XObjectSubtype,
};
pub use operation::{GlyphPosition, Operation, OperationKind, PathKind, Rectangle};
pub use orchestrate::redact_page;
