//! Error types for the content-stream redaction pipeline.

use thiserror::Error;

/// Primary error type returned by the redaction core.
///
/// The tokenizer never produces these: malformed bytes are skipped, not
/// reported (see [`crate::token::Tokenizer`]). Everything above the
/// tokenizer — the dispatcher, decider, writer, and orchestrator — surfaces
/// failures through this type.
#[derive(Error, Debug)]
pub enum RedactError {
    /// The operator stream had an unbalanced `q`/`Q` or `BT`/`ET` pair that
    /// could not be repaired by dropping the smallest enclosing block.
    #[error("malformed content stream: {0}")]
    MalformedStream(String),

    /// A `Do` resolved to a Form XObject whose stream could not be parsed.
    /// Recovered by the orchestrator: the XObject is treated as opaque.
    #[error("corrupt form xobject {name}: {reason}")]
    CorruptXObject { name: String, reason: String },

    /// A Form XObject referenced itself, directly or transitively.
    #[error("cycle detected in form xobject recursion at {name}")]
    CycleDetected { name: String },

    /// Form XObject recursion exceeded `RedactionOptions::form_recursion_limit`.
    #[error("form xobject recursion exceeded depth limit {limit} at {name}")]
    DepthLimit { name: String, limit: u32 },

    /// The caller's cooperative cancellation flag was observed set.
    #[error("redaction cancelled")]
    Cancelled,

    /// The object store could not supply content for the requested page.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Propagated I/O failure (reading a standalone content-stream file, etc).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results produced by the redaction core.
pub type Result<T> = std::result::Result<T, RedactError>;
