//! Operator dispatcher: consumes tokens, maintains an operand stack, and on
//! each operator keyword invokes a registered handler that reads the
//! graphics state, emits a typed [`Operation`](crate::operation::Operation),
//! and mutates the state.
//!
//! The per-operator handlers live in sibling modules grouped the way this
//! codebase's own `interp/ops/{graphics_state,text,path}.rs` are grouped.
//! Unlike that lineage's `impl PDFPageInterpreter` methods (which mutate
//! `self` and talk to a `PDFDevice` for rendering), handlers here are plain
//! function pointers populated into a lookup table at construction time,
//! per the Design Notes' guidance away from a dictionary of handler
//! *objects* and towards a table of handler *functions*.

mod graphics_state;
mod path;
mod text;

use rustc_hash::FxHashMap;

use crate::error::{RedactError, Result};
use crate::external::FontResolver;
use crate::operation::{Operation, OperationKind};
use crate::state::GraphicsStateStack;
use crate::token::{Token, Tokenizer};

/// Read-only context handed to every handler alongside the operand list and
/// the mutable state stack. Handlers never hold onto this past their call.
pub struct HandlerContext<'a> {
    pub font_resolver: &'a dyn FontResolver,
}

/// What a handler did with the operands it was given.
pub enum HandlerOutcome {
    /// Emit an operation of this kind, with an optional computed bbox.
    Emit(OperationKind, Option<crate::operation::Rectangle>),
    /// The operand stack didn't match what this operator expects (too few
    /// operands, wrong operand types). The dispatcher emits a `Generic`
    /// pass-through with whatever operands were on the stack, per the
    /// failure model: operators are never dropped silently.
    Fallback,
}

type HandlerFn = fn(&[Token], &mut GraphicsStateStack, &HandlerContext) -> HandlerOutcome;

/// Number of tokens between cooperative-cancellation checks, matching the
/// resource model's "every 4096th token" contract.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Operator registry and parse loop.
pub struct OperatorDispatcher {
    registry: FxHashMap<&'static str, HandlerFn>,
}

impl Default for OperatorDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorDispatcher {
    pub fn new() -> Self {
        let mut registry: FxHashMap<&'static str, HandlerFn> = FxHashMap::default();

        registry.insert("q", graphics_state::op_q);
        registry.insert("Q", graphics_state::op_big_q);
        registry.insert("cm", graphics_state::op_cm);
        registry.insert("gs", graphics_state::op_gs);

        registry.insert("BT", text::op_bt);
        registry.insert("ET", text::op_et);
        registry.insert("Tf", text::op_tf);
        registry.insert("Tc", text::op_tc);
        registry.insert("Tw", text::op_tw);
        registry.insert("Tz", text::op_tz);
        registry.insert("TL", text::op_tl);
        registry.insert("Ts", text::op_ts);
        registry.insert("Tr", text::op_tr);
        registry.insert("Td", text::op_td);
        registry.insert("TD", text::op_td_big);
        registry.insert("Tm", text::op_tm);
        registry.insert("T*", text::op_t_star);
        registry.insert("Tj", text::op_tj);
        registry.insert("TJ", text::op_tj_array);
        registry.insert("'", text::op_quote);
        registry.insert("\"", text::op_double_quote);

        registry.insert("m", path::op_m);
        registry.insert("l", path::op_l);
        registry.insert("c", path::op_c);
        registry.insert("v", path::op_v);
        registry.insert("y", path::op_y);
        registry.insert("h", path::op_h);
        registry.insert("re", path::op_re);
        registry.insert("S", path::op_stroke);
        registry.insert("s", path::op_close_stroke);
        registry.insert("f", path::op_fill);
        registry.insert("F", path::op_fill_legacy);
        registry.insert("f*", path::op_fill_evenodd);
        registry.insert("B", path::op_fill_stroke);
        registry.insert("B*", path::op_fill_stroke_evenodd);
        registry.insert("b", path::op_close_fill_stroke);
        registry.insert("b*", path::op_close_fill_stroke_evenodd);
        registry.insert("n", path::op_end_path);

        registry.insert("Do", graphics_state::op_do);

        Self { registry }
    }

    /// Parses `bytes` into a flat operation list. `cancel` is polled at each
    /// `BT`/`ET`/`Do` boundary and every [`CANCEL_CHECK_INTERVAL`] tokens.
    pub fn parse(
        &self,
        bytes: &[u8],
        font_resolver: &dyn FontResolver,
        cancel: &dyn Fn() -> bool,
    ) -> Result<Vec<Operation>> {
        let ctx = HandlerContext { font_resolver };
        let mut stack = GraphicsStateStack::new();
        let mut tokenizer = Tokenizer::new(bytes);
        let mut operands: Vec<Token> = Vec::new();
        let mut ops = Vec::new();
        let mut stream_index = 0usize;
        let mut tokens_seen = 0usize;
        // Raw q/Q and BT/ET balance, tracked independent of
        // `GraphicsStateStack`'s clamped depth (an unbalanced extra `Q` is
        // absorbed by the stack without error, but it still makes the
        // stream malformed per the end-of-stream balance invariant).
        let mut raw_save_depth = 0i64;
        let mut raw_text_depth = 0i64;

        while let Some(token) = tokenizer.next() {
            tokens_seen += 1;
            if tokens_seen % CANCEL_CHECK_INTERVAL == 0 && cancel() {
                return Err(RedactError::Cancelled);
            }

            let Token::Operator(name) = &token else {
                operands.push(token);
                continue;
            };

            if name == "BI" {
                // Inline image: scan the raw ID...EI run and carry it along
                // as a single opaque operand so the writer can reproduce it
                // byte-for-byte.
                let (consumed, raw) = scan_inline_image(bytes, tokenizer.position());
                tokenizer.seek(consumed);
                ops.push(Operation {
                    operator_name: "BI".to_string(),
                    operands: vec![Token::LiteralString(raw)],
                    stream_index,
                    inside_text_block: stack.top().in_text_object,
                    bbox: None,
                    kind: OperationKind::Generic,
                });
                stream_index += 1;
                operands.clear();
                continue;
            }

            if name == "BT" || name == "ET" || name == "Do" {
                if cancel() {
                    return Err(RedactError::Cancelled);
                }
            }

            match name.as_str() {
                "q" => raw_save_depth += 1,
                "Q" => raw_save_depth -= 1,
                "BT" => raw_text_depth += 1,
                "ET" => raw_text_depth -= 1,
                _ => {}
            }

            let inside_text_block = stack.top().in_text_object;
            let outcome = match self.registry.get(name.as_str()) {
                Some(handler) => handler(&operands, &mut stack, &ctx),
                None => HandlerOutcome::Fallback,
            };

            let (kind, bbox) = match outcome {
                HandlerOutcome::Emit(kind, bbox) => (kind, bbox),
                HandlerOutcome::Fallback => (OperationKind::Generic, None),
            };

            ops.push(Operation {
                operator_name: name.clone(),
                operands: operands.clone(),
                stream_index,
                inside_text_block,
                bbox,
                kind,
            });
            stream_index += 1;
            operands.clear();
        }

        if raw_save_depth != 0 {
            return Err(RedactError::MalformedStream(format!(
                "unbalanced q/Q pair at end of stream (net depth {raw_save_depth})"
            )));
        }
        if raw_text_depth != 0 {
            return Err(RedactError::MalformedStream(format!(
                "unbalanced BT/ET pair at end of stream (net depth {raw_text_depth})"
            )));
        }

        Ok(ops)
    }
}

/// Scans forward from just after a `BI` operator for the matching
/// `ID ... EI` run, returning the absolute end position and the raw bytes
/// spanned (including `BI`/`ID`/`EI` keywords) so the writer can reproduce
/// the inline image verbatim.
fn scan_inline_image(bytes: &[u8], from: usize) -> (usize, Vec<u8>) {
    let start = from.saturating_sub(2); // back up over "BI" already consumed
    let mut pos = from;
    // Find "ID" followed by whitespace.
    while pos + 2 <= bytes.len() {
        if &bytes[pos..pos + 2] == b"ID" && bytes.get(pos + 2).is_none_or(|b| b.is_ascii_whitespace())
        {
            pos += 3;
            break;
        }
        pos += 1;
    }
    // Find "EI" bounded by whitespace on both sides.
    while pos + 2 <= bytes.len() {
        if &bytes[pos..pos + 2] == b"EI"
            && bytes
                .get(pos.wrapping_sub(1))
                .is_none_or(|b| b.is_ascii_whitespace())
            && bytes.get(pos + 2).is_none_or(|b| b.is_ascii_whitespace())
        {
            pos += 2;
            break;
        }
        pos += 1;
    }
    let end = pos.min(bytes.len());
    (end, bytes[start.min(end)..end].to_vec())
}
