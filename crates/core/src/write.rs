//! Content-stream writer: serializes a (possibly redacted) operation list
//! back into bytes. No precedent for this exists elsewhere in this
//! codebase (it has no content-stream writer, only a tokenizer/
//! interpreter), so token serialization follows the inverse of
//! [`crate::token::Tokenizer`]'s grammar directly.

use crate::operation::{Operation, OperationKind};
use crate::token::Token;

/// Serializes operands and operator name for one operation, choosing hex
/// serialization for text-showing operations that demand it (CID fonts, or
/// any operation the decider rewrote from a hex-encoded source).
fn write_operation(out: &mut Vec<u8>, op: &Operation) {
    if op.operator_name == "BI" {
        // The dispatcher stashed the raw `BI...EI` byte range as a single
        // operand; reproduce it verbatim rather than re-tokenizing it.
        if let Some(Token::LiteralString(raw)) = op.operands.first() {
            out.extend_from_slice(raw);
            out.push(b'\n');
        }
        return;
    }

    let force_hex = match &op.kind {
        OperationKind::Text {
            is_cid_font,
            was_hex_string,
            ..
        } => *is_cid_font || *was_hex_string,
        _ => false,
    };

    for operand in &op.operands {
        write_token(out, operand, force_hex);
        out.push(b' ');
    }
    out.extend_from_slice(op.operator_name.as_bytes());
    out.push(b'\n');
}

fn write_token(out: &mut Vec<u8>, token: &Token, force_hex: bool) {
    match token {
        Token::Number(n) => out.extend_from_slice(format_number(*n).as_bytes()),
        Token::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(name.as_bytes());
        }
        Token::LiteralString(bytes) => {
            if force_hex {
                write_hex_string(out, bytes);
            } else {
                write_literal_string(out, bytes);
            }
        }
        Token::HexString(bytes) => write_hex_string(out, bytes),
        Token::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_token(out, item, force_hex);
            }
            out.push(b']');
        }
        Token::Operator(name) => out.extend_from_slice(name.as_bytes()),
    }
}

/// Formats a PDF real number, trimming to at most 10 significant fractional
/// digits and dropping a trailing `.0` the way content-stream generators do.
fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{n:.10}");
        let trimmed = s.trim_end_matches('0');
        let trimmed = trimmed.trim_end_matches('.');
        trimmed.to_string()
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            0x20..=0x7e => out.push(b),
            other => out.extend_from_slice(format!("\\{other:03o}").as_bytes()),
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for &b in bytes {
        out.extend_from_slice(format!("{b:02X}").as_bytes());
    }
    out.push(b'>');
}

/// Serializes a flat operation list (no recursion into `FormXObject` — the
/// orchestrator writes each form's nested stream with its own call).
///
/// Font state persists across `BT`/`ET` the same way it does in the real
/// graphics state, so entering a text block with no `Tf` of its own is not
/// by itself a gap: it's only a gap the first time a text-showing operator
/// is reached with no font established by any means. When that happens,
/// the operation's own recorded `font_id`/`font_size` (set by the dispatcher
/// from graphics-state persistence at parse time) is the best source of
/// truth and is preferred; `fallback_font_id`/`fallback_font_size` is used
/// only when even that is unknown, e.g. glyph-level rewriting dropped a
/// block's only `Tf` and the dispatcher never saw one either.
pub fn write_operations(ops: &[Operation], fallback_font_id: Option<&str>, fallback_font_size: f64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut saw_tf_this_block = true;
    let mut known_font: Option<(String, f64)> = None;

    for op in ops {
        if op.is_text_block_begin() {
            saw_tf_this_block = false;
        } else if op.operator_name == "Tf" {
            saw_tf_this_block = true;
            if let [Token::Name(name), Token::Number(size)] = op.operands.as_slice() {
                known_font = Some((name.clone(), *size));
            }
        } else if matches!(op.kind, OperationKind::Text { .. }) && !saw_tf_this_block {
            if known_font.is_none() {
                let own_font = match &op.kind {
                    OperationKind::Text {
                        font_id: Some(font_id),
                        font_size,
                        ..
                    } => Some((font_id.clone(), *font_size)),
                    _ => None,
                };
                let injected = own_font.or_else(|| fallback_font_id.map(|id| (id.to_string(), fallback_font_size)));
                if let Some((font_id, font_size)) = injected {
                    let tf = Operation {
                        operator_name: "Tf".to_string(),
                        operands: vec![Token::Name(font_id.clone()), Token::Number(font_size)],
                        stream_index: op.stream_index,
                        inside_text_block: true,
                        bbox: None,
                        kind: OperationKind::TextState,
                    };
                    write_operation(&mut out, &tf);
                    known_font = Some((font_id, font_size));
                }
            }
            saw_tf_this_block = true;
        }
        write_operation(&mut out, op);
    }

    out
}

/// Wraps the serialized main-page stream in a balancing `q ... Q` pair, per
/// a top-level save/restore is always emitted so a caller can safely
/// prepend its own state changes before replaying the rewritten stream.
pub fn wrap_with_save_restore(body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"q\n");
    out.extend_from_slice(&body);
    out.extend_from_slice(b"Q\n");
    out
}
