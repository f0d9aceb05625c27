//! Handlers for the text-object, text-state, text-positioning and
//! text-showing operators: `BT ET Tc Tw Tz TL Tf Tr Ts Td TD Tm T* Tj TJ ' "`.
//! Grounded on this codebase's `interp/ops/text.rs`, reworked so that each
//! handler returns a typed [`Operation`](crate::operation::Operation) with a
//! computed bounding box instead of mutating a `PDFTextState` and delegating
//! to a `PDFDevice` for rendering.

use super::{HandlerContext, HandlerOutcome};
use crate::matrix::{apply_matrix_pt, translate_matrix, union_rect};
use crate::operation::{GlyphPosition, OperationKind, Rectangle};
use crate::state::GraphicsStateStack;
use crate::token::Token;

pub fn op_bt(_operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    stack.top_mut().begin_text();
    HandlerOutcome::Emit(OperationKind::TextBlock { begin: true }, None)
}

pub fn op_et(_operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    stack.top_mut().end_text();
    HandlerOutcome::Emit(OperationKind::TextBlock { begin: false }, None)
}

pub fn op_tf(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Name(font), Token::Number(size)] = operands else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().font_id = Some(font.clone());
    stack.top_mut().font_size = *size;
    HandlerOutcome::Emit(OperationKind::TextState, None)
}

macro_rules! single_number_setter {
    ($name:ident, $field:ident) => {
        pub fn $name(
            operands: &[Token],
            stack: &mut GraphicsStateStack,
            _ctx: &HandlerContext,
        ) -> HandlerOutcome {
            let [Token::Number(n)] = operands else {
                return HandlerOutcome::Fallback;
            };
            stack.top_mut().$field = *n;
            HandlerOutcome::Emit(OperationKind::TextState, None)
        }
    };
}

single_number_setter!(op_tc, char_space);
single_number_setter!(op_tw, word_space);
single_number_setter!(op_tz, h_scale);
single_number_setter!(op_tl, leading);
single_number_setter!(op_ts, rise);

pub fn op_tr(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Number(n)] = operands else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().render_mode = *n as i32;
    HandlerOutcome::Emit(OperationKind::TextState, None)
}

pub fn op_td(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Number(tx), Token::Number(ty)] = operands else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().translate_line_matrix(*tx, *ty);
    HandlerOutcome::Emit(OperationKind::TextPositioning, None)
}

/// `TD`: sets leading to `-ty`, then behaves exactly like `Td`.
pub fn op_td_big(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Number(tx), Token::Number(ty)] = operands else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().leading = -ty;
    stack.top_mut().translate_line_matrix(*tx, *ty);
    HandlerOutcome::Emit(OperationKind::TextPositioning, None)
}

pub fn op_tm(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [
        Token::Number(a),
        Token::Number(b),
        Token::Number(c),
        Token::Number(d),
        Token::Number(e),
        Token::Number(f),
    ] = operands
    else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().set_text_matrix((*a, *b, *c, *d, *e, *f));
    HandlerOutcome::Emit(OperationKind::TextPositioning, None)
}

/// `T*`: equivalent to `0 -leading Td`.
pub fn op_t_star(_operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let leading = stack.top().leading;
    stack.top_mut().translate_line_matrix(0.0, -leading);
    HandlerOutcome::Emit(OperationKind::TextPositioning, None)
}

pub fn op_tj(operands: &[Token], stack: &mut GraphicsStateStack, ctx: &HandlerContext) -> HandlerOutcome {
    let [s @ (Token::LiteralString(_) | Token::HexString(_))] = operands else {
        return HandlerOutcome::Fallback;
    };
    show_text(std::slice::from_ref(s), stack, ctx)
}

pub fn op_tj_array(operands: &[Token], stack: &mut GraphicsStateStack, ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Array(items)] = operands else {
        return HandlerOutcome::Fallback;
    };
    show_text(items, stack, ctx)
}

/// `'`: move to the next line, then show the string as `Tj` would.
pub fn op_quote(operands: &[Token], stack: &mut GraphicsStateStack, ctx: &HandlerContext) -> HandlerOutcome {
    let [s @ (Token::LiteralString(_) | Token::HexString(_))] = operands else {
        return HandlerOutcome::Fallback;
    };
    let leading = stack.top().leading;
    stack.top_mut().translate_line_matrix(0.0, -leading);
    show_text(std::slice::from_ref(s), stack, ctx)
}

/// `"`: set word/character spacing, then behave like `'`.
pub fn op_double_quote(operands: &[Token], stack: &mut GraphicsStateStack, ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Number(aw), Token::Number(ac), s @ (Token::LiteralString(_) | Token::HexString(_))] =
        operands
    else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().word_space = *aw;
    stack.top_mut().char_space = *ac;
    let leading = stack.top().leading;
    stack.top_mut().translate_line_matrix(0.0, -leading);
    show_text(std::slice::from_ref(s), stack, ctx)
}

/// Decodes a content-stream string operand into `(codepoint, byte_offset)`
/// pairs: two bytes per codepoint for CID/Type0 fonts, one byte otherwise.
fn decode_codepoints(bytes: &[u8], is_cid_font: bool) -> Vec<(u32, usize)> {
    if is_cid_font {
        let mut out = Vec::with_capacity(bytes.len().div_ceil(2));
        let mut i = 0;
        while i < bytes.len() {
            let hi = bytes[i] as u32;
            let lo = bytes.get(i + 1).copied().unwrap_or(0) as u32;
            out.push(((hi << 8) | lo, i));
            i += 2;
        }
        out
    } else {
        bytes.iter().enumerate().map(|(i, &b)| (b as u32, i)).collect()
    }
}

/// Shared implementation for `Tj`/`TJ`/`'`/`"`: walks a sequence of string and
/// number tokens (a `TJ` array, or a single wrapped string for the other
/// three), decoding text, advancing the text matrix, and accumulating the
/// glyph bounding boxes the redaction decider needs.
///
/// Per the Design Notes' fix for the "operand list handed to an operation and
/// then cleared" defect: `items` is only ever read here, never retained —
/// the dispatcher is the one that stores an owned copy on the `Operation`.
fn show_text(items: &[Token], stack: &mut GraphicsStateStack, ctx: &HandlerContext) -> HandlerOutcome {
    let font_id = stack.top().font_id.clone();
    let font_size = stack.top().font_size;
    let h_scale = stack.top().h_scale / 100.0;
    let char_space = stack.top().char_space;
    let word_space = stack.top().word_space;
    let rise = stack.top().rise;
    let is_cid_font = font_id
        .as_ref()
        .is_some_and(|f| ctx.font_resolver.is_cid_font(f));

    let mut decoded_text = String::new();
    let mut glyphs = Vec::new();
    let mut bbox: Option<Rectangle> = None;
    let mut was_hex_string = false;
    let mut byte_cursor = 0usize;

    for item in items {
        match item {
            Token::Number(n) => {
                let tx = -(n / 1000.0) * font_size * h_scale;
                let m = stack.top().text_matrix;
                stack.top_mut().text_matrix = translate_matrix(m, (tx, 0.0));
            }
            Token::LiteralString(bytes) | Token::HexString(bytes) => {
                if matches!(item, Token::HexString(_)) {
                    was_hex_string = true;
                }
                for (codepoint, offset) in decode_codepoints(bytes, is_cid_font) {
                    let unicode = font_id
                        .as_ref()
                        .and_then(|f| ctx.font_resolver.unicode_for(f, codepoint))
                        .or_else(|| char::from_u32(codepoint).map(String::from));
                    if let Some(u) = unicode {
                        decoded_text.push_str(&u);
                    }

                    let rendering_matrix = stack.top().rendering_matrix();
                    let (x, y) = apply_matrix_pt(rendering_matrix, (0.0, 0.0));
                    let w0 = font_id
                        .as_ref()
                        .map(|f| ctx.font_resolver.advance_width(f, font_size, codepoint))
                        .unwrap_or(0.0)
                        / 1000.0;
                    let space_adj = if !is_cid_font && codepoint == 32 {
                        word_space
                    } else {
                        0.0
                    };
                    let advance = (w0 * font_size + char_space + space_adj) * h_scale;

                    let glyph_bbox = (x, y + rise, x + advance, y + rise + font_size);
                    bbox = Some(match bbox {
                        Some(b) => union_rect(b, glyph_bbox),
                        None => glyph_bbox,
                    });

                    glyphs.push(GlyphPosition {
                        codepoint,
                        x,
                        y: y + rise,
                        width: advance,
                        height: font_size,
                        byte_offset_in_string: byte_cursor + offset,
                    });

                    let m = stack.top().text_matrix;
                    stack.top_mut().text_matrix = translate_matrix(m, (advance, 0.0));
                }
                byte_cursor += bytes.len();
            }
            _ => {}
        }
    }

    HandlerOutcome::Emit(
        OperationKind::Text {
            decoded_text,
            glyphs,
            font_id,
            font_size,
            is_cid_font,
            was_hex_string,
        },
        bbox,
    )
}
