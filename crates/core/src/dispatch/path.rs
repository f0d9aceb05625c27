//! Handlers for path construction and painting operators:
//! `m l c v y h re S s f F f* B B* b b* n`. Grounded on this codebase's
//! `interp/ops/path.rs`, but trimmed to what the redaction pipeline needs:
//! only `re` computes a bounding box, since the remaining construction
//! operators build up a path the redaction decider has no per-segment
//! geometry for, and no current path state beyond bbox is tracked.

use super::{HandlerContext, HandlerOutcome};
use crate::matrix::{apply_matrix_rect, normalize_rect};
use crate::operation::{OperationKind, PathKind};
use crate::state::GraphicsStateStack;
use crate::token::Token;

fn all_numbers(operands: &[Token], count: usize) -> bool {
    operands.len() == count && operands.iter().all(|t| matches!(t, Token::Number(_)))
}

macro_rules! path_op {
    ($name:ident, $count:expr, $kind:expr) => {
        pub fn $name(
            operands: &[Token],
            _stack: &mut GraphicsStateStack,
            _ctx: &HandlerContext,
        ) -> HandlerOutcome {
            if !all_numbers(operands, $count) {
                return HandlerOutcome::Fallback;
            }
            HandlerOutcome::Emit(OperationKind::Path { kind: $kind }, None)
        }
    };
}

path_op!(op_m, 2, PathKind::MoveTo);
path_op!(op_l, 2, PathKind::LineTo);
path_op!(op_c, 6, PathKind::CurveTo);
path_op!(op_v, 4, PathKind::CurveTo);
path_op!(op_y, 4, PathKind::CurveTo);
path_op!(op_h, 0, PathKind::Close);
path_op!(op_stroke, 0, PathKind::Stroke);
path_op!(op_close_stroke, 0, PathKind::Stroke);
path_op!(op_fill, 0, PathKind::Fill);
path_op!(op_fill_legacy, 0, PathKind::Fill);
path_op!(op_fill_evenodd, 0, PathKind::Fill);
path_op!(op_fill_stroke, 0, PathKind::FillStroke);
path_op!(op_fill_stroke_evenodd, 0, PathKind::FillStroke);
path_op!(op_close_fill_stroke, 0, PathKind::FillStroke);
path_op!(op_close_fill_stroke_evenodd, 0, PathKind::FillStroke);
path_op!(op_end_path, 0, PathKind::EndPath);

/// `re x y w h`: the one path operator with a computed bbox, transformed
/// through the current CTM and normalized for negative width/height.
pub fn op_re(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let [Token::Number(x), Token::Number(y), Token::Number(w), Token::Number(h)] = operands else {
        return HandlerOutcome::Fallback;
    };
    let rect = normalize_rect((*x, *y, x + w, y + h));
    let bbox = apply_matrix_rect(stack.top().ctm, rect);
    HandlerOutcome::Emit(OperationKind::Path { kind: PathKind::Rectangle }, Some(bbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{FontId, FontResolver};
    use crate::operation::GlyphPosition;

    struct StubFontResolver;
    impl FontResolver for StubFontResolver {
        fn extract_letters(&self, _page_number: u32) -> Vec<GlyphPosition> {
            Vec::new()
        }
        fn unicode_for(&self, _font_id: &FontId, _codepoint: u32) -> Option<String> {
            None
        }
        fn is_cid_font(&self, _font_id: &FontId) -> bool {
            false
        }
        fn advance_width(&self, _font_id: &FontId, _font_size: f64, _codepoint: u32) -> f64 {
            0.0
        }
    }

    #[test]
    fn re_normalizes_negative_width_and_height() {
        let resolver = StubFontResolver;
        let hctx = HandlerContext {
            font_resolver: &resolver,
        };
        let mut stack = GraphicsStateStack::new();
        let operands = [
            Token::Number(100.0),
            Token::Number(200.0),
            Token::Number(-50.0),
            Token::Number(-30.0),
        ];
        let outcome = op_re(&operands, &mut stack, &hctx);
        match outcome {
            HandlerOutcome::Emit(OperationKind::Path { kind: PathKind::Rectangle }, Some(bbox)) => {
                assert_eq!(bbox, (50.0, 170.0, 100.0, 200.0));
            }
            _ => panic!("expected Rectangle emit with bbox"),
        }
    }

    #[test]
    fn fill_with_wrong_operand_count_falls_back() {
        let resolver = StubFontResolver;
        let hctx = HandlerContext {
            font_resolver: &resolver,
        };
        let mut stack = GraphicsStateStack::new();
        let outcome = op_fill(&[Token::Number(1.0)], &mut stack, &hctx);
        assert!(matches!(outcome, HandlerOutcome::Fallback));
    }
}
