//! Handlers for `q Q cm gs` and `Do` (the latter grouped here rather than
//! in its own file: like `cm`/`gs` it mutates nothing about text state and
//! the Page Orchestrator does the actual XObject resolution, so the
//! dispatcher-level handler is a one-liner). Grounded on this codebase's
//! `interp/ops/graphics_state.rs`.

use super::{HandlerContext, HandlerOutcome};
use crate::operation::OperationKind;
use crate::state::GraphicsStateStack;
use crate::token::Token;

fn operand_numbers(operands: &[Token]) -> Option<Vec<f64>> {
    operands
        .iter()
        .map(|t| match t {
            Token::Number(n) => Some(*n),
            _ => None,
        })
        .collect()
}

pub fn op_q(_operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    stack.push();
    HandlerOutcome::Emit(
        OperationKind::State {
            is_save: true,
            is_restore: false,
        },
        None,
    )
}

pub fn op_big_q(_operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    stack.pop();
    HandlerOutcome::Emit(
        OperationKind::State {
            is_save: false,
            is_restore: true,
        },
        None,
    )
}

pub fn op_cm(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let Some(nums) = operand_numbers(operands) else {
        return HandlerOutcome::Fallback;
    };
    let [a, b, c, d, e, f] = nums[..] else {
        return HandlerOutcome::Fallback;
    };
    stack.top_mut().concat_ctm((a, b, c, d, e, f));
    HandlerOutcome::Emit(
        OperationKind::State {
            is_save: false,
            is_restore: false,
        },
        None,
    )
}

/// `gs`: applies an ExtGState dictionary. The redaction pipeline has no use
/// for the dictionary contents (no blend modes or soft masks to honor), so
/// this is recorded purely so the writer can reproduce it unchanged.
pub fn op_gs(_operands: &[Token], _stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    HandlerOutcome::Emit(
        OperationKind::State {
            is_save: false,
            is_restore: false,
        },
        None,
    )
}

/// `Do`: the dispatcher never consults the `ObjectStore`, so it cannot tell
/// an image XObject from a form XObject here. It always emits `Image`; the
/// Page Orchestrator resolves the name and promotes the operation to
/// `FormXObject` with its nested operations already parsed when the
/// resolved subtype is Form. The bbox is the unit square `[0,1]²` (every
/// image XObject paints into that square by definition) transformed through
/// the current CTM, the same way `path::op_re` transforms a rectangle's
/// corners — this is what lets the redaction decider match an image `Do`
/// against a rectangle at all.
pub fn op_do(operands: &[Token], stack: &mut GraphicsStateStack, _ctx: &HandlerContext) -> HandlerOutcome {
    let Some(Token::Name(name)) = operands.last() else {
        return HandlerOutcome::Fallback;
    };
    let bbox = crate::matrix::apply_matrix_rect(stack.top().ctm, (0.0, 0.0, 1.0, 1.0));
    HandlerOutcome::Emit(
        OperationKind::Image {
            xobject_name: name.clone(),
        },
        Some(bbox),
    )
}
