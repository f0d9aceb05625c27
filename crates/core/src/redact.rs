//! The redaction decider: given a parsed operation stream and a list of
//! redaction rectangles, decides per-operation whether to drop it, keep it,
//! or — under [`RedactionPolicy::GlyphLevel`] — rewrite a `Text` operation to
//! erase only the glyphs whose centre falls inside a rectangle.
//!
//! No precedent for this exists elsewhere in this codebase (it only ever
//! extracts text, never redacts), so this module is built directly against
//! the operation-disposition rules, reusing this crate's own
//! [`crate::matrix`] and [`crate::operation`] types rather than inventing
//! new geometry helpers.

use crate::external::{FontResolver, RedactedItem, RedactionPolicy, RedactionRectangle};
use crate::matrix::{rects_intersect, union_rect};
use crate::operation::{GlyphPosition, Operation, OperationKind, PathKind, Rectangle};
use crate::token::Token;

/// Everything the decider needs beyond the operation list itself.
pub struct RedactionContext<'a> {
    pub rectangles: &'a [RedactionRectangle],
    pub font_resolver: &'a dyn FontResolver,
    pub policy: RedactionPolicy,
}

/// Outcome of running the decider over one stream (main page content, or one
/// Form XObject's nested operations).
pub struct DecisionResult {
    pub operations: Vec<Operation>,
    pub redacted_items: Vec<RedactedItem>,
    pub forms_modified: u32,
    /// `(xobject_name, rewritten_bytes)` for every Form XObject, at any
    /// nesting depth, whose content actually changed. The orchestrator
    /// commits these alongside the main page bytes.
    pub form_writes: Vec<(String, Vec<u8>)>,
    /// Whether this level's operation list differs from what it was handed.
    /// Forms use this to decide whether their own bytes need rewriting.
    pub changed: bool,
}

fn page_rects(rectangles: &[RedactionRectangle]) -> Vec<Rectangle> {
    rectangles.iter().map(|r| r.page_coords).collect()
}

fn bbox_intersects_any(bbox: Option<Rectangle>, rects: &[Rectangle]) -> bool {
    match bbox {
        Some(b) => rects.iter().any(|r| rects_intersect(b, *r)),
        None => false,
    }
}

/// A glyph is redacted iff its centre lies inside any redaction rectangle,
/// expanded by half the glyph's width when character spacing is negative —
/// this defeats collapsed-kern attacks that try to hide text by squeezing
/// glyphs on top of each other just outside a rectangle's nominal bounds.
fn glyph_is_redacted(glyph: &GlyphPosition, rects: &[Rectangle], char_space_negative: bool) -> bool {
    let (cx, cy) = glyph.centre();
    let expand = if char_space_negative {
        glyph.width.abs() / 2.0
    } else {
        0.0
    };
    rects.iter().any(|r| {
        let (left, bottom, right, top) = (r.0 - expand, r.1, r.2 + expand, r.3);
        cx >= left && cx <= right && cy >= bottom && cy <= top
    })
}

/// Flattens a text-showing operation's operands back into the sequence of
/// `Number`/`LiteralString`/`HexString` tokens [`show_text`](crate::dispatch)
/// originally walked, so the decider can recover per-glyph source bytes.
fn text_items(op: &Operation) -> Vec<Token> {
    match op.operator_name.as_str() {
        "TJ" => match op.operands.as_slice() {
            [Token::Array(items)] => items.clone(),
            _ => Vec::new(),
        },
        "Tj" | "'" => op.operands.clone(),
        "\"" => op.operands.last().cloned().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Per-glyph `(is_hex_source, raw_bytes)`, in the same order as
/// `op.glyphs`, recovered by re-walking the original operand tokens exactly
/// as the dispatcher's text handler did.
fn glyph_sources(items: &[Token], is_cid_font: bool) -> Vec<(bool, Vec<u8>)> {
    let mut out = Vec::new();
    for item in items {
        let (bytes, is_hex) = match item {
            Token::LiteralString(b) => (b, false),
            Token::HexString(b) => (b, true),
            _ => continue,
        };
        if is_cid_font {
            let mut i = 0;
            while i < bytes.len() {
                let hi = bytes[i];
                let lo = bytes.get(i + 1).copied().unwrap_or(0);
                out.push((is_hex, vec![hi, lo]));
                i += 2;
            }
        } else {
            for &b in bytes {
                out.push((is_hex, vec![b]));
            }
        }
    }
    out
}

/// Rewrites a partially-redacted `Text` operation to a `TJ` array that
/// preserves the kept glyphs' original positions under the GlyphLevel policy.
fn rewrite_glyph_level(
    op: &Operation,
    glyphs: &[GlyphPosition],
    kept: &[bool],
    font_id: Option<String>,
    font_size: f64,
    is_cid_font: bool,
    h_scale: f64,
    font_resolver: &dyn FontResolver,
) -> Operation {
    let items = text_items(op);
    let sources = glyph_sources(&items, is_cid_font);

    let mut out_items: Vec<Token> = Vec::new();
    let mut decoded_text = String::new();
    let mut kept_glyphs = Vec::new();
    let mut i = 0;
    let denom = font_size * h_scale;

    while i < glyphs.len() {
        if !kept[i] {
            let mut sum = 0.0;
            while i < glyphs.len() && !kept[i] {
                sum += glyphs[i].width;
                i += 1;
            }
            if denom.abs() > f64::EPSILON {
                out_items.push(Token::Number(-1000.0 * sum / denom));
            }
        } else {
            let hex = sources.get(i).map(|(h, _)| *h).unwrap_or(false);
            let mut bytes = Vec::new();
            while i < glyphs.len() && kept[i] && sources.get(i).map(|(h, _)| *h).unwrap_or(hex) == hex {
                if let Some((_, b)) = sources.get(i) {
                    bytes.extend_from_slice(b);
                }
                if let Some(s) = font_id
                    .as_ref()
                    .and_then(|f| font_resolver.unicode_for(f, glyphs[i].codepoint))
                    .or_else(|| char::from_u32(glyphs[i].codepoint).map(String::from))
                {
                    decoded_text.push_str(&s);
                }
                kept_glyphs.push(glyphs[i]);
                i += 1;
            }
            out_items.push(if hex {
                Token::HexString(bytes)
            } else {
                Token::LiteralString(bytes)
            });
        }
    }

    let bbox = kept_glyphs
        .iter()
        .map(GlyphPosition::bbox)
        .reduce(crate::matrix::union_rect);

    Operation {
        operator_name: "TJ".to_string(),
        operands: vec![Token::Array(out_items)],
        stream_index: op.stream_index,
        inside_text_block: op.inside_text_block,
        bbox,
        kind: OperationKind::Text {
            decoded_text,
            glyphs: kept_glyphs,
            font_id,
            font_size,
            is_cid_font,
            was_hex_string: false,
        },
    }
}

/// Runs the decider over one stream's operation list, recursing into any
/// `FormXObject` nested operations it finds along the way.
pub fn decide(ops: Vec<Operation>, ctx: &RedactionContext) -> DecisionResult {
    let rects = page_rects(ctx.rectangles);
    let result = decide_ops(ops, &rects, ctx);
    if is_balanced(&result.operations) {
        result
    } else {
        // Defensive fallback: this branch
        // should be unreachable because state/text-block operations are
        // never dropped, but if it is ever hit, surface nothing redacted
        // rather than emit an invalid stream.
        DecisionResult {
            operations: result.operations,
            redacted_items: Vec::new(),
            forms_modified: 0,
            form_writes: Vec::new(),
            changed: false,
        }
    }
}

/// A path is built up across several construction operators (`m l c v y h
/// re`) before a single painting operator (`S s f F f* B B* b b* n`) closes
/// it; only `re` carries a computed bbox (see `dispatch::path`). This tracks
/// the union of bboxes seen since the last painting operator so a paint op
/// with no bbox of its own (e.g. `f` after `re`) is judged against the same
/// rectangle its construction operators were, and the two rise or fall
/// together per the data model's "share the rectangle's bbox" scenario.
fn path_effective_bbox(op: &Operation, pending: &Option<Rectangle>) -> Option<Rectangle> {
    op.bbox.or(*pending)
}

fn is_path_paint(kind: PathKind) -> bool {
    matches!(
        kind,
        PathKind::Stroke | PathKind::Fill | PathKind::FillStroke | PathKind::EndPath
    )
}

fn decide_ops(ops: Vec<Operation>, rects: &[Rectangle], ctx: &RedactionContext) -> DecisionResult {
    let mut kept = Vec::with_capacity(ops.len());
    let mut redacted_items = Vec::new();
    let mut forms_modified = 0u32;
    let mut form_writes = Vec::new();
    let mut changed = false;
    let mut pending_path_bbox: Option<Rectangle> = None;

    for op in ops {
        match op.kind {
            OperationKind::FormXObject {
                ref xobject_name,
                form_bbox,
                form_matrix,
                ref content_bytes,
                ref nested_ops,
            } => {
                let nested_result = decide_ops(nested_ops.clone(), rects, ctx);
                redacted_items.extend(nested_result.redacted_items);
                forms_modified += nested_result.forms_modified;
                form_writes.extend(nested_result.form_writes);
                if nested_result.changed {
                    forms_modified += 1;
                    form_writes.push((
                        xobject_name.clone(),
                        crate::write::write_operations(&nested_result.operations, None, 0.0),
                    ));
                }
                kept.push(Operation {
                    operator_name: op.operator_name,
                    operands: op.operands,
                    stream_index: op.stream_index,
                    inside_text_block: op.inside_text_block,
                    bbox: op.bbox,
                    kind: OperationKind::FormXObject {
                        xobject_name: xobject_name.clone(),
                        form_bbox,
                        form_matrix,
                        content_bytes: content_bytes.clone(),
                        nested_ops: nested_result.operations,
                    },
                });
            }
            OperationKind::Text {
                ref decoded_text,
                ref glyphs,
                ref font_id,
                font_size,
                is_cid_font,
                ..
            } => match ctx.policy {
                RedactionPolicy::WholeOperation => {
                    if bbox_intersects_any(op.bbox, rects) {
                        redacted_items.push(RedactedItem {
                            text: decoded_text.clone(),
                            bbox: op.bbox.unwrap_or((0.0, 0.0, 0.0, 0.0)),
                        });
                        changed = true;
                    } else {
                        kept.push(op);
                    }
                }
                RedactionPolicy::GlyphLevel => {
                    if glyphs.is_empty() {
                        if bbox_intersects_any(op.bbox, rects) {
                            redacted_items.push(RedactedItem {
                                text: decoded_text.clone(),
                                bbox: op.bbox.unwrap_or((0.0, 0.0, 0.0, 0.0)),
                            });
                            changed = true;
                        } else {
                            kept.push(op);
                        }
                        continue;
                    }
                    let char_space_negative = false; // char_space isn't retained per-op; see DESIGN.md
                    let flags: Vec<bool> = glyphs
                        .iter()
                        .map(|g| !glyph_is_redacted(g, rects, char_space_negative))
                        .collect();
                    let redacted_count = flags.iter().filter(|k| !**k).count();
                    if redacted_count == 0 {
                        kept.push(op);
                    } else if redacted_count == glyphs.len() {
                        redacted_items.push(RedactedItem {
                            text: decoded_text.clone(),
                            bbox: op.bbox.unwrap_or((0.0, 0.0, 0.0, 0.0)),
                        });
                        changed = true;
                    } else {
                        let h_scale = 1.0; // text handler already bakes Th into glyph widths
                        let rewritten = rewrite_glyph_level(
                            &op,
                            glyphs,
                            &flags,
                            font_id.clone(),
                            font_size,
                            is_cid_font,
                            h_scale,
                            ctx.font_resolver,
                        );
                        let redacted_text: String = glyphs
                            .iter()
                            .zip(flags.iter())
                            .filter(|(_, kept)| !**kept)
                            .filter_map(|(g, _)| {
                                font_id
                                    .as_ref()
                                    .and_then(|f| ctx.font_resolver.unicode_for(f, g.codepoint))
                                    .or_else(|| char::from_u32(g.codepoint).map(String::from))
                            })
                            .collect();
                        if !redacted_text.is_empty() {
                            redacted_items.push(RedactedItem {
                                text: redacted_text,
                                bbox: op.bbox.unwrap_or((0.0, 0.0, 0.0, 0.0)),
                            });
                        }
                        kept.push(rewritten);
                        changed = true;
                    }
                }
            },
            _ if op.is_structural() => kept.push(op),
            OperationKind::Path { kind } => {
                let effective_bbox = path_effective_bbox(&op, &pending_path_bbox);
                if let Some(b) = op.bbox {
                    pending_path_bbox = Some(match pending_path_bbox {
                        Some(p) => union_rect(p, b),
                        None => b,
                    });
                }
                if is_path_paint(kind) {
                    pending_path_bbox = None;
                }
                if !bbox_intersects_any(effective_bbox, rects) {
                    kept.push(op);
                } else {
                    changed = true;
                }
            }
            _ => {
                if !bbox_intersects_any(op.bbox, rects) {
                    kept.push(op);
                } else {
                    changed = true;
                }
            }
        }
    }

    DecisionResult {
        operations: kept,
        redacted_items,
        forms_modified,
        form_writes,
        changed,
    }
}

/// Verifies `q`/`Q` and `BT`/`ET` balance across a kept operation list. The
/// decider never removes structural operations, so this should always hold;
/// it exists as a defensive check against that invariant ever breaking.
fn is_balanced(ops: &[Operation]) -> bool {
    let mut depth = 0i64;
    let mut in_text = false;
    for op in ops {
        if op.is_save() {
            depth += 1;
        } else if op.is_restore() {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        } else if op.is_text_block_begin() {
            if in_text {
                return false;
            }
            in_text = true;
        } else if op.is_text_block_end() {
            if !in_text {
                return false;
            }
            in_text = false;
        }
    }
    depth == 0 && !in_text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::OperatorDispatcher;
    use crate::external::FontId;

    struct StubFontResolver;
    impl FontResolver for StubFontResolver {
        fn extract_letters(&self, _page_number: u32) -> Vec<GlyphPosition> {
            Vec::new()
        }
        fn unicode_for(&self, _font_id: &FontId, codepoint: u32) -> Option<String> {
            char::from_u32(codepoint).map(String::from)
        }
        fn is_cid_font(&self, _font_id: &FontId) -> bool {
            false
        }
        fn advance_width(&self, _font_id: &FontId, _font_size: f64, _codepoint: u32) -> f64 {
            500.0
        }
    }

    fn parse(src: &[u8]) -> Vec<Operation> {
        let dispatcher = OperatorDispatcher::new();
        let resolver = StubFontResolver;
        dispatcher.parse(src, &resolver, &|| false).unwrap()
    }

    #[test]
    fn whole_operation_drops_intersecting_text_and_keeps_structure() {
        let ops = parse(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (90.0, 695.0, 200.0, 715.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        let names: Vec<_> = result
            .operations
            .iter()
            .map(|o| o.operator_name.as_str())
            .collect();
        assert_eq!(names, vec!["BT", "Tf", "Td", "ET"]);
        assert_eq!(result.redacted_items.len(), 1);
        assert_eq!(result.redacted_items[0].text, "Hello World");
    }

    #[test]
    fn empty_rectangle_list_redacts_nothing() {
        let ops = parse(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET");
        let resolver = StubFontResolver;
        let ctx = RedactionContext {
            rectangles: &[],
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let before = ops.len();
        let result = decide(ops, &ctx);
        assert_eq!(result.operations.len(), before);
        assert!(result.redacted_items.is_empty());
    }

    #[test]
    fn rectangle_and_fill_are_dropped_together() {
        let ops = parse(b"100 200 50 30 re f");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (110.0, 205.0, 140.0, 225.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        assert!(result.operations.is_empty());
    }

    #[test]
    fn image_do_intersecting_rectangle_is_dropped() {
        // `100 0 0 100 50 60 cm` places the image's unit square at
        // (50,60)-(150,160); the redaction rectangle overlaps it.
        let ops = parse(b"q 100 0 0 100 50 60 cm /Im1 Do Q");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (60.0, 70.0, 90.0, 100.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        let names: Vec<_> = result
            .operations
            .iter()
            .map(|o| o.operator_name.as_str())
            .collect();
        assert_eq!(names, vec!["q", "cm", "Q"]);
    }

    #[test]
    fn image_do_outside_redaction_rectangle_is_kept() {
        let ops = parse(b"q 100 0 0 100 50 60 cm /Im1 Do Q");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (500.0, 500.0, 600.0, 600.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        let names: Vec<_> = result
            .operations
            .iter()
            .map(|o| o.operator_name.as_str())
            .collect();
        assert_eq!(names, vec!["q", "cm", "Do", "Q"]);
    }

    #[test]
    fn fill_outside_redaction_rectangle_is_kept_with_its_rectangle() {
        let ops = parse(b"100 200 50 30 re f");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (500.0, 500.0, 600.0, 600.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        let names: Vec<_> = result
            .operations
            .iter()
            .map(|o| o.operator_name.as_str())
            .collect();
        assert_eq!(names, vec!["re", "f"]);
    }

    #[test]
    fn a_second_unrelated_rectangle_after_a_redacted_one_is_unaffected() {
        // "re f" (redacted) followed by an independent "re f" elsewhere on
        // the page: the pending-path-bbox tracker must reset after each
        // paint operator rather than leaking the first rectangle's bbox
        // into the second.
        let ops = parse(b"100 200 50 30 re f 500 500 10 10 re f");
        let resolver = StubFontResolver;
        let rectangles = vec![RedactionRectangle {
            page_coords: (110.0, 205.0, 140.0, 225.0),
            visual_coords: None,
        }];
        let ctx = RedactionContext {
            rectangles: &rectangles,
            font_resolver: &resolver,
            policy: RedactionPolicy::WholeOperation,
        };
        let result = decide(ops, &ctx);
        let names: Vec<_> = result
            .operations
            .iter()
            .map(|o| o.operator_name.as_str())
            .collect();
        assert_eq!(names, vec!["re", "f"]);
        let bbox = result.operations[0].bbox.unwrap();
        assert_eq!(bbox, (500.0, 500.0, 510.0, 510.0));
    }
}
