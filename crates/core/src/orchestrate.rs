//! Page orchestrator: the entry point an embedding application calls.
//! Fetches a page's content bytes from the [`ObjectStore`], parses them,
//! recursively resolves and redacts any Form XObjects, writes the result
//! back, and commits it. Grounded on this codebase's `document::Document`/
//! `interp::Interpreter` page-processing loop (`document.rs`,
//! `interp/mod.rs`) for the shape of a fetch-parse-recurse-commit
//! pipeline, adapted from rendering to rewriting.

use std::collections::HashMap;

use tracing::{debug_span, info_span, warn};

use crate::dispatch::OperatorDispatcher;
use crate::error::{RedactError, Result};
use crate::external::{
    FontResolver, ObjectStore, RedactionOptions, RedactionRectangle, RedactionReport,
    XObjectSubtype,
};
use crate::matrix::Matrix;
use crate::operation::{Operation, OperationKind, Rectangle};
use crate::redact::{self, RedactionContext};

/// Redacts one page: the single public entry point of the crate.
///
/// `cancel` is polled cooperatively throughout parsing and form resolution;
/// returning `true` aborts with [`RedactError::Cancelled`] and leaves the
/// object store uncommitted.
pub fn redact_page(
    store: &mut dyn ObjectStore,
    font_resolver: &dyn FontResolver,
    page_number: u32,
    rectangles: &[RedactionRectangle],
    options: &RedactionOptions,
    cancel: &dyn Fn() -> bool,
) -> Result<RedactionReport> {
    let span = info_span!("redact_page", page = page_number);
    let _enter = span.enter();

    let page = store.get_page_content(page_number)?;
    let rectangles = normalize_rectangles(rectangles, page.page_rotation, page.media_box);

    let dispatcher = OperatorDispatcher::new();
    let main_ops = dispatcher.parse(&page.bytes, font_resolver, cancel)?;

    let mut warnings = Vec::new();
    let mut visited = Vec::new();
    let resolved_ops = resolve_forms(
        main_ops,
        store,
        font_resolver,
        &page.resources,
        0,
        &mut visited,
        options.form_recursion_limit,
        &mut warnings,
        cancel,
    )?;

    let ctx = RedactionContext {
        rectangles: &rectangles,
        font_resolver,
        policy: options.policy,
    };
    let decision = redact::decide(resolved_ops, &ctx);

    let main_bytes = crate::write::wrap_with_save_restore(crate::write::write_operations(
        &decision.operations,
        options.fallback_font_id.as_deref(),
        options.fallback_font_size,
    ));

    let mut form_bytes = HashMap::new();
    for (name, bytes) in decision.form_writes {
        form_bytes.insert(name, bytes);
    }

    store.commit_page(page_number, main_bytes, form_bytes)?;

    Ok(RedactionReport {
        page: page_number,
        redacted_items: decision.redacted_items,
        forms_modified: decision.forms_modified,
        warnings,
    })
}

/// Walks `ops`, resolving every `Do` the dispatcher emitted as `Image` into
/// either a confirmed raster image (left untouched) or a Form XObject whose
/// content stream is parsed and recursively resolved in turn.
#[allow(clippy::too_many_arguments)]
fn resolve_forms(
    ops: Vec<Operation>,
    store: &mut dyn ObjectStore,
    font_resolver: &dyn FontResolver,
    resources: &[u8],
    depth: u32,
    visited: &mut Vec<String>,
    recursion_limit: u32,
    warnings: &mut Vec<String>,
    cancel: &dyn Fn() -> bool,
) -> Result<Vec<Operation>> {
    let mut out = Vec::with_capacity(ops.len());

    for op in ops {
        let OperationKind::Image { ref xobject_name } = op.kind else {
            out.push(op);
            continue;
        };

        if cancel() {
            return Err(RedactError::Cancelled);
        }

        let resolved = match store.resolve_xobject(resources, xobject_name) {
            Ok(Some(data)) => data,
            Ok(None) => {
                out.push(op);
                continue;
            }
            Err(err) => {
                warnings.push(format!("could not resolve xobject {xobject_name}: {err}"));
                out.push(op);
                continue;
            }
        };

        if resolved.subtype == XObjectSubtype::Image {
            out.push(op);
            continue;
        }

        if visited.contains(xobject_name) {
            warnings.push(format!(
                "{}",
                RedactError::CycleDetected {
                    name: xobject_name.clone(),
                }
            ));
            out.push(op);
            continue;
        }
        if depth >= recursion_limit {
            warnings.push(format!(
                "{}",
                RedactError::DepthLimit {
                    name: xobject_name.clone(),
                    limit: recursion_limit,
                }
            ));
            out.push(op);
            continue;
        }

        let span = debug_span!("render_form", name = %xobject_name, depth);
        let _enter = span.enter();

        let dispatcher = OperatorDispatcher::new();
        let nested_ops = match dispatcher.parse(&resolved.stream_bytes, font_resolver, cancel) {
            Ok(ops) => ops,
            Err(RedactError::Cancelled) => return Err(RedactError::Cancelled),
            Err(err) => {
                warnings.push(format!(
                    "{}",
                    RedactError::CorruptXObject {
                        name: xobject_name.clone(),
                        reason: err.to_string(),
                    }
                ));
                out.push(op);
                continue;
            }
        };

        visited.push(xobject_name.clone());
        let resolved_nested = resolve_forms(
            nested_ops,
            store,
            font_resolver,
            &resolved.resources,
            depth + 1,
            visited,
            recursion_limit,
            warnings,
            cancel,
        )?;
        visited.pop();

        out.push(Operation {
            operator_name: op.operator_name,
            operands: op.operands,
            stream_index: op.stream_index,
            inside_text_block: op.inside_text_block,
            bbox: op.bbox,
            kind: OperationKind::FormXObject {
                xobject_name: xobject_name.clone(),
                form_bbox: resolved.bbox,
                form_matrix: resolved.matrix.unwrap_or(crate::matrix::MATRIX_IDENTITY),
                content_bytes: resolved.stream_bytes,
                nested_ops: resolved_nested,
            },
        });
    }

    Ok(out)
}

/// Resolves each rectangle's page-space coordinates. When the page is
/// rotated and the caller supplied `visual_coords`, those are preferred and
/// converted back into content-stream space; `page_coords` is otherwise
/// trusted as-is (the common, unrotated case).
fn normalize_rectangles(
    rectangles: &[RedactionRectangle],
    rotation: u16,
    media_box: (f64, f64, f64, f64),
) -> Vec<RedactionRectangle> {
    if rotation == 0 {
        return rectangles.to_vec();
    }
    rectangles
        .iter()
        .map(|r| match r.visual_coords {
            Some(visual) => RedactionRectangle {
                page_coords: visual_to_page_rect(visual, rotation, media_box),
                visual_coords: r.visual_coords,
            },
            None => r.clone(),
        })
        .collect()
}

/// Converts a rectangle in visual (post-rotation, as displayed) coordinates
/// back into content-stream space, given the page's `/Rotate` value and
/// media box. Only the four legal PDF rotation values are handled; any
/// other value is treated as unrotated.
fn visual_to_page_rect(visual: Rectangle, rotation: u16, media_box: (f64, f64, f64, f64)) -> Rectangle {
    let (mb_left, mb_bottom, mb_right, mb_top) = media_box;
    let w = mb_right - mb_left;
    let h = mb_top - mb_bottom;

    let inverse: Matrix = match rotation % 360 {
        90 => (0.0, -1.0, 1.0, 0.0, 0.0, h),
        180 => (-1.0, 0.0, 0.0, -1.0, w, h),
        270 => (0.0, 1.0, -1.0, 0.0, w, 0.0),
        _ => crate::matrix::MATRIX_IDENTITY,
    };

    crate::matrix::apply_matrix_rect(inverse, visual)
}
