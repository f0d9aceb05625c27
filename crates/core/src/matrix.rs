//! Affine geometry used by the content-stream pipeline.
//!
//! Port of the matrix routines from pdfminer.six utils.py, trimmed to the
//! subset the redaction pipeline needs: matrix concatenation and point/rect
//! transforms. The PDF convention transforms `(x, y)` to
//! `(a*x + c*y + e, b*x + d*y + f)`.

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle defined by `(left, bottom, right, top)`, always normalized so
/// `left <= right` and `bottom <= top`.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix `(a, b, c, d, e, f)`.
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Multiplies two matrices: result = m1 * m0, applying m0 first, then m1.
///
/// `cm a b c d e f` concatenates as `CTM <- M(a..f) . CTM`, i.e. the operand
/// matrix is applied before the existing CTM: `mult_matrix(operand_matrix, ctm)`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Applies a matrix to a rectangle, returning the axis-aligned bounding box
/// of the four transformed corners (not a rotated rectangle).
pub fn apply_matrix_rect(m: Matrix, rect: Rect) -> Rect {
    let (x0, y0, x1, y1) = rect;
    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)].map(|p| apply_matrix_pt(m, p));

    let left = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let right = corners
        .iter()
        .map(|p| p.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let bottom = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let top = corners
        .iter()
        .map(|p| p.1)
        .fold(f64::NEG_INFINITY, f64::max);
    (left, bottom, right, top)
}

/// Normalizes a rectangle so `left <= right` and `bottom <= top`.
pub fn normalize_rect(r: Rect) -> Rect {
    let (x0, y0, x1, y1) = r;
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// Returns the smallest rectangle enclosing both inputs.
pub fn union_rect(a: Rect, b: Rect) -> Rect {
    (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
}

/// Whether two normalized rectangles overlap (touching edges do not count).
/// A degenerate rectangle (zero width or height, e.g. a redaction region
/// collapsed to a line) never intersects anything, even one it passes
/// through, since it paints nothing for any operation to share with.
pub fn rects_intersect(a: Rect, b: Rect) -> bool {
    a.0 < a.2 && a.1 < a.3 && b.0 < b.2 && b.1 < b.3 && a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3
}

/// Translates a matrix so its origin sits at `v` within its own coordinate
/// system (used by `Td`/`TD`/`T*`: `translate(tx, ty) . line_matrix`).
pub fn translate_matrix(m: Matrix, v: Point) -> Matrix {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a, b, c, d, x * a + y * c + e, x * b + y * d + f)
}
