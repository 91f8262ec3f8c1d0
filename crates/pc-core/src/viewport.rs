//! Camera transform: pan + zoom mapping from document space to screen space.
//!
//! `screen = document * zoom + pan`. Node transforms are always stored in
//! document space, so panning and zooming never perturb persisted positions.

use crate::geometry::{ZoomBounds, clamp_zoom};
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub zoom: f64,
    #[serde(rename = "x")]
    pub pan_x: f64,
    #[serde(rename = "y")]
    pub pan_y: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewportState {
    pub const IDENTITY: Self = Self {
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };

    pub fn pan(&self) -> Vec2 {
        Vec2::new(self.pan_x, self.pan_y)
    }

    /// The document → screen transform.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.pan()) * Affine::scale(self.zoom)
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.pan_x, p.y * self.zoom + self.pan_y)
    }

    pub fn to_document(&self, p: Point) -> Point {
        Point::new((p.x - self.pan_x) / self.zoom, (p.y - self.pan_y) / self.zoom)
    }

    pub fn rect_to_screen(&self, r: Rect) -> Rect {
        Rect::from_points(self.to_screen(r.origin()), self.to_screen(Point::new(r.x1, r.y1)))
    }

    pub fn rect_to_document(&self, r: Rect) -> Rect {
        Rect::from_points(
            self.to_document(r.origin()),
            self.to_document(Point::new(r.x1, r.y1)),
        )
    }

    /// Relative pan by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan_x += dx;
            self.pan_y += dy;
        }
    }

    /// Zoom to `requested`, keeping the document point under the screen
    /// position `anchor` fixed. Returns `false` when the zoom did not change.
    pub fn zoom_at(&mut self, anchor: Point, requested: f64, bounds: ZoomBounds) -> bool {
        let zoom = clamp_zoom(requested, bounds).unwrap_or(1.0);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let doc = self.to_document(anchor);
        self.zoom = zoom;
        self.pan_x = anchor.x - doc.x * zoom;
        self.pan_y = anchor.y - doc.y * zoom;
        true
    }

    /// One wheel notch: scale the zoom by `1 + step` (in) or `1 - step`
    /// (out), anchored at `anchor`.
    pub fn zoom_step(&mut self, anchor: Point, zoom_in: bool, step: f64, bounds: ZoomBounds) -> bool {
        let factor = if zoom_in { 1.0 + step } else { 1.0 - step };
        self.zoom_at(anchor, self.zoom * factor, bounds)
    }

    pub fn reset(&mut self) {
        *self = Self::IDENTITY;
    }

    /// Coerce corrupt values: zoom falls back to 1 (then clamps), pan to 0.
    pub fn sanitized(self, bounds: ZoomBounds) -> Self {
        Self {
            zoom: clamp_zoom(self.zoom, bounds).unwrap_or(1.0),
            pan_x: if self.pan_x.is_finite() { self.pan_x } else { 0.0 },
            pan_y: if self.pan_y.is_finite() { self.pan_y } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn zoom_to_point_keeps_anchor_fixed() {
        let mut vp = ViewportState::default();
        let anchor = Point::new(100.0, 100.0);
        let doc_before = vp.to_document(anchor);

        assert!(vp.zoom_step(anchor, true, 0.1, ZoomBounds::default()));
        assert!((vp.zoom - 1.1).abs() < 1e-9);
        assert!(approx(vp.to_screen(doc_before), anchor));
        assert!((vp.pan_x + 10.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = ViewportState {
            zoom: 4.0,
            ..ViewportState::default()
        };
        assert!(!vp.zoom_step(Point::ZERO, true, 0.1, ZoomBounds::default()));
        assert_eq!(vp.zoom, 4.0);
    }

    #[test]
    fn pan_is_relative_and_accumulates() {
        let mut vp = ViewportState::default();
        vp.pan_by(10.0, 5.0);
        vp.pan_by(-3.0, 2.0);
        assert_eq!(vp.pan(), Vec2::new(7.0, 7.0));
        vp.pan_by(f64::NAN, 1.0);
        assert_eq!(vp.pan(), Vec2::new(7.0, 7.0));
    }

    #[test]
    fn document_and_screen_are_inverse() {
        let vp = ViewportState {
            zoom: 2.5,
            pan_x: -40.0,
            pan_y: 12.0,
        };
        let p = Point::new(33.0, -7.0);
        assert!(approx(vp.to_document(vp.to_screen(p)), p));
        assert!(approx(vp.affine() * p, vp.to_screen(p)));
    }

    #[test]
    fn sanitize_coerces_corrupt_state() {
        let vp = ViewportState {
            zoom: f64::NAN,
            pan_x: f64::INFINITY,
            pan_y: 3.0,
        }
        .sanitized(ZoomBounds::default());
        assert_eq!(vp, ViewportState { zoom: 1.0, pan_x: 0.0, pan_y: 3.0 });
    }

    #[test]
    fn serializes_with_short_pan_keys() {
        let json = serde_json::to_string(&ViewportState {
            zoom: 2.0,
            pan_x: 1.0,
            pan_y: -1.0,
        })
        .unwrap();
        assert_eq!(json, r#"{"zoom":2.0,"x":1.0,"y":-1.0}"#);
    }
}
