//! Pure geometry helpers: pointer mapping, zoom clamping, and the grid
//! fallback used to place thumbnails that have no stored position.

use kurbo::{Point, Rect};

/// Top-left origin of a placed entity, in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub left: f64,
    pub top: f64,
}

impl Position {
    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// Inclusive zoom range accepted by the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            min: 0.01,
            max: 4.0,
        }
    }
}

/// Map a client-space pointer position into canvas-element space by
/// subtracting the element's bounding-rect origin.
pub fn pointer_to_canvas_space(client: Point, canvas_rect: Rect) -> Point {
    Point::new(client.x - canvas_rect.x0, client.y - canvas_rect.y0)
}

/// Clamp a requested zoom into `bounds`.
///
/// Returns `None` for non-finite or non-positive input; callers substitute 1.
pub fn clamp_zoom(value: f64, bounds: ZoomBounds) -> Option<f64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value.clamp(bounds.min, bounds.max))
}

/// Deterministic tiled placement for the `index`-th item.
///
/// Always yields at least one column, so a container narrower than one cell
/// stacks items vertically instead of dividing by zero.
pub fn grid_position(index: usize, available_width: f64, item_size: f64, gap: f64) -> Position {
    let cell = item_size + gap;
    let columns = if cell > 0.0 && available_width.is_finite() {
        (((available_width - gap) / cell).floor() as i64).max(1) as usize
    } else {
        1
    };
    let column = index % columns;
    let row = index / columns;
    Position {
        left: gap + column as f64 * cell,
        top: gap + row as f64 * cell,
    }
}

/// Uniform scale that fits an image of the given natural size inside a
/// `max_size` square without ever upscaling past 1:1.
pub fn fit_scale(natural_width: f64, natural_height: f64, max_size: f64) -> f64 {
    if !(natural_width > 0.0 && natural_height > 0.0 && max_size > 0.0) {
        return 1.0;
    }
    let scale = (max_size / natural_width)
        .min(max_size / natural_height)
        .min(1.0);
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// A scale component is valid when it is finite and strictly positive.
pub fn is_valid_scale(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Normalize a drag rectangle from two corners.
pub fn normalized_rect(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_subtracts_canvas_origin() {
        let p = pointer_to_canvas_space(
            Point::new(150.0, 90.0),
            Rect::new(50.0, 40.0, 850.0, 640.0),
        );
        assert_eq!(p, Point::new(100.0, 50.0));
    }

    #[test]
    fn clamp_zoom_rejects_invalid_input() {
        let bounds = ZoomBounds::default();
        assert_eq!(clamp_zoom(0.0, bounds), None);
        assert_eq!(clamp_zoom(-2.0, bounds), None);
        assert_eq!(clamp_zoom(f64::NAN, bounds), None);
        assert_eq!(clamp_zoom(f64::INFINITY, bounds), None);
    }

    #[test]
    fn clamp_zoom_stays_in_bounds() {
        let bounds = ZoomBounds::default();
        for value in [1e-9, 0.005, 0.01, 0.5, 1.0, 3.99, 4.0, 12.0, 1e12] {
            let z = clamp_zoom(value, bounds).unwrap();
            assert!(z >= bounds.min && z <= bounds.max, "{value} -> {z}");
        }
        assert_eq!(clamp_zoom(1.1, bounds), Some(1.1));
    }

    #[test]
    fn grid_single_column_when_narrow() {
        // columns = max(floor((500-40)/260), 1) = 1
        assert_eq!(grid_position(0, 500.0, 220.0, 40.0), Position::new(40.0, 40.0));
        assert_eq!(grid_position(1, 500.0, 220.0, 40.0), Position::new(40.0, 300.0));
    }

    #[test]
    fn grid_is_pure_and_distinct_per_index() {
        let width = 1200.0;
        for i in 0..20 {
            assert_eq!(
                grid_position(i, width, 220.0, 40.0),
                grid_position(i, width, 220.0, 40.0)
            );
        }
        let cells: Vec<Position> = (0..20).map(|i| grid_position(i, width, 220.0, 40.0)).collect();
        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn grid_wraps_rows() {
        // (1200-40)/260 = 4.46 → 4 columns
        assert_eq!(grid_position(3, 1200.0, 220.0, 40.0), Position::new(820.0, 40.0));
        assert_eq!(grid_position(4, 1200.0, 220.0, 40.0), Position::new(40.0, 300.0));
    }

    #[test]
    fn grid_tolerates_zero_width() {
        assert_eq!(grid_position(2, 0.0, 220.0, 40.0), Position::new(40.0, 560.0));
    }

    #[test]
    fn fit_scale_never_upscales() {
        assert_eq!(fit_scale(100.0, 50.0, 220.0), 1.0);
        assert!((fit_scale(440.0, 220.0, 220.0) - 0.5).abs() < 1e-9);
        assert!((fit_scale(220.0, 880.0, 220.0) - 0.25).abs() < 1e-9);
        assert_eq!(fit_scale(0.0, 100.0, 220.0), 1.0);
    }
}
