pub mod codec;
pub mod config;
pub mod geometry;
pub mod id;
pub mod model;
pub mod payload;
pub mod viewport;

pub use codec::{CodecError, decode, encode, merge, prune, sanitize};
pub use config::CanvasConfig;
pub use geometry::{Position, ZoomBounds, clamp_zoom, fit_scale, grid_position, pointer_to_canvas_space};
pub use id::NodeId;
pub use model::*;
pub use payload::{eligible_products, parse_products};
pub use viewport::ViewportState;

// Re-export kurbo types so downstream crates don't need a direct dependency
pub use kurbo::{Affine, Point, Rect, Vec2};
