//! Editor configuration.
//!
//! Every field has a default, so hosts may pass a partial JSON object (or
//! nothing at all) through the page.

use crate::geometry::ZoomBounds;
use serde::{Deserialize, Serialize};

/// Default local-storage key. Bump the suffix when the layout format changes
/// incompatibly.
pub const DEFAULT_STORAGE_KEY: &str = "product-canvas-layout-v1";

/// Configuration for an `Editor` session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Edge of the square each thumbnail is fitted into. Default: **220**.
    pub item_size: f64,

    /// Gap between grid cells, and the grid's outer margin. Default: **40**.
    pub gap: f64,

    pub min_zoom: f64,
    pub max_zoom: f64,

    /// Relative zoom change per wheel notch. Default: **0.1**.
    pub zoom_step: f64,

    /// Lines shorter than this (document px) are treated as accidental
    /// clicks and discarded. Default: **6**.
    pub min_line_length: f64,

    /// Padding around a node when a highlight box is auto-fitted to it.
    pub highlight_padding: f64,

    /// Hit radius of the scale handle at a selection's bottom-right corner,
    /// in screen px.
    pub handle_size: f64,

    pub storage_key: String,

    /// Whether pan/zoom changes are persisted with the layout. Default: **true**.
    pub persist_viewport: bool,

    /// Remote layout endpoint. `None` disables remote sync.
    pub remote_endpoint: Option<String>,

    /// Debounce window for remote pushes. Default: **2000 ms**.
    pub remote_push_delay_ms: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            item_size: 220.0,
            gap: 40.0,
            min_zoom: 0.01,
            max_zoom: 4.0,
            zoom_step: 0.1,
            min_line_length: 6.0,
            highlight_padding: 12.0,
            handle_size: 12.0,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            persist_viewport: true,
            remote_endpoint: None,
            remote_push_delay_ms: 2000.0,
        }
    }
}

impl CanvasConfig {
    /// Parse a JSON config, falling back to defaults on malformed input.
    pub fn from_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Self>(raw) {
            Ok(config) => config.validated(),
            Err(e) => {
                log::warn!("invalid canvas config, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        ZoomBounds {
            min: self.min_zoom,
            max: self.max_zoom,
        }
    }

    /// Replace nonsensical numbers with their defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64, d: f64| if v.is_finite() && v > 0.0 { v } else { d };
        self.item_size = positive(self.item_size, defaults.item_size);
        self.gap = if self.gap.is_finite() && self.gap >= 0.0 {
            self.gap
        } else {
            defaults.gap
        };
        self.min_zoom = positive(self.min_zoom, defaults.min_zoom);
        self.max_zoom = positive(self.max_zoom, defaults.max_zoom);
        if self.min_zoom > self.max_zoom {
            log::warn!(
                "min_zoom {} exceeds max_zoom {}, using default bounds",
                self.min_zoom,
                self.max_zoom
            );
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        self.zoom_step = if self.zoom_step.is_finite() && self.zoom_step > 0.0 && self.zoom_step < 1.0 {
            self.zoom_step
        } else {
            defaults.zoom_step
        };
        self.min_line_length = positive(self.min_line_length, defaults.min_line_length);
        self.highlight_padding = if self.highlight_padding.is_finite() {
            self.highlight_padding.max(0.0)
        } else {
            defaults.highlight_padding
        };
        self.handle_size = positive(self.handle_size, defaults.handle_size);
        self.remote_push_delay_ms = if self.remote_push_delay_ms.is_finite() {
            self.remote_push_delay_ms.max(0.0)
        } else {
            defaults.remote_push_delay_ms
        };
        if self.storage_key.trim().is_empty() {
            self.storage_key = defaults.storage_key;
        }
        self.remote_endpoint = self
            .remote_endpoint
            .take()
            .filter(|url| !url.trim().is_empty());
        self
    }
}
