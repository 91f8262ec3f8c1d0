//! Layout data model.
//!
//! `LayoutDocument` is the persisted unit: per-product transforms, group
//! membership, the viewport camera and freeform annotations. Products are
//! supplied by the host page and are read-only here.

use crate::geometry::{Position, is_valid_scale};
use crate::viewport::ViewportState;
use kurbo::Rect;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ─── Products ────────────────────────────────────────────────────────────

/// A catalog entry supplied by the host page.
///
/// Only `id` and `photo_url` matter to the canvas; everything else is kept
/// verbatim in `fields` for hosts that want to render captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, alias = "photo_url")]
    pub photo_url: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Product {
    pub fn new(id: impl Into<String>, photo_url: Option<&str>) -> Self {
        Self {
            id: id.into(),
            photo_url: photo_url.map(str::to_string),
            fields: serde_json::Map::new(),
        }
    }

    /// The photo URL, if present and non-blank.
    pub fn photo(&self) -> Option<&str> {
        self.photo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Product ids arrive as JSON numbers or strings; both normalize to text.
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("unsupported product id: {other}"))),
    }
}

// ─── Node transforms ─────────────────────────────────────────────────────

/// Document-space transform of one product-bound node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTransform {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl NodeTransform {
    pub fn new(left: f64, top: f64, scale: f64) -> Self {
        Self {
            left,
            top,
            scale_x: scale,
            scale_y: scale,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.left, self.top)
    }

    pub fn has_valid_position(&self) -> bool {
        self.left.is_finite() && self.top.is_finite()
    }

    pub fn has_valid_scale(&self) -> bool {
        is_valid_scale(self.scale_x) && is_valid_scale(self.scale_y)
    }

    /// Coerce non-finite positions to 0 and invalid scales to 1.
    pub fn sanitized(self) -> Self {
        Self {
            left: finite_or(self.left, 0.0),
            top: finite_or(self.top, 0.0),
            scale_x: valid_scale_or_one(self.scale_x),
            scale_y: valid_scale_or_one(self.scale_y),
        }
    }
}

pub(crate) fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

pub(crate) fn valid_scale_or_one(value: f64) -> f64 {
    if is_valid_scale(value) { value } else { 1.0 }
}

// ─── Groups ──────────────────────────────────────────────────────────────

/// Persisted group: the member product ids.
///
/// Canonical form keeps `members` sorted and unique so that equivalent
/// groups serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupSpec {
    pub members: Vec<String>,
}

impl GroupSpec {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = Self {
            members: members.into_iter().map(Into::into).collect(),
        };
        group.canonicalize();
        group
    }

    pub fn canonicalize(&mut self) {
        self.members.sort();
        self.members.dedup();
    }

    /// A group needs at least two members to exist.
    pub fn is_viable(&self) -> bool {
        self.members.len() >= 2
    }
}

// ─── Annotations ─────────────────────────────────────────────────────────

/// Shape of a freeform annotation, tagged by `customType` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "customType", rename_all = "lowercase")]
pub enum AnnotationKind {
    Text {
        text: String,
        #[serde(default = "default_font_size", rename = "fontSize")]
        font_size: f64,
    },
    Highlight {
        width: f64,
        height: f64,
    },
    /// Endpoints relative to the annotation origin.
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
}

fn default_font_size() -> f64 {
    20.0
}

fn default_scale() -> f64 {
    1.0
}

impl AnnotationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Highlight { .. } => "highlight",
            Self::Line { .. } => "line",
        }
    }

    /// Unscaled extent relative to the annotation origin.
    pub fn local_bounds(&self) -> Rect {
        match self {
            Self::Text { text, font_size } => {
                let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
                let lines = text.lines().count().max(1);
                Rect::new(
                    0.0,
                    0.0,
                    longest as f64 * font_size * 0.6,
                    lines as f64 * font_size * 1.2,
                )
            }
            Self::Highlight { width, height } => Rect::new(0.0, 0.0, *width, *height),
            Self::Line { x1, y1, x2, y2 } => Rect::new(
                x1.min(*x2),
                y1.min(*y2),
                x1.max(*x2),
                y1.max(*y2),
            ),
        }
    }
}

/// A freeform canvas object not bound to any product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAnnotation {
    pub custom_id: String,
    #[serde(flatten)]
    pub kind: AnnotationKind,
    pub left: f64,
    pub top: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
}

impl CustomAnnotation {
    pub fn new(custom_id: impl Into<String>, kind: AnnotationKind, left: f64, top: f64) -> Self {
        Self {
            custom_id: custom_id.into(),
            kind,
            left,
            top,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn sanitized(mut self) -> Self {
        self.left = finite_or(self.left, 0.0);
        self.top = finite_or(self.top, 0.0);
        self.scale_x = valid_scale_or_one(self.scale_x);
        self.scale_y = valid_scale_or_one(self.scale_y);
        match &mut self.kind {
            AnnotationKind::Text { font_size, .. } => {
                if !is_valid_scale(*font_size) {
                    *font_size = default_font_size();
                }
            }
            AnnotationKind::Highlight { width, height } => {
                *width = finite_or(*width, 0.0).max(0.0);
                *height = finite_or(*height, 0.0).max(0.0);
            }
            AnnotationKind::Line { x1, y1, x2, y2 } => {
                *x1 = finite_or(*x1, 0.0);
                *y1 = finite_or(*y1, 0.0);
                *x2 = finite_or(*x2, 0.0);
                *y2 = finite_or(*y2, 0.0);
            }
        }
        self
    }
}

// ─── Document ────────────────────────────────────────────────────────────

/// The persisted layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    #[serde(default)]
    pub objects: BTreeMap<String, NodeTransform>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_objects: Option<Vec<CustomAnnotation>>,
}

impl LayoutDocument {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.groups.is_empty()
            && self.viewport.is_none()
            && self.custom_objects.as_ref().is_none_or(Vec::is_empty)
    }

    pub fn transform_of(&self, product_id: &str) -> Option<&NodeTransform> {
        self.objects.get(product_id)
    }

    pub fn annotations(&self) -> &[CustomAnnotation] {
        self.custom_objects.as_deref().unwrap_or(&[])
    }
}
