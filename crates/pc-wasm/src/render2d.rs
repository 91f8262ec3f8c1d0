//! Canvas2D renderer.
//!
//! Scene content is drawn under the viewport transform (document space);
//! selection chrome and the lasso band are drawn afterwards in screen space
//! so their line widths do not scale with zoom.

use pc_core::model::AnnotationKind;
use pc_core::{NodeId, Point, Rect, ViewportState};
use pc_editor::controller::TextDraft;
use pc_editor::{NodeKind, Overlay, SceneGraph, SceneNode};
use std::collections::HashMap;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

const BACKGROUND: &str = "#F5F5F7";
const GRID_DOT: &str = "rgba(0, 0, 0, 0.06)";
const ACCENT: &str = "#0A84FF";
const HIGHLIGHT_FILL: &str = "rgba(255, 214, 10, 0.18)";
const HIGHLIGHT_STROKE: &str = "#FFB800";
const LINE_STROKE: &str = "#FF3B30";
const TEXT_FILL: &str = "#1D1D1F";
const PLACEHOLDER: &str = "rgba(142, 142, 147, 0.15)";

pub struct Frame<'a> {
    pub scene: &'a SceneGraph,
    pub viewport: &'a ViewportState,
    pub images: &'a HashMap<String, HtmlImageElement>,
    pub selection: &'a [NodeId],
    pub overlay: Option<Overlay<'a>>,
    /// CSS pixel size of the canvas.
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
    pub handle_size: f64,
}

pub fn render(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
    let dpr = frame.device_pixel_ratio;
    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
    ctx.set_fill_style_str(BACKGROUND);
    ctx.fill_rect(0.0, 0.0, frame.width, frame.height);
    draw_grid(ctx, frame);

    let vp = frame.viewport;
    let _ = ctx.set_transform(
        dpr * vp.zoom,
        0.0,
        0.0,
        dpr * vp.zoom,
        dpr * vp.pan_x,
        dpr * vp.pan_y,
    );
    let editing = match &frame.overlay {
        Some(Overlay::Text(draft)) => draft.existing,
        _ => None,
    };
    for id in frame.scene.top_level() {
        if Some(id) == editing {
            continue;
        }
        if frame.scene.is_group(id) {
            for member in frame.scene.members(id) {
                draw_entity(ctx, frame, member);
            }
        } else {
            draw_entity(ctx, frame, id);
        }
    }
    match &frame.overlay {
        Some(Overlay::Line { start, end }) => draw_line(ctx, *start, *end, vp.zoom),
        Some(Overlay::Text(draft)) => draw_text_draft(ctx, draft),
        _ => {}
    }

    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
    draw_selection(ctx, frame);
    if let Some(Overlay::Lasso(band)) = &frame.overlay {
        draw_lasso(ctx, *band);
    }
}

fn draw_grid(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
    let spacing = 24.0 * frame.viewport.zoom;
    if spacing < 6.0 {
        return;
    }
    ctx.set_fill_style_str(GRID_DOT);
    let mut x = frame.viewport.pan_x.rem_euclid(spacing);
    while x < frame.width {
        let mut y = frame.viewport.pan_y.rem_euclid(spacing);
        while y < frame.height {
            ctx.fill_rect(x, y, 1.0, 1.0);
            y += spacing;
        }
        x += spacing;
    }
}

fn draw_entity(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>, id: NodeId) {
    let Some(node) = frame.scene.get(id) else { return };
    match &node.kind {
        NodeKind::Image {
            product_id, image, ..
        } => {
            let (w, h) = (image.width * node.scale_x, image.height * node.scale_y);
            match frame.images.get(product_id) {
                Some(img) => {
                    let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                        img, node.left, node.top, w, h,
                    );
                }
                None => {
                    ctx.set_fill_style_str(PLACEHOLDER);
                    ctx.fill_rect(node.left, node.top, w, h);
                }
            }
        }
        NodeKind::Annotation { shape, .. } => draw_annotation(ctx, node, shape, frame.viewport.zoom),
        NodeKind::Root | NodeKind::Group => {}
    }
}

fn draw_annotation(ctx: &CanvasRenderingContext2d, node: &SceneNode, shape: &AnnotationKind, zoom: f64) {
    ctx.save();
    let _ = ctx.translate(node.left, node.top);
    let _ = ctx.scale(node.scale_x, node.scale_y);
    match shape {
        AnnotationKind::Text { text, font_size } => {
            ctx.set_fill_style_str(TEXT_FILL);
            fill_lines(ctx, text, *font_size);
        }
        AnnotationKind::Highlight { width, height } => {
            ctx.set_fill_style_str(HIGHLIGHT_FILL);
            ctx.fill_rect(0.0, 0.0, *width, *height);
            ctx.set_stroke_style_str(HIGHLIGHT_STROKE);
            ctx.set_line_width(2.0 / zoom.max(f64::EPSILON));
            ctx.stroke_rect(0.0, 0.0, *width, *height);
        }
        AnnotationKind::Line { x1, y1, x2, y2 } => {
            draw_line(ctx, Point::new(*x1, *y1), Point::new(*x2, *y2), zoom);
        }
    }
    ctx.restore();
}

fn fill_lines(ctx: &CanvasRenderingContext2d, text: &str, font_size: f64) {
    ctx.set_font(&format!("{font_size}px -apple-system, BlinkMacSystemFont, sans-serif"));
    ctx.set_text_baseline("top");
    for (i, line) in text.lines().enumerate() {
        let _ = ctx.fill_text(line, 0.0, i as f64 * font_size * 1.2);
    }
}

fn draw_line(ctx: &CanvasRenderingContext2d, a: Point, b: Point, zoom: f64) {
    ctx.set_stroke_style_str(LINE_STROKE);
    ctx.set_line_width(3.0 / zoom.max(f64::EPSILON));
    ctx.set_line_cap("round");
    ctx.begin_path();
    ctx.move_to(a.x, a.y);
    ctx.line_to(b.x, b.y);
    ctx.stroke();
}

fn draw_text_draft(ctx: &CanvasRenderingContext2d, draft: &TextDraft) {
    ctx.save();
    let _ = ctx.translate(draft.left, draft.top);
    ctx.set_fill_style_str(TEXT_FILL);
    fill_lines(ctx, &draft.text, draft.font_size);
    // Caret after the last line.
    let last = draft.text.rsplit('\n').next().unwrap_or("");
    let caret_x = ctx.measure_text(last).map(|m| m.width()).unwrap_or(0.0);
    let lines = draft.text.split('\n').count().max(1) as f64;
    ctx.set_fill_style_str(ACCENT);
    ctx.fill_rect(caret_x + 1.0, (lines - 1.0) * draft.font_size * 1.2, 2.0, draft.font_size);
    ctx.restore();
}

fn draw_selection(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
    ctx.set_stroke_style_str(ACCENT);
    ctx.set_line_width(1.5);
    for id in frame.selection {
        let Some(r) = frame.scene.screen_rect_of(*id, true, frame.viewport) else {
            continue;
        };
        if frame.scene.is_group(*id) {
            set_dash(ctx, 6.0);
            ctx.stroke_rect(r.x0, r.y0, r.width(), r.height());
            set_dash(ctx, 0.0);
        } else {
            ctx.stroke_rect(r.x0, r.y0, r.width(), r.height());
        }
    }
    if let [id] = frame.selection
        && let Some(r) = frame.scene.screen_rect_of(*id, true, frame.viewport)
    {
        let s = frame.handle_size;
        ctx.set_fill_style_str("#FFFFFF");
        ctx.fill_rect(r.x1 - s / 2.0, r.y1 - s / 2.0, s, s);
        ctx.stroke_rect(r.x1 - s / 2.0, r.y1 - s / 2.0, s, s);
    }
}

fn draw_lasso(ctx: &CanvasRenderingContext2d, band: Rect) {
    if band.width() < 1.0 && band.height() < 1.0 {
        return;
    }
    ctx.save();
    ctx.set_fill_style_str("rgba(10, 132, 255, 0.08)");
    ctx.fill_rect(band.x0, band.y0, band.width(), band.height());
    ctx.set_stroke_style_str(ACCENT);
    ctx.set_line_width(1.0);
    set_dash(ctx, 4.0);
    ctx.stroke_rect(band.x0, band.y0, band.width(), band.height());
    ctx.restore();
}

fn set_dash(ctx: &CanvasRenderingContext2d, len: f64) {
    let pattern = if len > 0.0 {
        js_sys::Array::of2(&JsValue::from_f64(len), &JsValue::from_f64(len))
    } else {
        js_sys::Array::new()
    };
    let _ = ctx.set_line_dash(&pattern);
}
