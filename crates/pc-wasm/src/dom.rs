//! DOM → editor input translation and page attribute helpers.

use pc_core::{Point, Rect, pointer_to_canvas_space};
use pc_editor::{FocusTarget, InputEvent, Modifiers, PointerButton, Tool};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlDocument, HtmlElement, KeyboardEvent, MouseEvent, WheelEvent};

pub fn mouse_modifiers(e: &MouseEvent) -> Modifiers {
    Modifiers {
        shift: e.shift_key(),
        ctrl: e.ctrl_key(),
        alt: e.alt_key(),
        meta: e.meta_key(),
    }
}

pub fn key_modifiers(e: &KeyboardEvent) -> Modifiers {
    Modifiers {
        shift: e.shift_key(),
        ctrl: e.ctrl_key(),
        alt: e.alt_key(),
        meta: e.meta_key(),
    }
}

/// Pointer position relative to the canvas element.
pub fn canvas_point(canvas: &HtmlCanvasElement, e: &MouseEvent) -> Point {
    let r = canvas.get_bounding_client_rect();
    pointer_to_canvas_space(
        Point::new(f64::from(e.client_x()), f64::from(e.client_y())),
        Rect::new(r.left(), r.top(), r.right(), r.bottom()),
    )
}

pub fn pointer_down(canvas: &HtmlCanvasElement, e: &MouseEvent) -> InputEvent {
    let p = canvas_point(canvas, e);
    InputEvent::PointerDown {
        x: p.x,
        y: p.y,
        button: PointerButton::from_dom(e.button()),
        modifiers: mouse_modifiers(e),
    }
}

pub fn pointer_move(canvas: &HtmlCanvasElement, e: &MouseEvent) -> InputEvent {
    let p = canvas_point(canvas, e);
    InputEvent::PointerMove {
        x: p.x,
        y: p.y,
        modifiers: mouse_modifiers(e),
    }
}

pub fn pointer_up(canvas: &HtmlCanvasElement, e: &MouseEvent) -> InputEvent {
    let p = canvas_point(canvas, e);
    InputEvent::PointerUp {
        x: p.x,
        y: p.y,
        modifiers: mouse_modifiers(e),
    }
}

pub fn wheel(canvas: &HtmlCanvasElement, e: &WheelEvent) -> InputEvent {
    let p = canvas_point(canvas, e);
    InputEvent::Wheel {
        x: p.x,
        y: p.y,
        delta_y: e.delta_y(),
        modifiers: mouse_modifiers(e),
    }
}

pub fn key(e: &KeyboardEvent, down: bool) -> InputEvent {
    let key = e.key();
    let modifiers = key_modifiers(e);
    let focus = focus_target();
    if down {
        InputEvent::KeyDown {
            key,
            modifiers,
            focus,
        }
    } else {
        InputEvent::KeyUp {
            key,
            modifiers,
            focus,
        }
    }
}

/// Where keyboard focus currently is.
pub fn focus_target() -> FocusTarget {
    let active = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.active_element());
    match active {
        Some(el) => {
            let editable = el
                .dyn_ref::<HtmlElement>()
                .is_some_and(HtmlElement::is_content_editable);
            FocusTarget::from_element(&el.tag_name(), editable)
        }
        None => FocusTarget::Canvas,
    }
}

/// Anti-forgery token: `data-csrf-token` on the container, else the
/// `csrftoken` cookie.
pub fn csrf_token(container: &HtmlElement) -> Option<String> {
    if let Some(token) = container.get_attribute("data-csrf-token").filter(|t| !t.is_empty()) {
        return Some(token);
    }
    let cookies = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.dyn_into::<HtmlDocument>().ok())
        .and_then(|d| d.cookie().ok())?;
    cookie_value(&cookies, "csrftoken")
}

pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name && !v.is_empty()).then(|| v.to_string())
    })
}

pub fn parse_tool(name: &str) -> Option<Tool> {
    match name.to_ascii_lowercase().as_str() {
        "select" => Some(Tool::Select),
        "line" => Some(Tool::Line),
        "text" => Some(Tool::Text),
        "highlight" => Some(Tool::Highlight),
        _ => None,
    }
}
