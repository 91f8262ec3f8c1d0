//! Input abstraction layer.
//!
//! Normalizes pointer, wheel and keyboard events into a unified
//! `InputEvent` enum consumed by the interaction controller. Pointer
//! coordinates are already in canvas-element space (see
//! `pc_core::pointer_to_canvas_space`).

/// Keyboard modifier state at the time of the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Platform command key: ⌘ on macOS, Ctrl elsewhere.
    pub fn cmd(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

impl PointerButton {
    /// Map a DOM `MouseEvent.button` value.
    pub fn from_dom(button: i16) -> Self {
        match button {
            1 => Self::Middle,
            2 => Self::Right,
            _ => Self::Left,
        }
    }
}

/// Where keyboard focus was when a key event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    /// Body, canvas, or any non-editable element.
    Canvas,
    /// `input`, `textarea`, `select` or a content-editable element.
    TextInput,
}

impl FocusTarget {
    pub fn from_element(tag_name: &str, content_editable: bool) -> Self {
        if content_editable
            || matches!(
                tag_name.to_ascii_lowercase().as_str(),
                "input" | "textarea" | "select"
            )
        {
            Self::TextInput
        } else {
            Self::Canvas
        }
    }
}

/// A normalized input event.
#[derive(Debug, Clone)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
    },

    PointerMove {
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },

    PointerUp {
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },

    /// Mouse wheel / trackpad scroll. Negative `delta_y` scrolls up.
    Wheel {
        x: f64,
        y: f64,
        delta_y: f64,
        modifiers: Modifiers,
    },

    KeyDown {
        key: String,
        modifiers: Modifiers,
        focus: FocusTarget,
    },

    KeyUp {
        key: String,
        modifiers: Modifiers,
        focus: FocusTarget,
    },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            x,
            y,
            button: PointerButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key(key: &str, modifiers: Modifiers) -> Self {
        Self::KeyDown {
            key: key.to_string(),
            modifiers,
            focus: FocusTarget::Canvas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_elements_capture_focus() {
        assert_eq!(FocusTarget::from_element("INPUT", false), FocusTarget::TextInput);
        assert_eq!(FocusTarget::from_element("textarea", false), FocusTarget::TextInput);
        assert_eq!(FocusTarget::from_element("select", false), FocusTarget::TextInput);
        assert_eq!(FocusTarget::from_element("div", true), FocusTarget::TextInput);
        assert_eq!(FocusTarget::from_element("canvas", false), FocusTarget::Canvas);
    }

    #[test]
    fn dom_buttons_map() {
        assert_eq!(PointerButton::from_dom(0), PointerButton::Left);
        assert_eq!(PointerButton::from_dom(1), PointerButton::Middle);
        assert_eq!(PointerButton::from_dom(2), PointerButton::Right);
    }
}
