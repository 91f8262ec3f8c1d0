//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s so the same
//! bindings apply to every host. On macOS ⌘ is the command key, Ctrl
//! everywhere else; both are accepted.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Tools ──
    ToolSelect,
    ToolLine,
    ToolText,
    ToolHighlight,

    // ── Edit ──
    Group,
    Ungroup,
    /// Remove the selected annotations. Product nodes are never deleted.
    Delete,
    /// Abandon the current draft or edit and drop back to selection.
    Cancel,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ResetViewport,
    /// Space held: the next pointer-down pans.
    PanHold,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a `KeyboardEvent.key` value plus modifiers to an action.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.cmd();

        if cmd && modifiers.shift {
            return match key {
                "g" | "G" => Some(ShortcutAction::Ungroup),
                // Shift+= arrives as "+" on most layouts.
                "+" => Some(ShortcutAction::ZoomIn),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "g" | "G" => Some(ShortcutAction::Group),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" | "_" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ResetViewport),
                _ => None,
            };
        }

        if modifiers.alt || modifiers.shift {
            return None;
        }

        match key {
            "v" | "V" => Some(ShortcutAction::ToolSelect),
            "l" | "L" => Some(ShortcutAction::ToolLine),
            "t" | "T" => Some(ShortcutAction::ToolText),
            "h" | "H" => Some(ShortcutAction::ToolHighlight),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Cancel),
            " " => Some(ShortcutAction::PanHold),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: true,
    };
    const CTRL_SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: true,
        alt: false,
        meta: false,
    };

    #[test]
    fn resolve_grouping() {
        assert_eq!(ShortcutMap::resolve("g", CMD), Some(ShortcutAction::Group));
        assert_eq!(ShortcutMap::resolve("G", CTRL_SHIFT), Some(ShortcutAction::Ungroup));
        assert_eq!(ShortcutMap::resolve("g", Modifiers::NONE), None);
    }

    #[test]
    fn resolve_view_shortcuts() {
        assert_eq!(ShortcutMap::resolve("=", CMD), Some(ShortcutAction::ZoomIn));
        assert_eq!(ShortcutMap::resolve("-", CMD), Some(ShortcutAction::ZoomOut));
        assert_eq!(ShortcutMap::resolve("0", CMD), Some(ShortcutAction::ResetViewport));
        assert_eq!(ShortcutMap::resolve(" ", Modifiers::NONE), Some(ShortcutAction::PanHold));
    }

    #[test]
    fn delete_requires_no_modifier() {
        assert_eq!(
            ShortcutMap::resolve("Backspace", Modifiers::NONE),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(ShortcutMap::resolve("Backspace", CMD), None);
    }

    #[test]
    fn resolve_tools_and_escape() {
        assert_eq!(ShortcutMap::resolve("l", Modifiers::NONE), Some(ShortcutAction::ToolLine));
        assert_eq!(ShortcutMap::resolve("T", Modifiers::NONE), Some(ShortcutAction::ToolText));
        assert_eq!(ShortcutMap::resolve("h", Modifiers::NONE), Some(ShortcutAction::ToolHighlight));
        assert_eq!(ShortcutMap::resolve("Escape", Modifiers::NONE), Some(ShortcutAction::Cancel));
    }
}
