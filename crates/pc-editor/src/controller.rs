//! Interaction controller.
//!
//! An explicit state machine over pointer, wheel and keyboard input. The
//! controller never touches the scene directly: transitions return
//! `Mutation`s that the session applies, and drafts (lasso rubber band, a
//! line being drawn, text being typed) live here as an `Overlay` until they
//! are committed.
//!
//! | Input | Select | Line | Text | Highlight |
//! |-------|--------|------|------|-----------|
//! | Space / middle / right drag | pan | pan | pan | pan |
//! | Drag on entity | move | draw | | |
//! | Drag on empty canvas | lasso | draw | | |
//! | Click | select | | type | box |

use crate::input::{FocusTarget, InputEvent, Modifiers, PointerButton};
use crate::scene::{NodeKind, SceneGraph};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use pc_core::geometry::normalized_rect;
use pc_core::id::NodeId;
use pc_core::model::{AnnotationKind, CustomAnnotation};
use pc_core::{CanvasConfig, Point, Rect, ViewportState};

/// Default highlight box when clicking empty canvas.
const DEFAULT_HIGHLIGHT: (f64, f64) = (160.0, 120.0);
/// Lasso drags smaller than this (screen px) count as a plain click.
const LASSO_SLOP: f64 = 2.0;
const DEFAULT_FONT_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Select,
    Line,
    Text,
    Highlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Last pointer position, screen space.
    Panning { last: Point },
    Dragging { last: Point },
    Scaling {
        id: NodeId,
        /// Screen-space origin the entity scales about.
        origin: Point,
        last_distance: f64,
    },
    LassoSelecting { start: Point, current: Point },
    /// Endpoints in document space.
    DrawingLine { start: Point, end: Point },
    EditingText(TextDraft),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDraft {
    pub custom_id: String,
    /// The annotation being edited, if this is not a new one.
    pub existing: Option<NodeId>,
    pub left: f64,
    pub top: f64,
    pub text: String,
    pub font_size: f64,
}

/// A scene or viewport change requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Relative pan, screen px.
    Pan { dx: f64, dy: f64 },
    /// One zoom step anchored at a screen point.
    Zoom { anchor: Point, zoom_in: bool },
    ResetViewport,
    /// Translate, document px.
    Move { id: NodeId, dx: f64, dy: f64 },
    Scale { id: NodeId, factor: f64 },
    AddAnnotation(CustomAnnotation),
    UpdateAnnotation { id: NodeId, shape: AnnotationKind },
    Remove(NodeId),
    Group(Vec<NodeId>),
    Ungroup(NodeId),
}

impl Mutation {
    pub fn affects_viewport(&self) -> bool {
        matches!(self, Self::Pan { .. } | Self::Zoom { .. } | Self::ResetViewport)
    }
}

/// What the controller made of one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub mutations: Vec<Mutation>,
    /// The canvas handled the event; hosts suppress the browser default.
    pub consumed: bool,
    /// Selection, overlay or cursor changed without a scene mutation.
    pub redraw: bool,
}

impl Reaction {
    fn ignored() -> Self {
        Self::default()
    }

    fn consumed() -> Self {
        Self {
            consumed: true,
            redraw: true,
            ..Self::default()
        }
    }

    fn with(mutations: Vec<Mutation>) -> Self {
        Self {
            mutations,
            consumed: true,
            redraw: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Grab,
    Grabbing,
    Move,
    Crosshair,
    Text,
    NwseResize,
}

impl Cursor {
    /// CSS `cursor` value.
    pub fn css(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
            Self::Move => "move",
            Self::Crosshair => "crosshair",
            Self::Text => "text",
            Self::NwseResize => "nwse-resize",
        }
    }
}

/// Transient visuals a renderer draws over the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay<'a> {
    /// Screen-space rubber band.
    Lasso(Rect),
    /// Document-space line draft.
    Line { start: Point, end: Point },
    Text(&'a TextDraft),
}

/// Read-only view of the world a transition may consult.
pub struct Context<'a> {
    pub scene: &'a SceneGraph,
    pub viewport: &'a ViewportState,
    pub config: &'a CanvasConfig,
    /// Canvas element size, screen px.
    pub canvas_size: (f64, f64),
}

impl Context<'_> {
    fn to_document(&self, p: Point) -> Point {
        self.viewport.to_document(p)
    }

    fn centre(&self) -> Point {
        Point::new(self.canvas_size.0 / 2.0, self.canvas_size.1 / 2.0)
    }
}

pub struct Controller {
    state: InteractionState,
    tool: Tool,
    selection: Vec<NodeId>,
    space_held: bool,
    hover: Option<NodeId>,
    hover_handle: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            tool: Tool::Select,
            selection: Vec::new(),
            space_held: false,
            hover: None,
            hover_handle: false,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn set_selection(&mut self, ids: Vec<NodeId>) {
        self.selection = ids;
    }

    /// Drop selected ids that no longer resolve to a top-level entity.
    pub fn retain_selection(&mut self, scene: &SceneGraph) {
        self.selection
            .retain(|id| scene.top_level_of(*id) == Some(*id));
        if self.hover.is_some_and(|id| !scene.contains(id)) {
            self.hover = None;
        }
    }

    /// Switch tools. Any draft in progress is abandoned.
    pub fn set_tool(&mut self, tool: Tool) -> Reaction {
        let mut reaction = self.finish_text();
        if matches!(self.state, InteractionState::DrawingLine { .. } | InteractionState::LassoSelecting { .. }) {
            self.state = InteractionState::Idle;
        }
        if self.tool != tool {
            log::debug!("tool {:?} -> {:?}", self.tool, tool);
            self.tool = tool;
        }
        reaction.consumed = true;
        reaction.redraw = true;
        reaction
    }

    pub fn overlay(&self) -> Option<Overlay<'_>> {
        match &self.state {
            InteractionState::LassoSelecting { start, current } => {
                Some(Overlay::Lasso(normalized_rect(*start, *current)))
            }
            InteractionState::DrawingLine { start, end } => Some(Overlay::Line {
                start: *start,
                end: *end,
            }),
            InteractionState::EditingText(draft) => Some(Overlay::Text(draft)),
            _ => None,
        }
    }

    pub fn cursor(&self) -> Cursor {
        match &self.state {
            InteractionState::Panning { .. } => Cursor::Grabbing,
            InteractionState::Dragging { .. } => Cursor::Move,
            InteractionState::Scaling { .. } => Cursor::NwseResize,
            InteractionState::LassoSelecting { .. } | InteractionState::DrawingLine { .. } => {
                Cursor::Crosshair
            }
            InteractionState::EditingText(_) => Cursor::Text,
            InteractionState::Idle if self.space_held => Cursor::Grab,
            InteractionState::Idle => match self.tool {
                Tool::Line | Tool::Highlight => Cursor::Crosshair,
                Tool::Text => Cursor::Text,
                Tool::Select if self.hover_handle => Cursor::NwseResize,
                Tool::Select if self.hover.is_some() => Cursor::Move,
                Tool::Select => Cursor::Default,
            },
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    pub fn handle(&mut self, event: &InputEvent, ctx: &Context<'_>) -> Reaction {
        match event {
            InputEvent::PointerDown {
                x,
                y,
                button,
                modifiers,
            } => self.pointer_down(Point::new(*x, *y), *button, *modifiers, ctx),
            InputEvent::PointerMove { x, y, .. } => self.pointer_move(Point::new(*x, *y), ctx),
            InputEvent::PointerUp { x, y, modifiers } => {
                self.pointer_up(Point::new(*x, *y), *modifiers, ctx)
            }
            InputEvent::Wheel {
                x,
                y,
                delta_y,
                modifiers,
            } => self.wheel(Point::new(*x, *y), *delta_y, *modifiers),
            InputEvent::KeyDown {
                key,
                modifiers,
                focus,
            } => {
                if *focus == FocusTarget::TextInput {
                    return Reaction::ignored();
                }
                self.key_down(key, *modifiers, ctx)
            }
            InputEvent::KeyUp { key, focus, .. } => {
                if *focus == FocusTarget::TextInput || key != " " || !self.space_held {
                    return Reaction::ignored();
                }
                self.space_held = false;
                Reaction::consumed()
            }
        }
    }

    // ─── Pointer ─────────────────────────────────────────────────────────

    fn pointer_down(
        &mut self,
        p: Point,
        button: PointerButton,
        modifiers: Modifiers,
        ctx: &Context<'_>,
    ) -> Reaction {
        // A click anywhere ends text entry; the click itself is spent.
        if matches!(self.state, InteractionState::EditingText(_)) {
            return self.finish_text();
        }

        if self.space_held || matches!(button, PointerButton::Middle | PointerButton::Right) {
            self.state = InteractionState::Panning { last: p };
            log::debug!("pan start");
            return Reaction::consumed();
        }

        let doc = ctx.to_document(p);
        match self.tool {
            Tool::Select => self.select_down(p, modifiers, ctx),
            Tool::Line => {
                self.state = InteractionState::DrawingLine { start: doc, end: doc };
                Reaction::consumed()
            }
            Tool::Text => {
                let draft = match self.text_under(doc, ctx) {
                    Some((id, node_left, node_top, text, font_size)) => TextDraft {
                        custom_id: ctx
                            .scene
                            .get(id)
                            .and_then(|n| n.custom_id().map(str::to_string))
                            .unwrap_or_default(),
                        existing: Some(id),
                        left: node_left,
                        top: node_top,
                        text,
                        font_size,
                    },
                    None => TextDraft {
                        custom_id: ctx.scene.fresh_custom_id("text"),
                        existing: None,
                        left: doc.x,
                        top: doc.y,
                        text: String::new(),
                        font_size: DEFAULT_FONT_SIZE,
                    },
                };
                self.state = InteractionState::EditingText(draft);
                Reaction::consumed()
            }
            Tool::Highlight => self.place_highlight(doc, ctx),
        }
    }

    fn select_down(&mut self, p: Point, modifiers: Modifiers, ctx: &Context<'_>) -> Reaction {
        if let Some((id, origin)) = self.handle_at(p, ctx) {
            let last_distance = (p - origin).hypot();
            if last_distance > 0.0 {
                self.state = InteractionState::Scaling {
                    id,
                    origin,
                    last_distance,
                };
                return Reaction::consumed();
            }
        }

        match ctx.scene.hit_test(ctx.to_document(p)) {
            Some(hit) => {
                if modifiers.shift {
                    if let Some(pos) = self.selection.iter().position(|id| *id == hit) {
                        self.selection.remove(pos);
                    } else {
                        self.selection.push(hit);
                    }
                } else if !self.selection.contains(&hit) {
                    self.selection = vec![hit];
                }
                self.state = InteractionState::Dragging { last: p };
            }
            None => {
                if !modifiers.shift {
                    self.selection.clear();
                }
                self.state = InteractionState::LassoSelecting {
                    start: p,
                    current: p,
                };
            }
        }
        Reaction::consumed()
    }

    fn pointer_move(&mut self, p: Point, ctx: &Context<'_>) -> Reaction {
        if self.state == InteractionState::Idle {
            return self.hover_at(p, ctx);
        }
        match &mut self.state {
            InteractionState::Idle => Reaction::ignored(),
            InteractionState::Panning { last } => {
                let (dx, dy) = (p.x - last.x, p.y - last.y);
                *last = p;
                Reaction::with(vec![Mutation::Pan { dx, dy }])
            }
            InteractionState::Dragging { last } => {
                let zoom = ctx.viewport.zoom;
                let (dx, dy) = ((p.x - last.x) / zoom, (p.y - last.y) / zoom);
                *last = p;
                if dx == 0.0 && dy == 0.0 {
                    return Reaction::consumed();
                }
                Reaction::with(
                    self.selection
                        .iter()
                        .map(|id| Mutation::Move { id: *id, dx, dy })
                        .collect(),
                )
            }
            InteractionState::Scaling {
                id,
                origin,
                last_distance,
            } => {
                let distance = (p - *origin).hypot();
                if distance < 1.0 {
                    return Reaction::consumed();
                }
                let factor = distance / *last_distance;
                *last_distance = distance;
                Reaction::with(vec![Mutation::Scale { id: *id, factor }])
            }
            InteractionState::LassoSelecting { current, .. } => {
                *current = p;
                Reaction::consumed()
            }
            InteractionState::DrawingLine { end, .. } => {
                *end = ctx.to_document(p);
                Reaction::consumed()
            }
            InteractionState::EditingText(_) => Reaction::ignored(),
        }
    }

    fn pointer_up(&mut self, p: Point, modifiers: Modifiers, ctx: &Context<'_>) -> Reaction {
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match state {
            InteractionState::Idle => Reaction::ignored(),
            InteractionState::Panning { .. }
            | InteractionState::Dragging { .. }
            | InteractionState::Scaling { .. } => Reaction::consumed(),
            InteractionState::LassoSelecting { start, .. } => {
                let band = normalized_rect(start, p);
                if band.width() > LASSO_SLOP || band.height() > LASSO_SLOP {
                    let hits = ctx
                        .scene
                        .hit_test_rect(SceneGraph::document_rect_from_screen(band, ctx.viewport));
                    if !modifiers.shift {
                        self.selection.clear();
                    }
                    for id in hits {
                        if !self.selection.contains(&id) {
                            self.selection.push(id);
                        }
                    }
                    log::debug!("lasso selected {} entities", self.selection.len());
                }
                Reaction::consumed()
            }
            InteractionState::DrawingLine { start, .. } => {
                let end = ctx.to_document(p);
                let (dx, dy) = (end.x - start.x, end.y - start.y);
                if dx.hypot(dy) < ctx.config.min_line_length {
                    log::debug!("line shorter than {} discarded", ctx.config.min_line_length);
                    return Reaction::consumed();
                }
                let line = CustomAnnotation::new(
                    ctx.scene.fresh_custom_id("line"),
                    AnnotationKind::Line {
                        x1: 0.0,
                        y1: 0.0,
                        x2: dx,
                        y2: dy,
                    },
                    start.x,
                    start.y,
                );
                Reaction::with(vec![Mutation::AddAnnotation(line)])
            }
            // Text entry survives the click that started it.
            InteractionState::EditingText(draft) => {
                self.state = InteractionState::EditingText(draft);
                Reaction::ignored()
            }
        }
    }

    fn wheel(&mut self, p: Point, delta_y: f64, modifiers: Modifiers) -> Reaction {
        if !modifiers.cmd() {
            return Reaction::ignored();
        }
        if delta_y == 0.0 || !delta_y.is_finite() {
            return Reaction::consumed();
        }
        Reaction::with(vec![Mutation::Zoom {
            anchor: p,
            zoom_in: delta_y < 0.0,
        }])
    }

    // ─── Keyboard ────────────────────────────────────────────────────────

    fn key_down(&mut self, key: &str, modifiers: Modifiers, ctx: &Context<'_>) -> Reaction {
        if matches!(self.state, InteractionState::EditingText(_)) {
            return self.edit_text(key, modifiers);
        }

        let Some(action) = ShortcutMap::resolve(key, modifiers) else {
            return Reaction::ignored();
        };
        log::trace!("shortcut {action:?}");
        match action {
            ShortcutAction::ToolSelect => self.set_tool(Tool::Select),
            ShortcutAction::ToolLine => self.set_tool(Tool::Line),
            ShortcutAction::ToolText => self.set_tool(Tool::Text),
            ShortcutAction::ToolHighlight => self.set_tool(Tool::Highlight),
            ShortcutAction::Cancel => {
                let cancelled = matches!(
                    self.state,
                    InteractionState::DrawingLine { .. } | InteractionState::LassoSelecting { .. }
                );
                if cancelled {
                    self.state = InteractionState::Idle;
                }
                if cancelled || self.tool != Tool::Select {
                    self.set_tool(Tool::Select)
                } else {
                    Reaction::ignored()
                }
            }
            ShortcutAction::PanHold => {
                self.space_held = true;
                Reaction::consumed()
            }
            ShortcutAction::Group => {
                if self.selection.len() < 2 {
                    return Reaction::consumed();
                }
                Reaction::with(vec![Mutation::Group(self.selection.clone())])
            }
            ShortcutAction::Ungroup => Reaction::with(
                self.selection
                    .iter()
                    .filter(|id| ctx.scene.is_group(**id))
                    .map(|id| Mutation::Ungroup(*id))
                    .collect(),
            ),
            ShortcutAction::Delete => {
                let doomed: Vec<Mutation> = self
                    .selection
                    .iter()
                    .filter(|id| ctx.scene.get(**id).is_some_and(|n| n.is_annotation()))
                    .map(|id| Mutation::Remove(*id))
                    .collect();
                if doomed.is_empty() {
                    return Reaction::ignored();
                }
                Reaction::with(doomed)
            }
            ShortcutAction::ResetViewport => Reaction::with(vec![Mutation::ResetViewport]),
            ShortcutAction::ZoomIn => Reaction::with(vec![Mutation::Zoom {
                anchor: ctx.centre(),
                zoom_in: true,
            }]),
            ShortcutAction::ZoomOut => Reaction::with(vec![Mutation::Zoom {
                anchor: ctx.centre(),
                zoom_in: false,
            }]),
        }
    }

    fn edit_text(&mut self, key: &str, modifiers: Modifiers) -> Reaction {
        let InteractionState::EditingText(draft) = &mut self.state else {
            return Reaction::ignored();
        };
        match key {
            // Escape also drops back to the select tool.
            "Escape" => return self.set_tool(Tool::Select),
            "Enter" if !modifiers.shift => return self.finish_text(),
            "Enter" => draft.text.push('\n'),
            "Backspace" => {
                draft.text.pop();
            }
            _ if modifiers.cmd() || modifiers.alt => return Reaction::ignored(),
            _ => {
                // Named keys ("Shift", "ArrowLeft", ...) are more than one char.
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => draft.text.push(c),
                    _ => return Reaction::ignored(),
                }
            }
        }
        Reaction::consumed()
    }

    /// Leave text entry, committing non-empty text and discarding empty text.
    fn finish_text(&mut self) -> Reaction {
        let InteractionState::EditingText(draft) =
            std::mem::replace(&mut self.state, InteractionState::Idle)
        else {
            return Reaction::ignored();
        };
        let blank = draft.text.trim().is_empty();
        let mutation = match (draft.existing, blank) {
            (Some(id), true) => Mutation::Remove(id),
            (Some(id), false) => Mutation::UpdateAnnotation {
                id,
                shape: AnnotationKind::Text {
                    text: draft.text,
                    font_size: draft.font_size,
                },
            },
            (None, true) => {
                log::debug!("empty text discarded");
                return Reaction::consumed();
            }
            (None, false) => Mutation::AddAnnotation(CustomAnnotation::new(
                draft.custom_id,
                AnnotationKind::Text {
                    text: draft.text,
                    font_size: draft.font_size,
                },
                draft.left,
                draft.top,
            )),
        };
        Reaction::with(vec![mutation])
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    /// Track what the select tool is hovering so the cursor can follow.
    fn hover_at(&mut self, p: Point, ctx: &Context<'_>) -> Reaction {
        if self.tool != Tool::Select {
            return Reaction::ignored();
        }
        let hover = ctx.scene.hit_test(ctx.to_document(p));
        let hover_handle = self.handle_at(p, ctx).is_some();
        let changed = hover != self.hover || hover_handle != self.hover_handle;
        self.hover = hover;
        self.hover_handle = hover_handle;
        Reaction {
            redraw: changed,
            ..Reaction::ignored()
        }
    }

    /// Scale handle under `p`: the bottom-right corner of a single selected
    /// entity. Returns the entity and its screen-space origin.
    fn handle_at(&self, p: Point, ctx: &Context<'_>) -> Option<(NodeId, Point)> {
        let [id] = self.selection.as_slice() else {
            return None;
        };
        let rect = ctx.scene.screen_rect_of(*id, true, ctx.viewport)?;
        let half = ctx.config.handle_size / 2.0;
        let corner = Point::new(rect.x1, rect.y1);
        ((p.x - corner.x).abs() <= half && (p.y - corner.y).abs() <= half)
            .then_some((*id, rect.origin()))
    }

    fn text_under(&self, doc: Point, ctx: &Context<'_>) -> Option<(NodeId, f64, f64, String, f64)> {
        let id = ctx.scene.hit_test(doc)?;
        let node = ctx.scene.get(id)?;
        match &node.kind {
            NodeKind::Annotation {
                shape: AnnotationKind::Text { text, font_size },
                ..
            } => Some((id, node.left, node.top, text.clone(), *font_size)),
            _ => None,
        }
    }

    fn place_highlight(&mut self, doc: Point, ctx: &Context<'_>) -> Reaction {
        let target = ctx
            .scene
            .hit_test(doc)
            .filter(|id| !ctx.scene.get(*id).is_some_and(|n| n.is_annotation()));
        let rect = match target.and_then(|id| ctx.scene.bounding_rect_of(id, true)) {
            Some(bounds) => bounds.inflate(ctx.config.highlight_padding, ctx.config.highlight_padding),
            None => Rect::new(
                doc.x,
                doc.y,
                doc.x + DEFAULT_HIGHLIGHT.0,
                doc.y + DEFAULT_HIGHLIGHT.1,
            ),
        };
        let highlight = CustomAnnotation::new(
            ctx.scene.fresh_custom_id("highlight"),
            AnnotationKind::Highlight {
                width: rect.width(),
                height: rect.height(),
            },
            rect.x0,
            rect.y0,
        );
        Reaction::with(vec![Mutation::AddAnnotation(highlight)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ImageInfo;
    use pc_core::model::NodeTransform;
    use pretty_assertions::assert_eq;

    struct World {
        scene: SceneGraph,
        viewport: ViewportState,
        config: CanvasConfig,
    }

    impl World {
        fn new() -> Self {
            let mut scene = SceneGraph::new();
            let thumb = ImageInfo {
                width: 100.0,
                height: 100.0,
            };
            scene
                .create_image_node("1", "a.png", thumb, NodeTransform::new(0.0, 0.0, 1.0))
                .unwrap();
            scene
                .create_image_node("2", "b.png", thumb, NodeTransform::new(200.0, 0.0, 1.0))
                .unwrap();
            Self {
                scene,
                viewport: ViewportState::default(),
                config: CanvasConfig::default(),
            }
        }

        fn ctx(&self) -> Context<'_> {
            Context {
                scene: &self.scene,
                viewport: &self.viewport,
                config: &self.config,
                canvas_size: (800.0, 600.0),
            }
        }
    }

    const CMD: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };

    #[test]
    fn drag_moves_selection_in_document_units() {
        let mut world = World::new();
        world.viewport.zoom = 2.0;
        let mut c = Controller::new();

        c.handle(&InputEvent::pointer_down(20.0, 20.0), &world.ctx());
        assert_eq!(c.selection(), &[NodeId::product("1")]);
        let r = c.handle(&InputEvent::pointer_move(40.0, 30.0), &world.ctx());
        assert_eq!(
            r.mutations,
            vec![Mutation::Move {
                id: NodeId::product("1"),
                dx: 10.0,
                dy: 5.0
            }]
        );
        c.handle(&InputEvent::pointer_up(40.0, 30.0), &world.ctx());
        assert_eq!(c.state(), &InteractionState::Idle);
    }

    #[test]
    fn space_drag_pans() {
        let world = World::new();
        let mut c = Controller::new();
        c.handle(&InputEvent::key(" ", Modifiers::NONE), &world.ctx());
        assert_eq!(c.cursor(), Cursor::Grab);
        c.handle(&InputEvent::pointer_down(20.0, 20.0), &world.ctx());
        assert_eq!(c.cursor(), Cursor::Grabbing);
        let r = c.handle(&InputEvent::pointer_move(25.0, 10.0), &world.ctx());
        assert_eq!(r.mutations, vec![Mutation::Pan { dx: 5.0, dy: -10.0 }]);
        // Nothing was selected by the panning click.
        assert!(c.selection().is_empty());
    }

    #[test]
    fn middle_button_pans_without_space() {
        let world = World::new();
        let mut c = Controller::new();
        c.handle(
            &InputEvent::PointerDown {
                x: 0.0,
                y: 0.0,
                button: PointerButton::Middle,
                modifiers: Modifiers::NONE,
            },
            &world.ctx(),
        );
        assert!(matches!(c.state(), InteractionState::Panning { .. }));
    }

    #[test]
    fn lasso_selects_intersecting_entities() {
        let world = World::new();
        let mut c = Controller::new();
        c.handle(&InputEvent::pointer_down(-50.0, -50.0), &world.ctx());
        assert!(matches!(c.state(), InteractionState::LassoSelecting { .. }));
        assert!(matches!(c.overlay(), Some(Overlay::Lasso(_))));
        c.handle(&InputEvent::pointer_move(250.0, 50.0), &world.ctx());
        c.handle(&InputEvent::pointer_up(250.0, 50.0), &world.ctx());
        assert_eq!(c.selection(), &[NodeId::product("1"), NodeId::product("2")]);
    }

    #[test]
    fn short_line_is_discarded() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Line);
        c.handle(&InputEvent::pointer_down(500.0, 500.0), &world.ctx());
        let r = c.handle(&InputEvent::pointer_up(503.0, 502.0), &world.ctx());
        assert!(r.mutations.is_empty());

        c.handle(&InputEvent::pointer_down(500.0, 500.0), &world.ctx());
        c.handle(&InputEvent::pointer_move(530.0, 540.0), &world.ctx());
        let r = c.handle(&InputEvent::pointer_up(530.0, 540.0), &world.ctx());
        match r.mutations.as_slice() {
            [Mutation::AddAnnotation(line)] => {
                assert_eq!((line.left, line.top), (500.0, 500.0));
                assert_eq!(
                    line.kind,
                    AnnotationKind::Line {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 30.0,
                        y2: 40.0
                    }
                );
            }
            other => panic!("expected one line, got {other:?}"),
        }
    }

    #[test]
    fn escape_abandons_line_and_tool() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Line);
        c.handle(&InputEvent::pointer_down(500.0, 500.0), &world.ctx());
        c.handle(&InputEvent::key("Escape", Modifiers::NONE), &world.ctx());
        assert_eq!(c.state(), &InteractionState::Idle);
        assert_eq!(c.tool(), Tool::Select);
        let r = c.handle(&InputEvent::pointer_up(600.0, 600.0), &world.ctx());
        assert!(r.mutations.is_empty());
    }

    #[test]
    fn text_tool_types_and_commits() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Text);
        c.handle(&InputEvent::pointer_down(400.0, 300.0), &world.ctx());
        c.handle(&InputEvent::pointer_up(400.0, 300.0), &world.ctx());
        for key in ["H", "i", "!", "Shift", "Backspace"] {
            c.handle(&InputEvent::key(key, Modifiers::NONE), &world.ctx());
        }
        let r = c.handle(&InputEvent::key("Enter", Modifiers::NONE), &world.ctx());
        match r.mutations.as_slice() {
            [Mutation::AddAnnotation(a)] => {
                assert_eq!(
                    a.kind,
                    AnnotationKind::Text {
                        text: "Hi".into(),
                        font_size: DEFAULT_FONT_SIZE
                    }
                );
                assert_eq!((a.left, a.top), (400.0, 300.0));
            }
            other => panic!("expected text annotation, got {other:?}"),
        }
    }

    #[test]
    fn empty_text_is_discarded() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Text);
        c.handle(&InputEvent::pointer_down(400.0, 300.0), &world.ctx());
        let r = c.handle(&InputEvent::key("Escape", Modifiers::NONE), &world.ctx());
        assert!(r.mutations.is_empty());
        assert_eq!(c.state(), &InteractionState::Idle);
    }

    #[test]
    fn escape_commits_text_and_returns_to_select() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Text);
        c.handle(&InputEvent::pointer_down(400.0, 300.0), &world.ctx());
        c.handle(&InputEvent::key("x", Modifiers::NONE), &world.ctx());
        let r = c.handle(&InputEvent::key("Escape", Modifiers::NONE), &world.ctx());
        assert!(matches!(r.mutations.as_slice(), [Mutation::AddAnnotation(_)]));
        assert!(r.consumed);
        assert_eq!(c.tool(), Tool::Select);
        assert_eq!(c.cursor(), Cursor::Default);

        // The next click selects instead of opening another text box.
        c.handle(&InputEvent::pointer_down(20.0, 20.0), &world.ctx());
        assert_eq!(c.selection(), &[NodeId::product("1")]);
    }

    #[test]
    fn releasing_space_ends_pan_mode() {
        let world = World::new();
        let mut c = Controller::new();
        c.handle(&InputEvent::key(" ", Modifiers::NONE), &world.ctx());
        assert_eq!(c.cursor(), Cursor::Grab);
        c.handle(
            &InputEvent::KeyUp {
                key: " ".into(),
                modifiers: Modifiers::NONE,
                focus: FocusTarget::Canvas,
            },
            &world.ctx(),
        );
        assert_eq!(c.cursor(), Cursor::Default);
        c.handle(&InputEvent::pointer_down(600.0, 500.0), &world.ctx());
        assert!(matches!(c.state(), InteractionState::LassoSelecting { .. }));
    }

    #[test]
    fn highlight_fits_clicked_product() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_tool(Tool::Highlight);
        let r = c.handle(&InputEvent::pointer_down(250.0, 50.0), &world.ctx());
        match r.mutations.as_slice() {
            [Mutation::AddAnnotation(a)] => {
                assert_eq!((a.left, a.top), (188.0, -12.0));
                assert_eq!(
                    a.kind,
                    AnnotationKind::Highlight {
                        width: 124.0,
                        height: 124.0
                    }
                );
            }
            other => panic!("expected highlight, got {other:?}"),
        }
    }

    #[test]
    fn cmd_wheel_zooms_and_plain_wheel_does_not() {
        let world = World::new();
        let mut c = Controller::new();
        let plain = c.handle(
            &InputEvent::Wheel {
                x: 100.0,
                y: 100.0,
                delta_y: -1.0,
                modifiers: Modifiers::NONE,
            },
            &world.ctx(),
        );
        assert!(!plain.consumed);
        let zoom = c.handle(
            &InputEvent::Wheel {
                x: 100.0,
                y: 100.0,
                delta_y: -1.0,
                modifiers: CMD,
            },
            &world.ctx(),
        );
        assert!(zoom.consumed);
        assert_eq!(
            zoom.mutations,
            vec![Mutation::Zoom {
                anchor: Point::new(100.0, 100.0),
                zoom_in: true
            }]
        );
    }

    #[test]
    fn delete_only_targets_annotations() {
        let mut world = World::new();
        let note = world
            .scene
            .add_annotation(&CustomAnnotation::new(
                "n1",
                AnnotationKind::Highlight {
                    width: 10.0,
                    height: 10.0,
                },
                500.0,
                500.0,
            ))
            .unwrap();
        let mut c = Controller::new();
        c.set_selection(vec![NodeId::product("1"), note]);
        let r = c.handle(&InputEvent::key("Delete", Modifiers::NONE), &world.ctx());
        assert_eq!(r.mutations, vec![Mutation::Remove(note)]);
    }

    #[test]
    fn keys_from_text_inputs_are_ignored() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_selection(vec![NodeId::product("1"), NodeId::product("2")]);
        let r = c.handle(
            &InputEvent::KeyDown {
                key: "g".into(),
                modifiers: CMD,
                focus: FocusTarget::TextInput,
            },
            &world.ctx(),
        );
        assert_eq!(r, Reaction::default());
        let r = c.handle(&InputEvent::key("g", CMD), &world.ctx());
        assert_eq!(
            r.mutations,
            vec![Mutation::Group(vec![NodeId::product("1"), NodeId::product("2")])]
        );
    }

    #[test]
    fn corner_handle_starts_scaling() {
        let world = World::new();
        let mut c = Controller::new();
        c.set_selection(vec![NodeId::product("1")]);
        c.handle(&InputEvent::pointer_down(100.0, 100.0), &world.ctx());
        assert!(matches!(c.state(), InteractionState::Scaling { .. }));
        let r = c.handle(&InputEvent::pointer_move(200.0, 200.0), &world.ctx());
        match r.mutations.as_slice() {
            [Mutation::Scale { factor, .. }] => assert!((factor - 2.0).abs() < 1e-9),
            other => panic!("expected scale, got {other:?}"),
        }
    }
}
