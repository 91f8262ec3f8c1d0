//! Editor session: one canvas, its scene, camera, interaction state and
//! persistence, driven by the host through events, frames and timestamps.

use crate::controller::{Context, Controller, Cursor, Mutation, Overlay, Tool};
use crate::input::InputEvent;
use crate::loader::{ImageRequest, LoadOutcome, Loader, restore_groups};
use crate::persist::{Persistence, StorageBackend};
use crate::remote::{HttpRequest, RemoteSync};
use crate::scene::{ImageInfo, SceneGraph};
use pc_core::id::NodeId;
use pc_core::model::LayoutDocument;
use pc_core::{CanvasConfig, ViewportState, codec, eligible_products, parse_products};
use std::collections::HashSet;

/// What the host should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// The scene or viewport changed.
    pub changed: bool,
    /// Call `preventDefault()` on the DOM event.
    pub prevent_default: bool,
    /// Schedule an animation frame (repaint and/or `flush_frame`).
    pub request_frame: bool,
    pub cursor: Cursor,
}

pub struct Editor<S: StorageBackend> {
    config: CanvasConfig,
    scene: SceneGraph,
    viewport: ViewportState,
    controller: Controller,
    persistence: Persistence<S>,
    remote: Option<RemoteSync>,
    loader: Option<Loader>,
    canvas_size: (f64, f64),
    /// Product ids eligible in this session.
    known: HashSet<String>,
    /// The layout changed since the last frame. Drives both the local write
    /// and the remote push, so either channel works without the other.
    layout_dirty: bool,
}

impl<S: StorageBackend> Editor<S> {
    pub fn new(config: CanvasConfig, storage: S, csrf_token: Option<String>) -> Self {
        let config = config.validated();
        let bounds = config.zoom_bounds();
        let persistence = Persistence::new(storage, config.storage_key.clone(), bounds);
        let remote = config
            .remote_endpoint
            .as_ref()
            .map(|url| RemoteSync::new(url.clone(), csrf_token, config.remote_push_delay_ms, bounds));
        Self {
            config,
            scene: SceneGraph::new(),
            viewport: ViewportState::default(),
            controller: Controller::new(),
            persistence,
            remote,
            loader: None,
            canvas_size: (0.0, 0.0),
            known: HashSet::new(),
            layout_dirty: false,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn selection(&self) -> &[NodeId] {
        self.controller.selection()
    }

    pub fn overlay(&self) -> Option<Overlay<'_>> {
        self.controller.overlay()
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_size = (width, height);
    }

    pub fn set_tool(&mut self, tool: Tool) -> EventOutcome {
        let reaction = self.controller.set_tool(tool);
        self.apply(reaction.mutations, reaction.consumed, reaction.redraw)
    }

    // ─── Bootstrap ───────────────────────────────────────────────────────

    /// Parse the product payload, load and prune the stored layout, restore
    /// viewport and annotations, and return the thumbnails to fetch.
    ///
    /// An absent or empty product list does no work at all.
    pub fn bootstrap(&mut self, products_json: Option<&str>, available_width: f64) -> Vec<ImageRequest> {
        let products = parse_products(products_json);
        let eligible = eligible_products(&products);
        if eligible.is_empty() {
            log::info!("no products with photos, canvas left empty");
            return Vec::new();
        }
        self.known = eligible.iter().map(|p| p.id.clone()).collect();
        let stored = self.persistence.read(&self.known);
        if let Some(vp) = stored.viewport {
            self.viewport = vp;
        }
        let (loader, requests) = Loader::new(&eligible, stored, available_width);
        loader.restore_annotations(&mut self.scene);
        log::info!("bootstrapping {} thumbnails", requests.len());
        self.loader = Some(loader);
        requests
    }

    pub fn on_image_loaded(&mut self, product_id: &str, width: f64, height: f64) -> bool {
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        let image = ImageInfo { width, height };
        loader.on_image_loaded(&mut self.scene, product_id, image, &self.config) != LoadOutcome::Ignored
    }

    pub fn on_image_failed(&mut self, product_id: &str) -> bool {
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        loader.on_image_failed(&mut self.scene, product_id) != LoadOutcome::Ignored
    }

    /// Stop reacting to outstanding image callbacks.
    pub fn teardown(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            loader.teardown();
        }
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: &InputEvent) -> EventOutcome {
        let ctx = Context {
            scene: &self.scene,
            viewport: &self.viewport,
            config: &self.config,
            canvas_size: self.canvas_size,
        };
        let reaction = self.controller.handle(event, &ctx);
        self.apply(reaction.mutations, reaction.consumed, reaction.redraw)
    }

    fn apply(&mut self, mutations: Vec<Mutation>, consumed: bool, redraw: bool) -> EventOutcome {
        let mut layout_changed = false;
        let mut viewport_changed = false;
        for mutation in mutations {
            if mutation.affects_viewport() {
                viewport_changed |= self.apply_viewport(&mutation);
            } else {
                layout_changed |= self.apply_scene(mutation);
            }
        }
        if layout_changed {
            self.controller.retain_selection(&self.scene);
        }

        let wants_persist = layout_changed || (viewport_changed && self.config.persist_viewport);
        if wants_persist {
            self.persistence.schedule_persist();
            self.layout_dirty = true;
        }
        let changed = layout_changed || viewport_changed;
        EventOutcome {
            changed,
            prevent_default: consumed,
            request_frame: wants_persist || changed || redraw,
            cursor: self.controller.cursor(),
        }
    }

    fn apply_viewport(&mut self, mutation: &Mutation) -> bool {
        let bounds = self.config.zoom_bounds();
        match mutation {
            Mutation::Pan { dx, dy } => {
                let before = self.viewport;
                self.viewport.pan_by(*dx, *dy);
                before != self.viewport
            }
            Mutation::Zoom { anchor, zoom_in } => {
                self.viewport
                    .zoom_step(*anchor, *zoom_in, self.config.zoom_step, bounds)
            }
            Mutation::ResetViewport => {
                let before = self.viewport;
                self.viewport.reset();
                before != self.viewport
            }
            _ => false,
        }
    }

    fn apply_scene(&mut self, mutation: Mutation) -> bool {
        match mutation {
            Mutation::Move { id, dx, dy } => self.scene.move_entity(id, dx, dy),
            Mutation::Scale { id, factor } => self.scene.scale_entity(id, factor),
            Mutation::AddAnnotation(annotation) => match self.scene.add_annotation(&annotation) {
                Ok(id) => {
                    log::debug!("added {} annotation {id}", annotation.kind.type_name());
                    true
                }
                Err(e) => {
                    log::warn!("adding annotation: {e}");
                    false
                }
            },
            Mutation::UpdateAnnotation { id, shape } => match self.scene.annotation_shape_mut(id) {
                Some(current) => {
                    *current = shape;
                    true
                }
                None => false,
            },
            Mutation::Remove(id) => self.scene.remove_node(id).is_some(),
            Mutation::Group(ids) => match self.scene.group_selection(&ids) {
                Some(group) => {
                    self.controller.set_selection(vec![group]);
                    true
                }
                None => false,
            },
            Mutation::Ungroup(group) => {
                let members = self.scene.ungroup(group);
                if members.is_empty() {
                    return false;
                }
                let mut selection: Vec<NodeId> = self
                    .controller
                    .selection()
                    .iter()
                    .copied()
                    .filter(|id| *id != group)
                    .collect();
                selection.extend(members);
                self.controller.set_selection(selection);
                true
            }
            Mutation::Pan { .. } | Mutation::Zoom { .. } | Mutation::ResetViewport => false,
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// What the scene itself holds, plus the viewport when that is persisted.
    pub fn layout_document(&self) -> LayoutDocument {
        let mut doc = self.scene.export_layout();
        if self.config.persist_viewport {
            doc.viewport = Some(self.viewport);
        }
        doc
    }

    /// Animation-frame callback. When the layout changed since the last
    /// frame, writes it locally and, with remote sync on, (re)starts the
    /// push window. Returns whether a local write happened.
    pub fn flush_frame(&mut self, now_ms: f64) -> bool {
        if !std::mem::take(&mut self.layout_dirty) {
            return false;
        }
        let doc = self.local_layout();
        let wrote = self.persistence.flush_frame(&doc);
        if let Some(remote) = self.remote.as_mut() {
            remote.schedule_push(doc, now_ms);
        }
        wrote
    }

    /// Timer callback: the remote push request, once its window elapsed.
    pub fn tick(&mut self, now_ms: f64) -> Option<HttpRequest> {
        self.remote.as_mut()?.take_due(now_ms)
    }

    /// When `tick` next has something to do.
    pub fn next_tick_due(&self) -> Option<f64> {
        self.remote.as_ref()?.next_due()
    }

    pub fn remote_fetch_request(&self) -> Option<HttpRequest> {
        self.remote.as_ref().map(RemoteSync::fetch_request)
    }

    /// Merge a fetched remote layout over the local cache (remote wins per
    /// key), prune it to this session's products, re-prime local storage with
    /// the result, and apply it to whatever is placed.
    pub fn apply_remote_layout(&mut self, status: u16, body: &str) -> bool {
        let Some(remote) = self.remote.as_ref() else {
            return false;
        };
        let local = self.local_layout();
        let mut merged = match remote.apply_fetch_response(status, body, &local) {
            Ok(merged) => merged,
            Err(e) => {
                log::error!("{e}; keeping local layout");
                return false;
            }
        };
        codec::prune(&mut merged, &self.known);
        self.persistence.write(&merged);
        self.apply_layout(&merged);
        true
    }

    pub fn on_push_result(&mut self, result: Result<u16, String>) {
        if let Some(remote) = self.remote.as_mut() {
            remote.on_push_result(result);
        }
    }

    /// The live scene, backed by the stored layout for thumbnails that are
    /// not placed (yet). Stored groups stand in until the loader has
    /// re-created them. This is what gets written and merged against.
    fn local_layout(&self) -> LayoutDocument {
        let mut doc = self.layout_document();
        let Some(loader) = self.loader.as_ref() else {
            return doc;
        };
        let stored = loader.stored();
        for (id, transform) in &stored.objects {
            doc.objects.entry(id.clone()).or_insert(*transform);
        }
        if !loader.is_finished() && doc.groups.is_empty() {
            doc.groups.clone_from(&stored.groups);
        }
        doc
    }

    /// Bring the scene in line with `layout`. Unplaced thumbnails pick the
    /// layout up when they load.
    fn apply_layout(&mut self, layout: &LayoutDocument) {
        for group in self.scene.top_level() {
            if self.scene.is_group(group) {
                self.scene.ungroup(group);
            }
        }
        for id in self.scene.all_nodes() {
            let Some(node) = self.scene.get_mut(id) else { continue };
            let Some(pid) = node.product_id() else { continue };
            if let Some(t) = layout.transform_of(pid) {
                let t = t.sanitized();
                node.left = t.left;
                node.top = t.top;
                node.scale_x = t.scale_x;
                node.scale_y = t.scale_y;
            }
        }
        if layout.custom_objects.is_some() {
            for id in self.scene.annotations() {
                self.scene.remove_node(id);
            }
            for annotation in layout.annotations() {
                if let Err(e) = self.scene.add_annotation(annotation) {
                    log::warn!("restoring annotation {}: {e}", annotation.custom_id);
                }
            }
        }
        if let Some(vp) = layout.viewport {
            self.viewport = vp.sanitized(self.config.zoom_bounds());
        }
        let loading = match self.loader.as_mut() {
            Some(loader) => {
                loader.replace_stored(layout.clone());
                !loader.is_finished()
            }
            None => false,
        };
        if !loading {
            restore_groups(&mut self.scene, layout);
        }
        self.controller.retain_selection(&self.scene);
    }

    /// Serialized layout, as stored.
    pub fn layout_json(&self) -> Option<String> {
        codec::encode(&self.local_layout(), self.config.zoom_bounds())
            .map_err(|e| log::error!("encoding layout: {e}"))
            .ok()
    }
}
