//! Scene graph adapter.
//!
//! The authoritative model of what is on the canvas. The graph is a shallow
//! tree: the root owns image nodes, annotations and groups; a group owns two
//! or more image nodes. Every transform is stored in document space, so
//! grouping and ungrouping never rewrite member coordinates and a renderer
//! can re-synthesize its own grouping from this model at any time.

use pc_core::id::{NodeId, next_sequence};
use pc_core::model::{AnnotationKind, CustomAnnotation, GroupSpec, LayoutDocument, NodeTransform};
use pc_core::{Point, Rect, ViewportState};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Natural pixel size of a loaded thumbnail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Image {
        product_id: String,
        src: String,
        image: ImageInfo,
    },
    Group,
    Annotation {
        custom_id: String,
        shape: AnnotationKind,
    },
}

/// A single entity in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Document-space origin. Groups derive theirs from their members.
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl SceneNode {
    fn with_kind(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn product_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Image { product_id, .. } => Some(product_id),
            _ => None,
        }
    }

    pub fn custom_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Annotation { custom_id, .. } => Some(custom_id),
            _ => None,
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self.kind, NodeKind::Annotation { .. })
    }

    pub fn transform(&self) -> NodeTransform {
        NodeTransform {
            left: self.left,
            top: self.top,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Own document-space bounds. Groups and the root have none of their own.
    fn own_bounds(&self) -> Option<Rect> {
        let local = match &self.kind {
            NodeKind::Image { image, .. } => Rect::new(0.0, 0.0, image.width, image.height),
            NodeKind::Annotation { shape, .. } => shape.local_bounds(),
            NodeKind::Root | NodeKind::Group => return None,
        };
        Some(Rect::new(
            self.left + local.x0 * self.scale_x,
            self.top + local.y0 * self.scale_y,
            self.left + local.x1 * self.scale_x,
            self.top + local.y1 * self.scale_y,
        ))
    }

    pub fn to_annotation(&self) -> Option<CustomAnnotation> {
        match &self.kind {
            NodeKind::Annotation { custom_id, shape } => Some(CustomAnnotation {
                custom_id: custom_id.clone(),
                kind: shape.clone(),
                left: self.left,
                top: self.top,
                scale_x: self.scale_x,
                scale_y: self.scale_y,
            }),
            _ => None,
        }
    }
}

/// Build a product-bound thumbnail node. Not yet part of any scene.
pub fn image_node(
    product_id: &str,
    src: &str,
    image: ImageInfo,
    transform: NodeTransform,
) -> SceneNode {
    let mut node = SceneNode::with_kind(
        NodeId::product(product_id),
        NodeKind::Image {
            product_id: product_id.to_string(),
            src: src.to_string(),
            image,
        },
    );
    node.left = transform.left;
    node.top = transform.top;
    node.scale_x = transform.scale_x;
    node.scale_y = transform.scale_y;
    node
}

/// Build an annotation node from its persisted form.
pub fn annotation_node(annotation: &CustomAnnotation) -> SceneNode {
    let mut node = SceneNode::with_kind(
        NodeId::custom(&annotation.custom_id),
        NodeKind::Annotation {
            custom_id: annotation.custom_id.clone(),
            shape: annotation.kind.clone(),
        },
    );
    node.left = annotation.left;
    node.top = annotation.top;
    node.scale_x = annotation.scale_x;
    node.scale_y = annotation.scale_y;
    node
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("{0} is already in the scene")]
    DuplicateId(NodeId),
    #[error("{0} cannot be added directly")]
    NotInsertable(NodeId),
}

/// The scene graph. Edge weights carry the child's stacking order; node
/// indices are recycled after removal and say nothing about z.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    graph: StableDiGraph<SceneNode, u64>,
    root: NodeIndex,
    id_index: HashMap<NodeId, NodeIndex>,
    next_z: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = NodeId::root();
        let root = graph.add_node(SceneNode::with_kind(root_id, NodeKind::Root));
        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);
        Self {
            graph,
            root,
            id_index,
            next_z: 0,
        }
    }

    // ─── Structure ───────────────────────────────────────────────────────

    /// Add an image or annotation node at the top level (front-most).
    pub fn add_node(&mut self, node: SceneNode) -> Result<NodeId, SceneError> {
        let id = node.id;
        if matches!(node.kind, NodeKind::Root | NodeKind::Group) {
            return Err(SceneError::NotInsertable(id));
        }
        if self.id_index.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        let idx = self.graph.add_node(node);
        self.attach(self.root, idx);
        self.id_index.insert(id, idx);
        Ok(id)
    }

    /// Place a thumbnail for `product_id` on the canvas.
    pub fn create_image_node(
        &mut self,
        product_id: &str,
        src: &str,
        image: ImageInfo,
        transform: NodeTransform,
    ) -> Result<NodeId, SceneError> {
        self.add_node(image_node(product_id, src, image, transform))
    }

    /// Restore or create an annotation.
    pub fn add_annotation(&mut self, annotation: &CustomAnnotation) -> Result<NodeId, SceneError> {
        self.add_node(annotation_node(annotation))
    }

    /// Remove a node. Removing a group member that leaves fewer than two
    /// members dissolves the group. Removing a group dissolves it first.
    pub fn remove_node(&mut self, id: NodeId) -> Option<SceneNode> {
        let idx = self.index_of(id)?;
        if idx == self.root {
            return None;
        }
        if matches!(self.graph[idx].kind, NodeKind::Group) {
            self.ungroup(id);
            return None;
        }
        let parent = self.parent(idx);
        let removed = self.graph.remove_node(idx);
        self.id_index.remove(&id);
        if let Some(pidx) = parent
            && pidx != self.root
            && self.children(pidx).len() < 2
        {
            let gid = self.graph[pidx].id;
            self.ungroup(gid);
        }
        removed
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Children back to front.
    fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<(u64, NodeIndex)> = self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        children.sort_unstable();
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Link `child` under `parent`, in front of its existing children.
    fn attach(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.next_z += 1;
        self.graph.add_edge(parent, child, self.next_z);
    }

    fn reparent(&mut self, child: NodeIndex, new_parent: NodeIndex) {
        if let Some(old_parent) = self.parent(child)
            && let Some(edge) = self.graph.find_edge(old_parent, child)
        {
            self.graph.remove_edge(edge);
        }
        self.attach(new_parent, child);
    }

    /// Top-level entities (images, annotations, groups), back to front.
    pub fn top_level(&self) -> Vec<NodeId> {
        self.children(self.root)
            .into_iter()
            .map(|idx| self.graph[idx].id)
            .collect()
    }

    /// Number of top-level objects, counting a group once.
    pub fn object_count(&self) -> usize {
        self.children(self.root).len()
    }

    /// Every product-bound node, flattened through groups, back to front.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for idx in self.children(self.root) {
            match self.graph[idx].kind {
                NodeKind::Image { .. } => out.push(self.graph[idx].id),
                NodeKind::Group => out.extend(
                    self.children(idx)
                        .into_iter()
                        .map(|child| self.graph[child].id),
                ),
                _ => {}
            }
        }
        out
    }

    pub fn annotations(&self) -> Vec<NodeId> {
        self.top_level()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(SceneNode::is_annotation))
            .collect()
    }

    pub fn is_group(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.kind, NodeKind::Group))
    }

    /// The group containing `id`, if any.
    pub fn group_of(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.index_of(id)?;
        let parent = self.parent(idx)?;
        (parent != self.root).then(|| self.graph[parent].id)
    }

    pub fn members(&self, group: NodeId) -> Vec<NodeId> {
        match self.index_of(group) {
            Some(idx) if matches!(self.graph[idx].kind, NodeKind::Group) => self
                .children(idx)
                .into_iter()
                .map(|child| self.graph[child].id)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The top-level entity an id belongs to (itself, or its group).
    pub fn top_level_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        Some(self.group_of(id).unwrap_or(id))
    }

    // ─── Grouping ────────────────────────────────────────────────────────

    /// Combine a multi-selection into one group.
    ///
    /// Selected groups contribute their members (groups never nest);
    /// annotations are ignored. Fewer than two resulting members is a no-op.
    pub fn group_selection(&mut self, selection: &[NodeId]) -> Option<NodeId> {
        let mut members: SmallVec<[NodeId; 8]> = SmallVec::new();
        for &id in selection {
            let Some(node) = self.get(id) else { continue };
            match node.kind {
                NodeKind::Image { .. } => {
                    if !members.contains(&id) {
                        members.push(id);
                    }
                }
                NodeKind::Group => {
                    for m in self.members(id) {
                        if !members.contains(&m) {
                            members.push(m);
                        }
                    }
                }
                _ => {}
            }
        }
        if members.len() < 2 {
            return None;
        }

        // Dissolve any groups the members currently belong to.
        let old_groups: SmallVec<[NodeId; 4]> = members
            .iter()
            .filter_map(|m| self.group_of(*m))
            .collect();
        for g in old_groups {
            if self.contains(g) {
                self.ungroup(g);
            }
        }

        let group_id = NodeId::with_prefix("group");
        let group_idx = self
            .graph
            .add_node(SceneNode::with_kind(group_id, NodeKind::Group));
        self.attach(self.root, group_idx);
        self.id_index.insert(group_id, group_idx);

        for m in &members {
            if let Some(idx) = self.index_of(*m) {
                self.reparent(idx, group_idx);
            }
        }
        self.sync_group_origin(group_idx);
        log::debug!("grouped {} nodes into {group_id}", members.len());
        Some(group_id)
    }

    /// Dissolve a group; its members become independent top-level nodes at
    /// their current absolute transforms.
    pub fn ungroup(&mut self, group: NodeId) -> Vec<NodeId> {
        let Some(group_idx) = self.index_of(group) else {
            return Vec::new();
        };
        if !matches!(self.graph[group_idx].kind, NodeKind::Group) {
            return Vec::new();
        }
        let children = self.children(group_idx);
        let mut freed = Vec::with_capacity(children.len());
        for child in children {
            self.reparent(child, self.root);
            freed.push(self.graph[child].id);
        }
        self.graph.remove_node(group_idx);
        self.id_index.remove(&group);
        log::debug!("ungrouped {group} into {} nodes", freed.len());
        freed
    }

    /// Groups in canonical persisted form.
    pub fn group_specs(&self) -> Vec<GroupSpec> {
        self.top_level()
            .into_iter()
            .filter(|id| self.is_group(*id))
            .map(|g| {
                GroupSpec::new(
                    self.members(g)
                        .into_iter()
                        .filter_map(|m| self.get(m).and_then(|n| n.product_id().map(str::to_string))),
                )
            })
            .collect()
    }

    fn sync_group_origin(&mut self, group_idx: NodeIndex) {
        let bounds = self
            .children(group_idx)
            .into_iter()
            .filter_map(|c| self.graph[c].own_bounds())
            .reduce(|a, b| a.union(b));
        if let Some(b) = bounds {
            let group = &mut self.graph[group_idx];
            group.left = b.x0;
            group.top = b.y0;
        }
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// Document-space bounds. With `include_group_ancestors`, a grouped node
    /// reports its whole group's bounds.
    pub fn bounding_rect_of(&self, id: NodeId, include_group_ancestors: bool) -> Option<Rect> {
        let target = if include_group_ancestors {
            self.top_level_of(id)?
        } else {
            id
        };
        let idx = self.index_of(target)?;
        match self.graph[idx].kind {
            NodeKind::Group => self
                .children(idx)
                .into_iter()
                .filter_map(|c| self.graph[c].own_bounds())
                .reduce(|a, b| a.union(b)),
            _ => self.graph[idx].own_bounds(),
        }
    }

    /// Screen-space bounds under the given viewport.
    pub fn screen_rect_of(&self, id: NodeId, include_group_ancestors: bool, viewport: &ViewportState) -> Option<Rect> {
        self.bounding_rect_of(id, include_group_ancestors)
            .map(|r| viewport.rect_to_screen(r))
    }

    /// Inverse of `screen_rect_of` for an arbitrary screen rectangle.
    pub fn document_rect_from_screen(rect: Rect, viewport: &ViewportState) -> Rect {
        viewport.rect_to_document(rect)
    }

    /// Topmost top-level entity under a document-space point.
    pub fn hit_test(&self, p: Point) -> Option<NodeId> {
        self.top_level()
            .into_iter()
            .rev()
            .find(|id| self.entity_contains(*id, p))
    }

    fn entity_contains(&self, id: NodeId, p: Point) -> bool {
        match self.index_of(id) {
            Some(idx) if matches!(self.graph[idx].kind, NodeKind::Group) => self
                .children(idx)
                .into_iter()
                .any(|c| self.graph[c].own_bounds().is_some_and(|b| b.contains(p))),
            Some(idx) => self.graph[idx].own_bounds().is_some_and(|b| b.contains(p)),
            None => false,
        }
    }

    /// Top-level entities intersecting a document-space rectangle.
    pub fn hit_test_rect(&self, rect: Rect) -> Vec<NodeId> {
        self.top_level()
            .into_iter()
            .filter(|id| {
                self.bounding_rect_of(*id, false).is_some_and(|b| {
                    b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1
                })
            })
            .collect()
    }

    // ─── Transforms ──────────────────────────────────────────────────────

    /// Translate an entity (a group moves all its members).
    pub fn move_entity(&mut self, id: NodeId, dx: f64, dy: f64) -> bool {
        if !(dx.is_finite() && dy.is_finite()) {
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let targets = match self.graph[idx].kind {
            NodeKind::Root => return false,
            NodeKind::Group => self.children(idx),
            _ => vec![idx],
        };
        for t in targets {
            self.graph[t].left += dx;
            self.graph[t].top += dy;
        }
        if matches!(self.graph[idx].kind, NodeKind::Group) {
            self.sync_group_origin(idx);
        }
        true
    }

    /// Uniformly scale an entity by `factor` about its top-left origin.
    /// Resulting scales must stay finite and positive or nothing changes.
    pub fn scale_entity(&mut self, id: NodeId, factor: f64) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let (origin, targets) = match self.graph[idx].kind {
            NodeKind::Root => return false,
            NodeKind::Group => {
                let Some(b) = self.bounding_rect_of(id, false) else {
                    return false;
                };
                (b.origin(), self.children(idx))
            }
            _ => (Point::new(self.graph[idx].left, self.graph[idx].top), vec![idx]),
        };
        let ok = targets.iter().all(|t| {
            let n = &self.graph[*t];
            let (sx, sy) = (n.scale_x * factor, n.scale_y * factor);
            sx.is_finite() && sx > 0.0 && sy.is_finite() && sy > 0.0
        });
        if !ok {
            return false;
        }
        for t in targets {
            let n = &mut self.graph[t];
            n.left = origin.x + (n.left - origin.x) * factor;
            n.top = origin.y + (n.top - origin.y) * factor;
            n.scale_x *= factor;
            n.scale_y *= factor;
        }
        if matches!(self.graph[idx].kind, NodeKind::Group) {
            self.sync_group_origin(idx);
        }
        true
    }

    // ─── Annotations ─────────────────────────────────────────────────────

    /// A `customId` not used by any annotation in the scene.
    pub fn fresh_custom_id(&self, prefix: &str) -> String {
        loop {
            let candidate = format!("{prefix}-{}", next_sequence());
            if !self.contains(NodeId::custom(&candidate)) {
                return candidate;
            }
        }
    }

    pub fn annotation_shape_mut(&mut self, id: NodeId) -> Option<&mut AnnotationKind> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Annotation { shape, .. } => Some(shape),
            _ => None,
        }
    }

    // ─── Export ──────────────────────────────────────────────────────────

    /// Project the scene into a layout document (viewport not included).
    pub fn export_layout(&self) -> LayoutDocument {
        let mut doc = LayoutDocument::default();
        for id in self.all_nodes() {
            if let Some(node) = self.get(id)
                && let Some(pid) = node.product_id()
            {
                doc.objects.insert(pid.to_string(), node.transform());
            }
        }
        doc.groups = self.group_specs();
        let annotations: Vec<CustomAnnotation> = self
            .annotations()
            .into_iter()
            .filter_map(|id| self.get(id).and_then(SceneNode::to_annotation))
            .collect();
        doc.custom_objects = Some(annotations);
        doc
    }
}
