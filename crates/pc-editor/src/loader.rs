//! Bootstrap: turn the product payload and the stored layout into scene
//! nodes as thumbnails finish loading.
//!
//! Image loads complete in arbitrary order. Each completion places exactly
//! one node; callbacks for unknown or already-placed products, or arriving
//! after teardown, are ignored. Once every request has resolved, stored
//! groups are re-synthesized exactly once.

use crate::scene::{ImageInfo, SceneGraph};
use pc_core::id::NodeId;
use pc_core::model::{LayoutDocument, NodeTransform, Product};
use pc_core::{CanvasConfig, fit_scale, grid_position};
use std::collections::HashMap;

/// One thumbnail the host must fetch (cross-origin, anonymous).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub product_id: String,
    pub src: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Placed,
    /// The last outstanding request resolved and stored groups were restored.
    PlacedAndFinished,
    Ignored,
}

#[derive(Debug)]
struct Pending {
    index: usize,
    src: String,
}

pub struct Loader {
    pending: HashMap<String, Pending>,
    stored: LayoutDocument,
    available_width: f64,
    groups_restored: bool,
    torn_down: bool,
    placed: usize,
    failed: usize,
}

impl Loader {
    /// Plan the bootstrap for `products`, which must already be filtered to
    /// eligible ones. Index in that list drives the grid fallback.
    pub fn new(products: &[&Product], stored: LayoutDocument, available_width: f64) -> (Self, Vec<ImageRequest>) {
        let mut pending = HashMap::with_capacity(products.len());
        let mut requests = Vec::with_capacity(products.len());
        for (index, product) in products.iter().enumerate() {
            let Some(src) = product.photo() else { continue };
            pending.insert(
                product.id.clone(),
                Pending {
                    index,
                    src: src.to_string(),
                },
            );
            requests.push(ImageRequest {
                product_id: product.id.clone(),
                src: src.to_string(),
            });
        }
        let loader = Self {
            pending,
            stored,
            available_width,
            groups_restored: false,
            torn_down: false,
            placed: 0,
            failed: 0,
        };
        (loader, requests)
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// The stored layout thumbnails are still being placed from.
    pub fn stored(&self) -> &LayoutDocument {
        &self.stored
    }

    /// Swap in a newer stored layout (e.g. after a remote fetch) for the
    /// thumbnails that have not been placed yet.
    pub fn replace_stored(&mut self, stored: LayoutDocument) {
        self.stored = stored;
    }

    /// Stop accepting callbacks.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.pending.clear();
    }

    /// Where and how large a freshly loaded thumbnail goes.
    fn placement(&self, product_id: &str, index: usize, image: ImageInfo, config: &CanvasConfig) -> NodeTransform {
        let stored = self.stored.transform_of(product_id);
        let position = match stored {
            Some(t) if t.has_valid_position() => t.position(),
            _ => grid_position(index, self.available_width, config.item_size, config.gap),
        };
        let (scale_x, scale_y) = match stored {
            Some(t) if t.has_valid_scale() => (t.scale_x, t.scale_y),
            _ => {
                let s = fit_scale(image.width, image.height, config.item_size);
                (s, s)
            }
        };
        NodeTransform {
            left: position.left,
            top: position.top,
            scale_x,
            scale_y,
        }
    }

    pub fn on_image_loaded(
        &mut self,
        scene: &mut SceneGraph,
        product_id: &str,
        image: ImageInfo,
        config: &CanvasConfig,
    ) -> LoadOutcome {
        if self.torn_down || scene.contains(NodeId::product(product_id)) {
            return LoadOutcome::Ignored;
        }
        let Some(pending) = self.pending.remove(product_id) else {
            log::debug!("ignoring late image for {product_id}");
            return LoadOutcome::Ignored;
        };
        let transform = self.placement(product_id, pending.index, image, config);
        match scene.create_image_node(product_id, &pending.src, image, transform) {
            Ok(_) => self.placed += 1,
            Err(e) => log::warn!("placing {product_id}: {e}"),
        }
        if self.finish_if_done(scene) {
            LoadOutcome::PlacedAndFinished
        } else {
            LoadOutcome::Placed
        }
    }

    /// A thumbnail failed to load; it is skipped.
    pub fn on_image_failed(&mut self, scene: &mut SceneGraph, product_id: &str) -> LoadOutcome {
        if self.torn_down || self.pending.remove(product_id).is_none() {
            return LoadOutcome::Ignored;
        }
        log::warn!("thumbnail for product {product_id} failed to load");
        self.failed += 1;
        if self.finish_if_done(scene) {
            LoadOutcome::PlacedAndFinished
        } else {
            LoadOutcome::Ignored
        }
    }

    /// Restore stored annotations. Called once at bootstrap, before images.
    pub fn restore_annotations(&self, scene: &mut SceneGraph) -> usize {
        let mut restored = 0;
        for annotation in self.stored.annotations() {
            match scene.add_annotation(annotation) {
                Ok(_) => restored += 1,
                Err(e) => log::warn!("restoring annotation {}: {e}", annotation.custom_id),
            }
        }
        restored
    }

    fn finish_if_done(&mut self, scene: &mut SceneGraph) -> bool {
        if !self.pending.is_empty() || self.groups_restored {
            return false;
        }
        self.groups_restored = true;
        let restored = restore_groups(scene, &self.stored);
        log::info!(
            "canvas ready: {} placed, {} failed, {} groups",
            self.placed,
            self.failed,
            restored
        );
        true
    }
}

/// Re-create stored groups from the members present in the scene.
pub fn restore_groups(scene: &mut SceneGraph, layout: &LayoutDocument) -> usize {
    let mut restored = 0;
    for group in &layout.groups {
        let members: Vec<NodeId> = group
            .members
            .iter()
            .map(|m| NodeId::product(m))
            .filter(|id| scene.contains(*id))
            .collect();
        if scene.group_selection(&members).is_some() {
            restored += 1;
        }
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::model::{AnnotationKind, CustomAnnotation, GroupSpec};
    use pc_core::parse_products;
    use pretty_assertions::assert_eq;

    const IMG: ImageInfo = ImageInfo {
        width: 440.0,
        height: 220.0,
    };

    fn products() -> Vec<Product> {
        parse_products(Some(
            r#"[{"id":1,"photoUrl":"1.png"},{"id":2,"photoUrl":"2.png"},{"id":3,"photoUrl":"3.png"}]"#,
        ))
    }

    #[test]
    fn grid_fallback_and_fit_scale() {
        let products = products();
        let eligible: Vec<&Product> = products.iter().collect();
        let (mut loader, requests) = Loader::new(&eligible, LayoutDocument::default(), 500.0);
        assert_eq!(requests.len(), 3);

        let mut scene = SceneGraph::new();
        let config = CanvasConfig::default();
        assert_eq!(loader.on_image_loaded(&mut scene, "2", IMG, &config), LoadOutcome::Placed);
        let node = scene.get(NodeId::product("2")).unwrap();
        assert_eq!((node.left, node.top), (40.0, 300.0));
        assert_eq!(node.scale_x, 0.5);
    }

    #[test]
    fn stored_transform_is_trusted() {
        let products = products();
        let eligible: Vec<&Product> = products.iter().collect();
        let mut stored = LayoutDocument::default();
        stored.objects.insert("1".into(), NodeTransform::new(7.0, 8.0, 3.0));
        let (mut loader, _) = Loader::new(&eligible, stored, 500.0);
        let mut scene = SceneGraph::new();
        loader.on_image_loaded(&mut scene, "1", IMG, &CanvasConfig::default());
        assert_eq!(
            scene.get(NodeId::product("1")).unwrap().transform(),
            NodeTransform::new(7.0, 8.0, 3.0)
        );
    }

    #[test]
    fn duplicate_and_late_callbacks_are_ignored() {
        let products = products();
        let eligible: Vec<&Product> = products.iter().collect();
        let (mut loader, _) = Loader::new(&eligible, LayoutDocument::default(), 500.0);
        let mut scene = SceneGraph::new();
        let config = CanvasConfig::default();
        loader.on_image_loaded(&mut scene, "1", IMG, &config);
        assert_eq!(loader.on_image_loaded(&mut scene, "1", IMG, &config), LoadOutcome::Ignored);
        assert_eq!(loader.on_image_loaded(&mut scene, "99", IMG, &config), LoadOutcome::Ignored);
        loader.teardown();
        assert_eq!(loader.on_image_loaded(&mut scene, "2", IMG, &config), LoadOutcome::Ignored);
        assert_eq!(scene.all_nodes().len(), 1);
    }

    #[test]
    fn groups_restored_once_after_all_resolve() {
        let products = products();
        let eligible: Vec<&Product> = products.iter().collect();
        let stored = LayoutDocument {
            groups: vec![GroupSpec::new(["1", "2", "3"])],
            ..LayoutDocument::default()
        };
        let (mut loader, _) = Loader::new(&eligible, stored, 500.0);
        let mut scene = SceneGraph::new();
        let config = CanvasConfig::default();
        loader.on_image_loaded(&mut scene, "3", IMG, &config);
        assert_eq!(loader.on_image_failed(&mut scene, "2"), LoadOutcome::Ignored);
        assert_eq!(scene.object_count(), 1);
        assert_eq!(
            loader.on_image_loaded(&mut scene, "1", IMG, &config),
            LoadOutcome::PlacedAndFinished
        );
        // Product 2 never loaded, so the group holds the other two.
        assert_eq!(scene.object_count(), 1);
        assert_eq!(scene.group_specs(), vec![GroupSpec::new(["1", "3"])]);
        assert!(loader.is_finished());
    }

    #[test]
    fn annotations_restored_from_storage() {
        let stored = LayoutDocument {
            custom_objects: Some(vec![CustomAnnotation::new(
                "t1",
                AnnotationKind::Text {
                    text: "Sale".into(),
                    font_size: 20.0,
                },
                0.0,
                0.0,
            )]),
            ..LayoutDocument::default()
        };
        let (loader, requests) = Loader::new(&[], stored, 500.0);
        assert!(requests.is_empty());
        let mut scene = SceneGraph::new();
        assert_eq!(loader.restore_annotations(&mut scene), 1);
        assert!(scene.contains(NodeId::custom("t1")));
    }
}
