//! Integration tests: stored layout decoding, pruning, and re-encoding
//! as seen from a fresh session.

use pc_core::codec::{decode, encode, prune};
use pc_core::model::*;
use pc_core::{ViewportState, ZoomBounds};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn known(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn pruned_document_reencodes_without_stale_ids() {
    init_logger();
    let stored = r#"{
        "objects": {
            "1": {"left": 10, "top": 20, "scaleX": 2, "scaleY": 2},
            "2": {"left": 30, "top": 40, "scaleX": 1, "scaleY": 1},
            "gone": {"left": 0, "top": 0, "scaleX": 1, "scaleY": 1}
        },
        "groups": [{"members": ["gone", "2", "1"]}],
        "viewport": {"zoom": 0.5, "x": 12, "y": -8}
    }"#;

    let mut doc = decode(stored).unwrap();
    assert!(prune(&mut doc, &known(&["1", "2"])));

    let rewritten = encode(&doc, ZoomBounds::default()).unwrap();
    assert!(!rewritten.contains("gone"));

    let mut reread = decode(&rewritten).unwrap();
    assert!(!prune(&mut reread, &known(&["1", "2"])));
    assert_eq!(reread, doc);
    assert_eq!(reread.groups, vec![GroupSpec::new(["1", "2"])]);
    assert_eq!(
        reread.viewport,
        Some(ViewportState { zoom: 0.5, pan_x: 12.0, pan_y: -8.0 })
    );
}

#[test]
fn legacy_map_upgrades_to_wrapped_format() {
    init_logger();
    let legacy = r#"{"5": {"left": 1, "top": 2, "scaleX": 1.5, "scaleY": 1.5}}"#;
    let doc = decode(legacy).unwrap();
    let upgraded: serde_json::Value =
        serde_json::from_str(&encode(&doc, ZoomBounds::default()).unwrap()).unwrap();
    assert_eq!(upgraded["objects"]["5"]["scaleX"], 1.5);
    assert_eq!(upgraded["groups"], serde_json::json!([]));
    assert!(upgraded.get("viewport").is_none());
}

#[test]
fn out_of_range_zoom_is_clamped_on_write() {
    let doc = LayoutDocument {
        viewport: Some(ViewportState { zoom: 40.0, pan_x: 0.0, pan_y: 0.0 }),
        ..LayoutDocument::default()
    };
    let back = decode(&encode(&doc, ZoomBounds::default()).unwrap()).unwrap();
    assert_eq!(back.viewport.unwrap().zoom, 4.0);
}

#[test]
fn annotations_survive_roundtrip() {
    let doc = LayoutDocument {
        custom_objects: Some(vec![
            CustomAnnotation::new(
                "note-1",
                AnnotationKind::Text { text: "Restock!".into(), font_size: 18.0 },
                100.0,
                50.0,
            ),
            CustomAnnotation::new(
                "box-1",
                AnnotationKind::Highlight { width: 244.0, height: 180.0 },
                28.0,
                28.0,
            ),
        ]),
        ..LayoutDocument::default()
    };
    let back = decode(&encode(&doc, ZoomBounds::default()).unwrap()).unwrap();
    assert_eq!(back, doc);
}
