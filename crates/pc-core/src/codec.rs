//! Layout persistence codec.
//!
//! The single authority on what counts as valid stored state:
//!
//! - **decode** accepts the wrapped `{objects, groups, viewport, customObjects}`
//!   document and the legacy bare `{productId: transform}` map. Individual
//!   bad entries are skipped; only a non-object root is an error.
//! - **sanitize** coerces out-of-domain numbers to safe defaults and puts
//!   groups into canonical form.
//! - **prune** drops everything that references products no longer present.
//! - **merge** overlays a remote document onto the local cache.

use crate::geometry::ZoomBounds;
use crate::model::{CustomAnnotation, GroupSpec, LayoutDocument, NodeTransform};
use crate::viewport::ViewportState;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("layout is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout root must be an object, found {0}")]
    NotAnObject(&'static str),
    #[error("layout field `{field}` must be {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─── Decode ──────────────────────────────────────────────────────────────

/// Parse a stored layout string.
///
/// # Errors
/// Returns an error when the input is not JSON, the root is not an object,
/// or a top-level field has the wrong type.
pub fn decode(raw: &str) -> Result<LayoutDocument, CodecError> {
    let value: Value = serde_json::from_str(raw)?;
    decode_value(value)
}

/// Top-level keys that mark the wrapped form; anything else is a legacy
/// bare `productId -> transform` map.
const WRAPPED_KEYS: [&str; 4] = ["objects", "groups", "viewport", "customObjects"];

/// Same as [`decode`] for an already-parsed JSON value.
///
/// # Errors
/// See [`decode`].
pub fn decode_value(value: Value) -> Result<LayoutDocument, CodecError> {
    let mut root = match value {
        Value::Object(map) => map,
        other => return Err(CodecError::NotAnObject(json_type_name(&other))),
    };

    let wrapped = WRAPPED_KEYS.iter().any(|key| root.contains_key(*key));
    if !wrapped {
        log::debug!("decoding legacy bare layout map ({} entries)", root.len());
        return Ok(LayoutDocument {
            objects: decode_objects(&root),
            ..LayoutDocument::default()
        });
    }

    let objects = match root.remove("objects") {
        None | Some(Value::Null) => Default::default(),
        Some(Value::Object(map)) => decode_objects(&map),
        Some(_) => {
            return Err(CodecError::FieldType {
                field: "objects",
                expected: "an object",
            });
        }
    };

    let groups = match root.remove("groups") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(decode_group).collect(),
        Some(_) => {
            return Err(CodecError::FieldType {
                field: "groups",
                expected: "an array",
            });
        }
    };

    let viewport = root.remove("viewport").and_then(decode_viewport);

    let custom_objects = match root.remove("customObjects") {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<CustomAnnotation>(item) {
                    Ok(annotation) => Some(annotation.sanitized()),
                    Err(e) => {
                        log::warn!("skipping malformed custom object: {e}");
                        None
                    }
                })
                .collect(),
        ),
        _ => None,
    };

    Ok(LayoutDocument {
        objects,
        groups,
        viewport,
        custom_objects,
    })
}

fn decode_objects(map: &Map<String, Value>) -> BTreeMap<String, NodeTransform> {
    map.iter()
        .filter_map(|(key, entry)| match decode_transform(entry) {
            Some(t) => Some((key.clone(), t)),
            None => {
                log::debug!("dropping stored entry for {key}: no usable position");
                None
            }
        })
        .collect()
}

fn number(entry: &Map<String, Value>, key: &str) -> f64 {
    entry.get(key).and_then(Value::as_f64).unwrap_or(f64::NAN)
}

/// An entry without a finite `left`/`top` is treated as absent, so the node
/// falls back to grid placement. Invalid scales are coerced to 1.
fn decode_transform(entry: &Value) -> Option<NodeTransform> {
    let entry = entry.as_object()?;
    let t = NodeTransform {
        left: number(entry, "left"),
        top: number(entry, "top"),
        scale_x: number(entry, "scaleX"),
        scale_y: number(entry, "scaleY"),
    };
    t.has_valid_position().then(|| t.sanitized())
}

fn member_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Groups are `{members: [...]}`; a bare array of ids is accepted too.
fn decode_group(value: &Value) -> Option<GroupSpec> {
    let members = match value {
        Value::Object(obj) => obj.get("members")?.as_array()?,
        Value::Array(items) => items,
        _ => return None,
    };
    Some(GroupSpec::new(members.iter().filter_map(member_id)))
}

fn decode_viewport(value: Value) -> Option<ViewportState> {
    let obj = value.as_object()?;
    Some(ViewportState {
        zoom: number(obj, "zoom"),
        pan_x: number(obj, "x"),
        pan_y: number(obj, "y"),
    })
}

// ─── Sanitize / encode ───────────────────────────────────────────────────

/// Coerce every numeric field into its domain and canonicalize groups.
pub fn sanitize(doc: &mut LayoutDocument, bounds: ZoomBounds) {
    for transform in doc.objects.values_mut() {
        *transform = transform.sanitized();
    }
    canonicalize_groups(&mut doc.groups);
    doc.viewport = doc.viewport.map(|vp| vp.sanitized(bounds));
    if let Some(custom) = doc.custom_objects.as_mut() {
        let mut seen = HashSet::new();
        custom.retain(|a| seen.insert(a.custom_id.clone()));
        for annotation in custom.iter_mut() {
            *annotation = annotation.clone().sanitized();
        }
    }
}

/// Sort members, drop groups with fewer than two members, remove members
/// already claimed by an earlier group, and collapse duplicate groups.
pub fn canonicalize_groups(groups: &mut Vec<GroupSpec>) {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(groups.len());
    for mut group in groups.drain(..) {
        group.canonicalize();
        group.members.retain(|m| !claimed.contains(m));
        if !group.is_viable() {
            continue;
        }
        claimed.extend(group.members.iter().cloned());
        out.push(group);
    }
    *groups = out;
}

/// Serialize a layout after sanitizing a copy of it.
///
/// # Errors
/// Only fails if `serde_json` cannot serialize, which sanitized input
/// never triggers.
pub fn encode(doc: &LayoutDocument, bounds: ZoomBounds) -> Result<String, CodecError> {
    let mut clean = doc.clone();
    sanitize(&mut clean, bounds);
    Ok(serde_json::to_string(&clean)?)
}

// ─── Prune / merge ───────────────────────────────────────────────────────

/// Remove entries for products that are not in `known`. Returns `true` when
/// the document changed (including group canonicalization), meaning the
/// result should be written back.
pub fn prune(doc: &mut LayoutDocument, known: &HashSet<String>) -> bool {
    let before = doc.clone();

    doc.objects.retain(|id, _| known.contains(id));
    for group in &mut doc.groups {
        group.members.retain(|m| known.contains(m));
    }
    canonicalize_groups(&mut doc.groups);

    let changed = *doc != before;
    if changed {
        log::debug!(
            "pruned layout: {} -> {} objects, {} -> {} groups",
            before.objects.len(),
            doc.objects.len(),
            before.groups.len(),
            doc.groups.len()
        );
    }
    changed
}

/// Overlay `remote` onto `local`. Remote wins per object key; remote groups,
/// viewport and annotations replace the local ones when the remote has them.
pub fn merge(local: &LayoutDocument, remote: &LayoutDocument) -> LayoutDocument {
    let mut merged = local.clone();
    for (id, transform) in &remote.objects {
        merged.objects.insert(id.clone(), *transform);
    }
    if !remote.groups.is_empty() || !remote.objects.is_empty() {
        merged.groups = remote.groups.clone();
    }
    if remote.viewport.is_some() {
        merged.viewport = remote.viewport;
    }
    if remote.custom_objects.is_some() {
        merged.custom_objects = remote.custom_objects.clone();
    }
    canonicalize_groups(&mut merged.groups);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationKind;
    use pretty_assertions::assert_eq;

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn decode_wrapped_document() {
        let doc = decode(
            r#"{"objects":{"1":{"left":10,"top":20,"scaleX":2,"scaleY":2}},
                "groups":[{"members":["2","1"]}],
                "viewport":{"zoom":1.5,"x":-20,"y":4}}"#,
        )
        .unwrap();
        assert_eq!(doc.objects["1"], NodeTransform::new(10.0, 20.0, 2.0));
        assert_eq!(doc.groups, vec![GroupSpec::new(["1", "2"])]);
        assert_eq!(
            doc.viewport,
            Some(ViewportState { zoom: 1.5, pan_x: -20.0, pan_y: 4.0 })
        );
        assert_eq!(doc.custom_objects, None);
    }

    #[test]
    fn decode_legacy_bare_map() {
        let doc = decode(r#"{"7":{"left":1,"top":2,"scaleX":0.5,"scaleY":0.5}}"#).unwrap();
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(doc.objects["7"], NodeTransform::new(1.0, 2.0, 0.5));
        assert!(doc.groups.is_empty());
        assert!(doc.viewport.is_none());
    }

    #[test]
    fn decode_viewport_only_document() {
        let doc = decode(r#"{"viewport":{"zoom":2,"x":-10,"y":5}}"#).unwrap();
        assert!(doc.objects.is_empty());
        assert_eq!(
            doc.viewport,
            Some(ViewportState {
                zoom: 2.0,
                pan_x: -10.0,
                pan_y: 5.0
            })
        );

        let doc = decode(r#"{"customObjects":[]}"#).unwrap();
        assert_eq!(doc.custom_objects, Some(Vec::new()));
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(matches!(decode("[1,2]"), Err(CodecError::NotAnObject("array"))));
        assert!(matches!(decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(
            decode(r#"{"objects":[]}"#),
            Err(CodecError::FieldType { field: "objects", .. })
        ));
    }

    #[test]
    fn decode_coerces_bad_scales_and_drops_bad_positions() {
        let doc = decode(
            r#"{"objects":{
                "a":{"left":5,"top":6,"scaleX":-3,"scaleY":"big"},
                "b":{"left":"x","top":6,"scaleX":1,"scaleY":1},
                "c":"garbage"}}"#,
        )
        .unwrap();
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(doc.objects["a"], NodeTransform::new(5.0, 6.0, 1.0));
    }

    #[test]
    fn decode_skips_malformed_annotations() {
        let doc = decode(
            r#"{"objects":{},"customObjects":[
                {"customId":"c1","customType":"highlight","width":40,"height":20,"left":1,"top":2},
                {"customId":"c2","customType":"sparkles","left":0,"top":0}]}"#,
        )
        .unwrap();
        let custom = doc.custom_objects.unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].kind, AnnotationKind::Highlight { width: 40.0, height: 20.0 });
    }

    #[test]
    fn encode_coerces_out_of_domain_values() {
        let mut doc = LayoutDocument::default();
        doc.objects.insert(
            "1".into(),
            NodeTransform {
                left: f64::NAN,
                top: f64::INFINITY,
                scale_x: 0.0,
                scale_y: -2.0,
            },
        );
        doc.viewport = Some(ViewportState { zoom: f64::NAN, pan_x: 1.0, pan_y: 2.0 });
        let json = encode(&doc, ZoomBounds::default()).unwrap();
        let back = decode(&json).unwrap();
        assert_eq!(back.objects["1"], NodeTransform::default());
        assert_eq!(back.viewport.unwrap().zoom, 1.0);
    }

    #[test]
    fn valid_transforms_roundtrip_losslessly() {
        let mut doc = LayoutDocument::default();
        doc.objects.insert(
            "9".into(),
            NodeTransform {
                left: -123.456,
                top: 7.0e-3,
                scale_x: 0.333_333_333_333,
                scale_y: 3.25,
            },
        );
        let back = decode(&encode(&doc, ZoomBounds::default()).unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn prune_drops_groups_with_one_resolvable_member() {
        let mut doc = decode(
            r#"{"objects":{"1":{"left":10,"top":20,"scaleX":2,"scaleY":2}},
                "groups":[{"members":["1","2"]}]}"#,
        )
        .unwrap();
        let changed = prune(&mut doc, &known(&["1"]));
        assert!(changed);
        assert_eq!(doc.objects["1"], NodeTransform::new(10.0, 20.0, 2.0));
        assert!(doc.groups.is_empty());
    }

    #[test]
    fn prune_is_idempotent() {
        let mut doc = decode(
            r#"{"objects":{"1":{"left":1,"top":1,"scaleX":1,"scaleY":1},
                           "2":{"left":2,"top":2,"scaleX":1,"scaleY":1},
                           "9":{"left":9,"top":9,"scaleX":1,"scaleY":1}},
                "groups":[["3","2","1"],{"members":["9","1"]}]}"#,
        )
        .unwrap();
        let ids = known(&["1", "2", "3"]);
        assert!(prune(&mut doc, &ids));
        let once = doc.clone();
        assert!(!prune(&mut doc, &ids));
        assert_eq!(doc, once);
        assert!(!doc.objects.contains_key("9"));
        assert_eq!(doc.groups, vec![GroupSpec::new(["1", "2", "3"])]);
    }

    #[test]
    fn member_order_does_not_matter() {
        let a = decode(r#"{"objects":{},"groups":[{"members":["b","a","c"]}]}"#).unwrap();
        let b = decode(r#"{"objects":{},"groups":[{"members":["c","b","a"]}]}"#).unwrap();
        assert_eq!(a.groups, b.groups);
        assert_eq!(a.groups[0].members, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_and_overlapping_groups_collapse() {
        let mut groups = vec![
            GroupSpec::new(["1", "2"]),
            GroupSpec::new(["2", "1"]),
            GroupSpec::new(["2", "3", "4"]),
        ];
        canonicalize_groups(&mut groups);
        assert_eq!(groups, vec![GroupSpec::new(["1", "2"]), GroupSpec::new(["3", "4"])]);
    }

    #[test]
    fn merge_prefers_remote_per_key() {
        let local = decode(
            r#"{"objects":{"1":{"left":1,"top":1,"scaleX":1,"scaleY":1},
                           "2":{"left":2,"top":2,"scaleX":1,"scaleY":1}},
                "viewport":{"zoom":2,"x":0,"y":0}}"#,
        )
        .unwrap();
        let remote = decode(r#"{"objects":{"2":{"left":50,"top":60,"scaleX":1,"scaleY":1}}}"#).unwrap();
        let merged = merge(&local, &remote);
        assert_eq!(merged.objects["1"], NodeTransform::new(1.0, 1.0, 1.0));
        assert_eq!(merged.objects["2"], NodeTransform::new(50.0, 60.0, 1.0));
        assert_eq!(merged.viewport.unwrap().zoom, 2.0);
    }
}
