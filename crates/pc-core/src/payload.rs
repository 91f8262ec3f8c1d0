//! Host page product payload.

use crate::model::Product;
use serde_json::Value;
use std::collections::HashSet;

/// Parse the JSON product list embedded in the page.
///
/// A malformed or absent payload yields an empty list. Individual entries
/// that fail to parse (e.g. missing `id`) are skipped, as are repeated ids.
pub fn parse_products(raw: Option<&str>) -> Vec<Product> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        log::debug!("no product payload supplied");
        return Vec::new();
    };
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            log::error!("product payload must be a JSON array, got {other}");
            return Vec::new();
        }
        Err(e) => {
            log::error!("failed to parse product payload: {e}");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Product>(item) {
            Ok(product) => Some(product),
            Err(e) => {
                log::warn!("skipping malformed product entry: {e}");
                None
            }
        })
        .filter(|p| {
            let fresh = seen.insert(p.id.clone());
            if !fresh {
                log::warn!("duplicate product id {} in payload", p.id);
            }
            fresh
        })
        .collect()
}

/// Products that participate in the canvas: those with a photo.
pub fn eligible_products(products: &[Product]) -> Vec<&Product> {
    products.iter().filter(|p| p.photo().is_some()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_is_empty() {
        assert!(parse_products(None).is_empty());
        assert!(parse_products(Some("")).is_empty());
        assert!(parse_products(Some("{not json")).is_empty());
        assert!(parse_products(Some(r#"{"id":1}"#)).is_empty());
    }

    #[test]
    fn bad_entries_are_skipped() {
        let products = parse_products(Some(
            r#"[{"id":1,"photoUrl":"a.png"},{"name":"no id"},{"id":1,"photoUrl":"dup.png"},{"id":2}]"#,
        ));
        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(products[0].photo(), Some("a.png"));
    }

    #[test]
    fn only_products_with_photos_are_eligible() {
        let products = parse_products(Some(
            r#"[{"id":1,"photoUrl":"a.png"},{"id":2,"photoUrl":null},{"id":3,"photoUrl":"c.png"}]"#,
        ));
        let eligible: Vec<&str> = eligible_products(&products).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(eligible, vec!["1", "3"]);
    }
}
