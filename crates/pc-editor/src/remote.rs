//! Remote layout sync protocol.
//!
//! Sans-IO: this module decides *what* to send and *when*, and interprets
//! responses. The host performs the actual HTTP exchange and reports back.
//!
//! - `GET <endpoint>` → `{"layout": <LayoutDocument | null>}`, merged over the
//!   local cache with remote precedence.
//! - `POST <endpoint>` with `{"layout": <LayoutDocument>}`, debounced: each
//!   `schedule_push` replaces the pending document and restarts the window,
//!   so only the last state of a burst is ever sent.

use pc_core::codec::{self, CodecError};
use pc_core::model::LayoutDocument;
use pc_core::ZoomBounds;
use serde::Serialize;
use serde_json::Value;

/// Anti-forgery header expected by the layout endpoint.
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("layout endpoint answered HTTP {0}")]
    Status(u16),
    #[error("layout response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout response: {0}")]
    Codec(#[from] CodecError),
    #[error("layout request failed: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// An HTTP request for the host to perform. Credentials are same-origin.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Serialize)]
struct PushBody<'a> {
    layout: &'a LayoutDocument,
}

pub struct RemoteSync {
    endpoint: String,
    csrf_token: Option<String>,
    delay_ms: f64,
    bounds: ZoomBounds,
    pending: Option<LayoutDocument>,
    due_at: f64,
}

impl RemoteSync {
    pub fn new(endpoint: impl Into<String>, csrf_token: Option<String>, delay_ms: f64, bounds: ZoomBounds) -> Self {
        Self {
            endpoint: endpoint.into(),
            csrf_token: csrf_token.filter(|t| !t.is_empty()),
            delay_ms,
            bounds,
            pending: None,
            due_at: 0.0,
        }
    }

    pub fn fetch_request(&self) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: self.endpoint.clone(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
        }
    }

    /// Interpret the `GET` response and merge it over `local`.
    ///
    /// A `null` or absent `layout` leaves `local` as it is.
    ///
    /// # Errors
    /// Non-2xx status, malformed JSON, or a `layout` that is not an object.
    pub fn apply_fetch_response(
        &self,
        status: u16,
        body: &str,
        local: &LayoutDocument,
    ) -> Result<LayoutDocument, RemoteError> {
        if !(200..300).contains(&status) {
            return Err(RemoteError::Status(status));
        }
        let mut envelope: Value = serde_json::from_str(body)?;
        let layout = match envelope.get_mut("layout").map(Value::take) {
            None | Some(Value::Null) => {
                log::debug!("remote has no stored layout");
                return Ok(local.clone());
            }
            Some(layout) => layout,
        };
        let mut remote = codec::decode_value(layout)?;
        codec::sanitize(&mut remote, self.bounds);
        log::info!(
            "remote layout: {} objects, {} groups",
            remote.objects.len(),
            remote.groups.len()
        );
        Ok(codec::merge(local, &remote))
    }

    /// Replace the pending push and restart the debounce window.
    pub fn schedule_push(&mut self, doc: LayoutDocument, now_ms: f64) {
        self.pending = Some(doc);
        self.due_at = now_ms + self.delay_ms;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending push becomes due, if any.
    pub fn next_due(&self) -> Option<f64> {
        self.pending.as_ref().map(|_| self.due_at)
    }

    /// Yield the push request once the window has elapsed.
    pub fn take_due(&mut self, now_ms: f64) -> Option<HttpRequest> {
        if self.pending.is_none() || now_ms < self.due_at {
            return None;
        }
        let mut doc = self.pending.take()?;
        codec::sanitize(&mut doc, self.bounds);
        let body = match serde_json::to_string(&PushBody { layout: &doc }) {
            Ok(body) => body,
            Err(e) => {
                log::error!("serializing layout push: {e}");
                return None;
            }
        };
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = &self.csrf_token {
            headers.push((CSRF_HEADER.to_string(), token.clone()));
        }
        Some(HttpRequest {
            method: Method::Post,
            url: self.endpoint.clone(),
            headers,
            body: Some(body),
        })
    }

    /// Report the outcome of a push. Failures are logged; the next mutation
    /// schedules a fresh push.
    pub fn on_push_result(&mut self, result: Result<u16, String>) {
        match result {
            Ok(status) if (200..300).contains(&status) => log::trace!("layout pushed"),
            Ok(status) => log::error!("{}", RemoteError::Status(status)),
            Err(e) => log::error!("{}", RemoteError::Network(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::model::NodeTransform;
    use pretty_assertions::assert_eq;

    fn sync() -> RemoteSync {
        RemoteSync::new("/api/layout", Some("tok".into()), 2000.0, ZoomBounds::default())
    }

    fn doc_at(left: f64) -> LayoutDocument {
        let mut doc = LayoutDocument::default();
        doc.objects.insert("1".into(), NodeTransform::new(left, 0.0, 1.0));
        doc
    }

    #[test]
    fn push_is_debounced_and_last_write_wins() {
        let mut s = sync();
        s.schedule_push(doc_at(1.0), 0.0);
        s.schedule_push(doc_at(2.0), 1500.0);
        assert_eq!(s.take_due(2000.0), None);
        assert_eq!(s.next_due(), Some(3500.0));

        let req = s.take_due(3500.0).unwrap();
        assert_eq!(req.method, Method::Post);
        assert!(req.headers.contains(&(CSRF_HEADER.to_string(), "tok".to_string())));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["layout"]["objects"]["1"]["left"], 2.0);

        assert!(!s.has_pending());
        assert_eq!(s.take_due(10_000.0), None);
    }

    #[test]
    fn remote_wins_on_merge() {
        let s = sync();
        let body = r#"{"layout":{"objects":{"1":{"left":9,"top":9,"scaleX":1,"scaleY":1}},"groups":[]}}"#;
        let merged = s.apply_fetch_response(200, body, &doc_at(1.0)).unwrap();
        assert_eq!(merged.objects["1"].left, 9.0);
    }

    #[test]
    fn null_layout_keeps_local() {
        let s = sync();
        let local = doc_at(1.0);
        assert_eq!(s.apply_fetch_response(200, r#"{"layout":null}"#, &local).unwrap(), local);
    }

    #[test]
    fn bad_responses_are_errors() {
        let s = sync();
        let local = LayoutDocument::default();
        assert!(matches!(
            s.apply_fetch_response(403, "{}", &local),
            Err(RemoteError::Status(403))
        ));
        assert!(matches!(
            s.apply_fetch_response(200, "<html>", &local),
            Err(RemoteError::Json(_))
        ));
        assert!(matches!(
            s.apply_fetch_response(200, r#"{"layout":[1]}"#, &local),
            Err(RemoteError::Codec(_))
        ));
    }

    #[test]
    fn missing_token_sends_no_csrf_header() {
        let mut s = RemoteSync::new("/api/layout", Some(String::new()), 0.0, ZoomBounds::default());
        s.schedule_push(LayoutDocument::default(), 0.0);
        let req = s.take_due(0.0).unwrap();
        assert!(req.headers.iter().all(|(name, _)| name != CSRF_HEADER));
    }
}
