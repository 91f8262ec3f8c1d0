//! Performs the HTTP exchanges described by `pc_editor::remote`.

use gloo::net::http::Request;
use pc_editor::{HttpRequest, Method};
use web_sys::RequestCredentials;

/// Send `request` with same-origin credentials. Returns status and body.
pub async fn send(request: HttpRequest) -> Result<(u16, String), String> {
    let mut builder = match request.method {
        Method::Get => Request::get(&request.url),
        Method::Post => Request::post(&request.url),
    }
    .credentials(RequestCredentials::SameOrigin);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    let response = match request.body {
        Some(body) => builder.body(body).map_err(|e| e.to_string())?.send().await,
        None => builder.send().await,
    }
    .map_err(|e| e.to_string())?;
    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;
    log::trace!("{} {} -> {status}", request.method.as_str(), request.url);
    Ok((status, body))
}
