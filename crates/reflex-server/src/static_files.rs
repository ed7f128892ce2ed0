//! Static file serving with bootstrap injection.
//!
//! Serves files from the watched root. HTML responses get the live reload
//! client script injected before `</body>`; everything else is served
//! as-is with an extension-based MIME lookup.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;

use crate::error::ServerError;
use crate::state::AppState;

/// Client bootstrap script, embedded at compile time.
const CLIENT_SCRIPT: &str = include_str!("../assets/client.js");

/// Script tag injected into HTML responses.
const SCRIPT_TAG: &str = "  <script defer src=\"/__reflex/client.js\"></script>\n";

/// Create router for serving files from the watched root.
pub(crate) fn static_router() -> Router<Arc<AppState>> {
    Router::new().fallback(serve_file)
}

/// Serve the embedded live reload client script.
pub(crate) async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

/// Serve a file from the watched root.
async fn serve_file(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Result<Response, ServerError> {
    let file_path = resolve_request_path(&state.root, req.uri().path())?;

    let metadata = tokio::fs::metadata(&file_path)
        .await
        .map_err(|_| ServerError::NotFound(file_path.clone()))?;
    // No directory listing; only a trailing slash maps to index.html
    if metadata.is_dir() {
        return Err(ServerError::NotFound(file_path));
    }

    if file_path.extension().is_some_and(|ext| ext == "html") {
        let body = tokio::fs::read_to_string(&file_path).await?;
        let body = if state.inject_enabled() {
            inject_client_script(&body)
        } else {
            body
        };
        return Ok((
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response());
    }

    let content = tokio::fs::read(&file_path).await?;
    let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(content))
        .unwrap())
}

/// Resolve a request path to a file under `root`.
///
/// Percent-decodes the path and rebuilds it component by component so
/// `..` can never escape the served root. A trailing slash (or the bare
/// root) maps to `index.html`.
fn resolve_request_path(root: &Path, request_path: &str) -> Result<PathBuf, ServerError> {
    let decoded: String = percent_decode_str(request_path)
        .decode_utf8()
        .map_err(|_| ServerError::Forbidden(request_path.to_owned()))?
        .into_owned();

    let mut resolved = root.to_path_buf();
    for component in Path::new(&decoded).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(ServerError::Forbidden(decoded.clone()));
            }
        }
    }

    if decoded.ends_with('/') {
        resolved.push("index.html");
    }

    Ok(resolved)
}

/// Inject the client script reference before the first `</body>`.
///
/// HTML without a `</body>` tag is passed through untouched.
fn inject_client_script(html: &str) -> String {
    match html.find("</body>") {
        Some(pos) => format!("{}{SCRIPT_TAG}{}", &html[..pos], &html[pos..]),
        None => html.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_plain_file() {
        let resolved = resolve_request_path(Path::new("/site"), "/style.css").unwrap();
        assert_eq!(resolved, PathBuf::from("/site/style.css"));
    }

    #[test]
    fn test_resolve_nested_file() {
        let resolved = resolve_request_path(Path::new("/site"), "/docs/guide.html").unwrap();
        assert_eq!(resolved, PathBuf::from("/site/docs/guide.html"));
    }

    #[test]
    fn test_resolve_root_maps_to_index() {
        let resolved = resolve_request_path(Path::new("/site"), "/").unwrap();
        assert_eq!(resolved, PathBuf::from("/site/index.html"));
    }

    #[test]
    fn test_resolve_trailing_slash_maps_to_index() {
        let resolved = resolve_request_path(Path::new("/site"), "/docs/").unwrap();
        assert_eq!(resolved, PathBuf::from("/site/docs/index.html"));
    }

    #[test]
    fn test_resolve_decodes_percent_encoding() {
        let resolved = resolve_request_path(Path::new("/site"), "/release%20notes.html").unwrap();
        assert_eq!(resolved, PathBuf::from("/site/release notes.html"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let err = resolve_request_path(Path::new("/site"), "/../etc/passwd").unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));
    }

    #[test]
    fn test_resolve_rejects_encoded_traversal() {
        let err = resolve_request_path(Path::new("/site"), "/%2e%2e/secret.txt").unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));
    }

    #[test]
    fn test_inject_before_body_close() {
        let html = "<html><body><h1>Hi</h1></body></html>";

        let injected = inject_client_script(html);

        assert_eq!(
            injected,
            "<html><body><h1>Hi</h1>  <script defer src=\"/__reflex/client.js\"></script>\n</body></html>"
        );
    }

    #[test]
    fn test_inject_only_before_first_body_close() {
        let html = "<body></body><body></body>";

        let injected = inject_client_script(html);

        assert_eq!(injected.matches("client.js").count(), 1);
        assert!(injected.starts_with("<body>  <script"));
    }

    #[test]
    fn test_inject_without_body_close_is_untouched() {
        let html = "<p>fragment without a closing body tag</p>";
        assert_eq!(inject_client_script(html), html);
    }

    #[test]
    fn test_client_script_mentions_ws_endpoint() {
        assert!(CLIENT_SCRIPT.contains("/__reflex/ws"));
    }
}
