//! Static file serving module
//!
//! Resolves request paths against the public root, and serves configured
//! single files and the SPA document.

use crate::http::{self, cache, mime, range::RangeParseResult, AppRequest, HttpResponse};
use crate::logger;
use hyper::body::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve the file at the request path under `public_dir`, if one exists
///
/// Returns `None` when no regular file is found, so the router can move on
/// to the next stage. Paths escaping the root are never served.
pub async fn resolve_static(public_dir: &str, req: &AppRequest) -> Option<HttpResponse> {
    let file_path = locate(public_dir, &req.path).await?;
    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_path.display()
            ));
            return None;
        }
    };
    Some(build_static_file_response(
        Bytes::from(content),
        mime::content_type_for(&file_path),
        req,
    ))
}

/// Map a URI path onto a regular file under the public root
async fn locate(public_dir: &str, uri_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(uri_path).ok()?;
    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() || relative.contains('\0') {
        return None;
    }

    let root = match fs::canonicalize(public_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_debug(&format!("Public root '{public_dir}' unavailable: {e}"));
            return None;
        }
    };

    // Missing files are the common case, nothing to log
    let candidate = fs::canonicalize(root.join(relative)).await.ok()?;
    if !candidate.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {uri_path} -> {}",
            candidate.display()
        ));
        return None;
    }

    let metadata = fs::metadata(&candidate).await.ok()?;
    metadata.is_file().then_some(candidate)
}

/// Serve a single configured file, 404 when it cannot be read
pub async fn serve_file(req: &AppRequest, file_path: &str) -> HttpResponse {
    let path = Path::new(file_path);
    match fs::read(path).await {
        Ok(content) => {
            build_static_file_response(Bytes::from(content), mime::content_type_for(path), req)
        }
        Err(e) => {
            logger::log_warning(&format!("Route file '{file_path}' unavailable: {e}"));
            http::build_404_response()
        }
    }
}

/// Serve the SPA document for client-side routes
pub async fn serve_spa_document(req: &AppRequest, document: &str) -> HttpResponse {
    match fs::read(document).await {
        Ok(content) => http::response::build_html_response(Bytes::from(content), req.is_head()),
        Err(e) => {
            logger::log_warning(&format!("SPA document '{document}' unavailable: {e}"));
            http::build_404_response()
        }
    }
}

/// True when the final path segment has no `.`
pub fn is_extensionless(path: &str) -> bool {
    path.rsplit('/').next().map_or(true, |last| !last.contains('.'))
}

/// Build static file response with `ETag` and Range support
fn build_static_file_response(data: Bytes, content_type: &str, req: &AppRequest) -> HttpResponse {
    let etag = cache::generate_etag(&data);
    let total_size = data.len();
    let is_head = req.is_head();

    if cache::check_etag_match(req.header("if-none-match"), &etag) {
        return http::build_304_response(&etag);
    }

    match http::parse_range_header(req.header("range"), total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);
            return http::response::build_partial_response(
                data.slice(start..=end),
                content_type,
                &etag,
                start,
                end,
                total_size,
                is_head,
            );
        }
        RangeParseResult::NotSatisfiable => return http::build_416_response(total_size),
        RangeParseResult::None => {}
    }

    http::response::build_cached_response(data, content_type, &etag, is_head)
}
