//! HTTP response building module
//!
//! Builders for every response the router can produce. Builders never
//! panic: a failed build is logged and replaced by a bare fallback response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::cloud::CloudError;

/// Response type produced by every stage
pub type HttpResponse = Response<Full<Bytes>>;

const INTERNAL_ERROR_BODY: &str = r#"{"code":1,"error":"Internal server error"}"#;

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> HttpResponse {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("304", &e, Bytes::new()))
}

/// Build 404 Not Found response
pub fn build_404_response() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("404 Not Found")))
        .unwrap_or_else(|e| fallback("404", &e, Bytes::from("404 Not Found")))
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> HttpResponse {
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("413 Payload Too Large")))
        .unwrap_or_else(|e| fallback("413", &e, Bytes::from("413 Payload Too Large")))
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: usize) -> HttpResponse {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header("Content-Type", "text/plain")
        .header("Content-Range", format!("bytes */{file_size}"))
        .body(Full::new(Bytes::from("Range Not Satisfiable")))
        .unwrap_or_else(|e| fallback("416", &e, Bytes::from("Range Not Satisfiable")))
}

/// Generic 500 response, never carries internal detail
pub fn build_500_response() -> HttpResponse {
    let mut resp = Response::new(Full::new(Bytes::from(INTERNAL_ERROR_BODY)));
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    resp
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> HttpResponse {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, HEAD, POST, PUT, DELETE, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header(
                "Access-Control-Allow-Methods",
                "GET, HEAD, POST, PUT, DELETE, OPTIONS",
            )
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type, Range, X-Application-Id, X-Master-Key, X-Session-Token, \
                 X-Installation-Id",
            )
            .header("Access-Control-Max-Age", "86400");
    }

    builder
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("OPTIONS", &e, Bytes::new()))
}

/// Build redirect response with an explicit status code
pub fn build_redirect_response_with_code(target: &str, code: u16) -> HttpResponse {
    let status = StatusCode::from_u16(code)
        .ok()
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);
    Response::builder()
        .status(status)
        .header("Location", target)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("Redirecting...")))
        .unwrap_or_else(|e| fallback("302", &e, Bytes::from("Redirecting...")))
}

/// Build a direct response with a fixed status and body
pub fn build_direct_response(
    status: u16,
    body: Option<&str>,
    content_type: Option<&str>,
) -> HttpResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    Response::builder()
        .status(status)
        .header("Content-Type", content_type.unwrap_or("text/plain"))
        .body(Full::new(Bytes::from(body.unwrap_or_default().to_string())))
        .unwrap_or_else(|e| fallback("direct", &e, Bytes::new()))
}

/// Serialize `body` as a JSON response
pub fn build_json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_500_response();
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            crate::logger::log_error(&format!("Failed to build JSON response: {e}"));
            build_500_response()
        })
}

/// `{code, error}` envelope with the status the error maps to
pub fn build_error_response(err: &CloudError) -> HttpResponse {
    build_json_response(err.status_code(), &err.envelope())
}

/// Build generic HTML document response
pub fn build_html_response(content: Bytes, is_head: bool) -> HttpResponse {
    let content_length = content.len();
    let body = if is_head { Bytes::new() } else { content };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .header("Cache-Control", "no-cache")
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback("HTML", &e, Bytes::new()))
}

/// Build success response with cache control
pub fn build_cached_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> HttpResponse {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback("200", &e, Bytes::new()))
}

/// Build 206 Partial Content response
pub fn build_partial_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    start: usize,
    end: usize,
    total_size: usize,
    is_head: bool,
) -> HttpResponse {
    let content_length = end - start + 1;
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("Content-Range", format!("bytes {start}-{end}/{total_size}"))
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback("206", &e, Bytes::new()))
}

/// Log response build error and produce a bare response
fn fallback(status: &str, error: &hyper::http::Error, body: Bytes) -> HttpResponse {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
    Response::new(Full::new(body))
}
