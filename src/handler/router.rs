//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Stages are tried in a fixed
//! order and the first one that claims the request produces the response:
//! static assets, the data API, custom routes, then the SPA document.

use crate::config::{AppState, RouteAction};
use crate::gateway;
use crate::handler::static_files;
use crate::http::{self, AppRequest, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use crate::routing::{RouteParams, RouteTarget};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::{Method, Request};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Which stage produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    Rejected,
    Static,
    Api,
    Route,
    Spa,
    NotFound,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Rejected => "rejected",
            Self::Static => "static",
            Self::Api => "api",
            Self::Route => "route",
            Self::Spa => "spa",
            Self::NotFound => "none",
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    remote_addr: Option<SocketAddr>,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let max_body_size = state.config.http.max_body_size;

    let mut entry = AccessLogEntry::new(
        remote_addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(str::to_string);
    entry.user_agent = header_str(&parts.headers, "user-agent").map(str::to_string);

    let (response, stage) = if let Some(resp) = check_body_size(&parts.headers, max_body_size) {
        (resp, Stage::Rejected)
    } else {
        let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
        match Limited::new(body, limit).collect().await {
            Ok(collected) => {
                let app_req = AppRequest {
                    method: parts.method,
                    path: parts.uri.path().to_string(),
                    query: parts.uri.query().map(str::to_string),
                    headers: parts.headers,
                    body: collected.to_bytes(),
                    remote_addr,
                };
                dispatch(&state, &app_req).await
            }
            Err(e) if e.is::<http_body_util::LengthLimitError>() => {
                logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
                (http::build_413_response(), Stage::Rejected)
            }
            Err(e) => {
                logger::log_error(&format!("Failed to read request body: {e}"));
                (http::build_500_response(), Stage::Rejected)
            }
        }
    };

    let response = decorate(response, &state);
    if state.access_log {
        let body_bytes = usize::try_from(hyper::body::Body::size_hint(response.body()).lower())
            .unwrap_or_default();
        let entry = entry.finish(
            response.status().as_u16(),
            body_bytes,
            stage.as_str(),
            started.elapsed(),
        );
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Route a collected request through the stages
pub async fn dispatch(state: &AppState, req: &AppRequest) -> (HttpResponse, Stage) {
    let config = &state.config;

    if req.method == Method::OPTIONS {
        return (
            http::build_options_response(config.http.enable_cors),
            Stage::Preflight,
        );
    }
    if let Some(resp) = check_body_size(&req.headers, config.http.max_body_size) {
        return (resp, Stage::Rejected);
    }

    // 1. Static assets
    if matches!(req.method, Method::GET | Method::HEAD) {
        if let Some(resp) = static_files::resolve_static(&config.app.public_dir, req).await {
            return (resp, Stage::Static);
        }
    }

    // 2. Data API
    if gateway::is_mounted(&config.app.mount_path, &req.path) {
        return (gateway::handle(state, req).await, Stage::Api);
    }

    // 3. Custom routes
    if let Some((entry, params)) = state.routes.find(&req.method, &req.path) {
        return (run_route(&entry.target, req, &params).await, Stage::Route);
    }

    // 4. SPA document for client-side paths
    if static_files::is_extensionless(&req.path) {
        let document = config.app.spa_document_path();
        return (
            static_files::serve_spa_document(req, &document).await,
            Stage::Spa,
        );
    }

    (http::build_404_response(), Stage::NotFound)
}

async fn run_route(target: &RouteTarget, req: &AppRequest, params: &RouteParams) -> HttpResponse {
    match target {
        RouteTarget::Handler(handler) => handler.handle(req, params).await,
        RouteTarget::Configured(RouteAction::File { path }) => {
            static_files::serve_file(req, path).await
        }
        RouteTarget::Configured(RouteAction::Redirect { target, code }) => {
            http::build_redirect_response_with_code(target, *code)
        }
        RouteTarget::Configured(RouteAction::Direct {
            status,
            body,
            content_type,
        }) => http::build_direct_response(*status, body.as_deref(), content_type.as_deref()),
    }
}

/// Server and CORS headers common to every response
fn decorate(mut response: HttpResponse, state: &AppState) -> HttpResponse {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(hyper::header::SERVER, value);
    }
    if state.config.http.enable_cors {
        headers
            .entry(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert(HeaderValue::from_static("*"));
    }
    response
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<HttpResponse> {
    let size_str = header_str(headers, "content-length")?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
    }
}
