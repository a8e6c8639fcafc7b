//! Data API gateway
//!
//! Everything under the mount prefix: class CRUD through the trigger
//! pipeline, function invocation, users and sessions. Failures leave as
//! `{"code", "error"}` envelopes.

mod classes;
pub mod credentials;
mod users;

use hyper::{Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::cloud::{
    codes, dispatcher, CloudError, CloudResult, RequestContext, RequestMeta, TriggerPipeline,
};
use crate::config::AppState;
use crate::http::{build_error_response, build_json_response, AppRequest, HttpResponse};
use crate::logger;
use crate::store::Object;
use credentials::{Credentials, INSTALLATION_ID_HEADER, MASTER_KEY_HEADER, SESSION_TOKEN_HEADER};

/// Endpoints below the mount prefix
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint<'a> {
    Health,
    ListObjects(&'a str),
    CreateObject(&'a str),
    GetObject(&'a str, &'a str),
    UpdateObject(&'a str, &'a str),
    DeleteObject(&'a str, &'a str),
    CallFunction(&'a str),
    SignUp,
    Login,
    Logout,
    CurrentUser,
}

fn parse_endpoint<'a>(method: &Method, rest: &'a str) -> Option<Endpoint<'a>> {
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let endpoint = match (method, segments.as_slice()) {
        (&Method::GET | &Method::HEAD, &["health"]) => Endpoint::Health,
        (&Method::GET, &["classes", class]) => Endpoint::ListObjects(class),
        (&Method::POST, &["classes", class]) => Endpoint::CreateObject(class),
        (&Method::GET, &["classes", class, id]) => Endpoint::GetObject(class, id),
        (&Method::PUT, &["classes", class, id]) => Endpoint::UpdateObject(class, id),
        (&Method::DELETE, &["classes", class, id]) => Endpoint::DeleteObject(class, id),
        (&Method::POST, &["functions", name]) => Endpoint::CallFunction(name),
        (&Method::POST, &["users"]) => Endpoint::SignUp,
        (&Method::GET, &["users", "me"]) => Endpoint::CurrentUser,
        (&Method::POST, &["login"]) => Endpoint::Login,
        (&Method::POST, &["logout"]) => Endpoint::Logout,
        _ => return None,
    };
    Some(endpoint)
}

/// True when `path` is the mount prefix or lies below it
pub fn is_mounted(mount_path: &str, path: &str) -> bool {
    path.strip_prefix(mount_path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Handle one data API request
pub async fn handle(state: &AppState, req: &AppRequest) -> HttpResponse {
    let rest = req
        .path
        .strip_prefix(state.config.app.mount_path.as_str())
        .unwrap_or_default();

    let result = match parse_endpoint(&req.method, rest) {
        Some(endpoint) => serve(state, req, endpoint).await,
        None => Err(CloudError::NotFound {
            code: codes::OBJECT_NOT_FOUND,
            message: format!("Unknown API endpoint: {} {}", req.method, req.path),
        }),
    };

    match result {
        Ok((status, body)) => build_json_response(status, &body),
        Err(err) => {
            if err.status_code().is_server_error() {
                logger::log_error(&format!("[API] {} {} failed: {err}", req.method, req.path));
            } else {
                logger::log_debug(&format!("[API] {} {} rejected: {err}", req.method, req.path));
            }
            build_error_response(&err)
        }
    }
}

type ApiResult = CloudResult<(StatusCode, Value)>;

async fn serve(state: &AppState, req: &AppRequest, endpoint: Endpoint<'_>) -> ApiResult {
    // Health probes carry no credentials
    let credentials = if endpoint == Endpoint::Health {
        Credentials::default()
    } else {
        credentials::authenticate(&state.config.app, state.store.as_ref(), req).await?
    };

    match endpoint {
        Endpoint::Health => Ok((StatusCode::OK, json!({"status": "ok"}))),
        Endpoint::ListObjects(class) => classes::list(state, req, &credentials, class).await,
        Endpoint::GetObject(class, id) => classes::get(state, &credentials, class, id).await,
        Endpoint::CreateObject(class) => {
            let ctx = base_context(req, &credentials, Map::new());
            classes::create(state, &ctx, class, parse_object(req)?).await
        }
        Endpoint::UpdateObject(class, id) => {
            let ctx = base_context(req, &credentials, Map::new());
            classes::update(state, &ctx, class, id, parse_object(req)?).await
        }
        Endpoint::DeleteObject(class, id) => {
            let ctx = base_context(req, &credentials, Map::new());
            classes::delete(state, &ctx, class, id).await
        }
        Endpoint::CallFunction(name) => {
            let ctx = base_context(req, &credentials, parse_object(req)?);
            let result = dispatcher::invoke(&state.registry, name, ctx).await?;
            Ok((StatusCode::OK, json!({ "result": result })))
        }
        Endpoint::SignUp => {
            let ctx = base_context(req, &credentials, Map::new());
            users::sign_up(state, &ctx, parse_object(req)?).await
        }
        Endpoint::Login => users::log_in(state, parse_object(req)?).await,
        Endpoint::Logout => users::log_out(state, &credentials).await,
        Endpoint::CurrentUser => users::current(state, &credentials).await,
    }
}

/// Trigger pipeline for a class; `_User` secrets never reach handlers
fn pipeline<'a>(state: &'a AppState, class_name: &str) -> TriggerPipeline<'a> {
    let pipeline = TriggerPipeline::new(&state.registry, state.store.as_ref());
    if class_name == credentials::USER_CLASS {
        pipeline.hiding(credentials::SECRET_FIELDS)
    } else {
        pipeline
    }
}

/// Request body as a JSON object; an empty body is an empty object
fn parse_object(req: &AppRequest) -> CloudResult<Object> {
    if req.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Object::new());
    }
    match serde_json::from_slice::<Value>(&req.body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CloudError::InvalidJson(
            "request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(CloudError::InvalidJson(e.to_string())),
    }
}

/// Context shared by functions and triggers for this request
fn base_context(req: &AppRequest, credentials: &Credentials, params: Object) -> RequestContext {
    let headers = req
        .headers
        .iter()
        .map(|(name, value)| {
            let value = if name == MASTER_KEY_HEADER || name == SESSION_TOKEN_HEADER {
                "[redacted]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), value)
        })
        .collect();

    RequestContext::builder()
        .caller(credentials.caller.clone())
        .master(credentials.master)
        .params(params)
        .meta(RequestMeta {
            method: req.method.to_string(),
            path: req.path.clone(),
            remote_addr: req.remote_addr,
            installation_id: req.header(INSTALLATION_ID_HEADER).map(str::to_string),
            headers,
        })
        .build()
}
