//! Application cloud code
//!
//! Functions, triggers and routes the server registers at startup.

use hyper::Method;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cloud::pipeline::object_str;
use crate::cloud::{handler_fn, CloudError, CloudRegistry, CloudRegistryBuilder, RequestContext};
use crate::http::{build_json_response, AppRequest, HttpResponse};
use crate::logger;
use crate::routing::{PatternError, RouteHandler, RouteParams, RouteTable};

/// Build the frozen registry
pub fn registry() -> CloudRegistry {
    let mut cloud = CloudRegistryBuilder::new();

    cloud.define(
        "hello",
        handler_fn(|ctx: RequestContext| async move {
            let name = ctx
                .param("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or("World")
                .to_string();
            Ok(json!(format!("Hello, {name}")))
        }),
    );

    cloud.before_save(
        "Todo",
        handler_fn(|ctx: RequestContext| async move {
            match object_str(&ctx, "title") {
                Some(title) if !title.trim().is_empty() => Ok(Value::Null),
                _ => Err(CloudError::application("A todo needs a title")),
            }
        }),
    );

    cloud.after_save(
        "Todo",
        handler_fn(|ctx: RequestContext| async move {
            let id = object_str(&ctx, "objectId").unwrap_or("?");
            let who = ctx.caller().map_or("anonymous", |c| c.username.as_str());
            let agent = ctx.meta().header("user-agent").unwrap_or("-");
            logger::log_info(&format!("[Todo] {id} saved by {who} ({agent})"));
            Ok(Value::Null)
        }),
    );

    cloud.build()
}

/// `GET /status/:component` reports a named component as up
struct StatusRoute;

#[async_trait::async_trait]
impl RouteHandler for StatusRoute {
    async fn handle(&self, _req: &AppRequest, params: &RouteParams) -> HttpResponse {
        let component = params.get("component").unwrap_or("server");
        build_json_response(
            hyper::StatusCode::OK,
            &json!({ "component": component, "status": "ok" }),
        )
    }
}

/// Add code-registered routes after the configured ones
pub fn register_routes(routes: &mut RouteTable) -> Result<(), PatternError> {
    routes.register(Some(Method::GET), "/status/:component", Arc::new(StatusRoute))
}
