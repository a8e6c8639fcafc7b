//! `/classes` endpoints
//!
//! Reads go straight to the store. Mutations run through the trigger
//! pipeline so `before*` handlers can veto them.

use hyper::StatusCode;
use serde_json::{json, Value};

use super::credentials::{self, Credentials, SESSION_CLASS, USER_CLASS};
use super::ApiResult;
use crate::cloud::{CloudError, CloudResult, Mutation, Operation, RequestContext};
use crate::config::AppState;
use crate::http::AppRequest;
use crate::store::{strip_reserved, Object, Query};

const DEFAULT_LIMIT: usize = 100;

fn is_reserved(class_name: &str) -> bool {
    class_name.starts_with('_')
}

/// Mutating a reserved class directly requires the master key
fn require_master_for(class_name: &str, master: bool) -> CloudResult<()> {
    if is_reserved(class_name) && !master {
        return Err(CloudError::forbidden(format!(
            "Clients aren't allowed to modify {class_name} directly"
        )));
    }
    Ok(())
}

/// Sessions are only readable with the master key
fn require_read_access(class_name: &str, credentials: &Credentials) -> CloudResult<()> {
    if class_name == SESSION_CLASS && !credentials.master {
        return Err(CloudError::forbidden(format!(
            "Clients aren't allowed to read {class_name} directly"
        )));
    }
    Ok(())
}

fn query_from_request(req: &AppRequest) -> CloudResult<Query> {
    let equals = match req.query_param("where") {
        None => Object::new(),
        Some(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(CloudError::InvalidJson("where must be a JSON object".into())),
            Err(e) => return Err(CloudError::InvalidJson(format!("where: {e}"))),
        },
    };

    let number = |name: &str| -> CloudResult<Option<usize>> {
        req.query_param(name)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    CloudError::InvalidJson(format!("{name} must be a non-negative integer"))
                })
            })
            .transpose()
    };

    Ok(Query {
        equals,
        limit: Some(number("limit")?.unwrap_or(DEFAULT_LIMIT)),
        skip: number("skip")?.unwrap_or(0),
    })
}

pub async fn list(
    state: &AppState,
    req: &AppRequest,
    credentials: &Credentials,
    class_name: &str,
) -> ApiResult {
    require_read_access(class_name, credentials)?;
    let query = query_from_request(req)?;
    let results: Vec<Value> = state
        .store
        .find(class_name, &query)
        .await?
        .into_iter()
        .map(|object| Value::Object(credentials::sanitize(class_name, object)))
        .collect();
    Ok((StatusCode::OK, json!({ "results": results })))
}

pub async fn get(
    state: &AppState,
    credentials: &Credentials,
    class_name: &str,
    object_id: &str,
) -> ApiResult {
    require_read_access(class_name, credentials)?;
    let object = state
        .store
        .get(class_name, object_id)
        .await?
        .ok_or_else(CloudError::object_not_found)?;
    Ok((
        StatusCode::OK,
        Value::Object(credentials::sanitize(class_name, object)),
    ))
}

/// Client fields with store-managed keys removed and passwords sealed
fn client_fields(class_name: &str, fields: Object) -> CloudResult<Object> {
    let mut fields = strip_reserved(fields);
    if class_name == USER_CLASS {
        credentials::seal_password(&mut fields)?;
    }
    Ok(fields)
}

pub async fn create(
    state: &AppState,
    ctx: &RequestContext,
    class_name: &str,
    fields: Object,
) -> ApiResult {
    require_master_for(class_name, ctx.is_master())?;
    let mutation = Mutation {
        operation: Operation::Create,
        class_name: class_name.to_string(),
        object_id: None,
        fields: client_fields(class_name, fields)?,
    };
    let outcome = super::pipeline(state, class_name)
        .run(mutation, ctx)
        .await?;
    Ok((
        StatusCode::CREATED,
        json!({
            "objectId": outcome.object.get("objectId"),
            "createdAt": outcome.object.get("createdAt"),
        }),
    ))
}

pub async fn update(
    state: &AppState,
    ctx: &RequestContext,
    class_name: &str,
    object_id: &str,
    fields: Object,
) -> ApiResult {
    require_master_for(class_name, ctx.is_master())?;
    let mutation = Mutation {
        operation: Operation::Save,
        class_name: class_name.to_string(),
        object_id: Some(object_id.to_string()),
        fields: client_fields(class_name, fields)?,
    };
    let outcome = super::pipeline(state, class_name)
        .run(mutation, ctx)
        .await?;
    Ok((
        StatusCode::OK,
        json!({ "updatedAt": outcome.object.get("updatedAt") }),
    ))
}

pub async fn delete(
    state: &AppState,
    ctx: &RequestContext,
    class_name: &str,
    object_id: &str,
) -> ApiResult {
    require_master_for(class_name, ctx.is_master())?;
    let mutation = Mutation {
        operation: Operation::Delete,
        class_name: class_name.to_string(),
        object_id: Some(object_id.to_string()),
        fields: Object::new(),
    };
    super::pipeline(state, class_name)
        .run(mutation, ctx)
        .await?;
    Ok((StatusCode::OK, json!({})))
}

#[cfg(test)]
mod tests {
    use crate::cloud::{handler_fn, CloudError, CloudRegistry, CloudRegistryBuilder, RequestContext};
    use crate::gateway::credentials::MASTER_KEY_HEADER;
    use crate::gateway::tests::{api_request, call, test_state};
    use hyper::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    async fn create_todo(state: &crate::config::AppState, body: &str) -> String {
        let (status, resp) = call(state, api_request(Method::POST, "/1/classes/Todo", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        resp["objectId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_crud_round() {
        let state = test_state("public", CloudRegistry::default());
        let id = create_todo(&state, r#"{"title":"a","done":false,"objectId":"forged"}"#).await;
        assert_ne!(id, "forged");

        let path = format!("/1/classes/Todo/{id}");
        let req = api_request(Method::PUT, &path, r#"{"done":true}"#);
        let (status, resp) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(resp["updatedAt"].is_string());

        let (_, fetched) = call(&state, api_request(Method::GET, &path, "")).await;
        assert_eq!(fetched["done"], true);
        assert_eq!(fetched["title"], "a");

        let (status, resp) = call(&state, api_request(Method::DELETE, &path, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, json!({}));

        let (status, resp) = call(&state, api_request(Method::GET, &path, "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["code"], 101);
    }

    #[tokio::test]
    async fn test_list_with_where_limit_skip() {
        let state = test_state("public", CloudRegistry::default());
        for (title, done) in [("a", true), ("b", false), ("c", true), ("d", true)] {
            create_todo(&state, &json!({"title": title, "done": done}).to_string()).await;
        }

        let (_, resp) = call(
            &state,
            api_request(
                Method::GET,
                "/1/classes/Todo?where=%7B%22done%22%3Atrue%7D&skip=1&limit=1",
                "",
            ),
        )
        .await;
        let results = resp["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "c");

        let (status, _) = call(
            &state,
            api_request(Method::GET, "/1/classes/Todo?limit=-1", ""),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reserved_classes_need_master() {
        let state = test_state("public", CloudRegistry::default());
        let (status, resp) = call(
            &state,
            api_request(Method::POST, "/1/classes/_User", r#"{"username":"x"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["code"], 119);

        let (status, _) = call(
            &state,
            api_request(Method::POST, "/1/classes/_User", r#"{"username":"x","password":"pw"}"#)
                .with_header(MASTER_KEY_HEADER, "master"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, listed) = call(&state, api_request(Method::GET, "/1/classes/_User", "")).await;
        let user = &listed["results"][0];
        assert_eq!(user["username"], "x");
        assert!(user.get("password").is_none());
        assert!(user.get("_hashed_password").is_none());

        let (status, _) = call(&state, api_request(Method::GET, "/1/classes/_Session", "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_after_save_sees_committed_object() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut builder = CloudRegistryBuilder::new();
        builder.after_save(
            "Todo",
            handler_fn(move |ctx: RequestContext| {
                let sink = Arc::clone(&sink);
                async move {
                    *sink.lock().unwrap() = ctx.object().cloned().map(Value::Object);
                    Err::<Value, _>(CloudError::application("ignored"))
                }
            }),
        );
        let state = test_state("public", builder.build());

        let id = create_todo(&state, r#"{"title":"kept"}"#).await;
        let observed = seen.lock().unwrap().clone().unwrap();
        assert_eq!(observed["objectId"], id.as_str());
        assert_eq!(observed["title"], "kept");
    }

    #[tokio::test]
    async fn test_update_missing_object() {
        let state = test_state("public", CloudRegistry::default());
        let (status, _) = call(
            &state,
            api_request(Method::PUT, "/1/classes/Todo/missing000", r#"{"a":1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
