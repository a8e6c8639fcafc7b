//! Users and sessions
//!
//! Sign-up creates a `_User` through the trigger pipeline; every login
//! opens a new `_Session` row. The client gets the raw token, the row only
//! keeps its hash.

use hyper::StatusCode;
use serde_json::{json, Value};

use super::credentials::{
    self, string_field, Credentials, HASHED_PASSWORD_FIELD, SESSION_CLASS, USER_CLASS,
};
use super::ApiResult;
use crate::cloud::{codes, CloudError, CloudResult, Mutation, Operation, RequestContext};
use crate::config::AppState;
use crate::store::{strip_reserved, Object, ObjectStore, Query};

fn required_string(fields: &Object, key: &str) -> CloudResult<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(CloudError::application(format!("{key} is required"))),
    }
}

fn invalid_login() -> CloudError {
    CloudError::Application {
        code: codes::OBJECT_NOT_FOUND,
        message: "Invalid username/password.".to_string(),
    }
}

fn invalid_session() -> CloudError {
    CloudError::Authorization {
        code: codes::INVALID_SESSION_TOKEN,
        message: "Invalid session token".to_string(),
    }
}

async fn find_user(store: &dyn ObjectStore, username: &str) -> CloudResult<Option<Object>> {
    let mut query = Query::default();
    query
        .equals
        .insert("username".to_string(), Value::String(username.to_string()));
    query.limit = Some(1);
    Ok(store.find(USER_CLASS, &query).await?.into_iter().next())
}

async fn open_session(
    store: &dyn ObjectStore,
    user_id: &str,
    created_with: &str,
) -> CloudResult<String> {
    let token = credentials::new_session_token();
    let mut fields = Object::new();
    fields.insert(
        "sessionToken".to_string(),
        Value::String(credentials::hash_token(&token)),
    );
    fields.insert("user".to_string(), Value::String(user_id.to_string()));
    fields.insert("createdWith".to_string(), Value::String(created_with.to_string()));
    store.create(SESSION_CLASS, fields).await?;
    Ok(token)
}

/// `POST /users`
pub async fn sign_up(state: &AppState, ctx: &RequestContext, body: Object) -> ApiResult {
    let store = state.store.as_ref();
    let username = required_string(&body, "username")?;
    required_string(&body, "password")?;

    if find_user(store, &username).await?.is_some() {
        return Err(CloudError::Application {
            code: codes::USERNAME_TAKEN,
            message: "Account already exists for this username.".to_string(),
        });
    }

    let mut fields = strip_reserved(body);
    credentials::seal_password(&mut fields)?;
    let mutation = Mutation {
        operation: Operation::Create,
        class_name: USER_CLASS.to_string(),
        object_id: None,
        fields,
    };
    let outcome = super::pipeline(state, USER_CLASS)
        .run(mutation, ctx)
        .await?;

    let user_id = string_field(&outcome.object, "objectId")
        .ok_or_else(|| CloudError::Internal("created user has no objectId".to_string()))?;
    let token = open_session(store, &user_id, "signup").await?;

    Ok((
        StatusCode::CREATED,
        json!({
            "objectId": user_id,
            "createdAt": outcome.object.get("createdAt"),
            "sessionToken": token,
        }),
    ))
}

/// `POST /login`
pub async fn log_in(state: &AppState, body: Object) -> ApiResult {
    let store = state.store.as_ref();
    let username = required_string(&body, "username")?;
    let password = required_string(&body, "password")?;

    let user = find_user(store, &username).await?.ok_or_else(invalid_login)?;
    let verified = user
        .get(HASHED_PASSWORD_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|stored| credentials::verify_password(&password, stored));
    if !verified {
        return Err(invalid_login());
    }

    let user_id = string_field(&user, "objectId").ok_or_else(invalid_login)?;
    let token = open_session(store, &user_id, "login").await?;

    let mut public = credentials::sanitize(USER_CLASS, user);
    public.insert("sessionToken".to_string(), Value::String(token));
    Ok((StatusCode::OK, Value::Object(public)))
}

/// `POST /logout`
pub async fn log_out(state: &AppState, credentials: &Credentials) -> ApiResult {
    let session_id = credentials.session_id.as_deref().ok_or_else(invalid_session)?;
    state.store.delete(SESSION_CLASS, session_id).await?;
    Ok((StatusCode::OK, json!({})))
}

/// `GET /users/me`
pub async fn current(state: &AppState, credentials: &Credentials) -> ApiResult {
    let caller = credentials.caller.as_ref().ok_or_else(invalid_session)?;
    let user = state
        .store
        .get(USER_CLASS, &caller.user_id)
        .await?
        .ok_or_else(invalid_session)?;

    let mut public = credentials::sanitize(USER_CLASS, user);
    public.insert(
        "sessionToken".to_string(),
        Value::String(caller.session_token.clone()),
    );
    Ok((StatusCode::OK, Value::Object(public)))
}

#[cfg(test)]
mod tests {
    use crate::cloud::{
        codes, handler_fn, CloudError, CloudRegistry, CloudRegistryBuilder, RequestContext,
        TriggerEvent,
    };
    use crate::gateway::credentials::{
        hash_token, HASHED_PASSWORD_FIELD, SESSION_CLASS, SESSION_TOKEN_HEADER,
    };
    use crate::gateway::tests::{api_request, call, test_state};
    use crate::store::Query;
    use hyper::{Method, StatusCode};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_sign_up_login_me_logout() {
        let state = test_state("public", CloudRegistry::default());

        let (status, signed_up) = call(
            &state,
            api_request(Method::POST, "/1/users", r#"{"username":"ann","password":"pw","age":30}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(signed_up["sessionToken"].as_str().unwrap().starts_with("r:"));

        let (status, logged_in) = call(
            &state,
            api_request(Method::POST, "/1/login", r#"{"username":"ann","password":"pw"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logged_in["objectId"], signed_up["objectId"]);
        assert_eq!(logged_in["age"], 30);
        assert!(logged_in.get("_hashed_password").is_none());
        let token = logged_in["sessionToken"].as_str().unwrap().to_string();

        let sessions = state.store.find(SESSION_CLASS, &Query::default()).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s["sessionToken"] != token.as_str()));
        assert!(sessions.iter().any(|s| s["sessionToken"] == hash_token(&token).as_str()));

        let me = api_request(Method::GET, "/1/users/me", "")
            .with_header(SESSION_TOKEN_HEADER, &token);
        let (status, body) = call(&state, me.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "ann");

        let logout = api_request(Method::POST, "/1/logout", "")
            .with_header(SESSION_TOKEN_HEADER, &token);
        let (status, _) = call(&state, logout).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&state, me).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], codes::INVALID_SESSION_TOKEN);
    }

    #[tokio::test]
    async fn test_duplicate_username_and_bad_password() {
        let state = test_state("public", CloudRegistry::default());
        let body = r#"{"username":"bob","password":"secret"}"#;
        call(&state, api_request(Method::POST, "/1/users", body)).await;

        let (status, resp) = call(&state, api_request(Method::POST, "/1/users", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["code"], codes::USERNAME_TAKEN);

        let (status, _) = call(
            &state,
            api_request(Method::POST, "/1/login", r#"{"username":"bob","password":"nope"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing_password = api_request(Method::POST, "/1/users", r#"{"username":"c"}"#);
        let (status, _) = call(&state, missing_password).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_triggers_run_on_sign_up() {
        let mut builder = CloudRegistryBuilder::new();
        builder.before_save(
            "_User",
            handler_fn(|ctx: RequestContext| async move {
                let username = ctx.object().and_then(|o| o.get("username"));
                if username.and_then(Value::as_str) == Some("root") {
                    return Err(CloudError::application("reserved username"));
                }
                Ok(Value::Null)
            }),
        );
        let state = test_state("public", builder.build());

        let (status, resp) = call(
            &state,
            api_request(Method::POST, "/1/users", r#"{"username":"root","password":"pw"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "reserved username");
    }

    #[tokio::test]
    async fn test_user_triggers_never_see_password_hash() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = CloudRegistryBuilder::new();
        for event in [TriggerEvent::BeforeSave, TriggerEvent::AfterSave] {
            let seen = Arc::clone(&seen);
            builder.on(
                "_User",
                event,
                handler_fn(move |ctx: RequestContext| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let object = ctx.object().cloned().unwrap_or_default();
                        seen.lock().unwrap().push(object);
                        Ok(Value::Null)
                    }
                }),
            );
        }
        let state = test_state("public", builder.build());

        let (status, _) = call(
            &state,
            api_request(Method::POST, "/1/users", r#"{"username":"dee","password":"pw"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for object in seen.iter() {
            assert_eq!(object["username"], "dee");
            assert!(!object.contains_key(HASHED_PASSWORD_FIELD));
            assert!(!object.contains_key("password"));
        }
    }
}
