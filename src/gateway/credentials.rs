//! Credential headers and password handling
//!
//! Turns `X-Application-Id`, `X-Master-Key` and `X-Session-Token` into the
//! caller identity carried by every request context.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::cloud::{codes, Caller, CloudError, CloudResult};
use crate::config::AppConfig;
use crate::http::AppRequest;
use crate::store::{Object, ObjectStore, Query};

pub const USER_CLASS: &str = "_User";
pub const SESSION_CLASS: &str = "_Session";

/// Field holding the Argon2id PHC string on `_User` objects
pub const HASHED_PASSWORD_FIELD: &str = "_hashed_password";

/// `_User` fields never shown to clients or trigger handlers
pub const SECRET_FIELDS: &[&str] = &[HASHED_PASSWORD_FIELD, "password"];

pub const APPLICATION_ID_HEADER: &str = "x-application-id";
pub const MASTER_KEY_HEADER: &str = "x-master-key";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
pub const INSTALLATION_ID_HEADER: &str = "x-installation-id";

/// Who is making the request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub master: bool,
    pub caller: Option<Caller>,
    /// `objectId` of the caller's `_Session` row
    pub session_id: Option<String>,
}

fn secure_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check the credential headers and resolve the caller
pub async fn authenticate(
    app: &AppConfig,
    store: &dyn ObjectStore,
    req: &AppRequest,
) -> CloudResult<Credentials> {
    let app_id_ok = req
        .header(APPLICATION_ID_HEADER)
        .is_some_and(|id| secure_eq(id, &app.app_id));
    if !app_id_ok {
        return Err(CloudError::forbidden("unauthorized"));
    }

    let master = match (req.header(MASTER_KEY_HEADER), app.master_key.as_deref()) {
        (None, _) => false,
        (Some(given), Some(expected)) if secure_eq(given, expected) => true,
        (Some(_), _) => return Err(CloudError::forbidden("unauthorized: invalid master key")),
    };

    let mut credentials = Credentials {
        master,
        ..Credentials::default()
    };
    if let Some(token) = req.header(SESSION_TOKEN_HEADER) {
        let (session_id, caller) = resolve_session(store, token).await?;
        credentials.session_id = Some(session_id);
        credentials.caller = Some(caller);
    }
    Ok(credentials)
}

fn invalid_session() -> CloudError {
    CloudError::Authorization {
        code: codes::INVALID_SESSION_TOKEN,
        message: "Invalid session token".to_string(),
    }
}

/// Look up a session token, returning the session id and its user.
///
/// Sessions only hold the token's hash, so the lookup is by hash.
async fn resolve_session(
    store: &dyn ObjectStore,
    token: &str,
) -> CloudResult<(String, Caller)> {
    let mut query = Query::default();
    query
        .equals
        .insert("sessionToken".to_string(), Value::String(hash_token(token)));
    query.limit = Some(1);

    let session = store
        .find(SESSION_CLASS, &query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(invalid_session)?;

    let session_id = string_field(&session, "objectId").ok_or_else(invalid_session)?;
    let user_id = string_field(&session, "user").ok_or_else(invalid_session)?;
    let user = store
        .get(USER_CLASS, &user_id)
        .await?
        .ok_or_else(invalid_session)?;

    Ok((
        session_id,
        Caller {
            user_id,
            username: string_field(&user, "username").unwrap_or_default(),
            session_token: token.to_string(),
        },
    ))
}

pub fn string_field(object: &Object, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// New opaque session token
pub fn new_session_token() -> String {
    format!("r:{}", random_string(32))
}

/// SHA-256 of a session token, the only form a `_Session` row stores
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash a password with Argon2id into a PHC string
pub fn hash_password(password: &str) -> CloudResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CloudError::Internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Replace a plain `password` field with its Argon2id hash
pub fn seal_password(fields: &mut Object) -> CloudResult<()> {
    match fields.remove("password") {
        None => Ok(()),
        Some(Value::String(password)) if !password.is_empty() => {
            fields.insert(
                HASHED_PASSWORD_FIELD.to_string(),
                Value::String(hash_password(&password)?),
            );
            Ok(())
        }
        Some(_) => Err(CloudError::application("password must be a non-empty string")),
    }
}

/// Strip secrets before an object leaves the server
pub fn sanitize(class_name: &str, mut object: Object) -> Object {
    if class_name == USER_CLASS {
        for field in SECRET_FIELDS {
            object.remove(*field);
        }
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use hyper::Method;
    use serde_json::json;

    fn app() -> AppConfig {
        crate::config::tests::test_config("public").app
    }

    fn request() -> AppRequest {
        AppRequest::new(Method::GET, "/1/classes/Todo")
            .with_header(APPLICATION_ID_HEADER, "test-app")
    }

    #[test]
    fn test_password_hash_is_argon2() {
        let stored = hash_password("hunter2").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert_ne!(stored, hash_password("hunter2").unwrap());
        assert!(!verify_password("hunter2", "salt$e82bc09a"));
    }

    #[test]
    fn test_hash_token() {
        let token = new_session_token();
        let hashed = hash_token(&token);
        assert_eq!(hashed.len(), 64);
        assert_ne!(hashed, token);
        assert_eq!(hashed, hash_token(&token));
    }

    #[test]
    fn test_seal_and_sanitize() {
        let mut fields = json!({"username": "ann", "password": "pw"})
            .as_object()
            .cloned()
            .unwrap();
        seal_password(&mut fields).unwrap();
        assert!(!fields.contains_key("password"));
        assert!(fields.contains_key(HASHED_PASSWORD_FIELD));

        let public = sanitize(USER_CLASS, fields);
        assert_eq!(public, json!({"username": "ann"}).as_object().cloned().unwrap());

        let mut bad = json!({"password": 5}).as_object().cloned().unwrap();
        assert!(seal_password(&mut bad).is_err());
    }

    #[tokio::test]
    async fn test_application_id_required() {
        let store = MemoryStore::new();
        let req = AppRequest::new(Method::GET, "/1/classes/Todo");
        let err = authenticate(&app(), &store, &req).await.unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);

        let req = req.with_header(APPLICATION_ID_HEADER, "other-app");
        assert!(authenticate(&app(), &store, &req).await.is_err());
    }

    #[tokio::test]
    async fn test_master_key() {
        let store = MemoryStore::new();
        let req = request().with_header(MASTER_KEY_HEADER, "master");
        let creds = authenticate(&app(), &store, &req).await.unwrap();
        assert!(creds.master);

        let creds = authenticate(&app(), &store, &request()).await.unwrap();
        assert!(!creds.master);

        let wrong = request().with_header(MASTER_KEY_HEADER, "guess");
        assert!(authenticate(&app(), &store, &wrong).await.is_err());
    }

    #[tokio::test]
    async fn test_session_resolution() {
        let store = MemoryStore::new();
        let user = store
            .create(USER_CLASS, json!({"username": "ann"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let user_id = string_field(&user, "objectId").unwrap();
        store
            .create(
                SESSION_CLASS,
                json!({"sessionToken": hash_token("r:abc"), "user": user_id})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        let req = request().with_header(SESSION_TOKEN_HEADER, "r:abc");
        let creds = authenticate(&app(), &store, &req).await.unwrap();
        let caller = creds.caller.unwrap();
        assert_eq!(caller.username, "ann");
        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.session_token, "r:abc");

        // the stored hash itself is not a usable token
        let stored = hash_token("r:abc");
        for token in ["r:nope", stored.as_str()] {
            let req = request().with_header(SESSION_TOKEN_HEADER, token);
            let err = authenticate(&app(), &store, &req).await.unwrap_err();
            assert_eq!(err.code(), codes::INVALID_SESSION_TOKEN);
        }
    }
}
