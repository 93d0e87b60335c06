//! Per-request context handed to route handlers.
//!
//! A [`RequestContext`] is built once per request after authentication and
//! routing, and is owned by that request's handler. The body is read lazily:
//! nothing is consumed until a handler asks for it, and every later call
//! returns the same parsed value (or the same error).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use axum::body::Body;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::domain::user::PHONE_NUMBER_FIELD;
use crate::domain::{PhoneNumber, Stored, User};
use crate::error::GatewayError;
use crate::store::typed;
use crate::store::{DocumentStore, Query};

/// Client-facing message for unreadable or non-JSON bodies.
const INVALID_BODY: &str = "Invalid request body";

/// Request body that is read and parsed at most once.
pub struct LazyBody {
    raw: Mutex<Option<Body>>,
    parsed: OnceCell<Result<Value, String>>,
    limit: usize,
}

impl fmt::Debug for LazyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBody")
            .field("read", &self.parsed.initialized())
            .field("limit", &self.limit)
            .finish()
    }
}

impl LazyBody {
    /// Wraps an unread body, refusing more than `limit` bytes.
    #[must_use]
    pub fn new(body: Body, limit: usize) -> Self {
        Self {
            raw: Mutex::new(Some(body)),
            parsed: OnceCell::new(),
            limit,
        }
    }

    /// A body with no content.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Body::empty(), 0)
    }

    /// Reads and parses the body on first call; later calls return the
    /// memoized result.
    ///
    /// An empty body parses as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if the body is too large
    /// or is not JSON.
    pub async fn read(&self) -> Result<&Value, GatewayError> {
        let parsed = self
            .parsed
            .get_or_init(|| async {
                let body = self
                    .raw
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match body {
                    Some(body) => parse(body, self.limit).await,
                    None => Err("request body already consumed".to_string()),
                }
            })
            .await;
        parsed.as_ref().map_err(|reason| {
            tracing::debug!(%reason, "rejected request body");
            GatewayError::InvalidArgument(INVALID_BODY.to_string())
        })
    }
}

async fn parse(body: Body, limit: usize) -> Result<Value, String> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| e.to_string())?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

/// Everything a handler knows about its request.
#[derive(Debug)]
pub struct RequestContext {
    identity: Option<PhoneNumber>,
    current_user: Option<Stored<User>>,
    captures: Vec<String>,
    query: HashMap<String, String>,
    body: LazyBody,
}

impl RequestContext {
    /// Assembles a context.
    #[must_use]
    pub const fn new(
        identity: Option<PhoneNumber>,
        current_user: Option<Stored<User>>,
        captures: Vec<String>,
        query: HashMap<String, String>,
        body: LazyBody,
    ) -> Self {
        Self {
            identity,
            current_user,
            captures,
            query,
            body,
        }
    }

    /// Verified identity of the caller.
    #[must_use]
    pub const fn identity(&self) -> Option<&PhoneNumber> {
        self.identity.as_ref()
    }

    /// Verified identity, for handlers that only run behind the gate.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if the context was built
    /// without an identity.
    pub fn require_identity(&self) -> Result<&PhoneNumber, GatewayError> {
        self.identity.as_ref().ok_or(GatewayError::Unauthorized)
    }

    /// The caller's user record, if registered.
    #[must_use]
    pub const fn current_user(&self) -> Option<&Stored<User>> {
        self.current_user.as_ref()
    }

    /// The caller's user record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PermissionDenied`] if the caller has not
    /// registered a profile yet.
    pub fn require_user(&self) -> Result<&Stored<User>, GatewayError> {
        self.current_user
            .as_ref()
            .ok_or_else(|| GatewayError::PermissionDenied("Profile required".to_string()))
    }

    /// Path captures, in pattern order.
    #[must_use]
    pub fn captures(&self) -> &[String] {
        &self.captures
    }

    /// The `index`-th path capture.
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// A query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// The parsed JSON body. See [`LazyBody::read`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] for unreadable bodies.
    pub async fn body(&self) -> Result<&Value, GatewayError> {
        self.body.read().await
    }

    /// The body deserialized as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if the body is unreadable
    /// or does not have the shape of `T`.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        let value = self.body().await?;
        T::deserialize(value).map_err(|e| {
            tracing::debug!(error = %e, "request body has the wrong shape");
            GatewayError::InvalidArgument(INVALID_BODY.to_string())
        })
    }

    #[cfg(test)]
    pub(crate) fn for_test(captures: Vec<String>) -> Self {
        Self::new(None, None, captures, HashMap::new(), LazyBody::empty())
    }
}

/// Looks up the user registered under `identity`.
///
/// More than one match is a data-integrity problem; the first is used.
///
/// # Errors
///
/// Returns a store error if the lookup fails.
pub async fn resolve_current_user(
    store: &dyn DocumentStore,
    identity: &PhoneNumber,
) -> Result<Option<Stored<User>>, GatewayError> {
    let query = Query::new().filter(PHONE_NUMBER_FIELD, identity.as_str());
    let users = typed::find::<User>(store, &query).await?;
    if users.len() > 1 {
        tracing::warn!(
            %identity,
            count = users.len(),
            "several users share one phone number, using the first"
        );
    }
    Ok(users.into_iter().next())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn context(body: &'static str) -> RequestContext {
        RequestContext::new(
            None,
            None,
            vec!["abc".into()],
            HashMap::from([("q".to_string(), "1".to_string())]),
            LazyBody::new(Body::from(body), 1024),
        )
    }

    #[tokio::test]
    async fn body_is_memoized() {
        let ctx = context(r#"{"name":"lobby"}"#);
        let Ok(first) = ctx.body().await.map(Clone::clone) else {
            panic!("body should parse");
        };
        let Ok(second) = ctx.body().await else {
            panic!("second read should return the cached value");
        };
        assert_eq!(&first, second);
        assert_eq!(second.get("name"), Some(&Value::from("lobby")));
    }

    #[tokio::test]
    async fn invalid_body_error_is_memoized() {
        let ctx = context("{not json");
        assert!(matches!(ctx.body().await, Err(GatewayError::InvalidArgument(_))));
        assert!(matches!(ctx.body().await, Err(GatewayError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_object() {
        let ctx = context("");
        let Ok(value) = ctx.body().await else {
            panic!("empty body should parse");
        };
        assert_eq!(value, &serde_json::json!({}));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let ctx = RequestContext::new(
            None,
            None,
            vec![],
            HashMap::new(),
            LazyBody::new(Body::from("x".repeat(64)), 8),
        );
        assert!(matches!(ctx.body().await, Err(GatewayError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn typed_body_and_params() {
        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }
        let ctx = context(r#"{"name":"lobby"}"#);
        let Ok(named) = ctx.json::<Named>().await else {
            panic!("typed body should parse");
        };
        assert_eq!(named.name, "lobby");
        assert_eq!(ctx.capture(0), Some("abc"));
        assert_eq!(ctx.capture(1), None);
        assert_eq!(ctx.param("q"), Some("1"));
        assert!(matches!(
            ctx.require_user(),
            Err(GatewayError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn resolves_user_by_phone_number() {
        let store = MemoryStore::default();
        let Some(phone) = PhoneNumber::parse("+15550100") else {
            panic!("valid phone");
        };
        assert!(matches!(resolve_current_user(&store, &phone).await, Ok(None)));

        let Ok(user) = User::register(phone.clone(), Some("neo".into()), Some("a.png".into()))
        else {
            panic!("valid user");
        };
        let _ = typed::save(&store, &user).await;
        let Ok(Some(found)) = resolve_current_user(&store, &phone).await else {
            panic!("user expected");
        };
        assert_eq!(found.id(), user.id());
    }
}
