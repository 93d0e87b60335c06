//! The dispatch boundary.
//!
//! [`dispatch`] is mounted as the axum fallback, so every request passes
//! through it. Preflights are answered from the route table without
//! authentication. Everything else is authenticated first, then routed,
//! and the handler runs behind `catch_unwind` so that neither an error nor
//! a panic escapes without a well-formed envelope.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use axum::extract::{Query, Request, State};
use axum::http::header::ACCESS_CONTROL_REQUEST_METHOD;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use super::context::{LazyBody, RequestContext, resolve_current_user};
use crate::app_state::AppState;
use crate::error::GatewayError;

/// Axum fallback handler running the route table.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let origin = state.cors.origin_for(request.headers());

    if request.method() == Method::OPTIONS {
        let requested = request
            .headers()
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|value| Method::from_bytes(value.as_bytes()).ok());
        return match state.routes.preflight(request.uri().path(), requested.as_ref()) {
            Ok(methods) => state.cors.preflight(origin, &methods),
            Err(e) => {
                let mut response = e.into_response();
                state.cors.decorate(origin, &mut response);
                response
            }
        };
    }

    let mut response = handle(state.clone(), request)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    state.cors.decorate(origin, &mut response);
    response
}

async fn handle(state: AppState, request: Request) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    let query = parse_query(&parts.uri);

    let identity = state.auth.authenticate(&parts.headers, &query).await?;
    let route = state.routes.resolve(&parts.method, parts.uri.path())?;
    let current_user = resolve_current_user(state.store.as_ref(), &identity).await?;

    tracing::debug!(
        method = %parts.method,
        route = %route.pattern,
        %identity,
        registered = current_user.is_some(),
        "dispatching request"
    );

    let ctx = RequestContext::new(
        Some(identity),
        current_user,
        route.captures,
        query,
        LazyBody::new(body, state.config.max_body_bytes),
    );

    match AssertUnwindSafe((route.handler)(state, ctx))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(GatewayError::Internal(format!(
            "handler for {} {} panicked: {}",
            parts.method,
            route.pattern,
            panic_message(panic.as_ref())
        ))),
    }
}

/// Parses the query string; an unparseable one is treated as empty.
fn parse_query(uri: &Uri) -> HashMap<String, String> {
    match Query::<HashMap<String, String>>::try_from_uri(uri) {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed query string");
            HashMap::new()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing() {
        let uri: Uri = "/events?lastTs=1700000000&token=abc%20def".parse().unwrap_or_default();
        let query = parse_query(&uri);
        assert_eq!(query.get("lastTs").map(String::as_str), Some("1700000000"));
        assert_eq!(query.get("token").map(String::as_str), Some("abc def"));
        assert!(parse_query(&Uri::from_static("/rooms")).is_empty());
    }

    #[test]
    fn panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
