//! Ordered route table.
//!
//! Entries are scanned in insertion order and the first entry whose method
//! and pattern both match wins. More specific patterns must therefore be
//! registered before any broader pattern that also matches their paths.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::context::RequestContext;
use super::pattern::PathPattern;
use crate::error::GatewayError;

/// Boxed future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<Response, GatewayError>>;

/// A type-erased route handler over shared state `S`.
pub type Handler<S> = Arc<dyn Fn(S, RequestContext) -> HandlerFuture + Send + Sync>;

/// Wraps an async function into a [`Handler`].
pub fn handler<S, F, Fut, R>(f: F) -> Handler<S>
where
    F: Fn(S, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, GatewayError>> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |state, ctx| {
        f(state, ctx)
            .map(|result| result.map(IntoResponse::into_response))
            .boxed()
    })
}

/// One `(method, pattern, handler)` entry.
pub struct RouteEntry<S> {
    method: Method,
    pattern: PathPattern,
    handler: Handler<S>,
}

impl<S> fmt::Debug for RouteEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// Result of a successful lookup.
pub struct RouteMatch<S> {
    /// Handler to invoke.
    pub handler: Handler<S>,
    /// Path captures, in pattern order.
    pub captures: Vec<String>,
    /// Pattern that matched, for logging.
    pub pattern: String,
}

impl<S> fmt::Debug for RouteMatch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("captures", &self.captures)
            .finish_non_exhaustive()
    }
}

/// Immutable once built; see the module docs for matching rules.
pub struct RouteTable<S> {
    entries: Vec<RouteEntry<S>>,
}

impl<S> fmt::Debug for RouteTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

impl<S> Default for RouteTable<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> RouteTable<S> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    #[must_use]
    pub fn route(mut self, method: Method, pattern: &str, handler: Handler<S>) -> Self {
        self.entries.push(RouteEntry {
            method,
            pattern: PathPattern::parse(pattern),
            handler,
        });
        self
    }

    /// Appends a `GET` entry.
    #[must_use]
    pub fn get(self, pattern: &str, handler: Handler<S>) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    /// Appends a `POST` entry.
    #[must_use]
    pub fn post(self, pattern: &str, handler: Handler<S>) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    /// Appends a `PUT` entry.
    #[must_use]
    pub fn put(self, pattern: &str, handler: Handler<S>) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    /// Finds the first entry matching `method` and `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no entry matches. A path that exists under
    /// another method is reported the same way.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<S>, GatewayError> {
        self.entries
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| {
                entry.pattern.matches(path).map(|captures| RouteMatch {
                    handler: Arc::clone(&entry.handler),
                    captures,
                    pattern: entry.pattern.to_string(),
                })
            })
            .ok_or_else(GatewayError::route_not_found)
    }

    /// Every method with an entry matching `path`, deduplicated, in table
    /// order.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for entry in &self.entries {
            if !methods.contains(&entry.method) && entry.pattern.matches(path).is_some() {
                methods.push(entry.method.clone());
            }
        }
        methods
    }

    /// Methods to advertise in a preflight for `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless `requested` is one of the allowed methods.
    pub fn preflight(
        &self,
        path: &str,
        requested: Option<&Method>,
    ) -> Result<Vec<Method>, GatewayError> {
        let methods = self.allowed_methods(path);
        match requested {
            Some(method) if methods.contains(method) => Ok(methods),
            _ => Err(GatewayError::route_not_found()),
        }
    }
}
