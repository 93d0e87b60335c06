//! Request routing: patterns, the ordered route table, per-request context,
//! CORS headers, and the dispatch fallback that ties them together.

pub mod context;
pub mod cors;
pub mod dispatch;
pub mod pattern;
pub mod table;

pub use context::{LazyBody, RequestContext, resolve_current_user};
pub use cors::CorsPolicy;
pub use dispatch::dispatch;
pub use pattern::PathPattern;
pub use table::{Handler, HandlerFuture, RouteMatch, RouteTable, handler};
