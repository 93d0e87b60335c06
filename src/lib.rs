//! # neon-gateway
//!
//! Authenticated HTTP gateway and live event stream for a small social
//! API of users, rooms and posts.
//!
//! Every request passes through one ordered route table: CORS preflights
//! are synthesized from it, everything else is authenticated with a bearer
//! token, routed first-match-wins, and answered with either the handler's
//! JSON or a `{ "error": … }` envelope. `GET /events` holds a
//! Server-Sent-Events connection open and streams post and user changes.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, EventSource)
//!     │
//!     ├── dispatch (routing/)  ── AuthGate (auth/)
//!     │     │
//!     │     ├── REST handlers (api/)
//!     │     └── StreamFanout (stream/) ── ChangeFeedAdapter
//!     │                │                        │
//!     │            EventBus (domain/) ◄─────────┘
//!     │
//!     └── DocumentStore (store/): memory or PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod routing;
pub mod store;
pub mod stream;
