//! Request bodies accepted by the REST endpoints.
//!
//! Every field is optional at the serde level so that a missing field is
//! reported by domain validation with its specific message instead of a
//! generic body error.

pub mod post_dto;
pub mod profile_dto;
pub mod room_dto;

pub use post_dto::*;
pub use profile_dto::*;
pub use room_dto::*;
