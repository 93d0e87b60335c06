//! Domain layer: records, entities, and the event system.
//!
//! Users, rooms and posts are [`Stored`] records; the [`EventBus`] carries
//! [`DomainEvent`]s describing their changes to live streams.

pub mod event;
pub mod event_bus;
pub mod permission;
pub mod phone;
pub mod post;
pub mod record;
pub mod record_id;
pub mod room;
pub mod user;
pub mod validate;

pub use event::{ChangeKind, DeliveryError, DomainEvent, EventKind, FeedId};
pub use event_bus::{Deliver, EventBus, Subscription};
pub use permission::{Permission, PermissionType, PermissionView};
pub use phone::PhoneNumber;
pub use post::{Post, PostSection, PostView};
pub use record::{Collection, Document, Entity, Record, RecordView, Stored, View};
pub use record_id::RecordId;
pub use room::{Room, RoomView};
pub use user::{ProfileView, User, UserView};
