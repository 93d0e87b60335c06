//! Live event streams.
//!
//! Each `/events` connection gets its own [`fanout::FanoutStream`]: bus
//! subscriptions for every event kind plus a
//! [`change_feed::ChangeFeedAdapter`] replaying store changes from the
//! client's cursor. Frames are written as Server-Sent Events.

pub mod change_feed;
pub mod fanout;
pub mod frame;
pub mod handler;

pub use change_feed::ChangeFeedAdapter;
pub use fanout::{ActiveStream, FanoutStream, Phase, Signal};
pub use frame::Frame;
pub use handler::events;
