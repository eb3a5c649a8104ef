//! Producers of push events for deployments without a realtime socket.

pub mod feed;
pub mod polling;

pub use feed::{FeedStats, JsonLinesFeed};
pub use polling::{PollOutcome, StatusPoller};
