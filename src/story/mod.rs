// src/story/mod.rs
// Story Module - content model and feed assembly

mod feed;
mod types;

pub use feed::{eligible_groups, FeedError, FeedProvider, FeedSelection, JsonFeedProvider};
pub use types::{Story, UserStoryGroup};
