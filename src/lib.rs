//! Oxithumb - asynchronous thumbnail rendering and caching.
//!
//! Produces small square bitmaps for heterogeneous chat content (peer
//! avatars, story previews, animated custom emoji, icons, synthetic
//! placeholders) while keeping expensive pixel generation off the thread
//! that owns UI state.
//!
//! A consumer asks a provider for [`DynamicImage::image`]; a fresh held
//! frame is returned as-is, a stale one triggers a cache lookup and, on
//! a miss, background regeneration through the [`AsyncPipeline`] while
//! the best currently-known frame is returned immediately. Finished
//! renders land in the shared [`ThumbnailCache`] and are delivered back
//! on the [`Coordinator`], the single thread that owns all provider and
//! subscription state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities and port definitions.
pub mod domain;
/// Infrastructure layer: cache, dispatch, events, theme, rasterizing.
pub mod infrastructure;
/// The `DynamicImage` capability and the provider variants.
pub mod providers;

pub use domain::entities::{CacheKey, Frame, Palette, PeerId, StoryId, UserpicKey};
pub use domain::ports::{
    AvatarSnapshot, AvatarSource, EmojiRenderer, EmojiRendererFactory, IconPainter, StoryFrame,
    StoryMedia, UpdateCallback,
};
pub use infrastructure::cache::{CacheCapacity, CacheStats, ThumbnailCache};
pub use infrastructure::events::{EventHandler, EventStream, Registration, Subsist};
pub use infrastructure::pipeline::{AsyncPipeline, Coordinator};
pub use infrastructure::theme::ThemeTracker;
pub use providers::{
    DynamicImage, StoryContent, ThumbnailEnv, emoji_thumbnail, empty_thumbnail,
    hidden_author_thumbnail, icon_thumbnail, replies_thumbnail, saved_messages_thumbnail,
    story_thumbnail, userpic_thumbnail,
};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
