//! Thumbnail providers: the `DynamicImage` capability and its variants.
//!
//! A provider hands out the best currently-known frame synchronously and
//! regenerates stale frames off-thread through the shared pipeline;
//! consumers learn about fresh frames through the subscription callback,
//! which only ever fires on the coordinating thread.

mod avatar;
mod emoji;
mod glyphs;
mod story;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::entities::{CacheKey, Frame, StoryId};
use crate::domain::ports::{AvatarSource, EmojiRendererFactory, IconPainter, UpdateCallback};
use crate::infrastructure::cache::{CacheCapacity, ThumbnailCache};
use crate::infrastructure::pipeline::AsyncPipeline;
use crate::infrastructure::render::{self, RenderResult};
use crate::infrastructure::theme::ThemeTracker;

pub use avatar::UserpicThumbnail;
pub use emoji::EmojiThumbnail;
pub use glyphs::{GlyphThumbnail, IconThumbnail};
pub use story::{StoryContent, StoryThumbnail};

/// The capability every thumbnail provider implements.
///
/// `image` never blocks and never fails: it returns the best
/// currently-known frame, possibly stale or a placeholder, of exactly
/// `size * device_scale` pixels on each axis.
pub trait DynamicImage: Send {
    /// New provider with the same content identity but independent
    /// subscription state and buffer storage.
    fn clone_image(&self) -> Box<dyn DynamicImage>;

    /// Best currently-known frame for the requested logical size.
    fn image(&self, size: u32) -> Frame;

    /// Arms staleness notifications, or with `None` tears down all
    /// registrations and releases the held buffer immediately.
    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>);
}

/// Shared environment the providers render against.
///
/// The cache is shared between every provider created from the same
/// environment; sharing it application-wide means sharing the
/// environment itself.
pub struct ThumbnailEnv {
    cache: Arc<ThumbnailCache>,
    pipeline: AsyncPipeline,
    theme: Arc<ThemeTracker>,
    scale: u32,
}

impl ThumbnailEnv {
    /// Creates an environment with an unbounded cache and scale 1.
    #[must_use]
    pub fn new(pipeline: AsyncPipeline, theme: Arc<ThemeTracker>) -> Self {
        Self {
            cache: Arc::new(ThumbnailCache::default()),
            pipeline,
            theme,
            scale: 1,
        }
    }

    /// Replaces the default cache capacity policy.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: CacheCapacity) -> Self {
        self.cache = Arc::new(ThumbnailCache::new(capacity));
        self
    }

    /// Sets the device scale factor applied to every requested size.
    ///
    /// Zero is treated as 1.
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.max(1);
        self
    }

    /// The shared thumbnail cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// The theme tracker providers read versions and colors from.
    #[must_use]
    pub fn theme(&self) -> &Arc<ThemeTracker> {
        &self.theme
    }

    /// Device scale factor.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Pixel side for a logical size.
    pub(crate) const fn px(&self, size: u32) -> u32 {
        size.saturating_mul(self.scale)
    }
}

impl std::fmt::Debug for ThumbnailEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailEnv")
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Looks up `key` in the shared cache; on a hit `ready` runs
/// synchronously, on a miss `generate` runs on a worker, its result is
/// stored, and `ready` is delivered on the coordinating thread.
///
/// A fault inside `generate` (error or panic) degrades to an opaque
/// fallback square of the right size; no error ever leaves the worker.
pub(crate) fn load_cached_async(
    env: &ThumbnailEnv,
    key: CacheKey,
    generate: impl FnOnce() -> RenderResult<image::RgbaImage> + Send + 'static,
    ready: impl FnOnce(Frame) + Send + 'static,
) {
    if let Some(cached) = env.cache.get(&key) {
        ready(cached);
        return;
    }
    let px = key.size().saturating_mul(env.scale).max(1);
    let cache = env.cache.clone();
    env.pipeline.run_async(
        move || {
            let rendered = match catch_unwind(AssertUnwindSafe(generate)) {
                Ok(Ok(img)) => img,
                Ok(Err(err)) => {
                    warn!(key = %key, error = %err, "thumbnail generation degraded");
                    render::fallback_square(px)
                }
                Err(_) => {
                    warn!(key = %key, "thumbnail generation panicked");
                    render::fallback_square(px)
                }
            };
            let frame: Frame = Arc::new(rendered);
            cache.put(key, frame.clone());
            frame
        },
        ready,
    );
}

/// Fixed opaque black square, the content-agnostic fallback provider.
pub struct EmptyThumbnail {
    scale: u32,
    cached: Mutex<Option<Frame>>,
}

impl EmptyThumbnail {
    fn new(scale: u32) -> Self {
        Self {
            scale,
            cached: Mutex::new(None),
        }
    }
}

impl DynamicImage for EmptyThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(self.scale))
    }

    fn image(&self, size: u32) -> Frame {
        let px = size.saturating_mul(self.scale).max(1);
        let mut cached = self.cached.lock();
        if let Some(frame) = cached.as_ref()
            && frame.width() == px
        {
            return frame.clone();
        }
        let frame: Frame = Arc::new(render::fallback_square(px));
        *cached = Some(frame.clone());
        frame
    }

    fn subscribe_to_updates(&self, _callback: Option<UpdateCallback>) {}
}

/// Thumbnail of a peer's avatar, real or synthesized.
#[must_use]
pub fn userpic_thumbnail(
    env: &Arc<ThumbnailEnv>,
    source: Arc<dyn AvatarSource>,
    force_round: bool,
) -> Box<dyn DynamicImage> {
    Box::new(UserpicThumbnail::new(env.clone(), source, force_round))
}

/// Thumbnail of a story's preview, by its media content.
#[must_use]
pub fn story_thumbnail(
    env: &Arc<ThumbnailEnv>,
    id: StoryId,
    content: StoryContent,
) -> Box<dyn DynamicImage> {
    match content {
        StoryContent::Empty => Box::new(EmptyThumbnail::new(env.scale)),
        StoryContent::Photo(media) => {
            Box::new(StoryThumbnail::photo(env.clone(), id, media))
        }
        StoryContent::Video(media) => {
            Box::new(StoryThumbnail::video(env.clone(), id, media))
        }
    }
}

/// Fixed opaque black square provider.
#[must_use]
pub fn empty_thumbnail(env: &Arc<ThumbnailEnv>) -> Box<dyn DynamicImage> {
    Box::new(EmptyThumbnail::new(env.scale))
}

/// The saved-messages glyph provider.
#[must_use]
pub fn saved_messages_thumbnail(env: &Arc<ThumbnailEnv>) -> Box<dyn DynamicImage> {
    Box::new(GlyphThumbnail::new(
        env.clone(),
        render::GlyphKind::SavedMessages,
    ))
}

/// The replies glyph provider.
#[must_use]
pub fn replies_thumbnail(env: &Arc<ThumbnailEnv>) -> Box<dyn DynamicImage> {
    Box::new(GlyphThumbnail::new(env.clone(), render::GlyphKind::Replies))
}

/// The hidden-author glyph provider.
#[must_use]
pub fn hidden_author_thumbnail(env: &Arc<ThumbnailEnv>) -> Box<dyn DynamicImage> {
    Box::new(GlyphThumbnail::new(
        env.clone(),
        render::GlyphKind::HiddenAuthor,
    ))
}

/// Fixed vector icon provider.
#[must_use]
pub fn icon_thumbnail(
    env: &Arc<ThumbnailEnv>,
    painter: Arc<dyn IconPainter>,
) -> Box<dyn DynamicImage> {
    Box::new(IconThumbnail::new(env.clone(), painter))
}

/// Animated custom emoji provider.
#[must_use]
pub fn emoji_thumbnail(
    env: &Arc<ThumbnailEnv>,
    factory: Arc<dyn EmojiRendererFactory>,
    data: impl Into<String>,
) -> Box<dyn DynamicImage> {
    Box::new(EmojiThumbnail::new(env.clone(), factory, data.into()))
}
