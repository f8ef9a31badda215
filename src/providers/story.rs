//! Story preview thumbnails (photo and video).
//!
//! Two-phase: while the asset's preview is still downloading, the best
//! available frame is the low-quality inline preview (blurred); once the
//! download finishes the provider adopts the final frame, fires its
//! staleness callback exactly once for that transition and detaches from
//! the loading stream.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::domain::entities::{CacheKey, Frame, StoryId};
use crate::domain::ports::{StoryMedia, UpdateCallback};
use crate::infrastructure::events::{Registration, Subsist};
use crate::infrastructure::render;
use crate::providers::{DynamicImage, ThumbnailEnv, load_cached_async};

/// Media content of a story, as handed to the factory.
pub enum StoryContent {
    /// No media; the factory yields the empty fallback provider.
    Empty,
    /// Photo story.
    Photo(Arc<dyn StoryMedia>),
    /// Video story; the loader supplies its best poster frame.
    Video(Arc<dyn StoryMedia>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    const fn tag(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

struct State {
    prepared: Option<Frame>,
    full: Option<Arc<image::RgbaImage>>,
    blurred: bool,
    callback: Option<UpdateCallback>,
    download: Option<Registration>,
    epoch: u64,
}

/// Thumbnail provider for one story's preview.
pub struct StoryThumbnail {
    env: Arc<ThumbnailEnv>,
    id: StoryId,
    kind: MediaKind,
    media: Arc<dyn StoryMedia>,
    state: Arc<Mutex<State>>,
}

impl StoryThumbnail {
    pub(crate) fn photo(env: Arc<ThumbnailEnv>, id: StoryId, media: Arc<dyn StoryMedia>) -> Self {
        Self::new(env, id, MediaKind::Photo, media)
    }

    pub(crate) fn video(env: Arc<ThumbnailEnv>, id: StoryId, media: Arc<dyn StoryMedia>) -> Self {
        Self::new(env, id, MediaKind::Video, media)
    }

    fn new(
        env: Arc<ThumbnailEnv>,
        id: StoryId,
        kind: MediaKind,
        media: Arc<dyn StoryMedia>,
    ) -> Self {
        Self {
            env,
            id,
            kind,
            media,
            state: Arc::new(Mutex::new(State {
                prepared: None,
                full: None,
                blurred: false,
                callback: None,
                download: None,
                epoch: 0,
            })),
        }
    }
}

fn deliver(weak: &Weak<Mutex<State>>, epoch: u64, frame: Frame) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.epoch != epoch {
        return;
    }
    state.prepared = Some(frame);
    let callback = state.callback.clone();
    drop(state);
    if let Some(callback) = callback {
        callback();
    }
}

impl DynamicImage for StoryThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(
            self.env.clone(),
            self.id,
            self.kind,
            self.media.clone(),
        ))
    }

    fn image(&self, size: u32) -> Frame {
        let px = self.env.px(size).max(1);
        {
            let state = self.state.lock();
            if let Some(prepared) = state.prepared.clone()
                && prepared.width() == px
            {
                return prepared;
            }
        }
        // A call may arrive before any subscription; pull the loader's
        // current view first so the phase tag and the source frame are
        // real instead of the zeroed initial state.
        if self.state.lock().full.is_none() {
            let thumb = self.media.loaded();
            let mut state = self.state.lock();
            if state.full.is_none() {
                state.full = thumb.frame;
                state.blurred = thumb.blurred;
            }
        }
        let mut state = self.state.lock();
        // Interim of the exact requested size until the crop arrives.
        state.prepared = Some(Arc::new(render::fallback_square(px)));
        let phase = if state.blurred { "blur" } else { "final" };
        let cache_key = CacheKey::new(
            format!("story:{}:{}:{}:{}", self.kind.tag(), self.id, size, phase),
            size,
        );
        let full = state.full.clone();
        let weak = Arc::downgrade(&self.state);
        let epoch = state.epoch;
        drop(state);
        load_cached_async(
            &self.env,
            cache_key,
            move || match full {
                None => render::opaque_square(px, render::FALLBACK_FILL),
                Some(frame) => {
                    let mut cropped = render::center_crop_scaled(&frame, px)?;
                    render::circle_mask(&mut cropped);
                    Ok(cropped)
                }
            },
            move |frame| deliver(&weak, epoch, frame),
        );
        let state = self.state.lock();
        state
            .prepared
            .clone()
            .unwrap_or_else(|| Arc::new(render::fallback_square(px)))
    }

    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>) {
        let Some(callback) = callback else {
            let mut state = self.state.lock();
            state.download = None;
            state.callback = None;
            state.prepared = None;
            state.full = None;
            state.blurred = false;
            state.epoch += 1;
            drop(state);
            self.media.release();
            return;
        };
        {
            let mut state = self.state.lock();
            // Tear the old watcher down before arming the new one.
            state.download = None;
            state.callback = Some(callback.clone());
            if state.full.is_some() && !state.blurred {
                return;
            }
        }
        let thumb = self.media.loaded();
        {
            let mut state = self.state.lock();
            state.full = thumb.frame;
            state.blurred = thumb.blurred;
            if !state.blurred {
                state.prepared = None;
                return;
            }
        }
        // Still blurred: watch the download stream until the final frame
        // arrives, then fire the transition callback exactly once.
        let registration = {
            let weak = Arc::downgrade(&self.state);
            let media = self.media.clone();
            self.media.on_download_finished(Box::new(move || {
                let thumb = media.loaded();
                if thumb.blurred {
                    return Subsist::Keep;
                }
                if let Some(state) = weak.upgrade() {
                    let mut state = state.lock();
                    state.full = thumb.frame;
                    state.prepared = None;
                    state.blurred = false;
                    let callback = state.callback.clone();
                    drop(state);
                    if let Some(callback) = callback {
                        callback();
                    }
                }
                Subsist::Stop
            }))
        };
        let mut state = self.state.lock();
        if state.callback.is_some() && state.blurred {
            state.download = Some(registration);
        }
    }
}

impl std::fmt::Debug for StoryThumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryThumbnail")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PeerId;
    use crate::domain::ports::StoryFrame;
    use crate::infrastructure::events::{EventHandler, EventStream};
    use crate::infrastructure::pipeline::{AsyncPipeline, Coordinator};
    use crate::infrastructure::theme::ThemeTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMedia {
        inline: Mutex<Option<Arc<image::RgbaImage>>>,
        full: Mutex<Option<Arc<image::RgbaImage>>>,
        released: Mutex<bool>,
        downloads: EventStream,
    }

    impl FakeMedia {
        fn mid_download() -> Arc<Self> {
            Arc::new(Self {
                inline: Mutex::new(Some(Arc::new(image::RgbaImage::from_pixel(
                    8,
                    8,
                    image::Rgba([0x80, 0x80, 0x80, 0xff]),
                )))),
                full: Mutex::new(None),
                released: Mutex::new(false),
                downloads: EventStream::new(),
            })
        }

        fn loaded_photo(side: u32) -> Arc<Self> {
            let media = Self::mid_download();
            *media.full.lock() = Some(Arc::new(image::RgbaImage::from_pixel(
                side,
                side,
                image::Rgba([0x20, 0xc0, 0x20, 0xff]),
            )));
            media
        }

        fn finish(&self, side: u32) {
            *self.full.lock() = Some(Arc::new(image::RgbaImage::from_pixel(
                side,
                side,
                image::Rgba([0x20, 0xc0, 0x20, 0xff]),
            )));
            self.downloads.fire();
        }
    }

    impl StoryMedia for FakeMedia {
        fn loaded(&self) -> StoryFrame {
            if let Some(full) = self.full.lock().clone() {
                StoryFrame {
                    frame: Some(full),
                    blurred: false,
                }
            } else {
                StoryFrame {
                    frame: self.inline.lock().clone(),
                    blurred: true,
                }
            }
        }

        fn release(&self) {
            *self.released.lock() = true;
        }

        fn on_download_finished(&self, handler: EventHandler) -> Registration {
            self.downloads.subscribe_boxed(handler)
        }
    }

    fn env_and_coordinator() -> (Arc<ThumbnailEnv>, Coordinator) {
        let (pipeline, coordinator) = AsyncPipeline::new();
        let env = Arc::new(ThumbnailEnv::new(pipeline, Arc::new(ThemeTracker::new())));
        (env, coordinator)
    }

    fn story_id() -> StoryId {
        StoryId::new(PeerId(9), 1)
    }

    #[tokio::test]
    async fn test_blurred_then_final_fires_transition_once() {
        let (env, mut coordinator) = env_and_coordinator();
        let media = FakeMedia::mid_download();
        let thumb = StoryThumbnail::video(env, story_id(), media.clone());
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        thumb.subscribe_to_updates(Some(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        })));
        let _ = thumb.image(20);
        assert!(coordinator.turn().await);
        let blurred = thumb.image(20);
        assert_eq!(blurred.get_pixel(10, 10).0, [0x80, 0x80, 0x80, 0xff]);
        let before = fired.load(Ordering::SeqCst);
        media.finish(40);
        assert_eq!(fired.load(Ordering::SeqCst), before + 1);
        let _ = thumb.image(20);
        assert!(coordinator.turn().await);
        let final_frame = thumb.image(20);
        assert_eq!(final_frame.get_pixel(10, 10).0, [0x20, 0xc0, 0x20, 0xff]);
        // Further download events are someone else's; the watcher is gone.
        let settled = fired.load(Ordering::SeqCst);
        media.downloads.fire();
        assert_eq!(fired.load(Ordering::SeqCst), settled);
        assert!(media.downloads.is_empty());
    }

    #[tokio::test]
    async fn test_already_loaded_photo_renders_final_directly() {
        let (env, mut coordinator) = env_and_coordinator();
        let media = FakeMedia::loaded_photo(64);
        let thumb = StoryThumbnail::photo(env, story_id(), media);
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        let _ = thumb.image(16);
        assert!(coordinator.turn().await);
        let frame = thumb.image(16);
        assert_eq!(frame.get_pixel(8, 8).0, [0x20, 0xc0, 0x20, 0xff]);
        // Circular mask: corners outside the disc are transparent.
        assert_eq!(frame.get_pixel(0, 0).0[3], 0);
    }

    #[tokio::test]
    async fn test_missing_media_degrades_to_black_square() {
        let (env, mut coordinator) = env_and_coordinator();
        let media = Arc::new(FakeMedia {
            inline: Mutex::new(None),
            full: Mutex::new(None),
            released: Mutex::new(false),
            downloads: EventStream::new(),
        });
        let thumb = StoryThumbnail::photo(env, story_id(), media);
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        let _ = thumb.image(12);
        assert!(coordinator.turn().await);
        let frame = thumb.image(12);
        assert_eq!((frame.width(), frame.height()), (12, 12));
        assert_eq!(frame.get_pixel(6, 6).0, [0, 0, 0, 0xff]);
    }

    #[tokio::test]
    async fn test_image_before_subscription_keeps_final_phase_clean() {
        let (env, mut coordinator) = env_and_coordinator();
        let media = FakeMedia::mid_download();
        let thumb = StoryThumbnail::photo(env, story_id(), media.clone());
        // Pre-subscription call: must render the blurred phase, not
        // store an empty render under the final-phase key.
        let early = thumb.image(16);
        assert_eq!((early.width(), early.height()), (16, 16));
        assert!(coordinator.turn().await);
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        media.finish(64);
        let _ = thumb.image(16);
        assert!(coordinator.turn().await);
        let final_frame = thumb.image(16);
        assert_eq!(final_frame.get_pixel(8, 8).0, [0x20, 0xc0, 0x20, 0xff]);
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_media_and_buffer() {
        let (env, mut coordinator) = env_and_coordinator();
        let media = FakeMedia::loaded_photo(32);
        let thumb = StoryThumbnail::photo(env, story_id(), media.clone());
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        let _ = thumb.image(16);
        assert!(coordinator.turn().await);
        let settled = thumb.image(16);
        assert_eq!(settled.get_pixel(8, 8).0, [0x20, 0xc0, 0x20, 0xff]);
        thumb.subscribe_to_updates(None);
        assert!(*media.released.lock());
        // Held buffer was released; the next call recomputes (through the
        // shared cache) instead of serving provider state.
        let fresh = thumb.image(16);
        assert_eq!((fresh.width(), fresh.height()), (16, 16));
    }
}
