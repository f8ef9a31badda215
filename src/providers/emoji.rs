//! Animated custom emoji thumbnails.
//!
//! Output varies with wall-clock time, so this provider repaints from
//! the bound renderer on every call and intentionally bypasses the
//! shared cache. The renderer is bound at subscription time; without one
//! the provider degrades to a transparent frame.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::domain::entities::Frame;
use crate::domain::ports::{EmojiRenderer, EmojiRendererFactory, UpdateCallback};
use crate::infrastructure::render;
use crate::providers::{DynamicImage, ThumbnailEnv};

/// Thumbnail provider for one custom emoji.
pub struct EmojiThumbnail {
    env: Arc<ThumbnailEnv>,
    factory: Arc<dyn EmojiRendererFactory>,
    data: String,
    renderer: Mutex<Option<Box<dyn EmojiRenderer>>>,
}

impl EmojiThumbnail {
    pub(crate) fn new(
        env: Arc<ThumbnailEnv>,
        factory: Arc<dyn EmojiRendererFactory>,
        data: String,
    ) -> Self {
        Self {
            env,
            factory,
            data,
            renderer: Mutex::new(None),
        }
    }
}

impl DynamicImage for EmojiThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(
            self.env.clone(),
            self.factory.clone(),
            self.data.clone(),
        ))
    }

    fn image(&self, size: u32) -> Frame {
        let px = self.env.px(size).max(1);
        let mut canvas =
            render::transparent_square(px).unwrap_or_else(|_| render::fallback_square(px));
        if let Some(renderer) = self.renderer.lock().as_mut() {
            renderer.paint(&mut canvas, Instant::now());
        }
        Arc::new(canvas)
    }

    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>) {
        let mut renderer = self.renderer.lock();
        match callback {
            // The renderer drives its own redraw timing through the
            // repaint callback it gets here.
            Some(repaint) => *renderer = Some(self.factory.create(&self.data, repaint)),
            None => *renderer = None,
        }
    }
}

impl std::fmt::Debug for EmojiThumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmojiThumbnail")
            .field("data", &self.data)
            .field("bound", &self.renderer.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pipeline::AsyncPipeline;
    use crate::infrastructure::theme::ThemeTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRenderer {
        frames_painted: Arc<AtomicUsize>,
    }

    impl EmojiRenderer for FakeRenderer {
        fn paint(&mut self, canvas: &mut image::RgbaImage, _now: Instant) {
            let frame = self.frames_painted.fetch_add(1, Ordering::SeqCst) as u8;
            let (cx, cy) = (canvas.width() / 2, canvas.height() / 2);
            canvas.put_pixel(cx, cy, image::Rgba([frame, 0, 0, 0xff]));
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        frames_painted: Arc<AtomicUsize>,
        repaint: Mutex<Option<UpdateCallback>>,
    }

    impl EmojiRendererFactory for FakeFactory {
        fn create(&self, _data: &str, repaint: UpdateCallback) -> Box<dyn EmojiRenderer> {
            *self.repaint.lock() = Some(repaint);
            Box::new(FakeRenderer {
                frames_painted: self.frames_painted.clone(),
            })
        }
    }

    fn env() -> Arc<ThumbnailEnv> {
        let (pipeline, _coordinator) = AsyncPipeline::new();
        Arc::new(ThumbnailEnv::new(pipeline, Arc::new(ThemeTracker::new())))
    }

    #[tokio::test]
    async fn test_unbound_renderer_degrades_to_transparent_frame() {
        let thumb = EmojiThumbnail::new(env(), Arc::new(FakeFactory::default()), "e1".into());
        let frame = thumb.image(12);
        assert_eq!((frame.width(), frame.height()), (12, 12));
        assert_eq!(frame.get_pixel(6, 6).0[3], 0);
    }

    #[tokio::test]
    async fn test_every_call_repaints_current_animation_frame() {
        let factory = Arc::new(FakeFactory::default());
        let thumb = EmojiThumbnail::new(env(), factory.clone(), "e2".into());
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        let first = thumb.image(12);
        let second = thumb.image(12);
        assert_eq!(factory.frames_painted.load(Ordering::SeqCst), 2);
        assert_eq!(first.get_pixel(6, 6).0[0], 0);
        assert_eq!(second.get_pixel(6, 6).0[0], 1);
    }

    #[tokio::test]
    async fn test_repaint_callback_reaches_consumer() {
        let factory = Arc::new(FakeFactory::default());
        let thumb = EmojiThumbnail::new(env(), factory.clone(), "e3".into());
        let redraws = Arc::new(AtomicUsize::new(0));
        let counted = redraws.clone();
        thumb.subscribe_to_updates(Some(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        })));
        let repaint = factory.repaint.lock().clone().unwrap();
        repaint();
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_renderer() {
        let factory = Arc::new(FakeFactory::default());
        let thumb = EmojiThumbnail::new(env(), factory.clone(), "e4".into());
        thumb.subscribe_to_updates(Some(Arc::new(|| {})));
        let _ = thumb.image(12);
        thumb.subscribe_to_updates(None);
        let frame = thumb.image(12);
        assert_eq!(frame.get_pixel(6, 6).0[3], 0);
        assert_eq!(factory.frames_painted.load(Ordering::SeqCst), 1);
    }
}
