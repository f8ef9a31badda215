//! Fixed synthetic glyph thumbnails: icons and the themed placeholders.
//!
//! These renders are cheap and deterministic, so they happen in place on
//! the calling thread; the only staleness signal is the palette version.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::entities::Frame;
use crate::domain::ports::{IconPainter, UpdateCallback};
use crate::infrastructure::render::{self, GlyphKind};
use crate::providers::{DynamicImage, ThumbnailEnv};

struct Themed {
    frame: Option<Frame>,
    palette_version: u64,
}

impl Themed {
    const fn empty() -> Self {
        Self {
            frame: None,
            palette_version: 0,
        }
    }

    fn fresh(&self, px: u32, version: u64) -> Option<Frame> {
        let frame = self.frame.as_ref()?;
        (frame.width() == px && self.palette_version == version).then(|| frame.clone())
    }
}

/// Provider for one of the builtin placeholder glyphs (saved messages,
/// replies, hidden author).
pub struct GlyphThumbnail {
    env: Arc<ThumbnailEnv>,
    kind: GlyphKind,
    state: Mutex<Themed>,
}

impl GlyphThumbnail {
    pub(crate) fn new(env: Arc<ThumbnailEnv>, kind: GlyphKind) -> Self {
        Self {
            env,
            kind,
            state: Mutex::new(Themed::empty()),
        }
    }
}

impl DynamicImage for GlyphThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(self.env.clone(), self.kind))
    }

    fn image(&self, size: u32) -> Frame {
        let px = self.env.px(size).max(1);
        let version = self.env.theme().version();
        let mut state = self.state.lock();
        if let Some(frame) = state.fresh(px, version) {
            return frame;
        }
        let palette = self.env.theme().palette();
        let rendered = render::glyph(self.kind, px, &palette)
            .unwrap_or_else(|_| render::fallback_square(px));
        let frame: Frame = Arc::new(rendered);
        state.frame = Some(frame.clone());
        state.palette_version = version;
        frame
    }

    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>) {
        // Theme changes are picked up on the next call; there is nothing
        // to notify about in between, so only teardown matters here.
        if callback.is_none() {
            self.state.lock().frame = None;
        }
    }
}

/// Provider rendering a fixed vector glyph through an external painter.
pub struct IconThumbnail {
    env: Arc<ThumbnailEnv>,
    painter: Arc<dyn IconPainter>,
    state: Mutex<Themed>,
}

impl IconThumbnail {
    pub(crate) fn new(env: Arc<ThumbnailEnv>, painter: Arc<dyn IconPainter>) -> Self {
        Self {
            env,
            painter,
            state: Mutex::new(Themed::empty()),
        }
    }
}

impl DynamicImage for IconThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(self.env.clone(), self.painter.clone()))
    }

    fn image(&self, size: u32) -> Frame {
        let px = self.env.px(size).max(1);
        let version = self.env.theme().version();
        let mut state = self.state.lock();
        if let Some(frame) = state.fresh(px, version) {
            return frame;
        }
        let palette = self.env.theme().palette();
        let mut canvas =
            render::transparent_square(px).unwrap_or_else(|_| render::fallback_square(px));
        self.painter.paint(&mut canvas, &palette);
        let frame: Frame = Arc::new(canvas);
        state.frame = Some(frame.clone());
        state.palette_version = version;
        frame
    }

    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>) {
        if callback.is_none() {
            self.state.lock().frame = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Palette;
    use crate::infrastructure::pipeline::AsyncPipeline;
    use crate::infrastructure::theme::ThemeTracker;
    use test_case::test_case;

    fn env() -> Arc<ThumbnailEnv> {
        let (pipeline, _coordinator) = AsyncPipeline::new();
        Arc::new(ThumbnailEnv::new(pipeline, Arc::new(ThemeTracker::new())))
    }

    #[test_case(GlyphKind::SavedMessages; "saved messages")]
    #[test_case(GlyphKind::Replies; "replies")]
    #[test_case(GlyphKind::HiddenAuthor; "hidden author")]
    #[tokio::test]
    async fn test_glyph_renders_exact_size_and_caches_per_theme(kind: GlyphKind) {
        let env = env();
        let thumb = GlyphThumbnail::new(env.clone(), kind);
        let first = thumb.image(24);
        assert_eq!((first.width(), first.height()), (24, 24));
        assert!(Arc::ptr_eq(&first, &thumb.image(24)));
    }

    #[test_case(GlyphKind::SavedMessages; "saved messages")]
    #[test_case(GlyphKind::Replies; "replies")]
    #[test_case(GlyphKind::HiddenAuthor; "hidden author")]
    #[tokio::test]
    async fn test_glyph_rerenders_on_palette_change(kind: GlyphKind) {
        let env = env();
        let thumb = GlyphThumbnail::new(env.clone(), kind);
        let before = thumb.image(24);
        env.theme().set_palette(Palette {
            glyph_bg: image::Rgba([0x88, 0x11, 0x11, 0xff]),
            ..Palette::default()
        });
        let after = thumb.image(24);
        assert_ne!(before.as_raw(), after.as_raw());
    }

    #[tokio::test]
    async fn test_glyph_unsubscribe_clears_held_frame() {
        let thumb = GlyphThumbnail::new(env(), GlyphKind::Replies);
        let held = thumb.image(16);
        thumb.subscribe_to_updates(None);
        let fresh = thumb.image(16);
        assert!(!Arc::ptr_eq(&held, &fresh));
        assert_eq!(held.as_raw(), fresh.as_raw());
    }

    struct DotPainter;

    impl IconPainter for DotPainter {
        fn paint(&self, canvas: &mut image::RgbaImage, palette: &Palette) {
            let (cx, cy) = (canvas.width() / 2, canvas.height() / 2);
            canvas.put_pixel(cx, cy, palette.glyph_fg);
        }
    }

    #[tokio::test]
    async fn test_icon_paints_through_external_painter() {
        let env = env();
        let thumb = IconThumbnail::new(env.clone(), Arc::new(DotPainter));
        let frame = thumb.image(10);
        assert_eq!(frame.get_pixel(5, 5).0, [0xff, 0xff, 0xff, 0xff]);
        assert_eq!(frame.get_pixel(0, 0).0[3], 0);
    }

    #[tokio::test]
    async fn test_icon_follows_palette_version() {
        let env = env();
        let thumb = IconThumbnail::new(env.clone(), Arc::new(DotPainter));
        let before = thumb.image(10);
        env.theme().set_palette(Palette {
            glyph_fg: image::Rgba([0x00, 0xff, 0x00, 0xff]),
            ..Palette::default()
        });
        let after = thumb.image(10);
        assert_eq!(after.get_pixel(5, 5).0, [0x00, 0xff, 0x00, 0xff]);
        assert_ne!(before.as_raw(), after.as_raw());
    }
}
