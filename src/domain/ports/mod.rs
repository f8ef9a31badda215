//! Traits for the external collaborators of the thumbnail core.
//!
//! The core never fetches, decodes or stores original media itself; it
//! consumes these interfaces and renders derived thumbnails from whatever
//! they currently provide.

use std::sync::Arc;
use std::time::Instant;

use crate::domain::entities::{Palette, PeerId, UserpicKey};
use crate::infrastructure::events::{EventHandler, Registration};

/// Consumer callback fired on the coordinating thread when a provider's
/// buffer went stale and a fresh one is available.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

/// Self-contained copy of a peer's current avatar representation.
///
/// This is the only avatar data allowed to cross into a worker closure.
#[derive(Clone)]
pub enum AvatarSnapshot {
    /// Decoded avatar photo, any dimensions.
    Photo(Arc<image::RgbaImage>),
    /// No decoded photo; render a colored placeholder from the seed.
    Placeholder {
        /// Deterministic color selector, typically derived from the peer id.
        seed: u64,
    },
}

impl std::fmt::Debug for AvatarSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Photo(img) => f
                .debug_struct("Photo")
                .field("width", &img.width())
                .field("height", &img.height())
                .finish(),
            Self::Placeholder { seed } => {
                f.debug_struct("Placeholder").field("seed", seed).finish()
            }
        }
    }
}

/// Content and identity source for one peer's avatar.
pub trait AvatarSource: Send + Sync {
    /// Stable peer identity.
    fn peer_id(&self) -> PeerId;

    /// Version token for the current avatar content.
    fn userpic_key(&self) -> UserpicKey;

    /// True when a real photo is set on the profile, even if it has not
    /// finished downloading yet.
    fn has_photo(&self) -> bool;

    /// True when a decoded frame of the set photo is available.
    fn photo_ready(&self) -> bool;

    /// Copies the current representation for a worker closure.
    fn snapshot(&self) -> AvatarSnapshot;

    /// Attaches to the peer's avatar-changed stream.
    fn on_photo_changed(&self, handler: EventHandler) -> Registration;

    /// Attaches to the session-wide download-finished stream.
    fn on_download_finished(&self, handler: EventHandler) -> Registration;
}

/// Best currently available decoded frame for a story asset.
#[derive(Clone, Default)]
pub struct StoryFrame {
    /// Decoded frame, if any has arrived.
    pub frame: Option<Arc<image::RgbaImage>>,
    /// True when `frame` is only the low-quality inline preview.
    pub blurred: bool,
}

/// Media loader view over one story's photo or video asset.
///
/// `loaded` may trigger the actual fetch on first call; `release` drops
/// whatever the implementation holds for this story.
pub trait StoryMedia: Send + Sync {
    /// Returns the best frame known right now, requesting the asset if
    /// nothing was requested yet.
    fn loaded(&self) -> StoryFrame;

    /// Releases the media view held for this story.
    fn release(&self);

    /// Attaches to the session-wide download-finished stream.
    fn on_download_finished(&self, handler: EventHandler) -> Registration;
}

/// Paints a fixed vector glyph over a transparent square canvas.
pub trait IconPainter: Send + Sync {
    /// Paints into `canvas` (already sized and cleared) with the given
    /// palette colors.
    fn paint(&self, canvas: &mut image::RgbaImage, palette: &Palette);
}

/// Time-varying renderer for one custom emoji, bound to a repaint
/// callback at creation.
pub trait EmojiRenderer: Send {
    /// Paints the frame for `now` into `canvas` (already sized and
    /// cleared).
    fn paint(&mut self, canvas: &mut image::RgbaImage, now: Instant);
}

/// Produces [`EmojiRenderer`]s for serialized emoji descriptors.
pub trait EmojiRendererFactory: Send + Sync {
    /// Creates a renderer for `data`, wired to call `repaint` whenever a
    /// new animation frame wants a redraw.
    fn create(&self, data: &str, repaint: UpdateCallback) -> Box<dyn EmojiRenderer>;
}
