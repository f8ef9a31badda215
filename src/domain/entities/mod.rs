//! Identity and buffer types shared by the cache and the providers.

use std::sync::Arc;

/// A rendered thumbnail buffer.
///
/// Always square, side `size * device_scale`, RGBA with colors
/// premultiplied by alpha. Never mutated after creation; replacing a
/// frame means allocating a new one.
pub type Frame = Arc<image::RgbaImage>;

/// Stable identity of a peer (user, chat or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full identity of a story: the owning peer plus the story number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoryId {
    /// Peer the story belongs to.
    pub peer: PeerId,
    /// Story number within the peer.
    pub story: u64,
}

impl StoryId {
    /// Creates a story id.
    #[must_use]
    pub const fn new(peer: PeerId, story: u64) -> Self {
        Self { peer, story }
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.peer, self.story)
    }
}

/// Version token for a peer's current avatar content.
///
/// Changes whenever the underlying avatar image changes; compared, never
/// interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UserpicKey(pub u64);

/// Color set snapshot for one theme state.
///
/// Carried next to the monotonic palette version so themed glyphs
/// actually change pixels when the theme changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Fill behind synthesized glyphs.
    pub glyph_bg: image::Rgba<u8>,
    /// Foreground of synthesized glyphs.
    pub glyph_fg: image::Rgba<u8>,
    /// Accent used for avatar placeholder silhouettes.
    pub placeholder_fg: image::Rgba<u8>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            glyph_bg: image::Rgba([0x3f, 0xa2, 0xf7, 0xff]),
            glyph_fg: image::Rgba([0xff, 0xff, 0xff, 0xff]),
            placeholder_fg: image::Rgba([0xff, 0xff, 0xff, 0xff]),
        }
    }
}

/// Identity of a cacheable renderable: content id plus logical size.
///
/// The id string encodes the provider kind tag, the content identity and
/// any version component relevant to the render (palette version for
/// avatars, loading phase for stories).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    id: String,
    size: u32,
}

impl CacheKey {
    /// Creates a key from a formatted content id and a logical size.
    #[must_use]
    pub fn new(id: impl Into<String>, size: u32) -> Self {
        Self { id: id.into(), size }
    }

    /// The content id component.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The logical (pre-scale) size component.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.size)
    }
}
