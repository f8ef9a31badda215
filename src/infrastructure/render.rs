//! Raster helpers for synthesized thumbnails.
//!
//! Everything here produces square RGBA buffers with colors
//! premultiplied by alpha. Faults surface as [`RenderError`] and are
//! converted to a placeholder frame by the caller; nothing here reaches
//! a consumer as an error.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage, imageops};

use crate::domain::entities::Palette;

/// Faults inside a generation routine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// The requested pixel size was zero.
    #[error("requested zero-sized thumbnail")]
    ZeroSize,
    /// The source frame had no pixels to crop from.
    #[error("source frame is empty")]
    EmptySource,
}

/// Result type for render routines.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Opaque black, the content-agnostic fallback fill.
pub const FALLBACK_FILL: Rgba<u8> = Rgba([0, 0, 0, 0xff]);

/// Gradient pairs for colored avatar placeholders, picked by seed.
const PLACEHOLDER_GRADIENTS: [(Rgba<u8>, Rgba<u8>); 7] = [
    (Rgba([0xff, 0x88, 0x5e, 0xff]), Rgba([0xff, 0x51, 0x6a, 0xff])),
    (Rgba([0xff, 0xcd, 0x6a, 0xff]), Rgba([0xff, 0xa8, 0x5c, 0xff])),
    (Rgba([0x82, 0xb1, 0xff, 0xff]), Rgba([0x66, 0x5f, 0xff, 0xff])),
    (Rgba([0xa0, 0xde, 0x7e, 0xff]), Rgba([0x54, 0xcb, 0x68, 0xff])),
    (Rgba([0x53, 0xed, 0xd6, 0xff]), Rgba([0x28, 0xc9, 0xb7, 0xff])),
    (Rgba([0x72, 0xd5, 0xfd, 0xff]), Rgba([0x2a, 0x9e, 0xf1, 0xff])),
    (Rgba([0xe0, 0xa2, 0xf3, 0xff]), Rgba([0xd6, 0x69, 0xed, 0xff])),
];

/// An opaque square of one color.
pub fn opaque_square(px: u32, color: Rgba<u8>) -> RenderResult<RgbaImage> {
    if px == 0 {
        return Err(RenderError::ZeroSize);
    }
    Ok(RgbaImage::from_pixel(px, px, color))
}

/// A fully transparent square.
pub fn transparent_square(px: u32) -> RenderResult<RgbaImage> {
    if px == 0 {
        return Err(RenderError::ZeroSize);
    }
    Ok(RgbaImage::from_pixel(px, px, Rgba([0, 0, 0, 0])))
}

/// The fallback frame used when generation itself faults. Infallible.
#[must_use]
pub fn fallback_square(px: u32) -> RgbaImage {
    RgbaImage::from_pixel(px.max(1), px.max(1), FALLBACK_FILL)
}

/// Center-crops the source to a square and scales it to `px`.
pub fn center_crop_scaled(src: &RgbaImage, px: u32) -> RenderResult<RgbaImage> {
    if px == 0 {
        return Err(RenderError::ZeroSize);
    }
    let (w, h) = (src.width(), src.height());
    if w == 0 || h == 0 {
        return Err(RenderError::EmptySource);
    }
    let cropped = if h >= w {
        imageops::crop_imm(src, 0, (h - w) / 2, w, w).to_image()
    } else {
        imageops::crop_imm(src, (w - h) / 2, 0, h, h).to_image()
    };
    Ok(imageops::resize(&cropped, px, px, FilterType::Lanczos3))
}

/// Multiplies every channel by an antialiased circular coverage mask.
///
/// Input colors are premultiplied, so alpha and color channels scale
/// together.
pub fn circle_mask(img: &mut RgbaImage) {
    let side = img.width().min(img.height());
    let radius = side as f32 / 2.0;
    let (cx, cy) = (img.width() as f32 / 2.0, img.height() as f32 / 2.0);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let coverage = (radius - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
        if coverage < 1.0 {
            for channel in &mut pixel.0 {
                *channel = (f32::from(*channel) * coverage) as u8;
            }
        }
    }
}

/// Multiplies every channel by a rounded-rectangle coverage mask.
pub fn rounded_mask(img: &mut RgbaImage, corner_radius: f32) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let r = corner_radius.clamp(0.0, w.min(h) / 2.0);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        let dx = (r - px).max(px - (w - r)).max(0.0);
        let dy = (r - py).max(py - (h - r)).max(0.0);
        let coverage = (r - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
        if coverage < 1.0 {
            for channel in &mut pixel.0 {
                *channel = (f32::from(*channel) * coverage) as u8;
            }
        }
    }
}

/// Composites `color` over the canvas wherever `coverage` is positive.
///
/// `coverage` receives coordinates normalized to `0.0..1.0` on both axes
/// and returns opacity in the same range. Premultiplied source-over.
fn stamp(img: &mut RgbaImage, color: Rgba<u8>, coverage: impl Fn(f32, f32) -> f32) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let c = coverage((x as f32 + 0.5) / w, (y as f32 + 0.5) / h).clamp(0.0, 1.0);
        if c <= 0.0 {
            continue;
        }
        let src_a = f32::from(color.0[3]) * c / 255.0;
        for i in 0..4 {
            let src = f32::from(color.0[i]) * c;
            let dst = f32::from(pixel.0[i]);
            pixel.0[i] = (src + dst * (1.0 - src_a)).min(255.0) as u8;
        }
    }
}

fn disc_coverage(x: f32, y: f32, cx: f32, cy: f32, r: f32) -> f32 {
    let dx = x - cx;
    let dy = y - cy;
    // Edge softness of roughly one percent of the canvas.
    ((r - (dx * dx + dy * dy).sqrt()) / 0.01 + 0.5).clamp(0.0, 1.0)
}

/// A vertical gradient disc, the base of every colored placeholder.
pub fn gradient_disc(px: u32, top: Rgba<u8>, bottom: Rgba<u8>) -> RenderResult<RgbaImage> {
    if px == 0 {
        return Err(RenderError::ZeroSize);
    }
    let mut img = RgbaImage::new(px, px);
    for (_, y, pixel) in img.enumerate_pixels_mut() {
        let t = y as f32 / px.max(1) as f32;
        for i in 0..4 {
            pixel.0[i] =
                (f32::from(top.0[i]) * (1.0 - t) + f32::from(bottom.0[i]) * t) as u8;
        }
    }
    circle_mask(&mut img);
    Ok(img)
}

/// Gradient pair for an avatar placeholder seed.
#[must_use]
pub fn placeholder_gradient(seed: u64) -> (Rgba<u8>, Rgba<u8>) {
    PLACEHOLDER_GRADIENTS[(seed % PLACEHOLDER_GRADIENTS.len() as u64) as usize]
}

fn person_coverage(x: f32, y: f32) -> f32 {
    let head = disc_coverage(x, y, 0.5, 0.38, 0.16);
    let torso = if y <= 0.93 {
        disc_coverage(x, y, 0.5, 0.95, 0.28)
    } else {
        0.0
    };
    head.max(torso)
}

/// Colored placeholder avatar: gradient disc plus a person silhouette.
pub fn avatar_placeholder(px: u32, seed: u64, palette: &Palette) -> RenderResult<RgbaImage> {
    let (top, bottom) = placeholder_gradient(seed);
    let mut img = gradient_disc(px, top, bottom)?;
    stamp(&mut img, palette.placeholder_fg, person_coverage);
    circle_mask(&mut img);
    Ok(img)
}

/// Kind tag for the fixed synthetic glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphKind {
    /// Bookmark over an accent disc.
    SavedMessages,
    /// Left-pointing reply arrow over an accent disc.
    Replies,
    /// Anonymous person silhouette over an accent disc.
    HiddenAuthor,
}

impl GlyphKind {
    /// Short tag used in logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SavedMessages => "saved-messages",
            Self::Replies => "replies",
            Self::HiddenAuthor => "hidden-author",
        }
    }
}

fn bookmark_coverage(x: f32, y: f32) -> f32 {
    if !(0.36..=0.64).contains(&x) || !(0.28..=0.74).contains(&y) {
        return 0.0;
    }
    // Triangular notch cut upward into the bottom edge.
    let notch_depth = 0.12 - (x - 0.5).abs() * 0.86;
    if y > 0.74 - notch_depth.max(0.0) {
        return 0.0;
    }
    1.0
}

fn reply_arrow_coverage(x: f32, y: f32) -> f32 {
    // Triangle head pointing left.
    let head: f32 = if (0.26..=0.46).contains(&x) {
        let half_height = (x - 0.26) / (0.46 - 0.26) * 0.18;
        if (y - 0.44).abs() <= half_height { 1.0 } else { 0.0 }
    } else {
        0.0
    };
    // Curved tail approximated with a thick diagonal band.
    let tail_center = 0.44 + (x - 0.42) * 0.55;
    let tail = if (0.42..=0.74).contains(&x) && (y - tail_center).abs() <= 0.055 {
        1.0
    } else {
        0.0
    };
    head.max(tail)
}

/// Renders one of the fixed synthetic glyphs at `px`.
pub fn glyph(kind: GlyphKind, px: u32, palette: &Palette) -> RenderResult<RgbaImage> {
    let mut img = gradient_disc(px, palette.glyph_bg, palette.glyph_bg)?;
    let coverage = match kind {
        GlyphKind::SavedMessages => bookmark_coverage,
        GlyphKind::Replies => reply_arrow_coverage,
        GlyphKind::HiddenAuthor => person_coverage,
    };
    stamp(&mut img, palette.glyph_fg, coverage);
    circle_mask(&mut img);
    Ok(img)
}

/// Scales a decoded photo to a `px` square, center-cropping first.
pub fn avatar_photo(src: &RgbaImage, px: u32, round: bool) -> RenderResult<RgbaImage> {
    let mut img = center_crop_scaled(src, px)?;
    if round {
        circle_mask(&mut img);
    } else {
        rounded_mask(&mut img, px as f32 / 4.0);
    }
    Ok(img)
}
