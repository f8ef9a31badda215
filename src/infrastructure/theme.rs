//! Theme/palette staleness signal.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::domain::entities::Palette;

/// Tracks the current palette and a monotonically increasing version
/// counter bumped on every theme change.
///
/// Providers compare the version; the palette colors feed the synthesized
/// glyph renders.
pub struct ThemeTracker {
    version: AtomicU64,
    palette: Mutex<Palette>,
}

impl ThemeTracker {
    /// Creates a tracker at version 0 with the default palette.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            palette: Mutex::new(Palette::default()),
        }
    }

    /// Current palette version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Snapshot of the current palette colors.
    #[must_use]
    pub fn palette(&self) -> Palette {
        *self.palette.lock()
    }

    /// Installs a new palette and bumps the version.
    pub fn set_palette(&self, palette: Palette) {
        *self.palette.lock() = palette;
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for ThemeTracker {
    fn default() -> Self {
        Self::new()
    }
}
