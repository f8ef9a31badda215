//! Peer avatar thumbnails.
//!
//! Renders either the real avatar photo or a generated colored
//! placeholder. While the real photo is pending download the provider
//! attaches to the download-finished stream and re-checks on every event
//! until the photo is ready, then detaches.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::domain::entities::{CacheKey, Frame, UserpicKey};
use crate::domain::ports::{AvatarSnapshot, AvatarSource, UpdateCallback};
use crate::infrastructure::events::{Registration, Subsist};
use crate::infrastructure::render;
use crate::providers::{DynamicImage, ThumbnailEnv, load_cached_async};

struct Subscribed {
    callback: UpdateCallback,
    _photo_changes: Registration,
    download: Option<Registration>,
}

struct State {
    frame: Option<Frame>,
    key: Option<UserpicKey>,
    palette_version: u64,
    subscribed: Option<Subscribed>,
    // Bumped on unsubscribe; in-flight deliveries carry the epoch they
    // were scheduled under and no-op on mismatch.
    epoch: u64,
}

/// Thumbnail provider for one peer's avatar.
pub struct UserpicThumbnail {
    env: Arc<ThumbnailEnv>,
    source: Arc<dyn AvatarSource>,
    force_round: bool,
    state: Arc<Mutex<State>>,
}

impl UserpicThumbnail {
    pub(crate) fn new(
        env: Arc<ThumbnailEnv>,
        source: Arc<dyn AvatarSource>,
        force_round: bool,
    ) -> Self {
        Self {
            env,
            source,
            force_round,
            state: Arc::new(Mutex::new(State {
                frame: None,
                key: None,
                palette_version: 0,
                subscribed: None,
                epoch: 0,
            })),
        }
    }
}

fn waiting_photo_load(source: &dyn AvatarSource) -> bool {
    source.has_photo() && !source.photo_ready()
}

fn deliver(weak: &Weak<Mutex<State>>, epoch: u64, frame: Frame) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.epoch != epoch {
        return;
    }
    state.frame = Some(frame);
    let callback = state.subscribed.as_ref().map(|sub| sub.callback.clone());
    drop(state);
    if let Some(callback) = callback {
        callback();
    }
}

/// Attaches or detaches the download-finished registration depending on
/// whether a set photo is still pending.
fn process_new_photo(source: &Arc<dyn AvatarSource>, state: &Arc<Mutex<State>>) {
    let waiting = waiting_photo_load(source.as_ref());
    {
        let mut locked = state.lock();
        let Some(subscribed) = locked.subscribed.as_mut() else {
            return;
        };
        if !waiting {
            subscribed.download = None;
            return;
        }
        if subscribed.download.is_some() {
            return;
        }
    }
    // Register outside the state lock; the handler locks state itself.
    let callback = {
        let locked = state.lock();
        match locked.subscribed.as_ref() {
            Some(subscribed) => subscribed.callback.clone(),
            None => return,
        }
    };
    let watched = source.clone();
    let registration = source.on_download_finished(Box::new(move || {
        if waiting_photo_load(watched.as_ref()) {
            return Subsist::Keep;
        }
        callback();
        Subsist::Stop
    }));
    let mut locked = state.lock();
    if let Some(subscribed) = locked.subscribed.as_mut()
        && subscribed.download.is_none()
    {
        subscribed.download = Some(registration);
    }
}

impl DynamicImage for UserpicThumbnail {
    fn clone_image(&self) -> Box<dyn DynamicImage> {
        Box::new(Self::new(
            self.env.clone(),
            self.source.clone(),
            self.force_round,
        ))
    }

    fn image(&self, size: u32) -> Frame {
        let px = self.env.px(size).max(1);
        let mut state = self.state.lock();
        let good = state.frame.as_ref().is_some_and(|f| f.width() == px);
        let key_now = self.source.userpic_key();
        let palette_version = self.env.theme().version();
        let placeholder = !self.source.photo_ready();
        let stale = !good
            || (state.palette_version != palette_version && placeholder)
            || (state.key != Some(key_now) && !waiting_photo_load(self.source.as_ref()));
        if !stale && let Some(frame) = state.frame.clone() {
            return frame;
        }
        state.key = Some(key_now);
        state.palette_version = palette_version;
        let seed = self.source.peer_id().0;
        if !good {
            // Immediate interim so the very first call already returns a
            // frame of the exact requested pixel size.
            let (top, bottom) = render::placeholder_gradient(seed);
            let interim = render::gradient_disc(px, top, bottom)
                .unwrap_or_else(|_| render::fallback_square(px));
            state.frame = Some(Arc::new(interim));
        }
        let cache_key = CacheKey::new(
            format!(
                "peer:{}:{}:{}:{}:{}",
                self.source.peer_id(),
                key_now.0,
                size,
                u8::from(self.force_round),
                palette_version
            ),
            size,
        );
        let snapshot = self.source.snapshot();
        let palette = self.env.theme().palette();
        let force_round = self.force_round;
        let weak = Arc::downgrade(&self.state);
        let epoch = state.epoch;
        drop(state);
        load_cached_async(
            &self.env,
            cache_key,
            move || match snapshot {
                AvatarSnapshot::Photo(photo) => render::avatar_photo(&photo, px, force_round),
                AvatarSnapshot::Placeholder { seed } => {
                    render::avatar_placeholder(px, seed, &palette)
                }
            },
            move |frame| deliver(&weak, epoch, frame),
        );
        let state = self.state.lock();
        state
            .frame
            .clone()
            .unwrap_or_else(|| Arc::new(render::fallback_square(px)))
    }

    fn subscribe_to_updates(&self, callback: Option<UpdateCallback>) {
        let Some(callback) = callback else {
            let mut state = self.state.lock();
            state.subscribed = None;
            state.frame = None;
            state.key = None;
            state.epoch += 1;
            return;
        };
        // Old registrations are torn down before the new ones are armed.
        let old = self.state.lock().subscribed.take();
        drop(old);
        let photo_changes = {
            let weak = Arc::downgrade(&self.state);
            let source = self.source.clone();
            let callback = callback.clone();
            self.source.on_photo_changed(Box::new(move || {
                callback();
                if let Some(state) = weak.upgrade() {
                    process_new_photo(&source, &state);
                }
                Subsist::Keep
            }))
        };
        self.state.lock().subscribed = Some(Subscribed {
            callback,
            _photo_changes: photo_changes,
            download: None,
        });
        process_new_photo(&self.source, &self.state);
    }
}
