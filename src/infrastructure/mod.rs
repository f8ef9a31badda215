//! Infrastructure layer: cache, dispatch, events, theme and rasterizing.

pub mod cache;
pub mod events;
pub mod pipeline;
pub mod render;
pub mod theme;
