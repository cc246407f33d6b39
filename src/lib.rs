//! PDF Page Viewer Library
//!
//! This crate provides the page pipeline of a scrolling PDF viewer:
//! - `render`: serialized access to one document handle, PDFium backend
//! - `page`: lazily loaded per-page bitmaps with zoom state
//! - `viewer`: visibility-driven loading, gestures and snapshots
//! - `assets`: copying bundled documents into cache storage

pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod gesture;
pub mod layout;
pub mod page;
pub mod render;
pub mod viewer;

#[cfg(test)]
mod test_support;

pub use assets::AssetStore;
pub use cache::{BitmapCache, PageKey};
pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use gesture::{Offset, ScreenSize, TransformGesture, ZoomPan, MAX_SCALE, MIN_SCALE};
pub use page::{Page, PageList, PageState, PageStatus};
pub use render::{
    Bitmap, CancellationToken, DocumentHandle, DocumentOpener, PdfiumOpener, RenderCoordinator,
    RenderOptions, TargetSize,
};
pub use viewer::{PageView, ViewerSurface};
