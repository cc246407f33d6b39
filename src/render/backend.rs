//! Platform renderer boundary
//!
//! Decoding and rasterizing is delegated to a backend. The coordinator only
//! ever talks to a [`DocumentHandle`] from its own worker thread, so handles do
//! not need to be `Send`; only the [`DocumentOpener`] crosses threads.

use crate::error::Result;
use crate::render::{Bitmap, CancellationToken, TargetSize};
use std::path::Path;

/// Backend render flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub render_annotations: bool,
    pub render_form_data: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            render_annotations: true,
            render_form_data: true,
        }
    }
}

/// An opened document. Not safe for concurrent use.
pub trait DocumentHandle {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Render page `index` (zero-based) into a bitmap of exactly `size`.
    ///
    /// Implementations should return [`crate::Error::Cancelled`] when `cancel`
    /// trips between expensive steps.
    fn render_page(
        &mut self,
        index: u32,
        size: TargetSize,
        cancel: &CancellationToken,
    ) -> Result<Bitmap>;

    /// Release the underlying document. Called at most once.
    fn close(&mut self) -> Result<()>;
}

/// Opens documents on behalf of the render worker
pub trait DocumentOpener: Send + Sync + 'static {
    fn open(&self, path: &Path, options: &RenderOptions) -> Result<Box<dyn DocumentHandle>>;
}
