//! Page rendering layer
//!
//! This module owns the document handle and turns pages into bitmaps, using
//! PDFium as the platform renderer.

mod backend;
mod bitmap;
mod cancel;
mod coordinator;
mod pdfium;

pub use backend::{DocumentHandle, DocumentOpener, RenderOptions};
pub use bitmap::{Bitmap, TargetSize};
pub use cancel::{CancelOnDrop, CancellationToken};
pub use coordinator::RenderCoordinator;
pub use pdfium::{PdfiumDocument, PdfiumOpener};
