//! Error types for the PDF page viewer

use thiserror::Error;

/// Result type alias for the PDF page viewer
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF page viewer
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    DocumentNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Page out of bounds (zero-based index)
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Requested bitmap size has a zero dimension
    #[error("Invalid target size: {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    /// Screen dimensions must be finite and positive
    #[error("Invalid screen size: {width}x{height}")]
    InvalidScreenSize { width: f32, height: f32 },

    /// The document handle has been closed
    #[error("Document handle is closed")]
    HandleClosed,

    /// The caller lost interest before the render finished
    #[error("Render cancelled")]
    Cancelled,

    /// Backend failed while rendering a page
    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Bundled asset missing
    #[error("Asset not found: {name}")]
    AssetNotFound { name: String },

    /// Asset names are plain file names
    #[error("Invalid asset name: {name}")]
    InvalidAssetName { name: String },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// No async runtime available to drive background loads
    #[error("Runtime error: {reason}")]
    Runtime { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// True when the error only means nobody wanted the result anymore.
    ///
    /// A render that hits a handle being torn down counts as well: the
    /// viewer closes the handle only after it stopped caring about pages.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::HandleClosed)
    }

    /// True for errors that indicate a caller bug rather than a runtime condition.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Error::PageOutOfBounds { .. }
                | Error::InvalidTargetSize { .. }
                | Error::InvalidScreenSize { .. }
        )
    }
}
