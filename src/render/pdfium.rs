//! PDFium-backed document handle

use crate::error::{Error, Result};
use crate::render::{
    Bitmap, CancellationToken, DocumentHandle, DocumentOpener, RenderOptions, TargetSize,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Process-wide bindings. PDFium is initialized once and documents borrow it
/// for the rest of the process.
static PDFIUM: Mutex<Option<&'static Pdfium>> = parking_lot::const_mutex(None);

/// Return the value in `slot`, creating and leaking it on first use
fn bind_once<T>(
    slot: &Mutex<Option<&'static T>>,
    create: impl FnOnce() -> Result<T>,
) -> Result<&'static T> {
    let mut slot = slot.lock();
    if let Some(bound) = *slot {
        return Ok(bound);
    }
    let bound: &'static T = Box::leak(Box::new(create()?));
    *slot = Some(bound);
    Ok(bound)
}

/// Opens documents through a dynamically bound PDFium library
#[derive(Debug, Clone)]
pub struct PdfiumOpener {
    library_dirs: Vec<PathBuf>,
}

impl Default for PdfiumOpener {
    fn default() -> Self {
        Self {
            library_dirs: vec![PathBuf::from("./"), PathBuf::from("/opt/pdfium/lib")],
        }
    }
}

impl PdfiumOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the PDFium library in `dir` before the default locations.
    ///
    /// Only the first opener to open a document binds the library.
    pub fn with_library_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.library_dirs.insert(0, dir.into());
        self
    }

    fn create_pdfium(&self) -> Result<Pdfium> {
        for dir in &self.library_dirs {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

/// Cheap header check so obviously wrong files fail before PDFium is bound
fn check_pdf_header(path: &Path) -> Result<()> {
    let mut header = [0u8; 4];
    let mut file = std::fs::File::open(path)?;
    if file.read_exact(&mut header).is_err() || &header != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError) => {
            Error::InvalidPdf {
                reason: "PDFium could not parse the document".to_string(),
            }
        }
        e => Error::Pdfium {
            reason: format!("{}", e),
        },
    }
}

impl DocumentOpener for PdfiumOpener {
    fn open(&self, path: &Path, options: &RenderOptions) -> Result<Box<dyn DocumentHandle>> {
        if !path.exists() {
            return Err(Error::DocumentNotFound {
                path: path.display().to_string(),
            });
        }
        check_pdf_header(path)?;

        let pdfium = bind_once(&PDFIUM, || self.create_pdfium())?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(map_pdfium_error)?;
        let page_count = document.pages().len() as u32;

        tracing::info!(path = %path.display(), pages = page_count, "Opened PDF");

        Ok(Box::new(PdfiumDocument {
            document: Some(document),
            page_count,
            options: *options,
        }))
    }
}

/// A PDF opened through PDFium
pub struct PdfiumDocument {
    document: Option<PdfDocument<'static>>,
    page_count: u32,
    options: RenderOptions,
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn render_page(
        &mut self,
        index: u32,
        size: TargetSize,
        cancel: &CancellationToken,
    ) -> Result<Bitmap> {
        let document = self.document.as_ref().ok_or(Error::HandleClosed)?;
        if index >= self.page_count {
            return Err(Error::PageOutOfBounds {
                page: index,
                total: self.page_count,
            });
        }

        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| Error::Render {
                page: index,
                reason: format!("Failed to open page: {}", e),
            })?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let config = PdfRenderConfig::new()
            .set_target_size(size.width as i32, size.height as i32)
            .render_form_data(self.options.render_form_data)
            .render_annotations(self.options.render_annotations);

        let rendered = page
            .render_with_config(&config)
            .map_err(|e| Error::Render {
                page: index,
                reason: format!("{}", e),
            })?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(Bitmap::from_image(rendered.as_image(), size))
    }

    fn close(&mut self) -> Result<()> {
        self.document.take();
        Ok(())
    }
}
