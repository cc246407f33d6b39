//! PDF Page Viewer - headless driver
//!
//! Scrolls through a document one screen at a time and writes every page the
//! viewer rendered as a PNG.

use anyhow::Context;
use clap::Parser;
use pdf_page_viewer::{
    AssetStore, BitmapCache, PdfiumOpener, RenderCoordinator, ScreenSize, ViewerConfig,
    ViewerSurface,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "pdf-page-viewer", version, about)]
struct Args {
    /// PDF to open, or the asset name when --asset-dir is given
    document: String,

    /// Copy the document from this bundle directory into --cache-dir first
    #[arg(long)]
    asset_dir: Option<PathBuf>,

    /// Where extracted assets are stored
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Screen width in pixels (pages are rendered at this width)
    #[arg(long, default_value_t = 1080)]
    width: u32,

    /// Screen height in pixels
    #[arg(long, default_value_t = 1920)]
    height: u32,

    /// Directory for the rendered pages
    #[arg(long, default_value = "pages")]
    out: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the PDFium library
    #[arg(long)]
    pdfium_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_page_viewer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    let document = match &args.asset_dir {
        Some(dir) => AssetStore::new(dir)
            .extract_async(&args.document, args.cache_dir.clone())
            .await
            .context("extracting bundled document")?,
        None => PathBuf::from(&args.document),
    };

    let mut opener = PdfiumOpener::new();
    if let Some(dir) = &args.pdfium_dir {
        opener = opener.with_library_dir(dir);
    }

    let coordinator = RenderCoordinator::open_with_config(Arc::new(opener), &document, &config)
        .await
        .with_context(|| format!("opening {}", document.display()))?;
    let cache = Arc::new(BitmapCache::new(
        config.cache_max_entries,
        config.cache_max_bytes,
    ));
    let screen = ScreenSize::new(args.width as f32, args.height as f32);
    let mut viewer = ViewerSurface::new(coordinator, cache, config, screen)?;

    tracing::info!(
        pages = viewer.page_count(),
        width = viewer.target_size().width,
        height = viewer.target_size().height,
        "Viewer ready"
    );

    std::fs::create_dir_all(&args.out)?;
    let mut written = 0usize;
    let mut next_page = 0u32;
    viewer.scroll_to(0.0);
    loop {
        for (index, bitmap) in viewer.load_visible().await {
            if index < next_page {
                continue;
            }
            match bitmap {
                Some(bitmap) => {
                    let path = args.out.join(format!("page-{}.png", index + 1));
                    bitmap.save_png(&path)?;
                    written += 1;
                }
                None => tracing::warn!(page = index, "Page left blank"),
            }
            next_page = index + 1;
        }

        if next_page >= viewer.page_count() {
            break;
        }
        let before = viewer.scroll_offset();
        viewer.scroll_by(args.height as f64);
        if viewer.scroll_offset() <= before {
            break;
        }
    }

    viewer.close().await?;
    tracing::info!(written, out = %args.out.display(), "Done");
    Ok(())
}
