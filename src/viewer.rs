//! Scrollable page list with on-demand loading and zoom gestures
//!
//! The surface is driven from the UI side with plain synchronous calls.
//! Loads run as tasks on the tokio runtime captured at construction, and
//! results reach observers through each page's watch channel or through
//! [`ViewerSurface::snapshot`] polling.

use crate::cache::BitmapCache;
use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::gesture::{Offset, ScreenSize, TransformGesture, ZoomPan};
use crate::layout::PageLayout;
use crate::page::{Page, PageList, PageState, PageStatus};
use crate::render::{Bitmap, CancellationToken, RenderCoordinator, TargetSize};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct LoadTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LoadTask {
    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// What an observer needs to draw one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub index: u32,
    pub status: PageStatus,
    pub visible: bool,
    pub scale: f32,
    pub offset: Offset,
    pub rotation: f32,
    /// Distance from the top of the list in pixels
    pub top: f64,
}

/// Render size for pages filling the screen width
fn page_size_for(screen: ScreenSize) -> Result<TargetSize> {
    if !screen.is_valid() {
        return Err(Error::InvalidScreenSize {
            width: screen.width,
            height: screen.height,
        });
    }
    let size = TargetSize::for_display_width(screen.width as u32);
    size.validate()?;
    Ok(size)
}

/// Vertical list of pages that loads them as they scroll into view
pub struct ViewerSurface {
    config: ViewerConfig,
    coordinator: RenderCoordinator,
    cache: Arc<BitmapCache>,
    pages: PageList,
    layout: PageLayout,
    screen: ScreenSize,
    scroll_offset: f64,
    visible: Range<u32>,
    loads: HashMap<u32, LoadTask>,
    runtime: Handle,
}

impl ViewerSurface {
    /// Build the page list for `screen`. Must be called from within a tokio runtime.
    pub fn new(
        coordinator: RenderCoordinator,
        cache: Arc<BitmapCache>,
        config: ViewerConfig,
        screen: ScreenSize,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime {
            reason: format!("viewer needs a tokio runtime: {}", e),
        })?;
        let size = page_size_for(screen)?;

        let pages = PageList::build(&coordinator, &cache, size);
        let layout = PageLayout::new(size, config.page_spacing, coordinator.page_count());

        Ok(Self {
            config,
            coordinator,
            cache,
            pages,
            layout,
            screen,
            scroll_offset: 0.0,
            visible: 0..0,
            loads: HashMap::new(),
            runtime,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.coordinator.page_count()
    }

    pub fn pages(&self) -> &PageList {
        &self.pages
    }

    pub fn page(&self, index: u32) -> Option<&Arc<Page>> {
        self.pages.get(index)
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub fn target_size(&self) -> TargetSize {
        self.pages.target_size()
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn visible_range(&self) -> Range<u32> {
        self.visible.clone()
    }

    /// True while a background load for `index` is running
    pub fn is_loading(&self, index: u32) -> bool {
        self.loads
            .get(&index)
            .is_some_and(|load| !load.task.is_finished())
    }

    /// Watch one page's state transitions
    pub fn subscribe(&self, index: u32) -> Option<watch::Receiver<PageState>> {
        self.page(index).map(|page| page.subscribe())
    }

    /// Scroll to `offset` pixels from the top. Pages entering the screen start
    /// loading, pages leaving it have their loads cancelled.
    pub fn scroll_to(&mut self, offset: f64) -> Range<u32> {
        self.scroll_offset = self
            .layout
            .clamp_scroll(offset, self.screen.height as f64);
        let next = self
            .layout
            .visible_range(self.scroll_offset, self.screen.height as f64);

        let previous = std::mem::replace(&mut self.visible, next.clone());
        for index in previous.clone() {
            if !next.contains(&index) {
                self.on_page_disappeared(index);
            }
        }
        for index in next.clone() {
            if !previous.contains(&index) {
                self.on_page_appeared(index);
            }
        }
        next
    }

    pub fn scroll_by(&mut self, delta: f64) -> Range<u32> {
        self.scroll_to(self.scroll_offset + delta)
    }

    /// Start loading `index` unless it is loaded or already loading
    pub fn on_page_appeared(&mut self, index: u32) {
        self.loads.retain(|_, load| !load.task.is_finished());

        let Some(page) = self.pages.get(index).cloned() else {
            return;
        };
        if page.status() == PageStatus::Loaded || self.loads.contains_key(&index) {
            return;
        }

        tracing::debug!(page = index, total = self.page_count(), "Page appeared, loading");
        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            self.runtime.spawn(async move {
                page.load_with(&cancel).await;
            })
        };
        self.loads.insert(index, LoadTask { cancel, task });
    }

    /// Abandon any load for `index`
    pub fn on_page_disappeared(&mut self, index: u32) {
        if let Some(load) = self.loads.remove(&index) {
            tracing::debug!(page = index, "Page disappeared, cancelling load");
            load.stop();
        }
    }

    /// Toggle between fit-width and full zoom. Returns the new scale.
    pub fn double_tap(&self, index: u32) -> Option<f32> {
        self.page(index).map(|page| page.toggle_zoom())
    }

    /// Apply a pinch / drag step to one page
    pub fn pinch(&self, index: u32, gesture: TransformGesture) -> Option<ZoomPan> {
        self.page(index)
            .map(|page| page.apply_gesture(gesture, self.screen))
    }

    /// Rotate one page's content; later pans are turned to match
    pub fn rotate(&self, index: u32, degrees: f32) -> Option<ZoomPan> {
        self.page(index).map(|page| {
            page.set_rotation(degrees);
            page.zoom_state()
        })
    }

    /// Load every visible page and wait for the results, in page order
    pub async fn load_visible(&self) -> Vec<(u32, Option<Arc<Bitmap>>)> {
        let mut results = Vec::new();
        for index in self.visible.clone() {
            if let Some(page) = self.pages.get(index) {
                results.push((index, page.load().await));
            }
        }
        results
    }

    /// Current state of every page for polling observers
    pub fn snapshot(&self) -> Vec<PageView> {
        self.pages
            .iter()
            .map(|page| {
                let zoom = page.zoom_state();
                PageView {
                    index: page.index(),
                    status: page.status(),
                    visible: self.visible.contains(&page.index()),
                    scale: zoom.scale(),
                    offset: zoom.offset(),
                    rotation: zoom.rotation_degrees(),
                    top: self.layout.page_top(page.index()),
                }
            })
            .collect()
    }

    /// Adapt to a new screen size. A new width rebuilds the page list at the
    /// matching render size; bitmaps cached for that width are reused.
    pub fn resize(&mut self, screen: ScreenSize) -> Result<Range<u32>> {
        let size = page_size_for(screen)?;
        self.screen = screen;

        if size != self.pages.target_size() {
            tracing::debug!(width = size.width, height = size.height, "Rebuilding page list");
            self.stop_all_loads();
            let fraction = if self.layout.content_height() > 0.0 {
                self.scroll_offset / self.layout.content_height()
            } else {
                0.0
            };
            self.pages = PageList::build(&self.coordinator, &self.cache, size);
            self.layout = PageLayout::new(size, self.config.page_spacing, self.page_count());
            self.visible = 0..0;
            return Ok(self.scroll_to(fraction * self.layout.content_height()));
        }

        Ok(self.scroll_to(self.scroll_offset))
    }

    /// Drop all bitmaps (e.g. the file changed) and reload the visible pages
    pub fn invalidate_all(&mut self) {
        self.stop_all_loads();
        self.pages.invalidate_all();
        // Bitmaps kept for other widths are stale too
        let dropped = self.cache.remove_document(self.coordinator.source());
        tracing::debug!(dropped, "Invalidated cached pages");
        for index in self.visible.clone() {
            self.on_page_appeared(index);
        }
    }

    fn stop_all_loads(&mut self) {
        for (_, load) in self.loads.drain() {
            load.stop();
        }
    }

    /// Cancel outstanding loads, then close the document. The close waits for
    /// a render already running on the worker.
    pub async fn close(&mut self) -> Result<()> {
        self.stop_all_loads();
        self.visible = 0..0;
        self.coordinator.close().await
    }
}

impl Drop for ViewerSurface {
    fn drop(&mut self) {
        self.stop_all_loads();
    }
}
