//! Per-page view state and the ordered page list
//!
//! A page moves `Absent → Loading → Loaded`. Only the caller that performs the
//! `Absent → Loading` transition renders; everyone else waits on the watch
//! channel for the outcome. Failed or abandoned loads fall back to `Absent`
//! so the page can be requested again the next time it scrolls into view.

use crate::cache::{BitmapCache, PageKey};
use crate::gesture::{Offset, ScreenSize, TransformGesture, ZoomPan};
use crate::render::{Bitmap, CancellationToken, RenderCoordinator, TargetSize};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Load state of one page
#[derive(Debug, Clone, Default)]
pub enum PageState {
    #[default]
    Absent,
    Loading,
    Loaded(Arc<Bitmap>),
}

impl PageState {
    pub fn status(&self) -> PageStatus {
        match self {
            PageState::Absent => PageStatus::Absent,
            PageState::Loading => PageStatus::Loading,
            PageState::Loaded(_) => PageStatus::Loaded,
        }
    }

    pub fn bitmap(&self) -> Option<&Arc<Bitmap>> {
        match self {
            PageState::Loaded(bitmap) => Some(bitmap),
            _ => None,
        }
    }
}

/// [`PageState`] without the pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Absent,
    Loading,
    Loaded,
}

/// One entry of the page list: lazily rendered bitmap plus zoom state
pub struct Page {
    index: u32,
    key: PageKey,
    size: TargetSize,
    state: watch::Sender<PageState>,
    // Bumped by invalidate(); loads that started under an older value are dropped
    generation: AtomicU64,
    zoom: Mutex<ZoomPan>,
    coordinator: RenderCoordinator,
    cache: Arc<BitmapCache>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("size", &self.size)
            .field("status", &self.status())
            .field("scale", &self.scale())
            .finish()
    }
}

impl Page {
    /// Create the entry for page `index`, reusing a cached bitmap when present
    pub fn new(
        index: u32,
        size: TargetSize,
        coordinator: RenderCoordinator,
        cache: Arc<BitmapCache>,
    ) -> Self {
        let key = PageKey::new(coordinator.source(), index, size.width);
        let initial = match cache.get(&key) {
            Some(bitmap) if bitmap.size() == size => PageState::Loaded(bitmap),
            _ => PageState::Absent,
        };
        let (state, _) = watch::channel(initial);

        Self {
            index,
            key,
            size,
            state,
            generation: AtomicU64::new(0),
            zoom: Mutex::new(ZoomPan::new()),
            coordinator,
            cache,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn target_size(&self) -> TargetSize {
        self.size
    }

    pub fn state(&self) -> PageState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> PageStatus {
        self.state.borrow().status()
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.state.borrow().bitmap().cloned()
    }

    /// Receive every state transition of this page
    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.state.subscribe()
    }

    /// Load the bitmap, or wait for the load already in progress.
    ///
    /// Dropping the returned future abandons the load.
    pub async fn load(&self) -> Option<Arc<Bitmap>> {
        self.load_with(&CancellationToken::new()).await
    }

    /// Like [`Page::load`], abandoning the render when `cancel` trips.
    ///
    /// Returns `None` when the page could not be rendered; the page is then
    /// back to `Absent`.
    pub async fn load_with(&self, cancel: &CancellationToken) -> Option<Arc<Bitmap>> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if matches!(state, PageState::Absent) {
                *state = PageState::Loading;
                claimed = true;
                true
            } else {
                false
            }
        });
        if !claimed {
            return self.settled().await;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let _reset = ResetOnDrop {
            page: self,
            generation,
        };
        let cancel_guard = cancel.drop_guard();
        let result = self
            .coordinator
            .render_page(self.index, self.size, cancel)
            .await;
        cancel_guard.disarm();

        match result {
            Ok(bitmap) => {
                let bitmap = Arc::new(bitmap);
                let published = self.state.send_if_modified(|state| {
                    if self.generation.load(Ordering::Acquire) != generation {
                        return false;
                    }
                    self.cache.put(self.key.clone(), bitmap.clone());
                    *state = PageState::Loaded(bitmap.clone());
                    true
                });

                if !published {
                    tracing::debug!(page = self.index, "Discarding render of invalidated page");
                    return None;
                }
                Some(bitmap)
            }
            Err(e) => {
                if e.is_cancellation() {
                    tracing::debug!(page = self.index, error = %e, "Page load abandoned");
                } else if e.is_programming_error() {
                    tracing::error!(page = self.index, error = %e, "Page load rejected");
                } else {
                    tracing::warn!(page = self.index, error = %e, "Page render failed");
                }
                None
            }
        }
    }

    async fn settled(&self) -> Option<Arc<Bitmap>> {
        let mut updates = self.state.subscribe();
        loop {
            let state = updates.borrow_and_update().clone();
            match state {
                PageState::Loaded(bitmap) => return Some(bitmap),
                PageState::Absent => return None,
                PageState::Loading => {}
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Forget the bitmap so the next load renders again
    pub fn invalidate(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *state = PageState::Absent;
        });
        self.cache.remove(&self.key);
    }

    pub fn scale(&self) -> f32 {
        self.zoom.lock().scale()
    }

    /// Set the zoom factor, clamped to the allowed range
    pub fn set_scale(&self, scale: f32) {
        self.zoom.lock().set_scale(scale);
    }

    pub fn offset(&self) -> Offset {
        self.zoom.lock().offset()
    }

    pub fn zoom_state(&self) -> ZoomPan {
        *self.zoom.lock()
    }

    pub fn set_rotation(&self, degrees: f32) {
        self.zoom.lock().set_rotation(degrees);
    }

    /// Double tap
    pub fn toggle_zoom(&self) -> f32 {
        let mut zoom = self.zoom.lock();
        zoom.toggle_zoom();
        zoom.scale()
    }

    /// Pinch / drag step
    pub fn apply_gesture(&self, gesture: TransformGesture, screen: ScreenSize) -> ZoomPan {
        let mut zoom = self.zoom.lock();
        zoom.apply(gesture, screen);
        *zoom
    }
}

/// Puts a claimed page back to `Absent` when its load ends without a bitmap.
/// No-op once the page was published or invalidated.
struct ResetOnDrop<'a> {
    page: &'a Page,
    generation: u64,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        let page = self.page;
        let generation = self.generation;
        page.state.send_if_modified(|state| {
            if page.generation.load(Ordering::Acquire) != generation
                || !matches!(state, PageState::Loading)
            {
                return false;
            }
            *state = PageState::Absent;
            true
        });
    }
}

/// The document's pages in order
#[derive(Debug, Clone)]
pub struct PageList {
    pages: Vec<Arc<Page>>,
    size: TargetSize,
}

impl PageList {
    /// One entry per page of the coordinator's document, all rendered at `size`
    pub fn build(
        coordinator: &RenderCoordinator,
        cache: &Arc<BitmapCache>,
        size: TargetSize,
    ) -> Self {
        let pages: Vec<Arc<Page>> = (0..coordinator.page_count())
            .map(|index| Arc::new(Page::new(index, size, coordinator.clone(), cache.clone())))
            .collect();

        let cached = pages
            .iter()
            .filter(|page| page.status() == PageStatus::Loaded)
            .count();
        tracing::debug!(
            pages = pages.len(),
            cached,
            width = size.width,
            height = size.height,
            "Built page list"
        );

        Self { pages, size }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Arc<Page>> {
        self.pages.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Page>> {
        self.pages.iter()
    }

    pub fn target_size(&self) -> TargetSize {
        self.size
    }

    /// Drop every page's bitmap, e.g. after the document changed on disk
    pub fn invalidate_all(&self) {
        for page in &self.pages {
            page.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{eventually, FakeOpener, Probe};
    use std::time::Duration;

    const SIZE: TargetSize = TargetSize {
        width: 100,
        height: 141,
    };

    async fn setup(opener: FakeOpener) -> (PageList, Arc<BitmapCache>, Arc<Probe>) {
        let probe = opener.probe.clone();
        let coordinator = RenderCoordinator::open(Arc::new(opener), "/docs/sample.pdf")
            .await
            .unwrap();
        let cache = Arc::new(BitmapCache::new(16, 16 * 1024 * 1024));
        let pages = PageList::build(&coordinator, &cache, SIZE);
        (pages, cache, probe)
    }

    #[tokio::test]
    async fn test_page_list_matches_page_count() {
        let (pages, _, _) = setup(FakeOpener::new(3)).await;
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|page| page.status() == PageStatus::Absent));
        assert_eq!(pages.get(2).unwrap().index(), 2);
        assert!(pages.get(3).is_none());
    }

    #[tokio::test]
    async fn test_load_renders_once() {
        let (pages, cache, probe) = setup(FakeOpener::new(3)).await;
        let page = pages.get(0).unwrap();

        let bitmap = page.load().await.unwrap();
        assert_eq!(bitmap.size(), SIZE);
        assert_eq!(page.status(), PageStatus::Loaded);

        let again = page.load().await.unwrap();
        assert!(Arc::ptr_eq(&bitmap, &again));
        assert_eq!(probe.renders(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_render_once() {
        let (pages, _, probe) =
            setup(FakeOpener::new(1).with_delay(Duration::from_millis(50))).await;
        let page = pages.get(0).unwrap().clone();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let page = page.clone();
            tasks.push(tokio::spawn(async move { page.load().await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(probe.renders(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_returns_to_absent() {
        let (pages, cache, _) = setup(FakeOpener::new(2).failing_on(1)).await;
        let page = pages.get(1).unwrap();

        assert!(page.load().await.is_none());
        assert_eq!(page.status(), PageStatus::Absent);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_sees_failure() {
        let (pages, _, _) =
            setup(FakeOpener::new(1).with_delay(Duration::from_millis(50)).failing_on(0)).await;
        let page = pages.get(0).unwrap().clone();

        let loader = {
            let page = page.clone();
            tokio::spawn(async move { page.load().await })
        };
        assert!(eventually(|| page.status() == PageStatus::Loading).await);

        assert!(page.load().await.is_none());
        assert!(loader.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_aborted_load_resets_state() {
        let (pages, _, probe) =
            setup(FakeOpener::new(2).with_delay(Duration::from_millis(300))).await;
        let page = pages.get(0).unwrap().clone();

        let task = {
            let page = page.clone();
            tokio::spawn(async move { page.load().await })
        };
        assert!(eventually(|| probe.renders() == 1).await);
        task.abort();
        let _ = task.await;

        assert_eq!(page.status(), PageStatus::Absent);
        // The worker saw the dropped caller and stopped early
        assert!(eventually(|| probe.events().contains(&"abort 0".to_string())).await);

        // A later appearance can load again
        assert!(page.load().await.is_some());
        assert_eq!(probe.renders(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_leaves_page_absent() {
        let (pages, _, probe) = setup(FakeOpener::new(1)).await;
        let page = pages.get(0).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(page.load_with(&cancel).await.is_none());
        assert_eq!(page.status(), PageStatus::Absent);
        assert_eq!(probe.renders(), 0);
    }

    #[tokio::test]
    async fn test_cache_prefills_rebuilt_list() {
        let opener = FakeOpener::new(2);
        let probe = opener.probe.clone();
        let coordinator = RenderCoordinator::open(Arc::new(opener), "/docs/sample.pdf")
            .await
            .unwrap();
        let cache = Arc::new(BitmapCache::new(16, 16 * 1024 * 1024));

        let first = PageList::build(&coordinator, &cache, SIZE);
        first.get(1).unwrap().load().await.unwrap();

        let rebuilt = PageList::build(&coordinator, &cache, SIZE);
        assert_eq!(rebuilt.get(0).unwrap().status(), PageStatus::Absent);
        assert_eq!(rebuilt.get(1).unwrap().status(), PageStatus::Loaded);
        assert!(rebuilt.get(1).unwrap().load().await.is_some());
        assert_eq!(probe.renders(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rerender() {
        let (pages, cache, probe) = setup(FakeOpener::new(1)).await;
        let page = pages.get(0).unwrap();

        page.load().await.unwrap();
        page.invalidate();
        assert_eq!(page.status(), PageStatus::Absent);
        assert!(cache.is_empty());

        page.load().await.unwrap();
        assert_eq!(probe.renders(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_during_load_discards_result() {
        let (pages, cache, _) =
            setup(FakeOpener::new(1).with_delay(Duration::from_millis(100))).await;
        let page = pages.get(0).unwrap().clone();

        let task = {
            let page = page.clone();
            tokio::spawn(async move { page.load().await })
        };
        assert!(eventually(|| page.status() == PageStatus::Loading).await);
        page.invalidate();

        assert!(task.await.unwrap().is_none());
        assert_eq!(page.status(), PageStatus::Absent);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let (pages, _, _) = setup(FakeOpener::new(1)).await;
        let page = pages.get(0).unwrap();
        let mut updates = page.subscribe();

        page.load().await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().bitmap().is_some());
    }

    #[tokio::test]
    async fn test_scale_clamped_on_write() {
        let (pages, _, _) = setup(FakeOpener::new(1)).await;
        let page = pages.get(0).unwrap();

        page.set_scale(7.0);
        assert_eq!(page.scale(), 3.0);
        page.set_scale(0.5);
        assert_eq!(page.scale(), 1.0);

        assert_eq!(page.toggle_zoom(), 3.0);
        assert_eq!(page.toggle_zoom(), 1.0);
    }
}
