//! In-memory document backend for unit tests

use crate::error::{Error, Result};
use crate::render::{
    Bitmap, CancellationToken, DocumentHandle, DocumentOpener, RenderOptions, TargetSize,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the fake backend saw
#[derive(Default)]
pub struct Probe {
    pub renders: AtomicUsize,
    pub closes: AtomicUsize,
    pub events: Mutex<Vec<String>>,
}

impl Probe {
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

pub struct FakeOpener {
    pub pages: u32,
    pub delay: Duration,
    pub failing_pages: HashSet<u32>,
    pub probe: Arc<Probe>,
}

impl FakeOpener {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            delay: Duration::ZERO,
            failing_pages: HashSet::new(),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }
}

impl DocumentOpener for FakeOpener {
    fn open(&self, path: &Path, _options: &RenderOptions) -> Result<Box<dyn DocumentHandle>> {
        if path.to_string_lossy().contains("missing") {
            return Err(Error::DocumentNotFound {
                path: path.display().to_string(),
            });
        }
        Ok(Box::new(FakeDocument {
            pages: self.pages,
            delay: self.delay,
            failing_pages: self.failing_pages.clone(),
            probe: self.probe.clone(),
        }))
    }
}

struct FakeDocument {
    pages: u32,
    delay: Duration,
    failing_pages: HashSet<u32>,
    probe: Arc<Probe>,
}

impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn render_page(
        &mut self,
        index: u32,
        size: TargetSize,
        cancel: &CancellationToken,
    ) -> Result<Bitmap> {
        self.probe.events.lock().push(format!("start {}", index));
        self.probe.renders.fetch_add(1, Ordering::SeqCst);

        let step = Duration::from_millis(5);
        let mut waited = Duration::ZERO;
        while waited < self.delay {
            if cancel.is_cancelled() {
                self.probe.events.lock().push(format!("abort {}", index));
                return Err(Error::Cancelled);
            }
            std::thread::sleep(step);
            waited += step;
        }

        self.probe.events.lock().push(format!("end {}", index));
        if self.failing_pages.contains(&index) {
            return Err(Error::Render {
                page: index,
                reason: "corrupt content stream".to_string(),
            });
        }
        Ok(Bitmap::blank(size))
    }

    fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.probe.events.lock().push("close".to_string());
        Ok(())
    }
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
