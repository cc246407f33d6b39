//! Serializing owner of the document handle
//!
//! A dedicated worker thread opens the document and then drains a queue of
//! requests one at a time. Callers never see the handle itself, so every
//! render and the final close are ordered by the queue: at most one render is
//! in flight, and a close waits for whatever was queued before it.

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::render::{
    Bitmap, CancellationToken, DocumentHandle, DocumentOpener, RenderOptions, TargetSize,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum Request {
    Render {
        index: u32,
        size: TargetSize,
        cancel: CancellationToken,
        reply: oneshot::Sender<Result<Bitmap>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

struct Shared {
    requests: mpsc::UnboundedSender<Request>,
    source: PathBuf,
    page_count: u32,
    closed: AtomicBool,
    renders: Arc<AtomicU64>,
}

/// Handle to the render worker. Clones share one document.
///
/// Dropping the last clone closes the document on the worker thread.
#[derive(Clone)]
pub struct RenderCoordinator {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for RenderCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCoordinator")
            .field("source", &self.inner.source)
            .field("page_count", &self.inner.page_count)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RenderCoordinator {
    /// Open `path` with default render options
    pub async fn open<P: Into<PathBuf>>(opener: Arc<dyn DocumentOpener>, path: P) -> Result<Self> {
        Self::open_with_config(opener, path, &ViewerConfig::default()).await
    }

    /// Open `path` on a new worker thread and wait until the document is ready
    pub async fn open_with_config<P: Into<PathBuf>>(
        opener: Arc<dyn DocumentOpener>,
        path: P,
        config: &ViewerConfig,
    ) -> Result<Self> {
        let source = path.into();
        let options = RenderOptions {
            render_annotations: config.render_annotations,
            render_form_data: config.render_form_data,
        };
        let (requests, queue) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let renders = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            queue,
            renders: renders.clone(),
        };
        let worker_source = source.clone();
        std::thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || worker.run(opener, &worker_source, &options, ready_tx))?;

        let page_count = ready_rx.await.map_err(|_| Error::Runtime {
            reason: "render worker exited while opening the document".to_string(),
        })??;

        Ok(Self {
            inner: Arc::new(Shared {
                requests,
                source,
                page_count,
                closed: AtomicBool::new(false),
                renders,
            }),
        })
    }

    /// Number of pages, read once from the handle when it was opened
    pub fn page_count(&self) -> u32 {
        self.inner.page_count
    }

    /// Path of the opened document
    pub fn source(&self) -> &Path {
        &self.inner.source
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of renders the backend completed successfully
    pub fn render_count(&self) -> u64 {
        self.inner.renders.load(Ordering::Relaxed)
    }

    /// Render page `index` at `size`, waiting behind any render already queued.
    ///
    /// Returns [`Error::Cancelled`] without touching the handle when `cancel`
    /// tripped before the request reached the front of the queue.
    pub async fn render_page(
        &self,
        index: u32,
        size: TargetSize,
        cancel: &CancellationToken,
    ) -> Result<Bitmap> {
        size.validate()?;
        if index >= self.inner.page_count {
            return Err(Error::PageOutOfBounds {
                page: index,
                total: self.inner.page_count,
            });
        }
        if self.is_closed() {
            return Err(Error::HandleClosed);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (reply, response) = oneshot::channel();
        self.inner
            .requests
            .send(Request::Render {
                index,
                size,
                cancel: cancel.clone(),
                reply,
            })
            .map_err(|_| Error::HandleClosed)?;

        response.await.map_err(|_| Error::HandleClosed)?
    }

    /// Close the document once every request queued before this call finished.
    ///
    /// Later renders fail with [`Error::HandleClosed`]. Calling close again is
    /// harmless and also waits for the handle to be released.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);

        let (reply, response) = oneshot::channel();
        if self.inner.requests.send(Request::Close { reply }).is_err() {
            // Worker is gone, and it closes the handle on its way out
            return Ok(());
        }
        response.await.unwrap_or(Ok(()))
    }
}

struct Worker {
    queue: mpsc::UnboundedReceiver<Request>,
    renders: Arc<AtomicU64>,
}

impl Worker {
    fn run(
        mut self,
        opener: Arc<dyn DocumentOpener>,
        source: &Path,
        options: &RenderOptions,
        ready: oneshot::Sender<Result<u32>>,
    ) {
        let mut handle = match opener.open(source, options) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "Failed to open document");
                let _ = ready.send(Err(e));
                return;
            }
        };
        let page_count = handle.page_count();
        if ready.send(Ok(page_count)).is_err() {
            // Opener gave up waiting
            close_handle(handle.as_mut());
            return;
        }

        let mut handle = Some(handle);
        while let Some(request) = self.queue.blocking_recv() {
            match request {
                Request::Render {
                    index,
                    size,
                    cancel,
                    reply,
                } => {
                    if cancel.is_cancelled() || reply.is_closed() {
                        tracing::debug!(page = index, "Skipping render, caller went away");
                        let _ = reply.send(Err(Error::Cancelled));
                        continue;
                    }
                    let result = match handle.as_mut() {
                        Some(document) => {
                            tracing::debug!(
                                path = %source.display(),
                                page = index,
                                total = page_count,
                                "Rendering page"
                            );
                            document.render_page(index, size, &cancel)
                        }
                        None => Err(Error::HandleClosed),
                    };
                    if result.is_ok() {
                        self.renders.fetch_add(1, Ordering::Relaxed);
                    }
                    let _ = reply.send(result);
                }
                Request::Close { reply } => {
                    let result = match handle.take() {
                        Some(mut document) => {
                            tracing::debug!(path = %source.display(), "Closing document");
                            document.close()
                        }
                        None => Ok(()),
                    };
                    let _ = reply.send(result);
                }
            }
        }

        if let Some(mut document) = handle.take() {
            close_handle(document.as_mut());
        }
    }
}

fn close_handle(document: &mut dyn DocumentHandle) {
    if let Err(e) = document.close() {
        tracing::warn!(error = %e, "Failed to close document");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{eventually, FakeOpener, Probe};
    use std::time::Duration;

    async fn open_test(opener: FakeOpener) -> (RenderCoordinator, Arc<Probe>) {
        let probe = opener.probe.clone();
        let coordinator = RenderCoordinator::open(Arc::new(opener), "/docs/sample.pdf")
            .await
            .unwrap();
        (coordinator, probe)
    }

    #[tokio::test]
    async fn test_open_reports_page_count() {
        let (coordinator, _) = open_test(FakeOpener::new(3)).await;
        assert_eq!(coordinator.page_count(), 3);
        assert_eq!(coordinator.source(), Path::new("/docs/sample.pdf"));
        assert!(!coordinator.is_closed());
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let result =
            RenderCoordinator::open(Arc::new(FakeOpener::new(1)), "/docs/missing.pdf").await;
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_render_returns_requested_size() {
        let (coordinator, _) = open_test(FakeOpener::new(2)).await;
        let size = TargetSize::new(120, 169);
        let bitmap = coordinator
            .render_page(1, size, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bitmap.size(), size);
        assert_eq!(coordinator.render_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_index_rejected() {
        let (coordinator, probe) = open_test(FakeOpener::new(2)).await;
        let result = coordinator
            .render_page(2, TargetSize::new(10, 14), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(Error::PageOutOfBounds { page: 2, total: 2 })
        ));
        assert_eq!(probe.renders(), 0);
    }

    #[tokio::test]
    async fn test_zero_target_size_rejected() {
        let (coordinator, probe) = open_test(FakeOpener::new(2)).await;
        let result = coordinator
            .render_page(0, TargetSize::new(0, 14), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::InvalidTargetSize { .. })));
        assert_eq!(probe.renders(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch_skips_backend() {
        let (coordinator, probe) = open_test(FakeOpener::new(2)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator
            .render_page(0, TargetSize::new(10, 14), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(probe.renders(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_queued_skips_backend() {
        let (coordinator, probe) =
            open_test(FakeOpener::new(3).with_delay(Duration::from_millis(100))).await;

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .render_page(0, TargetSize::new(10, 14), &CancellationToken::new())
                    .await
            })
        };
        assert!(eventually(|| probe.renders() == 1).await);

        let cancel = CancellationToken::new();
        let queued = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                coordinator
                    .render_page(1, TargetSize::new(10, 14), &cancel)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        assert!(first.await.unwrap().is_ok());
        assert!(matches!(queued.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(probe.renders(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_mid_render_aborts() {
        let (coordinator, probe) =
            open_test(FakeOpener::new(1).with_delay(Duration::from_millis(500))).await;
        let cancel = CancellationToken::new();

        let render = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                coordinator
                    .render_page(0, TargetSize::new(10, 14), &cancel)
                    .await
            })
        };
        assert!(eventually(|| probe.renders() == 1).await);
        cancel.cancel();

        assert!(matches!(render.await.unwrap(), Err(Error::Cancelled)));
        assert!(probe.events().contains(&"abort 0".to_string()));
        assert_eq!(coordinator.render_count(), 0);
    }

    #[tokio::test]
    async fn test_renders_never_overlap() {
        let (coordinator, probe) =
            open_test(FakeOpener::new(4).with_delay(Duration::from_millis(10))).await;

        let mut tasks = Vec::new();
        for index in 0..4 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                coordinator
                    .render_page(index, TargetSize::new(10, 14), &CancellationToken::new())
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // Every start is immediately followed by its own end
        let events = probe.events();
        assert_eq!(events.len(), 8);
        for pair in events.chunks(2) {
            let page = pair[0].trim_start_matches("start ");
            assert_eq!(pair[1], format!("end {}", page));
        }
    }

    #[tokio::test]
    async fn test_render_after_close_fails() {
        let (coordinator, probe) = open_test(FakeOpener::new(2)).await;
        coordinator.close().await.unwrap();

        let result = coordinator
            .render_page(0, TargetSize::new(10, 14), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::HandleClosed)));
        assert!(coordinator.is_closed());
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (coordinator, probe) = open_test(FakeOpener::new(1)).await;
        coordinator.close().await.unwrap();
        coordinator.close().await.unwrap();
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn test_drop_closes_handle() {
        let (coordinator, probe) = open_test(FakeOpener::new(1)).await;
        drop(coordinator);
        assert!(eventually(|| probe.closes() == 1).await);
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_render() {
        let (coordinator, probe) =
            open_test(FakeOpener::new(2).with_delay(Duration::from_millis(100))).await;

        let render = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .render_page(0, TargetSize::new(10, 14), &CancellationToken::new())
                    .await
            })
        };

        // Let the render reach the worker before closing
        assert!(eventually(|| probe.renders() == 1).await);
        coordinator.close().await.unwrap();

        assert!(render.await.unwrap().is_ok());
        assert_eq!(probe.events(), vec!["start 0", "end 0", "close"]);
    }
}
