use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;

use glam::Vec2;
use log::debug;

use super::hub::{EventHub, Subscription};
use super::{
    Bounds, FetchCompletion, FetchProgress, FrameCallback, Platform, PointerEvent,
    PointerHandler, ProgressHandler, ResizeHandler,
};
use crate::error::{ViewerError, ViewerResult};
use crate::render::headless::{HeadlessSurface, SurfaceStats};

/// Where a headless platform finds the bytes behind a URL.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Memory(HashMap<String, Vec<u8>>),
    /// Files under `root`; a leading `base_path` is stripped from URLs first.
    Directory { root: PathBuf, base_path: String },
}

impl AssetSource {
    fn read(&self, url: &str) -> ViewerResult<Vec<u8>> {
        match self {
            Self::Memory(assets) => assets
                .get(url)
                .cloned()
                .ok_or_else(|| ViewerError::AssetNotFound { url: url.to_string() }),
            Self::Directory { root, base_path } => {
                let path = root.join(url_to_relative(url, base_path));
                std::fs::read(&path).map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => ViewerError::AssetNotFound {
                        url: url.to_string(),
                    },
                    _ => ViewerError::fetch(url, err.to_string()),
                })
            }
        }
    }
}

/// Strips an optional deployment prefix and the leading slash from `url`.
pub(crate) fn url_to_relative<'a>(url: &'a str, base_path: &str) -> &'a str {
    let base = base_path.trim_end_matches('/');
    let rest = match url.strip_prefix(base) {
        Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => url,
    };
    rest.trim_start_matches('/')
}

struct PendingFetch {
    url: String,
    on_progress: ProgressHandler,
    on_complete: FetchCompletion,
}

/// Deterministic platform for tests and the summary-only preview.
///
/// Nothing happens on its own: frames run on [`run_frames`](Self::run_frames),
/// fetches resolve on [`deliver_fetches`](Self::deliver_fetches) and input is
/// injected explicitly.
pub struct HeadlessPlatform {
    hub: EventHub,
    bounds: Cell<Bounds>,
    viewport: Cell<(u32, u32)>,
    source: RefCell<AssetSource>,
    pending: RefCell<VecDeque<PendingFetch>>,
    requested: RefCell<Vec<String>>,
    stats: Rc<RefCell<SurfaceStats>>,
    container_clears: Cell<usize>,
    surface_failure: Cell<bool>,
}

impl HeadlessPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            hub: EventHub::new(),
            bounds: Cell::new(Bounds::sized(width as f32, height as f32)),
            viewport: Cell::new((width, height)),
            source: RefCell::new(AssetSource::Memory(HashMap::new())),
            pending: RefCell::new(VecDeque::new()),
            requested: RefCell::new(Vec::new()),
            stats: Rc::new(RefCell::new(SurfaceStats::default())),
            container_clears: Cell::new(0),
            surface_failure: Cell::new(false),
        }
    }

    pub fn with_source(self, source: AssetSource) -> Self {
        *self.source.borrow_mut() = source;
        self
    }

    /// Serves `bytes` for `url` when the source is in memory.
    pub fn insert_asset(&self, url: impl Into<String>, bytes: Vec<u8>) {
        if let AssetSource::Memory(assets) = &mut *self.source.borrow_mut() {
            assets.insert(url.into(), bytes);
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn pending_frames(&self) -> usize {
        self.hub.pending_frames()
    }

    pub fn pending_fetches(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Every URL passed to `fetch`, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    pub fn container_clears(&self) -> usize {
        self.container_clears.get()
    }

    /// Makes the next surface creations fail.
    pub fn set_surface_failure(&self, fail: bool) {
        self.surface_failure.set(fail);
    }

    pub fn run_frames(&self) -> usize {
        self.hub.run_frames()
    }

    /// Completes the fetches that were pending when called. Fetches issued
    /// by the completions stay queued.
    pub fn deliver_fetches(&self) -> usize {
        let batch: Vec<PendingFetch> = self.pending.borrow_mut().drain(..).collect();
        let delivered = batch.len();
        for fetch in batch {
            let PendingFetch {
                url,
                mut on_progress,
                on_complete,
            } = fetch;
            let result = self.source.borrow().read(&url);
            if let Ok(bytes) = &result {
                let size = bytes.len() as u64;
                on_progress(FetchProgress {
                    loaded: size,
                    total: Some(size),
                });
            }
            debug!("delivering {url}: {}", if result.is_ok() { "ok" } else { "failed" });
            on_complete(result);
        }
        delivered
    }

    /// Delivers fetches until none remain.
    pub fn settle_fetches(&self) -> usize {
        let mut total = 0;
        loop {
            let delivered = self.deliver_fetches();
            if delivered == 0 {
                return total;
            }
            total += delivered;
        }
    }

    pub fn move_pointer(&self, client: Vec2) {
        self.hub.dispatch_pointer(PointerEvent { client });
    }

    /// Changes the container and viewport size and fires resize listeners.
    pub fn resize(&self, width: u32, height: u32) {
        let mut bounds = self.bounds.get();
        bounds.width = width as f32;
        bounds.height = height as f32;
        self.bounds.set(bounds);
        self.viewport.set((width, height));
        self.hub.dispatch_resize();
    }

    pub fn set_container_offset(&self, left: f32, top: f32) {
        let mut bounds = self.bounds.get();
        bounds.left = left;
        bounds.top = top;
        self.bounds.set(bounds);
    }
}

impl Platform for HeadlessPlatform {
    type Listener = Subscription;
    type FrameRequest = Subscription;
    type Surface = HeadlessSurface;

    fn container_bounds(&self) -> Bounds {
        self.bounds.get()
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport.get()
    }

    fn clear_container(&self) {
        self.container_clears.set(self.container_clears.get() + 1);
    }

    fn create_surface(&self, width: u32, height: u32) -> ViewerResult<HeadlessSurface> {
        if self.surface_failure.get() {
            return Err(ViewerError::surface("headless surface creation disabled"));
        }
        Ok(HeadlessSurface::new(width, height, self.stats.clone()))
    }

    fn listen_pointer(&self, handler: PointerHandler) -> Subscription {
        self.hub.subscribe_pointer(handler)
    }

    fn listen_resize(&self, handler: ResizeHandler) -> Subscription {
        self.hub.subscribe_resize(handler)
    }

    fn request_frame(&self, callback: FrameCallback) -> Subscription {
        self.hub.schedule_frame(callback)
    }

    fn fetch(&self, url: &str, on_progress: ProgressHandler, on_complete: FetchCompletion) {
        self.requested.borrow_mut().push(url.to_string());
        self.pending.borrow_mut().push_back(PendingFetch {
            url: url.to_string(),
            on_progress,
            on_complete,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn relative_urls_strip_base_path() {
        assert_eq!(url_to_relative("/models/a.glb", ""), "models/a.glb");
        assert_eq!(
            url_to_relative("/dimitry-portfolio/models/a.glb", "/dimitry-portfolio"),
            "models/a.glb"
        );
        assert_eq!(
            url_to_relative("/dimitry-portfolio-old/a.glb", "/dimitry-portfolio"),
            "dimitry-portfolio-old/a.glb"
        );
    }

    #[test]
    fn fetches_complete_only_when_delivered() {
        let platform = HeadlessPlatform::new(10, 10);
        platform.insert_asset("/a.bin", vec![1, 2, 3]);
        let result = Rc::new(RefCell::new(None));
        let slot = result.clone();
        platform.fetch(
            "/a.bin",
            Box::new(|_| {}),
            Box::new(move |bytes| *slot.borrow_mut() = Some(bytes.map(|b| b.len()))),
        );
        assert!(result.borrow().is_none());
        assert_eq!(platform.deliver_fetches(), 1);
        assert!(matches!(*result.borrow(), Some(Ok(3))));
    }

    #[test]
    fn directory_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/a.glb"), b"glb").unwrap();
        let source = AssetSource::Directory {
            root: dir.path().to_path_buf(),
            base_path: "/site".into(),
        };
        assert_eq!(source.read("/site/models/a.glb").unwrap(), b"glb".to_vec());
        assert!(matches!(
            source.read("/models/missing.glb"),
            Err(ViewerError::AssetNotFound { .. })
        ));
    }
}
