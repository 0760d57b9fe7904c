use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use glam::Vec2;
use log::{debug, warn};
use parking_lot::Mutex;
use winit::event::WindowEvent;
use winit::window::Window;

use super::headless::url_to_relative;
use super::hub::{EventHub, Subscription};
use super::{
    Bounds, FetchCompletion, FetchProgress, FrameCallback, Platform, PointerEvent,
    PointerHandler, ProgressHandler, ResizeHandler,
};
use crate::error::{ViewerError, ViewerResult};
use crate::render::native::WindowSurface;

const READ_CHUNK: usize = 64 * 1024;

enum ReadEvent {
    Progress { loaded: u64, total: Option<u64> },
    Done(io::Result<Vec<u8>>),
}

type Finished = Arc<Mutex<Vec<(u64, ReadEvent)>>>;

/// Reads `path` in fixed-size chunks, reporting the running byte count after
/// each one.
fn read_in_chunks(path: &Path, mut report: impl FnMut(u64, Option<u64>)) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let total = file.metadata().ok().map(|metadata| metadata.len());
    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0; READ_CHUNK];
    loop {
        let read = match file.read(&mut chunk) {
            Ok(0) => return Ok(bytes),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        bytes.extend_from_slice(&chunk[..read]);
        report(bytes.len() as u64, total);
    }
}

/// Reads asset files on worker threads and hands the bytes back to the UI
/// thread through a locked queue. Callbacks only ever run in [`pump`].
///
/// [`pump`]: FileFetcher::pump
struct FileFetcher {
    root: PathBuf,
    base_path: String,
    next_id: Cell<u64>,
    waiting: RefCell<HashMap<u64, (String, ProgressHandler, FetchCompletion)>>,
    finished: Finished,
    workers: RefCell<Vec<JoinHandle<()>>>,
}

impl FileFetcher {
    fn new(root: PathBuf, base_path: String) -> Self {
        Self {
            root,
            base_path,
            next_id: Cell::new(0),
            waiting: RefCell::new(HashMap::new()),
            finished: Arc::new(Mutex::new(Vec::new())),
            workers: RefCell::new(Vec::new()),
        }
    }

    fn fetch(&self, url: &str, on_progress: ProgressHandler, on_complete: FetchCompletion) {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.waiting
            .borrow_mut()
            .insert(id, (url.to_string(), on_progress, on_complete));

        let path = self.root.join(url_to_relative(url, &self.base_path));
        let finished = Arc::clone(&self.finished);
        debug!("reading {} for {url}", path.display());
        let handle = thread::spawn(move || {
            let result = read_in_chunks(&path, |loaded, total| {
                finished
                    .lock()
                    .push((id, ReadEvent::Progress { loaded, total }));
            });
            finished.lock().push((id, ReadEvent::Done(result)));
        });

        let mut workers = self.workers.borrow_mut();
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
    }

    fn pump(&self) -> usize {
        let events = std::mem::take(&mut *self.finished.lock());
        let mut delivered = 0;
        for (id, event) in events {
            let entry = self.waiting.borrow_mut().remove(&id);
            let Some((url, mut on_progress, on_complete)) = entry else {
                continue;
            };
            let result = match event {
                ReadEvent::Progress { loaded, total } => {
                    on_progress(FetchProgress { loaded, total });
                    self.waiting
                        .borrow_mut()
                        .insert(id, (url, on_progress, on_complete));
                    continue;
                }
                ReadEvent::Done(Ok(bytes)) => Ok(bytes),
                ReadEvent::Done(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
                    Err(ViewerError::AssetNotFound { url: url.clone() })
                }
                ReadEvent::Done(Err(err)) => Err(ViewerError::fetch(url.as_str(), err.to_string())),
            };
            on_complete(result);
            delivered += 1;
        }
        delivered
    }
}

impl Drop for FileFetcher {
    fn drop(&mut self) {
        for worker in self.workers.get_mut().drain(..) {
            if worker.join().is_err() {
                warn!("asset reader thread panicked");
            }
        }
    }
}

/// A single desktop window hosting one widget.
pub struct DesktopPlatform {
    window: Arc<Window>,
    hub: EventHub,
    fetcher: FileFetcher,
}

impl DesktopPlatform {
    /// `asset_root` plays the role of the site's public directory; URLs are
    /// mapped onto it after stripping `base_path`.
    pub fn new(window: Arc<Window>, asset_root: PathBuf, base_path: String) -> Self {
        Self {
            window,
            hub: EventHub::new(),
            fetcher: FileFetcher::new(asset_root, base_path),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Delivers completed file reads. Call once per event-loop iteration.
    pub fn pump_fetches(&self) -> usize {
        self.fetcher.pump()
    }

    /// Runs the frame callbacks requested since the last redraw.
    pub fn run_frames(&self) -> usize {
        self.hub.run_frames()
    }

    /// Forwards the window events a widget listens to.
    pub fn handle_window_event(&self, event: &WindowEvent<'_>) {
        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.hub.dispatch_resize();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.hub.dispatch_pointer(PointerEvent {
                    client: Vec2::new(position.x as f32, position.y as f32),
                });
            }
            _ => {}
        }
    }
}

impl Platform for DesktopPlatform {
    type Listener = Subscription;
    type FrameRequest = Subscription;
    type Surface = WindowSurface;

    fn container_bounds(&self) -> Bounds {
        let size = self.window.inner_size();
        Bounds::sized(size.width as f32, size.height as f32)
    }

    fn viewport_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn clear_container(&self) {}

    fn create_surface(&self, _width: u32, _height: u32) -> ViewerResult<WindowSurface> {
        pollster::block_on(WindowSurface::new(Arc::clone(&self.window)))
    }

    fn listen_pointer(&self, handler: PointerHandler) -> Subscription {
        self.hub.subscribe_pointer(handler)
    }

    fn listen_resize(&self, handler: ResizeHandler) -> Subscription {
        self.hub.subscribe_resize(handler)
    }

    fn request_frame(&self, callback: FrameCallback) -> Subscription {
        self.window.request_redraw();
        self.hub.schedule_frame(callback)
    }

    fn fetch(&self, url: &str, on_progress: ProgressHandler, on_complete: FetchCompletion) {
        self.fetcher.fetch(url, on_progress, on_complete);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use super::*;

    fn pump_until(fetcher: &FileFetcher, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut delivered = 0;
        while delivered < expected && Instant::now() < deadline {
            delivered += fetcher.pump();
            thread::sleep(Duration::from_millis(5));
        }
        delivered
    }

    #[test]
    fn worker_reads_are_delivered_on_pump() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/a.glb"), [7u8; 12]).unwrap();

        let fetcher = FileFetcher::new(dir.path().to_path_buf(), "/site".into());
        let results = Rc::new(RefCell::new(Vec::new()));
        for url in ["/site/models/a.glb", "/models/missing.glb"] {
            let sink = results.clone();
            fetcher.fetch(
                url,
                Box::new(|_| {}),
                Box::new(move |result| sink.borrow_mut().push(result.map(|b| b.len()))),
            );
        }
        // nothing runs inside fetch
        assert!(results.borrow().is_empty());

        assert_eq!(pump_until(&fetcher, 2), 2);
        let results = results.borrow();
        assert!(results.iter().any(|r| matches!(r, Ok(12))));
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ViewerError::AssetNotFound { .. }))));
    }

    #[test]
    fn large_reads_report_progress_before_completing() {
        let dir = tempfile::tempdir().unwrap();
        let size = READ_CHUNK * 2 + 1000;
        std::fs::write(dir.path().join("big.glb"), vec![1u8; size]).unwrap();

        let fetcher = FileFetcher::new(dir.path().to_path_buf(), String::new());
        let progress = Rc::new(RefCell::new(Vec::new()));
        let completed = Rc::new(Cell::new(None));
        let sink = progress.clone();
        let done = completed.clone();
        fetcher.fetch(
            "/big.glb",
            Box::new(move |event| sink.borrow_mut().push(event)),
            Box::new(move |result| done.set(Some(result.map(|b| b.len()).ok()))),
        );

        assert_eq!(pump_until(&fetcher, 1), 1);
        assert_eq!(completed.get(), Some(Some(size)));
        let progress = progress.borrow();
        assert!(progress.len() >= 3, "{progress:?}");
        assert!(progress.iter().all(|event| event.total == Some(size as u64)));
        assert!(progress.windows(2).all(|pair| pair[0].loaded < pair[1].loaded));
        assert_eq!(progress.last().map(|event| event.loaded), Some(size as u64));
    }
}
