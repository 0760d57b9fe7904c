use gloo_events::EventListener;
use glam::Vec2;
use js_sys::{Reflect, Uint8Array};
use log::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    CanvasRenderingContext2d, Document, Event, HtmlCanvasElement, HtmlElement, MouseEvent,
    ReadableStreamDefaultReader, Response, Window,
};

use super::{
    Bounds, FetchCompletion, FetchProgress, FrameCallback, Platform, PointerEvent,
    PointerHandler, ProgressHandler, ResizeHandler,
};
use crate::background::{Backdrop, BackdropFrame};
use crate::error::{ViewerError, ViewerResult};
use crate::render::wasm::CanvasSurface;

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

pub(crate) fn browser_window() -> ViewerResult<Window> {
    web_sys::window().ok_or_else(|| ViewerError::ContainerUnavailable("window not available".into()))
}

pub(crate) fn browser_document() -> ViewerResult<Document> {
    browser_window()?
        .document()
        .ok_or_else(|| ViewerError::ContainerUnavailable("document not available".into()))
}

/// A pending `requestAnimationFrame`. Dropping it cancels the frame if it has
/// not fired yet.
pub struct AnimationFrame {
    window: Window,
    id: Option<i32>,
    _closure: Closure<dyn FnMut()>,
}

impl Drop for AnimationFrame {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            // cancelling a frame that already ran is harmless
            let _ = self.window.cancel_animation_frame(id);
        }
    }
}

/// DOM host: one container element inside the browser window.
pub struct WebPlatform {
    window: Window,
    container: HtmlElement,
}

impl WebPlatform {
    pub fn new(container: HtmlElement) -> ViewerResult<Self> {
        Ok(Self {
            window: browser_window()?,
            container,
        })
    }

    pub fn for_element_id(id: &str) -> ViewerResult<Self> {
        let container = browser_document()?
            .get_element_by_id(id)
            .ok_or_else(|| ViewerError::ContainerUnavailable(format!("no element with id {id}")))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ViewerError::ContainerUnavailable(format!("#{id} is not an html element")))?;
        Self::new(container)
    }

    /// Platform whose container is the document body.
    pub fn for_body() -> ViewerResult<Self> {
        let body = browser_document()?
            .body()
            .ok_or_else(|| ViewerError::ContainerUnavailable("document has no body".into()))?;
        Self::new(body)
    }

    pub fn container(&self) -> &HtmlElement {
        &self.container
    }
}

impl Platform for WebPlatform {
    type Listener = EventListener;
    type FrameRequest = AnimationFrame;
    type Surface = CanvasSurface;

    fn container_bounds(&self) -> Bounds {
        let rect = self.container.get_bounding_client_rect();
        Bounds {
            left: rect.left() as f32,
            top: rect.top() as f32,
            width: rect.width() as f32,
            height: rect.height() as f32,
        }
    }

    fn viewport_size(&self) -> (u32, u32) {
        let dimension = |value: Result<JsValue, JsValue>| {
            value
                .ok()
                .and_then(|v| v.as_f64())
                .map_or(1, |v| v.max(1.0) as u32)
        };
        (
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
        )
    }

    fn clear_container(&self) {
        self.container.set_inner_html("");
    }

    fn create_surface(&self, width: u32, height: u32) -> ViewerResult<CanvasSurface> {
        let document = browser_document()?;
        let canvas = document
            .create_element("canvas")
            .map_err(|err| ViewerError::surface(format!("failed to create canvas: {}", js_message(&err))))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ViewerError::surface("created element is not a canvas"))?;
        canvas.set_width(width);
        canvas.set_height(height);
        let style = canvas.style();
        for (name, value) in [("display", "block"), ("width", "100%"), ("height", "100%")] {
            if let Err(err) = style.set_property(name, value) {
                warn!("failed to style canvas: {}", js_message(&err));
            }
        }
        self.container
            .append_child(&canvas)
            .map_err(|err| ViewerError::surface(format!("failed to append canvas: {}", js_message(&err))))?;
        CanvasSurface::new(canvas)
    }

    fn listen_pointer(&self, mut handler: PointerHandler) -> EventListener {
        EventListener::new(&self.container, "mousemove", move |event: &Event| {
            if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
                handler(PointerEvent {
                    client: Vec2::new(mouse.client_x() as f32, mouse.client_y() as f32),
                });
            }
        })
    }

    fn listen_resize(&self, mut handler: ResizeHandler) -> EventListener {
        EventListener::new(&self.window, "resize", move |_event: &Event| handler())
    }

    fn request_frame(&self, callback: FrameCallback) -> AnimationFrame {
        let closure = Closure::once(callback);
        let id = match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("requestAnimationFrame failed: {}", js_message(&err));
                None
            }
        };
        AnimationFrame {
            window: self.window.clone(),
            id,
            _closure: closure,
        }
    }

    fn fetch(&self, url: &str, mut on_progress: ProgressHandler, on_complete: FetchCompletion) {
        let window = self.window.clone();
        let url = url.to_string();
        spawn_local(async move {
            let result = fetch_bytes(&window, &url, &mut on_progress).await;
            on_complete(result);
        });
    }
}

async fn fetch_bytes(
    window: &Window,
    url: &str,
    on_progress: &mut ProgressHandler,
) -> ViewerResult<Vec<u8>> {
    debug!("fetching {url}");
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|err| ViewerError::fetch(url, js_message(&err)))?
        .dyn_into::<Response>()
        .map_err(|_| ViewerError::fetch(url, "fetch did not yield a response"))?;

    if response.status() == 404 {
        return Err(ViewerError::AssetNotFound {
            url: url.to_string(),
        });
    }
    if !response.ok() {
        return Err(ViewerError::fetch(
            url,
            format!("HTTP status {}", response.status()),
        ));
    }

    let total = response
        .headers()
        .get("content-length")
        .ok()
        .flatten()
        .and_then(|length| length.trim().parse::<u64>().ok());
    let Some(body) = response.body() else {
        return Ok(Vec::new());
    };
    let reader = body
        .get_reader()
        .dyn_into::<ReadableStreamDefaultReader>()
        .map_err(|_| ViewerError::fetch(url, "response body is not readable"))?;

    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    loop {
        let chunk = JsFuture::from(reader.read())
            .await
            .map_err(|err| ViewerError::fetch(url, js_message(&err)))?;
        let done = Reflect::get(&chunk, &JsValue::from_str("done"))
            .map_err(|err| ViewerError::fetch(url, js_message(&err)))?
            .as_bool()
            .unwrap_or(true);
        if done {
            return Ok(bytes);
        }
        let value = Reflect::get(&chunk, &JsValue::from_str("value"))
            .map_err(|err| ViewerError::fetch(url, js_message(&err)))?;
        bytes.extend(Uint8Array::new(&value).to_vec());
        on_progress(FetchProgress {
            loaded: bytes.len() as u64,
            total,
        });
    }
}

/// Full-viewport canvas the topographic background paints on.
pub struct CanvasBackdrop {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl CanvasBackdrop {
    /// Looks up the background canvas. `None` when it is missing or has no
    /// 2d context.
    pub fn from_element_id(id: &str) -> Option<Self> {
        let canvas = browser_document()
            .ok()?
            .get_element_by_id(id)?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        let context = canvas
            .get_context("2d")
            .ok()
            .flatten()?
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        Some(Self { canvas, context })
    }
}

impl Backdrop for CanvasBackdrop {
    fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn paint(&mut self, frame: &BackdropFrame) {
        let (width, height) = (frame.width as f64, frame.height as f64);
        self.context.clear_rect(0.0, 0.0, width, height);
        let gradient = self.context.create_linear_gradient(0.0, 0.0, 0.0, height);
        for (offset, color) in frame.gradient {
            if let Err(err) = gradient.add_color_stop(*offset, color) {
                warn!("invalid gradient stop {color}: {}", js_message(&err));
            }
        }
        self.context.set_fill_style(&gradient);
        self.context.fill_rect(0.0, 0.0, width, height);

        for line in &frame.lines {
            let mut points = line.points.iter();
            let Some(first) = points.next() else {
                continue;
            };
            self.context
                .set_stroke_style(&JsValue::from_str(line.family.stroke));
            self.context.set_line_width(line.family.width as f64);
            self.context.begin_path();
            self.context.move_to(first.x as f64, first.y as f64);
            for point in points {
                self.context.line_to(point.x as f64, point.y as f64);
            }
            self.context.stroke();
        }
    }
}
