use glam::Vec3;
use log::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::raster::RasterCache;
use super::RenderSurface;
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::MeshData;
use crate::resources::{GeometryId, MaterialId};
use crate::scene::{Material, PerspectiveCamera, Scene};

/// Surface backed by a 2D canvas appended to the widget container.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    cache: RasterCache,
    size: (u32, u32),
    disposed: bool,
}

impl CanvasSurface {
    /// Wraps a canvas that is already attached to the document.
    pub fn new(canvas: HtmlCanvasElement) -> ViewerResult<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|err| ViewerError::surface(format!("failed to query canvas context: {err:?}")))?
            .ok_or_else(|| ViewerError::surface("canvas does not support a 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| ViewerError::surface("failed to cast canvas context"))?;

        let size = (canvas.width(), canvas.height());
        Ok(Self {
            canvas,
            context,
            cache: RasterCache::default(),
            size,
            disposed: false,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn fill(&self, color: Vec3) {
        self.context.set_fill_style(&JsValue::from_str(&css_rgb(color)));
        self.context
            .fill_rect(0.0, 0.0, self.size.0 as f64, self.size.1 as f64);
    }
}

impl RenderSurface for CanvasSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryId {
        self.cache.insert_mesh(mesh)
    }

    fn create_material(&mut self, material: &Material) -> MaterialId {
        self.cache.insert_material(material)
    }

    fn release_geometry(&mut self, id: GeometryId) {
        self.cache.remove_mesh(id);
    }

    fn release_material(&mut self, id: MaterialId) {
        self.cache.remove_material(id);
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> ViewerResult<()> {
        if self.disposed {
            return Err(ViewerError::surface("render on a disposed canvas"));
        }
        self.fill(scene.background);

        for triangle in self.cache.rasterize(scene, camera, self.size) {
            let style = JsValue::from_str(&css_rgb(triangle.color));
            let [a, b, c] = triangle.points;
            self.context.begin_path();
            self.context.move_to(a.x as f64, a.y as f64);
            self.context.line_to(b.x as f64, b.y as f64);
            self.context.line_to(c.x as f64, c.y as f64);
            self.context.close_path();
            self.context.set_fill_style(&style);
            self.context.fill();
            // hairline in the same colour hides anti-aliasing seams
            self.context.set_stroke_style(&style);
            self.context.set_line_width(0.5);
            self.context.stroke();
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cache.clear();
        if self.canvas.parent_node().is_none() {
            warn!("canvas was already detached from its container");
        }
        self.canvas.remove();
    }
}

fn css_rgb(color: Vec3) -> String {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    format!("rgb({}, {}, {})", c.x as u8, c.y as u8, c.z as u8)
}
