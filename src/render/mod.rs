pub mod common;
pub mod headless;
pub mod raster;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

use crate::error::ViewerResult;
use crate::geometry::MeshData;
use crate::resources::{GeometryId, MaterialId};
use crate::scene::{Material, PerspectiveCamera, Scene};

pub use common::LightRig;
pub use headless::{HeadlessSurface, SurfaceStats};
#[cfg(not(target_arch = "wasm32"))]
pub use native::WindowSurface;
#[cfg(target_arch = "wasm32")]
pub use wasm::CanvasSurface;

/// Drawing target owned by one scene session.
///
/// Geometry and materials live on the surface and are addressed by id; the
/// session's ledger is responsible for releasing them before `dispose`.
pub trait RenderSurface {
    fn size(&self) -> (u32, u32);

    /// Zero-sized requests are ignored.
    fn resize(&mut self, width: u32, height: u32);

    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryId;

    fn create_material(&mut self, material: &Material) -> MaterialId;

    fn release_geometry(&mut self, id: GeometryId);

    fn release_material(&mut self, id: MaterialId);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> ViewerResult<()>;

    /// Frees the surface and detaches it from its container. Idempotent.
    fn dispose(&mut self);
}
