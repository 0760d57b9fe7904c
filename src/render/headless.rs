use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use super::raster::{RasterCache, ShadedTriangle};
use super::RenderSurface;
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::MeshData;
use crate::resources::{GeometryId, MaterialId};
use crate::scene::{Material, PerspectiveCamera, Scene};

/// Counters shared between a headless platform and the surfaces it creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub created_surfaces: usize,
    pub live_surfaces: usize,
    pub live_geometries: usize,
    pub live_materials: usize,
    pub frames_rendered: u64,
    pub last_triangles: usize,
    pub last_size: (u32, u32),
}

/// Off-screen surface that rasterizes in software and keeps counts.
pub struct HeadlessSurface {
    cache: RasterCache,
    stats: Rc<RefCell<SurfaceStats>>,
    size: (u32, u32),
    last_frame: Vec<ShadedTriangle>,
    disposed: bool,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32, stats: Rc<RefCell<SurfaceStats>>) -> Self {
        {
            let mut stats = stats.borrow_mut();
            stats.created_surfaces += 1;
            stats.live_surfaces += 1;
            stats.last_size = (width, height);
        }
        Self {
            cache: RasterCache::default(),
            stats,
            size: (width, height),
            last_frame: Vec::new(),
            disposed: false,
        }
    }

    /// Triangles drawn by the most recent frame.
    pub fn last_frame(&self) -> &[ShadedTriangle] {
        &self.last_frame
    }
}

impl RenderSurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.stats.borrow_mut().last_size = self.size;
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryId {
        self.stats.borrow_mut().live_geometries += 1;
        self.cache.insert_mesh(mesh)
    }

    fn create_material(&mut self, material: &Material) -> MaterialId {
        self.stats.borrow_mut().live_materials += 1;
        self.cache.insert_material(material)
    }

    fn release_geometry(&mut self, id: GeometryId) {
        if self.cache.remove_mesh(id) {
            self.stats.borrow_mut().live_geometries -= 1;
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        if self.cache.remove_material(id) {
            self.stats.borrow_mut().live_materials -= 1;
        }
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> ViewerResult<()> {
        if self.disposed {
            return Err(ViewerError::surface("render on a disposed surface"));
        }
        self.last_frame = self.cache.rasterize(scene, camera, self.size);
        let mut stats = self.stats.borrow_mut();
        stats.frames_rendered += 1;
        stats.last_triangles = self.last_frame.len();
        trace!("headless frame {}: {} triangles", stats.frames_rendered, stats.last_triangles);
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let mut stats = self.stats.borrow_mut();
        stats.live_geometries -= self.cache.mesh_count();
        stats.live_materials -= self.cache.material_count();
        stats.live_surfaces -= 1;
        self.cache.clear();
        self.last_frame.clear();
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_mesh;

    #[test]
    fn dispose_settles_every_counter() {
        let stats = Rc::new(RefCell::new(SurfaceStats::default()));
        let mut surface = HeadlessSurface::new(32, 16, stats.clone());
        surface.upload_geometry(&box_mesh(1.0));
        surface.create_material(&Material::standard());
        surface.dispose();
        surface.dispose();

        let stats = stats.borrow();
        assert_eq!(stats.created_surfaces, 1);
        assert_eq!(stats.live_surfaces, 0);
        assert_eq!(stats.live_geometries, 0);
        assert_eq!(stats.live_materials, 0);
    }

    #[test]
    fn rendering_after_dispose_fails() {
        let stats = Rc::new(RefCell::new(SurfaceStats::default()));
        let mut surface = HeadlessSurface::new(32, 16, stats.clone());
        let scene = Scene::new(glam::Vec3::ONE);
        let camera = PerspectiveCamera::for_size(32, 16);
        surface.render(&scene, &camera).unwrap();
        assert_eq!(stats.borrow().frames_rendered, 1);

        surface.dispose();
        assert!(surface.render(&scene, &camera).is_err());
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let stats = Rc::new(RefCell::new(SurfaceStats::default()));
        let mut surface = HeadlessSurface::new(32, 16, stats);
        surface.resize(0, 10);
        assert_eq!(surface.size(), (32, 16));
        surface.resize(64, 48);
        assert_eq!(surface.size(), (64, 48));
    }
}
