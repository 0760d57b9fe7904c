use serde::{Deserialize, Serialize};

use crate::geometry::MeshData;
use crate::render::RenderSurface;
use crate::scene::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u64);

/// Sequential handle source owned by a surface.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub fn geometry(&mut self) -> GeometryId {
        GeometryId(self.bump())
    }

    pub fn material(&mut self) -> MaterialId {
        MaterialId(self.bump())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Geometry(GeometryId),
    Material(MaterialId),
}

/// Disposal list for everything a session allocates on its surface.
///
/// Allocations go through the ledger so they are recorded the moment they
/// exist; `release_all` hands them back newest first.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: Vec<Allocation>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_geometry<S>(&mut self, surface: &mut S, mesh: &MeshData) -> GeometryId
    where
        S: RenderSurface + ?Sized,
    {
        let id = surface.upload_geometry(mesh);
        self.entries.push(Allocation::Geometry(id));
        id
    }

    pub fn create_material<S>(&mut self, surface: &mut S, material: &Material) -> MaterialId
    where
        S: RenderSurface + ?Sized,
    {
        let id = surface.create_material(material);
        self.entries.push(Allocation::Material(id));
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_geometry(&self, id: GeometryId) -> bool {
        self.entries.contains(&Allocation::Geometry(id))
    }

    pub fn contains_material(&self, id: MaterialId) -> bool {
        self.entries.contains(&Allocation::Material(id))
    }

    /// Releases every recorded allocation in reverse order and returns how
    /// many were released.
    pub fn release_all<S>(&mut self, surface: &mut S) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        let released = self.entries.len();
        for entry in self.entries.drain(..).rev() {
            match entry {
                Allocation::Geometry(id) => surface.release_geometry(id),
                Allocation::Material(id) => surface.release_material(id),
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::geometry::box_mesh;
    use crate::render::headless::{HeadlessSurface, SurfaceStats};

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut ids = IdAllocator::default();
        let geometry = ids.geometry();
        let material = ids.material();
        assert_ne!(geometry.0, material.0);
    }

    #[test]
    fn release_all_returns_surface_to_zero() {
        let stats = Rc::new(RefCell::new(SurfaceStats::default()));
        let mut surface = HeadlessSurface::new(64, 64, stats.clone());
        let mut ledger = ResourceLedger::new();

        let geometry = ledger.upload_geometry(&mut surface, &box_mesh(1.0));
        let material = ledger.create_material(&mut surface, &Material::standard());
        assert!(ledger.contains_geometry(geometry));
        assert!(ledger.contains_material(material));
        assert_eq!(stats.borrow().live_geometries, 1);
        assert_eq!(stats.borrow().live_materials, 1);

        assert_eq!(ledger.release_all(&mut surface), 2);
        assert!(ledger.is_empty());
        assert_eq!(stats.borrow().live_geometries, 0);
        assert_eq!(stats.borrow().live_materials, 0);
        assert_eq!(ledger.release_all(&mut surface), 0);
    }
}
