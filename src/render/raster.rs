//! Software projection shared by the headless and canvas surfaces.
//!
//! Triangles are transformed to screen space, back faces are culled and the
//! survivors are flat shaded and sorted far to near for painter's drawing.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use super::common::LightRig;
use crate::geometry::MeshData;
use crate::resources::{GeometryId, IdAllocator, MaterialId};
use crate::scene::{Material, PerspectiveCamera, Scene};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadedTriangle {
    /// Pixel coordinates, origin top-left.
    pub points: [Vec2; 3],
    /// Mean normalized device depth; larger is farther.
    pub depth: f32,
    pub color: Vec3,
}

/// CPU copies of everything uploaded to a software surface.
#[derive(Debug, Default)]
pub struct RasterCache {
    ids: IdAllocator,
    meshes: HashMap<GeometryId, MeshData>,
    materials: HashMap<MaterialId, Material>,
}

impl RasterCache {
    pub fn insert_mesh(&mut self, mesh: &MeshData) -> GeometryId {
        let id = self.ids.geometry();
        self.meshes.insert(id, mesh.clone());
        id
    }

    pub fn insert_material(&mut self, material: &Material) -> MaterialId {
        let id = self.ids.material();
        self.materials.insert(id, *material);
        id
    }

    pub fn remove_mesh(&mut self, id: GeometryId) -> bool {
        self.meshes.remove(&id).is_some()
    }

    pub fn remove_material(&mut self, id: MaterialId) -> bool {
        self.materials.remove(&id).is_some()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.materials.clear();
    }

    pub fn rasterize(
        &self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        size: (u32, u32),
    ) -> Vec<ShadedTriangle> {
        let rig = LightRig::from_scene(scene);
        let view_proj = camera.view_proj();
        let (width, height) = (size.0 as f32, size.1 as f32);
        let mut triangles = Vec::new();

        scene.walk(|node, world| {
            let Some(binding) = &node.mesh else {
                return;
            };
            let Some(mesh) = self.meshes.get(&binding.geometry) else {
                return;
            };
            let vertex_count = mesh.vertex_count();

            'faces: for (face, corners) in mesh.indices.chunks_exact(3).enumerate() {
                if corners.iter().any(|&index| index as usize >= vertex_count) {
                    continue;
                }
                let Some(material) = binding
                    .material
                    .material_at(face as u32 * 3)
                    .and_then(|id| self.materials.get(&id))
                else {
                    continue;
                };

                let world_points =
                    [0, 1, 2].map(|k| world.transform_point3(mesh.position(corners[k] as usize)));
                let [a, b, c] = world_points;
                let Some(normal) = (b - a).cross(c - a).try_normalize() else {
                    continue;
                };
                let centroid = (a + b + c) / 3.0;
                let to_eye = camera.position - centroid;
                if normal.dot(to_eye) <= 0.0 {
                    continue;
                }

                let mut points = [Vec2::ZERO; 3];
                let mut depth = 0.0;
                for (slot, point) in points.iter_mut().zip(world_points) {
                    let clip = view_proj * point.extend(1.0);
                    if clip.w <= f32::EPSILON {
                        continue 'faces;
                    }
                    let ndc = clip.truncate() / clip.w;
                    *slot = Vec2::new((ndc.x * 0.5 + 0.5) * width, (0.5 - ndc.y * 0.5) * height);
                    depth += ndc.z / 3.0;
                }

                triangles.push(ShadedTriangle {
                    points,
                    depth,
                    color: rig.shade(material, normal, to_eye.normalize_or_zero()),
                });
            }
        });

        triangles.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        triangles
    }
}
