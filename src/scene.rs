use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;
use crate::resources::{GeometryId, MaterialId};

/// Converts a `0xRRGGBB` literal into linear-ish RGB components in `[0, 1]`.
pub fn hex_color(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

/// Phong surface description shared by every mesh drawn by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Vec3,
    pub shininess: f32,
}

impl Material {
    /// Blue `#3b82f6`, shininess 100; used by every procedural shape.
    pub fn standard() -> Self {
        Self {
            color: hex_color(0x3b82f6),
            shininess: 100.0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::standard()
    }
}

/// Translation, rotation and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Ambient {
        color: Vec3,
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: Vec3,
        intensity: f32,
        position: Vec3,
    },
}

/// Range of indices drawn with one material of a multi-material mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRange {
    pub start: u32,
    pub count: u32,
    pub material: MaterialId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialSlot {
    Single(MaterialId),
    Multi(Vec<MaterialRange>),
}

impl MaterialSlot {
    pub fn ids(&self) -> Vec<MaterialId> {
        match self {
            Self::Single(id) => vec![*id],
            Self::Multi(ranges) => ranges.iter().map(|range| range.material).collect(),
        }
    }

    /// Material used for the triangle starting at index offset `first_index`.
    pub fn material_at(&self, first_index: u32) -> Option<MaterialId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::Multi(ranges) => ranges
                .iter()
                .find(|range| first_index >= range.start && first_index < range.start + range.count)
                .map(|range| range.material),
        }
    }
}

/// GPU-side mesh referenced by a node, with its local bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshBinding {
    pub geometry: GeometryId,
    pub material: MaterialSlot,
    pub bounds: Aabb,
    pub triangles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshBinding>,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn with_mesh(name: impl Into<String>, mesh: MeshBinding) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::group(name)
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Visits this node and its descendants with their world matrices.
    pub fn walk<F>(&self, parent: &Mat4, visit: &mut F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        let world = *parent * self.transform.matrix();
        visit(self, &world);
        for child in &self.children {
            child.walk(&world, visit);
        }
    }
}

/// Runtime scene graph for one widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub background: Vec3,
    pub lights: Vec<Light>,
    pub objects: Vec<SceneNode>,
}

impl Scene {
    pub fn new(background: Vec3) -> Self {
        Self {
            background,
            lights: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Adds a top-level object and returns its index.
    pub fn add(&mut self, node: SceneNode) -> usize {
        self.objects.push(node);
        self.objects.len() - 1
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.lights.clear();
    }

    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        for object in &self.objects {
            object.walk(&Mat4::IDENTITY, &mut visit);
        }
    }

    /// World-space bounds of every mesh, using each mesh's transformed local box.
    pub fn world_bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.walk(|node, world| {
            if let Some(mesh) = &node.mesh {
                bounds = bounds.union(mesh.bounds.transformed(world));
            }
        });
        bounds
    }

    pub fn triangle_count(&self) -> usize {
        let mut total = 0;
        self.walk(|node, _| total += node.mesh.as_ref().map_or(0, |mesh| mesh.triangles));
        total
    }

    /// Every geometry and material id referenced anywhere in the graph.
    pub fn resource_ids(&self) -> (Vec<GeometryId>, Vec<MaterialId>) {
        let mut geometries = Vec::new();
        let mut materials = Vec::new();
        self.walk(|node, _| {
            if let Some(mesh) = &node.mesh {
                geometries.push(mesh.geometry);
                materials.extend(mesh.material.ids());
            }
        });
        (geometries, materials)
    }
}

/// Perspective camera looking down -Z from `position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl PerspectiveCamera {
    pub const FOV_DEGREES: f32 = 75.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 1000.0;
    pub const DISTANCE: f32 = 3.0;

    pub fn new(aspect: f32) -> Self {
        Self {
            fov_degrees: Self::FOV_DEGREES,
            aspect: sanitize_aspect(aspect),
            near: Self::NEAR,
            far: Self::FAR,
            position: Vec3::new(0.0, 0.0, Self::DISTANCE),
        }
    }

    /// Aspect ratio for a `width × height` container.
    pub fn for_size(width: u32, height: u32) -> Self {
        Self::new(aspect_ratio(width, height))
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = sanitize_aspect(aspect);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position - Vec3::Z, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}
