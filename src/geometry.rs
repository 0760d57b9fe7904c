use std::f32::consts::TAU;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Number of `f32`s per interleaved vertex (`position.xyz`, `normal.xyz`).
pub const VERTEX_STRIDE: usize = 6;

/// GPU ready mesh buffers.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE + 3;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|chunk| Vec3::new(chunk[0], chunk[1], chunk[2]))
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z,
        ]);
        index
    }

    /// Bounding box of the mesh in its own space.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    /// Bounding box of every vertex after applying `transform`.
    pub fn bounds_transformed(&self, transform: &Mat4) -> Aabb {
        Aabb::from_points(self.positions().map(|p| transform.transform_point3(p)))
    }

    /// Returns true when at least one vertex carries a zero normal.
    pub fn needs_normals(&self) -> bool {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
    }

    /// Replaces every normal with the normalized sum of adjacent face normals.
    pub fn compute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertex_count()];

        for triangle in self.indices.chunks_exact(3) {
            let i0 = triangle[0] as usize;
            let i1 = triangle[1] as usize;
            let i2 = triangle[2] as usize;
            let p0 = self.position(i0);
            let p1 = self.position(i1);
            let p2 = self.position(i2);
            let normal = (p1 - p0).cross(p2 - p0);
            if normal.length_squared() > f32::EPSILON {
                let normal = normal.normalize();
                accum[i0] += normal;
                accum[i1] += normal;
                accum[i2] += normal;
            }
        }

        for (i, normal) in accum.into_iter().enumerate() {
            let normal = normal.normalize_or_zero();
            let base = i * VERTEX_STRIDE + 3;
            self.vertices[base] = normal.x;
            self.vertices[base + 1] = normal.y;
            self.vertices[base + 2] = normal.z;
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.extend(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let (min, max) = (self.min, self.max);
        Self::from_points((0..8).map(|corner| {
            let p = Vec3::new(
                if corner & 1 == 0 { min.x } else { max.x },
                if corner & 2 == 0 { min.y } else { max.y },
                if corner & 4 == 0 { min.z } else { max.z },
            );
            transform.transform_point3(p)
        }))
    }
}

/// Parametric shape generated in code rather than loaded from a file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Primitive {
    Box {
        size: f32,
    },
    Tetrahedron {
        radius: f32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
        height_segments: u32,
    },
    Torus {
        radius: f32,
        tube: f32,
        radial_segments: u32,
        tubular_segments: u32,
    },
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Tetrahedron { .. } => "tetrahedron",
            Self::Cylinder { .. } => "cylinder",
            Self::Torus { .. } => "torus",
        }
    }

    /// The dimension that scales with the caller's multiplier: edge length,
    /// circumradius, top radius or ring radius.
    pub fn characteristic_size(&self) -> f32 {
        match *self {
            Self::Box { size } => size,
            Self::Tetrahedron { radius } => radius,
            Self::Cylinder { radius_top, .. } => radius_top,
            Self::Torus { radius, .. } => radius,
        }
    }

    pub fn mesh(&self) -> MeshData {
        match *self {
            Self::Box { size } => box_mesh(size),
            Self::Tetrahedron { radius } => tetrahedron(radius),
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                radial_segments,
                height_segments,
            } => cylinder(
                radius_top,
                radius_bottom,
                height,
                radial_segments,
                height_segments,
            ),
            Self::Torus {
                radius,
                tube,
                radial_segments,
                tubular_segments,
            } => torus(radius, tube, radial_segments, tubular_segments),
        }
    }
}

/// Axis-aligned cube centred on the origin with one flat normal per face.
pub fn box_mesh(size: f32) -> MeshData {
    let half = size * 0.5;
    // (normal, u, v) with u × v == normal so every face winds counter-clockwise
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut mesh = MeshData::default();
    for (normal, u, v) in faces {
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let base = mesh.vertex_count() as u32;
        for (su, sv) in corners {
            mesh.push_vertex((normal + u * su + v * sv) * half, normal);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Regular tetrahedron inscribed in a sphere of `radius`, flat shaded.
pub fn tetrahedron(radius: f32) -> MeshData {
    let corners = [
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
    ]
    .map(|corner| corner.normalize() * radius);
    let faces = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];

    let mut mesh = MeshData::default();
    for face in faces {
        let [mut a, b, mut c] = face.map(|i| corners[i]);
        let mut normal = (b - a).cross(c - a).normalize_or_zero();
        if normal.dot(a + b + c) < 0.0 {
            std::mem::swap(&mut a, &mut c);
            normal = -normal;
        }
        let i0 = mesh.push_vertex(a, normal);
        let i1 = mesh.push_vertex(b, normal);
        let i2 = mesh.push_vertex(c, normal);
        mesh.indices.extend_from_slice(&[i0, i1, i2]);
    }
    mesh
}

/// Capped cylinder (or truncated cone) along the Y axis, centred on the origin.
pub fn cylinder(
    radius_top: f32,
    radius_bottom: f32,
    height: f32,
    radial_segments: u32,
    height_segments: u32,
) -> MeshData {
    let radial = radial_segments.max(3);
    let rows = height_segments.max(1);
    let half = height * 0.5;
    let slope = if height.abs() > f32::EPSILON {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };

    let mut mesh = MeshData::default();
    let mut grid = Vec::with_capacity(((rows + 1) * (radial + 1)) as usize);
    for y in 0..=rows {
        let v = y as f32 / rows as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        for x in 0..=radial {
            let theta = x as f32 / radial as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            let position = Vec3::new(radius * sin, half - v * height, radius * cos);
            let normal = Vec3::new(sin, slope, cos).normalize();
            grid.push(mesh.push_vertex(position, normal));
        }
    }
    let stride = radial + 1;
    for y in 0..rows {
        for x in 0..radial {
            let a = grid[(y * stride + x) as usize];
            let b = grid[((y + 1) * stride + x) as usize];
            let c = grid[((y + 1) * stride + x + 1) as usize];
            let d = grid[(y * stride + x + 1) as usize];
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    for (radius, top) in [(radius_top, true), (radius_bottom, false)] {
        if radius <= 0.0 {
            continue;
        }
        let (y, normal) = if top { (half, Vec3::Y) } else { (-half, Vec3::NEG_Y) };
        let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal);
        let ring: Vec<u32> = (0..=radial)
            .map(|x| {
                let theta = x as f32 / radial as f32 * TAU;
                let (sin, cos) = theta.sin_cos();
                mesh.push_vertex(Vec3::new(radius * sin, y, radius * cos), normal)
            })
            .collect();
        for pair in ring.windows(2) {
            if top {
                mesh.indices.extend_from_slice(&[center, pair[0], pair[1]]);
            } else {
                mesh.indices.extend_from_slice(&[center, pair[1], pair[0]]);
            }
        }
    }
    mesh
}

/// Ring torus in the XY plane: `radius` from the centre to the middle of the
/// tube, `tube` the tube radius.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> MeshData {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);
    let mut mesh = MeshData::default();

    for j in 0..=radial {
        let v = j as f32 / radial as f32 * TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * TAU;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            mesh.push_vertex(position, (position - center).normalize_or_zero());
        }
    }

    let stride = tubular + 1;
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = stride * j + i - 1;
            let b = stride * (j - 1) + i - 1;
            let c = stride * (j - 1) + i;
            let d = stride * j + i;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn box_extent_matches_size() {
        let mesh = box_mesh(2.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        let bounds = mesh.bounds();
        assert!(approx(bounds.max_dimension(), 2.0));
        assert!(bounds.center().length() < 1e-5);
    }

    #[test]
    fn box_faces_wind_outward() {
        let mesh = box_mesh(1.0);
        for tri in mesh.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| mesh.position(i as usize)).collect();
            let face_normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize();
            assert!(face_normal.dot(mesh.normal(tri[0] as usize)) > 0.99);
        }
    }

    #[test]
    fn tetrahedron_vertices_sit_on_sphere() {
        let mesh = tetrahedron(1.5);
        assert_eq!(mesh.triangle_count(), 4);
        for p in mesh.positions() {
            assert!(approx(p.length(), 1.5));
        }
        for tri in mesh.indices.chunks_exact(3) {
            let normal = mesh.normal(tri[0] as usize);
            assert!(normal.dot(mesh.position(tri[0] as usize)) > 0.0);
        }
    }

    #[test]
    fn cylinder_dimensions() {
        let mesh = cylinder(1.2, 1.2, 0.6, 32, 8);
        let size = mesh.bounds().size();
        assert!(approx(size.y, 0.6));
        assert!(approx(size.x, 2.4));
        assert!(approx(size.z, 2.4));
        assert_eq!(mesh.triangle_count(), 32 * 8 * 2 + 32 * 2);
    }

    #[test]
    fn torus_dimensions() {
        let mesh = torus(1.0, 0.4, 16, 100);
        let size = mesh.bounds().size();
        assert!(approx(size.x, 2.8));
        assert!(approx(size.z, 0.8));
        assert_eq!(mesh.triangle_count(), 16 * 100 * 2);
    }

    #[test]
    fn computes_missing_normals() {
        let mut mesh = MeshData {
            vertices: vec![
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
            ],
            indices: vec![0, 1, 2],
        };
        assert!(mesh.needs_normals());
        mesh.compute_normals();
        assert!(!mesh.needs_normals());
        for i in 0..3 {
            assert!((mesh.normal(i) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn aabb_transform_and_union() {
        let unit = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let moved = unit.transformed(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert!((moved.center() - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        let both = unit.union(moved);
        assert!(approx(both.size().x, 3.0));
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.union(unit), unit);
        assert_eq!(Aabb::EMPTY.max_dimension(), 0.0);
    }

    #[test]
    fn characteristic_size_scales_linearly() {
        for m in [0.5_f32, 1.0, 1.6, 3.0] {
            let prim = Primitive::Torus {
                radius: m,
                tube: 0.4 * m,
                radial_segments: 16,
                tubular_segments: 100,
            };
            assert!(approx(prim.characteristic_size(), m));
            assert!(approx(prim.mesh().bounds().size().x, 2.8 * m));
        }
    }
}
