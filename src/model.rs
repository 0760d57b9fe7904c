//! Authored model decoding.
//!
//! glTF JSON and binary GLB containers are decoded from bytes into a plain
//! node tree that the widget uploads and fits. Decoding is split in two:
//! [`ModelDocument::parse`] reads the document and lists the buffers stored
//! in separate files, which the caller fetches before calling
//! [`ModelDocument::decode`].

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use log::{debug, warn};

use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{Aabb, MeshData};
use crate::scene::{Material, Transform};

/// Index range drawn with one entry of [`ModelMesh::materials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialGroup {
    pub start: u32,
    pub count: u32,
    pub material: usize,
}

/// All primitives of one glTF mesh merged into a single geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMesh {
    pub name: Option<String>,
    pub geometry: MeshData,
    pub materials: Vec<Material>,
    pub groups: Vec<MaterialGroup>,
}

impl ModelMesh {
    pub fn is_multi_material(&self) -> bool {
        self.groups.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: Option<String>,
    pub transform: Transform,
    pub mesh: Option<ModelMesh>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    fn visit<F>(&self, parent: &Mat4, visit: &mut F)
    where
        F: FnMut(&ModelNode, &Mat4),
    {
        let world = *parent * self.transform.matrix();
        visit(self, &world);
        for child in &self.children {
            child.visit(&world, visit);
        }
    }
}

/// Uniform scale and translation that centre a model on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f32,
    pub offset: Vec3,
}

impl Fit {
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.offset,
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(self.scale),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedModel {
    pub roots: Vec<ModelNode>,
}

impl DecodedModel {
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&ModelNode, &Mat4),
    {
        for root in &self.roots {
            root.visit(&Mat4::IDENTITY, &mut visit);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.walk(|node, _| count += usize::from(node.mesh.is_some()));
        count
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.walk(|node, _| {
            count += node
                .mesh
                .as_ref()
                .map_or(0, |mesh| mesh.geometry.triangle_count())
        });
        count
    }

    /// Exact world-space bounds over every vertex of every mesh.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.walk(|node, world| {
            if let Some(mesh) = &node.mesh {
                bounds = bounds.union(mesh.geometry.bounds_transformed(world));
            }
        });
        bounds
    }

    /// Scale and offset that make the largest dimension equal `target` with
    /// the bounding-box centre at the origin.
    pub fn fit(&self, target: f32) -> ViewerResult<Fit> {
        let bounds = self.bounds();
        let max_dimension = bounds.max_dimension();
        if bounds.is_empty() || !max_dimension.is_finite() || max_dimension <= f32::EPSILON {
            return Err(ViewerError::invalid_model("model has degenerate bounds"));
        }
        let scale = target / max_dimension;
        Ok(Fit {
            scale,
            offset: -bounds.center() * scale,
        })
    }
}

/// Nodes decoded from one document before it is rejected as malformed.
const MAX_NODES: usize = 65_536;

/// A buffer stored in its own file next to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBuffer {
    pub index: usize,
    pub uri: String,
    pub length: usize,
}

/// A parsed glTF or GLB document whose buffers may still have to be fetched.
pub struct ModelDocument {
    document: gltf::Document,
    blob: Option<Vec<u8>>,
}

impl ModelDocument {
    pub fn parse(bytes: &[u8]) -> ViewerResult<Self> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        Ok(Self { document, blob })
    }

    /// Buffers referenced by a relative or absolute URI rather than
    /// embedded as `data:` URIs or in the GLB binary chunk.
    pub fn external_buffers(&self) -> Vec<ExternalBuffer> {
        self.document
            .buffers()
            .filter_map(|buffer| match buffer.source() {
                gltf::buffer::Source::Uri(uri) if !is_data_uri(uri) => Some(ExternalBuffer {
                    index: buffer.index(),
                    uri: uri.to_string(),
                    length: buffer.length(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Decodes the node tree. `external` maps the index of every buffer
    /// listed by [`external_buffers`](Self::external_buffers) to its bytes.
    pub fn decode(self, external: &HashMap<usize, Vec<u8>>) -> ViewerResult<DecodedModel> {
        let Self { document, mut blob } = self;
        let buffers = document
            .buffers()
            .map(|buffer| {
                let mut data = match buffer.source() {
                    gltf::buffer::Source::Uri(uri) if !is_data_uri(uri) => external
                        .get(&buffer.index())
                        .cloned()
                        .ok_or_else(|| {
                            ViewerError::invalid_model(format!("buffer {uri} was not loaded"))
                        })?,
                    source => gltf::buffer::Data::from_source_and_blob(source, None, &mut blob)?.0,
                };
                if data.len() < buffer.length() {
                    return Err(ViewerError::invalid_model(format!(
                        "buffer {} holds {} bytes, {} expected",
                        buffer.index(),
                        data.len(),
                        buffer.length()
                    )));
                }
                while data.len() % 4 != 0 {
                    data.push(0);
                }
                Ok(gltf::buffer::Data(data))
            })
            .collect::<ViewerResult<Vec<_>>>()?;
        decode_document(&document, &buffers)
    }
}

fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decodes a glTF or GLB document whose buffers are all embedded.
pub fn decode_model(bytes: &[u8]) -> ViewerResult<DecodedModel> {
    ModelDocument::parse(bytes)?.decode(&HashMap::new())
}

fn decode_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> ViewerResult<DecodedModel> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| ViewerError::invalid_model("document has no scene"))?;

    let mut walk = NodeWalk::default();
    let roots = scene
        .nodes()
        .map(|node| walk.decode(&node, buffers))
        .collect::<ViewerResult<Vec<_>>>()?;
    let model = DecodedModel { roots };

    if model.triangle_count() == 0 {
        return Err(ViewerError::invalid_model("model contains no triangles"));
    }
    model.fit(1.0)?;
    debug!(
        "decoded model: {} meshes, {} triangles",
        model.mesh_count(),
        model.triangle_count()
    );
    Ok(model)
}

/// Depth-first decoding state: the current ancestor chain and the number of
/// nodes produced so far.
#[derive(Default)]
struct NodeWalk {
    ancestors: Vec<usize>,
    decoded: usize,
}

impl NodeWalk {
    fn decode(
        &mut self,
        node: &gltf::Node<'_>,
        buffers: &[gltf::buffer::Data],
    ) -> ViewerResult<ModelNode> {
        if self.ancestors.contains(&node.index()) {
            return Err(ViewerError::invalid_model("node hierarchy contains a cycle"));
        }
        self.decoded += 1;
        if self.decoded > MAX_NODES {
            return Err(ViewerError::invalid_model(format!(
                "node hierarchy expands to more than {MAX_NODES} nodes"
            )));
        }

        let (translation, rotation, scale) = node.transform().decomposed();
        let mesh = match node.mesh() {
            Some(mesh) => decode_mesh(&mesh, buffers)?,
            None => None,
        };

        self.ancestors.push(node.index());
        let children = node
            .children()
            .map(|child| self.decode(&child, buffers))
            .collect::<ViewerResult<Vec<_>>>()?;
        self.ancestors.pop();

        Ok(ModelNode {
            name: node.name().map(str::to_string),
            transform: Transform {
                position: Vec3::from(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from(scale),
            },
            mesh,
            children,
        })
    }
}

fn decode_mesh(
    mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
) -> ViewerResult<Option<ModelMesh>> {
    let mut geometry = MeshData::default();
    let mut materials = Vec::new();
    let mut groups = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(
                "skipping primitive {} of mesh {}: mode {:?} is not drawn",
                primitive.index(),
                mesh.index(),
                primitive.mode()
            );
            continue;
        }

        let reader =
            primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            warn!("skipping primitive {} without positions", primitive.index());
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);

        let base = geometry.vertex_count() as u32;
        let vertex_count = positions.len() as u32;
        for (index, position) in positions.iter().enumerate() {
            let normal = normals
                .as_ref()
                .and_then(|normals| normals.get(index))
                .copied()
                .unwrap_or([0.0; 3]);
            geometry.vertices.extend_from_slice(position);
            geometry.vertices.extend_from_slice(&normal);
        }

        let start = geometry.indices.len() as u32;
        match reader.read_indices() {
            Some(indices) => {
                for index in indices.into_u32() {
                    if index >= vertex_count {
                        return Err(ViewerError::invalid_model(format!(
                            "index {index} out of range in mesh {}",
                            mesh.index()
                        )));
                    }
                    geometry.indices.push(base + index);
                }
            }
            None => geometry.indices.extend(base..base + vertex_count),
        }
        let count = geometry.indices.len() as u32 - start;

        materials.push(material_from_gltf(&primitive.material()));
        groups.push(MaterialGroup {
            start,
            count,
            material: materials.len() - 1,
        });
    }

    if geometry.indices.is_empty() {
        return Ok(None);
    }
    if geometry.needs_normals() {
        geometry.compute_normals();
    }

    Ok(Some(ModelMesh {
        name: mesh.name().map(str::to_string),
        geometry,
        materials,
        groups,
    }))
}

fn material_from_gltf(material: &gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let roughness = pbr.roughness_factor().clamp(0.0, 1.0);
    Material {
        color: Vec3::new(r, g, b),
        shininess: ((1.0 - roughness) * 100.0).max(1.0),
    }
}

/// In-memory GLB documents for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use glam::Vec3;

    const GLB_MAGIC: &[u8; 4] = b"glTF";
    const CHUNK_JSON: u32 = 0x4E4F_534A;
    const CHUNK_BIN: u32 = 0x004E_4942;

    /// Corner index is `x | y << 1 | z << 2`; every face winds outward.
    const BOX_INDICES: [u16; 36] = [
        0, 2, 3, 0, 3, 1, // -z
        4, 5, 7, 4, 7, 6, // +z
        0, 4, 6, 0, 6, 2, // -x
        1, 3, 7, 1, 7, 5, // +x
        0, 1, 5, 0, 5, 4, // -y
        2, 6, 7, 2, 7, 3, // +y
    ];

    pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
        let total = 12 + 8 + json.len() + bin_chunk;
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            out.extend_from_slice(&bin);
        }
        out
    }

    /// A box spanning `min..max`, placed by a node translated by
    /// `translation`. With `split` the faces are drawn by two primitives with
    /// different materials.
    pub fn box_glb(min: Vec3, max: Vec3, translation: [f32; 3], split: bool) -> Vec<u8> {
        let mut bin = Vec::new();
        for corner in 0..8u32 {
            let bits = Vec3::new(
                (corner & 1) as f32,
                ((corner >> 1) & 1) as f32,
                ((corner >> 2) & 1) as f32,
            );
            let p = min + bits * (max - min);
            for c in [p.x, p.y, p.z] {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for index in BOX_INDICES {
            bin.extend_from_slice(&index.to_le_bytes());
        }

        let primitives = if split {
            r#"[{"attributes":{"POSITION":0},"indices":1,"material":0},
                {"attributes":{"POSITION":0},"indices":2,"material":1}]"#
        } else {
            r#"[{"attributes":{"POSITION":0},"indices":3,"material":0}]"#
        };
        let json = format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "body", "mesh": 0, "translation": [{tx}, {ty}, {tz}]}}],
  "meshes": [{{"name": "box", "primitives": {primitives}}}],
  "materials": [
    {{"pbrMetallicRoughness": {{"baseColorFactor": [1, 0, 0, 1], "roughnessFactor": 0.5}}}},
    {{"pbrMetallicRoughness": {{"baseColorFactor": [0, 1, 0, 1], "roughnessFactor": 1.0}}}}
  ],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 8, "type": "VEC3",
      "min": [{x0}, {y0}, {z0}], "max": [{x1}, {y1}, {z1}]}},
    {{"bufferView": 1, "byteOffset": 0, "componentType": 5123, "count": 18, "type": "SCALAR"}},
    {{"bufferView": 1, "byteOffset": 36, "componentType": 5123, "count": 18, "type": "SCALAR"}},
    {{"bufferView": 1, "byteOffset": 0, "componentType": 5123, "count": 36, "type": "SCALAR"}}
  ],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 96}},
    {{"buffer": 0, "byteOffset": 96, "byteLength": 72}}
  ],
  "buffers": [{{"byteLength": {len}}}]
}}"#,
            tx = translation[0],
            ty = translation[1],
            tz = translation[2],
            x0 = min.x,
            y0 = min.y,
            z0 = min.z,
            x1 = max.x,
            y1 = max.y,
            z1 = max.z,
            len = bin.len(),
        );
        glb(&json, &bin)
    }

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    const TRIANGLE_ACCESSOR: &str = r#"{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0, 0, 0], "max": [2, 1, 0]}"#;

    fn triangle_bytes() -> Vec<u8> {
        TRIANGLE.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    /// Three positions and three `indices`, drawn by the single `primitive`
    /// (accessor 0 holds positions, accessor 1 the indices).
    pub fn triangle_glb(primitive: &str, indices: [u16; 3]) -> Vec<u8> {
        let mut bin = triangle_bytes();
        for index in indices {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        let json = format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"mesh": 0}}],
  "meshes": [{{"primitives": [{primitive}]}}],
  "accessors": [
    {TRIANGLE_ACCESSOR},
    {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
  ],
  "bufferViews": [
    {{"buffer": 0, "byteLength": 36}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 6}}
  ],
  "buffers": [{{"byteLength": {len}}}]
}}"#,
            len = bin.len(),
        );
        glb(&json, &bin)
    }

    /// A glTF document whose only buffer lives at `uri`, and that buffer.
    pub fn external_triangle(uri: &str) -> (Vec<u8>, Vec<u8>) {
        let json = format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "wing", "mesh": 0}}],
  "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}}}]}}],
  "accessors": [{TRIANGLE_ACCESSOR}],
  "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
  "buffers": [{{"byteLength": 36, "uri": "{uri}"}}]
}}"#
        );
        (json.into_bytes(), triangle_bytes())
    }

    /// Two nodes that are each other's child.
    pub fn cyclic_gltf() -> Vec<u8> {
        br#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],
            "nodes":[{"children":[1]},{"children":[0]}]}"#
            .to_vec()
    }

    /// A document whose only node carries no mesh.
    pub fn empty_glb() -> Vec<u8> {
        let json = r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"nothing"}]}"#;
        glb(json, &[])
    }
}
