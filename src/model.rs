use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frames::Frame;

/// Floats per interleaved vertex.
pub const VERTEX_STRIDE: usize = 8;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("model has no scene")]
    NoScene,
    #[error("model has no triangle geometry")]
    NoGeometry,
}

/// How the terrain chunk's materials are tuned after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStyle {
    /// Flat-shaded, fully rough, no highlights or glow.
    Blocky,
    /// Smooth shading with the file's own PBR parameters.
    #[default]
    Diffuse,
    /// Whatever the file says.
    Pbr,
}

impl MaterialStyle {
    pub fn apply(self, material: &mut MaterialParams) {
        match self {
            Self::Blocky => {
                material.roughness = 1.0;
                material.metalness = 0.0;
                material.specular = 0.0;
                material.emissive = Vec3::ZERO;
                material.flat_shading = true;
            }
            Self::Diffuse => material.flat_shading = false,
            Self::Pbr => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shading {
    /// Hemisphere plus sun lighting, fog and tone mapping.
    Lit,
    Unlit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureSlot {
    None,
    /// Index into [`Model::images`].
    Image(usize),
    /// The scene's animated texture.
    Animated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    pub base_color: Vec4,
    pub texture: TextureSlot,
    pub roughness: f32,
    pub metalness: f32,
    pub specular: f32,
    pub emissive: Vec3,
    pub flat_shading: bool,
    pub shading: Shading,
    /// Fragments with alpha below this are discarded; zero disables the test.
    pub alpha_cutoff: f32,
    pub blend: bool,
    pub double_sided: bool,
    pub depth_write: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            texture: TextureSlot::None,
            roughness: 1.0,
            metalness: 1.0,
            specular: 1.0,
            emissive: Vec3::ZERO,
            flat_shading: false,
            shading: Shading::Lit,
            alpha_cutoff: 0.0,
            blend: false,
            double_sided: false,
            depth_write: true,
        }
    }
}

impl MaterialParams {
    /// Unlit, alpha-tested, double-sided and kept out of the depth buffer.
    pub fn sprite(alpha_cutoff: f32) -> Self {
        Self {
            texture: TextureSlot::Animated,
            shading: Shading::Unlit,
            alpha_cutoff,
            blend: true,
            double_sided: true,
            depth_write: false,
            metalness: 0.0,
            specular: 0.0,
            ..Self::default()
        }
    }

    fn from_gltf(material: &gltf::Material<'_>) -> Self {
        let pbr = material.pbr_metallic_roughness();
        let alpha_cutoff = match material.alpha_mode() {
            gltf::material::AlphaMode::Mask => material.alpha_cutoff().unwrap_or(0.5),
            _ => 0.0,
        };
        Self {
            base_color: Vec4::from_array(pbr.base_color_factor()),
            texture: pbr
                .base_color_texture()
                .map(|info| TextureSlot::Image(info.texture().source().index()))
                .unwrap_or(TextureSlot::None),
            roughness: pbr.roughness_factor(),
            metalness: pbr.metallic_factor(),
            specular: 1.0,
            emissive: Vec3::from_array(material.emissive_factor()),
            flat_shading: false,
            shading: Shading::Lit,
            alpha_cutoff,
            blend: material.alpha_mode() == gltf::material::AlphaMode::Blend,
            double_sided: material.double_sided(),
            depth_write: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Node transform relative to the model root.
    pub transform: Mat4,
    pub material: MaterialParams,
}

impl Primitive {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

/// A loaded model: geometry plus the decoded images its materials refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub primitives: Vec<Primitive>,
    /// `None` where an image used a pixel format we do not upload.
    pub images: Vec<Option<Frame>>,
}

impl Model {
    pub fn from_glb(bytes: &[u8]) -> Result<Self, ModelError> {
        let (document, buffers, images) = gltf::import_slice(bytes)?;
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or(ModelError::NoScene)?;

        let mut primitives = Vec::new();
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, &buffers, &mut primitives);
        }
        if primitives.is_empty() {
            return Err(ModelError::NoGeometry);
        }

        let images = images.into_iter().map(image_to_frame).collect();
        Ok(Self { primitives, images })
    }

    pub fn tune(&mut self, style: MaterialStyle) {
        for primitive in &mut self.primitives {
            style.apply(&mut primitive.material);
        }
    }

    /// Swaps every material for `material`; the model's own images are dropped.
    pub fn replace_materials(&mut self, material: MaterialParams) {
        for primitive in &mut self.primitives {
            primitive.material = material;
        }
        self.images.clear();
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(Primitive::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.indices.len() / 3).sum()
    }
}

fn collect_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<Primitive>,
) {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                debug!("skipping {:?} primitive in mesh {}", primitive.mode(), mesh.index());
                continue;
            }
            match read_primitive(&primitive, buffers) {
                Some((vertices, indices)) => out.push(Primitive {
                    vertices,
                    indices,
                    transform,
                    material: MaterialParams::from_gltf(&primitive.material()),
                }),
                None => warn!("mesh {} has a primitive without positions", mesh.index()),
            }
        }
    }
    for child in node.children() {
        collect_node(&child, transform, buffers, out);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Option<(Vec<f32>, Vec<u32>)> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
    let uvs: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().collect());

    let mut vertices = Vec::with_capacity(positions.len() * VERTEX_STRIDE);
    for (i, position) in positions.iter().enumerate() {
        let normal = normals
            .as_ref()
            .and_then(|n| n.get(i).copied())
            .unwrap_or([0.0; 3]);
        let uv = uvs.as_ref().and_then(|t| t.get(i).copied()).unwrap_or([0.0; 2]);
        vertices.extend_from_slice(position);
        vertices.extend_from_slice(&normal);
        vertices.extend_from_slice(&uv);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    if normals.is_none() {
        compute_normals(&mut vertices, &indices, |_| true);
    } else if has_zero_normals(&vertices) {
        compute_normals(&mut vertices, &indices, |normal| normal == [0.0; 3]);
    }
    Some((vertices, indices))
}

fn has_zero_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(VERTEX_STRIDE)
        .any(|chunk| chunk[3..6] == [0.0; 3])
}

/// Area-weighted smooth normals for meshes exported without them. Only
/// vertices whose current normal passes `replace` are written.
fn compute_normals(vertices: &mut [f32], indices: &[u32], replace: impl Fn([f32; 3]) -> bool) {
    let vertex_count = vertices.len() / VERTEX_STRIDE;
    let mut accum = vec![Vec3::ZERO; vertex_count];
    let position = |vertices: &[f32], i: usize| {
        Vec3::from_slice(&vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3])
    };

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if i0.max(i1).max(i2) >= vertex_count {
            continue;
        }
        let p0 = position(vertices, i0);
        let normal = (position(vertices, i1) - p0).cross(position(vertices, i2) - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let slot = &mut vertices[i * VERTEX_STRIDE + 3..i * VERTEX_STRIDE + 6];
        if replace([slot[0], slot[1], slot[2]]) {
            slot.copy_from_slice(&normal.normalize_or_zero().to_array());
        }
    }
}

fn image_to_frame(image: gltf::image::Data) -> Option<Frame> {
    use gltf::image::Format;

    let rgba: Vec<u8> = match image.format {
        Format::R8G8B8A8 => image.pixels,
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            warn!("unsupported glTF image format {other:?}; rendering untextured");
            return None;
        }
    };
    Frame::new(image.width, image.height, rgba).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a binary glTF holding a single triangle without normals.
    pub(crate) fn triangle_glb() -> Vec<u8> {
        triangle_glb_with(None, None)
    }

    /// Same triangle, optionally with authored normals and a u16 index buffer.
    fn triangle_glb_with(normals: Option<[[f32; 3]; 3]>, indices: Option<[u16; 3]>) -> Vec<u8> {
        let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mut bin: Vec<u8> = positions
            .iter()
            .flatten()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let mut views = vec![r#"{"buffer": 0, "byteOffset": 0, "byteLength": 36}"#.to_string()];
        let mut accessors = vec![r#"{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0]}"#.to_string()];
        let mut attributes = r#""POSITION": 0"#.to_string();
        let mut index_ref = String::new();

        if let Some(normals) = normals {
            views.push(format!(r#"{{"buffer": 0, "byteOffset": {}, "byteLength": 36}}"#, bin.len()));
            accessors.push(format!(
                r#"{{"bufferView": {}, "componentType": 5126, "count": 3, "type": "VEC3"}}"#,
                views.len() - 1
            ));
            attributes.push_str(&format!(r#", "NORMAL": {}"#, accessors.len() - 1));
            bin.extend(normals.iter().flatten().flat_map(|f| f.to_le_bytes()));
        }
        if let Some(indices) = indices {
            views.push(format!(r#"{{"buffer": 0, "byteOffset": {}, "byteLength": 6}}"#, bin.len()));
            accessors.push(format!(
                r#"{{"bufferView": {}, "componentType": 5123, "count": 3, "type": "SCALAR"}}"#,
                views.len() - 1
            ));
            index_ref = format!(r#", "indices": {}"#, accessors.len() - 1);
            bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let json = format!(
            r#"{{
            "asset": {{"version": "2.0"}},
            "scene": 0,
            "scenes": [{{"nodes": [0]}}],
            "nodes": [{{"mesh": 0, "translation": [0, 1, 0]}}],
            "meshes": [{{"primitives": [{{"attributes": {{{attributes}}}{index_ref}, "material": 0}}]}}],
            "materials": [{{
                "pbrMetallicRoughness": {{
                    "baseColorFactor": [1.0, 0.5, 0.25, 1.0],
                    "metallicFactor": 0.25,
                    "roughnessFactor": 0.5
                }},
                "emissiveFactor": [0.5, 0.5, 0.5]
            }}],
            "buffers": [{{"byteLength": {length}}}],
            "bufferViews": [{views}],
            "accessors": [{accessors}]
        }}"#,
            length = bin.len(),
            views = views.join(", "),
            accessors = accessors.join(", "),
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn loads_triangle_with_generated_normals() {
        let model = Model::from_glb(&triangle_glb()).unwrap();
        assert_eq!(model.primitives.len(), 1);
        let primitive = &model.primitives[0];
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.vertex_count(), 3);
        for vertex in primitive.vertices.chunks_exact(VERTEX_STRIDE) {
            assert_eq!(&vertex[3..6], &[0.0, 0.0, 1.0]);
        }
        assert_eq!(
            primitive.transform.transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 1.0, 0.0)
        );
        assert_eq!(model.triangle_count(), 1);
    }

    #[test]
    fn reads_index_buffer() {
        let model = Model::from_glb(&triangle_glb_with(None, Some([2, 1, 0]))).unwrap();
        let primitive = &model.primitives[0];
        assert_eq!(primitive.indices, vec![2, 1, 0]);
        // Winding is reversed, so the generated normal faces away.
        for vertex in primitive.vertices.chunks_exact(VERTEX_STRIDE) {
            assert_eq!(&vertex[3..6], &[0.0, 0.0, -1.0]);
        }
    }

    #[test]
    fn authored_normals_survive_a_single_zero_entry() {
        let authored = [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let model = Model::from_glb(&triangle_glb_with(Some(authored), None)).unwrap();
        let vertices: Vec<&[f32]> = model.primitives[0].vertices.chunks_exact(VERTEX_STRIDE).collect();
        assert_eq!(&vertices[0][3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&vertices[1][3..6], &[0.0, 0.0, 1.0]);
        assert_eq!(&vertices[2][3..6], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn reads_material_factors() {
        let model = Model::from_glb(&triangle_glb()).unwrap();
        let material = model.primitives[0].material;
        assert_eq!(material.base_color, Vec4::new(1.0, 0.5, 0.25, 1.0));
        assert_eq!(material.roughness, 0.5);
        assert_eq!(material.metalness, 0.25);
        assert_eq!(material.texture, TextureSlot::None);
        assert_eq!(material.shading, Shading::Lit);
    }

    #[test]
    fn blocky_style_strips_highlights() {
        let mut model = Model::from_glb(&triangle_glb()).unwrap();
        model.tune(MaterialStyle::Blocky);
        let material = model.primitives[0].material;
        assert_eq!(material.roughness, 1.0);
        assert_eq!(material.metalness, 0.0);
        assert_eq!(material.emissive, Vec3::ZERO);
        assert!(material.flat_shading);
    }

    #[test]
    fn diffuse_and_pbr_keep_file_parameters() {
        let mut material = MaterialParams {
            roughness: 0.3,
            flat_shading: true,
            ..MaterialParams::default()
        };
        MaterialStyle::Pbr.apply(&mut material);
        assert!(material.flat_shading);
        MaterialStyle::Diffuse.apply(&mut material);
        assert!(!material.flat_shading);
        assert_eq!(material.roughness, 0.3);
    }

    #[test]
    fn sprite_material_replaces_everything() {
        let mut model = Model::from_glb(&triangle_glb()).unwrap();
        model.replace_materials(MaterialParams::sprite(0.1));
        let material = model.primitives[0].material;
        assert_eq!(material.texture, TextureSlot::Animated);
        assert_eq!(material.shading, Shading::Unlit);
        assert!(material.double_sided);
        assert!(!material.depth_write);
        assert_eq!(material.alpha_cutoff, 0.1);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Model::from_glb(b"not a model").is_err());
    }

    #[test]
    fn style_names_deserialize() {
        let style: MaterialStyle = serde_json::from_str("\"blocky\"").unwrap();
        assert_eq!(style, MaterialStyle::Blocky);
    }
}
