use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::config::BackgroundConfig;
use crate::scroll::CameraRig;

pub const DEFAULT_SCENE_XML: &str = include_str!("../assets/scene.xml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub camera: CameraRig,
    pub lighting: Lighting,
    /// Tone-mapping exposure.
    pub exposure: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            camera: CameraRig::default(),
            lighting: Lighting::default(),
            exposure: 1.0,
        }
    }
}

impl Scene {
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let exposure = parse_f32(root.attribute("exposure").map(str::to_string), 1.0)?;
        let mut objects = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = SceneObject::default();
            object.name = required_text(&node, "name")?;
            object.object_type =
                optional_text(&node, "type").unwrap_or_else(|| "model".to_string());
            object.mesh = optional_text(&node, "mesh");
            object.texture = optional_text(&node, "texture");
            object.color = parse_color(optional_text(&node, "color"), object.color)
                .with_context(|| format!("object {}", object.name))?;
            object.ground = parse_color(optional_text(&node, "ground"), object.ground)
                .with_context(|| format!("object {}", object.name))?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)?;
            object.target = parse_vec3(optional_text(&node, "target"), object.target)?;
            object.fov = parse_f32(optional_text(&node, "fov"), object.fov)?;
            object.near = parse_f32(optional_text(&node, "near"), object.near)?;
            object.far = parse_f32(optional_text(&node, "far"), object.far)?;
            object.intensity = parse_f32(optional_text(&node, "intensity"), object.intensity)?;
            object.follow_scroll =
                parse_bool(optional_text(&node, "follow_scroll"), object.follow_scroll)?;
            objects.push(object);
        }

        let camera = objects
            .iter()
            .find(|obj| obj.object_type == "camera")
            .map(|obj| CameraRig {
                position: obj.position,
                target: obj.target,
                fov_degrees: obj.fov,
                near: obj.near,
                far: obj.far,
            })
            .unwrap_or_default();
        let lighting = Lighting::from_objects(&objects);

        Ok(Self {
            objects,
            camera,
            lighting,
            exposure,
        })
    }

    pub fn site_default() -> Result<Self> {
        Self::from_xml(DEFAULT_SCENE_XML)
    }

    /// Fills in asset paths the scene leaves to configuration.
    pub fn with_asset_paths(mut self, background: &BackgroundConfig) -> Self {
        for object in &mut self.objects {
            match object.object_type.as_str() {
                "model" => {
                    object.mesh.get_or_insert_with(|| background.chunk_model.clone());
                }
                "sprite" => {
                    object
                        .mesh
                        .get_or_insert_with(|| background.fireplace_model.clone());
                    object
                        .texture
                        .get_or_insert_with(|| background.fire_texture.clone());
                }
                _ => {}
            }
        }
        self
    }

    pub fn drawables(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|object| object.is_drawable())
    }

    pub fn light_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| matches!(o.object_type.as_str(), "hemisphere" | "sun"))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default = "default_color")]
    pub color: Vec3,
    /// Ground colour of a hemisphere light.
    #[serde(default)]
    pub ground: Vec3,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub target: Vec3,
    #[serde(default = "default_fov")]
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Move vertically with the page.
    #[serde(default)]
    pub follow_scroll: bool,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: String::new(),
            mesh: None,
            texture: None,
            color: default_color(),
            ground: Vec3::ZERO,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: default_scale(),
            target: Vec3::ZERO,
            fov: default_fov(),
            near: 0.1,
            far: 1000.0,
            intensity: default_intensity(),
            follow_scroll: false,
        }
    }
}

impl SceneObject {
    pub fn is_drawable(&self) -> bool {
        self.mesh.is_some() || matches!(self.object_type.as_str(), "model" | "sprite")
    }

    pub fn is_sprite(&self) -> bool {
        self.object_type == "sprite"
    }

    pub fn model_matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians());
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    45.0
}

fn default_intensity() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hemisphere {
    pub sky: Vec3,
    pub ground: Vec3,
    pub intensity: f32,
}

/// Directional light; `position` only gives the direction towards the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sun {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Sun {
    /// Unit vector pointing from the scene towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Z)
    }
}

/// Linear fog; also the clear colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub hemisphere: Hemisphere,
    pub sun: Sun,
    pub fog: Fog,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            hemisphere: Hemisphere {
                sky: Vec3::ONE,
                ground: Vec3::splat(0.2),
                intensity: 0.6,
            },
            sun: Sun {
                position: Vec3::new(3.0, 5.0, 3.0),
                color: Vec3::ONE,
                intensity: 1.0,
            },
            fog: Fog {
                color: Vec3::new(0.03, 0.03, 0.05),
                near: 60.0,
                far: 350.0,
            },
        }
    }
}

impl Lighting {
    fn from_objects(objects: &[SceneObject]) -> Self {
        let mut lighting = Self::default();
        for object in objects {
            match object.object_type.as_str() {
                "hemisphere" => {
                    lighting.hemisphere = Hemisphere {
                        sky: object.color,
                        ground: object.ground,
                        intensity: object.intensity,
                    }
                }
                "sun" => {
                    lighting.sun = Sun {
                        position: object.position,
                        color: object.color,
                        intensity: object.intensity,
                    }
                }
                "fog" => {
                    lighting.fog = Fog {
                        color: object.color,
                        near: object.near,
                        far: object.far,
                    }
                }
                _ => {}
            }
        }
        lighting
    }
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid vector {value:?}"))?;
    match numbers[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(anyhow!("vector {value:?} needs three components")),
    }
}

/// Accepts `#rrggbb` or three 0-255 components.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Some(hex) = value.strip_prefix('#') {
        let packed = u32::from_str_radix(hex, 16)
            .ok()
            .filter(|_| hex.len() == 6)
            .ok_or_else(|| anyhow!("invalid hex color {value:?}"))?;
        let channel = |shift: u32| ((packed >> shift) & 0xff) as f32 / 255.0;
        return Ok(Vec3::new(channel(16), channel(8), channel(0)));
    }
    let rgb = parse_vec3(Some(value), default)?;
    Ok(rgb / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, found {other:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene exposure="1.2">
        <object>
            <name>Camera</name>
            <type>camera</type>
            <position>0 0 5</position>
            <fov>60</fov>
        </object>
        <object>
            <name>Sun</name>
            <type>sun</type>
            <intensity>2.5</intensity>
            <position>0 5 0</position>
            <color>255 128 0</color>
        </object>
        <object>
            <name>Rock</name>
            <mesh>/rock.glb</mesh>
            <position>1 2 -3</position>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_camera_and_lights() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 3);
        assert_eq!(scene.exposure, 1.2);
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(scene.camera.fov_degrees, 60.0);
        let sun = scene.lighting.sun;
        assert_eq!(sun.direction(), Vec3::Y);
        assert!((sun.intensity - 2.5).abs() < f32::EPSILON);
        assert_eq!(sun.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(scene.light_count(), 1);
    }

    #[test]
    fn objects_default_to_models() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let rock = scene.objects.iter().find(|o| o.name == "Rock").unwrap();
        assert_eq!(rock.object_type, "model");
        assert!(!rock.follow_scroll);
        assert_eq!(scene.drawables().count(), 1);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>model</type></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        let bad_color = "<scene><object><name>a</name><color>#12</color></object></scene>";
        assert!(Scene::from_xml(bad_color).is_err());
        let bad_flag =
            "<scene><object><name>a</name><follow_scroll>maybe</follow_scroll></object></scene>";
        assert!(Scene::from_xml(bad_flag).is_err());
    }

    #[test]
    fn shipped_scene_matches_the_site() {
        let scene = Scene::site_default()
            .unwrap()
            .with_asset_paths(&BackgroundConfig::default());
        assert_eq!(scene.camera, CameraRig::default());
        assert_eq!(scene.exposure, 1.05);
        assert_eq!(scene.lighting.fog.near, 60.0);
        assert_eq!(scene.lighting.fog.far, 350.0);
        assert_eq!(
            scene.lighting.fog.color,
            Vec3::new(0x87 as f32, 0xce as f32, 0xeb as f32) / 255.0
        );
        assert_eq!(scene.lighting.hemisphere.intensity, 0.6);

        let drawables: Vec<_> = scene.drawables().collect();
        assert_eq!(drawables.len(), 2);
        assert!(drawables.iter().all(|o| o.follow_scroll && o.position.z == -1.0));
        let fireplace = drawables.iter().find(|o| o.is_sprite()).unwrap();
        assert_eq!(fireplace.mesh.as_deref(), Some("/fireplace.glb"));
        assert_eq!(fireplace.texture.as_deref(), Some("/fire.gif"));
    }
}
