use std::time::Duration;

use glam::{Mat4, Vec3};
use log::{info, warn};

use crate::assets::AssetStore;
use crate::cancel::CancelToken;
use crate::config::BackgroundConfig;
use crate::frames::{default_strategies, FrameAcquisition, FrameAsset};
use crate::model::{MaterialParams, MaterialStyle, Model};
use crate::render::TickListener;
use crate::scene::{Lighting, Scene, SceneObject};
use crate::scroll::{CameraRig, ScrollOffset};
use crate::texture::{AnimatedTexture, TextureSampling};

/// Sprite fragments below this alpha are discarded.
pub const SPRITE_ALPHA_CUTOFF: f32 = 0.1;

/// A placed object and, once loaded, its geometry.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub object: SceneObject,
    pub model: Option<Model>,
}

impl SceneNode {
    pub fn transform(&self) -> Mat4 {
        self.object.model_matrix()
    }
}

pub struct BackgroundScene {
    camera: CameraRig,
    lighting: Lighting,
    exposure: f32,
    nodes: Vec<SceneNode>,
    texture: Option<AnimatedTexture>,
    scroll: ScrollOffset,
    viewport: (u32, u32),
    material_style: MaterialStyle,
    frame_duration: Duration,
    cancel: CancelToken,
}

impl BackgroundScene {
    pub fn new(scene: Scene, scroll: ScrollOffset, config: &BackgroundConfig) -> Self {
        let nodes = scene
            .drawables()
            .cloned()
            .map(|object| SceneNode {
                object,
                model: None,
            })
            .collect();
        Self {
            camera: scene.camera,
            lighting: scene.lighting,
            exposure: scene.exposure,
            nodes,
            texture: None,
            scroll,
            viewport: (1, 1),
            material_style: config.material_style,
            frame_duration: Duration::from_millis(u64::from(config.frame_duration_ms)),
            cancel: CancelToken::new(),
        }
    }

    /// Loads every model and the animated texture from `assets`. Missing or
    /// broken files are logged and the scene renders without them.
    pub fn load(
        assets: &AssetStore,
        config: &BackgroundConfig,
        scroll: ScrollOffset,
    ) -> anyhow::Result<Self> {
        let scene = Scene::from_xml(&assets.scene_xml()?)?.with_asset_paths(config);
        let mut background = Self::new(scene, scroll, config);

        for (name, path) in background.model_paths() {
            background.load_model(assets, &name, &path);
        }

        if let Some(path) = background.texture_path() {
            let bytes = assets.read(&path).ok();
            let asset = FrameAsset::new(path, bytes, background.frame_duration);
            let mut acquisition =
                FrameAcquisition::new(default_strategies(), background.cancel_token());
            if let Some(source) = acquisition.run(&asset) {
                let texture = AnimatedTexture::new(source, TextureSampling::fire_sprite());
                background.attach_texture(texture);
            }
        }
        Ok(background)
    }

    /// `(object name, model path)` for every node still waiting for geometry.
    pub fn model_paths(&self) -> Vec<(String, String)> {
        self.nodes
            .iter()
            .filter(|node| node.model.is_none())
            .filter_map(|node| Some((node.object.name.clone(), node.object.mesh.clone()?)))
            .collect()
    }

    /// Path of the animated texture, taken from the first sprite.
    pub fn texture_path(&self) -> Option<String> {
        self.nodes
            .iter()
            .filter(|node| node.object.is_sprite())
            .find_map(|node| node.object.texture.clone())
    }

    /// Parses `path` out of `assets` and attaches it to `name`.
    pub fn load_model(&mut self, assets: &AssetStore, name: &str, path: &str) -> bool {
        match assets.read(path).map(|bytes| Model::from_glb(&bytes)) {
            Ok(Ok(model)) => self.attach_model(name, model),
            Ok(Err(err)) => {
                warn!("{path} is not a usable model: {err}");
                false
            }
            Err(err) => {
                warn!("{path} unavailable: {err:#}");
                false
            }
        }
    }

    /// Hands loaded geometry to the node called `name`. Chunk materials are
    /// tuned; sprites get the unlit alpha-tested material.
    pub fn attach_model(&mut self, name: &str, mut model: Model) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(node) = self.nodes.iter_mut().find(|node| node.object.name == name) else {
            warn!("no scene object called {name}");
            return false;
        };
        if node.object.is_sprite() {
            model.replace_materials(MaterialParams::sprite(SPRITE_ALPHA_CUTOFF));
        } else {
            model.tune(self.material_style);
        }
        info!(
            "{name}: {} primitives, {} triangles",
            model.primitives.len(),
            model.triangle_count()
        );
        node.model = Some(model);
        true
    }

    /// Installs the animated texture unless the scene was already torn down,
    /// in which case the texture is released straight away.
    pub fn attach_texture(&mut self, mut texture: AnimatedTexture) -> bool {
        if self.cancel.is_cancelled() {
            texture.release();
            return false;
        }
        if let Some(mut previous) = self.texture.replace(texture) {
            previous.release();
        }
        true
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    /// Per-frame work, in order: both objects follow the scroll at their own
    /// depth, then the texture steps. Returns `true` when the texture canvas
    /// needs uploading.
    pub fn update(&mut self, delta: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let scroll = self.scroll.get();
        let viewport_height = self.viewport.1;
        for node in &mut self.nodes {
            if node.object.follow_scroll {
                let z = node.object.position.z;
                node.object.position.y =
                    self.camera.scroll_to_world_y(scroll, z, viewport_height);
            }
        }
        match self.texture.as_mut() {
            Some(texture) => texture.tick(delta),
            None => false,
        }
    }

    /// Releases the texture and geometry; any pending load sees the token.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(mut texture) = self.texture.take() {
            texture.release();
        }
        for node in &mut self.nodes {
            node.model = None;
        }
        info!("background torn down");
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.object.name == name)
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    pub fn texture(&self) -> Option<&AnimatedTexture> {
        self.texture.as_ref()
    }

    pub fn texture_mut(&mut self) -> Option<&mut AnimatedTexture> {
        self.texture.as_mut()
    }

    /// World position of `name` after the last update.
    pub fn position_of(&self, name: &str) -> Option<Vec3> {
        self.node(name).map(|node| node.object.position)
    }
}

impl TickListener for BackgroundScene {
    fn tick(&mut self, delta: Duration) {
        self.update(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{AnimatedFrameSet, Frame, FrameSource};

    const TWO_DEPTHS: &str = r#"
    <scene>
        <object><name>near</name><type>model</type><position>0 0 1</position><follow_scroll>true</follow_scroll></object>
        <object><name>far</name><type>sprite</type><position>0 0 -5</position><follow_scroll>true</follow_scroll></object>
        <object><name>still</name><type>model</type><position>0 2 0</position></object>
    </scene>
    "#;

    fn scene(scroll: &ScrollOffset) -> BackgroundScene {
        let scene = Scene::from_xml(TWO_DEPTHS).unwrap();
        let mut background =
            BackgroundScene::new(scene, scroll.clone(), &BackgroundConfig::default());
        background.resize(1280, 1000);
        background
    }

    fn fire_texture() -> AnimatedTexture {
        let frames = (0..3u8)
            .map(|v| Frame::new(1, 1, vec![v; 4]).unwrap())
            .collect();
        let frames = AnimatedFrameSet::new(frames, Duration::from_millis(50)).unwrap();
        AnimatedTexture::new(FrameSource::Sequence(frames), TextureSampling::fire_sprite())
    }

    #[test]
    fn objects_follow_scroll_at_their_own_depth() {
        let scroll = ScrollOffset::new();
        let mut background = scene(&scroll);
        scroll.set(200.0);
        background.update(Duration::ZERO);

        let camera = *background.camera();
        let near = background.position_of("near").unwrap();
        let far = background.position_of("far").unwrap();
        assert_eq!(near.y, camera.scroll_to_world_y(200.0, 1.0, 1000));
        assert_eq!(far.y, camera.scroll_to_world_y(200.0, -5.0, 1000));
        assert!(far.y > near.y);
        assert_eq!(background.position_of("still").unwrap().y, 2.0);
    }

    #[test]
    fn scroll_back_to_top_restores_origin() {
        let scroll = ScrollOffset::new();
        let mut background = scene(&scroll);
        scroll.set(500.0);
        background.update(Duration::ZERO);
        scroll.set(0.0);
        background.update(Duration::ZERO);
        assert_eq!(background.position_of("near").unwrap().y, 0.0);
    }

    #[test]
    fn update_steps_the_texture() {
        let scroll = ScrollOffset::new();
        let mut background = scene(&scroll);
        assert!(background.attach_texture(fire_texture()));
        background.texture_mut().unwrap().canvas_mut().take_dirty();
        assert!(background.update(Duration::from_millis(100)));
        assert_eq!(background.texture().unwrap().frame_index(), Some(2));
    }

    #[test]
    fn teardown_rejects_late_results() {
        let scroll = ScrollOffset::new();
        let mut background = scene(&scroll);
        background.attach_texture(fire_texture());
        let token = background.cancel_token();
        background.teardown();

        assert!(token.is_cancelled());
        assert!(background.texture().is_none());
        assert!(!background.attach_texture(fire_texture()));
        assert!(background.texture().is_none());
        assert!(!background.update(Duration::from_secs(1)));
    }

    #[test]
    fn sprites_name_the_texture() {
        let scroll = ScrollOffset::new();
        let scene = Scene::site_default()
            .unwrap()
            .with_asset_paths(&BackgroundConfig::default());
        let background = BackgroundScene::new(scene, scroll, &BackgroundConfig::default());
        assert_eq!(background.texture_path().as_deref(), Some("/fire.gif"));
        let paths = background.model_paths();
        assert!(paths.contains(&("chunk".to_string(), "/chunk.glb".to_string())));
        assert!(paths.contains(&("fireplace".to_string(), "/fireplace.glb".to_string())));
    }

    #[test]
    fn load_survives_an_empty_asset_store() {
        let background = BackgroundScene::load(
            &AssetStore::in_memory(),
            &BackgroundConfig::default(),
            ScrollOffset::new(),
        )
        .unwrap();
        assert_eq!(background.nodes().len(), 2);
        assert!(background.nodes().iter().all(|node| node.model.is_none()));
        assert!(background.texture().is_none());
    }

    #[test]
    fn models_load_from_fetched_bytes() {
        let assets = AssetStore::in_memory();
        assets
            .insert("/chunk.glb", crate::model::tests::triangle_glb())
            .unwrap();
        let mut background = BackgroundScene::load(
            &assets,
            &BackgroundConfig::default(),
            ScrollOffset::new(),
        )
        .unwrap();
        assert!(background.node("chunk").unwrap().model.is_some());
        assert!(background.node("fireplace").unwrap().model.is_none());

        assert!(!background.load_model(&assets, "fireplace", "/fireplace.glb"));
        background.teardown();
        assert!(!background.load_model(&assets, "chunk", "/chunk.glb"));
    }
}
