use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;

use crate::scene::DEFAULT_SCENE_XML;

/// Name of the optional scene override inside an asset root.
pub const SCENE_FILE: &str = "scene.xml";

/// Static files the site serves: models, the fire animation, icons.
///
/// Names are site paths such as `/chunk.glb`; the leading slash is optional.
#[derive(Debug, Clone)]
pub struct AssetStore {
    backing: AssetBacking,
}

#[derive(Debug, Clone)]
enum AssetBacking {
    Directory(PathBuf),
    Memory(Arc<RwLock<BTreeMap<String, Arc<[u8]>>>>),
}

impl AssetStore {
    /// Serves files from a directory on disk.
    pub fn open_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let meta = fs::metadata(&root)
            .with_context(|| format!("unable to open asset directory {}", root.display()))?;
        if !meta.is_dir() {
            return Err(anyhow!("{} is not a directory", root.display()));
        }
        Ok(Self {
            backing: AssetBacking::Directory(root),
        })
    }

    /// Empty store filled through [`insert`](Self::insert).
    pub fn in_memory() -> Self {
        Self {
            backing: AssetBacking::Memory(Arc::default()),
        }
    }

    /// Adds or replaces a file. Directory-backed stores are read-only.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let key = normalize(name)?;
        match &self.backing {
            AssetBacking::Memory(files) => {
                files.write().insert(key, Arc::from(bytes));
                Ok(())
            }
            AssetBacking::Directory(root) => Err(anyhow!(
                "asset directory {} is read-only",
                root.display()
            )),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let Ok(key) = normalize(name) else {
            return false;
        };
        match &self.backing {
            AssetBacking::Directory(root) => root.join(&key).is_file(),
            AssetBacking::Memory(files) => files.read().contains_key(&key),
        }
    }

    /// Reads the raw bytes of `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let key = normalize(name)?;
        match &self.backing {
            AssetBacking::Directory(root) => {
                let path = root.join(&key);
                fs::read(&path).with_context(|| format!("unable to read {}", path.display()))
            }
            AssetBacking::Memory(files) => files
                .read()
                .get(&key)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| anyhow!("asset not found: {name}")),
        }
    }

    /// `scene.xml` from the store when present, the shipped scene otherwise.
    pub fn scene_xml(&self) -> Result<String> {
        if !self.contains(SCENE_FILE) {
            return Ok(DEFAULT_SCENE_XML.to_string());
        }
        let bytes = self.read(SCENE_FILE)?;
        String::from_utf8(bytes).context("scene.xml is not valid UTF-8")
    }

    /// Human-readable origin of the files.
    pub fn describe(&self) -> String {
        match &self.backing {
            AssetBacking::Directory(root) => root.display().to_string(),
            AssetBacking::Memory(files) => format!("memory ({} files)", files.read().len()),
        }
    }
}

/// Turns a site path into a relative key, refusing anything that escapes the root.
fn normalize(name: &str) -> Result<String> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("empty asset name"));
    }
    let escapes = Path::new(trimmed)
        .components()
        .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(anyhow!("asset name {name:?} leaves the asset root"));
    }
    Ok(trimmed.to_string())
}
