//! Scene description authored by the editor, the on-disk store behind the
//! save/load endpoints, and the model listing used by the object palette.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

pub const MODEL_EXTENSIONS: &[&str] = &["glb", "gltf", "obj"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneObjectKind {
    Box,
    Sphere,
    Plane,
    Model,
    Light,
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: String,
    pub name: String,
    pub kind: SceneObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scaling: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

fn default_version() -> u32 {
    1
}

impl SceneDocument {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: SceneDocument =
            serde_json::from_str(raw).context("parsing scene document")?;
        document.validate()?;
        Ok(document)
    }

    /// Checks id uniqueness, parent references, model paths, and that the
    /// parent chain is acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut parents: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for object in &self.objects {
            ensure!(!object.id.is_empty(), "scene object with empty id");
            if parents
                .insert(object.id.as_str(), object.parent.as_deref())
                .is_some()
            {
                bail!("duplicate scene object id '{}'", object.id);
            }
            if object.kind == SceneObjectKind::Model {
                ensure!(
                    object.model_path.is_some(),
                    "model object '{}' has no model path",
                    object.id
                );
            }
        }

        for (id, parent) in &parents {
            if let Some(parent) = parent {
                ensure!(
                    parents.contains_key(parent),
                    "scene object '{}' references missing parent '{}'",
                    id,
                    parent
                );
            }
            let mut seen = BTreeSet::new();
            let mut cursor = Some(*id);
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    bail!("scene object '{}' is part of a parent cycle", id);
                }
                cursor = parents.get(current).copied().flatten();
            }
        }
        Ok(())
    }

    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a SceneObject> {
        self.objects
            .iter()
            .filter(move |object| object.parent.as_deref() == Some(parent))
    }
}

/// Body of a save request: the serialized scene travels as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSceneRequest {
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct SceneStore {
    path: PathBuf,
}

impl SceneStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rejects payloads that are not a valid scene document so a broken
    /// editor state never replaces the last good save.
    pub fn save(&self, request: &SaveSceneRequest) -> Result<SceneDocument> {
        let document = SceneDocument::from_json_str(&request.data)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating scene directory {}", parent.display()))?;
            }
        }
        fs::write(&self.path, &request.data)
            .with_context(|| format!("writing scene to {}", self.path.display()))?;
        Ok(document)
    }

    pub fn load(&self) -> Result<Option<SceneDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading scene from {}", self.path.display()))?;
        SceneDocument::from_json_str(&raw)
            .with_context(|| format!("loading scene {}", self.path.display()))
            .map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// Recursively lists model files under `root`, sorted by relative path.
pub fn list_models(root: &Path) -> Result<Vec<ModelEntry>> {
    ensure!(root.is_dir(), "model root {} is not a directory", root.display());
    let mut models = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("scanning {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_model = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                MODEL_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if !is_model {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let size = entry
            .metadata()
            .with_context(|| format!("reading metadata for {}", path.display()))?
            .len();
        models.push(ModelEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: relative.to_string_lossy().replace('\\', "/"),
            size,
        });
    }
    models.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(models)
}
