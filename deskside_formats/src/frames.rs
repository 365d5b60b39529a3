//! Frame configuration for screen surfaces.
//!
//! A frame config names the currently active frame and maps every frame name
//! to the document a screen loads when it powers on:
//!
//! ```json
//! { "activeFrame": "desktop", "frames": { "desktop": { "path": "frames/desktop.html" } } }
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfig {
    pub active_frame: String,
    #[serde(default)]
    pub frames: BTreeMap<String, FrameEntry>,
}

impl FrameConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: FrameConfig =
            serde_json::from_str(raw).context("parsing frame configuration json")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading frame configuration {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("loading frame configuration {}", path.display()))
    }

    /// Single-frame configuration, used when no config file is supplied.
    pub fn single(name: &str, path: &str) -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(
            name.to_string(),
            FrameEntry {
                path: path.to_string(),
                title: None,
            },
        );
        FrameConfig {
            active_frame: name.to_string(),
            frames,
        }
    }

    pub fn insert(&mut self, name: &str, path: &str) {
        self.frames.insert(
            name.to_string(),
            FrameEntry {
                path: path.to_string(),
                title: None,
            },
        );
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.frames.contains_key(&self.active_frame),
            "active frame '{}' is not defined (known: {})",
            self.active_frame,
            self.frame_names().join(", ")
        );
        for (name, entry) in &self.frames {
            ensure!(
                !entry.path.trim().is_empty(),
                "frame '{}' has an empty document path",
                name
            );
        }
        Ok(())
    }

    pub fn active(&self) -> Result<(&str, &FrameEntry)> {
        self.frame(&self.active_frame)
    }

    /// Resolves an explicitly named frame, or the active frame when `name` is
    /// `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<(&str, &FrameEntry)> {
        match name {
            Some(name) => self.frame(name),
            None => self.active(),
        }
    }

    fn frame(&self, name: &str) -> Result<(&str, &FrameEntry)> {
        self.frames
            .get_key_value(name)
            .map(|(key, entry)| (key.as_str(), entry))
            .ok_or_else(|| anyhow!("unknown frame '{}'", name))
    }

    pub fn frame_names(&self) -> Vec<&str> {
        self.frames.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::FrameConfig;

    const SAMPLE: &str = r#"{
        "activeFrame": "chat",
        "frames": {
            "desktop": { "path": "frames/desktop.html" },
            "chat": { "path": "frames/chat.html", "title": "Chat" }
        }
    }"#;

    #[test]
    fn active_frame_resolves_to_its_path() {
        let config = FrameConfig::from_json_str(SAMPLE).expect("sample parses");
        let (name, entry) = config.active().expect("active frame exists");
        assert_eq!(name, "chat");
        assert_eq!(entry.path, "frames/chat.html");
        assert_eq!(entry.title.as_deref(), Some("Chat"));
    }

    #[test]
    fn explicit_frame_overrides_active() {
        let config = FrameConfig::from_json_str(SAMPLE).expect("sample parses");
        let (name, entry) = config.resolve(Some("desktop")).expect("desktop exists");
        assert_eq!(name, "desktop");
        assert_eq!(entry.path, "frames/desktop.html");
        assert!(config.resolve(Some("missing")).is_err());
    }

    #[test]
    fn undefined_active_frame_is_rejected() {
        let raw = r#"{ "activeFrame": "nope", "frames": { "a": { "path": "a.html" } } }"#;
        let err = FrameConfig::from_json_str(raw).expect_err("active frame missing");
        assert!(err.to_string().contains("nope"));
    }
}
