//! Panel layouts describe the content of an off-screen screen document: a
//! fixed-size page made of filled rectangles, clickable buttons, and
//! scrollable lists. The engine turns a layout into a live document that
//! records mutations as the player interacts with it.

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub type Rgba = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PanelRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x as f32
            && y >= self.y as f32
            && x < (self.x + self.width) as f32
            && y < (self.y + self.height) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PanelRole {
    #[default]
    Block,
    Button,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelNode {
    pub id: String,
    pub rect: PanelRect,
    pub fill: Rgba,
    #[serde(default)]
    pub role: PanelRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Rows of a `list` node, drawn top to bottom and scrolled by wheel input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(default = "default_item_height")]
    pub item_height: u32,
}

fn default_item_height() -> u32 {
    24
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
    #[serde(default)]
    pub nodes: Vec<PanelNode>,
}

impl PanelLayout {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading panel layout {}", path.display()))?;
        let layout: PanelLayout = serde_json::from_str(&raw)
            .with_context(|| format!("parsing panel layout {}", path.display()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn blank(width: u32, height: u32, background: Rgba) -> Self {
        PanelLayout {
            width,
            height,
            background,
            nodes: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "panel layout must have a non-zero size (got {}x{})",
            self.width,
            self.height
        );
        for node in &self.nodes {
            ensure!(
                node.rect.x + node.rect.width <= self.width
                    && node.rect.y + node.rect.height <= self.height,
                "panel node '{}' extends past the {}x{} page",
                node.id,
                self.width,
                self.height
            );
            if node.role == PanelRole::List {
                ensure!(node.item_height > 0, "list '{}' has zero item height", node.id);
            }
        }
        Ok(())
    }

    /// Topmost node under the given page coordinate.
    pub fn node_at(&self, x: f32, y: f32) -> Option<&PanelNode> {
        self.nodes.iter().rev().find(|node| node.rect.contains(x, y))
    }
}
