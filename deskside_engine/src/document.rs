//! Off-screen documents shown on screen surfaces.
//!
//! A [`SurfaceDocument`] is whatever content a screen displays: it reports
//! when it has settled, serializes itself for the rasterizer, accumulates
//! mutation records between drains, and accepts synthetic pointer input.
//! [`PanelDocument`] is the built-in implementation driven by a
//! [`PanelLayout`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use deskside_formats::{FrameEntry, PanelLayout, PanelNode, PanelRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raster::{Quad, RenderList};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("frame '{frame}' points at unknown document {path}")]
    UnknownDocument { frame: String, path: String },
    #[error("layout for frame '{frame}' is unusable: {message}")]
    Layout { frame: String, message: String },
    #[error("document is not ready to serialize")]
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    pub target: String,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerKind {
    Move,
    Click,
    Wheel { delta_y: f32 },
}

/// Pointer input already mapped into document pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
}

pub trait SurfaceDocument {
    /// Layout and fonts have settled.
    fn is_ready(&self) -> bool;

    fn size(&self) -> (u32, u32);

    fn serialize(&self) -> Result<String, DocumentError>;

    /// Mutations recorded since the last call, oldest first.
    fn take_mutations(&mut self) -> Vec<MutationRecord>;

    fn dispatch_pointer(&mut self, event: SurfacePointerEvent);

    /// Runs document-side timers (scripted content, transient styles).
    fn advance(&mut self, _now: Duration) {}
}

pub trait DocumentLoader {
    fn load(
        &mut self,
        frame_name: &str,
        frame: &FrameEntry,
    ) -> Result<Box<dyn SurfaceDocument>, DocumentError>;
}

/// Lines appended to a list node at fixed offsets after the document starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatScript {
    pub list_id: String,
    pub lines: Vec<ScriptLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLine {
    pub after_ms: u64,
    pub text: String,
}

const PRESS_FLASH: Duration = Duration::from_millis(150);
const TEXT_GLYPH_WIDTH: u32 = 7;
const TEXT_HEIGHT: u32 = 10;

pub struct PanelDocument {
    layout: PanelLayout,
    ready_at: Duration,
    now: Duration,
    started: Option<Duration>,
    hovered: Option<String>,
    pressed: Option<(String, Duration)>,
    clicks: BTreeMap<String, u32>,
    scroll: BTreeMap<String, u32>,
    script: Option<ChatScript>,
    script_cursor: usize,
    mutations: Vec<MutationRecord>,
}

impl PanelDocument {
    pub fn new(layout: PanelLayout) -> Self {
        PanelDocument {
            layout,
            ready_at: Duration::ZERO,
            now: Duration::ZERO,
            started: None,
            hovered: None,
            pressed: None,
            clicks: BTreeMap::new(),
            scroll: BTreeMap::new(),
            script: None,
            script_cursor: 0,
            mutations: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: ChatScript) -> Self {
        self.script = Some(script);
        self
    }

    /// Holds `is_ready` false until `at`, mimicking slow font loads.
    pub fn ready_at(mut self, at: Duration) -> Self {
        self.ready_at = at;
        self
    }

    pub fn layout(&self) -> &PanelLayout {
        &self.layout
    }

    pub fn clicks(&self, node_id: &str) -> u32 {
        self.clicks.get(node_id).copied().unwrap_or(0)
    }

    pub fn scroll_offset(&self, node_id: &str) -> u32 {
        self.scroll.get(node_id).copied().unwrap_or(0)
    }

    fn node_mut(&mut self, node_id: &str) -> Option<&mut PanelNode> {
        self.layout.nodes.iter_mut().find(|node| node.id == node_id)
    }

    fn record(&mut self, target: &str, kind: MutationKind) {
        self.mutations.push(MutationRecord {
            target: target.to_string(),
            kind,
        });
    }

    fn max_scroll(node: &PanelNode) -> u32 {
        let content = node.items.len() as u32 * node.item_height;
        content.saturating_sub(node.rect.height)
    }

    fn append_line(&mut self, list_id: &str, text: String) {
        let Some(node) = self.node_mut(list_id) else {
            log::warn!("chat script targets missing list '{list_id}'");
            return;
        };
        node.items.push(text);
        let bottom = Self::max_scroll(node);
        self.scroll.insert(list_id.to_string(), bottom);
        self.record(list_id, MutationKind::ChildList);
    }

    fn fill_for(&self, node: &PanelNode) -> [u8; 4] {
        let [r, g, b, a] = node.fill;
        if self.pressed.as_ref().is_some_and(|(id, _)| *id == node.id) {
            [r / 2, g / 2, b / 2, a]
        } else if self.hovered.as_deref() == Some(node.id.as_str()) {
            [
                r.saturating_add(32),
                g.saturating_add(32),
                b.saturating_add(32),
                a,
            ]
        } else {
            node.fill
        }
    }

    fn render_list(&self) -> RenderList {
        let mut quads = Vec::new();
        for node in &self.layout.nodes {
            let rect = node.rect;
            quads.push(Quad {
                x: rect.x as i32,
                y: rect.y as i32,
                width: rect.width,
                height: rect.height,
                fill: self.fill_for(node),
            });
            if let Some(text) = &node.text {
                push_text_bar(&mut quads, rect.x as i32 + 4, rect.y as i32 + 4, rect.width, text);
            }
            if node.role == PanelRole::List {
                let offset = self.scroll_offset(&node.id) as i32;
                for (row, item) in node.items.iter().enumerate() {
                    let top = rect.y as i32 + row as i32 * node.item_height as i32 - offset;
                    let bottom = top + node.item_height as i32;
                    if bottom <= rect.y as i32 || top >= (rect.y + rect.height) as i32 {
                        continue;
                    }
                    let visible_top = top.max(rect.y as i32);
                    let visible_bottom = bottom.min((rect.y + rect.height) as i32);
                    let shade = if row % 2 == 0 { 0 } else { 24 };
                    quads.push(Quad {
                        x: rect.x as i32,
                        y: visible_top,
                        width: rect.width,
                        height: (visible_bottom - visible_top) as u32,
                        fill: [shade, shade, shade, 48],
                    });
                    if top >= rect.y as i32 {
                        push_text_bar(&mut quads, rect.x as i32 + 6, top + 6, rect.width, item);
                    }
                }
            }
        }
        RenderList {
            width: self.layout.width,
            height: self.layout.height,
            background: self.layout.background,
            quads,
        }
    }
}

/// Text is drawn as a solid bar one glyph cell per character.
fn push_text_bar(quads: &mut Vec<Quad>, x: i32, y: i32, max_width: u32, text: &str) {
    let glyphs = text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    let width = (glyphs * TEXT_GLYPH_WIDTH).min(max_width.saturating_sub(8));
    if width == 0 {
        return;
    }
    quads.push(Quad {
        x,
        y,
        width,
        height: TEXT_HEIGHT,
        fill: [20, 20, 20, 220],
    });
}

impl SurfaceDocument for PanelDocument {
    fn is_ready(&self) -> bool {
        self.now >= self.ready_at
    }

    fn size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    fn serialize(&self) -> Result<String, DocumentError> {
        if !self.is_ready() {
            return Err(DocumentError::NotReady);
        }
        serde_json::to_string(&self.render_list()).map_err(|err| DocumentError::Layout {
            frame: String::new(),
            message: err.to_string(),
        })
    }

    fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    fn dispatch_pointer(&mut self, event: SurfacePointerEvent) {
        let target = self
            .layout
            .node_at(event.x, event.y)
            .map(|node| (node.id.clone(), node.role));
        match event.kind {
            PointerKind::Move => {
                let hovered = target
                    .filter(|(_, role)| *role == PanelRole::Button)
                    .map(|(id, _)| id);
                if hovered != self.hovered {
                    if let Some(previous) = self.hovered.take() {
                        self.record(&previous, MutationKind::Attributes);
                    }
                    if let Some(current) = &hovered {
                        self.record(current, MutationKind::Attributes);
                    }
                    self.hovered = hovered;
                }
            }
            PointerKind::Click => {
                let Some((id, PanelRole::Button)) = target else {
                    return;
                };
                let count = self.clicks.entry(id.clone()).or_insert(0);
                *count += 1;
                log::debug!("panel button '{id}' clicked ({count} total)");
                self.pressed = Some((id.clone(), self.now + PRESS_FLASH));
                self.record(&id, MutationKind::Attributes);
            }
            PointerKind::Wheel { delta_y } => {
                let Some((id, PanelRole::List)) = target else {
                    return;
                };
                let Some(node) = self.layout.nodes.iter().find(|node| node.id == id) else {
                    return;
                };
                let max = Self::max_scroll(node) as f32;
                let current = self.scroll_offset(&id) as f32;
                let next = (current + delta_y).clamp(0.0, max).round() as u32;
                if next != current as u32 {
                    self.scroll.insert(id.clone(), next);
                    self.record(&id, MutationKind::Attributes);
                }
            }
        }
    }

    fn advance(&mut self, now: Duration) {
        self.now = now;
        let started = *self.started.get_or_insert(now);

        if let Some((id, until)) = self.pressed.clone() {
            if now >= until {
                self.pressed = None;
                self.record(&id, MutationKind::Attributes);
            }
        }

        let mut due = Vec::new();
        if let Some(script) = &self.script {
            while let Some(line) = script.lines.get(self.script_cursor) {
                if now < started + Duration::from_millis(line.after_ms) {
                    break;
                }
                due.push((script.list_id.clone(), line.text.clone()));
                self.script_cursor += 1;
            }
        }
        for (list_id, text) in due {
            self.append_line(&list_id, text);
        }
    }
}

/// Loads panel documents by frame path, from layouts registered in memory
/// or from a `.json` layout beside the frame's path under `root`.
#[derive(Debug, Clone, Default)]
pub struct PanelLoader {
    root: Option<PathBuf>,
    layouts: BTreeMap<String, PanelLayout>,
    scripts: BTreeMap<String, ChatScript>,
}

impl PanelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        PanelLoader {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn insert_layout(&mut self, path: &str, layout: PanelLayout) {
        self.layouts.insert(path.to_string(), layout);
    }

    pub fn insert_script(&mut self, path: &str, script: ChatScript) {
        self.scripts.insert(path.to_string(), script);
    }
}

impl DocumentLoader for PanelLoader {
    fn load(
        &mut self,
        frame_name: &str,
        frame: &FrameEntry,
    ) -> Result<Box<dyn SurfaceDocument>, DocumentError> {
        let layout = match (self.layouts.get(&frame.path), &self.root) {
            (Some(layout), _) => layout.clone(),
            (None, Some(root)) => {
                let path = root.join(&frame.path).with_extension("json");
                PanelLayout::from_json_file(&path).map_err(|err| DocumentError::Layout {
                    frame: frame_name.to_string(),
                    message: format!("{err:#}"),
                })?
            }
            (None, None) => {
                return Err(DocumentError::UnknownDocument {
                    frame: frame_name.to_string(),
                    path: frame.path.clone(),
                })
            }
        };
        let mut document = PanelDocument::new(layout);
        if let Some(script) = self.scripts.get(&frame.path) {
            document = document.with_script(script.clone());
        }
        log::debug!("loaded frame '{frame_name}' from {}", frame.path);
        Ok(Box::new(document))
    }
}
