//! The built-in desk: meshes for the four machines, the panel content shown
//! on the two screens, and a helper that wires them into a session.

use std::path::PathBuf;

use deskside_formats::{FrameConfig, PanelLayout, PanelNode, PanelRect, PanelRole};
use glam::Vec3;

use crate::ambient::{AmbientAnimation, AmbientHandle};
use crate::config::InteractionConfig;
use crate::document::{ChatScript, PanelLoader, ScriptLine};
use crate::machines::MachineRegistry;
use crate::raster::SoftwareRasterizer;
use crate::scene::{MemoryScene, MeshNode};
use crate::screen::{ScreenCaptureController, ScreenHandle};
use crate::session::InteractionSystem;

pub const DESKTOP_FRAME_PATH: &str = "frames/desktop.html";
pub const CHAT_FRAME_PATH: &str = "frames/chat.html";

fn mesh(x: f32, y: f32, z: f32, hx: f32, hy: f32, hz: f32) -> MeshNode {
    MeshNode::boxed(Vec3::new(x, y, z), Vec3::new(hx, hy, hz))
}

/// Desk layout seen from the start pose at (0, 1.3, -2) looking down +Z.
pub fn demo_scene() -> MemoryScene {
    let mut scene = MemoryScene::new();
    scene.insert("desk", mesh(0.0, 0.7, 0.5, 1.6, 0.03, 0.6));

    scene.insert("computer_monitor", mesh(0.0, 1.2, 0.5, 0.35, 0.25, 0.05));
    scene.insert(
        "computer_monitor_screen",
        mesh(0.0, 1.22, 0.44, 0.3, 0.2, 0.01).with_material("monitor_screen_mat"),
    );
    scene.insert("monitor_power_button", mesh(0.28, 0.98, 0.44, 0.02, 0.02, 0.02));
    scene.insert("monitor_brightness_dial", mesh(-0.28, 0.98, 0.44, 0.02, 0.02, 0.02));

    scene.insert("chat_terminal", mesh(-1.1, 1.2, 1.0, 0.3, 0.22, 0.05));
    scene.insert(
        "chat_terminal_screen",
        mesh(-1.1, 1.22, 0.94, 0.25, 0.18, 0.01).with_material("chat_screen_mat"),
    );
    scene.insert(
        "chat_terminal_power_button",
        mesh(-0.85, 0.99, 0.94, 0.02, 0.02, 0.02),
    );

    scene.insert("radio_body", mesh(1.2, 1.0, 0.2, 0.2, 0.12, 0.1));
    scene.insert("radio_antenna", mesh(1.3, 1.25, 0.2, 0.01, 0.15, 0.01));
    scene.insert("radio_volume_dial", mesh(1.1, 1.0, 0.085, 0.025, 0.025, 0.015));
    scene.insert("radio_band_lever", mesh(1.3, 1.0, 0.09, 0.01, 0.03, 0.01));

    scene.insert("equalizer_body", mesh(-1.2, 1.0, 0.2, 0.25, 0.12, 0.08));
    for (band, x) in [("low", -1.35), ("mid", -1.2), ("high", -1.05)] {
        scene.insert(
            &format!("equalizer_{band}_slider"),
            mesh(x, 1.0, 0.11, 0.015, 0.02, 0.01),
        );
    }
    scene
}

fn node(id: &str, rect: [u32; 4], fill: [u8; 4], role: PanelRole, text: Option<&str>) -> PanelNode {
    PanelNode {
        id: id.to_string(),
        rect: PanelRect {
            x: rect[0],
            y: rect[1],
            width: rect[2],
            height: rect[3],
        },
        fill,
        role,
        text: text.map(str::to_string),
        items: Vec::new(),
        item_height: 24,
    }
}

pub fn desktop_layout() -> PanelLayout {
    let mut layout = PanelLayout::blank(1024, 768, [18, 52, 86, 255]);
    layout.nodes = vec![
        node("taskbar", [0, 728, 1024, 40], [30, 30, 36, 255], PanelRole::Block, None),
        node("start", [8, 734, 96, 28], [60, 140, 60, 255], PanelRole::Button, Some("Start")),
        node("icon_terminal", [32, 32, 96, 96], [220, 220, 220, 255], PanelRole::Button, Some("Terminal")),
        node("icon_files", [32, 160, 96, 96], [220, 200, 120, 255], PanelRole::Button, Some("Files")),
        node("window", [220, 96, 600, 420], [236, 236, 236, 255], PanelRole::Block, Some("Notes")),
    ];
    let mut notes = node("notes", [232, 136, 576, 368], [250, 250, 250, 255], PanelRole::List, None);
    notes.items = (1..=24).map(|n| format!("note {n}")).collect();
    layout.nodes.push(notes);
    layout
}

pub fn chat_layout() -> PanelLayout {
    let mut layout = PanelLayout::blank(1024, 768, [12, 12, 16, 255]);
    layout.nodes = vec![
        node("header", [0, 0, 1024, 56], [40, 40, 60, 255], PanelRole::Block, Some("Chat")),
        node("messages", [16, 72, 992, 592], [20, 20, 28, 255], PanelRole::List, None),
        node("input", [16, 680, 880, 64], [36, 36, 48, 255], PanelRole::Block, None),
        node("send", [912, 680, 96, 64], [70, 110, 200, 255], PanelRole::Button, Some("Send")),
    ];
    layout
}

pub fn chat_script() -> ChatScript {
    let lines = [
        "connecting...",
        "connected.",
        "hello? is anyone at the desk?",
        "the radio has been picking up something odd.",
        "try the band lever.",
    ];
    ChatScript {
        list_id: "messages".to_string(),
        lines: lines
            .iter()
            .enumerate()
            .map(|(index, text)| ScriptLine {
                after_ms: 600 * (index as u64 + 1),
                text: text.to_string(),
            })
            .collect(),
    }
}

pub fn demo_frames() -> FrameConfig {
    let mut frames = FrameConfig::single("desktop", DESKTOP_FRAME_PATH);
    frames.insert("chat", CHAT_FRAME_PATH);
    frames
}

pub fn demo_loader() -> PanelLoader {
    let mut loader = PanelLoader::new();
    loader.insert_layout(DESKTOP_FRAME_PATH, desktop_layout());
    loader.insert_layout(CHAT_FRAME_PATH, chat_layout());
    loader.insert_script(CHAT_FRAME_PATH, chat_script());
    loader
}

pub fn demo_ambients() -> Vec<AmbientAnimation> {
    vec![AmbientAnimation::new(
        "radio_motion",
        "radio",
        "radio_body",
        0.03,
        2_400,
    )]
}

/// Where screen documents come from: the built-in panels, or `.json`
/// layouts beside each frame path under a directory.
#[derive(Debug, Clone, Default)]
pub enum ContentSource {
    #[default]
    BuiltIn,
    Directory(PathBuf),
}

impl ContentSource {
    fn loader(&self) -> PanelLoader {
        match self {
            ContentSource::BuiltIn => demo_loader(),
            ContentSource::Directory(root) => {
                let mut loader = PanelLoader::with_root(root.clone());
                loader.insert_script(CHAT_FRAME_PATH, chat_script());
                loader
            }
        }
    }
}

/// Builds one screen controller per configured screen and a session over
/// `scene`.
pub fn build_session(
    scene: MemoryScene,
    registry: MachineRegistry,
    config: InteractionConfig,
    frames: FrameConfig,
    content: &ContentSource,
) -> InteractionSystem<MemoryScene> {
    let screens = config
        .screens
        .iter()
        .map(|screen| {
            ScreenHandle::new(ScreenCaptureController::new(
                screen.clone(),
                frames.clone(),
                Box::new(content.loader()),
                Box::new(SoftwareRasterizer),
            ))
        })
        .collect();
    let ambients = demo_ambients().into_iter().map(AmbientHandle::new).collect();
    InteractionSystem::new(scene, registry, config, screens, ambients)
}

/// The full built-in desk with default tuning.
pub fn demo_session() -> InteractionSystem<MemoryScene> {
    build_session(
        demo_scene(),
        MachineRegistry::builtin(),
        InteractionConfig::default(),
        demo_frames(),
        &ContentSource::BuiltIn,
    )
}
