//! Interaction core for the deskside scene: machine lock-on choreography,
//! per-element press/drag behaviour, crosshair focus tracking, and the
//! screen capture pipeline that rasterizes off-screen documents into the
//! textures shown on in-world monitors.
//!
//! The 3D engine and the document renderer live behind [`scene::SceneGraph`],
//! [`document::SurfaceDocument`], and [`raster::Rasterizer`]; everything else
//! runs on a virtual clock advanced by [`session::InteractionSystem::update`].

pub mod actions;
pub mod ambient;
pub mod animation;
pub mod camera;
pub mod config;
pub mod demo;
pub mod document;
pub mod elements;
pub mod events;
pub mod focus;
pub mod hud;
pub mod lockon;
pub mod machines;
pub mod raster;
pub mod scenario;
pub mod scene;
pub mod screen;
pub mod session;
pub mod status;
pub mod timers;

pub use camera::{Camera, CameraPose};
pub use config::{InteractionConfig, ScreenConfig};
pub use lockon::{LockOnCoordinator, Phase};
pub use machines::{MachineDescriptor, MachineRegistry};
pub use scene::{MemoryScene, SceneGraph};
pub use screen::{ScreenCaptureController, ScreenHandle};
pub use session::InteractionSystem;

/// Whole milliseconds of a session timestamp, as written to event logs.
pub fn millis(at: std::time::Duration) -> u64 {
    at.as_millis() as u64
}
