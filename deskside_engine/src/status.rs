use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::actions::DeviceSettings;
use crate::camera::CameraPose;
use crate::hud::{Hud, PointerState, RenderSettings};
use crate::lockon::Phase;
use crate::screen::ScreenStatus;

/// Point-in-time view of the interaction core, shaped like the dev
/// server's `/status` body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub time_ms: u64,
    pub phase: Phase,
    pub focused: Option<String>,
    pub active_machine: Option<String>,
    pub camera: CameraPose,
    pub control_attached: bool,
    pub hud: Hud,
    pub pointer: PointerState,
    pub render: RenderSettings,
    pub screens: Vec<ScreenStatus>,
    pub settings: DeviceSettings,
    pub elements_registered: usize,
    pub elements_pending: usize,
}

impl StatusSnapshot {
    pub fn screen(&self, id: &str) -> Option<&ScreenStatus> {
        self.screens.iter().find(|screen| screen.id == id)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("serializing status snapshot to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing status JSON to {}", path.display()))
    }
}
