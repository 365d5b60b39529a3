use std::{fs, path::Path, time::Duration};

use anyhow::{ensure, Context, Result};
use glam::{UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraPose, RotationLimits};

/// Timing and tuning for the interaction core. Every field has a default so
/// a config file only needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    pub interact_key: String,
    pub cancel_key: String,
    /// Run the focus ray test on every Nth frame.
    pub focus_throttle_frames: u32,
    pub focus_ray_length: f32,
    /// Delays after start-up at which the interactable allow-list is
    /// re-scanned for late-loading models.
    pub focus_rescan_ms: Vec<u64>,
    pub element_retry_ms: u64,
    pub transition_ms: u64,
    /// Extra delay between the end of the return animation and re-attaching
    /// camera control.
    pub reattach_delay_ms: u64,
    pub button_press_ms: u64,
    pub button_hold_ms: u64,
    pub button_release_ms: u64,
    pub start_pose: CameraPose,
    pub start_limits: RotationLimits,
    /// Used when a focused machine has no lock-on pose.
    pub default_pose: CameraPose,
    pub screens: Vec<ScreenConfig>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        InteractionConfig {
            interact_key: "KeyF".to_string(),
            cancel_key: "Escape".to_string(),
            focus_throttle_frames: 3,
            focus_ray_length: 5.0,
            focus_rescan_ms: vec![1_000, 3_000],
            element_retry_ms: 1_000,
            transition_ms: 1_000,
            reattach_delay_ms: 50,
            button_press_ms: 100,
            button_hold_ms: 60,
            button_release_ms: 100,
            start_pose: CameraPose::new(Vec3::new(0.0, 1.3, -2.0), Vec3::ZERO),
            start_limits: RotationLimits {
                min_pitch: Some(-1.2),
                max_pitch: Some(1.2),
            },
            default_pose: CameraPose::new(Vec3::new(0.0, 1.4, -1.0), Vec3::ZERO),
            screens: vec![
                ScreenConfig::new("monitor", "computer_monitor", "computer_monitor_screen"),
                ScreenConfig {
                    continuous_capture: true,
                    frame: Some("chat".to_string()),
                    ..ScreenConfig::new("chat_terminal", "chat_terminal", "chat_terminal_screen")
                },
            ],
        }
    }
}

impl InteractionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading interaction config {}", path.display()))?;
        let config: InteractionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing interaction config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.focus_throttle_frames > 0,
            "focusThrottleFrames must be at least 1"
        );
        ensure!(self.focus_ray_length > 0.0, "focusRayLength must be positive");
        ensure!(self.element_retry_ms > 0, "elementRetryMs must be positive");
        ensure!(
            self.interact_key != self.cancel_key,
            "interact and cancel keys must differ"
        );
        for screen in &self.screens {
            screen.validate()?;
        }
        Ok(())
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn reattach_delay(&self) -> Duration {
        Duration::from_millis(self.reattach_delay_ms)
    }

    pub fn element_retry(&self) -> Duration {
        Duration::from_millis(self.element_retry_ms)
    }

    pub fn button_timing(&self) -> ButtonTiming {
        ButtonTiming {
            press: Duration::from_millis(self.button_press_ms),
            hold: Duration::from_millis(self.button_hold_ms),
            release: Duration::from_millis(self.button_release_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTiming {
    pub press: Duration,
    pub hold: Duration,
    pub release: Duration,
}

impl ButtonTiming {
    pub fn total(&self) -> Duration {
        self.press + self.hold + self.release
    }
}

/// One physical screen whose texture is produced from an off-screen
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenConfig {
    pub id: String,
    /// Machine whose lock-on activates this screen.
    pub machine_id: String,
    pub mesh_id: String,
    #[serde(default = "default_texture_size")]
    pub texture_size: UVec2,
    /// Quarter turns baked into the screen mesh's UV layout.
    #[serde(default)]
    pub uv_quarter_turns: u8,
    /// Frame to load at power-on; the config's active frame when unset.
    #[serde(default)]
    pub frame: Option<String>,
    /// Recapture on a fixed interval while locked on, for animated content.
    #[serde(default)]
    pub continuous_capture: bool,
    #[serde(default = "default_capture_interval_ms")]
    pub capture_interval_ms: u64,
    #[serde(default = "default_follow_up_ms")]
    pub follow_up_capture_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub power_on_settle_ms: u64,
    #[serde(default = "default_scroll_resume_ms")]
    pub scroll_resume_ms: u64,
    #[serde(default = "default_raster_timeout_ms")]
    pub raster_timeout_ms: u64,
}

fn default_texture_size() -> UVec2 {
    UVec2::new(1024, 768)
}

fn default_capture_interval_ms() -> u64 {
    100
}

fn default_follow_up_ms() -> u64 {
    400
}

fn default_settle_ms() -> u64 {
    300
}

fn default_scroll_resume_ms() -> u64 {
    500
}

fn default_raster_timeout_ms() -> u64 {
    5_000
}

impl ScreenConfig {
    pub fn new(id: &str, machine_id: &str, mesh_id: &str) -> Self {
        ScreenConfig {
            id: id.to_string(),
            machine_id: machine_id.to_string(),
            mesh_id: mesh_id.to_string(),
            texture_size: default_texture_size(),
            uv_quarter_turns: 0,
            frame: None,
            continuous_capture: false,
            capture_interval_ms: default_capture_interval_ms(),
            follow_up_capture_ms: default_follow_up_ms(),
            power_on_settle_ms: default_settle_ms(),
            scroll_resume_ms: default_scroll_resume_ms(),
            raster_timeout_ms: default_raster_timeout_ms(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.texture_size.x > 0 && self.texture_size.y > 0,
            "screen '{}' has a zero-sized texture",
            self.id
        );
        ensure!(
            self.capture_interval_ms > 0,
            "screen '{}' needs a positive capture interval",
            self.id
        );
        Ok(())
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_capture_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.power_on_settle_ms)
    }

    pub fn scroll_resume_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_resume_ms)
    }

    pub fn raster_timeout(&self) -> Duration {
        Duration::from_millis(self.raster_timeout_ms)
    }
}
