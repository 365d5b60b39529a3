//! Scripted input playback against a session at a fixed frame step.
//!
//! Scenarios address meshes by id; pointer steps cast a ray from the camera
//! through the mesh centre, the way a player would aim at it.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::events::SessionEvent;
use crate::scene::SceneGraph;
use crate::session::InteractionSystem;
use crate::status::StatusSnapshot;

pub const FRAME_STEP: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    Wait {
        ms: u64,
    },
    Key {
        key: String,
    },
    Look {
        dx: f32,
        dy: f32,
    },
    PointerDown {
        mesh: String,
        #[serde(default)]
        x: f32,
    },
    PointerMove {
        mesh: String,
        x: f32,
    },
    PointerUp,
    Wheel {
        mesh: String,
        #[serde(rename = "deltaY")]
        delta_y: f32,
    },
    SceneChanged,
    SetPoseOverride {
        machine: String,
        pose: CameraPose,
    },
    ClearPoseOverride {
        machine: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

fn wait(ms: u64) -> ScenarioStep {
    ScenarioStep::Wait { ms }
}

fn key(key: &str) -> ScenarioStep {
    ScenarioStep::Key {
        key: key.to_string(),
    }
}

fn press(mesh: &str, x: f32) -> ScenarioStep {
    ScenarioStep::PointerDown {
        mesh: mesh.to_string(),
        x,
    }
}

fn drag(mesh: &str, x: f32) -> ScenarioStep {
    ScenarioStep::PointerMove {
        mesh: mesh.to_string(),
        x,
    }
}

impl Scenario {
    pub const BUILTIN: [&'static str; 3] = ["monitor_power", "chat_terminal", "radio_tuning"];

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Built-in scenarios over the demo desk.
    pub fn builtin(name: &str) -> Option<Self> {
        let steps = match name {
            // Focus the monitor, lock on, power it, and leave.
            "monitor_power" => vec![
                wait(100),
                key("KeyF"),
                wait(1_100),
                press("monitor_power_button", 0.0),
                wait(800),
                key("Escape"),
                wait(1_200),
            ],
            "chat_terminal" => vec![
                ScenarioStep::Look { dx: -179.0, dy: 13.0 },
                wait(100),
                key("KeyF"),
                wait(1_100),
                press("chat_terminal_power_button", 0.0),
                wait(1_500),
                ScenarioStep::Wheel {
                    mesh: "chat_terminal_screen".to_string(),
                    delta_y: 60.0,
                },
                wait(800),
                key("Escape"),
                wait(1_200),
            ],
            "radio_tuning" => vec![
                ScenarioStep::Look { dx: 250.0, dy: 60.0 },
                wait(100),
                key("KeyF"),
                wait(1_100),
                press("radio_volume_dial", 100.0),
                drag("radio_volume_dial", 160.0),
                ScenarioStep::PointerUp,
                press("radio_band_lever", 0.0),
                drag("radio_band_lever", 60.0),
                ScenarioStep::PointerUp,
                wait(200),
                key("Escape"),
                wait(1_200),
            ],
            _ => return None,
        };
        Some(Scenario {
            name: name.to_string(),
            steps,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub frames: u64,
    pub events: Vec<SessionEvent>,
    pub status: StatusSnapshot,
}

impl ScenarioReport {
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.iter().map(SessionEvent::name).collect()
    }

    pub fn write_event_log(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.events)
            .context("serializing event log to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing event log to {}", path.display()))
    }
}

pub fn run_scenario<S: SceneGraph>(
    session: &mut InteractionSystem<S>,
    scenario: &Scenario,
) -> ScenarioReport {
    let mut frames = 0u64;
    let mut events = session.take_events();
    for step in &scenario.steps {
        match step {
            ScenarioStep::Wait { ms } => {
                let steps = ms.div_ceil(FRAME_STEP.as_millis() as u64);
                for _ in 0..steps {
                    session.update(FRAME_STEP);
                    frames += 1;
                }
            }
            ScenarioStep::Key { key } => {
                if !session.key_down(key) {
                    log::debug!("key {key} had no effect at {:?}", session.now());
                }
            }
            ScenarioStep::Look { dx, dy } => {
                session.look(*dx, *dy);
            }
            ScenarioStep::PointerDown { mesh, x } => match session.ray_to_mesh(mesh) {
                Some(ray) => {
                    if !session.pointer_down(&ray, *x) {
                        log::debug!("pointer down on {mesh} hit nothing interactive");
                    }
                }
                None => log::warn!("scenario references missing mesh {mesh}"),
            },
            ScenarioStep::PointerMove { mesh, x } => match session.ray_to_mesh(mesh) {
                Some(ray) => {
                    session.pointer_move(&ray, *x);
                }
                None => log::warn!("scenario references missing mesh {mesh}"),
            },
            ScenarioStep::PointerUp => {
                session.pointer_up();
            }
            ScenarioStep::Wheel { mesh, delta_y } => match session.ray_to_mesh(mesh) {
                Some(ray) => {
                    session.wheel(&ray, *delta_y);
                }
                None => log::warn!("scenario references missing mesh {mesh}"),
            },
            ScenarioStep::SceneChanged => session.notify_scene_changed(),
            ScenarioStep::SetPoseOverride { machine, pose } => {
                session.registry_mut().set_pose_override(machine, *pose);
            }
            ScenarioStep::ClearPoseOverride { machine } => {
                session.registry_mut().clear_pose_override(machine);
            }
        }
        events.extend(session.take_events());
    }
    ScenarioReport {
        name: scenario.name.clone(),
        frames,
        events,
        status: session.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Scenario, ScenarioStep};

    #[test]
    fn builtin_names_resolve() {
        for name in Scenario::BUILTIN {
            let scenario = Scenario::builtin(name).expect("built-in scenario");
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::builtin("nope").is_none());
    }

    #[test]
    fn steps_parse_from_json() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "name": "custom",
                "steps": [
                    { "step": "wait", "ms": 32 },
                    { "step": "key", "key": "KeyF" },
                    { "step": "pointer_down", "mesh": "monitor_power_button" },
                    { "step": "wheel", "mesh": "computer_monitor_screen", "deltaY": 40 },
                    { "step": "pointer_up" }
                ]
            }"#,
        )
        .expect("scenario parses");
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(
            scenario.steps[2],
            ScenarioStep::PointerDown {
                mesh: "monitor_power_button".to_string(),
                x: 0.0
            }
        );
    }
}
