//! Static machine table: which meshes trigger focus/lock-on, where the camera
//! parks, and which sub-elements each machine exposes.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use anyhow::{bail, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::actions::ActionKind;
use crate::camera::CameraPose;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    Button {
        #[serde(rename = "pressOffset")]
        press_offset: Vec3,
    },
    Dial {
        #[serde(rename = "rotationAxis")]
        rotation_axis: Vec3,
        sensitivity: f32,
    },
    Lever {
        #[serde(rename = "minOffset")]
        min_offset: Vec3,
        #[serde(rename = "maxOffset")]
        max_offset: Vec3,
        sensitivity: f32,
        #[serde(default)]
        initial: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub mesh_id: String,
    pub action: ActionKind,
    #[serde(flatten)]
    pub kind: ElementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDescriptor {
    pub id: String,
    pub display_name: String,
    /// Every mesh that stands for this machine; halves of one model share
    /// the descriptor and therefore the pose.
    pub mesh_ids: Vec<String>,
    #[serde(default)]
    pub lock_on_pose: Option<CameraPose>,
    /// Pose used instead of `lock_on_pose` while the machine's screen is on.
    #[serde(default)]
    pub powered_on_pose: Option<CameraPose>,
    /// Turn anti-aliasing off while locked on (keeps screen text crisp).
    #[serde(default)]
    pub suspend_antialiasing: bool,
    #[serde(default)]
    pub elements: BTreeMap<String, ElementDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct MachineRegistry {
    machines: BTreeMap<String, MachineDescriptor>,
    by_mesh: HashMap<String, String>,
    overrides: BTreeMap<String, CameraPose>,
}

impl MachineRegistry {
    pub fn new<I>(machines: I) -> Result<Self>
    where
        I: IntoIterator<Item = MachineDescriptor>,
    {
        let mut registry = MachineRegistry::default();
        for machine in machines {
            registry.insert(machine)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, machine: MachineDescriptor) -> Result<()> {
        if self.machines.contains_key(&machine.id) {
            bail!("duplicate machine id '{}'", machine.id);
        }
        if machine.mesh_ids.is_empty() {
            bail!("machine '{}' lists no meshes", machine.id);
        }
        for mesh_id in &machine.mesh_ids {
            if let Some(owner) = self.by_mesh.get(mesh_id) {
                bail!(
                    "mesh '{}' is claimed by both '{}' and '{}'",
                    mesh_id,
                    owner,
                    machine.id
                );
            }
            self.by_mesh.insert(mesh_id.clone(), machine.id.clone());
        }
        self.machines.insert(machine.id.clone(), machine);
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let machines: Vec<MachineDescriptor> =
            serde_json::from_str(raw).context("parsing machine table json")?;
        Self::new(machines)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading machine table {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("loading machine table {}", path.display()))
    }

    pub fn lookup_by_mesh_id(&self, mesh_id: &str) -> Option<&MachineDescriptor> {
        self.by_mesh
            .get(mesh_id)
            .and_then(|machine_id| self.machines.get(machine_id))
    }

    pub fn get(&self, machine_id: &str) -> Option<&MachineDescriptor> {
        self.machines.get(machine_id)
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineDescriptor> {
        self.machines.values()
    }

    /// Every mesh that can take focus, in a stable order.
    pub fn interactable_mesh_ids(&self) -> Vec<String> {
        self.machines
            .values()
            .flat_map(|machine| machine.mesh_ids.iter().cloned())
            .collect()
    }

    pub fn set_pose_override(&mut self, machine_id: &str, pose: CameraPose) {
        self.overrides.insert(machine_id.to_string(), pose);
    }

    pub fn clear_pose_override(&mut self, machine_id: &str) -> Option<CameraPose> {
        self.overrides.remove(machine_id)
    }

    pub fn pose_override(&self, machine_id: &str) -> Option<CameraPose> {
        self.overrides.get(machine_id).copied()
    }

    /// Live override, then the powered-on variant, then the base pose.
    pub fn resolve_lock_on_pose(&self, machine_id: &str, powered_on: bool) -> Option<CameraPose> {
        if let Some(pose) = self.pose_override(machine_id) {
            return Some(pose);
        }
        let machine = self.machines.get(machine_id)?;
        if powered_on {
            if let Some(pose) = machine.powered_on_pose {
                return Some(pose);
            }
        }
        machine.lock_on_pose
    }

    /// Built-in desk setup: the main monitor, the chat terminal, the radio,
    /// and the equalizer.
    pub fn builtin() -> Self {
        let machines = vec![
            MachineDescriptor {
                id: "computer_monitor".to_string(),
                display_name: "Computer Monitor".to_string(),
                mesh_ids: strings(&["computer_monitor", "computer_monitor_screen"]),
                lock_on_pose: Some(CameraPose::new(Vec3::new(0.0, 1.22, -0.25), Vec3::ZERO)),
                powered_on_pose: Some(CameraPose::new(Vec3::new(0.0, 1.22, -0.05), Vec3::ZERO)),
                suspend_antialiasing: true,
                elements: BTreeMap::from([
                    (
                        "power_button".to_string(),
                        button("monitor_power_button", ActionKind::TogglePower),
                    ),
                    (
                        "brightness_dial".to_string(),
                        dial("monitor_brightness_dial", Vec3::Z, 0.01, ActionKind::AdjustBrightness),
                    ),
                ]),
            },
            MachineDescriptor {
                id: "chat_terminal".to_string(),
                display_name: "Chat Terminal".to_string(),
                mesh_ids: strings(&["chat_terminal", "chat_terminal_screen"]),
                lock_on_pose: Some(CameraPose::new(Vec3::new(-1.1, 1.22, 0.45), Vec3::ZERO)),
                powered_on_pose: None,
                suspend_antialiasing: true,
                elements: BTreeMap::from([(
                    "power_button".to_string(),
                    button("chat_terminal_power_button", ActionKind::TogglePower),
                )]),
            },
            MachineDescriptor {
                id: "radio".to_string(),
                display_name: "Radio".to_string(),
                mesh_ids: strings(&["radio_body", "radio_antenna"]),
                lock_on_pose: Some(CameraPose::new(
                    Vec3::new(1.0, 1.15, -0.35),
                    Vec3::new(0.15, 0.35, 0.0),
                )),
                powered_on_pose: None,
                suspend_antialiasing: false,
                elements: BTreeMap::from([
                    (
                        "volume_dial".to_string(),
                        dial("radio_volume_dial", Vec3::Z, 0.012, ActionKind::SetVolume),
                    ),
                    (
                        "band_lever".to_string(),
                        lever(
                            "radio_band_lever",
                            Vec3::new(-0.04, 0.0, 0.0),
                            Vec3::new(0.04, 0.0, 0.0),
                            ActionKind::TuneBand,
                        ),
                    ),
                ]),
            },
            MachineDescriptor {
                id: "equalizer".to_string(),
                display_name: "Equalizer".to_string(),
                mesh_ids: strings(&["equalizer_body"]),
                lock_on_pose: Some(CameraPose::new(
                    Vec3::new(-1.0, 1.15, -0.35),
                    Vec3::new(0.15, -0.35, 0.0),
                )),
                powered_on_pose: None,
                suspend_antialiasing: false,
                elements: ["low", "mid", "high"]
                    .into_iter()
                    .map(|band| {
                        (
                            format!("{band}_slider"),
                            lever(
                                &format!("equalizer_{band}_slider"),
                                Vec3::new(0.0, -0.05, 0.0),
                                Vec3::new(0.0, 0.05, 0.0),
                                ActionKind::SetEqualizerGain,
                            ),
                        )
                    })
                    .collect(),
            },
        ];
        Self::new(machines).expect("built-in machine table has unique ids and meshes")
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn button(mesh_id: &str, action: ActionKind) -> ElementDescriptor {
    ElementDescriptor {
        mesh_id: mesh_id.to_string(),
        action,
        kind: ElementKind::Button {
            press_offset: Vec3::new(0.0, 0.0, 0.008),
        },
    }
}

fn dial(mesh_id: &str, axis: Vec3, sensitivity: f32, action: ActionKind) -> ElementDescriptor {
    ElementDescriptor {
        mesh_id: mesh_id.to_string(),
        action,
        kind: ElementKind::Dial {
            rotation_axis: axis,
            sensitivity,
        },
    }
}

fn lever(mesh_id: &str, min_offset: Vec3, max_offset: Vec3, action: ActionKind) -> ElementDescriptor {
    ElementDescriptor {
        mesh_id: mesh_id.to_string(),
        action,
        kind: ElementKind::Lever {
            min_offset,
            max_offset,
            sensitivity: 0.005,
            initial: 0.5,
        },
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{ElementKind, MachineRegistry};
    use crate::actions::ActionKind;
    use crate::camera::CameraPose;

    #[test]
    fn aliases_share_one_pose() {
        let registry = MachineRegistry::builtin();
        for machine in registry.machines() {
            let poses: Vec<_> = machine
                .mesh_ids
                .iter()
                .map(|mesh| {
                    registry
                        .lookup_by_mesh_id(mesh)
                        .expect("alias resolves")
                        .lock_on_pose
                })
                .collect();
            assert!(poses.windows(2).all(|pair| pair[0] == pair[1]), "{}", machine.id);
        }
        assert_eq!(
            registry.lookup_by_mesh_id("radio_antenna").map(|m| m.id.as_str()),
            Some("radio")
        );
        assert!(registry.lookup_by_mesh_id("desk").is_none());
    }

    #[test]
    fn override_beats_powered_pose_beats_base() {
        let mut registry = MachineRegistry::builtin();
        let base = registry.get("computer_monitor").and_then(|m| m.lock_on_pose);
        let powered = registry.get("computer_monitor").and_then(|m| m.powered_on_pose);
        assert_eq!(registry.resolve_lock_on_pose("computer_monitor", false), base);
        assert_eq!(registry.resolve_lock_on_pose("computer_monitor", true), powered);

        let tuned = CameraPose::new(Vec3::new(9.0, 9.0, 9.0), Vec3::ZERO);
        registry.set_pose_override("computer_monitor", tuned);
        assert_eq!(registry.resolve_lock_on_pose("computer_monitor", true), Some(tuned));
        assert_eq!(registry.resolve_lock_on_pose("computer_monitor", false), Some(tuned));
        registry.clear_pose_override("computer_monitor");
        assert_eq!(registry.resolve_lock_on_pose("computer_monitor", true), powered);
    }

    #[test]
    fn json_table_parses_elements() {
        let raw = r#"[{
            "id": "radio",
            "displayName": "Radio",
            "meshIds": ["radio_body"],
            "lockOnPose": { "position": [0, 1, 0], "rotation": [0, 0, 0] },
            "elements": {
                "knob": { "meshId": "radio_knob", "action": "setVolume", "kind": "dial", "rotationAxis": [0, 0, 1], "sensitivity": 0.01 },
                "power": { "meshId": "radio_power", "action": "togglePower", "kind": "button", "pressOffset": [0, 0, 0.01] }
            }
        }]"#;
        let registry = MachineRegistry::from_json_str(raw).expect("table parses");
        let radio = registry.get("radio").expect("radio present");
        let knob = radio.elements.get("knob").expect("knob");
        assert_eq!(knob.action, ActionKind::SetVolume);
        assert!(matches!(knob.kind, ElementKind::Dial { sensitivity, .. } if (sensitivity - 0.01).abs() < 1e-6));
        assert!(radio.powered_on_pose.is_none());
        assert!(!radio.suspend_antialiasing);
    }

    #[test]
    fn shared_mesh_between_machines_is_rejected() {
        let raw = r#"[
            { "id": "a", "displayName": "A", "meshIds": ["shared"] },
            { "id": "b", "displayName": "B", "meshIds": ["shared"] }
        ]"#;
        let err = MachineRegistry::from_json_str(raw).expect_err("conflict");
        assert!(err.to_string().contains("shared"));
    }
}
