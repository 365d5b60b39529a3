//! Press and drag behaviour for machine sub-elements.
//!
//! Buttons run a depress/hold/release animation and fire their action once
//! the mesh is fully back in place. Dials turn about their axis relative to
//! the orientation captured at registration; levers slide between two
//! offsets with progress clamped to [0, 1].

use std::time::Duration;

use glam::{Quat, Vec3};

use crate::actions::{ActionValue, ElementEvent};
use crate::animation::Easing;
use crate::config::{ButtonTiming, InteractionConfig};
use crate::machines::{ElementDescriptor, ElementKind, MachineRegistry};
use crate::scene::SceneGraph;
use crate::timers::TimerQueue;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementRuntimeState {
    pub is_pressed: bool,
    pub is_dragging: bool,
    pub current_angle: f32,
    /// Lever position along its offset range.
    pub progress: f32,
    pub original_position: Vec3,
    pub original_rotation: Quat,
    drag_last_x: f32,
    press_started: Option<Duration>,
}

impl ElementRuntimeState {
    fn new(position: Vec3, rotation: Quat, progress: f32) -> Self {
        ElementRuntimeState {
            is_pressed: false,
            is_dragging: false,
            current_angle: 0.0,
            progress,
            original_position: position,
            original_rotation: rotation,
            drag_last_x: 0.0,
            press_started: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ElementSlot {
    machine_id: String,
    element_id: String,
    descriptor: ElementDescriptor,
    state: Option<ElementRuntimeState>,
}

impl ElementSlot {
    fn event(&self, value: ActionValue) -> ElementEvent {
        ElementEvent {
            machine_id: self.machine_id.clone(),
            element_id: self.element_id.clone(),
            action: self.descriptor.action,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementTask {
    RetryRegistration,
}

/// Fraction of the press offset applied `elapsed` into a press cycle, or
/// `None` once the button is fully back.
fn press_fraction(timing: &ButtonTiming, elapsed: Duration) -> Option<f32> {
    let easing = Easing::EaseInOutCubic;
    if elapsed < timing.press {
        return Some(easing.apply(elapsed.as_secs_f32() / timing.press.as_secs_f32()));
    }
    let held = timing.press + timing.hold;
    if elapsed < held {
        return Some(1.0);
    }
    if elapsed < timing.total() {
        let t = (elapsed - held).as_secs_f32() / timing.release.as_secs_f32();
        return Some(1.0 - easing.apply(t));
    }
    None
}

pub struct ElementController {
    slots: Vec<ElementSlot>,
    timing: ButtonTiming,
    retry: Duration,
    timers: TimerQueue<ElementTask>,
    dragging: Option<usize>,
    attempts: u32,
}

impl ElementController {
    pub fn new(registry: &MachineRegistry, config: &InteractionConfig) -> Self {
        let slots = registry
            .machines()
            .flat_map(|machine| {
                machine
                    .elements
                    .iter()
                    .map(move |(element_id, descriptor)| ElementSlot {
                        machine_id: machine.id.clone(),
                        element_id: element_id.clone(),
                        descriptor: descriptor.clone(),
                        state: None,
                    })
            })
            .collect();
        ElementController {
            slots,
            timing: config.button_timing(),
            retry: config.element_retry(),
            timers: TimerQueue::new(),
            dragging: None,
            attempts: 0,
        }
    }

    /// Resolves every element whose mesh has appeared, capturing its
    /// original transform. Elements still missing are retried on a fixed
    /// backoff for as long as it takes.
    pub fn register_pending(&mut self, scene: &mut dyn SceneGraph, now: Duration) -> usize {
        let mut registered = 0;
        let mut missing = Vec::new();
        for slot in self.slots.iter_mut().filter(|slot| slot.state.is_none()) {
            let mesh_id = slot.descriptor.mesh_id.as_str();
            if !scene.has_mesh(mesh_id) {
                missing.push(mesh_id.to_string());
                continue;
            }
            let position = scene.mesh_position(mesh_id).unwrap_or(Vec3::ZERO);
            let rotation = scene.mesh_rotation(mesh_id).unwrap_or(Quat::IDENTITY);
            scene.set_pickable(mesh_id, true);
            let state = match &slot.descriptor.kind {
                ElementKind::Lever {
                    min_offset,
                    max_offset,
                    initial,
                    ..
                } => {
                    let initial = initial.clamp(0.0, 1.0);
                    let base = position - rotation * min_offset.lerp(*max_offset, initial);
                    ElementRuntimeState::new(base, rotation, initial)
                }
                _ => ElementRuntimeState::new(position, rotation, 0.0),
            };
            log::debug!(
                "registered element {}.{} on mesh {}",
                slot.machine_id,
                slot.element_id,
                mesh_id
            );
            slot.state = Some(state);
            registered += 1;
        }

        if missing.is_empty() {
            self.timers.clear();
            self.attempts = 0;
        } else {
            self.attempts += 1;
            log::warn!(
                "element meshes not loaded yet (attempt {}): {}; retrying in {} ms",
                self.attempts,
                missing.join(", "),
                self.retry.as_millis()
            );
            if self.timers.is_empty() {
                self.timers
                    .schedule(now + self.retry, ElementTask::RetryRegistration);
            }
        }
        registered
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.state.is_none()).count()
    }

    pub fn registered_count(&self) -> usize {
        self.slots.len() - self.pending_count()
    }

    /// Registered element meshes belonging to `machine_id`.
    pub fn mesh_ids_for(&self, machine_id: &str) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.machine_id == machine_id && slot.state.is_some())
            .map(|slot| slot.descriptor.mesh_id.clone())
            .collect()
    }

    pub fn state(&self, machine_id: &str, element_id: &str) -> Option<&ElementRuntimeState> {
        self.slots
            .iter()
            .find(|slot| slot.machine_id == machine_id && slot.element_id == element_id)
            .and_then(|slot| slot.state.as_ref())
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    /// Pointer pressed on `mesh_id`. Starts a button press or a drag;
    /// returns whether the mesh belongs to a registered element. A button
    /// already mid-press swallows the pick, and so does any pick while a
    /// drag is still open.
    pub fn pointer_down(&mut self, mesh_id: &str, pointer_x: f32, now: Duration) -> bool {
        if let Some(active) = self.dragging {
            log::debug!(
                "ignoring press on {mesh_id}; {} is still dragging",
                self.slots[active].descriptor.mesh_id
            );
            return true;
        }
        let Some(index) = self.slots.iter().position(|slot| {
            slot.descriptor.mesh_id == mesh_id && slot.state.is_some()
        }) else {
            return false;
        };
        let slot = &mut self.slots[index];
        let Some(state) = slot.state.as_mut() else {
            return false;
        };
        match slot.descriptor.kind {
            ElementKind::Button { .. } => {
                if !state.is_pressed {
                    state.is_pressed = true;
                    state.press_started = Some(now);
                }
            }
            ElementKind::Dial { .. } | ElementKind::Lever { .. } => {
                state.is_dragging = true;
                state.drag_last_x = pointer_x;
                self.dragging = Some(index);
            }
        }
        true
    }

    pub fn pointer_move(&mut self, pointer_x: f32, scene: &mut dyn SceneGraph) -> bool {
        let Some(index) = self.dragging else {
            return false;
        };
        let slot = &mut self.slots[index];
        let Some(state) = slot.state.as_mut() else {
            return false;
        };
        let delta_x = pointer_x - state.drag_last_x;
        state.drag_last_x = pointer_x;
        let mesh_id = slot.descriptor.mesh_id.as_str();
        match slot.descriptor.kind {
            ElementKind::Dial {
                rotation_axis,
                sensitivity,
            } => {
                state.current_angle -= delta_x * sensitivity;
                let axis = rotation_axis.try_normalize().unwrap_or(Vec3::Z);
                let rotation =
                    state.original_rotation * Quat::from_axis_angle(axis, state.current_angle);
                scene.set_mesh_rotation(mesh_id, rotation);
            }
            ElementKind::Lever {
                min_offset,
                max_offset,
                sensitivity,
                ..
            } => {
                state.progress = (state.progress + delta_x * sensitivity).clamp(0.0, 1.0);
                let offset = min_offset.lerp(max_offset, state.progress);
                scene.set_mesh_position(
                    mesh_id,
                    state.original_position + state.original_rotation * offset,
                );
            }
            ElementKind::Button { .. } => {}
        }
        true
    }

    /// Ends the active drag and reports the final value.
    pub fn pointer_up(&mut self) -> Option<ElementEvent> {
        let index = self.dragging.take()?;
        let slot = &mut self.slots[index];
        let state = slot.state.as_mut()?;
        state.is_dragging = false;
        let value = match slot.descriptor.kind {
            ElementKind::Dial { .. } => ActionValue::Angle(state.current_angle),
            ElementKind::Lever { .. } => ActionValue::Progress(state.progress),
            ElementKind::Button { .. } => return None,
        };
        Some(slot.event(value))
    }

    /// Advances button animations and registration retries. Returns the
    /// presses that completed this frame.
    pub fn update(&mut self, now: Duration, scene: &mut dyn SceneGraph) -> Vec<ElementEvent> {
        if !self.timers.drain_due(now).is_empty() {
            self.register_pending(scene, now);
        }

        let mut completed = Vec::new();
        for slot in &mut self.slots {
            let ElementKind::Button { press_offset } = slot.descriptor.kind else {
                continue;
            };
            let Some(state) = slot.state.as_mut() else {
                continue;
            };
            let Some(started) = state.press_started else {
                continue;
            };
            let mesh_id = slot.descriptor.mesh_id.as_str();
            let offset = state.original_rotation * press_offset;
            match press_fraction(&self.timing, now.saturating_sub(started)) {
                Some(fraction) => {
                    scene.set_mesh_position(mesh_id, state.original_position + offset * fraction);
                }
                None => {
                    scene.set_mesh_position(mesh_id, state.original_position);
                    state.press_started = None;
                    state.is_pressed = false;
                    completed.push(slot.event(ActionValue::Press));
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;

    use super::ElementController;
    use crate::actions::{ActionKind, ActionValue};
    use crate::config::InteractionConfig;
    use crate::machines::MachineRegistry;
    use crate::scene::{MemoryScene, MeshNode, SceneGraph};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn radio_registry() -> MachineRegistry {
        MachineRegistry::from_json_str(
            r#"[{
                "id": "radio",
                "displayName": "Radio",
                "meshIds": ["radio_body"],
                "elements": {
                    "power": { "meshId": "radio_power", "action": "togglePower", "kind": "button", "pressOffset": [0, 0, 0.01] },
                    "volume": { "meshId": "radio_volume", "action": "setVolume", "kind": "dial", "rotationAxis": [0, 0, 1], "sensitivity": 0.01 },
                    "band": { "meshId": "radio_band", "action": "tuneBand", "kind": "lever", "minOffset": [-0.1, 0, 0], "maxOffset": [0.1, 0, 0], "sensitivity": 0.01, "initial": 0.5 }
                }
            }]"#,
        )
        .expect("registry parses")
    }

    fn scene_with_all() -> MemoryScene {
        let mut scene = MemoryScene::new();
        for (mesh, x) in [("radio_power", 0.0), ("radio_volume", 0.2), ("radio_band", 0.4)] {
            scene.insert(
                mesh,
                MeshNode::boxed(Vec3::new(x, 1.0, 0.0), Vec3::splat(0.02)).unpickable(),
            );
        }
        scene
    }

    fn controller(scene: &mut MemoryScene) -> ElementController {
        let mut controller = ElementController::new(&radio_registry(), &InteractionConfig::default());
        controller.register_pending(scene, Duration::ZERO);
        controller
    }

    #[test]
    fn registration_marks_meshes_pickable() {
        let mut scene = scene_with_all();
        let controller = controller(&mut scene);
        assert_eq!(controller.pending_count(), 0);
        assert_eq!(scene.is_pickable("radio_power"), Some(true));
        assert_eq!(controller.mesh_ids_for("radio").len(), 3);
    }

    #[test]
    fn rapid_double_press_fires_once_per_cycle() {
        let mut scene = scene_with_all();
        let mut controller = controller(&mut scene);
        assert!(controller.pointer_down("radio_power", 0.0, ms(0)));
        assert!(controller.pointer_down("radio_power", 0.0, ms(30)));

        let mut fired = Vec::new();
        let mut now = 0;
        while now <= 400 {
            fired.extend(controller.update(ms(now), &mut scene));
            if now == 112 {
                let depressed = scene.mesh_position("radio_power").expect("mesh");
                assert!((depressed.z - 0.01).abs() < 1e-6, "held fully down");
                // Still mid-cycle: ignored.
                controller.pointer_down("radio_power", 0.0, ms(now));
            }
            now += 16;
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].action, ActionKind::TogglePower);
        assert_eq!(fired[0].value, ActionValue::Press);
        assert_eq!(scene.mesh_position("radio_power"), Some(Vec3::new(0.0, 1.0, 0.0)));

        // A fresh press after the cycle completes fires again.
        controller.pointer_down("radio_power", 0.0, ms(500));
        let mut second = Vec::new();
        for step in 0..30 {
            second.extend(controller.update(ms(500 + step * 16), &mut scene));
        }
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn dial_round_trip_restores_angle() {
        let mut scene = scene_with_all();
        let mut controller = controller(&mut scene);
        let original = scene.mesh_rotation("radio_volume").expect("mesh");

        controller.pointer_down("radio_volume", 100.0, ms(0));
        controller.pointer_move(140.0, &mut scene);
        controller.pointer_move(180.0, &mut scene);
        let event = controller.pointer_up().expect("dial reports");
        match event.value {
            ActionValue::Angle(angle) => assert!((angle + 0.8).abs() < 1e-5),
            other => panic!("unexpected value {other:?}"),
        }

        controller.pointer_down("radio_volume", 180.0, ms(10));
        controller.pointer_move(100.0, &mut scene);
        controller.pointer_up();
        let state = controller.state("radio", "volume").expect("registered");
        assert!(state.current_angle.abs() < 1e-5);
        let rotation = scene.mesh_rotation("radio_volume").expect("mesh");
        assert!(rotation.abs_diff_eq(original, 1e-5));
    }

    #[test]
    fn lever_progress_is_clamped() {
        let mut scene = scene_with_all();
        let mut controller = controller(&mut scene);
        controller.pointer_down("radio_band", 0.0, ms(0));
        controller.pointer_move(1_000.0, &mut scene);
        let event = controller.pointer_up().expect("lever reports");
        assert_eq!(event.value, ActionValue::Progress(1.0));
        let position = scene.mesh_position("radio_band").expect("mesh");
        assert!(position.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-5));

        controller.pointer_down("radio_band", 0.0, ms(0));
        controller.pointer_move(-5_000.0, &mut scene);
        controller.pointer_up();
        let state = controller.state("radio", "band").expect("registered");
        assert_eq!(state.progress, 0.0);
    }

    #[test]
    fn press_during_open_drag_leaves_the_drag_intact() {
        let mut scene = scene_with_all();
        let mut controller = controller(&mut scene);
        assert!(controller.pointer_down("radio_volume", 0.0, ms(0)));
        controller.pointer_move(50.0, &mut scene);
        assert!(controller.pointer_down("radio_band", 50.0, ms(20)));

        let band = controller.state("radio", "band").expect("registered");
        assert!(!band.is_dragging);
        let event = controller.pointer_up().expect("dial reports");
        assert_eq!(event.element_id, "volume");
        match event.value {
            ActionValue::Angle(angle) => assert!((angle + 0.5).abs() < 1e-5),
            other => panic!("unexpected value {other:?}"),
        }
        assert!(!controller.is_dragging());
        let dial = controller.state("radio", "volume").expect("registered");
        assert!(!dial.is_dragging);
    }

    #[test]
    fn missing_meshes_are_retried_until_they_load() {
        let mut scene = MemoryScene::new();
        let mut controller = ElementController::new(&radio_registry(), &InteractionConfig::default());
        assert_eq!(controller.register_pending(&mut scene, Duration::ZERO), 0);
        assert_eq!(controller.pending_count(), 3);

        controller.update(ms(1_000), &mut scene);
        assert_eq!(controller.pending_count(), 3);

        scene.insert("radio_power", MeshNode::boxed(Vec3::ZERO, Vec3::splat(0.02)));
        controller.update(ms(1_500), &mut scene);
        assert_eq!(controller.pending_count(), 3, "retry waits for its backoff");
        controller.update(ms(2_000), &mut scene);
        assert_eq!(controller.pending_count(), 2);
        assert!(!controller.pointer_down("radio_volume", 0.0, ms(2_000)));
        assert!(controller.pointer_down("radio_power", 0.0, ms(2_000)));
    }
}
