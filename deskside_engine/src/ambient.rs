use std::cell::RefCell;
use std::f32::consts::TAU;
use std::rc::Rc;
use std::time::Duration;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::SceneGraph;

/// A looping sway applied to one mesh while its machine is locked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbientAnimation {
    pub name: String,
    pub machine_id: String,
    pub mesh_id: String,
    pub axis: Vec3,
    /// Peak rotation in radians.
    pub amplitude: f32,
    pub period_ms: u64,
    #[serde(skip)]
    started_at: Option<Duration>,
    #[serde(skip)]
    base_rotation: Option<Quat>,
}

impl AmbientAnimation {
    pub fn new(name: &str, machine_id: &str, mesh_id: &str, amplitude: f32, period_ms: u64) -> Self {
        AmbientAnimation {
            name: name.to_string(),
            machine_id: machine_id.to_string(),
            mesh_id: mesh_id.to_string(),
            axis: Vec3::Z,
            amplitude,
            period_ms: period_ms.max(1),
            started_at: None,
            base_rotation: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Duration, scene: &dyn SceneGraph) {
        if self.is_playing() {
            return;
        }
        let Some(rotation) = scene.mesh_rotation(&self.mesh_id) else {
            log::warn!("ambient '{}' has no mesh '{}'", self.name, self.mesh_id);
            return;
        };
        self.base_rotation = Some(rotation);
        self.started_at = Some(now);
        log::debug!("ambient '{}' started", self.name);
    }

    /// Stops the loop and puts the mesh back where it started.
    pub fn stop(&mut self, scene: &mut dyn SceneGraph) {
        if self.started_at.take().is_none() {
            return;
        }
        if let Some(rotation) = self.base_rotation.take() {
            scene.set_mesh_rotation(&self.mesh_id, rotation);
        }
        log::debug!("ambient '{}' stopped", self.name);
    }

    pub fn update(&mut self, now: Duration, scene: &mut dyn SceneGraph) {
        let (Some(started), Some(base)) = (self.started_at, self.base_rotation) else {
            return;
        };
        let phase = now.saturating_sub(started).as_secs_f32() / (self.period_ms as f32 / 1_000.0);
        let angle = self.amplitude * (phase * TAU).sin();
        let axis = self.axis.try_normalize().unwrap_or(Vec3::Z);
        scene.set_mesh_rotation(&self.mesh_id, base * Quat::from_axis_angle(axis, angle));
    }
}

/// Shared handle injected into the lock-on coordinator. Start and stop are
/// requested there; the session applies the motion each frame.
#[derive(Clone)]
pub struct AmbientHandle {
    inner: Rc<RefCell<AmbientState>>,
}

struct AmbientState {
    animation: AmbientAnimation,
    requested: Option<bool>,
}

impl AmbientHandle {
    pub fn new(animation: AmbientAnimation) -> Self {
        Self {
            inner: Rc::new(RefCell::new(AmbientState {
                animation,
                requested: None,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().animation.name.clone()
    }

    pub fn machine_id(&self) -> String {
        self.inner.borrow().animation.machine_id.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.borrow().animation.is_playing()
    }

    pub fn request_start(&self) {
        self.inner.borrow_mut().requested = Some(true);
    }

    pub fn request_stop(&self) {
        self.inner.borrow_mut().requested = Some(false);
    }

    /// Applies any pending start/stop, then advances the motion.
    pub fn update(&self, now: Duration, scene: &mut dyn SceneGraph) {
        let mut state = self.inner.borrow_mut();
        match state.requested.take() {
            Some(true) => state.animation.start(now, scene),
            Some(false) => state.animation.stop(scene),
            None => {}
        }
        state.animation.update(now, scene);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::{Quat, Vec3};

    use super::{AmbientAnimation, AmbientHandle};
    use crate::scene::{MemoryScene, MeshNode, SceneGraph};

    #[test]
    fn sway_moves_mesh_and_stop_restores_it() {
        let mut scene = MemoryScene::new();
        scene.insert("radio_body", MeshNode::boxed(Vec3::ZERO, Vec3::splat(0.2)));
        let handle = AmbientHandle::new(AmbientAnimation::new(
            "radio_motion",
            "radio",
            "radio_body",
            0.05,
            2_000,
        ));

        handle.request_start();
        handle.update(Duration::ZERO, &mut scene);
        assert!(handle.is_playing());
        handle.update(Duration::from_millis(500), &mut scene);
        let swayed = scene.mesh_rotation("radio_body").expect("mesh");
        assert!(!swayed.abs_diff_eq(Quat::IDENTITY, 1e-4));

        handle.request_stop();
        handle.update(Duration::from_millis(600), &mut scene);
        assert!(!handle.is_playing());
        assert_eq!(scene.mesh_rotation("radio_body"), Some(Quat::IDENTITY));
    }

    #[test]
    fn missing_mesh_does_not_start() {
        let mut scene = MemoryScene::new();
        let handle = AmbientHandle::new(AmbientAnimation::new("sway", "radio", "nope", 0.1, 1_000));
        handle.request_start();
        handle.update(Duration::ZERO, &mut scene);
        assert!(!handle.is_playing());
    }
}
