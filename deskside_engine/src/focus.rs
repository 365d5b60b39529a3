//! Crosshair focus: which interactable mesh the camera is looking at.
//!
//! A forward ray is cast every few frames against the meshes registered so
//! far; changes are reported as gained, switched or lost.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::camera::Camera;
use crate::config::InteractionConfig;
use crate::hud::Hud;
use crate::scene::{Ray, SceneGraph};
use crate::timers::TimerQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusChange {
    Gained(String),
    Switched { from: String, to: String },
    Lost(String),
}

impl FocusChange {
    pub fn current(&self) -> Option<&str> {
        match self {
            FocusChange::Gained(mesh) | FocusChange::Switched { to: mesh, .. } => Some(mesh),
            FocusChange::Lost(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTask {
    Rescan,
}

/// Throttled crosshair ray test against the interactable allow-list.
pub struct FocusTracker {
    allow_list: Vec<String>,
    /// Allow-listed meshes found in the scene so far; the only ray
    /// candidates.
    registered: Vec<String>,
    focused: Option<String>,
    frame: u64,
    throttle: u32,
    max_distance: f32,
    timers: TimerQueue<FocusTask>,
}

impl FocusTracker {
    /// Schedules the delayed re-scans that catch late-arriving models.
    pub fn new(allow_list: Vec<String>, config: &InteractionConfig, now: Duration) -> Self {
        let mut timers = TimerQueue::new();
        for delay in &config.focus_rescan_ms {
            timers.schedule(now + Duration::from_millis(*delay), FocusTask::Rescan);
        }
        FocusTracker {
            allow_list,
            registered: Vec::new(),
            focused: None,
            frame: 0,
            throttle: config.focus_throttle_frames.max(1),
            max_distance: config.focus_ray_length,
            timers,
        }
    }

    /// Registers allow-listed meshes present in the scene and forces them
    /// pickable; some imported meshes arrive non-pickable. Returns how many
    /// were newly found.
    pub fn scan(&mut self, scene: &mut dyn SceneGraph) -> usize {
        let known: BTreeSet<&str> = self.registered.iter().map(String::as_str).collect();
        let found: Vec<String> = self
            .allow_list
            .iter()
            .filter(|mesh| !known.contains(mesh.as_str()) && scene.has_mesh(mesh))
            .cloned()
            .collect();
        for mesh in &found {
            if scene.is_pickable(mesh) == Some(false) {
                log::debug!("marking late mesh {mesh} pickable");
            }
            scene.set_pickable(mesh, true);
        }
        let count = found.len();
        self.registered.extend(found);
        if count > 0 {
            log::debug!(
                "focus tracker registered {count} mesh(es), {}/{} allow-listed",
                self.registered.len(),
                self.allow_list.len()
            );
        }
        count
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Per-frame tick. While `suspended` (locked on or transitioning) no ray
    /// is cast and the HUD is left to the lock-on owner.
    pub fn update(
        &mut self,
        now: Duration,
        camera: &Camera,
        scene: &mut dyn SceneGraph,
        hud: &mut Hud,
        suspended: bool,
    ) -> Option<FocusChange> {
        if !self.timers.drain_due(now).is_empty() {
            self.scan(scene);
        }

        self.frame += 1;
        if suspended || self.frame % u64::from(self.throttle) != 0 {
            return None;
        }

        let ray = Ray::new(camera.position, camera.forward(), self.max_distance);
        let hit = scene
            .pick(&ray, &self.registered)
            .map(|hit| hit.mesh_id);

        let change = match (self.focused.take(), hit) {
            (None, None) => None,
            (Some(previous), Some(current)) if previous == current => {
                self.focused = Some(current);
                None
            }
            (None, Some(current)) => {
                self.focused = Some(current.clone());
                Some(FocusChange::Gained(current))
            }
            (Some(previous), Some(current)) => {
                self.focused = Some(current.clone());
                Some(FocusChange::Switched {
                    from: previous,
                    to: current,
                })
            }
            (Some(previous), None) => Some(FocusChange::Lost(previous)),
        };
        if change.is_some() {
            hud.show_focus(self.focused.is_some());
        }
        change
    }
}
