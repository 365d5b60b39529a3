//! Free-look <-> locked-on state machine.
//!
//! Entering saves the camera pose, rotation limits and anti-aliasing
//! setting, hands the camera to a scripted pose animation, and activates the
//! machine's screen and ambient motion on arrival. Leaving animates back to
//! the saved pose, restores the limits, and only gives the camera back to
//! free-look one short delay after the return animation has finished.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::ambient::AmbientHandle;
use crate::animation::PoseAnimation;
use crate::camera::{shortest_path_target, Camera, CameraPose, RotationLimits};
use crate::config::InteractionConfig;
use crate::events::SessionEvent;
use crate::hud::{Hud, PointerState, Prompt, RenderSettings};
use crate::machines::MachineRegistry;
use crate::millis;
use crate::screen::ScreenHandle;
use crate::timers::TimerQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "direction", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Focused,
    Transitioning(Direction),
    LockedOn,
}

/// Controllers a machine activates while locked on.
#[derive(Clone, Default)]
pub struct MachineHooks {
    pub screen: Option<ScreenHandle>,
    pub ambient: Option<AmbientHandle>,
}

/// The camera and the global presentation state the coordinator drives.
pub struct Stage<'a> {
    pub camera: &'a mut Camera,
    pub hud: &'a mut Hud,
    pub pointer: &'a mut PointerState,
    pub render: &'a mut RenderSettings,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedState {
    pose: CameraPose,
    limits: RotationLimits,
    fxaa: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockTask {
    ReattachControl,
}

pub struct LockOnCoordinator {
    phase: Phase,
    focused_mesh: Option<String>,
    active_machine: Option<String>,
    saved: Option<SavedState>,
    animation: Option<PoseAnimation>,
    hooks: BTreeMap<String, MachineHooks>,
    transition: Duration,
    reattach_delay: Duration,
    default_pose: CameraPose,
    timers: TimerQueue<LockTask>,
    events: Vec<SessionEvent>,
}

impl LockOnCoordinator {
    pub fn new(config: &InteractionConfig, hooks: BTreeMap<String, MachineHooks>) -> Self {
        LockOnCoordinator {
            phase: Phase::Idle,
            focused_mesh: None,
            active_machine: None,
            saved: None,
            animation: None,
            hooks,
            transition: config.transition(),
            reattach_delay: config.reattach_delay(),
            default_pose: config.default_pose,
            timers: TimerQueue::new(),
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused_mesh.as_deref()
    }

    pub fn active_machine(&self) -> Option<&str> {
        self.active_machine.as_deref()
    }

    pub fn saved_pose(&self) -> Option<CameraPose> {
        self.saved.map(|saved| saved.pose)
    }

    pub fn hooks(&self, machine_id: &str) -> Option<&MachineHooks> {
        self.hooks.get(machine_id)
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Focus tracking is off for as long as the coordinator owns the camera.
    pub fn is_suppressed(&self) -> bool {
        matches!(self.phase, Phase::Transitioning(_) | Phase::LockedOn)
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_focus(&mut self, now: Duration, mesh: Option<String>) {
        if self.focused_mesh == mesh {
            return;
        }
        self.focused_mesh = mesh;
        if matches!(self.phase, Phase::Idle | Phase::Focused) {
            self.phase = if self.focused_mesh.is_some() {
                Phase::Focused
            } else {
                Phase::Idle
            };
        }
        self.events.push(SessionEvent::Focus {
            at_ms: millis(now),
            mesh: self.focused_mesh.clone(),
        });
    }

    /// Interact key. Starts the entry transition towards the focused
    /// machine; a no-op without focus or when already locked on or entering.
    /// Pressed during the exit transition it turns back towards the machine
    /// being left, keeping the pose saved on the first entry.
    pub fn interact(
        &mut self,
        now: Duration,
        registry: &MachineRegistry,
        stage: &mut Stage<'_>,
    ) -> bool {
        let reentering = self.phase == Phase::Transitioning(Direction::Exit);
        if matches!(
            self.phase,
            Phase::LockedOn | Phase::Transitioning(Direction::Enter)
        ) {
            return false;
        }

        let machine_id = if reentering {
            self.active_machine.clone()
        } else {
            let Some(mesh) = self.focused_mesh.as_deref() else {
                log::debug!("interact ignored: nothing focused");
                return false;
            };
            match registry.lookup_by_mesh_id(mesh) {
                Some(machine) => Some(machine.id.clone()),
                None => {
                    log::warn!("focused mesh {mesh} belongs to no machine");
                    None
                }
            }
        };

        self.animation = None;
        self.timers.clear();

        let camera = &mut *stage.camera;
        if !reentering || self.saved.is_none() {
            self.saved = Some(SavedState {
                pose: camera.pose(),
                limits: camera.limits,
                fxaa: stage.render.fxaa,
            });
        }

        camera.limits = RotationLimits::cleared();
        camera.detach_control();
        camera.rotation = camera.euler_rotation();
        camera.rotation_quaternion = None;
        stage.pointer.locked = false;
        stage.hud.crosshair_visible = false;
        stage.hud.prompt = Prompt::Exit;

        let machine = machine_id.as_deref().and_then(|id| registry.get(id));
        if machine.is_some_and(|machine| machine.suspend_antialiasing) {
            stage.render.fxaa = false;
        }

        let powered_on = machine_id
            .as_deref()
            .and_then(|id| self.hooks.get(id))
            .and_then(|hooks| hooks.screen.as_ref())
            .is_some_and(|screen| screen.is_powered_on());
        let target = match machine_id
            .as_deref()
            .and_then(|id| registry.resolve_lock_on_pose(id, powered_on))
        {
            Some(pose) => pose,
            None => {
                log::warn!(
                    "no lock-on pose for {}; using default pose",
                    machine_id.as_deref().unwrap_or("<unknown machine>")
                );
                self.default_pose
            }
        };

        let from = camera.pose();
        let to = CameraPose::new(
            target.position,
            shortest_path_target(from.rotation, target.rotation),
        );
        self.animation = Some(PoseAnimation::new(from, to, now, self.transition));
        self.phase = Phase::Transitioning(Direction::Enter);
        self.active_machine = machine_id.clone();

        log::info!(
            "lock-on begin: {} (powered_on={powered_on})",
            machine_id.as_deref().unwrap_or("<default>")
        );
        self.events.push(SessionEvent::LockOnBegin {
            at_ms: millis(now),
            machine: machine_id,
            target,
        });
        true
    }

    /// Cancel key. Valid while locked on or still entering; reverses from
    /// wherever the camera currently is.
    pub fn escape(&mut self, now: Duration, stage: &mut Stage<'_>) -> bool {
        if !matches!(
            self.phase,
            Phase::LockedOn | Phase::Transitioning(Direction::Enter)
        ) {
            return false;
        }
        let Some(saved) = self.saved else {
            log::warn!("escape without a saved pose");
            return false;
        };

        self.animation = None;
        if let Some(hooks) = self.active_hooks() {
            if let Some(screen) = &hooks.screen {
                screen.deactivate();
            }
            if let Some(ambient) = &hooks.ambient {
                ambient.request_stop();
            }
        }

        let from = stage.camera.pose();
        let to = CameraPose::new(
            saved.pose.position,
            shortest_path_target(from.rotation, saved.pose.rotation),
        );
        self.animation = Some(PoseAnimation::new(from, to, now, self.transition));
        self.phase = Phase::Transitioning(Direction::Exit);
        stage.hud.prompt = Prompt::Hidden;

        log::info!(
            "lock-on exit: {}",
            self.active_machine.as_deref().unwrap_or("<default>")
        );
        self.events.push(SessionEvent::LockOnExit {
            at_ms: millis(now),
            machine: self.active_machine.clone(),
        });
        true
    }

    fn active_hooks(&self) -> Option<&MachineHooks> {
        self.active_machine
            .as_deref()
            .and_then(|id| self.hooks.get(id))
    }

    pub fn update(&mut self, now: Duration, stage: &mut Stage<'_>) {
        if let Some(animation) = &self.animation {
            stage.camera.set_pose(animation.sample(now));
            if animation.is_finished(now) {
                let target = animation.target();
                self.animation = None;
                match self.phase {
                    Phase::Transitioning(Direction::Enter) => self.arrive(now, target, stage),
                    Phase::Transitioning(Direction::Exit) => self.return_home(now, stage),
                    _ => {}
                }
            }
        }

        for task in self.timers.drain_due(now) {
            match task {
                LockTask::ReattachControl => self.release(now, stage),
            }
        }
    }

    fn arrive(&mut self, now: Duration, target: CameraPose, stage: &mut Stage<'_>) {
        stage.camera.set_pose(target);
        stage.camera.rotation_quaternion = None;
        self.phase = Phase::LockedOn;
        if let Some(hooks) = self.active_hooks() {
            if let Some(screen) = &hooks.screen {
                screen.activate(now);
            }
            if let Some(ambient) = &hooks.ambient {
                ambient.request_start();
            }
        }
        log::debug!(
            "locked on {}",
            self.active_machine.as_deref().unwrap_or("<default>")
        );
        self.events.push(SessionEvent::LockOnArrived {
            at_ms: millis(now),
            machine: self.active_machine.clone(),
        });
    }

    fn return_home(&mut self, now: Duration, stage: &mut Stage<'_>) {
        if let Some(saved) = self.saved {
            stage.camera.set_pose(saved.pose);
            stage.camera.limits = saved.limits;
        }
        self.timers
            .schedule(now + self.reattach_delay, LockTask::ReattachControl);
        self.events.push(SessionEvent::LockOnReturned { at_ms: millis(now) });
    }

    fn release(&mut self, now: Duration, stage: &mut Stage<'_>) {
        stage.camera.attach_control();
        stage.pointer.locked = true;
        stage.hud.crosshair_visible = true;
        stage.hud.show_focus(self.focused_mesh.is_some());
        if let Some(saved) = self.saved.take() {
            stage.render.fxaa = saved.fxaa;
        }
        self.active_machine = None;
        self.phase = if self.focused_mesh.is_some() {
            Phase::Focused
        } else {
            Phase::Idle
        };
        log::debug!("camera control returned to free-look");
        self.events.push(SessionEvent::LockOnReleased { at_ms: millis(now) });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use deskside_formats::FrameConfig;
    use glam::{EulerRot, Quat, Vec3};

    use super::{Direction, LockOnCoordinator, MachineHooks, Phase, Stage};
    use crate::camera::{Camera, CameraPose, RotationLimits};
    use crate::config::{InteractionConfig, ScreenConfig};
    use crate::document::PanelLoader;
    use crate::hud::{Hud, PointerState, Prompt, RenderSettings};
    use crate::machines::MachineRegistry;
    use crate::raster::SoftwareRasterizer;
    use crate::screen::{ScreenCaptureController, ScreenHandle};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    struct Rig {
        camera: Camera,
        hud: Hud,
        pointer: PointerState,
        render: RenderSettings,
    }

    impl Rig {
        fn new() -> Self {
            let config = InteractionConfig::default();
            Rig {
                camera: Camera::new(config.start_pose, config.start_limits),
                hud: Hud::default(),
                pointer: PointerState::default(),
                render: RenderSettings::default(),
            }
        }

        fn stage(&mut self) -> Stage<'_> {
            Stage {
                camera: &mut self.camera,
                hud: &mut self.hud,
                pointer: &mut self.pointer,
                render: &mut self.render,
            }
        }
    }

    fn monitor_screen() -> ScreenHandle {
        ScreenHandle::new(ScreenCaptureController::new(
            ScreenConfig::new("monitor", "computer_monitor", "computer_monitor_screen"),
            FrameConfig::single("desktop", "frames/desktop.html"),
            Box::new(PanelLoader::new()),
            Box::new(SoftwareRasterizer),
        ))
    }

    fn coordinator(screen: Option<ScreenHandle>) -> LockOnCoordinator {
        let mut hooks = BTreeMap::new();
        hooks.insert(
            "computer_monitor".to_string(),
            MachineHooks {
                screen,
                ambient: None,
            },
        );
        LockOnCoordinator::new(&InteractionConfig::default(), hooks)
    }

    fn run(coordinator: &mut LockOnCoordinator, rig: &mut Rig, from: u64, to: u64) {
        let mut now = from;
        while now <= to {
            coordinator.update(ms(now), &mut rig.stage());
            now += 16;
        }
    }

    #[test]
    fn interact_without_focus_and_stray_escape_are_no_ops() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        let mut coordinator = coordinator(None);
        assert!(!coordinator.interact(ms(0), &registry, &mut rig.stage()));
        assert!(!coordinator.escape(ms(0), &mut rig.stage()));
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(rig.camera.is_control_attached());
    }

    #[test]
    fn full_cycle_restores_everything_after_reattach_delay() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        let start = rig.camera.pose();
        let limits = rig.camera.limits;
        let screen = monitor_screen();
        let mut coordinator = coordinator(Some(screen.clone()));

        coordinator.set_focus(ms(0), Some("computer_monitor_screen".to_string()));
        rig.hud.show_focus(true);
        assert_eq!(coordinator.phase(), Phase::Focused);
        assert!(coordinator.interact(ms(0), &registry, &mut rig.stage()));
        assert_eq!(coordinator.phase(), Phase::Transitioning(Direction::Enter));
        assert!(!rig.camera.is_control_attached());
        assert!(!rig.pointer.locked);
        assert!(!rig.render.fxaa);
        assert_eq!(rig.hud.prompt, Prompt::Exit);
        assert_eq!(rig.camera.limits, RotationLimits::cleared());
        assert!(!coordinator.interact(ms(10), &registry, &mut rig.stage()));

        run(&mut coordinator, &mut rig, 0, 1_008);
        assert_eq!(coordinator.phase(), Phase::LockedOn);
        let target = registry
            .resolve_lock_on_pose("computer_monitor", false)
            .expect("monitor pose");
        assert!(rig.camera.pose().approx_eq(&target, 1e-6));
        assert!(screen.is_locked_on());

        assert!(coordinator.escape(ms(1_100), &mut rig.stage()));
        assert!(!screen.is_locked_on());
        run(&mut coordinator, &mut rig, 1_100, 2_108);
        assert_eq!(rig.camera.pose(), start);
        assert_eq!(rig.camera.limits, limits);
        assert!(!rig.camera.is_control_attached(), "re-attach waits one tick");

        run(&mut coordinator, &mut rig, 2_124, 2_180);
        assert!(rig.camera.is_control_attached());
        assert!(rig.pointer.locked);
        assert!(rig.render.fxaa);
        assert!(rig.hud.crosshair_visible);
        assert_eq!(rig.hud.prompt, Prompt::Interact);
        assert_eq!(coordinator.phase(), Phase::Focused);
    }

    #[test]
    fn interrupted_entry_returns_to_exact_saved_pose() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        rig.camera.rotation = Vec3::new(0.3, 3.0, 0.0);
        let start = rig.camera.pose();
        let mut coordinator = coordinator(None);

        coordinator.set_focus(ms(0), Some("computer_monitor".to_string()));
        coordinator.interact(ms(0), &registry, &mut rig.stage());
        run(&mut coordinator, &mut rig, 0, 320);
        assert!(!rig.camera.pose().approx_eq(&start, 1e-3));

        assert!(coordinator.escape(ms(330), &mut rig.stage()));
        run(&mut coordinator, &mut rig, 330, 1_500);
        assert!(rig.camera.pose().approx_eq(&start, 1e-6));
        assert_eq!(coordinator.phase(), Phase::Focused);
    }

    #[test]
    fn reentry_during_exit_keeps_first_saved_pose() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        let start = rig.camera.pose();
        let mut coordinator = coordinator(None);

        coordinator.set_focus(ms(0), Some("computer_monitor".to_string()));
        coordinator.interact(ms(0), &registry, &mut rig.stage());
        run(&mut coordinator, &mut rig, 0, 1_008);
        coordinator.escape(ms(1_008), &mut rig.stage());
        run(&mut coordinator, &mut rig, 1_024, 1_400);

        assert!(coordinator.interact(ms(1_400), &registry, &mut rig.stage()));
        assert_eq!(coordinator.saved_pose(), Some(start));
        run(&mut coordinator, &mut rig, 1_416, 2_500);
        assert_eq!(coordinator.phase(), Phase::LockedOn);
        coordinator.escape(ms(2_500), &mut rig.stage());
        run(&mut coordinator, &mut rig, 2_516, 3_600);
        assert_eq!(rig.camera.pose(), start);
    }

    #[test]
    fn powered_screen_and_override_select_pose() {
        let mut registry = MachineRegistry::builtin();
        let screen = monitor_screen();
        screen.power_on(ms(0));
        let mut rig = Rig::new();
        let mut coordinator = coordinator(Some(screen));
        coordinator.set_focus(ms(0), Some("computer_monitor".to_string()));
        coordinator.interact(ms(0), &registry, &mut rig.stage());
        run(&mut coordinator, &mut rig, 0, 1_008);
        let powered = registry
            .resolve_lock_on_pose("computer_monitor", true)
            .expect("powered pose");
        assert!(rig.camera.position.abs_diff_eq(powered.position, 1e-6));

        coordinator.escape(ms(1_008), &mut rig.stage());
        run(&mut coordinator, &mut rig, 1_024, 2_200);

        let tuned = CameraPose::new(Vec3::new(0.1, 1.3, -0.4), Vec3::ZERO);
        registry.set_pose_override("computer_monitor", tuned);
        coordinator.interact(ms(2_200), &registry, &mut rig.stage());
        run(&mut coordinator, &mut rig, 2_216, 3_300);
        assert!(rig.camera.position.abs_diff_eq(tuned.position, 1e-6));
    }

    #[test]
    fn machine_without_pose_falls_back_to_default() {
        let registry = MachineRegistry::from_json_str(
            r#"[{ "id": "crate", "displayName": "Crate", "meshIds": ["crate_mesh"] }]"#,
        )
        .expect("registry");
        let mut rig = Rig::new();
        let mut coordinator = LockOnCoordinator::new(&InteractionConfig::default(), BTreeMap::new());
        coordinator.set_focus(ms(0), Some("crate_mesh".to_string()));
        assert!(coordinator.interact(ms(0), &registry, &mut rig.stage()));
        run(&mut coordinator, &mut rig, 0, 1_100);
        assert_eq!(coordinator.phase(), Phase::LockedOn);
        assert!(rig
            .camera
            .position
            .abs_diff_eq(InteractionConfig::default().default_pose.position, 1e-6));
        assert!(rig.render.fxaa, "machine does not suspend anti-aliasing");
    }

    #[test]
    fn antialiasing_already_off_stays_off_after_exit() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        rig.render.fxaa = false;
        let mut coordinator = coordinator(None);

        coordinator.set_focus(ms(0), Some("computer_monitor".to_string()));
        assert!(coordinator.interact(ms(0), &registry, &mut rig.stage()));
        run(&mut coordinator, &mut rig, 0, 1_008);
        assert_eq!(coordinator.phase(), Phase::LockedOn);
        assert!(!rig.render.fxaa);

        coordinator.escape(ms(1_008), &mut rig.stage());
        run(&mut coordinator, &mut rig, 1_024, 2_200);
        assert_eq!(coordinator.phase(), Phase::Focused);
        assert!(rig.camera.is_control_attached());
        assert!(!rig.render.fxaa);
    }

    #[test]
    fn quaternion_camera_is_driven_by_euler_after_arrival() {
        let registry = MachineRegistry::builtin();
        let mut rig = Rig::new();
        let imported = Quat::from_euler(EulerRot::YXZ, 2.5, 0.2, 0.0);
        rig.camera.rotation = Vec3::ZERO;
        rig.camera.rotation_quaternion = Some(imported);
        let start_position = rig.camera.position;
        let mut coordinator = coordinator(None);

        coordinator.set_focus(ms(0), Some("computer_monitor".to_string()));
        assert!(coordinator.interact(ms(0), &registry, &mut rig.stage()));
        run(&mut coordinator, &mut rig, 0, 1_008);
        assert_eq!(coordinator.phase(), Phase::LockedOn);
        assert!(rig.camera.rotation_quaternion.is_none());
        let target = registry
            .resolve_lock_on_pose("computer_monitor", false)
            .expect("monitor pose");
        assert!(rig.camera.pose().approx_eq(&target, 1e-6));

        coordinator.escape(ms(1_008), &mut rig.stage());
        run(&mut coordinator, &mut rig, 1_024, 2_200);
        assert!(rig.camera.rotation_quaternion.is_none());
        assert!(rig.camera.position.abs_diff_eq(start_position, 1e-6));
        assert!(
            rig.camera.orientation().angle_between(imported) < 1e-3,
            "returned orientation drifted from the imported rig"
        );
    }
}
