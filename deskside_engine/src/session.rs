//! The interaction core wired together: one session owns the scene, the
//! camera and HUD, and every controller, and is driven by host input calls
//! plus a per-frame `update(dt)`.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use glam::Vec2;

use crate::actions::{ActionContext, ActionTable, DeviceSettings, ElementEvent};
use crate::ambient::AmbientHandle;
use crate::camera::Camera;
use crate::config::InteractionConfig;
use crate::document::PointerKind;
use crate::elements::ElementController;
use crate::events::SessionEvent;
use crate::focus::FocusTracker;
use crate::hud::{Hud, PointerState, RenderSettings};
use crate::lockon::{LockOnCoordinator, MachineHooks, Phase, Stage};
use crate::machines::MachineRegistry;
use crate::millis;
use crate::scene::{Ray, SceneGraph};
use crate::screen::ScreenHandle;
use crate::status::StatusSnapshot;

pub struct InteractionSystem<S: SceneGraph> {
    scene: S,
    registry: MachineRegistry,
    config: InteractionConfig,
    camera: Camera,
    hud: Hud,
    pointer: PointerState,
    render: RenderSettings,
    focus: FocusTracker,
    coordinator: LockOnCoordinator,
    elements: ElementController,
    /// Keyed by machine id.
    screens: HashMap<String, ScreenHandle>,
    ambients: Vec<AmbientHandle>,
    actions: ActionTable,
    settings: DeviceSettings,
    now: Duration,
    events: Vec<SessionEvent>,
}

impl<S: SceneGraph> InteractionSystem<S> {
    pub fn new(
        scene: S,
        registry: MachineRegistry,
        config: InteractionConfig,
        screens: Vec<ScreenHandle>,
        ambients: Vec<AmbientHandle>,
    ) -> Self {
        let now = Duration::ZERO;
        let screens: HashMap<String, ScreenHandle> = screens
            .into_iter()
            .map(|screen| (screen.machine_id(), screen))
            .collect();

        let mut hooks: BTreeMap<String, MachineHooks> = BTreeMap::new();
        for (machine_id, screen) in &screens {
            hooks.entry(machine_id.clone()).or_default().screen = Some(screen.clone());
        }
        for ambient in &ambients {
            hooks.entry(ambient.machine_id()).or_default().ambient = Some(ambient.clone());
        }
        for machine_id in hooks.keys() {
            if registry.get(machine_id).is_none() {
                log::warn!("controllers registered for unknown machine '{machine_id}'");
            }
        }

        let camera = Camera::new(config.start_pose, config.start_limits);
        let focus = FocusTracker::new(registry.interactable_mesh_ids(), &config, now);
        let coordinator = LockOnCoordinator::new(&config, hooks);
        let elements = ElementController::new(&registry, &config);

        let mut system = InteractionSystem {
            scene,
            registry,
            config,
            camera,
            hud: Hud::default(),
            pointer: PointerState::default(),
            render: RenderSettings::default(),
            focus,
            coordinator,
            elements,
            screens,
            ambients,
            actions: ActionTable::standard(),
            settings: DeviceSettings::default(),
            now,
            events: Vec::new(),
        };
        system.notify_scene_changed();
        system
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn registry(&self) -> &MachineRegistry {
        &self.registry
    }

    /// For live pose tuning through overrides.
    pub fn registry_mut(&mut self) -> &mut MachineRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.render
    }

    pub fn phase(&self) -> Phase {
        self.coordinator.phase()
    }

    pub fn focused(&self) -> Option<&str> {
        self.coordinator.focused()
    }

    pub fn coordinator(&self) -> &LockOnCoordinator {
        &self.coordinator
    }

    pub fn elements(&self) -> &ElementController {
        &self.elements
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Screen driven by `machine_id`.
    pub fn screen(&self, machine_id: &str) -> Option<&ScreenHandle> {
        self.screens.get(machine_id)
    }

    pub fn screens(&self) -> impl Iterator<Item = &ScreenHandle> {
        self.screens.values()
    }

    pub fn set_action_table(&mut self, actions: ActionTable) {
        self.actions = actions;
    }

    /// Re-resolves everything that depends on scene content. Hosts call it
    /// whenever a model finishes loading; missing pieces keep their own
    /// retry schedules.
    pub fn notify_scene_changed(&mut self) {
        let registered = self.elements.register_pending(&mut self.scene, self.now);
        let found = self.focus.scan(&mut self.scene);
        for screen in self.screens.values() {
            screen.resolve_material(&self.scene);
        }
        log::debug!(
            "scene changed at {} ms: {registered} element(s), {found} focus mesh(es) registered",
            millis(self.now)
        );
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        let handled = if key == self.config.interact_key {
            let mut stage = Stage {
                camera: &mut self.camera,
                hud: &mut self.hud,
                pointer: &mut self.pointer,
                render: &mut self.render,
            };
            self.coordinator
                .interact(self.now, &self.registry, &mut stage)
        } else if key == self.config.cancel_key {
            if self.elements.is_dragging() {
                self.pointer_up();
            }
            let mut stage = Stage {
                camera: &mut self.camera,
                hud: &mut self.hud,
                pointer: &mut self.pointer,
                render: &mut self.render,
            };
            self.coordinator.escape(self.now, &mut stage)
        } else {
            false
        };
        self.collect_events();
        handled
    }

    /// Free-look pointer delta; ignored while the coordinator owns the
    /// camera.
    pub fn look(&mut self, dx: f32, dy: f32) -> bool {
        self.camera.look(dx, dy)
    }

    /// Ray from the camera through the centre of `mesh_id`, for hosts and
    /// scripts that address meshes rather than screen pixels.
    pub fn ray_to_mesh(&self, mesh_id: &str) -> Option<Ray> {
        let target = self.scene.mesh_position(mesh_id)?;
        Some(Ray::towards(self.camera.position, target))
    }

    fn active_screen(&self) -> Option<&ScreenHandle> {
        if self.coordinator.phase() != Phase::LockedOn {
            return None;
        }
        self.coordinator
            .active_machine()
            .and_then(|machine_id| self.screens.get(machine_id))
    }

    fn pick_screen(&self, ray: &Ray) -> Option<(ScreenHandle, Vec2)> {
        let screen = self.active_screen()?;
        let mesh_id = screen.mesh_id();
        let hit = self.scene.pick(ray, &[mesh_id])?;
        Some((screen.clone(), hit.uv))
    }

    /// Pointer pressed while locked on: presses or grabs an element of the
    /// active machine, or clicks into its screen. A drag whose pointer-up
    /// never arrived is finished first.
    pub fn pointer_down(&mut self, ray: &Ray, pointer_x: f32) -> bool {
        if self.coordinator.phase() != Phase::LockedOn {
            return false;
        }
        if self.elements.is_dragging() {
            log::debug!("pointer down during an open drag; releasing it");
            self.pointer_up();
        }
        let Some(machine_id) = self.coordinator.active_machine() else {
            return false;
        };
        let mut candidates = self.elements.mesh_ids_for(machine_id);
        let screen = self.screens.get(machine_id).cloned();
        if let Some(screen) = &screen {
            candidates.push(screen.mesh_id());
        }
        let Some(hit) = self.scene.pick(ray, &candidates) else {
            return false;
        };
        let handled = match screen {
            Some(screen) if screen.mesh_id() == hit.mesh_id => {
                screen.forward_pointer(self.now, hit.uv, PointerKind::Click)
            }
            _ => self.elements.pointer_down(&hit.mesh_id, pointer_x, self.now),
        };
        self.collect_events();
        handled
    }

    pub fn pointer_move(&mut self, ray: &Ray, pointer_x: f32) -> bool {
        if self.elements.is_dragging() {
            return self.elements.pointer_move(pointer_x, &mut self.scene);
        }
        match self.pick_screen(ray) {
            Some((screen, uv)) => screen.forward_pointer(self.now, uv, PointerKind::Move),
            None => false,
        }
    }

    /// Ends a dial or lever drag and dispatches its final value.
    pub fn pointer_up(&mut self) -> bool {
        let Some(event) = self.elements.pointer_up() else {
            return false;
        };
        self.dispatch(&event);
        self.collect_events();
        true
    }

    pub fn wheel(&mut self, ray: &Ray, delta_y: f32) -> bool {
        match self.pick_screen(ray) {
            Some((screen, uv)) => {
                screen.forward_pointer(self.now, uv, PointerKind::Wheel { delta_y })
            }
            None => false,
        }
    }

    fn dispatch(&mut self, event: &ElementEvent) {
        let mut context = ActionContext {
            now: self.now,
            screens: &self.screens,
            settings: &mut self.settings,
            events: &mut self.events,
        };
        self.actions.dispatch(&mut context, event);
    }

    fn collect_events(&mut self) {
        self.events.extend(self.coordinator.take_events());
        let mut screens: Vec<&ScreenHandle> = self.screens.values().collect();
        screens.sort_by_key(|screen| screen.id());
        for screen in screens {
            self.events.extend(screen.take_events());
        }
    }

    /// Advances the virtual clock by `dt` and runs one frame.
    pub fn update(&mut self, dt: Duration) {
        self.now += dt;
        let now = self.now;

        let change = self.focus.update(
            now,
            &self.camera,
            &mut self.scene,
            &mut self.hud,
            self.coordinator.is_suppressed(),
        );
        if let Some(change) = change {
            log::debug!("focus change: {change:?}");
            self.coordinator
                .set_focus(now, change.current().map(str::to_string));
        }

        let mut stage = Stage {
            camera: &mut self.camera,
            hud: &mut self.hud,
            pointer: &mut self.pointer,
            render: &mut self.render,
        };
        self.coordinator.update(now, &mut stage);
        self.events.extend(self.coordinator.take_events());

        for event in self.elements.update(now, &mut self.scene) {
            self.dispatch(&event);
        }

        for screen in self.screens.values() {
            screen.update(now);
        }
        for ambient in &self.ambients {
            ambient.update(now, &mut self.scene);
        }
        self.collect_events();
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> StatusSnapshot {
        let mut screens: Vec<_> = self.screens.values().map(ScreenHandle::status).collect();
        screens.sort_by(|a, b| a.id.cmp(&b.id));
        StatusSnapshot {
            time_ms: millis(self.now),
            phase: self.coordinator.phase(),
            focused: self.coordinator.focused().map(str::to_string),
            active_machine: self.coordinator.active_machine().map(str::to_string),
            camera: self.camera.pose(),
            control_attached: self.camera.is_control_attached(),
            hud: self.hud.clone(),
            pointer: self.pointer,
            render: self.render,
            screens,
            settings: self.settings.clone(),
            elements_registered: self.elements.registered_count(),
            elements_pending: self.elements.pending_count(),
        }
    }
}
