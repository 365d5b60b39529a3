//! Screen surfaces: an off-screen document rasterized into the texture a
//! screen mesh displays.
//!
//! A screen powers on by loading its frame and waiting for the document to
//! settle; from then on it captures when the lock-on coordinator activates
//! it, when the document mutates while the player is looking at it, and (for
//! animated content) on a fixed interval. Captures are gated on the screen
//! being both powered and locked on, except the single settle capture that
//! shows the first frame.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use deskside_formats::FrameConfig;
use glam::Vec2;
use serde::Serialize;

use crate::config::ScreenConfig;
use crate::document::{DocumentLoader, PointerKind, SurfacePointerEvent, SurfaceDocument};
use crate::events::{CaptureReason, SessionEvent};
use crate::millis;
use crate::raster::{CaptureError, DynamicTexture, IntermediateCanvas, Rasterizer};
use crate::scene::SceneGraph;
use crate::timers::TimerQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScreenTask {
    Settle,
    FollowUpCapture,
    ResumeInterval,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub attempts: u64,
    pub captures: u64,
    pub failures: u64,
    pub mutation_batches: u64,
    pub dropped_mutation_batches: u64,
}

/// Serializable view of one screen for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenStatus {
    pub id: String,
    pub machine_id: String,
    pub powered_on: bool,
    pub locked_on: bool,
    pub observing: bool,
    pub material_bound: bool,
    pub frame: Option<String>,
    pub generation: u64,
    pub interval_suspended: bool,
    pub stats: CaptureStats,
}

/// Maps a hit on the screen mesh back into unrotated texture space.
fn unrotate_uv(uv: Vec2, quarter_turns: u8) -> Vec2 {
    let mut uv = uv;
    for _ in 0..quarter_turns % 4 {
        uv = Vec2::new(uv.y, 1.0 - uv.x);
    }
    uv
}

pub struct ScreenCaptureController {
    config: ScreenConfig,
    frames: FrameConfig,
    loader: Box<dyn DocumentLoader>,
    rasterizer: Box<dyn Rasterizer>,
    document: Option<Box<dyn SurfaceDocument>>,
    frame: Option<String>,
    powered_on: bool,
    locked_on: bool,
    /// Mutation capture is armed once the document has settled.
    observing: bool,
    material_bound: bool,
    /// Set while a missing material has already been reported.
    material_warned: bool,
    canvas: IntermediateCanvas,
    texture: DynamicTexture,
    timers: TimerQueue<ScreenTask>,
    next_interval_at: Option<Duration>,
    interval_suspended: bool,
    stats: CaptureStats,
    events: Vec<SessionEvent>,
}

impl ScreenCaptureController {
    pub fn new(
        config: ScreenConfig,
        frames: FrameConfig,
        loader: Box<dyn DocumentLoader>,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Self {
        let canvas = IntermediateCanvas::new(config.texture_size);
        let texture = DynamicTexture::new(config.texture_size);
        ScreenCaptureController {
            config,
            frames,
            loader,
            rasterizer,
            document: None,
            frame: None,
            powered_on: false,
            locked_on: false,
            observing: false,
            material_bound: false,
            material_warned: false,
            canvas,
            texture,
            timers: TimerQueue::new(),
            next_interval_at: None,
            interval_suspended: false,
            stats: CaptureStats::default(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_powered_on(&self) -> bool {
        self.powered_on
    }

    pub fn is_locked_on(&self) -> bool {
        self.locked_on
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn texture(&self) -> &DynamicTexture {
        &self.texture
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn document_mut(&mut self) -> Option<&mut (dyn SurfaceDocument + 'static)> {
        self.document.as_deref_mut()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> ScreenStatus {
        ScreenStatus {
            id: self.config.id.clone(),
            machine_id: self.config.machine_id.clone(),
            powered_on: self.powered_on,
            locked_on: self.locked_on,
            observing: self.observing,
            material_bound: self.material_bound,
            frame: self.frame.clone(),
            generation: self.texture.generation(),
            interval_suspended: self.interval_suspended,
            stats: self.stats,
        }
    }

    /// Looks up the screen mesh and its material. Missing pieces are logged
    /// and captures skip until a later scene change resolves them.
    pub fn resolve_material(&mut self, scene: &dyn SceneGraph) -> bool {
        let mesh_id = self.config.mesh_id.as_str();
        let bound = scene.has_mesh(mesh_id) && scene.has_material(mesh_id);
        if bound && !self.material_bound {
            log::debug!("screen {} bound to material on {mesh_id}", self.config.id);
        } else if !bound && !self.material_warned {
            log::warn!(
                "screen {} has no mesh/material '{mesh_id}' yet; texture not applied",
                self.config.id
            );
        }
        self.material_warned = !bound;
        self.material_bound = bound;
        bound
    }

    /// Loads the configured frame and schedules the settle capture. Calling
    /// it on a powered screen does nothing.
    pub fn power_on(&mut self, now: Duration) {
        if self.powered_on {
            log::debug!("screen {} already powered on", self.config.id);
            return;
        }
        self.powered_on = true;
        self.observing = false;

        let loaded = match self.frames.resolve(self.config.frame.as_deref()) {
            Ok((name, entry)) => {
                let name = name.to_string();
                self.loader
                    .load(&name, entry)
                    .map(|document| (name, document))
                    .map_err(|err| err.to_string())
            }
            Err(err) => Err(format!("{err:#}")),
        };
        match loaded {
            Ok((name, mut document)) => {
                document.advance(now);
                log::info!("screen {} powered on with frame '{name}'", self.config.id);
                self.frame = Some(name);
                self.document = Some(document);
            }
            Err(message) => {
                log::error!("screen {} powered on without content: {message}", self.config.id);
                self.frame = None;
                self.document = None;
            }
        }
        self.timers
            .schedule(now + self.config.settle_delay(), ScreenTask::Settle);
    }

    /// Unloads the document and blanks the texture. Lock-on state is left
    /// alone.
    pub fn power_off(&mut self) {
        if !self.powered_on {
            return;
        }
        self.powered_on = false;
        self.observing = false;
        self.document = None;
        self.frame = None;
        self.timers.clear();
        self.interval_suspended = false;
        self.texture.clear([0, 0, 0, 255]);
        log::info!("screen {} powered off", self.config.id);
    }

    pub fn activate(&mut self, now: Duration) {
        self.locked_on = true;
        if self.powered_on {
            self.capture(now, CaptureReason::Activation);
            self.timers.cancel_where(|task| *task == ScreenTask::FollowUpCapture);
            self.timers
                .schedule(now + self.config.follow_up_delay(), ScreenTask::FollowUpCapture);
        }
        if self.config.continuous_capture {
            self.next_interval_at = Some(now + self.config.capture_interval());
        }
        log::debug!("screen {} activated", self.config.id);
    }

    pub fn deactivate(&mut self) {
        self.locked_on = false;
        self.timers.cancel_where(|task| {
            matches!(task, ScreenTask::FollowUpCapture | ScreenTask::ResumeInterval)
        });
        self.next_interval_at = None;
        self.interval_suspended = false;
        log::debug!("screen {} deactivated", self.config.id);
    }

    fn capture_gate_open(&self) -> bool {
        self.powered_on && self.locked_on
    }

    pub fn update(&mut self, now: Duration) {
        if let Some(document) = self.document.as_mut() {
            document.advance(now);
        }

        for task in self.timers.drain_due(now) {
            match task {
                ScreenTask::Settle => self.settle(now),
                ScreenTask::FollowUpCapture => {
                    if self.capture_gate_open() {
                        self.capture(now, CaptureReason::FollowUp);
                    }
                }
                ScreenTask::ResumeInterval => {
                    self.interval_suspended = false;
                    log::debug!("screen {} resumed interval capture", self.config.id);
                }
            }
        }

        let batch = self
            .document
            .as_mut()
            .map(|document| document.take_mutations())
            .unwrap_or_default();
        if !batch.is_empty() {
            if self.observing && self.capture_gate_open() {
                self.stats.mutation_batches += 1;
                self.capture(now, CaptureReason::Mutation);
            } else {
                self.stats.dropped_mutation_batches += 1;
            }
        }

        if let Some(due) = self.next_interval_at {
            if now >= due {
                self.next_interval_at = Some(now + self.config.capture_interval());
                if self.observing && self.capture_gate_open() && !self.interval_suspended {
                    self.capture(now, CaptureReason::Interval);
                }
            }
        }
    }

    fn settle(&mut self, now: Duration) {
        if !self.powered_on {
            return;
        }
        let Some(document) = self.document.as_ref() else {
            log::warn!("screen {} has no document to settle", self.config.id);
            return;
        };
        if !document.is_ready() {
            log::warn!(
                "screen {} document not ready; retrying in {} ms",
                self.config.id,
                self.config.power_on_settle_ms
            );
            self.timers
                .schedule(now + self.config.settle_delay(), ScreenTask::Settle);
            return;
        }
        // Anything the document did before the first frame is already in it.
        if let Some(document) = self.document.as_mut() {
            document.take_mutations();
        }
        self.observing = true;
        self.capture(now, CaptureReason::PowerOn);
    }

    /// Serializes the document, rasterizes it through the intermediate
    /// canvas, and blits the result into the live texture. On failure the
    /// previous texture contents are kept.
    pub fn capture_to_texture(&mut self, now: Duration) -> Result<u64, CaptureError> {
        self.capture_with(now, CaptureReason::Manual)
    }

    fn capture(&mut self, now: Duration, reason: CaptureReason) -> Option<u64> {
        self.capture_with(now, reason).ok()
    }

    fn capture_with(&mut self, now: Duration, reason: CaptureReason) -> Result<u64, CaptureError> {
        self.stats.attempts += 1;
        match self.rasterize_into_texture() {
            Ok(generation) => {
                self.stats.captures += 1;
                log::debug!(
                    "screen {} captured generation {generation} ({reason:?})",
                    self.config.id
                );
                self.events.push(SessionEvent::ScreenCapture {
                    at_ms: millis(now),
                    screen: self.config.id.clone(),
                    generation,
                    reason,
                });
                Ok(generation)
            }
            Err(err) => {
                self.stats.failures += 1;
                log::error!("screen {} capture failed ({reason:?}): {err}", self.config.id);
                self.events.push(SessionEvent::CaptureFailed {
                    at_ms: millis(now),
                    screen: self.config.id.clone(),
                    reason,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn rasterize_into_texture(&mut self) -> Result<u64, CaptureError> {
        if !self.material_bound {
            return Err(CaptureError::MaterialMissing);
        }
        let document = self.document.as_ref().ok_or(CaptureError::NotLoaded)?;
        let markup = document.serialize()?;
        let image = self
            .rasterizer
            .rasterize(&markup, self.config.raster_timeout())?;
        self.canvas.draw(&image);
        Ok(self.texture.blit_from(&self.canvas))
    }

    /// Forwards a pointer event that hit the screen mesh at `uv`. Only
    /// delivered while the screen is powered and locked on. Wheel input
    /// pauses interval capture until the gesture has been quiet for the
    /// resume delay.
    pub fn forward_pointer(&mut self, now: Duration, uv: Vec2, kind: PointerKind) -> bool {
        if !self.capture_gate_open() {
            return false;
        }
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let (width, height) = document.size();
        let uv = unrotate_uv(uv, self.config.uv_quarter_turns);
        let event = SurfacePointerEvent {
            kind,
            x: uv.x.clamp(0.0, 1.0) * width as f32,
            y: (1.0 - uv.y.clamp(0.0, 1.0)) * height as f32,
        };
        document.dispatch_pointer(event);

        if let PointerKind::Wheel { .. } = kind {
            self.interval_suspended = true;
            self.timers
                .cancel_where(|task| *task == ScreenTask::ResumeInterval);
            self.timers.schedule(
                now + self.config.scroll_resume_delay(),
                ScreenTask::ResumeInterval,
            );
        }
        true
    }
}

/// Shared handle to one screen, held by the session and injected into the
/// lock-on coordinator and the action handlers.
#[derive(Clone)]
pub struct ScreenHandle {
    inner: Rc<RefCell<ScreenCaptureController>>,
}

impl ScreenHandle {
    pub fn new(controller: ScreenCaptureController) -> Self {
        Self {
            inner: Rc::new(RefCell::new(controller)),
        }
    }

    pub fn id(&self) -> String {
        self.inner.borrow().id().to_string()
    }

    pub fn machine_id(&self) -> String {
        self.inner.borrow().config.machine_id.clone()
    }

    pub fn mesh_id(&self) -> String {
        self.inner.borrow().config.mesh_id.clone()
    }

    pub fn is_powered_on(&self) -> bool {
        self.inner.borrow().is_powered_on()
    }

    pub fn is_locked_on(&self) -> bool {
        self.inner.borrow().is_locked_on()
    }

    pub fn power_on(&self, now: Duration) {
        self.inner.borrow_mut().power_on(now);
    }

    pub fn power_off(&self) {
        self.inner.borrow_mut().power_off();
    }

    pub fn activate(&self, now: Duration) {
        self.inner.borrow_mut().activate(now);
    }

    pub fn deactivate(&self) {
        self.inner.borrow_mut().deactivate();
    }

    pub fn update(&self, now: Duration) {
        self.inner.borrow_mut().update(now);
    }

    pub fn forward_pointer(&self, now: Duration, uv: Vec2, kind: PointerKind) -> bool {
        self.inner.borrow_mut().forward_pointer(now, uv, kind)
    }

    pub fn resolve_material(&self, scene: &dyn SceneGraph) -> bool {
        self.inner.borrow_mut().resolve_material(scene)
    }

    pub fn capture_to_texture(&self, now: Duration) -> Result<u64, CaptureError> {
        self.inner.borrow_mut().capture_to_texture(now)
    }

    pub fn take_events(&self) -> Vec<SessionEvent> {
        self.inner.borrow_mut().take_events()
    }

    pub fn generation(&self) -> u64 {
        self.inner.borrow().texture().generation()
    }

    pub fn stats(&self) -> CaptureStats {
        self.inner.borrow().stats()
    }

    pub fn status(&self) -> ScreenStatus {
        self.inner.borrow().status()
    }

    pub fn save_texture(&self, path: &Path) -> anyhow::Result<()> {
        self.inner.borrow().texture().save_png(path)
    }

    /// Runs `f` against the controller; keeps borrows scoped to one call.
    pub fn with<R>(&self, f: impl FnOnce(&mut ScreenCaptureController) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}
