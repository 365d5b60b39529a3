use std::time::Duration;

use glam::Vec3;

use crate::camera::CameraPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseInOutCubic,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Fixed-duration interpolation between two vectors.
#[derive(Debug, Clone, Copy)]
pub struct Tween {
    pub from: Vec3,
    pub to: Vec3,
    start: Duration,
    duration: Duration,
    easing: Easing,
}

impl Tween {
    pub fn new(from: Vec3, to: Vec3, start: Duration, duration: Duration, easing: Easing) -> Self {
        Tween {
            from,
            to,
            start,
            duration,
            easing,
        }
    }

    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn sample(&self, now: Duration) -> Vec3 {
        if self.is_finished(now) {
            return self.to;
        }
        self.from.lerp(self.to, self.easing.apply(self.progress(now)))
    }

    pub fn is_finished(&self, now: Duration) -> bool {
        now >= self.start + self.duration
    }
}

/// Camera move: position and rotation tracks share one clock so they land
/// together.
#[derive(Debug, Clone, Copy)]
pub struct PoseAnimation {
    position: Tween,
    rotation: Tween,
    target: CameraPose,
}

impl PoseAnimation {
    pub fn new(from: CameraPose, to: CameraPose, start: Duration, duration: Duration) -> Self {
        PoseAnimation {
            position: Tween::new(from.position, to.position, start, duration, Easing::EaseInOutCubic),
            rotation: Tween::new(from.rotation, to.rotation, start, duration, Easing::EaseInOutCubic),
            target: to,
        }
    }

    pub fn sample(&self, now: Duration) -> CameraPose {
        CameraPose {
            position: self.position.sample(now),
            rotation: self.rotation.sample(now),
        }
    }

    pub fn target(&self) -> CameraPose {
        self.target
    }

    pub fn is_finished(&self, now: Duration) -> bool {
        self.position.is_finished(now) && self.rotation.is_finished(now)
    }
}
