use std::f32::consts::{PI, TAU};

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Camera placement: world position plus Euler rotation (pitch, yaw, roll)
/// in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl CameraPose {
    pub const fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    pub fn approx_eq(&self, other: &CameraPose, tolerance: f32) -> bool {
        self.position.abs_diff_eq(other.position, tolerance)
            && self.rotation.abs_diff_eq(other.rotation, tolerance)
    }
}

/// Pitch limits applied to free-look. Cleared while the camera is being
/// choreographed so the lock-on animation is never clipped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotationLimits {
    pub min_pitch: Option<f32>,
    pub max_pitch: Option<f32>,
}

impl RotationLimits {
    pub const fn cleared() -> Self {
        Self {
            min_pitch: None,
            max_pitch: None,
        }
    }

    pub fn clamp_pitch(&self, pitch: f32) -> f32 {
        let mut pitch = pitch;
        if let Some(min) = self.min_pitch {
            pitch = pitch.max(min);
        }
        if let Some(max) = self.max_pitch {
            pitch = pitch.min(max);
        }
        pitch
    }
}

/// Wraps an angle delta into (-PI, PI].
pub fn wrap_angle(delta: f32) -> f32 {
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Rewrites `target` per axis so interpolating from `current` takes the
/// short way around.
pub fn shortest_path_target(current: Vec3, target: Vec3) -> Vec3 {
    Vec3::new(
        current.x + wrap_angle(target.x - current.x),
        current.y + wrap_angle(target.y - current.y),
        current.z + wrap_angle(target.z - current.z),
    )
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Vec3,
    /// When set, takes precedence over `rotation` (imported camera rigs
    /// arrive this way).
    pub rotation_quaternion: Option<Quat>,
    pub limits: RotationLimits,
    pub look_sensitivity: f32,
    control_attached: bool,
}

impl Camera {
    pub fn new(pose: CameraPose, limits: RotationLimits) -> Self {
        Camera {
            position: pose.position,
            rotation: pose.rotation,
            rotation_quaternion: None,
            limits,
            look_sensitivity: 0.002,
            control_attached: true,
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            rotation: self.euler_rotation(),
        }
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.position = pose.position;
        self.rotation = pose.rotation;
    }

    /// Euler angles currently driving the camera, folding in the quaternion
    /// when one is present.
    pub fn euler_rotation(&self) -> Vec3 {
        match self.rotation_quaternion {
            Some(quat) => {
                let (yaw, pitch, roll) = quat.to_euler(EulerRot::YXZ);
                Vec3::new(pitch, yaw, roll)
            }
            None => self.rotation,
        }
    }

    pub fn orientation(&self) -> Quat {
        match self.rotation_quaternion {
            Some(quat) => quat,
            None => Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z),
        }
    }

    /// Unit view direction; +Z is forward and positive pitch looks down.
    pub fn forward(&self) -> Vec3 {
        (self.orientation() * Vec3::Z).normalize_or_zero()
    }

    pub fn is_control_attached(&self) -> bool {
        self.control_attached
    }

    pub fn attach_control(&mut self) {
        self.control_attached = true;
    }

    pub fn detach_control(&mut self) {
        self.control_attached = false;
    }

    /// Free-look from pointer deltas. Ignored unless the free-look owner
    /// currently holds the camera.
    pub fn look(&mut self, dx: f32, dy: f32) -> bool {
        if !self.control_attached {
            return false;
        }
        if let Some(quat) = self.rotation_quaternion.take() {
            let (yaw, pitch, roll) = quat.to_euler(EulerRot::YXZ);
            self.rotation = Vec3::new(pitch, yaw, roll);
        }
        self.rotation.y += dx * self.look_sensitivity;
        self.rotation.x = self
            .limits
            .clamp_pitch(self.rotation.x + dy * self.look_sensitivity);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use glam::Vec3;

    use super::{shortest_path_target, wrap_angle, Camera, CameraPose, RotationLimits};

    #[test]
    fn wrap_angle_stays_within_half_turn() {
        for delta in [-10.0_f32, -6.0, -PI, -0.5, 0.0, 0.5, PI, 6.0, 10.0] {
            let wrapped = wrap_angle(delta);
            assert!(wrapped > -PI - 1e-5 && wrapped <= PI + 1e-5, "{delta} -> {wrapped}");
        }
        assert!((wrap_angle(PI) - PI).abs() < 1e-5);
    }

    #[test]
    fn shortest_path_does_not_spin_the_long_way() {
        let current = Vec3::new(0.0, 3.0, 0.0);
        let target = shortest_path_target(current, Vec3::new(0.0, -3.0, 0.0));
        let delta = target.y - current.y;
        assert!(delta.abs() <= PI, "delta {delta}");
        assert!((delta - (2.0 * PI - 6.0)).abs() < 1e-4);
        // Same heading modulo a full turn.
        assert!(((target.y - -3.0) - 2.0 * PI).abs() < 1e-4);
    }

    #[test]
    fn look_respects_limits_and_control_owner() {
        let mut camera = Camera::new(
            CameraPose::new(Vec3::ZERO, Vec3::ZERO),
            RotationLimits {
                min_pitch: Some(-0.5),
                max_pitch: Some(0.5),
            },
        );
        camera.look_sensitivity = 0.01;
        assert!(camera.look(10.0, 1_000.0));
        assert!((camera.rotation.x - 0.5).abs() < 1e-6);
        assert!((camera.rotation.y - 0.1).abs() < 1e-6);

        camera.detach_control();
        assert!(!camera.look(10.0, 0.0));
        assert!((camera.rotation.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn forward_follows_yaw_and_pitch() {
        let mut camera = Camera::new(
            CameraPose::new(Vec3::ZERO, Vec3::ZERO),
            RotationLimits::cleared(),
        );
        assert!(camera.forward().abs_diff_eq(Vec3::Z, 1e-5));
        camera.rotation = Vec3::new(0.0, PI / 2.0, 0.0);
        assert!(camera.forward().abs_diff_eq(Vec3::X, 1e-5));
        camera.rotation = Vec3::new(PI / 2.0, 0.0, 0.0);
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
