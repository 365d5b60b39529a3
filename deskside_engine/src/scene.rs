//! The slice of the 3D engine the interaction core talks to.
//!
//! Hosts implement [`SceneGraph`] over their engine's mesh table;
//! [`MemoryScene`] is an axis-aligned-box stand-in used by the headless
//! host and the tests.

use std::collections::BTreeMap;

use glam::{Quat, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub length: f32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, length: f32) -> Self {
        Ray {
            origin,
            direction: direction.normalize_or_zero(),
            length,
        }
    }

    /// Ray from `origin` through `target`, reaching a little past it.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        let offset = target - origin;
        Ray::new(origin, offset, offset.length() * 1.5 + 0.01)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub mesh_id: String,
    pub distance: f32,
    pub point: Vec3,
    /// Texture coordinate of the hit on the struck face, v pointing up.
    pub uv: Vec2,
}

pub trait SceneGraph {
    fn has_mesh(&self, mesh_id: &str) -> bool;

    fn is_pickable(&self, mesh_id: &str) -> Option<bool>;

    fn set_pickable(&mut self, mesh_id: &str, pickable: bool) -> bool;

    fn mesh_position(&self, mesh_id: &str) -> Option<Vec3>;

    fn set_mesh_position(&mut self, mesh_id: &str, position: Vec3) -> bool;

    fn mesh_rotation(&self, mesh_id: &str) -> Option<Quat>;

    fn set_mesh_rotation(&mut self, mesh_id: &str, rotation: Quat) -> bool;

    fn has_material(&self, mesh_id: &str) -> bool;

    /// Nearest pickable hit among `candidates` within the ray's length.
    fn pick(&self, ray: &Ray, candidates: &[String]) -> Option<PickHit>;
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub position: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    pub pickable: bool,
    pub material: Option<String>,
}

impl MeshNode {
    pub fn boxed(position: Vec3, half_extents: Vec3) -> Self {
        MeshNode {
            position,
            rotation: Quat::IDENTITY,
            half_extents,
            pickable: true,
            material: None,
        }
    }

    pub fn with_material(mut self, material: &str) -> Self {
        self.material = Some(material.to_string());
        self
    }

    pub fn unpickable(mut self) -> Self {
        self.pickable = false;
        self
    }

    /// Slab test against the world-aligned box around `position`.
    fn intersect(&self, ray: &Ray) -> Option<(f32, usize)> {
        let min = self.position - self.half_extents;
        let max = self.position + self.half_extents;
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        let mut entry_axis = 0;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            if direction.abs() < f32::EPSILON {
                if origin < min[axis] || origin > max[axis] {
                    return None;
                }
                continue;
            }
            let mut t0 = (min[axis] - origin) / direction;
            let mut t1 = (max[axis] - origin) / direction;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_near {
                t_near = t0;
                entry_axis = axis;
            }
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        if t_far < 0.0 {
            return None;
        }
        Some((t_near.max(0.0), entry_axis))
    }

    fn face_uv(&self, point: Vec3, axis: usize) -> Vec2 {
        let min = self.position - self.half_extents;
        let size = (self.half_extents * 2.0).max(Vec3::splat(f32::EPSILON));
        let local = (point - min) / size;
        let uv = match axis {
            0 => Vec2::new(local.z, local.y),
            1 => Vec2::new(local.x, local.z),
            _ => Vec2::new(local.x, local.y),
        };
        uv.clamp(Vec2::ZERO, Vec2::ONE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    meshes: BTreeMap<String, MeshNode>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh_id: &str, node: MeshNode) {
        self.meshes.insert(mesh_id.to_string(), node);
    }

    pub fn remove(&mut self, mesh_id: &str) -> Option<MeshNode> {
        self.meshes.remove(mesh_id)
    }

    pub fn mesh(&self, mesh_id: &str) -> Option<&MeshNode> {
        self.meshes.get(mesh_id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

impl SceneGraph for MemoryScene {
    fn has_mesh(&self, mesh_id: &str) -> bool {
        self.meshes.contains_key(mesh_id)
    }

    fn is_pickable(&self, mesh_id: &str) -> Option<bool> {
        self.meshes.get(mesh_id).map(|node| node.pickable)
    }

    fn set_pickable(&mut self, mesh_id: &str, pickable: bool) -> bool {
        match self.meshes.get_mut(mesh_id) {
            Some(node) => {
                node.pickable = pickable;
                true
            }
            None => false,
        }
    }

    fn mesh_position(&self, mesh_id: &str) -> Option<Vec3> {
        self.meshes.get(mesh_id).map(|node| node.position)
    }

    fn set_mesh_position(&mut self, mesh_id: &str, position: Vec3) -> bool {
        match self.meshes.get_mut(mesh_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    fn mesh_rotation(&self, mesh_id: &str) -> Option<Quat> {
        self.meshes.get(mesh_id).map(|node| node.rotation)
    }

    fn set_mesh_rotation(&mut self, mesh_id: &str, rotation: Quat) -> bool {
        match self.meshes.get_mut(mesh_id) {
            Some(node) => {
                node.rotation = rotation;
                true
            }
            None => false,
        }
    }

    fn has_material(&self, mesh_id: &str) -> bool {
        self.meshes
            .get(mesh_id)
            .map(|node| node.material.is_some())
            .unwrap_or(false)
    }

    fn pick(&self, ray: &Ray, candidates: &[String]) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for mesh_id in candidates {
            let Some(node) = self.meshes.get(mesh_id) else {
                continue;
            };
            if !node.pickable {
                continue;
            }
            let Some((distance, axis)) = node.intersect(ray) else {
                continue;
            };
            if distance > ray.length {
                continue;
            }
            if best.as_ref().map_or(true, |hit| distance < hit.distance) {
                let point = ray.origin + ray.direction * distance;
                best = Some(PickHit {
                    mesh_id: mesh_id.clone(),
                    distance,
                    point,
                    uv: node.face_uv(point, axis),
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{MemoryScene, MeshNode, Ray, SceneGraph};

    fn scene() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.insert("near", MeshNode::boxed(Vec3::new(0.0, 0.0, 2.0), Vec3::splat(0.5)));
        scene.insert("far", MeshNode::boxed(Vec3::new(0.0, 0.0, 4.0), Vec3::splat(0.5)));
        scene
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn pick_returns_nearest_candidate() {
        let scene = scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 10.0);
        let hit = scene.pick(&ray, &ids(&["far", "near"])).expect("hit");
        assert_eq!(hit.mesh_id, "near");
        assert!((hit.distance - 1.5).abs() < 1e-5);
        assert!(hit.uv.abs_diff_eq(Vec2::new(0.5, 0.5), 1e-5));
    }

    #[test]
    fn pick_ignores_non_candidates_unpickable_and_out_of_range() {
        let mut scene = scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 10.0);
        let hit = scene.pick(&ray, &ids(&["far"])).expect("far hit");
        assert_eq!(hit.mesh_id, "far");

        scene.set_pickable("far", false);
        assert!(scene.pick(&ray, &ids(&["far"])).is_none());

        let short = Ray::new(Vec3::ZERO, Vec3::Z, 1.0);
        assert!(scene.pick(&short, &ids(&["near"])).is_none());
    }

    #[test]
    fn uv_tracks_hit_point_on_face() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.25, -0.25, 0.0), Vec3::Z, 10.0);
        let hit = scene.pick(&ray, &ids(&["near"])).expect("hit");
        assert!(hit.uv.abs_diff_eq(Vec2::new(0.75, 0.25), 1e-5));
    }
}
