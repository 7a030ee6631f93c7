//! Ray picking and volume intersection against the scene graph

use bevy::math::bounding::{Aabb3d, IntersectsVolume, RayCast3d};
use bevy::math::{Dir3A, Vec3, Vec3A};

use super::{NodeId, SceneGraph};

/// Distance used when a pick ray has no explicit far limit
pub const MAX_PICK_DISTANCE: f32 = 10_000.0;

/// Ray structure for raycasting
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Distance along the ray to the first intersection with `aabb`
    pub fn intersect_aabb(&self, aabb: &Aabb3d) -> Option<f32> {
        let direction = Dir3A::new(Vec3A::from(self.direction)).ok()?;
        RayCast3d::new(Vec3A::from(self.origin), direction, MAX_PICK_DISTANCE)
            .aabb_intersection_at(aabb)
    }
}

/// A single pick result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
    /// World-space normal of the box face that was hit
    pub normal: Vec3,
}

/// Outward normal of the box face closest to `point`
fn face_normal(aabb: &Aabb3d, point: Vec3) -> Vec3 {
    let min = Vec3::from(aabb.min);
    let max = Vec3::from(aabb.max);
    let candidates = [
        ((point.x - min.x).abs(), Vec3::NEG_X),
        ((point.x - max.x).abs(), Vec3::X),
        ((point.y - min.y).abs(), Vec3::NEG_Y),
        ((point.y - max.y).abs(), Vec3::Y),
        ((point.z - min.z).abs(), Vec3::NEG_Z),
        ((point.z - max.z).abs(), Vec3::Z),
    ];
    candidates
        .iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, n)| *n)
        .unwrap_or(Vec3::Z)
}

impl SceneGraph {
    /// Nodes that can be hit: attached, enabled, collidable and bounded.
    /// Anything under `exclude` is skipped.
    fn pick_candidates(&self, exclude: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        self.walk().into_iter().filter(move |id| {
            *id != self.root()
                && self.is_collidable(*id)
                && self.bounds(*id).is_some()
                && self.is_effectively_enabled(*id)
                && exclude.map_or(true, |ex| !self.is_descendant_of(*id, ex))
        })
    }

    /// Every hit along the ray, nearest first
    pub fn pick_all(&self, ray: &Ray, exclude: Option<NodeId>) -> Vec<PickHit> {
        let mut hits: Vec<PickHit> = self
            .pick_candidates(exclude)
            .filter_map(|id| {
                let aabb = self.world_bounds(id)?;
                let distance = ray.intersect_aabb(&aabb)?;
                let point = ray.at(distance);
                Some(PickHit {
                    node: id,
                    distance,
                    point,
                    normal: face_normal(&aabb, point),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Nearest hit along the ray
    pub fn pick_nearest(&self, ray: &Ray, exclude: Option<NodeId>) -> Option<PickHit> {
        self.pick_all(ray, exclude).into_iter().next()
    }

    /// Collidable nodes whose world bounds overlap `volume`, in walk order
    pub fn intersecting(&self, volume: &Aabb3d, exclude: Option<NodeId>) -> Vec<NodeId> {
        self.pick_candidates(exclude)
            .filter(|id| {
                self.world_bounds(*id)
                    .map(|aabb| aabb.intersects(volume))
                    .unwrap_or(false)
            })
            .collect()
    }
}
