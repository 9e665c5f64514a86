//! Obstruction and occlusion bookkeeping for audio objects.
//!
//! Ray casting itself belongs to an external [`RayCaster`]. Rays are queued
//! during the object update and their results arrive later, possibly several
//! frames afterwards; until then the last computed values are used.

use crate::config::AtlConfig;
use crate::ids::ObjectId;
use crate::math::Vec3;
use std::time::Duration;

/// One ray the propagation processor wants cast from the listener towards an
/// object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayRequest {
    pub object_id: ObjectId,
    pub ray_index: usize,
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

/// Result of a ray intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Whether the ray hit any geometry
    pub hit: bool,

    /// Distance from ray origin to the first hit (in meters)
    ///
    /// Only meaningful if `hit` is true
    pub distance: f32,

    /// Accumulated attenuation of all surfaces crossed, 0 (none) to 1 (full)
    ///
    /// Only meaningful if `hit` is true
    pub occlusion: f32,
}

impl RayHit {
    /// Creates a miss result (no hit)
    pub fn miss() -> Self {
        Self {
            hit: false,
            distance: 0.0,
            occlusion: 0.0,
        }
    }

    /// Creates a hit result
    pub fn new(distance: f32, occlusion: f32) -> Self {
        Self {
            hit: true,
            distance,
            occlusion: occlusion.clamp(0.0, 1.0),
        }
    }

    fn occlusion_value(&self) -> f32 {
        if self.hit { self.occlusion } else { 0.0 }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::miss()
    }
}

/// A finished ray, reported back for the object that queued it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedRay {
    pub object_id: ObjectId,
    pub ray_index: usize,
    pub hit: RayHit,
}

/// Asynchronous ray casting service.
///
/// Implementations queue the request and later deliver a [`ProcessedRay`],
/// usually through `ImplReport::ObstructionRayProcessed`.
pub trait RayCaster {
    /// Queues a ray. Returns false if the request was rejected, in which case
    /// no result will ever be reported for it.
    fn queue_ray(&mut self, request: RayRequest) -> bool;

    /// Called once per update before any ray is queued (optional).
    fn begin_frame(&mut self) {}

    /// Called once per update after all rays are queued (optional).
    fn end_frame(&mut self) {}
}

/// Ray caster for setups without physics. Rejects every ray.
#[derive(Debug, Default)]
pub struct NullRayCaster;

impl RayCaster for NullRayCaster {
    fn queue_ray(&mut self, _request: RayRequest) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OcclusionType {
    #[default]
    Ignore,
    SingleRay,
    MultiRay,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PropagationData {
    pub obstruction: f32,
    pub occlusion: f32,
}

#[derive(Debug)]
pub struct PropagationProcessor {
    object_id: ObjectId,
    occlusion_type: OcclusionType,
    obstruction: f32,
    occlusion: f32,
    occlusion_multiplier: f32,
    pending_rays: usize,
    ray_results: Vec<(usize, f32)>,
    time_since_last_cast: Duration,
    in_range: bool,
    update_interval: Duration,
    min_distance: f32,
    max_distance: f32,
    multi_ray_count: usize,
}

impl PropagationProcessor {
    pub fn new(object_id: ObjectId, config: &AtlConfig) -> Self {
        Self {
            object_id,
            occlusion_type: OcclusionType::Ignore,
            obstruction: 0.0,
            occlusion: 0.0,
            occlusion_multiplier: 1.0,
            pending_rays: 0,
            ray_results: Vec::new(),
            time_since_last_cast: Duration::ZERO,
            in_range: false,
            update_interval: config.occlusion_update_interval,
            min_distance: config.occlusion_min_distance,
            max_distance: config.occlusion_max_distance,
            multi_ray_count: config.multi_ray_count.max(1),
        }
    }

    pub fn occlusion_type(&self) -> OcclusionType {
        self.occlusion_type
    }

    pub fn set_occlusion_type(&mut self, occlusion_type: OcclusionType) {
        if occlusion_type == OcclusionType::Ignore {
            self.obstruction = 0.0;
            self.occlusion = 0.0;
        }
        self.occlusion_type = occlusion_type;
        // Cast on the next update.
        self.time_since_last_cast = self.update_interval;
    }

    pub fn set_occlusion_multiplier(&mut self, multiplier: f32) {
        self.occlusion_multiplier = multiplier.clamp(0.0, 1.0);
    }

    /// Advances the cast timer and queues new rays when it elapses and the
    /// previous batch has fully come back.
    pub fn update(
        &mut self,
        delta_time: Duration,
        object_position: Vec3,
        listener_position: Vec3,
        caster: &mut dyn RayCaster,
    ) {
        let distance = object_position.distance(listener_position);
        self.in_range = self.occlusion_type != OcclusionType::Ignore
            && distance >= self.min_distance
            && distance <= self.max_distance;

        if !self.in_range {
            self.obstruction = 0.0;
            self.occlusion = 0.0;
            return;
        }

        self.time_since_last_cast += delta_time;
        if self.time_since_last_cast >= self.update_interval && self.pending_rays == 0 {
            self.time_since_last_cast = Duration::ZERO;
            self.cast_rays(object_position, listener_position, distance, caster);
        }
    }

    fn cast_rays(
        &mut self,
        object_position: Vec3,
        listener_position: Vec3,
        distance: f32,
        caster: &mut dyn RayCaster,
    ) {
        let direction = (object_position - listener_position).normalize_or_zero();
        if direction == Vec3::ZERO {
            return;
        }

        let ray_count = match self.occlusion_type {
            OcclusionType::Ignore => 0,
            OcclusionType::SingleRay => 1,
            OcclusionType::MultiRay => self.multi_ray_count,
        };

        self.ray_results.clear();
        let (side, up) = direction.any_orthonormal_pair();
        let spread = 0.5_f32;

        for ray_index in 0..ray_count {
            // Ray 0 is the direct path, the others are spread around it.
            let offset = if ray_index == 0 {
                Vec3::ZERO
            } else {
                let angle = std::f32::consts::TAU * (ray_index - 1) as f32
                    / (ray_count - 1) as f32;
                (side * angle.cos() + up * angle.sin()) * spread
            };
            let target = object_position + offset;
            let request = RayRequest {
                object_id: self.object_id,
                ray_index,
                origin: listener_position,
                direction: (target - listener_position).normalize_or_zero(),
                max_distance: distance,
            };
            if caster.queue_ray(request) {
                self.pending_rays += 1;
            }
        }
    }

    /// Records one returned ray. Once the batch is complete the obstruction
    /// and occlusion values are recomputed.
    pub fn report_ray(&mut self, ray_index: usize, hit: RayHit) {
        if self.pending_rays == 0 {
            log::warn!(
                "unexpected obstruction ray {} for object {}",
                ray_index,
                self.object_id
            );
            return;
        }

        self.pending_rays -= 1;
        self.ray_results.push((ray_index, hit.occlusion_value()));

        if self.pending_rays == 0 {
            self.apply_ray_results();
        }
    }

    fn apply_ray_results(&mut self) {
        if self.ray_results.is_empty() || self.occlusion_type == OcclusionType::Ignore {
            return;
        }

        let average = self.ray_results.iter().map(|(_, value)| value).sum::<f32>()
            / self.ray_results.len() as f32;
        let direct = self
            .ray_results
            .iter()
            .find(|(index, _)| *index == 0)
            .map_or(average, |(_, value)| *value);

        match self.occlusion_type {
            OcclusionType::MultiRay => {
                self.occlusion = average;
                self.obstruction = (direct - average).max(0.0);
            }
            _ => {
                self.occlusion = direct;
                self.obstruction = 0.0;
            }
        }
        self.ray_results.clear();
    }

    pub fn can_run_obstruction_occlusion(&self) -> bool {
        self.in_range && self.occlusion_type != OcclusionType::Ignore
    }

    pub fn propagation_data(&self) -> PropagationData {
        PropagationData {
            obstruction: self.obstruction,
            occlusion: self.occlusion * self.occlusion_multiplier,
        }
    }

    /// Drops collected results. Rays still in flight keep being counted.
    pub fn reset_rays(&mut self) {
        self.ray_results.clear();
        self.obstruction = 0.0;
        self.occlusion = 0.0;
        self.time_since_last_cast = Duration::ZERO;
    }

    pub fn has_pending_rays(&self) -> bool {
        self.pending_rays > 0
    }

    pub fn pending_rays(&self) -> usize {
        self.pending_rays
    }

    /// Forgets rays in flight, used when the ray caster is torn down.
    pub fn release_pending_rays(&mut self) {
        self.pending_rays = 0;
        self.ray_results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct QueueCaster {
        queued: Vec<RayRequest>,
    }

    impl RayCaster for QueueCaster {
        fn queue_ray(&mut self, request: RayRequest) -> bool {
            self.queued.push(request);
            true
        }
    }

    fn processor(occlusion_type: OcclusionType) -> PropagationProcessor {
        let config = AtlConfig::new().multi_ray_count(5);
        let mut processor = PropagationProcessor::new(ObjectId(100), &config);
        processor.set_occlusion_type(occlusion_type);
        processor
    }

    #[test]
    fn test_ray_hit_miss() {
        let miss = RayHit::miss();
        assert!(!miss.hit);
        assert_eq!(miss.occlusion_value(), 0.0);
    }

    #[test]
    fn test_ray_hit_clamps_occlusion() {
        let hit = RayHit::new(5.0, 3.0);
        assert!(hit.hit);
        assert_eq!(hit.occlusion, 1.0);
    }

    #[test]
    fn test_ignore_never_casts() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::Ignore);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        assert!(caster.queued.is_empty());
        assert!(!processor.can_run_obstruction_occlusion());
    }

    #[test]
    fn test_single_ray_round_trip() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::SingleRay);
        processor.update(Duration::from_millis(16), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        assert_eq!(caster.queued.len(), 1);
        assert!(processor.has_pending_rays());
        assert!(processor.can_run_obstruction_occlusion());

        processor.report_ray(0, RayHit::new(4.0, 0.6));
        assert!(!processor.has_pending_rays());
        let data = processor.propagation_data();
        assert_eq!(data.occlusion, 0.6);
        assert_eq!(data.obstruction, 0.0);
    }

    #[test]
    fn test_multi_ray_obstruction() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::MultiRay);
        processor.update(Duration::from_millis(16), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        assert_eq!(caster.queued.len(), 5);

        processor.report_ray(0, RayHit::new(2.0, 1.0));
        for index in 1..5 {
            processor.report_ray(index, RayHit::miss());
        }
        let data = processor.propagation_data();
        assert!((data.occlusion - 0.2).abs() < 1e-6);
        assert!((data.obstruction - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_no_new_batch_while_rays_pending() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::SingleRay);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        assert_eq!(caster.queued.len(), 1);
    }

    #[test]
    fn test_out_of_range_clears_values() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::SingleRay);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        processor.report_ray(0, RayHit::new(1.0, 1.0));
        processor.update(Duration::from_secs(1), Vec3::X * 1000.0, Vec3::ZERO, &mut caster);
        assert!(!processor.can_run_obstruction_occlusion());
        assert_eq!(processor.propagation_data(), PropagationData::default());
    }

    #[test]
    fn test_release_pending_rays() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::MultiRay);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        assert_eq!(processor.pending_rays(), 5);
        processor.release_pending_rays();
        assert!(!processor.has_pending_rays());
    }

    #[test]
    fn test_null_caster_leaves_nothing_pending() {
        let mut processor = processor(OcclusionType::MultiRay);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut NullRayCaster);
        assert!(!processor.has_pending_rays());
    }

    #[test]
    fn test_occlusion_multiplier() {
        let mut caster = QueueCaster::default();
        let mut processor = processor(OcclusionType::SingleRay);
        processor.update(Duration::from_secs(1), Vec3::X * 10.0, Vec3::ZERO, &mut caster);
        processor.report_ray(0, RayHit::new(1.0, 0.8));
        processor.set_occlusion_multiplier(0.5);
        assert!((processor.propagation_data().occlusion - 0.4).abs() < 1e-6);
    }
}
