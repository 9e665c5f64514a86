//! Configuration for the audio translation layer

use crate::error::{AtlError, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AtlConfig {
    pub object_pool_size: usize,
    pub event_pool_size: usize,
    pub standalone_file_pool_size: usize,
    pub num_listeners: u32,
    pub default_listener_id: u32,
    /// First ID handed out to ordinary audio objects. Everything below is
    /// reserved for singletons such as listeners.
    pub min_object_id: u32,
    pub max_id: u32,
    pub controls_update_interval: Duration,
    /// Fraction of the listener distance an object has to move before a new
    /// transformation is forwarded to the middleware.
    pub position_update_threshold: f32,
    pub velocity_tracking_threshold: f32,
    pub occlusion_min_distance: f32,
    pub occlusion_max_distance: f32,
    pub occlusion_update_interval: Duration,
    pub multi_ray_count: usize,
    pub platform: String,
}

impl Default for AtlConfig {
    fn default() -> Self {
        Self {
            object_pool_size: 256,
            event_pool_size: 256,
            standalone_file_pool_size: 16,
            num_listeners: 8,
            default_listener_id: 50,
            min_object_id: 100,
            max_id: u32::MAX - 1,
            controls_update_interval: Duration::from_millis(100),
            position_update_threshold: 0.02,
            velocity_tracking_threshold: 0.1,
            occlusion_min_distance: 0.1,
            occlusion_max_distance: 500.0,
            occlusion_update_interval: Duration::from_millis(100),
            multi_ray_count: 5,
            platform: "pc".to_string(),
        }
    }
}

impl AtlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_pool_size(mut self, size: usize) -> Self {
        self.object_pool_size = size;
        self
    }

    pub fn event_pool_size(mut self, size: usize) -> Self {
        self.event_pool_size = size;
        self
    }

    pub fn standalone_file_pool_size(mut self, size: usize) -> Self {
        self.standalone_file_pool_size = size;
        self
    }

    pub fn num_listeners(mut self, count: u32) -> Self {
        self.num_listeners = count;
        self
    }

    pub fn default_listener_id(mut self, id: u32) -> Self {
        self.default_listener_id = id;
        self
    }

    pub fn min_object_id(mut self, id: u32) -> Self {
        self.min_object_id = id;
        self
    }

    pub fn max_id(mut self, id: u32) -> Self {
        self.max_id = id;
        self
    }

    pub fn controls_update_interval(mut self, interval: Duration) -> Self {
        self.controls_update_interval = interval;
        self
    }

    pub fn position_update_threshold(mut self, threshold: f32) -> Self {
        self.position_update_threshold = threshold;
        self
    }

    pub fn velocity_tracking_threshold(mut self, threshold: f32) -> Self {
        self.velocity_tracking_threshold = threshold;
        self
    }

    pub fn occlusion_distance(mut self, min: f32, max: f32) -> Self {
        self.occlusion_min_distance = min;
        self.occlusion_max_distance = max;
        self
    }

    pub fn occlusion_update_interval(mut self, interval: Duration) -> Self {
        self.occlusion_update_interval = interval;
        self
    }

    pub fn multi_ray_count(mut self, count: usize) -> Self {
        self.multi_ray_count = count;
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Checks that the reserved ID ranges and distance windows are consistent.
    ///
    /// # Errors
    ///
    /// Returns `AtlError::Configuration` if the listener ID range overlaps the
    /// ordinary object range, no listener is configured, or the occlusion
    /// distance window is empty.
    pub fn validate(&self) -> Result<()> {
        if self.num_listeners == 0 {
            return Err(AtlError::Configuration(
                "at least one listener is required".to_string(),
            ));
        }

        let listener_end = self
            .default_listener_id
            .checked_add(self.num_listeners)
            .ok_or_else(|| AtlError::Configuration("listener id range overflows".to_string()))?;
        if self.default_listener_id == 0 || listener_end > self.min_object_id {
            return Err(AtlError::Configuration(format!(
                "listener ids {}..{} must lie in the reserved range below {}",
                self.default_listener_id, listener_end, self.min_object_id
            )));
        }

        if self.min_object_id >= self.max_id {
            return Err(AtlError::Configuration(format!(
                "min object id {} must be below max id {}",
                self.min_object_id, self.max_id
            )));
        }

        if !(self.occlusion_min_distance < self.occlusion_max_distance) {
            return Err(AtlError::Configuration(format!(
                "occlusion distance window {}..{} is empty",
                self.occlusion_min_distance, self.occlusion_max_distance
            )));
        }

        Ok(())
    }
}
