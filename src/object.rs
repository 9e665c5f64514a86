//! Audio objects: points in space that own running events and standalone
//! files.
//!
//! An [`AudioObject`] only keeps bookkeeping. Talking to the middleware and
//! to the event/file managers is the job of the
//! [`ObjectManager`](crate::object_manager::ObjectManager).

use crate::config::AtlConfig;
use crate::event::{AudioEvent, EventState};
use crate::ids::{
    ControlId, EventId, ObjectId, StandaloneFileId, SwitchStateId, TriggerInstanceId,
    doppler_parameter_id, velocity_parameter_id,
};
use crate::math::{Object3DAttributes, Transformation, Vec3};
use crate::middleware::NativeHandle;
use crate::propagation::{PropagationData, PropagationProcessor, RayCaster};
use crate::request::SenderId;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Progress of one execute-trigger request on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerInstanceState {
    pub trigger_id: ControlId,
    pub num_playing_events: usize,
    pub num_loading_events: usize,
    pub owner: Option<SenderId>,
}

impl TriggerInstanceState {
    pub fn new(trigger_id: ControlId, owner: Option<SenderId>) -> Self {
        Self {
            trigger_id,
            num_playing_events: 0,
            num_loading_events: 0,
            owner,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.num_playing_events == 0 && self.num_loading_events == 0
    }
}

#[derive(Debug)]
pub struct AudioObject {
    id: ObjectId,
    pub(crate) native: Option<NativeHandle>,
    attributes: Object3DAttributes,
    previous_position: Vec3,
    previous_time: Duration,
    needs_velocity_update: bool,
    previous_speed: f32,
    is_virtual: bool,
    pub(crate) do_not_release: bool,
    /// Set for objects whose ID was supplied by the caller. They are never
    /// returned to the pool.
    pub(crate) external_id: bool,
    track_doppler: bool,
    track_velocity: bool,
    max_radius: f32,
    occlusion_fade_out_distance: f32,
    active_events: HashSet<EventId>,
    active_standalone_files: HashMap<StandaloneFileId, Option<SenderId>>,
    trigger_states: HashMap<TriggerInstanceId, TriggerInstanceState>,
    switch_states: HashMap<ControlId, SwitchStateId>,
    parameters: HashMap<ControlId, f32>,
    environments: HashMap<ControlId, f32>,
    propagation: PropagationProcessor,
}

impl AudioObject {
    pub(crate) fn new(id: ObjectId, native: Option<NativeHandle>, config: &AtlConfig) -> Self {
        Self {
            id,
            native,
            attributes: Object3DAttributes::default(),
            previous_position: Vec3::ZERO,
            previous_time: Duration::ZERO,
            needs_velocity_update: false,
            previous_speed: 0.0,
            is_virtual: false,
            do_not_release: false,
            external_id: false,
            track_doppler: false,
            track_velocity: false,
            max_radius: 0.0,
            occlusion_fade_out_distance: 0.0,
            active_events: HashSet::new(),
            active_standalone_files: HashMap::new(),
            trigger_states: HashMap::new(),
            switch_states: HashMap::new(),
            parameters: HashMap::new(),
            environments: HashMap::new(),
            propagation: PropagationProcessor::new(id, config),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    pub fn attributes(&self) -> &Object3DAttributes {
        &self.attributes
    }

    pub fn position(&self) -> Vec3 {
        self.attributes.position()
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn do_not_release(&self) -> bool {
        self.do_not_release
    }

    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    pub fn occlusion_fade_out_distance(&self) -> f32 {
        self.occlusion_fade_out_distance
    }

    pub fn tracks_doppler(&self) -> bool {
        self.track_doppler
    }

    pub fn tracks_velocity(&self) -> bool {
        self.track_velocity
    }

    pub fn active_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.active_events.iter().copied()
    }

    pub fn num_active_events(&self) -> usize {
        self.active_events.len()
    }

    pub fn active_standalone_files(&self) -> impl Iterator<Item = StandaloneFileId> + '_ {
        self.active_standalone_files.keys().copied()
    }

    pub fn num_active_standalone_files(&self) -> usize {
        self.active_standalone_files.len()
    }

    pub fn trigger_state(&self, id: TriggerInstanceId) -> Option<&TriggerInstanceState> {
        self.trigger_states.get(&id)
    }

    pub fn num_trigger_instances(&self) -> usize {
        self.trigger_states.len()
    }

    pub fn switch_state(&self, switch_id: ControlId) -> Option<SwitchStateId> {
        self.switch_states.get(&switch_id).copied()
    }

    pub fn parameter(&self, parameter_id: ControlId) -> Option<f32> {
        self.parameters.get(&parameter_id).copied()
    }

    pub fn environment_amount(&self, environment_id: ControlId) -> Option<f32> {
        self.environments.get(&environment_id).copied()
    }

    pub fn environments(&self) -> impl Iterator<Item = ControlId> + '_ {
        self.environments.keys().copied()
    }

    pub fn propagation(&self) -> &PropagationProcessor {
        &self.propagation
    }

    pub(crate) fn propagation_mut(&mut self) -> &mut PropagationProcessor {
        &mut self.propagation
    }

    pub fn propagation_data(&self) -> PropagationData {
        self.propagation.propagation_data()
    }

    /// Tracks at least one event or standalone file, whatever its state.
    pub fn has_active_data(&self) -> bool {
        !self.active_events.is_empty() || !self.active_standalone_files.is_empty()
    }

    pub fn can_be_released(&self) -> bool {
        !self.do_not_release && !self.has_active_data() && !self.propagation.has_pending_rays()
    }

    /// Changing to virtual drops the collected propagation rays.
    pub(crate) fn set_virtual(&mut self, is_virtual: bool) {
        if is_virtual && !self.is_virtual {
            self.propagation.reset_rays();
        }
        self.is_virtual = is_virtual;
    }

    pub(crate) fn set_doppler_tracking(&mut self, enable: bool) {
        self.track_doppler = enable;
    }

    pub(crate) fn set_velocity_tracking(&mut self, enable: bool) {
        self.track_velocity = enable;
        if !enable {
            self.previous_speed = 0.0;
            self.needs_velocity_update = false;
        }
    }

    /// Stores a new transformation unless it is equivalent to the current one
    /// within `threshold_ratio` times the distance to the listener.
    ///
    /// Returns true if the attributes changed and must be forwarded.
    pub(crate) fn set_transformation(
        &mut self,
        transformation: Transformation,
        listener_position: Vec3,
        threshold_ratio: f32,
        now: Duration,
    ) -> bool {
        let threshold = transformation.position.distance(listener_position) * threshold_ratio;
        if self
            .attributes
            .transformation
            .is_equivalent(&transformation, threshold)
        {
            return false;
        }

        if self.track_doppler || self.track_velocity {
            let delta = now.saturating_sub(self.previous_time).as_secs_f32();
            if delta > 0.0 {
                self.attributes.velocity = (transformation.position - self.previous_position) / delta;
                self.needs_velocity_update = true;
            }
        } else {
            self.attributes.velocity = Vec3::ZERO;
        }

        self.previous_position = transformation.position;
        self.previous_time = now;
        self.attributes.transformation = transformation;
        true
    }

    /// Parameter values the throttled controls update wants set.
    pub(crate) fn update_controls(
        &mut self,
        listener: &Object3DAttributes,
        velocity_threshold: f32,
    ) -> Vec<(ControlId, f32)> {
        let mut updates = Vec::new();

        if self.track_doppler {
            // Positive while the object and listener approach each other.
            let to_object = (self.position() - listener.position()).normalize_or_zero();
            let relative = self.attributes.velocity - listener.velocity;
            updates.push((doppler_parameter_id(), -relative.dot(to_object)));
        }

        if self.track_velocity {
            let speed = if self.needs_velocity_update {
                self.needs_velocity_update = false;
                self.attributes.velocity.length()
            } else {
                let decayed = self.previous_speed * 0.5;
                if decayed < velocity_threshold {
                    self.attributes.velocity = Vec3::ZERO;
                    0.0
                } else {
                    self.attributes.velocity *= 0.5;
                    decayed
                }
            };

            let changed = (speed - self.previous_speed).abs() > velocity_threshold
                || (speed == 0.0 && self.previous_speed != 0.0);
            if changed {
                self.previous_speed = speed;
                updates.push((velocity_parameter_id(), speed));
            }
        }

        updates
    }

    /// Advances obstruction/occlusion for this frame.
    pub(crate) fn update(&mut self, delta_time: Duration, listener_position: Vec3, caster: &mut dyn RayCaster) {
        let distance = self.position().distance(listener_position);
        let fade = self.occlusion_fade_out_distance;
        let multiplier = if fade > 0.0 && self.max_radius > 0.0 {
            ((self.max_radius - distance) / fade).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.propagation.set_occlusion_multiplier(multiplier);
        self.propagation
            .update(delta_time, self.position(), listener_position, caster);
    }

    /// Tracks a freshly started or loading event.
    pub(crate) fn add_event(&mut self, event: &AudioEvent) {
        self.active_events.insert(event.id());
        self.max_radius = self.max_radius.max(event.max_radius);
        self.occlusion_fade_out_distance = self
            .occlusion_fade_out_distance
            .max(event.occlusion_fade_out_distance);
    }

    pub(crate) fn add_trigger_instance(&mut self, id: TriggerInstanceId, state: TriggerInstanceState) {
        self.trigger_states.insert(id, state);
    }

    /// A loading event has started playing.
    pub(crate) fn report_started_event(&mut self, event: &mut AudioEvent) {
        if event.state != EventState::Loading {
            return;
        }
        event.state = EventState::Playing;
        if let Some(state) = self.trigger_states.get_mut(&event.trigger_instance_id) {
            state.num_loading_events = state.num_loading_events.saturating_sub(1);
            state.num_playing_events += 1;
        }
    }

    /// Removes a finished event. Returns the trigger instance it belonged to
    /// if that was its last event.
    ///
    /// `remaining` resolves the object's other events, for recomputing the
    /// radius.
    pub(crate) fn report_finished_event<'a>(
        &mut self,
        event: &AudioEvent,
        remaining: impl Fn(EventId) -> Option<&'a AudioEvent>,
    ) -> Option<(TriggerInstanceId, TriggerInstanceState)> {
        self.active_events.remove(&event.id());

        let instance_id = event.trigger_instance_id;
        let finished = match self.trigger_states.get_mut(&instance_id) {
            Some(state) => {
                if event.state == EventState::Loading {
                    state.num_loading_events = state.num_loading_events.saturating_sub(1);
                } else {
                    state.num_playing_events = state.num_playing_events.saturating_sub(1);
                }
                state.is_finished()
            }
            None => {
                log::warn!(
                    "event {} finished for unknown trigger instance {} on object {}",
                    event.id(),
                    instance_id,
                    self.id
                );
                false
            }
        };

        let mut max_radius: f32 = 0.0;
        let mut fade: f32 = 0.0;
        for other in self.active_events.iter().filter_map(|id| remaining(*id)) {
            max_radius = max_radius.max(other.max_radius);
            fade = fade.max(other.occlusion_fade_out_distance);
        }
        self.max_radius = max_radius;
        self.occlusion_fade_out_distance = fade;

        if finished {
            self.trigger_states
                .remove(&instance_id)
                .map(|state| (instance_id, state))
        } else {
            None
        }
    }

    pub(crate) fn add_standalone_file(&mut self, id: StandaloneFileId, owner: Option<SenderId>) {
        self.active_standalone_files.insert(id, owner);
    }

    pub fn has_standalone_file(&self, id: StandaloneFileId) -> bool {
        self.active_standalone_files.contains_key(&id)
    }

    pub(crate) fn remove_standalone_file(&mut self, id: StandaloneFileId) -> bool {
        self.active_standalone_files.remove(&id).is_some()
    }

    pub(crate) fn store_switch_state(&mut self, switch_id: ControlId, state_id: SwitchStateId) {
        self.switch_states.insert(switch_id, state_id);
    }

    pub(crate) fn store_parameter(&mut self, parameter_id: ControlId, value: f32) {
        self.parameters.insert(parameter_id, value);
    }

    /// A zero amount removes the environment.
    pub(crate) fn store_environment(&mut self, environment_id: ControlId, amount: f32) {
        if amount > 0.0 {
            self.environments.insert(environment_id, amount);
        } else {
            self.environments.remove(&environment_id);
        }
    }

    /// Drops events, files and trigger instances without touching the
    /// middleware. Used when the managers owning them are released.
    pub(crate) fn clear_active_data(&mut self) {
        self.active_events.clear();
        self.active_standalone_files.clear();
        self.trigger_states.clear();
        self.max_radius = 0.0;
        self.occlusion_fade_out_distance = 0.0;
    }

    /// Resets everything but the ID and native handle, ready for reuse.
    pub(crate) fn clear(&mut self) {
        self.clear_active_data();
        self.attributes = Object3DAttributes::default();
        self.previous_position = Vec3::ZERO;
        self.previous_time = Duration::ZERO;
        self.needs_velocity_update = false;
        self.previous_speed = 0.0;
        self.is_virtual = false;
        self.do_not_release = false;
        self.track_doppler = false;
        self.track_velocity = false;
        self.switch_states.clear();
        self.parameters.clear();
        self.environments.clear();
        self.propagation.set_occlusion_type(Default::default());
        self.propagation.release_pending_rays();
        self.propagation.reset_rays();
    }
}
