//! Owns every audio object, plus the event and standalone file managers the
//! objects draw from, and drives them once per update.

use crate::catalog::{Environment, ImplPayload, Parameter, SwitchState, Trigger};
use crate::config::AtlConfig;
use crate::context::AtlContext;
use crate::diagnostics::NameKind;
use crate::event::{EventManager, EventState};
use crate::ids::{
    ControlId, EventId, OCCLUSION_CALC_IGNORE_STATE_NAME, OCCLUSION_CALC_MULTI_RAY_STATE_NAME,
    OCCLUSION_CALC_SINGLE_RAY_STATE_NAME, ObjectId, StandaloneFileId, SwitchStateId,
    TriggerInstanceId, doppler_parameter_id, occlusion_calc_switch_id, velocity_parameter_id,
};
use crate::math::{Object3DAttributes, Transformation, Vec3};
use crate::middleware::{NativeHandle, RequestStatus, SharedImpl};
use crate::object::{AudioObject, TriggerInstanceState};
use crate::pool::{IdGenerator, InstancePool};
use crate::propagation::{OcclusionType, ProcessedRay, RayCaster};
use crate::request::SenderId;
use crate::standalone_file::{StandaloneFileManager, StandaloneFileState};
use std::collections::HashMap;
use std::time::Duration;

/// Follow-up work produced while processing objects, carried out by the
/// owner of the control catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredRequest {
    SetParameter {
        object_id: ObjectId,
        parameter_id: ControlId,
        value: f32,
    },
    FinishedTriggerInstance {
        object_id: ObjectId,
        trigger_id: ControlId,
        instance_id: TriggerInstanceId,
        owner: Option<SenderId>,
    },
}

fn occlusion_type_for_state(state_id: SwitchStateId) -> Option<OcclusionType> {
    [
        (OCCLUSION_CALC_IGNORE_STATE_NAME, OcclusionType::Ignore),
        (OCCLUSION_CALC_SINGLE_RAY_STATE_NAME, OcclusionType::SingleRay),
        (OCCLUSION_CALC_MULTI_RAY_STATE_NAME, OcclusionType::MultiRay),
    ]
    .into_iter()
    .find(|(name, _)| SwitchStateId::from_name(name) == state_id)
    .map(|(_, occlusion_type)| occlusion_type)
}

/// Creates an object, with native data when a middleware is connected.
fn new_object(imp: Option<&SharedImpl>, id: ObjectId, config: &AtlConfig) -> Option<AudioObject> {
    match imp {
        Some(imp) => imp
            .borrow_mut()
            .new_audio_object(id)
            .map(|native| AudioObject::new(id, Some(native), config)),
        None => Some(AudioObject::new(id, None, config)),
    }
}

fn is_playing(object: &AudioObject, events: &EventManager, files: &StandaloneFileManager) -> bool {
    object
        .active_events()
        .any(|id| events.lookup_id(id).is_some_and(|event| event.is_playing()))
        || object
            .active_standalone_files()
            .any(|id| files.lookup_id(id).is_some_and(|file| file.is_playing()))
}

pub struct ObjectManager {
    ctx: AtlContext,
    imp: Option<SharedImpl>,
    pool: InstancePool<AudioObject>,
    registered: HashMap<ObjectId, AudioObject>,
    events: EventManager,
    standalone_files: StandaloneFileManager,
    trigger_instance_ids: IdGenerator,
    time_since_controls_update: Duration,
    elapsed: Duration,
    deferred: Vec<DeferredRequest>,
}

impl ObjectManager {
    pub fn new(ctx: AtlContext) -> Self {
        let config = ctx.config();
        let pool = InstancePool::new(
            "audio object",
            config.object_pool_size,
            config.min_object_id,
            config.max_id,
        );
        let trigger_instance_ids = IdGenerator::new("trigger instance", 1, config.max_id);

        Self {
            events: EventManager::new(&ctx),
            standalone_files: StandaloneFileManager::new(&ctx),
            ctx,
            imp: None,
            pool,
            registered: HashMap::new(),
            trigger_instance_ids,
            time_since_controls_update: Duration::ZERO,
            elapsed: Duration::ZERO,
            deferred: Vec::new(),
        }
    }

    /// Connects to the middleware.
    ///
    /// Tops the pool up so pooled plus registered objects match the pool
    /// capacity, then creates native objects for every pooled and registered
    /// instance that lacks one. Registered objects are also registered with
    /// the middleware.
    pub fn init(&mut self, imp: SharedImpl) {
        {
            let mut middleware = imp.borrow_mut();
            let config = self.ctx.config();

            let wanted = self.pool.capacity().saturating_sub(self.registered.len());
            while self.pool.len() < wanted {
                let id = ObjectId(self.pool.next_id());
                match middleware.new_audio_object(id) {
                    Some(native) => self.pool.push(AudioObject::new(id, Some(native), config)),
                    None => {
                        self.pool.rollback_id();
                        log::warn!("failed to pre-allocate audio object {}", id);
                        break;
                    }
                }
            }

            for object in self.pool.iter_mut() {
                if object.native.is_none() {
                    object.native = middleware.new_audio_object(object.id());
                }
            }

            for object in self.registered.values_mut() {
                if object.native.is_none() {
                    object.native = middleware.new_audio_object(object.id());
                }
                let Some(native) = object.native else {
                    log::warn!("failed to create native data for audio object {}", object.id());
                    continue;
                };
                let name = self.ctx.diagnostics().lookup_name(NameKind::Object, object.id().0);
                if middleware
                    .register_audio_object(native, name.as_deref())
                    .is_failure()
                {
                    log::warn!("failed to register audio object {}", object.id());
                }
            }
        }

        self.events.init(imp.clone());
        self.standalone_files.init(imp.clone());
        self.imp = Some(imp);

        log::debug!(
            "object manager initialized with {} pooled and {} registered objects",
            self.pool.len(),
            self.registered.len()
        );
    }

    /// Unregisters and deletes every native object. Registered objects stay
    /// registered so a later [`init`](Self::init) can bring them back.
    pub fn release(&mut self) {
        let Some(imp) = self.imp.take() else {
            return;
        };

        self.events.release();
        self.standalone_files.release();

        let mut middleware = imp.borrow_mut();
        for object in self.registered.values_mut() {
            object.clear_active_data();
            object.propagation_mut().release_pending_rays();
            if let Some(native) = object.native.take() {
                middleware.unregister_audio_object(native);
                middleware.reset_audio_object(native);
                middleware.delete_audio_object(native);
            }
        }
        for object in self.pool.iter_mut() {
            if let Some(native) = object.native.take() {
                middleware.delete_audio_object(native);
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.imp.is_some()
    }

    /// Per-frame sweep over all registered objects.
    ///
    /// Objects at or beyond their maximum radius from the listener become
    /// virtual. Active objects (non-virtual, playing at least one event or
    /// file) advance their propagation and are forwarded to the middleware.
    /// Idle objects that may be released go back to the pool right away.
    ///
    /// Once per controls interval every non-virtual object re-evaluates its
    /// doppler and velocity parameters, whether it is playing or not, so a
    /// sound started later begins with current values.
    pub fn update(
        &mut self,
        delta_time: Duration,
        listener: &Object3DAttributes,
        caster: &mut dyn RayCaster,
    ) {
        self.elapsed += delta_time;
        self.time_since_controls_update += delta_time;

        let config = self.ctx.config();
        let update_controls = self.time_since_controls_update >= config.controls_update_interval;
        let velocity_threshold = config.velocity_tracking_threshold;
        let listener_position = listener.position();

        let mut releasable = Vec::new();
        for (id, object) in self.registered.iter_mut() {
            let radius = object.max_radius();
            let distance = object.position().distance(listener_position);
            object.set_virtual(radius > 0.0 && distance >= radius);

            if update_controls && !object.is_virtual() {
                for (parameter_id, value) in object.update_controls(listener, velocity_threshold) {
                    self.deferred.push(DeferredRequest::SetParameter {
                        object_id: *id,
                        parameter_id,
                        value,
                    });
                }
            }

            let is_active =
                !object.is_virtual() && is_playing(object, &self.events, &self.standalone_files);
            if is_active {
                object.update(delta_time, listener_position, caster);
                if let (Some(imp), Some(native)) = (&self.imp, object.native()) {
                    let mut middleware = imp.borrow_mut();
                    if object.propagation().can_run_obstruction_occlusion() {
                        let data = object.propagation_data();
                        middleware.set_obstruction_occlusion(native, data.obstruction, data.occlusion);
                    }
                    middleware.update_audio_object(native);
                }
            } else if object.can_be_released() {
                releasable.push(*id);
            }
        }

        if update_controls {
            self.time_since_controls_update = Duration::ZERO;
        }

        for id in releasable {
            if let Some(object) = self.registered.remove(&id) {
                self.release_instance(object);
            }
        }
    }

    /// Hands out a new managed object and registers it with the middleware.
    /// The object is flagged do-not-release until [`release_id`](Self::release_id).
    ///
    /// Returns `None` if no object could be created or registered.
    pub fn reserve_id(&mut self, name: Option<&str>) -> Option<ObjectId> {
        let imp = self.imp.clone();
        let ctx = self.ctx.clone();
        let create = |id| new_object(imp.as_ref(), ObjectId(id), ctx.config());

        let mut object = self.pool.acquire(create)?;
        if self.registered.contains_key(&object.id()) {
            log::warn!(
                "audio object {} is already registered, allocating a new one",
                object.id()
            );
            self.destroy(object);
            object = self.pool.create(create)?;
            if self.registered.contains_key(&object.id()) {
                log::warn!("audio object {} is already registered, dropping request", object.id());
                self.destroy(object);
                return None;
            }
        }

        let id = object.id();
        if !self.register_native(&object, name) {
            self.recycle(object);
            return None;
        }

        object.do_not_release = true;
        if let Some(name) = name {
            self.ctx.diagnostics().add_name(NameKind::Object, id.0, name);
        }
        self.registered.insert(id, object);
        Some(id)
    }

    /// Registers an object under a caller-owned ID, or returns true if it is
    /// already registered.
    ///
    /// A pooled instance carrying that ID is taken over and stays poolable.
    /// Otherwise a new instance is created, which is deleted rather than
    /// pooled once released.
    pub fn reserve_this_id(&mut self, id: ObjectId, name: Option<&str>) -> bool {
        if !id.is_valid() {
            log::warn!("cannot reserve the invalid object id");
            return false;
        }
        if let Some(object) = self.registered.get_mut(&id) {
            object.do_not_release = true;
            return true;
        }

        let mut object = match self.pool.take_where(|o| o.id() == id) {
            Some(object) => object,
            None => {
                let Some(mut object) = new_object(self.imp.as_ref(), id, self.ctx.config()) else {
                    log::warn!("failed to create audio object {}", id);
                    return false;
                };
                object.external_id = true;
                object
            }
        };
        if !self.register_native(&object, name) {
            self.recycle(object);
            return false;
        }

        object.do_not_release = true;
        if let Some(name) = name {
            self.ctx.diagnostics().add_name(NameKind::Object, id.0, name);
        }
        self.registered.insert(id, object);
        true
    }

    /// Whether the object is non-virtual and plays at least one event or
    /// standalone file. Loading, stopping and virtual ones do not count.
    pub fn is_active(&self, id: ObjectId) -> bool {
        self.registered.get(&id).is_some_and(|object| {
            !object.is_virtual() && is_playing(object, &self.events, &self.standalone_files)
        })
    }

    /// Makes the object eligible for reclamation once it goes idle. Returns
    /// false for unknown IDs.
    pub fn release_id(&mut self, id: ObjectId) -> bool {
        match self.registered.get_mut(&id) {
            Some(object) => {
                object.do_not_release = false;
                true
            }
            None => {
                log::warn!("release of unknown audio object {}", id);
                false
            }
        }
    }

    pub fn lookup_id(&self, id: ObjectId) -> Option<&AudioObject> {
        self.registered.get(&id)
    }

    fn register_native(&self, object: &AudioObject, name: Option<&str>) -> bool {
        let (Some(imp), Some(native)) = (&self.imp, object.native()) else {
            return true;
        };
        if imp
            .borrow_mut()
            .register_audio_object(native, name)
            .is_failure()
        {
            log::warn!("failed to register audio object {}", object.id());
            return false;
        }
        true
    }

    fn release_instance(&mut self, object: AudioObject) {
        self.ctx.diagnostics().remove_name(NameKind::Object, object.id().0);
        if let (Some(imp), Some(native)) = (&self.imp, object.native()) {
            imp.borrow_mut().unregister_audio_object(native);
        }
        self.recycle(object);
    }

    /// Resets an unregistered object and returns it to the pool, or deletes
    /// it when the pool is full or the ID came from outside.
    fn recycle(&mut self, mut object: AudioObject) {
        object.clear();
        if let (Some(imp), Some(native)) = (&self.imp, object.native()) {
            imp.borrow_mut().reset_audio_object(native);
        }

        let overflow = if object.external_id {
            Some(object)
        } else {
            self.pool.release(object).err()
        };
        if let Some(object) = overflow {
            self.destroy(object);
        }
    }

    fn destroy(&self, mut object: AudioObject) {
        if let (Some(imp), Some(native)) = (&self.imp, object.native.take()) {
            imp.borrow_mut().delete_audio_object(native);
        }
    }

    fn object_native(&self, object_id: ObjectId) -> Option<(SharedImpl, NativeHandle)> {
        let Some(object) = self.registered.get(&object_id) else {
            log::warn!("request for unknown audio object {}", object_id);
            return None;
        };
        let Some(imp) = self.imp.clone() else {
            log::warn!("request for audio object {} without middleware", object_id);
            return None;
        };
        let Some(native) = object.native() else {
            log::warn!("audio object {} has no native data", object_id);
            return None;
        };
        Some((imp, native))
    }

    // Reports

    /// A loading event has started playing.
    pub fn report_started_event(&mut self, event_id: EventId) -> bool {
        let Some(event) = self.events.lookup_id_mut(event_id) else {
            log::warn!("started report for unknown audio event {}", event_id);
            return false;
        };
        let Some(object) = self.registered.get_mut(&event.object_id) else {
            log::warn!(
                "started report for audio event {} of removed object {}",
                event_id,
                event.object_id
            );
            return false;
        };
        object.report_started_event(event);
        true
    }

    /// Forwards the end of an event to its owner and releases the event.
    /// A finished trigger instance is queued as a [`DeferredRequest`].
    pub fn report_finished_event(&mut self, event_id: EventId, success: bool) -> bool {
        let Some(event) = self.events.lookup_id(event_id) else {
            log::warn!("finished report for unknown audio event {}", event_id);
            return false;
        };
        if !success {
            log::debug!("audio event {} finished unsuccessfully", event_id);
        }

        let object_id = event.object_id;
        match self.registered.get_mut(&object_id) {
            Some(object) => {
                let events = &self.events;
                if let Some((instance_id, state)) =
                    object.report_finished_event(event, |id| events.lookup_id(id))
                {
                    self.deferred.push(DeferredRequest::FinishedTriggerInstance {
                        object_id,
                        trigger_id: state.trigger_id,
                        instance_id,
                        owner: state.owner,
                    });
                }
            }
            None => log::warn!(
                "finished report for audio event {} of removed object {}",
                event_id,
                object_id
            ),
        }

        self.events.release_event(event_id)
    }

    pub fn report_event_virtualized(&mut self, event_id: EventId, is_virtual: bool) -> bool {
        match self.events.lookup_id_mut(event_id) {
            Some(event) => {
                event.state = if is_virtual {
                    EventState::Virtual
                } else {
                    EventState::Playing
                };
                true
            }
            None => {
                log::warn!("virtualization report for unknown audio event {}", event_id);
                false
            }
        }
    }

    /// A file finished loading. A failed start ends the file right away.
    pub fn report_started_standalone_file(&mut self, file_id: StandaloneFileId, success: bool) -> bool {
        let Some(file) = self.standalone_files.lookup_id_mut(file_id) else {
            log::warn!("started report for unknown standalone file {}", file_id);
            return false;
        };
        if success {
            file.state = StandaloneFileState::Playing;
            true
        } else {
            self.report_finished_standalone_file(file_id);
            false
        }
    }

    pub fn report_finished_standalone_file(&mut self, file_id: StandaloneFileId) -> bool {
        let Some(file) = self.standalone_files.lookup_id(file_id) else {
            log::warn!("finished report for unknown standalone file {}", file_id);
            return false;
        };
        let object_id = file.object_id();
        match self.registered.get_mut(&object_id) {
            Some(object) => {
                object.remove_standalone_file(file_id);
            }
            None => log::warn!(
                "finished report for standalone file {} of removed object {}",
                file_id,
                object_id
            ),
        }
        self.standalone_files.release_standalone_file(file_id)
    }

    pub fn report_obstruction_ray(&mut self, ray: ProcessedRay) -> bool {
        match self.registered.get_mut(&ray.object_id) {
            Some(object) => {
                object.propagation_mut().report_ray(ray.ray_index, ray.hit);
                true
            }
            None => {
                log::warn!("obstruction ray for removed object {}", ray.object_id);
                false
            }
        }
    }

    /// Forgets every ray in flight, for when the ray caster goes away.
    pub fn release_pending_rays(&mut self) {
        for object in self.registered.values_mut() {
            object.propagation_mut().release_pending_rays();
        }
    }

    // Requests

    /// Starts one event per implementation of `trigger`.
    ///
    /// Returns the trigger instance ID if at least one event is playing or
    /// loading.
    pub fn execute_trigger(
        &mut self,
        object_id: ObjectId,
        trigger: &Trigger,
        owner: Option<SenderId>,
    ) -> Option<TriggerInstanceId> {
        let (imp, native) = self.object_native(object_id)?;
        let instance_id = TriggerInstanceId(self.trigger_instance_ids.next_id());
        let mut state = TriggerInstanceState::new(trigger.id, owner);
        let object = self.registered.get_mut(&object_id)?;

        for trigger_impl in &trigger.impls {
            let Some(event) = self.events.get_event(trigger_impl.payload.subsystem()) else {
                continue;
            };
            event.object_id = object_id;
            event.trigger_id = trigger.id;
            event.trigger_impl_id = trigger_impl.id;
            event.trigger_instance_id = instance_id;
            event.max_radius = trigger.max_radius;
            event.occlusion_fade_out_distance = trigger.occlusion_fade_out_distance;

            let status = match event.native() {
                Some(event_native) => imp.borrow_mut().execute_trigger(
                    native,
                    trigger_impl.payload.handle(),
                    event_native,
                ),
                None => RequestStatus::Failure,
            };

            match status {
                RequestStatus::Success => {
                    event.state = EventState::Playing;
                    state.num_playing_events += 1;
                    object.add_event(event);
                }
                RequestStatus::Pending => {
                    event.state = EventState::Loading;
                    state.num_loading_events += 1;
                    object.add_event(event);
                }
                RequestStatus::Failure => {
                    let event_id = event.id();
                    self.events.release_event(event_id);
                }
            }
        }

        if state.is_finished() {
            log::warn!(
                "trigger {} could not be executed on object {}",
                self.ctx.label(NameKind::Trigger, trigger.id.0),
                object_id
            );
            return None;
        }
        object.add_trigger_instance(instance_id, state);
        Some(instance_id)
    }

    /// Asks the middleware to stop every event `trigger_id` started on the
    /// object. The events end through their finished reports.
    pub fn stop_trigger(&mut self, object_id: ObjectId, trigger_id: ControlId) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };
        let Some(object) = self.registered.get(&object_id) else {
            return false;
        };

        let mut stopped = false;
        let mut middleware = imp.borrow_mut();
        for event in object
            .active_events()
            .filter_map(|id| self.events.lookup_id(id))
            .filter(|event| event.trigger_id() == trigger_id)
        {
            if let Some(event_native) = event.native() {
                stopped |= middleware.stop_event(native, event_native).is_success();
            }
        }
        stopped
    }

    pub fn stop_all_triggers(&mut self, object_id: ObjectId) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };
        imp.borrow_mut().stop_all_events(native).is_success()
    }

    /// Stores the transformation and forwards it if it moved far enough
    /// relative to the listener distance.
    pub fn set_transformation(
        &mut self,
        object_id: ObjectId,
        transformation: Transformation,
        listener_position: Vec3,
    ) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };
        let threshold = self.ctx.config().position_update_threshold;
        let now = self.elapsed;
        let Some(object) = self.registered.get_mut(&object_id) else {
            return false;
        };

        if object.set_transformation(transformation, listener_position, threshold, now) {
            imp.borrow_mut()
                .set_3d_attributes(native, object.attributes())
                .is_success()
        } else {
            true
        }
    }

    pub fn set_parameter(&mut self, object_id: ObjectId, parameter: &Parameter, value: f32) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };

        let mut success = false;
        {
            let mut middleware = imp.borrow_mut();
            for payload in &parameter.impls {
                success |= middleware
                    .set_parameter(native, payload.handle(), value)
                    .is_success();
            }
        }

        if let Some(object) = self.registered.get_mut(&object_id) {
            object.store_parameter(parameter.id, value);
        }
        success
    }

    /// Applies a switch state. Internal implementations are handled here;
    /// the obstruction/occlusion calculation switch selects the object's
    /// occlusion type.
    pub fn set_switch_state(&mut self, object_id: ObjectId, state: &SwitchState) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };
        let Some(object) = self.registered.get_mut(&object_id) else {
            return false;
        };

        let mut success = false;
        for payload in &state.impls {
            match payload {
                ImplPayload::Middleware(handle) => {
                    success |= imp
                        .borrow_mut()
                        .set_switch_state(native, *handle)
                        .is_success();
                }
                ImplPayload::Internal(internal) if internal.switch_id == occlusion_calc_switch_id() => {
                    match occlusion_type_for_state(internal.state_id) {
                        Some(occlusion_type) => {
                            object.propagation_mut().set_occlusion_type(occlusion_type);
                            success = true;
                        }
                        None => log::warn!(
                            "unknown obstruction/occlusion calculation state {}",
                            internal.state_id
                        ),
                    }
                }
                ImplPayload::Internal(internal) => {
                    log::warn!("no internal handler for switch {}", internal.switch_id);
                }
            }
        }

        object.store_switch_state(state.switch_id, state.id);
        success
    }

    pub fn set_environment(&mut self, object_id: ObjectId, environment: &Environment, amount: f32) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };

        let mut success = false;
        {
            let mut middleware = imp.borrow_mut();
            for payload in &environment.impls {
                success |= middleware
                    .set_environment(native, payload.handle(), amount)
                    .is_success();
            }
        }

        if let Some(object) = self.registered.get_mut(&object_id) {
            object.store_environment(environment.id, amount);
        }
        success
    }

    /// Starts playback of `path` on the object.
    pub fn play_file(
        &mut self,
        object_id: ObjectId,
        path: &str,
        owner: Option<SenderId>,
    ) -> Option<StandaloneFileId> {
        let (imp, native) = self.object_native(object_id)?;
        let file = self.standalone_files.get_standalone_file(object_id, path)?;
        file.owner = owner;
        let file_id = file.id();

        let status = match file.native() {
            Some(file_native) => imp.borrow_mut().play_file(native, file_native, path),
            None => RequestStatus::Failure,
        };
        match status {
            RequestStatus::Success => file.state = StandaloneFileState::Playing,
            RequestStatus::Pending => file.state = StandaloneFileState::Loading,
            RequestStatus::Failure => {
                log::warn!("failed to play {} on object {}", path, object_id);
                self.standalone_files.release_standalone_file(file_id);
                return None;
            }
        }

        self.ctx
            .diagnostics()
            .add_name(NameKind::StandaloneFile, file_id.0, path);
        if let Some(object) = self.registered.get_mut(&object_id) {
            object.add_standalone_file(file_id, owner);
        }
        Some(file_id)
    }

    /// Asks the middleware to stop `path` on the object. The file ends
    /// through its stopped report.
    pub fn stop_file(&mut self, object_id: ObjectId, path: &str) -> bool {
        let Some((imp, native)) = self.object_native(object_id) else {
            return false;
        };
        let file_id = StandaloneFileId::from_name(path);
        if !self
            .registered
            .get(&object_id)
            .is_some_and(|object| object.has_standalone_file(file_id))
        {
            log::warn!("{} is not playing on object {}", path, object_id);
            return false;
        }
        let Some(file) = self.standalone_files.lookup_id_mut(file_id) else {
            return false;
        };
        let Some(file_native) = file.native() else {
            return false;
        };

        if imp.borrow_mut().stop_file(native, file_native).is_failure() {
            return false;
        }
        file.state = StandaloneFileState::Stopping;
        true
    }

    /// Turning doppler tracking off resets the doppler parameter.
    pub fn set_doppler_tracking(&mut self, object_id: ObjectId, enable: bool) -> bool {
        let Some(object) = self.registered.get_mut(&object_id) else {
            log::warn!("request for unknown audio object {}", object_id);
            return false;
        };
        if object.tracks_doppler() && !enable {
            self.deferred.push(DeferredRequest::SetParameter {
                object_id,
                parameter_id: doppler_parameter_id(),
                value: 0.0,
            });
        }
        object.set_doppler_tracking(enable);
        true
    }

    /// Turning velocity tracking off resets the velocity parameter.
    pub fn set_velocity_tracking(&mut self, object_id: ObjectId, enable: bool) -> bool {
        let Some(object) = self.registered.get_mut(&object_id) else {
            log::warn!("request for unknown audio object {}", object_id);
            return false;
        };
        if object.tracks_velocity() && !enable {
            self.deferred.push(DeferredRequest::SetParameter {
                object_id,
                parameter_id: velocity_parameter_id(),
                value: 0.0,
            });
        }
        object.set_velocity_tracking(enable);
        true
    }

    pub fn take_deferred_requests(&mut self) -> Vec<DeferredRequest> {
        std::mem::take(&mut self.deferred)
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn standalone_files(&self) -> &StandaloneFileManager {
        &self.standalone_files
    }

    pub fn num_registered(&self) -> usize {
        self.registered.len()
    }

    pub fn num_pooled(&self) -> usize {
        self.pool.len()
    }

    pub fn registered_objects(&self) -> impl Iterator<Item = &AudioObject> {
        self.registered.values()
    }
}
