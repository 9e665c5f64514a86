//! Entry point of the audio translation layer.

use crate::catalog::{ControlCatalog, DataScope};
use crate::config::AtlConfig;
use crate::context::AtlContext;
use crate::diagnostics::NameKind;
use crate::error::{AtlError, Result};
use crate::file_cache::FileCache;
use crate::ids::{ControlId, EventId, ListenerId, ObjectId, StandaloneFileId, SwitchStateId, TriggerInstanceId};
use crate::listener::ListenerManager;
use crate::loader::ConfigLoader;
use crate::math::{Object3DAttributes, Transformation};
use crate::middleware::SharedImpl;
use crate::object_manager::{DeferredRequest, ObjectManager};
use crate::propagation::{NullRayCaster, ProcessedRay, RayCaster};
use crate::request::{
    RequestInfo, RequestResult, RequestType, SenderId, SpecificRequest, callback_request, listener_request,
    manager_request, object_request,
};
use crate::request_listener::{RequestCallback, RequestListenerManager};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use std::time::Duration;

/// Asynchronous notifications from the middleware and the ray caster.
///
/// Sent through [`AudioSystem::report_sender`] from anywhere; processed at the
/// start of the next [`AudioSystem::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImplReport {
    /// A loading event started playing
    EventStarted(EventId),
    EventFinished { event_id: EventId, success: bool },
    EventVirtualized(EventId),
    EventPhysicalized(EventId),
    StandaloneFileStarted { file_id: StandaloneFileId, success: bool },
    StandaloneFileStopped(StandaloneFileId),
    ObstructionRayProcessed(ProcessedRay),
}

/// File cache for setups that do not preload anything. Rejects every entry.
#[derive(Debug, Default)]
pub struct NullFileCache;

impl FileCache for NullFileCache {
    fn try_add_file_cache_entry(
        &mut self,
        _node: roxmltree::Node<'_, '_>,
        _scope: DataScope,
        _auto_load: bool,
    ) -> Option<crate::ids::FileEntryId> {
        None
    }

    fn try_remove_file_cache_entry(&mut self, _id: crate::ids::FileEntryId, _scope: DataScope) -> bool {
        false
    }
}

/// Owns the managers, the control catalog and the collaborators, and routes
/// requests between them.
///
/// # Example
///
/// ```ignore
/// let mut system = AudioSystem::new(AtlConfig::default())?;
/// system.init(middleware);
/// system.load_global("audio")?;
///
/// let object = system.reserve_object_id(Some("radio"))?;
/// system.execute_trigger(object, ControlId::from_name("play_radio"), None)?;
///
/// loop {
///     system.update(Duration::from_millis(16));
/// }
/// ```
pub struct AudioSystem {
    ctx: AtlContext,
    imp: Option<SharedImpl>,
    loader: ConfigLoader,
    objects: ObjectManager,
    listeners: ListenerManager,
    request_listeners: RequestListenerManager,
    file_cache: Box<dyn FileCache>,
    ray_caster: Box<dyn RayCaster>,
    report_sender: Sender<ImplReport>,
    report_receiver: Receiver<ImplReport>,
}

impl AudioSystem {
    /// Creates an audio system that is not connected to a middleware yet.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: AtlConfig) -> Result<Self> {
        Self::with_context(AtlContext::new(config))
    }

    pub fn with_context(ctx: AtlContext) -> Result<Self> {
        ctx.config().validate()?;
        let (report_sender, report_receiver) = crossbeam_channel::unbounded();

        Ok(Self {
            loader: ConfigLoader::new(ctx.clone()),
            objects: ObjectManager::new(ctx.clone()),
            listeners: ListenerManager::new(&ctx),
            request_listeners: RequestListenerManager::new(),
            file_cache: Box::new(NullFileCache),
            ray_caster: Box::new(NullRayCaster),
            ctx,
            imp: None,
            report_sender,
            report_receiver,
        })
    }

    pub fn with_file_cache(mut self, file_cache: Box<dyn FileCache>) -> Self {
        self.file_cache = file_cache;
        self
    }

    /// Replaces the ray caster. Rays queued with the previous one are
    /// forgotten.
    pub fn set_ray_caster(&mut self, ray_caster: Box<dyn RayCaster>) {
        self.objects.release_pending_rays();
        self.ray_caster = ray_caster;
    }

    /// Connects every manager to the middleware.
    pub fn init(&mut self, imp: SharedImpl) {
        if self.imp.is_some() {
            log::warn!("audio system is already initialized");
            return;
        }

        self.loader.init(imp.clone());
        self.objects.init(imp.clone());
        self.listeners.init(imp.clone());
        self.imp = Some(imp);
        log::info!("audio system initialized");
    }

    /// Releases every native resource and all loaded data. Reports still
    /// queued are dropped.
    pub fn release(&mut self) {
        if self.imp.take().is_none() {
            return;
        }

        self.objects.release();
        self.listeners.release();
        self.loader.clear_preloads_data(DataScope::All, self.file_cache.as_mut());
        self.loader.release();

        let dropped = self.report_receiver.try_iter().count();
        if dropped > 0 {
            log::debug!("dropped {} pending middleware reports", dropped);
        }
        log::info!("audio system released");
    }

    pub fn is_initialized(&self) -> bool {
        self.imp.is_some()
    }

    /// Channel end for the middleware and ray caster to report progress on.
    pub fn report_sender(&self) -> Sender<ImplReport> {
        self.report_sender.clone()
    }

    /// Processes pending reports, then updates listeners and objects.
    pub fn update(&mut self, delta_time: Duration) {
        if !self.is_initialized() {
            return;
        }

        while let Ok(report) = self.report_receiver.try_recv() {
            self.process_report(report);
        }

        self.listeners.update();
        let listener = self.listeners.default_listener_attributes();

        self.ray_caster.begin_frame();
        self.objects
            .update(delta_time, &listener, self.ray_caster.as_mut());
        self.ray_caster.end_frame();

        self.apply_deferred_requests();
    }

    fn process_report(&mut self, report: ImplReport) {
        log::trace!("processing {:?}", report);
        let info = match report {
            ImplReport::EventStarted(event_id) => {
                let info = self.event_info(callback_request::REPORT_STARTED_EVENT, event_id);
                let success = self.objects.report_started_event(event_id);
                info.result(success)
            }
            ImplReport::EventFinished { event_id, success } => {
                let info = self.event_info(callback_request::REPORT_FINISHED_EVENT, event_id);
                let known = self.objects.report_finished_event(event_id, success);
                info.result(known && success)
            }
            ImplReport::EventVirtualized(event_id) => {
                let info = self.event_info(callback_request::REPORT_VIRTUALIZED_EVENT, event_id);
                info.result(self.objects.report_event_virtualized(event_id, true))
            }
            ImplReport::EventPhysicalized(event_id) => {
                let info = self.event_info(callback_request::REPORT_PHYSICALIZED_EVENT, event_id);
                info.result(self.objects.report_event_virtualized(event_id, false))
            }
            ImplReport::StandaloneFileStarted { file_id, success } => {
                let info = self.file_info(callback_request::REPORT_STARTED_FILE, file_id);
                info.result(self.objects.report_started_standalone_file(file_id, success))
            }
            ImplReport::StandaloneFileStopped(file_id) => {
                let info = self.file_info(callback_request::REPORT_STOPPED_FILE, file_id);
                info.result(self.objects.report_finished_standalone_file(file_id))
            }
            ImplReport::ObstructionRayProcessed(ray) => {
                let info = RequestInfo::new(
                    RequestType::Callback,
                    callback_request::REPORT_PROCESSED_OBSTRUCTION_RAY,
                    RequestResult::Success,
                )
                .object(ray.object_id);
                info.result(self.objects.report_obstruction_ray(ray))
            }
        };
        self.request_listeners.notify_listener(&info);
    }

    /// Describes an event before its report is processed, while it can
    /// still be looked up.
    fn event_info(&self, specific: SpecificRequest, event_id: EventId) -> RequestInfo {
        let mut info = RequestInfo::new(RequestType::Callback, specific, RequestResult::Success).event(event_id);
        if let Some(event) = self.objects.events().lookup_id(event_id) {
            let owner = self
                .objects
                .lookup_id(event.object_id())
                .and_then(|object| object.trigger_state(event.trigger_instance_id()))
                .and_then(|state| state.owner);
            info = info
                .object(event.object_id())
                .control(event.trigger_id())
                .sender(owner);
        }
        info
    }

    fn file_info(&self, specific: SpecificRequest, file_id: StandaloneFileId) -> RequestInfo {
        let mut info =
            RequestInfo::new(RequestType::Callback, specific, RequestResult::Success).standalone_file(file_id);
        if let Some(file) = self.objects.standalone_files().lookup_id(file_id) {
            info = info
                .object(file.object_id())
                .sender(file.owner())
                .value(file.path());
        }
        info
    }

    fn apply_deferred_requests(&mut self) {
        for request in self.objects.take_deferred_requests() {
            match request {
                DeferredRequest::SetParameter {
                    object_id,
                    parameter_id,
                    value,
                } => match self.loader.catalog().parameter(parameter_id) {
                    Some(parameter) => {
                        self.objects.set_parameter(object_id, parameter, value);
                    }
                    None => log::trace!("parameter {} is not defined", parameter_id),
                },
                DeferredRequest::FinishedTriggerInstance {
                    object_id,
                    trigger_id,
                    instance_id,
                    owner,
                } => {
                    log::debug!("trigger instance {} finished on object {}", instance_id, object_id);
                    let info = RequestInfo::new(
                        RequestType::Callback,
                        callback_request::REPORT_FINISHED_TRIGGER_INSTANCE,
                        RequestResult::Success,
                    )
                    .sender(owner)
                    .object(object_id)
                    .control(trigger_id);
                    self.request_listeners.notify_listener(&info);
                }
            }
        }
    }

    /// Notifies request listeners about the outcome and passes it on.
    fn conclude<T>(&self, info: RequestInfo, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            log::debug!("request {:?}/{} failed: {}", info.request_type, info.specific_request, e);
        }
        self.request_listeners
            .notify_listener(&info.result(outcome.is_ok()));
        outcome
    }

    fn object_info(specific: SpecificRequest, object_id: ObjectId, sender: Option<SenderId>) -> RequestInfo {
        RequestInfo::new(RequestType::Object, specific, RequestResult::Success)
            .object(object_id)
            .sender(sender)
    }

    /// Explains why a request on `object_id` failed.
    fn failure(&self, object_id: ObjectId, what: &str) -> AtlError {
        if !self.is_initialized() {
            AtlError::NotInitialized(format!("cannot {} without middleware", what))
        } else if self.objects.lookup_id(object_id).is_none() {
            AtlError::NotFound(format!("audio object {}", object_id))
        } else {
            AtlError::Middleware(format!("failed to {} on audio object {}", what, object_id))
        }
    }

    fn check(&self, object_id: ObjectId, success: bool, what: &str) -> Result<()> {
        if success {
            Ok(())
        } else {
            Err(self.failure(object_id, what))
        }
    }

    fn unknown(&self, kind: NameKind, id: u32) -> AtlError {
        AtlError::NotFound(format!("{:?} {}", kind, self.ctx.label(kind, id)))
    }

    // Configuration data

    /// Parses controls from every document in `folder`. See
    /// [`ConfigLoader::parse_controls_data`].
    pub fn parse_controls_data(&mut self, folder: impl AsRef<Path>, scope: DataScope) -> Result<usize> {
        let folder = folder.as_ref();
        let outcome = self.loader.parse_controls_data(folder, scope);
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::PARSE_CONTROLS_DATA,
            RequestResult::Success,
        )
        .value(folder.display().to_string());
        self.conclude(info, outcome)
    }

    pub fn parse_preloads_data(&mut self, folder: impl AsRef<Path>, scope: DataScope) -> Result<usize> {
        let folder = folder.as_ref();
        let outcome = self
            .loader
            .parse_preloads_data(folder, scope, self.file_cache.as_mut());
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::PARSE_PRELOADS_DATA,
            RequestResult::Success,
        )
        .value(folder.display().to_string());
        self.conclude(info, outcome)
    }

    pub fn clear_controls_data(&mut self, scope: DataScope) {
        self.loader.clear_controls_data(scope);
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::CLEAR_CONTROLS_DATA,
            RequestResult::Success,
        );
        self.request_listeners.notify_listener(&info);
    }

    pub fn clear_preloads_data(&mut self, scope: DataScope) {
        self.loader
            .clear_preloads_data(scope, self.file_cache.as_mut());
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::CLEAR_PRELOADS_DATA,
            RequestResult::Success,
        );
        self.request_listeners.notify_listener(&info);
    }

    /// Loads the global controls and preloads found directly in `root`.
    pub fn load_global(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        self.parse_controls_data(root, DataScope::Global)?;
        self.parse_preloads_data(root, DataScope::Global)?;
        Ok(())
    }

    /// Replaces the level-specific data with the one of `root/levels/<level>`.
    pub fn load_level(&mut self, root: impl AsRef<Path>, level: &str) -> Result<()> {
        let folder = root.as_ref().join("levels").join(level);
        self.unload_level();
        self.parse_controls_data(&folder, DataScope::LevelSpecific)?;
        self.parse_preloads_data(&folder, DataScope::LevelSpecific)?;
        log::info!("loaded audio data for level {}", level);
        Ok(())
    }

    pub fn unload_level(&mut self) {
        self.clear_controls_data(DataScope::LevelSpecific);
        self.clear_preloads_data(DataScope::LevelSpecific);
    }

    // Objects

    pub fn reserve_object_id(&mut self, name: Option<&str>) -> Result<ObjectId> {
        let outcome = self
            .objects
            .reserve_id(name)
            .ok_or_else(|| AtlError::Middleware("no audio object could be reserved".to_string()));
        let mut info = RequestInfo::new(
            RequestType::Manager,
            manager_request::RESERVE_OBJECT_ID,
            RequestResult::Success,
        );
        if let Ok(id) = &outcome {
            info = info.object(*id);
        }
        self.conclude(info, outcome)
    }

    pub fn reserve_this_object_id(&mut self, id: ObjectId, name: Option<&str>) -> Result<()> {
        let outcome = if self.objects.reserve_this_id(id, name) {
            Ok(())
        } else {
            Err(AtlError::Middleware(format!("audio object {} could not be reserved", id)))
        };
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::RESERVE_OBJECT_ID,
            RequestResult::Success,
        )
        .object(id);
        self.conclude(info, outcome)
    }

    /// Lets the object be reclaimed once it is idle.
    pub fn release_object_id(&mut self, id: ObjectId) -> Result<()> {
        let outcome = if self.objects.release_id(id) {
            Ok(())
        } else {
            Err(AtlError::NotFound(format!("audio object {}", id)))
        };
        let info = RequestInfo::new(
            RequestType::Manager,
            manager_request::RELEASE_OBJECT_ID,
            RequestResult::Success,
        )
        .object(id);
        self.conclude(info, outcome)
    }

    pub fn execute_trigger(
        &mut self,
        object_id: ObjectId,
        trigger_id: ControlId,
        sender: Option<SenderId>,
    ) -> Result<TriggerInstanceId> {
        let outcome = match self.loader.catalog().trigger(trigger_id) {
            Some(trigger) => match self.objects.execute_trigger(object_id, trigger, sender) {
                Some(instance_id) => Ok(instance_id),
                None => Err(self.failure(object_id, "execute trigger")),
            },
            None => Err(self.unknown(NameKind::Trigger, trigger_id.0)),
        };
        let info = Self::object_info(object_request::EXECUTE_TRIGGER, object_id, sender).control(trigger_id);
        self.conclude(info, outcome)
    }

    pub fn stop_trigger(&mut self, object_id: ObjectId, trigger_id: ControlId, sender: Option<SenderId>) -> Result<()> {
        let success = self.objects.stop_trigger(object_id, trigger_id);
        let outcome = self.check(object_id, success, "stop trigger");
        let info = Self::object_info(object_request::STOP_TRIGGER, object_id, sender).control(trigger_id);
        self.conclude(info, outcome)
    }

    pub fn stop_all_triggers(&mut self, object_id: ObjectId, sender: Option<SenderId>) -> Result<()> {
        let success = self.objects.stop_all_triggers(object_id);
        let outcome = self.check(object_id, success, "stop all triggers");
        let info = Self::object_info(object_request::STOP_ALL_TRIGGERS, object_id, sender);
        self.conclude(info, outcome)
    }

    pub fn set_transformation(
        &mut self,
        object_id: ObjectId,
        transformation: Transformation,
        sender: Option<SenderId>,
    ) -> Result<()> {
        let listener_position = self.listeners.default_listener_attributes().position();
        let success = self
            .objects
            .set_transformation(object_id, transformation, listener_position);
        let outcome = self.check(object_id, success, "set transformation");
        let info = Self::object_info(object_request::SET_TRANSFORMATION, object_id, sender);
        self.conclude(info, outcome)
    }

    pub fn set_parameter(
        &mut self,
        object_id: ObjectId,
        parameter_id: ControlId,
        value: f32,
        sender: Option<SenderId>,
    ) -> Result<()> {
        let outcome = match self.loader.catalog().parameter(parameter_id) {
            Some(parameter) => {
                let success = self.objects.set_parameter(object_id, parameter, value);
                self.check(object_id, success, "set parameter")
            }
            None => Err(self.unknown(NameKind::Parameter, parameter_id.0)),
        };
        let info = Self::object_info(object_request::SET_PARAMETER, object_id, sender)
            .control(parameter_id)
            .value(value.to_string());
        self.conclude(info, outcome)
    }

    pub fn set_switch_state(
        &mut self,
        object_id: ObjectId,
        switch_id: ControlId,
        state_id: SwitchStateId,
        sender: Option<SenderId>,
    ) -> Result<()> {
        let outcome = match self.loader.catalog().switch_state(switch_id, state_id) {
            Some(state) => {
                let success = self.objects.set_switch_state(object_id, state);
                self.check(object_id, success, "set switch state")
            }
            None => Err(self.unknown(NameKind::SwitchState, state_id.0)),
        };
        let info = Self::object_info(object_request::SET_SWITCH_STATE, object_id, sender)
            .control(switch_id)
            .value(state_id.0.to_string());
        self.conclude(info, outcome)
    }

    pub fn set_environment(
        &mut self,
        object_id: ObjectId,
        environment_id: ControlId,
        amount: f32,
        sender: Option<SenderId>,
    ) -> Result<()> {
        let outcome = match self.loader.catalog().environment(environment_id) {
            Some(environment) => {
                let success = self.objects.set_environment(object_id, environment, amount);
                self.check(object_id, success, "set environment")
            }
            None => Err(self.unknown(NameKind::Environment, environment_id.0)),
        };
        let info = Self::object_info(object_request::SET_ENVIRONMENT, object_id, sender)
            .control(environment_id)
            .value(amount.to_string());
        self.conclude(info, outcome)
    }

    /// Sets every environment active on the object back to zero.
    pub fn reset_environments(&mut self, object_id: ObjectId, sender: Option<SenderId>) -> Result<()> {
        let outcome = match self.objects.lookup_id(object_id) {
            Some(object) => {
                let active: Vec<ControlId> = object.environments().collect();
                for environment_id in active {
                    if let Some(environment) = self.loader.catalog().environment(environment_id) {
                        self.objects.set_environment(object_id, environment, 0.0);
                    }
                }
                Ok(())
            }
            None => Err(AtlError::NotFound(format!("audio object {}", object_id))),
        };
        let info = Self::object_info(object_request::RESET_ENVIRONMENTS, object_id, sender);
        self.conclude(info, outcome)
    }

    pub fn play_file(&mut self, object_id: ObjectId, path: &str, sender: Option<SenderId>) -> Result<StandaloneFileId> {
        let outcome = match self.objects.play_file(object_id, path, sender) {
            Some(file_id) => Ok(file_id),
            None => Err(self.failure(object_id, "play file")),
        };
        let info = Self::object_info(object_request::PLAY_FILE, object_id, sender)
            .standalone_file(StandaloneFileId::from_name(path))
            .value(path);
        self.conclude(info, outcome)
    }

    pub fn stop_file(&mut self, object_id: ObjectId, path: &str, sender: Option<SenderId>) -> Result<()> {
        let success = self.objects.stop_file(object_id, path);
        let outcome = self.check(object_id, success, "stop file");
        let info = Self::object_info(object_request::STOP_FILE, object_id, sender)
            .standalone_file(StandaloneFileId::from_name(path))
            .value(path);
        self.conclude(info, outcome)
    }

    pub fn set_doppler_tracking(&mut self, object_id: ObjectId, enable: bool) -> Result<()> {
        let success = self.objects.set_doppler_tracking(object_id, enable);
        self.apply_deferred_requests();
        self.check(object_id, success, "set doppler tracking")
    }

    pub fn set_velocity_tracking(&mut self, object_id: ObjectId, enable: bool) -> Result<()> {
        let success = self.objects.set_velocity_tracking(object_id, enable);
        self.apply_deferred_requests();
        self.check(object_id, success, "set velocity tracking")
    }

    // Listeners

    pub fn reserve_listener_id(&mut self) -> Result<ListenerId> {
        self.listeners
            .reserve_id()
            .ok_or_else(|| AtlError::NotFound("no free listener".to_string()))
    }

    pub fn release_listener_id(&mut self, id: ListenerId) -> Result<()> {
        if self.listeners.release_id(id) {
            Ok(())
        } else {
            Err(AtlError::NotFound(format!("listener {}", id)))
        }
    }

    pub fn set_listener_attributes(
        &mut self,
        id: ListenerId,
        attributes: Object3DAttributes,
        sender: Option<SenderId>,
    ) -> Result<()> {
        let outcome = if self.listeners.set_3d_attributes(id, attributes) {
            Ok(())
        } else {
            Err(AtlError::NotFound(format!("listener {}", id)))
        };
        let info = RequestInfo::new(
            RequestType::Listener,
            listener_request::SET_TRANSFORMATION,
            RequestResult::Success,
        )
        .sender(sender);
        self.conclude(info, outcome)
    }

    // Request listeners

    pub fn add_request_listener(
        &mut self,
        callback: RequestCallback,
        sender: Option<SenderId>,
        request_type: RequestType,
        specific_mask: SpecificRequest,
    ) -> bool {
        self.request_listeners
            .add_request_listener(callback, sender, request_type, specific_mask)
    }

    pub fn remove_request_listener(&mut self, callback: Option<&RequestCallback>, sender: Option<SenderId>) -> bool {
        self.request_listeners.remove_request_listener(callback, sender)
    }

    // Accessors

    pub fn context(&self) -> &AtlContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &ControlCatalog {
        self.loader.catalog()
    }

    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    pub fn listeners(&self) -> &ListenerManager {
        &self.listeners
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.release();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{doppler_parameter_id, DOPPLER_PARAMETER_NAME};
    use crate::math::Vec3;
    use crate::middleware::RequestStatus;
    use crate::testing::{MockImpl, RecordingFileCache, init_logger};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const FRAME: Duration = Duration::from_millis(16);

    const GLOBAL_CONTROLS: &str = r#"<ATLConfig>
  <AudioTriggers>
    <ATLTrigger atl_name="play_radio"><MockEvent name="radio" radius="30"/></ATLTrigger>
    <ATLTrigger atl_name="play_engine">
      <MockEvent name="engine_low"/>
      <MockEvent name="engine_high"/>
    </ATLTrigger>
  </AudioTriggers>
  <AudioRtpcs>
    <ATLRtpc atl_name="object_doppler"><MockParameter name="doppler"/></ATLRtpc>
    <ATLRtpc atl_name="rpm"><MockParameter name="rpm"/></ATLRtpc>
  </AudioRtpcs>
  <AudioSwitches>
    <ATLSwitch atl_name="surface">
      <ATLSwitchState atl_name="grass"><MockState name="grass"/></ATLSwitchState>
    </ATLSwitch>
  </AudioSwitches>
  <AudioEnvironments>
    <ATLEnvironment atl_name="cave"><MockBus name="cave"/></ATLEnvironment>
  </AudioEnvironments>
</ATLConfig>"#;

    const FOREST_CONTROLS: &str = r#"<ATLConfig>
  <AudioTriggers>
    <ATLTrigger atl_name="forest_birds"><MockEvent name="birds"/></ATLTrigger>
  </AudioTriggers>
  <AudioPreloads>
    <ATLPreloadRequest atl_type="AutoLoad">
      <ATLPlatforms><Platform atl_name="pc" atl_config_group_name="all"/></ATLPlatforms>
      <ATLConfigGroup atl_name="all"><File path="forest.bnk"/></ATLConfigGroup>
    </ATLPreloadRequest>
  </AudioPreloads>
</ATLConfig>"#;

    const DESERT_CONTROLS: &str = r#"<ATLConfig>
  <AudioTriggers>
    <ATLTrigger atl_name="desert_wind"><MockEvent name="wind"/></ATLTrigger>
  </AudioTriggers>
</ATLConfig>"#;

    struct Fixture {
        system: AudioSystem,
        mock: Rc<RefCell<MockImpl>>,
        root: TempDir,
    }

    fn fixture() -> Fixture {
        init_logger();
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::write(root.path().join("global.xml"), GLOBAL_CONTROLS).expect("write");
        for (level, content) in [("forest", FOREST_CONTROLS), ("desert", DESERT_CONTROLS)] {
            let folder = root.path().join("levels").join(level);
            std::fs::create_dir_all(&folder).expect("level dir");
            std::fs::write(folder.join("level.xml"), content).expect("write");
        }

        let config = AtlConfig::new()
            .object_pool_size(4)
            .event_pool_size(8)
            .num_listeners(2);
        let mut system = AudioSystem::new(config)
            .expect("valid config")
            .with_file_cache(Box::new(RecordingFileCache::default()));
        let (mock, imp) = MockImpl::shared();
        system.init(imp);
        system.load_global(root.path()).expect("global data");

        Fixture { system, mock, root }
    }

    fn recorder(system: &mut AudioSystem, request_type: RequestType) -> Rc<RefCell<Vec<RequestInfo>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let callback: RequestCallback = Rc::new(move |info: &RequestInfo| sink.borrow_mut().push(info.clone()));
        system.add_request_listener(callback, None, request_type, crate::request::ALL_SPECIFIC_REQUESTS);
        seen
    }

    fn trigger(name: &str) -> ControlId {
        ControlId::from_name(name)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            AudioSystem::new(AtlConfig::new().num_listeners(0)),
            Err(AtlError::Configuration(_))
        ));
    }

    #[test]
    fn test_global_data_is_loaded() {
        let f = fixture();
        let catalog = f.system.catalog();
        assert_eq!(catalog.num_triggers(), 2);
        assert_eq!(catalog.num_parameters(), 2);
        assert_eq!(catalog.num_switches(), 1);
        assert_eq!(catalog.num_environments(), 1);
        assert!(f.root.path().exists());
    }

    #[test]
    fn test_execute_trigger_round_trip() {
        let mut f = fixture();
        let callbacks = recorder(&mut f.system, RequestType::Callback);
        let objects = recorder(&mut f.system, RequestType::Object);

        let object = f.system.reserve_object_id(Some("radio")).expect("object");
        f.system
            .execute_trigger(object, trigger("play_engine"), Some(SenderId(42)))
            .expect("executed");
        assert_eq!(objects.borrow().len(), 1);
        assert_eq!(objects.borrow()[0].result, RequestResult::Success);
        assert_eq!(objects.borrow()[0].control_id, trigger("play_engine"));

        let events: Vec<EventId> = f
            .system
            .objects()
            .lookup_id(object)
            .expect("object")
            .active_events()
            .collect();
        assert_eq!(events.len(), 2);

        let sender = f.system.report_sender();
        for event_id in &events {
            sender
                .send(ImplReport::EventFinished {
                    event_id: *event_id,
                    success: true,
                })
                .expect("send");
        }
        f.system.update(FRAME);

        let seen = callbacks.borrow();
        let finished_events = seen
            .iter()
            .filter(|i| i.specific_request == callback_request::REPORT_FINISHED_EVENT)
            .count();
        assert_eq!(finished_events, 2);
        let instance = seen
            .iter()
            .find(|i| i.specific_request == callback_request::REPORT_FINISHED_TRIGGER_INSTANCE)
            .expect("trigger instance finished");
        assert_eq!(instance.sender, Some(SenderId(42)));
        assert_eq!(instance.object_id, object);
        assert_eq!(instance.control_id, trigger("play_engine"));
        assert!(seen.iter().all(|i| i.sender == Some(SenderId(42))));
    }

    #[test]
    fn test_unknown_controls_fail_and_notify() {
        let mut f = fixture();
        let objects = recorder(&mut f.system, RequestType::Object);
        let object = f.system.reserve_object_id(None).expect("object");

        assert!(matches!(
            f.system.execute_trigger(object, trigger("missing"), None),
            Err(AtlError::NotFound(_))
        ));
        assert!(matches!(
            f.system.set_parameter(ObjectId(9999), ControlId::from_name("rpm"), 1.0, None),
            Err(AtlError::NotFound(_))
        ));
        assert!(
            objects
                .borrow()
                .iter()
                .all(|info| info.result == RequestResult::Failure)
        );
        assert_eq!(objects.borrow().len(), 2);
    }

    #[test]
    fn test_middleware_failure_is_reported() {
        let mut f = fixture();
        let object = f.system.reserve_object_id(None).expect("object");
        f.mock.borrow_mut().execute_status = RequestStatus::Failure;
        assert!(matches!(
            f.system.execute_trigger(object, trigger("play_radio"), None),
            Err(AtlError::Middleware(_))
        ));
    }

    #[test]
    fn test_requests_before_init() {
        init_logger();
        let mut system = AudioSystem::new(AtlConfig::default()).expect("system");
        let object = system.reserve_object_id(None).expect("object");
        assert!(matches!(
            system.set_transformation(object, Transformation::identity(), None),
            Err(AtlError::NotInitialized(_))
        ));
        assert!(matches!(
            system.parse_controls_data("does-not-matter", DataScope::Global),
            Err(AtlError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_released_object_is_reclaimed() {
        let mut f = fixture();
        let object = f.system.reserve_object_id(None).expect("object");
        f.system.update(FRAME);
        assert!(f.system.objects().lookup_id(object).is_some());

        f.system.release_object_id(object).expect("released");
        f.system.update(FRAME);
        assert!(f.system.objects().lookup_id(object).is_none());
        assert!(matches!(
            f.system.release_object_id(object),
            Err(AtlError::NotFound(_))
        ));
    }

    #[test]
    fn test_level_swap() {
        let mut f = fixture();
        let root = f.root.path().to_path_buf();

        f.system.load_level(&root, "forest").expect("forest");
        assert!(f.system.catalog().trigger(trigger("forest_birds")).is_some());
        assert_eq!(f.system.catalog().num_preload_requests(), 1);

        f.system.load_level(&root, "desert").expect("desert");
        assert!(f.system.catalog().trigger(trigger("forest_birds")).is_none());
        assert!(f.system.catalog().trigger(trigger("desert_wind")).is_some());
        assert_eq!(f.system.catalog().num_preload_requests(), 0);

        f.system.unload_level();
        assert!(f.system.catalog().trigger(trigger("desert_wind")).is_none());
        assert_eq!(f.system.catalog().num_triggers(), 2);
    }

    #[test]
    fn test_doppler_parameter_applied_after_interval() {
        let mut f = fixture();
        let object = f.system.reserve_object_id(None).expect("object");
        f.system
            .set_transformation(object, Transformation::from_position(Vec3::new(20.0, 0.0, 0.0)), None)
            .expect("moved");
        f.system.set_doppler_tracking(object, true).expect("tracking");

        for _ in 0..7 {
            f.system.update(FRAME);
        }
        assert_eq!(
            f.system
                .objects()
                .lookup_id(object)
                .and_then(|o| o.parameter(doppler_parameter_id())),
            Some(0.0)
        );
        assert_eq!(doppler_parameter_id(), ControlId::from_name(DOPPLER_PARAMETER_NAME));
        assert_eq!(f.mock.borrow().parameters.len(), 1);
    }

    #[test]
    fn test_standalone_file_reports() {
        let mut f = fixture();
        let callbacks = recorder(&mut f.system, RequestType::Callback);
        let object = f.system.reserve_object_id(None).expect("object");
        f.mock.borrow_mut().play_file_status = RequestStatus::Pending;

        let file_id = f
            .system
            .play_file(object, "vo/intro.ogg", Some(SenderId(5)))
            .expect("file");
        let sender = f.system.report_sender();
        sender
            .send(ImplReport::StandaloneFileStarted { file_id, success: true })
            .expect("send");
        f.system.update(FRAME);
        f.system.stop_file(object, "vo/intro.ogg", None).expect("stop");
        sender.send(ImplReport::StandaloneFileStopped(file_id)).expect("send");
        f.system.update(FRAME);

        let seen = callbacks.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].specific_request, callback_request::REPORT_STARTED_FILE);
        assert_eq!(seen[1].specific_request, callback_request::REPORT_STOPPED_FILE);
        assert_eq!(seen[1].sender, Some(SenderId(5)));
        assert_eq!(seen[1].value.as_deref(), Some("vo/intro.ogg"));
        assert!(f.system.objects().standalone_files().lookup_id(file_id).is_none());
    }

    #[test]
    fn test_switches_and_environments() {
        let mut f = fixture();
        let object = f.system.reserve_object_id(None).expect("object");
        let surface = ControlId::from_name("surface");
        let grass = SwitchStateId::from_name("grass");
        let cave = ControlId::from_name("cave");

        f.system.set_switch_state(object, surface, grass, None).expect("switch");
        f.system.set_environment(object, cave, 0.8, None).expect("environment");
        let state = f.system.objects().lookup_id(object).and_then(|o| o.switch_state(surface));
        assert_eq!(state, Some(grass));

        f.system.reset_environments(object, None).expect("reset");
        assert_eq!(
            f.system.objects().lookup_id(object).map(|o| o.environments().count()),
            Some(0)
        );
        let amounts: Vec<f32> = f.mock.borrow().environments.iter().map(|(_, _, a)| *a).collect();
        assert_eq!(amounts, vec![0.8, 0.0]);
    }

    #[test]
    fn test_listener_attributes_forwarded() {
        let mut f = fixture();
        let default_listener = f.system.listeners().default_listener_id();
        let attributes =
            Object3DAttributes::new(Transformation::from_position(Vec3::new(0.0, 2.0, 0.0)), Vec3::ZERO);
        f.system
            .set_listener_attributes(default_listener, attributes, None)
            .expect("listener");
        f.system.update(FRAME);
        assert_eq!(f.mock.borrow().listener_attributes.len(), 1);

        let extra = f.system.reserve_listener_id().expect("extra listener");
        assert!(f.system.reserve_listener_id().is_err());
        f.system.release_listener_id(extra).expect("released");
    }

    #[test]
    fn test_release_frees_all_native_data() {
        let mut f = fixture();
        let object = f.system.reserve_object_id(None).expect("object");
        f.system
            .execute_trigger(object, trigger("play_radio"), None)
            .expect("executed");
        f.system.release();
        assert!(!f.system.is_initialized());
        assert_eq!(f.mock.borrow().live_handles(), 0);
        assert!(f.system.catalog().is_empty());
    }
}
