//! Recording test doubles for the middleware, file cache and ray caster.

use crate::catalog::DataScope;
use crate::file_cache::FileCache;
use crate::ids::{EventId, FileEntryId, ListenerId, ObjectId};
use crate::math::Object3DAttributes;
use crate::middleware::{AudioImpl, NativeHandle, RequestStatus, SharedImpl, TriggerInfo};
use crate::propagation::{RayCaster, RayRequest};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct MockImpl {
    next_handle: u64,
    live: HashSet<NativeHandle>,
    calls: HashMap<&'static str, usize>,
    pub registered: HashSet<NativeHandle>,
    pub fail_new_objects: bool,
    pub fail_register: bool,
    pub fail_new_events: bool,
    pub execute_status: RequestStatus,
    pub play_file_status: RequestStatus,
    pub stop_file_status: RequestStatus,
    pub parameters: Vec<(NativeHandle, NativeHandle, f32)>,
    pub switch_states: Vec<(NativeHandle, NativeHandle)>,
    pub environments: Vec<(NativeHandle, NativeHandle, f32)>,
    pub obstruction: Vec<(NativeHandle, f32, f32)>,
    pub attributes: Vec<(NativeHandle, Object3DAttributes)>,
    pub listener_attributes: Vec<(NativeHandle, Object3DAttributes)>,
}

impl MockImpl {
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            live: HashSet::new(),
            calls: HashMap::new(),
            registered: HashSet::new(),
            fail_new_objects: false,
            fail_register: false,
            fail_new_events: false,
            execute_status: RequestStatus::Success,
            play_file_status: RequestStatus::Success,
            stop_file_status: RequestStatus::Success,
            parameters: Vec::new(),
            switch_states: Vec::new(),
            environments: Vec::new(),
            obstruction: Vec::new(),
            attributes: Vec::new(),
            listener_attributes: Vec::new(),
        }
    }

    /// Returns the concrete mock for inspection plus the same instance as the
    /// shared middleware handle the managers take.
    pub fn shared() -> (Rc<RefCell<MockImpl>>, SharedImpl) {
        let mock = Rc::new(RefCell::new(MockImpl::new()));
        let imp: SharedImpl = mock.clone();
        (mock, imp)
    }

    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.live.contains(&handle)
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.get(name).copied().unwrap_or(0)
    }

    fn record(&mut self, name: &'static str) {
        *self.calls.entry(name).or_insert(0) += 1;
    }

    fn mint(&mut self, name: &'static str) -> Option<NativeHandle> {
        self.record(name);
        self.next_handle += 1;
        let handle = NativeHandle::new(self.next_handle)?;
        self.live.insert(handle);
        Some(handle)
    }

    fn free(&mut self, name: &'static str, handle: NativeHandle) {
        self.record(name);
        assert!(self.live.remove(&handle), "{} on dead handle {}", name, handle);
    }

    fn mint_from_node(&mut self, name: &'static str, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle> {
        if node.attribute("fail") == Some("true") {
            self.record(name);
            return None;
        }
        self.mint(name)
    }
}

impl AudioImpl for MockImpl {
    fn new_audio_object(&mut self, _id: ObjectId) -> Option<NativeHandle> {
        if self.fail_new_objects {
            self.record("new_audio_object");
            return None;
        }
        self.mint("new_audio_object")
    }

    fn reset_audio_object(&mut self, _object: NativeHandle) -> RequestStatus {
        self.record("reset_audio_object");
        RequestStatus::Success
    }

    fn delete_audio_object(&mut self, object: NativeHandle) {
        self.free("delete_audio_object", object);
    }

    fn register_audio_object(&mut self, object: NativeHandle, _name: Option<&str>) -> RequestStatus {
        self.record("register_audio_object");
        if self.fail_register {
            return RequestStatus::Failure;
        }
        self.registered.insert(object);
        RequestStatus::Success
    }

    fn unregister_audio_object(&mut self, object: NativeHandle) -> RequestStatus {
        self.record("unregister_audio_object");
        self.registered.remove(&object);
        RequestStatus::Success
    }

    fn update_audio_object(&mut self, _object: NativeHandle) -> RequestStatus {
        self.record("update_audio_object");
        RequestStatus::Success
    }

    fn set_3d_attributes(&mut self, object: NativeHandle, attributes: &Object3DAttributes) -> RequestStatus {
        self.record("set_3d_attributes");
        self.attributes.push((object, *attributes));
        RequestStatus::Success
    }

    fn set_obstruction_occlusion(&mut self, object: NativeHandle, obstruction: f32, occlusion: f32) -> RequestStatus {
        self.record("set_obstruction_occlusion");
        self.obstruction.push((object, obstruction, occlusion));
        RequestStatus::Success
    }

    fn execute_trigger(&mut self, _object: NativeHandle, _trigger: NativeHandle, _event: NativeHandle) -> RequestStatus {
        self.record("execute_trigger");
        self.execute_status
    }

    fn stop_event(&mut self, _object: NativeHandle, _event: NativeHandle) -> RequestStatus {
        self.record("stop_event");
        RequestStatus::Success
    }

    fn stop_all_events(&mut self, _object: NativeHandle) -> RequestStatus {
        self.record("stop_all_events");
        RequestStatus::Success
    }

    fn set_parameter(&mut self, object: NativeHandle, parameter: NativeHandle, value: f32) -> RequestStatus {
        self.record("set_parameter");
        self.parameters.push((object, parameter, value));
        RequestStatus::Success
    }

    fn set_switch_state(&mut self, object: NativeHandle, state: NativeHandle) -> RequestStatus {
        self.record("set_switch_state");
        self.switch_states.push((object, state));
        RequestStatus::Success
    }

    fn set_environment(&mut self, object: NativeHandle, environment: NativeHandle, amount: f32) -> RequestStatus {
        self.record("set_environment");
        self.environments.push((object, environment, amount));
        RequestStatus::Success
    }

    fn play_file(&mut self, _object: NativeHandle, _file: NativeHandle, _path: &str) -> RequestStatus {
        self.record("play_file");
        self.play_file_status
    }

    fn stop_file(&mut self, _object: NativeHandle, _file: NativeHandle) -> RequestStatus {
        self.record("stop_file");
        self.stop_file_status
    }

    fn new_audio_event(&mut self, _id: EventId) -> Option<NativeHandle> {
        if self.fail_new_events {
            self.record("new_audio_event");
            return None;
        }
        self.mint("new_audio_event")
    }

    fn reset_audio_event(&mut self, _event: NativeHandle) {
        self.record("reset_audio_event");
    }

    fn delete_audio_event(&mut self, event: NativeHandle) {
        self.free("delete_audio_event", event);
    }

    fn new_audio_standalone_file(&mut self) -> Option<NativeHandle> {
        self.mint("new_audio_standalone_file")
    }

    fn reset_audio_standalone_file(&mut self, _file: NativeHandle) {
        self.record("reset_audio_standalone_file");
    }

    fn delete_audio_standalone_file(&mut self, file: NativeHandle) {
        self.free("delete_audio_standalone_file", file);
    }

    fn new_default_audio_listener(&mut self, _id: ListenerId) -> Option<NativeHandle> {
        self.mint("new_default_audio_listener")
    }

    fn new_audio_listener(&mut self, _id: ListenerId) -> Option<NativeHandle> {
        self.mint("new_audio_listener")
    }

    fn delete_audio_listener(&mut self, listener: NativeHandle) {
        self.free("delete_audio_listener", listener);
    }

    fn set_listener_3d_attributes(&mut self, listener: NativeHandle, attributes: &Object3DAttributes) -> RequestStatus {
        self.record("set_listener_3d_attributes");
        self.listener_attributes.push((listener, *attributes));
        RequestStatus::Success
    }

    fn new_audio_trigger(&mut self, node: roxmltree::Node<'_, '_>, info: &mut TriggerInfo) -> Option<NativeHandle> {
        let handle = self.mint_from_node("new_audio_trigger", node)?;
        let read = |name: &str| {
            node.attribute(name)
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        info.max_radius = read("radius");
        info.occlusion_fade_out_distance = read("fade");
        Some(handle)
    }

    fn delete_audio_trigger(&mut self, trigger: NativeHandle) {
        self.free("delete_audio_trigger", trigger);
    }

    fn new_audio_parameter(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle> {
        self.mint_from_node("new_audio_parameter", node)
    }

    fn delete_audio_parameter(&mut self, parameter: NativeHandle) {
        self.free("delete_audio_parameter", parameter);
    }

    fn new_audio_switch_state(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle> {
        self.mint_from_node("new_audio_switch_state", node)
    }

    fn delete_audio_switch_state(&mut self, state: NativeHandle) {
        self.free("delete_audio_switch_state", state);
    }

    fn new_audio_environment(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle> {
        self.mint_from_node("new_audio_environment", node)
    }

    fn delete_audio_environment(&mut self, environment: NativeHandle) {
        self.free("delete_audio_environment", environment);
    }
}

/// File cache accepting `<File/>` nodes only.
#[derive(Default)]
pub struct RecordingFileCache {
    next_id: u32,
    pub added: Vec<(FileEntryId, DataScope, bool)>,
    pub removed: Vec<(FileEntryId, DataScope)>,
}

impl FileCache for RecordingFileCache {
    fn try_add_file_cache_entry(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        scope: DataScope,
        auto_load: bool,
    ) -> Option<FileEntryId> {
        if node.tag_name().name() != "File" {
            return None;
        }
        self.next_id += 1;
        let id = FileEntryId(self.next_id);
        self.added.push((id, scope, auto_load));
        Some(id)
    }

    fn try_remove_file_cache_entry(&mut self, id: FileEntryId, scope: DataScope) -> bool {
        self.removed.push((id, scope));
        self.added.iter().any(|(added, _, _)| *added == id)
    }
}

/// Ray caster that keeps every request for the test to answer.
#[derive(Default)]
pub struct QueueRayCaster {
    pub queued: Vec<RayRequest>,
}

impl RayCaster for QueueRayCaster {
    fn queue_ray(&mut self, request: RayRequest) -> bool {
        self.queued.push(request);
        true
    }
}
