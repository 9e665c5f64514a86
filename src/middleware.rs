//! Contract with the underlying audio middleware.
//!
//! The translation layer never looks inside middleware data. It asks the
//! middleware to construct, reset and destroy native representations and
//! hands the resulting opaque [`NativeHandle`]s back on every request.

use crate::ids::{EventId, ListenerId, ObjectId};
use crate::math::Object3DAttributes;
use std::cell::RefCell;
use std::num::NonZeroU64;
use std::rc::Rc;

/// Opaque reference to middleware-owned data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeHandle({:#x})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    /// Accepted; completion is reported later through the report channel.
    Pending,
    Failure,
}

impl RequestStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn is_failure(self) -> bool {
        self == Self::Failure
    }
}

/// Filled in by the middleware while it constructs a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriggerInfo {
    pub max_radius: f32,
    pub occlusion_fade_out_distance: f32,
}

/// Middleware shared between the managers. Calls never re-enter the layer;
/// completions come back through the report channel instead.
pub type SharedImpl = Rc<RefCell<dyn AudioImpl>>;

pub trait AudioImpl {
    // Objects
    fn new_audio_object(&mut self, id: ObjectId) -> Option<NativeHandle>;
    fn reset_audio_object(&mut self, object: NativeHandle) -> RequestStatus;
    fn delete_audio_object(&mut self, object: NativeHandle);
    fn register_audio_object(&mut self, object: NativeHandle, name: Option<&str>) -> RequestStatus;
    fn unregister_audio_object(&mut self, object: NativeHandle) -> RequestStatus;
    fn update_audio_object(&mut self, object: NativeHandle) -> RequestStatus;
    fn set_3d_attributes(
        &mut self,
        object: NativeHandle,
        attributes: &Object3DAttributes,
    ) -> RequestStatus;
    fn set_obstruction_occlusion(
        &mut self,
        object: NativeHandle,
        obstruction: f32,
        occlusion: f32,
    ) -> RequestStatus;

    // Requests on objects
    fn execute_trigger(
        &mut self,
        object: NativeHandle,
        trigger: NativeHandle,
        event: NativeHandle,
    ) -> RequestStatus;
    fn stop_event(&mut self, object: NativeHandle, event: NativeHandle) -> RequestStatus;
    fn stop_all_events(&mut self, object: NativeHandle) -> RequestStatus;
    fn set_parameter(
        &mut self,
        object: NativeHandle,
        parameter: NativeHandle,
        value: f32,
    ) -> RequestStatus;
    fn set_switch_state(&mut self, object: NativeHandle, state: NativeHandle) -> RequestStatus;
    fn set_environment(
        &mut self,
        object: NativeHandle,
        environment: NativeHandle,
        amount: f32,
    ) -> RequestStatus;
    fn play_file(&mut self, object: NativeHandle, file: NativeHandle, path: &str)
    -> RequestStatus;
    fn stop_file(&mut self, object: NativeHandle, file: NativeHandle) -> RequestStatus;

    // Events
    fn new_audio_event(&mut self, id: EventId) -> Option<NativeHandle>;
    fn reset_audio_event(&mut self, event: NativeHandle);
    fn delete_audio_event(&mut self, event: NativeHandle);

    // Standalone files
    fn new_audio_standalone_file(&mut self) -> Option<NativeHandle>;
    fn reset_audio_standalone_file(&mut self, file: NativeHandle);
    fn delete_audio_standalone_file(&mut self, file: NativeHandle);

    // Listeners
    fn new_default_audio_listener(&mut self, id: ListenerId) -> Option<NativeHandle>;
    fn new_audio_listener(&mut self, id: ListenerId) -> Option<NativeHandle>;
    fn delete_audio_listener(&mut self, listener: NativeHandle);
    fn set_listener_3d_attributes(
        &mut self,
        listener: NativeHandle,
        attributes: &Object3DAttributes,
    ) -> RequestStatus;

    // Controls, built from configuration documents
    fn new_audio_trigger(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        info: &mut TriggerInfo,
    ) -> Option<NativeHandle>;
    fn delete_audio_trigger(&mut self, trigger: NativeHandle);
    fn new_audio_parameter(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle>;
    fn delete_audio_parameter(&mut self, parameter: NativeHandle);
    fn new_audio_switch_state(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle>;
    fn delete_audio_switch_state(&mut self, state: NativeHandle);
    fn new_audio_environment(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NativeHandle>;
    fn delete_audio_environment(&mut self, environment: NativeHandle);
}
