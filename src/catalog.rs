//! Control catalog: triggers, parameters, switches, environments and preload
//! requests built by the [`ConfigLoader`](crate::loader::ConfigLoader).

use crate::ids::{ControlId, FileEntryId, PreloadRequestId, SwitchStateId, TriggerImplId};
use crate::middleware::NativeHandle;
use std::collections::HashMap;
use std::convert::Infallible;

/// Lifetime class of catalog entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataScope {
    /// Loaded once, kept until shutdown.
    Global,
    /// Loaded and unloaded with each level.
    LevelSpecific,
    /// Matches every scope when clearing.
    All,
}

impl DataScope {
    pub fn matches(self, other: DataScope) -> bool {
        self == DataScope::All || other == DataScope::All || self == other
    }
}

/// Which side handles a payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Middleware,
    Internal,
}

/// Per-implementation payload of a control. Kinds without an in-layer handler
/// use `Infallible` for `I`.
#[derive(Debug, Clone, PartialEq)]
pub enum ImplPayload<I> {
    Middleware(NativeHandle),
    Internal(I),
}

impl<I> ImplPayload<I> {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Self::Middleware(_) => Subsystem::Middleware,
            Self::Internal(_) => Subsystem::Internal,
        }
    }

    pub fn native(&self) -> Option<NativeHandle> {
        match self {
            Self::Middleware(handle) => Some(*handle),
            Self::Internal(_) => None,
        }
    }
}

impl ImplPayload<Infallible> {
    pub fn handle(&self) -> NativeHandle {
        match self {
            Self::Middleware(handle) => *handle,
            Self::Internal(never) => match *never {},
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerImpl {
    pub id: TriggerImplId,
    pub trigger_id: ControlId,
    pub payload: ImplPayload<Infallible>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: ControlId,
    pub scope: DataScope,
    pub impls: Vec<TriggerImpl>,
    pub max_radius: f32,
    pub occlusion_fade_out_distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: ControlId,
    pub scope: DataScope,
    pub impls: Vec<ImplPayload<Infallible>>,
}

/// Switch state that drives another switch inside the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalSwitchState {
    pub switch_id: ControlId,
    pub state_id: SwitchStateId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchState {
    pub id: SwitchStateId,
    pub switch_id: ControlId,
    pub impls: Vec<ImplPayload<InternalSwitchState>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub id: ControlId,
    pub scope: DataScope,
    pub states: HashMap<SwitchStateId, SwitchState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub id: ControlId,
    pub scope: DataScope,
    pub impls: Vec<ImplPayload<Infallible>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreloadRequest {
    pub id: PreloadRequestId,
    pub scope: DataScope,
    pub auto_load: bool,
    pub file_entries: Vec<FileEntryId>,
}

#[derive(Debug, Default)]
pub struct ControlCatalog {
    pub(crate) triggers: HashMap<ControlId, Trigger>,
    pub(crate) parameters: HashMap<ControlId, Parameter>,
    pub(crate) switches: HashMap<ControlId, Switch>,
    pub(crate) environments: HashMap<ControlId, Environment>,
    pub(crate) preload_requests: HashMap<PreloadRequestId, PreloadRequest>,
}

impl ControlCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, id: ControlId) -> Option<&Trigger> {
        self.triggers.get(&id)
    }

    pub fn parameter(&self, id: ControlId) -> Option<&Parameter> {
        self.parameters.get(&id)
    }

    pub fn switch(&self, id: ControlId) -> Option<&Switch> {
        self.switches.get(&id)
    }

    pub fn switch_state(&self, switch_id: ControlId, state_id: SwitchStateId) -> Option<&SwitchState> {
        self.switches.get(&switch_id)?.states.get(&state_id)
    }

    pub fn environment(&self, id: ControlId) -> Option<&Environment> {
        self.environments.get(&id)
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn preload_request(&self, id: PreloadRequestId) -> Option<&PreloadRequest> {
        self.preload_requests.get(&id)
    }

    pub fn num_triggers(&self) -> usize {
        self.triggers.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn num_switches(&self) -> usize {
        self.switches.len()
    }

    pub fn num_environments(&self) -> usize {
        self.environments.len()
    }

    pub fn num_preload_requests(&self) -> usize {
        self.preload_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
            && self.parameters.is_empty()
            && self.switches.is_empty()
            && self.environments.is_empty()
            && self.preload_requests.is_empty()
    }
}
