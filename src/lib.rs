//! Audio translation layer: the instance-management core that sits between a
//! game and an audio middleware. It owns audio objects, events, standalone
//! files and listeners, loads control definitions from XML, and tells request
//! listeners how each request went.

pub mod catalog;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod file_cache;
pub mod ids;
pub mod listener;
pub mod loader;
pub mod math;
pub mod middleware;
pub mod object;
pub mod object_manager;
pub mod pool;
pub mod propagation;
pub mod request;
pub mod request_listener;
pub mod standalone_file;
pub mod system;

#[cfg(test)]
mod testing;

pub use catalog::{ControlCatalog, DataScope};
pub use config::AtlConfig;
pub use context::AtlContext;
pub use diagnostics::{DebugNameStore, Diagnostics, NameKind, NoopDiagnostics};
pub use error::{AtlError, Result};
pub use file_cache::FileCache;
pub use ids::{ControlId, EventId, ListenerId, ObjectId, StandaloneFileId, SwitchStateId, TriggerInstanceId};
pub use math::{Object3DAttributes, Transformation};
pub use middleware::{AudioImpl, NativeHandle, RequestStatus, SharedImpl};
pub use propagation::{ProcessedRay, RayCaster, RayHit, RayRequest};
pub use request::{RequestInfo, RequestResult, RequestType, SenderId};
pub use request_listener::RequestCallback;
pub use system::{AudioSystem, ImplReport};
