//! Debug-name bookkeeping.
//!
//! Managers report the human-readable names of the things they create so log
//! messages can print them. Release setups plug in [`NoopDiagnostics`] and
//! pay nothing; tools plug in [`DebugNameStore`].

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameKind {
    Object,
    Trigger,
    Parameter,
    Switch,
    SwitchState,
    Environment,
    PreloadRequest,
    StandaloneFile,
}

pub trait Diagnostics {
    fn add_name(&self, _kind: NameKind, _id: u32, _name: &str) {}

    fn remove_name(&self, _kind: NameKind, _id: u32) {}

    fn lookup_name(&self, _kind: NameKind, _id: u32) -> Option<String> {
        None
    }

    /// Name if known, otherwise the numeric id.
    fn label(&self, kind: NameKind, id: u32) -> String {
        self.lookup_name(kind, id)
            .unwrap_or_else(|| format!("#{}", id))
    }
}

#[derive(Debug, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {}

#[derive(Debug, Default)]
pub struct DebugNameStore {
    names: RefCell<HashMap<(NameKind, u32), String>>,
}

impl DebugNameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }
}

impl Diagnostics for DebugNameStore {
    fn add_name(&self, kind: NameKind, id: u32, name: &str) {
        self.names
            .borrow_mut()
            .insert((kind, id), name.to_string());
    }

    fn remove_name(&self, kind: NameKind, id: u32) {
        self.names.borrow_mut().remove(&(kind, id));
    }

    fn lookup_name(&self, kind: NameKind, id: u32) -> Option<String> {
        self.names.borrow().get(&(kind, id)).cloned()
    }
}
