//! Shared context handed to every manager at construction.

use crate::config::AtlConfig;
use crate::diagnostics::{Diagnostics, NameKind, NoopDiagnostics};
use std::rc::Rc;

#[derive(Clone)]
pub struct AtlContext {
    config: Rc<AtlConfig>,
    diagnostics: Rc<dyn Diagnostics>,
}

impl AtlContext {
    pub fn new(config: AtlConfig) -> Self {
        Self::with_diagnostics(config, Rc::new(NoopDiagnostics))
    }

    pub fn with_diagnostics(config: AtlConfig, diagnostics: Rc<dyn Diagnostics>) -> Self {
        Self {
            config: Rc::new(config),
            diagnostics,
        }
    }

    pub fn config(&self) -> &AtlConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    pub fn label(&self, kind: NameKind, id: u32) -> String {
        self.diagnostics.label(kind, id)
    }
}

impl Default for AtlContext {
    fn default() -> Self {
        Self::new(AtlConfig::default())
    }
}

impl std::fmt::Debug for AtlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
