//! Configuration loading.
//!
//! Reads every `*.xml` document of a folder, dispatches the children of its
//! root node to the trigger, parameter, switch and environment parsers, and
//! asks the middleware to build the native data for each implementation
//! entry. Preload requests are parsed separately and feed the file cache.
//! Everything created for a data scope is torn down again by the matching
//! `clear_*` call.

use crate::catalog::{
    ControlCatalog, DataScope, Environment, ImplPayload, InternalSwitchState, Parameter,
    PreloadRequest, Switch, SwitchState, Trigger, TriggerImpl,
};
use crate::context::AtlContext;
use crate::diagnostics::NameKind;
use crate::error::{AtlError, Result};
use crate::file_cache::FileCache;
use crate::ids::{
    self, ControlId, PreloadRequestId, SwitchStateId, TRIGGER_IMPL_ID_NUM_RESERVED, TriggerImplId,
};
use crate::middleware::{SharedImpl, TriggerInfo};
use anyhow::Context;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod tags {
    pub const ROOT: &str = "ATLConfig";
    pub const TRIGGERS: &str = "AudioTriggers";
    pub const RTPCS: &str = "AudioRtpcs";
    pub const SWITCHES: &str = "AudioSwitches";
    pub const ENVIRONMENTS: &str = "AudioEnvironments";
    pub const PRELOADS: &str = "AudioPreloads";
    pub const EDITOR_DATA: &str = "EditorData";

    pub const TRIGGER: &str = "ATLTrigger";
    pub const RTPC: &str = "ATLRtpc";
    pub const SWITCH: &str = "ATLSwitch";
    pub const SWITCH_STATE: &str = "ATLSwitchState";
    pub const ENVIRONMENT: &str = "ATLEnvironment";
    pub const PRELOAD_REQUEST: &str = "ATLPreloadRequest";
    pub const PLATFORMS: &str = "ATLPlatforms";

    pub const TRIGGER_REQUEST: &str = "ATLTriggerRequest";
    pub const RTPC_REQUEST: &str = "ATLRtpcRequest";
    pub const SWITCH_REQUEST: &str = "ATLSwitchRequest";
    pub const ENVIRONMENT_REQUEST: &str = "ATLEnvironmentRequest";
    pub const VALUE: &str = "ATLValue";

    pub const NAME_ATTRIBUTE: &str = "atl_name";
    pub const TYPE_ATTRIBUTE: &str = "atl_type";
    pub const CONFIG_GROUP_ATTRIBUTE: &str = "atl_config_group_name";
    pub const AUTO_LOAD_TYPE: &str = "AutoLoad";
}

fn has_tag(node: Node<'_, '_>, tag: &str) -> bool {
    node.tag_name().name().eq_ignore_ascii_case(tag)
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn name_of<'a>(node: Node<'a, '_>) -> &'a str {
    node.attribute(tags::NAME_ATTRIBUTE).unwrap_or_default()
}

/// Sorted list of the `*.xml` files directly inside `folder`.
fn config_documents(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        let is_xml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xml"));
        if is_xml && path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Parses `<ATLSwitchRequest atl_name="switch"><ATLValue atl_name="state"/></ATLSwitchRequest>`.
fn parse_internal_switch_state(node: Node<'_, '_>) -> Option<InternalSwitchState> {
    let switch_name = name_of(node);
    let values: Vec<Node<'_, '_>> = elements(node).collect();

    if switch_name.is_empty() || values.len() != 1 {
        log::warn!(
            "an {} {} inside {} needs to have exactly one {}",
            tags::SWITCH_REQUEST,
            switch_name,
            tags::SWITCH_STATE,
            tags::VALUE
        );
        return None;
    }

    let value = values[0];
    let state_name = name_of(value);
    if !has_tag(value, tags::VALUE) || state_name.is_empty() {
        return None;
    }

    Some(InternalSwitchState {
        switch_id: ControlId::from_name(switch_name),
        state_id: SwitchStateId::from_name(state_name),
    })
}

pub struct ConfigLoader {
    ctx: AtlContext,
    imp: Option<SharedImpl>,
    catalog: ControlCatalog,
    trigger_impl_id_counter: u32,
}

impl ConfigLoader {
    pub fn new(ctx: AtlContext) -> Self {
        Self {
            ctx,
            imp: None,
            catalog: ControlCatalog::new(),
            trigger_impl_id_counter: TRIGGER_IMPL_ID_NUM_RESERVED,
        }
    }

    pub fn init(&mut self, imp: SharedImpl) {
        self.imp = Some(imp);
    }

    /// Tears down every control and disconnects from the middleware.
    pub fn release(&mut self) {
        self.clear_controls_data(DataScope::All);
        self.imp = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.imp.is_some()
    }

    pub fn catalog(&self) -> &ControlCatalog {
        &self.catalog
    }

    /// Parses triggers, parameters, switches and environments from every
    /// document in `folder` into `scope`.
    ///
    /// # Returns
    ///
    /// The number of documents that were processed. A missing folder counts
    /// as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if no middleware is connected, `scope` is
    /// `DataScope::All`, or the folder cannot be listed. Problems inside a
    /// single document are logged and skipped.
    pub fn parse_controls_data(&mut self, folder: impl AsRef<Path>, scope: DataScope) -> Result<usize> {
        let folder = folder.as_ref();
        let imp = self.imp.clone().ok_or_else(|| {
            AtlError::NotInitialized("cannot parse controls data without middleware".to_string())
        })?;
        let documents = self.documents_for(folder, scope)?;

        let mut parsed = 0;
        for path in &documents {
            match self.parse_controls_document(path, scope, &imp) {
                Ok(()) => parsed += 1,
                Err(e) => log::warn!("skipping controls document: {:#}", e),
            }
        }

        log::info!(
            "parsed controls data in {} for data scope {:?} ({} documents)",
            folder.display(),
            scope,
            parsed
        );
        Ok(parsed)
    }

    /// Parses the preload requests of every document in `folder`, registering
    /// their files with `file_cache`.
    ///
    /// # Errors
    ///
    /// Same as [`parse_controls_data`](Self::parse_controls_data), except that
    /// no middleware is needed.
    pub fn parse_preloads_data(
        &mut self,
        folder: impl AsRef<Path>,
        scope: DataScope,
        file_cache: &mut dyn FileCache,
    ) -> Result<usize> {
        let folder = folder.as_ref();
        let documents = self.documents_for(folder, scope)?;
        let folder_name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        let mut parsed = 0;
        for path in &documents {
            match self.parse_preloads_document(path, scope, folder_name.as_deref(), file_cache) {
                Ok(()) => parsed += 1,
                Err(e) => log::warn!("skipping preloads document: {:#}", e),
            }
        }

        log::info!(
            "parsed preloads data in {} for data scope {:?} ({} documents)",
            folder.display(),
            scope,
            parsed
        );
        Ok(parsed)
    }

    fn documents_for(&self, folder: &Path, scope: DataScope) -> Result<Vec<PathBuf>> {
        if scope == DataScope::All {
            return Err(AtlError::Configuration(
                "data can only be loaded into the global or a level scope".to_string(),
            ));
        }
        if !folder.is_dir() {
            log::debug!("no audio configuration in {}", folder.display());
            return Ok(Vec::new());
        }
        config_documents(folder)
    }

    fn parse_controls_document(
        &mut self,
        path: &Path,
        scope: DataScope,
        imp: &SharedImpl,
    ) -> anyhow::Result<()> {
        let text = read_document(path)?;
        let document =
            Document::parse(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        let root = document.root_element();
        if !has_tag(root, tags::ROOT) {
            anyhow::bail!(
                "{} has root node {} instead of {}",
                path.display(),
                root.tag_name().name(),
                tags::ROOT
            );
        }

        for node in elements(root) {
            if has_tag(node, tags::TRIGGERS) {
                self.parse_triggers(node, scope, imp);
            } else if has_tag(node, tags::RTPCS) {
                self.parse_parameters(node, scope, imp);
            } else if has_tag(node, tags::SWITCHES) {
                self.parse_switches(node, scope, imp);
            } else if has_tag(node, tags::ENVIRONMENTS) {
                self.parse_environments(node, scope, imp);
            } else if has_tag(node, tags::PRELOADS) || has_tag(node, tags::EDITOR_DATA) {
                // Valid, handled elsewhere.
            } else {
                log::warn!("unknown AudioConfig node: {}", node.tag_name().name());
            }
        }
        Ok(())
    }

    fn parse_preloads_document(
        &mut self,
        path: &Path,
        scope: DataScope,
        folder_name: Option<&str>,
        file_cache: &mut dyn FileCache,
    ) -> anyhow::Result<()> {
        let text = read_document(path)?;
        let document =
            Document::parse(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        let root = document.root_element();
        if !has_tag(root, tags::ROOT) {
            anyhow::bail!(
                "{} has root node {} instead of {}",
                path.display(),
                root.tag_name().name(),
                tags::ROOT
            );
        }

        for node in elements(root) {
            if has_tag(node, tags::PRELOADS) {
                self.parse_preloads(node, scope, folder_name, file_cache);
            } else if [
                tags::TRIGGERS,
                tags::RTPCS,
                tags::SWITCHES,
                tags::ENVIRONMENTS,
                tags::EDITOR_DATA,
            ]
            .iter()
            .any(|tag| has_tag(node, tag))
            {
                // Valid, handled elsewhere.
            } else {
                log::warn!("unknown AudioConfig node: {}", node.tag_name().name());
            }
        }
        Ok(())
    }

    fn parse_triggers(&mut self, root: Node<'_, '_>, scope: DataScope, imp: &SharedImpl) {
        for node in elements(root).filter(|n| has_tag(*n, tags::TRIGGER)) {
            let name = name_of(node);
            let id = ControlId::from_name(name);
            if !id.is_valid() {
                log::error!("trigger without a valid name, skipping");
                continue;
            }
            if self.catalog.triggers.contains_key(&id) {
                log::error!("trigger \"{}\" already exists!", name);
                continue;
            }

            let mut impls = Vec::new();
            let mut max_radius = 0.0_f32;
            let mut occlusion_fade_out_distance = 0.0_f32;

            for impl_node in elements(node) {
                if has_tag(impl_node, tags::TRIGGER_REQUEST) {
                    log::error!("trigger \"{}\": internal trigger requests are not supported", name);
                    continue;
                }

                let mut info = TriggerInfo::default();
                let handle = imp.borrow_mut().new_audio_trigger(impl_node, &mut info);
                match handle {
                    Some(handle) => {
                        max_radius = max_radius.max(info.max_radius);
                        occlusion_fade_out_distance =
                            occlusion_fade_out_distance.max(info.occlusion_fade_out_distance);
                        self.trigger_impl_id_counter += 1;
                        impls.push(TriggerImpl {
                            id: TriggerImplId(self.trigger_impl_id_counter),
                            trigger_id: id,
                            payload: ImplPayload::Middleware(handle),
                        });
                    }
                    None => log::warn!(
                        "could not parse a trigger implementation with XML tag {}",
                        impl_node.tag_name().name()
                    ),
                }
            }

            self.catalog.triggers.insert(
                id,
                Trigger {
                    id,
                    scope,
                    impls,
                    max_radius,
                    occlusion_fade_out_distance,
                },
            );
            self.ctx.diagnostics().add_name(NameKind::Trigger, id.0, name);
        }
    }

    fn parse_parameters(&mut self, root: Node<'_, '_>, scope: DataScope, imp: &SharedImpl) {
        for node in elements(root).filter(|n| has_tag(*n, tags::RTPC)) {
            let name = name_of(node);
            let id = ControlId::from_name(name);
            if !id.is_valid() {
                log::error!("parameter without a valid name, skipping");
                continue;
            }
            if self.catalog.parameters.contains_key(&id) {
                log::error!("parameter \"{}\" already exists!", name);
                continue;
            }

            let mut impls = Vec::new();
            for impl_node in elements(node) {
                if has_tag(impl_node, tags::RTPC_REQUEST) {
                    log::error!("parameter \"{}\": internal parameter requests are not supported", name);
                    continue;
                }
                match imp.borrow_mut().new_audio_parameter(impl_node) {
                    Some(handle) => impls.push(ImplPayload::Middleware(handle)),
                    None => log::warn!(
                        "could not parse a parameter implementation with XML tag {}",
                        impl_node.tag_name().name()
                    ),
                }
            }

            self.catalog
                .parameters
                .insert(id, Parameter { id, scope, impls });
            self.ctx.diagnostics().add_name(NameKind::Parameter, id.0, name);
        }
    }

    fn parse_switches(&mut self, root: Node<'_, '_>, scope: DataScope, imp: &SharedImpl) {
        for node in elements(root).filter(|n| has_tag(*n, tags::SWITCH)) {
            let name = name_of(node);
            let switch_id = ControlId::from_name(name);
            if !switch_id.is_valid() {
                log::error!("switch without a valid name, skipping");
                continue;
            }
            if self.catalog.switches.contains_key(&switch_id) {
                log::error!("switch \"{}\" already exists!", name);
                continue;
            }

            let mut states = HashMap::new();
            for state_node in elements(node).filter(|n| has_tag(*n, tags::SWITCH_STATE)) {
                let state_name = name_of(state_node);
                let state_id = SwitchStateId::from_name(state_name);
                if !state_id.is_valid() {
                    continue;
                }
                if states.contains_key(&state_id) {
                    log::error!("switch state \"{}\" of switch \"{}\" already exists!", state_name, name);
                    continue;
                }

                let mut impls = Vec::new();
                for impl_node in elements(state_node) {
                    let payload = if has_tag(impl_node, tags::SWITCH_REQUEST) {
                        parse_internal_switch_state(impl_node).map(ImplPayload::Internal)
                    } else {
                        imp.borrow_mut()
                            .new_audio_switch_state(impl_node)
                            .map(ImplPayload::Middleware)
                    };
                    if let Some(payload) = payload {
                        impls.push(payload);
                    }
                }

                states.insert(
                    state_id,
                    SwitchState {
                        id: state_id,
                        switch_id,
                        impls,
                    },
                );
                self.ctx
                    .diagnostics()
                    .add_name(NameKind::SwitchState, state_id.0, state_name);
            }

            self.catalog.switches.insert(
                switch_id,
                Switch {
                    id: switch_id,
                    scope,
                    states,
                },
            );
            self.ctx.diagnostics().add_name(NameKind::Switch, switch_id.0, name);
        }
    }

    fn parse_environments(&mut self, root: Node<'_, '_>, scope: DataScope, imp: &SharedImpl) {
        for node in elements(root).filter(|n| has_tag(*n, tags::ENVIRONMENT)) {
            let name = name_of(node);
            let id = ControlId::from_name(name);
            if !id.is_valid() {
                log::error!("environment without a valid name, skipping");
                continue;
            }
            if self.catalog.environments.contains_key(&id) {
                log::error!("environment \"{}\" already exists!", name);
                continue;
            }

            let mut impls = Vec::new();
            for impl_node in elements(node) {
                if has_tag(impl_node, tags::ENVIRONMENT_REQUEST) {
                    log::error!(
                        "environment \"{}\": internal environment requests are not supported",
                        name
                    );
                    continue;
                }
                match imp.borrow_mut().new_audio_environment(impl_node) {
                    Some(handle) => impls.push(ImplPayload::Middleware(handle)),
                    None => log::warn!(
                        "could not parse an environment implementation with XML tag {}",
                        impl_node.tag_name().name()
                    ),
                }
            }

            // An environment nothing can apply is dropped.
            if impls.is_empty() {
                continue;
            }

            self.catalog
                .environments
                .insert(id, Environment { id, scope, impls });
            self.ctx.diagnostics().add_name(NameKind::Environment, id.0, name);
        }
    }

    fn parse_preloads(
        &mut self,
        root: Node<'_, '_>,
        scope: DataScope,
        folder_name: Option<&str>,
        file_cache: &mut dyn FileCache,
    ) {
        for node in elements(root).filter(|n| has_tag(*n, tags::PRELOAD_REQUEST)) {
            let auto_load = node
                .attribute(tags::TYPE_ATTRIBUTE)
                .is_some_and(|t| t.eq_ignore_ascii_case(tags::AUTO_LOAD_TYPE));

            let name = if !auto_load {
                name_of(node)
            } else if scope == DataScope::LevelSpecific {
                folder_name.unwrap_or_default()
            } else {
                ids::GLOBAL_PRELOAD_REQUEST_NAME
            };
            let id = PreloadRequestId::from_name(name);
            if !id.is_valid() {
                log::error!("preload request \"{}\" has no valid id, skipping", name);
                continue;
            }

            let children: Vec<Node<'_, '_>> = elements(node).collect();
            if children.len() < 2 || !has_tag(children[0], tags::PLATFORMS) {
                log::warn!(
                    "preload request \"{}\" needs an {} list and at least one config group",
                    name,
                    tags::PLATFORMS
                );
                continue;
            }

            let platform = self.ctx.config().platform.as_str();
            let group_name = elements(children[0])
                .find(|p| name_of(*p).eq_ignore_ascii_case(platform))
                .and_then(|p| p.attribute(tags::CONFIG_GROUP_ATTRIBUTE));
            let Some(group) = group_name.and_then(|group_name| {
                children[1..]
                    .iter()
                    .find(|g| name_of(**g).eq_ignore_ascii_case(group_name))
            }) else {
                log::debug!(
                    "preload request \"{}\" has no config group for platform {}",
                    name,
                    platform
                );
                continue;
            };

            let mut file_entries = Vec::new();
            for file_node in elements(*group) {
                match file_cache.try_add_file_cache_entry(file_node, scope, auto_load) {
                    Some(entry) if entry.is_valid() => file_entries.push(entry),
                    _ => log::warn!(
                        "preload request \"{}\" could not create file entry from tag \"{}\"",
                        name,
                        file_node.tag_name().name()
                    ),
                }
            }

            match self.catalog.preload_requests.get_mut(&id) {
                Some(existing) => existing.file_entries.extend(file_entries),
                None => {
                    self.catalog.preload_requests.insert(
                        id,
                        PreloadRequest {
                            id,
                            scope,
                            auto_load,
                            file_entries,
                        },
                    );
                    self.ctx
                        .diagnostics()
                        .add_name(NameKind::PreloadRequest, id.0, name);
                }
            }
        }
    }

    /// Removes every control whose scope matches `scope` and frees its
    /// middleware data.
    pub fn clear_controls_data(&mut self, scope: DataScope) {
        let Some(imp) = self.imp.clone() else {
            return;
        };
        let diagnostics = self.ctx.diagnostics();
        let mut imp = imp.borrow_mut();
        let mut removed = 0usize;

        self.catalog.triggers.retain(|id, trigger| {
            if !scope.matches(trigger.scope) {
                return true;
            }
            for trigger_impl in &trigger.impls {
                imp.delete_audio_trigger(trigger_impl.payload.handle());
            }
            diagnostics.remove_name(NameKind::Trigger, id.0);
            removed += 1;
            false
        });

        self.catalog.parameters.retain(|id, parameter| {
            if !scope.matches(parameter.scope) {
                return true;
            }
            for payload in &parameter.impls {
                imp.delete_audio_parameter(payload.handle());
            }
            diagnostics.remove_name(NameKind::Parameter, id.0);
            removed += 1;
            false
        });

        self.catalog.switches.retain(|id, switch| {
            if !scope.matches(switch.scope) {
                return true;
            }
            for state in switch.states.values() {
                for payload in &state.impls {
                    match payload {
                        ImplPayload::Middleware(handle) => imp.delete_audio_switch_state(*handle),
                        ImplPayload::Internal(_) => {}
                    }
                }
                diagnostics.remove_name(NameKind::SwitchState, state.id.0);
            }
            diagnostics.remove_name(NameKind::Switch, id.0);
            removed += 1;
            false
        });

        self.catalog.environments.retain(|id, environment| {
            if !scope.matches(environment.scope) {
                return true;
            }
            for payload in &environment.impls {
                imp.delete_audio_environment(payload.handle());
            }
            diagnostics.remove_name(NameKind::Environment, id.0);
            removed += 1;
            false
        });

        log::debug!("cleared {} controls for data scope {:?}", removed, scope);
    }

    /// Removes every preload request whose scope matches `scope`, releasing
    /// each of its file entries from `file_cache`.
    pub fn clear_preloads_data(&mut self, scope: DataScope, file_cache: &mut dyn FileCache) {
        let diagnostics = self.ctx.diagnostics();
        self.catalog.preload_requests.retain(|id, request| {
            if !scope.matches(request.scope) {
                return true;
            }
            for entry in &request.file_entries {
                if !file_cache.try_remove_file_cache_entry(*entry, request.scope) {
                    log::warn!("failed to remove file entry {} of preload request {}", entry, id);
                }
            }
            diagnostics.remove_name(NameKind::PreloadRequest, id.0);
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtlConfig;
    use crate::diagnostics::{DebugNameStore, Diagnostics};
    use crate::ids::FileEntryId;
    use crate::testing::{MockImpl, RecordingFileCache, init_logger};
    use std::rc::Rc;

    const CONTROLS: &str = r#"<ATLConfig atl_name="test">
  <AudioTriggers>
    <ATLTrigger atl_name="play_explosion">
      <MockEvent name="explosion" radius="40" fade="5"/>
      <MockEvent name="debris" radius="60"/>
    </ATLTrigger>
    <ATLTrigger atl_name="stop_explosion">
      <MockEvent name="stop"/>
      <ATLTriggerRequest atl_name="ignored"/>
    </ATLTrigger>
  </AudioTriggers>
  <AudioRtpcs>
    <ATLRtpc atl_name="engine_rpm">
      <MockParameter name="rpm"/>
    </ATLRtpc>
  </AudioRtpcs>
  <AudioSwitches>
    <ATLSwitch atl_name="surface">
      <ATLSwitchState atl_name="grass"><MockState name="grass"/></ATLSwitchState>
      <ATLSwitchState atl_name="rock">
        <MockState name="rock"/>
        <ATLSwitchRequest atl_name="ObstrOcclCalcType"><ATLValue atl_name="SingleRay"/></ATLSwitchRequest>
      </ATLSwitchState>
    </ATLSwitch>
  </AudioSwitches>
  <AudioEnvironments>
    <ATLEnvironment atl_name="cave"><MockBus name="cave"/></ATLEnvironment>
    <ATLEnvironment atl_name="broken"><MockBus fail="true"/></ATLEnvironment>
  </AudioEnvironments>
  <EditorData/>
  <Bogus/>
</ATLConfig>"#;

    const LEVEL_CONTROLS: &str = r#"<ATLConfig>
  <AudioTriggers>
    <ATLTrigger atl_name="level_ambience"><MockEvent name="wind"/></ATLTrigger>
  </AudioTriggers>
  <AudioRtpcs>
    <ATLRtpc atl_name="level_rtpc"><MockParameter name="level"/></ATLRtpc>
  </AudioRtpcs>
</ATLConfig>"#;

    const PRELOADS: &str = r#"<ATLConfig>
  <AudioPreloads>
    <ATLPreloadRequest atl_name="weapons">
      <ATLPlatforms>
        <Platform atl_name="pc" atl_config_group_name="desktop"/>
        <Platform atl_name="console" atl_config_group_name="small"/>
      </ATLPlatforms>
      <ATLConfigGroup atl_name="small"><File path="a_small.bnk"/></ATLConfigGroup>
      <ATLConfigGroup atl_name="desktop">
        <File path="a.bnk"/>
        <File path="b.bnk"/>
        <Junk/>
      </ATLConfigGroup>
    </ATLPreloadRequest>
    <ATLPreloadRequest atl_type="AutoLoad">
      <ATLPlatforms><Platform atl_name="pc" atl_config_group_name="all"/></ATLPlatforms>
      <ATLConfigGroup atl_name="all"><File path="init.bnk"/></ATLConfigGroup>
    </ATLPreloadRequest>
    <ATLPreloadRequest atl_name="other_platform">
      <ATLPlatforms><Platform atl_name="console" atl_config_group_name="small"/></ATLPlatforms>
      <ATLConfigGroup atl_name="small"><File path="x.bnk"/></ATLConfigGroup>
    </ATLPreloadRequest>
    <ATLPreloadRequest atl_name="malformed"/>
  </AudioPreloads>
</ATLConfig>"#;

    const LEVEL_PRELOADS: &str = r#"<ATLConfig>
  <AudioPreloads>
    <ATLPreloadRequest atl_name="level_music">
      <ATLPlatforms><Platform atl_name="PC" atl_config_group_name="desktop"/></ATLPlatforms>
      <ATLConfigGroup atl_name="desktop">
        <File path="music_a.bnk"/>
        <File path="music_b.bnk"/>
      </ATLConfigGroup>
    </ATLPreloadRequest>
    <ATLPreloadRequest atl_type="AutoLoad">
      <ATLPlatforms><Platform atl_name="pc" atl_config_group_name="all"/></ATLPlatforms>
      <ATLConfigGroup atl_name="all"><File path="level_init.bnk"/></ATLConfigGroup>
    </ATLPreloadRequest>
  </AudioPreloads>
</ATLConfig>"#;

    fn loader_with(names: Rc<DebugNameStore>) -> (ConfigLoader, Rc<std::cell::RefCell<MockImpl>>) {
        init_logger();
        let ctx = AtlContext::with_diagnostics(AtlConfig::default(), names);
        let (mock, imp) = MockImpl::shared();
        let mut loader = ConfigLoader::new(ctx);
        loader.init(imp);
        (loader, mock)
    }

    fn write(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).expect("write config document");
    }

    #[test]
    fn test_parse_controls() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "controls.xml", CONTROLS);
        write(dir.path(), "notes.txt", "not xml");

        let names = Rc::new(DebugNameStore::new());
        let (mut loader, mock) = loader_with(names.clone());
        let parsed = loader
            .parse_controls_data(dir.path(), DataScope::Global)
            .expect("parse");
        assert_eq!(parsed, 1);

        let catalog = loader.catalog();
        assert_eq!(catalog.num_triggers(), 2);
        assert_eq!(catalog.num_parameters(), 1);
        assert_eq!(catalog.num_switches(), 1);
        assert_eq!(catalog.num_environments(), 1);

        let explosion = catalog
            .trigger(ControlId::from_name("play_explosion"))
            .expect("trigger");
        assert_eq!(explosion.impls.len(), 2);
        assert_eq!(explosion.max_radius, 60.0);
        assert_eq!(explosion.occlusion_fade_out_distance, 5.0);
        assert_eq!(explosion.scope, DataScope::Global);
        assert!(explosion.impls.iter().all(|i| i.id.0 > TRIGGER_IMPL_ID_NUM_RESERVED));

        let stop = catalog
            .trigger(ControlId::from_name("stop_explosion"))
            .expect("trigger");
        assert_eq!(stop.impls.len(), 1);

        let rock = catalog
            .switch_state(ControlId::from_name("surface"), SwitchStateId::from_name("rock"))
            .expect("state");
        assert_eq!(rock.impls.len(), 2);
        assert_eq!(
            rock.impls[1],
            ImplPayload::Internal(InternalSwitchState {
                switch_id: ids::occlusion_calc_switch_id(),
                state_id: SwitchStateId::from_name("SingleRay"),
            })
        );

        assert!(catalog.environment(ControlId::from_name("broken")).is_none());
        assert_eq!(
            names.lookup_name(NameKind::Trigger, ControlId::from_name("play_explosion").0),
            Some("play_explosion".to_string())
        );
        // 3 triggers impls + 1 parameter + 2 middleware states + 1 environment
        assert_eq!(mock.borrow().live_handles(), 7);
    }

    #[test]
    fn test_duplicate_trigger_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.xml", CONTROLS);
        write(dir.path(), "b.xml", CONTROLS);

        let (mut loader, mock) = loader_with(Rc::new(DebugNameStore::new()));
        let parsed = loader
            .parse_controls_data(dir.path(), DataScope::Global)
            .expect("parse");
        assert_eq!(parsed, 2);
        assert_eq!(loader.catalog().num_triggers(), 2);
        assert_eq!(mock.borrow().live_handles(), 7);
    }

    #[test]
    fn test_duplicate_switch_state_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "switches.xml",
            r#"<ATLConfig>
  <AudioSwitches>
    <ATLSwitch atl_name="surface">
      <ATLSwitchState atl_name="grass"><MockState name="grass_a"/></ATLSwitchState>
      <ATLSwitchState atl_name="grass"><MockState name="grass_b"/></ATLSwitchState>
      <ATLSwitchState atl_name="sand"><MockState name="sand"/></ATLSwitchState>
    </ATLSwitch>
  </AudioSwitches>
</ATLConfig>"#,
        );

        let (mut loader, mock) = loader_with(Rc::new(DebugNameStore::new()));
        loader
            .parse_controls_data(dir.path(), DataScope::Global)
            .expect("parse");
        let surface = loader
            .catalog()
            .switch(ControlId::from_name("surface"))
            .expect("switch");
        assert_eq!(surface.states.len(), 2);
        assert_eq!(mock.borrow().calls("new_audio_switch_state"), 2);

        loader.clear_controls_data(DataScope::Global);
        assert_eq!(mock.borrow().calls("delete_audio_switch_state"), 2);
        assert_eq!(mock.borrow().live_handles(), 0);
    }

    #[test]
    fn test_malformed_document_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a_broken.xml", "<ATLConfig><AudioTriggers>");
        write(dir.path(), "b_wrong_root.xml", "<Other/>");
        write(dir.path(), "c_level.xml", LEVEL_CONTROLS);

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let parsed = loader
            .parse_controls_data(dir.path(), DataScope::LevelSpecific)
            .expect("parse");
        assert_eq!(parsed, 1);
        assert_eq!(loader.catalog().num_triggers(), 1);
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let parsed = loader
            .parse_controls_data(dir.path().join("missing"), DataScope::Global)
            .expect("parse");
        assert_eq!(parsed, 0);
    }

    #[test]
    fn test_parse_requires_middleware_and_concrete_scope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = ConfigLoader::new(AtlContext::default());
        assert!(matches!(
            loader.parse_controls_data(dir.path(), DataScope::Global),
            Err(AtlError::NotInitialized(_))
        ));

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        assert!(matches!(
            loader.parse_controls_data(dir.path(), DataScope::All),
            Err(AtlError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_then_clear_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "controls.xml", CONTROLS);

        let names = Rc::new(DebugNameStore::new());
        let (mut loader, mock) = loader_with(names.clone());
        loader
            .parse_controls_data(dir.path(), DataScope::LevelSpecific)
            .expect("parse");
        assert!(!loader.catalog().is_empty());

        loader.clear_controls_data(DataScope::LevelSpecific);
        assert!(loader.catalog().is_empty());
        assert_eq!(mock.borrow().live_handles(), 0);
        assert!(names.is_empty());
    }

    #[test]
    fn test_clear_level_keeps_global() {
        let global = tempfile::tempdir().expect("tempdir");
        let level = tempfile::tempdir().expect("tempdir");
        write(global.path(), "controls.xml", CONTROLS);
        write(level.path(), "level.xml", LEVEL_CONTROLS);

        let (mut loader, mock) = loader_with(Rc::new(DebugNameStore::new()));
        loader
            .parse_controls_data(global.path(), DataScope::Global)
            .expect("parse global");
        loader
            .parse_controls_data(level.path(), DataScope::LevelSpecific)
            .expect("parse level");
        assert_eq!(loader.catalog().num_triggers(), 3);

        loader.clear_controls_data(DataScope::LevelSpecific);
        assert_eq!(loader.catalog().num_triggers(), 2);
        assert_eq!(loader.catalog().num_parameters(), 1);
        assert!(loader.catalog().trigger(ControlId::from_name("level_ambience")).is_none());
        assert_eq!(mock.borrow().live_handles(), 7);

        loader.clear_controls_data(DataScope::All);
        assert!(loader.catalog().is_empty());
        assert_eq!(mock.borrow().live_handles(), 0);
    }

    #[test]
    fn test_parse_preloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "preloads.xml", PRELOADS);

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let mut cache = RecordingFileCache::default();
        loader
            .parse_preloads_data(dir.path(), DataScope::Global, &mut cache)
            .expect("parse");

        let catalog = loader.catalog();
        assert_eq!(catalog.num_preload_requests(), 2);

        let weapons = catalog
            .preload_request(PreloadRequestId::from_name("weapons"))
            .expect("weapons");
        assert_eq!(weapons.file_entries.len(), 2);
        assert!(!weapons.auto_load);

        let global = catalog
            .preload_request(ids::global_preload_request_id())
            .expect("global auto load");
        assert!(global.auto_load);
        assert_eq!(global.file_entries.len(), 1);

        assert!(catalog
            .preload_request(PreloadRequestId::from_name("other_platform"))
            .is_none());
        assert_eq!(cache.added.len(), 3);
    }

    #[test]
    fn test_level_auto_load_uses_folder_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let level = root.path().join("harbor");
        std::fs::create_dir(&level).expect("level dir");
        write(&level, "preloads.xml", PRELOADS);

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let mut cache = RecordingFileCache::default();
        loader
            .parse_preloads_data(&level, DataScope::LevelSpecific, &mut cache)
            .expect("parse");

        let request = loader
            .catalog()
            .preload_request(PreloadRequestId::from_name("harbor"))
            .expect("level auto load");
        assert_eq!(request.scope, DataScope::LevelSpecific);
        assert!(request.auto_load);
    }

    #[test]
    fn test_auto_load_requests_merge() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.xml", PRELOADS);
        write(dir.path(), "b.xml", PRELOADS);

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let mut cache = RecordingFileCache::default();
        loader
            .parse_preloads_data(dir.path(), DataScope::Global, &mut cache)
            .expect("parse");

        let global = loader
            .catalog()
            .preload_request(ids::global_preload_request_id())
            .expect("global");
        assert_eq!(global.file_entries.len(), 2);
    }

    #[test]
    fn test_clear_preloads_releases_each_file_once() {
        let global = tempfile::tempdir().expect("tempdir");
        let level = tempfile::tempdir().expect("tempdir");
        write(global.path(), "preloads.xml", PRELOADS);
        write(level.path(), "preloads.xml", LEVEL_PRELOADS);

        let (mut loader, _mock) = loader_with(Rc::new(DebugNameStore::new()));
        let mut cache = RecordingFileCache::default();
        loader
            .parse_preloads_data(global.path(), DataScope::Global, &mut cache)
            .expect("parse global");
        let global_files = cache.added.len();
        loader
            .parse_preloads_data(level.path(), DataScope::LevelSpecific, &mut cache)
            .expect("parse level");
        let level_files: Vec<FileEntryId> = cache.added[global_files..]
            .iter()
            .map(|(id, _, _)| *id)
            .collect();
        assert_eq!(level_files.len(), 3);
        assert_eq!(loader.catalog().num_preload_requests(), 4);

        loader.clear_preloads_data(DataScope::LevelSpecific, &mut cache);

        let mut removed: Vec<FileEntryId> = cache.removed.iter().map(|(id, _)| *id).collect();
        let mut expected = level_files.clone();
        removed.sort();
        expected.sort();
        assert_eq!(removed, expected);
        assert!(cache
            .removed
            .iter()
            .all(|(_, scope)| *scope == DataScope::LevelSpecific));
        assert_eq!(loader.catalog().num_preload_requests(), 2);
        assert!(loader
            .catalog()
            .preload_request(ids::global_preload_request_id())
            .is_some());
    }

    #[test]
    fn test_release_clears_controls() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "controls.xml", CONTROLS);

        let (mut loader, mock) = loader_with(Rc::new(DebugNameStore::new()));
        loader
            .parse_controls_data(dir.path(), DataScope::Global)
            .expect("parse");
        loader.release();
        assert!(!loader.is_initialized());
        assert!(loader.catalog().is_empty());
        assert_eq!(mock.borrow().live_handles(), 0);
    }
}
