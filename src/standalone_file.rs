//! Standalone files: one-off playback of a file that is not part of the
//! control catalog. Their ID is the hash of the file path.

use crate::context::AtlContext;
use crate::ids::{ObjectId, StandaloneFileId};
use crate::middleware::{NativeHandle, SharedImpl};
use crate::pool::InstancePool;
use crate::request::SenderId;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StandaloneFileState {
    #[default]
    None,
    Loading,
    Playing,
    Stopping,
}

#[derive(Debug)]
pub struct StandaloneFile {
    id: StandaloneFileId,
    native: Option<NativeHandle>,
    pub(crate) object_id: ObjectId,
    pub(crate) state: StandaloneFileState,
    pub(crate) path: String,
    pub(crate) owner: Option<SenderId>,
}

impl StandaloneFile {
    fn new(id: StandaloneFileId, native: Option<NativeHandle>) -> Self {
        Self {
            id,
            native,
            object_id: ObjectId::INVALID,
            state: StandaloneFileState::None,
            path: String::new(),
            owner: None,
        }
    }

    pub fn id(&self) -> StandaloneFileId {
        self.id
    }

    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn state(&self) -> StandaloneFileState {
        self.state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn owner(&self) -> Option<SenderId> {
        self.owner
    }

    pub fn is_playing(&self) -> bool {
        self.state == StandaloneFileState::Playing
    }

    fn clear(&mut self) {
        self.object_id = ObjectId::INVALID;
        self.state = StandaloneFileState::None;
        self.path.clear();
        self.owner = None;
    }
}

pub struct StandaloneFileManager {
    imp: Option<SharedImpl>,
    pool: InstancePool<StandaloneFile>,
    active: HashMap<StandaloneFileId, StandaloneFile>,
}

impl StandaloneFileManager {
    pub fn new(ctx: &AtlContext) -> Self {
        let config = ctx.config();
        Self {
            imp: None,
            pool: InstancePool::new(
                "standalone file",
                config.standalone_file_pool_size,
                1,
                config.max_id,
            ),
            active: HashMap::new(),
        }
    }

    pub fn init(&mut self, imp: SharedImpl) {
        {
            let mut middleware = imp.borrow_mut();
            for file in self.pool.iter_mut().chain(self.active.values_mut()) {
                if file.native.is_none() {
                    file.native = middleware.new_audio_standalone_file();
                }
            }

            let total = self.pool.len() + self.active.len();
            for _ in total..self.pool.capacity() {
                let id = StandaloneFileId(self.pool.next_id());
                match middleware.new_audio_standalone_file() {
                    Some(native) => self.pool.push(StandaloneFile::new(id, Some(native))),
                    None => {
                        self.pool.rollback_id();
                        log::warn!("failed to pre-allocate standalone file {}", id);
                        break;
                    }
                }
            }
        }

        self.imp = Some(imp);
    }

    pub fn release(&mut self) {
        let Some(imp) = self.imp.take() else {
            return;
        };
        let mut middleware = imp.borrow_mut();

        let capacity = self.pool.capacity();
        let active: Vec<StandaloneFile> = self.active.drain().map(|(_, file)| file).collect();
        let mut kept = Vec::with_capacity(capacity);
        for mut file in active.into_iter().chain(self.pool.drain()) {
            file.clear();
            if let Some(native) = file.native.take() {
                middleware.reset_audio_standalone_file(native);
                middleware.delete_audio_standalone_file(native);
            }
            if kept.len() < capacity {
                kept.push(file);
            }
        }
        for file in kept {
            self.pool.push(file);
        }
    }

    /// Hands out a standalone file for `path` owned by `object_id`.
    ///
    /// Returns `None` if no instance could be created, or if a file with the
    /// same path hash is already active.
    pub fn get_standalone_file(
        &mut self,
        object_id: ObjectId,
        path: &str,
    ) -> Option<&mut StandaloneFile> {
        let id = StandaloneFileId::from_name(path);
        if self.active.contains_key(&id) {
            log::warn!(
                "standalone file {} ({}) is already active, dropping request",
                id,
                path
            );
            return None;
        }

        let imp = self.imp.clone();
        let mut file = self.pool.acquire(|pool_id| {
            let pool_id = StandaloneFileId(pool_id);
            match &imp {
                Some(imp) => imp
                    .borrow_mut()
                    .new_audio_standalone_file()
                    .map(|native| StandaloneFile::new(pool_id, Some(native))),
                None => Some(StandaloneFile::new(pool_id, None)),
            }
        })?;

        file.id = id;
        file.object_id = object_id;
        file.path = path.to_string();
        Some(self.active.entry(id).or_insert(file))
    }

    pub fn lookup_id(&self, id: StandaloneFileId) -> Option<&StandaloneFile> {
        self.active.get(&id)
    }

    pub fn lookup_id_mut(&mut self, id: StandaloneFileId) -> Option<&mut StandaloneFile> {
        self.active.get_mut(&id)
    }

    pub fn release_standalone_file(&mut self, id: StandaloneFileId) -> bool {
        let Some(mut file) = self.active.remove(&id) else {
            log::warn!("release of unknown standalone file {}", id);
            return false;
        };

        file.clear();
        if let (Some(imp), Some(native)) = (&self.imp, file.native) {
            imp.borrow_mut().reset_audio_standalone_file(native);
        }
        if let Err(mut file) = self.pool.release(file) {
            if let (Some(imp), Some(native)) = (&self.imp, file.native.take()) {
                imp.borrow_mut().delete_audio_standalone_file(native);
            }
        }
        true
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn num_pooled(&self) -> usize {
        self.pool.len()
    }
}
