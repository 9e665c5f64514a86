//! Listeners. A small fixed set of IDs from the reserved range; the first one
//! is the default listener all distance math is relative to.

use crate::context::AtlContext;
use crate::ids::ListenerId;
use crate::math::Object3DAttributes;
use crate::middleware::{NativeHandle, SharedImpl};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    native: NativeHandle,
    attributes: Object3DAttributes,
    dirty: bool,
}

impl Listener {
    fn new(id: ListenerId, native: NativeHandle) -> Self {
        Self {
            id,
            native,
            attributes: Object3DAttributes::default(),
            dirty: false,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn native(&self) -> NativeHandle {
        self.native
    }

    pub fn attributes(&self) -> &Object3DAttributes {
        &self.attributes
    }
}

pub struct ListenerManager {
    default_listener_id: ListenerId,
    num_listeners: u32,
    imp: Option<SharedImpl>,
    default_listener: Option<Listener>,
    pool: Vec<Listener>,
    active: HashMap<ListenerId, Listener>,
}

impl ListenerManager {
    pub fn new(ctx: &AtlContext) -> Self {
        let config = ctx.config();
        Self {
            default_listener_id: ListenerId(config.default_listener_id),
            num_listeners: config.num_listeners,
            imp: None,
            default_listener: None,
            pool: Vec::new(),
            active: HashMap::new(),
        }
    }

    /// Creates the default listener and the rest of the listener pool.
    pub fn init(&mut self, imp: SharedImpl) {
        {
            let mut middleware = imp.borrow_mut();
            let default_id = self.default_listener_id;
            match middleware.new_default_audio_listener(default_id) {
                Some(native) => self.default_listener = Some(Listener::new(default_id, native)),
                None => log::warn!("failed to create the default listener {}", default_id),
            }

            for offset in 1..self.num_listeners {
                let id = ListenerId(default_id.0 + offset);
                match middleware.new_audio_listener(id) {
                    Some(native) => self.pool.push(Listener::new(id, native)),
                    None => log::warn!("failed to create listener {}", id),
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

        if let Some(listener) = self.default_listener.take() {
            middleware.delete_audio_listener(listener.native);
        }
        for listener in self.pool.drain(..) {
            middleware.delete_audio_listener(listener.native);
        }
        for (_, listener) in self.active.drain() {
            middleware.delete_audio_listener(listener.native);
        }
    }

    /// Forwards changed listener attributes to the middleware.
    pub fn update(&mut self) {
        let Some(imp) = &self.imp else {
            return;
        };
        let mut middleware = imp.borrow_mut();
        for listener in self
            .default_listener
            .iter_mut()
            .chain(self.active.values_mut())
            .filter(|l| l.dirty)
        {
            middleware.set_listener_3d_attributes(listener.native, &listener.attributes);
            listener.dirty = false;
        }
    }

    pub fn reserve_id(&mut self) -> Option<ListenerId> {
        let Some(listener) = self.pool.pop() else {
            log::warn!("no free listener left");
            return None;
        };
        let id = listener.id;
        self.active.insert(id, listener);
        Some(id)
    }

    /// Returns a reserved listener to the pool. The default listener is never
    /// released this way.
    pub fn release_id(&mut self, id: ListenerId) -> bool {
        match self.active.remove(&id) {
            Some(mut listener) => {
                listener.attributes = Object3DAttributes::default();
                listener.dirty = false;
                self.pool.push(listener);
                true
            }
            None => false,
        }
    }

    pub fn lookup_id(&self, id: ListenerId) -> Option<&Listener> {
        match &self.default_listener {
            Some(listener) if listener.id == id => Some(listener),
            _ => self.active.get(&id),
        }
    }

    pub fn set_3d_attributes(&mut self, id: ListenerId, attributes: Object3DAttributes) -> bool {
        let listener = match self.default_listener.as_mut() {
            Some(listener) if listener.id == id => Some(listener),
            _ => self.active.get_mut(&id),
        };
        match listener {
            Some(listener) => {
                listener.attributes = attributes;
                listener.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn default_listener_id(&self) -> ListenerId {
        self.default_listener_id
    }

    /// Attributes of the default listener, or null attributes if it does
    /// not exist yet.
    pub fn default_listener_attributes(&self) -> Object3DAttributes {
        self.default_listener
            .as_ref()
            .map_or_else(Object3DAttributes::null, |l| l.attributes)
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn num_pooled(&self) -> usize {
        self.pool.len()
    }
}
