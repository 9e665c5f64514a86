//! Audio events: one running instance of a trigger implementation on an
//! audio object.

use crate::catalog::Subsystem;
use crate::context::AtlContext;
use crate::ids::{ControlId, EventId, ObjectId, TriggerImplId, TriggerInstanceId};
use crate::middleware::{NativeHandle, SharedImpl};
use crate::pool::InstancePool;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum EventState {
    #[default]
    None,
    Playing,
    PlayingDelayed,
    Loading,
    Unloading,
    Virtual,
}

#[derive(Debug)]
pub struct AudioEvent {
    id: EventId,
    native: Option<NativeHandle>,
    subsystem: Subsystem,
    pub(crate) object_id: ObjectId,
    pub(crate) trigger_id: ControlId,
    pub(crate) trigger_impl_id: TriggerImplId,
    pub(crate) trigger_instance_id: TriggerInstanceId,
    pub(crate) state: EventState,
    pub(crate) max_radius: f32,
    pub(crate) occlusion_fade_out_distance: f32,
}

impl AudioEvent {
    fn new(id: EventId, native: Option<NativeHandle>) -> Self {
        Self {
            id,
            native,
            subsystem: Subsystem::Middleware,
            object_id: ObjectId::INVALID,
            trigger_id: ControlId::INVALID,
            trigger_impl_id: TriggerImplId::INVALID,
            trigger_instance_id: TriggerInstanceId::INVALID,
            state: EventState::None,
            max_radius: 0.0,
            occlusion_fade_out_distance: 0.0,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn trigger_id(&self) -> ControlId {
        self.trigger_id
    }

    pub fn trigger_instance_id(&self) -> TriggerInstanceId {
        self.trigger_instance_id
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, EventState::Playing | EventState::PlayingDelayed)
    }

    fn clear(&mut self) {
        self.subsystem = Subsystem::Middleware;
        self.object_id = ObjectId::INVALID;
        self.trigger_id = ControlId::INVALID;
        self.trigger_impl_id = TriggerImplId::INVALID;
        self.trigger_instance_id = TriggerInstanceId::INVALID;
        self.state = EventState::None;
        self.max_radius = 0.0;
        self.occlusion_fade_out_distance = 0.0;
    }
}

pub struct EventManager {
    imp: Option<SharedImpl>,
    pool: InstancePool<AudioEvent>,
    active: HashMap<EventId, AudioEvent>,
}

impl EventManager {
    pub fn new(ctx: &AtlContext) -> Self {
        let config = ctx.config();
        Self {
            imp: None,
            pool: InstancePool::new("event", config.event_pool_size, 1, config.max_id),
            active: HashMap::new(),
        }
    }

    /// Fills the pool up to capacity and creates the native data of every
    /// pooled and active event.
    pub fn init(&mut self, imp: SharedImpl) {
        {
            let mut middleware = imp.borrow_mut();
            for event in self.pool.iter_mut().chain(self.active.values_mut()) {
                if event.native.is_none() {
                    event.native = middleware.new_audio_event(event.id);
                }
            }

            let total = self.pool.len() + self.active.len();
            for _ in total..self.pool.capacity() {
                let id = EventId(self.pool.next_id());
                match middleware.new_audio_event(id) {
                    Some(native) => self.pool.push(AudioEvent::new(id, Some(native))),
                    None => {
                        self.pool.rollback_id();
                        log::warn!("failed to pre-allocate audio event {}", id);
                        break;
                    }
                }
            }
        }

        self.imp = Some(imp);
        log::debug!("event manager initialized with {} pooled events", self.pool.len());
    }

    /// Deletes the native data of all events. Active events are returned to
    /// the pool first.
    pub fn release(&mut self) {
        let Some(imp) = self.imp.take() else {
            return;
        };
        let mut middleware = imp.borrow_mut();

        let ids: Vec<EventId> = self.active.keys().copied().collect();
        for id in ids {
            if let Some(mut event) = self.active.remove(&id) {
                event.clear();
                if let Some(native) = event.native {
                    middleware.reset_audio_event(native);
                }
                self.pool.push(event);
            }
        }

        let capacity = self.pool.capacity();
        let mut kept = Vec::with_capacity(capacity);
        for mut event in self.pool.drain() {
            if let Some(native) = event.native.take() {
                middleware.delete_audio_event(native);
            }
            if kept.len() < capacity {
                kept.push(event);
            }
        }
        for event in kept {
            self.pool.push(event);
        }
    }

    /// Hands out an event for `subsystem` and registers it as active.
    ///
    /// Returns `None` if the pool is empty and a new event could not be
    /// created. Events for the internal subsystem are not supported.
    pub fn get_event(&mut self, subsystem: Subsystem) -> Option<&mut AudioEvent> {
        if subsystem == Subsystem::Internal {
            log::error!("audio events for the internal subsystem are not supported");
            return None;
        }

        let imp = self.imp.clone();
        let mut event = self.pool.acquire(|id| {
            let id = EventId(id);
            match &imp {
                Some(imp) => imp
                    .borrow_mut()
                    .new_audio_event(id)
                    .map(|native| AudioEvent::new(id, Some(native))),
                None => Some(AudioEvent::new(id, None)),
            }
        })?;
        event.subsystem = subsystem;

        let id = event.id;
        if self.active.contains_key(&id) {
            log::warn!("audio event {} is still active, dropping request", id);
            self.recycle(event);
            return None;
        }
        Some(self.active.entry(id).or_insert(event))
    }

    pub fn lookup_id(&self, id: EventId) -> Option<&AudioEvent> {
        self.active.get(&id)
    }

    pub fn lookup_id_mut(&mut self, id: EventId) -> Option<&mut AudioEvent> {
        self.active.get_mut(&id)
    }

    /// Removes the event from the active set, resets it and returns it to the
    /// pool, or destroys it if the pool is full.
    pub fn release_event(&mut self, id: EventId) -> bool {
        match self.active.remove(&id) {
            Some(event) => {
                self.recycle(event);
                true
            }
            None => {
                log::warn!("release of unknown audio event {}", id);
                false
            }
        }
    }

    fn recycle(&mut self, mut event: AudioEvent) {
        event.clear();
        if let (Some(imp), Some(native)) = (&self.imp, event.native) {
            imp.borrow_mut().reset_audio_event(native);
        }

        if let Err(mut event) = self.pool.release(event) {
            if let (Some(imp), Some(native)) = (&self.imp, event.native.take()) {
                imp.borrow_mut().delete_audio_event(native);
            }
        }
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn num_pooled(&self) -> usize {
        self.pool.len()
    }

    pub fn active_events(&self) -> impl Iterator<Item = &AudioEvent> {
        self.active.values()
    }
}
