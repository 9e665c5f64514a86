//! Instance pools shared by the object, event and standalone-file managers.
//!
//! A pool keeps a reserve of constructed but unused instances up to a fixed
//! capacity and an ID counter for instances created on demand. Instances are
//! moved by value between the reserve and a manager's active map; the public
//! ID is the only reference anything else ever holds.

/// Monotonic ID counter that wraps to its minimum when exhausted.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    name: &'static str,
    next: u32,
    min: u32,
    max: u32,
}

impl IdGenerator {
    pub fn new(name: &'static str, min: u32, max: u32) -> Self {
        Self {
            name,
            next: min,
            min,
            max: max.max(min),
        }
    }

    /// Returns the next ID.
    ///
    /// Once the counter passes the maximum it logs an error and starts over at
    /// the minimum, accepting that a still-active ID may be handed out again.
    pub fn next_id(&mut self) -> u32 {
        if self.next > self.max || self.next < self.min {
            log::error!(
                "{} id counter exhausted, wrapping around to {}",
                self.name,
                self.min
            );
            self.next = self.min;
        }

        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Gives back the ID returned by the last `next_id` call.
    pub fn rollback(&mut self) {
        if self.next > self.min {
            self.next -= 1;
        }
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[derive(Debug)]
pub struct InstancePool<T> {
    reserve: Vec<T>,
    capacity: usize,
    ids: IdGenerator,
}

impl<T> InstancePool<T> {
    pub fn new(name: &'static str, capacity: usize, min_id: u32, max_id: u32) -> Self {
        Self {
            reserve: Vec::with_capacity(capacity),
            capacity,
            ids: IdGenerator::new(name, min_id, max_id),
        }
    }

    pub fn name(&self) -> &'static str {
        self.ids.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.reserve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reserve.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.reserve.len() >= self.capacity
    }

    pub fn next_id(&mut self) -> u32 {
        self.ids.next_id()
    }

    pub fn rollback_id(&mut self) {
        self.ids.rollback();
    }

    /// Pops a reserved instance, or creates one with a fresh ID.
    ///
    /// If `create` fails the ID is rolled back, a warning is logged and
    /// `None` is returned.
    pub fn acquire(&mut self, create: impl FnOnce(u32) -> Option<T>) -> Option<T> {
        match self.reserve.pop() {
            Some(instance) => Some(instance),
            None => self.create(create),
        }
    }

    /// Creates an instance with a fresh ID, bypassing the reserve.
    pub fn create(&mut self, create: impl FnOnce(u32) -> Option<T>) -> Option<T> {
        let id = self.ids.next_id();
        match create(id) {
            Some(instance) => Some(instance),
            None => {
                self.ids.rollback();
                log::warn!(
                    "failed to create a new instance for the {} pool (id {})",
                    self.ids.name,
                    id
                );
                None
            }
        }
    }

    /// Returns an instance to the reserve.
    ///
    /// Hands the instance back as `Err` when the reserve is already at
    /// capacity; the caller must then destroy it.
    pub fn release(&mut self, instance: T) -> Result<(), T> {
        if self.is_full() {
            Err(instance)
        } else {
            self.reserve.push(instance);
            Ok(())
        }
    }

    /// Adds an instance regardless of capacity. Used while pre-populating.
    pub fn push(&mut self, instance: T) {
        self.reserve.push(instance);
    }

    /// Removes the first reserved instance matching `predicate`.
    pub fn take_where(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.reserve.iter().position(predicate)?;
        Some(self.reserve.swap_remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.reserve.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.reserve.iter_mut()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.reserve.drain(..)
    }
}
