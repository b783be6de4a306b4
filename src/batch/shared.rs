//! Lock-guarded batching buffer for concurrent producers.
//!
//! Every operation holds the mutex for its whole duration, so two producers
//! can never both pass the limit check when only one slot is left.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::buffer::{BatchBuffer, BufferLimits};
use crate::message::Measured;

/// Cloneable handle to a buffer shared between producers and a drain routine.
#[derive(Debug)]
pub struct SharedBuffer<M> {
    inner: Arc<Mutex<BatchBuffer<M>>>,
}

impl<M> Clone for SharedBuffer<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Measured> SharedBuffer<M> {
    /// Create an empty shared buffer with the given limits.
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatchBuffer::new(limits))),
        }
    }

    // The buffer is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, BatchBuffer<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`BatchBuffer::add`].
    pub fn add(&self, message: &M) -> bool
    where
        M: Clone,
    {
        self.lock().add(message)
    }

    /// See [`BatchBuffer::try_add`].
    pub fn try_add(&self, message: M) -> Result<(), M> {
        self.lock().try_add(message)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count_limit_reached(&self) -> bool {
        self.lock().count_limit_reached()
    }

    pub fn size_limit_reached(&self) -> bool {
        self.lock().size_limit_reached()
    }

    pub fn copy(&self) -> Vec<M>
    where
        M: Clone,
    {
        self.lock().copy()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Take the current contents and clear the buffer under one lock.
    ///
    /// Unlike a separate `copy` then `reset`, no producer can slip a message
    /// in between the two steps and have it discarded.
    pub fn drain(&self) -> Vec<M> {
        self.lock().take()
    }

    pub fn limits(&self) -> BufferLimits {
        self.lock().limits()
    }
}
