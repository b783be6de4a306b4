//! Bounded batching buffer.
//!
//! Admission is a pre-check on the current contents:
//! - Rejected once the message count reaches `max_elements`
//! - Rejected once the summed payload size reaches `max_size_bytes`
//!
//! The candidate's own size is not part of the check, so a single oversized
//! message is still admitted into an empty buffer. The call after it is
//! rejected.

use thiserror::Error;

use crate::message::Measured;

/// Error type for invalid buffer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitsError {
    #[error("max_elements must be positive")]
    ZeroElements,

    #[error("max_size_bytes must be positive")]
    ZeroSize,
}

/// Capacity limits for a batching buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    max_elements: usize,
    max_size_bytes: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_elements: 100,
            max_size_bytes: 1024 * 1024,
        }
    }
}

impl BufferLimits {
    /// Create limits, rejecting zero values.
    pub fn new(max_elements: usize, max_size_bytes: usize) -> Result<Self, LimitsError> {
        if max_elements == 0 {
            return Err(LimitsError::ZeroElements);
        }
        if max_size_bytes == 0 {
            return Err(LimitsError::ZeroSize);
        }
        Ok(Self {
            max_elements,
            max_size_bytes,
        })
    }

    /// Maximum number of messages held at once.
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Maximum cumulative payload size held at once.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }
}

/// Staging area for messages awaiting dispatch.
///
/// Not internally synchronized: a single writer calls [`add`](Self::add)
/// and performs the [`copy`](Self::copy) + [`reset`](Self::reset) drain at a
/// batch boundary. Use [`SharedBuffer`](super::shared::SharedBuffer) when
/// several producers write concurrently.
#[derive(Debug, Clone)]
pub struct BatchBuffer<M> {
    limits: BufferLimits,
    items: Vec<M>,
}

impl<M: Measured> BatchBuffer<M> {
    /// Create an empty buffer with the given limits.
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            limits,
            items: Vec::new(),
        }
    }

    /// Create an empty buffer, validating the raw limit values.
    pub fn with_limits(max_elements: usize, max_size_bytes: usize) -> Result<Self, LimitsError> {
        Ok(Self::new(BufferLimits::new(max_elements, max_size_bytes)?))
    }

    /// Add a message to the buffer.
    ///
    /// Returns `false` without touching the buffer when either limit has
    /// already been reached. The caller keeps the message and resubmits it
    /// after draining.
    pub fn add(&mut self, message: &M) -> bool
    where
        M: Clone,
    {
        if self.is_full() {
            return false;
        }
        self.items.push(message.clone());
        true
    }

    /// Owned variant of [`add`](Self::add).
    ///
    /// On rejection the message is handed back in `Err`.
    pub fn try_add(&mut self, message: M) -> Result<(), M> {
        if self.is_full() {
            return Err(message);
        }
        self.items.push(message);
        Ok(())
    }

    /// Number of messages currently stored.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the buffer holds `max_elements` messages.
    pub fn count_limit_reached(&self) -> bool {
        self.len() >= self.limits.max_elements
    }

    /// True when the stored payloads sum to at least `max_size_bytes`.
    ///
    /// Scans the contents on every call; the scan is bounded by
    /// `max_elements`.
    pub fn size_limit_reached(&self) -> bool {
        self.size_bytes() >= self.limits.max_size_bytes
    }

    /// Summed payload size of the stored messages, saturating at `usize::MAX`.
    ///
    /// The last admitted message may push the sum past the limit, so the
    /// total is not bounded by `max_size_bytes`.
    pub fn size_bytes(&self) -> usize {
        self.items
            .iter()
            .fold(0usize, |acc, m| acc.saturating_add(m.size_bytes()))
    }

    /// Independent snapshot of the stored messages, in insertion order.
    pub fn copy(&self) -> Vec<M>
    where
        M: Clone,
    {
        self.items.clone()
    }

    /// Drop all stored messages.
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Move the stored messages out, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Vec<M> {
        std::mem::take(&mut self.items)
    }

    pub fn limits(&self) -> BufferLimits {
        self.limits
    }

    /// Either limit has been reached; the next admission will fail.
    pub fn is_full(&self) -> bool {
        self.count_limit_reached() || self.size_limit_reached()
    }
}
