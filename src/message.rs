//! Measured messages.
//!
//! The batching buffer only needs one property of a message: how many bytes
//! its payload occupies. Producers expose that through [`Measured`], so the
//! size limit is deterministic instead of depending on in-memory layout.

use std::sync::Arc;

use crate::{generate_correlation_id, now_millis};

/// A message with a stable, explicit payload size.
pub trait Measured {
    /// Number of payload bytes this message accounts for.
    fn size_bytes(&self) -> usize;
}

impl Measured for Vec<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl Measured for [u8] {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl Measured for String {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl Measured for str {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl<T: Measured + ?Sized> Measured for &T {
    fn size_bytes(&self) -> usize {
        (**self).size_bytes()
    }
}

impl<T: Measured + ?Sized> Measured for Arc<T> {
    fn size_bytes(&self) -> usize {
        (**self).size_bytes()
    }
}

impl<T: Measured + ?Sized> Measured for Box<T> {
    fn size_bytes(&self) -> usize {
        (**self).size_bytes()
    }
}

/// Message envelope staged for multiplexed dispatch.
///
/// The payload is immutable and reference counted: cloning an envelope
/// (which the buffer does when it hands out a batch copy) shares the bytes
/// rather than duplicating them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    correlation_id: String,
    topic: Option<String>,
    timestamp: i64,
    payload: Arc<[u8]>,
}

impl Envelope {
    /// Wrap a payload in a new envelope with a fresh correlation ID.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            correlation_id: generate_correlation_id(),
            topic: None,
            timestamp: now_millis(),
            payload: Arc::from(payload.into()),
        }
    }

    /// Attach a topic label used for routing on the demultiplexing side.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Handle used to route a response back to the producer.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Creation time in Unix milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Measured for Envelope {
    fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_size_is_payload_length() {
        let envelope = Envelope::new(b"hello world".to_vec());
        assert_eq!(envelope.size_bytes(), 11);
        assert!(envelope.timestamp() > 1704067200000); // After 2024
    }

    #[test]
    fn test_topic_does_not_count_toward_size() {
        let envelope = Envelope::new("abc").with_topic("a-very-long-topic-name");
        assert_eq!(envelope.size_bytes(), 3);
        assert_eq!(envelope.topic(), Some("a-very-long-topic-name"));
    }

    #[test]
    fn test_envelopes_get_distinct_correlation_ids() {
        let a = Envelope::new("x");
        let b = Envelope::new("x");
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert!(uuid::Uuid::parse_str(a.correlation_id()).is_ok());
    }

    #[test]
    fn test_clone_shares_payload() {
        let a = Envelope::new(vec![7u8; 64]);
        let b = a.clone();
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.payload().as_ptr(), b.payload().as_ptr()));
    }

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(String::from("four").size_bytes(), 4);
        assert_eq!("three".size_bytes(), 5);
        assert_eq!(vec![0u8; 9].size_bytes(), 9);
        assert_eq!(Arc::new(vec![0u8; 2]).size_bytes(), 2);
    }
}
