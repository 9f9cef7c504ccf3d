//! Asset events for change detection.

use std::collections::VecDeque;

use crate::key::AssetKey;

/// Events emitted by the asset cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetEvent {
    /// A load completed and the resource was cached.
    Loaded {
        /// The key that was loaded.
        key: AssetKey,
    },

    /// A decoded resource was converted to its final form.
    Promoted {
        /// The promoted key.
        key: AssetKey,
    },

    /// A load failed.
    LoadFailed {
        /// The key that failed.
        key: AssetKey,
        /// Error message.
        error: String,
    },

    /// A key was removed by `discard`.
    Discarded {
        /// The removed key.
        key: AssetKey,
    },

    /// A key was removed because a flushing preload did not ask for it.
    Flushed {
        /// The removed key.
        key: AssetKey,
    },
}

impl AssetEvent {
    /// The key this event relates to.
    pub fn key(&self) -> &AssetKey {
        match self {
            AssetEvent::Loaded { key }
            | AssetEvent::Promoted { key }
            | AssetEvent::LoadFailed { key, .. }
            | AssetEvent::Discarded { key }
            | AssetEvent::Flushed { key } => key,
        }
    }

    /// Check if this is a removal event.
    pub fn is_removed(&self) -> bool {
        matches!(self, AssetEvent::Discarded { .. } | AssetEvent::Flushed { .. })
    }

    /// Check if this is a failure event.
    pub fn is_failed(&self) -> bool {
        matches!(self, AssetEvent::LoadFailed { .. })
    }
}

/// A bounded buffer of asset events that can be drained by the consumer.
///
/// Once full, each push drops the oldest event. A capacity of zero disables
/// recording.
#[derive(Debug)]
pub struct AssetEventBuffer {
    events: VecDeque<AssetEvent>,
    capacity: usize,
    dropped: u64,
}

impl AssetEventBuffer {
    /// Events kept when no capacity is configured.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a new empty event buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new empty event buffer keeping at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Push an event to the buffer.
    pub fn push(&mut self, event: AssetEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take all events, oldest first.
    pub fn take(&mut self) -> Vec<AssetEvent> {
        self.events.drain(..).collect()
    }

    /// Check if there are any events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for AssetEventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_drains_in_order() {
        let mut buffer = AssetEventBuffer::new();
        buffer.push(AssetEvent::Loaded {
            key: AssetKey::texture("a.png"),
        });
        buffer.push(AssetEvent::Discarded {
            key: AssetKey::texture("a.png"),
        });
        assert_eq!(buffer.len(), 2);

        let events = buffer.take();
        assert!(buffer.is_empty());
        assert!(!events[0].is_removed());
        assert!(events[1].is_removed());
        assert_eq!(events[1].key(), &AssetKey::texture("a.png"));
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        let mut buffer = AssetEventBuffer::with_capacity(2);
        for name in ["a", "b", "c"] {
            buffer.push(AssetEvent::Loaded {
                key: AssetKey::file(name),
            });
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);

        let events = buffer.take();
        assert_eq!(events[0].key(), &AssetKey::file("b"));
        assert_eq!(events[1].key(), &AssetKey::file("c"));
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut buffer = AssetEventBuffer::with_capacity(0);
        buffer.push(AssetEvent::Discarded {
            key: AssetKey::file("a"),
        });
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped(), 0);
    }
}
