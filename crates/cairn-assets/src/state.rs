//! Per-key load state.

/// Where a key is in the loading pipeline.
///
/// The states are mutually exclusive. A key moves `Missing -> Pending` when a
/// load starts, then to `Loaded` or `Errored`, and back to `Missing` when it
/// is discarded or flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Nothing is known about the key.
    Missing,

    /// A load is in flight.
    Pending,

    /// Successfully loaded and cached.
    Loaded,

    /// The last load failed; the error is recorded.
    Errored,
}

impl LoadState {
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pending() {
        assert!(LoadState::Pending.is_pending());
        assert!(!LoadState::Missing.is_pending());
        assert!(!LoadState::Errored.is_pending());
    }
}
