//! Construction-time settings for the asset manager.

use crate::event::AssetEventBuffer;
use crate::key::{AssetKey, AssetKind, join_path};
use crate::pool::WorkerPool;

/// Settings for an [`AssetManager`](crate::AssetManager).
///
/// Fixed once the manager is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Base directory for textures.
    pub texture_path: String,
    /// Base directory for fonts.
    pub font_path: String,
    /// Base directory for raw files.
    pub file_path: String,
    /// Number of background workers. `None` uses [`WorkerPool::default_size`].
    pub workers: Option<usize>,
    /// Undrained events kept before the oldest are dropped. Zero disables events.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            texture_path: String::new(),
            font_path: String::new(),
            file_path: String::new(),
            workers: None,
            event_capacity: AssetEventBuffer::DEFAULT_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Create default settings: no base directories, default worker count and
    /// event capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base directory for textures.
    pub fn with_texture_path(mut self, path: impl Into<String>) -> Self {
        self.texture_path = path.into();
        self
    }

    /// Set the base directory for fonts.
    pub fn with_font_path(mut self, path: impl Into<String>) -> Self {
        self.font_path = path.into();
        self
    }

    /// Set the base directory for raw files.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    /// Set the number of background workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set how many undrained events are kept.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// The base directory for a kind.
    pub fn base_path(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Font => &self.font_path,
            AssetKind::Texture => &self.texture_path,
            AssetKind::File => &self.file_path,
        }
    }

    /// The path a key is read from.
    pub fn resolve(&self, key: &AssetKey) -> String {
        join_path(self.base_path(key.kind()), key.name())
    }

    /// Worker count after applying the default. Never zero.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(WorkerPool::default_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_per_kind() {
        let config = ManagerConfig::new()
            .with_texture_path("assets/textures")
            .with_font_path("assets/fonts/")
            .with_file_path("");

        assert_eq!(config.resolve(&AssetKey::texture("a.png")), "assets/textures/a.png");
        assert_eq!(config.resolve(&AssetKey::font("sans.ttf")), "assets/fonts/sans.ttf");
        assert_eq!(config.resolve(&AssetKey::file("level.dat")), "level.dat");
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(ManagerConfig::new().with_workers(3).worker_count(), 3);
        assert_eq!(ManagerConfig::new().with_workers(0).worker_count(), 1);
        assert_eq!(ManagerConfig::new().worker_count(), WorkerPool::default_size());
    }

    #[test]
    fn test_event_capacity() {
        assert_eq!(ManagerConfig::new().event_capacity, AssetEventBuffer::DEFAULT_CAPACITY);
        assert_eq!(ManagerConfig::new().with_event_capacity(0).event_capacity, 0);
    }
}
