//! Error types for the asset cache.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::key::{AssetKey, AssetKind};

/// Errors that can occur during asset operations.
#[derive(Debug)]
pub enum AssetError {
    /// The requested asset or file was not found.
    NotFound {
        /// The path or identifier of the asset.
        path: String,
    },

    /// Failed to read asset data from storage.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The cached resource is not of the kind or type the caller asked for.
    WrongKind {
        /// The key that was looked up.
        key: AssetKey,
        /// What the caller expected.
        expected: &'static str,
    },

    /// Loading a key failed. Wraps the underlying failure.
    LoadFailure {
        /// The key being loaded.
        key: AssetKey,
        /// The underlying error, shared with every waiter on the key.
        source: Arc<AssetError>,
    },

    /// The loader failed to decode the asset.
    Loader {
        /// The resolved path being loaded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// The loader panicked while loading or promoting an asset.
    LoaderPanicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// No loader registered for this asset kind.
    NoLoader {
        /// The kind without a loader.
        kind: AssetKind,
    },

    /// The load was cancelled before it completed.
    Cancelled,

    /// The manager has been closed.
    Closed,

    /// A loader thread could not be started.
    WorkerSpawn {
        /// The error from the OS.
        source: std::io::Error,
    },

    /// Several keys failed. Sorted by key.
    AggregateFailure(Vec<(AssetKey, Arc<AssetError>)>),

    /// Releasing a resource failed.
    Release {
        /// The key whose resource failed to release.
        key: AssetKey,
        /// Description of the error.
        message: String,
    },
}

impl AssetError {
    /// The error returned for a key whose load failed with `source`.
    pub fn load_failure(key: &AssetKey, source: Arc<AssetError>) -> Self {
        AssetError::LoadFailure {
            key: key.clone(),
            source,
        }
    }

    /// Build an aggregate from per-key errors, or `None` when there are none.
    pub fn aggregate(mut errors: Vec<(AssetKey, Arc<AssetError>)>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        errors.sort_by(|a, b| a.0.cmp(&b.0));
        Some(AssetError::AggregateFailure(errors))
    }

    /// The innermost error, skipping `LoadFailure` wrappers.
    pub fn root_cause(&self) -> &AssetError {
        match self {
            AssetError::LoadFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` if this error, or the error it wraps, is `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), AssetError::NotFound { .. })
    }

    /// Returns `true` if the error comes from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), AssetError::Cancelled)
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => write!(f, "asset not found: {}", path),
            AssetError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::WrongKind { key, expected } => {
                write!(f, "{} is not a {}", key, expected)
            }
            AssetError::LoadFailure { key, source } => write!(f, "load {}: {}", key, source),
            AssetError::Loader { path, message } => {
                write!(f, "failed to decode '{}': {}", path, message)
            }
            AssetError::LoaderPanicked { message } => write!(f, "loader panicked: {}", message),
            AssetError::NoLoader { kind } => write!(f, "no loader registered for {} assets", kind),
            AssetError::Cancelled => write!(f, "load cancelled"),
            AssetError::Closed => write!(f, "asset manager is closed"),
            AssetError::WorkerSpawn { source } => {
                write!(f, "failed to spawn loader thread: {}", source)
            }
            AssetError::AggregateFailure(errors) => {
                for (i, (key, err)) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}: {}", key, err)?;
                }
                Ok(())
            }
            AssetError::Release { key, message } => write!(f, "close {}: {}", key, message),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } | AssetError::WorkerSpawn { source } => Some(source),
            AssetError::LoadFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failure_root_cause() {
        let key = AssetKey::font("missing.ttf");
        let err = AssetError::load_failure(
            &key,
            Arc::new(AssetError::NotFound {
                path: "fonts/missing.ttf".into(),
            }),
        );
        assert!(err.is_not_found());
        assert!(!err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "load font asset missing.ttf: asset not found: fonts/missing.ttf"
        );
    }

    #[test]
    fn test_aggregate_sorted_and_empty() {
        assert!(AssetError::aggregate(Vec::new()).is_none());

        let errs = vec![
            (AssetKey::texture("b.png"), Arc::new(AssetError::Cancelled)),
            (AssetKey::texture("a.png"), Arc::new(AssetError::Closed)),
        ];
        let aggregate = AssetError::aggregate(errs).unwrap();
        assert_eq!(
            aggregate.to_string(),
            "texture asset a.png: asset manager is closed\ntexture asset b.png: load cancelled"
        );
        let AssetError::AggregateFailure(sorted) = aggregate else {
            panic!("expected an aggregate");
        };
        assert_eq!(sorted[0].0, AssetKey::texture("a.png"));
    }

    #[test]
    fn test_worker_spawn_display() {
        use std::error::Error;
        let err = AssetError::WorkerSpawn {
            source: std::io::Error::other("resource temporarily unavailable"),
        };
        assert_eq!(
            err.to_string(),
            "failed to spawn loader thread: resource temporarily unavailable"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;
        let err: AssetError = std::io::Error::other("boom").into();
        assert!(err.source().is_some());
    }
}
