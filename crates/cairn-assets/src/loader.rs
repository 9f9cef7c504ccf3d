//! Asset loader traits and infrastructure.

use std::any::Any;
use std::io::Read;
use std::sync::Arc;

use cairn_core::alloc::HashMap;

use crate::asset::{DynAsset, RawFile, Resource};
use crate::cancel::CancelToken;
use crate::error::{AssetError, AssetResult};
use crate::key::{AssetKey, AssetKind};

/// Context provided to asset loaders during loading.
pub struct LoadContext<'a> {
    /// The key being loaded.
    pub key: &'a AssetKey,
    /// The resolved path the bytes come from.
    pub path: &'a str,
    /// The bytes of the asset.
    pub reader: &'a mut dyn Read,
    /// Cancelled when the manager shuts down.
    pub cancel: &'a CancelToken,
}

impl<'a> LoadContext<'a> {
    /// Create a new load context.
    pub fn new(
        key: &'a AssetKey,
        path: &'a str,
        reader: &'a mut dyn Read,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            key,
            path,
            reader,
            cancel,
        }
    }

    /// Read the whole byte source.
    pub fn read_to_end(&mut self) -> AssetResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader
            .read_to_end(&mut bytes)
            .map_err(|source| AssetError::Io {
                path: self.path.into(),
                source,
            })?;
        Ok(bytes)
    }

    /// A decode error for the path being loaded.
    pub fn error(&self, message: impl Into<String>) -> AssetError {
        AssetError::Loader {
            path: self.path.to_string(),
            message: message.into(),
        }
    }
}

/// Turns a byte source into a [`Resource`].
///
/// One loader is registered per [`AssetKind`]. The manager calls `load`
/// without holding its lock, possibly from several worker threads at once
/// (never twice at the same time for the same key).
///
/// # Example
///
/// ```ignore
/// struct TtfLoader;
///
/// impl AssetLoader for TtfLoader {
///     fn load(&self, mut ctx: LoadContext<'_>) -> AssetResult<Resource> {
///         let bytes = ctx.read_to_end()?;
///         let face = parse_ttf(&bytes).map_err(|e| ctx.error(e.to_string()))?;
///         Ok(Resource::ready(AssetKind::Font, face))
///     }
/// }
/// ```
pub trait AssetLoader: Send + Sync + 'static {
    /// Load an asset from the provided context.
    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Resource>;

    /// Convert a value returned through [`Resource::decoded`] into its final form.
    ///
    /// Runs on the thread that first asks for the key, under the manager's
    /// lock. Texture loaders use this to decode on a worker and upload on the
    /// thread that owns the graphics context.
    fn promote(&self, key: &AssetKey, decoded: Box<dyn Any + Send>) -> AssetResult<Arc<dyn DynAsset>> {
        drop(decoded);
        Err(AssetError::Loader {
            path: key.name().to_string(),
            message: "loader returned a decoded value but does not promote".to_string(),
        })
    }
}

/// Registry of asset loaders, one per kind.
#[derive(Default, Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<AssetKind, Arc<dyn AssetLoader>>,
}

impl LoaderRegistry {
    /// Create a new empty loader registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`RawFileLoader`] registered for [`AssetKind::File`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(AssetKind::File, RawFileLoader);
        registry
    }

    /// Register a loader for `kind`, replacing any previous one.
    pub fn register<L: AssetLoader>(&mut self, kind: AssetKind, loader: L) -> &mut Self {
        self.register_arc(kind, Arc::new(loader))
    }

    /// Register a shared loader for `kind`.
    pub fn register_arc(&mut self, kind: AssetKind, loader: Arc<dyn AssetLoader>) -> &mut Self {
        if self.loaders.insert(kind, loader).is_some() {
            tracing::debug!("Replaced loader for {} assets", kind);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<L: AssetLoader>(mut self, kind: AssetKind, loader: L) -> Self {
        self.register(kind, loader);
        self
    }

    /// Get the loader for a kind.
    pub fn get(&self, kind: AssetKind) -> AssetResult<&Arc<dyn AssetLoader>> {
        self.loaders.get(&kind).ok_or(AssetError::NoLoader { kind })
    }

    /// Check if a loader is registered for a kind.
    pub fn has_loader_for(&self, kind: AssetKind) -> bool {
        self.loaders.contains_key(&kind)
    }
}

/// Reads raw files into a [`RawFile`].
pub struct RawFileLoader;

impl AssetLoader for RawFileLoader {
    fn load(&self, mut ctx: LoadContext<'_>) -> AssetResult<Resource> {
        let bytes = ctx.read_to_end()?;
        Ok(Resource::ready(AssetKind::File, RawFile::new(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::downcast_asset;

    struct Upper;

    impl AssetLoader for Upper {
        fn load(&self, mut ctx: LoadContext<'_>) -> AssetResult<Resource> {
            let bytes = ctx.read_to_end()?;
            let text = String::from_utf8(bytes).map_err(|e| ctx.error(e.to_string()))?;
            Ok(Resource::decoded(AssetKind::Texture, text))
        }

        fn promote(&self, _key: &AssetKey, decoded: Box<dyn Any + Send>) -> AssetResult<Arc<dyn DynAsset>> {
            let text = decoded.downcast::<String>().map_err(|_| AssetError::Loader {
                path: String::new(),
                message: "not a string".into(),
            })?;
            Ok(Arc::new(RawFile::new(text.to_uppercase().into_bytes())))
        }
    }

    fn run(loader: &dyn AssetLoader, key: &AssetKey, bytes: &[u8]) -> AssetResult<Resource> {
        let mut reader = bytes;
        let cancel = CancelToken::new();
        loader.load(LoadContext::new(key, key.name(), &mut reader, &cancel))
    }

    #[test]
    fn test_raw_file_loader() {
        let key = AssetKey::file("data.bin");
        let resource = run(&RawFileLoader, &key, &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(resource.kind(), AssetKind::File);
        let file = downcast_asset::<RawFile>(resource.ready_value().unwrap().clone()).unwrap();
        assert_eq!(&file[..], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_error_carries_path() {
        let key = AssetKey::texture("bad.txt");
        let err = run(&Upper, &key, &[0xff, 0xfe]).unwrap_err();
        match err {
            AssetError::Loader { path, .. } => assert_eq!(path, "bad.txt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_promote() {
        let key = AssetKey::texture("hello.txt");
        let resource = run(&Upper, &key, b"hello").unwrap();
        assert!(!resource.is_ready());
        let crate::asset::Stage::Decoded(decoded) = resource.into_stage() else {
            panic!("expected a decoded value");
        };
        let promoted = Upper.promote(&key, decoded).unwrap();
        let file = downcast_asset::<RawFile>(promoted).unwrap();
        assert_eq!(&file[..], b"HELLO");
    }

    #[test]
    fn test_default_promote_fails() {
        let key = AssetKey::file("x");
        assert!(RawFileLoader.promote(&key, Box::new(1u32)).is_err());
    }

    #[test]
    fn test_registry() {
        let mut registry = LoaderRegistry::with_defaults();
        assert!(registry.has_loader_for(AssetKind::File));
        assert!(!registry.has_loader_for(AssetKind::Texture));
        assert!(matches!(
            registry.get(AssetKind::Font),
            Err(AssetError::NoLoader { kind: AssetKind::Font })
        ));

        registry.register(AssetKind::Texture, Upper);
        assert!(registry.get(AssetKind::Texture).is_ok());
    }
}
