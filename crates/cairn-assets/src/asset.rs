//! Loaded values and their release operation.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::AssetResult;
use crate::key::AssetKind;

/// A value the cache can hold.
///
/// `close` is the release operation. The manager calls it exactly once, when
/// the key is discarded or flushed, or when the manager is closed. Callers may
/// still hold an `Arc` to the value afterwards; using a closed value is the
/// caller's problem.
pub trait Asset: Send + Sync + 'static {
    /// Human-readable type name, used in error messages.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Free whatever the value holds outside of Rust memory.
    fn close(&self) -> AssetResult<()> {
        Ok(())
    }
}

/// Object-safe view of an [`Asset`].
pub trait DynAsset: Send + Sync {
    /// The [`Asset::type_name`] of the concrete type.
    fn asset_type_name(&self) -> &'static str;

    /// Calls [`Asset::close`].
    fn release(&self) -> AssetResult<()>;

    /// Upcast for downcasting to the concrete type.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Asset> DynAsset for T {
    fn asset_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn release(&self) -> AssetResult<()> {
        Asset::close(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Downcast a type-erased asset, or `None` if it is not a `T`.
pub fn downcast_asset<T: Asset>(asset: Arc<dyn DynAsset>) -> Option<Arc<T>> {
    asset.into_any().downcast::<T>().ok()
}

/// How far along a resource is.
pub enum Stage {
    /// Decoded off-thread, waiting to be promoted on first access.
    Decoded(Box<dyn Any + Send>),
    /// Usable.
    Ready(Arc<dyn DynAsset>),
}

/// What a loader produces: a value tagged with the kind it claims to be.
///
/// The tag is what the accessors check against the requested kind.
pub struct Resource {
    kind: AssetKind,
    stage: Stage,
}

impl Resource {
    /// A resource that is ready for use.
    pub fn ready<T: Asset>(kind: AssetKind, asset: T) -> Self {
        Self::from_dyn(kind, Arc::new(asset))
    }

    /// A ready resource from an already type-erased value.
    pub fn from_dyn(kind: AssetKind, asset: Arc<dyn DynAsset>) -> Self {
        Self {
            kind,
            stage: Stage::Ready(asset),
        }
    }

    /// A decoded value that the kind's loader promotes on first access.
    pub fn decoded<D: Any + Send>(kind: AssetKind, decoded: D) -> Self {
        Self {
            kind,
            stage: Stage::Decoded(Box::new(decoded)),
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready(_))
    }

    /// The ready value, if promoted.
    pub fn ready_value(&self) -> Option<&Arc<dyn DynAsset>> {
        match &self.stage {
            Stage::Ready(asset) => Some(asset),
            Stage::Decoded(_) => None,
        }
    }

    pub(crate) fn into_stage(self) -> Stage {
        self.stage
    }

    /// Run the release operation. Decoded values own nothing to release.
    pub(crate) fn release(self) -> AssetResult<()> {
        match self.stage {
            Stage::Ready(asset) => asset.release(),
            Stage::Decoded(_) => Ok(()),
        }
    }
}

impl fmt::Debug for dyn DynAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynAsset").field(&self.asset_type_name()).finish()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match &self.stage {
            Stage::Decoded(_) => "decoded",
            Stage::Ready(asset) => asset.asset_type_name(),
        };
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("stage", &stage)
            .finish()
    }
}

/// The contents of a raw file asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile(Vec<u8>);

impl RawFile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for RawFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Asset for RawFile {
    fn type_name() -> &'static str {
        "raw file"
    }
}
