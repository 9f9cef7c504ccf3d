//! Cairn asset cache - thread-safe loading and caching of game resources.
//!
//! This crate loads textures, fonts and raw files on demand or in the
//! background, caches them by [`AssetKey`] and releases them on discard or
//! close.
//!
//! # Overview
//!
//! - [`AssetManager`] - the cache. Single-flight [`get`](AssetManager::get),
//!   background [`preload`](AssetManager::preload), [`wait`](AssetManager::wait),
//!   [`discard`](AssetManager::discard) and [`close`](AssetManager::close).
//! - [`AssetLoader`] - decodes bytes for one [`AssetKind`]; registered in a
//!   [`LoaderRegistry`].
//! - [`FileSystem`] - where bytes come from: [`DiskFileSystem`] or
//!   [`MemoryFileSystem`].
//! - [`Resource`] - a cached value, either ready or decoded and awaiting
//!   promotion on first access.
//!
//! # Example
//!
//! ```no_run
//! use cairn_assets::prelude::*;
//!
//! # fn main() -> AssetResult<()> {
//! let manager = AssetManager::new(
//!     DiskFileSystem::new("assets"),
//!     ManagerConfig::new().with_file_path("data"),
//!     LoaderRegistry::with_defaults(),
//! )?;
//!
//! manager
//!     .preload([AssetKey::file("level1.dat"), AssetKey::file("level2.dat")], false)?
//!     .wait()?;
//!
//! let level = manager.file("level1.dat")?;
//! println!("level1 is {} bytes", level.len());
//!
//! manager.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Threading
//!
//! Every method takes `&self`. A key is loaded at most once at a time: callers
//! asking for a key that is already in flight block until it lands. One mutex
//! guards the whole cache; loaders run outside it.

mod asset;
mod cancel;
mod config;
mod error;
mod event;
mod io;
mod key;
mod loader;
mod manager;
mod pool;
mod preload;
mod state;
mod storage;

pub use asset::{Asset, DynAsset, RawFile, Resource, Stage, downcast_asset};
pub use cancel::CancelToken;
pub use config::ManagerConfig;
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, AssetEventBuffer};
pub use io::{ByteSource, DiskFileSystem, FileSystem, MemoryFileSystem};
pub use key::{AssetKey, AssetKind, join_path};
pub use loader::{AssetLoader, LoadContext, LoaderRegistry, RawFileLoader};
pub use manager::AssetManager;
pub use pool::WorkerPool;
pub use preload::{Preload, PreloadResult, PreloadStatus};
pub use state::LoadState;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Asset, AssetError, AssetEvent, AssetKey, AssetKind, AssetLoader, AssetManager,
        AssetResult, DiskFileSystem, FileSystem, LoadContext, LoadState, LoaderRegistry,
        ManagerConfig, MemoryFileSystem, Preload, PreloadResult, RawFile, Resource,
    };
}
