//! Asset manager - the main coordinator for asset operations.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex, MutexGuard};

use cairn_core::alloc::HashSet;

use crate::asset::{Asset, DynAsset, RawFile, Resource, Stage, downcast_asset};
use crate::cancel::CancelToken;
use crate::config::ManagerConfig;
use crate::error::{AssetError, AssetResult};
use crate::event::AssetEvent;
use crate::io::FileSystem;
use crate::key::AssetKey;
use crate::loader::{LoadContext, LoaderRegistry};
use crate::pool::WorkerPool;
use crate::preload::{Preload, PreloadResult};
use crate::state::LoadState;
use crate::storage::CacheStore;

/// State shared between the manager and its workers.
struct Shared {
    config: ManagerConfig,
    fs: Box<dyn FileSystem>,
    loaders: LoaderRegistry,
    /// Guards every state transition.
    store: Mutex<CacheStore>,
    /// Signalled whenever a key leaves the pending set or the manager closes.
    cond: Condvar,
    cancel: CancelToken,
}

impl Shared {
    /// Read and decode one key. Called without the lock.
    fn load(&self, key: &AssetKey) -> AssetResult<Resource> {
        guarded(|| {
            self.cancel.check()?;
            let loader = self.loaders.get(key.kind())?;
            let path = self.config.resolve(key);
            let mut reader = self.fs.open(&path)?;
            loader.load(LoadContext::new(key, &path, &mut *reader, &self.cancel))
        })
    }

    /// `Pending -> Loaded/Errored`, then wake every waiter.
    fn finish(&self, key: &AssetKey, result: AssetResult<Resource>) -> Option<Arc<AssetError>> {
        let mut store = self.store.lock();
        let error = store.complete(key, result);
        self.cond.notify_all();
        error
    }

    /// Body of a background job.
    fn run_job(&self, key: AssetKey, results: &Sender<PreloadResult>) {
        let result = self.load(&key);
        let error = self.finish(&key, result);
        // the consumer may have dropped the stream; the cache is updated anyway
        let _ = results.send(PreloadResult { key, error });
    }

    /// The ready value of a loaded key, promoting it first if needed.
    ///
    /// A resource tagged with another kind is refused before promotion.
    fn ready(&self, store: &mut CacheStore, key: &AssetKey) -> AssetResult<Arc<dyn DynAsset>> {
        let resource = store.loaded(key).ok_or_else(|| AssetError::NotFound {
            path: key.to_string(),
        })?;
        let kind = resource.kind();
        if kind != key.kind() {
            return Err(AssetError::WrongKind {
                key: key.clone(),
                expected: key.kind().as_str(),
            });
        }
        if let Some(asset) = resource.ready_value() {
            return Ok(Arc::clone(asset));
        }

        let Some(Stage::Decoded(decoded)) = store.take_loaded(key).map(Resource::into_stage) else {
            return Err(AssetError::NotFound {
                path: key.to_string(),
            });
        };

        // promotion runs on the calling thread, under the lock
        let promoted = guarded(|| self.loaders.get(kind)?.promote(key, decoded));
        match promoted {
            Ok(asset) => {
                tracing::debug!("Promoted {}", key);
                store.insert_loaded(key.clone(), Resource::from_dyn(kind, Arc::clone(&asset)));
                store.push_event(AssetEvent::Promoted { key: key.clone() });
                Ok(asset)
            }
            Err(err) => {
                let err = store.record_error(key, err);
                Err(AssetError::load_failure(key, err))
            }
        }
    }
}

/// Run `f`, turning a panic into [`AssetError::LoaderPanicked`].
fn guarded<T>(f: impl FnOnce() -> AssetResult<T>) -> AssetResult<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(AssetError::LoaderPanicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Loads, caches and releases textures, fonts and raw files.
///
/// All methods take `&self`; share the manager between threads with an `Arc`.
///
/// # Example
///
/// ```ignore
/// let loaders = LoaderRegistry::with_defaults()
///     .with(AssetKind::Texture, PngLoader::new(gpu))
///     .with(AssetKind::Font, TtfLoader);
/// let config = ManagerConfig::new()
///     .with_texture_path("textures")
///     .with_font_path("fonts");
/// let manager = AssetManager::new(DiskFileSystem::new("assets"), config, loaders)?;
///
/// // Warm the cache in the background
/// let preload = manager.preload([AssetKey::texture("player.png"), AssetKey::font("sans.ttf")], false)?;
/// preload.wait()?;
///
/// // Cached: no loader call
/// let player: Arc<Texture> = manager.texture("player.png")?;
///
/// manager.close()?;
/// ```
pub struct AssetManager {
    shared: Arc<Shared>,
    /// Taken on close.
    pool: Mutex<Option<WorkerPool>>,
}

impl AssetManager {
    /// Create a manager and start its worker pool.
    pub fn new(
        fs: impl FileSystem + 'static,
        config: ManagerConfig,
        loaders: LoaderRegistry,
    ) -> AssetResult<Self> {
        let pool = WorkerPool::new(config.worker_count())?;
        tracing::info!(
            "Asset manager started with {} loader threads",
            pool.thread_count()
        );
        let event_capacity = config.event_capacity;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                fs: Box::new(fs),
                loaders,
                store: Mutex::new(CacheStore::with_event_capacity(event_capacity)),
                cond: Condvar::new(),
                cancel: CancelToken::new(),
            }),
            pool: Mutex::new(Some(pool)),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// The path a key would be read from.
    pub fn resolve_path(&self, key: &AssetKey) -> String {
        self.shared.config.resolve(key)
    }

    /// Get an asset from the cache, loading it on this thread if needed.
    ///
    /// If another thread (or a preload worker) is already loading the key,
    /// blocks until that load finishes and returns its outcome. A failed key
    /// keeps returning its recorded error until it is discarded or preloaded
    /// again.
    pub fn get(&self, key: &AssetKey) -> AssetResult<Arc<dyn DynAsset>> {
        let mut store = self.shared.store.lock();
        loop {
            store.ensure_open()?;
            match store.state(key) {
                LoadState::Loaded => return self.shared.ready(&mut store, key),
                LoadState::Errored => {
                    if let Some(err) = store.error(key) {
                        return Err(AssetError::load_failure(key, Arc::clone(err)));
                    }
                }
                LoadState::Pending => self.shared.cond.wait(&mut store),
                LoadState::Missing => self.load_locked(&mut store, key),
            }
        }
    }

    /// `Missing -> Pending -> Loaded/Errored` on the calling thread.
    fn load_locked(&self, store: &mut MutexGuard<'_, CacheStore>, key: &AssetKey) {
        store.mark_pending(key);
        let result = MutexGuard::unlocked(store, || self.shared.load(key));
        store.complete(key, result);
        self.shared.cond.notify_all();
    }

    /// [`get`](Self::get), downcast to `T`.
    pub fn get_as<T: Asset>(&self, key: &AssetKey) -> AssetResult<Arc<T>> {
        let asset = self.get(key)?;
        downcast_asset::<T>(asset).ok_or_else(|| AssetError::WrongKind {
            key: key.clone(),
            expected: T::type_name(),
        })
    }

    /// Get the named texture.
    pub fn texture<T: Asset>(&self, name: &str) -> AssetResult<Arc<T>> {
        self.get_as(&AssetKey::texture(name))
    }

    /// Get the named font.
    pub fn font<T: Asset>(&self, name: &str) -> AssetResult<Arc<T>> {
        self.get_as(&AssetKey::font(name))
    }

    /// Get the named raw file.
    pub fn file(&self, name: &str) -> AssetResult<Arc<RawFile>> {
        self.get_as(&AssetKey::file(name))
    }

    /// Load `keys` in the background.
    ///
    /// Keys already loaded or in flight are skipped, as are duplicates;
    /// previously failed keys are retried. With `discard_unused`, waits for
    /// in-flight loads to finish and then evicts every cached key that is not
    /// in `keys`.
    ///
    /// Returns immediately. The returned [`Preload`] yields one result per
    /// scheduled key.
    pub fn preload(
        &self,
        keys: impl IntoIterator<Item = AssetKey>,
        discard_unused: bool,
    ) -> AssetResult<Preload> {
        let keys: Vec<AssetKey> = keys.into_iter().collect();
        let mut flushed = Vec::new();
        let mut scheduled = Vec::new();
        {
            let mut store = self.shared.store.lock();
            store.ensure_open()?;
            if discard_unused {
                // a flush never races in-flight loads
                while store.has_pending() {
                    self.shared.cond.wait(&mut store);
                    store.ensure_open()?;
                }
                let keep: HashSet<AssetKey> = keys.iter().cloned().collect();
                flushed = store.retain_only(&keep);
            }
            for key in keys {
                if store.mark_pending(&key) {
                    scheduled.push(key);
                }
            }
        }

        for (key, resource) in flushed {
            tracing::debug!("Flushed {}", key);
            if let Err(err) = resource.release() {
                tracing::warn!("Failed to close flushed {}: {}", key, err);
            }
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let count = scheduled.len();
        let pool = self.pool.lock();
        for key in scheduled {
            let job = {
                let shared = Arc::clone(&self.shared);
                let tx = tx.clone();
                let key = key.clone();
                move || shared.run_job(key, &tx)
            };
            let queued = pool.as_ref().is_some_and(|pool| pool.execute(job));
            if !queued {
                // only reachable if the pool is gone; never leave the key pending
                let error = self.shared.finish(&key, Err(AssetError::Closed));
                let _ = tx.send(PreloadResult { key, error });
            }
        }
        tracing::debug!("Preload scheduled {} assets", count);

        Ok(Preload::new(rx, count))
    }

    /// Block until no load is in flight.
    ///
    /// Returns an aggregate of the keys that failed since the previous call,
    /// one entry per key with its latest error. Keys retried, discarded or
    /// flushed in between are not reported. Failed keys stay failed.
    pub fn wait(&self) -> AssetResult<()> {
        let mut store = self.shared.store.lock();
        store.ensure_open()?;
        while store.has_pending() {
            self.shared.cond.wait(&mut store);
        }
        match AssetError::aggregate(store.take_unreported()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every recorded load failure, without clearing anything.
    pub fn errors(&self) -> Option<AssetError> {
        AssetError::aggregate(self.shared.store.lock().all_errors())
    }

    /// Evict a key and release its resource.
    ///
    /// Waits for an in-flight load of the key to finish first. Discarding a
    /// failed key clears its error so the next access retries.
    pub fn discard(&self, key: &AssetKey) -> AssetResult<()> {
        let mut store = self.shared.store.lock();
        loop {
            store.ensure_open()?;
            if let Some(resource) = store.take_loaded(key) {
                store.push_event(AssetEvent::Discarded { key: key.clone() });
                drop(store);
                tracing::debug!("Discarded {}", key);
                return resource.release();
            }
            if store.clear_error(key) {
                store.push_event(AssetEvent::Discarded { key: key.clone() });
                return Ok(());
            }
            if !store.state(key).is_pending() {
                return Err(AssetError::NotFound {
                    path: key.to_string(),
                });
            }
            self.shared.cond.wait(&mut store);
        }
    }

    /// Shut down: cancel queued loads, wait for in-flight ones, stop the
    /// workers and release every cached resource exactly once.
    ///
    /// Every later call on the manager fails with [`AssetError::Closed`].
    /// Release failures are aggregated but do not stop the shutdown.
    pub fn close(&self) -> AssetResult<()> {
        {
            let mut store = self.shared.store.lock();
            store.ensure_open()?;
            store.set_closed();
            self.shared.cancel.cancel();
            self.shared.cond.notify_all();
            while store.has_pending() {
                self.shared.cond.wait(&mut store);
            }
        }

        if let Some(mut pool) = self.pool.lock().take() {
            pool.shutdown();
        }

        let resources = self.shared.store.lock().drain_loaded();
        let count = resources.len();
        let mut failures = Vec::new();
        for (key, resource) in resources {
            if let Err(err) = resource.release() {
                tracing::warn!("Failed to close {}: {}", key, err);
                failures.push((key, Arc::new(err)));
            }
        }
        tracing::info!("Asset manager closed, released {} assets", count);

        match AssetError::aggregate(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.store.lock().is_closed()
    }

    /// The current state of a key.
    pub fn state(&self, key: &AssetKey) -> LoadState {
        self.shared.store.lock().state(key)
    }

    /// Number of loads in flight.
    pub fn pending_count(&self) -> usize {
        self.shared.store.lock().pending_len()
    }

    /// Every cached key, sorted.
    pub fn loaded_keys(&self) -> Vec<AssetKey> {
        self.shared.store.lock().loaded_keys()
    }

    /// Take every event recorded since the last call, oldest first.
    ///
    /// At most [`ManagerConfig::event_capacity`] events are kept between
    /// calls; older ones are dropped.
    pub fn drain_events(&self) -> Vec<AssetEvent> {
        self.shared.store.lock().take_events()
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            tracing::error!("Error closing asset manager on drop: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileSystem;
    use crate::key::AssetKind;

    fn manager(fs: MemoryFileSystem) -> AssetManager {
        AssetManager::new(
            fs,
            ManagerConfig::new().with_file_path("files").with_workers(2),
            LoaderRegistry::with_defaults(),
        )
        .unwrap()
    }

    #[test]
    fn test_guarded_catches_panics() {
        let err = guarded::<()>(|| panic!("decoder exploded")).unwrap_err();
        match err {
            AssetError::LoaderPanicked { message } => assert_eq!(message, "decoder exploded"),
            other => panic!("unexpected error {other:?}"),
        }
        let err = guarded::<()>(|| std::panic::panic_any(7u32)).unwrap_err();
        assert!(matches!(err, AssetError::LoaderPanicked { .. }));
    }

    #[test]
    fn test_file_roundtrip() {
        let fs = MemoryFileSystem::new().with_file("files/level.dat", vec![1u8, 2, 3]);
        let manager = manager(fs);

        let file = manager.file("level.dat").unwrap();
        assert_eq!(&file[..], &[1, 2, 3]);
        assert_eq!(manager.state(&AssetKey::file("level.dat")), LoadState::Loaded);
        assert_eq!(manager.resolve_path(&AssetKey::file("level.dat")), "files/level.dat");
        assert!(manager.shared.store.lock().is_consistent());
    }

    #[test]
    fn test_no_loader_is_recorded() {
        let manager = manager(MemoryFileSystem::new().with_file("a.png", vec![0u8]));
        let err = manager.texture::<RawFile>("a.png").unwrap_err();
        assert!(matches!(err.root_cause(), AssetError::NoLoader { kind: AssetKind::Texture }));
        assert_eq!(manager.state(&AssetKey::texture("a.png")), LoadState::Errored);
    }

    #[test]
    fn test_drop_closes() {
        let fs = MemoryFileSystem::new().with_file("files/a", vec![1u8]);
        let manager = manager(fs);
        manager.file("a").unwrap();
        drop(manager);
    }
}
