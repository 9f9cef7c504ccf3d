//! Mock loader that records every call made by the asset manager.

use std::any::Any;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use cairn_assets::{
    Asset, AssetError, AssetKey, AssetKind, AssetLoader, AssetResult, DynAsset, LoadContext,
    Resource,
};
use cairn_core::alloc::HashSet;
use parking_lot::{Condvar, Mutex};

/// Behaviour switches, changeable at any time.
#[derive(Debug, Clone, Default)]
struct Settings {
    /// Names whose decode fails.
    failing: HashSet<String>,
    /// Names whose load panics.
    panicking: HashSet<String>,
    /// Names whose release fails.
    failing_release: HashSet<String>,
    /// Names whose promotion fails.
    failing_promote: HashSet<String>,
    /// Produce decoded values that are promoted on first access.
    decoded: bool,
    /// Tag resources with this kind instead of the key's.
    tag: Option<AssetKind>,
    delay: Option<Duration>,
}

/// A latch that loads block on until opened.
#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    cond: Condvar,
}

#[derive(Default)]
struct Inner {
    settings: Mutex<Settings>,
    gate: Gate,
    calls: Mutex<Vec<AssetKey>>,
    calls_cond: Condvar,
    promotions: Mutex<Vec<(AssetKey, ThreadId)>>,
    released: Mutex<Vec<AssetKey>>,
}

/// A loader for tests.
///
/// Clones share their state, so keep one clone in the test and register the
/// other with the manager.
///
/// # Example
///
/// ```rust
/// use cairn_test_utils::MockLoader;
///
/// let loader = MockLoader::new().failing("broken.png");
/// let handle = loader.clone();
/// // register `loader`, use the manager, then inspect `handle`
/// assert_eq!(handle.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockLoader {
    inner: Arc<Inner>,
}

impl MockLoader {
    /// A loader that succeeds for every name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the decode of `name` with a loader error.
    pub fn failing(self, name: &str) -> Self {
        self.inner.settings.lock().failing.insert(name.to_string());
        self
    }

    /// Panic while loading `name`.
    pub fn panicking(self, name: &str) -> Self {
        self.inner.settings.lock().panicking.insert(name.to_string());
        self
    }

    /// Fail the release of `name`.
    pub fn failing_release(self, name: &str) -> Self {
        self.inner
            .settings
            .lock()
            .failing_release
            .insert(name.to_string());
        self
    }

    /// Fail the promotion of `name`.
    pub fn failing_promote(self, name: &str) -> Self {
        self.inner
            .settings
            .lock()
            .failing_promote
            .insert(name.to_string());
        self
    }

    /// Produce decoded values instead of ready ones.
    pub fn decoded(self) -> Self {
        self.inner.settings.lock().decoded = true;
        self
    }

    /// Tag every resource with `kind`, whatever the key says.
    pub fn tagged(self, kind: AssetKind) -> Self {
        self.inner.settings.lock().tag = Some(kind);
        self
    }

    /// Sleep this long in every load.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.settings.lock().delay = Some(delay);
        self
    }

    /// Make every load block until [`open`](Self::open) is called or the
    /// manager cancels.
    pub fn gated(self) -> Self {
        *self.inner.gate.closed.lock() = true;
        self
    }

    /// Release every load blocked on the gate.
    pub fn open(&self) {
        *self.inner.gate.closed.lock() = false;
        self.inner.gate.cond.notify_all();
    }

    /// Stop failing the decode of `name`.
    pub fn heal(&self, name: &str) {
        self.inner.settings.lock().failing.remove(name);
    }

    /// Every key passed to `load`, in call order.
    pub fn calls(&self) -> Vec<AssetKey> {
        self.inner.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// How many times `key` was loaded.
    pub fn calls_for(&self, key: &AssetKey) -> usize {
        self.inner.calls.lock().iter().filter(|k| *k == key).count()
    }

    /// Block until at least `count` loads have started. Returns false on timeout.
    pub fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut calls = self.inner.calls.lock();
        while calls.len() < count {
            if self.inner.calls_cond.wait_until(&mut calls, deadline).timed_out() {
                return calls.len() >= count;
            }
        }
        true
    }

    /// Keys promoted, with the thread that ran the promotion.
    pub fn promotions(&self) -> Vec<(AssetKey, ThreadId)> {
        self.inner.promotions.lock().clone()
    }

    /// Keys whose assets were released, in release order.
    pub fn released(&self) -> Vec<AssetKey> {
        self.inner.released.lock().clone()
    }

    /// How many times the asset for `key` was released.
    pub fn release_count(&self, key: &AssetKey) -> usize {
        self.inner.released.lock().iter().filter(|k| *k == key).count()
    }

    fn record_call(&self, key: &AssetKey) {
        self.inner.calls.lock().push(key.clone());
        self.inner.calls_cond.notify_all();
    }

    fn wait_gate(&self, ctx: &LoadContext<'_>) -> AssetResult<()> {
        let mut closed = self.inner.gate.closed.lock();
        while *closed {
            ctx.cancel.check()?;
            self.inner
                .gate
                .cond
                .wait_for(&mut closed, Duration::from_millis(10));
        }
        Ok(())
    }

    fn asset(&self, key: AssetKey, bytes: Vec<u8>) -> MockAsset {
        MockAsset {
            fail_release: self
                .inner
                .settings
                .lock()
                .failing_release
                .contains(key.name()),
            key,
            bytes,
            loader: self.clone(),
        }
    }
}

impl AssetLoader for MockLoader {
    fn load(&self, mut ctx: LoadContext<'_>) -> AssetResult<Resource> {
        let key = ctx.key.clone();
        self.record_call(&key);
        self.wait_gate(&ctx)?;

        let settings = self.inner.settings.lock().clone();
        if let Some(delay) = settings.delay {
            thread::sleep(delay);
        }
        if settings.panicking.contains(key.name()) {
            panic!("mock loader panicked on {}", key);
        }

        let bytes = ctx.read_to_end()?;
        if settings.failing.contains(key.name()) {
            return Err(ctx.error("mock decode failure"));
        }

        let kind = settings.tag.unwrap_or(key.kind());
        if settings.decoded {
            Ok(Resource::decoded(kind, MockDecoded(bytes)))
        } else {
            Ok(Resource::ready(kind, self.asset(key, bytes)))
        }
    }

    fn promote(&self, key: &AssetKey, decoded: Box<dyn Any + Send>) -> AssetResult<Arc<dyn DynAsset>> {
        self.inner
            .promotions
            .lock()
            .push((key.clone(), thread::current().id()));

        if self.inner.settings.lock().failing_promote.contains(key.name()) {
            return Err(AssetError::Loader {
                path: key.name().to_string(),
                message: "mock promote failure".into(),
            });
        }
        let MockDecoded(bytes) = *decoded
            .downcast::<MockDecoded>()
            .map_err(|_| AssetError::Loader {
                path: key.name().to_string(),
                message: "unexpected decoded value".into(),
            })?;
        Ok(Arc::new(self.asset(key.clone(), bytes)))
    }
}

/// What a decoded-mode [`MockLoader`] stores before promotion.
#[derive(Debug)]
pub struct MockDecoded(pub Vec<u8>);

/// The asset produced by [`MockLoader`].
pub struct MockAsset {
    /// The key it was loaded for.
    pub key: AssetKey,
    /// The file contents.
    pub bytes: Vec<u8>,
    fail_release: bool,
    loader: MockLoader,
}

impl std::fmt::Debug for MockAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAsset")
            .field("key", &self.key)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Asset for MockAsset {
    fn type_name() -> &'static str {
        "mock asset"
    }

    fn close(&self) -> AssetResult<()> {
        self.loader.inner.released.lock().push(self.key.clone());
        if self.fail_release {
            return Err(AssetError::Release {
                key: self.key.clone(),
                message: "mock release failure".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let loader = MockLoader::new();
        let handle = loader.clone();
        loader.record_call(&AssetKey::texture("a.png"));
        assert_eq!(handle.call_count(), 1);
        assert_eq!(handle.calls_for(&AssetKey::texture("a.png")), 1);
        assert!(handle.wait_for_calls(1, Duration::from_millis(1)));
        assert!(!handle.wait_for_calls(2, Duration::from_millis(1)));
    }

    #[test]
    fn test_release_recorded() {
        let loader = MockLoader::new().failing_release("bad");
        let good = loader.asset(AssetKey::file("good"), vec![]);
        let bad = loader.asset(AssetKey::file("bad"), vec![]);
        assert!(good.close().is_ok());
        assert!(bad.close().is_err());
        assert_eq!(loader.released().len(), 2);
    }

    #[test]
    fn test_heal() {
        let loader = MockLoader::new().failing("a.png").failing("b.png");
        loader.heal("a.png");
        let settings = loader.inner.settings.lock();
        assert!(!settings.failing.contains("a.png"));
        assert!(settings.failing.contains("b.png"));
    }
}
