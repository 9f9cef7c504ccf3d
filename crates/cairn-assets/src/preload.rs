//! Results of a bulk preload.

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::{AssetError, AssetResult};
use crate::key::AssetKey;

/// The outcome of one background load.
#[derive(Debug, Clone)]
pub struct PreloadResult {
    /// The key that was loaded.
    pub key: AssetKey,
    /// The failure, if any.
    pub error: Option<Arc<AssetError>>,
}

impl PreloadResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// `Err(LoadFailure)` if the load failed.
    pub fn into_result(self) -> AssetResult<AssetKey> {
        match self.error {
            None => Ok(self.key),
            Some(source) => Err(AssetError::load_failure(&self.key, source)),
        }
    }
}

/// Result of a non-blocking [`Preload::poll`].
#[derive(Debug)]
pub enum PreloadStatus {
    /// A job finished.
    Ready(PreloadResult),
    /// Jobs are still running; nothing new yet.
    Pending,
    /// Every job has reported.
    Done,
}

/// A running preload.
///
/// Yields one [`PreloadResult`] per scheduled key, in completion order, and
/// ends once every job has reported. Dropping it does not cancel anything; the
/// loads still land in the cache.
#[derive(Debug)]
pub struct Preload {
    results: Receiver<PreloadResult>,
    scheduled: usize,
}

impl Preload {
    pub(crate) fn new(results: Receiver<PreloadResult>, scheduled: usize) -> Self {
        Self { results, scheduled }
    }

    /// How many keys were actually scheduled.
    ///
    /// Keys already loaded or in flight, and duplicates, are not counted.
    /// Informational only: rely on the iterator ending to know the preload is
    /// complete.
    pub fn scheduled(&self) -> usize {
        self.scheduled
    }

    /// Check for a result without blocking, e.g. once per frame.
    pub fn poll(&self) -> PreloadStatus {
        match self.results.try_recv() {
            Ok(result) => PreloadStatus::Ready(result),
            Err(TryRecvError::Empty) => PreloadStatus::Pending,
            Err(TryRecvError::Disconnected) => PreloadStatus::Done,
        }
    }

    /// Block until every job has reported.
    ///
    /// Returns an aggregate of the failures, if any.
    pub fn wait(self) -> AssetResult<()> {
        let failures: Vec<_> = self
            .filter_map(|result| result.error.map(|err| (result.key, err)))
            .collect();
        match AssetError::aggregate(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Iterator for Preload {
    type Item = PreloadResult;

    fn next(&mut self) -> Option<PreloadResult> {
        self.results.recv().ok()
    }
}
