//! Test utilities for the Cairn asset cache.
//!
//! [`MockLoader`] is an [`AssetLoader`](cairn_assets::AssetLoader) whose
//! behaviour can be scripted per asset name. It can fail, panic, block on a
//! gate or produce decoded values, and it records every load, promotion and
//! release so tests can assert on them.

pub mod mock_loader;

pub use mock_loader::*;
