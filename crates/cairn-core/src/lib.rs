//! Cairn Core
//!
//! Shared utilities for the Cairn workspace: hash collections and logging setup.

pub mod alloc;
pub mod logging;
