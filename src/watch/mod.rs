// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Subscribing to OS notifications per path (`notify`), see [`backend`].
//! - Walking directories and stat'ing paths off the async executor.
//! - Deciding whether a path is new, modified, unmodified or gone.
//! - Expanding a change to the paths that depend on it and fingerprinting
//!   the result as an etag.
//!
//! It does **not** own any state; the registry lives in
//! [`crate::engine::WatchCore`].

pub mod backend;
pub mod detect;
pub mod expand;
pub mod fingerprint;
pub mod path_utils;
pub mod patterns;
pub mod traverse;

pub use backend::{NotifyBackend, WatchBackend, WatchHandle};
pub use detect::{Change, Detection};
pub use fingerprint::Etag;
pub use patterns::PathFilter;
