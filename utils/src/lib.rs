//! Shared infrastructure utilities for stylewatch.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename), used for
//!   the image freshness record and the config toggle.

pub mod atomic_write;

pub use atomic_write::{atomic_write, recover_bak_file};
