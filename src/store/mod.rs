//! Persistence layer for run records.
//!
//! This module contains:
//! - [`RunRecord`] — on-disk representation of a run
//! - [`RunStore`] trait — record persistence by run id
//! - [`FileRunStore`] — file-backed implementation (feature `file-storage`)
//! - [`StdoutRunStore`] — JSON-to-stdout fallback with no persistence

mod record;
mod store;
pub mod stdout;

#[cfg(feature = "file-storage")]
pub mod file_backed;

pub use record::RunRecord;
pub use store::RunStore;
pub use stdout::StdoutRunStore;

#[cfg(feature = "file-storage")]
pub use file_backed::FileRunStore;
