//! A Rust library for overlaying archive containers onto a virtual filesystem.
//!
//! Logical file names are resolved against registered TAR/ZIP containers or
//! in-memory blobs, falling back to the real filesystem, and opened as
//! seekable byte streams.
pub mod archive;
pub mod args;
pub mod ext;
pub mod stream;
pub mod types;
pub mod utils;
pub mod vfs;

lazy_static::lazy_static! {
    /// Global counter for operation results and warnings.
    pub static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}
