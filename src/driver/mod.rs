//! Storage driver abstraction.
//!
//! Provides a pluggable storage layer that can be backed by:
//! - Local filesystem (default)
//! - S3-compatible object storage (AWS S3, MinIO, R2, etc.)
//!
//! A driver exposes the primitive operations (read, write, stat, list,
//! delete, copy, move, directory management) against one backing medium.
//! Error translation into the facade taxonomy happens one layer up, in
//! [`Disk`](crate::Disk).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalDriver;
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Driver};

/// Driver-level error types.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("{0}")]
    Other(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// An open streaming read handle. The caller owns closing it (dropping it).
pub type ByteStream = Box<dyn AsyncRead + Unpin + Send>;

/// Open key-value bag forwarded to the driver on write operations.
///
/// The facade never interprets these; each driver honours the keys it
/// understands (the S3 driver reads `content-type`) and ignores the rest.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions(HashMap<String, String>);

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry yielded by [`StorageDriver::list`].
#[derive(Debug, Clone)]
pub struct Entry {
    /// Path relative to the driver root, `/`-separated.
    pub path: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn file(path: impl Into<String>) -> Self {
        Self { path: path.into(), kind: EntryKind::File }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self { path: path.into(), kind: EntryKind::Directory }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Storage driver trait for pluggable backends.
///
/// Paths are `/`-separated and relative to the driver's root (or key
/// prefix). Implementations must be usable behind `Arc<dyn StorageDriver>`
/// across async tasks.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Check whether a file exists at the path.
    async fn file_exists(&self, path: &str) -> DriverResult<bool>;

    /// Read the full contents of a file.
    async fn read(&self, path: &str) -> DriverResult<Bytes>;

    /// Open a streaming read handle for a file.
    async fn read_stream(&self, path: &str) -> DriverResult<ByteStream>;

    /// Write (overwrite) a file from a byte buffer.
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> DriverResult<()>;

    /// Write (overwrite) a file from a reader. The reader is borrowed; the
    /// caller retains its lifecycle.
    async fn write_stream(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> DriverResult<()>;

    /// Delete a file. Deleting a missing file is an error.
    async fn delete(&self, path: &str) -> DriverResult<()>;

    /// Copy a file.
    async fn copy(&self, from: &str, to: &str) -> DriverResult<()>;

    /// Move a file.
    async fn rename(&self, from: &str, to: &str) -> DriverResult<()>;

    /// Size of a file in bytes.
    async fn file_size(&self, path: &str) -> DriverResult<u64>;

    /// Last modification time as epoch seconds.
    async fn last_modified(&self, path: &str) -> DriverResult<i64>;

    /// MIME type of a file.
    async fn mime_type(&self, path: &str) -> DriverResult<String>;

    /// List entries under a directory. Ordering is whatever the backend
    /// yields. A missing directory yields an empty listing.
    async fn list(&self, directory: &str, recursive: bool) -> DriverResult<Vec<Entry>>;

    /// Create a directory (and any missing parents).
    async fn create_directory(&self, path: &str) -> DriverResult<()>;

    /// Delete a directory and everything under it. Deleting a missing
    /// directory succeeds.
    async fn delete_directory(&self, path: &str) -> DriverResult<()>;

    /// Produce a time-limited URL for the path, if the backend supports
    /// signing. The default has no such capability; the facade falls back
    /// to the plain public URL.
    async fn temporary_url(&self, path: &str, expires_in: Duration) -> Option<String> {
        let _ = (path, expires_in);
        None
    }
}
