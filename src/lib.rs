//! Multi-disk file storage facade.
//!
//! Named "disk" configurations resolve to pluggable storage drivers:
//! - Local filesystem (default)
//! - S3-compatible object storage (AWS S3, MinIO, R2, etc.), behind the
//!   `s3` feature
//!
//! A [`FilesystemManager`] turns a [`FilesystemsConfig`] into memoized
//! [`Disk`] instances; a [`Disk`] presents the uniform file-operation
//! contract (read, write, copy, move, delete, list, directory management,
//! URL resolution) over whichever driver backs it.
//!
//! ```no_run
//! use diskfs::{DiskConfig, FilesystemManager, FilesystemsConfig, WriteOptions};
//!
//! # async fn example() -> Result<(), diskfs::FsError> {
//! let config = FilesystemsConfig::new()
//!     .with_disk("local", DiskConfig::local("/tmp/store"));
//! let manager = FilesystemManager::new(config);
//!
//! let disk = manager.disk(Some("local"))?;
//! disk.put("reports/x.txt", "hello", &WriteOptions::new()).await?;
//! assert_eq!(disk.path("reports/x.txt"), "/tmp/store/reports/x.txt");
//! # Ok(())
//! # }
//! ```

mod config;
mod disk;
pub mod driver;
mod error;
mod manager;
mod upload;

pub use config::{DiskConfig, DriverKind, FilesystemsConfig};
pub use disk::Disk;
pub use driver::{
    ByteStream, DriverError, DriverResult, Entry, EntryKind, LocalDriver, StorageDriver,
    WriteOptions,
};
#[cfg(feature = "s3")]
pub use driver::{S3Config, S3Driver};
pub use error::{FsError, FsResult};
pub use manager::FilesystemManager;
pub use upload::{UploadStream, UploadedFile};
