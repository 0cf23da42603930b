//! Error taxonomy for the facade layer.
//!
//! Read/write primitives surface typed errors; most other operations collapse
//! failures into a boolean or sentinel at the [`Disk`](crate::Disk) level and
//! only log the cause. See the individual operation docs for which applies.

use thiserror::Error;

use crate::driver::DriverError;

/// Facade-level errors.
#[derive(Debug, Error)]
pub enum FsError {
    /// The driver could not locate or read the file.
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: DriverError,
    },

    /// The driver could not write the file.
    #[error("Failed to write file: {path}")]
    FileWrite {
        path: String,
        #[source]
        source: DriverError,
    },

    /// The disk name has no configuration entry, or names an unsupported
    /// driver kind.
    #[error("Disk [{0}] is not configured.")]
    InvalidDisk(String),

    /// An s3 disk was requested but the crate was built without the `s3`
    /// feature. Fatal setup error, not recoverable at call time.
    #[error("S3 driver support is not compiled in; enable the `s3` feature")]
    S3Unavailable,

    /// A driver failure on an operation that does not wrap into one of the
    /// taxonomy variants above (metadata lookups, listings).
    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type FsResult<T> = Result<T, FsError>;
