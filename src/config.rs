//! Filesystems configuration.
//!
//! The crate consumes this schema, it does not own a config file: the
//! embedding application deserializes whatever source it uses (JSON, TOML,
//! env layering) into [`FilesystemsConfig`] and hands it to
//! [`FilesystemManager`](crate::FilesystemManager).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Driver kind selecting which backend a disk resolves to.
///
/// Unknown strings deserialize into [`DriverKind::Unknown`] so that an
/// unsupported driver surfaces as `InvalidDisk` at resolution time rather
/// than as a deserialization error for the whole config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Local,
    S3,
    #[serde(other)]
    Unknown,
}

/// Configuration for one named disk.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Driver kind; `local` when unspecified.
    pub driver: DriverKind,

    /// Root directory (local driver).
    pub root: Option<String>,

    /// Public URL base. For s3 disks a default is derived from the bucket
    /// name when unset.
    pub url: Option<String>,

    /// Access key id (s3 driver).
    pub key: Option<String>,
    /// Secret access key (s3 driver).
    pub secret: Option<String>,
    /// Region (s3 driver); defaults to `us-east-1`.
    pub region: Option<String>,
    /// Bucket name (s3 driver).
    pub bucket: Option<String>,
    /// Key prefix prepended to every object key (s3 driver).
    pub prefix: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2).
    pub endpoint: Option<String>,
    /// Force path-style URLs; required by MinIO.
    pub force_path_style: bool,
}

impl DiskConfig {
    /// A local disk rooted at `root`.
    pub fn local(root: impl Into<String>) -> Self {
        Self {
            driver: DriverKind::Local,
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// An s3 disk targeting `bucket`.
    pub fn s3(bucket: impl Into<String>) -> Self {
        Self {
            driver: DriverKind::S3,
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// The full `filesystems` configuration block: a default disk name plus the
/// named disk definitions.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesystemsConfig {
    /// Name of the disk used when none is given; `"local"` when unset.
    pub default: Option<String>,

    /// Disk definitions keyed by name.
    pub disks: HashMap<String, DiskConfig>,
}

impl FilesystemsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_disk(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    pub fn with_disk(mut self, name: impl Into<String>, disk: DiskConfig) -> Self {
        self.disks.insert(name.into(), disk);
        self
    }
}
