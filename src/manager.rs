//! Filesystem manager: resolves named disk configurations into memoized
//! [`Disk`] instances.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncRead;

use crate::config::{DiskConfig, DriverKind, FilesystemsConfig};
use crate::disk::Disk;
use crate::driver::{ByteStream, LocalDriver, WriteOptions};
use crate::error::{FsError, FsResult};
use crate::upload::UploadedFile;

#[cfg(feature = "s3")]
use crate::driver::{S3Config, S3Driver};

/// Resolves disk names to [`Disk`] instances, constructing each disk's
/// driver lazily on first use and caching it for the manager's lifetime.
///
/// The cache is never invalidated; reconfiguration means building a new
/// manager. Construct one at startup and pass it (or an `Arc` of it) to
/// whatever needs storage.
pub struct FilesystemManager {
    config: FilesystemsConfig,
    default_local_root: Option<PathBuf>,
    disks: Mutex<HashMap<String, Arc<Disk>>>,
}

impl FilesystemManager {
    pub fn new(config: FilesystemsConfig) -> Self {
        Self {
            config,
            default_local_root: None,
            disks: Mutex::new(HashMap::new()),
        }
    }

    /// Root used for local disks that configure no `root` of their own.
    pub fn with_default_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.default_local_root = Some(root.into());
        self
    }

    /// Name of the default disk; `"local"` unless configured.
    pub fn default_disk(&self) -> &str {
        self.config.default.as_deref().unwrap_or("local")
    }

    /// Get a disk by name (the default disk when `None`). The same `Arc` is
    /// returned for the same name for the lifetime of this manager.
    pub fn disk(&self, name: Option<&str>) -> FsResult<Arc<Disk>> {
        let name = name.unwrap_or_else(|| self.default_disk());

        let mut disks = self.disks.lock();
        if let Some(disk) = disks.get(name) {
            return Ok(disk.clone());
        }

        let disk = Arc::new(self.resolve(name)?);
        disks.insert(name.to_string(), disk.clone());
        Ok(disk)
    }

    fn resolve(&self, name: &str) -> FsResult<Disk> {
        let config = self
            .config
            .disks
            .get(name)
            .ok_or_else(|| FsError::InvalidDisk(name.to_string()))?;

        match config.driver {
            DriverKind::Local => Ok(self.create_local(config)),
            DriverKind::S3 => self.create_s3(config),
            DriverKind::Unknown => Err(FsError::InvalidDisk(name.to_string())),
        }
    }

    fn create_local(&self, config: &DiskConfig) -> Disk {
        let root = config
            .root
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| self.default_local_root.clone())
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("storage/app")
            });

        if let Err(e) = std::fs::create_dir_all(&root) {
            tracing::warn!("could not create local disk root {:?}: {}", root, e);
        }

        let root_str = root.to_string_lossy().to_string();
        Disk::new(
            Arc::new(LocalDriver::new(root)),
            Some(root_str),
            config.url.clone(),
        )
    }

    #[cfg(feature = "s3")]
    fn create_s3(&self, config: &DiskConfig) -> FsResult<Disk> {
        let bucket = config.bucket.clone().unwrap_or_default();
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let mut s3 = S3Config::new(bucket.clone(), region).with_credentials(
            config.key.clone().unwrap_or_default(),
            config.secret.clone().unwrap_or_default(),
        );
        if let Some(prefix) = &config.prefix {
            s3 = s3.with_prefix(prefix.clone());
        }
        if let Some(endpoint) = &config.endpoint {
            s3 = s3.with_endpoint(endpoint.clone());
        }
        s3.force_path_style = s3.force_path_style || config.force_path_style;

        let url = config
            .url
            .clone()
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket));

        Ok(Disk::new(Arc::new(S3Driver::new(s3)), None, Some(url)))
    }

    #[cfg(not(feature = "s3"))]
    fn create_s3(&self, _config: &DiskConfig) -> FsResult<Disk> {
        Err(FsError::S3Unavailable)
    }
}

/// Passthroughs to the default disk, so a manager can be used directly as a
/// filesystem. Each forwards to `disk(None)` and therefore can also fail
/// with `InvalidDisk` if the default disk is unconfigured.
impl FilesystemManager {
    pub async fn exists(&self, path: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.exists(path).await)
    }

    pub async fn get(&self, path: &str) -> FsResult<Bytes> {
        self.disk(None)?.get(path).await
    }

    pub async fn read_stream(&self, path: &str) -> FsResult<ByteStream> {
        self.disk(None)?.read_stream(path).await
    }

    pub async fn put(
        &self,
        path: &str,
        contents: impl Into<Bytes>,
        options: &WriteOptions,
    ) -> FsResult<()> {
        self.disk(None)?.put(path, contents, options).await
    }

    pub async fn put_stream(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> FsResult<()> {
        self.disk(None)?.put_stream(path, reader, options).await
    }

    pub async fn put_file(
        &self,
        directory: &str,
        file: &mut UploadedFile,
        options: &WriteOptions,
    ) -> FsResult<Option<String>> {
        Ok(self.disk(None)?.put_file(directory, file, options).await)
    }

    pub async fn put_file_as(
        &self,
        directory: &str,
        file: &mut UploadedFile,
        name: &str,
        options: &WriteOptions,
    ) -> FsResult<Option<String>> {
        Ok(self
            .disk(None)?
            .put_file_as(directory, file, name, options)
            .await)
    }

    pub async fn prepend(&self, path: &str, data: &[u8]) -> FsResult<()> {
        self.disk(None)?.prepend(path, data).await
    }

    pub async fn append(&self, path: &str, data: &[u8]) -> FsResult<()> {
        self.disk(None)?.append(path, data).await
    }

    pub async fn delete(&self, path: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.delete(path).await)
    }

    pub async fn delete_many<S: AsRef<str> + Sync>(&self, paths: &[S]) -> FsResult<bool> {
        Ok(self.disk(None)?.delete_many(paths).await)
    }

    pub async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.copy(from, to).await)
    }

    pub async fn move_file(&self, from: &str, to: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.move_file(from, to).await)
    }

    pub async fn size(&self, path: &str) -> FsResult<u64> {
        self.disk(None)?.size(path).await
    }

    pub async fn last_modified(&self, path: &str) -> FsResult<i64> {
        self.disk(None)?.last_modified(path).await
    }

    pub async fn mime_type(&self, path: &str) -> FsResult<Option<String>> {
        Ok(self.disk(None)?.mime_type(path).await)
    }

    pub async fn files(&self, directory: &str, recursive: bool) -> FsResult<Vec<String>> {
        self.disk(None)?.files(directory, recursive).await
    }

    pub async fn directories(&self, directory: &str, recursive: bool) -> FsResult<Vec<String>> {
        self.disk(None)?.directories(directory, recursive).await
    }

    pub async fn make_directory(&self, path: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.make_directory(path).await)
    }

    pub async fn delete_directory(&self, path: &str) -> FsResult<bool> {
        Ok(self.disk(None)?.delete_directory(path).await)
    }

    pub fn url(&self, path: &str) -> FsResult<String> {
        Ok(self.disk(None)?.url(path))
    }

    pub async fn temporary_url(&self, path: &str, expires_in: Duration) -> FsResult<String> {
        Ok(self.disk(None)?.temporary_url(path, expires_in).await)
    }

    pub fn path(&self, path: &str) -> FsResult<String> {
        Ok(self.disk(None)?.path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_manager(tmp: &TempDir) -> FilesystemManager {
        let config = FilesystemsConfig::new()
            .with_disk("local", DiskConfig::local(tmp.path().to_string_lossy()));
        FilesystemManager::new(config)
    }

    #[test]
    fn test_disk_is_memoized() {
        let tmp = TempDir::new().unwrap();
        let manager = local_manager(&tmp);

        let a = manager.disk(Some("local")).unwrap();
        let b = manager.disk(Some("local")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // Default substitution resolves to the same cache entry
        let c = manager.disk(None).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_unconfigured_disk_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let manager = local_manager(&tmp);

        assert!(matches!(
            manager.disk(Some("nonexistent")),
            Err(FsError::InvalidDisk(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn test_unknown_driver_kind_is_invalid() {
        let disk: DiskConfig = serde_json::from_str(r#"{ "driver": "ftp" }"#).unwrap();
        let manager =
            FilesystemManager::new(FilesystemsConfig::new().with_disk("weird", disk));

        assert!(matches!(
            manager.disk(Some("weird")),
            Err(FsError::InvalidDisk(name)) if name == "weird"
        ));
    }

    #[test]
    fn test_default_disk_name() {
        let manager = FilesystemManager::new(FilesystemsConfig::new());
        assert_eq!(manager.default_disk(), "local");

        let manager = FilesystemManager::new(
            FilesystemsConfig::new().with_default_disk("media"),
        );
        assert_eq!(manager.default_disk(), "media");
    }

    #[test]
    fn test_local_root_fallback_chain() {
        let tmp = TempDir::new().unwrap();
        let fallback = tmp.path().join("fallback-root");

        let config = FilesystemsConfig::new().with_disk("local", DiskConfig::default());
        let manager = FilesystemManager::new(config).with_default_local_root(&fallback);

        let disk = manager.disk(None).unwrap();
        assert_eq!(
            disk.path("x.txt"),
            format!("{}/x.txt", fallback.to_string_lossy())
        );
        // Root is created eagerly
        assert!(fallback.is_dir());
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_s3_disk_derives_public_url() {
        let config = FilesystemsConfig::new()
            .with_default_disk("media")
            .with_disk("media", DiskConfig::s3("media-bucket"));
        let manager = FilesystemManager::new(config);

        let disk = manager.disk(None).unwrap();
        assert_eq!(
            disk.url("a/b.txt"),
            "https://media-bucket.s3.amazonaws.com/a/b.txt"
        );
        // No root: path passes through unchanged
        assert_eq!(disk.path("a/b.txt"), "a/b.txt");
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_s3_configured_url_wins() {
        let config = FilesystemsConfig::new().with_disk(
            "media",
            DiskConfig::s3("media-bucket").with_url("https://cdn.example.com"),
        );
        let manager = FilesystemManager::new(config);

        let disk = manager.disk(Some("media")).unwrap();
        assert_eq!(disk.url("a.txt"), "https://cdn.example.com/a.txt");
    }

    #[tokio::test]
    async fn test_passthrough_to_default_disk() {
        let tmp = TempDir::new().unwrap();
        let manager = local_manager(&tmp);
        let opts = WriteOptions::new();

        manager.put("reports/x.txt", "hello", &opts).await.unwrap();
        assert!(manager.exists("reports/x.txt").await.unwrap());
        assert_eq!(
            manager.get("reports/x.txt").await.unwrap(),
            Bytes::from("hello")
        );
        assert_eq!(
            manager.path("reports/x.txt").unwrap(),
            format!("{}/reports/x.txt", tmp.path().to_string_lossy())
        );
        assert!(manager.delete("reports/x.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_passthrough_with_unconfigured_default() {
        let manager = FilesystemManager::new(
            FilesystemsConfig::new().with_default_disk("ghost"),
        );
        assert!(matches!(
            manager.get("x.txt").await.unwrap_err(),
            FsError::InvalidDisk(_)
        ));
    }
}
