//! The disk facade: a uniform file-operation contract over one storage
//! driver.
//!
//! Error granularity is deliberately uneven and mirrors how callers use the
//! operations: `get`/`put` and their stream variants surface typed errors,
//! while copy/move/delete/directory/mime operations collapse any failure
//! into `false` or `None` (the cause is logged). Batch delete stops at the
//! first failure, so partial deletion is possible.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncSeekExt};

use crate::driver::{ByteStream, StorageDriver, WriteOptions};
use crate::error::{FsError, FsResult};
use crate::upload::UploadedFile;

/// A resolved disk: one driver plus an optional root path and URL base.
///
/// Immutable after construction; obtained from
/// [`FilesystemManager::disk`](crate::FilesystemManager::disk) and shared as
/// `Arc<Disk>`.
pub struct Disk {
    driver: Arc<dyn StorageDriver>,
    root: Option<String>,
    url_base: Option<String>,
}

impl Disk {
    pub fn new(
        driver: Arc<dyn StorageDriver>,
        root: Option<String>,
        url_base: Option<String>,
    ) -> Self {
        Self {
            driver,
            root,
            url_base,
        }
    }

    /// The underlying driver.
    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    /// Whether a file exists. Never fails; a driver error reads as absent.
    pub async fn exists(&self, path: &str) -> bool {
        self.driver.file_exists(path).await.unwrap_or_else(|e| {
            tracing::warn!("exists check failed for {}: {}", path, e);
            false
        })
    }

    /// Full contents of a file.
    pub async fn get(&self, path: &str) -> FsResult<Bytes> {
        self.driver
            .read(path)
            .await
            .map_err(|source| FsError::FileNotFound {
                path: path.to_string(),
                source,
            })
    }

    /// Open a streaming read handle. The caller owns closing (dropping) it.
    pub async fn read_stream(&self, path: &str) -> FsResult<ByteStream> {
        self.driver
            .read_stream(path)
            .await
            .map_err(|source| FsError::FileNotFound {
                path: path.to_string(),
                source,
            })
    }

    /// Write (overwrite) a file.
    pub async fn put(
        &self,
        path: &str,
        contents: impl Into<Bytes>,
        options: &WriteOptions,
    ) -> FsResult<()> {
        self.driver
            .write(path, contents.into(), options)
            .await
            .map_err(|source| FsError::FileWrite {
                path: path.to_string(),
                source,
            })
    }

    /// Write (overwrite) a file from a reader. The reader stays owned by the
    /// caller.
    pub async fn put_stream(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> FsResult<()> {
        self.driver
            .write_stream(path, reader, options)
            .await
            .map_err(|source| FsError::FileWrite {
                path: path.to_string(),
                source,
            })
    }

    /// Store an upload under a generated collision-resistant filename (20
    /// random bytes, hex, original extension kept). Returns the stored path,
    /// or `None` if the stream could not be detached or the write failed.
    pub async fn put_file(
        &self,
        directory: &str,
        file: &mut UploadedFile,
        options: &WriteOptions,
    ) -> Option<String> {
        let name = generate_filename(file.client_filename());
        self.put_file_as(directory, file, &name, options).await
    }

    /// Store an upload as `directory/name`. Detaches the upload's stream,
    /// rewinds it, and writes it out; the stream is dropped (closed) on
    /// every exit path. Failure is a `None` sentinel, not an error.
    pub async fn put_file_as(
        &self,
        directory: &str,
        file: &mut UploadedFile,
        name: &str,
        options: &WriteOptions,
    ) -> Option<String> {
        let mut stream = match file.detach() {
            Some(stream) => stream,
            None => {
                tracing::warn!("upload stream already detached, not storing {}", name);
                return None;
            }
        };

        let stored = join_path(directory, name);

        // Rewind: upstream code may have partially consumed the stream.
        if let Err(e) = stream.rewind().await {
            tracing::warn!("failed to rewind upload stream for {}: {}", stored, e);
            return None;
        }

        match self.driver.write_stream(&stored, &mut stream, options).await {
            Ok(()) => Some(stored),
            Err(e) => {
                tracing::warn!("failed to store upload at {}: {}", stored, e);
                None
            }
        }
    }

    /// Prepend data to a file, creating it if absent. Read-modify-write;
    /// concurrent writers can race.
    pub async fn prepend(&self, path: &str, data: &[u8]) -> FsResult<()> {
        if self.exists(path).await {
            let existing = self.get(path).await?;
            let combined = [data, existing.as_ref()].concat();
            return self.put(path, combined, &WriteOptions::new()).await;
        }
        self.put(path, data.to_vec(), &WriteOptions::new()).await
    }

    /// Append data to a file, creating it if absent. Read-modify-write;
    /// concurrent writers can race.
    pub async fn append(&self, path: &str, data: &[u8]) -> FsResult<()> {
        if self.exists(path).await {
            let existing = self.get(path).await?;
            let combined = [existing.as_ref(), data].concat();
            return self.put(path, combined, &WriteOptions::new()).await;
        }
        self.put(path, data.to_vec(), &WriteOptions::new()).await
    }

    /// Delete one file. Any failure collapses to `false`.
    pub async fn delete(&self, path: &str) -> bool {
        self.delete_many(&[path]).await
    }

    /// Delete files in order, stopping at the first failure. Later paths are
    /// left untouched once one fails.
    pub async fn delete_many<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        for path in paths {
            let path = path.as_ref();
            if let Err(e) = self.driver.delete(path).await {
                tracing::warn!("failed to delete {}: {}", path, e);
                return false;
            }
        }
        true
    }

    /// Copy a file. Any failure collapses to `false`.
    pub async fn copy(&self, from: &str, to: &str) -> bool {
        match self.driver.copy(from, to).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to copy {} -> {}: {}", from, to, e);
                false
            }
        }
    }

    /// Move a file. Any failure collapses to `false`.
    pub async fn move_file(&self, from: &str, to: &str) -> bool {
        match self.driver.rename(from, to).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to move {} -> {}: {}", from, to, e);
                false
            }
        }
    }

    /// Size of a file in bytes.
    pub async fn size(&self, path: &str) -> FsResult<u64> {
        Ok(self.driver.file_size(path).await?)
    }

    /// Last modification time as epoch seconds.
    pub async fn last_modified(&self, path: &str) -> FsResult<i64> {
        Ok(self.driver.last_modified(path).await?)
    }

    /// MIME type of a file, or `None` if it cannot be determined.
    pub async fn mime_type(&self, path: &str) -> Option<String> {
        match self.driver.mime_type(path).await {
            Ok(mime) => Some(mime),
            Err(e) => {
                tracing::debug!("mime type lookup failed for {}: {}", path, e);
                None
            }
        }
    }

    /// Paths of the files under a directory, in driver listing order.
    pub async fn files(&self, directory: &str, recursive: bool) -> FsResult<Vec<String>> {
        let entries = self.driver.list(directory, recursive).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_file())
            .map(|e| e.path)
            .collect())
    }

    /// Paths of the directories under a directory, in driver listing order.
    pub async fn directories(&self, directory: &str, recursive: bool) -> FsResult<Vec<String>> {
        let entries = self.driver.list(directory, recursive).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_dir())
            .map(|e| e.path)
            .collect())
    }

    /// Create a directory. Any failure collapses to `false`.
    pub async fn make_directory(&self, path: &str) -> bool {
        match self.driver.create_directory(path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to create directory {}: {}", path, e);
                false
            }
        }
    }

    /// Delete a directory and its contents. Any failure collapses to `false`.
    pub async fn delete_directory(&self, path: &str) -> bool {
        match self.driver.delete_directory(path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to delete directory {}: {}", path, e);
                false
            }
        }
    }

    /// Public URL for a path: the configured base joined with the path, or
    /// the path unchanged when no base is configured.
    pub fn url(&self, path: &str) -> String {
        match &self.url_base {
            Some(base) => join_path(base, path),
            None => path.to_string(),
        }
    }

    /// Time-limited URL for a path. Drivers with signing support (S3)
    /// produce a real signed URL; otherwise this falls back to [`Disk::url`]
    /// and the expiration is ignored.
    pub async fn temporary_url(&self, path: &str, expires_in: Duration) -> String {
        match self.driver.temporary_url(path, expires_in).await {
            Some(url) => url,
            None => self.url(path),
        }
    }

    /// Full path within the disk root, or the input unchanged when no root
    /// is configured.
    pub fn path(&self, path: &str) -> String {
        match &self.root {
            Some(root) if !root.is_empty() => join_path(root, path),
            _ => path.to_string(),
        }
    }
}

/// Join two path segments with exactly one `/` between them.
fn join_path(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Random 20-byte hex filename, keeping the upload's original extension.
fn generate_filename(client_filename: Option<&str>) -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    let name = hex::encode(bytes);

    let extension = client_filename
        .and_then(|f| Path::new(f).extension())
        .map(|e| e.to_string_lossy().to_string());

    match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", name, ext),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LocalDriver;
    use crate::upload::UploadStream;
    use std::io::SeekFrom;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncSeek, ReadBuf};

    fn disk() -> (TempDir, Disk) {
        let temp_dir = TempDir::new().unwrap();
        let driver = Arc::new(LocalDriver::new(temp_dir.path().to_path_buf()));
        let root = temp_dir.path().to_string_lossy().to_string();
        (temp_dir, Disk::new(driver, Some(root), None))
    }

    /// Upload stream double that counts how many times it is closed
    /// (dropped).
    struct CountingStream {
        inner: std::io::Cursor<Vec<u8>>,
        closed: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncSeek for CountingStream {
        fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
            Pin::new(&mut self.inner).start_seek(position)
        }

        fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
            Pin::new(&mut self.inner).poll_complete(cx)
        }
    }

    impl Drop for CountingStream {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counted_upload(
        contents: &[u8],
        filename: Option<&str>,
    ) -> (UploadedFile, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let stream: Box<dyn UploadStream> = Box::new(CountingStream {
            inner: std::io::Cursor::new(contents.to_vec()),
            closed: closed.clone(),
        });
        (
            UploadedFile::from_stream(stream, filename.map(String::from)),
            closed,
        )
    }

    #[tokio::test]
    async fn test_missing_path_semantics() {
        let (_tmp, disk) = disk();

        assert!(!disk.exists("nope.txt").await);
        assert!(matches!(
            disk.get("nope.txt").await.unwrap_err(),
            FsError::FileNotFound { .. }
        ));
        assert!(matches!(
            disk.read_stream("nope.txt").await,
            Err(FsError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_tmp, disk) = disk();
        let opts = WriteOptions::new();

        disk.put("reports/x.txt", "hello", &opts).await.unwrap();
        assert!(disk.exists("reports/x.txt").await);
        assert_eq!(disk.get("reports/x.txt").await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_put_stream() {
        let (_tmp, disk) = disk();
        let mut reader = std::io::Cursor::new(b"from a stream".to_vec());
        disk.put_stream("s.txt", &mut reader, &WriteOptions::new())
            .await
            .unwrap();
        assert_eq!(disk.get("s.txt").await.unwrap(), Bytes::from("from a stream"));
    }

    #[tokio::test]
    async fn test_append_and_prepend() {
        let (_tmp, disk) = disk();

        // Fresh paths behave as plain put
        disk.append("a.txt", b"tail").await.unwrap();
        assert_eq!(disk.get("a.txt").await.unwrap(), Bytes::from("tail"));
        disk.prepend("p.txt", b"head").await.unwrap();
        assert_eq!(disk.get("p.txt").await.unwrap(), Bytes::from("head"));

        disk.append("a.txt", b"+more").await.unwrap();
        assert_eq!(disk.get("a.txt").await.unwrap(), Bytes::from("tail+more"));
        disk.prepend("p.txt", b"pre+").await.unwrap();
        assert_eq!(disk.get("p.txt").await.unwrap(), Bytes::from("pre+head"));
    }

    #[tokio::test]
    async fn test_delete_many_stops_at_first_failure() {
        let (_tmp, disk) = disk();
        disk.put("keep.txt", "k", &WriteOptions::new()).await.unwrap();

        // First path missing: batch fails and the second is left alone.
        assert!(!disk.delete_many(&["missing.txt", "keep.txt"]).await);
        assert!(disk.exists("keep.txt").await);

        assert!(disk.delete("keep.txt").await);
        assert!(!disk.exists("keep.txt").await);
        assert!(!disk.delete("keep.txt").await);
    }

    #[tokio::test]
    async fn test_copy_and_move_collapse_to_bool() {
        let (_tmp, disk) = disk();
        disk.put("src.txt", "data", &WriteOptions::new()).await.unwrap();

        assert!(disk.copy("src.txt", "copied.txt").await);
        assert!(disk.exists("src.txt").await);
        assert!(disk.exists("copied.txt").await);

        assert!(disk.move_file("src.txt", "moved.txt").await);
        assert!(!disk.exists("src.txt").await);
        assert!(disk.exists("moved.txt").await);

        assert!(!disk.copy("missing.txt", "x.txt").await);
        assert!(!disk.move_file("missing.txt", "x.txt").await);
    }

    #[tokio::test]
    async fn test_size_and_last_modified() {
        let (_tmp, disk) = disk();
        disk.put("s.txt", "12345", &WriteOptions::new()).await.unwrap();

        assert_eq!(disk.size("s.txt").await.unwrap(), 5);
        assert!(disk.last_modified("s.txt").await.unwrap() > 0);

        assert!(matches!(
            disk.size("missing.txt").await.unwrap_err(),
            FsError::Driver(_)
        ));
    }

    #[tokio::test]
    async fn test_mime_type_sentinel() {
        let (_tmp, disk) = disk();
        disk.put("doc.pdf", "%PDF", &WriteOptions::new()).await.unwrap();

        assert_eq!(disk.mime_type("doc.pdf").await.as_deref(), Some("application/pdf"));
        assert_eq!(disk.mime_type("missing.pdf").await, None);
    }

    #[tokio::test]
    async fn test_files_and_directories() {
        let (_tmp, disk) = disk();
        let opts = WriteOptions::new();
        disk.put("d/one.txt", "1", &opts).await.unwrap();
        disk.put("d/sub/two.txt", "2", &opts).await.unwrap();

        let mut files = disk.files("d", false).await.unwrap();
        files.sort();
        assert_eq!(files, vec!["d/one.txt"]);

        let mut files = disk.files("d", true).await.unwrap();
        files.sort();
        assert_eq!(files, vec!["d/one.txt", "d/sub/two.txt"]);

        let dirs = disk.directories("d", false).await.unwrap();
        assert_eq!(dirs, vec!["d/sub"]);
    }

    #[tokio::test]
    async fn test_directory_management() {
        let (_tmp, disk) = disk();
        assert!(disk.make_directory("made/dir").await);
        assert!(disk.delete_directory("made").await);
        // Missing directory deletes are idempotent
        assert!(disk.delete_directory("made").await);
    }

    #[tokio::test]
    async fn test_put_file_as_closes_stream_on_success() {
        let (_tmp, disk) = disk();
        let (mut upload, closed) = counted_upload(b"uploaded", Some("report.csv"));

        let stored = disk
            .put_file_as("uploads", &mut upload, "report.csv", &WriteOptions::new())
            .await;

        assert_eq!(stored.as_deref(), Some("uploads/report.csv"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(disk.get("uploads/report.csv").await.unwrap(), Bytes::from("uploaded"));
    }

    #[tokio::test]
    async fn test_put_file_as_closes_stream_on_write_failure() {
        let (_tmp, disk) = disk();
        // A file where the target's parent directory should be makes the
        // write fail.
        disk.put("blocker", "f", &WriteOptions::new()).await.unwrap();

        let (mut upload, closed) = counted_upload(b"data", None);
        let stored = disk
            .put_file_as("blocker/sub", &mut upload, "x.bin", &WriteOptions::new())
            .await;

        assert!(stored.is_none());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_put_file_as_rewinds_consumed_stream() {
        let (_tmp, disk) = disk();
        let (mut upload, _closed) = counted_upload(b"full contents", None);

        // Partially consume before handing over
        {
            let stream = upload.detach().unwrap();
            let mut stream = stream;
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            upload = UploadedFile::from_stream(stream, None);
        }

        let stored = disk
            .put_file_as("up", &mut upload, "c.bin", &WriteOptions::new())
            .await
            .unwrap();
        assert_eq!(disk.get(&stored).await.unwrap(), Bytes::from("full contents"));
    }

    #[tokio::test]
    async fn test_put_file_as_detached_stream_is_sentinel() {
        let (_tmp, disk) = disk();
        let (mut upload, closed) = counted_upload(b"data", None);
        drop(upload.detach());
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        let stored = disk
            .put_file_as("up", &mut upload, "x.bin", &WriteOptions::new())
            .await;
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_put_file_generates_random_name() {
        let (_tmp, disk) = disk();
        let (mut upload, _closed) = counted_upload(b"img", Some("photo.png"));

        let stored = disk
            .put_file("images", &mut upload, &WriteOptions::new())
            .await
            .unwrap();

        let name = stored.strip_prefix("images/").unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 40 + 4); // 20 bytes hex + ".png"
        assert!(disk.exists(&stored).await);
    }

    #[test]
    fn test_generate_filename_without_extension() {
        let name = generate_filename(None);
        assert_eq!(name.len(), 40);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_joining() {
        let tmp = TempDir::new().unwrap();
        let driver = Arc::new(LocalDriver::new(tmp.path().to_path_buf()));
        let disk = Disk::new(
            driver.clone(),
            None,
            Some("https://cdn.example.com/".to_string()),
        );

        assert_eq!(disk.url("a/b.txt"), "https://cdn.example.com/a/b.txt");
        assert_eq!(disk.url("/a/b.txt"), "https://cdn.example.com/a/b.txt");

        let bare = Disk::new(driver, None, None);
        assert_eq!(bare.url("a/b.txt"), "a/b.txt");
    }

    #[tokio::test]
    async fn test_temporary_url_falls_back_to_url() {
        let tmp = TempDir::new().unwrap();
        let driver = Arc::new(LocalDriver::new(tmp.path().to_path_buf()));
        let disk = Disk::new(driver, None, Some("https://cdn.example.com".to_string()));

        let url = disk
            .temporary_url("a.txt", Duration::from_secs(600))
            .await;
        assert_eq!(url, "https://cdn.example.com/a.txt");
    }

    #[test]
    fn test_path_resolution() {
        let driver: Arc<dyn StorageDriver> =
            Arc::new(LocalDriver::new(std::path::PathBuf::from("/tmp/store")));
        let disk = Disk::new(driver.clone(), Some("/tmp/store".to_string()), None);
        assert_eq!(disk.path("reports/x.txt"), "/tmp/store/reports/x.txt");

        let rootless = Disk::new(driver, None, None);
        assert_eq!(rootless.path("reports/x.txt"), "reports/x.txt");
    }
}
