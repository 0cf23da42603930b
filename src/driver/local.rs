//! Local filesystem storage driver.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::{ByteStream, DriverError, DriverResult, Entry, StorageDriver, WriteOptions};

/// Local filesystem storage driver.
///
/// Files live directly under `root`; a path like `reports/x.txt` maps to
/// `{root}/reports/x.txt`. Parent directories are created on write.
pub struct LocalDriver {
    root: PathBuf,
}

impl LocalDriver {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a relative path against the root.
    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    async fn ensure_parent(&self, path: &Path) -> DriverResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn map_not_found(path: &str, e: std::io::Error) -> DriverError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DriverError::NotFound(path.to_string())
        } else {
            DriverError::Io(e)
        }
    }

    /// Collect entries under one directory, keyed relative to the root.
    async fn list_dir(&self, dir: &Path, prefix: &str, out: &mut Vec<Entry>, dirs: &mut Vec<(PathBuf, String)>) -> DriverResult<()> {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let key = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                dirs.push((entry.path(), key.clone()));
                out.push(Entry::directory(key));
            } else {
                out.push(Entry::file(key));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageDriver for LocalDriver {
    async fn file_exists(&self, path: &str) -> DriverResult<bool> {
        let path = self.full_path(path);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DriverError::Io(e)),
        }
    }

    async fn read(&self, path: &str) -> DriverResult<Bytes> {
        let full = self.full_path(path);
        let data = fs::read(&full)
            .await
            .map_err(|e| Self::map_not_found(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn read_stream(&self, path: &str) -> DriverResult<ByteStream> {
        let full = self.full_path(path);
        let file = fs::File::open(&full)
            .await
            .map_err(|e| Self::map_not_found(path, e))?;
        Ok(Box::new(file))
    }

    async fn write(&self, path: &str, contents: Bytes, _options: &WriteOptions) -> DriverResult<()> {
        let full = self.full_path(path);
        self.ensure_parent(&full).await?;
        fs::write(&full, &contents).await?;
        Ok(())
    }

    async fn write_stream(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        _options: &WriteOptions,
    ) -> DriverResult<()> {
        let full = self.full_path(path);
        self.ensure_parent(&full).await?;
        let mut file = fs::File::create(&full).await?;
        tokio::io::copy(&mut *reader, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> DriverResult<()> {
        let full = self.full_path(path);
        fs::remove_file(&full)
            .await
            .map_err(|e| Self::map_not_found(path, e))
    }

    async fn copy(&self, from: &str, to: &str) -> DriverResult<()> {
        let src = self.full_path(from);
        let dst = self.full_path(to);
        self.ensure_parent(&dst).await?;
        fs::copy(&src, &dst)
            .await
            .map_err(|e| Self::map_not_found(from, e))?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> DriverResult<()> {
        let src = self.full_path(from);
        let dst = self.full_path(to);
        self.ensure_parent(&dst).await?;
        fs::rename(&src, &dst)
            .await
            .map_err(|e| Self::map_not_found(from, e))
    }

    async fn file_size(&self, path: &str) -> DriverResult<u64> {
        let full = self.full_path(path);
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| Self::map_not_found(path, e))?;
        Ok(meta.len())
    }

    async fn last_modified(&self, path: &str) -> DriverResult<i64> {
        let full = self.full_path(path);
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| Self::map_not_found(path, e))?;
        let modified = meta.modified().map_err(DriverError::Io)?;
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(secs)
    }

    async fn mime_type(&self, path: &str) -> DriverResult<String> {
        if !self.file_exists(path).await? {
            return Err(DriverError::NotFound(path.to_string()));
        }
        let extension = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref().and_then(mime_from_extension) {
            Some(mime) => Ok(mime.to_string()),
            None => Err(DriverError::Other(format!(
                "unable to determine mime type of {}",
                path
            ))),
        }
    }

    async fn list(&self, directory: &str, recursive: bool) -> DriverResult<Vec<Entry>> {
        let base = self.full_path(directory);
        match fs::metadata(&base).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DriverError::Io(e)),
        }

        let root_prefix = directory.trim_matches('/').to_string();
        let mut out = Vec::new();
        let mut pending = vec![(base, root_prefix)];

        while let Some((dir, prefix)) = pending.pop() {
            let mut subdirs = Vec::new();
            self.list_dir(&dir, &prefix, &mut out, &mut subdirs).await?;
            if recursive {
                pending.extend(subdirs);
            }
        }

        Ok(out)
    }

    async fn create_directory(&self, path: &str) -> DriverResult<()> {
        let full = self.full_path(path);
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> DriverResult<()> {
        let full = self.full_path(path);
        match fs::remove_dir_all(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()), // Already gone
            Err(e) => Err(DriverError::Io(e)),
        }
    }

    async fn temporary_url(&self, _path: &str, _expires_in: Duration) -> Option<String> {
        // Local disks have no signing capability.
        None
    }
}

/// Extension-based MIME lookup covering the common cases.
fn mime_from_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        "txt" | "log" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => return None,
    };
    Some(mime)
}
