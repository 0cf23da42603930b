//! S3-compatible storage driver.
//!
//! Targets one bucket (with an optional key prefix) on AWS S3 or any
//! S3-compatible store (MinIO, R2, etc. via a custom endpoint). Built from
//! static credentials; no environment lookup happens here.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Builder, Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream as S3Body,
    Client,
};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ByteStream, DriverError, DriverResult, Entry, StorageDriver, WriteOptions};

/// S3 driver configuration.
#[derive(Clone, Debug)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// Access key id.
    pub key: String,
    /// Secret access key.
    pub secret: String,
    /// Optional prefix prepended to every object key.
    pub prefix: Option<String>,
    /// Custom endpoint URL (for MinIO, R2, etc.).
    pub endpoint: Option<String>,
    /// Force path-style URLs (required for MinIO).
    pub force_path_style: bool,
}

impl S3Config {
    /// Config for AWS S3 with static credentials.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            key: String::new(),
            secret: String::new(),
            prefix: None,
            endpoint: None,
            force_path_style: false,
        }
    }

    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.key = key.into();
        self.secret = secret.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.force_path_style = true;
        self
    }
}

/// S3-compatible storage driver.
pub struct S3Driver {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Driver {
    /// Build a driver (and its client) from config. No network traffic
    /// happens until the first operation.
    pub fn new(config: S3Config) -> Self {
        let creds = Credentials::new(config.key, config.secret, None, None, "diskfs-config");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .force_path_style(config.force_path_style)
            .credentials_provider(creds);

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        }
    }

    /// Build the full object key from a relative path. The empty path maps
    /// to the bare prefix so directory prefixes do not grow a double slash.
    fn full_key(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        match &self.prefix {
            Some(prefix) if path.is_empty() => prefix.trim_matches('/').to_string(),
            Some(prefix) => format!("{}/{}", prefix.trim_matches('/'), path),
            None => path.to_string(),
        }
    }

    /// Prefix under which a directory's keys live, ending in `/` (or empty
    /// for the bucket root with no configured prefix).
    fn dir_prefix(&self, directory: &str) -> String {
        let key = self.full_key(directory.trim_matches('/'));
        if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        }
    }

    /// Strip the configured prefix back off a listed key.
    fn relative_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let prefix = format!("{}/", prefix.trim_matches('/'));
                key.strip_prefix(&prefix).unwrap_or(key).to_string()
            }
            None => key.to_string(),
        }
    }

    fn map_error(path: &str, e: impl std::fmt::Display) -> DriverError {
        let err_str = e.to_string();
        if err_str.contains("NoSuchKey") || err_str.contains("NotFound") || err_str.contains("404")
        {
            DriverError::NotFound(path.to_string())
        } else {
            DriverError::Other(err_str)
        }
    }
}

#[async_trait]
impl StorageDriver for S3Driver {
    async fn file_exists(&self, path: &str) -> DriverResult<bool> {
        let key = self.full_key(path);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match Self::map_error(path, e) {
                DriverError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn read(&self, path: &str) -> DriverResult<Bytes> {
        let key = self.full_key(path);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(path, e))?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;

        Ok(data.into_bytes())
    }

    async fn read_stream(&self, path: &str) -> DriverResult<ByteStream> {
        let key = self.full_key(path);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(path, e))?;

        Ok(Box::new(result.body.into_async_read()))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> DriverResult<()> {
        let key = self.full_key(path);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(S3Body::from(contents));

        if let Some(content_type) = options.get("content-type") {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;

        Ok(())
    }

    async fn write_stream(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> DriverResult<()> {
        // PutObject needs a known length; buffer the reader. Multipart
        // upload would lift this, at the cost of a much larger surface.
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        self.write(path, Bytes::from(buf), options).await
    }

    async fn delete(&self, path: &str) -> DriverResult<()> {
        let key = self.full_key(path);

        // S3 DeleteObject succeeds for missing keys; no existence probe here.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> DriverResult<()> {
        let source = format!("{}/{}", self.bucket, self.full_key(from));

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&source)
            .key(self.full_key(to))
            .send()
            .await
            .map_err(|e| Self::map_error(from, e))?;

        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> DriverResult<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }

    async fn file_size(&self, path: &str) -> DriverResult<u64> {
        let key = self.full_key(path);

        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(path, e))?;

        Ok(result.content_length.unwrap_or(0) as u64)
    }

    async fn last_modified(&self, path: &str) -> DriverResult<i64> {
        let key = self.full_key(path);

        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(path, e))?;

        Ok(result.last_modified.map(|t| t.secs()).unwrap_or(0))
    }

    async fn mime_type(&self, path: &str) -> DriverResult<String> {
        let key = self.full_key(path);

        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(path, e))?;

        result
            .content_type
            .ok_or_else(|| DriverError::Other(format!("no content type recorded for {}", path)))
    }

    async fn list(&self, directory: &str, recursive: bool) -> DriverResult<Vec<Entry>> {
        let dir_prefix = self.dir_prefix(directory);

        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&dir_prefix);

            if !recursive {
                request = request.delimiter("/");
            }

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;

            if let Some(prefixes) = result.common_prefixes {
                for p in prefixes {
                    if let Some(prefix) = p.prefix {
                        let path = self.relative_key(prefix.trim_end_matches('/'));
                        entries.push(Entry::directory(path));
                    }
                }
            }

            if let Some(contents) = result.contents {
                for obj in contents {
                    if let Some(key) = obj.key {
                        // Skip zero-byte directory markers
                        if key.ends_with('/') {
                            continue;
                        }
                        entries.push(Entry::file(self.relative_key(&key)));
                    }
                }
            }

            if result.is_truncated.unwrap_or(false) {
                continuation_token = result.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(entries)
    }

    async fn create_directory(&self, path: &str) -> DriverResult<()> {
        // Zero-byte marker object, the bucket convention for directories.
        let key = format!("{}/", self.full_key(path.trim_matches('/')));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(S3Body::from_static(b""))
            .send()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;

        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> DriverResult<()> {
        let dir_prefix = self.dir_prefix(path);
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&dir_prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;

            if let Some(contents) = result.contents {
                for obj in contents {
                    if let Some(key) = obj.key {
                        self.client
                            .delete_object()
                            .bucket(&self.bucket)
                            .key(&key)
                            .send()
                            .await
                            .map_err(|e| DriverError::Other(e.to_string()))?;
                    }
                }
            }

            if result.is_truncated.unwrap_or(false) {
                continuation_token = result.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(())
    }

    async fn temporary_url(&self, path: &str, expires_in: Duration) -> Option<String> {
        let key = self.full_key(path);

        let presigning = match PresigningConfig::expires_in(expires_in) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("invalid presign expiration for {}: {}", path, e);
                return None;
            }
        };

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
        {
            Ok(request) => Some(request.uri().to_string()),
            Err(e) => {
                tracing::warn!("failed to presign {}: {}", path, e);
                None
            }
        }
    }
}
