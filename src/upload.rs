//! Uploaded-file abstraction consumed by [`Disk::put_file`](crate::Disk::put_file)
//! and [`Disk::put_file_as`](crate::Disk::put_file_as).
//!
//! An upload carries the client-supplied original filename (optional) and a
//! detachable, seekable byte stream. Detaching transfers ownership of the
//! stream to the caller; the stream is closed when dropped, which is what
//! lets `put_file_as` guarantee release on every exit path.

use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncSeek};

/// A seekable async byte stream backing an upload.
pub trait UploadStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> UploadStream for T {}

/// A file received from a client, ready to be stored on a disk.
pub struct UploadedFile {
    client_filename: Option<String>,
    stream: Option<Box<dyn UploadStream>>,
}

impl UploadedFile {
    /// Wrap an already-open stream.
    pub fn from_stream(
        stream: Box<dyn UploadStream>,
        client_filename: Option<String>,
    ) -> Self {
        Self {
            client_filename,
            stream: Some(stream),
        }
    }

    /// In-memory upload, mostly useful in tests and small payloads.
    pub fn from_bytes(contents: impl Into<Vec<u8>>, client_filename: Option<String>) -> Self {
        Self {
            client_filename,
            stream: Some(Box::new(Cursor::new(contents.into()))),
        }
    }

    /// The filename the client claims the upload had, if any. Untrusted
    /// input; only its extension is ever used.
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    /// Take ownership of the underlying stream. Returns `None` if it was
    /// already detached.
    pub fn detach(&mut self) -> Option<Box<dyn UploadStream>> {
        self.stream.take()
    }
}
