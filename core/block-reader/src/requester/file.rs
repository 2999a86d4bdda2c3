use std::path::PathBuf;

use bytes::Bytes;
use futures::stream;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{ContentRequester, Response};
use crate::error::RequestError;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Streams a CAR archive from the local filesystem.
#[derive(Clone, Debug)]
pub struct FileRequester {
    path: PathBuf,
    chunk_size: usize,
}

impl FileRequester {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Read the file in chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ContentRequester for FileRequester {
    async fn request(&self) -> Result<Response, RequestError> {
        let file = tokio::fs::File::open(&self.path).await?;
        debug!("Reading {}", self.path.display());
        Ok(Box::pin(ReaderStream::with_capacity(file, self.chunk_size)))
    }
}

/// Serves a CAR archive held in memory, cut into fixed size chunks.
#[derive(Clone, Debug)]
pub struct MemoryRequester {
    data: Bytes,
    chunk_size: usize,
}

impl MemoryRequester {
    pub fn new(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl ContentRequester for MemoryRequester {
    async fn request(&self) -> Result<Response, RequestError> {
        let data = self.data.clone();
        let chunks = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(data.len());
                Ok::<_, std::io::Error>(data.slice(start..end))
            })
            .collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
