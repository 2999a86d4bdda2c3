use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use car_ipld::{Block, CarError};
use futures::{stream, Stream, StreamExt, TryStreamExt};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, error};

use super::decoder::{CarDecoder, Frame};
use crate::config::ReaderConfig;
use crate::requester::ContentRequester;

/// Reads the blocks of one CAR archive obtained from a [`ContentRequester`].
///
/// The first block produced is always the synthetic header block. Every following block has been
/// verified against its CID, off the async runtime, and blocks are produced in stream order.
pub struct BlockReader<R> {
    requester: R,
    config: ReaderConfig,
}

impl<R> BlockReader<R>
where
    R: ContentRequester + Send + Sync + 'static,
{
    pub fn new(requester: R, config: ReaderConfig) -> Self {
        Self { requester, config }
    }

    /// A stream of blocks. It ends after the last block or right after the first error.
    pub fn stream(self) -> BlockStream {
        let Self { requester, config } = self;

        let body = stream::once(async move {
            requester
                .request()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        })
        .try_flatten();

        let frames = FramedRead::new(StreamReader::new(body), CarDecoder::new(&config));
        let blocks = frames
            .map(|frame| async move {
                match frame? {
                    Frame::Header(header) => Ok(Block::header(header)),
                    Frame::Block { cid, data, root } => {
                        tokio::task::spawn_blocking(move || Block::decode(cid, data, root))
                            .await
                            .map_err(|e| CarError::VerifierTask(e.to_string()))?
                    },
                }
            })
            .buffered(config.verify_concurrency.max(1));

        BlockStream {
            inner: Box::pin(blocks),
            done: false,
        }
    }

    /// Read the whole archive, reporting every block to `callback`.
    ///
    /// The callback receives `(block, is_completed, error_code)`. It is called once per block with
    /// `is_completed == false`, then exactly once with `(None, true, code)`, where `code` is zero on
    /// success and [`CarError::code`] otherwise. Dropping the returned future before it finishes
    /// cancels the read without a terminal call.
    pub async fn read<F>(self, mut callback: F)
    where
        F: FnMut(Option<Block>, bool, i32),
    {
        let mut blocks = self.stream();
        let mut error_code = 0;
        while let Some(item) = blocks.next().await {
            match item {
                Ok(block) => callback(Some(block), false, 0),
                Err(e) => {
                    error!("Reading CAR stream failed: {e}");
                    error_code = e.code();
                    break;
                },
            }
        }
        debug!("CAR read finished with code {error_code}");
        callback(None, true, error_code);
    }

    /// Run [`BlockReader::read`] in the background. The read is cancelled when the returned handle
    /// is dropped.
    pub fn spawn<F>(self, callback: F) -> ReadHandle
    where
        F: FnMut(Option<Block>, bool, i32) + Send + 'static,
    {
        ReadHandle {
            handle: Some(tokio::spawn(self.read(callback))),
        }
    }
}

/// The blocks of a CAR archive. See [`BlockReader::stream`].
pub struct BlockStream {
    inner: Pin<Box<dyn Stream<Item = Result<Block, CarError>> + Send>>,
    done: bool,
}

impl Stream for BlockStream {
    type Item = Result<Block, CarError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let item = ready!(self.inner.as_mut().poll_next(cx));
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        Poll::Ready(item)
    }
}

/// Handle to a read running in the background. Dropping it aborts the read.
pub struct ReadHandle {
    handle: Option<JoinHandle<()>>,
}

impl ReadHandle {
    /// Wait for the read to finish.
    pub async fn join(mut self) -> Result<(), JoinError> {
        match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    }

    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
