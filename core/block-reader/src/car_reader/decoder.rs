//! Incremental CAR decoder.
//!
//! [`CarDecoder`] turns an arbitrarily chunked byte stream into CAR frames. It never needs more
//! than one envelope of lookahead: bytes that do not yet form a complete envelope stay in the
//! read buffer until the next chunk arrives, so the frames produced do not depend on where the
//! chunk boundaries fall.
//!
//! Both CARv1 and CARv2 are accepted. For CARv2 the pragma and fixed header are consumed, the
//! padding before the data section is skipped, and everything after the data section (the index)
//! is discarded.
use bytes::{Buf, Bytes, BytesMut};
use car_ipld::header::{CarHeader, CarV2Header, CAR_V2_HEADER_SIZE};
use car_ipld::CarError;
use cid::Cid;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::config::ReaderConfig;

/// Lifecycle of a single read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingHeader,
    StreamingBlocks,
    Completed,
    Failed,
}

/// Progress through the header section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderStep {
    /// The first envelope: a CARv1 header or the CARv2 pragma.
    Leading,
    /// The fixed size CARv2 header.
    V2Header,
    /// Bytes left to skip before the CARv2 data section.
    Padding(u64),
    /// The CARv1 header wrapped by a CARv2 container.
    Inner,
}

/// One decoded unit of a CAR stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Header(CarHeader),
    Block { cid: Cid, data: Bytes, root: bool },
}

#[derive(Debug)]
pub struct CarDecoder {
    state: ReaderState,
    step: HeaderStep,
    roots: Vec<Cid>,
    /// Bytes consumed from the start of the stream.
    position: u64,
    /// Stream offset at which a CARv2 data section ends.
    data_end: Option<u64>,
    max_block_size: usize,
}

impl Default for CarDecoder {
    fn default() -> Self {
        Self::new(&ReaderConfig::default())
    }
}

impl CarDecoder {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            state: ReaderState::AwaitingHeader,
            step: HeaderStep::Leading,
            roots: Vec::new(),
            position: 0,
            data_end: None,
            max_block_size: config.max_block_size,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_header_retrieved(&self) -> bool {
        self.state != ReaderState::AwaitingHeader
    }

    /// Whether the stream is a CARv2 container.
    pub fn is_v2(&self) -> bool {
        self.data_end.is_some()
    }

    fn decode_frame(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CarError> {
        loop {
            match self.state {
                ReaderState::AwaitingHeader => match self.step {
                    HeaderStep::Leading => {
                        let Some(section) = self.take_envelope(src, CarError::MalformedHeader)?
                        else {
                            return Ok(None);
                        };
                        let header = CarHeader::decode(&section)?;
                        match header.version {
                            1 => return self.start_blocks(header),
                            2 => {
                                debug!("Found CARv2 pragma");
                                self.step = HeaderStep::V2Header;
                            },
                            version => {
                                return Err(CarError::MalformedHeader(format!(
                                    "Unsupported version {version}"
                                )));
                            },
                        }
                    },
                    HeaderStep::V2Header => {
                        if src.len() < CAR_V2_HEADER_SIZE {
                            return Ok(None);
                        }
                        let mut buf = [0; CAR_V2_HEADER_SIZE];
                        src.copy_to_slice(&mut buf);
                        self.position += CAR_V2_HEADER_SIZE as u64;

                        let header = CarV2Header::from_bytes(&buf);
                        self.step = HeaderStep::Padding(self.padding(&header)?);
                        self.data_end = Some(header.data_offset.saturating_add(header.data_size));
                    },
                    HeaderStep::Padding(0) => self.step = HeaderStep::Inner,
                    HeaderStep::Padding(remaining) => {
                        if src.is_empty() {
                            return Ok(None);
                        }
                        let skip = remaining.min(src.len() as u64);
                        src.advance(skip as usize);
                        self.position += skip;
                        self.step = HeaderStep::Padding(remaining - skip);
                    },
                    HeaderStep::Inner => {
                        let Some(section) = self.take_envelope(src, CarError::MalformedHeader)?
                        else {
                            return Ok(None);
                        };
                        return self.start_blocks(CarHeader::decode(&section)?);
                    },
                },
                ReaderState::StreamingBlocks => {
                    if self.data_end.is_some_and(|end| self.position >= end) {
                        // The CARv2 index is not needed to stream blocks.
                        let len = src.len();
                        src.advance(len);
                        self.position += len as u64;
                        return Ok(None);
                    }

                    let Some(envelope) = self.take_envelope(src, CarError::MalformedEnvelope)?
                    else {
                        return Ok(None);
                    };
                    return self.split_envelope(envelope.freeze()).map(Some);
                },
                ReaderState::Completed | ReaderState::Failed => return Ok(None),
            }
        }
    }

    fn start_blocks(&mut self, header: CarHeader) -> Result<Option<Frame>, CarError> {
        let header = header.validate_v1()?;
        debug!("Decoded CAR header with {} roots", header.roots.len());
        self.roots = header.roots.clone();
        self.state = ReaderState::StreamingBlocks;
        Ok(Some(Frame::Header(header)))
    }

    fn padding(&self, header: &CarV2Header) -> Result<u64, CarError> {
        let padding = header.data_offset.checked_sub(self.position).ok_or_else(|| {
            CarError::MalformedHeader(format!(
                "Data offset {} points inside the header",
                header.data_offset
            ))
        })?;
        // Nothing bounds the padding, so cap it like an envelope.
        if padding > self.max_block_size as u64 {
            return Err(CarError::MalformedHeader(format!(
                "Padding of {padding} bytes is too large"
            )));
        }
        Ok(padding)
    }

    /// Take one length-prefixed section off `src`, or `None` if it is not complete yet.
    fn take_envelope(
        &mut self,
        src: &mut BytesMut,
        malformed: fn(String) -> CarError,
    ) -> Result<Option<BytesMut>, CarError> {
        let (len, prefix) = match unsigned_varint::decode::u64(&src[..]) {
            Ok((len, rest)) => (len, src.len() - rest.len()),
            Err(unsigned_varint::decode::Error::Insufficient) => return Ok(None),
            Err(e) => return Err(malformed(format!("Invalid length prefix: {e}"))),
        };

        if len == 0 {
            return Err(malformed("Zero length section".to_string()));
        }
        if len > self.max_block_size as u64 {
            return Err(CarError::EnvelopeTooLarge {
                len,
                max: self.max_block_size,
            });
        }

        let total = prefix as u64 + len;
        if let Some(end) = self.data_end {
            if self.position + total > end {
                return Err(malformed(format!(
                    "Section of {len} bytes crosses the end of the data section"
                )));
            }
        }

        let total = total as usize;
        if src.len() < total {
            trace!("Waiting for {} more bytes", total - src.len());
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(prefix);
        self.position += total as u64;
        Ok(Some(src.split_to(len as usize)))
    }

    fn split_envelope(&self, envelope: Bytes) -> Result<Frame, CarError> {
        let mut reader = std::io::Cursor::new(&envelope[..]);
        let cid = Cid::read_bytes(&mut reader)
            .map_err(|e| CarError::MalformedEnvelope(format!("Invalid CID: {e}")))?;
        let offset = reader.position() as usize;
        trace!("Decoded envelope for {cid}");
        Ok(Frame::Block {
            cid,
            data: envelope.slice(offset..),
            root: self.roots.contains(&cid),
        })
    }
}

impl Decoder for CarDecoder {
    type Item = Frame;
    type Error = CarError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CarError> {
        let result = self.decode_frame(src);
        if result.is_err() {
            self.state = ReaderState::Failed;
        }
        result
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CarError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        match self.state {
            ReaderState::StreamingBlocks
                if src.is_empty() && self.data_end.map_or(true, |end| self.position >= end) =>
            {
                debug!("CAR stream completed after {} bytes", self.position);
                self.state = ReaderState::Completed;
                Ok(None)
            },
            ReaderState::AwaitingHeader | ReaderState::StreamingBlocks => {
                self.state = ReaderState::Failed;
                Err(CarError::TruncatedStream { pending: src.len() })
            },
            ReaderState::Completed | ReaderState::Failed => Ok(None),
        }
    }
}
