//! The block model emitted by the CAR reader.
use bytes::Bytes;
use cid::Cid;
use tracing::warn;

use crate::decoder::data_codec::{decode_block, Decoded};
use crate::decoder::fs::{BlockData, DataType, Link};
use crate::errors::CarError;
use crate::header::CarHeader;
use crate::verify::verify;

/// Result of checking a block body against the digest embedded in its CID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verification {
    /// Not applicable, only used for the synthetic header block.
    #[default]
    Unknown,
    Verified,
    Failed,
}

impl From<bool> for Verification {
    fn from(matches: bool) -> Self {
        if matches {
            Verification::Verified
        } else {
            Verification::Failed
        }
    }
}

impl Verification {
    /// `None` when verification does not apply.
    pub fn as_option(&self) -> Option<bool> {
        match self {
            Verification::Unknown => None,
            Verification::Verified => Some(true),
            Verification::Failed => Some(false),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

/// One decoded unit of a CAR stream.
///
/// The first block of every stream is a synthetic header block: it has no CID and carries the CAR
/// header in [`Block::meta`]. Every other block has been verified against its CID before it is
/// constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    cid: Option<Cid>,
    raw: Bytes,
    links: Option<Vec<Link>>,
    data: Option<BlockData>,
    meta: Option<CarHeader>,
    verified: Verification,
    root: bool,
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("cid", &self.cid_string())
            .field("links", &self.links.as_ref().map(Vec::len))
            .field("data", &self.data)
            .field("verified", &self.verified)
            .field("root", &self.root)
            .field("data-length", &self.raw.len())
            .finish()
    }
}

impl Block {
    /// The synthetic block produced once per stream for the CAR header.
    pub fn header(header: CarHeader) -> Self {
        Self {
            cid: None,
            raw: Bytes::new(),
            links: None,
            data: None,
            meta: Some(header),
            verified: Verification::Unknown,
            root: true,
        }
    }

    /// Verify `raw` against `cid` and decode it.
    ///
    /// A body that fails verification is still returned, flagged [`Verification::Failed`]. If such
    /// a body also fails to decode it is returned without links or data. A verified body that does
    /// not decode under its codec is an error.
    pub fn decode(cid: Cid, raw: Bytes, root: bool) -> Result<Self, CarError> {
        let verified = verify(&cid, &raw);
        if !verified.is_verified() {
            warn!("Hash mismatch for block {cid}");
        }

        let Decoded { links, data } = match decode_block(&cid, &raw) {
            Ok(decoded) => decoded,
            Err(e) if !verified.is_verified() => {
                warn!("Skipping the body of unverified block {cid}: {e}");
                Decoded::default()
            },
            Err(e) => return Err(e),
        };

        Ok(Self {
            cid: Some(cid),
            raw,
            links,
            data,
            meta: None,
            verified,
            root,
        })
    }

    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    /// The string form of the CID, empty for the header block.
    pub fn cid_string(&self) -> String {
        self.cid.map(|cid| cid.to_string()).unwrap_or_default()
    }

    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw
    }

    pub fn links(&self) -> Option<&[Link]> {
        self.links.as_deref()
    }

    pub fn data(&self) -> Option<&BlockData> {
        self.data.as_ref()
    }

    /// The CAR header, only present on the header block.
    pub fn meta(&self) -> Option<&CarHeader> {
        self.meta.as_ref()
    }

    pub fn verified(&self) -> Verification {
        self.verified
    }

    /// `None` for the header block.
    pub fn is_verified(&self) -> Option<bool> {
        self.verified.as_option()
    }

    pub fn is_header(&self) -> bool {
        self.cid.is_none()
    }

    /// Whether the block is one of the roots declared by the header. The header block itself
    /// counts as a root of the archive.
    pub fn is_root(&self) -> bool {
        self.root
    }

    fn has_links(&self) -> bool {
        self.links.as_ref().is_some_and(|links| !links.is_empty())
    }

    /// A leaf carrying file bytes.
    pub fn is_content(&self) -> bool {
        !self.is_header()
            && !self.has_links()
            && self.data.as_ref().is_some_and(BlockData::carries_content)
    }

    /// A directory, a chunked file index, or any other node that is not content.
    pub fn is_metadata(&self) -> bool {
        !self.is_header() && !self.is_content()
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data.as_ref().and_then(BlockData::kind)
    }

    /// The payload of a content block.
    pub fn content_data(&self) -> Option<&Bytes> {
        if self.is_content() {
            self.data.as_ref().map(BlockData::content)
        } else {
            None
        }
    }
}
