//! This module provides the decoded pieces of a block: its outgoing links and the typed data
//! record carried by UnixFS nodes.
use bytes::Bytes;
use cid::Cid;
use ipld_dagpb::PbLink;

use crate::unixfs;

/// A link to another IPLD node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    cid: Cid,
    name: Option<String>,
    size: Option<u64>,
}

impl From<Cid> for Link {
    fn from(cid: Cid) -> Self {
        Self::new(cid, None, None)
    }
}

impl From<&PbLink> for Link {
    fn from(link: &PbLink) -> Self {
        Link::new(link.cid, link.name.clone(), link.size)
    }
}

impl Link {
    pub fn new(cid: Cid, name: Option<String>, size: Option<u64>) -> Self {
        Self { cid, name, size }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn get_links(links: &[PbLink]) -> Vec<Link> {
        links.iter().map(Into::into).collect()
    }
}

/// The type tag of a UnixFS node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl From<unixfs::DataType> for DataType {
    fn from(ty: unixfs::DataType) -> Self {
        match ty {
            unixfs::DataType::Raw => DataType::Raw,
            unixfs::DataType::Directory => DataType::Directory,
            unixfs::DataType::File => DataType::File,
            unixfs::DataType::Metadata => DataType::Metadata,
            unixfs::DataType::Symlink => DataType::Symlink,
            unixfs::DataType::HAMTShard => DataType::HamtShard,
        }
    }
}

impl DataType {
    /// Whether nodes of this type carry file bytes in their data field.
    pub fn carries_content(&self) -> bool {
        matches!(self, DataType::File | DataType::Raw)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, DataType::Directory | DataType::HamtShard)
    }
}

/// The decoded data record of a block.
///
/// `kind` is `None` for codecs without a type system (raw, DAG-CBOR): the whole block is the
/// payload then.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockData {
    kind: Option<DataType>,
    content: Bytes,
    file_size: Option<u64>,
}

impl std::fmt::Debug for BlockData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockData")
            .field("kind", &self.kind)
            .field("file_size", &self.file_size)
            .field("data-length", &self.content.len())
            .finish()
    }
}

impl BlockData {
    pub fn new(kind: Option<DataType>, content: Bytes, file_size: Option<u64>) -> Self {
        Self {
            kind,
            content,
            file_size,
        }
    }

    pub fn untyped(content: Bytes) -> Self {
        let len = content.len() as u64;
        Self::new(None, content, Some(len))
    }

    pub fn kind(&self) -> Option<DataType> {
        self.kind
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// The total size of the file rooted at this node, when the node declares it.
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn carries_content(&self) -> bool {
        self.kind.map_or(true, |kind| kind.carries_content())
    }
}
