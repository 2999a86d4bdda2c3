//! Assembly of the blocks of a CAR stream into a DAG.
//!
//! [`DagAssembler`] keeps every block of a read in an insertion ordered map keyed by CID and walks
//! it from the roots declared in the header. Walks use an explicit stack, so arbitrarily deep or
//! wide DAGs cannot overflow the call stack, and they never follow links out of a block that
//! failed verification.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use car_ipld::{Block, CarError, CarHeader, DataType};
use cid::Cid;
use futures::{Stream, StreamExt};
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::DagError;

/// How a visited node is classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf carrying file bytes.
    Content,
    /// A directory, a chunked file index or any other inner node.
    Metadata,
}

/// A node reached by [`DagAssembler::walk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Visit {
    pub cid: Cid,
    pub kind: NodeKind,
    /// Distance from the root the node was first reached from.
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { size: u64 },
    Symlink { target: String },
}

/// A file system entry of a UnixFS tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEntry {
    /// Path relative to the extraction directory. The first segment is the root CID.
    pub path: PathBuf,
    pub cid: Cid,
    pub kind: EntryKind,
}

enum Step {
    Enter {
        cid: Cid,
        parent: Option<Cid>,
        depth: usize,
    },
    Leave {
        cid: Cid,
        depth: usize,
    },
}

struct Pending {
    cid: Cid,
    parent: Option<Cid>,
    path: PathBuf,
    /// A HAMT sub-shard: its entries belong to the directory at `path`.
    shard: bool,
}

/// An insertion ordered `Cid -> Block` map with the header of the stream it was built from.
#[derive(Debug, Default)]
pub struct DagAssembler {
    header: Option<CarHeader>,
    blocks: IndexMap<Cid, Block>,
}

impl DagAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a block stream into a new assembler. The first stream error is returned.
    pub async fn collect<S>(mut blocks: S) -> Result<Self, CarError>
    where
        S: Stream<Item = Result<Block, CarError>> + Unpin,
    {
        let mut dag = Self::new();
        while let Some(block) = blocks.next().await {
            if let Err(e) = dag.insert(block?) {
                warn!("{e}");
            }
        }
        Ok(dag)
    }

    /// Add a block. The first block stored under a CID wins.
    ///
    /// Returns `Ok(false)` if the block was already present with the same bytes, and
    /// [`DagError::DuplicateBlock`] if it was present with different bytes.
    pub fn insert(&mut self, block: Block) -> Result<bool, DagError> {
        let Some(cid) = block.cid().copied() else {
            if self.header.is_some() {
                return Ok(false);
            }
            self.header = block.meta().cloned();
            return Ok(true);
        };

        match self.blocks.entry(cid) {
            Entry::Occupied(existing) if existing.get().raw_bytes() == block.raw_bytes() => {
                debug!("Ignoring repeated block {cid}");
                Ok(false)
            },
            Entry::Occupied(_) => Err(DagError::DuplicateBlock(cid)),
            Entry::Vacant(slot) => {
                slot.insert(block);
                Ok(true)
            },
        }
    }

    pub fn header(&self) -> Option<&CarHeader> {
        self.header.as_ref()
    }

    /// The roots declared by the header.
    pub fn roots(&self) -> Result<&[Cid], DagError> {
        self.header
            .as_ref()
            .map(|header| header.roots.as_slice())
            .ok_or(DagError::NoHeader)
    }

    pub fn get(&self, cid: &Cid) -> Option<&Block> {
        self.blocks.get(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in the order they were first inserted.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Look up a block that is about to be traversed.
    fn resolve(&self, cid: &Cid, parent: Option<Cid>) -> Result<&Block, DagError> {
        let block = self.blocks.get(cid).ok_or(match parent {
            Some(parent) => DagError::DanglingLink {
                parent,
                target: *cid,
            },
            None => DagError::MissingRoot(*cid),
        })?;
        if !block.verified().is_verified() {
            return Err(DagError::Unverified(*cid));
        }
        Ok(block)
    }

    /// Depth first walk from every root, following links in order.
    ///
    /// Nodes are reported after all of their descendants. A node reachable along several paths
    /// is reported once.
    pub fn walk(&self) -> Result<Vec<Visit>, DagError> {
        let mut visits = Vec::new();
        let mut entered = HashSet::new();

        for root in self.roots()? {
            let mut stack = vec![Step::Enter {
                cid: *root,
                parent: None,
                depth: 0,
            }];
            while let Some(step) = stack.pop() {
                match step {
                    Step::Enter { cid, parent, depth } => {
                        if !entered.insert(cid) {
                            continue;
                        }
                        let block = self.resolve(&cid, parent)?;
                        stack.push(Step::Leave { cid, depth });
                        for link in block.links().unwrap_or_default().iter().rev() {
                            stack.push(Step::Enter {
                                cid: *link.cid(),
                                parent: Some(cid),
                                depth: depth + 1,
                            });
                        }
                    },
                    Step::Leave { cid, depth } => {
                        let kind = match self.blocks.get(&cid) {
                            Some(block) if block.is_content() => NodeKind::Content,
                            _ => NodeKind::Metadata,
                        };
                        visits.push(Visit { cid, kind, depth });
                    },
                }
            }
        }
        Ok(visits)
    }

    /// The content of the file rooted at `cid`, with its chunks concatenated in link order.
    pub fn read_file(&self, cid: &Cid) -> Result<Bytes, DagError> {
        let mut out = BytesMut::new();
        let mut stack = vec![(*cid, None)];
        while let Some((current, parent)) = stack.pop() {
            let block = self.resolve(&current, parent)?;
            match block.data() {
                Some(data) if data.carries_content() => out.extend_from_slice(data.content()),
                Some(_) => return Err(DagError::NotAFile(current)),
                // Inner nodes of codecs without a data record only link to chunks.
                None if block.links().is_some() => {},
                None => return Err(DagError::NotAFile(current)),
            }
            for link in block.links().unwrap_or_default().iter().rev() {
                stack.push((*link.cid(), Some(current)));
            }
        }
        Ok(out.freeze())
    }

    /// Resolve every root into the UnixFS tree below it, directories before their entries.
    pub fn entries(&self) -> Result<Vec<FsEntry>, DagError> {
        let mut entries = Vec::new();

        for root in self.roots()? {
            let mut stack = vec![Pending {
                cid: *root,
                parent: None,
                path: PathBuf::from(root.to_string()),
                shard: false,
            }];
            while let Some(Pending {
                cid,
                parent,
                path,
                shard,
            }) = stack.pop()
            {
                let block = self.resolve(&cid, parent)?;
                match block.data_type() {
                    Some(kind) if kind.is_directory() => {
                        if !shard {
                            entries.push(FsEntry {
                                path: path.clone(),
                                cid,
                                kind: EntryKind::Directory,
                            });
                        }
                        for link in block.links().unwrap_or_default().iter().rev() {
                            let name = link.name().unwrap_or_default();
                            let (name, shard) = match kind {
                                // HAMT entries are prefixed with a two character bucket index;
                                // a bare index names a sub-shard.
                                DataType::HamtShard if name.len() <= 2 => (None, true),
                                DataType::HamtShard => (name.get(2..), false),
                                _ => (Some(name), false),
                            };
                            let path = match name {
                                Some(name) => path.join(entry_name(name)?),
                                None => path.clone(),
                            };
                            stack.push(Pending {
                                cid: *link.cid(),
                                parent: Some(cid),
                                path,
                                shard,
                            });
                        }
                    },
                    Some(DataType::Symlink) => {
                        let target = block
                            .data()
                            .map(|data| String::from_utf8_lossy(data.content()).into_owned())
                            .unwrap_or_default();
                        entries.push(FsEntry {
                            path,
                            cid,
                            kind: EntryKind::Symlink { target },
                        });
                    },
                    _ => {
                        let size = self.read_file(&cid)?.len() as u64;
                        entries.push(FsEntry {
                            path,
                            cid,
                            kind: EntryKind::File { size },
                        });
                    },
                }
            }
        }
        Ok(entries)
    }

    /// Write the UnixFS trees below the roots into `out`. Returns the paths of the files written.
    pub async fn extract(&self, out: &Path) -> Result<Vec<PathBuf>, DagError> {
        let mut written = Vec::new();
        for entry in self.entries()? {
            let target = out.join(&entry.path);
            match entry.kind {
                EntryKind::Directory => tokio::fs::create_dir_all(&target).await?,
                EntryKind::File { .. } => {
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&target, self.read_file(&entry.cid)?).await?;
                    debug!("Wrote {}", target.display());
                    written.push(target);
                },
                EntryKind::Symlink { target: link } => {
                    warn!("Skipping symlink {} -> {link}", entry.path.display());
                },
            }
        }
        Ok(written)
    }
}

/// A link name usable as a single path segment.
fn entry_name(name: &str) -> Result<&str, DagError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(DagError::InvalidName(name.to_string()));
    }
    Ok(name)
}
