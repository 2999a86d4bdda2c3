//! In-memory CAR writer for building test archives.
use std::borrow::Cow;

use bytes::Bytes;
use cid::Cid;
use ipld_core::ipld::Ipld;
use ipld_dagpb::{PbLink, PbNode};
use multihash_codetable::{Code, MultihashDigest};

use crate::decoder::data_codec::{DAG_CBOR_CODE, DAG_PB_CODE, RAW_CODE};
use crate::header::{CarHeader, CarV2Header, CAR_V2_HEADER_SIZE, CAR_V2_PRAGMA};
use crate::unixfs::{Data, DataType};

/// Hash `bytes` with sha2-256 under `codec`.
pub fn cid_for(codec: u64, bytes: &[u8]) -> Cid {
    Cid::new_v1(codec, Code::Sha2_256.digest(bytes))
}

pub fn raw_block(data: &[u8]) -> (Cid, Bytes) {
    (cid_for(RAW_CODE, data), Bytes::copy_from_slice(data))
}

fn dag_pb_block(links: Vec<PbLink>, data: Data) -> (Cid, Bytes) {
    let node = PbNode {
        links,
        data: Some(data.to_bytes().expect("UnixFS data encodes").into()),
    };
    let bytes = Bytes::from(node.into_bytes());
    (cid_for(DAG_PB_CODE, &bytes), bytes)
}

/// A single-block UnixFS file.
pub fn file_block(content: &[u8]) -> (Cid, Bytes) {
    dag_pb_block(
        vec![],
        Data {
            Type: DataType::File,
            Data: Some(Cow::Borrowed(content)),
            filesize: Some(content.len() as u64),
            ..Default::default()
        },
    )
}

/// A UnixFS file whose content lives in the given chunks, `(cid, chunk length)`, in order.
pub fn chunked_file_block(chunks: &[(Cid, u64)]) -> (Cid, Bytes) {
    let links = chunks
        .iter()
        .map(|(cid, size)| PbLink {
            cid: *cid,
            name: Some(String::new()),
            size: Some(*size),
        })
        .collect();
    dag_pb_block(
        links,
        Data {
            Type: DataType::File,
            filesize: Some(chunks.iter().map(|(_, size)| size).sum()),
            blocksizes: chunks.iter().map(|(_, size)| *size).collect(),
            ..Default::default()
        },
    )
}

/// A UnixFS directory. Entries must be sorted by name, as DAG-PB requires.
pub fn directory_block(entries: &[(&str, Cid)]) -> (Cid, Bytes) {
    let links = entries
        .iter()
        .map(|(name, cid)| PbLink {
            cid: *cid,
            name: Some(name.to_string()),
            size: None,
        })
        .collect();
    dag_pb_block(
        links,
        Data {
            Type: DataType::Directory,
            ..Default::default()
        },
    )
}

pub fn dag_cbor_block(node: &Ipld) -> (Cid, Bytes) {
    let bytes = Bytes::from(serde_ipld_dagcbor::to_vec(node).expect("Ipld must encode"));
    (cid_for(DAG_CBOR_CODE, &bytes), bytes)
}

/// Length-prefix `parts` as one envelope.
pub fn envelope(parts: &[&[u8]]) -> Vec<u8> {
    let len: usize = parts.iter().map(|part| part.len()).sum();
    let mut buf = unsigned_varint::encode::usize_buffer();
    let mut out = unsigned_varint::encode::usize(len, &mut buf).to_vec();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Writes CAR archives from blocks in the order they are added.
#[derive(Default)]
pub struct CarBuilder {
    roots: Vec<Cid>,
    blocks: Vec<(Cid, Bytes)>,
}

impl CarBuilder {
    pub fn new(roots: Vec<Cid>) -> Self {
        Self {
            roots,
            blocks: Vec::new(),
        }
    }

    /// Add a block. The bytes are written as given, they do not have to match the CID.
    pub fn block(mut self, (cid, bytes): (Cid, Bytes)) -> Self {
        self.blocks.push((cid, bytes));
        self
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let header = CarHeader::new_v1(self.roots.clone())
            .encode()
            .expect("CAR header encodes");
        envelope(&[header.as_slice()])
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        for (cid, bytes) in &self.blocks {
            out.extend(envelope(&[cid.to_bytes().as_slice(), &bytes[..]]));
        }
        out
    }

    /// Wrap the CARv1 payload in a CARv2 container with `padding` zero bytes before the data
    /// section and `index` appended after it.
    pub fn build_v2(&self, padding: usize, index: &[u8]) -> Vec<u8> {
        let data = self.build();
        let data_offset = (CAR_V2_PRAGMA.len() + CAR_V2_HEADER_SIZE + padding) as u64;
        let header = CarV2Header {
            characteristics: 0,
            data_offset,
            data_size: data.len() as u64,
            index_offset: if index.is_empty() {
                0
            } else {
                data_offset + data.len() as u64
            },
        };

        let mut out = CAR_V2_PRAGMA.to_vec();
        out.extend_from_slice(&header.to_bytes());
        out.extend(std::iter::repeat(0).take(padding));
        out.extend(data);
        out.extend_from_slice(index);
        out
    }
}
