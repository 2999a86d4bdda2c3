//! This module provides an abstraction to decode the body of a CAR block according to the codec
//! declared in its CID.
//!
//! Decoding only extracts what the reader and the DAG traversal need:
//!
//! - The outgoing links of the node, in order.
//! - The typed data record, for UnixFS nodes, or the whole body for untyped leaves.
//!
//! On any doubts or question please refer to the [IPLD Spec](https://ipld.io/specs/about/).
use bytes::Bytes;
use cid::Cid;
use ipld_core::ipld::Ipld;
use ipld_dagpb::PbNode;

use super::fs::{BlockData, Link};
use crate::errors::CarError;
use crate::unixfs::Data;

pub const RAW_CODE: u64 = 0x55;
pub const DAG_PB_CODE: u64 = 0x70;
pub const DAG_CBOR_CODE: u64 = 0x71;
pub const DAG_JSON_CODE: u64 = 0x0129;

/// The decoded view of a block body.
#[derive(Debug, Default, Clone)]
pub struct Decoded {
    /// Outgoing links. `None` for leaves.
    pub links: Option<Vec<Link>>,
    pub data: Option<BlockData>,
}

impl Decoded {
    fn leaf(raw: &Bytes) -> Self {
        Self {
            links: None,
            data: Some(BlockData::untyped(raw.clone())),
        }
    }
}

/// Trait to decode a block body for one multicodec.
pub trait BlockCodec {
    /// The multicodec code this codec handles.
    const CODE: u64;

    fn decode(cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError>;
}

/// Raw blocks are always content leaves.
pub struct RawCodec;

impl BlockCodec for RawCodec {
    const CODE: u64 = RAW_CODE;

    fn decode(_cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError> {
        Ok(Decoded::leaf(raw))
    }
}

/// DAG-PB nodes, with their data field interpreted as UnixFS.
///
/// `Bytes` ---> `PbNode` ---> `Data` (UnixFs) ---> `Decoded`
pub struct DagPbWithUnixFsCodec;

impl BlockCodec for DagPbWithUnixFsCodec {
    const CODE: u64 = DAG_PB_CODE;

    fn decode(cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError> {
        let node = PbNode::from_bytes(raw.clone()).map_err(|e| CarError::block(cid, e))?;
        let links = (!node.links.is_empty()).then(|| Link::get_links(&node.links));
        let data = match &node.data {
            Some(bytes) => {
                let data = Data::try_from(&bytes[..]).map_err(|e| CarError::block(cid, e))?;
                let content = data
                    .Data
                    .as_deref()
                    .map(Bytes::copy_from_slice)
                    .unwrap_or_default();
                Some(BlockData::new(
                    Some(data.Type.into()),
                    content,
                    data.filesize,
                ))
            },
            None => None,
        };
        Ok(Decoded { links, data })
    }
}

/// DAG-CBOR nodes. Every `Link` value found in the document is an outgoing link, named after its
/// path inside the document.
pub struct DagCborCodec;

impl BlockCodec for DagCborCodec {
    const CODE: u64 = DAG_CBOR_CODE;

    fn decode(cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError> {
        let node: Ipld = serde_ipld_dagcbor::from_slice(raw).map_err(|e| CarError::block(cid, e))?;
        Ok(decode_ipld(&node, raw))
    }
}

/// DAG-JSON nodes, decoded into the same data model as DAG-CBOR.
pub struct DagJsonCodec;

impl BlockCodec for DagJsonCodec {
    const CODE: u64 = DAG_JSON_CODE;

    fn decode(cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError> {
        let node: Ipld = serde_ipld_dagjson::from_slice(raw).map_err(|e| CarError::block(cid, e))?;
        Ok(decode_ipld(&node, raw))
    }
}

/// Collect every `Link` of an IPLD document in document order. A document without links is a
/// leaf carrying its encoded body.
fn decode_ipld(node: &Ipld, raw: &Bytes) -> Decoded {
    let mut links = Vec::new();
    let mut stack = vec![(String::new(), node)];
    while let Some((path, value)) = stack.pop() {
        match value {
            Ipld::Link(target) => {
                let name = (!path.is_empty()).then_some(path);
                links.push(Link::new(*target, name, None));
            },
            // Pushed in reverse so links come out in document order.
            Ipld::List(items) => stack.extend(
                items
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, item)| (join(&path, &i.to_string()), item)),
            ),
            Ipld::Map(entries) => stack.extend(
                entries
                    .iter()
                    .rev()
                    .map(|(key, item)| (join(&path, key), item)),
            ),
            _ => {},
        }
    }

    if links.is_empty() {
        Decoded::leaf(raw)
    } else {
        Decoded {
            links: Some(links),
            data: None,
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}/{segment}")
    }
}

/// Decode a block body with the codec named by its CID. Codecs without a decoder here are treated
/// as opaque leaves.
pub fn decode_block(cid: &Cid, raw: &Bytes) -> Result<Decoded, CarError> {
    match cid.codec() {
        RawCodec::CODE => RawCodec::decode(cid, raw),
        DagPbWithUnixFsCodec::CODE => DagPbWithUnixFsCodec::decode(cid, raw),
        DagCborCodec::CODE => DagCborCodec::decode(cid, raw),
        DagJsonCodec::CODE => DagJsonCodec::decode(cid, raw),
        _ => Ok(Decoded::leaf(raw)),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::collections::BTreeMap;

    use ipld_dagpb::PbLink;
    use multihash_codetable::{Code, MultihashDigest};

    use super::*;
    use crate::decoder::fs::DataType;
    use crate::unixfs::{self, DataType as UnixFsType};

    fn cid_of(codec: u64, bytes: &[u8]) -> Cid {
        Cid::new_v1(codec, Code::Sha2_256.digest(bytes))
    }

    #[test]
    fn test_raw_is_a_leaf() {
        let raw = Bytes::from_static(b"hello");
        let decoded = decode_block(&cid_of(RAW_CODE, &raw), &raw).unwrap();
        assert!(decoded.links.is_none());
        assert_eq!(decoded.data.unwrap().content(), &raw);
    }

    #[test]
    fn test_dag_pb_directory() {
        let child = cid_of(RAW_CODE, b"hello");
        let node = PbNode {
            links: vec![PbLink {
                cid: child,
                name: Some("hello.txt".to_string()),
                size: Some(5),
            }],
            data: Some(
                unixfs::Data {
                    Type: UnixFsType::Directory,
                    ..Default::default()
                }
                .to_bytes()
                .unwrap()
                .into(),
            ),
        };
        let raw = Bytes::from(node.into_bytes());
        let decoded = decode_block(&cid_of(DAG_PB_CODE, &raw), &raw).unwrap();

        let links = decoded.links.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].cid(), &child);
        assert_eq!(links[0].name(), Some("hello.txt"));
        assert_eq!(decoded.data.unwrap().kind(), Some(DataType::Directory));
    }

    #[test]
    fn test_dag_pb_file_leaf() {
        let node = PbNode {
            links: vec![],
            data: Some(
                unixfs::Data {
                    Type: UnixFsType::File,
                    Data: Some(Cow::Borrowed(&b"content"[..])),
                    filesize: Some(7),
                    ..Default::default()
                }
                .to_bytes()
                .unwrap()
                .into(),
            ),
        };
        let raw = Bytes::from(node.into_bytes());
        let decoded = decode_block(&cid_of(DAG_PB_CODE, &raw), &raw).unwrap();
        assert!(decoded.links.is_none());
        let data = decoded.data.unwrap();
        assert_eq!(data.kind(), Some(DataType::File));
        assert_eq!(data.content().as_ref(), b"content");
        assert_eq!(data.file_size(), Some(7));
    }

    #[test]
    fn test_dag_pb_garbage() {
        let raw = Bytes::from_static(&[0xff, 0xff, 0xff]);
        let cid = cid_of(DAG_PB_CODE, &raw);
        assert!(matches!(
            decode_block(&cid, &raw),
            Err(CarError::MalformedBlock(c, _)) if c == cid
        ));
    }

    #[test]
    fn test_dag_cbor_links_in_document_order() {
        let first = cid_of(RAW_CODE, b"first");
        let second = cid_of(RAW_CODE, b"second");
        let third = cid_of(RAW_CODE, b"third");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Ipld::Link(first));
        map.insert(
            "b".to_string(),
            Ipld::List(vec![Ipld::Link(second), Ipld::Integer(1), Ipld::Link(third)]),
        );
        let raw = Bytes::from(serde_ipld_dagcbor::to_vec(&Ipld::Map(map)).unwrap());

        let decoded = decode_block(&cid_of(DAG_CBOR_CODE, &raw), &raw).unwrap();
        let links = decoded.links.unwrap();
        let names = links.iter().map(|l| l.name().unwrap()).collect::<Vec<_>>();
        let cids = links.iter().map(|l| *l.cid()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b/0", "b/2"]);
        assert_eq!(cids, vec![first, second, third]);
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_dag_cbor_without_links_is_a_leaf() {
        let raw = Bytes::from(serde_ipld_dagcbor::to_vec(&Ipld::Integer(42)).unwrap());
        let decoded = decode_block(&cid_of(DAG_CBOR_CODE, &raw), &raw).unwrap();
        assert!(decoded.links.is_none());
        assert!(decoded.data.unwrap().carries_content());
    }

    #[test]
    fn test_dag_json_links() {
        let child = cid_of(RAW_CODE, b"child");
        let raw = Bytes::from(format!(r#"{{"name":"node","next":[{{"/":"{child}"}}]}}"#));
        let decoded = decode_block(&cid_of(DAG_JSON_CODE, &raw), &raw).unwrap();
        let links = decoded.links.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].cid(), &child);
        assert_eq!(links[0].name(), Some("next/0"));
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_dag_json_without_links_is_a_leaf() {
        let raw = Bytes::from_static(br#"{"hello":"world"}"#);
        let decoded = decode_block(&cid_of(DAG_JSON_CODE, &raw), &raw).unwrap();
        assert!(decoded.links.is_none());
        assert!(decoded.data.unwrap().carries_content());
    }

    #[test]
    fn test_dag_json_garbage() {
        let raw = Bytes::from_static(b"{not json");
        let cid = cid_of(DAG_JSON_CODE, &raw);
        assert!(matches!(
            decode_block(&cid, &raw),
            Err(CarError::MalformedBlock(c, _)) if c == cid
        ));
    }
}
