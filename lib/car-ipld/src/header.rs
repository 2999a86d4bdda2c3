//! CAR header types.
//!
//! - CARv1: <https://ipld.io/specs/transport/car/carv1/#header>
//! - CARv2: <https://ipld.io/specs/transport/car/carv2/#header>
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::errors::CarError;

/// The size of the fixed CARv2 header that follows the pragma.
pub const CAR_V2_HEADER_SIZE: usize = 40;

/// The CARv2 pragma, a CARv1-shaped header declaring `{version: 2}`, including its varint length
/// prefix.
pub const CAR_V2_PRAGMA: [u8; 11] = [
    0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02,
];

/// The DAG-CBOR encoded header section of a CAR stream.
///
/// A CARv2 pragma decodes into this type with `version == 2` and no roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    pub fn new_v1(roots: Vec<Cid>) -> Self {
        Self { roots, version: 1 }
    }

    /// Decode a header section. Only the shape is checked here; the reader decides which versions
    /// are acceptable at which position of the stream.
    pub fn decode(bytes: &[u8]) -> Result<Self, CarError> {
        serde_ipld_dagcbor::from_slice(bytes)
            .map_err(|e| CarError::MalformedHeader(format!("{e:?}")))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CarError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| CarError::MalformedHeader(format!("{e:?}")))
    }

    /// Validate a header that must start a CARv1 data section.
    pub fn validate_v1(self) -> Result<Self, CarError> {
        if self.version != 1 {
            return Err(CarError::MalformedHeader(format!(
                "Unsupported CAR version {}",
                self.version
            )));
        }
        if self.roots.is_empty() {
            return Err(CarError::MalformedHeader("Car file is empty".to_string()));
        }
        Ok(self)
    }
}

/// The fixed-size CARv2 header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarV2Header {
    pub characteristics: u128,
    pub data_offset: u64,
    pub data_size: u64,
    pub index_offset: u64,
}

impl CarV2Header {
    pub fn from_bytes(buf: &[u8; CAR_V2_HEADER_SIZE]) -> Self {
        let mut characteristics = [0; 16];
        let mut words = [[0; 8]; 3];
        characteristics.copy_from_slice(&buf[..16]);
        for (word, chunk) in words.iter_mut().zip(buf[16..].chunks_exact(8)) {
            word.copy_from_slice(chunk);
        }
        let [data_offset, data_size, index_offset] = words.map(u64::from_le_bytes);
        Self {
            characteristics: u128::from_be_bytes(characteristics),
            data_offset,
            data_size,
            index_offset,
        }
    }

    pub fn to_bytes(&self) -> [u8; CAR_V2_HEADER_SIZE] {
        let mut buf = [0; CAR_V2_HEADER_SIZE];
        buf[..16].copy_from_slice(&self.characteristics.to_be_bytes());
        buf[16..24].copy_from_slice(&self.data_offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        buf[32..].copy_from_slice(&self.index_offset.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use multihash_codetable::{Code, MultihashDigest};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_pragma_decodes_as_version_2() {
        let header = CarHeader::decode(&CAR_V2_PRAGMA[1..]).unwrap();
        assert_eq!(header.version, 2);
        assert!(header.roots.is_empty());
        assert!(header.validate_v1().is_err());
    }

    #[test]
    fn test_v1_header() {
        let root = Cid::new_v1(0x55, Code::Sha2_256.digest(b"root"));
        let header = CarHeader::decode(&CarHeader::new_v1(vec![root]).encode().unwrap()).unwrap();
        assert_eq!(header.roots, vec![root]);
        assert_eq!(header.clone().validate_v1().unwrap(), header);
    }

    #[test]
    fn test_v1_header_without_roots() {
        let header = CarHeader::decode(&CarHeader::new_v1(vec![]).encode().unwrap()).unwrap();
        assert!(matches!(
            header.validate_v1(),
            Err(CarError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_garbage_header() {
        assert!(matches!(
            CarHeader::decode(&[0xff, 0x00, 0x01]),
            Err(CarError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_v2_header_layout() {
        let header = CarV2Header {
            characteristics: 0,
            data_offset: 51,
            data_size: 448,
            index_offset: 499,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[16..24], &51u64.to_le_bytes());
        assert_eq!(CarV2Header::from_bytes(&bytes), header);

        let mut raw = [0; CAR_V2_HEADER_SIZE];
        raw[15] = 1;
        raw[16] = 0x33;
        raw[24..26].copy_from_slice(&[0xc0, 0x01]);
        raw[39] = 0x80;
        assert_eq!(
            CarV2Header::from_bytes(&raw),
            CarV2Header {
                characteristics: 1,
                data_offset: 0x33,
                data_size: 0x01c0,
                index_offset: 0x80 << 56,
            }
        );
    }
}
