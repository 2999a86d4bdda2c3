//! Block model and IPLD decoding for CAR (Content ARchive) streams.
//!
//! This crate does no I/O. It turns the pieces cut out of a CAR stream into [`block::Block`]s:
//! the header section into a synthetic header block, and every `<cid><payload>` envelope into a
//! block verified against its CID, with its links and UnixFS data decoded.
pub mod block;
pub mod decoder;
pub mod errors;
pub mod header;
#[cfg(any(test, feature = "test"))]
pub mod testing;
pub mod unixfs;
pub mod verify;

pub use block::{Block, Verification};
pub use decoder::fs::{BlockData, DataType, Link};
pub use errors::CarError;
pub use header::{CarHeader, CarV2Header};
