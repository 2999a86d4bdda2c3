//! Incremental reader for CAR (Content ARchive) streams.
//!
//! A [`requester::ContentRequester`] supplies the bytes, [`BlockReader`] cuts them into verified
//! [`car_ipld::Block`]s as they arrive, and [`DagAssembler`] puts the blocks back together into a
//! DAG that can be walked or extracted as UnixFS.
pub mod car_reader;
pub mod config;
pub mod dag;
pub mod error;
pub mod requester;

pub use car_reader::{BlockReader, BlockStream, CarDecoder, ReadHandle, ReaderState};
pub use config::{GatewayConfig, ReaderConfig};
pub use dag::{DagAssembler, EntryKind, FsEntry, NodeKind, Visit};
pub use error::{DagError, RequestError};
