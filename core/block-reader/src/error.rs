use std::io;

use cid::Cid;
use thiserror::Error;

/// Errors raised while obtaining a CAR byte stream.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request error: Invalid gateway URL {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Request error: HTTP client error {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request error: Failed to fetch data from gateways")]
    NoGateway,
    #[error("Request error: Cannot open content {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while walking or reconstructing an assembled DAG.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("DAG error: No header block was collected")]
    NoHeader,
    #[error("DAG error: Root {0} is not in the archive")]
    MissingRoot(Cid),
    #[error("DAG error: Block {parent} links to {target}, which is not in the archive")]
    DanglingLink { parent: Cid, target: Cid },
    #[error("DAG error: Block {0} failed verification")]
    Unverified(Cid),
    #[error("DAG error: Block {0} is not a file")]
    NotAFile(Cid),
    #[error("DAG error: Block {0} was received twice with different bytes")]
    DuplicateBlock(Cid),
    #[error("DAG error: Invalid entry name {0:?}")]
    InvalidName(String),
    #[error("DAG error: Failed to write output {0}")]
    Io(#[from] io::Error),
}
