use std::io;

use cid::Cid;
use thiserror::Error;

/// Error type for CAR stream decoding.
///
/// Every variant is fatal to the stream that produced it. A hash mismatch is not an error: it is
/// reported on the block itself through [`crate::block::Verification::Failed`].
#[derive(Debug, Error)]
pub enum CarError {
    #[error("CAR error: Malformed header - {0}")]
    MalformedHeader(String),

    #[error("CAR error: Malformed block envelope - {0}")]
    MalformedEnvelope(String),

    #[error("CAR error: Block envelope of {len} bytes exceeds the limit of {max} bytes")]
    EnvelopeTooLarge { len: u64, max: usize },

    #[error("CAR error: Stream ended with {pending} undecoded bytes")]
    TruncatedStream { pending: usize },

    #[error("CAR error: Error decoding block - Cid {0} - {1}")]
    MalformedBlock(Cid, String),

    #[error("CAR error: Error reading from content requester {0}")]
    Requester(#[from] io::Error),

    #[error("CAR error: Verification task failed {0}")]
    VerifierTask(String),
}

impl CarError {
    /// The non-zero code reported to the consumer in the terminal callback.
    pub fn code(&self) -> i32 {
        match self {
            CarError::MalformedHeader(_) => 1,
            CarError::MalformedEnvelope(_) => 2,
            CarError::EnvelopeTooLarge { .. } => 3,
            CarError::TruncatedStream { .. } => 4,
            CarError::MalformedBlock(..) => 5,
            CarError::Requester(_) => 6,
            CarError::VerifierTask(_) => 7,
        }
    }

    pub(crate) fn block(cid: &Cid, err: impl std::fmt::Debug) -> Self {
        CarError::MalformedBlock(*cid, format!("{err:?}"))
    }
}
