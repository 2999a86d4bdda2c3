//! Content-address verification of block bodies.
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use tracing::warn;

use crate::block::Verification;

/// The identity multihash embeds the content itself as the digest.
const IDENTITY_CODE: u64 = 0x00;

/// Recompute the multihash of `data` with the algorithm declared in `cid` and compare digests.
///
/// Truncated multihashes are compared on the declared digest length. Unsupported hash functions
/// can never be verified and report [`Verification::Failed`].
pub fn verify(cid: &Cid, data: &[u8]) -> Verification {
    let expected = cid.hash();
    if expected.code() == IDENTITY_CODE {
        return (expected.digest() == data).into();
    }

    match Code::try_from(expected.code()) {
        Ok(hasher) => {
            let computed = hasher.digest(data);
            let len = expected.digest().len();
            computed
                .digest()
                .get(..len)
                .is_some_and(|digest| digest == expected.digest())
                .into()
        },
        Err(_) => {
            warn!(
                "Unsupported multihash code {:#x} for block {cid}",
                expected.code()
            );
            Verification::Failed
        },
    }
}
