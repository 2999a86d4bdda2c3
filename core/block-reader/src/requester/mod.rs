//! Sources of CAR bytes.
//!
//! A [`ContentRequester`] produces the raw byte stream of one CAR archive. The reader does not care
//! where the bytes come from or how they are chunked: a gateway response, a file on disk and an
//! in-memory buffer are all consumed the same way.
mod file;
mod gateway;

use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;

use bytes::Bytes;
use cid::Cid;
use futures::Stream;
use typed_builder::TypedBuilder;
use url::Url;

pub use self::file::{FileRequester, MemoryRequester};
pub use self::gateway::{GatewayRequester, CAR_CONTENT_TYPE};
use crate::error::RequestError;

/// Response complex type for the content requesters.
pub type Response = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + 'static>>;

/// The `ContentRequester` trait defines the interface for obtaining the bytes of a CAR archive.
///
/// Dropping the returned stream aborts the request.
pub trait ContentRequester {
    fn request(&self) -> impl std::future::Future<Output = Result<Response, RequestError>> + Send;
}

/// Which part of the DAG a gateway should include in the archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DagScope {
    /// The whole DAG below the terminal element of the path.
    All,
    /// The terminal element and what is needed to read it: all chunks of a file, or the
    /// directory node without its children.
    #[default]
    Entity,
    /// Only the terminal block.
    Block,
}

impl DagScope {
    pub fn as_str(&self) -> &str {
        match self {
            DagScope::All => "all",
            DagScope::Entity => "entity",
            DagScope::Block => "block",
        }
    }
}

/// An inclusive byte range of a file entity. `to == None` reads to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "{}:{}", self.from, to),
            None => write!(f, "{}:*", self.from),
        }
    }
}

impl FromStr for ByteRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected <from>:<to>, got {s:?}"))?;
        let from = from.parse().map_err(|e| format!("Invalid range start: {e}"))?;
        let to = match to {
            "*" => None,
            to => Some(to.parse().map_err(|e| format!("Invalid range end: {e}"))?),
        };
        if to.is_some_and(|to| to < from) {
            return Err(format!("Range end is before its start in {s:?}"));
        }
        Ok(ByteRange { from, to })
    }
}

/// A request for the CAR archive of a content identifier, optionally below a path.
#[derive(Clone, Debug, TypedBuilder)]
pub struct CarRequest {
    cid: Cid,
    #[builder(default, setter(strip_option, into))]
    path: Option<String>,
    #[builder(default)]
    scope: DagScope,
    #[builder(default)]
    entity_bytes: Option<ByteRange>,
}

impl CarRequest {
    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// The gateway URL for this request below `base`, e.g.
    /// `https://ipfs.io/ipfs/<cid>/<path>?format=car&dag-scope=entity`.
    pub fn url(&self, base: &Url) -> Result<Url, RequestError> {
        let mut target = format!("ipfs/{}", self.cid);
        if let Some(path) = self.path.as_deref().map(|p| p.trim_matches('/')) {
            if !path.is_empty() {
                target.push('/');
                target.push_str(path);
            }
        }

        let mut url = base.join(&target)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "car");
            query.append_pair("dag-scope", self.scope.as_str());
            if let Some(range) = &self.entity_bytes {
                query.append_pair("entity-bytes", &range.to_string());
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use car_ipld::testing::raw_block;

    use super::*;

    #[test]
    fn test_byte_range_parse() {
        assert_eq!(
            "0:99".parse::<ByteRange>().unwrap(),
            ByteRange {
                from: 0,
                to: Some(99)
            }
        );
        assert_eq!(
            "10:*".parse::<ByteRange>().unwrap(),
            ByteRange { from: 10, to: None }
        );
        assert!("10".parse::<ByteRange>().is_err());
        assert!("9:1".parse::<ByteRange>().is_err());
        assert_eq!("10:*".parse::<ByteRange>().unwrap().to_string(), "10:*");
    }

    #[test]
    fn test_request_url() {
        let (cid, _) = raw_block(b"hello");
        let base = Url::parse("https://ipfs.io/").unwrap();

        let request = CarRequest::builder().cid(cid).build();
        let url = request.url(&base).unwrap();
        assert_eq!(url.path(), format!("/ipfs/{cid}"));
        assert_eq!(url.query(), Some("format=car&dag-scope=entity"));

        let request = CarRequest::builder()
            .cid(cid)
            .path("/docs/readme.md")
            .scope(DagScope::All)
            .entity_bytes(Some(ByteRange {
                from: 0,
                to: Some(1023),
            }))
            .build();
        let url = request.url(&base).unwrap();
        assert_eq!(url.path(), format!("/ipfs/{cid}/docs/readme.md"));
        let query = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            query,
            vec![
                ("format".to_string(), "car".to_string()),
                ("dag-scope".to_string(), "all".to_string()),
                ("entity-bytes".to_string(), "0:1023".to_string()),
            ]
        );
    }
}
