use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{CarRequest, ContentRequester, Response};
use crate::config::{Gateway, GatewayConfig};
use crate::error::RequestError;

pub const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";

/// Fetches a CAR archive from the first configured gateway that answers successfully.
///
/// Gateways are tried in order. A gateway that fails, times out or answers with a non success
/// status is skipped.
#[derive(Clone)]
pub struct GatewayRequester {
    client: Client,
    gateways: Arc<Vec<Gateway>>,
    gateway_timeout: Duration,
    request: CarRequest,
}

impl GatewayRequester {
    pub fn new(config: GatewayConfig, request: CarRequest) -> Result<Self, RequestError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(1))
            .build()?;
        Ok(Self {
            client,
            gateways: Arc::new(config.gateways),
            gateway_timeout: config.gateway_timeout,
            request,
        })
    }
}

impl ContentRequester for GatewayRequester {
    async fn request(&self) -> Result<Response, RequestError> {
        for gateway in self.gateways.iter() {
            let url = self.request.url(&gateway.base_url()?)?;
            debug!("Requesting {url}");

            let req = self.client.get(url).header(ACCEPT, CAR_CONTENT_TYPE).send();
            match timeout(self.gateway_timeout, req).await {
                Ok(Ok(res)) => match res.status().as_u16() {
                    200..=299 => {
                        info!("Streaming {} from gateway {}", self.request.cid(), gateway.authority);
                        let body = res
                            .bytes_stream()
                            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
                        return Ok(Box::pin(with_idle_timeout(
                            Box::pin(body),
                            self.gateway_timeout,
                        )));
                    },
                    300..=399 => {
                        info!("Gateway {} returned redirect error code", gateway.authority);
                        continue;
                    },
                    status => {
                        info!(
                            "Gateway {} response was not successful ({status}), moving on to the next gateway",
                            gateway.authority
                        );
                        continue;
                    },
                },
                Ok(Err(e)) => {
                    info!("Request to gateway {} failed: {e}", gateway.authority);
                    continue;
                },
                Err(_) => {
                    info!("Request to gateway {} timed out", gateway.authority);
                    continue;
                },
            }
        }
        Err(RequestError::NoGateway)
    }
}

/// Fail the body with `TimedOut` when no chunk arrives within `idle`.
fn with_idle_timeout<S>(body: S, idle: Duration) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
{
    stream::unfold(Some(body), move |body| async move {
        let mut body = body?;
        match timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => {
                info!("Gateway stopped sending data for {idle:?}");
                let err = io::Error::new(io::ErrorKind::TimedOut, "Gateway body stalled");
                Some((Err(err), None))
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use car_ipld::testing::{raw_block, CarBuilder};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{Protocol, ReaderConfig};
    use crate::requester::ByteRange;
    use crate::BlockReader;

    fn config(servers: &[&MockServer]) -> GatewayConfig {
        GatewayConfig {
            gateways: servers
                .iter()
                .map(|server| Gateway::new(Protocol::Http, server.address().to_string()))
                .collect(),
            gateway_timeout: Duration::from_secs(5),
        }
    }

    async fn collect(response: Response) -> Vec<u8> {
        response
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await
    }

    #[tokio::test]
    async fn test_gateway_query() {
        let block = raw_block(b"hello");
        let cid = block.0;
        let car = CarBuilder::new(vec![cid]).block(block).build();

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/ipfs/{cid}/a/b"))
                .header("accept", CAR_CONTENT_TYPE)
                .query_param("format", "car")
                .query_param("dag-scope", "entity")
                .query_param("entity-bytes", "0:*");
            then.status(200)
                .header("content-type", CAR_CONTENT_TYPE)
                .body(&car);
        });

        let request = CarRequest::builder()
            .cid(cid)
            .path("a/b")
            .entity_bytes(Some(ByteRange { from: 0, to: None }))
            .build();
        let requester = GatewayRequester::new(config(&[&server]), request).unwrap();
        let body = collect(requester.request().await.unwrap()).await;

        mock.assert();
        assert_eq!(body, car);
    }

    #[tokio::test]
    async fn test_gateway_fallback() {
        let (cid, _) = raw_block(b"hello");

        let failing = MockServer::start();
        let failing_mock = failing.mock(|when, then| {
            when.method(GET).path(format!("/ipfs/{cid}"));
            then.status(500);
        });
        let working = MockServer::start();
        let working_mock = working.mock(|when, then| {
            when.method(GET).path(format!("/ipfs/{cid}"));
            then.status(200).body(b"car bytes");
        });

        let request = CarRequest::builder().cid(cid).build();
        let requester = GatewayRequester::new(config(&[&failing, &working]), request).unwrap();
        let body = collect(requester.request().await.unwrap()).await;

        failing_mock.assert();
        working_mock.assert();
        assert_eq!(body, b"car bytes");
    }

    #[tokio::test]
    async fn test_no_gateway() {
        let (cid, _) = raw_block(b"hello");
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(404);
        });

        let request = CarRequest::builder().cid(cid).build();
        let requester = GatewayRequester::new(config(&[&server]), request).unwrap();
        assert!(matches!(
            requester.request().await,
            Err(RequestError::NoGateway)
        ));
    }

    #[tokio::test]
    async fn test_stalled_body_fails_the_read() {
        let (cid, _) = raw_block(b"hello");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n\x0a\xa1")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = GatewayConfig {
            gateways: vec![Gateway::new(Protocol::Http, address.to_string())],
            gateway_timeout: Duration::from_millis(300),
        };
        let request = CarRequest::builder().cid(cid).build();
        let requester = GatewayRequester::new(config, request).unwrap();

        let mut codes = Vec::new();
        let read = BlockReader::new(requester, ReaderConfig::default()).read(|block, done, code| {
            if done {
                assert!(block.is_none());
                codes.push(code);
            }
        });
        tokio::time::timeout(Duration::from_secs(3), read)
            .await
            .expect("read should fail once the body stalls");
        server.abort();

        assert_eq!(codes, vec![6]);
    }
}
