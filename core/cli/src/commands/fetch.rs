use std::path::PathBuf;

use anyhow::{Context, Result};
use car_block_reader::requester::{ByteRange, CarRequest, DagScope, GatewayRequester};
use car_block_reader::{BlockReader, DagAssembler};
use cid::Cid;
use tracing::info;

use crate::config::Config;

pub async fn exec(
    config_path: PathBuf,
    cid: Cid,
    path: Option<String>,
    scope: DagScope,
    entity_bytes: Option<ByteRange>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;

    let request = CarRequest::builder()
        .cid(cid)
        .path(path.unwrap_or_default())
        .scope(scope)
        .entity_bytes(entity_bytes)
        .build();
    let requester = GatewayRequester::new(config.gateway, request)?;

    let blocks = BlockReader::new(requester, config.reader).stream();
    let dag = DagAssembler::collect(blocks)
        .await
        .with_context(|| format!("Failed to fetch {cid}"))?;
    info!("Fetched {} blocks for {cid}", dag.len());

    match out {
        Some(out) => {
            for path in dag.extract(&out).await.context("Failed to extract")? {
                println!("{}", path.display());
            }
        },
        // A scoped archive does not have to hold a complete DAG, so list what arrived.
        None => {
            for block in dag.blocks() {
                let kind = if block.is_content() {
                    "content"
                } else {
                    "metadata"
                };
                println!("{}\t{kind}\t{}", block.cid_string(), block.raw_bytes().len());
            }
        },
    }
    Ok(())
}
