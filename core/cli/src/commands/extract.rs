use std::path::PathBuf;

use anyhow::{Context, Result};
use car_block_reader::requester::FileRequester;
use car_block_reader::{BlockReader, DagAssembler};
use tracing::info;

use crate::config::Config;

pub async fn exec(config_path: PathBuf, file: PathBuf, out: PathBuf) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let blocks = BlockReader::new(FileRequester::new(&file), config.reader).stream();
    let dag = DagAssembler::collect(blocks)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    info!("Collected {} blocks from {}", dag.len(), file.display());

    for path in dag.extract(&out).await.context("Failed to extract")? {
        println!("{}", path.display());
    }
    Ok(())
}
