use std::path::PathBuf;

use anyhow::{bail, Result};
use car_block_reader::requester::FileRequester;
use car_block_reader::BlockReader;
use car_ipld::Block;

use crate::config::Config;

pub async fn exec(config_path: PathBuf, file: PathBuf, chunk_size: usize) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let requester = FileRequester::new(file).with_chunk_size(chunk_size);

    let mut blocks = 0;
    let mut failed = 0;
    let mut error_code = 0;
    BlockReader::new(requester, config.reader)
        .read(|block, is_completed, code| {
            if is_completed {
                error_code = code;
                return;
            }
            if let Some(block) = block {
                if block.is_verified() == Some(false) {
                    failed += 1;
                }
                if !block.is_header() {
                    blocks += 1;
                }
                println!("{}", describe(&block));
            }
        })
        .await;

    if error_code != 0 {
        bail!("Reading the CAR file failed with error code {error_code}");
    }
    println!("{blocks} blocks, {failed} failed verification");
    Ok(())
}

fn describe(block: &Block) -> String {
    if let Some(header) = block.meta() {
        let roots = header
            .roots
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        return format!("header\troots={}", roots.join(","));
    }

    let kind = if block.is_content() {
        "content"
    } else {
        "metadata"
    };
    let verified = match block.is_verified() {
        Some(true) => "verified",
        _ => "FAILED",
    };
    format!(
        "{}\t{kind}\t{verified}\tlinks={}\tbytes={}{}",
        block.cid_string(),
        block.links().map_or(0, <[_]>::len),
        block.raw_bytes().len(),
        if block.is_root() { "\troot" } else { "" },
    )
}
