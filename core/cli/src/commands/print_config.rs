use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;

pub async fn exec(default: bool, config_path: PathBuf) -> Result<()> {
    match default {
        true => print_default().await,
        false => print(config_path).await,
    }
}

async fn print_default() -> Result<()> {
    println!("{}", Config::default().serialize_config()?);
    Ok(())
}

async fn print(config_path: PathBuf) -> Result<()> {
    let config = Config::load_or_write(config_path)?;
    println!("{}", config.serialize_config()?);
    Ok(())
}
