use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use resolve_path::PathResolveExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};
use crate::commands::{extract, fetch, inspect, print_config};

pub struct Cli {
    args: Args,
}

impl Cli {
    pub fn parse() -> Self {
        Self {
            args: Args::parse(),
        }
    }

    pub async fn exec(self) -> Result<()> {
        self.setup();
        let config_path = self.resolve_config_path()?;
        match self.args.cmd {
            Command::Inspect { file, chunk_size } => {
                inspect::exec(config_path, file, chunk_size).await
            },
            Command::Fetch {
                cid,
                path,
                scope,
                entity_bytes,
                out,
            } => fetch::exec(config_path, cid, path, scope.into(), entity_bytes, out).await,
            Command::Extract { file, out } => extract::exec(config_path, file, out).await,
            Command::PrintConfig { default } => print_config::exec(default, config_path).await,
        }
    }

    fn setup(&self) {
        // Build the filter from cli args, or environment variable
        let env_filter = EnvFilter::builder()
            .with_default_directive(
                match self.args.verbose {
                    0 => LevelFilter::INFO,
                    1 => LevelFilter::DEBUG,
                    _2_or_more => LevelFilter::TRACE,
                }
                .into(),
            )
            .from_env_lossy();

        // Logs go to stderr so listings on stdout stay clean.
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }

    fn resolve_config_path(&self) -> Result<PathBuf> {
        let input_path = self.args.config.as_str();
        let config_path = PathBuf::from(input_path)
            .try_resolve()
            .context(format!("Failed to resolve config path: {input_path}"))?
            .to_path_buf();
        Ok(config_path)
    }
}
