//! brs-transfer: encode a brick save and get it into a server.
//!
//! ```bash
//! # Generate a sample build and write it to ./out.brs
//! brs-transfer --seed 42
//!
//! # Encode save data from JSON
//! brs-transfer --in build.json --out build.brs
//!
//! # Spawn a server and load two copies through its console
//! brs-transfer --in build.json --server-cmd "./server -log" \
//!     --saves-dir ./Saved/Builds --offset 0,0,0 --offset 400,0,0
//! ```

mod config;
mod input_gen;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use brs_transfer_core::{
    artifact::ArtifactStore,
    codec,
    process::ServerProcess,
    save::{BrickOwner, SaveData, User},
    transfer::{LoadReport, TransferOrchestrator},
};
use clap::Parser;
use tokio::process::Command;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{Args, Config, Mode};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brs_transfer=info,brs_transfer_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args(args)?;
    if config.print_config {
        config.print();
    }

    let save = load_input(&config).await?;
    if let Some(path) = &config.emit_json {
        let json = serde_json::to_string_pretty(&save)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }

    match &config.mode {
        Mode::WriteFile(path) => {
            let written = write_save_file(&save, path).await?;
            println!(
                "✓ Wrote {} bricks ({} bytes) to {}",
                save.bricks.len(),
                written,
                path.display()
            );
        }
        Mode::Load { server_cmd, saves_dir } => {
            load_into_server(&config, &save, server_cmd, saves_dir.clone()).await?;
        }
    }

    Ok(())
}

/// Read the input save, or generate a sample one.
async fn load_input(config: &Config) -> Result<SaveData> {
    let mut save = match &config.input_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            SaveData::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => input_gen::generate_sample_save(config.seed, config.sample_bricks),
    };

    if let Some((name, id)) = &config.author {
        apply_author(&mut save, name, *id)?;
    }

    Ok(save)
}

/// Make `name`/`id` the author and sole owner of every brick.
fn apply_author(save: &mut SaveData, name: &str, id: Uuid) -> Result<()> {
    let bricks = u32::try_from(save.bricks.len()).context("too many bricks for one owner")?;

    save.author = User {
        name: name.to_string(),
        id,
    };
    save.brick_owners = vec![BrickOwner {
        id,
        name: name.to_string(),
        bricks,
    }];
    for brick in &mut save.bricks {
        brick.owner_index = 0;
    }
    Ok(())
}

/// Encode `save` and write it to `path`. Returns the encoded length.
async fn write_save_file(save: &SaveData, path: &Path) -> Result<usize> {
    let bytes = codec::write_save(save).context("encoding save")?;
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), bytes = bytes.len(), "save written");
    Ok(bytes.len())
}

async fn load_into_server(
    config: &Config,
    save: &SaveData,
    server_cmd: &str,
    saves_dir: std::path::PathBuf,
) -> Result<()> {
    let mut parts = server_cmd.split_whitespace();
    let program = parts.next().context("--server-cmd is empty")?;
    let mut command = Command::new(program);
    command.args(parts);

    let server = Arc::new(ServerProcess::spawn(command).with_context(|| format!("spawning {server_cmd}"))?);
    let mut orchestrator =
        TransferOrchestrator::new(server.clone(), ArtifactStore::new(saves_dir)).with_config(config.transfer.clone());

    let reports: Vec<LoadReport> = match config.placements.as_slice() {
        [placement] => vec![orchestrator.load_now(save, *placement).await?],
        placements => orchestrator.multi_place(save, placements).await?,
    };

    for report in &reports {
        let bricks = report
            .bricks_read
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        println!(
            "✓ Loaded {} ({} bricks) in {} ms",
            report.artifact,
            bricks,
            report.elapsed.as_millis()
        );
    }

    if config.print_metrics {
        orchestrator.metrics().print_summary();
    }

    drop(orchestrator);
    match Arc::try_unwrap(server) {
        Ok(server) => {
            server.shutdown().await?;
        }
        Err(_) => warn!("server still referenced, leaving it to be killed on exit"),
    }

    Ok(())
}
