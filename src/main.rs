use std::time::Duration;

use log::{error, info};
use tokio::fs;

use crate::client::{Client, Config};

mod bencoding;
mod client;
mod core;
mod crypto;
mod download;
mod error;
mod persistence;
mod scheduler;
mod storage;
mod torrent;

async fn add_torrent(client: &Client, path: &str) -> anyhow::Result<()> {
    let metainfo = fs::read(path).await?;
    let id = client.parse_torrent(&metainfo, None).await?;
    if !client.start(&id).await? {
        info!("[{}] not started", id);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env();
    info!("downloading into {}", config.download_dir.display());
    let client = Client::new(config);
    let loaded = client.load().await;
    if loaded > 0 {
        info!("restored {} downloads", loaded);
    }

    for path in std::env::args().skip(1) {
        if let Err(err) = add_torrent(&client, &path).await {
            error!("failed to add {}: {:#}", path, err);
        }
    }

    let mut report = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = report.tick() => {
                for status in client.all_status().await.values() {
                    info!("{}", status);
                }
                if !client.has_active().await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping downloads...");
                client.stop_all().await;
                break;
            }
        }
    }
    client.save_index().await;

    Ok(())
}
