mod index;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::Mutex;

use crate::download::Download;

pub use index::{Index, IndexEntry};
pub use state::DownloadState;

/// Reads and writes download progress as JSON.
///
/// Write failures are logged and otherwise ignored: the in-memory state
/// stays authoritative until the next successful save.
#[derive(Debug, Clone)]
pub struct Store {
    index_path: PathBuf,
    index_lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(index_path: PathBuf) -> Self {
        Self {
            index_path,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Overwrites the state file of `download`.
    pub async fn save_state(&self, download: &Download) {
        let state = DownloadState::capture(download);
        match write_json(&download.state_file(), &state).await {
            Ok(()) => debug!(
                "[{}] saved state with {} pieces",
                download.id,
                state.downloaded_pieces.len()
            ),
            Err(err) => warn!("[{}] failed to save state: {:#}", download.id, err),
        }
    }

    /// Overwrites the global index.
    pub async fn save_index(&self, index: &Index) {
        let _guard = self.index_lock.lock().await;
        if let Err(err) = write_json(&self.index_path, index).await {
            warn!("failed to save index {}: {:#}", self.index_path.display(), err);
        }
    }

    /// Rebuilds every indexed download whose state file still exists.
    pub async fn load(&self) -> Vec<Download> {
        if !fs::try_exists(&self.index_path).await.unwrap_or(false) {
            return Vec::new();
        }
        let index: Index = match read_json(&self.index_path).await {
            Ok(index) => index,
            Err(err) => {
                warn!("failed to load index {}: {:#}", self.index_path.display(), err);
                return Vec::new();
            }
        };

        let mut downloads = Vec::with_capacity(index.downloads.len());
        for (id, entry) in index.downloads {
            if !fs::try_exists(&entry.state_file).await.unwrap_or(false) {
                debug!("[{}] state file {} is gone, skipping", id, entry.state_file.display());
                continue;
            }
            let state_file = entry.state_file.clone();
            let mut download = entry.into_download(&id);
            match read_json::<DownloadState>(&state_file).await {
                Ok(state) => state.restore(&mut download),
                Err(err) => warn!("[{}] failed to read state: {:#}", id, err),
            }
            info!(
                "[{}] loaded {} with {} pieces downloaded",
                id,
                download.torrent.name,
                download.downloaded_pieces.len()
            );
            downloads.push(download);
        }
        downloads
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_slice(&json)?)
}
