mod config;
mod status;
#[cfg(test)]
pub mod testing;

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use size::Size;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::download::{Download, DownloadSettings, Event, State};
use crate::error::{Error, Result};
use crate::persistence::{Index, IndexEntry, Store};
use crate::scheduler::{Outcome, Worker};
use crate::torrent::{FileEntry, Torrent};

pub use config::Config;
pub use status::Status;

type Registry = Arc<RwLock<HashMap<String, Arc<Mutex<Download>>>>>;

/// Registry of downloads and the operations exposed to callers.
///
/// Each download sits behind its own lock. The registry lock is never held
/// while waiting for a download lock, and no download lock is held while the
/// index is written.
pub struct Client {
    config: RwLock<Config>,
    store: Store,
    downloads: Registry,
}

impl Client {
    pub fn new(config: Config) -> Self {
        let store = Store::new(config.index_path.clone());
        Self {
            config: RwLock::new(config),
            store,
            downloads: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Restores downloads saved by a previous run. Returns how many were
    /// added.
    pub async fn load(&self) -> usize {
        let loaded = self.store.load().await;
        let mut downloads = self.downloads.write().await;
        let mut added = 0;
        for download in loaded {
            if downloads.contains_key(&download.id) {
                continue;
            }
            downloads.insert(download.id.clone(), Arc::new(Mutex::new(download)));
            added += 1;
        }
        added
    }

    /// Registers the torrent described by `metainfo` and returns its id.
    /// A torrent that is already known keeps its progress and settings.
    pub async fn parse_torrent(
        &self,
        metainfo: &[u8],
        settings: Option<DownloadSettings>,
    ) -> Result<String> {
        let torrent = Torrent::parse(metainfo)?;
        let id = torrent.id();
        if self.get(&id).await.is_some() {
            info!("[{}] {} is already known", id, torrent.name);
            return Ok(id);
        }

        let (download_dir, default_settings) = {
            let config = self.config.read().await;
            (config.download_dir.clone(), config.default_settings.clone())
        };
        let download = Download::new(
            Arc::new(torrent),
            settings.unwrap_or(default_settings),
            download_dir,
        );
        fs::create_dir_all(download.folder()).await?;
        self.store.save_state(&download).await;
        info!(
            "[{}] added {} ({}, {} pieces)",
            id,
            download.torrent.name,
            Size::from_bytes(download.torrent.total_size()),
            download.torrent.total_pieces()
        );
        self.downloads
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(download)));
        self.save_index().await;
        Ok(id)
    }

    /// Starts processing pieces in the background.
    ///
    /// A completed download is reported as started without running again.
    /// Fails when the output directory lacks room for the selected content.
    pub async fn start(&self, id: &str) -> Result<bool> {
        let Some(handle) = self.get(id).await else {
            return Ok(false);
        };
        let token = {
            let mut download = handle.lock().await;
            if download.completed {
                info!("[{}] already completed", id);
                return Ok(true);
            }
            if download.state != State::Stopped {
                warn!("[{}] cannot start while {}", id, download.state);
                return Ok(false);
            }
            let folder = download.folder();
            fs::create_dir_all(&folder).await?;
            check_space(&folder, download.target_size())?;
            download.apply(Event::Start);
            let token = download.begin_run();
            self.store.save_state(&download).await;
            token
        };
        self.spawn_worker(id.to_string(), handle, token).await;
        Ok(true)
    }

    pub async fn pause(&self, id: &str) -> bool {
        self.transition(id, Event::Pause).await
    }

    pub async fn resume(&self, id: &str) -> bool {
        self.transition(id, Event::Resume).await
    }

    /// Stops the download, keeping its progress for a later start.
    pub async fn stop(&self, id: &str) -> bool {
        self.transition(id, Event::Stop).await
    }

    /// Stops every running download.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.downloads.read().await.keys().cloned().collect();
        for id in ids {
            self.stop(&id).await;
        }
    }

    pub async fn status(&self, id: &str) -> Option<Status> {
        let handle = self.get(id).await?;
        let download = handle.lock().await;
        Some(Status::from(&*download))
    }

    pub async fn all_status(&self) -> BTreeMap<String, Status> {
        let mut statuses = BTreeMap::new();
        for handle in self.handles().await {
            let download = handle.lock().await;
            statuses.insert(download.id.clone(), Status::from(&*download));
        }
        statuses
    }

    /// Whether any download is downloading or paused.
    pub async fn has_active(&self) -> bool {
        for handle in self.handles().await {
            if handle.lock().await.is_downloading() {
                return true;
            }
        }
        false
    }

    pub async fn file_selection(&self, id: &str) -> Option<Vec<FileEntry>> {
        let handle = self.get(id).await?;
        let files = handle.lock().await.files.clone();
        Some(files)
    }

    /// Applies `path -> selected` overrides to a multi-file download.
    pub async fn update_file_selection(&self, id: &str, selections: &HashMap<String, bool>) -> bool {
        let Some(handle) = self.get(id).await else {
            return false;
        };
        {
            let mut download = handle.lock().await;
            download.update_file_selection(selections);
            self.store.save_state(&download).await;
            info!("[{}] selection now {}", id, Size::from_bytes(download.target_size()));
        }
        self.save_index().await;
        true
    }

    /// Replaces the settings of a download. A running scheduler picks them up
    /// on its next piece. Settings with an out of range delay are rejected.
    pub async fn update_settings(&self, id: &str, settings: DownloadSettings) -> bool {
        if !settings.is_valid() {
            warn!("[{}] rejecting settings with delay {}", id, settings.simulation_delay);
            return false;
        }
        let Some(handle) = self.get(id).await else {
            return false;
        };
        {
            let mut download = handle.lock().await;
            download.settings = settings;
            self.store.save_state(&download).await;
            info!("[{}] settings updated", id);
        }
        self.save_index().await;
        true
    }

    /// Stops the download, deletes its folder and forgets it.
    pub async fn remove(&self, id: &str) -> bool {
        let Some(handle) = self.get(id).await else {
            return false;
        };
        let folder = {
            let mut download = handle.lock().await;
            if download.is_downloading() {
                download.apply(Event::Stop);
            }
            download.cancel_run();
            download.folder()
        };
        match fs::remove_dir_all(&folder).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                error!("[{}] failed to remove {}: {}", id, folder.display(), err);
                return false;
            }
        }
        self.downloads.write().await.remove(id);
        self.save_index().await;
        info!("[{}] removed", id);
        true
    }

    /// Changes where new downloads are placed, creating the directory.
    pub async fn set_output_directory(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if let Err(err) = fs::create_dir_all(&path).await {
            error!("failed to create {}: {}", path.display(), err);
            return false;
        }
        info!("output directory is now {}", path.display());
        self.config.write().await.download_dir = path;
        true
    }

    pub async fn output_directory(&self) -> PathBuf {
        self.config.read().await.download_dir.clone()
    }

    async fn get(&self, id: &str) -> Option<Arc<Mutex<Download>>> {
        self.downloads.read().await.get(id).cloned()
    }

    async fn handles(&self) -> Vec<Arc<Mutex<Download>>> {
        self.downloads.read().await.values().cloned().collect()
    }

    async fn transition(&self, id: &str, event: Event) -> bool {
        let Some(handle) = self.get(id).await else {
            return false;
        };
        let mut download = handle.lock().await;
        if !download.apply(event) {
            return false;
        }
        if event == Event::Stop {
            download.cancel_run();
        }
        self.store.save_state(&download).await;
        true
    }

    /// Writes the index of every known download.
    pub async fn save_index(&self) {
        save_index(&self.downloads, &self.store).await;
    }

    async fn spawn_worker(&self, id: String, handle: Arc<Mutex<Download>>, token: CancellationToken) {
        let config = self.config.read().await;
        let worker = Worker::new(handle.clone(), self.store.clone(), token.clone())
            .with_batch_size(config.batch_size)
            .with_yield_every(config.yield_every)
            .with_pause_poll_interval(config.pause_poll_interval);
        let store = self.store.clone();
        let downloads = self.downloads.clone();
        tokio::spawn(async move {
            match worker.run().await {
                Ok(Outcome::Completed) => save_index(&downloads, &store).await,
                Ok(Outcome::Stopped) => info!("[{}] scheduler stopped", id),
                Err(err) => {
                    error!("[{}] scheduler error: {:#}", id, err);
                    let mut download = handle.lock().await;
                    // A cancelled run belongs to a stop or a removal that saved already
                    if !token.is_cancelled() {
                        download.apply(Event::Stop);
                        download.end_run(&token);
                        store.save_state(&download).await;
                    }
                }
            }
        });
    }
}

async fn save_index(downloads: &Registry, store: &Store) {
    let handles: Vec<_> = downloads.read().await.values().cloned().collect();
    let mut index = Index::default();
    for handle in handles {
        let download = handle.lock().await;
        index
            .downloads
            .insert(download.id.clone(), IndexEntry::from(&*download));
    }
    store.save_index(&index).await;
}

fn check_space(folder: &Path, required: u64) -> Result<()> {
    let available = fs2::available_space(folder)?;
    if available < required {
        return Err(Error::Resource {
            path: folder.to_path_buf(),
            required,
            available,
        });
    }
    Ok(())
}
