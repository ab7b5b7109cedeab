use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use log::{debug, info};
use size::Size;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::download::{Download, Event, State};
use crate::persistence::Store;
use crate::storage::{Content, FileWriter};
use crate::torrent::{Piece, Torrent};

/// How a scheduler run ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    /// Every piece is in and the output was written.
    Completed,
    /// The run was cancelled before finishing.
    Stopped,
}

/// Processes the pieces of one download, strictly in index order.
///
/// Batches are checkpoints only: pieces are produced one at a time and the
/// state file is rewritten after each batch.
pub struct Worker {
    download: Arc<Mutex<Download>>,
    store: Store,
    token: CancellationToken,
    batch_size: usize,
    yield_every: usize,
    pause_poll_interval: Duration,
}

impl Worker {
    pub fn new(download: Arc<Mutex<Download>>, store: Store, token: CancellationToken) -> Self {
        Self {
            download,
            store,
            token,
            batch_size: 20,
            yield_every: 5,
            pause_poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_yield_every(mut self, pieces: usize) -> Self {
        self.yield_every = pieces.max(1);
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub async fn run(self) -> anyhow::Result<Outcome> {
        let (id, torrent) = {
            let download = self.download.lock().await;
            (download.id.clone(), download.torrent.clone())
        };
        let content = {
            let torrent = torrent.clone();
            tokio::task::spawn_blocking(move || Content::synthesize(&torrent)).await?
        };
        ensure!(
            content.len() == torrent.total_size(),
            "content is {} bytes, expected {}",
            content.len(),
            torrent.total_size()
        );
        info!(
            "[{}] processing {} pieces of {}",
            id,
            torrent.total_pieces(),
            Size::from_bytes(torrent.piece_length)
        );

        let mut produced = 0;
        for batch in torrent.pieces.chunks(self.batch_size) {
            for piece in batch {
                if self.download.lock().await.has_piece(piece.index) {
                    continue;
                }
                if !self.produce(&torrent, &content, piece).await? {
                    return Ok(Outcome::Stopped);
                }
                produced += 1;
                if produced % self.yield_every == 0 {
                    tokio::task::yield_now().await;
                }
            }

            let download = self.download.lock().await;
            if self.token.is_cancelled() {
                return Ok(Outcome::Stopped);
            }
            self.store.save_state(&download).await;
            debug!(
                "[{}] checkpoint at {}/{} pieces ({:.2}%, {})",
                id,
                download.downloaded_pieces.len(),
                torrent.total_pieces(),
                download.progress,
                download.speed
            );
        }

        self.complete(&torrent, &content).await
    }

    /// Waits for its turn and records one piece. Returns `false` once the
    /// run is cancelled.
    async fn produce(&self, torrent: &Torrent, content: &Content, piece: &Piece) -> anyhow::Result<bool> {
        loop {
            if !self.wait_while_paused().await {
                return Ok(false);
            }
            let delay = self.download.lock().await.settings.piece_delay();
            tokio::select! {
                _ = self.token.cancelled() => return Ok(false),
                _ = sleep(delay) => {}
            }

            let data = content.piece(torrent.piece_offset(piece.index), piece.size);
            ensure!(
                data.len() as u64 == piece.size,
                "piece {} is {} bytes, expected {}",
                piece.index,
                data.len(),
                piece.size
            );

            let mut download = self.download.lock().await;
            if self.token.is_cancelled() {
                return Ok(false);
            }
            // Paused during the delay, wait again before recording
            if download.state == State::Paused {
                continue;
            }
            download.record_piece(piece);
            debug!("[{}] piece {} done", download.id, piece.index);
            return Ok(true);
        }
    }

    /// Returns `false` if the run is cancelled while paused.
    async fn wait_while_paused(&self) -> bool {
        loop {
            {
                let download = self.download.lock().await;
                if self.token.is_cancelled() {
                    return false;
                }
                if download.state != State::Paused {
                    return true;
                }
            }
            tokio::select! {
                _ = self.token.cancelled() => return false,
                _ = sleep(self.pause_poll_interval) => {}
            }
        }
    }

    async fn complete(&self, torrent: &Torrent, content: &Content) -> anyhow::Result<Outcome> {
        let (folder, pre_allocate, mut files) = {
            let download = self.download.lock().await;
            if self.token.is_cancelled() {
                return Ok(Outcome::Stopped);
            }
            (
                download.folder(),
                download.settings.pre_allocate,
                download.files.clone(),
            )
        };
        tokio::fs::create_dir_all(&folder).await?;
        let written = FileWriter::new(&folder, content, pre_allocate)
            .write(torrent, &mut files)
            .await;

        let mut download = self.download.lock().await;
        if self.token.is_cancelled() {
            return Ok(Outcome::Stopped);
        }
        for (file, written) in download.files.iter_mut().zip(&files) {
            file.downloaded = written.downloaded;
        }
        download.completed = true;
        download.progress = 100.0;
        if download.settings.auto_stop && download.state == State::Downloading {
            download.apply(Event::Complete);
        }
        download.end_run(&self.token);
        self.store.save_state(&download).await;
        info!(
            "[{}] completed {}, {} file(s) written to {}",
            download.id,
            torrent.name,
            written,
            folder.display()
        );
        Ok(Outcome::Completed)
    }
}
