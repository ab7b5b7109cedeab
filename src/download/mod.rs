mod settings;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bit_set::BitSet;
use log::{info, warn};
use size::Size;
use tokio_util::sync::CancellationToken;

use crate::core::TransferRate;
use crate::torrent::{FileEntry, Piece, Torrent};

pub use settings::{DownloadSettings, DownloadSettingsBuilder};
pub use state::{Event, State};

/// Name of the per-download progress file inside its folder.
pub const STATE_FILE: &str = "state.json";

/// Progress, settings and selection for one torrent.
///
/// Shared between the client and at most one scheduler run behind a
/// `tokio::sync::Mutex`.
#[derive(Debug)]
pub struct Download {
    pub id: String,
    pub torrent: Arc<Torrent>,
    pub settings: DownloadSettings,
    /// Directory the download folder lives in.
    pub download_dir: PathBuf,
    pub downloaded_pieces: BitSet,
    pub downloaded_size: u64,
    pub progress: f64,
    pub speed: TransferRate,
    pub started_at: Option<Instant>,
    pub state: State,
    /// Every piece is in. Kept apart from `state` since a download without
    /// `auto_stop` stays `Downloading` after its last piece.
    pub completed: bool,
    /// Per-file selection, empty for a single file.
    pub files: Vec<FileEntry>,
    run: Option<CancellationToken>,
}

impl Download {
    pub fn new(torrent: Arc<Torrent>, settings: DownloadSettings, download_dir: PathBuf) -> Self {
        Self {
            id: torrent.id(),
            files: torrent.files().to_vec(),
            torrent,
            settings,
            download_dir,
            downloaded_pieces: BitSet::new(),
            downloaded_size: 0,
            progress: 0.0,
            speed: TransferRate::EMPTY,
            started_at: None,
            state: State::Stopped,
            completed: false,
            run: None,
        }
    }

    /// Folder holding the state file and the output.
    pub fn folder(&self) -> PathBuf {
        self.download_dir.join(&self.id)
    }

    pub fn state_file(&self) -> PathBuf {
        self.folder().join(STATE_FILE)
    }

    /// Moves the state machine, returning whether the transition was legal.
    pub fn apply(&mut self, event: Event) -> bool {
        match self.state.transition(event) {
            Some(next) => {
                info!("[{}] {} -> {}", self.id, self.state, next);
                self.state = next;
                true
            }
            None => {
                warn!("[{}] ignoring {:?} while {}", self.id, event, self.state);
                false
            }
        }
    }

    pub fn is_downloading(&self) -> bool {
        matches!(self.state, State::Downloading | State::Paused)
    }

    pub fn has_piece(&self, piece: usize) -> bool {
        self.downloaded_pieces.contains(piece)
    }

    pub fn all_pieces_downloaded(&self) -> bool {
        self.downloaded_pieces.len() >= self.torrent.total_pieces()
    }

    /// Marks `piece` as downloaded. Pieces already recorded are not counted
    /// twice.
    pub fn record_piece(&mut self, piece: &Piece) -> bool {
        if !self.downloaded_pieces.insert(piece.index) {
            return false;
        }
        self.downloaded_size += piece.size;
        self.update_progress();
        if let Some(started_at) = self.started_at {
            self.speed = TransferRate(Size::from_bytes(self.downloaded_size), started_at.elapsed());
        }
        true
    }

    /// Bytes the user asked for: the whole torrent or the selected files.
    pub fn target_size(&self) -> u64 {
        if self.torrent.is_multi_file() {
            self.files
                .iter()
                .filter(|file| file.selected)
                .map(|file| file.length)
                .sum()
        } else {
            self.torrent.total_size()
        }
    }

    /// Recomputes the percentage over the selected content.
    ///
    /// Pieces are produced for the whole torrent, so the ratio is capped at
    /// 100 once deselected files have been counted too.
    pub fn update_progress(&mut self) {
        let target = self.target_size();
        self.progress = if target == 0 {
            if self.all_pieces_downloaded() { 100.0 } else { 0.0 }
        } else {
            (self.downloaded_size as f64 / target as f64 * 100.0).min(100.0)
        };
    }

    /// Applies `path -> selected` overrides. Unknown paths are ignored.
    pub fn update_file_selection(&mut self, selections: &HashMap<String, bool>) {
        for (path, selected) in selections {
            match self.files.iter_mut().find(|file| &file.path == path) {
                Some(file) => file.selected = *selected,
                None => warn!("[{}] no file {:?} to select", self.id, path),
            }
        }
        self.update_progress();
    }

    /// Current `path -> selected` map.
    pub fn file_selections(&self) -> HashMap<String, bool> {
        self.files
            .iter()
            .map(|file| (file.path.clone(), file.selected))
            .collect()
    }

    /// Begins a scheduler run, returning its cancellation token.
    pub fn begin_run(&mut self) -> CancellationToken {
        self.cancel_run();
        let token = CancellationToken::new();
        self.run = Some(token.clone());
        self.started_at = Some(Instant::now());
        token
    }

    /// Cancels the active scheduler run, if any.
    pub fn cancel_run(&mut self) {
        if let Some(token) = self.run.take() {
            token.cancel();
        }
    }

    /// Ends the active run if `token` still belongs to it. A replaced or
    /// stopped run has its token cancelled already.
    pub fn end_run(&mut self, token: &CancellationToken) {
        if !token.is_cancelled() {
            self.run = None;
        }
    }
}
