use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::download::{Download, State};

/// Resumable progress of one download, stored next to its output.
#[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadState {
    pub downloaded_pieces: Vec<usize>,
    pub downloaded_size: u64,
    pub completed: bool,
    pub file_selections: BTreeMap<String, bool>,
    /// Seconds since the unix epoch.
    pub timestamp: f64,
}

impl DownloadState {
    pub fn capture(download: &Download) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        Self {
            downloaded_pieces: download.downloaded_pieces.iter().collect(),
            downloaded_size: download.downloaded_size,
            completed: download.completed,
            file_selections: download.file_selections().into_iter().collect(),
            timestamp,
        }
    }

    /// Copies the saved progress into a freshly built download.
    pub fn restore(self, download: &mut Download) {
        let total_pieces = download.torrent.total_pieces();
        download.downloaded_pieces = self
            .downloaded_pieces
            .into_iter()
            .filter(|&piece| piece < total_pieces)
            .collect();
        download.downloaded_size = self.downloaded_size;
        download.completed = self.completed;
        for file in download.files.iter_mut() {
            if let Some(&selected) = self.file_selections.get(&file.path) {
                file.selected = selected;
            }
        }
        download.state = if self.completed {
            State::Completed
        } else {
            State::Stopped
        };
        download.update_progress();
    }
}
