use std::fmt::Display;
use std::path::PathBuf;

use serde::Serialize;
use size::Size;

use crate::download::{Download, DownloadSettings, State};
use crate::torrent::FileEntry;

/// Point-in-time view of a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    pub state: State,
    pub downloading: bool,
    pub paused: bool,
    /// Percent of the selected content, two decimals.
    pub progress: f64,
    pub downloaded_pieces: usize,
    pub total_pieces: usize,
    pub download_dir: PathBuf,
    pub download_folder: PathBuf,
    /// Bytes per second, two decimals.
    pub download_speed: f64,
    pub total_size: u64,
    pub downloaded_size: u64,
    pub completed: bool,
    pub settings: DownloadSettings,
    pub is_multi_file: bool,
    pub files: Vec<FileEntry>,
}

impl From<&Download> for Status {
    fn from(download: &Download) -> Self {
        Self {
            id: download.id.clone(),
            name: download.torrent.name.clone(),
            state: download.state,
            downloading: download.is_downloading(),
            paused: download.state == State::Paused,
            progress: round2(download.progress),
            downloaded_pieces: download.downloaded_pieces.len(),
            total_pieces: download.torrent.total_pieces(),
            download_dir: download.download_dir.clone(),
            download_folder: download.folder(),
            download_speed: round2(download.speed.bps()),
            total_size: download.torrent.total_size(),
            downloaded_size: download.downloaded_size,
            completed: download.completed,
            settings: download.settings.clone(),
            is_multi_file: download.torrent.is_multi_file(),
            files: download.files.clone(),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {} {:.2}% ({}/{} pieces, {} of {}, {}/s)",
            self.id,
            self.name,
            self.state,
            self.progress,
            self.downloaded_pieces,
            self.total_pieces,
            Size::from_bytes(self.downloaded_size),
            Size::from_bytes(self.total_size),
            Size::from_bytes(self.download_speed.round() as u64)
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::testing::single_file_metainfo;
    use crate::download::Event;
    use crate::torrent::Torrent;

    #[test]
    fn snapshot_of_paused_download() {
        let torrent = Torrent::parse(&single_file_metainfo("a.bin", 30, 10)).unwrap();
        let mut download = Download::new(
            Arc::new(torrent),
            DownloadSettings::default(),
            PathBuf::from("downloads"),
        );
        let piece = download.torrent.pieces[0].clone();
        download.record_piece(&piece);
        download.apply(Event::Start);
        download.apply(Event::Pause);

        let status = Status::from(&download);

        assert_eq!(status.progress, 33.33);
        assert!(status.downloading && status.paused);
        assert_eq!(status.downloaded_pieces, 1);
        assert_eq!(status.total_pieces, 3);
        assert_eq!(status.download_folder, PathBuf::from("downloads").join(&status.id));
        assert!(!status.is_multi_file);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "paused");
        assert_eq!(json["settings"]["max_peers"], 50);
    }

    #[test]
    fn round_to_two_decimals() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }
}
