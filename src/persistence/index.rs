use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::Sha1;
use crate::download::{Download, DownloadSettings};
use crate::torrent::{DownloadType, FileEntry, Piece, Torrent};

/// Every known download, enough to rebuild them after a restart.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub downloads: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub total_size: u64,
    #[serde(default)]
    pub piece_length: u64,
    #[serde(default)]
    pub info_hash: Option<String>,
    pub pieces: Vec<PieceRecord>,
    pub download_dir: PathBuf,
    pub state_file: PathBuf,
    #[serde(default)]
    pub settings: DownloadSettings,
    #[serde(default)]
    pub is_multi_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PieceRecord {
    pub index: usize,
    pub size: u64,
    /// Hex encoded.
    pub hash: String,
    #[serde(default)]
    pub downloaded: bool,
}

impl From<&Download> for IndexEntry {
    fn from(download: &Download) -> Self {
        let torrent = &download.torrent;
        let pieces = torrent
            .pieces
            .iter()
            .map(|piece| PieceRecord {
                index: piece.index,
                size: piece.size,
                hash: piece.hash.hex(),
                downloaded: download.has_piece(piece.index),
            })
            .collect();
        Self {
            name: torrent.name.clone(),
            total_size: torrent.total_size(),
            piece_length: torrent.piece_length,
            info_hash: Some(torrent.content_id.hex()),
            pieces,
            download_dir: download.download_dir.clone(),
            state_file: download.state_file(),
            settings: download.settings.clone(),
            is_multi_file: torrent.is_multi_file(),
            files: torrent.is_multi_file().then(|| download.files.clone()),
        }
    }
}

impl IndexEntry {
    /// Rebuilds a stopped download with no progress. The saved state file
    /// is applied on top by the caller.
    pub fn into_download(self, id: &str) -> Download {
        let pieces: Vec<Piece> = self
            .pieces
            .iter()
            .map(|record| Piece {
                index: record.index,
                size: record.size,
                hash: Sha1::from_hex(&record.hash).unwrap_or(Sha1([0; 20])),
            })
            .collect();
        let piece_length = match self.piece_length {
            0 => pieces.first().map(|piece| piece.size).unwrap_or(1),
            piece_length => piece_length,
        };
        let content_id = self
            .info_hash
            .as_deref()
            .and_then(Sha1::from_hex)
            .unwrap_or_else(|| Sha1::digest(id.as_bytes()));
        let download_type = match self.files {
            Some(files) if self.is_multi_file => DownloadType::MultiFile { files },
            _ => DownloadType::SingleFile {
                length: self.total_size,
            },
        };
        let torrent = Torrent {
            name: self.name,
            content_id,
            piece_length,
            pieces,
            download_type,
        };
        let mut download = Download::new(Arc::new(torrent), self.settings, self.download_dir);
        download.id = id.to_string();
        download
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{multi_file_metainfo, single_file_metainfo};

    fn download(metainfo: &[u8]) -> Download {
        Download::new(
            Arc::new(Torrent::parse(metainfo).unwrap()),
            DownloadSettings::default(),
            PathBuf::from("downloads"),
        )
    }

    #[test]
    fn rebuild_multi_file_download() {
        let metainfo = multi_file_metainfo("set", &[("a.txt", 30), ("b/c.txt", 30)], 16);
        let mut original = download(&metainfo);
        original.files[0].selected = false;
        original.settings.speed_limit = 4096;

        let json = serde_json::to_string(&IndexEntry::from(&original)).unwrap();
        let entry: IndexEntry = serde_json::from_str(&json).unwrap();
        let rebuilt = entry.into_download(&original.id);

        assert_eq!(rebuilt.id, original.id);
        assert_eq!(rebuilt.torrent.name, original.torrent.name);
        assert_eq!(rebuilt.torrent.content_id, original.torrent.content_id);
        assert_eq!(rebuilt.torrent.piece_length, 16);
        assert_eq!(rebuilt.torrent.pieces, original.torrent.pieces);
        assert_eq!(rebuilt.torrent.total_size(), 60);
        assert_eq!(rebuilt.files, original.files);
        assert_eq!(rebuilt.settings, original.settings);
        assert_eq!(rebuilt.download_dir, original.download_dir);
    }

    #[test]
    fn single_file_entry_has_no_files() {
        let original = download(&single_file_metainfo("a.iso", 100, 30));

        let json = serde_json::to_value(IndexEntry::from(&original)).unwrap();

        assert!(json.get("files").is_none());
        assert_eq!(json["is_multi_file"], false);
        assert_eq!(json["pieces"].as_array().unwrap().len(), 4);
        assert_eq!(json["pieces"][3]["size"], 10);
        assert_eq!(
            json["pieces"][0]["hash"],
            original.torrent.pieces[0].hash.hex()
        );
    }

    #[test]
    fn legacy_entry_without_layout_fields() {
        let json = r#"{
            "name": "a.iso",
            "total_size": 100,
            "pieces": [
                {"index": 0, "size": 64, "hash": "0000000000000000000000000000000000000000"},
                {"index": 1, "size": 36, "hash": "0101010101010101010101010101010101010101"}
            ],
            "download_dir": "downloads",
            "state_file": "downloads/abc/state.json",
            "settings": {"speed_limit": 0}
        }"#;
        let entry: IndexEntry = serde_json::from_str(json).unwrap();
        let download = entry.into_download("abc");

        assert_eq!(download.id, "abc");
        assert_eq!(download.torrent.piece_length, 64);
        assert_eq!(download.torrent.total_size(), 100);
        assert_eq!(download.torrent.pieces[1].hash, Sha1([1; 20]));
        assert!(!download.torrent.is_multi_file());
    }
}
