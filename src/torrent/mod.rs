mod download_type;
mod info;

pub use download_type::{DownloadType, FileEntry};
pub use info::Piece;

use crate::bencoding::Value;
use crate::crypto::Sha1;
use crate::error::ParseError;
use download_type::{validate_output_name, validate_segment};

/// Number of hex characters of the content id used as a download id.
const ID_LEN: usize = 16;

/// Layout of a torrent, derived once from its metainfo.
#[derive(Debug, PartialEq, Clone)]
pub struct Torrent {
    pub name: String,
    pub content_id: Sha1,
    pub piece_length: u64,
    pub pieces: Vec<Piece>,
    pub download_type: DownloadType,
}

impl Torrent {
    /// Parses a bencoded metainfo file.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut metainfo = Value::decode(bytes)?;
        let info = metainfo.remove_entry("info")?;
        Torrent::try_from(info)
    }

    pub fn id(&self) -> String {
        let mut id = self.content_id.hex();
        id.truncate(ID_LEN);
        id
    }

    pub fn total_size(&self) -> u64 {
        self.download_type.total_size()
    }

    pub fn total_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Offset of the first byte of `piece` in the logical content.
    pub fn piece_offset(&self, piece: usize) -> u64 {
        self.piece_length * piece as u64
    }

    pub fn is_multi_file(&self) -> bool {
        matches!(self.download_type, DownloadType::MultiFile { .. })
    }

    /// Members of a multi-file layout, empty for a single file.
    pub fn files(&self) -> &[FileEntry] {
        match &self.download_type {
            DownloadType::SingleFile { .. } => &[],
            DownloadType::MultiFile { files } => files,
        }
    }
}

impl TryFrom<Value> for Torrent {
    type Error = ParseError;

    fn try_from(mut info: Value) -> Result<Self, Self::Error> {
        let content_id = Sha1::from(&info);
        let piece_length = info.remove_entry("piece length")?.try_into()?;
        let hashes: Vec<u8> = info.remove_entry("pieces")?.try_into()?;
        let download_type = DownloadType::try_from(&mut info)?;
        let name = validate_segment(info.remove_entry("name")?.try_into()?)?;
        if let DownloadType::SingleFile { .. } = download_type {
            validate_output_name(&name)?;
        }
        let pieces = info::build_pieces(&hashes, piece_length, download_type.total_size())?;
        Ok(Torrent {
            name,
            content_id,
            piece_length,
            pieces,
            download_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{multi_file_metainfo, single_file_metainfo};

    #[test]
    fn single_file_torrent() {
        let torrent = Torrent::parse(&single_file_metainfo("video.mp4", 49152, 16384)).unwrap();

        assert_eq!(torrent.name, "video.mp4");
        assert_eq!(torrent.total_size(), 49152);
        assert_eq!(torrent.total_pieces(), 3);
        assert!(torrent.pieces.iter().all(|piece| piece.size == 16384));
        assert_eq!(torrent.piece_offset(2), 32768);
        assert!(!torrent.is_multi_file());
        assert!(torrent.files().is_empty());
    }

    #[test]
    fn multi_file_torrent() {
        let metainfo = multi_file_metainfo("album", &[("cd1/a.mp3", 100), ("b.flac", 150)], 64);
        let torrent = Torrent::parse(&metainfo).unwrap();

        assert!(torrent.is_multi_file());
        assert_eq!(torrent.total_size(), 250);
        assert_eq!(torrent.total_pieces(), 4);
        assert_eq!(torrent.pieces[3].size, 250 - 3 * 64);

        let files = torrent.files();
        assert_eq!(files.iter().map(|file| file.length).sum::<u64>(), 250);
        assert_eq!(files[0].path, "cd1/a.mp3");
        assert_eq!(files[0].offset + files[0].length, files[1].offset);
    }

    #[test]
    fn content_id_is_hash_of_info() {
        let metainfo = single_file_metainfo("a.bin", 10, 10);
        let mut value = Value::decode(&metainfo).unwrap();
        let info = value.remove_entry("info").unwrap();
        let torrent = Torrent::parse(&metainfo).unwrap();

        assert_eq!(torrent.content_id, Sha1::digest(&info.to_bytes()));
        assert_eq!(torrent.id(), torrent.content_id.hex()[..16]);
    }

    #[test]
    fn id_ignores_keys_outside_info() {
        let metainfo = single_file_metainfo("a.bin", 10, 10);
        let mut value = Value::decode(&metainfo).unwrap();
        let info = value.remove_entry("info").unwrap();
        let other = Value::dictionary()
            .with_entry("announce", Value::string("http://localhost/announce"))
            .with_entry("info", info);

        let first = Torrent::parse(&metainfo).unwrap();
        let second = Torrent::parse(&other.to_bytes()).unwrap();

        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn fail_for_malformed_input() {
        assert!(matches!(
            Torrent::parse(b"d4:info"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            Torrent::parse(b"li1ee"),
            Err(ParseError::NotADictionary)
        ));
    }

    #[test]
    fn fail_for_missing_keys() {
        let info = Value::dictionary()
            .with_entry("piece length", Value::Integer(10))
            .with_entry("pieces", Value::String(vec![0; 20]))
            .with_entry("name", Value::string("a"))
            .with_entry("length", Value::Integer(10));

        for (key, expected) in [
            ("piece length", "piece length"),
            ("pieces", "pieces"),
            ("name", "name"),
        ] {
            let mut info = info.clone();
            info.remove_entry(key).unwrap();
            let metainfo = Value::dictionary().with_entry("info", info).to_bytes();

            assert!(matches!(
                Torrent::parse(&metainfo),
                Err(ParseError::MissingKey(missing)) if missing == expected
            ));
        }

        let mut without_layout = info.clone();
        without_layout.remove_entry("length").unwrap();
        let metainfo = Value::dictionary()
            .with_entry("info", without_layout)
            .to_bytes();
        assert!(matches!(
            Torrent::parse(&metainfo),
            Err(ParseError::MissingLayout)
        ));

        let metainfo = Value::dictionary().with_entry("announce", Value::string("x"));
        assert!(matches!(
            Torrent::parse(&metainfo.to_bytes()),
            Err(ParseError::MissingKey("info"))
        ));
    }

    #[test]
    fn fail_for_unsafe_name() {
        let info = Value::dictionary()
            .with_entry("piece length", Value::Integer(10))
            .with_entry("pieces", Value::String(vec![0; 20]))
            .with_entry("name", Value::string(".."))
            .with_entry("length", Value::Integer(10));
        let metainfo = Value::dictionary().with_entry("info", info).to_bytes();

        assert!(matches!(
            Torrent::parse(&metainfo),
            Err(ParseError::InvalidPath(_))
        ));
    }

    #[test]
    fn fail_for_single_file_named_like_state_file() {
        for name in ["state.json", "state.json.tmp"] {
            assert!(matches!(
                Torrent::parse(&single_file_metainfo(name, 49152, 16384)),
                Err(ParseError::InvalidPath(_))
            ));
        }
        let metainfo = multi_file_metainfo("state.json", &[("a.txt", 10)], 10);
        assert!(Torrent::parse(&metainfo).is_ok());
    }

    #[test]
    fn fail_for_oversized_single_file() {
        let info = Value::dictionary()
            .with_entry("piece length", Value::Integer(1))
            .with_entry("pieces", Value::String(vec![0; 20]))
            .with_entry("name", Value::string("huge.bin"))
            .with_entry("length", Value::Integer(i64::MAX));
        let metainfo = Value::dictionary().with_entry("info", info).to_bytes();

        assert!(matches!(
            Torrent::parse(&metainfo),
            Err(ParseError::MissingPieceHashes { .. })
        ));
    }
}
