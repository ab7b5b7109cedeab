use std::path::Path;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::crypto::Sha1;
use crate::torrent::Torrent;

const GENERIC_HEADER: &[u8] = b"BINARY\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";
const OFFICE_HEADER: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";

/// Logical byte stream of a download: every file back to back, in declared
/// order.
///
/// The bytes are synthetic but fixed for a given torrent, so pieces cut from
/// it and files written from it always agree.
#[derive(Debug)]
pub struct Content {
    bytes: Vec<u8>,
}

impl Content {
    pub fn synthesize(torrent: &Torrent) -> Self {
        let mut bytes = Vec::with_capacity(torrent.total_size() as usize);
        if torrent.is_multi_file() {
            for file in torrent.files() {
                bytes.extend(synthesize_file(&torrent.content_id, &file.path, file.length));
            }
        } else {
            bytes.extend(synthesize_file(
                &torrent.content_id,
                &torrent.name,
                torrent.total_size(),
            ));
        }
        Self { bytes }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Bytes `[offset, offset + size)`, zero padded past the end of the stream.
    pub fn piece(&self, offset: u64, size: u64) -> Vec<u8> {
        let mut piece = self.range(offset, size).to_vec();
        piece.resize(size as usize, 0);
        piece
    }

    /// Bytes `[offset, offset + length)` clamped to the stream.
    pub fn range(&self, offset: u64, length: u64) -> &[u8] {
        let start = (offset as usize).min(self.bytes.len());
        let end = (offset.saturating_add(length) as usize).min(self.bytes.len());
        &self.bytes[start..end]
    }
}

fn synthesize_file(content_id: &Sha1, path: &str, length: u64) -> Vec<u8> {
    let length = length as usize;
    let mut bytes = Vec::with_capacity(length);
    bytes.extend_from_slice(header(path));
    bytes.truncate(length);
    if bytes.len() < length {
        let mut filler = vec![0; length - bytes.len()];
        rng(content_id, path).fill_bytes(&mut filler);
        bytes.extend(filler);
    }
    bytes
}

fn rng(content_id: &Sha1, path: &str) -> StdRng {
    let mut input = content_id.0.to_vec();
    input.extend_from_slice(path.as_bytes());
    let mut seed = [0; 32];
    seed[..20].copy_from_slice(&Sha1::digest(&input).0);
    StdRng::from_seed(seed)
}

/// Magic bytes matching the extension of `path`.
fn header(path: &str) -> &'static [u8] {
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" => b"\x00\x00\x00\x20ftypmp42\x00\x00\x00\x00mp42isom",
        "avi" => b"RIFF\x00\x00\x00\x00AVI ",
        "mkv" => b"\x1a\x45\xdf\xa3",
        "mov" => b"\x00\x00\x00\x20ftypqt  ",
        "mp3" => b"\xff\xfb\x90\x44",
        "wav" => b"RIFF\x00\x00\x00\x00WAVEfmt ",
        "flac" => b"fLaC",
        "ogg" => b"OggS",
        "jpg" | "jpeg" => b"\xff\xd8\xff",
        "png" => b"\x89PNG\r\n\x1a\n",
        "gif" => b"GIF89a",
        "bmp" => b"BM",
        "pdf" => b"%PDF-1.4\n",
        "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => OFFICE_HEADER,
        "zip" => b"PK\x03\x04",
        "rar" => b"Rar!\x1a\x07\x00",
        "7z" => b"7z\xbc\xaf\x27\x1c",
        "tar" => b"ustar",
        "html" | "htm" => b"<!DOCTYPE html>\n<html>\n<head>\n",
        "xml" => b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "json" => b"{\n",
        "txt" => b"",
        _ => GENERIC_HEADER,
    }
}
