//! Fixtures shared by tests across the crate.

use std::path::Path;
use std::time::Duration;

use crate::bencoding::Value;
use crate::client::{Client, Config, Status};
use crate::crypto::SHA1_LEN;
use crate::download::{DownloadSettings, DownloadSettingsBuilder};

fn piece_hashes(total_size: u64, piece_length: u64) -> Value {
    let count = total_size.div_ceil(piece_length) as usize;
    Value::String((0..count).flat_map(|i| [i as u8; SHA1_LEN]).collect())
}

fn metainfo(info: Value) -> Vec<u8> {
    Value::dictionary()
        .with_entry("announce", Value::string("http://localhost:6969/announce"))
        .with_entry("info", info)
        .to_bytes()
}

pub fn single_file_metainfo(name: &str, length: u64, piece_length: u64) -> Vec<u8> {
    metainfo(
        Value::dictionary()
            .with_entry("name", Value::string(name))
            .with_entry("length", Value::Integer(length as i64))
            .with_entry("piece length", Value::Integer(piece_length as i64))
            .with_entry("pieces", piece_hashes(length, piece_length)),
    )
}

/// `files` are `(path, length)` pairs, paths separated by `/`.
pub fn multi_file_metainfo(name: &str, files: &[(&str, u64)], piece_length: u64) -> Vec<u8> {
    let mut list = Value::list();
    for (path, length) in files {
        let path = path
            .split('/')
            .fold(Value::list(), |list, part| list.with_value(Value::string(part)));
        list = list.with_value(
            Value::dictionary()
                .with_entry("length", Value::Integer(*length as i64))
                .with_entry("path", path),
        );
    }
    let total_size = files.iter().map(|(_, length)| length).sum();
    metainfo(
        Value::dictionary()
            .with_entry("name", Value::string(name))
            .with_entry("files", list)
            .with_entry("piece length", Value::Integer(piece_length as i64))
            .with_entry("pieces", piece_hashes(total_size, piece_length)),
    )
}

/// Settings spending `delay` on every piece.
pub fn settings_with_delay(delay: Duration) -> DownloadSettings {
    DownloadSettingsBuilder::default()
        .simulation_delay(delay.as_secs_f64())
        .build()
        .unwrap()
}

/// Config rooted in `dir` with short checkpoints and polling.
pub fn test_config(dir: &Path) -> Config {
    Config::new(dir.join("downloads"))
        .with_index_path(dir.join("download_state.json"))
        .with_batch_size(4)
        .with_pause_poll_interval(Duration::from_millis(5))
        .with_default_settings(settings_with_delay(Duration::ZERO))
}

/// Polls the status of `id` until `predicate` holds, panicking after five
/// seconds.
pub async fn wait_for(client: &Client, id: &str, predicate: impl Fn(&Status) -> bool) -> Status {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = client.status(id).await.unwrap();
        if predicate(&status) {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting on {}",
            status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
