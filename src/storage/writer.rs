use std::path::{Path, PathBuf};

use log::{error, info};
use size::Size;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::storage::Content;
use crate::torrent::{FileEntry, Torrent};

/// Materializes the output of a finished download from its content.
pub struct FileWriter<'a> {
    folder: &'a Path,
    content: &'a Content,
    pre_allocate: bool,
}

impl<'a> FileWriter<'a> {
    pub fn new(folder: &'a Path, content: &'a Content, pre_allocate: bool) -> Self {
        Self {
            folder,
            content,
            pre_allocate,
        }
    }

    /// Writes a single-file torrent as `folder/name`, or every selected
    /// member of a multi-file torrent as `folder/path`. A failed file is
    /// logged and skipped. Returns the number of files written.
    pub async fn write(&self, torrent: &Torrent, files: &mut [FileEntry]) -> usize {
        if !torrent.is_multi_file() {
            return match self.write_file(&torrent.name, 0, torrent.total_size()).await {
                Ok(_) => 1,
                Err(err) => {
                    error!("failed to write {}: {:#}", torrent.name, err);
                    0
                }
            };
        }

        let mut written = 0;
        for file in files.iter_mut().filter(|file| file.selected) {
            match self.write_file(&file.path, file.offset, file.length).await {
                Ok(_) => {
                    file.downloaded = true;
                    written += 1;
                }
                Err(err) => error!("failed to write {}: {:#}", file.path, err),
            }
        }
        written
    }

    async fn write_file(&self, relative: &str, offset: u64, length: u64) -> anyhow::Result<PathBuf> {
        let path = self.folder.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(&path).await?;
        if self.pre_allocate {
            file.set_len(length).await?;
        }
        file.write_all(self.content.range(offset, length)).await?;
        file.flush().await?;
        info!("wrote {} ({})", path.display(), Size::from_bytes(length));
        Ok(path)
    }
}
