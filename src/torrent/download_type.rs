use serde::{Deserialize, Serialize};

use crate::bencoding::Value;
use crate::download::STATE_FILE;
use crate::error::ParseError;

#[derive(Debug, PartialEq, Clone)]
pub enum DownloadType {
    SingleFile { length: u64 },
    MultiFile { files: Vec<FileEntry> },
}

impl DownloadType {
    pub fn total_size(&self) -> u64 {
        match self {
            Self::SingleFile { length } => *length,
            Self::MultiFile { files } => files.iter().map(|file| file.length).sum(),
        }
    }
}

/// Reads the layout keys of an `info` dictionary. A `files` list wins over
/// `length` when both are present.
impl TryFrom<&mut Value> for DownloadType {
    type Error = ParseError;

    fn try_from(value: &mut Value) -> Result<Self, Self::Error> {
        if let Some(files) = value.try_remove_entry("files")? {
            let files: Vec<Value> = files.try_into()?;
            let mut result = Vec::with_capacity(files.len());
            let mut offset: u64 = 0;
            for file in files {
                let file = FileEntry::parse(file, offset)?;
                offset = offset
                    .checked_add(file.length)
                    .ok_or(ParseError::SizeOverflow)?;
                result.push(file);
            }
            return Ok(DownloadType::MultiFile { files: result });
        }

        if let Some(length) = value.try_remove_entry("length")? {
            let length = length.try_into()?;
            return Ok(DownloadType::SingleFile { length });
        }

        Err(ParseError::MissingLayout)
    }
}

/// One member of a multi-file layout.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path, segments joined with `/`.
    pub path: String,
    pub length: u64,
    /// Position of the first byte in the concatenation of all files.
    pub offset: u64,
    pub selected: bool,
    #[serde(default)]
    pub downloaded: bool,
}

impl FileEntry {
    fn parse(mut value: Value, offset: u64) -> Result<Self, ParseError> {
        let length = value.remove_entry("length")?.try_into()?;
        let parts: Vec<Value> = value.remove_entry("path")?.try_into()?;
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            let part: String = part.try_into()?;
            segments.push(validate_segment(part)?);
        }
        match segments.first() {
            None => return Err(ParseError::InvalidPath(String::new())),
            Some(first) => validate_output_name(first)?,
        }
        Ok(FileEntry {
            path: segments.join("/"),
            length,
            offset,
            selected: true,
            downloaded: false,
        })
    }
}

/// Rejects names that would overwrite the progress file kept next to the
/// output.
pub fn validate_output_name(name: &str) -> Result<(), ParseError> {
    let tmp = format!("{}.tmp", STATE_FILE);
    if name == STATE_FILE || name == tmp {
        return Err(ParseError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Rejects segments that would escape or alias the output folder.
pub fn validate_segment(segment: String) -> Result<String, ParseError> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ParseError::InvalidPath(segment));
    }
    Ok(segment)
}
