use std::path::PathBuf;

use size::Size;
use thiserror::Error;

/// Reasons a torrent metadata file is rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed bencode: {0}")]
    Malformed(#[from] std::io::Error),

    #[error("expected a dictionary")]
    NotADictionary,

    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    #[error("neither 'length' nor 'files' is present")]
    MissingLayout,

    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("negative integer {0} where a size was expected")]
    NegativeInteger(i64),

    #[error("string is not valid utf8")]
    InvalidUtf8,

    #[error("total size does not fit in 64 bits")]
    SizeOverflow,

    #[error("piece length must be positive")]
    InvalidPieceLength,

    #[error("invalid pieces length {0}, must be a multiple of 20")]
    InvalidPiecesLength(usize),

    #[error("{pieces} pieces need {expected} hash bytes, got {actual}")]
    MissingPieceHashes {
        pieces: usize,
        expected: usize,
        actual: usize,
    },

    #[error("invalid path segment {0:?}")]
    InvalidPath(String),
}

/// Errors surfaced to callers of the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("insufficient disk space at {path:?}: need {}, have {}", human(.required), human(.available))]
    Resource {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn human(bytes: &u64) -> Size {
    Size::from_bytes(*bytes)
}
