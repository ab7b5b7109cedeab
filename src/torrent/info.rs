use crate::crypto::{SHA1_LEN, Sha1};
use crate::error::ParseError;

#[derive(Debug, PartialEq, Clone)]
pub struct Piece {
    pub index: usize,
    pub size: u64,
    pub hash: Sha1,
}

/// Splits the concatenated `pieces` string into one descriptor per piece.
///
/// Every piece is `piece_length` bytes long except the last one, which holds
/// the remainder of `total_size`. Hashes beyond the needed count are ignored.
pub fn build_pieces(
    hashes: &[u8],
    piece_length: u64,
    total_size: u64,
) -> Result<Vec<Piece>, ParseError> {
    if piece_length == 0 {
        return Err(ParseError::InvalidPieceLength);
    }
    if hashes.len() % SHA1_LEN != 0 {
        return Err(ParseError::InvalidPiecesLength(hashes.len()));
    }
    let total_pieces = usize::try_from(total_size.div_ceil(piece_length)).unwrap_or(usize::MAX);
    if hashes.len() / SHA1_LEN < total_pieces {
        return Err(ParseError::MissingPieceHashes {
            pieces: total_pieces,
            expected: total_pieces.saturating_mul(SHA1_LEN),
            actual: hashes.len(),
        });
    }
    let pieces = hashes
        .chunks_exact(SHA1_LEN)
        .take(total_pieces)
        .enumerate()
        .map(|(index, chunk)| {
            let mut bytes = [0; SHA1_LEN];
            bytes.copy_from_slice(chunk);
            let offset = index as u64 * piece_length;
            Piece {
                index,
                size: piece_length.min(total_size - offset),
                hash: Sha1(bytes),
            }
        })
        .collect();
    Ok(pieces)
}
