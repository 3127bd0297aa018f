//! Message chunking — fixed-max-size split and ordered rejoin.

use bytes::Bytes;

use crate::error::DiodeError;

/// Default chunk size in bytes. Tuned so an FEC-encoded chunk plus the
/// frame header fits one UDP payload without IP fragmentation.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Split a message into contiguous slices of at most `chunk_size` bytes.
///
/// The concatenation of the returned chunks equals the input; only the
/// final chunk may be shorter. An empty message yields no chunks (the
/// pipelines reject empty messages before chunking).
pub fn split(message: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    assert!(chunk_size > 0);
    let mut chunks = Vec::with_capacity(message.len().div_ceil(chunk_size));
    let mut offset = 0;
    while offset < message.len() {
        let end = usize::min(offset + chunk_size, message.len());
        chunks.push(message.slice(offset..end));
        offset = end;
    }
    chunks
}

/// Rejoin chunk positions into the original message.
///
/// Inverse of [`split`] given every position filled, in order. Fails
/// with [`DiodeError::IncompleteAssembly`] on the first empty position.
pub fn join(positions: &[Option<Bytes>]) -> Result<Vec<u8>, DiodeError> {
    let total: usize = positions
        .iter()
        .map(|p| p.as_ref().map_or(0, |c| c.len()))
        .sum();
    let mut message = Vec::with_capacity(total);
    for (index, position) in positions.iter().enumerate() {
        match position {
            Some(chunk) => message.extend_from_slice(chunk),
            None => return Err(DiodeError::IncompleteAssembly { index }),
        }
    }
    Ok(message)
}
