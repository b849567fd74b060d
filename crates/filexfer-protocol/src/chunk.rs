//! Splits ciphertext into ≤734-byte chunks for the 828 upload packets.

use crate::wire::CHUNK_SIZE;

/// One chunk's position within the upload: 1-based packet number, byte
/// offset into the ciphertext, and length (the last chunk is typically
/// shorter than `CHUNK_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub packet_number: u16,
    pub offset: usize,
    pub len: usize,
}

/// `total_packets = ceil(len / CHUNK_SIZE)`; panics if `len == 0`, which
/// callers must have already rejected (see `FileSelection`'s invariant).
pub fn total_packets(len: usize) -> u16 {
    assert!(len > 0, "cannot chunk an empty ciphertext");
    (len.div_ceil(CHUNK_SIZE)) as u16
}

/// Iterate `(packet_number, offset, len)` triples covering `len` bytes of
/// ciphertext in `CHUNK_SIZE`-byte pieces, 1-based and strictly increasing.
pub fn chunks(len: usize) -> impl Iterator<Item = Chunk> {
    let total = total_packets(len);
    (0..total).map(move |i| {
        let offset = i as usize * CHUNK_SIZE;
        let remaining = len - offset;
        Chunk {
            packet_number: i + 1,
            offset,
            len: remaining.min(CHUNK_SIZE),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_when_under_limit() {
        let chunks: Vec<_> = chunks(16).collect();
        assert_eq!(chunks, vec![Chunk { packet_number: 1, offset: 0, len: 16 }]);
        assert_eq!(total_packets(16), 1);
    }

    #[test]
    fn splits_across_chunk_boundary() {
        let chunks: Vec<_> = chunks(2000).collect();
        assert_eq!(total_packets(2000), 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], Chunk { packet_number: 1, offset: 0, len: 734 });
        assert_eq!(chunks[1], Chunk { packet_number: 2, offset: 734, len: 734 });
        assert_eq!(chunks[2], Chunk { packet_number: 3, offset: 1468, len: 532 });
        let total_len: usize = chunks.iter().map(|c| c.len).sum();
        assert_eq!(total_len, 2000);
    }

    #[test]
    fn exact_multiple_of_chunk_size() {
        let chunks: Vec<_> = chunks(CHUNK_SIZE * 2).collect();
        assert_eq!(total_packets(CHUNK_SIZE * 2), 2);
        assert_eq!(chunks[1].len, CHUNK_SIZE);
    }

    #[test]
    #[should_panic]
    fn rejects_empty_input() {
        let _ = total_packets(0);
    }
}
