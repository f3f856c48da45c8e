//! Batch chunking for bulk writes

/// Rows per chunk when the caller passes `0`.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Position of one chunk inside its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Zero-based chunk number.
    pub index: usize,
    /// Index of the chunk's first element in the batch.
    pub offset: usize,
    pub len: usize,
}

pub fn effective_batch_size(batch_size: usize) -> usize {
    if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    }
}

/// Number of chunks `chunks` yields for `len` items.
pub fn chunk_count(len: usize, batch_size: usize) -> usize {
    len.div_ceil(effective_batch_size(batch_size))
}

/// Consecutive, non-overlapping slices of at most `batch_size` items, in input order.
pub fn chunks<T>(items: &[T], batch_size: usize) -> impl Iterator<Item = (ChunkSpan, &[T])> {
    let size = effective_batch_size(batch_size);
    items.chunks(size).enumerate().map(move |(index, chunk)| {
        (
            ChunkSpan {
                index,
                offset: index * size,
                len: chunk.len(),
            },
            chunk,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_default() {
        assert_eq!(effective_batch_size(0), DEFAULT_BATCH_SIZE);
        assert_eq!(effective_batch_size(7), 7);
        assert_eq!(chunk_count(4001, 0), 3);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(chunks(&items, 10).count(), 0);
        assert_eq!(chunk_count(0, 10), 0);
    }

    #[test]
    fn chunks_cover_the_input_exactly_once_in_order() {
        for len in [1usize, 2, 9, 10, 11, 99, 100, 101, 257] {
            for batch in [1usize, 2, 3, 10, 64, 100, 1000] {
                let items: Vec<usize> = (0..len).collect();
                let spans: Vec<_> = chunks(&items, batch).collect();

                assert_eq!(spans.len(), len.div_ceil(batch), "len={len} batch={batch}");
                assert_eq!(spans.len(), chunk_count(len, batch));

                let mut rebuilt = Vec::with_capacity(len);
                for (i, (span, chunk)) in spans.iter().enumerate() {
                    assert_eq!(span.index, i);
                    assert_eq!(span.offset, rebuilt.len());
                    assert_eq!(span.len, chunk.len());
                    assert!(chunk.len() <= batch && !chunk.is_empty());
                    rebuilt.extend_from_slice(chunk);
                }
                assert_eq!(rebuilt, items);
            }
        }
    }
}
