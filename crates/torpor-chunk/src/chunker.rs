//! Fixed-size chunker for splitting a workspace byte stream.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ChunkError;

/// A single uncompressed chunk of the workspace byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the stream; defines reassembly order.
    pub index: u64,
    /// The raw chunk data.
    pub data: Vec<u8>,
}

/// Number of chunks a stream of `total_size` bytes splits into.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u64 {
    total_size.div_ceil(chunk_size)
}

/// Fixed-size chunker.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which may be
/// smaller. Empty input produces zero chunks.
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Create a new chunker with the given chunk size in bytes.
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size: chunk_size as usize,
        }
    }

    /// Split an in-memory buffer into fixed-size chunks.
    pub fn chunk(&self, data: &[u8]) -> Vec<Chunk> {
        if data.is_empty() {
            return Vec::new();
        }

        data.chunks(self.chunk_size)
            .enumerate()
            .map(|(i, slice)| Chunk {
                index: i as u64,
                data: slice.to_vec(),
            })
            .collect()
    }

    /// Start lazily chunking an async byte source.
    ///
    /// The returned stream holds at most one chunk in memory at a time.
    pub fn stream<R: AsyncRead + Unpin>(&self, reader: R) -> ChunkStream<R> {
        ChunkStream {
            reader,
            chunk_size: self.chunk_size,
            next_index: 0,
            done: false,
        }
    }
}

/// Lazy, bounded-memory chunk sequence over an async reader.
///
/// Short reads are retried until a full chunk boundary or end-of-stream is
/// reached, so a slow source never silently truncates a chunk. After the
/// source fails with an I/O error the stream is fused and yields no
/// further chunks.
pub struct ChunkStream<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> ChunkStream<R> {
    /// Read the next chunk, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, ChunkError> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;

        // Read until the chunk is full or the source is exhausted.
        while filled < self.chunk_size {
            let n = match self.reader.read(&mut buf[filled..]).await {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        let chunk = Chunk {
            index: self.next_index,
            data: buf,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }

    /// Number of chunks yielded so far.
    pub fn chunks_yielded(&self) -> u64 {
        self.next_index
    }
}
