use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::SOCKBUF_CAPACITY;

/// Buffers raw bytes from a control connection and hands them out one at a
/// time. The buffer is drained completely before another receive call is
/// issued, so bytes already read off the wire are never reordered behind a
/// fresh read.
#[derive(Debug)]
pub struct SockBuf {
    data: [u8; SOCKBUF_CAPACITY],
    pos: usize,
    len: usize,
}

impl SockBuf {
    pub fn new() -> Self {
        SockBuf {
            data: [0; SOCKBUF_CAPACITY],
            pos: 0,
            len: 0,
        }
    }

    /// Returns the next buffered byte, refilling with a single read when
    /// the buffer is exhausted. `Ok(None)` is end-of-stream (a zero-length
    /// read); I/O failures surface as `Err`.
    pub async fn next_byte<R>(&mut self, reader: &mut R) -> io::Result<Option<u8>>
    where
        R: AsyncRead + Unpin,
    {
        if self.pos == self.len {
            let n = reader.read(&mut self.data).await?;
            self.pos = 0;
            self.len = n;
            if n == 0 {
                return Ok(None);
            }
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Resynchronize after a malformed command: skip buffered input up to
    /// and including the next LF, so the next read starts on a fresh
    /// command line. If no LF is buffered, everything buffered is dropped.
    pub fn resync(&mut self) {
        while self.pos < self.len {
            let byte = self.data[self.pos];
            self.pos += 1;
            if byte == b'\n' {
                return;
            }
        }
        self.pos = 0;
        self.len = 0;
    }
}

impl Default for SockBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Serves one predefined chunk per poll so tests can observe how many
    /// reads the buffer actually issues.
    struct ChunkReader {
        chunks: Vec<Vec<u8>>,
        reads: usize,
    }

    impl ChunkReader {
        fn new(chunks: &[&[u8]]) -> Self {
            ChunkReader {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                reads: 0,
            }
        }
    }

    impl AsyncRead for ChunkReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            self.reads += 1;
            if !self.chunks.is_empty() {
                let chunk = self.chunks.remove(0);
                buf.put_slice(&chunk);
            }
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn drains_buffer_before_reading_again() {
        let mut reader = ChunkReader::new(&[b"ab", b"cd"]);
        let mut buf = SockBuf::new();

        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'a'));
        assert_eq!(reader.reads, 1);
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'b'));
        assert_eq!(reader.reads, 1);
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'c'));
        assert_eq!(reader.reads, 2);
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'd'));
        assert_eq!(reader.reads, 2);
    }

    #[tokio::test]
    async fn zero_length_read_is_eof() {
        let mut reader = ChunkReader::new(&[b"x"]);
        let mut buf = SockBuf::new();

        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'x'));
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resync_skips_to_next_line() {
        let mut reader = ChunkReader::new(&[b"garbage\r\nPWD\r\n"]);
        let mut buf = SockBuf::new();

        // Consume one byte so the rest of the chunk is buffered.
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'g'));
        buf.resync();
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'P'));
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'W'));
    }

    #[tokio::test]
    async fn resync_without_buffered_newline_drops_everything() {
        let mut reader = ChunkReader::new(&[b"abc", b"DEF\r\n"]);
        let mut buf = SockBuf::new();

        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'a'));
        buf.resync();
        assert_eq!(buf.next_byte(&mut reader).await.unwrap(), Some(b'D'));
    }
}
