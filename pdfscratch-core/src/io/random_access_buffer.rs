//! Growable in-memory random access buffer
//!
//! Content is stored in fixed-size chunks so that growing the buffer never
//! copies data that was already written.

use super::{Closeable, RandomAccessRead, RandomAccessWrite};
use crate::error::{PdfError, Result};

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Random-access buffer held entirely in main memory
#[derive(Debug, Clone)]
pub struct RandomAccessBuffer {
    chunk_size: usize,
    chunks: Vec<Box<[u8]>>,
    size: u64,
    position: u64,
    closed: bool,
}

impl Default for RandomAccessBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomAccessBuffer {
    /// Create an empty buffer with [`DEFAULT_CHUNK_SIZE`] chunks
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create an empty buffer using chunks of `chunk_size` bytes (at least 1)
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: Vec::new(),
            size: 0,
            position: 0,
            closed: false,
        }
    }

    /// Create a buffer holding a copy of `bytes`, positioned at 0
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_chunk_size(bytes.len().clamp(1, DEFAULT_CHUNK_SIZE));
        for chunk in bytes.chunks(buffer.chunk_size) {
            let mut stored = vec![0u8; buffer.chunk_size].into_boxed_slice();
            stored[..chunk.len()].copy_from_slice(chunk);
            buffer.chunks.push(stored);
        }
        buffer.size = bytes.len() as u64;
        buffer
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(PdfError::Closed("RandomAccessBuffer"))
        } else {
            Ok(())
        }
    }

    fn locate(&self, position: u64) -> (usize, usize) {
        let chunk_size = self.chunk_size as u64;
        ((position / chunk_size) as usize, (position % chunk_size) as usize)
    }
}

impl Closeable for RandomAccessBuffer {
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.chunks = Vec::new();
        self.size = 0;
        self.position = 0;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RandomAccessRead for RandomAccessBuffer {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_closed()?;
        if self.position >= self.size {
            return Ok(None);
        }
        let (chunk, offset) = self.locate(self.position);
        self.position += 1;
        Ok(Some(self.chunks[chunk][offset]))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_closed()?;
        let available = usize::try_from(self.size.saturating_sub(self.position)).unwrap_or(usize::MAX);
        let total = buf.len().min(available);

        let mut read = 0;
        while read < total {
            let (chunk, offset) = self.locate(self.position);
            let count = (total - read).min(self.chunk_size - offset);
            buf[read..read + count].copy_from_slice(&self.chunks[chunk][offset..offset + count]);
            read += count;
            self.position += count as u64;
        }
        Ok(read)
    }

    fn position(&self) -> Result<u64> {
        self.check_closed()?;
        Ok(self.position)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.check_closed()?;
        if position > self.size {
            return Err(PdfError::InvalidSeek {
                position,
                length: self.size,
            });
        }
        self.position = position;
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        self.check_closed()?;
        Ok(self.size)
    }
}

impl RandomAccessWrite for RandomAccessBuffer {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_closed()?;
        let mut written = 0;
        while written < buf.len() {
            let (chunk, offset) = self.locate(self.position);
            if chunk == self.chunks.len() {
                self.chunks
                    .push(vec![0u8; self.chunk_size].into_boxed_slice());
            }
            let count = (buf.len() - written).min(self.chunk_size - offset);
            self.chunks[chunk][offset..offset + count]
                .copy_from_slice(&buf[written..written + count]);
            written += count;
            self.position += count as u64;
        }
        self.size = self.size.max(self.position);
        Ok(())
    }

    /// Drop all content, keeping the first chunk allocated
    fn clear(&mut self) -> Result<()> {
        self.check_closed()?;
        self.chunks.truncate(1);
        self.size = 0;
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_multiple_chunks() {
        let mut buffer = RandomAccessBuffer::with_chunk_size(4);
        buffer.write(b"0123456789").unwrap();
        assert_eq!(buffer.length().unwrap(), 10);

        buffer.seek(2).unwrap();
        let mut out = [0u8; 6];
        assert_eq!(buffer.read(&mut out).unwrap(), 6);
        assert_eq!(&out, b"234567");
    }

    #[test]
    fn test_from_bytes() {
        let mut buffer = RandomAccessBuffer::from_bytes(b"stream");
        assert_eq!(buffer.position().unwrap(), 0);
        assert_eq!(buffer.length().unwrap(), 6);
        assert_eq!(buffer.read_byte().unwrap(), Some(b's'));

        let empty = RandomAccessBuffer::from_bytes(b"");
        assert_eq!(empty.length().unwrap(), 0);
    }

    #[test]
    fn test_overwrite_then_extend() {
        let mut buffer = RandomAccessBuffer::with_chunk_size(3);
        buffer.write(b"abcdef").unwrap();
        buffer.seek(4).unwrap();
        buffer.write(b"XYZW").unwrap();
        assert_eq!(buffer.length().unwrap(), 8);

        buffer.seek(0).unwrap();
        let mut out = [0u8; 8];
        buffer.read_fully(&mut out).unwrap();
        assert_eq!(&out, b"abcdXYZW");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = RandomAccessBuffer::from_bytes(b"same");
        let mut copy = original.clone();
        copy.seek(0).unwrap();
        copy.write(b"diff").unwrap();

        let mut out = [0u8; 4];
        original.read_fully(&mut out).unwrap();
        assert_eq!(&out, b"same");
    }

    #[test]
    fn test_clear_and_close() {
        let mut buffer = RandomAccessBuffer::with_chunk_size(2);
        buffer.write(b"abcdef").unwrap();
        buffer.clear().unwrap();
        assert_eq!(buffer.length().unwrap(), 0);
        assert_eq!(buffer.read_byte().unwrap(), None);

        buffer.close().unwrap();
        buffer.close().unwrap();
        assert!(matches!(buffer.write(b"x"), Err(PdfError::Closed(_))));
    }
}
