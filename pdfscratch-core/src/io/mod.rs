//! Random-access storage for PDF stream contents
//!
//! This module provides the byte-addressable buffers the stream layer writes
//! decoded and encoded stream data into, together with the page pool that
//! backs them.
//!
//! # Features
//!
//! - **Scratch pool**: [`ScratchFile`] hands out fixed-size pages kept in
//!   main memory, in a temporary file, or both
//! - **Paged buffers**: [`ScratchFileBuffer`] presents a seekable byte stream
//!   over a non-contiguous list of pool pages
//! - **Memory policy**: [`MemoryUsageSetting`] bounds memory and disk usage
//! - **Plain buffers**: [`RandomAccessBuffer`] and [`RandomAccessFile`] for
//!   callers that do not need a pool
//!
//! # Example
//!
//! ```rust
//! use pdfscratch::io::{
//!     Closeable, MemoryUsageSetting, RandomAccessRead, RandomAccessWrite, ScratchFile,
//! };
//!
//! # fn main() -> pdfscratch::Result<()> {
//! let scratch = ScratchFile::new(MemoryUsageSetting::main_memory_only(Some(1024 * 1024)))?;
//!
//! let mut buffer = scratch.create_buffer()?;
//! buffer.write(b"BT /F1 12 Tf (Hello) Tj ET")?;
//! buffer.seek(0)?;
//!
//! let mut content = vec![0u8; buffer.length()? as usize];
//! buffer.read_fully(&mut content)?;
//! assert_eq!(&content[..2], b"BT");
//!
//! buffer.close()?;
//! scratch.close()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{PdfError, Result};

pub mod memory_usage;
pub mod random_access_buffer;
pub mod random_access_file;
pub mod scratch_buffer;
pub mod scratch_file;
pub mod shared_buffer;
pub mod streams;
pub mod utils;

// Re-export main types
pub use memory_usage::MemoryUsageSetting;
pub use random_access_buffer::RandomAccessBuffer;
pub use random_access_file::RandomAccessFile;
pub use scratch_buffer::ScratchFileBuffer;
pub use scratch_file::{ScratchFile, ScratchFileStats, ENLARGE_PAGE_COUNT, PAGE_SIZE};
pub use shared_buffer::SharedByteBuffer;
pub use streams::{RandomAccessInputStream, RandomAccessOutputStream};

/// A resource that can be released explicitly.
///
/// Closing twice is a no-op.
pub trait Closeable {
    /// Release the resource
    fn close(&mut self) -> Result<()>;

    /// Whether [`Closeable::close`] has been called
    fn is_closed(&self) -> bool;
}

/// Readable, seekable byte storage.
///
/// End of data is never an error: [`RandomAccessRead::read_byte`] returns
/// `None` and [`RandomAccessRead::read`] returns a short (possibly zero)
/// count.
pub trait RandomAccessRead: Closeable {
    /// Read a single byte, `None` at end of data
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Read up to `buf.len()` bytes, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Current offset from the start of the data
    fn position(&self) -> Result<u64>;

    /// Move the cursor to an absolute offset, at most [`RandomAccessRead::length`]
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Total number of bytes stored
    fn length(&self) -> Result<u64>;

    /// Read the next byte without consuming it
    fn peek(&mut self) -> Result<Option<u8>> {
        let byte = self.read_byte()?;
        if byte.is_some() {
            self.rewind(1)?;
        }
        Ok(byte)
    }

    /// Move the cursor back by `bytes`
    fn rewind(&mut self, bytes: u64) -> Result<()> {
        let position = self.position()?;
        let target = position.checked_sub(bytes).ok_or(PdfError::InvalidSeek {
            position: 0,
            length: self.length()?,
        })?;
        self.seek(target)
    }

    /// Fill `buf` completely or fail with [`PdfError::UnexpectedEndOfData`]
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.read(&mut buf[filled..])?;
            if count == 0 {
                return Err(PdfError::UnexpectedEndOfData(format!(
                    "premature end of buffer after {} of {} bytes",
                    filled,
                    buf.len()
                )));
            }
            filled += count;
        }
        Ok(())
    }

    /// Whether the cursor sits at the end of the data
    fn is_eof(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// Number of bytes between the cursor and the end of the data
    fn available(&self) -> Result<u64> {
        Ok(self.length()?.saturating_sub(self.position()?))
    }

    /// Advance the cursor by up to `bytes`, stopping at the end of the data
    fn skip(&mut self, bytes: u64) -> Result<u64> {
        let skipped = bytes.min(self.available()?);
        let position = self.position()?;
        self.seek(position + skipped)?;
        Ok(skipped)
    }
}

/// Writable byte storage.
pub trait RandomAccessWrite: Closeable {
    /// Write a single byte at the cursor
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Write all of `buf` at the cursor
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Discard all content and reset the cursor
    fn clear(&mut self) -> Result<()>;
}

/// Storage that can be both read and written, the only surface the stream
/// layer depends on.
pub trait RandomAccess: RandomAccessRead + RandomAccessWrite {}

impl<T: RandomAccessRead + RandomAccessWrite + ?Sized> RandomAccess for T {}

impl<T: Closeable + ?Sized> Closeable for &mut T {
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

impl<T: RandomAccessRead + ?Sized> RandomAccessRead for &mut T {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn position(&self) -> Result<u64> {
        (**self).position()
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        (**self).seek(position)
    }

    fn length(&self) -> Result<u64> {
        (**self).length()
    }
}

impl<T: RandomAccessWrite + ?Sized> RandomAccessWrite for &mut T {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}
