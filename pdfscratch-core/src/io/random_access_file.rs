//! Random access over a file on disk
//!
//! Used directly for reading PDF files and as the page store behind the
//! scratch pool's temporary file.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{Closeable, RandomAccessRead, RandomAccessWrite};
use crate::error::{PdfError, Result};

/// A [`File`] exposed through the random-access traits
#[derive(Debug)]
pub struct RandomAccessFile {
    file: Option<File>,
    position: u64,
    writable: bool,
}

impl RandomAccessFile {
    /// Open an existing file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_file(file, false))
    }

    /// Create (or truncate) a file for reading and writing
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_file(file, true))
    }

    /// Wrap an already opened file, positioned at its start
    pub fn from_file(file: File, writable: bool) -> Self {
        Self {
            file: Some(file),
            position: 0,
            writable,
        }
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(PdfError::Closed("RandomAccessFile"))
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(PdfError::Closed("RandomAccessFile"))
    }

    fn writable_file(&mut self) -> Result<&mut File> {
        if !self.writable && self.file.is_some() {
            return Err(PdfError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "file was opened read-only",
            )));
        }
        self.file_mut()
    }

    /// Fill `buf` from `offset` without checking the file length first.
    ///
    /// Callers must know the range lies inside the file; reading past the
    /// end fails with an `UnexpectedEof` I/O error.
    pub(crate) fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        self.position = offset + buf.len() as u64;
        Ok(())
    }

    /// Write all of `buf` at `offset` without checking the file length first
    pub(crate) fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let file = self.writable_file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        self.position = offset + buf.len() as u64;
        Ok(())
    }

    /// Grow or truncate the file. The cursor is clamped to the new length.
    pub fn set_length(&mut self, length: u64) -> Result<()> {
        self.writable_file()?.set_len(length)?;
        if self.position > length {
            self.seek(length)?;
        }
        Ok(())
    }
}

impl Closeable for RandomAccessFile {
    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.writable {
                file.flush()?;
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl RandomAccessRead for RandomAccessFile {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file_mut()?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    fn position(&self) -> Result<u64> {
        self.file()?;
        Ok(self.position)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let length = self.length()?;
        if position > length {
            return Err(PdfError::InvalidSeek { position, length });
        }
        self.file_mut()?.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }
}

impl RandomAccessWrite for RandomAccessFile {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.writable_file()?.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.set_length(0)
    }
}
