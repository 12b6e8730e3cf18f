//! `std::io` adapters for random-access storage
//!
//! These let codecs and other `Read`/`Write` based code consume or produce
//! the content of any [`RandomAccessRead`] or [`RandomAccessWrite`].

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{RandomAccessRead, RandomAccessWrite};

/// Reads a [`RandomAccessRead`] through [`std::io::Read`]
#[derive(Debug)]
pub struct RandomAccessInputStream<R: RandomAccessRead> {
    inner: R,
}

impl<R: RandomAccessRead> RandomAccessInputStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: RandomAccessRead> Read for RandomAccessInputStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.inner.read(buf)?)
    }
}

impl<R: RandomAccessRead> Seek for RandomAccessInputStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let length = self.inner.length()? as i128;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(n) => length + n as i128,
            SeekFrom::Current(n) => self.inner.position()? as i128 + n as i128,
        };

        if target < 0 || target > length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek position out of bounds",
            ));
        }

        self.inner.seek(target as u64)?;
        Ok(target as u64)
    }
}

/// Writes into a [`RandomAccessWrite`] through [`std::io::Write`]
#[derive(Debug)]
pub struct RandomAccessOutputStream<W: RandomAccessWrite> {
    inner: W,
}

impl<W: RandomAccessWrite> RandomAccessOutputStream<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: RandomAccessWrite> Write for RandomAccessOutputStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Closeable, RandomAccessBuffer, ScratchFile};

    #[test]
    fn test_io_copy_through_adapters() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let data: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();

        let mut output = RandomAccessOutputStream::new(scratch.create_buffer().unwrap());
        io::copy(&mut &data[..], &mut output).unwrap();
        output.flush().unwrap();

        let mut buffer = output.into_inner();
        buffer.seek(0).unwrap();

        let mut input = RandomAccessInputStream::new(buffer);
        let mut copied = Vec::new();
        input.read_to_end(&mut copied).unwrap();
        assert_eq!(copied, data);
    }

    #[test]
    fn test_seek_adapter() {
        let mut input = RandomAccessInputStream::new(RandomAccessBuffer::from_bytes(b"0123456789"));
        assert_eq!(input.seek(SeekFrom::End(-2)).unwrap(), 8);
        let mut buf = [0u8; 2];
        input.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"89");

        assert_eq!(input.seek(SeekFrom::Current(-5)).unwrap(), 5);
        assert_eq!(input.seek(SeekFrom::Start(0)).unwrap(), 0);
        assert_eq!(
            input.seek(SeekFrom::Current(-1)).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        assert!(input.seek(SeekFrom::Start(11)).is_err());
    }

    #[test]
    fn test_closed_source_surfaces_as_io_error() {
        let mut buffer = RandomAccessBuffer::from_bytes(b"abc");
        buffer.close().unwrap();
        let mut input = RandomAccessInputStream::new(buffer);
        let mut out = Vec::new();
        let err = input.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
