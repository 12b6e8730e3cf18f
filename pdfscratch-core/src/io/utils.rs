//! Copy helpers between byte sources and random-access storage

use std::io::{ErrorKind, Read};

use super::{RandomAccessRead, RandomAccessWrite};
use crate::error::Result;

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Copy everything `input` yields into `output` at its cursor.
///
/// Returns the number of bytes copied.
pub fn copy_into<R, W>(input: &mut R, output: &mut W) -> Result<u64>
where
    R: Read + ?Sized,
    W: RandomAccessWrite + ?Sized,
{
    let mut chunk = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let count = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => count,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        output.write(&chunk[..count])?;
        total += count as u64;
    }
    Ok(total)
}

/// Read the whole content of `source` from offset 0.
///
/// The cursor is restored afterwards.
pub fn read_all<R: RandomAccessRead + ?Sized>(source: &mut R) -> Result<Vec<u8>> {
    let position = source.position()?;
    let length = source.length()?;

    source.seek(0)?;
    let mut content = vec![0u8; usize::try_from(length).unwrap_or(usize::MAX)];
    source.read_fully(&mut content)?;
    source.seek(position)?;
    Ok(content)
}

/// Copy the remaining content of `source` (from its cursor) into `target`
pub fn copy_random_access<R, W>(source: &mut R, target: &mut W) -> Result<u64>
where
    R: RandomAccessRead + ?Sized,
    W: RandomAccessWrite + ?Sized,
{
    let mut chunk = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let count = source.read(&mut chunk)?;
        if count == 0 {
            break;
        }
        target.write(&chunk[..count])?;
        total += count as u64;
    }
    Ok(total)
}
