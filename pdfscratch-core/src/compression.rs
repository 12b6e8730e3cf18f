//! Compression utilities for PDF streams

use std::io::{Read, Write};

use crate::error::{PdfError, Result};

/// Compress data using Flate/Zlib compression
#[cfg(feature = "compression")]
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = deflate_writer(Vec::new());
    encoder.write_all(data).map_err(PdfError::Io)?;
    encoder.finish().map_err(PdfError::Io)
}

/// Decompress data using Flate/Zlib decompression
#[cfg(feature = "compression")]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = inflate_reader(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PdfError::CompressionError(e.to_string()))?;
    Ok(decompressed)
}

/// Wrap `output` so everything written to it is Flate encoded
#[cfg(feature = "compression")]
pub fn deflate_writer<W: Write>(output: W) -> flate2::write::ZlibEncoder<W> {
    flate2::write::ZlibEncoder::new(output, flate2::Compression::default())
}

/// Wrap `input` so reading from it yields Flate decoded bytes
#[cfg(feature = "compression")]
pub fn inflate_reader<R: Read>(input: R) -> flate2::read::ZlibDecoder<R> {
    flate2::read::ZlibDecoder::new(input)
}

/// Stream `input` through a Flate encoder into `output`, returning the
/// number of uncompressed bytes consumed
#[cfg(feature = "compression")]
pub fn deflate_stream<R: Read + ?Sized, W: Write>(input: &mut R, output: W) -> Result<u64> {
    let mut encoder = deflate_writer(output);
    let consumed = std::io::copy(input, &mut encoder)
        .map_err(|e| PdfError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfError::CompressionError(e.to_string()))?;
    Ok(consumed)
}

#[cfg(not(feature = "compression"))]
pub fn deflate_stream<R: Read + ?Sized, W: Write>(_input: &mut R, _output: W) -> Result<u64> {
    Err(PdfError::CompressionError(
        "FlateDecode requires the compression feature".to_string(),
    ))
}
