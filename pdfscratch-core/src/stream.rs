//! PDF stream bodies buffered in scratch storage
//!
//! A [`ScratchStream`] holds the encoded bytes of a stream object (what sits
//! between `stream` and `endstream`) in a [`ScratchFileBuffer`], so large
//! image or content streams never have to be held in a single `Vec`.

use std::fmt;
use std::io::Read;

use crate::error::{PdfError, Result};
use crate::io::{
    utils, Closeable, RandomAccessInputStream, RandomAccessOutputStream, RandomAccessRead,
    RandomAccessWrite, ScratchFile, ScratchFileBuffer,
};

/// Filter applied to the stream data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFilter {
    /// Data is stored as is
    #[default]
    None,
    /// Zlib/deflate compression
    FlateDecode,
}

impl StreamFilter {
    /// Value of the stream dictionary's `/Filter` entry
    pub fn pdf_name(&self) -> Option<&'static str> {
        match self {
            StreamFilter::None => None,
            StreamFilter::FlateDecode => Some("FlateDecode"),
        }
    }
}

impl fmt::Display for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pdf_name().unwrap_or("None"))
    }
}

/// Encoded stream data backed by a scratch buffer
#[derive(Debug)]
pub struct ScratchStream {
    buffer: ScratchFileBuffer,
    filter: StreamFilter,
}

impl ScratchStream {
    /// Create an unfiltered stream in `scratch`
    pub fn new(scratch: &ScratchFile) -> Result<Self> {
        Self::with_filter(scratch, StreamFilter::None)
    }

    pub fn with_filter(scratch: &ScratchFile, filter: StreamFilter) -> Result<Self> {
        Ok(Self {
            buffer: scratch.create_buffer()?,
            filter,
        })
    }

    pub fn filter(&self) -> StreamFilter {
        self.filter
    }

    /// Replace the stream data with `input`, encoded through the filter.
    ///
    /// Returns the number of decoded bytes consumed.
    pub fn write_encoded<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<u64> {
        self.buffer.clear()?;
        match self.filter {
            StreamFilter::None => utils::copy_into(input, &mut self.buffer),
            StreamFilter::FlateDecode => crate::compression::deflate_stream(
                input,
                RandomAccessOutputStream::new(&mut self.buffer),
            ),
        }
    }

    /// Replace the stream data with bytes that are already encoded
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.clear()?;
        self.buffer.write(bytes)
    }

    /// Length of the encoded data, the stream dictionary's `/Length`
    pub fn raw_length(&self) -> Result<u64> {
        self.buffer.length()
    }

    /// The encoded data
    pub fn read_raw(&mut self) -> Result<Vec<u8>> {
        utils::read_all(&mut self.buffer)
    }

    /// A reader over the decoded data, starting at its beginning
    pub fn decoded_reader(&mut self) -> Result<Box<dyn Read + '_>> {
        self.buffer.seek(0)?;
        let raw = RandomAccessInputStream::new(&mut self.buffer);
        match self.filter {
            StreamFilter::None => Ok(Box::new(raw)),
            #[cfg(feature = "compression")]
            StreamFilter::FlateDecode => Ok(Box::new(crate::compression::inflate_reader(raw))),
            #[cfg(not(feature = "compression"))]
            StreamFilter::FlateDecode => Err(PdfError::CompressionError(
                "FlateDecode requires the compression feature".to_string(),
            )),
        }
    }

    /// The decoded data as a single vector
    pub fn decode_to_vec(&mut self) -> Result<Vec<u8>> {
        let filter = self.filter;
        let mut decoded = Vec::new();
        self.decoded_reader()?
            .read_to_end(&mut decoded)
            .map_err(|e| match filter {
                StreamFilter::None => PdfError::Io(e),
                StreamFilter::FlateDecode => PdfError::CompressionError(e.to_string()),
            })?;
        Ok(decoded)
    }

    /// Release the stream's scratch pages
    pub fn close(&mut self) -> Result<()> {
        self.buffer.close()
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }
}
