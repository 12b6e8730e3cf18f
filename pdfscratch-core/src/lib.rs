//! # pdfscratch
//!
//! Scratch storage for PDF stream contents. Streams of any size are buffered
//! in bounded main memory, in a temporary file, or in a mix of both, while
//! callers only ever see a seekable random-access buffer.
//!
//! ## Features
//!
//! - **Page pool**: [`ScratchFile`] allocates, recycles and spills fixed-size pages
//! - **Paged buffers**: [`ScratchFileBuffer`] reads, writes and seeks across pages
//! - **Memory policy**: [`MemoryUsageSetting`] bounds memory and disk usage
//! - **Stream bodies**: [`ScratchStream`] stores Flate encoded stream data in scratch pages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscratch::{
//!     Closeable, MemoryUsageSetting, RandomAccessRead, RandomAccessWrite, Result, ScratchFile,
//! };
//!
//! # fn main() -> Result<()> {
//! // Up to 1 MiB in memory, everything beyond that in a temp file
//! let setting = MemoryUsageSetting::mixed(std::env::temp_dir(), Some(1024 * 1024), None);
//! let scratch = ScratchFile::new(setting)?;
//!
//! let mut buffer = scratch.create_buffer()?;
//! for _ in 0..1024 {
//!     buffer.write(&[0x42; 4096])?;
//! }
//! println!("buffered {} bytes", buffer.length()?);
//! println!("{:?}", scratch.stats());
//!
//! buffer.seek(0)?;
//! assert_eq!(buffer.read_byte()?, Some(0x42));
//!
//! buffer.close()?;
//! scratch.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`io`] - Random-access traits, the scratch pool and its buffers
//! - [`stream`] - Stream bodies buffered in scratch pages
//! - [`compression`] - Flate helpers used by stream filters
//! - [`error`] - Error type shared by all modules

pub mod compression;
pub mod error;
pub mod io;
pub mod stream;

pub use error::{PdfError, Result};
pub use io::{
    Closeable, MemoryUsageSetting, RandomAccess, RandomAccessBuffer, RandomAccessFile,
    RandomAccessInputStream, RandomAccessOutputStream, RandomAccessRead, RandomAccessWrite,
    ScratchFile, ScratchFileBuffer, ScratchFileStats, SharedByteBuffer,
};
pub use stream::{ScratchStream, StreamFilter};

/// Current version of pdfscratch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
