//! Seekable byte buffer assembled from scratch pool pages
//!
//! A [`ScratchFileBuffer`] keeps exactly one page of its content materialised
//! at a time. Crossing a page boundary writes the working page back to the
//! pool if it was modified and then loads (or allocates) the next one.

use std::mem;

use tracing::{trace, warn};

use super::scratch_file::ScratchFile;
use super::shared_buffer::SharedByteBuffer;
use super::{Closeable, RandomAccessRead, RandomAccessWrite};
use crate::error::{PdfError, Result};

/// Random-access buffer backed by pages of a [`ScratchFile`].
///
/// The buffer owns its pages exclusively until it is closed or dropped, at
/// which point they are returned to the pool's free list.
pub struct ScratchFileBuffer {
    page_handler: ScratchFile,
    page_size: usize,
    /// Pool page indices in logical order
    page_indices: Vec<usize>,
    /// High-water mark of written bytes
    size: u64,
    current_page_position_in_page_indices: usize,
    current_page_offset: u64,
    position_in_page: usize,
    current_page: SharedByteBuffer,
    current_page_content_changed: bool,
    closed: bool,
}

impl ScratchFileBuffer {
    pub(crate) fn new(page_handler: ScratchFile) -> Result<Self> {
        let page_size = page_handler.page_size();
        let mut buffer = Self {
            page_handler,
            page_size,
            page_indices: Vec::with_capacity(16),
            size: 0,
            current_page_position_in_page_indices: 0,
            current_page_offset: 0,
            position_in_page: 0,
            current_page: SharedByteBuffer::new(0),
            current_page_content_changed: false,
            closed: false,
        };
        if let Err(err) = buffer.add_page() {
            // Nothing is owned yet, so there is nothing to give back
            buffer.closed = true;
            return Err(err);
        }
        Ok(buffer)
    }

    /// Number of pool pages this buffer currently owns
    pub fn page_count(&self) -> usize {
        self.page_indices.len()
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            return Err(PdfError::Closed("ScratchFileBuffer"));
        }
        if self.current_page.len() != self.page_size {
            return Err(PdfError::UnexpectedEndOfData(
                "buffer lost its working page after a failed page operation".to_string(),
            ));
        }
        Ok(())
    }

    fn current_page_index(&self) -> Result<usize> {
        self.page_indices
            .get(self.current_page_position_in_page_indices)
            .copied()
            .ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!(
                    "page position {} is beyond the {} owned pages",
                    self.current_page_position_in_page_indices,
                    self.page_indices.len()
                ))
            })
    }

    fn add_page(&mut self) -> Result<()> {
        let index = self.page_handler.new_page()?;
        self.push_page(index);
        Ok(())
    }

    /// Append a freshly allocated page and make it the working page
    fn push_page(&mut self, index: usize) {
        self.page_indices.push(index);
        self.current_page_position_in_page_indices = self.page_indices.len() - 1;
        self.current_page_offset =
            self.current_page_position_in_page_indices as u64 * self.page_size as u64;
        self.current_page = SharedByteBuffer::new(self.page_size);
        self.current_page_content_changed = false;
        self.position_in_page = 0;
        trace!(index, pages = self.page_indices.len(), "added scratch page");
    }

    /// Give the working page back to the pool, writing it if it was modified
    fn unload_current_page(&mut self) -> Result<()> {
        let index = self.current_page_index()?;
        let page = mem::replace(&mut self.current_page, SharedByteBuffer::new(0));
        let changed = mem::take(&mut self.current_page_content_changed);
        self.page_handler.unload_page(index, page, changed)
    }

    fn load_page(&mut self, position_in_page_indices: usize) -> Result<()> {
        let index = *self
            .page_indices
            .get(position_in_page_indices)
            .ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!(
                    "page position {position_in_page_indices} is beyond the {} owned pages",
                    self.page_indices.len()
                ))
            })?;
        self.current_page = self.page_handler.read_page(index)?;
        self.current_page_position_in_page_indices = position_in_page_indices;
        self.current_page_offset = position_in_page_indices as u64 * self.page_size as u64;
        self.current_page_content_changed = false;
        trace!(index, position_in_page_indices, "loaded scratch page");
        Ok(())
    }

    /// Make sure the cursor points at an available byte of the working page.
    ///
    /// Returns `false` when the working page is exhausted, no later page
    /// exists and `add_new_page_if_needed` is not set.
    fn ensure_available_bytes_in_page(&mut self, add_new_page_if_needed: bool) -> Result<bool> {
        if self.position_in_page < self.page_size {
            return Ok(true);
        }

        let next = self.current_page_position_in_page_indices + 1;
        if next < self.page_indices.len() {
            self.unload_current_page()?;
            self.load_page(next)?;
            self.position_in_page = 0;
        } else if add_new_page_if_needed {
            // Allocate first so a quota failure leaves the working page intact
            let index = self.page_handler.new_page()?;
            if let Err(err) = self.unload_current_page() {
                self.page_handler.mark_pages_as_free(&[index])?;
                return Err(err);
            }
            self.push_page(index);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn cursor(&self) -> u64 {
        self.current_page_offset + self.position_in_page as u64
    }
}

impl Closeable for ScratchFileBuffer {
    /// Return every owned page to the pool. Idempotent, and a no-op when the
    /// pool itself was closed first.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let current = match self.current_page_index() {
            Ok(index) if self.current_page.len() == self.page_size => Some((
                index,
                mem::replace(&mut self.current_page, SharedByteBuffer::new(0)),
                self.current_page_content_changed,
            )),
            _ => None,
        };
        let indices = mem::take(&mut self.page_indices);
        self.size = 0;
        self.current_page_offset = 0;
        self.position_in_page = 0;
        self.current_page_content_changed = false;

        self.page_handler.release_pages(current, &indices)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RandomAccessRead for ScratchFileBuffer {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_closed()?;
        if self.cursor() >= self.size {
            return Ok(None);
        }
        if !self.ensure_available_bytes_in_page(false)? {
            return Err(PdfError::UnexpectedEndOfData(
                "no bytes available for read in scratch buffer".to_string(),
            ));
        }
        let byte = self.current_page.as_slice()[self.position_in_page];
        self.position_in_page += 1;
        Ok(Some(byte))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_closed()?;
        let cursor = self.cursor();
        if cursor >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let remaining = usize::try_from(self.size - cursor).unwrap_or(usize::MAX);
        let total = buf.len().min(remaining);
        let mut read = 0;
        while read < total {
            if !self.ensure_available_bytes_in_page(false)? {
                return Err(PdfError::UnexpectedEndOfData(
                    "no bytes available for read in scratch buffer".to_string(),
                ));
            }
            let count = (total - read).min(self.page_size - self.position_in_page);
            let start = self.position_in_page;
            buf[read..read + count]
                .copy_from_slice(&self.current_page.as_slice()[start..start + count]);
            self.position_in_page += count;
            read += count;
        }
        Ok(read)
    }

    fn position(&self) -> Result<u64> {
        if self.closed {
            return Err(PdfError::Closed("ScratchFileBuffer"));
        }
        Ok(self.cursor())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.check_closed()?;
        if position > self.size {
            return Err(PdfError::InvalidSeek {
                position,
                length: self.size,
            });
        }

        let page_size = self.page_size as u64;
        if position >= self.current_page_offset && position <= self.current_page_offset + page_size
        {
            self.position_in_page = (position - self.current_page_offset) as usize;
            return Ok(());
        }

        let mut target = usize::try_from(position / page_size).unwrap_or(usize::MAX);
        // The end of a buffer filled to a page boundary belongs to its last page
        if target == self.page_indices.len() && target > 0 && position % page_size == 0 {
            target -= 1;
        }

        self.unload_current_page()?;
        self.load_page(target)?;
        self.position_in_page = (position - self.current_page_offset) as usize;
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        if self.closed {
            return Err(PdfError::Closed("ScratchFileBuffer"));
        }
        Ok(self.size)
    }
}

impl RandomAccessWrite for ScratchFileBuffer {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.check_closed()?;
        self.ensure_available_bytes_in_page(true)?;
        self.current_page.as_mut_slice()[self.position_in_page] = byte;
        self.position_in_page += 1;
        self.current_page_content_changed = true;
        self.size = self.size.max(self.cursor());
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_closed()?;
        let mut written = 0;
        while written < buf.len() {
            self.ensure_available_bytes_in_page(true)?;
            let count = (buf.len() - written).min(self.page_size - self.position_in_page);
            let start = self.position_in_page;
            self.current_page.as_mut_slice()[start..start + count]
                .copy_from_slice(&buf[written..written + count]);
            self.position_in_page += count;
            self.current_page_content_changed = true;
            written += count;
            // Keep what was copied so far readable if the next page fault fails
            self.size = self.size.max(self.cursor());
        }
        Ok(())
    }

    /// Drop all content, keeping only the first page
    fn clear(&mut self) -> Result<()> {
        self.check_closed()?;

        let released = self.page_indices.split_off(1);
        if self.current_page_position_in_page_indices > 0 {
            // The working page is being freed, its content is irrelevant
            self.current_page = SharedByteBuffer::new(0);
            self.page_handler.mark_pages_as_free(&released)?;
            self.load_page(0)?;
        } else {
            self.page_handler.mark_pages_as_free(&released)?;
        }

        self.current_page_position_in_page_indices = 0;
        self.current_page_offset = 0;
        self.position_in_page = 0;
        self.size = 0;
        self.current_page_content_changed = false;
        Ok(())
    }
}

impl Drop for ScratchFileBuffer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to release scratch buffer pages");
        }
    }
}

impl std::fmt::Debug for ScratchFileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchFileBuffer")
            .field("size", &self.size)
            .field("position", &self.cursor())
            .field("pages", &self.page_indices)
            .field("closed", &self.closed)
            .finish()
    }
}
