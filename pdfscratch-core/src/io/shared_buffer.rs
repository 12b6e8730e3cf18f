//! Fixed-size byte pages moved between the scratch pool and its buffers

use std::fmt;

/// A fixed-capacity, zero-initialised byte page.
///
/// A page is owned either by its slot in the [`ScratchFile`](super::ScratchFile)
/// or by the single [`ScratchFileBuffer`](super::ScratchFileBuffer) that
/// checked it out. It is intentionally not `Clone`.
pub struct SharedByteBuffer {
    bytes: Box<[u8]>,
}

impl SharedByteBuffer {
    /// Allocate a zeroed page of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Page capacity in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Reset every byte to zero
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl fmt::Debug for SharedByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedByteBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AsRef<[u8]> for SharedByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsMut<[u8]> for SharedByteBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
