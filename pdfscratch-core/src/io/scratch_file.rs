//! Page pool shared by all scratch buffers of a document
//!
//! A [`ScratchFile`] hands out fixed-size pages to [`ScratchFileBuffer`]s.
//! Pages below the main-memory quota are kept in an in-memory slot array;
//! pages above it live in a temporary file that is created lazily the first
//! time a page has to spill. Freed pages go to a free list and are always
//! reused before the pool grows.
//!
//! Recycled pages are not zeroed. A buffer only ever reads below its own
//! high-water mark, but the backing bytes of a reused page may still hold
//! whatever the previous owner wrote.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::TempPath;
use tracing::{debug, warn};

use super::memory_usage::MemoryUsageSetting;
use super::random_access_file::RandomAccessFile;
use super::scratch_buffer::ScratchFileBuffer;
use super::shared_buffer::SharedByteBuffer;
use super::{Closeable, RandomAccessRead};
use crate::error::{PdfError, Result};

/// Size of a single scratch page in bytes
pub const PAGE_SIZE: usize = 4096;

/// Number of pages added to the pool whenever the free list runs dry
pub const ENLARGE_PAGE_COUNT: usize = 16;

const TEMP_FILE_PREFIX: &str = "pdfscratch";
const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Snapshot of the pool's page accounting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScratchFileStats {
    /// Size of every page in bytes
    pub page_size: usize,
    /// Highest allocated page index + 1
    pub page_count: usize,
    /// Pages minted but currently unowned
    pub free_pages: usize,
    /// Pages owned by a buffer and stored in main memory
    pub in_memory_pages: usize,
    /// Pages owned by a buffer and stored in the temporary file
    pub file_pages: usize,
    /// Page index from which on pages live in the temporary file,
    /// `None` when main memory is unrestricted
    pub in_memory_page_limit: Option<usize>,
    /// Current length of the temporary file in bytes
    pub file_len: u64,
}

/// Temporary file holding the pages above the memory quota.
struct PageFile {
    file: RandomAccessFile,
    path: TempPath,
}

impl PageFile {
    fn create(dir: &Path) -> Result<Self> {
        let named = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(TEMP_FILE_SUFFIX)
            .tempfile_in(dir)?;
        let (file, path) = named.into_parts();
        debug!(path = %path.display(), "created scratch file");

        Ok(Self {
            file: RandomAccessFile::from_file(file, true),
            path,
        })
    }

    // Offsets are page aligned and inside the length checked by `enlarge`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.write_all_at(offset, buf)
    }

    fn close(mut self) -> Result<()> {
        self.file.close()?;
        let path = self.path.to_path_buf();
        self.path.close()?;
        debug!(path = %path.display(), "deleted scratch file");
        Ok(())
    }
}

struct ScratchFileInner {
    setting: MemoryUsageSetting,
    page_size: usize,
    /// Hard limit on minted pages, memory and disk combined
    max_page_count: usize,
    /// Pages with an index below this live in `in_memory_pages`
    in_memory_max_page_count: usize,
    use_scratch_file: bool,
    /// `None` marks a slot whose page is checked out or was never written
    in_memory_pages: Vec<Option<SharedByteBuffer>>,
    file_page_count: usize,
    free_pages: BTreeSet<usize>,
    page_count: usize,
    file: Option<PageFile>,
    closed: bool,
}

impl ScratchFileInner {
    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(PdfError::Closed("ScratchFile"))
        } else {
            Ok(())
        }
    }

    fn minted_pages(&self) -> usize {
        self.in_memory_pages.len() + self.file_page_count
    }

    fn new_page(&mut self) -> Result<usize> {
        self.check_closed()?;

        if self.free_pages.is_empty() {
            self.enlarge()?;
        }

        let index = self
            .free_pages
            .pop_first()
            .ok_or(PdfError::QuotaExceeded {
                max_pages: self.max_page_count,
                page_size: self.page_size,
            })?;

        if index >= self.page_count {
            self.page_count = index + 1;
        }
        Ok(index)
    }

    fn enlarge(&mut self) -> Result<()> {
        let minted = self.minted_pages();
        if minted >= self.max_page_count {
            return Ok(());
        }
        let remaining = self.max_page_count - minted;

        if self.in_memory_pages.len() < self.in_memory_max_page_count {
            let start = self.in_memory_pages.len();
            let count = ENLARGE_PAGE_COUNT
                .min(remaining)
                .min(self.in_memory_max_page_count - start);
            self.in_memory_pages.resize_with(start + count, || None);
            self.free_pages.extend(start..start + count);
            debug!(start, count, "enlarged in-memory scratch pages");
        } else if self.use_scratch_file {
            let start = self.in_memory_max_page_count + self.file_page_count;
            let count = ENLARGE_PAGE_COUNT.min(remaining);
            let expected_len = (self.file_page_count * self.page_size) as u64;
            let new_len = ((self.file_page_count + count) * self.page_size) as u64;

            if self.file.is_none() {
                let dir = self.setting.temp_dir().ok_or_else(|| {
                    PdfError::BackingStoreUnavailable(
                        "no temporary directory configured".to_string(),
                    )
                })?;
                self.file = Some(PageFile::create(dir)?);
            }
            let file = self.file.as_mut().ok_or_else(|| {
                PdfError::BackingStoreUnavailable("scratch file was not created".to_string())
            })?;

            let actual_len = file.file.length()?;
            if actual_len != expected_len {
                return Err(PdfError::UnexpectedEndOfData(format!(
                    "expected scratch file size of {expected_len} but found {actual_len}"
                )));
            }
            file.file.set_length(new_len)?;

            self.file_page_count += count;
            self.free_pages.extend(start..start + count);
            debug!(start, count, file_len = new_len, "enlarged scratch file");
        }

        Ok(())
    }

    fn file_offset(&self, index: usize) -> u64 {
        ((index - self.in_memory_max_page_count) * self.page_size) as u64
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.page_count {
            return Err(PdfError::UnexpectedEndOfData(format!(
                "page index {index} is beyond the page count {}",
                self.page_count
            )));
        }
        Ok(())
    }

    fn read_page(&mut self, index: usize) -> Result<SharedByteBuffer> {
        self.check_closed()?;
        self.check_index(index)?;

        if index < self.in_memory_max_page_count {
            let page_size = self.page_size;
            let slot = self.in_memory_pages.get_mut(index).ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!("in-memory page {index} was never minted"))
            })?;
            Ok(slot
                .take()
                .unwrap_or_else(|| SharedByteBuffer::new(page_size)))
        } else {
            let offset = self.file_offset(index);
            let mut page = SharedByteBuffer::new(self.page_size);
            let file = self.file.as_mut().ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!(
                    "page {index} should be on disk but no scratch file exists"
                ))
            })?;
            file.read_at(offset, page.as_mut_slice())?;
            Ok(page)
        }
    }

    fn write_page(&mut self, index: usize, page: SharedByteBuffer) -> Result<()> {
        self.check_closed()?;
        self.check_index(index)?;
        if page.len() != self.page_size {
            return Err(PdfError::UnexpectedEndOfData(format!(
                "page {index} has {} bytes, expected {}",
                page.len(),
                self.page_size
            )));
        }

        if index < self.in_memory_max_page_count {
            let slot = self.in_memory_pages.get_mut(index).ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!("in-memory page {index} was never minted"))
            })?;
            *slot = Some(page);
            Ok(())
        } else {
            let offset = self.file_offset(index);
            let file = self.file.as_mut().ok_or_else(|| {
                PdfError::UnexpectedEndOfData(format!(
                    "page {index} should be on disk but no scratch file exists"
                ))
            })?;
            file.write_at(offset, page.as_slice())
        }
    }

    fn unload_page(&mut self, index: usize, page: SharedByteBuffer, changed: bool) -> Result<()> {
        // In-memory pages are checked out, so they go back to their slot
        // even when clean; clean disk pages can simply be dropped.
        if changed || index < self.in_memory_max_page_count {
            self.write_page(index, page)
        } else {
            self.check_closed()
        }
    }

    fn mark_pages_as_free(&mut self, indices: &[usize]) -> Result<()> {
        self.check_closed()?;
        for &index in indices {
            if index >= self.page_count {
                warn!(index, page_count = self.page_count, "ignoring free of unknown page");
            } else if !self.free_pages.insert(index) {
                warn!(index, "ignoring double free of scratch page");
            }
        }
        Ok(())
    }

    fn stats(&self) -> ScratchFileStats {
        let owned = |range: std::ops::Range<usize>| {
            let len = range.len();
            len - self.free_pages.range(range).count()
        };
        let memory_end = self.page_count.min(self.in_memory_max_page_count);

        ScratchFileStats {
            page_size: self.page_size,
            page_count: self.page_count,
            free_pages: self.free_pages.len(),
            in_memory_pages: owned(0..memory_end),
            file_pages: owned(memory_end..self.page_count),
            in_memory_page_limit: (self.in_memory_max_page_count != usize::MAX)
                .then_some(self.in_memory_max_page_count),
            file_len: self
                .file
                .as_ref()
                .and_then(|file| file.file.length().ok())
                .unwrap_or(0),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.in_memory_pages = Vec::new();
        self.free_pages.clear();
        debug!(page_count = self.page_count, "closing scratch file");

        match self.file.take() {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }
}

/// Handle to a shared scratch page pool.
///
/// Cloning the handle shares the pool. All page operations take the pool's
/// lock, so buffers created from the same pool may be used from different
/// threads, but every single buffer must be driven by one thread at a time.
#[derive(Clone)]
pub struct ScratchFile {
    inner: Arc<Mutex<ScratchFileInner>>,
}

impl ScratchFile {
    /// Create a pool following the given memory policy.
    ///
    /// Fails with [`PdfError::BackingStoreUnavailable`] when the policy may
    /// spill to disk but its temporary directory does not exist.
    pub fn new(setting: MemoryUsageSetting) -> Result<Self> {
        let max_main_memory_is_restricted =
            !setting.use_main_memory() || setting.is_main_memory_restricted();
        let use_scratch_file = max_main_memory_is_restricted && setting.use_temp_file();

        if use_scratch_file {
            if let Some(dir) = setting.temp_dir() {
                if !dir.is_dir() {
                    return Err(PdfError::BackingStoreUnavailable(format!(
                        "scratch file directory does not exist: {}",
                        dir.display()
                    )));
                }
            }
        }

        let page_size = PAGE_SIZE;
        let pages_for = |bytes: u64| usize::try_from(bytes / page_size as u64).unwrap_or(usize::MAX);

        let max_page_count = setting.max_storage_bytes().map_or(usize::MAX, pages_for);
        let in_memory_max_page_count = if !setting.use_main_memory() {
            0
        } else {
            setting.max_main_memory_bytes().map_or(usize::MAX, pages_for)
        };

        debug!(%setting, max_page_count, in_memory_max_page_count, "creating scratch file");

        Ok(Self {
            inner: Arc::new(Mutex::new(ScratchFileInner {
                setting,
                page_size,
                max_page_count,
                in_memory_max_page_count,
                use_scratch_file,
                in_memory_pages: Vec::new(),
                file_page_count: 0,
                free_pages: BTreeSet::new(),
                page_count: 0,
                file: None,
                closed: false,
            })),
        })
    }

    /// Create a pool that keeps every page in main memory without limit
    pub fn main_memory_only() -> Result<Self> {
        Self::new(MemoryUsageSetting::main_memory_only(None))
    }

    fn lock(&self) -> MutexGuard<'_, ScratchFileInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Size of every page handed out by this pool
    pub fn page_size(&self) -> usize {
        self.lock().page_size
    }

    /// The memory policy this pool was created with
    pub fn setting(&self) -> MemoryUsageSetting {
        self.lock().setting.clone()
    }

    /// Allocate a page, reusing a freed one if available.
    ///
    /// Fails with [`PdfError::QuotaExceeded`] once the storage limit is
    /// reached.
    pub fn new_page(&self) -> Result<usize> {
        self.lock().new_page()
    }

    /// Check out the content of page `index`.
    ///
    /// In-memory pages leave their slot until they are handed back with
    /// [`ScratchFile::write_page`].
    pub fn read_page(&self, index: usize) -> Result<SharedByteBuffer> {
        self.lock().read_page(index)
    }

    /// Store `page` as the content of page `index`, taking ownership of it
    pub fn write_page(&self, index: usize, page: SharedByteBuffer) -> Result<()> {
        self.lock().write_page(index, page)
    }

    /// Hand a checked-out page back to the pool, writing it only if needed
    pub(crate) fn unload_page(
        &self,
        index: usize,
        page: SharedByteBuffer,
        changed: bool,
    ) -> Result<()> {
        self.lock().unload_page(index, page, changed)
    }

    /// Give a buffer's pages back in one step: unload its working page and
    /// free all indices. A closed pool has nothing left to release.
    pub(crate) fn release_pages(
        &self,
        current: Option<(usize, SharedByteBuffer, bool)>,
        indices: &[usize],
    ) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        let unloaded = match current {
            Some((index, page, changed)) => inner.unload_page(index, page, changed),
            None => Ok(()),
        };
        let freed = inner.mark_pages_as_free(indices);
        unloaded.and(freed)
    }

    /// Return pages to the free list. Their content is left untouched.
    pub fn mark_pages_as_free(&self, indices: &[usize]) -> Result<()> {
        self.lock().mark_pages_as_free(indices)
    }

    /// Create an empty buffer backed by this pool
    pub fn create_buffer(&self) -> Result<ScratchFileBuffer> {
        ScratchFileBuffer::new(self.clone())
    }

    /// Create a buffer holding everything `input` yields, positioned at 0
    pub fn create_buffer_from<R: Read>(&self, mut input: R) -> Result<ScratchFileBuffer> {
        let mut buffer = self.create_buffer()?;
        super::utils::copy_into(&mut input, &mut buffer)?;
        buffer.seek(0)?;
        Ok(buffer)
    }

    /// Current page accounting
    pub fn stats(&self) -> ScratchFileStats {
        self.lock().stats()
    }

    /// Location of the temporary file, if one has been created
    pub fn file_path(&self) -> Option<PathBuf> {
        self.lock()
            .file
            .as_ref()
            .map(|file| file.path.to_path_buf())
    }

    /// Release all pages and delete the temporary file. Idempotent.
    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl std::fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchFile")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_page_reuses_lowest_free_index() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let a = scratch.new_page().unwrap();
        let b = scratch.new_page().unwrap();
        let c = scratch.new_page().unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        scratch.mark_pages_as_free(&[b, a]).unwrap();
        assert_eq!(scratch.new_page().unwrap(), 0);
        assert_eq!(scratch.new_page().unwrap(), 1);
        assert_eq!(scratch.stats().page_count, 3);
    }

    #[test]
    fn test_pool_grows_in_batches() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        scratch.new_page().unwrap();

        let stats = scratch.stats();
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.free_pages, ENLARGE_PAGE_COUNT - 1);
        assert_eq!(stats.in_memory_page_limit, None);
    }

    #[test]
    fn test_memory_quota() {
        let setting = MemoryUsageSetting::main_memory_only(Some(2 * PAGE_SIZE as u64));
        let scratch = ScratchFile::new(setting).unwrap();

        scratch.new_page().unwrap();
        scratch.new_page().unwrap();
        match scratch.new_page() {
            Err(PdfError::QuotaExceeded { max_pages, .. }) => assert_eq!(max_pages, 2),
            other => panic!("expected quota error, got {:?}", other),
        }
    }

    #[test]
    fn test_in_memory_page_checkout() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let index = scratch.new_page().unwrap();

        let mut page = scratch.read_page(index).unwrap();
        assert!(page.as_slice().iter().all(|&b| b == 0));
        page.as_mut_slice()[..4].copy_from_slice(b"PDF!");
        scratch.write_page(index, page).unwrap();

        let page = scratch.read_page(index).unwrap();
        assert_eq!(&page.as_slice()[..4], b"PDF!");
    }

    #[test]
    fn test_disk_page_round_trip() {
        let dir = tempdir().unwrap();
        let scratch =
            ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), None)).unwrap();
        assert!(scratch.file_path().is_none());

        let index = scratch.new_page().unwrap();
        let path = scratch.file_path().expect("scratch file created lazily");
        assert!(path.exists());
        assert_eq!(scratch.stats().file_len, (ENLARGE_PAGE_COUNT * PAGE_SIZE) as u64);

        let mut page = SharedByteBuffer::new(PAGE_SIZE);
        page.as_mut_slice()[PAGE_SIZE - 3..].copy_from_slice(b"EOF");
        scratch.write_page(index, page).unwrap();

        let page = scratch.read_page(index).unwrap();
        assert_eq!(&page.as_slice()[PAGE_SIZE - 3..], b"EOF");

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_stats_serde_round_trip() {
        let dir = tempdir().unwrap();
        let setting = MemoryUsageSetting::mixed(dir.path(), Some(PAGE_SIZE as u64), None);
        let scratch = ScratchFile::new(setting).unwrap();
        scratch.new_page().unwrap();
        scratch.new_page().unwrap();

        let stats = scratch.stats();
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["in_memory_pages"], 1);
        assert_eq!(value["file_pages"], 1);
        assert_eq!(value["in_memory_page_limit"], 1);

        let restored: ScratchFileStats = serde_json::from_value(value).unwrap();
        pretty_assertions::assert_eq!(restored, stats);
    }

    #[test]
    fn test_write_page_rejects_wrong_size() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let index = scratch.new_page().unwrap();
        assert!(matches!(
            scratch.write_page(index, SharedByteBuffer::new(10)),
            Err(PdfError::UnexpectedEndOfData(_))
        ));
    }

    #[test]
    fn test_read_unknown_page() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        assert!(matches!(
            scratch.read_page(5),
            Err(PdfError::UnexpectedEndOfData(_))
        ));
    }

    #[test]
    fn test_missing_temp_dir() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = ScratchFile::new(MemoryUsageSetting::temp_file_only(missing, None));
        assert!(matches!(result, Err(PdfError::BackingStoreUnavailable(_))));
    }

    #[test]
    fn test_double_free_is_ignored() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let index = scratch.new_page().unwrap();
        scratch.mark_pages_as_free(&[index]).unwrap();
        scratch.mark_pages_as_free(&[index, 99]).unwrap();
        assert_eq!(scratch.stats().free_pages, ENLARGE_PAGE_COUNT);
    }

    #[test]
    fn test_operations_after_close() {
        let scratch = ScratchFile::main_memory_only().unwrap();
        let index = scratch.new_page().unwrap();
        scratch.close().unwrap();
        scratch.close().unwrap();

        assert!(scratch.is_closed());
        assert!(matches!(scratch.new_page(), Err(PdfError::Closed(_))));
        assert!(matches!(scratch.read_page(index), Err(PdfError::Closed(_))));
        assert!(matches!(
            scratch.mark_pages_as_free(&[index]),
            Err(PdfError::Closed(_))
        ));
        assert!(matches!(scratch.create_buffer(), Err(PdfError::Closed(_))));
    }
}
