//! Integration tests for the scratch page pool and its buffers
//!
//! Covers round trips through memory and disk, page reuse, quota
//! enforcement, spilling, write-back across page switches, close semantics
//! and isolation between buffers.

use pdfscratch::io::{ENLARGE_PAGE_COUNT, PAGE_SIZE};
use pdfscratch::{
    Closeable, MemoryUsageSetting, PdfError, RandomAccessRead, RandomAccessWrite, ScratchFile,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use tempfile::tempdir;

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i % 253) as u8).wrapping_add(seed))
        .collect()
}

fn round_trip(scratch: &ScratchFile) {
    let data = pattern(PAGE_SIZE * 7 / 2, 3);
    let mut buffer = scratch.create_buffer().unwrap();

    buffer.write(&data).unwrap();
    assert_eq!(buffer.length().unwrap(), data.len() as u64);

    buffer.seek(0).unwrap();
    let mut out = vec![0u8; data.len()];
    buffer.read_fully(&mut out).unwrap();
    assert_eq!(out, data);
    assert!(buffer.is_eof().unwrap());
}

#[test]
fn test_round_trip_memory_only() {
    let scratch = ScratchFile::new(MemoryUsageSetting::main_memory_only(None)).unwrap();
    round_trip(&scratch);
    assert!(scratch.file_path().is_none());
}

#[test]
fn test_round_trip_disk_only() {
    let dir = tempdir().unwrap();
    let scratch =
        ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), None)).unwrap();
    round_trip(&scratch);

    let stats = scratch.stats();
    assert_eq!(stats.in_memory_pages, 0);
    assert!(scratch.file_path().is_some());
}

#[test]
fn test_freed_pages_are_reused_before_growing() {
    let dir = tempdir().unwrap();
    let scratch = ScratchFile::new(MemoryUsageSetting::mixed(
        dir.path(),
        Some(PAGE_SIZE as u64 * 2),
        None,
    ))
    .unwrap();

    let mut first = scratch.create_buffer().unwrap();
    let mut second = scratch.create_buffer().unwrap();
    first.write(&pattern(PAGE_SIZE * 3, 1)).unwrap();
    second.write(&pattern(PAGE_SIZE * 2, 2)).unwrap();
    let grown = scratch.stats();
    assert_eq!(grown.page_count, 5);

    first.close().unwrap();
    second.close().unwrap();

    let mut third = scratch.create_buffer().unwrap();
    third.write(&pattern(PAGE_SIZE * 5, 3)).unwrap();

    let reused = scratch.stats();
    assert_eq!(reused.page_count, grown.page_count);
    assert_eq!(reused.file_len, grown.file_len);
}

#[test]
fn test_quota_enforced_on_disk() {
    let dir = tempdir().unwrap();
    let quota = PAGE_SIZE as u64 * 2;
    let scratch =
        ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), Some(quota))).unwrap();

    let mut buffer = scratch.create_buffer().unwrap();
    buffer.write(&pattern(PAGE_SIZE * 2, 0)).unwrap();
    assert_eq!(buffer.length().unwrap(), quota);

    match buffer.write(b"!") {
        Err(PdfError::QuotaExceeded {
            max_pages,
            page_size,
        }) => {
            assert_eq!(max_pages, 2);
            assert_eq!(page_size, PAGE_SIZE);
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }

    // The file never grows beyond the quota
    assert_eq!(scratch.stats().file_len, quota);
}

#[test]
fn test_quota_enforced_in_memory() {
    let scratch =
        ScratchFile::new(MemoryUsageSetting::main_memory_only(Some(PAGE_SIZE as u64 * 2)))
            .unwrap();
    let mut buffer = scratch.create_buffer().unwrap();
    assert!(matches!(
        buffer.write(&pattern(PAGE_SIZE * 2 + 1, 0)),
        Err(PdfError::QuotaExceeded { .. })
    ));
}

#[test]
fn test_mixed_spill() {
    let dir = tempdir().unwrap();
    let scratch = ScratchFile::new(MemoryUsageSetting::mixed(
        dir.path(),
        Some(PAGE_SIZE as u64),
        None,
    ))
    .unwrap();

    let mut buffer = scratch.create_buffer().unwrap();
    let data = pattern(PAGE_SIZE * 3, 9);
    buffer.write(&data).unwrap();

    let stats = scratch.stats();
    assert_eq!(stats.in_memory_page_limit, Some(1));
    assert_eq!(stats.in_memory_pages, 1);
    assert_eq!(stats.file_pages, 2);
    assert_eq!(stats.page_count, 3);
    assert_eq!(stats.file_len, (ENLARGE_PAGE_COUNT * PAGE_SIZE) as u64);

    buffer.seek(0).unwrap();
    let mut out = vec![0u8; data.len()];
    buffer.read_fully(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_seek_across_boundary_writes_back() {
    let dir = tempdir().unwrap();
    let settings = [
        MemoryUsageSetting::main_memory_only(None),
        MemoryUsageSetting::temp_file_only(dir.path(), None),
        MemoryUsageSetting::mixed(dir.path(), Some(PAGE_SIZE as u64), None),
    ];

    for setting in settings {
        let scratch = ScratchFile::new(setting).unwrap();
        let mut buffer = scratch.create_buffer().unwrap();
        let mut expected = pattern(PAGE_SIZE * 5 / 2, 5);
        buffer.write(&expected).unwrap();

        buffer.seek(100).unwrap();
        buffer.write_byte(0xEE).unwrap();
        expected[100] = 0xEE;

        buffer.seek(PAGE_SIZE as u64 * 2 + 10).unwrap();
        buffer.write_byte(0xDD).unwrap();
        expected[PAGE_SIZE * 2 + 10] = 0xDD;

        buffer.seek(100).unwrap();
        assert_eq!(buffer.read_byte().unwrap(), Some(0xEE));

        buffer.seek(0).unwrap();
        let mut out = vec![0u8; expected.len()];
        buffer.read_fully(&mut out).unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn test_close_is_idempotent() {
    let dir = tempdir().unwrap();
    let scratch =
        ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), None)).unwrap();
    let mut buffer = scratch.create_buffer().unwrap();
    buffer.write(&pattern(PAGE_SIZE * 2, 0)).unwrap();
    let path = scratch.file_path().unwrap();

    buffer.close().unwrap();
    buffer.close().unwrap();
    assert_eq!(scratch.stats().free_pages, ENLARGE_PAGE_COUNT);

    scratch.close().unwrap();
    scratch.close().unwrap();
    assert!(!path.exists());
    assert!(matches!(scratch.create_buffer(), Err(PdfError::Closed(_))));
}

#[test]
fn test_dropping_last_handle_deletes_file() {
    let dir = tempdir().unwrap();
    let path = {
        let scratch =
            ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), None)).unwrap();
        let mut buffer = scratch.create_buffer().unwrap();
        buffer.write(b"spill").unwrap();
        scratch.file_path().unwrap()
    };
    assert!(!path.exists());
}

#[test]
fn test_buffers_are_isolated() {
    let dir = tempdir().unwrap();
    let scratch = ScratchFile::new(MemoryUsageSetting::mixed(
        dir.path(),
        Some(PAGE_SIZE as u64 * 2),
        None,
    ))
    .unwrap();

    let a_data = pattern(PAGE_SIZE * 3 / 2, 11);
    let b_data = pattern(PAGE_SIZE * 5 / 2, 77);
    let mut a = scratch.create_buffer().unwrap();
    let mut b = scratch.create_buffer().unwrap();

    // Interleave writes so pages of both buffers alternate in the pool
    a.write(&a_data[..PAGE_SIZE]).unwrap();
    b.write(&b_data[..PAGE_SIZE * 2]).unwrap();
    a.write(&a_data[PAGE_SIZE..]).unwrap();
    b.write(&b_data[PAGE_SIZE * 2..]).unwrap();

    assert_eq!(pdfscratch::io::utils::read_all(&mut a).unwrap(), a_data);
    assert_eq!(pdfscratch::io::utils::read_all(&mut b).unwrap(), b_data);

    a.close().unwrap();
    b.close().unwrap();

    // A recycled page may hold stale bytes, but a new buffer never exposes
    // anything beyond what it wrote itself
    let mut c = scratch.create_buffer().unwrap();
    assert_eq!(c.length().unwrap(), 0);
    assert_eq!(c.read_byte().unwrap(), None);
    c.write(b"short").unwrap();
    assert_eq!(pdfscratch::io::utils::read_all(&mut c).unwrap(), b"short");
    assert!(matches!(
        c.seek(6),
        Err(PdfError::InvalidSeek { position: 6, .. })
    ));
}

#[test]
fn test_create_buffer_from_input() {
    let dir = tempdir().unwrap();
    let scratch =
        ScratchFile::new(MemoryUsageSetting::temp_file_only(dir.path(), None)).unwrap();
    let data = pattern(PAGE_SIZE * 4 + 123, 42);

    let mut buffer = scratch.create_buffer_from(Cursor::new(&data)).unwrap();
    assert_eq!(buffer.position().unwrap(), 0);
    assert_eq!(buffer.length().unwrap(), data.len() as u64);

    let mut out = vec![0u8; data.len()];
    buffer.read_fully(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_buffers_across_threads() {
    let scratch = ScratchFile::main_memory_only().unwrap();
    let handles: Vec<_> = (0..4u8)
        .map(|seed| {
            let scratch = scratch.clone();
            std::thread::spawn(move || {
                let data = pattern(PAGE_SIZE * 3 + seed as usize, seed);
                let mut buffer = scratch.create_buffer().unwrap();
                buffer.write(&data).unwrap();
                buffer.seek(0).unwrap();
                let mut out = vec![0u8; data.len()];
                buffer.read_fully(&mut out).unwrap();
                assert_eq!(out, data);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(scratch.stats().in_memory_pages, 0);
}
