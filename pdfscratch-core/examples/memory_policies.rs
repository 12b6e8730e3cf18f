//! Compare how the memory policies place scratch pages
//!
//! Buffers the same stream data under a memory-only, a disk-only and a mixed
//! policy and prints where the pages ended up.
//!
//! Usage:
//! ```bash
//! cargo run --example memory_policies
//! ```

use pdfscratch::{
    Closeable, MemoryUsageSetting, RandomAccessRead, RandomAccessWrite, Result, ScratchFile,
    ScratchStream, StreamFilter,
};
use std::time::Instant;

const STREAM_LEN: usize = 2 * 1024 * 1024;

fn content_stream() -> Vec<u8> {
    b"0.5 g 72 72 468 648 re f 0 G 1 w 72 72 m 540 720 l S\n"
        .iter()
        .copied()
        .cycle()
        .take(STREAM_LEN)
        .collect()
}

fn run(name: &str, setting: MemoryUsageSetting, data: &[u8]) -> Result<()> {
    println!("{name}: {setting}");
    let scratch = ScratchFile::new(setting)?;

    let start = Instant::now();
    let mut buffer = scratch.create_buffer()?;
    buffer.write(data)?;
    let written = start.elapsed();

    let start = Instant::now();
    buffer.seek(0)?;
    let mut out = vec![0u8; data.len()];
    buffer.read_fully(&mut out)?;
    let read = start.elapsed();
    assert_eq!(out, data);

    let stats = scratch.stats();
    println!("  write {:?}, read {:?}", written, read);
    println!(
        "  {} pages in memory, {} pages on disk, scratch file {} bytes",
        stats.in_memory_pages, stats.file_pages, stats.file_len
    );
    if let Some(path) = scratch.file_path() {
        println!("  scratch file at {}", path.display());
    }

    buffer.close()?;
    scratch.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let data = content_stream();
    let dir = std::env::temp_dir();

    run("memory", MemoryUsageSetting::main_memory_only(None), &data)?;
    run("disk", MemoryUsageSetting::temp_file_only(&dir, None), &data)?;
    run(
        "mixed",
        MemoryUsageSetting::mixed(&dir, Some(512 * 1024), None),
        &data,
    )?;

    // Stream bodies compress well, so the encoded form needs far fewer pages
    let scratch = ScratchFile::new(MemoryUsageSetting::mixed(&dir, Some(64 * 1024), None))?;
    let mut stream = ScratchStream::with_filter(&scratch, StreamFilter::FlateDecode)?;
    stream.write_encoded(&mut &data[..])?;
    println!(
        "flate: {} bytes encoded to {} bytes, {} pages in use",
        data.len(),
        stream.raw_length()?,
        scratch.stats().in_memory_pages + scratch.stats().file_pages
    );
    stream.close()?;
    scratch.close()?;

    Ok(())
}
