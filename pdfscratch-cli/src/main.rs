use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfscratch::{
    MemoryUsageSetting, RandomAccessInputStream, RandomAccessRead, ScratchFile, ScratchStream,
    StreamFilter,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "pdfscratch",
    about = "Buffer PDF stream data through bounded scratch storage",
    version,
    author
)]
struct Cli {
    /// Log pool activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct StorageArgs {
    /// Main memory limit (e.g. 512, 64K, 8M, 1G; 0 keeps nothing in memory)
    #[arg(short, long, value_parser = parse_size)]
    memory: Option<u64>,

    /// Overall memory and disk limit
    #[arg(short, long, value_parser = parse_size)]
    storage: Option<u64>,

    /// Directory for the temporary scratch file
    #[arg(short, long)]
    temp_dir: Option<PathBuf>,
}

impl StorageArgs {
    fn setting(&self) -> MemoryUsageSetting {
        match &self.temp_dir {
            Some(dir) => MemoryUsageSetting::mixed(dir, self.memory, self.storage),
            None => MemoryUsageSetting::main_memory_only(self.memory.or(self.storage)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a file through a scratch buffer and report the pool usage
    Buffer {
        /// Input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        storage: StorageArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Flate encode a file into a stream body
    Deflate {
        /// Input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Decode a Flate encoded stream body
    Inflate {
        /// Input file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        storage: StorageArgs,
    },
}

/// Parse a byte count with an optional binary K/M/G suffix
fn parse_size(value: &str) -> std::result::Result<u64, String> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&value[..idx], 1u64 << 10),
        Some((idx, 'm' | 'M')) => (&value[..idx], 1u64 << 20),
        Some((idx, 'g' | 'G')) => (&value[..idx], 1u64 << 30),
        _ => (value, 1),
    };
    let number: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{value}'"))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{value}' is too large"))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "pdfscratch=debug,pdfscratch_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open_scratch(storage: &StorageArgs) -> Result<ScratchFile> {
    let setting = storage.setting();
    info!(%setting, "opening scratch storage");
    ScratchFile::new(setting).context("Failed to set up scratch storage")
}

fn buffer_command(input: &Path, output: &Path, storage: &StorageArgs, json: bool) -> Result<()> {
    let scratch = open_scratch(storage)?;
    let mut buffer = scratch
        .create_buffer_from(open_input(input)?)
        .with_context(|| format!("Failed to buffer {}", input.display()))?;
    let length = buffer.length()?;
    let stats = scratch.stats();
    debug!(?stats, "input buffered");

    let mut writer = create_output(output)?;
    std::io::copy(&mut RandomAccessInputStream::new(&mut buffer), &mut writer)?;
    writer.flush()?;

    if json {
        let report = serde_json::json!({
            "input": input.display().to_string(),
            "output": output.display().to_string(),
            "bytes": length,
            "setting": scratch.setting(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Buffered {} bytes through {}", length, scratch.setting());
        println!("  Pages in use:    {}", stats.in_memory_pages + stats.file_pages);
        println!("  In memory:       {}", stats.in_memory_pages);
        println!("  In scratch file: {}", stats.file_pages);
        println!("  Free pages:      {}", stats.free_pages);
        println!("  Scratch file:    {} bytes", stats.file_len);
    }

    drop(buffer);
    scratch.close()?;
    Ok(())
}

fn deflate_command(input: &Path, output: &Path, storage: &StorageArgs) -> Result<()> {
    let scratch = open_scratch(storage)?;
    let mut stream = ScratchStream::with_filter(&scratch, StreamFilter::FlateDecode)?;
    let consumed = stream.write_encoded(&mut open_input(input)?)?;

    let mut writer = create_output(output)?;
    writer.write_all(&stream.read_raw()?)?;
    writer.flush()?;

    println!(
        "Encoded {} bytes into {} bytes (/Filter /{})",
        consumed,
        stream.raw_length()?,
        stream.filter()
    );
    stream.close()?;
    scratch.close()?;
    Ok(())
}

fn inflate_command(input: &Path, output: &Path, storage: &StorageArgs) -> Result<()> {
    let scratch = open_scratch(storage)?;
    let mut stream = ScratchStream::with_filter(&scratch, StreamFilter::FlateDecode)?;
    let raw = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    stream.write_raw(&raw)?;

    let mut writer = create_output(output)?;
    let decoded = match std::io::copy(&mut stream.decoded_reader()?, &mut writer) {
        Ok(decoded) => decoded,
        Err(err) => bail!("Failed to decode {}: {}", input.display(), err),
    };
    writer.flush()?;

    println!("Decoded {} bytes into {} bytes", raw.len(), decoded);
    stream.close()?;
    scratch.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Buffer {
            input,
            output,
            storage,
            json,
        } => buffer_command(&input, &output, &storage, json)?,

        Commands::Deflate {
            input,
            output,
            storage,
        } => deflate_command(&input, &output, &storage)?,

        Commands::Inflate {
            input,
            output,
            storage,
        } => inflate_command(&input, &output, &storage)?,
    }

    Ok(())
}
