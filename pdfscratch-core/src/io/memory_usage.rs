//! Memory and temporary-file limits for scratch storage
//!
//! A [`MemoryUsageSetting`] decides how much of a buffered stream may live in
//! main memory and how much may spill to a temporary file. The value is
//! normalised on construction so consumers never have to re-validate it.

use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for how scratch pages are stored
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryUsageSetting {
    use_main_memory: bool,
    max_main_memory_bytes: Option<u64>,
    max_storage_bytes: Option<u64>,
    temp_dir: Option<PathBuf>,
}

impl Default for MemoryUsageSetting {
    fn default() -> Self {
        Self::main_memory_only(None)
    }
}

impl MemoryUsageSetting {
    /// Keep all pages in main memory, optionally capped at `max_bytes`
    pub fn main_memory_only(max_bytes: Option<u64>) -> Self {
        Self::normalized(true, None, max_bytes, max_bytes)
    }

    /// Keep all pages in a temporary file inside `dir`
    pub fn temp_file_only<P: Into<PathBuf>>(dir: P, max_storage_bytes: Option<u64>) -> Self {
        Self::normalized(false, Some(dir.into()), None, max_storage_bytes)
    }

    /// Use main memory up to `max_main_memory_bytes`, then spill to a
    /// temporary file inside `dir`
    pub fn mixed<P: Into<PathBuf>>(
        dir: P,
        max_main_memory_bytes: Option<u64>,
        max_storage_bytes: Option<u64>,
    ) -> Self {
        Self::normalized(
            true,
            Some(dir.into()),
            max_main_memory_bytes,
            max_storage_bytes,
        )
    }

    fn normalized(
        use_main_memory: bool,
        temp_dir: Option<PathBuf>,
        max_main_memory_bytes: Option<u64>,
        max_storage_bytes: Option<u64>,
    ) -> Self {
        // No disk available means everything stays in memory
        let mut use_memory = temp_dir.is_none() || use_main_memory;
        let mut max_main = if use_main_memory {
            max_main_memory_bytes
        } else {
            None
        };
        let mut max_storage = max_storage_bytes.filter(|&bytes| bytes > 0);

        if use_memory && max_main == Some(0) {
            if temp_dir.is_some() {
                use_memory = false;
                max_main = None;
            } else {
                max_main = max_storage;
            }
        }

        // The memory cap can never exceed the overall cap
        if use_memory {
            if let Some(storage) = max_storage {
                match max_main {
                    None => max_storage = None,
                    Some(main) if main > storage => max_storage = Some(main),
                    Some(_) => {}
                }
            }
        }

        Self {
            use_main_memory: use_memory,
            max_main_memory_bytes: if use_memory { max_main } else { None },
            max_storage_bytes: max_storage,
            temp_dir,
        }
    }

    /// Whether pages may be kept in main memory
    pub fn use_main_memory(&self) -> bool {
        self.use_main_memory
    }

    /// Whether pages may be spilled to a temporary file
    pub fn use_temp_file(&self) -> bool {
        self.temp_dir.is_some()
    }

    /// Whether main memory usage is capped
    pub fn is_main_memory_restricted(&self) -> bool {
        self.max_main_memory_bytes.is_some()
    }

    /// Whether the combined memory and disk usage is capped
    pub fn is_storage_restricted(&self) -> bool {
        self.max_storage_bytes.is_some()
    }

    pub fn max_main_memory_bytes(&self) -> Option<u64> {
        self.max_main_memory_bytes
    }

    pub fn max_storage_bytes(&self) -> Option<u64> {
        self.max_storage_bytes
    }

    /// Directory temporary files are created in
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }
}

impl fmt::Display for MemoryUsageSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn limit(bytes: Option<u64>) -> String {
            bytes.map_or_else(|| "unrestricted".to_string(), |b| format!("{b} bytes"))
        }

        if self.use_main_memory {
            write!(
                f,
                "main memory ({})",
                limit(self.max_main_memory_bytes)
            )?;
            if let Some(dir) = &self.temp_dir {
                write!(
                    f,
                    " and temporary file in {} ({})",
                    dir.display(),
                    limit(self.max_storage_bytes)
                )?;
            }
            Ok(())
        } else {
            let dir = self
                .temp_dir
                .as_deref()
                .map_or_else(|| "<none>".into(), Path::to_string_lossy);
            write!(
                f,
                "temporary file in {} ({})",
                dir,
                limit(self.max_storage_bytes)
            )
        }
    }
}
