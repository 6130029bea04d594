//! One-at-a-time enumeration of DEX containers across a package's
//! archives.
//!
//! Candidate entries are selected by the `.dex` name suffix from the
//! central directory; payloads are decoded and parsed strictly one at a
//! time. The borrow on [`DexEntryEnumerator::next_entry`] ties each
//! yielded entry to the enumerator, so a second container cannot be
//! materialized while one is alive.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::archive::zip::{ZipArchive, ZipEntry};
use crate::core::ArchiveHandle;
use crate::dex::format::{DexDialect, DexFile, DEX_MAGIC};
use crate::error::{Result, ScanError};

/// Default ceiling on total decoded container bytes per enumeration.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

/// Enumeration settings.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    /// Dialect gating which container versions are accepted.
    pub dialect: DexDialect,
    /// Abort once this many decoded bytes have been materialized.
    pub max_total_bytes: u64,
    /// Also probe entries without the `.dex` suffix by magic bytes.
    /// Off by default: it reads a payload prefix for every entry.
    pub sniff_unnamed: bool,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            dialect: DexDialect::default(),
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            sniff_unnamed: false,
        }
    }
}

/// Running totals over one enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DexCounter {
    /// Containers yielded so far.
    pub entries: u32,
    /// Decoded bytes materialized so far.
    pub bytes: u64,
}

/// A yielded container, alive for at most one iteration step.
///
/// Holds the decoded bytes; the mutable borrow of the enumerator
/// prevents a second entry from existing concurrently.
pub struct DexEntry<'a> {
    name: String,
    dex: DexFile,
    gauge: LiveGauge,
    _enumerator: PhantomData<&'a mut DexEntryEnumerator>,
}

impl DexEntry<'_> {
    /// Archive entry name, e.g. `classes2.dex`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dex(&self) -> &DexFile {
        &self.dex
    }
}

impl std::fmt::Debug for DexEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DexEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Shared live/peak counters, decremented when an entry drops.
#[derive(Clone)]
struct LiveGauge {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl LiveGauge {
    fn new() -> Self {
        Self {
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn raise(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }
}

impl Drop for DexEntry<'_> {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Walks every archive of a package and yields its DEX containers.
pub struct DexEntryEnumerator {
    config: EnumeratorConfig,
    pending_paths: VecDeque<PathBuf>,
    current: Option<OpenArchive>,
    counter: DexCounter,
    gauge: LiveGauge,
}

impl std::fmt::Debug for DexEntryEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DexEntryEnumerator")
            .field("counter", &self.counter)
            .field("pending_paths", &self.pending_paths)
            .finish_non_exhaustive()
    }
}

struct OpenArchive {
    archive: ZipArchive,
    candidates: VecDeque<Candidate>,
}

struct Candidate {
    entry: ZipEntry,
    named: bool,
}

impl DexEntryEnumerator {
    /// Open the package's base archive and queue its splits.
    ///
    /// The base is opened eagerly so a missing or malformed base path
    /// fails here rather than mid-enumeration.
    pub fn open(handle: &ArchiveHandle, config: EnumeratorConfig) -> Result<Self> {
        let mut paths: VecDeque<PathBuf> = handle.paths().map(PathBuf::from).collect();
        let first = paths.pop_front().ok_or_else(|| {
            ScanError::InvalidFormat("package has no archive paths".to_string())
        })?;
        let current = Some(Self::open_archive(&first, &config)?);
        Ok(Self {
            config,
            pending_paths: paths,
            current,
            counter: DexCounter::default(),
            gauge: LiveGauge::new(),
        })
    }

    fn open_archive(path: &std::path::Path, config: &EnumeratorConfig) -> Result<OpenArchive> {
        let archive = ZipArchive::open(path)?;
        let candidates = archive
            .entries()
            .iter()
            .filter(|e| !e.is_dir())
            .filter(|e| config.sniff_unnamed || e.name.ends_with(".dex"))
            .map(|e| Candidate {
                named: e.name.ends_with(".dex"),
                entry: e.clone(),
            })
            .collect();
        Ok(OpenArchive {
            archive,
            candidates,
        })
    }

    /// Advance to the next container.
    ///
    /// Entries whose payload fails the header check are skipped; payload
    /// read failures abort the enumeration as [`ScanError::Corrupt`]
    /// carrying the totals processed so far.
    pub fn next_entry(&mut self) -> Result<Option<DexEntry<'_>>> {
        loop {
            let Some(open) = self.current.as_mut() else {
                let Some(path) = self.pending_paths.pop_front() else {
                    return Ok(None);
                };
                self.current = Some(Self::open_archive(&path, &self.config)?);
                continue;
            };
            let Some(candidate) = open.candidates.pop_front() else {
                self.current = None;
                continue;
            };

            // Unnamed candidates are probed by magic before decoding.
            if !candidate.named {
                let prefix = open
                    .archive
                    .read_entry_prefix(&candidate.entry, DEX_MAGIC.len())
                    .unwrap_or_default();
                if prefix != DEX_MAGIC[..] {
                    continue;
                }
            }

            if self.counter.bytes.saturating_add(candidate.entry.uncompressed_size)
                > self.config.max_total_bytes
            {
                error!(
                    entries = self.counter.entries,
                    bytes = self.counter.bytes,
                    entry = %candidate.entry.name,
                    "decode budget exhausted during dex enumeration"
                );
                return Err(ScanError::ResourceExhausted {
                    resource: "decoded dex bytes",
                    used: self.counter.bytes.saturating_add(candidate.entry.uncompressed_size),
                    limit: self.config.max_total_bytes,
                    entries: self.counter.entries,
                });
            }

            let payload = match open.archive.read_entry(&candidate.entry) {
                Ok(p) => p,
                Err(e) => {
                    return Err(ScanError::corrupt(
                        format!("{}: {}", candidate.entry.name, e),
                        self.counter.entries,
                        self.counter.bytes,
                    ));
                }
            };
            let size = payload.len() as u64;

            let dex = match DexFile::parse(payload, self.config.dialect) {
                Ok(dex) => dex,
                Err(e) => {
                    // Suffix match without a valid header: not a container.
                    debug!(entry = %candidate.entry.name, error = %e, "skipping non-dex entry");
                    continue;
                }
            };

            self.counter.entries += 1;
            self.counter.bytes += size;
            debug!(
                entry = %candidate.entry.name,
                bytes = size,
                total_entries = self.counter.entries,
                total_bytes = self.counter.bytes,
                "materialized dex container"
            );

            self.gauge.raise();
            return Ok(Some(DexEntry {
                name: candidate.entry.name.clone(),
                dex,
                gauge: self.gauge.clone(),
                _enumerator: PhantomData,
            }));
        }
    }

    pub fn counter(&self) -> DexCounter {
        self.counter
    }

    /// Greatest number of containers ever alive at once.
    pub fn peak_materialized(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }
}
