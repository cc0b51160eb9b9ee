use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    io::{BufWriter, Read, Write},
    ops::Range,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use flate2::write::ZlibDecoder;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::common::{
    wire::{key_verification, parse_header, Chunk, ChunkHeader, ChunkKind, HEADER_LEN},
    GapError, GapResult, TransferConfig,
};

use super::{
    manifest::{FileEntry, Manifest},
    resources::{build_pool, DefaultPolicy, ResourcePolicy, Task},
    CancelToken,
};

// Chunk index
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum BlobSource {
    File(PathBuf),
    Memory { name: String, bytes: Vec<u8> },
}

impl BlobSource {
    pub fn load(&self) -> GapResult<Chunk> {
        match self {
            Self::File(p) => Chunk::from_bytes(&fs::read(p)?),
            Self::Memory { bytes, .. } => Chunk::from_bytes(bytes),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Memory { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub header: ChunkHeader,
    pub source: BlobSource,
}

/// A blob left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlob {
    pub source: String,
    pub seq: Option<u32>,
    pub reason: String,
}

/// Chunk headers keyed by sequence number. Built once, then only read.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    entries: BTreeMap<u32, IndexEntry>,
    skipped: Vec<SkippedBlob>,
}

impl ChunkIndex {
    /// Indexes every `*.bin` file directly under `dir`. Only headers are read.
    pub fn scan_dir<P: AsRef<Path>>(dir: P) -> GapResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(GapError::FileNotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|x| x == "bin"))
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut index = Self::default();
        for p in paths {
            let header = read_header(&p);
            index.insert(header, BlobSource::File(p));
        }
        info!("Indexed {} chunks, skipped {}", index.len(), index.skipped.len());
        Ok(index)
    }

    pub fn from_blobs<I: IntoIterator<Item = (String, Vec<u8>)>>(blobs: I) -> Self {
        let mut index = Self::default();
        for (name, bytes) in blobs {
            let header = parse_header(&bytes);
            index.insert(header, BlobSource::Memory { name, bytes });
        }
        index
    }

    fn insert(&mut self, header: GapResult<ChunkHeader>, source: BlobSource) {
        let skip = |seq, reason: String| {
            warn!("Skipping blob {}: {reason}", source.describe());
            SkippedBlob { source: source.describe(), seq, reason }
        };
        match header {
            Err(e) => self.skipped.push(skip(None, e.to_string())),
            Ok(h) if self.entries.contains_key(&h.seq) => {
                self.skipped.push(skip(Some(h.seq), "Duplicate sequence number".to_string()))
            }
            Ok(h) => {
                self.entries.insert(h.seq, IndexEntry { header: h, source });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, seq: u32) -> Option<&IndexEntry> {
        self.entries.get(&seq)
    }

    pub fn manifest_entries(&self) -> impl Iterator<Item = (u32, &IndexEntry)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.header.kind == ChunkKind::Manifest)
            .map(|(&s, e)| (s, e))
    }

    pub fn skipped(&self) -> &[SkippedBlob] {
        &self.skipped
    }
}

fn read_header(path: &Path) -> GapResult<ChunkHeader> {
    let mut buf = [0u8; HEADER_LEN];
    File::open(path)?
        .read_exact(&mut buf)
        .map_err(|_| GapError::MalformedHeader(format!("Shorter than {HEADER_LEN} bytes")))?;
    parse_header(&buf)
}

// Reports
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Written and matching the manifest checksum.
    Verified,
    /// Written, but the manifest carries no checksum for it.
    Unverified,
    /// Written, but the content checksum differs. The output is kept.
    ChecksumFailed,
    Incomplete,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    pub sequences: Range<u32>,
    pub bytes_written: u64,
    pub error: Option<GapError>,
}

#[derive(Debug)]
pub struct ReceiveReport {
    pub manifest: Manifest,
    pub files: Vec<FileReport>,
    pub skipped: Vec<SkippedBlob>,
}

impl ReceiveReport {
    pub fn verified(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Verified).count()
    }

    pub fn all_verified(&self) -> bool {
        self.files.iter().all(|f| f.status == FileStatus::Verified)
    }

    pub fn file(&self, path: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.path == path)
    }
}

// Receiver
//------------------------------------------------------------------------------

/// Rebuilds files from an indexed batch of chunk blobs.
pub struct Receiver {
    cfg: TransferConfig,
    key: Option<Vec<u8>>,
    policy: Arc<dyn ResourcePolicy>,
    cancel: CancelToken,
}

impl Receiver {
    pub fn new(cfg: TransferConfig) -> Self {
        Self {
            cfg,
            key: None,
            policy: Arc::new(DefaultPolicy::detect()),
            cancel: CancelToken::new(),
        }
    }

    /// Decrypts the batch with `key`.
    pub fn with_key<K: AsRef<[u8]>>(mut self, key: K) -> Self {
        self.key = Some(key.as_ref().to_vec());
        self
    }

    pub fn with_policy<R: ResourcePolicy + 'static>(mut self, policy: R) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.cfg
    }

    fn key(&self) -> GapResult<Option<&[u8]>> {
        match &self.key {
            Some(k) if k.is_empty() => Err(GapError::EmptyKey),
            Some(k) => Ok(Some(k.as_slice())),
            None => Ok(None),
        }
    }

    /// Reconstructs every file the manifest lists into `out_dir`. Batch-level problems (key,
    /// manifest, output directory) are errors; per-file problems land in the report.
    pub fn reassemble<P: AsRef<Path>>(
        &self,
        index: &ChunkIndex,
        out_dir: P,
    ) -> GapResult<ReceiveReport> {
        let _span = info_span!("reassemble", chunks = index.len()).entered();

        let key = self.key()?;
        let out = out_dir.as_ref();
        self.prepare_output(out)?;

        let manifest = self.read_manifest(index)?;
        info!("Manifest lists {} files in {} chunks", manifest.files.len(), manifest.total_chunks);

        let dests = destinations(&manifest.files);
        let pool = build_pool(self.policy.as_ref(), Task::Io, manifest.files.len())?;
        let files: Vec<FileReport> = pool.install(|| {
            manifest
                .files
                .par_iter()
                .zip(&dests)
                .map(|(entry, rel)| self.rebuild(index, entry, rel, out, key))
                .collect()
        });

        let report = ReceiveReport { manifest, files, skipped: index.skipped().to_vec() };
        info!("Reconstructed {} of {} files", report.verified(), report.files.len());
        Ok(report)
    }

    fn prepare_output(&self, out: &Path) -> GapResult<()> {
        if out.exists() {
            let occupied = !out.is_dir() || fs::read_dir(out)?.next().is_some();
            if occupied && !self.cfg.overwrite {
                return Err(GapError::OutputNotEmpty(out.to_path_buf()));
            }
        }
        fs::create_dir_all(out)?;
        Ok(())
    }

    /// Decrypts, verifies and decodes the manifest chunks.
    pub fn read_manifest(&self, index: &ChunkIndex) -> GapResult<Manifest> {
        let key = self.key()?;
        let chunks: Vec<(u32, &IndexEntry)> = index.manifest_entries().collect();
        if chunks.is_empty() {
            return Err(GapError::ManifestCorrupt("No manifest chunks".to_string()));
        }
        if let Some(i) = chunks.iter().enumerate().position(|(i, (seq, _))| *seq != i as u32) {
            return Err(GapError::ManifestCorrupt(format!("Missing manifest chunk {i}")));
        }

        let encrypted = chunks[0].1.header.encrypted;
        match (encrypted, key.is_some()) {
            (true, false) => {
                return Err(GapError::InvalidKey("Batch is encrypted, no key given".to_string()))
            }
            (false, true) => {
                return Err(GapError::InvalidKey("Batch is not encrypted".to_string()))
            }
            _ => {}
        }

        let opened: Vec<GapResult<Vec<u8>>> =
            chunks.par_iter().map(|(_, e)| e.source.load()?.open(key)).collect();
        let failed =
            opened.iter().filter(|r| matches!(r, Err(GapError::ChecksumMismatch { .. }))).count();
        if encrypted && failed == opened.len() {
            return Err(GapError::InvalidKey(
                "No manifest chunk verifies under the supplied key".to_string(),
            ));
        }

        let pieces = opened
            .into_iter()
            .collect::<GapResult<Vec<_>>>()
            .map_err(|e| GapError::ManifestCorrupt(e.to_string()))?;
        let manifest = Manifest::from_compressed(&pieces.concat())?;
        debug!("Manifest spans {} chunks", pieces.len());

        if manifest.encrypted != key.is_some() {
            return Err(GapError::InvalidKey("Manifest encryption flag disagrees".to_string()));
        }
        if let (Some(k), Some(expected)) = (key, &manifest.key_verification) {
            if !key_verification(k).eq_ignore_ascii_case(expected) {
                return Err(GapError::InvalidKey("Key verification mismatch".to_string()));
            }
        }
        Ok(manifest)
    }

    fn rebuild(
        &self,
        index: &ChunkIndex,
        entry: &FileEntry,
        rel: &str,
        out: &Path,
        key: Option<&[u8]>,
    ) -> FileReport {
        let mut report = FileReport {
            path: rel.to_string(),
            status: FileStatus::Failed,
            sequences: entry.sequences(),
            bytes_written: 0,
            error: None,
        };
        if self.cancel.is_cancelled() {
            report.status = FileStatus::Cancelled;
            report.error = Some(GapError::Cancelled);
            return report;
        }

        match self.write_file(index, entry, &out.join(rel), key) {
            Ok((written, digest)) => {
                report.bytes_written = written;
                if written != entry.size {
                    warn!("Size mismatch for {rel}: manifest says {}, wrote {written}", entry.size);
                }
                report.status = if entry.checksum.is_empty() {
                    FileStatus::Unverified
                } else if digest.eq_ignore_ascii_case(&entry.checksum) {
                    FileStatus::Verified
                } else {
                    warn!("Checksum mismatch for {rel}: expected {}, got {digest}", entry.checksum);
                    FileStatus::ChecksumFailed
                };
                debug!("Rebuilt {rel} ({written} bytes, {:?})", report.status);
            }
            Err(e) => {
                warn!("Skipping {rel}: {e}");
                if matches!(e, GapError::IncompleteFile { .. }) {
                    report.status = FileStatus::Incomplete;
                }
                report.error = Some(e);
            }
        }
        report
    }

    // Chunks are verified in parallel a window at a time, then fed to one decompressor in
    // sequence order. A file that fails part way is removed.
    fn write_file(
        &self,
        index: &ChunkIndex,
        entry: &FileEntry,
        dest: &Path,
        key: Option<&[u8]>,
    ) -> GapResult<(u64, String)> {
        let chunks: Vec<&IndexEntry> = entry
            .sequences()
            .filter_map(|s| index.get(s))
            .filter(|e| e.header.kind == ChunkKind::Data)
            .collect();
        if chunks.len() != entry.chunk_count as usize {
            return Err(GapError::IncompleteFile {
                path: entry.path.clone(),
                found: chunks.len(),
                expected: entry.chunk_count as usize,
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(dest)?;
        let sink = HashingWriter::new(BufWriter::with_capacity(
            self.policy.buffer_size(entry.size),
            file,
        ));
        let window = self.policy.worker_count(Task::Io, chunks.len());

        let res = stream_chunks(sink, &chunks, window, key);
        if res.is_err() {
            if let Err(e) = fs::remove_file(dest) {
                warn!("Could not remove partial {}: {e}", dest.display());
            }
        }
        res
    }
}

fn stream_chunks<W: Write>(
    mut sink: HashingWriter<W>,
    chunks: &[&IndexEntry],
    window: usize,
    key: Option<&[u8]>,
) -> GapResult<(u64, String)> {
    if !chunks.is_empty() {
        let mut dec = ZlibDecoder::new(sink);
        for batch in chunks.chunks(window.max(1)) {
            let plain: Vec<Vec<u8>> = batch
                .par_iter()
                .map(|e| e.source.load()?.open(key))
                .collect::<GapResult<_>>()?;
            for p in &plain {
                dec.write_all(p)?;
            }
        }
        sink = dec.finish()?;
    }
    Ok(sink.finish()?)
}

// Where each file lands under the output directory. The original relative path is preferred
// when it stays inside the directory; repeated targets get the start sequence appended.
fn destinations(files: &[FileEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    files
        .iter()
        .map(|f| {
            let wanted = [&f.original_path, &f.path]
                .into_iter()
                .find(|p| is_contained(p))
                .cloned()
                .unwrap_or_else(|| format!("file_{}", f.start_sequence));
            let rel = if seen.contains(&wanted) {
                with_suffix(&wanted, f.start_sequence)
            } else {
                wanted.clone()
            };
            seen.insert(wanted);
            rel
        })
        .collect()
}

fn is_contained(rel: &str) -> bool {
    !rel.is_empty() && Path::new(rel).components().all(|c| matches!(c, Component::Normal(_)))
}

fn with_suffix(rel: &str, start: u32) -> String {
    let p = Path::new(rel);
    let stem = p.file_stem().map_or(String::new(), |s| s.to_string_lossy().into_owned());
    let name = match p.extension() {
        Some(ext) => format!("{stem}_{start}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{start}"),
    };
    match p.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => format!("{}/{name}", dir.to_string_lossy()),
        None => name,
    }
}

// Counts and hashes everything written through it
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, hasher: Sha256::new(), written: 0 }
    }

    fn finish(mut self) -> std::io::Result<(u64, String)> {
        self.inner.flush()?;
        Ok((self.written, hex::encode(self.hasher.finalize())))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
