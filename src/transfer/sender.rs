use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::common::{
    wire::{key_verification, sha256_hex, Chunk, ChunkKind},
    GapError, GapResult, TransferConfig,
};

use super::{
    compress::{compress, level_for},
    manifest::{FileEntry, Manifest},
    resources::{build_pool, DefaultPolicy, ResourcePolicy, Task},
    CancelToken,
};

// Chunk sinks
//------------------------------------------------------------------------------

/// Destination of emitted chunk blobs.
pub trait ChunkSink {
    fn put(&mut self, name: &str, blob: &[u8]) -> GapResult<()>;
}

/// Writes each blob to `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> GapResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self { dir: dir.as_ref().to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChunkSink for DirSink {
    fn put(&mut self, name: &str, blob: &[u8]) -> GapResult<()> {
        fs::write(self.dir.join(name), blob)?;
        Ok(())
    }
}

/// Keeps blobs in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blobs: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blobs(&self) -> &[(String, Vec<u8>)] {
        &self.blobs
    }

    pub fn into_blobs(self) -> Vec<(String, Vec<u8>)> {
        self.blobs
    }
}

impl ChunkSink for MemorySink {
    fn put(&mut self, name: &str, blob: &[u8]) -> GapResult<()> {
        self.blobs.push((name.to_string(), blob.to_vec()));
        Ok(())
    }
}

// Sender
//------------------------------------------------------------------------------

#[derive(Debug)]
pub struct SendReport {
    pub manifest_chunks: u32,
    pub data_chunks: u32,
    pub total_chunks: u32,
    pub manifest: Manifest,
    /// Inputs left out of the batch, with the reason.
    pub skipped: Vec<(PathBuf, GapError)>,
}

// Inputs to pack, and inputs left out with their reason
type Checked = (Vec<PathBuf>, Vec<(PathBuf, GapError)>);

// A compressed file waiting for its sequence numbers
struct Packed {
    entry: FileEntry,
    data: Vec<u8>,
}

/// Turns files into a batch of chunk blobs: manifest chunks first, then each file's data chunks.
pub struct Sender {
    cfg: TransferConfig,
    key: Option<Vec<u8>>,
    policy: Arc<dyn ResourcePolicy>,
    cancel: CancelToken,
}

impl Sender {
    pub fn new(cfg: TransferConfig) -> Self {
        Self {
            cfg,
            key: None,
            policy: Arc::new(DefaultPolicy::detect()),
            cancel: CancelToken::new(),
        }
    }

    /// Encrypts the batch with `key`.
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

    pub fn send<P: AsRef<Path>>(
        &self,
        files: &[P],
        sink: &mut dyn ChunkSink,
    ) -> GapResult<SendReport> {
        let _span = info_span!("send", files = files.len()).entered();

        let key = self.key()?;
        let chunk_size = self.cfg.chunk_size;
        if chunk_size == 0 {
            return Err(GapError::UnsupportedFormat("Chunk size must be positive".to_string()));
        }
        let (paths, skipped) = self.check_inputs(files)?;
        let base = common_base(&paths);

        let pool = build_pool(self.policy.as_ref(), Task::Cpu, paths.len())?;
        let packed: Vec<Packed> = pool.install(|| {
            paths.par_iter().map(|p| self.pack(p, &base)).collect::<GapResult<_>>()
        })?;

        let entries = packed.iter().map(|p| p.entry.clone()).collect();
        let base_dir = base.to_string_lossy().into_owned();
        let mut manifest =
            Manifest::new(entries, base_dir, key.map(key_verification), &self.cfg.format_version);
        let pieces = manifest.plan(chunk_size)?;
        let total = manifest.total_chunks;
        info!("Manifest spans {} chunks, batch total {total}", pieces.len());

        let mut emitted = 0u32;
        for (seq, piece) in pieces.iter().enumerate() {
            let chunk = Chunk::seal(ChunkKind::Manifest, seq as u32, total, piece, key)?;
            sink.put(&chunk.file_name(), &chunk.to_bytes())?;
            emitted += 1;
        }

        for (entry, file) in manifest.files.iter().zip(&packed) {
            self.cancel.check()?;
            for (seq, piece) in entry.sequences().zip(file.data.chunks(chunk_size)) {
                let chunk = Chunk::seal(ChunkKind::Data, seq, total, piece, key)?;
                sink.put(&chunk.file_name(), &chunk.to_bytes())?;
                emitted += 1;
            }
            debug!("Emitted {} chunks for {}", entry.chunk_count, entry.path);
        }

        if emitted != total {
            return Err(GapError::ManifestCorrupt(format!(
                "Emitted {emitted} chunks but the manifest declares {total}"
            )));
        }
        info!("Sent {} files in {total} chunks", manifest.files.len());

        Ok(SendReport {
            manifest_chunks: pieces.len() as u32,
            data_chunks: manifest.data_chunks(),
            total_chunks: total,
            manifest,
            skipped,
        })
    }

    // Every input must exist before anything is emitted. Oversized files are split out.
    fn check_inputs<P: AsRef<Path>>(&self, files: &[P]) -> GapResult<Checked> {
        let mut paths = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for f in files {
            let path = f.as_ref();
            let meta = match fs::metadata(path) {
                Ok(m) if m.is_file() => m,
                _ => return Err(GapError::FileNotFound(path.to_path_buf())),
            };
            if meta.len() > self.cfg.max_file_size {
                let err = GapError::FileTooLarge {
                    path: path.to_path_buf(),
                    size: meta.len(),
                    limit: self.cfg.max_file_size,
                };
                warn!("Skipping input: {err}");
                skipped.push((path.to_path_buf(), err));
                continue;
            }
            paths.push(fs::canonicalize(path)?);
        }
        Ok((paths, skipped))
    }

    fn pack(&self, path: &Path, base: &Path) -> GapResult<Packed> {
        self.cancel.check()?;

        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let mut raw = Vec::with_capacity(size as usize);
        BufReader::with_capacity(self.policy.buffer_size(size), file).read_to_end(&mut raw)?;

        let checksum = sha256_hex(&raw);
        let (data, level) = if raw.is_empty() {
            (Vec::new(), 0)
        } else {
            let level = level_for(path, &raw);
            (compress(&raw, level)?, level)
        };
        let chunk_count = u32::try_from(data.len().div_ceil(self.cfg.chunk_size)).map_err(|_| {
            GapError::UnsupportedFormat(format!("{} needs too many chunks", path.display()))
        })?;

        let rel = relative_path(path, base);
        debug!("Packed {rel}: {} -> {} bytes at level {level}", raw.len(), data.len());
        Ok(Packed { entry: FileEntry::new(&rel, raw.len() as u64, chunk_count, checksum), data })
    }
}

/// Deepest directory containing every path.
fn common_base(paths: &[PathBuf]) -> PathBuf {
    let mut base: Option<PathBuf> = None;
    for p in paths {
        let parent = p.parent().unwrap_or(Path::new(""));
        base = Some(match base {
            None => parent.to_path_buf(),
            Some(b) => b
                .components()
                .zip(parent.components())
                .take_while(|(x, y)| x == y)
                .map(|(x, _)| x)
                .collect(),
        });
    }
    base.unwrap_or_default()
}

// Forward-slash relative path, independent of the host separator
fn relative_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

const KEY_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+[]{}|;:,.<>?";

/// Random printable key of `len` characters.
pub fn generate_key(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| KEY_CHARS[rng.random_range(0..KEY_CHARS.len())] as char).collect()
}
