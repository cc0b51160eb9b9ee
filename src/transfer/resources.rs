use std::{fs, thread};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::common::{GapError, GapResult};

// Worker and buffer sizing
//------------------------------------------------------------------------------

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Disk-bound work: indexing blobs, writing files.
    Io,
    /// Compression, checksums, panel rendering and decoding.
    Cpu,
}

pub trait ResourcePolicy: Send + Sync {
    /// Threads to use for `items` units of `task`. Never zero.
    fn worker_count(&self, task: Task, items: usize) -> usize;

    /// Read buffer for a file of `file_size` bytes.
    fn buffer_size(&self, file_size: u64) -> usize;
}

/// Sizes pools from the core count and, where the kernel reports it, available memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPolicy {
    cores: usize,
    available_mem: Option<u64>,
}

impl DefaultPolicy {
    pub fn detect() -> Self {
        let cores = thread::available_parallelism().map_or(1, std::num::NonZero::get);
        Self { cores, available_mem: available_memory() }
    }

    pub fn with_resources(cores: usize, available_mem: Option<u64>) -> Self {
        Self { cores: cores.max(1), available_mem }
    }

    // 1 per 2 GiB available, clamped to 1..=4
    fn mem_factor(&self) -> Option<usize> {
        self.available_mem.map(|m| (m / (2 * GIB)).clamp(1, 4) as usize)
    }
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::detect()
    }
}

impl ResourcePolicy for DefaultPolicy {
    fn worker_count(&self, task: Task, items: usize) -> usize {
        let n = match (task, self.mem_factor()) {
            (Task::Io, Some(f)) => (self.cores * f / 3).clamp(2, 6),
            (Task::Cpu, Some(f)) => (self.cores * f / 4).clamp(1, 4),
            (Task::Io, None) => self.cores.min(4),
            (Task::Cpu, None) => self.cores.min(2),
        };
        n.min(items).max(1)
    }

    fn buffer_size(&self, file_size: u64) -> usize {
        let size = if file_size < MIB {
            file_size.clamp(1, 64 * KIB)
        } else if file_size < 10 * MIB {
            (file_size / 4).min(512 * KIB)
        } else {
            self.available_mem.map_or(2 * MIB, |m| (m / 16).clamp(64 * KIB, 8 * MIB))
        };
        size as usize
    }
}

/// Constant sizes, for tests and embedders that manage their own threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    pub workers: usize,
    pub buffer: usize,
}

impl ResourcePolicy for FixedPolicy {
    fn worker_count(&self, _task: Task, _items: usize) -> usize {
        self.workers.max(1)
    }

    fn buffer_size(&self, _file_size: u64) -> usize {
        self.buffer.max(1)
    }
}

/// `MemAvailable` from `/proc/meminfo`, in bytes.
fn available_memory() -> Option<u64> {
    let info = fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&info)
}

fn parse_meminfo(info: &str) -> Option<u64> {
    let line = info.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * KIB)
}

pub(crate) fn build_pool(
    policy: &dyn ResourcePolicy,
    task: Task,
    items: usize,
) -> GapResult<ThreadPool> {
    let threads = policy.worker_count(task, items);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| GapError::Io(std::io::Error::other(e)))
}
