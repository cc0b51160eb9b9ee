use std::{
    io::{Read, Write},
    path::Path,
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::common::GapResult;

// Compression level selection
//------------------------------------------------------------------------------

const PACKED_EXTS: [&str; 17] = [
    "zip", "rar", "7z", "gz", "bz2", "xz", "jpg", "jpeg", "png", "mp3", "mp4", "avi", "mkv", "mov",
    "pdf", "docx", "xlsx",
];

const TEXT_EXTS: [&str; 17] = [
    "txt", "csv", "xml", "json", "html", "md", "log", "sql", "c", "cpp", "h", "py", "js", "java",
    "cs", "php", "rb",
];

const SAMPLE_LEN: usize = 4096;
const MIN_SAMPLE: usize = 100;
const DEFAULT_LEVEL: u32 = 6;

/// Picks a zlib level from the file extension, or from how well a sample compresses.
pub fn level_for(path: &Path, data: &[u8]) -> u32 {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some(e) if PACKED_EXTS.contains(&e) => 1,
        Some(e) if TEXT_EXTS.contains(&e) => 9,
        _ => level_for_ratio(sample_ratio(data)),
    }
}

fn level_for_ratio(ratio: Option<f64>) -> u32 {
    match ratio {
        Some(r) if r < 0.3 => 9,
        Some(r) if r < 0.6 => 6,
        Some(r) if r < 0.8 => 3,
        Some(_) => 1,
        None => DEFAULT_LEVEL,
    }
}

/// Ratio of the level-1 compressed size to the raw size of a sample taken from the start,
/// middle and end. None when the data is too small to judge.
pub fn sample_ratio(data: &[u8]) -> Option<f64> {
    let sample = if data.len() <= 3 * SAMPLE_LEN {
        data.to_vec()
    } else {
        let mid = data.len() / 2 - SAMPLE_LEN / 2;
        [&data[..SAMPLE_LEN], &data[mid..mid + SAMPLE_LEN], &data[data.len() - SAMPLE_LEN..]]
            .concat()
    };
    if sample.len() <= MIN_SAMPLE {
        return None;
    }
    let packed = compress(&sample, 1).ok()?;
    Some(packed.len() as f64 / sample.len() as f64)
}

// Zlib streams
//------------------------------------------------------------------------------

pub fn compress(data: &[u8], level: u32) -> GapResult<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

pub fn decompress(data: &[u8]) -> GapResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
