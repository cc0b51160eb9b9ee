//! Chunk blob framing: 26-byte header, payload checksum and keystream cipher.
//!
//! ```text
//! HEADER | V1 | kind | seq (u32 LE) | total (u32 LE) | E/N | checksum (8 ASCII hex) | payload
//! ```

use std::fmt::{Display, Formatter};

use sha2::{Digest, Sha256};

use super::utils::{GapError, GapResult};

pub const MAGIC: &[u8; 6] = b"HEADER";

pub const VERSION: &[u8; 2] = b"V1";

pub const HEADER_LEN: usize = 26;

pub const CHECKSUM_LEN: usize = 8;

// Chunk kind
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkKind {
    Manifest,
    Data,
}

impl ChunkKind {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Manifest => b'M',
            Self::Data => b'C',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'M' => Some(Self::Manifest),
            b'C' => Some(Self::Data),
            _ => None,
        }
    }
}

impl Display for ChunkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

// Chunk header
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub kind: ChunkKind,
    pub seq: u32,
    pub total: u32,
    pub encrypted: bool,
    pub checksum: [u8; CHECKSUM_LEN],
}

impl ChunkHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        create_header(self.kind, self.seq, self.total, self.encrypted, &self.checksum)
    }

    pub fn checksum_str(&self) -> String {
        String::from_utf8_lossy(&self.checksum).into_owned()
    }
}

pub fn create_header(
    kind: ChunkKind,
    seq: u32,
    total: u32,
    encrypted: bool,
    checksum8: &[u8; CHECKSUM_LEN],
) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..6].copy_from_slice(MAGIC);
    out[6..8].copy_from_slice(VERSION);
    out[8] = kind.tag();
    out[9..13].copy_from_slice(&seq.to_le_bytes());
    out[13..17].copy_from_slice(&total.to_le_bytes());
    out[17] = if encrypted { b'E' } else { b'N' };
    out[18..26].copy_from_slice(checksum8);
    out
}

pub fn parse_header(bytes: &[u8]) -> GapResult<ChunkHeader> {
    let malformed = |msg: String| GapError::MalformedHeader(msg);

    if bytes.len() < HEADER_LEN {
        return Err(malformed(format!("Expected {HEADER_LEN} bytes, got {}", bytes.len())));
    }
    if &bytes[0..6] != MAGIC {
        return Err(malformed("Bad magic token".to_string()));
    }
    if &bytes[6..8] != VERSION {
        return Err(malformed(format!("Unsupported version {:?}", &bytes[6..8])));
    }
    let kind = ChunkKind::from_tag(bytes[8])
        .ok_or_else(|| malformed(format!("Unknown chunk kind {:#04x}", bytes[8])))?;
    let encrypted = match bytes[17] {
        b'E' => true,
        b'N' => false,
        b => return Err(malformed(format!("Unknown encryption flag {b:#04x}"))),
    };

    let mut seq = [0u8; 4];
    seq.copy_from_slice(&bytes[9..13]);
    let mut total = [0u8; 4];
    total.copy_from_slice(&bytes[13..17]);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&bytes[18..26]);

    Ok(ChunkHeader {
        kind,
        seq: u32::from_le_bytes(seq),
        total: u32::from_le_bytes(total),
        encrypted,
        checksum,
    })
}

// Checksums
//------------------------------------------------------------------------------

/// Hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// First 8 characters of the hex SHA-256 digest, as ASCII bytes.
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(hex::encode(&digest[..CHECKSUM_LEN / 2]).as_bytes());
    out
}

/// Key verification value stored in the manifest.
pub fn key_verification(key: &[u8]) -> String {
    sha256_hex(key)
}

// Keystream cipher
//------------------------------------------------------------------------------

/// Repeating-key XOR. Byte `i` is combined with `key[(i + offset) % key.len()]`, so applying it
/// twice with the same key and offset restores the input.
pub fn keystream_xor(data: &[u8], key: &[u8], offset: u64) -> GapResult<Vec<u8>> {
    if key.is_empty() {
        return Err(GapError::EmptyKey);
    }
    let klen = key.len() as u64;
    let start = (offset % klen) as usize;
    Ok(data.iter().zip(key.iter().cycle().skip(start)).map(|(&d, &k)| d ^ k).collect())
}

/// Keystream offset of a chunk.
pub fn chunk_offset(seq: u32, payload_len: usize) -> u64 {
    seq as u64 * payload_len as u64
}

// Chunk
//------------------------------------------------------------------------------

/// A framed chunk blob. The payload is stored exactly as it travels, encrypted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Frames a plaintext payload. The checksum covers the plaintext.
    pub fn seal(
        kind: ChunkKind,
        seq: u32,
        total: u32,
        plain: &[u8],
        key: Option<&[u8]>,
    ) -> GapResult<Self> {
        let checksum = checksum(plain);
        let payload = match key {
            Some(k) => keystream_xor(plain, k, chunk_offset(seq, plain.len()))?,
            None => plain.to_vec(),
        };
        let header = ChunkHeader { kind, seq, total, encrypted: key.is_some(), checksum };
        Ok(Self { header, payload })
    }

    /// Recovers the plaintext payload and verifies its checksum.
    pub fn open(&self, key: Option<&[u8]>) -> GapResult<Vec<u8>> {
        let seq = self.header.seq;
        let plain = match (self.header.encrypted, key) {
            (true, Some(k)) => {
                keystream_xor(&self.payload, k, chunk_offset(seq, self.payload.len()))?
            }
            (true, None) => return Err(GapError::EmptyKey),
            (false, _) => self.payload.clone(),
        };

        let actual = checksum(&plain);
        if actual != self.header.checksum {
            return Err(GapError::ChecksumMismatch {
                seq,
                expected: self.header.checksum_str(),
                actual: String::from_utf8_lossy(&actual).into_owned(),
            });
        }
        Ok(plain)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> GapResult<Self> {
        let header = parse_header(bytes)?;
        Ok(Self { header, payload: bytes[HEADER_LEN..].to_vec() })
    }

    pub fn file_name(&self) -> String {
        chunk_file_name(self.header.kind, self.header.seq, self.header.total)
    }
}

/// File name of a chunk blob, e.g. `M_0_12.bin` or `C_3_12.bin`.
pub fn chunk_file_name(kind: ChunkKind, seq: u32, total: u32) -> String {
    format!("{kind}_{seq}_{total}.bin")
}
