use std::fmt::{Display, Formatter};

use super::{
    bitstream::BitStream,
    config::CodecConfig,
    utils::{GapError, GapResult},
};

// Metadata word carried by the metadata path
//------------------------------------------------------------------------------
// Bits, most significant first: payload length (12), version - 1 (3), color depth - 1 (3),
// error tolerance code (2), then zeros up to the path width. No FEC is applied.

const LEN_BITS: usize = 12;
const VERSION_BITS: usize = 3;
const COLOR_BITS: usize = 3;
const ERROR_BITS: usize = 2;
const FIELD_BITS: usize = LEN_BITS + VERSION_BITS + COLOR_BITS + ERROR_BITS;

const ERROR_LEVELS: [u8; 3] = [10, 20, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub payload_len: usize,
    pub version: u8,
    pub color_depth: u8,
    pub error_tolerance: u8,
}

impl Display for Metadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ Version: {}, Color depth: {}, Error tolerance: {}%, Payload: {} bytes }}",
            self.version, self.color_depth, self.error_tolerance, self.payload_len
        )
    }
}

impl Metadata {
    pub fn new(cfg: &CodecConfig, payload_len: usize) -> Self {
        Self {
            payload_len,
            version: cfg.format_version,
            color_depth: cfg.color_depth,
            error_tolerance: cfg.error_tolerance,
        }
    }

    pub fn to_bits(&self, width: usize) -> GapResult<BitStream> {
        debug_assert!(width >= FIELD_BITS, "Metadata width {width} below {FIELD_BITS}");

        if self.payload_len >= 1 << LEN_BITS {
            return Err(GapError::UnsupportedFormat(format!(
                "Payload length {} needs more than {LEN_BITS} bits",
                self.payload_len
            )));
        }
        let version = code_of(self.version, "version")?;
        let color = code_of(self.color_depth, "color depth")?;
        let error = ERROR_LEVELS.iter().position(|&e| e == self.error_tolerance).ok_or_else(|| {
            GapError::UnsupportedFormat(format!("Error tolerance {}%", self.error_tolerance))
        })?;

        let mut bits = BitStream::new(width);
        bits.push_bits(self.payload_len as u16, LEN_BITS);
        bits.push_bits(version, VERSION_BITS);
        bits.push_bits(color, COLOR_BITS);
        bits.push_bits(error as u8, ERROR_BITS);
        while bits.len() < width {
            bits.push(false);
        }
        Ok(bits)
    }

    pub fn from_bits(bits: &BitStream) -> GapResult<Self> {
        let mut cur = bits.cursor();
        let mut take = |n| {
            cur.advance(n).ok_or_else(|| {
                GapError::UnsupportedFormat(format!("Metadata shorter than {FIELD_BITS} bits"))
            })
        };

        let payload_len = take(LEN_BITS)? as usize;
        let version = take(VERSION_BITS)? as u8 + 1;
        let color_depth = take(COLOR_BITS)? as u8 + 1;
        let error_code = take(ERROR_BITS)? as usize;
        let error_tolerance = *ERROR_LEVELS.get(error_code).ok_or_else(|| {
            GapError::UnsupportedFormat(format!("Unknown error tolerance code {error_code}"))
        })?;

        Ok(Self { payload_len, version, color_depth, error_tolerance })
    }

    /// Rejects metadata written for a different format.
    pub fn check(&self, cfg: &CodecConfig) -> GapResult<()> {
        if self.version != cfg.format_version
            || self.color_depth != cfg.color_depth
            || self.error_tolerance != cfg.error_tolerance
        {
            return Err(GapError::UnsupportedFormat(format!(
                "Expected V{}C{}E{}%, got V{}C{}E{}%",
                cfg.format_version,
                cfg.color_depth,
                cfg.error_tolerance,
                self.version,
                self.color_depth,
                self.error_tolerance
            )));
        }
        Ok(())
    }
}

fn code_of(value: u8, name: &str) -> GapResult<u8> {
    match value {
        1..=8 => Ok(value - 1),
        _ => Err(GapError::UnsupportedFormat(format!("{name} {value} is outside 1..=8"))),
    }
}
