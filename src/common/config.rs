use super::{
    ec::{MAX_BLOCK_SIZE, MAX_EC_SIZE},
    layout::Layout,
    utils::{GapError, GapResult},
    wire::HEADER_LEN,
};

// Codec configuration
//------------------------------------------------------------------------------

// Outer dark ring, light gap and a non-empty core
const MIN_FINDER_SIZE: usize = 5;

/// Geometry, error correction and format constants of a panel.
///
/// Encoder and decoder must agree on every field: the module grid, the metadata path and the
/// data path are all derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    /// Usable modules per side, quiet zone excluded.
    pub modules: usize,
    pub quiet_zone: usize,
    pub finder_size: usize,
    pub rs_blocks: usize,
    /// Codeword length n of each Reed-Solomon block.
    pub block_len: usize,
    /// Message length k of each Reed-Solomon block.
    pub block_data_len: usize,
    /// Bytes laid along the data path. Codewords are zero padded up to this count.
    pub symbol_count: usize,
    pub format_version: u8,
    pub color_depth: u8,
    /// Nominal error tolerance in percent. Recorded in metadata, never used to pick RS params.
    pub error_tolerance: u8,
    /// Pixels per module when rendering.
    pub scale: u32,
    /// Squared color distance above which a classification is logged as poor quality.
    pub quality_warning: u32,
    /// Smallest accepted finder stone, in square pixels.
    pub min_stone_area: f64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            modules: 100,
            quiet_zone: 4,
            finder_size: 7,
            rs_blocks: 15,
            block_len: 241,
            block_data_len: 193,
            symbol_count: 3635,
            format_version: 8,
            color_depth: 8,
            error_tolerance: 10,
            scale: 10,
            quality_warning: 8000,
            min_stone_area: 16.0,
        }
    }
}

impl CodecConfig {
    /// Message bytes a single panel carries.
    pub fn capacity(&self) -> usize {
        self.rs_blocks * self.block_data_len
    }

    pub fn grid_size(&self) -> usize {
        self.modules + 2 * self.quiet_zone
    }

    pub fn codeword_len(&self) -> usize {
        self.rs_blocks * self.block_len
    }

    pub fn ec_len(&self) -> usize {
        self.block_len - self.block_data_len
    }

    /// Symbol errors each block tolerates.
    pub fn ec_capacity(&self) -> usize {
        self.ec_len() / 2
    }

    /// Largest chunk payload whose framed blob still fits one panel.
    pub fn max_chunk_payload(&self) -> usize {
        self.capacity().saturating_sub(HEADER_LEN)
    }

    pub fn validate(&self) -> GapResult<()> {
        let unsupported = |msg: String| Err(GapError::UnsupportedFormat(msg));

        if self.block_len > MAX_BLOCK_SIZE - 1 || self.block_data_len >= self.block_len {
            return unsupported(format!(
                "Block shape ({}, {}) is not a valid RS(255) code",
                self.block_len, self.block_data_len
            ));
        }
        if self.ec_len() > MAX_EC_SIZE {
            return unsupported(format!("{} parity symbols exceed {MAX_EC_SIZE}", self.ec_len()));
        }
        if self.capacity() >= 1 << 12 {
            return unsupported(format!("Capacity {} needs more than 12 bits", self.capacity()));
        }
        if self.symbol_count < self.codeword_len() {
            return unsupported(format!(
                "Symbol count {} is below codeword length {}",
                self.symbol_count,
                self.codeword_len()
            ));
        }
        if !(1..=8).contains(&self.format_version) || !(1..=8).contains(&self.color_depth) {
            return unsupported("Version and color depth must be within 1..=8".to_string());
        }
        if self.finder_size < MIN_FINDER_SIZE {
            return unsupported(format!(
                "Finder size {} is below {MIN_FINDER_SIZE}",
                self.finder_size
            ));
        }
        if self.modules < 2 * self.finder_size + 4 {
            return unsupported(format!("{} modules cannot hold four finders", self.modules));
        }

        let needed = (self.symbol_count * 8).div_ceil(3);
        let available = Layout::new(self).data_path().count();
        if available < needed {
            return unsupported(format!(
                "Data path holds {available} modules, {needed} are needed"
            ));
        }
        Ok(())
    }
}

// Transfer configuration
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Payload bytes per chunk, header excluded.
    pub chunk_size: usize,
    pub max_file_size: u64,
    /// Allow the receiver to write into a non-empty output directory.
    pub overwrite: bool,
    pub format_version: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CodecConfig::default().max_chunk_payload(),
            max_file_size: 50 * 1024 * 1024,
            overwrite: false,
            format_version: "2.1".to_string(),
        }
    }
}

impl TransferConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}

#[cfg(test)]
mod config_tests {
    use test_case::test_case;

    use super::{CodecConfig, TransferConfig};
    use crate::common::GapError;

    #[test]
    fn test_default_capacity() {
        let cfg = CodecConfig::default();
        assert_eq!(cfg.capacity(), 2895);
        assert_eq!(cfg.grid_size(), 108);
        assert_eq!(cfg.codeword_len(), 3615);
        assert_eq!(cfg.ec_capacity(), 24);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_default_chunk_fits_panel() {
        let cfg = TransferConfig::default();
        assert_eq!(cfg.chunk_size, 2869);
        assert_eq!(cfg.chunk_size + 26, CodecConfig::default().capacity());
    }

    #[test]
    fn test_invalid_shapes() {
        let cfg = CodecConfig { block_len: 300, ..CodecConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = CodecConfig { symbol_count: 100, ..CodecConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = CodecConfig { symbol_count: 5000, ..CodecConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = CodecConfig { block_data_len: 170, ..CodecConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test_case(4, false)]
    #[test_case(0, false)]
    #[test_case(7, true)]
    fn test_finder_size(finder_size: usize, ok: bool) {
        let cfg = CodecConfig { finder_size, ..CodecConfig::default() };
        match cfg.validate() {
            Err(GapError::UnsupportedFormat(_)) => assert!(!ok),
            res => assert_eq!(res.is_ok(), ok),
        }
    }
}
