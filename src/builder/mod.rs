mod panel;

pub use panel::{Module, Panel};

use std::path::Path;

use rand::RngCore;
use tracing::debug;

use crate::common::{
    ec::encode_blocks, BitStream, CodecConfig, GapError, GapResult, Layout, Metadata, Palette,
};

/// Renders chunk payloads into panels.
pub struct PanelBuilder {
    cfg: CodecConfig,
    layout: Layout,
}

impl PanelBuilder {
    pub fn new(cfg: &CodecConfig) -> Self {
        Self { cfg: cfg.clone(), layout: Layout::new(cfg) }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.cfg
    }

    pub fn build(&self, data: &[u8]) -> GapResult<Panel> {
        let cap = self.cfg.capacity();
        if data.len() > cap {
            return Err(GapError::PayloadTooLarge { size: data.len(), capacity: cap });
        }
        self.cfg.validate()?;

        let meta = Metadata::new(&self.cfg, data.len());
        debug!("Building panel {meta}");

        let meta_bits = meta.to_bits(self.layout.meta_path().len() * Palette::Quad.bits())?;
        let data_bits = self.payload_bits(data);

        let mut panel = Panel::new(&self.cfg, meta);
        panel.draw_finders(&self.layout);
        panel.draw_metadata(&self.layout, &meta_bits);
        let painted = panel.draw_data(&self.layout, &data_bits);
        debug!("Painted {painted} data modules");

        Ok(panel)
    }

    /// Builds the panel and writes it as a PNG scaled by the configured factor.
    pub fn write<P: AsRef<Path>>(&self, data: &[u8], path: P) -> GapResult<Panel> {
        let panel = self.build(data)?;
        panel.save(path, self.cfg.scale)?;
        Ok(panel)
    }

    // Random padding up to capacity, RS blocks, zero padding up to the symbol count, then zero
    // bits up to a whole number of modules
    fn payload_bits(&self, data: &[u8]) -> BitStream {
        let mut msg = vec![0u8; self.cfg.capacity()];
        msg[..data.len()].copy_from_slice(data);
        rand::rng().fill_bytes(&mut msg[data.len()..]);

        let mut codewords = encode_blocks(&msg, self.cfg.block_len, self.cfg.block_data_len);
        codewords.resize(self.cfg.symbol_count, 0);

        let bpm = Palette::Octal.bits();
        let bit_len = (codewords.len() * 8).div_ceil(bpm) * bpm;
        let mut bits = BitStream::new(bit_len);
        bits.extend(&codewords);
        while bits.len() < bit_len {
            bits.push(false);
        }
        bits
    }
}
