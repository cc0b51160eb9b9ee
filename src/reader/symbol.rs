use image::{Rgb, RgbImage};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::common::{
    ec::Block, f64_to_i32, BitStream, CodecConfig, GapError, GapResult, Layout, Metadata, Palette,
    LIGHT,
};

use super::utils::homography::Homography;

// Rectified panel
//------------------------------------------------------------------------------

/// One sampled color per module, quiet zone included.
#[derive(Debug, Clone)]
pub struct Symbol {
    grid: RgbImage,
}

impl Symbol {
    /// Samples each module center through `h`. Centers falling outside the image read as light.
    pub fn sample(img: &RgbImage, h: &Homography, width: usize) -> Self {
        let (iw, ih) = img.dimensions();
        let w = width as u32;
        let grid = RgbImage::from_fn(w, w, |c, r| {
            h.map(c as f64 + 0.5, r as f64 + 0.5)
                .and_then(|(x, y)| Some((f64_to_i32(x)?, f64_to_i32(y)?)))
                .filter(|&(x, y)| x >= 0 && y >= 0 && (x as u32) < iw && (y as u32) < ih)
                .map_or(LIGHT, |(x, y)| *img.get_pixel(x as u32, y as u32))
        });
        Self { grid }
    }

    pub fn from_grid(grid: RgbImage) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &RgbImage {
        &self.grid
    }

    pub fn get(&self, r: usize, c: usize) -> Rgb<u8> {
        *self.grid.get_pixel(c as u32, r as u32)
    }
}

// Channels
//------------------------------------------------------------------------------

impl Symbol {
    pub fn read_metadata(&self, layout: &Layout) -> GapResult<Metadata> {
        let path = layout.meta_path();
        let bpm = Palette::Quad.bits();
        let mut bits = BitStream::new(path.len() * bpm);
        for (r, c) in path {
            let (sym, _) = Palette::Quad.classify(self.get(r, c));
            bits.push_bits(sym, bpm);
        }
        Metadata::from_bits(&bits)
    }

    /// Classifies data modules until `count` codeword bytes are collected. The second value is
    /// the worst nearest-palette distance seen.
    pub fn read_codewords(&self, layout: &Layout, count: usize) -> (Vec<u8>, u32) {
        let bpm = Palette::Octal.bits();
        let need = count * 8;
        let mut bits = BitStream::new(need.div_ceil(bpm) * bpm);
        let mut worst = 0;
        for (r, c) in layout.data_path() {
            if bits.len() >= need {
                break;
            }
            let (sym, dist) = Palette::Octal.classify(self.get(r, c));
            worst = worst.max(dist);
            bits.push_bits(sym, bpm);
        }

        let mut bytes = bits.into_bytes();
        bytes.resize(count, 0);
        (bytes, worst)
    }

    /// Full decode: metadata, codewords, then Reed-Solomon correction per block.
    pub fn decode(&self, cfg: &CodecConfig, layout: &Layout) -> GapResult<Vec<u8>> {
        let meta = self.read_metadata(layout)?;
        meta.check(cfg)?;
        debug!("Read metadata {meta}");

        let (codewords, worst) = self.read_codewords(layout, cfg.symbol_count);
        if worst > cfg.quality_warning {
            warn!("Poor color separation, worst module is {worst} away from its palette color");
        }

        let payload = correct_blocks(&codewords, cfg)?;

        let cap = payload.len();
        let len = if meta.payload_len > cap {
            warn!("Metadata claims {} bytes, clamping to capacity {cap}", meta.payload_len);
            cap
        } else {
            meta.payload_len
        };
        let mut payload = payload;
        payload.truncate(len);
        Ok(payload)
    }
}

/// Corrects each block in place and concatenates their data bytes.
pub fn correct_blocks(codewords: &[u8], cfg: &CodecConfig) -> GapResult<Vec<u8>> {
    let (n, k) = (cfg.block_len, cfg.block_data_len);
    let blocks: Vec<Vec<u8>> = codewords[..cfg.codeword_len()]
        .par_chunks(n)
        .enumerate()
        .map(|(i, cw)| {
            let mut blk = Block::received(cw, k);
            let fixed = blk.rectify().ok_or(GapError::UncorrectableBlock(i))?;
            if fixed > 0 {
                debug!("Corrected {fixed} errors in block {i}");
            }
            Ok(blk.message().to_vec())
        })
        .collect::<GapResult<_>>()?;
    Ok(blocks.concat())
}

#[cfg(test)]
mod symbol_tests {
    use image::RgbImage;

    use super::{correct_blocks, Symbol};
    use crate::{
        builder::PanelBuilder,
        common::{ec::encode_blocks, CodecConfig, GapError, Layout, LIGHT},
        reader::utils::homography::Homography,
    };

    #[test]
    fn test_identity_sampling_round_trip() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let data = b"sampled straight off the grid".to_vec();
        let panel = PanelBuilder::new(&cfg).build(&data).unwrap();

        let img = panel.to_image(1);
        let corners = layout.outer_corners();
        let h = Homography::compute(corners, corners).unwrap();
        let sym = Symbol::sample(&img, &h, cfg.grid_size());

        assert_eq!(sym.read_metadata(&layout).unwrap(), panel.metadata());
        assert_eq!(sym.decode(&cfg, &layout).unwrap(), data);
    }

    #[test]
    fn test_outside_samples_are_light() {
        let img = RgbImage::new(10, 10);
        let src = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let dst = [(100.0, 100.0), (101.0, 100.0), (100.0, 101.0), (101.0, 101.0)];
        let h = Homography::compute(src, dst).unwrap();
        let sym = Symbol::sample(&img, &h, 4);
        assert!(sym.grid().pixels().all(|p| *p == LIGHT));
    }

    #[test]
    fn test_uncorrectable_block_index() {
        let cfg = CodecConfig::default();
        let msg: Vec<u8> = (0..cfg.capacity()).map(|i| (i * 7) as u8).collect();
        let mut cw = encode_blocks(&msg, cfg.block_len, cfg.block_data_len);
        cw.resize(cfg.symbol_count, 0);
        assert_eq!(correct_blocks(&cw, &cfg).unwrap(), msg);

        // Block 2 gets 25 symbol errors, one past its correction limit
        let start = 2 * cfg.block_len;
        for b in &mut cw[start..start + 25] {
            *b ^= 0x5a;
        }
        assert!(matches!(correct_blocks(&cw, &cfg), Err(GapError::UncorrectableBlock(2))));
    }
}
