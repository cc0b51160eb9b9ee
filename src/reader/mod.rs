mod binarize;
mod finder;
mod symbol;
mod utils;

pub use symbol::Symbol;

use std::path::Path;

use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::common::{CodecConfig, GapError, GapResult, Layout};
use binarize::BinaryImage;
use finder::{locate_finders, outer_corners};
use utils::homography::Homography;

/// Recovers chunk payloads from panel captures.
pub struct PanelReader {
    cfg: CodecConfig,
    layout: Layout,
}

impl PanelReader {
    pub fn new(cfg: &CodecConfig) -> Self {
        Self { cfg: cfg.clone(), layout: Layout::new(cfg) }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.cfg
    }

    pub fn read(&self, img: &DynamicImage) -> GapResult<Vec<u8>> {
        self.read_rgb(img.to_rgb8())
    }

    pub fn read_rgb(&self, img: RgbImage) -> GapResult<Vec<u8>> {
        let symbol = self.rectify(img)?;
        symbol.decode(&self.cfg, &self.layout)
    }

    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> GapResult<Vec<u8>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GapError::FileNotFound(path.to_path_buf()));
        }
        debug!("Reading panel {}", path.display());
        self.read(&image::open(path)?)
    }

    /// Locates the finders and samples every module of the panel through the fitted
    /// homography.
    pub fn rectify(&self, img: RgbImage) -> GapResult<Symbol> {
        self.cfg.validate()?;
        let img = BinaryImage::prepare(img);
        let finders = locate_finders(&img, self.cfg.min_stone_area)?;
        let corners = outer_corners(&finders);
        debug!("Finder corners {corners:?}");

        let h = Homography::compute(self.layout.outer_corners(), corners)?;
        Ok(Symbol::sample(&img.rgb, &h, self.layout.width()))
    }
}

#[cfg(test)]
mod reader_tests {
    use test_case::test_case;

    use super::PanelReader;
    use crate::{
        builder::{Module, Panel, PanelBuilder},
        common::{CodecConfig, GapError, Layout},
    };

    fn full_payload(cfg: &CodecConfig) -> Vec<u8> {
        (0..cfg.capacity()).map(|i| (i * 31 + 7) as u8).collect()
    }

    // Flips all three bits of one module inside each of the first `count` codeword bytes
    fn corrupt(panel: &mut Panel, layout: &Layout, count: usize) {
        let path: Vec<_> = layout.data_path().collect();
        for j in 0..count {
            let (r, c) = path[(8 * j).div_ceil(3)];
            if let Module::Data(s) = panel.get(r, c) {
                panel.set(r, c, Module::Data(s ^ 0b111));
            }
        }
    }

    #[test_case(10, b"".to_vec(); "empty")]
    #[test_case(10, b"a single panel".to_vec(); "short")]
    #[test_case(4, vec![0xa5; 1500]; "small scale")]
    fn test_round_trip(scale: u32, data: Vec<u8>) {
        let cfg = CodecConfig::default();
        let panel = PanelBuilder::new(&cfg).build(&data).unwrap();
        let reader = PanelReader::new(&cfg);
        assert_eq!(reader.read_rgb(panel.to_image(scale)).unwrap(), data);
    }

    #[test]
    fn test_corrects_up_to_limit() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let data = full_payload(&cfg);
        let mut panel = PanelBuilder::new(&cfg).build(&data).unwrap();
        corrupt(&mut panel, &layout, cfg.ec_capacity());

        let reader = PanelReader::new(&cfg);
        assert_eq!(reader.read_rgb(panel.to_image(cfg.scale)).unwrap(), data);
    }

    #[test]
    fn test_fails_past_limit() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let mut panel = PanelBuilder::new(&cfg).build(&full_payload(&cfg)).unwrap();
        corrupt(&mut panel, &layout, cfg.ec_capacity() + 1);

        let reader = PanelReader::new(&cfg);
        let res = reader.read_rgb(panel.to_image(cfg.scale));
        assert!(matches!(res, Err(GapError::UncorrectableBlock(0))));
    }

    #[test]
    fn test_missing_file() {
        let reader = PanelReader::new(&CodecConfig::default());
        let res = reader.read_path("no/such/panel.png");
        assert!(matches!(res, Err(GapError::FileNotFound(_))));
    }
}
