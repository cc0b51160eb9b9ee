use std::{ops::Deref, path::Path};

use image::{ImageFormat, Rgb, RgbImage};

use crate::common::{
    BitStream, CodecConfig, GapResult, Layout, Metadata, Palette, DARK, LIGHT,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Rgb<u8>),
    Meta(u8),
    Data(u8),
}

impl Deref for Module {
    type Target = Rgb<u8>;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &LIGHT,
            Module::Func(c) => c,
            Module::Meta(s) => &Palette::Quad.colors()[*s as usize],
            Module::Data(s) => &Palette::Octal.colors()[*s as usize],
        }
    }
}

/// A built module grid, quiet zone included.
#[derive(Debug, Clone)]
pub struct Panel {
    grid: Vec<Module>,
    w: usize,
    meta: Metadata,
}

// Panel type for builder
//------------------------------------------------------------------------------

impl Panel {
    pub fn new(cfg: &CodecConfig, meta: Metadata) -> Self {
        let w = cfg.grid_size();
        Self { grid: vec![Module::Empty; w * w], w, meta }
    }

    pub fn grid(&self) -> &[Module] {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn metadata(&self) -> Metadata {
        self.meta
    }

    pub fn get(&self, r: usize, c: usize) -> Module {
        self.grid[r * self.w + c]
    }

    pub fn set(&mut self, r: usize, c: usize, module: Module) {
        self.grid[r * self.w + c] = module;
    }
}

// Function patterns and channels
//------------------------------------------------------------------------------

impl Panel {
    pub fn draw_finders(&mut self, layout: &Layout) {
        let fs = layout.finder_size();
        for (r0, c0) in layout.finder_origins() {
            for i in 0..fs {
                for j in 0..fs {
                    let ring = i == 0 || j == 0 || i == fs - 1 || j == fs - 1;
                    let stone = (2..fs - 2).contains(&i) && (2..fs - 2).contains(&j);
                    let clr = if ring || stone { DARK } else { LIGHT };
                    self.set(r0 + i, c0 + j, Module::Func(clr));
                }
            }
        }
    }

    pub fn draw_metadata(&mut self, layout: &Layout, bits: &BitStream) {
        let bpm = Palette::Quad.bits();
        let mut cur = bits.cursor();
        for (r, c) in layout.meta_path() {
            match cur.advance(bpm) {
                Some(sym) => self.set(r, c, Module::Meta(sym as u8)),
                None => break,
            }
        }
    }

    /// Paints symbols along the data path until the stream runs dry. Returns modules painted.
    pub fn draw_data(&mut self, layout: &Layout, bits: &BitStream) -> usize {
        let bpm = Palette::Octal.bits();
        let mut cur = bits.cursor();
        let mut painted = 0;
        for (r, c) in layout.data_path() {
            let Some(sym) = cur.advance(bpm) else { break };
            self.set(r, c, Module::Data(sym as u8));
            painted += 1;
        }
        debug_assert!(cur.remaining() == 0, "{} bits left unpainted", cur.remaining());
        painted
    }
}

// Render
//------------------------------------------------------------------------------

impl Panel {
    /// Nearest-neighbour upscale: every module becomes a `scale` x `scale` block.
    pub fn to_image(&self, scale: u32) -> RgbImage {
        let scale = scale.max(1);
        let total_sz = self.w as u32 * scale;

        let mut canvas = RgbImage::new(total_sz, total_sz);
        for i in 0..total_sz {
            for j in 0..total_sz {
                let r = (i / scale) as usize;
                let c = (j / scale) as usize;
                canvas.put_pixel(j, i, *self.get(r, c));
            }
        }
        canvas
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, scale: u32) -> GapResult<()> {
        self.to_image(scale).save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

#[cfg(test)]
mod panel_tests {
    use image::Rgb;

    use super::{Module, Panel};
    use crate::common::{CodecConfig, Layout, Metadata, DARK, LIGHT};

    #[test]
    fn test_finder_rings() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let mut panel = Panel::new(&cfg, Metadata::new(&cfg, 0));
        panel.draw_finders(&layout);

        for (r0, c0) in layout.finder_origins() {
            assert_eq!(panel.get(r0, c0), Module::Func(DARK));
            assert_eq!(panel.get(r0 + 1, c0 + 1), Module::Func(LIGHT));
            assert_eq!(panel.get(r0 + 2, c0 + 2), Module::Func(DARK));
            assert_eq!(panel.get(r0 + 3, c0 + 3), Module::Func(DARK));
            assert_eq!(panel.get(r0 + 5, c0 + 3), Module::Func(LIGHT));
            assert_eq!(panel.get(r0 + 6, c0 + 3), Module::Func(DARK));
        }
        assert_eq!(panel.get(11, 11), Module::Empty);
    }

    #[test]
    fn test_render_scale() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let mut panel = Panel::new(&cfg, Metadata::new(&cfg, 0));
        panel.draw_finders(&layout);
        panel.set(50, 60, Module::Data(3));

        let img = panel.to_image(3);
        assert_eq!(img.dimensions(), (324, 324));
        assert_eq!(*img.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*img.get_pixel(12, 12), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(60 * 3 + 2, 50 * 3 + 1), Rgb([255, 255, 0]));
    }
}
