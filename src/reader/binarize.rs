use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;

// Binarized view of a photographed panel
//------------------------------------------------------------------------------
// The mask marks dark pixels with 255 and everything else with 0, so finder rings and stones
// become foreground for contour tracing. Dark palette colors may join them, which is harmless
// since finders are fenced off by light separators.

#[derive(Debug, Clone)]
pub struct BinaryImage {
    pub rgb: RgbImage,
    pub gray: GrayImage,
    pub mask: GrayImage,
    pub threshold: u8,
}

impl BinaryImage {
    pub fn prepare(rgb: RgbImage) -> Self {
        let gray = imageops::grayscale(&rgb);
        let threshold = otsu_level(&gray);
        let mask = gray.binarize(threshold);
        Self { rgb, gray, mask, threshold }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

pub trait Binarize {
    /// Inverted threshold: pixels at or below `threshold` become 255.
    fn binarize(&self, threshold: u8) -> GrayImage;
}

impl Binarize for GrayImage {
    fn binarize(&self, threshold: u8) -> GrayImage {
        let (w, h) = self.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let Luma([v]) = *self.get_pixel(x, y);
            Luma([if v <= threshold { 255 } else { 0 }])
        })
    }
}
