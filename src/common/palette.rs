use image::Rgb;

// Palettes
//------------------------------------------------------------------------------

const META_COLORS: [Rgb<u8>; 4] = [
    Rgb([255, 0, 0]),     // 00
    Rgb([0, 255, 0]),     // 01
    Rgb([0, 0, 255]),     // 10
    Rgb([255, 255, 255]), // 11
];

const DATA_COLORS: [Rgb<u8>; 8] = [
    Rgb([255, 0, 0]),     // 000
    Rgb([0, 255, 0]),     // 001
    Rgb([0, 0, 255]),     // 010
    Rgb([255, 255, 0]),   // 011
    Rgb([255, 0, 255]),   // 100
    Rgb([0, 255, 255]),   // 101
    Rgb([255, 255, 255]), // 110
    Rgb([0, 0, 0]),       // 111
];

pub const DARK: Rgb<u8> = Rgb([0, 0, 0]);

pub const LIGHT: Rgb<u8> = Rgb([255, 255, 255]);

/// Color alphabet of a grid channel. The symbol value of a color is its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// Four colors, 2 bits per module. Metadata channel.
    Quad,
    /// Eight colors, 3 bits per module. Data channel.
    Octal,
}

impl Palette {
    pub const fn bits(self) -> usize {
        match self {
            Self::Quad => 2,
            Self::Octal => 3,
        }
    }

    pub fn colors(self) -> &'static [Rgb<u8>] {
        match self {
            Self::Quad => &META_COLORS,
            Self::Octal => &DATA_COLORS,
        }
    }

    pub fn color(self, sym: u16) -> Rgb<u8> {
        let colors = self.colors();
        colors[sym as usize % colors.len()]
    }

    /// Nearest palette symbol by squared RGB distance, with that distance.
    pub fn classify(self, px: Rgb<u8>) -> (u16, u32) {
        let mut best = (0u16, u32::MAX);
        for (i, c) in self.colors().iter().enumerate() {
            let d = dist_sq(px, *c);
            if d < best.1 {
                best = (i as u16, d);
            }
        }
        best
    }
}

pub fn dist_sq(a: Rgb<u8>, b: Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}
