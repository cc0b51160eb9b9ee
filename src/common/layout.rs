use super::config::CodecConfig;

// Module grid layout shared by builder and reader
//------------------------------------------------------------------------------

/// Fixed geometry of a panel: finder regions, metadata path and data path.
///
/// Coordinates are `(row, col)` in modules, quiet zone included.
#[derive(Debug, Clone)]
pub struct Layout {
    w: usize,
    qz: usize,
    fs: usize,
    reserved: Vec<bool>,
}

impl Layout {
    pub fn new(cfg: &CodecConfig) -> Self {
        let w = cfg.grid_size();
        let mut layout = Self { w, qz: cfg.quiet_zone, fs: cfg.finder_size, reserved: vec![] };

        let mut reserved = vec![false; w * w];
        for (r0, c0) in layout.finder_origins() {
            for r in r0..r0 + layout.fs {
                for c in c0..c0 + layout.fs {
                    reserved[r * w + c] = true;
                }
            }
        }
        for (r, c) in layout.meta_path() {
            reserved[r * w + c] = true;
        }
        layout.reserved = reserved;
        layout
    }

    pub fn width(&self) -> usize {
        self.w
    }

    // Last usable row or column
    fn end(&self) -> usize {
        self.w - self.qz - 1
    }

    /// Top-left module of each finder, ordered TL, TR, BL, BR.
    pub fn finder_origins(&self) -> [(usize, usize); 4] {
        let (lo, hi) = (self.qz, self.w - self.qz - self.fs);
        [(lo, lo), (lo, hi), (hi, lo), (hi, hi)]
    }

    pub fn finder_size(&self) -> usize {
        self.fs
    }

    /// Outer corners of the usable area as continuous `(x, y)` module coordinates, ordered
    /// TL, TR, BL, BR. These are also the outer corners of the four finders.
    pub fn outer_corners(&self) -> [(f64, f64); 4] {
        let (lo, hi) = (self.qz as f64, (self.w - self.qz) as f64);
        [(lo, lo), (hi, lo), (lo, hi), (hi, hi)]
    }

    pub fn is_reserved(&self, r: usize, c: usize) -> bool {
        self.reserved[r * self.w + c]
    }

    /// Metadata path: right of the top-left finder, below it, to its left and above the
    /// bottom-left finder. Each leg is walked towards the quiet zone.
    pub fn meta_path(&self) -> Vec<(usize, usize)> {
        let (qz, fs, end) = (self.qz, self.fs, self.end());
        let band = qz + fs + 1;
        let mut path = Vec::with_capacity(4 * (fs + 1));
        path.extend((end - fs..=end).rev().map(|c| (band, c)));
        path.extend((qz..=qz + fs).rev().map(|r| (r, band)));
        path.extend((qz..=qz + fs).rev().map(|c| (band, c)));
        path.extend((qz..=qz + fs).rev().map(|c| (end - fs - 1, c)));
        path
    }

    /// Data path: five column sweeps from right to left, each column walked bottom to top,
    /// skipping reserved modules.
    pub fn data_path(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (qz, fs, end) = (self.qz, self.fs, self.end());
        let inner_lo = qz + fs + 2;
        let inner_hi = end - fs - 2;

        let sections = [
            (end - fs..=end, inner_lo..=inner_hi),
            (end - fs - 1..=end - fs - 1, qz..=inner_hi),
            (inner_lo..=inner_hi, qz..=end),
            (qz + fs + 1..=qz + fs + 1, qz + fs + 1..=end),
            (qz..=qz + fs, inner_lo..=inner_hi),
        ];

        sections
            .into_iter()
            .flat_map(|(cols, rows)| {
                cols.rev().flat_map(move |c| rows.clone().rev().map(move |r| (r, c)))
            })
            .filter(move |&(r, c)| !self.is_reserved(r, c))
    }
}
