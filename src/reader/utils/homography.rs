use std::ops::{Index, IndexMut};

use crate::common::{GapError, GapResult};

// Projective map from panel grid coordinates onto the photographed image
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone)]
pub struct Homography(pub [f64; 8]);

impl Index<usize> for Homography {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Homography {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Homography {
    /// Computes the matrix mapping `src[i]` onto `dst[i]`, with h33 fixed to 1.
    pub fn compute(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> GapResult<Self> {
        // Two rows per correspondence over the unknowns h11..h32
        let mut a = [[0.0_f64; 8]; 8];
        let mut b = [0.0_f64; 8];

        for i in 0..4 {
            let (x, y) = src[i];
            let (xp, yp) = dst[i];

            a[2 * i] = [-x, -y, -1.0, 0.0, 0.0, 0.0, xp * x, xp * y];
            b[2 * i] = -xp;

            a[2 * i + 1] = [0.0, 0.0, 0.0, -x, -y, -1.0, yp * x, yp * y];
            b[2 * i + 1] = -yp;
        }

        let h = Self::solve_linear_system(a, b)?;

        Ok(Self(h))
    }

    /// Solve 8x8 linear system Ax = b by Gaussian elimination
    fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> GapResult<[f64; 8]> {
        // Forward elimination
        for i in 0..8 {
            // Partial pivot
            let mut max_row = i;
            let mut max_val = a[i][i].abs();
            #[allow(clippy::needless_range_loop)]
            for r in (i + 1)..8 {
                if a[r][i].abs() > max_val {
                    max_val = a[r][i].abs();
                    max_row = r;
                }
            }
            if max_row != i {
                a.swap(i, max_row);
                b.swap(i, max_row);
            }

            if a[i][i].abs() < f64::EPSILON {
                return Err(GapError::SingularMatrix);
            }

            let pivot = a[i][i];
            for c in i..8 {
                a[i][c] /= pivot;
            }
            b[i] /= pivot;

            for r in (i + 1)..8 {
                let factor = a[r][i];
                for c in i..8 {
                    a[r][c] -= factor * a[i][c];
                }
                b[r] -= factor * b[i];
            }
        }

        // Back substitution
        let mut x = [0.0; 8];
        for r in (0..8).rev() {
            let mut sum = 0.0;
            #[allow(clippy::needless_range_loop)]
            for c in (r + 1)..8 {
                sum += a[r][c] * x[c];
            }
            x[r] = (b[r] - sum) / a[r][r];
        }
        Ok(x)
    }

    /// Projects (x, y). Returns None for points mapped to infinity.
    pub fn map(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let xp = self[0] * x + self[1] * y + self[2];
        let yp = self[3] * x + self[4] * y + self[5];
        let w = self[6] * x + self[7] * y + 1.0;

        if w.abs() <= f64::EPSILON {
            return None;
        }
        Some((xp / w, yp / w))
    }
}

#[cfg(test)]
mod homography_tests {
    use super::Homography;
    use crate::common::GapError;

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    fn test_scaled_grid() {
        // 8 pixels per module, offset (20, 30)
        let src = [(4.0, 4.0), (104.0, 4.0), (104.0, 104.0), (4.0, 104.0)];
        let dst = [(52.0, 62.0), (852.0, 62.0), (852.0, 862.0), (52.0, 862.0)];
        let h = Homography::compute(src, dst).unwrap();
        let pts = [(54.0, 54.0), (0.0, 0.0), (108.0, 108.0), (0.5, 107.5)];
        let expected = [(452.0, 462.0), (20.0, 30.0), (884.0, 894.0), (24.0, 890.0)];
        for (pt, exp) in pts.iter().zip(expected) {
            assert_close(h.map(pt.0, pt.1).unwrap(), exp);
        }
    }

    #[test]
    fn test_corner_correspondences() {
        let src = [(4.0, 4.0), (104.0, 4.0), (4.0, 104.0), (104.0, 104.0)];
        let dst = [(52.0, 61.0), (1030.0, 40.0), (70.0, 1010.0), (1055.0, 1049.0)];
        let h = Homography::compute(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst) {
            assert_close(h.map(s.0, s.1).unwrap(), d);
        }
    }

    #[test]
    fn test_singular() {
        let src = [(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        let dst = [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)];
        assert!(matches!(Homography::compute(src, dst), Err(GapError::SingularMatrix)));
    }
}
