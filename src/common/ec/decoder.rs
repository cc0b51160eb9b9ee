use super::{galois::G, Block, MAX_BLOCK_SIZE, MAX_EC_SIZE};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects the block in place. Returns the number of corrected symbols, or `None` when the
    /// errors exceed half the parity length.
    pub fn rectify(&mut self) -> Option<usize> {
        // Compute syndromes
        let synd = match self.syndromes() {
            Ok(()) => return Some(0),
            Err(s) => s,
        };

        // Error locator polynomial
        let (sig, deg) = self.berlekamp_massey(&synd);
        if deg == 0 || deg > self.parity_len() / 2 {
            return None;
        }

        let err_loc = self.chien_search(&sig);
        let err_count = err_loc.iter().filter(|&&e| e).count();
        if err_count != deg {
            return None;
        }

        // Sigma derivative
        let mut dsig = [G(0); MAX_EC_SIZE];
        for i in (1..MAX_EC_SIZE).step_by(2) {
            dsig[i - 1] = sig[i];
        }

        // Error evaluator
        let omg = self.omega(&synd, &sig);

        // Error magnitude
        let err_mag = self.forney(&omg, &dsig, &err_loc)?;

        // Rectify errors by XORing data with magnitude
        for (i, &g) in err_mag.iter().take(self.n).enumerate() {
            self.cw[i] = (G(self.cw[i]) + g).into();
        }

        match self.syndromes() {
            Ok(()) => Some(err_count),
            Err(_) => None,
        }
    }

    fn syndromes(&self) -> Result<(), [G; MAX_EC_SIZE]> {
        let mut synd = [G(0); MAX_EC_SIZE];

        let mut gdata = [G(0); MAX_BLOCK_SIZE];
        for (i, &b) in self.cw.iter().take(self.n).enumerate() {
            gdata[i] = G(b);
        }
        for (i, e) in synd.iter_mut().take(self.parity_len()).enumerate() {
            *e += eval_poly(gdata.iter().take(self.n).rev(), G::gen_pow(i));
        }

        if synd.iter().all(|s| s.is_zero()) {
            Ok(())
        } else {
            Err(synd)
        }
    }

    // Sigma polynomial and its degree
    fn berlekamp_massey(&self, synd: &[G]) -> ([G; MAX_EC_SIZE + 1], usize) {
        let mut l = 0usize;
        let mut m = 1usize;
        let mut b = G(1);
        let mut cx = [G(0); MAX_EC_SIZE + 1];
        let mut bx = [G(0); MAX_EC_SIZE + 1];
        cx[0] = G(1);
        bx[0] = G(1);

        for n in 0..self.parity_len() {
            // Calculate discrepancy
            let mut d = synd[n];
            for i in 1..=l {
                d += cx[i] * synd[n - i];
            }

            if d.is_zero() {
                m += 1;
                continue;
            }

            // Temporary copy
            let tx = cx;
            let scale = d / b;
            for i in 0..=MAX_EC_SIZE - m {
                cx[i + m] += scale * bx[i];
            }

            if 2 * l <= n {
                bx = tx;
                l = n + 1 - l;
                b = d;
                m = 1;
            } else {
                m += 1;
            }
        }
        (cx, l)
    }

    // Error location polynomial
    fn chien_search(&self, sig: &[G; MAX_EC_SIZE + 1]) -> [bool; MAX_BLOCK_SIZE] {
        let mut err_loc = [false; MAX_BLOCK_SIZE];
        for (i, e) in err_loc[..self.n].iter_mut().rev().enumerate() {
            *e = eval_poly(sig.iter(), G::gen_pow(255 - i)).is_zero();
        }
        err_loc
    }

    // Error evaluator polynomial
    fn omega(&self, synd: &[G; MAX_EC_SIZE], sig: &[G; MAX_EC_SIZE + 1]) -> [G; MAX_EC_SIZE] {
        let t = self.parity_len() - 1;
        let mut omg = [G(0); MAX_EC_SIZE];
        for i in 0..t {
            let sy = synd[i + 1];
            for j in 0..t - i {
                omg[i + j] += sy * sig[j];
            }
        }
        omg
    }

    fn forney(
        &self,
        omg: &[G; MAX_EC_SIZE],
        dsig: &[G; MAX_EC_SIZE],
        err_loc: &[bool; MAX_BLOCK_SIZE],
    ) -> Option<[G; MAX_BLOCK_SIZE]> {
        let mut mag = [G(0); MAX_BLOCK_SIZE];
        for (i, &is_err) in err_loc.iter().take(self.n).rev().enumerate() {
            if !is_err {
                continue;
            }
            let xinv = G::gen_pow(255 - i);
            let omg_x = eval_poly(omg.iter(), xinv);
            let sig_x = eval_poly(dsig.iter(), xinv);
            if sig_x.is_zero() {
                return None;
            }
            mag[self.n - 1 - i] += omg_x / sig_x;
        }
        Some(mag)
    }
}

fn eval_poly<'a>(poly: impl Iterator<Item = &'a G>, x: G) -> G {
    let mut res = G(0);
    let mut xpow = G(1);
    for &coeff in poly {
        res += coeff * xpow;
        xpow *= x;
    }
    res
}
