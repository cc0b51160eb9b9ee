use super::MAX_BLOCK_SIZE;

// Reed-Solomon block
//------------------------------------------------------------------------------

/// One systematic RS(n, k) codeword: `k` message bytes followed by `n - k` parity bytes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct Block {
    pub cw: [u8; MAX_BLOCK_SIZE],
    pub n: usize,
    pub k: usize,
}

impl Block {
    /// Encodes `msg` into a codeword of `n` bytes.
    pub fn encode(msg: &[u8], n: usize) -> Self {
        let k = msg.len();
        debug_assert!(k < n && n < MAX_BLOCK_SIZE, "Invalid block shape ({n}, {k})");
        let mut cw = [0u8; MAX_BLOCK_SIZE];
        cw[..k].copy_from_slice(msg);
        let mut block = Self { cw, n, k };
        block.fill_parity();
        block
    }

    /// Wraps a codeword read off a panel, errors included.
    pub fn received(codeword: &[u8], k: usize) -> Self {
        let n = codeword.len();
        let mut cw = [0u8; MAX_BLOCK_SIZE];
        cw[..n].copy_from_slice(codeword);
        Self { cw, n, k }
    }

    pub fn parity_len(&self) -> usize {
        self.n - self.k
    }

    pub fn codeword(&self) -> &[u8] {
        &self.cw[..self.n]
    }

    #[cfg(test)]
    pub fn codeword_mut(&mut self) -> &mut [u8] {
        &mut self.cw[..self.n]
    }

    pub fn message(&self) -> &[u8] {
        &self.cw[..self.k]
    }
}
