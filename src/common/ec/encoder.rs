use super::{galois::G, Block};

// Generator polynomial: product of (x - a^i) for i in 0..plen, highest degree first
//------------------------------------------------------------------------------

pub(crate) fn generator_poly(plen: usize) -> Vec<G> {
    let mut gen = vec![G(1)];
    for i in 0..plen {
        let root = G::gen_pow(i);
        let mut next = vec![G(0); gen.len() + 1];
        for (j, &c) in gen.iter().enumerate() {
            next[j] += c;
            next[j + 1] += c * root;
        }
        gen = next;
    }
    gen
}

// Parity
//------------------------------------------------------------------------------

impl Block {
    pub(crate) fn fill_parity(&mut self) {
        let parity = parity_bytes(self.message(), self.parity_len());
        self.cw[self.k..self.n].copy_from_slice(&parity);
    }
}

/// Remainder of `msg * x^plen` divided by the generator polynomial.
pub(crate) fn parity_bytes(msg: &[u8], plen: usize) -> Vec<u8> {
    let gen = generator_poly(plen);
    let mut rem = msg.to_vec();
    rem.resize(msg.len() + plen, 0);

    for i in 0..msg.len() {
        let lead = G(rem[i]);
        if lead.is_zero() {
            continue;
        }
        for (u, &v) in rem[i + 1..].iter_mut().zip(&gen[1..]) {
            *u ^= u8::from(lead * v);
        }
    }
    rem.split_off(msg.len())
}
