mod block;
mod decoder;
mod encoder;
pub(crate) mod galois;

pub(crate) use block::*;

pub const MAX_BLOCK_SIZE: usize = 256;

pub const MAX_EC_SIZE: usize = 64;

// Splits a padded message into blocks and computes parity for each
//------------------------------------------------------------------------------

/// Encodes `msg` as consecutive RS(n, k) codewords. `msg.len()` must be a multiple of `k`.
pub(crate) fn encode_blocks(msg: &[u8], n: usize, k: usize) -> Vec<u8> {
    debug_assert!(msg.len() % k == 0, "Message {} is not a multiple of {k}", msg.len());
    let mut out = Vec::with_capacity(msg.len() / k * n);
    for chunk in msg.chunks_exact(k) {
        out.extend_from_slice(Block::encode(chunk, n).codeword());
    }
    out
}
