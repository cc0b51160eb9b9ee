use num_traits::PrimInt;

// Bit stream
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitStream {
    data: Vec<u8>,
    // Bit length
    len: usize,
    // Max bit capacity
    capacity: usize,
}

impl BitStream {
    pub fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity.div_ceil(8)), len: 0, capacity }
    }

    pub fn from(inp: &[u8]) -> Self {
        let bit_len = inp.len() << 3;
        Self { data: inp.to_vec(), len: bit_len, capacity: bit_len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len.div_ceil(8)]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.len.div_ceil(8));
        self.data
    }

    pub fn cursor(&self) -> BitCursor<'_> {
        BitCursor { data: &self.data, len: self.len, pos: 0 }
    }
}

// Push bits for bit stream
//------------------------------------------------------------------------------

impl BitStream {
    /// Appends the lowest `size` bits of `bits`, most significant first. `size` is at most 16.
    pub fn push_bits<T: PrimInt>(&mut self, bits: T, size: usize) {
        debug_assert!(size <= 16, "Cannot push more than 16 bits at once: Size {size}");
        debug_assert!(
            self.len + size <= self.capacity,
            "Insufficient capacity: Capacity {}, Size {}",
            self.capacity,
            self.len + size
        );

        let bits = bits.to_u32().unwrap_or(0);
        for i in (0..size).rev() {
            self.push((bits >> i) & 1 == 1);
        }
    }

    pub fn push(&mut self, bit: bool) {
        let offset = self.len & 7;
        if offset == 0 {
            self.data.push(0);
        }
        if bit {
            let pos = self.len >> 3;
            self.data[pos] |= 0b1000_0000 >> offset;
        }
        self.len += 1;
    }

    pub fn extend(&mut self, arr: &[u8]) {
        if self.len & 7 == 0 {
            self.data.truncate(self.len >> 3);
            self.data.extend_from_slice(arr);
            self.len += arr.len() << 3;
        } else {
            arr.iter().for_each(|&b| self.push_bits(b, 8));
        }
    }
}

// Cursor which walks a bit stream symbol by symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    len: usize,
    pos: usize,
}

impl BitCursor<'_> {
    /// Takes the next `n` bits, most significant first. `None` once fewer than `n` remain.
    pub fn advance(&mut self, n: usize) -> Option<u16> {
        debug_assert!(n <= 16, "Cannot take more than 16 bits: N {n}");
        if n > self.remaining() {
            return None;
        }

        let mut res = 0u16;
        for i in self.pos..self.pos + n {
            let bit = (self.data[i >> 3] >> (7 - (i & 7))) & 1;
            res = (res << 1) | bit as u16;
        }
        self.pos += n;
        Some(res)
    }

    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }
}
