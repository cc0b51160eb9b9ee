use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub};

// Log and antilog tables for GF(256) with primitive polynomial 0x11d
//------------------------------------------------------------------------------

pub const PRIMITIVE: u16 = 0x11d;

const fn build_tables() -> ([u8; 256], [u8; 256]) {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    exp[255] = exp[0];
    (exp, log)
}

const TABLES: ([u8; 256], [u8; 256]) = build_tables();

pub static EXP_TABLE: [u8; 256] = TABLES.0;

pub static LOG_TABLE: [u8; 256] = TABLES.1;

// Galois field element
//------------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct G(pub u8);

impl G {
    /// Alpha raised to the power i
    #[inline]
    pub fn gen_pow(i: usize) -> Self {
        Self(EXP_TABLE[i % 255])
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<G> for u8 {
    fn from(g: G) -> Self {
        g.0
    }
}

impl Add for G {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl AddAssign for G {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Sub for G {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Mul for G {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        if self.0 == 0 || rhs.0 == 0 {
            return Self(0);
        }
        let log_sum = LOG_TABLE[self.0 as usize] as usize + LOG_TABLE[rhs.0 as usize] as usize;
        Self(EXP_TABLE[log_sum % 255])
    }
}

impl MulAssign for G {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Div for G {
    type Output = Self;

    // Division by zero yields zero. Callers check the divisor first.
    #[inline]
    fn div(self, rhs: Self) -> Self {
        debug_assert!(rhs.0 != 0, "Division by zero in GF(256)");
        if self.0 == 0 || rhs.0 == 0 {
            return Self(0);
        }
        let log_diff =
            255 + LOG_TABLE[self.0 as usize] as usize - LOG_TABLE[rhs.0 as usize] as usize;
        Self(EXP_TABLE[log_diff % 255])
    }
}
