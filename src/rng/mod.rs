//! Seeded random number generator for permutation replicates
//!
//! Mersenne Twister with the LCG seeding used by R's `set.seed()`, so a
//! replicate seed reproduces the same label shuffle as `sample()` in R.

/// Mersenne Twister (MT19937) seeded through a 69069 LCG
pub struct MersenneTwister {
    state: [u32; 624],
    index: usize,
}

impl MersenneTwister {
    const N: usize = 624;
    const M: usize = 397;
    const MATRIX_A: u32 = 0x9908_B0DF;
    const UPPER_MASK: u32 = 0x8000_0000;
    const LOWER_MASK: u32 = 0x7FFF_FFFF;
    /// 2^-32
    const I2_32M1: f64 = 2.328_306_436_538_696_3e-10;

    /// Seed the generator the way `set.seed(seed)` does
    pub fn new(seed: u32) -> Self {
        let mut lcg = seed;
        let mut step = || {
            lcg = lcg.wrapping_mul(69069).wrapping_add(1);
            lcg
        };
        // 50 scrambling rounds, then one word that holds the position counter
        for _ in 0..51 {
            step();
        }
        let mut state = [0u32; Self::N];
        for word in state.iter_mut() {
            *word = step();
        }
        Self {
            state,
            index: Self::N,
        }
    }

    fn twist(&mut self) {
        for i in 0..Self::N {
            let y = (self.state[i] & Self::UPPER_MASK) | (self.state[(i + 1) % Self::N] & Self::LOWER_MASK);
            let mut next = self.state[(i + Self::M) % Self::N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= Self::MATRIX_A;
            }
            self.state[i] = next;
        }
        self.index = 0;
    }

    fn next_u32(&mut self) -> u32 {
        if self.index >= Self::N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^ (y >> 18)
    }

    /// Uniform draw in the open interval (0, 1)
    pub fn runif(&mut self) -> f64 {
        let u = self.next_u32() as f64 * Self::I2_32M1;
        if u <= 0.0 {
            0.5 * Self::I2_32M1
        } else if u >= 1.0 {
            1.0 - 0.5 * Self::I2_32M1
        } else {
            u
        }
    }

    /// Random index in `0..n` by rejection sampling on random bits
    ///
    /// Draws below the next power of two until one falls under `n`.
    pub fn unif_index(&mut self, n: usize) -> usize {
        if n <= 1 {
            // one draw is still consumed for n == 1
            if n == 1 {
                self.rbits(0);
            }
            return 0;
        }
        let bits = (n as f64).log2().ceil() as u32;
        loop {
            let v = self.rbits(bits);
            if (v as usize) < n {
                return v as usize;
            }
        }
    }

    /// `bits` random bits assembled from 16-bit chunks of uniforms
    fn rbits(&mut self, bits: u32) -> u64 {
        let mut v: u64 = 0;
        let mut n = 0;
        while n <= bits {
            let v1 = (self.runif() * 65536.0).floor() as u64;
            v = v.wrapping_mul(65536).wrapping_add(v1);
            n += 16;
        }
        if bits >= 64 {
            v
        } else {
            v & ((1u64 << bits) - 1)
        }
    }

    /// Random permutation of `0..n`, drawn like `sample(n)`
    pub fn sample(&mut self, n: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..n).collect();
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        for _ in 0..n {
            let j = self.unif_index(remaining);
            out.push(pool[j]);
            remaining -= 1;
            pool[j] = pool[remaining];
        }
        out
    }

    /// Shuffle a slice into a new vector using `sample()` order
    pub fn shuffled<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        self.sample(items.len())
            .into_iter()
            .map(|i| items[i].clone())
            .collect()
    }
}
