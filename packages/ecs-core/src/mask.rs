//! Fixed-size 256-bit component/authority signature.
//!
//! Modeled as four 64-bit lanes rather than a reflection-friendly `HashSet`
//! the way a managed runtime would: a dense, fixed-width integer array is
//! branch-free to AND/OR/compare and maps directly onto a 256-bit SIMD
//! register on platforms that have one. `matches` is the operation the
//! query engine calls once per candidate entity, so it is the one path
//! that gets a hand-written vectorized form; everything else is scalar.

use std::hash::{Hash, Hasher};

pub const LANES: usize = 4;
pub const BITS: usize = LANES * 64;

/// A 256-bit bitmask over component (or authority) ordinals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct BitMask256 {
    lanes: [u64; LANES],
}

impl BitMask256 {
    pub const ZERO: BitMask256 = BitMask256 { lanes: [0; LANES] };

    #[inline]
    pub const fn zero() -> Self {
        Self::ZERO
    }

    #[inline]
    pub fn from_lanes(lanes: [u64; LANES]) -> Self {
        Self { lanes }
    }

    #[inline]
    pub fn lanes(&self) -> [u64; LANES] {
        self.lanes
    }

    #[inline]
    pub fn set_bit(&mut self, ordinal: u16) {
        let (lane, bit) = Self::locate(ordinal);
        self.lanes[lane] |= 1u64 << bit;
    }

    #[inline]
    pub fn clear_bit(&mut self, ordinal: u16) {
        let (lane, bit) = Self::locate(ordinal);
        self.lanes[lane] &= !(1u64 << bit);
    }

    #[inline]
    pub fn test_bit(&self, ordinal: u16) -> bool {
        let (lane, bit) = Self::locate(ordinal);
        (self.lanes[lane] >> bit) & 1 == 1
    }

    #[inline]
    pub fn with_bit(mut self, ordinal: u16) -> Self {
        self.set_bit(ordinal);
        self
    }

    #[inline]
    fn locate(ordinal: u16) -> (usize, u32) {
        debug_assert!((ordinal as usize) < BITS, "component ordinal out of range");
        ((ordinal as usize) / 64, (ordinal as u32) % 64)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.lanes.iter().all(|&l| l == 0)
    }

    #[inline]
    pub fn and(&self, other: &Self) -> Self {
        let mut out = [0u64; LANES];
        for i in 0..LANES {
            out[i] = self.lanes[i] & other.lanes[i];
        }
        Self { lanes: out }
    }

    #[inline]
    pub fn or(&self, other: &Self) -> Self {
        let mut out = [0u64; LANES];
        for i in 0..LANES {
            out[i] = self.lanes[i] | other.lanes[i];
        }
        Self { lanes: out }
    }

    #[inline]
    pub fn not(&self) -> Self {
        let mut out = [0u64; LANES];
        for i in 0..LANES {
            out[i] = !self.lanes[i];
        }
        Self { lanes: out }
    }

    /// `(target & include) == include  &&  (target & exclude) == 0`.
    ///
    /// Dispatches to the vectorized path when the running CPU supports it
    /// and falls back to the scalar form otherwise; both must be
    /// bit-identical for any input, which is covered by a property test.
    #[inline]
    pub fn matches(target: &Self, include: &Self, exclude: &Self) -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx2") {
                // SAFETY: guarded by the runtime feature check above.
                return unsafe { simd::matches_avx2(target, include, exclude) };
            }
        }
        scalar::matches(target, include, exclude)
    }
}

impl Hash for BitMask256 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hashing is defined over the raw lanes so that identical bytes
        // always produce the identical hash regardless of which match
        // implementation a build was compiled with.
        for lane in &self.lanes {
            lane.hash(state);
        }
    }
}

mod scalar {
    use super::{BitMask256, LANES};

    #[inline]
    pub fn matches(target: &BitMask256, include: &BitMask256, exclude: &BitMask256) -> bool {
        for i in 0..LANES {
            let t = target.lanes[i];
            if t & include.lanes[i] != include.lanes[i] {
                return false;
            }
            if t & exclude.lanes[i] != 0 {
                return false;
            }
        }
        true
    }
}

#[cfg(target_arch = "x86_64")]
mod simd {
    use super::BitMask256;
    use std::arch::x86_64::*;

    /// # Safety
    /// Caller must have verified `avx2` is available via
    /// `is_x86_feature_detected!("avx2")`.
    #[target_feature(enable = "avx2")]
    pub unsafe fn matches_avx2(
        target: &BitMask256,
        include: &BitMask256,
        exclude: &BitMask256,
    ) -> bool {
        let t = _mm256_loadu_si256(target.lanes.as_ptr() as *const __m256i);
        let inc = _mm256_loadu_si256(include.lanes.as_ptr() as *const __m256i);
        let exc = _mm256_loadu_si256(exclude.lanes.as_ptr() as *const __m256i);

        // (t & inc) == inc  <=>  ~t & inc == 0, i.e. inc is a subset of t.
        let missing_included = _mm256_andnot_si256(t, inc);
        let any_missing = _mm256_testz_si256(missing_included, missing_included) == 0;
        if any_missing {
            return false;
        }

        let excluded_hit = _mm256_and_si256(t, exc);
        _mm256_testz_si256(excluded_hit, excluded_hit) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clear_test_roundtrip() {
        let mut m = BitMask256::zero();
        assert!(!m.test_bit(200));
        m.set_bit(200);
        assert!(m.test_bit(200));
        m.clear_bit(200);
        assert!(!m.test_bit(200));
    }

    #[test]
    fn match_basic() {
        let mut target = BitMask256::zero();
        target.set_bit(3);
        target.set_bit(10);
        let mut include = BitMask256::zero();
        include.set_bit(3);
        let exclude = BitMask256::zero();
        assert!(BitMask256::matches(&target, &include, &exclude));

        let mut exclude2 = BitMask256::zero();
        exclude2.set_bit(10);
        assert!(!BitMask256::matches(&target, &include, &exclude2));
    }

    #[test]
    fn match_empty_include_nonempty_exclude() {
        let mut target = BitMask256::zero();
        target.set_bit(5);
        let include = BitMask256::zero();
        let mut exclude = BitMask256::zero();
        exclude.set_bit(7);
        assert!(BitMask256::matches(&target, &include, &exclude));
        exclude.set_bit(5);
        assert!(!BitMask256::matches(&target, &include, &exclude));
    }

    #[test]
    fn scalar_and_simd_agree() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..2000 {
            let t = BitMask256::from_lanes([rng.gen(), rng.gen(), rng.gen(), rng.gen()]);
            let i = BitMask256::from_lanes([rng.gen(), rng.gen(), rng.gen(), rng.gen()]);
            let e = BitMask256::from_lanes([rng.gen(), rng.gen(), rng.gen(), rng.gen()]);
            let scalar_result = scalar::matches(&t, &i, &e);
            assert_eq!(BitMask256::matches(&t, &i, &e), scalar_result);
        }
    }

    #[test]
    fn hash_stable_over_bytes() {
        use std::collections::hash_map::DefaultHasher;
        let a = BitMask256::from_lanes([1, 2, 3, 4]);
        let b = BitMask256::from_lanes([1, 2, 3, 4]);
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn bool_ops() {
        let a = BitMask256::from_lanes([0b1010, 0, 0, 0]);
        let b = BitMask256::from_lanes([0b0110, 0, 0, 0]);
        assert_eq!(a.and(&b).lanes()[0], 0b0010);
        assert_eq!(a.or(&b).lanes()[0], 0b1110);
        assert_eq!(a.not().lanes()[0], !0b1010u64);
    }
}
