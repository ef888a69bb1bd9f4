use crate::binary::{Binary, Format};

macro_rules! impl_binary {
    ($t:ty, $bits:ty, $format:expr) => {
        impl Binary for $t {
            const FORMAT: Format = $format;

            #[inline]
            fn to_raw(self) -> u64 {
                self.to_bits() as u64
            }

            #[inline]
            fn from_raw(bits: u64) -> Self {
                <$t>::from_bits(bits as $bits)
            }

            #[inline]
            fn from_significand(significand: u64) -> Self {
                significand as $t
            }

            #[inline]
            fn mul_add(self, a: Self, b: Self) -> Self {
                <$t>::mul_add(self, a, b)
            }
        }
    };
}

impl_binary!(f32, u32, Format::Binary32);
impl_binary!(f64, u64, Format::Binary64);
