use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for every
/// stored resource amount so integration is bit-identical across platforms.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use only for initialization and config, never
/// inside the integrator.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and geometry.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Raise `base` to a non-negative integer power, saturating on overflow.
pub fn pow_saturating(base: Fixed64, exp: u32) -> Fixed64 {
    let mut acc = Fixed64::ONE;
    for _ in 0..exp {
        acc = acc.saturating_mul(base);
    }
    acc
}

/// Round a non-negative fixed-point value up to the next whole number.
/// Negative values clamp to zero.
pub fn ceil_to_u64(v: Fixed64) -> u64 {
    if v <= Fixed64::ZERO {
        return 0;
    }
    v.saturating_ceil().to_num::<u64>()
}
