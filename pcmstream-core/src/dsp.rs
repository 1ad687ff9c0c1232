//! Sample maths shared by the generator.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Double precision throughout: phase is computed from absolute time, and
//!   an f32 time base loses sub-sample resolution after a few minutes
//!
//! Conventions:
//! - All functions are `#[inline]`; they sit on the per-sample path.
//! - Float → integer conversion follows fixed-width semantics: values wrap,
//!   they are never clamped.

use core::f64::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f64) -> f64 { libm::sin(x) }
        #[inline] fn m_round(x: f64) -> f64 { libm::round(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f64) -> f64 { x.sin() }
        #[inline] fn m_round(x: f64) -> f64 { x.round() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f64 = 2.0 * PI;

// --------------------------------- Sine ------------------------------------------

/// `sin(2π · freq_hz · t)` for an absolute time `t` in seconds.
#[inline]
pub fn sine_at(freq_hz: f64, t: f64) -> f64 {
    m_sin(TAU * freq_hz * t)
}

// --------------------------------- Integer PCM -----------------------------------

/// Round half away from zero and truncate to 16 bits with two's-complement wrap.
///
/// `40000.0` becomes `-25536`, exactly as a 32-bit integer cast down to 16
/// bits would. Non-finite input maps to `0`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn to_i16_wrapping(x: f64) -> i16 {
    if !x.is_finite() {
        return 0;
    }
    // `as i64` saturates far outside any sane amplitude; `as i16` then wraps.
    (m_round(x) as i64) as i16
}

/// Scale a unit-range sine value by an integer amplitude and convert.
#[inline]
pub fn scaled_sample(unit: f64, amplitude: i32) -> i16 {
    to_i16_wrapping(unit * f64::from(amplitude))
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(to_i16_wrapping(0.5), 1);
        assert_eq!(to_i16_wrapping(-0.5), -1);
        assert_eq!(to_i16_wrapping(1.49), 1);
        assert_eq!(to_i16_wrapping(-2.5), -3);
    }

    #[test]
    fn wraps_instead_of_clamping() {
        assert_eq!(to_i16_wrapping(32767.0), i16::MAX);
        assert_eq!(to_i16_wrapping(32768.0), i16::MIN);
        assert_eq!(to_i16_wrapping(40000.0), -25536);
        assert_eq!(to_i16_wrapping(-32769.0), i16::MAX);
    }

    #[test]
    fn non_finite_is_silence() {
        assert_eq!(to_i16_wrapping(f64::NAN), 0);
        assert_eq!(to_i16_wrapping(f64::INFINITY), 0);
    }

    #[test]
    fn quarter_period_hits_amplitude() {
        // 1 Hz at t = 0.25 s is the positive peak.
        let s = scaled_sample(sine_at(1.0, 0.25), 6000);
        assert_eq!(s, 6000);
    }
}
