#![cfg_attr(not(feature = "std"), no_std)]
//! pcmstream core — PCM format description and the stereo sine generator.
//!
//! Features
//! - `std`    : (default) use the Rust standard library
//! - `no-std` : build with `#![no_std]` and use `libm` for `sin`/`round`
//! - `serde`  : derive `Serialize`/`Deserialize` on [`StreamFormat`] and [`ToneParams`]
//!
//! Modules
//! - [`dsp`]        : math backend, sine evaluation, wrapping i16 conversion
//! - [`format`]     : share mode, channel/bit/rate triple and derived sizes
//! - [`oscillator`] : two-channel sine source with a phase-continuous time base
//!
//! Design
//! - No heap allocations on the render path
//! - No knowledge of any output engine; callers hand in the buffer to fill

pub mod dsp;
pub mod format;
pub mod oscillator;

pub use format::{FormatIssue, ShareMode, StreamFormat};
pub use oscillator::{StereoOscillator, Tone, ToneParams};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{scaled_sample, sine_at, to_i16_wrapping, TAU};
    pub use crate::format::{
        FormatIssue, ShareMode, StreamFormat, DEFAULT_BITS_PER_SAMPLE, DEFAULT_CHANNELS,
        DEFAULT_SAMPLE_RATE,
    };
    pub use crate::oscillator::{StereoOscillator, Tone, ToneParams};
}
