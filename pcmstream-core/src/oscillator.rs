//! Two-channel sine generator with a persistent time base.
//!
//! The generator maps elapsed time to interleaved `(left, right)` i16 pairs:
//!
//! ```text
//! t     = time + i / sample_rate
//! left  = round(sin(2π · f_left  · t) · a_left)
//! right = round(sin(2π · f_right · t) · a_right)
//! ```
//!
//! Time is kept as an integer frame counter on top of an f64 origin, so
//! rendering `a` frames then `b` frames yields bit-identical samples to
//! rendering `a + b` frames at once. A float accumulator bumped by
//! `1 / sample_rate` per frame drifts; a frame count does not.

use crate::dsp::{scaled_sample, sine_at};
use crate::format::DEFAULT_SAMPLE_RATE;

/// One channel's tone: frequency in Hz and an integer amplitude in PCM units.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tone {
    pub freq_hz: f64,
    pub amplitude: i32,
}

impl Tone {
    #[inline]
    pub const fn new(freq_hz: f64, amplitude: i32) -> Self {
        Self { freq_hz, amplitude }
    }

    #[inline]
    fn sample_at(&self, t: f64) -> i16 {
        scaled_sample(sine_at(self.freq_hz, t), self.amplitude)
    }
}

/// Per-channel tone settings.
///
/// Amplitudes are not checked against the i16 range; anything beyond
/// ±32767 wraps.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ToneParams {
    pub left: Tone,
    pub right: Tone,
}

impl Default for ToneParams {
    /// 4 kHz at 6000 on the left, 2 kHz at 4000 on the right.
    fn default() -> Self {
        Self { left: Tone::new(4000.0, 6000), right: Tone::new(2000.0, 4000) }
    }
}

/// Stateful stereo sine source.
#[derive(Clone, Debug)]
pub struct StereoOscillator {
    params: ToneParams,
    sample_rate: u32,
    inv_rate: f64,
    origin: f64,
    frames: u64,
}

impl Default for StereoOscillator {
    fn default() -> Self {
        Self::new(ToneParams::default(), DEFAULT_SAMPLE_RATE)
    }
}

impl StereoOscillator {
    /// A zero sample rate is bumped to 1 Hz so time stays finite.
    pub fn new(params: ToneParams, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            params,
            sample_rate,
            inv_rate: 1.0 / f64::from(sample_rate),
            origin: 0.0,
            frames: 0,
        }
    }

    /// Start the time base at `seconds` instead of zero.
    pub fn with_start_time(mut self, seconds: f64) -> Self {
        self.origin = seconds;
        self
    }

    #[inline] pub fn params(&self) -> &ToneParams { &self.params }
    #[inline] pub fn set_params(&mut self, params: ToneParams) { self.params = params; }
    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }

    /// Frames generated since construction or the last `reset`.
    #[inline] pub fn elapsed_frames(&self) -> u64 { self.frames }

    /// Current value of the time accumulator in seconds.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn time(&self) -> f64 {
        self.origin + self.frames as f64 * self.inv_rate
    }

    /// Rewind the time base to zero.
    pub fn reset(&mut self) {
        self.origin = 0.0;
        self.frames = 0;
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    fn time_of(&self, frame: u64) -> f64 {
        self.origin + frame as f64 * self.inv_rate
    }

    /// Fill `out` with interleaved L/R samples and advance the time base.
    ///
    /// Renders `out.len() / 2` frames; an odd trailing slot is zeroed.
    /// Returns the number of frames rendered. Never allocates.
    pub fn render_interleaved(&mut self, out: &mut [i16]) -> usize {
        let mut pairs = out.chunks_exact_mut(2);
        let mut rendered = 0u64;
        for pair in pairs.by_ref() {
            let t = self.time_of(self.frames + rendered);
            pair[0] = self.params.left.sample_at(t);
            pair[1] = self.params.right.sample_at(t);
            rendered += 1;
        }
        for slot in pairs.into_remainder() {
            *slot = 0;
        }
        self.frames += rendered;
        // `rendered` never exceeds `out.len() / 2`.
        usize::try_from(rendered).unwrap_or(usize::MAX)
    }

    /// Produce the next `frame_count` frames as `(left, right)` pairs.
    ///
    /// `generate(0)` returns an empty vector and leaves time unchanged.
    #[cfg(feature = "std")]
    pub fn generate(&mut self, frame_count: usize) -> Vec<(i16, i16)> {
        let start = self.frames;
        let frames = (0..frame_count as u64)
            .map(|i| {
                let t = self.time_of(start + i);
                (self.params.left.sample_at(t), self.params.right.sample_at(t))
            })
            .collect();
        self.frames = start + frame_count as u64;
        frames
    }
}
