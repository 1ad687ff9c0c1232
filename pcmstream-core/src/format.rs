//! PCM stream format description.
//!
//! A `StreamFormat` is the `(share mode, channels, bits, rate)` quadruple an
//! output engine is initialized with. Block align and byte rate are derived
//! the same way a `WAVEFORMATEX` derives them.

use core::fmt;

/// Sample rate used when nothing else is requested.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Channel count used when nothing else is requested.
pub const DEFAULT_CHANNELS: u16 = 2;
/// Bits per sample used when nothing else is requested.
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// How the output device is shared with the rest of the system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ShareMode {
    /// Mixed by the OS with other streams; the device picks the period.
    Shared,
    /// Sole access to the hardware buffer at a fixed period.
    #[default]
    Exclusive,
}

impl fmt::Display for ShareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareMode::Shared => f.write_str("shared"),
            ShareMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Why a format was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormatIssue {
    /// Channel count outside `1..=2`.
    Channels(u16),
    /// Bit depth zero or not a whole number of bytes.
    BitsPerSample(u16),
    /// Sample rate of zero.
    SampleRate(u32),
}

impl fmt::Display for FormatIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatIssue::Channels(c) => write!(f, "unsupported channel count {c} (expected 1 or 2)"),
            FormatIssue::BitsPerSample(b) => {
                write!(f, "unsupported bit depth {b} (expected a non-zero multiple of 8)")
            }
            FormatIssue::SampleRate(r) => write!(f, "unsupported sample rate {r} Hz"),
        }
    }
}

/// Immutable configuration of one output stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamFormat {
    pub share_mode: ShareMode,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::stereo16(DEFAULT_SAMPLE_RATE, ShareMode::Exclusive)
    }
}

impl StreamFormat {
    #[inline]
    pub const fn new(share_mode: ShareMode, channels: u16, bits_per_sample: u16, sample_rate: u32) -> Self {
        Self { share_mode, channels, bits_per_sample, sample_rate }
    }

    /// Interleaved 16-bit stereo at `sample_rate`.
    #[inline]
    pub const fn stereo16(sample_rate: u32, share_mode: ShareMode) -> Self {
        Self::new(share_mode, DEFAULT_CHANNELS, DEFAULT_BITS_PER_SAMPLE, sample_rate)
    }

    /// Check the argument ranges an output engine accepts.
    pub fn validate(&self) -> Result<(), FormatIssue> {
        if !(1..=2).contains(&self.channels) {
            return Err(FormatIssue::Channels(self.channels));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(FormatIssue::BitsPerSample(self.bits_per_sample));
        }
        if self.sample_rate == 0 {
            return Err(FormatIssue::SampleRate(self.sample_rate));
        }
        Ok(())
    }

    /// True for the one layout the stereo generator renders: 2 × i16.
    #[inline]
    pub fn is_stereo16(&self) -> bool {
        self.channels == 2 && self.bits_per_sample == 16
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes in one frame (one sample per channel).
    #[inline]
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    #[inline]
    pub fn bytes_per_sec(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Whole frames that fit in `bytes`; a trailing partial frame is ignored.
    #[inline]
    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.block_align() {
            0 => 0,
            n => bytes / n,
        }
    }

    /// Frames in a period of `millis` milliseconds (10 ms at 44.1 kHz is 441).
    #[inline]
    pub fn frames_per_period(&self, millis: u32) -> u32 {
        let frames = u64::from(self.sample_rate) * u64::from(millis) / 1000;
        u32::try_from(frames).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch / {} bit / {} Hz ({})",
            self.channels, self.bits_per_sample, self.sample_rate, self.share_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cd_stereo_exclusive() {
        let f = StreamFormat::default();
        assert_eq!(f.channels, 2);
        assert_eq!(f.bits_per_sample, 16);
        assert_eq!(f.sample_rate, 44_100);
        assert_eq!(f.share_mode, ShareMode::Exclusive);
        assert!(f.is_stereo16());
    }

    #[test]
    fn derived_sizes() {
        let f = StreamFormat::default();
        assert_eq!(f.block_align(), 4);
        assert_eq!(f.bytes_per_sec(), 176_400);
        assert_eq!(f.frames_in(1764), 441);
        assert_eq!(f.frames_in(1766), 441);
        assert_eq!(f.frames_per_period(10), 441);
    }

    #[test]
    fn validation_mirrors_engine_checks() {
        assert_eq!(StreamFormat::new(ShareMode::Shared, 0, 16, 44_100).validate(), Err(FormatIssue::Channels(0)));
        assert_eq!(StreamFormat::new(ShareMode::Shared, 3, 16, 44_100).validate(), Err(FormatIssue::Channels(3)));
        assert_eq!(StreamFormat::new(ShareMode::Shared, 2, 12, 44_100).validate(), Err(FormatIssue::BitsPerSample(12)));
        assert_eq!(StreamFormat::new(ShareMode::Shared, 2, 0, 44_100).validate(), Err(FormatIssue::BitsPerSample(0)));
        assert_eq!(StreamFormat::new(ShareMode::Shared, 2, 16, 0).validate(), Err(FormatIssue::SampleRate(0)));
        assert!(StreamFormat::new(ShareMode::Shared, 1, 24, 48_000).validate().is_ok());
    }
}
