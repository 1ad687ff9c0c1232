//! Command-line flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pcmstream_engine::ShareMode;
use serde::Deserialize;

#[derive(Parser, Debug, Default)]
#[command(name = "pcmstream")]
#[command(about = "Stream a stereo test tone to the default output device")]
pub struct Cli {
    /// TOML file with defaults for any of the options below
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Output engine
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Device sharing mode
    #[arg(long, value_enum)]
    pub share_mode: Option<ShareArg>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Left channel frequency in Hz
    #[arg(long)]
    pub left_freq: Option<f64>,

    /// Left channel peak amplitude
    #[arg(long, allow_negative_numbers = true)]
    pub left_amp: Option<i32>,

    /// Right channel frequency in Hz
    #[arg(long)]
    pub right_freq: Option<f64>,

    /// Right channel peak amplitude
    #[arg(long, allow_negative_numbers = true)]
    pub right_amp: Option<i32>,

    /// Stop after this many seconds instead of waiting for the space bar
    #[arg(long, short)]
    pub duration: Option<f64>,
}

/// Which [`AudioEngine`](pcmstream_engine::AudioEngine) drives the stream.
#[derive(ValueEnum, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Default output device through CPAL
    #[default]
    Cpal,
    /// Headless software clock, no audio hardware
    Clock,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cpal => "cpal",
            Backend::Clock => "clock",
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShareArg {
    Shared,
    Exclusive,
}

impl From<ShareArg> for ShareMode {
    fn from(arg: ShareArg) -> Self {
        match arg {
            ShareArg::Shared => ShareMode::Shared,
            ShareArg::Exclusive => ShareMode::Exclusive,
        }
    }
}
