//! Run settings: flags over config file over built-in defaults.
//!
//! ```toml
//! backend = "clock"
//! duration = 2.0
//!
//! [format]
//! share_mode = "shared"
//! sample_rate = 48000
//!
//! [tone.left]
//! freq_hz = 440.0
//! amplitude = 3000
//! ```

use std::path::Path;

use anyhow::{ensure, Context, Result};
use pcmstream_engine::{StreamFormat, ToneParams};
use serde::Deserialize;

use crate::cli::{Backend, Cli};

/// Contents of `--config`. Missing keys fall back to the defaults.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub backend: Option<Backend>,
    pub duration: Option<f64>,
    pub format: StreamFormat,
    pub tone: ToneParams,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Everything `main` needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub format: StreamFormat,
    pub tone: ToneParams,
    pub duration: Option<f64>,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let mut format = file.format;
        if let Some(mode) = cli.share_mode {
            format.share_mode = mode.into();
        }
        if let Some(rate) = cli.sample_rate {
            format.sample_rate = rate;
        }

        let mut tone = file.tone;
        if let Some(f) = cli.left_freq {
            tone.left.freq_hz = f;
        }
        if let Some(a) = cli.left_amp {
            tone.left.amplitude = a;
        }
        if let Some(f) = cli.right_freq {
            tone.right.freq_hz = f;
        }
        if let Some(a) = cli.right_amp {
            tone.right.amplitude = a;
        }

        let duration = cli.duration.or(file.duration);
        if let Some(secs) = duration {
            ensure!(secs.is_finite() && secs >= 0.0, "duration must be a non-negative number of seconds, got {secs}");
        }

        Ok(Self {
            backend: cli.backend.or(file.backend).unwrap_or_default(),
            format,
            tone,
            duration,
        })
    }
}
