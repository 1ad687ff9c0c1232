//! pcmstream engine — output engine contract, engines, and the stream controller.
//!
//! Crate layout:
//! - [`engine`]     : `AudioEngine` / `RenderTarget` contract and `SliceTarget`
//! - [`refill`]     : the refill body run on the engine thread, plus counters
//! - [`controller`] : lifecycle state machine and the scoped `StreamSession`
//! - [`clock`]      : software engine ticking at a fixed period
//! - [`realtime`]   : CPAL-backed hardware engine (feature `realtime`)
//! - [`error`]      : `EngineError` and `ConfigurationError`
//!
//! The refill path performs no heap allocation once its scratch buffer has
//! reached the largest block the engine asks for.

pub mod clock;
pub mod controller;
pub mod engine;
pub mod error;
pub mod refill;

#[cfg(feature = "realtime")]
pub mod realtime;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use clock::ClockEngine;
pub use controller::{StreamController, StreamSession, StreamState};
pub use engine::{AudioEngine, RefillCallback, RenderTarget, SliceTarget};
pub use error::{ConfigurationError, EngineError};
pub use refill::{RefillSnapshot, RefillStats};

#[cfg(feature = "realtime")]
pub use realtime::CpalEngine;

pub use pcmstream_core::{ShareMode, StreamFormat, Tone, ToneParams};
