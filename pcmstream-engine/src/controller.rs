//! Stream lifecycle controller.
//!
//! ```text
//! Uninitialized --initialize--> Initialized --start--> Streaming
//!       ^                            |  ^                  |
//!       +-------uninitialize---------+  +------stop--------+
//! ```
//!
//! The controller owns the generator state. While Streaming it is shared with
//! the engine's thread through a spin-locked slot: the callback only ever
//! `try_lock`s, so a contended slot costs one silent block, never a stall.
//! The controller itself touches the slot only while not Streaming.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use log::{error, info};
use pcmstream_core::{StereoOscillator, StreamFormat, ToneParams};
use spin::Mutex;

use crate::engine::{AudioEngine, RefillCallback, RenderTarget};
use crate::error::{ConfigurationError, Result};
use crate::refill::{RefillSnapshot, RefillStats, Refiller};

/// Lifecycle state owned by [`StreamController`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    Uninitialized,
    Initialized,
    Streaming,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamState::Uninitialized => f.write_str("uninitialized"),
            StreamState::Initialized => f.write_str("initialized"),
            StreamState::Streaming => f.write_str("streaming"),
        }
    }
}

/// Drives an [`AudioEngine`] with the stereo sine generator.
pub struct StreamController<E: AudioEngine> {
    engine: E,
    state: StreamState,
    format: Option<StreamFormat>,
    tone: ToneParams,
    slot: Arc<Mutex<Refiller>>,
    stats: Arc<RefillStats>,
}

impl<E: AudioEngine> StreamController<E> {
    pub fn new(engine: E, tone: ToneParams) -> Self {
        let stats = Arc::new(RefillStats::default());
        let slot = Refiller::new(tone, &StreamFormat::default(), Arc::clone(&stats));
        Self {
            engine,
            state: StreamState::Uninitialized,
            format: None,
            tone,
            slot: Arc::new(Mutex::new(slot)),
            stats,
        }
    }

    #[inline] pub fn state(&self) -> StreamState { self.state }
    #[inline] pub fn format(&self) -> Option<&StreamFormat> { self.format.as_ref() }
    #[inline] pub fn tone(&self) -> &ToneParams { &self.tone }
    #[inline] pub fn engine(&self) -> &E { &self.engine }

    /// True while Streaming. Valid in any state, no side effects.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Refill counters; safe to call while Streaming.
    pub fn stats(&self) -> RefillSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the counters, e.g. for a monitoring thread.
    pub fn stats_handle(&self) -> Arc<RefillStats> {
        Arc::clone(&self.stats)
    }

    fn guard(&self, op: &'static str, expected: StreamState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidTransition { op, state: self.state })
        }
    }

    /// Uninitialized → Initialized.
    ///
    /// Resets the generator's time base: a new stream starts at t = 0.
    pub fn initialize(&mut self, format: StreamFormat) -> Result<()> {
        self.guard("initialize", StreamState::Uninitialized)?;
        if !format.is_stereo16() || format.sample_rate == 0 {
            return Err(ConfigurationError::UnsupportedLayout { format });
        }

        self.engine.initialize(&format)?;

        *self.slot.lock() = Refiller::new(self.tone, &format, Arc::clone(&self.stats));
        self.format = Some(format);
        self.state = StreamState::Initialized;
        info!(
            "{}: initialized {format} (block align {} B, {} B/s)",
            self.engine.name(),
            format.block_align(),
            format.bytes_per_sec()
        );
        Ok(())
    }

    /// Initialized → Streaming.
    ///
    /// The engine takes ownership of the refill callback and keeps it until
    /// `stop` returns. Restarting after a `stop` continues the waveform
    /// where it left off.
    pub fn start(&mut self) -> Result<()> {
        self.guard("start", StreamState::Initialized)?;

        self.engine.start(self.refill_callback())?;
        self.state = StreamState::Streaming;
        info!("{}: streaming", self.engine.name());
        Ok(())
    }

    /// Streaming → Initialized. Returns once the engine guarantees no
    /// further refill invocations.
    pub fn stop(&mut self) -> Result<()> {
        self.guard("stop", StreamState::Streaming)?;

        self.engine.stop();
        self.state = StreamState::Initialized;
        let s = self.stats.snapshot();
        info!(
            "{}: stopped after {} refills ({} submitted, {} dropped, {} skipped)",
            self.engine.name(),
            s.invocations,
            s.submitted,
            s.dropped,
            s.skipped
        );
        Ok(())
    }

    /// Initialized → Uninitialized.
    pub fn uninitialize(&mut self) -> Result<()> {
        self.guard("uninitialize", StreamState::Initialized)?;

        self.engine.uninitialize();
        self.format = None;
        self.state = StreamState::Uninitialized;
        info!("{}: uninitialized", self.engine.name());
        Ok(())
    }

    /// Start and return a guard that stops the stream when dropped.
    pub fn session(&mut self) -> Result<StreamSession<'_, E>> {
        self.start()?;
        Ok(StreamSession { controller: self })
    }

    /// Replace the tone. Not allowed while Streaming; the time base is kept.
    pub fn set_tone(&mut self, tone: ToneParams) -> Result<()> {
        if self.is_streaming() {
            return Err(ConfigurationError::InvalidTransition { op: "retune", state: self.state });
        }
        self.tone = tone;
        self.slot.lock().oscillator_mut().set_params(tone);
        Ok(())
    }

    /// Inspect the generator. Not allowed while Streaming.
    pub fn with_oscillator<R>(&self, f: impl FnOnce(&StereoOscillator) -> R) -> Result<R> {
        if self.is_streaming() {
            return Err(ConfigurationError::InvalidTransition { op: "inspect the generator", state: self.state });
        }
        let guard = self.slot.lock();
        Ok(f(guard.oscillator()))
    }

    fn refill_callback(&self) -> RefillCallback {
        let slot = Arc::clone(&self.slot);
        let stats = Arc::clone(&self.stats);
        Box::new(move |target: &mut dyn RenderTarget| {
            stats.record_invocation();
            match slot.try_lock() {
                Some(mut refiller) => refiller.refill(target),
                None => stats.record_skipped(),
            }
        })
    }
}

impl<E: AudioEngine> Drop for StreamController<E> {
    fn drop(&mut self) {
        if self.is_streaming() {
            if let Err(e) = self.stop() {
                error!("stop on drop failed: {e}");
            }
        }
        if self.state == StreamState::Initialized {
            if let Err(e) = self.uninitialize() {
                error!("uninitialize on drop failed: {e}");
            }
        }
    }
}

/// Scoped stream: acquired by [`StreamController::session`], stopped on drop.
pub struct StreamSession<'a, E: AudioEngine> {
    controller: &'a mut StreamController<E>,
}

impl<E: AudioEngine> StreamSession<'_, E> {
    /// Stop now and report the result instead of logging it from `drop`.
    pub fn finish(self) -> Result<()> {
        let result = self.controller.stop();
        // Drop sees the controller Initialized and does nothing.
        drop(self);
        result
    }
}

impl<E: AudioEngine> Deref for StreamSession<'_, E> {
    type Target = StreamController<E>;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl<E: AudioEngine> Drop for StreamSession<'_, E> {
    fn drop(&mut self) {
        if self.controller.is_streaming() {
            if let Err(e) = self.controller.stop() {
                error!("stop on session drop failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SliceTarget;
    use crate::error::EngineError;
    use pcmstream_core::ShareMode;

    /// Engine that runs the callback only when `pump` is called.
    #[derive(Default)]
    struct PumpEngine {
        initialized: bool,
        reject: bool,
        callback: Option<RefillCallback>,
        uninit_calls: usize,
    }

    impl PumpEngine {
        fn pump(&mut self, bytes: usize) -> Option<Vec<u8>> {
            let cb = self.callback.as_mut()?;
            let mut block = vec![0u8; bytes];
            let mut target = SliceTarget::new(&mut block);
            cb(&mut target);
            target.finish();
            Some(block)
        }
    }

    impl AudioEngine for PumpEngine {
        fn initialize(&mut self, format: &StreamFormat) -> std::result::Result<(), EngineError> {
            if self.reject {
                return Err(EngineError::FormatRejected(format.to_string()));
            }
            self.initialized = true;
            Ok(())
        }
        fn uninitialize(&mut self) {
            self.callback = None;
            self.initialized = false;
            self.uninit_calls += 1;
        }
        fn start(&mut self, refill: RefillCallback) -> std::result::Result<(), EngineError> {
            self.callback = Some(refill);
            Ok(())
        }
        fn stop(&mut self) {
            self.callback = None;
        }
        fn is_streaming(&self) -> bool {
            self.callback.is_some()
        }
    }

    fn controller() -> StreamController<PumpEngine> {
        StreamController::new(PumpEngine::default(), ToneParams::default())
    }

    fn invalid(op: &'static str, state: StreamState) -> ConfigurationError {
        ConfigurationError::InvalidTransition { op, state }
    }

    #[test]
    fn full_cycle_walks_every_state() {
        let mut c = controller();
        assert_eq!(c.state(), StreamState::Uninitialized);
        c.initialize(StreamFormat::default()).unwrap();
        assert_eq!(c.state(), StreamState::Initialized);
        c.start().unwrap();
        assert!(c.is_streaming());
        c.stop().unwrap();
        assert_eq!(c.state(), StreamState::Initialized);
        c.uninitialize().unwrap();
        assert_eq!(c.state(), StreamState::Uninitialized);
        assert!(c.format().is_none());
    }

    #[test]
    fn out_of_sequence_calls_are_rejected() {
        let mut c = controller();
        assert_eq!(c.start(), Err(invalid("start", StreamState::Uninitialized)));
        assert_eq!(c.stop(), Err(invalid("stop", StreamState::Uninitialized)));
        assert_eq!(c.uninitialize(), Err(invalid("uninitialize", StreamState::Uninitialized)));

        c.initialize(StreamFormat::default()).unwrap();
        assert_eq!(c.initialize(StreamFormat::default()), Err(invalid("initialize", StreamState::Initialized)));
        assert_eq!(c.stop(), Err(invalid("stop", StreamState::Initialized)));

        c.start().unwrap();
        assert_eq!(c.start(), Err(invalid("start", StreamState::Streaming)));
        assert_eq!(c.initialize(StreamFormat::default()), Err(invalid("initialize", StreamState::Streaming)));
        assert_eq!(c.uninitialize(), Err(invalid("uninitialize", StreamState::Streaming)));
        assert!(c.is_streaming(), "failed calls leave the state alone");
    }

    #[test]
    fn engine_rejection_keeps_controller_uninitialized() {
        let mut c = StreamController::new(PumpEngine { reject: true, ..Default::default() }, ToneParams::default());
        let err = c.initialize(StreamFormat::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Engine(EngineError::FormatRejected(_))));
        assert_eq!(c.state(), StreamState::Uninitialized);
    }

    #[test]
    fn non_stereo16_layouts_are_refused_before_the_engine() {
        let mut c = controller();
        let mono = StreamFormat::new(ShareMode::Exclusive, 1, 16, 44_100);
        assert!(matches!(c.initialize(mono), Err(ConfigurationError::UnsupportedLayout { .. })));
        let wide = StreamFormat::new(ShareMode::Exclusive, 2, 24, 44_100);
        assert!(matches!(c.initialize(wide), Err(ConfigurationError::UnsupportedLayout { .. })));
        assert!(!c.engine().initialized);
    }

    #[test]
    fn restart_continues_the_waveform() {
        let mut c = controller();
        c.initialize(StreamFormat::default()).unwrap();

        c.start().unwrap();
        let first = c.engine.pump(400).unwrap();
        c.stop().unwrap();
        c.start().unwrap();
        let second = c.engine.pump(400).unwrap();
        c.stop().unwrap();

        let mut reference = StereoOscillator::default();
        let mut samples = vec![0i16; 400];
        reference.render_interleaved(&mut samples);
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();

        assert_eq!([first, second].concat(), expected);
        assert_eq!(c.with_oscillator(StereoOscillator::elapsed_frames).unwrap(), 200);
    }

    #[test]
    fn reinitialize_rewinds_time() {
        let mut c = controller();
        c.initialize(StreamFormat::default()).unwrap();
        c.start().unwrap();
        c.engine.pump(1764);
        c.stop().unwrap();
        c.uninitialize().unwrap();
        c.initialize(StreamFormat::stereo16(48_000, ShareMode::Shared)).unwrap();
        let (frames, rate) = c.with_oscillator(|o| (o.elapsed_frames(), o.sample_rate())).unwrap();
        assert_eq!((frames, rate), (0, 48_000));
    }

    #[test]
    fn inspect_and_retune_are_refused_while_streaming() {
        let mut c = controller();
        c.initialize(StreamFormat::default()).unwrap();
        c.start().unwrap();
        assert!(c.with_oscillator(|_| ()).is_err());
        assert!(c.set_tone(ToneParams::default()).is_err());
        c.stop().unwrap();
        assert!(c.set_tone(ToneParams::default()).is_ok());
    }

    #[test]
    fn session_stops_on_drop() {
        let mut c = controller();
        c.initialize(StreamFormat::default()).unwrap();
        {
            let session = c.session().unwrap();
            assert!(session.is_streaming());
        }
        assert_eq!(c.state(), StreamState::Initialized);
        assert!(!c.engine().is_streaming());

        let session = c.session().unwrap();
        session.finish().unwrap();
        assert_eq!(c.state(), StreamState::Initialized);
    }

    #[test]
    fn drop_tears_down_the_engine() {
        let stats;
        {
            let mut c = controller();
            c.initialize(StreamFormat::default()).unwrap();
            c.start().unwrap();
            stats = c.stats_handle();
        }
        // Nothing left to invoke the callback; the counters stay readable.
        assert_eq!(stats.snapshot().invocations, 0);
    }
}
