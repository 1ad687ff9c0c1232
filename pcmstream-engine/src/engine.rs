//! The output engine contract.
//!
//! An engine owns the device side of a stream: it opens the hardware (or a
//! software clock), runs its own thread, and whenever its buffer can take
//! more audio it calls the registered [`RefillCallback`] with a
//! [`RenderTarget`] describing the block it wants filled.
//!
//! Contract every implementation upholds
//! - The callback is invoked from one thread at a time, never re-entered.
//! - `stop` blocks until no invocation is in flight and none is scheduled;
//!   the boxed callback is dropped before `stop` returns.
//! - A block left unfilled by the callback is played as silence.

use pcmstream_core::StreamFormat;

use crate::error::EngineError;

/// Per-invocation view of the engine's buffer.
pub trait RenderTarget {
    /// Bytes this refill is expected to provide.
    fn buffer_size(&self) -> usize;

    /// Submit exactly `buffer_size()` bytes. Returns `false` when the
    /// engine cannot accept the block.
    fn copy_to_buffer(&mut self, data: &[u8]) -> bool;
}

/// Refill logic handed to an engine for the duration of a stream.
pub type RefillCallback = Box<dyn FnMut(&mut dyn RenderTarget) + Send + 'static>;

/// Anything that can play a PCM stream fed by a refill callback.
pub trait AudioEngine {
    /// One-time setup for `format`. Fails when the mode/format is rejected.
    fn initialize(&mut self, format: &StreamFormat) -> Result<(), EngineError>;

    /// Release engine resources. Stops an active stream first.
    fn uninitialize(&mut self);

    /// Begin invoking `refill` whenever the engine needs data.
    fn start(&mut self, refill: RefillCallback) -> Result<(), EngineError>;

    /// Halt invocation; returns once no call to the callback is in flight.
    fn stop(&mut self);

    /// Point-in-time query.
    fn is_streaming(&self) -> bool;

    /// Short label for log lines.
    fn name(&self) -> &str {
        "engine"
    }
}

impl<E: AudioEngine + ?Sized> AudioEngine for Box<E> {
    fn initialize(&mut self, format: &StreamFormat) -> Result<(), EngineError> { (**self).initialize(format) }
    fn uninitialize(&mut self) { (**self).uninitialize() }
    fn start(&mut self, refill: RefillCallback) -> Result<(), EngineError> { (**self).start(refill) }
    fn stop(&mut self) { (**self).stop() }
    fn is_streaming(&self) -> bool { (**self).is_streaming() }
    fn name(&self) -> &str { (**self).name() }
}

/// [`RenderTarget`] over a borrowed byte block, used by the bundled engines.
///
/// Accepts exactly one submission of exactly `out.len()` bytes; call
/// [`finish`](SliceTarget::finish) afterwards to silence an unfilled block.
pub struct SliceTarget<'a> {
    out: &'a mut [u8],
    filled: bool,
}

impl<'a> SliceTarget<'a> {
    #[inline]
    pub fn new(out: &'a mut [u8]) -> Self {
        Self { out, filled: false }
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Zero the block unless a submission landed. Returns whether one did.
    #[inline]
    pub fn finish(self) -> bool {
        if !self.filled {
            self.out.fill(0);
        }
        self.filled
    }
}

impl RenderTarget for SliceTarget<'_> {
    #[inline]
    fn buffer_size(&self) -> usize {
        self.out.len()
    }

    fn copy_to_buffer(&mut self, data: &[u8]) -> bool {
        if self.filled || self.out.is_empty() || data.len() != self.out.len() {
            return false;
        }
        self.out.copy_from_slice(data);
        self.filled = true;
        true
    }
}
