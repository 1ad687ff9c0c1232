//! The refill body run on the engine's thread.
//!
//! `Refiller` owns the oscillator and a reusable sample buffer. Each call
//! asks the target for its size, renders exactly that many frames, and
//! submits the bytes in native endianness. A refused submission is a
//! dropped buffer: counted, logged, never propagated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pcmstream_core::{StereoOscillator, StreamFormat, ToneParams};

use crate::engine::RenderTarget;

/// Samples reserved up front: one second of 48 kHz stereo.
const PRESIZE_SAMPLES: usize = 48_000 * 2;

/// Counters updated from the refill thread, readable from anywhere.
#[derive(Debug, Default)]
pub struct RefillStats {
    invocations: AtomicU64,
    submitted: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    frames: AtomicU64,
}

/// Point-in-time copy of [`RefillStats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RefillSnapshot {
    /// Times the engine called the refill entry point.
    pub invocations: u64,
    /// Blocks the engine accepted.
    pub submitted: u64,
    /// Blocks the engine refused (`copy_to_buffer` returned false).
    pub dropped: u64,
    /// Calls that found the generator busy and left the block silent.
    pub skipped: u64,
    /// Frames the generator produced, dropped blocks included.
    pub frames: u64,
}

impl RefillStats {
    pub fn snapshot(&self) -> RefillSnapshot {
        RefillSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Generator state plus scratch space for one stream.
pub struct Refiller {
    osc: StereoOscillator,
    block_align: usize,
    scratch: Vec<i16>,
    stats: Arc<RefillStats>,
}

impl Refiller {
    pub fn new(tone: ToneParams, format: &StreamFormat, stats: Arc<RefillStats>) -> Self {
        Self {
            osc: StereoOscillator::new(tone, format.sample_rate),
            block_align: format.block_align().max(1),
            scratch: Vec::with_capacity(PRESIZE_SAMPLES),
            stats,
        }
    }

    #[inline] pub fn oscillator(&self) -> &StereoOscillator { &self.osc }
    #[inline] pub fn oscillator_mut(&mut self) -> &mut StereoOscillator { &mut self.osc }

    /// Fill one engine block.
    ///
    /// Renders `buffer_size / block_align` frames; bytes past the last whole
    /// frame are zero so the submission length always equals the request.
    pub fn refill(&mut self, target: &mut dyn RenderTarget) {
        let size = target.buffer_size();
        if size == 0 {
            return;
        }

        let frames = size / self.block_align;
        let slots = size.div_ceil(2);
        // Grows only when a block exceeds every block seen before.
        self.scratch.resize(slots, 0);

        let rendered = self.osc.render_interleaved(&mut self.scratch[..frames * 2]);
        self.scratch[rendered * 2..].fill(0);
        self.stats.frames.fetch_add(rendered as u64, Ordering::Relaxed);

        let bytes: &[u8] = bytemuck::cast_slice(&self.scratch[..]);
        if target.copy_to_buffer(&bytes[..size]) {
            self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        } else {
            let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 {
                log::warn!("engine refused a {size}-byte block; skipping it");
            } else {
                log::debug!("engine refused a {size}-byte block ({dropped} dropped so far)");
            }
        }
    }
}
