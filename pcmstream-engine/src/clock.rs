//! Software output engine driven by a wall clock.
//!
//! `ClockEngine` behaves like an exclusive-mode device with a fixed
//! period: a dedicated thread wakes every period, hands the refill callback
//! one period-sized block, and discards the result (or passes it to an
//! optional sink). Handy for headless runs and for exercising the refill
//! protocol without audio hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};
use pcmstream_core::StreamFormat;

use crate::engine::{AudioEngine, RefillCallback, SliceTarget};
use crate::error::EngineError;

/// Device period used when none is given.
pub const DEFAULT_PERIOD_MS: u32 = 10;

/// Receives every block the engine "plays".
pub type BlockSink = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Counters kept by the clock thread.
#[derive(Debug, Default)]
pub struct ClockStats {
    periods: AtomicU64,
    filled: AtomicU64,
    silent: AtomicU64,
}

impl ClockStats {
    /// Periods elapsed (one refill invocation each).
    pub fn periods(&self) -> u64 { self.periods.load(Ordering::Acquire) }
    /// Periods the callback filled.
    pub fn filled(&self) -> u64 { self.filled.load(Ordering::Relaxed) }
    /// Periods played as silence.
    pub fn silent(&self) -> u64 { self.silent.load(Ordering::Relaxed) }
}

/// Fixed-period software engine.
pub struct ClockEngine {
    period_ms: u32,
    paced: bool,
    format: Option<StreamFormat>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Option<BlockSink>>>,
    sink: Option<BlockSink>,
    stats: Arc<ClockStats>,
}

impl Default for ClockEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_MS)
    }
}

impl ClockEngine {
    /// Real-time pacing: one block per `period_ms`.
    pub fn new(period_ms: u32) -> Self {
        Self {
            period_ms: period_ms.max(1),
            paced: true,
            format: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            sink: None,
            stats: Arc::new(ClockStats::default()),
        }
    }

    /// Same block size, but the thread runs as fast as it can.
    pub fn freewheel(period_ms: u32) -> Self {
        let mut engine = Self::new(period_ms);
        engine.paced = false;
        engine
    }

    /// Pass every played block to `sink` (kept across restarts).
    pub fn with_sink(mut self, sink: BlockSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn stats(&self) -> Arc<ClockStats> {
        Arc::clone(&self.stats)
    }

    /// Bytes per block for the initialized format.
    pub fn block_bytes(&self) -> Option<usize> {
        self.format.map(|f| f.frames_per_period(self.period_ms) as usize * f.block_align())
    }
}

impl AudioEngine for ClockEngine {
    fn initialize(&mut self, format: &StreamFormat) -> Result<(), EngineError> {
        if self.format.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        format.validate()?;
        if format.frames_per_period(self.period_ms) == 0 {
            return Err(EngineError::FormatRejected(format!(
                "{} Hz yields an empty {} ms period",
                format.sample_rate, self.period_ms
            )));
        }
        self.format = Some(*format);
        debug!("clock: {} ms period, {:?} B blocks", self.period_ms, self.block_bytes());
        Ok(())
    }

    fn uninitialize(&mut self) {
        self.stop();
        self.format = None;
    }

    fn start(&mut self, mut refill: RefillCallback) -> Result<(), EngineError> {
        let bytes = self.block_bytes().ok_or(EngineError::NotInitialized)?;
        if self.worker.is_some() {
            return Err(EngineError::AlreadyStreaming);
        }

        let period = Duration::from_millis(u64::from(self.period_ms));
        let paced = self.paced;
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let mut sink = self.sink.take();

        running.store(true, Ordering::Release);
        let worker = thread::Builder::new()
            .name("pcmstream-clock".into())
            .spawn(move || {
                let mut block = vec![0u8; bytes];
                let mut deadline = Instant::now();
                while running.load(Ordering::Acquire) {
                    let mut target = SliceTarget::new(&mut block);
                    refill(&mut target);
                    if target.finish() {
                        stats.filled.fetch_add(1, Ordering::Relaxed);
                    } else {
                        stats.silent.fetch_add(1, Ordering::Relaxed);
                    }
                    if let Some(sink) = sink.as_mut() {
                        sink(&block);
                    }
                    stats.periods.fetch_add(1, Ordering::Release);

                    if paced {
                        deadline += period;
                        let now = Instant::now();
                        if deadline > now {
                            thread::sleep(deadline - now);
                        } else {
                            // Fell behind; resync instead of bursting.
                            deadline = now;
                        }
                    } else {
                        thread::yield_now();
                    }
                }
                // `refill` is dropped here, before `join` returns.
                sink
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                EngineError::Backend(format!("failed to spawn clock thread: {e}"))
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(sink) => self.sink = sink,
                Err(_) => error!("clock thread panicked"),
            }
        }
    }

    fn is_streaming(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "clock"
    }
}

impl Drop for ClockEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RenderTarget;
    use std::sync::atomic::AtomicUsize;

    fn wait_for(stats: &ClockStats, periods: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while stats.periods() < periods {
            assert!(Instant::now() < deadline, "clock thread stalled");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn rejects_invalid_formats() {
        let mut e = ClockEngine::default();
        let bad = StreamFormat::new(pcmstream_core::ShareMode::Exclusive, 3, 16, 44_100);
        assert!(matches!(e.initialize(&bad), Err(EngineError::FormatRejected(_))));
        let tiny = StreamFormat::new(pcmstream_core::ShareMode::Exclusive, 2, 16, 50);
        assert!(matches!(e.initialize(&tiny), Err(EngineError::FormatRejected(_))));
    }

    #[test]
    fn start_requires_initialize() {
        let mut e = ClockEngine::default();
        assert_eq!(e.start(Box::new(|_: &mut dyn RenderTarget| {})).unwrap_err(), EngineError::NotInitialized);
    }

    #[test]
    fn ten_ms_block_at_cd_rate() {
        let mut e = ClockEngine::default();
        e.initialize(&StreamFormat::default()).unwrap();
        assert_eq!(e.block_bytes(), Some(1764));
        assert_eq!(e.initialize(&StreamFormat::default()), Err(EngineError::AlreadyInitialized));
    }

    #[test]
    fn no_invocations_after_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut e = ClockEngine::freewheel(10);
        let stats = e.stats();
        e.initialize(&StreamFormat::default()).unwrap();

        let counter = Arc::clone(&calls);
        e.start(Box::new(move |t: &mut dyn RenderTarget| {
            counter.fetch_add(1, Ordering::SeqCst);
            let size = t.buffer_size();
            assert!(t.copy_to_buffer(&vec![1u8; size]));
        }))
        .unwrap();
        assert!(e.is_streaming());
        wait_for(&stats, 3);
        e.stop();
        assert!(!e.is_streaming());

        let after_stop = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
        assert_eq!(stats.filled(), after_stop as u64);
    }

    #[test]
    fn unfilled_periods_are_silent_and_sink_sees_them() {
        let zeros = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&zeros);
        let mut e = ClockEngine::freewheel(10).with_sink(Box::new(move |block: &[u8]| {
            if block.iter().all(|b| *b == 0) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let stats = e.stats();
        e.initialize(&StreamFormat::default()).unwrap();
        e.start(Box::new(|_: &mut dyn RenderTarget| {})).unwrap();
        wait_for(&stats, 2);
        e.uninitialize();

        assert_eq!(stats.filled(), 0);
        assert_eq!(stats.silent(), stats.periods());
        assert_eq!(zeros.load(Ordering::SeqCst) as u64, stats.periods());
    }

    #[test]
    fn paced_clock_keeps_roughly_real_time() {
        let mut e = ClockEngine::new(5);
        let stats = e.stats();
        e.initialize(&StreamFormat::default()).unwrap();
        let started = Instant::now();
        e.start(Box::new(|_: &mut dyn RenderTarget| {})).unwrap();
        wait_for(&stats, 4);
        e.stop();
        // Four periods of 5 ms each cannot finish in under 15 ms.
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
