//! Hardware output engine on top of CPAL.
//!
//! The stream lives on a dedicated owner thread (CPAL streams are not `Send`
//! on every platform), so `CpalEngine` itself can move between threads.
//! The refill callback sits in a spin-locked slot shared with the device
//! callback; `stop` empties the slot under the lock before tearing the
//! stream down, which makes it a barrier even on hosts whose stream drop
//! returns before the last device callback has finished.
//!
//! Exclusive mode maps to a fixed 10 ms device buffer, shared mode to the
//! host's default buffer. Devices that only expose `f32` streams get the
//! generated i16 block converted in the device callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use pcmstream_core::{ShareMode, StreamFormat};
use spin::Mutex;

use crate::engine::{AudioEngine, RefillCallback, SliceTarget};
use crate::error::EngineError;

/// Device period requested in exclusive mode.
pub const EXCLUSIVE_PERIOD_MS: u32 = 10;

/// Staging samples reserved for `f32` devices: one second of 48 kHz stereo.
const STAGING_SAMPLES: usize = 48_000 * 2;

type Slot = Arc<Mutex<Option<RefillCallback>>>;

/// Format negotiated by `initialize`.
#[derive(Clone, Debug)]
struct Negotiated {
    format: StreamFormat,
    device_name: String,
    sample_format: cpal::SampleFormat,
    config: cpal::StreamConfig,
}

/// Owner-thread handles of a running stream.
struct Running {
    slot: Slot,
    stop_tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

/// Plays the default output device through CPAL.
#[derive(Default)]
pub struct CpalEngine {
    negotiated: Option<Negotiated>,
    running: Option<Running>,
    live: Arc<AtomicBool>,
}

impl CpalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the device picked by `initialize`.
    pub fn device_name(&self) -> Option<&str> {
        self.negotiated.as_ref().map(|n| n.device_name.as_str())
    }
}

fn backend<E: std::fmt::Display>(e: E) -> EngineError {
    EngineError::Backend(e.to_string())
}

fn default_device() -> Result<cpal::Device, EngineError> {
    cpal::default_host().default_output_device().ok_or(EngineError::NoDevice)
}

/// Pick a device config for `format`, preferring native i16 over f32.
fn negotiate(format: &StreamFormat) -> Result<Negotiated, EngineError> {
    if format.bits_per_sample != 16 {
        return Err(EngineError::FormatRejected(format!(
            "{} bit samples are not supported, only 16",
            format.bits_per_sample
        )));
    }

    let device = default_device()?;
    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

    let mut best: Option<cpal::SupportedStreamConfigRange> = None;
    for range in device.supported_output_configs().map_err(backend)? {
        let rate_ok = (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&format.sample_rate);
        if range.channels() != format.channels || !rate_ok {
            continue;
        }
        match range.sample_format() {
            cpal::SampleFormat::I16 => {
                best = Some(range);
                break;
            }
            cpal::SampleFormat::F32 if best.is_none() => best = Some(range),
            _ => {}
        }
    }
    let range = best.ok_or_else(|| {
        EngineError::FormatRejected(format!("{device_name} has no stream config for {format}"))
    })?;

    let buffer_size = match format.share_mode {
        ShareMode::Shared => cpal::BufferSize::Default,
        ShareMode::Exclusive => {
            let period = format.frames_per_period(EXCLUSIVE_PERIOD_MS);
            match range.buffer_size() {
                cpal::SupportedBufferSize::Range { min, max } => cpal::BufferSize::Fixed(period.clamp(*min, *max)),
                cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Fixed(period),
            }
        }
    };

    Ok(Negotiated {
        format: *format,
        device_name,
        sample_format: range.sample_format(),
        config: cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size,
        },
    })
}

/// Run the registered callback against one device block.
#[inline]
fn fill_block(slot: &Slot, bytes: &mut [u8]) {
    let mut target = SliceTarget::new(bytes);
    // Contended only while `stop` is clearing the slot.
    if let Some(mut guard) = slot.try_lock() {
        if let Some(refill) = guard.as_mut() {
            refill(&mut target);
        }
    }
    let _ = target.finish();
}

fn error_callback(live: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!("cpal stream error: {err}");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            live.store(false, Ordering::Release);
        }
    }
}

fn build_stream(n: &Negotiated, config: &cpal::StreamConfig, slot: &Slot, live: &Arc<AtomicBool>) -> Result<cpal::Stream, EngineError> {
    let device = default_device()?;
    let stream = match n.sample_format {
        cpal::SampleFormat::I16 => {
            let slot = Arc::clone(slot);
            device.build_output_stream(
                config,
                move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_block(&slot, bytemuck::cast_slice_mut(out));
                },
                error_callback(Arc::clone(live)),
                None,
            )
        }
        cpal::SampleFormat::F32 => {
            let slot = Arc::clone(slot);
            let mut staging: Vec<i16> = Vec::with_capacity(STAGING_SAMPLES);
            device.build_output_stream(
                config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    staging.resize(out.len(), 0);
                    fill_block(&slot, bytemuck::cast_slice_mut(&mut staging[..]));
                    for (o, s) in out.iter_mut().zip(staging.iter()) {
                        *o = f32::from(*s) / 32_768.0;
                    }
                },
                error_callback(Arc::clone(live)),
                None,
            )
        }
        other => return Err(EngineError::FormatRejected(format!("device sample format {other:?}"))),
    };
    stream.map_err(backend)
}

/// Owner thread: open, play, park until told to stop, then drop the stream.
fn run_stream(
    n: Negotiated,
    slot: Slot,
    live: Arc<AtomicBool>,
    ready_tx: mpsc::SyncSender<Result<(), EngineError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = build_stream(&n, &n.config, &slot, &live).or_else(|e| {
        if matches!(n.config.buffer_size, cpal::BufferSize::Fixed(_)) {
            // Fixed period not accepted; let the host choose, as a shared stream would.
            warn!("{}: fixed buffer refused ({e}); retrying with the default buffer", n.device_name);
            let config = cpal::StreamConfig { buffer_size: cpal::BufferSize::Default, ..n.config.clone() };
            build_stream(&n, &config, &slot, &live)
        } else {
            Err(e)
        }
    });

    let stream = match stream.and_then(|s| s.play().map(|()| s).map_err(backend)) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Returns on an explicit stop or when the engine is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    debug!("{}: stream closed", n.device_name);
}

impl AudioEngine for CpalEngine {
    fn initialize(&mut self, format: &StreamFormat) -> Result<(), EngineError> {
        if self.negotiated.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        format.validate()?;
        let n = negotiate(format)?;
        info!(
            "cpal: {} as {:?} ({:?} buffer)",
            n.device_name, n.sample_format, n.config.buffer_size
        );
        self.negotiated = Some(n);
        Ok(())
    }

    fn uninitialize(&mut self) {
        self.stop();
        self.negotiated = None;
    }

    fn start(&mut self, refill: RefillCallback) -> Result<(), EngineError> {
        let n = self.negotiated.clone().ok_or(EngineError::NotInitialized)?;
        if self.running.is_some() {
            return Err(EngineError::AlreadyStreaming);
        }

        let slot: Slot = Arc::new(Mutex::new(Some(refill)));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();
        self.live.store(true, Ordering::Release);

        let worker = {
            let slot = Arc::clone(&slot);
            let live = Arc::clone(&self.live);
            thread::Builder::new()
                .name("pcmstream-cpal".into())
                .spawn(move || run_stream(n, slot, live, ready_tx, stop_rx))
                .map_err(backend)?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.running = Some(Running { slot, stop_tx, worker });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                self.live.store(false, Ordering::Release);
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                self.live.store(false, Ordering::Release);
                Err(EngineError::Backend("stream thread exited during start".into()))
            }
        }
    }

    fn stop(&mut self) {
        let Some(run) = self.running.take() else { return };
        // Waits out an in-flight refill; later device callbacks find no callback.
        drop(run.slot.lock().take());
        let _ = run.stop_tx.send(());
        if run.worker.join().is_err() {
            error!("cpal stream thread panicked");
        }
        self.live.store(false, Ordering::Release);
    }

    fn is_streaming(&self) -> bool {
        self.running.is_some() && self.live.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
