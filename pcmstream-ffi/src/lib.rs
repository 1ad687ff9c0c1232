//! C ABI over the pcmstream output engine.
//!
//! One process-wide engine, driven like the classic pull-model PCM
//! streamers: `pcmstream_initialize` with a format, `pcmstream_start` with
//! a notification callback, and from inside that callback
//! `pcmstream_get_buffer_size` + `pcmstream_copy_to_buffer` to hand over
//! exactly one block.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Lifecycle calls are serialized by a global lock and are safe from any
//!   thread, except the refill callback itself: calling `initialize`,
//!   `uninitialize`, `start` or `stop` from inside it deadlocks.
//! - `get_buffer_size`/`copy_to_buffer` only work on the engine thread
//!   during a callback; elsewhere they return 0 / false.
//! - A block the callback does not submit is played as silence.

use std::cell::RefCell;

use log::{debug, warn};
use parking_lot::Mutex;
use pcmstream_engine::{AudioEngine, EngineError, RefillCallback, RenderTarget, ShareMode, StreamFormat};

/// Success.
pub const PCMSTREAM_OK: i32 = 0;
/// The engine refused the format or share mode.
pub const PCMSTREAM_E_FORMAT: i32 = -1;
/// No output device.
pub const PCMSTREAM_E_NO_DEVICE: i32 = -2;
/// Host audio API failure.
pub const PCMSTREAM_E_BACKEND: i32 = -3;
/// Call made in the wrong lifecycle state.
pub const PCMSTREAM_E_STATE: i32 = -4;
/// Unknown share mode value.
pub const PCMSTREAM_E_ARG: i32 = -5;

/// `share_mode` argument of [`pcmstream_initialize`].
pub const PCMSTREAM_SHARE_MODE_SHARED: u32 = 0;
pub const PCMSTREAM_SHARE_MODE_EXCLUSIVE: u32 = 1;

/// Notification invoked on the engine thread whenever a block is due.
pub type PcmstreamRefill = extern "C" fn();

type Engine = Box<dyn AudioEngine + Send>;

static ENGINE: Mutex<Option<Engine>> = Mutex::new(None);

/// The block being filled by the current callback on this thread.
#[derive(Default)]
struct PendingBlock {
    active: bool,
    size: usize,
    data: Vec<u8>,
    filled: bool,
}

thread_local! {
    static PENDING: RefCell<PendingBlock> = RefCell::new(PendingBlock::default());
}

fn status(e: &EngineError) -> i32 {
    match e {
        EngineError::FormatRejected(_) => PCMSTREAM_E_FORMAT,
        EngineError::NoDevice => PCMSTREAM_E_NO_DEVICE,
        EngineError::Backend(_) => PCMSTREAM_E_BACKEND,
        EngineError::NotInitialized | EngineError::AlreadyInitialized | EngineError::AlreadyStreaming => {
            PCMSTREAM_E_STATE
        }
    }
}

fn share_mode(raw: u32) -> Option<ShareMode> {
    match raw {
        PCMSTREAM_SHARE_MODE_SHARED => Some(ShareMode::Shared),
        PCMSTREAM_SHARE_MODE_EXCLUSIVE => Some(ShareMode::Exclusive),
        _ => None,
    }
}

#[cfg(feature = "realtime")]
fn default_engine() -> Engine {
    Box::new(pcmstream_engine::CpalEngine::new())
}

#[cfg(not(feature = "realtime"))]
fn default_engine() -> Engine {
    Box::new(pcmstream_engine::ClockEngine::default())
}

/// Replace the global engine with `engine` opened for `format`.
fn install(mut engine: Engine, format: &StreamFormat) -> i32 {
    let mut slot = ENGINE.lock();
    if let Some(mut old) = slot.take() {
        debug!("{}: re-initialize, tearing down the previous stream", old.name());
        old.uninitialize();
    }
    match engine.initialize(format) {
        Ok(()) => {
            *slot = Some(engine);
            PCMSTREAM_OK
        }
        Err(e) => {
            warn!("{}: initialize {format} failed: {e}", engine.name());
            status(&e)
        }
    }
}

/// Wrap the C notification into the engine's refill callback.
fn bridge(notify: PcmstreamRefill) -> RefillCallback {
    Box::new(move |target: &mut dyn RenderTarget| {
        let size = target.buffer_size();
        PENDING.with(|p| {
            let mut p = p.borrow_mut();
            p.active = true;
            p.size = size;
            p.filled = false;
        });

        notify();

        PENDING.with(|p| {
            let mut p = p.borrow_mut();
            if p.filled && !target.copy_to_buffer(&p.data[..size]) {
                debug!("engine refused a {size} B block");
            }
            p.active = false;
            p.filled = false;
        });
    })
}

/// Open the default output device.
///
/// `share_mode` is `PCMSTREAM_SHARE_MODE_SHARED` or
/// `PCMSTREAM_SHARE_MODE_EXCLUSIVE`. An already initialized engine is torn
/// down first. Returns `PCMSTREAM_OK` or a negative status.
#[no_mangle]
pub extern "C" fn pcmstream_initialize(share_mode_raw: u32, channels: u16, bits_per_sample: u16, sample_rate: u32) -> i32 {
    let Some(mode) = share_mode(share_mode_raw) else {
        return PCMSTREAM_E_ARG;
    };
    let format = StreamFormat::new(mode, channels, bits_per_sample, sample_rate);
    install(default_engine(), &format)
}

/// Stop streaming and release the device. No-op when not initialized.
#[no_mangle]
pub extern "C" fn pcmstream_uninitialize() {
    if let Some(mut engine) = ENGINE.lock().take() {
        engine.uninitialize();
    }
}

/// Start streaming, restarting if already started. Returns whether the
/// engine is streaming afterwards.
#[no_mangle]
pub extern "C" fn pcmstream_start(on_refill: Option<PcmstreamRefill>) -> bool {
    let Some(notify) = on_refill else { return false };
    let mut slot = ENGINE.lock();
    let Some(engine) = slot.as_mut() else { return false };
    engine.stop();
    match engine.start(bridge(notify)) {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: start failed: {e}", engine.name());
            false
        }
    }
}

/// Stop streaming. Returns after the last callback has finished.
#[no_mangle]
pub extern "C" fn pcmstream_stop() {
    if let Some(engine) = ENGINE.lock().as_mut() {
        engine.stop();
    }
}

#[no_mangle]
pub extern "C" fn pcmstream_get_is_streaming() -> bool {
    // Inside a callback the stream is live by definition, and `stop` may
    // be holding the lock while it waits for this callback to return.
    if PENDING.with(|p| p.borrow().active) {
        return true;
    }
    ENGINE.lock().as_ref().is_some_and(|e| e.is_streaming())
}

/// Size in bytes of the block due in the current callback, 0 elsewhere.
#[no_mangle]
pub extern "C" fn pcmstream_get_buffer_size() -> u32 {
    PENDING.with(|p| {
        let p = p.borrow();
        if p.active {
            u32::try_from(p.size).unwrap_or(0)
        } else {
            0
        }
    })
}

/// Submit the current block. `length` must equal
/// [`pcmstream_get_buffer_size`]; only one submission per callback.
///
/// # Safety
/// `data` must point to at least `length` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn pcmstream_copy_to_buffer(data: *const u8, length: u32) -> bool {
    if data.is_null() {
        return false;
    }
    PENDING.with(|p| {
        let mut p = p.borrow_mut();
        if !p.active || p.filled || p.size == 0 || length as usize != p.size {
            return false;
        }
        // SAFETY: caller guarantees `length` readable bytes at `data`.
        let src = unsafe { std::slice::from_raw_parts(data, p.size) };
        p.data.clear();
        p.data.extend_from_slice(src);
        p.filled = true;
        true
    })
}
