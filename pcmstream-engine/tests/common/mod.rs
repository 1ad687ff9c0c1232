//! Hand-driven engine for integration tests.
//!
//! `ScriptedEngine` never runs a thread: the test calls
//! [`EngineProbe::fire`] to simulate the device asking for a block. The
//! probe keeps working after `stop`, so tests can assert that a forced
//! refill after stop never reaches the callback.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pcmstream_engine::{AudioEngine, EngineError, RefillCallback, RenderTarget, StreamFormat};

#[derive(Default)]
struct Inner {
    reject_format: bool,
    format: Option<StreamFormat>,
    callback: Option<RefillCallback>,
    refuse_next: usize,
    uninit_calls: usize,
    invocations: usize,
    attempts_without_callback: usize,
    delivered: Vec<Vec<u8>>,
    refused: usize,
}

struct ScriptTarget {
    size: usize,
    accept: bool,
    data: Option<Vec<u8>>,
}

impl RenderTarget for ScriptTarget {
    fn buffer_size(&self) -> usize {
        self.size
    }

    fn copy_to_buffer(&mut self, data: &[u8]) -> bool {
        if data.len() != self.size || self.data.is_some() || !self.accept {
            return false;
        }
        self.data = Some(data.to_vec());
        true
    }
}

pub struct ScriptedEngine {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
pub struct EngineProbe {
    inner: Arc<Mutex<Inner>>,
}

pub fn scripted() -> (ScriptedEngine, EngineProbe) {
    let inner = Arc::new(Mutex::new(Inner::default()));
    (ScriptedEngine { inner: Arc::clone(&inner) }, EngineProbe { inner })
}

pub fn rejecting() -> (ScriptedEngine, EngineProbe) {
    let (engine, probe) = scripted();
    probe.inner.lock().unwrap().reject_format = true;
    (engine, probe)
}

impl AudioEngine for ScriptedEngine {
    fn initialize(&mut self, format: &StreamFormat) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reject_format {
            return Err(EngineError::FormatRejected(format.to_string()));
        }
        if inner.format.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        inner.format = Some(*format);
        Ok(())
    }

    fn uninitialize(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.callback = None;
        inner.format = None;
        inner.uninit_calls += 1;
    }

    fn start(&mut self, refill: RefillCallback) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.format.is_none() {
            return Err(EngineError::NotInitialized);
        }
        inner.callback = Some(refill);
        Ok(())
    }

    fn stop(&mut self) {
        // Taking the lock waits out a `fire` in progress.
        self.inner.lock().unwrap().callback = None;
    }

    fn is_streaming(&self) -> bool {
        self.inner.lock().unwrap().callback.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl EngineProbe {
    /// Ask for one block of `size` bytes. Returns false when no callback is registered.
    pub fn fire(&self, size: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let accept = if inner.refuse_next > 0 {
            inner.refuse_next -= 1;
            false
        } else {
            true
        };

        if inner.callback.is_none() {
            inner.attempts_without_callback += 1;
            return false;
        }

        let mut target = ScriptTarget { size, accept, data: None };
        if let Some(callback) = inner.callback.as_mut() {
            callback(&mut target);
        }
        inner.invocations += 1;
        match target.data {
            Some(block) => inner.delivered.push(block),
            None => inner.refused += 1,
        }
        true
    }

    /// Refuse the next `n` submissions.
    pub fn refuse_next(&self, n: usize) {
        self.inner.lock().unwrap().refuse_next = n;
    }

    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().delivered.clone()
    }

    pub fn invocations(&self) -> usize {
        self.inner.lock().unwrap().invocations
    }

    pub fn refused(&self) -> usize {
        self.inner.lock().unwrap().refused
    }

    pub fn attempts_without_callback(&self) -> usize {
        self.inner.lock().unwrap().attempts_without_callback
    }

    pub fn uninit_calls(&self) -> usize {
        self.inner.lock().unwrap().uninit_calls
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.inner.lock().unwrap().format
    }
}

/// Native-endian bytes of the first `frames` frames of the default tone.
pub fn reference_bytes(frames: usize) -> Vec<u8> {
    let mut osc = pcmstream_core::StereoOscillator::default();
    let mut samples = vec![0i16; frames * 2];
    osc.render_interleaved(&mut samples);
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}
