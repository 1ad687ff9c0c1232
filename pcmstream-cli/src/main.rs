//! pcmstream CLI: plays the stereo tone until the space bar is pressed.

mod cli;
mod config;

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{info, warn};
use pcmstream_engine::{AudioEngine, ClockEngine, StreamController};

use crate::cli::{Backend, Cli};
use crate::config::{FileConfig, Settings};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&cli, file)?;

    let engine = make_engine(settings.backend)?;
    let mut controller = StreamController::new(engine, settings.tone);
    controller
        .initialize(settings.format)
        .with_context(|| format!("initializing {} output", settings.backend.name()))?;

    info!(
        "left {} Hz @ {}, right {} Hz @ {}",
        settings.tone.left.freq_hz, settings.tone.left.amplitude, settings.tone.right.freq_hz, settings.tone.right.amplitude
    );

    {
        let session = controller.session().context("starting the stream")?;
        match settings.duration {
            Some(secs) => {
                info!("auto-stop after {secs} s");
                wait_while_streaming(&session, Some(Duration::from_secs_f64(secs)), || Ok(false))?;
            }
            None => {
                println!("Streaming. Press space to stop.");
                let _raw = RawMode::enable()?;
                wait_while_streaming(&session, None, stop_key_pressed)?;
            }
        }
        session.finish().context("stopping the stream")?;
    }

    let stats = controller.stats();
    info!(
        "{} blocks submitted, {} dropped, {} frames rendered",
        stats.submitted, stats.dropped, stats.frames
    );
    controller.uninitialize()?;
    Ok(())
}

fn make_engine(backend: Backend) -> Result<Box<dyn AudioEngine>> {
    let engine: Box<dyn AudioEngine> = match backend {
        Backend::Clock => Box::new(ClockEngine::default()),
        #[cfg(feature = "realtime")]
        Backend::Cpal => Box::new(pcmstream_engine::CpalEngine::new()),
        #[cfg(not(feature = "realtime"))]
        Backend::Cpal => bail!("built without the `realtime` feature; use --backend clock"),
    };
    Ok(engine)
}

/// Block until `limit` elapses, `should_stop` says so, or the engine drops out.
fn wait_while_streaming(
    controller: &StreamController<Box<dyn AudioEngine>>,
    limit: Option<Duration>,
    mut should_stop: impl FnMut() -> Result<bool>,
) -> Result<()> {
    let started = Instant::now();
    loop {
        if should_stop()? {
            return Ok(());
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            return Ok(());
        }
        if !controller.engine().is_streaming() {
            warn!("{} stopped streaming on its own", controller.engine().name());
            bail!("output device went away");
        }
        if limit.is_some() {
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Space stops; so do `q`, Esc and Ctrl+C, which raw mode would otherwise swallow.
fn stop_key_pressed() -> Result<bool> {
    if !event::poll(Duration::from_millis(50))? {
        return Ok(false);
    }
    let Event::Key(key) = event::read()? else { return Ok(false) };
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    Ok(match key.code {
        KeyCode::Char(' ') | KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    })
}

/// Terminal raw mode for single-key input, restored on drop.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("switching the terminal to raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
