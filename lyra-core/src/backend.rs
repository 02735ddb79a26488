use std::{
    fs::File,
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rodio::{
    Decoder, DeviceTrait, OutputStream, OutputStreamBuilder, Sink, Source,
    cpal::{self, traits::HostTrait},
};

use crate::device::{AudioDevice, DeviceError, DeviceEvent};

/// How often the output thread reports position while playing
const TICK: Duration = Duration::from_millis(250);

/// Requests crossing from the engine to the output thread
#[derive(Debug, Clone)]
enum OutputCommand {
    SetSource(String),
    Play,
    Pause,
    Stop,
    Seek(f32),
    SetVolume(f32),
    Quit,
}

/// [`AudioDevice`] backed by a rodio sink on a dedicated output thread.
///
/// Events from the thread queue up until the host calls
/// [`PlaybackEngine::pump`](crate::engine::PlaybackEngine::pump).
pub struct RodioDevice {
    cmd_tx: Sender<OutputCommand>,
    event_rx: Receiver<DeviceEvent>,
    volume: f32,
    device_name: String,
    thread: Option<JoinHandle<()>>,
}

impl RodioDevice {
    /// Open the default output device and start the output thread
    pub fn open_default() -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread = thread::Builder::new()
            .name("lyra-output".to_string())
            .spawn(move || match OutputThread::try_new_default(event_tx) {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(output.device_name.clone()));
                    output.run(cmd_rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .context("Cannot spawn audio output thread")?;

        let device_name = ready_rx
            .recv()
            .context("Audio output thread exited during startup")??;
        log::info!("Audio output opened on {}", device_name);

        Ok(Self {
            cmd_tx,
            event_rx,
            volume: 1.0,
            device_name,
            thread: Some(thread),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn send(&self, command: OutputCommand) {
        if let Err(e) = self.cmd_tx.send(command) {
            log::error!("Audio output thread is gone, dropping {:?}", e.into_inner());
        }
    }
}

impl AudioDevice for RodioDevice {
    fn set_source(&mut self, url: &str) {
        self.send(OutputCommand::SetSource(url.to_string()));
    }

    fn play(&mut self) {
        self.send(OutputCommand::Play);
    }

    fn pause(&mut self) {
        self.send(OutputCommand::Pause);
    }

    fn stop(&mut self) {
        self.send(OutputCommand::Stop);
    }

    fn seek(&mut self, seconds: f32) {
        self.send(OutputCommand::Seek(seconds));
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.send(OutputCommand::SetVolume(volume));
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn drain_events(&mut self) -> Vec<DeviceEvent> {
        self.event_rx.try_iter().collect()
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(OutputCommand::Quit);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Audio output thread panicked");
            }
        }
    }
}

/// State owned by the output thread
struct OutputThread {
    /// Keeps the device stream alive; `None` for a sink with no device
    _stream: Option<OutputStream>,
    sink: Sink,
    device_name: String,
    source: Option<PathBuf>,
    duration: Option<Duration>,
    playing: bool,
    last_tick: Instant,
    event_tx: Sender<DeviceEvent>,
}

impl OutputThread {
    fn try_new_default(event_tx: Sender<DeviceEvent>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device found")?;

        let device_name = device.name().unwrap_or_else(|_| "(unknown)".to_string());

        let stream_builder = OutputStreamBuilder::from_device(device)
            .context("Cannot create output stream builder from device")?;

        let stream = stream_builder.open_stream().context("Cannot create stream output")?;

        let sink = Sink::connect_new(stream.mixer());

        Ok(Self::with_sink(Some(stream), sink, device_name, event_tx))
    }

    fn with_sink(
        stream: Option<OutputStream>,
        sink: Sink,
        device_name: String,
        event_tx: Sender<DeviceEvent>,
    ) -> Self {
        OutputThread {
            _stream: stream,
            sink,
            device_name,
            source: None,
            duration: None,
            playing: false,
            last_tick: Instant::now(),
            event_tx,
        }
    }

    /// A source is loaded and still queued in the sink
    fn holds_source(&self) -> bool {
        self.source.is_some() && !self.sink.empty()
    }

    fn run(mut self, cmd_rx: Receiver<OutputCommand>) {
        loop {
            match cmd_rx.recv_timeout(TICK) {
                Ok(OutputCommand::Quit) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.apply(command),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if self.last_tick.elapsed() >= TICK {
                self.last_tick = Instant::now();
                self.tick();
            }
        }
        log::debug!("Audio output thread exiting");
    }

    fn apply(&mut self, command: OutputCommand) {
        match command {
            OutputCommand::SetSource(url) => {
                self.sink.stop();
                self.playing = false;
                self.source = None;
                self.duration = None;

                match resolve_source(&url).and_then(|path| self.load(&path).map(|_| path)) {
                    Ok(path) => {
                        log::debug!("Loaded source {:?}", path);
                        self.source = Some(path);
                        self.emit(DeviceEvent::CanPlay);
                    }
                    Err(e) => self.emit_error(format!("{:#}", e)),
                }
            }
            OutputCommand::Play => {
                if self.sink.empty() {
                    // Stopped or ended: start the source over
                    let Some(path) = self.source.clone() else {
                        return;
                    };
                    if let Err(e) = self.load(&path) {
                        self.emit_error(format!("{:#}", e));
                        return;
                    }
                }
                self.sink.play();
                self.playing = true;
                self.emit(DeviceEvent::Play);
            }
            OutputCommand::Pause => {
                if !self.holds_source() {
                    log::debug!("Nothing loaded, ignoring pause");
                    return;
                }
                self.sink.pause();
                self.playing = false;
                self.emit(DeviceEvent::Pause);
            }
            OutputCommand::Stop => {
                self.sink.stop();
                self.playing = false;
                self.emit(DeviceEvent::Stop);
            }
            OutputCommand::Seek(seconds) => {
                if self.sink.empty() {
                    return;
                }
                let result = seek_target(seconds, self.duration).and_then(|target| {
                    self.sink
                        .try_seek(target)
                        .map_err(|e| anyhow::anyhow!("Seek failed: {}", e))
                });
                match result {
                    Ok(()) => self.emit_time(),
                    Err(e) => self.emit_error(format!("{:#}", e)),
                }
            }
            OutputCommand::SetVolume(volume) => self.sink.set_volume(volume),
            OutputCommand::Quit => {}
        }
    }

    /// Decode `path` and queue it paused
    fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path).context("Failed to open the file")?;
        let decoder = Decoder::try_from(file).context("Failed to decode the opened audio file")?;

        self.duration = decoder.total_duration();
        self.sink.pause();
        self.sink.append(decoder);
        Ok(())
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        if self.sink.empty() {
            self.playing = false;
            self.emit(DeviceEvent::Ended);
        } else {
            self.emit_time();
        }
    }

    fn emit_time(&self) {
        let position = self.sink.get_pos().as_secs_f32();
        let duration = self.duration.map_or(0.0, |d| d.as_secs_f32());
        self.emit(DeviceEvent::TimeUpdate { position, duration });
    }

    fn emit_error(&self, message: String) {
        log::error!("{}", message);
        self.emit(DeviceEvent::Error(DeviceError::new(message)));
    }

    fn emit(&self, event: DeviceEvent) {
        // Receiver only disappears while the device is being dropped
        let _ = self.event_tx.send(event);
    }
}

/// Convert a requested seek position into a sink position, clamped to the
/// source length when it is known.
fn seek_target(seconds: f32, duration: Option<Duration>) -> anyhow::Result<Duration> {
    let seconds = match duration {
        Some(duration) => seconds.min(duration.as_secs_f32()),
        None => seconds,
    };
    Duration::try_from_secs_f32(seconds.max(0.0))
        .with_context(|| format!("Cannot seek to {} seconds", seconds))
}

/// Map an audio URL to a local path. Remote sources are not supported.
fn resolve_source(url: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        anyhow::bail!("Remote source {} is not supported", url);
    }
    Ok(PathBuf::from(url))
}
