//! cpal-backed device seams for desktop hosts.
//!
//! cpal streams are not `Send`, so every stream lives on a dedicated thread
//! and is driven through a command channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::DomainError;
use crate::ports::{
    CaptureDevice, CompletionCallback, PcmSource, PlaybackDevice, PlaybackHandle,
};

/// Lock-free ring buffer for captured samples.
type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

fn device_error(context: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::AudioDevice {
        message: format!("{}: {}", context, e),
    }
}

fn wav_error(e: hound::Error) -> DomainError {
    device_error("WAV I/O failed", e)
}

fn has_input_device() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// A thread owning non-`Send` audio state, driven by commands.
struct DeviceThread<C> {
    cmd_tx: Option<mpsc::Sender<C>>,
    handle: Option<JoinHandle<()>>,
}

impl<C: Send + 'static> DeviceThread<C> {
    fn spawn<F>(name: &str, run: F) -> Result<Self, DomainError>
    where
        F: FnOnce(mpsc::Receiver<C>) + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(cmd_rx))
            .map_err(|e| device_error("Failed to spawn audio thread", e))?;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            handle: Some(handle),
        })
    }

    async fn request<T, F>(&self, command: F) -> Result<T, DomainError>
    where
        T: Send,
        F: FnOnce(oneshot::Sender<Result<T, DomainError>>) -> C + Send,
    {
        let cmd_tx = self.cmd_tx.as_ref().ok_or_else(|| DomainError::AudioDevice {
            message: "Audio thread not running".to_string(),
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;

        reply_rx.await.map_err(|_| DomainError::AudioDevice {
            message: "Audio thread did not respond".to_string(),
        })?
    }
}

impl<C> Drop for DeviceThread<C> {
    fn drop(&mut self) {
        // Closing the channel ends the command loop.
        self.cmd_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A running input stream feeding mono samples into a ring buffer.
struct InputTap {
    stream: Stream,
    consumer: RingConsumer,
    sample_rate: u32,
    overflow: Arc<AtomicUsize>,
}

mod input {
    use super::*;

    pub fn default_device() -> Result<Device, DomainError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| DomainError::AudioDevice {
                message: "No default input device available".to_string(),
            })
    }

    /// Open the default input and start streaming into a ring buffer that
    /// holds `buffer_secs` of mono audio.
    pub fn open_tap(buffer_secs: u32) -> Result<InputTap, DomainError> {
        let device = default_device()?;
        let supported = device
            .default_input_config()
            .map_err(|e| device_error("Failed to get default config", e))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Input device config"
        );

        let channels = config.channels.max(1) as usize;
        let sample_rate = config.sample_rate.0;
        let capacity = buffer_secs.max(1) as usize * sample_rate as usize;
        let (mut producer, consumer) = HeapRb::<i16>::new(capacity).split();

        let overflow = Arc::new(AtomicUsize::new(0));
        let overflow_cb = Arc::clone(&overflow);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    push_mono(data, channels, &mut producer, &overflow_cb);
                },
                |err| error!(?err, "Audio input stream error"),
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    push_mono(&i16_data, channels, &mut producer, &overflow_cb);
                },
                |err| error!(?err, "Audio input stream error"),
                None,
            ),
            other => {
                return Err(DomainError::AudioDevice {
                    message: format!("Unsupported sample format: {:?}", other),
                });
            }
        }
        .map_err(|e| device_error("Failed to build stream", e))?;

        stream
            .play()
            .map_err(|e| device_error("Failed to start stream", e))?;

        Ok(InputTap {
            stream,
            consumer,
            sample_rate,
            overflow,
        })
    }

    fn push_mono(
        data: &[i16],
        channels: usize,
        producer: &mut RingProducer,
        overflow: &AtomicUsize,
    ) {
        // Convert interleaved channels to mono
        let mono: Vec<i16> = if channels > 1 {
            data.chunks(channels)
                .map(|chunk| {
                    let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                    (sum / chunk.len() as i32) as i16
                })
                .collect()
        } else {
            data.to_vec()
        };

        let pushed = producer.push_slice(&mono);
        if pushed < mono.len() {
            overflow.fetch_add(mono.len() - pushed, Ordering::Relaxed);
        }
    }
}

// ---------------------------------------------------------------------------
// Clip capture
// ---------------------------------------------------------------------------

enum CaptureCommand {
    Begin {
        path: PathBuf,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Finish {
        finalize: bool,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
}

struct ActiveCapture {
    tap: InputTap,
    path: PathBuf,
}

impl ActiveCapture {
    /// Stop the stream and, when `finalize` is set, write the buffered audio
    /// as 16-bit mono WAV.
    fn finish(self, finalize: bool) -> Result<(), DomainError> {
        let ActiveCapture { tap, path } = self;
        let InputTap {
            stream,
            mut consumer,
            sample_rate,
            overflow,
        } = tap;
        drop(stream);

        if !finalize {
            return Ok(());
        }

        let dropped = overflow.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped_samples = dropped, "Capture buffer overflowed, clip truncated");
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).map_err(wav_error)?;

        let mut chunk = vec![0i16; 4096];
        let mut written = 0usize;
        loop {
            let read = consumer.pop_slice(&mut chunk);
            if read == 0 {
                break;
            }
            for &sample in &chunk[..read] {
                writer.write_sample(sample).map_err(wav_error)?;
            }
            written += read;
        }
        writer.finalize().map_err(wav_error)?;

        info!(path = ?path, samples = written, sample_rate, "Clip written");
        Ok(())
    }
}

fn capture_thread_main(buffer_secs: u32, mut cmd_rx: mpsc::Receiver<CaptureCommand>) {
    // Stream is kept here on the audio thread (not Send)
    let mut active: Option<ActiveCapture> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Begin { path, reply } => {
                if let Some(previous) = active.take() {
                    let _ = previous.finish(false);
                }
                let result = input::open_tap(buffer_secs).map(|tap| {
                    debug!(path = ?path, sample_rate = tap.sample_rate, "Capture stream opened");
                    active = Some(ActiveCapture { tap, path });
                });
                let _ = reply.send(result);
            }
            CaptureCommand::Finish { finalize, reply } => {
                let result = match active.take() {
                    Some(capture) => capture.finish(finalize),
                    None => Err(DomainError::AudioNotRecording),
                };
                let _ = reply.send(result);
            }
        }
    }
    debug!("Capture thread shutting down");
}

/// Microphone capture into WAV clips.
pub struct CpalCaptureDevice {
    thread: DeviceThread<CaptureCommand>,
}

impl CpalCaptureDevice {
    /// `buffer_secs` bounds how much audio a single clip can hold.
    pub fn new(buffer_secs: u32) -> Result<Self, DomainError> {
        let thread = DeviceThread::spawn("audio-capture", move |cmd_rx| {
            capture_thread_main(buffer_secs, cmd_rx)
        })?;
        Ok(Self { thread })
    }
}

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    fn clip_extension(&self) -> &'static str {
        "wav"
    }

    async fn begin(&self, path: &Path) -> Result<(), DomainError> {
        let path = path.to_path_buf();
        self.thread
            .request(|reply| CaptureCommand::Begin { path, reply })
            .await
    }

    async fn finish(&self, finalize: bool) -> Result<(), DomainError> {
        self.thread
            .request(|reply| CaptureCommand::Finish { finalize, reply })
            .await
    }

    fn has_permission(&self) -> bool {
        has_input_device()
    }
}

// ---------------------------------------------------------------------------
// PCM metering
// ---------------------------------------------------------------------------

/// Ring buffer length for metering; older audio is dropped.
const METER_BUFFER_SECS: u32 = 1;

enum PcmCommand {
    Open {
        reply: oneshot::Sender<Result<(RingConsumer, u32), DomainError>>,
    },
    Close {
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
}

fn pcm_thread_main(mut cmd_rx: mpsc::Receiver<PcmCommand>) {
    let mut stream: Option<Stream> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            PcmCommand::Open { reply } => {
                stream.take();
                let result = input::open_tap(METER_BUFFER_SECS).map(|tap| {
                    stream = Some(tap.stream);
                    (tap.consumer, tap.sample_rate)
                });
                let _ = reply.send(result);
            }
            PcmCommand::Close { reply } => {
                stream.take();
                let _ = reply.send(Ok(()));
            }
        }
    }
    debug!("PCM thread shutting down");
}

/// Raw microphone PCM for the noise meter.
pub struct CpalPcmSource {
    thread: DeviceThread<PcmCommand>,
    consumer: Mutex<Option<RingConsumer>>,
    frame_len: AtomicUsize,
}

impl CpalPcmSource {
    pub fn new() -> Result<Self, DomainError> {
        let thread = DeviceThread::spawn("audio-meter", pcm_thread_main)?;
        Ok(Self {
            thread,
            consumer: Mutex::new(None),
            frame_len: AtomicUsize::new(4410),
        })
    }
}

#[async_trait]
impl PcmSource for CpalPcmSource {
    async fn open(&self) -> Result<(), DomainError> {
        let (consumer, sample_rate) = self
            .thread
            .request(|reply| PcmCommand::Open { reply })
            .await?;
        // 100 ms of audio per read
        self.frame_len
            .store((sample_rate / 10).max(1) as usize, Ordering::Relaxed);
        *self.consumer.lock() = Some(consumer);
        Ok(())
    }

    fn read(&self, buf: &mut [i16]) -> usize {
        self.consumer
            .lock()
            .as_mut()
            .map(|consumer| consumer.pop_slice(buf))
            .unwrap_or(0)
    }

    async fn close(&self) {
        self.consumer.lock().take();
        if let Err(e) = self.thread.request(|reply| PcmCommand::Close { reply }).await {
            debug!(error = %e, "Failed to close PCM stream");
        }
    }

    fn frame_len(&self) -> usize {
        self.frame_len.load(Ordering::Relaxed)
    }

    fn has_permission(&self) -> bool {
        has_input_device()
    }
}

// ---------------------------------------------------------------------------
// Clip playback
// ---------------------------------------------------------------------------

const NO_SEEK: u64 = u64::MAX;

/// State shared between a playback handle and its output callback.
struct PlaybackShared {
    playing: AtomicBool,
    completed: AtomicBool,
    /// Playhead in source frames.
    frame: AtomicU64,
    seek_request: AtomicU64,
}

/// Reads a decoded clip at the output device rate.
struct Renderer {
    samples: Vec<f32>,
    cursor: f64,
    step: f64,
    shared: Arc<PlaybackShared>,
    on_complete: CompletionCallback,
}

impl Renderer {
    fn begin_block(&mut self) {
        let seek = self.shared.seek_request.swap(NO_SEEK, Ordering::AcqRel);
        if seek != NO_SEEK {
            self.cursor = seek as f64;
        }
    }

    fn next_sample(&mut self) -> f32 {
        if !self.shared.playing.load(Ordering::Acquire) {
            return 0.0;
        }

        let index = self.cursor as usize;
        if index >= self.samples.len() {
            if !self.shared.completed.swap(true, Ordering::AcqRel) {
                self.shared.playing.store(false, Ordering::Release);
                (self.on_complete)();
            }
            return 0.0;
        }

        self.cursor += self.step;
        self.samples[index]
    }

    fn end_block(&self) {
        let frame = (self.cursor as u64).min(self.samples.len() as u64);
        self.shared.frame.store(frame, Ordering::Release);
    }

    fn render_f32(&mut self, data: &mut [f32], channels: usize) {
        self.begin_block();
        for frame in data.chunks_mut(channels) {
            let sample = self.next_sample();
            frame.fill(sample);
        }
        self.end_block();
    }

    fn render_i16(&mut self, data: &mut [i16], channels: usize) {
        self.begin_block();
        for frame in data.chunks_mut(channels) {
            let sample = (self.next_sample().clamp(-1.0, 1.0) * 32767.0) as i16;
            frame.fill(sample);
        }
        self.end_block();
    }
}

/// Decode a WAV clip to mono `f32` samples.
fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32), DomainError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| DomainError::Playback(format!("Failed to open clip: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DomainError::Playback(format!("Failed to decode clip: {}", e)))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DomainError::Playback(format!("Failed to decode clip: {}", e)))?
        }
    };

    let mono = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    } else {
        interleaved
    };

    Ok((mono, spec.sample_rate))
}

fn build_output_stream(mut renderer: Renderer, source_rate: u32) -> Result<Stream, DomainError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| DomainError::Playback("No default output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| DomainError::Playback(format!("Failed to get output config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();
    let channels = config.channels.max(1) as usize;

    renderer.step = source_rate as f64 / config.sample_rate.0.max(1) as f64;

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render_f32(data, channels)
            },
            |err| error!(?err, "Audio output stream error"),
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                renderer.render_i16(data, channels)
            },
            |err| error!(?err, "Audio output stream error"),
            None,
        ),
        other => {
            return Err(DomainError::Playback(format!(
                "Unsupported output format: {:?}",
                other
            )));
        }
    }
    .map_err(|e| DomainError::Playback(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| DomainError::Playback(format!("Failed to start output stream: {}", e)))?;

    Ok(stream)
}

/// Speaker playback of WAV clips.
#[derive(Debug, Default)]
pub struct CpalPlaybackDevice;

impl CpalPlaybackDevice {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackDevice for CpalPlaybackDevice {
    fn open(
        &self,
        path: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn PlaybackHandle>, DomainError> {
        let (samples, sample_rate) = decode_wav(path)?;
        let total_frames = samples.len() as u64;

        let shared = Arc::new(PlaybackShared {
            playing: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            seek_request: AtomicU64::new(NO_SEEK),
        });

        let renderer = Renderer {
            samples,
            cursor: 0.0,
            step: 1.0,
            shared: Arc::clone(&shared),
            on_complete,
        };

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || match build_output_stream(renderer, sample_rate) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Parked until the handle is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| DomainError::Playback(format!("Failed to spawn playback thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| DomainError::Playback("Playback thread did not respond".to_string()))??;

        debug!(path = ?path, frames = total_frames, sample_rate, "Clip loaded");
        Ok(Box::new(CpalPlaybackHandle {
            shared,
            sample_rate: sample_rate.max(1),
            total_frames,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }))
    }
}

struct CpalPlaybackHandle {
    shared: Arc<PlaybackShared>,
    sample_rate: u32,
    total_frames: u64,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalPlaybackHandle {
    fn frames_to_ms(&self, frames: u64) -> u64 {
        frames * 1000 / self.sample_rate as u64
    }
}

impl PlaybackHandle for CpalPlaybackHandle {
    fn duration_ms(&self) -> u64 {
        self.frames_to_ms(self.total_frames)
    }

    fn start(&self) -> Result<(), DomainError> {
        // A finished clip starts over.
        if self.shared.completed.swap(false, Ordering::AcqRel) {
            self.shared.seek_request.store(0, Ordering::Release);
            self.shared.frame.store(0, Ordering::Release);
        }
        self.shared.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&self) {
        self.shared.playing.store(false, Ordering::Release);
    }

    fn seek(&self, position_ms: u64) {
        let frame = (position_ms * self.sample_rate as u64 / 1000).min(self.total_frames);
        self.shared.completed.store(false, Ordering::Release);
        self.shared.seek_request.store(frame, Ordering::Release);
        self.shared.frame.store(frame, Ordering::Release);
    }

    fn position_ms(&self) -> u64 {
        self.frames_to_ms(self.shared.frame.load(Ordering::Acquire))
    }
}

impl Drop for CpalPlaybackHandle {
    fn drop(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_clip(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let level: i16 = if c == 0 { 16384 } else { 0 };
                let sample = if i % 2 == 0 { level } else { -level };
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_clip(&path, 8000, 2, 800);

        let (samples, rate) = decode_wav(&path).unwrap();

        assert_eq!(rate, 8000);
        assert_eq!(samples.len(), 800);
        assert!((samples[0] - 0.25).abs() < 1e-3);
        assert!((samples[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_missing_clip() {
        let err = decode_wav(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, DomainError::Playback(_)));
    }

    #[test]
    fn test_renderer_completes_once() {
        let shared = Arc::new(PlaybackShared {
            playing: AtomicBool::new(true),
            completed: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            seek_request: AtomicU64::new(NO_SEEK),
        });
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        let mut renderer = Renderer {
            samples: vec![0.5; 4],
            cursor: 0.0,
            step: 0.5,
            shared: Arc::clone(&shared),
            on_complete: Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        };

        let mut out = vec![0.0f32; 12];
        renderer.render_f32(&mut out, 1);

        assert_eq!(&out[..8], &[0.5; 8]);
        assert_eq!(&out[8..], &[0.0; 4]);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(!shared.playing.load(Ordering::SeqCst));
        assert_eq!(shared.frame.load(Ordering::SeqCst), 4);

        renderer.render_f32(&mut out, 1);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_renderer_applies_seek() {
        let shared = Arc::new(PlaybackShared {
            playing: AtomicBool::new(true),
            completed: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            seek_request: AtomicU64::new(2),
        });
        let mut renderer = Renderer {
            samples: vec![0.1, 0.2, 0.3, 0.4],
            cursor: 0.0,
            step: 1.0,
            shared: Arc::clone(&shared),
            on_complete: Box::new(|| {}),
        };

        let mut out = vec![0i16; 4];
        renderer.render_i16(&mut out, 2);

        assert_eq!(out[0], out[1]);
        assert_eq!(out[0], (0.3f32 * 32767.0) as i16);
        assert_eq!(shared.frame.load(Ordering::SeqCst), 4);
    }
}
