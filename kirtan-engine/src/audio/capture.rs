//! Live audio capture
//!
//! Owns the microphone-equivalent resource and drives the extraction loop.
//! The device callback only downmixes to mono and pushes into a lock-free
//! ring buffer; a dedicated worker thread drains fixed-size frames into the
//! `FeatureAccumulator`. When the ring is full the callback drops samples
//! and counts them instead of blocking the real-time thread.

use crate::audio::extractor::{ChantPhase, FeatureAccumulator};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, Stream, StreamConfig};
use kirtan_common::config::CaptureConfig;
use kirtan_common::metrics::FinalizedMetrics;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phase tag source, sampled once per frame by the extraction worker
pub type PhaseTagFn = Arc<dyn Fn() -> ChantPhase + Send + Sync>;

/// Live audio feature extractor bound to an input device.
///
/// `start()` acquires the device and is idempotent while a capture is
/// running; `stop()` releases the device on every path and returns the
/// finalized metrics for the attempt.
pub struct AudioFeatureExtractor {
    config: CaptureConfig,
    phase_fn: PhaseTagFn,
    active: Option<ActiveCapture>,
}

struct ActiveCapture {
    stream: Stream,
    stop_flag: Arc<AtomicBool>,
    dropped_samples: Arc<AtomicU64>,
    worker: JoinHandle<FinalizedMetrics>,
}

impl AudioFeatureExtractor {
    pub fn new(config: CaptureConfig, phase_fn: PhaseTagFn) -> Self {
        Self {
            config,
            phase_fn,
            active: None,
        }
    }

    /// Whether a capture is currently running
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Samples dropped by the callback because the worker fell behind
    pub fn dropped_samples(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| a.dropped_samples.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Acquire the input device and begin extraction.
    ///
    /// Idempotent: calling `start` while running is a no-op. Device
    /// acquisition failure surfaces `CaptureUnavailable` and leaves no
    /// partial state behind.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            debug!("Capture already running; start() is a no-op");
            return Ok(());
        }

        let device = Self::open_device(self.config.device_name.as_deref())?;
        let supported = device.default_input_config().map_err(|e| {
            Error::CaptureUnavailable(format!("No usable input config: {e}"))
        })?;
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.config();

        // The accumulator must agree with what the device actually delivers
        let mut capture_config = self.config.clone();
        capture_config.sample_rate = stream_config.sample_rate.0;

        let ring = HeapRb::<f32>::new(self.config.ring_capacity.max(capture_config.frame_size * 4));
        let (producer, consumer) = ring.split();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let dropped_samples = Arc::new(AtomicU64::new(0));

        let stream = Self::build_stream(
            &device,
            &stream_config,
            sample_format,
            producer,
            Arc::clone(&dropped_samples),
        )?;
        stream
            .play()
            .map_err(|e| Error::CaptureUnavailable(format!("Failed to start stream: {e}")))?;

        let worker = Self::spawn_worker(
            capture_config,
            consumer,
            Arc::clone(&self.phase_fn),
            Arc::clone(&stop_flag),
        );

        info!(
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            "Capture started"
        );

        self.active = Some(ActiveCapture {
            stream,
            stop_flag,
            dropped_samples,
            worker,
        });
        Ok(())
    }

    /// Stop capture, release the device, and return the finalized metrics.
    pub fn stop(&mut self) -> Result<FinalizedMetrics> {
        let active = self
            .active
            .take()
            .ok_or_else(|| Error::CaptureUnavailable("No active capture".to_string()))?;

        // Dropping the stream stops callbacks before the worker drains the
        // remaining ring contents.
        drop(active.stream);
        active.stop_flag.store(true, Ordering::SeqCst);

        let dropped = active.dropped_samples.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped, "Capture shed samples under load");
        }

        active.worker.join().map_err(|_| {
            Error::from(kirtan_common::Error::Internal(
                "Extraction worker panicked".to_string(),
            ))
        })
    }

    fn open_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host.input_devices().map_err(|e| {
                Error::CaptureUnavailable(format!("Failed to enumerate input devices: {e}"))
            })?;
            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested input device: {name}");
                return Ok(device);
            }
            warn!("Requested input device '{name}' not found, falling back to default");
        }

        host.default_input_device()
            .ok_or_else(|| Error::CaptureUnavailable("No default input device".to_string()))
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        producer: HeapProd<f32>,
        dropped: Arc<AtomicU64>,
    ) -> Result<Stream> {
        match sample_format {
            SampleFormat::F32 => Self::build_stream_typed::<f32>(device, config, producer, dropped),
            SampleFormat::I16 => Self::build_stream_typed::<i16>(device, config, producer, dropped),
            SampleFormat::U16 => Self::build_stream_typed::<u16>(device, config, producer, dropped),
            other => Err(Error::CaptureUnavailable(format!(
                "Unsupported sample format: {other:?}"
            ))),
        }
    }

    fn build_stream_typed<T>(
        device: &Device,
        config: &StreamConfig,
        mut producer: HeapProd<f32>,
        dropped: Arc<AtomicU64>,
    ) -> Result<Stream>
    where
        T: cpal::SizedSample,
        f32: FromSample<T>,
    {
        let channels = config.channels as usize;

        let stream = device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels.max(1)) {
                        let mono = frame
                            .iter()
                            .map(|&s| f32::from_sample(s))
                            .sum::<f32>()
                            / frame.len() as f32;
                        if producer.try_push(mono).is_err() {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                move |err| {
                    warn!("Input stream error: {err}");
                },
                None,
            )
            .map_err(|e| Error::CaptureUnavailable(format!("Failed to build stream: {e}")))?;

        Ok(stream)
    }

    fn spawn_worker(
        config: CaptureConfig,
        mut consumer: HeapCons<f32>,
        phase_fn: PhaseTagFn,
        stop_flag: Arc<AtomicBool>,
    ) -> JoinHandle<FinalizedMetrics> {
        std::thread::spawn(move || {
            let frame_size = config.frame_size.max(1);
            let mut accumulator = FeatureAccumulator::new(config);
            let mut frame = vec![0.0f32; frame_size];
            let mut filled = 0usize;

            loop {
                let popped = consumer.pop_slice(&mut frame[filled..]);
                filled += popped;

                if filled == frame_size {
                    accumulator.push_frame(&frame, phase_fn());
                    filled = 0;
                    continue;
                }

                if popped == 0 {
                    if stop_flag.load(Ordering::SeqCst) {
                        // Ring drained; a trailing partial frame is discarded
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
            }

            accumulator.finalize()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> AudioFeatureExtractor {
        AudioFeatureExtractor::new(
            CaptureConfig::default(),
            Arc::new(|| ChantPhase::Independent),
        )
    }

    #[test]
    fn test_stop_without_start_is_capture_unavailable() {
        let mut ext = extractor();
        match ext.stop() {
            Err(Error::CaptureUnavailable(_)) => {}
            other => panic!("expected CaptureUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_start_is_idempotent_or_unavailable() {
        // CI machines rarely expose an input device; either outcome is
        // acceptable, but a second start after success must be a no-op.
        let mut ext = extractor();
        match ext.start() {
            Ok(()) => {
                assert!(ext.is_running());
                ext.start().expect("second start must be a no-op");
                let metrics = ext.stop().expect("stop returns metrics");
                assert!(metrics.duration_seconds >= 0.1);
                assert!(!ext.is_running());
            }
            Err(Error::CaptureUnavailable(_)) => {
                assert!(!ext.is_running());
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
