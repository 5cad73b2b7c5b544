//! Microphone capture using cpal
//!
//! The cpal stream is not `Send`, so it lives on its own thread for the
//! whole session. Samples are only kept while the session is not paused.

use crate::capture::error::{CaptureError, CaptureResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat};
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// Interleaved 16-bit PCM collected from the microphone
#[derive(Debug, Clone, Default)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl PcmAudio {
    /// Wrap the samples in a RIFF/WAVE container
    pub fn to_wav(&self) -> CaptureResult<Vec<u8>> {
        let data_len = wav_data_len(self.samples.len())?;
        let block_align = self.channels * 2;
        let byte_rate = self.sample_rate * block_align as u32;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(WAV_HEADER_REST + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(out)
    }
}

/// RIFF size field counts everything after itself except the sample data
const WAV_HEADER_REST: u32 = 36;

/// Byte length of the `data` chunk. RIFF sizes are 32-bit, so very long
/// sessions cannot be stored as WAV.
fn wav_data_len(samples: usize) -> CaptureResult<u32> {
    samples
        .checked_mul(2)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .filter(|bytes| bytes.checked_add(WAV_HEADER_REST).is_some())
        .ok_or_else(|| {
            CaptureError::Capture(format!(
                "{} samples exceed the 4 GiB WAV size limit",
                samples
            ))
        })
}

/// Find an input device by name, or the default one
pub fn find_input_device(name: Option<&str>) -> Option<Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .ok()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false)),
        None => host.default_input_device(),
    }
}

/// A running microphone capture thread
pub struct MicrophoneCapture {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<PcmAudio>>,
}

impl MicrophoneCapture {
    /// Open the device and start streaming. Blocks until the stream is live.
    pub fn spawn(
        device_name: Option<String>,
        paused: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
    ) -> CaptureResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<CaptureResult<()>>();

        let thread_running = running.clone();
        let handle = std::thread::spawn(move || {
            let device = match find_input_device(device_name.as_deref()) {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(CaptureError::DeviceNotFound(
                        "No input device".to_string(),
                    )));
                    return PcmAudio::default();
                }
            };

            let config = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(CaptureError::Configuration(format!(
                        "Failed to get input config: {}",
                        e
                    ))));
                    return PcmAudio::default();
                }
            };

            let sample_rate = config.sample_rate().0;
            let channels = config.channels();
            let samples = Arc::new(ParkingMutex::new(Vec::<i16>::new()));
            let stream_config = config.config();

            let err_fn = |err| tracing::error!("Microphone stream error: {}", err);
            let stream = match config.sample_format() {
                SampleFormat::F32 => {
                    let (samples, paused) = (samples.clone(), paused.clone());
                    device.build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if !paused.load(Ordering::Relaxed) {
                                samples.lock().extend(
                                    data.iter()
                                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                                );
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::I16 => {
                    let (samples, paused) = (samples.clone(), paused.clone());
                    device.build_input_stream(
                        &stream_config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            if !paused.load(Ordering::Relaxed) {
                                samples.lock().extend_from_slice(data);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::U16 => {
                    let (samples, paused) = (samples.clone(), paused.clone());
                    device.build_input_stream(
                        &stream_config,
                        move |data: &[u16], _: &cpal::InputCallbackInfo| {
                            if !paused.load(Ordering::Relaxed) {
                                samples
                                    .lock()
                                    .extend(data.iter().map(|&s| (s as i32 - 32768) as i16));
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                other => {
                    let _ = ready_tx.send(Err(CaptureError::Configuration(format!(
                        "Unsupported sample format {:?}",
                        other
                    ))));
                    return PcmAudio::default();
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(CaptureError::Capture(format!(
                        "Failed to build input stream: {}",
                        e
                    ))));
                    return PcmAudio::default();
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::Capture(format!(
                    "Failed to start input stream: {}",
                    e
                ))));
                return PcmAudio::default();
            }

            tracing::info!(
                "Microphone capture started: {} ({}Hz, {}ch)",
                device.name().unwrap_or_else(|_| "Unknown".to_string()),
                sample_rate,
                channels
            );
            let _ = ready_tx.send(Ok(()));

            while thread_running.load(Ordering::SeqCst) && !released.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }
            drop(stream);

            let samples = std::mem::take(&mut *samples.lock());
            tracing::info!("Microphone capture stopped: {} samples", samples.len());

            PcmAudio {
                sample_rate,
                channels,
                samples,
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Capture(
                    "Microphone thread exited before the stream started".to_string(),
                ))
            }
        }
    }

    /// Stop the stream and collect everything captured
    pub fn finish(mut self) -> CaptureResult<PcmAudio> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CaptureError::Capture("Microphone thread panicked".to_string())),
            None => Ok(PcmAudio::default()),
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header() {
        let pcm = PcmAudio {
            sample_rate: 48000,
            channels: 2,
            samples: vec![0, 1, -1, 2],
        };
        let wav = pcm.to_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 8);
    }

    #[test]
    fn test_wav_size_limit() {
        assert_eq!(wav_data_len(4).unwrap(), 8);
        assert_eq!(wav_data_len(0).unwrap(), 0);
        assert!(matches!(
            wav_data_len(usize::MAX / 2 + 1),
            Err(CaptureError::Capture(_))
        ));
        // Fits in u32 on its own but not once the header is added
        assert!(wav_data_len((u32::MAX / 2) as usize).is_err());
    }
}
