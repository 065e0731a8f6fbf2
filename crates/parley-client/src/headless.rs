//! Audio output for terminals: decodes PCM WAV cues and logs playback.

use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use parley_voice::{AudioBackend, AudioError, CueBuffer};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stands in for a sound device. `play` waits out the cue's duration so
/// overlap and completion behave like real output.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    resumed: AtomicBool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }
}

fn decode_error(e: hound::Error) -> AudioError {
    AudioError::Decode(e.to_string())
}

/// Decodes an integer or 32-bit float PCM WAV file. Chunks other than
/// `fmt ` and `data` are skipped.
pub fn decode_wav(bytes: &[u8]) -> Result<CueBuffer, AudioError> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(decode_error)?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AudioError::Decode("WAV header has no channels".to_string()));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(decode_error)?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(decode_error)?
        }
        (format, bits) => {
            return Err(AudioError::Decode(format!(
                "unsupported WAV encoding ({format:?}, {bits} bits)"
            )))
        }
    };

    Ok(CueBuffer {
        samples: Arc::from(samples),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[async_trait]
impl AudioBackend for HeadlessBackend {
    async fn resume(&self) -> Result<(), AudioError> {
        self.resumed.store(true, Ordering::SeqCst);
        tracing::debug!("headless audio output resumed");
        Ok(())
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<CueBuffer, AudioError> {
        decode_wav(&bytes)
    }

    async fn play(&self, buffer: &CueBuffer, gain: f32) -> Result<(), AudioError> {
        if !self.is_resumed() {
            return Err(AudioError::Unavailable);
        }
        let duration = buffer.duration();
        tracing::info!(
            duration_ms = duration.as_millis() as u64,
            gain,
            "playing cue"
        );
        tokio::time::sleep(duration).await;
        Ok(())
    }

    fn close(&self) {
        self.resumed.store(false, Ordering::SeqCst);
    }
}
