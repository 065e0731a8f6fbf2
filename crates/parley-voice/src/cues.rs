//! Notification cue library.
//!
//! Loads short sounds by [`Cue`] name and plays them through an
//! [`AudioBackend`]. Playback is best-effort: fetch, decode and output
//! failures are logged and the cue is skipped.
//!
//! The audio device is not touched until [`SoundCueLibrary::on_user_interaction`]
//! runs, since platforms refuse to start audio output before the user has
//! interacted with the application. Until then `play` drops cues silently.

use crate::error::AudioError;
use async_trait::async_trait;
use futures_util::future::join_all;
use parley_types::{Cue, CueToggles, VoiceSettings};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cue volume before settings are applied.
const DEFAULT_VOLUME: f32 = 0.25;

/// A decoded, ready-to-play sound.
#[derive(Debug, Clone, PartialEq)]
pub struct CueBuffer {
    /// Interleaved samples in `[-1, 1]`.
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl CueBuffer {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// Platform audio output used by the cue library.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Initialises or resumes the output device. Called once, on the first
    /// user interaction.
    async fn resume(&self) -> Result<(), AudioError>;

    /// Decodes raw file bytes into a playable buffer.
    async fn decode(&self, bytes: Vec<u8>) -> Result<CueBuffer, AudioError>;

    /// Plays a fresh instance of `buffer` at `gain`, resolving once playback
    /// has finished.
    async fn play(&self, buffer: &CueBuffer, gain: f32) -> Result<(), AudioError>;

    /// Releases the output device.
    fn close(&self) {}
}

/// Where cue files are fetched from.
#[derive(Debug, Clone)]
pub enum CueSource {
    /// A local directory holding `<cue>.wav` files.
    Directory(PathBuf),
    /// An HTTP(S) base URL serving `<cue>.wav` files.
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

impl CueSource {
    /// Interprets `location` as an HTTP base URL when it has an `http` or
    /// `https` scheme, otherwise as a directory path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Http {
                client: reqwest::Client::new(),
                base_url: location.trim_end_matches('/').to_string(),
            }
        } else {
            Self::Directory(PathBuf::from(location))
        }
    }

    pub async fn fetch(&self, cue: Cue) -> Result<Vec<u8>, AudioError> {
        match self {
            Self::Directory(dir) => Ok(tokio::fs::read(dir.join(cue.file_name())).await?),
            Self::Http { client, base_url } => {
                let url = format!("{}/{}", base_url, cue.file_name());
                let bytes = client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                Ok(bytes.to_vec())
            }
        }
    }
}

struct CueState {
    enabled: bool,
    volume: f32,
    toggles: CueToggles,
    buffers: HashMap<Cue, CueBuffer>,
    playing: HashSet<Cue>,
    interacted: bool,
}

/// Loads and plays notification cues.
pub struct SoundCueLibrary {
    backend: Arc<dyn AudioBackend>,
    source: CueSource,
    state: Mutex<CueState>,
}

impl std::fmt::Debug for SoundCueLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SoundCueLibrary")
            .field("source", &self.source)
            .field("enabled", &state.enabled)
            .field("volume", &state.volume)
            .field("loaded", &state.buffers.len())
            .finish_non_exhaustive()
    }
}

impl SoundCueLibrary {
    pub fn new(backend: Arc<dyn AudioBackend>, source: CueSource) -> Self {
        Self {
            backend,
            source,
            state: Mutex::new(CueState {
                enabled: true,
                volume: DEFAULT_VOLUME,
                toggles: CueToggles::default(),
                buffers: HashMap::new(),
                playing: HashSet::new(),
                interacted: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("cue library lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Copies the notification preferences out of the settings store.
    pub fn apply_settings(&self, settings: &VoiceSettings) {
        let mut state = self.lock();
        state.enabled = settings.notification_sounds_enabled;
        state.volume = clamp_volume(settings.notification_volume);
        state.toggles = settings.sounds;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Sets the global cue volume, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        self.lock().volume = clamp_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn set_cue_enabled(&self, cue: Cue, enabled: bool) {
        self.lock().toggles.set(cue, enabled);
    }

    /// Whether `cue` would play: the library and the cue are both enabled.
    pub fn is_cue_enabled(&self, cue: Cue) -> bool {
        let state = self.lock();
        state.enabled && state.toggles.get(cue)
    }

    pub fn is_playing(&self, cue: Cue) -> bool {
        self.lock().playing.contains(&cue)
    }

    pub fn is_loaded(&self, cue: Cue) -> bool {
        self.lock().buffers.contains_key(&cue)
    }

    pub fn has_user_interacted(&self) -> bool {
        self.lock().interacted
    }

    /// Unlocks audio output after the first click, key press or touch and
    /// preloads every cue. Later calls do nothing.
    pub async fn on_user_interaction(&self) {
        {
            let mut state = self.lock();
            if state.interacted {
                return;
            }
            state.interacted = true;
        }

        if let Err(e) = self.backend.resume().await {
            warn!(error = %e, "failed to resume audio output");
        }
        self.preload().await;
    }

    /// Fetches and decodes every cue not yet loaded. Failures are logged
    /// per cue and otherwise ignored.
    pub async fn preload(&self) {
        let pending: Vec<Cue> = {
            let state = self.lock();
            if !state.interacted {
                debug!("skipping cue preload until the first user interaction");
                return;
            }
            Cue::ALL
                .into_iter()
                .filter(|cue| !state.buffers.contains_key(cue))
                .collect()
        };

        let results = join_all(pending.into_iter().map(|cue| async move {
            (cue, self.load(cue).await)
        }))
        .await;

        let mut state = self.lock();
        for (cue, result) in results {
            match result {
                Ok(buffer) => {
                    state.buffers.entry(cue).or_insert(buffer);
                }
                Err(e) => warn!(cue = cue.name(), error = %e, "failed to preload cue"),
            }
        }
    }

    async fn load(&self, cue: Cue) -> Result<CueBuffer, AudioError> {
        let bytes = self.source.fetch(cue).await?;
        self.backend.decode(bytes).await
    }

    /// Plays `cue` and waits for it to finish.
    ///
    /// Returns `false` without playing when sounds are disabled, the cue is
    /// disabled, the same cue is already playing, audio is still locked, or
    /// the cue could not be loaded.
    pub async fn play(&self, cue: Cue) -> bool {
        let (cached, volume) = {
            let mut state = self.lock();
            if !(state.enabled && state.toggles.get(cue)) || !state.interacted {
                return false;
            }
            if !state.playing.insert(cue) {
                return false;
            }
            (state.buffers.get(&cue).cloned(), state.volume)
        };

        let buffer = match cached {
            Some(buffer) => buffer,
            None => match self.load(cue).await {
                Ok(buffer) => {
                    self.lock().buffers.insert(cue, buffer.clone());
                    buffer
                }
                Err(e) => {
                    warn!(cue = cue.name(), error = %e, "failed to load cue");
                    self.lock().playing.remove(&cue);
                    return false;
                }
            },
        };

        debug!(cue = cue.name(), volume, "playing cue");
        let played = match self.backend.play(&buffer, volume).await {
            Ok(()) => true,
            Err(e) => {
                warn!(cue = cue.name(), error = %e, "cue playback failed");
                false
            }
        };

        self.lock().playing.remove(&cue);
        played
    }

    /// Starts `cue` in the background.
    pub fn trigger(self: &Arc<Self>, cue: Cue) {
        let library = Arc::clone(self);
        tokio::spawn(async move {
            library.play(cue).await;
        });
    }

    /// Drops every decoded buffer and releases the output device.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.buffers.clear();
            state.interacted = false;
        }
        self.backend.close();
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
