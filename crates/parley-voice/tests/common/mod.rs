#![allow(dead_code)]

use async_trait::async_trait;
use parley_types::{CallGrant, Cue, PushToTalkActivation, PushToTalkUpdate, VoiceSettings};
use parley_voice::ptt::{ActivationListener, ConfigListener};
use parley_voice::{
    AudioBackend, AudioError, CueBuffer, CueSource, HardwarePushToTalk, ListenerId,
    LoopbackChannel, LoopbackRooms, SettingsStore, SoundCueLibrary, VoiceSession,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const CHANNEL_ID: &str = "general";

pub fn grant() -> CallGrant {
    CallGrant::new("ws://loopback", "loopback-token")
}

/// Audio backend that records every playback by cue file stem. Cue files
/// written by [`cue_dir`] contain their own stem, which `decode` keeps as
/// the sample data.
#[derive(Default)]
pub struct RecordingBackend {
    plays: Mutex<Vec<(String, f32)>>,
    play_time: Mutex<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
    resumed: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes each playback take `duration` before resolving.
    pub fn set_play_time(&self, duration: Duration) {
        *self.play_time.lock().unwrap() = duration;
    }

    pub fn plays(&self) -> Vec<(String, f32)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.plays().into_iter().map(|(name, _)| name).collect()
    }

    pub fn count(&self, stem: &str) -> usize {
        self.played().iter().filter(|name| *name == stem).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumed.load(Ordering::SeqCst)
    }
}

fn label(buffer: &CueBuffer) -> String {
    buffer.samples.iter().map(|s| *s as u8 as char).collect()
}

#[async_trait]
impl AudioBackend for RecordingBackend {
    async fn resume(&self) -> Result<(), AudioError> {
        self.resumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<CueBuffer, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::Decode("empty file".into()));
        }
        Ok(CueBuffer {
            samples: bytes.iter().map(|b| f32::from(*b)).collect::<Vec<_>>().into(),
            sample_rate: 48_000,
            channels: 1,
        })
    }

    async fn play(&self, buffer: &CueBuffer, gain: f32) -> Result<(), AudioError> {
        self.plays.lock().unwrap().push((label(buffer), gain));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let play_time = *self.play_time.lock().unwrap();
        if !play_time.is_zero() {
            tokio::time::sleep(play_time).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A temp directory holding every cue file.
pub fn cue_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for cue in Cue::ALL {
        let stem = cue.file_name().trim_end_matches(".wav");
        std::fs::write(dir.path().join(cue.file_name()), stem).unwrap();
    }
    dir
}

/// Stem recorded by [`RecordingBackend`] when `cue` plays.
pub fn stem(cue: Cue) -> &'static str {
    cue.file_name().trim_end_matches(".wav")
}

/// Lets spawned cue and worker tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub struct Harness {
    pub settings: SettingsStore,
    pub backend: Arc<RecordingBackend>,
    pub cues: Arc<SoundCueLibrary>,
    pub rooms: LoopbackRooms,
    pub channel: Arc<LoopbackChannel>,
    pub session: VoiceSession,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(VoiceSettings::default()).await
    }

    /// Builds a session over the loopback transport with audio unlocked
    /// and every cue preloaded.
    pub async fn with_settings(settings: VoiceSettings) -> Self {
        let dir = cue_dir();
        let settings = SettingsStore::new(settings);
        let backend = RecordingBackend::new();
        let cues = Arc::new(SoundCueLibrary::new(
            backend.clone(),
            CueSource::Directory(dir.path().to_path_buf()),
        ));
        cues.set_volume(1.0);
        cues.on_user_interaction().await;

        let rooms = LoopbackRooms::new();
        let channel = Arc::new(LoopbackChannel::new(CHANNEL_ID, grant()));
        let session = VoiceSession::new(settings.clone(), cues.clone(), Arc::new(rooms.clone()));

        Self {
            settings,
            backend,
            cues,
            rooms,
            channel,
            session,
            _dir: dir,
        }
    }

    pub async fn join(&self) {
        self.session
            .connect(self.channel.clone(), None)
            .await
            .expect("connect should succeed");
    }
}

/// Push-to-talk integration driven by the test.
#[derive(Default)]
pub struct FakeHardware {
    state: Mutex<PushToTalkActivation>,
    config: Mutex<PushToTalkUpdate>,
    next_id: AtomicU64,
    state_listeners: Mutex<HashMap<ListenerId, ActivationListener>>,
    config_listeners: Mutex<HashMap<ListenerId, ConfigListener>>,
    pushed: Mutex<Vec<PushToTalkUpdate>>,
}

impl FakeHardware {
    pub fn new(active: bool, config: PushToTalkUpdate) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PushToTalkActivation { active }),
            config: Mutex::new(config),
            ..Default::default()
        })
    }

    pub fn press(&self, active: bool) {
        *self.state.lock().unwrap() = PushToTalkActivation { active };
        let listeners: Vec<_> = self.state_listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener(PushToTalkActivation { active });
        }
    }

    pub fn change_config(&self, update: PushToTalkUpdate) {
        let listeners: Vec<_> = self.config_listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener(update.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state_listeners.lock().unwrap().len() + self.config_listeners.lock().unwrap().len()
    }

    pub fn pushed(&self) -> Vec<PushToTalkUpdate> {
        self.pushed.lock().unwrap().clone()
    }
}

impl HardwarePushToTalk for FakeHardware {
    fn current_state(&self) -> PushToTalkActivation {
        *self.state.lock().unwrap()
    }

    fn config(&self) -> PushToTalkUpdate {
        self.config.lock().unwrap().clone()
    }

    fn on_state_change(&self, listener: ActivationListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state_listeners.lock().unwrap().insert(id, listener);
        id
    }

    fn off_state_change(&self, id: ListenerId) {
        self.state_listeners.lock().unwrap().remove(&id);
    }

    fn on_config_change(&self, listener: ConfigListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.config_listeners.lock().unwrap().insert(id, listener);
        id
    }

    fn off_config_change(&self, id: ListenerId) {
        self.config_listeners.lock().unwrap().remove(&id);
    }

    fn update_settings(&self, update: &PushToTalkUpdate) {
        self.pushed.lock().unwrap().push(update.clone());
    }
}
