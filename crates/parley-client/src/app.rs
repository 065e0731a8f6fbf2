//! Wiring for the headless client: one voice session over the loopback
//! transport, driven by [`Command`]s.

use crate::commands::Command;
use crate::config::Config;
use parley_voice::{
    AudioBackend, CallChannel, CueSource, DevTokenIssuer, IssuedChannel, LoopbackRoom,
    LoopbackRooms, PushToTalkBridge, SessionOptions, SettingsStore, SoundCueLibrary, VoiceError,
    VoiceSession,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Client {
    settings: SettingsStore,
    cues: Arc<SoundCueLibrary>,
    rooms: LoopbackRooms,
    channel: Arc<dyn CallChannel>,
    session: VoiceSession,
    ptt: PushToTalkBridge,
    settings_sync: JoinHandle<()>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("ptt", &self.ptt)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds every component from `config` and mounts push-to-talk.
    /// Must run inside a tokio runtime.
    pub fn new(config: &Config, backend: Arc<dyn AudioBackend>) -> Result<Self, VoiceError> {
        let settings = SettingsStore::new(config.voice_settings());

        let cues = Arc::new(SoundCueLibrary::new(
            backend,
            CueSource::parse(&config.cues.source),
        ));
        cues.apply_settings(&settings.get());

        let mut updates = settings.subscribe();
        let library = Arc::clone(&cues);
        let settings_sync = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let current = updates.borrow_and_update().clone();
                library.apply_settings(&current);
            }
        });

        let issuer = Arc::new(DevTokenIssuer::new(config.livekit.clone())?);
        let channel: Arc<dyn CallChannel> = Arc::new(IssuedChannel::new(
            issuer,
            config.channel.id.clone(),
            config.channel.identity.clone(),
            config.channel.name.clone(),
        ));

        let rooms = LoopbackRooms::new();
        let session = VoiceSession::with_options(
            settings.clone(),
            Arc::clone(&cues),
            Arc::new(rooms.clone()),
            SessionOptions {
                region: config.livekit.region.clone(),
                ..SessionOptions::default()
            },
        );

        let ptt = PushToTalkBridge::new(session.clone(), settings.clone(), None);
        ptt.mount();

        info!(
            channel = %config.channel.id,
            livekit_url = %config.livekit.url,
            "client ready"
        );

        Ok(Self {
            settings,
            cues,
            rooms,
            channel,
            session,
            ptt,
            settings_sync,
        })
    }

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn cues(&self) -> &Arc<SoundCueLibrary> {
        &self.cues
    }

    pub fn rooms(&self) -> &LoopbackRooms {
        &self.rooms
    }

    fn current_room(&self) -> Result<Arc<LoopbackRoom>, VoiceError> {
        if !self.session.is_in_room() {
            return Err(VoiceError::InvalidState("not in a call"));
        }
        self.rooms
            .last()
            .ok_or(VoiceError::InvalidState("not in a call"))
    }

    /// Runs one command. `Quit` is left to the caller.
    pub async fn execute(&self, command: Command) -> Result<(), VoiceError> {
        if !self.cues.has_user_interacted() {
            self.cues.on_user_interaction().await;
        }

        match command {
            Command::Join => self.session.connect(Arc::clone(&self.channel), None).await?,
            Command::Leave => self.session.disconnect(),
            Command::Mute => self.session.set_mute(false).await?,
            Command::Unmute => self.session.set_mute(true).await?,
            Command::ToggleMute => self.session.toggle_mute().await?,
            Command::Deafen => {
                self.session.toggle_deafen();
            }
            Command::Camera => self.session.toggle_camera().await?,
            Command::Screen => self.session.toggle_screenshare().await?,
            Command::Ptt(pressed) => {
                let keybind = self.settings.push_to_talk().keybind;
                if !self.ptt.handle_key(&keybind, pressed) {
                    info!("push-to-talk key ignored");
                }
            }
            Command::Drop => self.current_room()?.simulate_drop(),
            Command::PeerJoin(id) => self.current_room()?.simulate_participant_joined(&id),
            Command::PeerLeave(id) => self.current_room()?.simulate_participant_left(&id),
            Command::State | Command::Quit => {}
        }
        Ok(())
    }

    /// One-line summary of the session.
    pub fn status(&self) -> String {
        format!(
            "state={} channel={} mic={} camera={} screen={} deafened={} reconnects={}",
            self.session.state(),
            self.session.channel_id().as_deref().unwrap_or("-"),
            self.session.microphone(),
            self.session.camera(),
            self.session.screenshare(),
            self.session.deafened(),
            self.session.reconnect_attempts(),
        )
    }

    /// Leaves any call and releases audio output.
    pub fn shutdown(&self) {
        if self.session.is_in_room() {
            self.session.disconnect();
        }
        self.ptt.unmount();
        self.cues.close();
        self.settings_sync.abort();
        info!("client shut down");
    }
}
