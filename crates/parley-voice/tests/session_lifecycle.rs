//! Connect, disconnect and event handling of the voice session over the
//! loopback transport.

mod common;

use common::{grant, settle, stem, Harness, CHANNEL_ID};
use parley_types::{Cue, Permission, PushToTalkConfig, SessionState, VoiceSettings};
use parley_voice::{LoopbackChannel, Room, RoomEvent, TransportError, VoiceError};
use std::sync::Arc;
use std::time::Duration;

fn ptt_settings(notification_sounds: bool) -> VoiceSettings {
    VoiceSettings {
        push_to_talk: PushToTalkConfig {
            enabled: true,
            notification_sounds,
            ..Default::default()
        },
        ..Default::default()
    }
}

// ── connect ──

#[tokio::test]
async fn connect_reaches_connected_and_plays_join_cue() {
    let h = Harness::new().await;
    let mut states = h.session.subscribe_state();

    h.join().await;
    settle().await;

    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.session.channel_id().as_deref(), Some(CHANNEL_ID));
    assert!(h.session.is_in_room());
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Connected);
    assert_eq!(h.backend.count(stem(Cue::JoinCall)), 1);
    assert_eq!(h.channel.join_count(), 1);

    // Open mic with speak permission turns the microphone on.
    assert!(h.session.microphone());
    assert!(h.rooms.last().unwrap().is_microphone_enabled());
}

#[tokio::test]
async fn connect_with_supplied_grant_skips_credential_fetch() {
    let h = Harness::new().await;
    h.session
        .connect(h.channel.clone(), Some(grant()))
        .await
        .unwrap();

    assert_eq!(h.channel.join_count(), 0);
    assert_eq!(
        h.rooms.last().unwrap().last_token().as_deref(),
        Some("loopback-token")
    );
}

#[tokio::test]
async fn room_uses_device_preferences_from_settings() {
    let h = Harness::new().await;
    h.settings
        .set_preferred_audio_input_device(Some("usb-mic".into()));
    h.settings
        .set_preferred_audio_output_device(Some("headphones".into()));
    h.settings.set_noise_suppression(false);
    h.join().await;

    let room = h.rooms.last().unwrap();
    let options = room.options();
    assert_eq!(options.audio_input_device.as_deref(), Some("usb-mic"));
    assert_eq!(options.audio_output_device.as_deref(), Some("headphones"));
    assert!(options.echo_cancellation);
    assert!(!options.noise_suppression);
}

#[tokio::test]
async fn push_to_talk_overrides_transport_mic_default() {
    let h = Harness::with_settings(ptt_settings(false)).await;
    h.rooms.auto_enable_microphone(true);

    h.join().await;

    assert!(!h.session.microphone());
    assert!(!h.rooms.last().unwrap().is_microphone_enabled());
}

#[tokio::test]
async fn microphone_failure_after_connect_keeps_the_call() {
    let h = Harness::new().await;
    h.rooms.fail_devices(true);

    h.session.connect(h.channel.clone(), None).await.unwrap();

    assert_eq!(h.session.state(), SessionState::Connected);
    assert!(h.session.is_in_room());
    assert!(!h.session.microphone());
}

#[tokio::test]
async fn open_mic_stays_off_without_speak_permission() {
    let h = Harness::new().await;
    let listener = Arc::new(LoopbackChannel::with_permissions(
        "stage",
        grant(),
        vec![Permission::Listen],
    ));

    h.session.connect(listener, None).await.unwrap();

    assert_eq!(h.session.state(), SessionState::Connected);
    assert!(!h.session.microphone());
    assert!(h.session.listen_permission());
    assert!(!h.session.speaking_permission());
}

#[tokio::test]
async fn failed_transport_connect_tears_down_room() {
    let h = Harness::new().await;
    h.rooms.fail_connects(1);

    let err = h.session.connect(h.channel.clone(), None).await.unwrap_err();

    assert!(matches!(
        err,
        VoiceError::Transport(TransportError::Connect(_))
    ));
    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert!(!h.session.is_in_room());
    assert_eq!(h.session.channel_id(), None);
    assert_eq!(h.rooms.last().unwrap().listener_count(), 0);
}

#[tokio::test]
async fn failed_credential_fetch_tears_down_room() {
    let h = Harness::new().await;
    h.channel.fail_joins(1);

    let err = h.session.connect(h.channel.clone(), None).await.unwrap_err();

    assert!(matches!(err, VoiceError::Transport(TransportError::Join(_))));
    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert!(h.session.room().is_none());
    assert!(h.rooms.last().unwrap().connect_attempts().is_empty());
}

#[tokio::test]
async fn new_connect_replaces_previous_room() {
    let h = Harness::new().await;
    h.join().await;
    let first = h.rooms.last().unwrap();

    let other = Arc::new(LoopbackChannel::new("music", grant()));
    h.session.connect(other, None).await.unwrap();

    assert_eq!(h.rooms.created(), 2);
    assert!(!first.is_connected());
    assert_eq!(first.listener_count(), 0);
    assert_eq!(h.session.channel_id().as_deref(), Some("music"));

    // Events from the replaced room no longer reach the session.
    first.simulate_event(RoomEvent::Disconnected);
    assert_eq!(h.session.state(), SessionState::Connected);
}

// ── disconnect ──

#[tokio::test]
async fn disconnect_returns_to_ready_and_clears_call() {
    let h = Harness::new().await;
    h.join().await;
    h.session.toggle_camera().await.unwrap();
    h.session.toggle_deafen();

    h.session.disconnect();
    settle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.channel_id(), None);
    assert!(h.session.room().is_none());
    assert!(!h.session.microphone());
    assert!(!h.session.camera());
    assert!(h.session.deafened());
    assert_eq!(h.backend.count(stem(Cue::LeaveCall)), 1);
    assert!(!h.rooms.last().unwrap().is_connected());
}

#[tokio::test]
async fn manual_disconnect_never_reconnects() {
    let h = Harness::new().await;
    h.join().await;
    let room = h.rooms.last().unwrap();

    h.session.disconnect();
    room.simulate_event(RoomEvent::Disconnected);
    settle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.reconnect_attempts(), 0);
    assert_eq!(room.connect_attempts().len(), 1);
    assert_eq!(h.channel.join_count(), 1);
}

#[tokio::test]
async fn disconnect_without_call_is_a_no_op() {
    let h = Harness::new().await;
    h.session.disconnect();
    settle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(h.backend.played().is_empty());
}

// ── transport events ──

#[tokio::test]
async fn duplicate_connected_event_is_ignored() {
    let h = Harness::new().await;
    h.join().await;
    settle().await;

    h.rooms
        .last()
        .unwrap()
        .simulate_event(RoomEvent::Connected);
    settle().await;

    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.backend.count(stem(Cue::JoinCall)), 1);
}

#[tokio::test]
async fn drop_without_auto_reconnect_ends_in_disconnected() {
    let mut settings = VoiceSettings::default();
    settings.auto_reconnect = false;
    let h = Harness::with_settings(settings).await;
    h.join().await;
    let room = h.rooms.last().unwrap();

    room.simulate_drop();
    settle().await;

    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(room.connect_attempts().len(), 1);
    // The disconnect cue shares the leave_call asset.
    assert_eq!(h.backend.count(stem(Cue::Disconnect)), 1);

    // A second disconnected event changes nothing.
    room.simulate_event(RoomEvent::Disconnected);
    assert_eq!(h.session.state(), SessionState::Disconnected);

    // The room is kept so a later hang-up or join can release it.
    assert!(h.session.is_in_room());
    assert!(h.session.room().is_some());

    h.session.disconnect();
    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.session.is_in_room());
}

#[tokio::test]
async fn participant_events_play_cues_while_connected() {
    let h = Harness::new().await;
    h.join().await;
    let room = h.rooms.last().unwrap();

    room.simulate_participant_joined("alice");
    settle().await;
    assert_eq!(h.backend.count(stem(Cue::SomeoneJoined)), 1);
    assert_eq!(
        h.session.participant("alice").map(|p| p.identity),
        Some("alice".to_string())
    );

    room.simulate_participant_left("alice");
    settle().await;
    assert_eq!(h.backend.count(stem(Cue::SomeoneLeft)), 1);
    assert!(h.session.participant("alice").is_none());
}

// ── media flags ──

#[tokio::test]
async fn media_toggles_require_a_room() {
    let h = Harness::new().await;

    assert!(matches!(
        h.session.toggle_mute().await,
        Err(VoiceError::InvalidState(_))
    ));
    assert!(matches!(
        h.session.set_mute(true).await,
        Err(VoiceError::InvalidState(_))
    ));
    assert!(matches!(
        h.session.toggle_camera().await,
        Err(VoiceError::InvalidState(_))
    ));
    assert!(matches!(
        h.session.toggle_screenshare().await,
        Err(VoiceError::InvalidState(_))
    ));

    // Deafen is local and always allowed.
    assert!(h.session.toggle_deafen());
    assert!(!h.session.toggle_deafen());
}

#[tokio::test]
async fn camera_and_screenshare_mirror_transport() {
    let h = Harness::new().await;
    h.join().await;
    let room = h.rooms.last().unwrap();

    h.session.toggle_camera().await.unwrap();
    h.session.toggle_screenshare().await.unwrap();
    assert!(h.session.camera());
    assert!(h.session.screenshare());
    assert!(room.is_camera_enabled());

    h.session.toggle_camera().await.unwrap();
    assert!(!h.session.camera());
}

#[tokio::test]
async fn device_failure_leaves_flag_unchanged() {
    let h = Harness::new().await;
    h.join().await;
    h.rooms.fail_devices(true);

    let err = h.session.toggle_mute().await.unwrap_err();
    assert!(matches!(err, VoiceError::Transport(TransportError::Device(_))));
    assert!(h.session.microphone());
}

#[tokio::test]
async fn set_mute_is_idempotent() {
    let h = Harness::with_settings(ptt_settings(true)).await;
    h.join().await;
    let room = h.rooms.last().unwrap();
    assert!(!h.session.microphone());

    h.session.set_mute(true).await.unwrap();
    h.session.set_mute(true).await.unwrap();
    settle().await;

    assert_eq!(room.microphone_changes(), 1);
    assert_eq!(h.backend.count(stem(Cue::Unmute)), 1);
    assert!(h.session.microphone());
}

#[tokio::test]
async fn push_to_talk_suppresses_mute_cues_unless_enabled() {
    let h = Harness::with_settings(ptt_settings(false)).await;
    h.join().await;

    for active in [true, false, true, false, true, false] {
        h.session.set_mute(active).await.unwrap();
        settle().await;
    }
    assert_eq!(h.backend.count(stem(Cue::Mute)), 0);
    assert_eq!(h.backend.count(stem(Cue::Unmute)), 0);

    h.settings
        .apply_push_to_talk(&parley_types::PushToTalkUpdate {
            notification_sounds: Some(true),
            ..Default::default()
        });
    for active in [true, false, true, false] {
        h.session.set_mute(active).await.unwrap();
        settle().await;
    }
    assert_eq!(h.backend.count(stem(Cue::Unmute)), 2);
    assert_eq!(h.backend.count(stem(Cue::Mute)), 2);
}

#[tokio::test]
async fn toggle_mute_plays_cues_with_open_mic() {
    let h = Harness::new().await;
    h.join().await;

    h.session.toggle_mute().await.unwrap();
    settle().await;
    assert!(!h.session.microphone());
    assert_eq!(h.backend.count(stem(Cue::Mute)), 1);

    h.session.toggle_mute().await.unwrap();
    settle().await;
    assert!(h.session.microphone());
    assert_eq!(h.backend.count(stem(Cue::Unmute)), 1);
}

// ── superseded connects ──

fn slow_channel(id: &str) -> Arc<LoopbackChannel> {
    let channel = Arc::new(LoopbackChannel::new(id, grant()));
    channel.delay_joins(Duration::from_millis(100));
    channel
}

#[tokio::test]
async fn hang_up_while_joining_releases_the_room() {
    let h = Harness::new().await;
    let slow = slow_channel("slow");

    let session = h.session.clone();
    let pending = tokio::spawn({
        let slow = slow.clone();
        async move { session.connect(slow, None).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let room = h.rooms.last().unwrap();

    h.session.disconnect();
    pending.await.unwrap().unwrap();

    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.session.is_in_room());
    assert!(!h.session.microphone());
    assert_eq!(h.session.channel_id(), None);
    assert!(!room.is_connected());
    assert!(!room.is_microphone_enabled());
    assert!(room.connect_attempts().is_empty());
    assert_eq!(room.listener_count(), 0);
}

#[tokio::test]
async fn failed_join_after_hang_up_keeps_ready() {
    let h = Harness::new().await;
    let slow = slow_channel("slow");
    slow.fail_joins(1);

    let session = h.session.clone();
    let pending = tokio::spawn({
        let slow = slow.clone();
        async move { session.connect(slow, None).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.session.disconnect();
    assert!(pending.await.unwrap().is_err());

    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.session.is_in_room());
}

#[tokio::test]
async fn second_connect_supersedes_a_pending_one() {
    let h = Harness::new().await;
    let slow = slow_channel("slow");

    let session = h.session.clone();
    let pending = tokio::spawn({
        let slow = slow.clone();
        async move { session.connect(slow, None).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let abandoned = h.rooms.last().unwrap();

    h.join().await;
    pending.await.unwrap().unwrap();
    settle().await;

    assert_eq!(h.rooms.created(), 2);
    assert!(!abandoned.is_connected());
    assert!(abandoned.connect_attempts().is_empty());
    assert_eq!(abandoned.listener_count(), 0);

    let current = h.rooms.last().unwrap();
    assert!(current.is_connected());
    assert_eq!(h.session.state(), SessionState::Connected);
    assert_eq!(h.session.channel_id().as_deref(), Some(CHANNEL_ID));
    assert!(h.session.microphone());
}
