use crate::config::LiveKitConfig;
use crate::error::{TransportError, VoiceError};
use crate::transport::CallChannel;
use async_trait::async_trait;
use livekit_api::access_token::{AccessToken, VideoGrants};
use parley_types::{CallGrant, Permission};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Mints LiveKit join tokens locally from an API key and secret.
#[derive(Debug, Clone)]
pub struct DevTokenIssuer {
    config: LiveKitConfig,
}

impl DevTokenIssuer {
    pub fn new(config: LiveKitConfig) -> Result<Self, VoiceError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(VoiceError::Config(
                "LiveKit api_key and api_secret must be set".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &LiveKitConfig {
        &self.config
    }

    /// Issues a grant for `room_name`. Publishing requires `Speak` and
    /// subscribing requires `Listen`.
    pub fn issue(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
        permissions: &[Permission],
    ) -> Result<CallGrant, VoiceError> {
        let can_speak = permissions.contains(&Permission::Speak);
        let can_listen = permissions.contains(&Permission::Listen);

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: can_speak,
                can_subscribe: can_listen,
                can_publish_data: can_speak,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds))
            .to_jwt()?;

        debug!(
            room = room_name,
            identity = participant_identity,
            can_speak,
            can_listen,
            "issued join token"
        );
        Ok(CallGrant::new(self.config.url.clone(), token))
    }
}

/// A channel whose call credentials come from a [`DevTokenIssuer`]. The
/// channel id doubles as the room name.
#[derive(Debug, Clone)]
pub struct IssuedChannel {
    id: String,
    identity: String,
    name: String,
    permissions: Vec<Permission>,
    issuer: Arc<DevTokenIssuer>,
}

impl IssuedChannel {
    pub fn new(
        issuer: Arc<DevTokenIssuer>,
        id: impl Into<String>,
        identity: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            identity: identity.into(),
            name: name.into(),
            permissions: vec![Permission::Listen, Permission::Speak],
            issuer,
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }
}

#[async_trait]
impl CallChannel for IssuedChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn join_call(&self, region: &str) -> Result<CallGrant, TransportError> {
        debug!(channel_id = %self.id, region, "requesting call credentials");
        self.issuer
            .issue(&self.id, &self.identity, &self.name, &self.permissions)
            .map_err(|e| TransportError::Join(e.to_string()))
    }

    fn have_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
