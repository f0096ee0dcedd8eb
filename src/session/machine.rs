//! Session state machine
//!
//! Owns the connection lifecycle, microphone gating and the local
//! participant's role/position metadata for one net.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──▶ Connected ──disconnect──▶ Disconnected
//!                               │          (Muted ⇄ Open)
//!                               └──fail──▶ Error ◀──signal lost──┘
//! ```
//!
//! Async operations are serialized by an operation gate. `disconnect` does
//! not wait on the gate: it bumps the connection epoch, and a `connect` that
//! finishes under a stale epoch tears its transport down and returns
//! [`Error::Superseded`].

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};

use super::state::{
    AudioState, ConnectionState, MuteOverrideState, SessionSnapshot, SessionState,
};
use crate::audio::{create_output_bus, AudioChain, ProfileTable, SharedOutputBus};
use crate::codec::encoder::{EncoderStats, MessageEncoder};
use crate::config::AppConfig;
use crate::constants::TACTICAL_EVENT_CAPACITY;
use crate::error::{AuthError, Error, PermissionError, Result, TransportError};
use crate::network::{DirectoryService, TokenService, Transport, TransportEvent};
use crate::protocol::{now_ms, ParticipantId, ParticipantMetadata, Position, ProtocolMessage};
use crate::roles::{RolePolicy, TacticalAction};
use crate::tactical::TacticalEvent;

/// One participant's session on one net
pub struct Session {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenService>,
    directory: Arc<dyn DirectoryService>,
    policy: RolePolicy,
    profiles: ProfileTable,
    fallback_server_url: Option<String>,
    state: RwLock<SessionState>,
    op_gate: Mutex<()>,
    epoch: AtomicU64,
    chain: AudioChain,
    encoder: MessageEncoder,
    events: broadcast::Sender<TacticalEvent>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenService>,
        directory: Arc<dyn DirectoryService>,
    ) -> Self {
        let (events, _) = broadcast::channel(TACTICAL_EVENT_CAPACITY);
        Self {
            transport,
            tokens,
            directory,
            policy: config.roles.clone(),
            profiles: config.profiles.clone(),
            fallback_server_url: config.server_url.clone(),
            state: RwLock::new(SessionState::default()),
            op_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
            chain: AudioChain::new(create_output_bus(config.audio.output_buffer_frames)),
            encoder: MessageEncoder::new(),
            events,
        }
    }

    /// Mix into a shared output bus instead of a private one
    pub fn with_output(mut self, output: SharedOutputBus) -> Self {
        self.chain = AudioChain::new(output);
        self
    }

    /// Join `room_id` as `identity` with `role`.
    ///
    /// Inbound transport events for the new connection arrive on the
    /// returned receiver; feed them to a
    /// [`TacticalCoordinator`](crate::tactical::TacticalCoordinator).
    pub async fn connect(
        &self,
        room_id: &str,
        identity: &str,
        role: &str,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        let _op = self.op_gate.lock().await;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let (previous, position) = {
            let mut state = self.state.write();
            let previous = state.connection;
            let position = state.position;
            *state = SessionState {
                room_id: Some(room_id.to_string()),
                identity: Some(identity.to_string()),
                role: role.to_string(),
                position,
                connection: ConnectionState::Connecting,
                ..SessionState::default()
            };
            (previous, position)
        };
        if previous != ConnectionState::Disconnected {
            self.transport.disconnect();
            self.chain.clear();
        }
        tracing::info!(room = room_id, identity, role, "Connecting");

        let credential = match self.tokens.fetch(room_id, identity).await {
            Ok(credential) => credential,
            Err(e) => return Err(self.fail(epoch, e.into())),
        };
        self.ensure_current(epoch)?;

        if credential.token.trim().is_empty() {
            let err = AuthError::Rejected("Empty credential".to_string());
            return Err(self.fail(epoch, err.into()));
        }
        let server_url = match credential
            .server_url
            .clone()
            .or_else(|| self.fallback_server_url.clone())
        {
            Some(url) => url,
            None => {
                let err = Error::Config(format!("No server address for room {}", room_id));
                return Err(self.fail(epoch, err));
            }
        };

        let net = self.directory.net(room_id).await;
        self.ensure_current(epoch)?;

        let events = match self
            .transport
            .connect(&server_url, &credential.token, identity)
            .await
        {
            Ok(events) => events,
            Err(e) => return Err(self.fail(epoch, e.into())),
        };
        if let Err(e) = self.ensure_current(epoch) {
            self.transport.disconnect();
            return Err(e);
        }

        let metadata = ParticipantMetadata::new(role, position).to_json();
        if let Err(e) = self.transport.set_metadata(&metadata).await {
            self.transport.disconnect();
            return Err(self.fail(epoch, e.into()));
        }

        {
            let mut state = self.state.write();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                drop(state);
                self.transport.disconnect();
                tracing::debug!(room = room_id, "Connect superseded after handshake");
                return Err(Error::Superseded);
            }
            state.connection = ConnectionState::Connected;
            state.audio = AudioState::ConnectedMuted;
            state.net = net;
        }

        tracing::info!(room = room_id, identity, server = %server_url, "Connected");
        Ok(events)
    }

    /// Close the transport and release every audio channel. Idempotent.
    pub fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let previous = {
            let mut state = self.state.write();
            let previous = state.connection;
            state.drop_connection(ConnectionState::Disconnected);
            state.net = None;
            previous
        };
        if previous != ConnectionState::Disconnected {
            self.transport.disconnect();
            tracing::info!("Disconnected");
        }
        self.chain.clear();
    }

    /// The transport dropped the session underneath us
    pub(crate) fn signal_lost(&self, reason: &str) -> bool {
        {
            let mut state = self.state.write();
            if !state.is_connected() {
                return false;
            }
            state.drop_connection(ConnectionState::Error);
            state.last_error = Some(reason.to_string());
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.transport.disconnect();
        self.chain.clear();

        tracing::error!(reason, "Signal lost");
        self.emit(TacticalEvent::SignalLost {
            reason: reason.to_string(),
        });
        true
    }

    /// Open or close the local microphone.
    ///
    /// Returns `Ok(false)` when the request had no effect: not connected, or
    /// the microphone is locked by a priority mute. Opening without transmit
    /// permission is a [`PermissionError`]. A command role broadcasts
    /// `MUTE_ALL` before its microphone opens.
    pub async fn set_microphone_enabled(&self, enabled: bool) -> Result<bool> {
        let _op = self.op_gate.lock().await;

        let (role, override_active, net_min) = {
            let state = self.state.read();
            if !state.is_connected() {
                tracing::debug!(enabled, "Microphone toggle ignored while not connected");
                return Ok(false);
            }
            (
                state.role.clone(),
                state.mute_override.active,
                self.net_min_rank(&state),
            )
        };

        if !enabled {
            self.transport.set_microphone_enabled(false).await?;
            return Ok(self.set_audio_if_connected(AudioState::ConnectedMuted));
        }

        if !self.policy.can_transmit(&role, net_min.as_deref()) {
            return Err(PermissionError {
                role,
                action: "TRANSMIT".to_string(),
            }
            .into());
        }
        if override_active && !self.policy.can_acknowledge(&role) {
            tracing::info!(role = %role, "Microphone locked by priority mute");
            return Ok(false);
        }

        if self
            .policy
            .can_transmit_tactical(&role, TacticalAction::MuteAll, net_min.as_deref())
        {
            self.send_mute_all().await?;
        }

        self.transport.set_microphone_enabled(true).await?;
        Ok(self.set_audio_if_connected(AudioState::ConnectedOpen))
    }

    /// Change the local role and republish metadata
    pub async fn set_role(&self, role: &str) -> Result<()> {
        let _op = self.op_gate.lock().await;

        let (connected, metadata, revoke) = {
            let mut state = self.state.write();
            state.role = role.to_string();
            let net_min = self.net_min_rank(&state);
            let revoke = state.audio == AudioState::ConnectedOpen
                && !self.policy.can_transmit(role, net_min.as_deref());
            if revoke {
                state.audio = AudioState::ConnectedMuted;
            }
            (
                state.is_connected(),
                ParticipantMetadata::new(role, state.position).to_json(),
                revoke,
            )
        };

        if revoke {
            tracing::info!(role, "Transmit permission lost, closing microphone");
            self.transport.set_microphone_enabled(false).await?;
        }
        if connected {
            self.transport.set_metadata(&metadata).await?;
        }
        Ok(())
    }

    /// Move the local participant and republish metadata
    pub async fn set_position(&self, position: Position) -> Result<()> {
        let _op = self.op_gate.lock().await;

        let (connected, metadata) = {
            let mut state = self.state.write();
            state.position = Some(position);
            (
                state.is_connected(),
                ParticipantMetadata::new(state.role.clone(), state.position).to_json(),
            )
        };
        if connected {
            self.transport.set_metadata(&metadata).await?;
        }
        Ok(())
    }

    /// Encode and send a message on the reliable channel
    pub async fn publish_message(&self, message: &ProtocolMessage) -> Result<()> {
        self.ensure_connected()?;
        let payload = self.encoder.encode(message);
        self.transport.publish_data(payload, true).await?;
        tracing::debug!(kind = message.kind(), "Published message");
        Ok(())
    }

    /// Send raw bytes
    pub async fn publish_data(&self, payload: Bytes, reliable: bool) -> Result<()> {
        self.ensure_connected()?;
        self.transport.publish_data(payload, reliable).await?;
        Ok(())
    }

    /// Broadcast `MUTE_ALL` and record the override locally without muting
    pub(crate) async fn broadcast_mute_all(&self) -> Result<bool> {
        let _op = self.op_gate.lock().await;
        self.send_mute_all().await
    }

    async fn send_mute_all(&self) -> Result<bool> {
        self.publish_message(&ProtocolMessage::MuteAll).await?;
        let engaged = self.state.write().mute_override.engage(now_ms());
        tracing::info!("Priority mute broadcast");
        if engaged {
            self.emit(TacticalEvent::MuteOverrideEngaged { by: None });
        }
        Ok(engaged)
    }

    /// Engage the override on receipt of `MUTE_ALL` and force the microphone
    /// closed. The microphone is closed on every receipt, even when the
    /// override is already active. Returns true only on the first engage.
    pub(crate) async fn apply_mute_override(&self) -> Result<bool> {
        let _op = self.op_gate.lock().await;

        let (engaged, was_open) = {
            let mut state = self.state.write();
            if !state.is_connected() {
                return Ok(false);
            }
            let engaged = state.mute_override.engage(now_ms());
            let was_open = state.audio == AudioState::ConnectedOpen;
            state.audio = AudioState::ConnectedMuted;
            (engaged, was_open)
        };
        if was_open && !engaged {
            tracing::info!("Microphone reopened during priority mute, forcing closed");
        }
        self.transport.set_microphone_enabled(false).await?;
        Ok(engaged)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Lift the override. The microphone stays closed until reopened.
    pub(crate) fn clear_mute_override(&self) -> bool {
        self.state.write().mute_override.clear()
    }

    /// Whether `role` may send `action` on the current net
    pub fn can_transmit_tactical(&self, role: &str, action: TacticalAction) -> bool {
        let net_min = self.net_min_rank(&self.state.read());
        self.policy
            .can_transmit_tactical(role, action, net_min.as_deref())
    }

    /// Permission check for the local role
    pub fn check_tactical(&self, action: TacticalAction) -> std::result::Result<(), PermissionError> {
        let (role, net_min) = {
            let state = self.state.read();
            (state.role.clone(), self.net_min_rank(&state))
        };
        self.policy.check_tactical(&role, action, net_min.as_deref())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        let net_min = self.net_min_rank(&state);
        SessionSnapshot {
            room_id: state.room_id.clone(),
            identity: state.identity.clone(),
            role: state.role.clone(),
            position: state.position,
            connection: state.connection,
            audio: state.audio,
            transmit_permission: state.is_connected()
                && self.policy.can_transmit(&state.role, net_min.as_deref()),
            mute_override: state.mute_override,
            net: state.net.clone(),
            last_error: state.last_error.clone(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.read().connection
    }

    pub fn audio_state(&self) -> AudioState {
        self.state.read().audio
    }

    pub fn mute_override(&self) -> MuteOverrideState {
        self.state.read().mute_override
    }

    pub fn role(&self) -> String {
        self.state.read().role.clone()
    }

    pub fn position(&self) -> Option<Position> {
        self.state.read().position
    }

    pub fn identity(&self) -> Option<ParticipantId> {
        self.state.read().identity.clone()
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn audio_chain(&self) -> &AudioChain {
        &self.chain
    }

    pub fn encoder_stats(&self) -> EncoderStats {
        self.encoder.stats()
    }

    /// Subscribe to tactical events
    pub fn subscribe(&self) -> broadcast::Receiver<TacticalEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: TacticalEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn net_min_rank(&self, state: &SessionState) -> Option<String> {
        state
            .net
            .as_ref()
            .and_then(|net| net.min_rank.clone())
            .or_else(|| self.policy.default_net_min.clone())
    }

    fn set_audio_if_connected(&self, audio: AudioState) -> bool {
        let mut state = self.state.write();
        if state.is_connected() {
            state.audio = audio;
            true
        } else {
            false
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state.read().is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected.into())
        }
    }

    fn ensure_current(&self, epoch: u64) -> Result<()> {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            Ok(())
        } else {
            tracing::debug!(epoch, "Connect superseded");
            Err(Error::Superseded)
        }
    }

    /// Record a failed connect. Failures of a superseded attempt leave state alone.
    fn fail(&self, epoch: u64, err: Error) -> Error {
        {
            let mut state = self.state.write();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return err;
            }
            state.drop_connection(ConnectionState::Error);
            state.last_error = Some(err.to_string());
        }
        tracing::error!(error = %err, "Connect failed");
        self.emit(TacticalEvent::SignalLost {
            reason: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{LoopbackHub, LoopbackTransport, NetInfo, StaticDirectory, StaticTokenService};
    use crate::codec::decoder::decode;
    use std::time::Duration;

    fn session_with(
        hub: &Arc<LoopbackHub>,
        tokens: StaticTokenService,
        nets: Vec<NetInfo>,
    ) -> Session {
        Session::new(
            &AppConfig::default(),
            Arc::new(LoopbackTransport::new(hub.clone())),
            Arc::new(tokens),
            Arc::new(StaticDirectory::new(nets)),
        )
    }

    fn session(hub: &Arc<LoopbackHub>) -> Session {
        session_with(hub, StaticTokenService::new("loopback://net"), Vec::new())
    }

    #[tokio::test]
    async fn test_connect_publishes_metadata() {
        let hub = LoopbackHub::new();
        let alpha = session(&hub);
        alpha.set_position(Position::new(10.0, 20.0)).await.unwrap();
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();

        assert_eq!(alpha.connection_state(), ConnectionState::Connected);
        assert_eq!(alpha.audio_state(), AudioState::ConnectedMuted);
        let metadata = ParticipantMetadata::from_json(&hub.metadata_of("alpha").unwrap()).unwrap();
        assert_eq!(metadata.role, "Scout");
        assert_eq!(metadata.position(), Some(Position::new(10.0, 20.0)));
    }

    #[tokio::test]
    async fn test_auth_failure_leaves_error_state() {
        let hub = LoopbackHub::new();
        let alpha = session_with(&hub, StaticTokenService::failing(401), Vec::new());
        let mut events = alpha.subscribe();

        let err = alpha.connect("OPS-1", "alpha", "Scout").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Status(401))));
        assert_eq!(alpha.connection_state(), ConnectionState::Error);
        assert_eq!(alpha.audio_state(), AudioState::Disconnected);
        assert!(matches!(events.try_recv(), Ok(TacticalEvent::SignalLost { .. })));
        assert!(!hub.is_connected("alpha"));
    }

    #[tokio::test]
    async fn test_missing_server_url_is_config_error() {
        let hub = LoopbackHub::new();
        let alpha = session_with(&hub, StaticTokenService::without_server_url(), Vec::new());
        let err = alpha.connect("OPS-1", "alpha", "Scout").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(alpha.connection_state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_handshake_failure_is_transport_error() {
        let hub = LoopbackHub::new();
        hub.set_reject_handshakes(true);
        let alpha = session(&hub);
        let err = alpha.connect("OPS-1", "alpha", "Scout").await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::HandshakeFailed(_))));
        assert_eq!(alpha.audio_state(), AudioState::Disconnected);

        hub.set_reject_handshakes(false);
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        assert_eq!(alpha.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_supersedes_pending_connect() {
        let hub = LoopbackHub::new();
        let tokens = StaticTokenService::new("loopback://net").with_delay(Duration::from_millis(50));
        let alpha = session_with(&hub, tokens, Vec::new());

        let (result, _) = tokio::join!(alpha.connect("OPS-1", "alpha", "Scout"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            alpha.disconnect();
        });

        assert!(matches!(result, Err(Error::Superseded)));
        assert_eq!(alpha.connection_state(), ConnectionState::Disconnected);
        assert!(!hub.is_connected("alpha"));
    }

    #[tokio::test]
    async fn test_late_handshake_is_torn_down() {
        let hub = LoopbackHub::new();
        let transport = LoopbackTransport::new(hub.clone())
            .with_handshake_delay(Duration::from_millis(50));
        let alpha = Session::new(
            &AppConfig::default(),
            Arc::new(transport),
            Arc::new(StaticTokenService::new("loopback://net")),
            Arc::new(StaticDirectory::default()),
        );

        let (result, _) = tokio::join!(alpha.connect("OPS-1", "alpha", "Scout"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(hub.is_connected("alpha"));
            alpha.disconnect();
        });

        assert!(matches!(result, Err(Error::Superseded)));
        assert_eq!(alpha.connection_state(), ConnectionState::Disconnected);
        assert!(!hub.is_connected("alpha"));
    }

    #[tokio::test]
    async fn test_reconnect_clears_mute_override() {
        let hub = LoopbackHub::new();
        let alpha = session(&hub);
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        assert!(alpha.apply_mute_override().await.unwrap());
        assert!(alpha.mute_override().active);

        alpha.disconnect();
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        assert!(!alpha.mute_override().active);
        assert!(alpha.set_microphone_enabled(true).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeated_mute_all_recloses_microphone() {
        let hub = LoopbackHub::new();
        let delta = session(&hub);
        delta.connect("OPS-1", "delta", "Pioneer").await.unwrap();
        assert!(delta.apply_mute_override().await.unwrap());

        // Pioneer may reopen during the override
        assert!(delta.set_microphone_enabled(true).await.unwrap());
        assert!(hub.is_microphone_enabled("delta"));

        assert!(!delta.apply_mute_override().await.unwrap());
        assert_eq!(delta.audio_state(), AudioState::ConnectedMuted);
        assert!(!hub.is_microphone_enabled("delta"));
        assert!(delta.mute_override().active);
    }

    #[tokio::test]
    async fn test_microphone_requires_connection() {
        let hub = LoopbackHub::new();
        let alpha = session(&hub);
        assert!(!alpha.set_microphone_enabled(true).await.unwrap());
        assert_eq!(alpha.audio_state(), AudioState::Disconnected);

        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        assert!(alpha.set_microphone_enabled(true).await.unwrap());
        assert_eq!(alpha.audio_state(), AudioState::ConnectedOpen);
        assert!(hub.is_microphone_enabled("alpha"));

        assert!(alpha.set_microphone_enabled(false).await.unwrap());
        assert_eq!(alpha.audio_state(), AudioState::ConnectedMuted);
        assert!(!hub.is_microphone_enabled("alpha"));
    }

    #[tokio::test]
    async fn test_net_minimum_blocks_transmit() {
        let hub = LoopbackHub::new();
        let nets = vec![NetInfo::new("OPS-1", Some("Scout"))];
        let alpha = session_with(&hub, StaticTokenService::new("loopback://net"), nets);
        alpha.connect("OPS-1", "alpha", "Vagrant").await.unwrap();

        let err = alpha.set_microphone_enabled(true).await.unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
        assert!(!err.is_fatal());
        assert!(!alpha.snapshot().transmit_permission);
        assert_eq!(alpha.audio_state(), AudioState::ConnectedMuted);
    }

    #[tokio::test]
    async fn test_command_microphone_broadcasts_mute_all() {
        let hub = LoopbackHub::new();
        let command = session(&hub);
        let scout = session(&hub);
        let mut scout_rx = scout.connect("OPS-1", "bravo", "Scout").await.unwrap();
        command.connect("OPS-1", "alpha", "Command").await.unwrap();
        while scout_rx.try_recv().is_ok() {}

        assert!(command.set_microphone_enabled(true).await.unwrap());
        assert!(command.mute_override().active);
        assert_eq!(command.audio_state(), AudioState::ConnectedOpen);

        let mut saw_mute_all = false;
        while let Ok(event) = scout_rx.try_recv() {
            if let TransportEvent::DataReceived { payload, .. } = event {
                saw_mute_all |= decode(&payload).unwrap() == ProtocolMessage::MuteAll;
            }
        }
        assert!(saw_mute_all);
    }

    #[tokio::test]
    async fn test_role_downgrade_closes_microphone() {
        let hub = LoopbackHub::new();
        let nets = vec![NetInfo::new("OPS-1", Some("Scout"))];
        let alpha = session_with(&hub, StaticTokenService::new("loopback://net"), nets);
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        alpha.set_microphone_enabled(true).await.unwrap();

        alpha.set_role("Vagrant").await.unwrap();
        assert_eq!(alpha.audio_state(), AudioState::ConnectedMuted);
        assert!(!hub.is_microphone_enabled("alpha"));
        let metadata = ParticipantMetadata::from_json(&hub.metadata_of("alpha").unwrap()).unwrap();
        assert_eq!(metadata.role, "Vagrant");
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let hub = LoopbackHub::new();
        let alpha = session(&hub);
        alpha.connect("OPS-1", "alpha", "Scout").await.unwrap();
        alpha.disconnect();
        alpha.disconnect();
        assert_eq!(alpha.connection_state(), ConnectionState::Disconnected);
        assert!(!hub.is_connected("alpha"));
        assert!(matches!(
            alpha.publish_message(&ProtocolMessage::MuteAll).await,
            Err(Error::Transport(TransportError::NotConnected))
        ));
    }
}
